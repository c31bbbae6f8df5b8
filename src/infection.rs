use crate::model::{Agents, Status};
use anyhow::Result;
use rand::prelude::*;
use rand_distr::Bernoulli;

/// Proximity-based transmission from infected to susceptible agents.
///
/// Every susceptible agent is tested against every infected agent, so a
/// pass costs O(S·I). This is fine for a few thousand agents.
pub struct Infection {
    trans_dist: Bernoulli,
    radius: f64,
    recovery_time: u32,
}

impl Infection {
    pub fn new(infection_rate: f64, radius: f64, recovery_time: u32) -> Result<Self> {
        let trans_dist = Bernoulli::new(infection_rate)?;
        Ok(Self {
            trans_dist,
            radius,
            recovery_time,
        })
    }

    /// Expose susceptible agents to nearby infected agents.
    ///
    /// Agents infected during this pass do not spread the infection
    /// until the next pass. Returns the number of new infections.
    pub fn propagate<R: Rng>(&self, agents: &mut Agents, rng: &mut R) -> usize {
        let i_agt_inf: Vec<usize> = (0..agents.len())
            .filter(|&i_agt| agents.status[i_agt].is_infected())
            .collect();
        if i_agt_inf.is_empty() {
            return 0;
        }

        let radius_2 = self.radius * self.radius;
        let mut n_new = 0;

        for i_agt_sus in 0..agents.len() {
            if !agents.status[i_agt_sus].is_susceptible() {
                continue;
            }
            let [x_sus, y_sus] = agents.positions[i_agt_sus];

            for &i_agt in &i_agt_inf {
                let [x_inf, y_inf] = agents.positions[i_agt];
                let dist_2 = (x_sus - x_inf).powi(2) + (y_sus - y_inf).powi(2);
                if dist_2 >= radius_2 {
                    continue;
                }
                // One roll per exposure; the first success ends the search.
                if self.trans_dist.sample(rng) {
                    agents.status[i_agt_sus] = Status::Infected {
                        timer: self.recovery_time,
                    };
                    n_new += 1;
                    break;
                }
            }
        }

        n_new
    }
}

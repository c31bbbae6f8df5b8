use crate::model::Agents;
use anyhow::Result;
use rand::prelude::*;
use rand_distr::Uniform;

/// Maximum absolute velocity perturbation per component and tick.
const NOISE_AMPLITUDE: f64 = 0.001;

/// Speed limit as a multiple of the current movement speed.
const SPEED_LIMIT_FACTOR: f64 = 1.5;

/// Euler motion in the unit square with reflecting walls.
pub struct Motion {
    noise_dist: Uniform<f64>,
}

impl Motion {
    pub fn new() -> Result<Self> {
        let noise_dist = Uniform::new(-NOISE_AMPLITUDE, NOISE_AMPLITUDE)?;
        Ok(Self { noise_dist })
    }

    /// Move every agent one tick and update its velocity.
    ///
    /// `speed_cap` is the current (possibly throttled) movement speed.
    pub fn advance<R: Rng>(&self, agents: &mut Agents, speed_cap: f64, rng: &mut R) {
        let max_speed = speed_cap * SPEED_LIMIT_FACTOR;

        for (pos, vel) in agents.positions.iter_mut().zip(agents.velocities.iter_mut()) {
            for axis in 0..2 {
                pos[axis] += vel[axis];

                // Bounce off the walls.
                if pos[axis] <= 0.0 || pos[axis] >= 1.0 {
                    vel[axis] = -vel[axis];
                }
                pos[axis] = pos[axis].clamp(0.0, 1.0);
            }

            for axis in 0..2 {
                vel[axis] += self.noise_dist.sample(rng);
            }

            let speed = vel[0].hypot(vel[1]);
            if speed > max_speed {
                let scale = max_speed / speed;
                vel.iter_mut().for_each(|ele| *ele *= scale);
            }
        }
    }
}

use crate::config::{QuarantineConfig, VaccinationConfig};
use crate::model::{Event, Status};
use rand::prelude::*;

/// Fraction of the nominal speed kept while quarantine is active.
const QUARANTINE_SPEED_FACTOR: f64 = 0.3;

/// Deactivation threshold as a fraction of the activation threshold.
const QUARANTINE_RELEASE_FACTOR: f64 = 0.5;

/// Quarantine state machine with a hysteresis band.
pub struct Quarantine {
    enabled: bool,
    threshold: f64,
    active: bool,
    base_speed: f64,
    speed: f64,
}

impl Quarantine {
    pub fn new(cfg: &QuarantineConfig, base_speed: f64) -> Self {
        Self {
            enabled: cfg.enabled,
            threshold: cfg.threshold / 100.0,
            active: false,
            base_speed,
            speed: base_speed,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Current movement speed, throttled while active.
    pub fn movement_speed(&self) -> f64 {
        self.speed
    }

    /// Update the state from the current infected fraction.
    pub fn evaluate(&mut self, time: u64, infected_fraction: f64) -> Option<Event> {
        if !self.enabled {
            return None;
        }

        if !self.active && infected_fraction >= self.threshold {
            self.active = true;
            self.speed = self.base_speed * QUARANTINE_SPEED_FACTOR;
            Some(Event::QuarantineActivated {
                time,
                infected_fraction,
            })
        } else if self.active && infected_fraction < self.threshold * QUARANTINE_RELEASE_FACTOR {
            self.active = false;
            self.speed = self.base_speed;
            Some(Event::QuarantineLifted {
                time,
                infected_fraction,
            })
        } else {
            None
        }
    }
}

/// Vaccination rollout among susceptible agents.
pub struct Vaccination {
    enabled: bool,
    start: u64,
    rate: usize,
}

impl Vaccination {
    pub fn new(cfg: &VaccinationConfig) -> Self {
        Self {
            enabled: cfg.enabled,
            start: cfg.start,
            rate: cfg.rate,
        }
    }

    /// Vaccinate up to `rate` random susceptible agents if the rollout has begun.
    ///
    /// Returns an event on tick `start` if anyone was vaccinated on it.
    pub fn apply<R: Rng>(
        &self,
        time: u64,
        status: &mut [Status],
        rng: &mut R,
    ) -> Option<Event> {
        if !self.enabled || time < self.start {
            return None;
        }

        let i_agt_sus: Vec<usize> = (0..status.len())
            .filter(|&i_agt| status[i_agt].is_susceptible())
            .collect();
        let n_vac = self.rate.min(i_agt_sus.len());
        for &i_agt in i_agt_sus.choose_multiple(rng, n_vac) {
            status[i_agt] = Status::Vaccinated;
        }

        if time != self.start || n_vac == 0 {
            return None;
        }
        Some(Event::VaccinationStarted { time })
    }
}

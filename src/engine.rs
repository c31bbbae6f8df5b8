use crate::config::Config;
use crate::infection::Infection;
use crate::model::{Agents, Event, History, Snapshot, Status};
use crate::motion::Motion;
use crate::policy::{Quarantine, Vaccination};
use crate::transition::age_and_transition;
use anyhow::{Context, Result};
use rand::prelude::*;
use rand_chacha::ChaCha12Rng;
use rand_distr::Uniform;

/// Lower-left corners of the squares in which agents are initially placed.
const QUADRANT_ORIGINS: [[f64; 2]; 4] = [[0.1, 0.1], [0.5, 0.1], [0.1, 0.5], [0.5, 0.5]];

/// Side of each initial placement square.
const QUADRANT_SIDE: f64 = 0.4;

/// Epidemic simulation engine.
///
/// Owns the configuration, the agents, both policies, the recorded
/// history and the random number generator. The population is advanced
/// one tick at a time with [`Population::update`].
pub struct Population {
    cfg: Config,
    agents: Agents,
    motion: Motion,
    infection: Infection,
    quarantine: Quarantine,
    vaccination: Vaccination,
    time: u64,
    history: History,
    events: Vec<Event>,
    rng: ChaCha12Rng,
}

impl Population {
    /// Create a new `Population` with the given configuration and a random initial state.
    ///
    /// Agents are spread over the four quadrants of the unit square and
    /// `initial_infected` of them, chosen uniformly, start infected.
    ///
    /// # Errors
    /// Returns an error naming the offending field if the configuration is invalid.
    pub fn new(cfg: Config, mut rng: ChaCha12Rng) -> Result<Self> {
        cfg.validate().context("failed to validate config")?;

        let size = cfg.population.size;
        let speed = cfg.movement.speed;

        let unit_dist = Uniform::new(0.0, QUADRANT_SIDE)?;
        let positions = (0..size)
            .map(|i_agt| {
                let [x_0, y_0] = QUADRANT_ORIGINS[i_agt % QUADRANT_ORIGINS.len()];
                [x_0 + unit_dist.sample(&mut rng), y_0 + unit_dist.sample(&mut rng)]
            })
            .collect();

        let vel_dist = Uniform::new(-0.5 * speed, 0.5 * speed)?;
        let velocities = (0..size)
            .map(|_| [vel_dist.sample(&mut rng), vel_dist.sample(&mut rng)])
            .collect();

        let mut status = vec![Status::Susceptible; size];
        let i_agt_all: Vec<usize> = (0..size).collect();
        for &i_agt in i_agt_all.choose_multiple(&mut rng, cfg.population.initial_infected) {
            status[i_agt] = Status::Infected {
                timer: cfg.disease.recovery_time,
            };
        }

        let agents = Agents::new(positions, velocities, status)?;

        let motion = Motion::new().context("failed to construct motion model")?;
        let infection = Infection::new(
            cfg.disease.infection_rate,
            cfg.disease.interaction_radius,
            cfg.disease.recovery_time,
        )
        .context("failed to construct infection model")?;
        let quarantine = Quarantine::new(&cfg.quarantine, speed);
        let vaccination = Vaccination::new(&cfg.vaccination);

        Ok(Self {
            cfg,
            agents,
            motion,
            infection,
            quarantine,
            vaccination,
            time: 0,
            history: History::default(),
            events: Vec::new(),
            rng,
        })
    }

    /// Advance the simulation by one tick and return a copy of every agent's status.
    pub fn update(&mut self) -> Vec<Status> {
        self.time += 1;

        // Quarantine goes first since it sets this tick's speed.
        let infected_fraction = self.agents.counts().infected as f64 / self.size() as f64;
        if let Some(event) = self.quarantine.evaluate(self.time, infected_fraction) {
            self.notify(event);
        }

        self.motion.advance(
            &mut self.agents,
            self.quarantine.movement_speed(),
            &mut self.rng,
        );

        let n_new = self.infection.propagate(&mut self.agents, &mut self.rng);

        age_and_transition(
            &mut self.agents.status,
            self.cfg.disease.recovery_time,
            self.cfg.disease.immunity_time,
        );

        if let Some(event) = self
            .vaccination
            .apply(self.time, &mut self.agents.status, &mut self.rng)
        {
            self.notify(event);
        }

        let counts = self.agents.counts();
        log::debug!("tick {}: {n_new} new infections, {counts:?}", self.time);
        self.history.push(counts);

        self.agents.status.clone()
    }

    fn notify(&mut self, event: Event) {
        match &event {
            Event::QuarantineActivated {
                time,
                infected_fraction,
            } => log::info!(
                "tick {time}: quarantine activated ({:.1}% infected)",
                100.0 * infected_fraction
            ),
            Event::QuarantineLifted {
                time,
                infected_fraction,
            } => log::info!(
                "tick {time}: quarantine lifted ({:.1}% infected)",
                100.0 * infected_fraction
            ),
            Event::VaccinationStarted { time } => log::info!("tick {time}: vaccination started"),
        }
        self.events.push(event);
    }

    pub fn size(&self) -> usize {
        self.agents.len()
    }

    pub fn time(&self) -> u64 {
        self.time
    }

    pub fn positions(&self) -> &[[f64; 2]] {
        &self.agents.positions
    }

    pub fn status(&self) -> &[Status] {
        &self.agents.status
    }

    pub fn quarantine_active(&self) -> bool {
        self.quarantine.is_active()
    }

    pub fn current_movement_speed(&self) -> f64 {
        self.quarantine.movement_speed()
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    /// Policy notifications in the order they fired.
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn snapshot(&self) -> Snapshot {
        self.agents.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::base_config;
    use crate::config::{QuarantineConfig, VaccinationConfig};

    fn population(cfg: Config, seed: u64) -> Population {
        Population::new(cfg, ChaCha12Rng::seed_from_u64(seed)).unwrap()
    }

    fn infected_timer(status: Status) -> Option<u32> {
        match status {
            Status::Infected { timer } => Some(timer),
            _ => None,
        }
    }

    #[test]
    fn initial_state() {
        let cfg = base_config();
        let pop = population(cfg.clone(), 1);

        assert_eq!(pop.time(), 0);
        assert_eq!(pop.size(), cfg.population.size);
        assert_eq!(pop.history().len(), 0);
        assert!(!pop.quarantine_active());
        assert_eq!(pop.current_movement_speed(), cfg.movement.speed);

        let n_inf = pop
            .status()
            .iter()
            .filter(|&&s| s == Status::Infected { timer: cfg.disease.recovery_time })
            .count();
        assert_eq!(n_inf, cfg.population.initial_infected);
        assert_eq!(
            pop.status().iter().filter(|s| s.is_susceptible()).count(),
            cfg.population.size - cfg.population.initial_infected
        );

        for (i_agt, &[x, y]) in pop.positions().iter().enumerate() {
            let [x_0, y_0] = QUADRANT_ORIGINS[i_agt % 4];
            assert!((x_0..=x_0 + QUADRANT_SIDE).contains(&x));
            assert!((y_0..=y_0 + QUADRANT_SIDE).contains(&y));
        }
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut cfg = base_config();
        cfg.population.initial_infected = cfg.population.size + 1;
        let error = Population::new(cfg, ChaCha12Rng::seed_from_u64(0))
            .err()
            .expect("construction should fail");
        assert!(format!("{error:#}").contains("initial_infected"));
    }

    #[test]
    fn history_partitions_population() {
        let mut cfg = base_config();
        cfg.disease.recovery_time = 5;
        cfg.disease.immunity_time = 5;
        cfg.disease.interaction_radius = 0.2;
        cfg.vaccination = VaccinationConfig {
            enabled: true,
            start: 40,
            rate: 1,
        };
        let mut pop = population(cfg, 2);

        for tick in 1..=200 {
            let status = pop.update();
            assert_eq!(status, pop.status());
            assert_eq!(pop.history().len(), tick);
        }
        let history = pop.history();
        for i_tick in 0..history.len() {
            let total = history.susceptible[i_tick]
                + history.infected[i_tick]
                + history.recovered[i_tick]
                + history.vaccinated[i_tick];
            assert_eq!(total, pop.size());
        }
    }

    #[test]
    fn positions_stay_in_unit_square() {
        let mut cfg = base_config();
        cfg.movement.speed = 0.2;
        let mut pop = population(cfg, 3);

        for _ in 0..500 {
            pop.update();
            for &[x, y] in pop.positions() {
                assert!((0.0..=1.0).contains(&x));
                assert!((0.0..=1.0).contains(&y));
            }
        }
    }

    #[test]
    fn disabled_quarantine_keeps_speed() {
        let mut cfg = base_config();
        cfg.population.initial_infected = cfg.population.size;
        cfg.quarantine = QuarantineConfig {
            enabled: false,
            threshold: 10.0,
        };
        let mut pop = population(cfg.clone(), 4);

        for _ in 0..50 {
            pop.update();
            assert!(!pop.quarantine_active());
            assert_eq!(pop.current_movement_speed(), cfg.movement.speed);
        }
        assert!(pop.events().is_empty());
    }

    #[test]
    fn infected_timers_strictly_decrease() {
        let mut cfg = base_config();
        cfg.disease.recovery_time = 10;
        let mut pop = population(cfg, 5);

        let mut prev = pop.status().to_vec();
        for _ in 0..60 {
            let next = pop.update();
            for (&before, &after) in prev.iter().zip(next.iter()) {
                if let (Some(t_0), Some(t_1)) = (infected_timer(before), infected_timer(after)) {
                    assert!(t_1 < t_0);
                }
                // An infected agent either keeps counting down or recovers.
                if before.is_infected() {
                    assert!(after.is_infected() || matches!(after, Status::Recovered { .. }));
                }
            }
            prev = next;
        }
    }

    #[test]
    fn scenario_no_transmission() {
        let mut cfg = base_config();
        cfg.population.size = 10;
        cfg.population.initial_infected = 10;
        cfg.disease.infection_rate = 0.0;
        cfg.disease.recovery_time = 6;
        cfg.disease.immunity_time = 100;
        let mut pop = population(cfg, 6);

        for _ in 0..5 {
            pop.update();
            assert_eq!(pop.history().infected.last(), Some(&10));
        }
        pop.update();
        let counts = pop.history().at(6).unwrap();
        assert_eq!(counts.recovered, 10);
        assert_eq!(counts.infected, 0);

        for _ in 0..50 {
            pop.update();
        }
        assert!(pop.history().infected.iter().all(|&n_inf| n_inf <= 10));
    }

    #[test]
    fn scenario_full_coverage_radius() {
        let mut cfg = base_config();
        cfg.population.size = 100;
        cfg.population.initial_infected = 1;
        cfg.disease.infection_rate = 1.0;
        cfg.disease.interaction_radius = 2.0;
        cfg.disease.recovery_time = 10;
        let mut pop = population(cfg, 7);

        let status = pop.update();
        assert!(status.iter().all(Status::is_infected));

        let counts = pop.history().at(1).unwrap();
        assert_eq!(counts.infected, 100);
        assert_eq!(counts.susceptible, 0);
    }

    #[test]
    fn scenario_same_tick_recovery() {
        let mut cfg = base_config();
        cfg.population.size = 100;
        cfg.population.initial_infected = 1;
        cfg.disease.infection_rate = 1.0;
        cfg.disease.interaction_radius = 2.0;
        cfg.disease.recovery_time = 1;
        cfg.disease.immunity_time = 50;
        let mut pop = population(cfg, 8);

        pop.update();

        // Everyone was infected and recovered within the first tick.
        let counts = pop.history().at(1).unwrap();
        assert_eq!(counts.recovered, 100);
        assert!(
            pop.status()
                .iter()
                .all(|&s| s == Status::Recovered { timer: 49 })
        );
    }

    #[test]
    fn scenario_quarantine() {
        let mut cfg = base_config();
        cfg.population.size = 10;
        cfg.population.initial_infected = 0;
        cfg.disease.infection_rate = 0.0;
        cfg.disease.recovery_time = 1000;
        cfg.quarantine = QuarantineConfig {
            enabled: true,
            threshold: 30.0,
        };
        let speed = cfg.movement.speed;
        let mut pop = population(cfg, 9);

        let set_infected = |pop: &mut Population, n_inf: usize| {
            for (i_agt, status) in pop.agents.status.iter_mut().enumerate() {
                *status = if i_agt < n_inf {
                    Status::Infected { timer: 1000 }
                } else {
                    Status::Susceptible
                };
            }
        };

        set_infected(&mut pop, 2);
        pop.update();
        assert!(!pop.quarantine_active());

        set_infected(&mut pop, 3);
        pop.update();
        assert!(pop.quarantine_active());
        assert!((pop.current_movement_speed() - 0.3 * speed).abs() < 1e-15);
        for &[vx, vy] in &pop.agents.velocities {
            assert!(vx.hypot(vy) <= 0.3 * speed * 1.5 + 1e-12);
        }
        assert!(matches!(
            pop.events(),
            [Event::QuarantineActivated { time: 2, .. }]
        ));

        // 20% is inside the hysteresis band.
        set_infected(&mut pop, 2);
        for _ in 0..5 {
            pop.update();
            assert!(pop.quarantine_active());
        }

        set_infected(&mut pop, 1);
        pop.update();
        assert!(!pop.quarantine_active());
        assert_eq!(pop.current_movement_speed(), speed);
        assert_eq!(pop.events().len(), 2);
        assert!(matches!(
            pop.events()[1],
            Event::QuarantineLifted { time: 8, .. }
        ));
    }

    #[test]
    fn scenario_vaccination_rollout() {
        let mut cfg = base_config();
        cfg.population.size = 200;
        cfg.population.initial_infected = 0;
        cfg.vaccination = VaccinationConfig {
            enabled: true,
            start: 50,
            rate: 5,
        };
        let mut pop = population(cfg, 10);

        let mut prev_status = pop.status().to_vec();
        for _ in 0..100 {
            let status = pop.update();
            for (before, after) in prev_status.iter().zip(status.iter()) {
                if *after == Status::Vaccinated && *before != Status::Vaccinated {
                    assert_eq!(*before, Status::Susceptible);
                }
            }
            prev_status = status;
        }

        let history = pop.history();
        for time in 1..=100 {
            let expected = if time < 50 { 0 } else { (5 * (time - 49)).min(200) };
            assert_eq!(history.at(time).unwrap().vaccinated, expected, "tick {time}");
        }
        assert_eq!(pop.events(), [Event::VaccinationStarted { time: 50 }]);
    }

    #[test]
    fn same_seed_same_run() {
        let mut cfg = base_config();
        cfg.quarantine = QuarantineConfig {
            enabled: true,
            threshold: 10.0,
        };
        let mut pop_a = population(cfg.clone(), 11);
        let mut pop_b = population(cfg, 11);

        for _ in 0..100 {
            assert_eq!(pop_a.update(), pop_b.update());
        }
        assert_eq!(pop_a.history(), pop_b.history());
        assert_eq!(pop_a.positions(), pop_b.positions());
        assert_eq!(pop_a.events(), pop_b.events());
    }
}

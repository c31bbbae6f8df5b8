use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

/// Epidemiological status of an agent.
///
/// The countdown timer only exists where it drives a transition:
/// remaining infection ticks for `Infected`, remaining immunity ticks
/// for `Recovered`. `Vaccinated` is terminal for the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    Susceptible,
    Infected { timer: u32 },
    Recovered { timer: u32 },
    Vaccinated,
}

impl Status {
    pub fn is_susceptible(&self) -> bool {
        matches!(self, Status::Susceptible)
    }

    pub fn is_infected(&self) -> bool {
        matches!(self, Status::Infected { .. })
    }
}

/// Number of agents in each status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub susceptible: usize,
    pub infected: usize,
    pub recovered: usize,
    pub vaccinated: usize,
}

impl StatusCounts {
    pub fn total(&self) -> usize {
        self.susceptible + self.infected + self.recovered + self.vaccinated
    }
}

/// Per-agent state stored as index-aligned arrays.
#[derive(Debug, Clone)]
pub struct Agents {
    pub positions: Vec<[f64; 2]>,
    pub velocities: Vec<[f64; 2]>,
    pub status: Vec<Status>,
}

impl Agents {
    pub fn new(
        positions: Vec<[f64; 2]>,
        velocities: Vec<[f64; 2]>,
        status: Vec<Status>,
    ) -> Result<Self> {
        let n_agt = positions.len();
        if velocities.len() != n_agt || status.len() != n_agt {
            bail!(
                "agent arrays must have equal lengths, but have {n_agt}, {} and {}",
                velocities.len(),
                status.len()
            );
        }
        Ok(Self {
            positions,
            velocities,
            status,
        })
    }

    pub fn len(&self) -> usize {
        self.status.len()
    }

    pub fn counts(&self) -> StatusCounts {
        let mut counts = StatusCounts::default();
        for status in &self.status {
            match status {
                Status::Susceptible => counts.susceptible += 1,
                Status::Infected { .. } => counts.infected += 1,
                Status::Recovered { .. } => counts.recovered += 1,
                Status::Vaccinated => counts.vaccinated += 1,
            }
        }
        counts
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            positions: self.positions.clone(),
            status: self.status.clone(),
        }
    }
}

/// Owned copy of agent positions and statuses at a given tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub positions: Vec<[f64; 2]>,
    pub status: Vec<Status>,
}

/// Status counts recorded once per tick, as four parallel series.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct History {
    pub susceptible: Vec<usize>,
    pub infected: Vec<usize>,
    pub recovered: Vec<usize>,
    pub vaccinated: Vec<usize>,
}

impl History {
    pub fn push(&mut self, counts: StatusCounts) {
        self.susceptible.push(counts.susceptible);
        self.infected.push(counts.infected);
        self.recovered.push(counts.recovered);
        self.vaccinated.push(counts.vaccinated);
    }

    pub fn len(&self) -> usize {
        self.susceptible.len()
    }

    /// Counts recorded at tick `time` (ticks start at 1).
    pub fn at(&self, time: usize) -> Option<StatusCounts> {
        let i_tick = time.checked_sub(1)?;
        Some(StatusCounts {
            susceptible: *self.susceptible.get(i_tick)?,
            infected: *self.infected.get(i_tick)?,
            recovered: *self.recovered.get(i_tick)?,
            vaccinated: *self.vaccinated.get(i_tick)?,
        })
    }

    /// Highest infected count and the tick at which it was first reached.
    pub fn peak_infected(&self) -> Option<(u64, usize)> {
        let mut peak: Option<(u64, usize)> = None;
        for (i_tick, &infected) in self.infected.iter().enumerate() {
            if peak.is_none_or(|(_, max)| infected > max) {
                peak = Some((i_tick as u64 + 1, infected));
            }
        }
        peak
    }
}

/// Notification fired by a policy state change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    QuarantineActivated { time: u64, infected_fraction: f64 },
    QuarantineLifted { time: u64, infected_fraction: f64 },
    VaccinationStarted { time: u64 },
}

/// Record of the simulation at a saved tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frame {
    pub time: u64,
    pub counts: StatusCounts,
    pub quarantine_active: bool,
    pub snapshot: Snapshot,
}

/// Everything a finished run leaves behind besides its frames.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub size: usize,
    pub history: History,
    pub events: Vec<Event>,
}

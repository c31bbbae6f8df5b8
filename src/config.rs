use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::{
    fmt::Debug,
    fs,
    ops::{Bound, RangeBounds},
    path::Path,
};

/// Simulation configuration parameters.
///
/// Loaded from a TOML file and validated before use.
/// See [`Config::from_file`] for loading.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Config {
    pub population: PopulationConfig,
    pub disease: DiseaseConfig,
    pub movement: MovementConfig,
    #[serde(default)]
    pub quarantine: QuarantineConfig,
    #[serde(default)]
    pub vaccination: VaccinationConfig,
    pub output: OutputConfig,
}

/// Population size and initial seeding.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct PopulationConfig {
    /// Number of agents.
    pub size: usize,
    /// Number of agents infected at the start of the run.
    pub initial_infected: usize,
    /// Random seed (OS entropy is used if absent).
    #[serde(default)]
    pub seed: Option<u64>,
}

/// Transmission and disease progression parameters.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct DiseaseConfig {
    /// Probability of transmission per exposure.
    pub infection_rate: f64,
    /// Number of ticks an agent stays infected.
    pub recovery_time: u32,
    /// Number of ticks a recovered agent stays immune.
    pub immunity_time: u32,
    /// Maximum distance at which an exposure can happen.
    pub interaction_radius: f64,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct MovementConfig {
    /// Nominal agent speed (distance per tick).
    pub speed: f64,
}

#[derive(Debug, PartialEq, Clone, Default, Serialize, Deserialize)]
pub struct QuarantineConfig {
    pub enabled: bool,
    /// Infected percentage (0 to 100) that activates the quarantine.
    pub threshold: f64,
}

#[derive(Debug, PartialEq, Clone, Default, Serialize, Deserialize)]
pub struct VaccinationConfig {
    pub enabled: bool,
    /// First tick on which agents are vaccinated.
    pub start: u64,
    /// Maximum number of agents vaccinated per tick.
    pub rate: usize,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Number of ticks per run.
    pub n_ticks: u64,
    /// Number of ticks between trajectory frames.
    pub ticks_per_save: u64,
}

impl Config {
    /// Load a [`Config`] from a file.
    ///
    /// The file must be TOML-encoded and contain a serialized [`Config`].
    /// Performs validation on all parameters before returning.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, deserialized,
    /// or if the configuration values are invalid.
    pub fn from_file<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let contents =
            fs::read_to_string(file).with_context(|| format!("failed to read {file:?}"))?;

        let config: Config = toml::from_str(&contents).context("failed to deserialize config")?;

        config.validate().context("failed to validate config")?;

        Ok(config)
    }

    /// Check every parameter, naming the offending field on failure.
    pub fn validate(&self) -> Result<()> {
        let pop = &self.population;
        check_num(pop.size, 1..).context("invalid size")?;
        check_num(pop.initial_infected, 0..=pop.size).context("invalid initial_infected")?;

        let dis = &self.disease;
        check_num(dis.infection_rate, 0.0..=1.0).context("invalid infection_rate")?;
        check_num(dis.recovery_time, 1..).context("invalid recovery_time")?;
        check_num(dis.immunity_time, 1..).context("invalid immunity_time")?;
        check_positive(dis.interaction_radius).context("invalid interaction_radius")?;

        check_positive(self.movement.speed).context("invalid movement_speed")?;

        check_num(self.quarantine.threshold, 0.0..=100.0)
            .context("invalid quarantine_threshold")?;

        check_num(self.output.n_ticks, 1..).context("invalid n_ticks")?;
        check_num(self.output.ticks_per_save, 1..=self.output.n_ticks)
            .context("invalid ticks_per_save")?;

        Ok(())
    }
}

fn check_num<T, R>(num: T, range: R) -> Result<()>
where
    T: PartialOrd + Debug,
    R: RangeBounds<T> + Debug,
{
    if !range.contains(&num) {
        bail!("number must be in the range {range:?}, but is {num:?}");
    }
    Ok(())
}

fn check_positive(num: f64) -> Result<()> {
    check_num(num, (Bound::Excluded(0.0), Bound::Excluded(f64::INFINITY)))
}

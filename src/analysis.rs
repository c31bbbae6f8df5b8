use crate::config::Config;
use crate::model::{Frame, StatusCounts};
use crate::stats::{Accumulator, TimeSeries};
use anyhow::{Context, Result};
use rmp_serde::{decode, encode};
use serde::Serialize;
use serde_value::Value;
use std::{
    collections::BTreeMap,
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::Path,
};

/// Observable computed from the saved frames of a run.
pub trait Obs {
    fn name(&self) -> &'static str;
    fn update(&mut self, frame: &Frame, size: usize);
    fn report(&self) -> Result<Value>;
}

fn fractions(counts: &StatusCounts, size: usize) -> [f64; 4] {
    [
        counts.susceptible,
        counts.infected,
        counts.recovered,
        counts.vaccinated,
    ]
    .map(|count| count as f64 / size as f64)
}

/// Mean and spread of each status fraction over time.
#[derive(Default)]
pub struct StatusFractions {
    acc_arr: [Accumulator; 4],
}

impl Obs for StatusFractions {
    fn name(&self) -> &'static str {
        "status_fractions"
    }

    fn update(&mut self, frame: &Frame, size: usize) {
        for (acc, frac) in self.acc_arr.iter_mut().zip(fractions(&frame.counts, size)) {
            acc.add(frac);
        }
    }

    fn report(&self) -> Result<Value> {
        let [sus, inf, rec, vac] = &self.acc_arr;
        let report = BTreeMap::from([
            ("susceptible", sus.report()),
            ("infected", inf.report()),
            ("recovered", rec.report()),
            ("vaccinated", vac.report()),
        ]);
        Ok(serde_value::to_value(report)?)
    }
}

#[derive(Debug, Default, Serialize)]
pub struct PeakInfected {
    time: u64,
    fraction: f64,
}

impl Obs for PeakInfected {
    fn name(&self) -> &'static str {
        "peak_infected"
    }

    fn update(&mut self, frame: &Frame, size: usize) {
        let fraction = frame.counts.infected as f64 / size as f64;
        if fraction > self.fraction {
            self.fraction = fraction;
            self.time = frame.time;
        }
    }

    fn report(&self) -> Result<Value> {
        Ok(serde_value::to_value(self)?)
    }
}

/// Share of frames recorded while quarantine was active.
#[derive(Default)]
pub struct QuarantineShare {
    acc: Accumulator,
}

impl Obs for QuarantineShare {
    fn name(&self) -> &'static str {
        "quarantine_share"
    }

    fn update(&mut self, frame: &Frame, _size: usize) {
        self.acc.add(if frame.quarantine_active { 1.0 } else { 0.0 });
    }

    fn report(&self) -> Result<Value> {
        Ok(serde_value::to_value(self.acc.report())?)
    }
}

/// Long-run (endemic) infected fraction.
#[derive(Default)]
pub struct EndemicInfected {
    time_series: TimeSeries,
}

impl Obs for EndemicInfected {
    fn name(&self) -> &'static str {
        "endemic_infected"
    }

    fn update(&mut self, frame: &Frame, size: usize) {
        self.time_series
            .push(frame.counts.infected as f64 / size as f64);
    }

    fn report(&self) -> Result<Value> {
        Ok(serde_value::to_value(self.time_series.report())?)
    }
}

pub struct Analyzer {
    cfg: Config,
    obs_ptr_vec: Vec<Box<dyn Obs>>,
}

impl Analyzer {
    pub fn new(cfg: Config) -> Self {
        let obs_ptr_vec: Vec<Box<dyn Obs>> = vec![
            Box::new(StatusFractions::default()),
            Box::new(PeakInfected::default()),
            Box::new(QuarantineShare::default()),
            Box::new(EndemicInfected::default()),
        ];
        Self { cfg, obs_ptr_vec }
    }

    /// Number of frames a complete trajectory file holds.
    pub fn frames_per_file(&self) -> u64 {
        self.cfg.output.n_ticks / self.cfg.output.ticks_per_save
    }

    pub fn add_file<P: AsRef<Path>>(&mut self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::open(file).with_context(|| format!("failed to open {file:?}"))?;
        let mut reader = BufReader::new(file);

        let size = self.cfg.population.size;
        for i_frame in 0..self.frames_per_file() {
            let frame: Frame = decode::from_read(&mut reader)
                .with_context(|| format!("failed to read frame {i_frame}"))?;
            for obs in &mut self.obs_ptr_vec {
                obs.update(&frame, size);
            }
        }
        Ok(())
    }

    pub fn save_results<P: AsRef<Path>>(&self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
        let mut writer = BufWriter::new(file);

        let mut reports = BTreeMap::new();
        for obs in &self.obs_ptr_vec {
            let report = obs
                .report()
                .with_context(|| format!("failed to report {}", obs.name()))?;
            reports.insert(obs.name(), report);
        }
        encode::write_named(&mut writer, &reports).context("failed to serialize results")?;
        writer.flush().context("failed to flush writer stream")?;
        Ok(())
    }
}

use crate::analysis::Analyzer;
use crate::config::Config;
use crate::engine::Population;
use crate::model::{Frame, RunSummary};
use anyhow::{Context, Result};
use glob::glob;
use rand::SeedableRng;
use rand_chacha::ChaCha12Rng;
use rmp_serde::encode;
use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

pub struct Manager {
    sim_dir: PathBuf,
    cfg: Config,
}

impl Manager {
    pub fn new<P: AsRef<Path>>(sim_dir: P) -> Result<Self> {
        let sim_dir = sim_dir.as_ref().to_path_buf();

        let cfg =
            Config::from_file(sim_dir.join("config.toml")).context("failed to construct cfg")?;
        log::info!("{cfg:#?}");

        Ok(Self { sim_dir, cfg })
    }

    /// Create a new run directory and simulate one run into it.
    pub fn create_run(&self) -> Result<()> {
        let run_idx = self.count_run_dirs().context("failed to count run dirs")?;

        let run_dir = self.run_dir(run_idx);
        fs::create_dir_all(&run_dir).with_context(|| format!("failed to create {run_dir:?}"))?;
        log::info!("created {run_dir:?}");

        let rng = match self.cfg.population.seed {
            Some(seed) => ChaCha12Rng::seed_from_u64(seed.wrapping_add(run_idx as u64)),
            None => ChaCha12Rng::try_from_os_rng()?,
        };
        let mut pop =
            Population::new(self.cfg.clone(), rng).context("failed to construct population")?;

        self.perform_simulation(&mut pop, self.trajectory_file(run_idx))
            .context("failed to perform simulation")?;

        let summary = RunSummary {
            size: pop.size(),
            history: pop.history().clone(),
            events: pop.events().to_vec(),
        };
        let history_file = self.history_file(run_idx);
        write_msgpack(&history_file, &summary)
            .with_context(|| format!("failed to write {history_file:?}"))?;

        if let Some((time, n_inf)) = summary.history.peak_infected() {
            let pct = 100.0 * n_inf as f64 / summary.size as f64;
            log::info!(
                "ran {} ticks, peak infected {n_inf} ({pct:.1}%) at tick {time}",
                pop.time()
            );
        }

        Ok(())
    }

    fn perform_simulation<P: AsRef<Path>>(&self, pop: &mut Population, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
        let mut writer = BufWriter::new(file);

        let out = &self.cfg.output;
        let n_saves = out.n_ticks / out.ticks_per_save;
        for i_save in 0..n_saves {
            for _ in 0..out.ticks_per_save {
                pop.update();
            }

            let frame = Frame {
                time: pop.time(),
                counts: pop
                    .history()
                    .at(pop.time() as usize)
                    .context("missing counts for current tick")?,
                quarantine_active: pop.quarantine_active(),
                snapshot: pop.snapshot(),
            };
            encode::write(&mut writer, &frame).context("failed to serialize frame")?;

            let progress = 100.0 * (i_save + 1) as f64 / n_saves as f64;
            log::info!("completed {progress:06.2}%");
        }

        // Ticks past the last full save are still simulated.
        for _ in 0..out.n_ticks % out.ticks_per_save {
            pop.update();
        }

        writer.flush().context("failed to flush writer stream")?;

        Ok(())
    }

    pub fn analyze_sim(&self) -> Result<()> {
        let n_runs = self.count_run_dirs().context("failed to count run dirs")?;
        for run_idx in 0..n_runs {
            let mut analyzer = Analyzer::new(self.cfg.clone());

            analyzer
                .add_file(self.trajectory_file(run_idx))
                .context("failed to add file")?;

            let results_file = self.results_file(run_idx);
            analyzer
                .save_results(&results_file)
                .context("failed to save results")?;
            log::info!("wrote {results_file:?}");
        }

        Ok(())
    }

    pub fn clean_sim(&self) -> Result<()> {
        let pattern = self.sim_dir.join("run-*");
        let pattern = pattern.to_str().context("pattern is not valid UTF-8")?;
        for run_dir in glob(pattern).context("failed to glob run dirs")? {
            let run_dir = run_dir.context("failed to read run dir path")?;
            if !run_dir.is_dir() {
                continue;
            }
            fs::remove_dir_all(&run_dir)
                .with_context(|| format!("failed to remove {run_dir:?}"))?;
            log::info!("removed {run_dir:?}");
        }
        Ok(())
    }

    fn count_run_dirs(&self) -> Result<usize> {
        let pattern = self.sim_dir.join("run-*");
        let pattern = pattern.to_str().context("pattern is not valid UTF-8")?;
        let count = glob(pattern)
            .context("failed to glob run dirs")?
            .filter_map(Result::ok)
            .filter(|p| p.is_dir())
            .count();
        Ok(count)
    }

    fn run_dir(&self, run_idx: usize) -> PathBuf {
        self.sim_dir.join(format!("run-{run_idx:04}"))
    }

    fn trajectory_file(&self, run_idx: usize) -> PathBuf {
        self.run_dir(run_idx).join("trajectory.msgpack")
    }

    fn history_file(&self, run_idx: usize) -> PathBuf {
        self.run_dir(run_idx).join("history.msgpack")
    }

    fn results_file(&self, run_idx: usize) -> PathBuf {
        self.run_dir(run_idx).join("results.msgpack")
    }
}

fn write_msgpack<T: serde::Serialize>(file: &Path, val: &T) -> Result<()> {
    let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
    let mut writer = BufWriter::new(file);
    encode::write(&mut writer, val).context("failed to serialize value")?;
    writer.flush().context("failed to flush writer stream")?;
    Ok(())
}

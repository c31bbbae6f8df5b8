use serde::{Deserialize, Serialize};

/// Running mean and sample standard deviation (Welford's algorithm).
#[derive(Default)]
pub struct Accumulator {
    n_vals: usize,
    mean: f64,
    sq_dev_sum: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AccumulatorReport {
    pub mean: f64,
    pub std_dev: f64,
}

impl Accumulator {
    pub fn add(&mut self, val: f64) {
        self.n_vals += 1;
        let dev_old = val - self.mean;
        self.mean += dev_old / self.n_vals as f64;
        self.sq_dev_sum += dev_old * (val - self.mean);
    }

    pub fn report(&self) -> AccumulatorReport {
        let std_dev = match self.n_vals {
            0 | 1 => f64::NAN,
            n_vals => (self.sq_dev_sum / (n_vals - 1) as f64).sqrt(),
        };
        AccumulatorReport {
            mean: if self.n_vals == 0 { f64::NAN } else { self.mean },
            std_dev,
        }
    }
}

/// Correlated series of values, analyzed after discarding its transient.
#[derive(Default)]
pub struct TimeSeries {
    vals: Vec<f64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TimeSeriesReport {
    /// Index of the first value kept after truncation.
    pub i_equil: usize,
    pub mean: f64,
    pub std_dev: f64,
    /// Standard error of the mean.
    pub sem: f64,
    /// False when the cut sits at the halfway fallback.
    pub is_equil: bool,
}

impl TimeSeries {
    pub fn push(&mut self, val: f64) {
        self.vals.push(val);
    }

    pub fn report(&self) -> TimeSeriesReport {
        let default_cut = self.vals.len() / 2;
        let i_equil = equilibration_cut(&self.vals).unwrap_or(default_cut);
        let tail = &self.vals[i_equil..];
        TimeSeriesReport {
            i_equil,
            mean: mean(tail),
            std_dev: sample_var(tail).sqrt(),
            sem: blocking_sem(tail),
            is_equil: i_equil != default_cut,
        }
    }
}

fn mean(vals: &[f64]) -> f64 {
    if vals.is_empty() {
        return f64::NAN;
    }
    vals.iter().sum::<f64>() / vals.len() as f64
}

fn sample_var(vals: &[f64]) -> f64 {
    if vals.len() < 2 {
        return f64::NAN;
    }
    let mean = mean(vals);
    let sq_dev_sum: f64 = vals.iter().map(|&val| (val - mean).powi(2)).sum();
    sq_dev_sum / (vals.len() - 1) as f64
}

/// Pick the truncation point minimizing the marginal standard error
/// among the cuts `n / 2^k`.
fn equilibration_cut(vals: &[f64]) -> Option<usize> {
    let n_vals = vals.len();
    if n_vals < 4 {
        return None;
    }

    (1..=n_vals.ilog2() + 1)
        .map(|k| n_vals >> k)
        .map(|cut| {
            let n_tail = (n_vals - cut) as f64;
            let mse = sample_var(&vals[cut..]) * (n_tail - 1.0) / (n_tail * n_tail);
            (cut, mse)
        })
        .min_by(|(_, mse_a), (_, mse_b)| mse_a.total_cmp(mse_b))
        .map(|(cut, _)| cut)
}

/// Standard error of the mean with the Flyvbjerg-Petersen blocking method.
fn blocking_sem(vals: &[f64]) -> f64 {
    let mut blocks = vals.to_vec();
    let mut estimates: Vec<(f64, f64)> = Vec::new();

    while blocks.len() >= 2 {
        let n_blocks = blocks.len() as f64;
        let sem_2 = sample_var(&blocks) / n_blocks;
        let sem_2_err = sem_2 * (2.0 / (n_blocks - 1.0)).sqrt();
        estimates.push((sem_2, sem_2_err));

        blocks = blocks
            .chunks_exact(2)
            .map(|pair| 0.5 * (pair[0] + pair[1]))
            .collect();
    }

    // First estimate that lies above every later lower bound (plateau).
    for (idx, &(sem_2, _)) in estimates.iter().enumerate() {
        let max_low = estimates[idx..]
            .iter()
            .map(|(est, err)| est - err)
            .fold(f64::NEG_INFINITY, f64::max);
        if sem_2 > max_low {
            return sem_2.sqrt();
        }
    }

    estimates.last().map_or(f64::NAN, |(sem_2, _)| sem_2.sqrt())
}

//! Stored summaries and the reducer that produces them.
//!
//! An [`Entry`] is the fixed statistical summary of one named sample
//! series. [`reduce`] turns raw samples into an entry; it is pure and does
//! no I/O.
//!
//! # Example
//!
//! ```rust
//! use tally::entry::reduce;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let entry = reduce("latency", &[1.0, 2.0, 3.0, 4.0, 5.0])?;
//! assert_eq!(entry.count, 5);
//! assert_eq!(entry.mean, 3.0);
//! assert!((entry.std_dev - 2.0_f64.sqrt()).abs() < 1e-12);
//! # Ok(())
//! # }
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{Result, TallyError};

/// Summary of one named sample series.
///
/// Field names on disk follow the legacy data file layout
/// (`Name`, `Len`, `Minimum`, `Maximum`, `Mean`, `StdDev`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    /// Unique key of the entry.
    #[serde(rename = "Name")]
    pub name: String,
    /// Number of samples reduced.
    #[serde(rename = "Len")]
    pub count: usize,
    /// Smallest sample.
    #[serde(rename = "Minimum")]
    pub minimum: f64,
    /// Largest sample.
    #[serde(rename = "Maximum")]
    pub maximum: f64,
    /// Arithmetic mean of the samples.
    #[serde(rename = "Mean")]
    pub mean: f64,
    /// Population standard deviation of the samples.
    #[serde(rename = "StdDev")]
    pub std_dev: f64,
}

impl Entry {
    /// Returns `true` if every numeric field is finite.
    pub fn is_finite(&self) -> bool {
        [self.minimum, self.maximum, self.mean, self.std_dev]
            .iter()
            .all(|v| v.is_finite())
    }
}

/// Reduces a named sample series to its summary.
///
/// One pass computes min/max/mean; the deviations are then summed around
/// that mean. The standard deviation is the population form (divides by
/// `count`). Every field of the result is finite.
///
/// # Errors
///
/// Returns [`TallyError::InvalidInput`] if `name` is empty, `samples` is
/// empty, any sample is NaN or infinite, or the summary cannot be
/// represented in finite `f64`s.
pub fn reduce(name: &str, samples: &[f64]) -> Result<Entry> {
    if name.is_empty() {
        return Err(TallyError::invalid_input("name cannot be empty"));
    }
    if samples.is_empty() {
        return Err(TallyError::invalid_input(format!(
            "no samples given for '{name}'"
        )));
    }
    if let Some(bad) = samples.iter().find(|v| !v.is_finite()) {
        return Err(TallyError::invalid_input(format!(
            "sample {bad} for '{name}' is not finite"
        )));
    }

    let mut minimum = samples[0];
    let mut maximum = samples[0];
    let mut sum = 0.0;
    for &value in samples {
        minimum = minimum.min(value);
        maximum = maximum.max(value);
        sum += value;
    }

    #[allow(clippy::cast_precision_loss)] // sample counts stay far below 2^52
    let n = samples.len() as f64;

    // A constant series has no spread; skip the arithmetic so rounding
    // cannot leave a residue.
    if minimum == maximum {
        return Ok(Entry {
            name: name.to_string(),
            count: samples.len(),
            minimum,
            maximum,
            mean: minimum,
            std_dev: 0.0,
        });
    }

    // Dividing each sample first keeps the mean finite when the plain sum
    // overflows.
    let mean = if sum.is_finite() {
        sum / n
    } else {
        samples.iter().map(|v| v / n).sum::<f64>()
    };
    let mean = mean.clamp(minimum, maximum);

    let std_dev = population_std_dev(samples, mean, n, maximum - minimum);
    if !std_dev.is_finite() {
        return Err(TallyError::invalid_input(format!(
            "standard deviation of '{name}' is not representable"
        )));
    }

    Ok(Entry {
        name: name.to_string(),
        count: samples.len(),
        minimum,
        maximum,
        mean,
        std_dev,
    })
}

/// Population standard deviation around `mean`.
///
/// Deviations are divided by the largest one before squaring so neither
/// huge nor tiny spreads overflow or underflow, then the root is scaled
/// back. When the range itself overflows, samples are halved first and the
/// result doubled.
fn population_std_dev(samples: &[f64], mean: f64, n: f64, range: f64) -> f64 {
    let factor = if range.is_finite() { 1.0 } else { 0.5 };
    let deviation = |v: f64| v * factor - mean * factor;

    let scale = samples
        .iter()
        .fold(0.0_f64, |acc, &v| acc.max(deviation(v).abs()));
    if scale == 0.0 {
        return 0.0;
    }

    let squared: f64 = samples
        .iter()
        .map(|&v| (deviation(v) / scale).powi(2))
        .sum();

    scale * (squared / n).sqrt() / factor
}

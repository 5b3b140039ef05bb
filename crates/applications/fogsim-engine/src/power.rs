//! Utilization → power models
//!
//! A host reports power as a function of its CPU utilization (0–100%).
//! The built-in [`PowerCurve`] is a measured table sampled at every decile
//! (0, 10, …, 100) with linear interpolation in between.
//!
//! ```text
//! bucket = floor(u / 10)        α = u / 10 − bucket
//! power  = α · table[bucket + 1] + (1 − α) · table[bucket]
//! ```
//!
//! At exact multiples of 10 (including u = 100) the sample is returned as is.

use std::fmt::Debug;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SimulationError};

/// Number of samples in a decile table (0%, 10%, …, 100%)
pub const DECILE_SAMPLES: usize = 11;

/// Pluggable power model
pub trait PowerModel: Debug + Send + Sync {
    /// Watts drawn at a hypothetical utilization percentage.
    ///
    /// Must not depend on any host state, so callers can use it for
    /// what-if evaluation.
    fn power_from_utilization(&self, utilization: f64) -> f64;

    /// Model name for reports
    fn name(&self) -> &str;
}

/// Decile-sampled power table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawPowerCurve")]
pub struct PowerCurve {
    name: String,
    samples: [f64; DECILE_SAMPLES],
}

/// Wire shape of a curve, checked by [`PowerCurve::new`] on the way in
#[derive(Deserialize)]
struct RawPowerCurve {
    #[serde(default = "default_curve_name")]
    name: String,
    samples: [f64; DECILE_SAMPLES],
}

fn default_curve_name() -> String {
    "custom".to_string()
}

impl TryFrom<RawPowerCurve> for PowerCurve {
    type Error = SimulationError;

    fn try_from(raw: RawPowerCurve) -> Result<Self> {
        PowerCurve::new(raw.name, raw.samples)
    }
}

impl PowerCurve {
    /// Build a curve from eleven decile samples (watts)
    pub fn new(name: impl Into<String>, samples: [f64; DECILE_SAMPLES]) -> Result<Self> {
        if let Some(bad) = samples.iter().find(|w| !w.is_finite() || **w < 0.0) {
            return Err(SimulationError::spec(format!(
                "power samples must be finite and non-negative, got {bad}"
            )));
        }
        Ok(PowerCurve {
            name: name.into(),
            samples,
        })
    }

    /// Build a curve from a slice, checking the sample count
    pub fn from_samples(name: impl Into<String>, samples: &[f64]) -> Result<Self> {
        let table: [f64; DECILE_SAMPLES] = samples.try_into().map_err(|_| {
            SimulationError::spec(format!(
                "power curve needs {DECILE_SAMPLES} decile samples, got {}",
                samples.len()
            ))
        })?;
        Self::new(name, table)
    }

    /// Straight line from idle to peak watts
    pub fn linear(idle: f64, peak: f64) -> Result<Self> {
        let mut samples = [0.0; DECILE_SAMPLES];
        for (i, s) in samples.iter_mut().enumerate() {
            *s = idle + (peak - idle) * i as f64 / 10.0;
        }
        Self::new("linear", samples)
    }

    /// NVIDIA Jetson Xavier NX: 5 W idle to 15 W at full load
    pub fn jetson_xavier_nx() -> Self {
        PowerCurve {
            name: "jetson-xavier-nx".to_string(),
            samples: [5.0, 6.0, 7.0, 8.0, 9.0, 10.0, 11.0, 12.0, 13.0, 14.0, 15.0],
        }
    }

    pub fn samples(&self) -> &[f64; DECILE_SAMPLES] {
        &self.samples
    }
}

impl PowerModel for PowerCurve {
    fn power_from_utilization(&self, utilization: f64) -> f64 {
        // NaN clamps to idle
        let u = if utilization.is_nan() {
            0.0
        } else {
            utilization.clamp(0.0, 100.0)
        };

        let scaled = u / 10.0;
        let bucket = scaled.floor() as usize;
        if bucket >= DECILE_SAMPLES - 1 {
            return self.samples[DECILE_SAMPLES - 1];
        }

        let alpha = scaled - bucket as f64;
        if alpha == 0.0 {
            return self.samples[bucket];
        }
        alpha * self.samples[bucket + 1] + (1.0 - alpha) * self.samples[bucket]
    }

    fn name(&self) -> &str {
        &self.name
    }
}

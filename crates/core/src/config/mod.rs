use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{audio::CurveShape, Result};

/// Top-level configuration structure for the application.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub engine: EngineConfig,
    pub driver: DriverConfig,
    /// Forces informational logs on or off. `None` follows the build mode.
    pub verbose_logging: Option<bool>,
}

impl AppConfig {
    /// Reads a JSON configuration file. Missing fields fall back to defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}

/// Configuration for the audio timeline engine and its effects chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Smallest absolute playback speed.
    pub min_speed: f64,
    /// Largest absolute playback speed.
    pub max_speed: f64,
    /// Cutoff at which the low-pass filter is considered fully open.
    pub open_cutoff_hz: f32,
    /// Floor for the speed-dependent cutoff applied while scrubbing fast.
    pub min_scrub_cutoff_hz: f32,
    pub distortion_curve: CurveShape,
    /// Number of points in the tabulated waveshaper curve.
    pub curve_samples: usize,
    pub output_sample_rate: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_speed: 0.1,
            max_speed: 30.0,
            open_cutoff_hz: 20_000.0,
            min_scrub_cutoff_hz: 800.0,
            distortion_curve: CurveShape::Rational,
            curve_samples: 44_100,
            output_sample_rate: 48_000,
        }
    }
}

impl EngineConfig {
    /// Clamps the magnitude of `speed` into `[min_speed, max_speed]`,
    /// keeping its sign. Zero (of either sign) stays zero so callers can
    /// hold still without picking a direction.
    pub fn clamp_speed(&self, speed: f64) -> f64 {
        if speed == 0.0 {
            return 0.0;
        }
        let magnitude = speed.abs().clamp(self.min_speed, self.max_speed);
        if speed < 0.0 {
            -magnitude
        } else {
            magnitude
        }
    }
}

/// Configuration for the gesture/animation driver that feeds the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Drift (seconds) above which audio is re-anchored to the animation.
    pub drift_threshold: f64,
    /// Seconds between drift checks.
    pub drift_interval: f64,
    /// Length of the return-to-normal-speed ramp, in seconds.
    pub ramp_duration: f64,
    /// Volume the ramp starts from when speed returns to normal.
    pub ramp_volume_floor: f32,
    /// Quiet period after the last wheel tick before the ramp starts.
    pub wheel_debounce: f64,
    /// Pixels of vertical drag per unit of speed.
    pub drag_ratio: f64,
    /// Wheel delta per unit of speed.
    pub wheel_ratio: f64,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            drift_threshold: 0.2,
            drift_interval: 1.0,
            ramp_duration: 0.6,
            ramp_volume_floor: 0.3,
            wheel_debounce: 0.15,
            drag_ratio: 1.0,
            wheel_ratio: 5.0,
        }
    }
}

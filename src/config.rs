//! Machine settings
//!
//! Describes the controller the dialect is generated for. Loaded from a JSON
//! file; every field is optional and falls back to the defaults below.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::scene::Bounds;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineSettings {
    pub name: String,
    /// Work area, mm
    pub width: f64,
    pub height: f64,
    /// Maximum travel speed, mm/min
    pub max_speed: f64,
    /// Device power units for 100%
    pub max_power: f64,
    pub baud: u32,
}

impl Default for MachineSettings {
    fn default() -> Self {
        Self {
            name: "My Laser".to_string(),
            width: 300.0,
            height: 200.0,
            max_speed: 6000.0,
            max_power: 1000.0,
            baud: 115200,
        }
    }
}

impl MachineSettings {
    pub fn from_json(json: &str) -> Result<Self> {
        let settings: MachineSettings = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.max_speed > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "max_speed must be positive, got {}",
                self.max_speed
            )));
        }
        if !(self.max_power > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "max_power must be positive, got {}",
                self.max_power
            )));
        }
        Ok(())
    }

    /// Rapid traverse speed in mm/s
    pub fn rapid_speed(&self) -> f64 {
        self.max_speed / 60.0
    }

    /// Convert a power percentage to device units
    pub fn device_power(&self, percent: f64) -> i64 {
        (percent * self.max_power / 100.0).round() as i64
    }

    /// Whether `bounds` lies on the bed, which spans (0, 0) to (width, height)
    pub fn bed_contains(&self, bounds: &Bounds) -> bool {
        const SLACK: f64 = 1e-6;
        bounds.min_x >= -SLACK
            && bounds.min_y >= -SLACK
            && bounds.max_x <= self.width + SLACK
            && bounds.max_y <= self.height + SLACK
    }
}

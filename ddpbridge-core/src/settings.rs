//! Runtime tweening settings shared between the dashboard and dispatch

use crate::error::SettingsError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::ops::RangeInclusive;
use std::sync::RwLock;
use std::time::Duration;

/// Accepted range for `tweening_steps`
pub const TWEENING_STEPS_RANGE: RangeInclusive<u8> = 1..=20;

/// Accepted range for `target_fps`
pub const TARGET_FPS_RANGE: RangeInclusive<u16> = 10..=120;

/// Tweening configuration read once per dispatch cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeSettings {
    /// Insert interpolated frames between keyframes
    pub tweening_enabled: bool,

    /// Interpolation intervals per keyframe (1..=20)
    pub tweening_steps: u8,

    /// Output pacing while tweening (10..=120)
    pub target_fps: u16,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            tweening_enabled: false,
            tweening_steps: 4,
            target_fps: 60,
        }
    }
}

impl BridgeSettings {
    /// Copy with both numeric fields clamped into range
    pub fn clamped(self) -> Self {
        Self {
            tweening_enabled: self.tweening_enabled,
            tweening_steps: clamp_steps(i64::from(self.tweening_steps)),
            target_fps: clamp_fps(i64::from(self.target_fps)),
        }
    }

    /// Delay between consecutive interpolated frames
    pub fn frame_interval(&self) -> Duration {
        Duration::from_nanos(1_000_000_000 / u64::from(self.target_fps.max(1)))
    }

    /// Worst-case latency one keyframe adds while tweening
    pub fn max_added_latency(&self) -> Duration {
        self.frame_interval() * u32::from(self.tweening_steps)
    }
}

fn clamp_steps(value: i64) -> u8 {
    value.clamp(
        i64::from(*TWEENING_STEPS_RANGE.start()),
        i64::from(*TWEENING_STEPS_RANGE.end()),
    ) as u8
}

fn clamp_fps(value: i64) -> u16 {
    value.clamp(
        i64::from(*TARGET_FPS_RANGE.start()),
        i64::from(*TARGET_FPS_RANGE.end()),
    ) as u16
}

/// Partial settings update; absent fields keep their current value
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SettingsUpdate {
    /// New tweening switch
    pub tweening_enabled: Option<bool>,

    /// New step count, clamped on apply
    pub tweening_steps: Option<i64>,

    /// New target FPS, clamped on apply
    pub target_fps: Option<i64>,
}

impl SettingsUpdate {
    /// Parse a partial JSON object such as `{"target_fps": 30}`
    ///
    /// Unknown keys are ignored. Numbers with a fractional part are
    /// truncated. Any recognised field holding a value of the wrong type
    /// rejects the whole update.
    pub fn from_json(body: &str) -> Result<Self, SettingsError> {
        let value: Value = serde_json::from_str(body)?;
        let object = value.as_object().ok_or(SettingsError::NotAnObject)?;

        let tweening_enabled = match object.get("tweening_enabled") {
            None => None,
            Some(Value::Bool(b)) => Some(*b),
            Some(Value::Number(n)) => Some(n.as_f64().is_some_and(|v| v != 0.0)),
            Some(_) => {
                return Err(SettingsError::InvalidField {
                    field: "tweening_enabled",
                    expected: "boolean",
                })
            }
        };

        Ok(Self {
            tweening_enabled,
            tweening_steps: integer_field(object.get("tweening_steps"), "tweening_steps")?,
            target_fps: integer_field(object.get("target_fps"), "target_fps")?,
        })
    }

    /// Apply onto `settings`, clamping numeric fields
    pub fn apply_to(&self, settings: &mut BridgeSettings) {
        if let Some(enabled) = self.tweening_enabled {
            settings.tweening_enabled = enabled;
        }
        if let Some(steps) = self.tweening_steps {
            settings.tweening_steps = clamp_steps(steps);
        }
        if let Some(fps) = self.target_fps {
            settings.target_fps = clamp_fps(fps);
        }
    }

    /// Check if the update changes nothing
    pub fn is_empty(&self) -> bool {
        self.tweening_enabled.is_none()
            && self.tweening_steps.is_none()
            && self.target_fps.is_none()
    }
}

fn integer_field(value: Option<&Value>, field: &'static str) -> Result<Option<i64>, SettingsError> {
    let invalid = SettingsError::InvalidField {
        field,
        expected: "number",
    };
    match value {
        None => Ok(None),
        Some(Value::Number(n)) => {
            if let Some(v) = n.as_i64() {
                Ok(Some(v))
            } else if let Some(v) = n.as_f64().filter(|v| v.is_finite()) {
                Ok(Some(v.trunc() as i64))
            } else {
                Err(invalid)
            }
        }
        Some(_) => Err(invalid),
    }
}

/// Settings behind a lock: single writer (dashboard), many readers (dispatch)
#[derive(Debug, Default)]
pub struct SharedSettings {
    inner: RwLock<BridgeSettings>,
}

impl SharedSettings {
    /// Start from `initial`, clamped
    pub fn new(initial: BridgeSettings) -> Self {
        Self {
            inner: RwLock::new(initial.clamped()),
        }
    }

    /// Copy of the current settings
    pub fn snapshot(&self) -> BridgeSettings {
        *self
            .inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Apply a partial update and return the resulting settings
    pub fn update(&self, update: &SettingsUpdate) -> BridgeSettings {
        let mut settings = self
            .inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        update.apply_to(&mut settings);
        *settings
    }

    /// Parse and apply a JSON body; on error the settings are unchanged
    pub fn apply_json(&self, body: &str) -> Result<BridgeSettings, SettingsError> {
        let update = SettingsUpdate::from_json(body)?;
        Ok(self.update(&update))
    }

    /// Current settings as the JSON object the dashboard reads
    pub fn to_json(&self) -> String {
        // A struct of plain scalars always serializes
        serde_json::to_string(&self.snapshot()).unwrap_or_default()
    }
}

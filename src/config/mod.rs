// src/config/mod.rs - persisted configuration for the motion core
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::constants::{AXES, JERK_INPUT_MAX, JERK_INPUT_MIN, JUNCTION_INTEGRATION_MAX, JUNCTION_INTEGRATION_MIN};
use crate::error::{CoreError, StatusCode};

/// Per-axis mode, matching `cmAxisMode` (`original_source/g2core/gcode.h`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AxisMode {
    Disabled,
    #[default]
    Standard,
    Inhibited,
    Radius,
}

/// Static, config-time constraints for one axis (spec.md §3 "Axis config").
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AxisConfig {
    #[serde(default)]
    pub mode: AxisMode,
    #[serde(default = "default_velocity_max")]
    pub velocity_max: f64,
    #[serde(default = "default_feedrate_max")]
    pub feedrate_max: f64,
    /// Stored already divided by `JERK_MULTIPLIER`, matching the source.
    #[serde(default = "default_jerk_max")]
    pub jerk_max: f64,
    #[serde(default = "default_jerk_max")]
    pub jerk_high_speed: f64,
    #[serde(default = "default_travel_min")]
    pub travel_min: f64,
    #[serde(default = "default_travel_max")]
    pub travel_max: f64,
    #[serde(default = "default_radius")]
    pub radius: f64,
}

impl Default for AxisConfig {
    fn default() -> Self {
        Self {
            mode: AxisMode::Standard,
            velocity_max: default_velocity_max(),
            feedrate_max: default_feedrate_max(),
            jerk_max: default_jerk_max(),
            jerk_high_speed: default_jerk_max(),
            travel_min: default_travel_min(),
            travel_max: default_travel_max(),
            radius: default_radius(),
        }
    }
}

impl AxisConfig {
    /// Real jerk in mm/min^3, the stored value times `JERK_MULTIPLIER`.
    pub fn jerk_max_real(&self) -> f64 {
        self.jerk_max * crate::constants::JERK_MULTIPLIER
    }

    pub fn reciprocal_velocity(&self) -> f64 {
        if self.velocity_max > 0.0 { 1.0 / self.velocity_max } else { 0.0 }
    }

    pub fn reciprocal_feedrate(&self) -> f64 {
        if self.feedrate_max > 0.0 { 1.0 / self.feedrate_max } else { 0.0 }
    }

    /// Maximum junction acceleration a_j = jerk_max * T_JT (spec.md §4.3).
    pub fn max_junction_accel(&self, junction_integration_time: f64) -> f64 {
        self.jerk_max_real() * junction_integration_time
    }

    pub fn validate(&self, axis_index: usize) -> Result<(), CoreError> {
        let jerk_real = self.jerk_max_real();
        if !(crate::constants::JERK_INPUT_MIN..=crate::constants::JERK_INPUT_MAX).contains(&jerk_real) {
            return Err(CoreError::JerkOutOfRange {
                status: StatusCode::JerkOutOfRange,
                min: JERK_INPUT_MIN,
                max: JERK_INPUT_MAX,
                value: jerk_real,
            });
        }
        if self.travel_min >= self.travel_max {
            return Err(CoreError::CommandArgOutOfRange(
                StatusCode::CommandArgOutOfRange,
                format!("axis {axis_index}: travel_min >= travel_max"),
            ));
        }
        Ok(())
    }
}

fn default_velocity_max() -> f64 { 18000.0 }
fn default_feedrate_max() -> f64 { 18000.0 }
fn default_jerk_max() -> f64 { 10_000.0 }
fn default_travel_min() -> f64 { 0.0 }
fn default_travel_max() -> f64 { 200.0 }
fn default_radius() -> f64 { 1.0 }

/// Per-motor static wiring (spec.md §3 "Motor config").
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MotorConfig {
    /// Index into the axis array this motor drives.
    #[serde(default)]
    pub axis: usize,
    #[serde(default = "default_step_angle")]
    pub step_angle: f64,
    #[serde(default = "default_travel_per_rev")]
    pub travel_per_rev: f64,
    #[serde(default = "default_microsteps")]
    pub microsteps: u32,
    #[serde(default)]
    pub polarity: bool,
    #[serde(default)]
    pub step_polarity: bool,
    #[serde(default)]
    pub enable_polarity: bool,
    #[serde(default)]
    pub power_mode: PowerMode,
    #[serde(default = "default_power_level")]
    pub power_level: f64,
    #[serde(default)]
    pub idle_power: f64,
}

impl Default for MotorConfig {
    fn default() -> Self {
        Self {
            axis: 0,
            step_angle: default_step_angle(),
            travel_per_rev: default_travel_per_rev(),
            microsteps: default_microsteps(),
            polarity: false,
            step_polarity: false,
            enable_polarity: false,
            power_mode: PowerMode::default(),
            power_level: default_power_level(),
            idle_power: 0.0,
        }
    }
}

impl MotorConfig {
    pub fn steps_per_unit(&self) -> f64 {
        let full_steps = 360.0 / self.step_angle;
        (full_steps * self.microsteps as f64) / self.travel_per_rev
    }
}

fn default_step_angle() -> f64 { 1.8 }
fn default_travel_per_rev() -> f64 { 40.0 }
fn default_microsteps() -> u32 { 16 }
fn default_power_level() -> f64 { 1.0 }

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PowerMode {
    AlwaysOn,
    #[default]
    OnInCycle,
    OnWhenMoving,
    Disabled,
}

/// System-wide persisted settings (spec.md §6 "Persisted configuration").
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SystemConfig {
    #[serde(default = "default_jt")]
    pub junction_integration_time: f64,
    #[serde(default = "default_chordal_tolerance")]
    pub chordal_tolerance: f64,
    #[serde(default)]
    pub feedhold_z_lift: f64,
    #[serde(default = "default_true")]
    pub soft_limits_enabled: bool,
    #[serde(default)]
    pub hard_limits_enabled: bool,
    #[serde(default)]
    pub interlock_enabled: bool,
    #[serde(default = "default_motor_power_timeout")]
    pub motor_power_timeout_s: f64,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            junction_integration_time: default_jt(),
            chordal_tolerance: default_chordal_tolerance(),
            feedhold_z_lift: 0.0,
            soft_limits_enabled: true,
            hard_limits_enabled: false,
            interlock_enabled: false,
            motor_power_timeout_s: default_motor_power_timeout(),
        }
    }
}

impl SystemConfig {
    pub fn validate(&self) -> Result<(), CoreError> {
        if !(JUNCTION_INTEGRATION_MIN..=JUNCTION_INTEGRATION_MAX).contains(&self.junction_integration_time) {
            return Err(CoreError::CommandArgOutOfRange(
                StatusCode::CommandArgOutOfRange,
                format!(
                    "junction_integration_time {} outside [{}, {}]",
                    self.junction_integration_time, JUNCTION_INTEGRATION_MIN, JUNCTION_INTEGRATION_MAX
                ),
            ));
        }
        if self.chordal_tolerance <= 0.0 {
            return Err(CoreError::CommandArgOutOfRange(
                StatusCode::CommandArgOutOfRange,
                "chordal_tolerance must be positive".into(),
            ));
        }
        Ok(())
    }
}

fn default_jt() -> f64 { 1.2 }
fn default_chordal_tolerance() -> f64 { 0.01 }
fn default_motor_power_timeout() -> f64 { 2.0 }
fn default_true() -> bool { true }

/// MCU serial link configuration (the out-of-scope transport's config, kept
/// only to the extent `HardwareManager` needs it to open a port).
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct McuConfig {
    #[serde(default)]
    pub serial: String,
    #[serde(default = "default_baud")]
    pub baud: u32,
}

fn default_baud() -> u32 { 250_000 }

/// Top-level configuration, loaded from TOML at startup.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub system: SystemConfig,
    #[serde(default)]
    pub mcu: McuConfig,
    #[serde(default = "default_axes")]
    pub axes: Vec<AxisConfig>,
    #[serde(default)]
    pub motors: HashMap<String, MotorConfig>,
}

fn default_axes() -> Vec<AxisConfig> {
    (0..AXES).map(|_| AxisConfig::default()).collect()
}

impl Default for Config {
    fn default() -> Self {
        let mut motors = HashMap::new();
        for (i, name) in ["x", "y", "z", "a", "b", "c"].iter().enumerate() {
            motors.insert(name.to_string(), MotorConfig { axis: i, ..MotorConfig::default() });
        }
        Self {
            system: SystemConfig::default(),
            mcu: McuConfig::default(),
            axes: default_axes(),
            motors,
        }
    }
}

impl Config {
    pub fn load_from_str(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    pub fn load_config(path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate().map_err(|e| Box::new(e) as Box<dyn std::error::Error>)?;
        tracing::info!("Loaded configuration from {}", path);
        Ok(config)
    }

    pub fn save_config(&self, path: &str) -> Result<(), Box<dyn std::error::Error>> {
        let toml_string = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_string)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        self.system.validate()?;
        if self.axes.len() != AXES {
            return Err(CoreError::CommandArgOutOfRange(
                StatusCode::CommandArgOutOfRange,
                format!("expected {} axis configs, got {}", AXES, self.axes.len()),
            ));
        }
        for (i, axis) in self.axes.iter().enumerate() {
            axis.validate(i)?;
        }
        for (name, motor) in &self.motors {
            if motor.axis >= AXES {
                return Err(CoreError::CommandArgOutOfRange(
                    StatusCode::CommandArgOutOfRange,
                    format!("motor {name}: axis index {} out of range", motor.axis),
                ));
            }
        }
        Ok(())
    }

    pub fn steps_per_unit(&self, axis_index: usize) -> f64 {
        self.motors
            .values()
            .find(|m| m.axis == axis_index)
            .map(|m| m.steps_per_unit())
            .unwrap_or(80.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_validates() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.axes.len(), AXES);
    }

    #[test]
    fn test_parse_toml_config() {
        let toml_config = r#"
[system]
junction_integration_time = 1.2
chordal_tolerance = 0.01

[mcu]
serial = "/dev/ttyACM0"
baud = 250000

[[axes]]
velocity_max = 18000
jerk_max = 10000
travel_min = 0
travel_max = 300

[[axes]]
velocity_max = 18000
jerk_max = 10000
travel_min = 0
travel_max = 300

[[axes]]
velocity_max = 1200
jerk_max = 500
travel_min = 0
travel_max = 100

[[axes]]
velocity_max = 18000
jerk_max = 10000

[[axes]]
velocity_max = 18000
jerk_max = 10000

[[axes]]
velocity_max = 18000
jerk_max = 10000

[motors.x]
axis = 0
travel_per_rev = 40.0
microsteps = 16
        "#;

        let config = Config::load_from_str(toml_config).unwrap();
        assert_eq!(config.mcu.serial, "/dev/ttyACM0");
        assert_eq!(config.axes.len(), 6);
        assert_eq!(config.axes[2].travel_max, 100.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_jerk_out_of_range_rejected() {
        let mut axis = AxisConfig::default();
        axis.jerk_max = 0.0001; // real jerk far below JERK_INPUT_MIN
        assert!(axis.validate(0).is_err());
    }

    #[test]
    fn test_junction_integration_time_bounds() {
        let mut sys = SystemConfig::default();
        sys.junction_integration_time = 10.0; // above JUNCTION_INTEGRATION_MAX
        assert!(sys.validate().is_err());
        sys.junction_integration_time = 1.2;
        assert!(sys.validate().is_ok());
    }

    #[test]
    fn test_steps_per_unit_calculation() {
        let config = Config::default();
        // 200 full steps/rev * 16 microsteps / 40mm travel per rev = 80 steps/mm
        assert_eq!(config.steps_per_unit(0), 80.0);
    }
}

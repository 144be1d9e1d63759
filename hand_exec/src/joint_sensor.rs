//! # Joint Sensor
//!
//! Calibration of a joint's raw absolute position sensor. The raw reading is
//! an integer count of a 12 bit encoder, calibrated as
//!
//! `calibrated = direction * (raw - zero_value)`
//!
//! in sensor counts, and converted to degrees or radians on request.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::convert::TryFrom;
use std::f64::consts::PI;

use crate::direction::Direction;
use crate::hand_ctrl::JointParams;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Number of sensor counts in a full revolution of a joint.
pub const COUNTS_PER_REV: f64 = 4096.0;

/// Angle of one sensor count.
///
/// Units: degrees
pub const DEG_PER_COUNT: f64 = 360.0 / COUNTS_PER_REV;

/// Angle of one sensor count.
///
/// Units: radians
pub const RAD_PER_COUNT: f64 = 2.0 * PI / COUNTS_PER_REV;

// ------------------------------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Convert an angle in sensor counts into the given unit.
pub fn native_to(unit: AngleUnit, counts: f64) -> f64 {
    match unit {
        AngleUnit::Native => counts,
        AngleUnit::Deg => counts * DEG_PER_COUNT,
        AngleUnit::Rad => counts * RAD_PER_COUNT,
    }
}

/// Convert an angle in degrees into sensor counts.
pub fn deg_to_native(angle_deg: f64) -> f64 {
    angle_deg / DEG_PER_COUNT
}

/// Convert an angle in radians into sensor counts.
pub fn rad_to_native(angle_rad: f64) -> f64 {
    angle_rad / RAD_PER_COUNT
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Calibration of a single joint's position sensor, along with its most recent
/// reading.
///
/// The default sensor is not valid, and can't provide calibrated values.
#[derive(Debug, Clone, Default)]
pub struct JointSensor {
    joint: usize,

    zero_value: i32,
    direction: Direction,

    /// Units: sensor counts
    range_min: f64,

    /// Units: sensor counts
    range_max: f64,

    valid: bool,

    /// Most recent raw reading.
    raw: Option<i32>,

    /// Calibrated value of the most recent raw reading.
    ///
    /// Units: sensor counts
    calibrated: f64,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Unit in which a calibrated value is requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AngleUnit {
    /// Sensor counts
    Native,
    Deg,
    Rad,
}

/// Errors associated with a joint sensor.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SensorError {
    #[error("Joint {joint} is missing the calibration parameter {param}")]
    MissingCalibrationParameter { joint: usize, param: &'static str },

    #[error("Joint {joint} has an invalid {param} of {value}, expected 1 or -1")]
    InvalidDirection {
        joint: usize,
        param: &'static str,
        value: i64,
    },

    #[error("Joint {joint} has a sensor range minimum {min} above its maximum {max}")]
    InvalidRange { joint: usize, min: f64, max: f64 },

    #[error("The sensor of joint {0} is not calibrated")]
    NotCalibrated(usize),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl JointSensor {
    /// Build the sensor of the given joint from its parameters.
    ///
    /// Fails if any of the zero value, direction or range is absent or invalid.
    pub fn new(joint: usize, params: &JointParams) -> Result<Self, SensorError> {
        let missing = |param| SensorError::MissingCalibrationParameter { joint, param };

        let zero_value = params
            .sensor_zero_value
            .ok_or_else(|| missing("sensor_zero_value"))?;
        let raw_direction = params
            .sensor_direction
            .ok_or_else(|| missing("sensor_direction"))?;
        let range_min = params
            .sensor_range_min
            .ok_or_else(|| missing("sensor_range_min"))?;
        let range_max = params
            .sensor_range_max
            .ok_or_else(|| missing("sensor_range_max"))?;

        let direction =
            Direction::try_from(raw_direction).map_err(|e| SensorError::InvalidDirection {
                joint,
                param: "sensor_direction",
                value: e.0,
            })?;

        if range_min > range_max {
            return Err(SensorError::InvalidRange {
                joint,
                min: range_min,
                max: range_max,
            });
        }

        Ok(Self {
            joint,
            zero_value,
            direction,
            range_min,
            range_max,
            valid: true,
            raw: None,
            calibrated: 0.0,
        })
    }

    /// Store a new raw reading and recompute the calibrated value from it.
    pub fn update(&mut self, raw: i32) {
        self.raw = Some(raw);
        self.calibrated = self.direction.as_f64() * (raw as f64 - self.zero_value as f64);
    }

    /// The calibrated value of the most recent reading in the given unit.
    ///
    /// Before the first reading the value is zero.
    pub fn calibrated_value(&self, unit: AngleUnit) -> Result<f64, SensorError> {
        if !self.valid {
            return Err(SensorError::NotCalibrated(self.joint));
        }

        Ok(native_to(unit, self.calibrated))
    }

    /// Whether the most recent calibrated value lies within the sensor's range.
    pub fn in_range(&self) -> bool {
        self.calibrated >= self.range_min && self.calibrated <= self.range_max
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn raw(&self) -> Option<i32> {
        self.raw
    }

    pub fn joint(&self) -> usize {
        self.joint
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    fn params(zero: i32, dir: i64) -> JointParams {
        JointParams {
            sensor_zero_value: Some(zero),
            sensor_direction: Some(dir),
            sensor_range_min: Some(-1000.0),
            sensor_range_max: Some(1000.0),
            node_id: Some(1),
            motor_direction: Some(1),
        }
    }

    #[test]
    fn test_calibration() -> Result<(), SensorError> {
        let mut sensor = JointSensor::new(0, &params(100, 1))?;

        sensor.update(150);
        assert_eq!(sensor.calibrated_value(AngleUnit::Native)?, 50.0);
        assert!((sensor.calibrated_value(AngleUnit::Deg)? - 50.0 * 360.0 / 4096.0).abs() < 1e-9);
        assert!((sensor.calibrated_value(AngleUnit::Rad)? - 50.0 * RAD_PER_COUNT).abs() < 1e-12);
        assert!(sensor.in_range());

        // Always derived from the latest sample
        sensor.update(40);
        assert_eq!(sensor.calibrated_value(AngleUnit::Native)?, -60.0);
        assert_eq!(sensor.raw(), Some(40));

        let mut reversed = JointSensor::new(1, &params(100, -1))?;
        reversed.update(150);
        assert_eq!(reversed.calibrated_value(AngleUnit::Native)?, -50.0);

        reversed.update(5000);
        assert!(!reversed.in_range());

        Ok(())
    }

    #[test]
    fn test_unit_conversion_is_lossless() -> Result<(), SensorError> {
        for &dir in [1, -1].iter() {
            let mut sensor = JointSensor::new(0, &params(2048, dir))?;

            for raw in (-4096..=8192).step_by(7) {
                sensor.update(raw);
                let native = sensor.calibrated_value(AngleUnit::Native)?;

                let deg = sensor.calibrated_value(AngleUnit::Deg)?;
                assert!((deg_to_native(deg) - native).abs() < 1e-9);

                let rad = sensor.calibrated_value(AngleUnit::Rad)?;
                assert!((rad_to_native(rad) - native).abs() < 1e-9);
            }
        }

        assert_eq!(deg_to_native(360.0), COUNTS_PER_REV);
        assert!((rad_to_native(PI) - COUNTS_PER_REV / 2.0).abs() < 1e-9);

        Ok(())
    }

    #[test]
    fn test_default_sensor_not_calibrated() {
        let mut sensor = JointSensor::default();
        assert!(!sensor.is_valid());

        sensor.update(10);
        assert_eq!(
            sensor.calibrated_value(AngleUnit::Deg),
            Err(SensorError::NotCalibrated(0))
        );
    }

    #[test]
    fn test_construction_errors() {
        let mut p = params(0, 1);
        p.sensor_range_max = None;
        assert_eq!(
            JointSensor::new(3, &p).err(),
            Some(SensorError::MissingCalibrationParameter {
                joint: 3,
                param: "sensor_range_max"
            })
        );

        assert!(matches!(
            JointSensor::new(0, &params(0, 0)),
            Err(SensorError::InvalidDirection { value: 0, .. })
        ));

        let mut p = params(0, 1);
        p.sensor_range_min = Some(10.0);
        p.sensor_range_max = Some(-10.0);
        assert!(matches!(
            JointSensor::new(0, &p),
            Err(SensorError::InvalidRange { .. })
        ));
    }
}

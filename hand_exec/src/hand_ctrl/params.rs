//! Parameters structure for HandCtrl

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::Deserialize;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Velocity magnitude used for every move unless configured otherwise.
pub const DEFAULT_MOVING_VELOCITY: f64 = 300.0;

/// Default cap on the number of iterations of a convergence loop.
pub const DEFAULT_MAX_SEEK_ITERATIONS: u64 = 100_000;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Parameters for hand control.
#[derive(Debug, Clone, Deserialize)]
pub struct Params {
    // ---- JOINTS ----
    /// Number of joints in the hand.
    pub num_joints: usize,

    /// Number of joints, counted from the first, which are moved together by
    /// a whole hand move.
    pub whole_hand_joints: usize,

    /// Per joint calibration and addressing.
    pub joints: Vec<JointParams>,

    // ---- MOTION ----
    /// Velocity magnitude commanded while moving towards a target.
    ///
    /// Units: device velocity units
    #[serde(default = "default_moving_velocity")]
    pub moving_velocity: f64,

    /// Peak current allowed in the motors.
    ///
    /// Units: device current units
    #[serde(default)]
    pub max_peak_current: f64,

    /// Distance from the target within which a joint has reached it.
    ///
    /// Units: radians
    #[serde(default = "default_target_tolerance_rad")]
    pub target_tolerance_rad: f64,

    // ---- CONVERGENCE ----
    /// Maximum number of iterations of a move's convergence loop.
    #[serde(default = "default_max_seek_iterations")]
    pub max_seek_iterations: u64,

    /// Maximum duration of a move's convergence loop, unbounded if absent.
    ///
    /// Units: seconds
    #[serde(default)]
    pub seek_timeout_s: Option<f64>,

    /// Pause between iterations of a convergence loop.
    ///
    /// Units: seconds
    #[serde(default)]
    pub seek_period_s: f64,

    // ---- DEVICE ----
    pub device: DeviceParams,
}

/// Connection parameters of the motor controller device.
///
/// All fields are required, they are optional here so that a missing field
/// can be reported by name.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeviceParams {
    pub device_name: Option<String>,
    pub protocol_stack_name: Option<String>,
    pub interface_name: Option<String>,
    pub port_name: Option<String>,

    /// Units: bits/second
    pub baud_rate: Option<u32>,
}

/// Calibration and addressing of a single joint.
///
/// All fields are required, they are optional here so that a missing field
/// can be reported by name.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JointParams {
    /// Raw sensor reading at zero joint angle.
    pub sensor_zero_value: Option<i32>,

    /// Sign applied to the offset raw reading, `1` or `-1`.
    pub sensor_direction: Option<i64>,

    /// Units: sensor counts
    pub sensor_range_min: Option<f64>,

    /// Units: sensor counts
    pub sensor_range_max: Option<f64>,

    /// Address of the joint's motor on the device bus.
    pub node_id: Option<u16>,

    /// Sign applied to motor commands, `1` or `-1`.
    pub motor_direction: Option<i64>,
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn default_moving_velocity() -> f64 {
    DEFAULT_MOVING_VELOCITY
}

fn default_target_tolerance_rad() -> f64 {
    crate::joint_sensor::RAD_PER_COUNT
}

fn default_max_seek_iterations() -> u64 {
    DEFAULT_MAX_SEEK_ITERATIONS
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_defaults_and_missing_fields() {
        let params: Params = match util::params::from_str(
            r#"
            num_joints = 1
            whole_hand_joints = 1

            [device]
            device_name = "EPOS2"

            [[joints]]
            sensor_zero_value = 100
            sensor_direction = -1
            "#,
        ) {
            Ok(p) => p,
            Err(e) => panic!("Could not parse params: {}", e),
        };

        assert_eq!(params.moving_velocity, DEFAULT_MOVING_VELOCITY);
        assert_eq!(params.max_seek_iterations, DEFAULT_MAX_SEEK_ITERATIONS);
        assert!(params.seek_timeout_s.is_none());
        assert!(params.target_tolerance_rad > 0.0);

        assert_eq!(params.device.device_name.as_deref(), Some("EPOS2"));
        assert!(params.device.baud_rate.is_none());

        assert_eq!(params.joints.len(), 1);
        assert_eq!(params.joints[0].sensor_direction, Some(-1));
        assert!(params.joints[0].node_id.is_none());
    }
}

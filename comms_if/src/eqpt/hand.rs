//! # Hand Equipment Interface
//!
//! Requests, responses and published data of the hand controller.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Calibrated joint-state snapshot, published once per raw sensor batch.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct JointState {
    /// Sequence number of the snapshot, incremented on each publication.
    pub seq: u64,

    /// Calibrated joint angles, ordered by joint index.
    ///
    /// Units: degrees
    pub positions_deg: Vec<f64>,

    /// Calibrated joint angles, ordered by joint index.
    ///
    /// Units: radians
    pub positions_rad: Vec<f64>,
}

/// Move a single joint to a target angle.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MoveFingerRequest {
    /// Index of the joint to move
    pub joint_index: usize,

    /// Target angle of the joint in degrees
    pub target_angle_deg: f64,
}

/// Result of a [`MoveFingerRequest`].
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MoveFingerResponse {
    /// Whether the target was reached
    pub reached: bool,

    /// Calibrated angle of the joint at the end of the move in degrees
    pub resulting_angle_deg: f64,
}

/// Move the jointly-actuated subset of the hand to a set of targets.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MoveHandRequest {
    /// Target angles in degrees, one per jointly-moved actuator
    pub targets: Vec<f64>,
}

/// Result of a [`MoveHandRequest`].
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MoveHandResponse {
    /// Whether all targets were reached
    pub reached: bool,

    /// Calibrated angles of the moved joints in degrees
    pub resulting_angles: Vec<f64>,
}

/// Set the operation mode of every motor in the hand.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct HandModeRequest {
    /// Raw mode, see [`HandMode`]
    pub mode: u8,
}

/// Result of a [`HandModeRequest`].
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct HandModeResponse {
    /// Result code, see [`HandModeResult`]
    pub result_code: i32,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Operation modes which can be applied to all motors of the hand.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandMode {
    /// Disable every motor (mode `0`)
    DisableAll,

    /// Enable every motor (mode `1`)
    EnableAll,
}

/// Outcome of applying a [`HandMode`].
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandModeResult {
    /// Controller not ready or unknown mode, nothing was done
    NotReady,

    /// The disable branch was executed
    AllDisabled,

    /// The enable branch was executed
    AllEnabled,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl HandMode {
    /// Decode a raw mode, returning `None` for unknown modes.
    pub fn from_raw(mode: u8) -> Option<Self> {
        match mode {
            0 => Some(HandMode::DisableAll),
            1 => Some(HandMode::EnableAll),
            _ => None,
        }
    }
}

impl HandModeResult {
    /// Result code sent in a [`HandModeResponse`].
    pub fn code(&self) -> i32 {
        match self {
            HandModeResult::NotReady => 0,
            HandModeResult::AllDisabled => 1,
            HandModeResult::AllEnabled => 2,
        }
    }
}

impl From<HandModeResult> for HandModeResponse {
    fn from(result: HandModeResult) -> Self {
        HandModeResponse {
            result_code: result.code(),
        }
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_hand_mode_codes() {
        assert_eq!(HandMode::from_raw(0), Some(HandMode::DisableAll));
        assert_eq!(HandMode::from_raw(1), Some(HandMode::EnableAll));
        assert_eq!(HandMode::from_raw(7), None);

        assert_eq!(HandModeResponse::from(HandModeResult::AllDisabled).result_code, 1);
        assert_eq!(HandModeResponse::from(HandModeResult::AllEnabled).result_code, 2);
        assert_eq!(HandModeResponse::from(HandModeResult::NotReady).result_code, 0);
    }

    #[test]
    fn test_request_json() -> Result<(), serde_json::Error> {
        let req: MoveFingerRequest =
            serde_json::from_str(r#"{"joint_index": 3, "target_angle_deg": -12.5}"#)?;
        assert_eq!(
            req,
            MoveFingerRequest {
                joint_index: 3,
                target_angle_deg: -12.5
            }
        );

        let req: MoveHandRequest = serde_json::from_str(r#"{"targets": [30.0, 45.0]}"#)?;
        assert_eq!(req.targets, vec![30.0, 45.0]);

        Ok(())
    }
}

//! # Hand Control Module
//!
//! Orchestrates the joints of the hand. Raw sensor batches are calibrated and
//! republished as joint state snapshots, and move and mode requests are served
//! by driving the target seeking policy of each joint until it converges.
//!
//! Convergence loops are bounded by an iteration cap, an optional deadline and
//! a [`CancelToken`]. When a [`SensorFeed`] is attached, a fresh batch is
//! pulled from it on every iteration of a loop.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod params;
mod seek;
mod state;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use comms_if::eqpt::hand::JointState;

use crate::device::DeviceOpenError;
use crate::joint_sensor::SensorError;
use crate::motor::MotorError;

pub use params::*;
pub use seek::*;
pub use state::*;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Cooperative cancellation signal for the convergence loops.
///
/// Clones share the same flag, so a token handed to another thread can stop a
/// move in progress.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Errors which can occur during [`HandCtrl`] initialisation.
#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("HandCtrl is already initialised")]
    AlreadyInitialised,

    #[error("Expected parameters for {expected} joints but found {found}")]
    InvalidJointCount { expected: usize, found: usize },

    #[error("Cannot move {whole_hand} joints together in a hand of {num_joints} joints")]
    InvalidWholeHandJoints { whole_hand: usize, num_joints: usize },

    #[error("The target tolerance must be a non-negative number of radians, found {0}")]
    InvalidTolerance(f64),

    #[error("The device is missing the parameter {0}")]
    MissingDeviceParameter(&'static str),

    #[error("Joint {joint} is missing the motor parameter {param}")]
    MissingMotorParameter { joint: usize, param: &'static str },

    #[error("Joint {joint} has an invalid motor_direction of {value}, expected 1 or -1")]
    InvalidMotorDirection { joint: usize, value: i64 },

    #[error("Invalid sensor calibration: {0}")]
    Calibration(#[from] SensorError),

    #[error("Could not open the device: {0}")]
    DeviceOpenFailed(#[from] DeviceOpenError),
}

/// Errors which can occur while serving [`HandCtrl`] requests.
#[derive(Debug, thiserror::Error)]
pub enum HandCtrlError {
    #[error("HandCtrl is not initialised")]
    NotInitialised,

    #[error("Joint index {index} is out of range for a hand of {num_joints} joints")]
    InvalidJointIndex { index: usize, num_joints: usize },

    #[error("Expected {expected} sensor values but received {found}")]
    SensorCountMismatch { expected: usize, found: usize },

    #[error("Expected {expected} targets but received {found}")]
    TargetCountMismatch { expected: usize, found: usize },

    #[error("Move did not converge after {iterations} iterations ({elapsed_s:.3} s)")]
    Timeout { iterations: u64, elapsed_s: f64 },

    #[error("Move cancelled after {iterations} iterations")]
    Cancelled { iterations: u64 },

    #[error("Unrecoverable motor failure: {0}")]
    Motor(#[from] MotorError),

    #[error("Sensor failure: {0}")]
    Sensor(#[from] SensorError),
}

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// A source of raw sensor batches, one value per joint.
pub trait SensorFeed {
    /// Get the next batch, or `None` if no new batch is available.
    fn next_batch(&mut self) -> Option<Vec<i32>>;
}

/// A receiver of the joint state snapshots published by [`HandCtrl`].
pub trait JointStateObserver {
    fn publish(&mut self, state: &JointState);
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request that the move in progress stops.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Clear a previous cancellation.
    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl HandCtrlError {
    /// Whether the error leaves the hand in an unknown state, requiring it to
    /// be made safe.
    pub fn is_fatal(&self) -> bool {
        match self {
            HandCtrlError::Timeout { .. }
            | HandCtrlError::Cancelled { .. }
            | HandCtrlError::Motor(_)
            | HandCtrlError::Sensor(_) => true,
            _ => false,
        }
    }
}

impl<F> JointStateObserver for F
where
    F: FnMut(&JointState),
{
    fn publish(&mut self, state: &JointState) {
        self(state)
    }
}

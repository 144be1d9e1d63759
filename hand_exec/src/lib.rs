//! # Hand Control Library
//!
//! Core of the hand control software: the motor controller device session,
//! joint sensor calibration, motor state and primitives, and the hand
//! controller which drives the joints to their targets.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Motor controller device abstraction and the simulated device.
pub mod device;

/// Direction signs.
pub mod direction;

/// Hand control module.
pub mod hand_ctrl;

/// Joint sensor calibration.
pub mod joint_sensor;

/// Joint motor state and primitives.
pub mod motor;

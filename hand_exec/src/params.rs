//! # Hand Executable Parameters

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::Deserialize;

use hand_lib::{device::sim::SimParams, hand_ctrl};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct HandExecParams {
    /// Period of the main loop.
    ///
    /// Units: seconds
    pub cycle_period_s: f64,

    /// Hand control parameters
    pub hand: hand_ctrl::Params,

    /// Simulated device parameters
    pub sim: SimParams,
}

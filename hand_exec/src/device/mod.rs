//! # Device Module
//!
//! Abstraction over the motor controller device which drives the hand's
//! actuators. The vendor API is consumed through the [`MotorBus`] trait so
//! that a real driver or the simulated device in [`sim`] can sit behind the
//! controller without changing it.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Ownership of the opened device handle.
mod session;

/// Simulated hand device, used by the executable and the tests.
pub mod sim;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

pub use session::*;

// ------------------------------------------------------------------------------------------------
// TYPES
// ------------------------------------------------------------------------------------------------

/// Address of a single actuator on the device bus.
pub type NodeId = u16;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Opaque handle to an opened device, issued by [`MotorBus::open_device`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceHandle(u64);

/// Error reported by the device, carrying the vendor error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("device error code 0x{code:08X}")]
pub struct DeviceError {
    pub code: u32,
}

/// Communication settings of the device's protocol stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolStackSettings {
    /// Units: bits/second
    pub baud_rate: u32,

    /// Units: milliseconds
    pub timeout_ms: u32,
}

/// Everything needed to open a device and configure its protocol stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub device_name: String,
    pub protocol_stack_name: String,
    pub interface_name: String,
    pub port_name: String,
    pub baud_rate: u32,
}

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// Trait providing the motor controller device primitives.
///
/// Apart from opening, every call takes the handle of an opened device. Node
/// level calls also take the id of the actuator they address.
pub trait MotorBus {
    /// Open the device, returning a handle to it.
    fn open_device(
        &mut self,
        device_name: &str,
        protocol_stack_name: &str,
        interface_name: &str,
        port_name: &str,
    ) -> Result<DeviceHandle, DeviceError>;

    /// Release the device.
    fn close_device(&mut self, handle: DeviceHandle) -> Result<(), DeviceError>;

    fn get_protocol_stack_settings(
        &mut self,
        handle: DeviceHandle,
    ) -> Result<ProtocolStackSettings, DeviceError>;

    fn set_protocol_stack_settings(
        &mut self,
        handle: DeviceHandle,
        settings: ProtocolStackSettings,
    ) -> Result<(), DeviceError>;

    /// Returns `true` if the node is in the fault state.
    fn get_fault_state(&mut self, handle: DeviceHandle, node: NodeId) -> Result<bool, DeviceError>;

    fn clear_fault(&mut self, handle: DeviceHandle, node: NodeId) -> Result<(), DeviceError>;

    /// Returns `true` if the node is enabled.
    fn get_enable_state(&mut self, handle: DeviceHandle, node: NodeId) -> Result<bool, DeviceError>;

    /// Returns `true` if the node is disabled.
    fn get_disable_state(&mut self, handle: DeviceHandle, node: NodeId)
        -> Result<bool, DeviceError>;

    fn set_enable_state(&mut self, handle: DeviceHandle, node: NodeId) -> Result<(), DeviceError>;

    fn set_disable_state(&mut self, handle: DeviceHandle, node: NodeId) -> Result<(), DeviceError>;

    fn activate_profile_velocity_mode(
        &mut self,
        handle: DeviceHandle,
        node: NodeId,
    ) -> Result<(), DeviceError>;

    /// Command a velocity in the device's velocity units.
    fn move_with_velocity(
        &mut self,
        handle: DeviceHandle,
        node: NodeId,
        velocity: i32,
    ) -> Result<(), DeviceError>;

    fn halt_velocity_movement(
        &mut self,
        handle: DeviceHandle,
        node: NodeId,
    ) -> Result<(), DeviceError>;

    fn activate_current_mode(&mut self, handle: DeviceHandle, node: NodeId)
        -> Result<(), DeviceError>;

    /// Set the current demand in the device's fixed-point current units.
    fn set_current_must(
        &mut self,
        handle: DeviceHandle,
        node: NodeId,
        current: i16,
    ) -> Result<(), DeviceError>;

    /// Read the averaged current in the device's fixed-point current units.
    fn get_current_is_averaged(
        &mut self,
        handle: DeviceHandle,
        node: NodeId,
    ) -> Result<i16, DeviceError>;

    fn reset_device(&mut self, handle: DeviceHandle, node: NodeId) -> Result<(), DeviceError>;
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl DeviceHandle {
    /// Wrap a raw handle value issued by a driver.
    pub fn from_raw(raw: u64) -> Self {
        DeviceHandle(raw)
    }

    /// The raw handle value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl DeviceError {
    pub fn new(code: u32) -> Self {
        DeviceError { code }
    }
}

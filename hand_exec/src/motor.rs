//! # Joint Motor
//!
//! State of a single joint actuator and the motion primitives issued to it.
//!
//! The actuator is in one of the states of [`MotorStatus`]. The device is the
//! source of truth for the enable and fault states, so every state changing
//! operation reads them back from the device rather than trusting the cached
//! status.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{debug, trace, warn};
use serde::Serialize;

use crate::device::{DeviceError, DeviceHandle, DeviceSession, MotorBus, NodeId};
use crate::direction::Direction;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A joint's motor.
#[derive(Debug, Clone, Serialize)]
pub struct JointMotor {
    node_id: NodeId,

    direction: Direction,

    status: MotorStatus,

    /// Whether the motor is currently commanded to move.
    pub running: bool,

    /// Units: radians
    pub target_position: f64,

    /// Units: radians
    pub current_joint_position: f64,

    /// Last commanded velocity, meaningful only while moving.
    ///
    /// Units: device velocity units
    pub commanded_velocity: f64,

    /// Magnitude of the velocity used for every move.
    ///
    /// Units: device velocity units
    pub moving_velocity: f64,

    /// Units: device current units
    pub max_peak_current: f64,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Lifecycle state of a motor, as last observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MotorStatus {
    Disabled,
    Enabled,
    Moving,
    Fault,
}

/// Errors from motor operations, each carrying the motor's node id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum MotorError {
    #[error("Motor {0}: the device is not open")]
    DeviceClosed(NodeId),

    #[error("Motor {0}: could not read the fault state: {1}")]
    FaultStateReadFailed(NodeId, DeviceError),

    #[error("Motor {0}: could not clear the fault: {1}")]
    FaultClearFailed(NodeId, DeviceError),

    #[error("Motor {0}: could not read the enable state: {1}")]
    EnableStateReadFailed(NodeId, DeviceError),

    #[error("Motor {0}: could not read the disable state: {1}")]
    DisableStateReadFailed(NodeId, DeviceError),

    #[error("Motor {0}: could not enable: {1}")]
    EnableFailed(NodeId, DeviceError),

    #[error("Motor {0}: could not disable: {1}")]
    DisableFailed(NodeId, DeviceError),

    #[error("Motor {0}: could not activate velocity mode: {1}")]
    ModeActivationFailed(NodeId, DeviceError),

    #[error("Motor {0}: velocity command rejected: {1}")]
    VelocityCommandFailed(NodeId, DeviceError),

    #[error("Motor {0}: could not halt: {1}")]
    HaltFailed(NodeId, DeviceError),

    #[error("Motor {0}: could not reset: {1}")]
    ResetFailed(NodeId, DeviceError),

    #[error("Motor {0}: could not activate current mode: {1}")]
    CurrentModeFailed(NodeId, DeviceError),

    #[error("Motor {0}: current command rejected: {1}")]
    SetCurrentFailed(NodeId, DeviceError),

    #[error("Motor {0}: could not read the current: {1}")]
    GetCurrentFailed(NodeId, DeviceError),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl JointMotor {
    pub fn new(
        node_id: NodeId,
        direction: Direction,
        moving_velocity: f64,
        max_peak_current: f64,
    ) -> Self {
        Self {
            node_id,
            direction,
            status: MotorStatus::Disabled,
            running: false,
            target_position: 0.0,
            current_joint_position: 0.0,
            commanded_velocity: 0.0,
            moving_velocity,
            max_peak_current,
        }
    }

    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn status(&self) -> MotorStatus {
        self.status
    }

    /// Enable the motor, clearing any fault first.
    ///
    /// Does nothing on the device if the motor is already enabled.
    pub fn enable<B: MotorBus>(&mut self, dev: &mut DeviceSession<B>) -> Result<(), MotorError> {
        let handle = self.handle(dev)?;
        self.clear_fault_if_present(dev, handle)?;

        let node = self.node_id;
        let enabled = dev
            .bus_mut()
            .get_enable_state(handle, node)
            .map_err(|e| MotorError::EnableStateReadFailed(node, e))?;

        if !enabled {
            debug!("Enabling motor {}", node);
            dev.bus_mut()
                .set_enable_state(handle, node)
                .map_err(|e| MotorError::EnableFailed(node, e))?;
        }

        if self.status != MotorStatus::Moving {
            self.status = MotorStatus::Enabled;
        }

        Ok(())
    }

    /// Disable the motor, clearing any fault first.
    ///
    /// Does nothing on the device if the motor is already disabled.
    pub fn disable<B: MotorBus>(&mut self, dev: &mut DeviceSession<B>) -> Result<(), MotorError> {
        let handle = self.handle(dev)?;
        self.clear_fault_if_present(dev, handle)?;

        let node = self.node_id;
        let disabled = dev
            .bus_mut()
            .get_disable_state(handle, node)
            .map_err(|e| MotorError::DisableStateReadFailed(node, e))?;

        if !disabled {
            debug!("Disabling motor {}", node);
            dev.bus_mut()
                .set_disable_state(handle, node)
                .map_err(|e| MotorError::DisableFailed(node, e))?;
        }

        self.status = MotorStatus::Disabled;
        self.running = false;
        self.commanded_velocity = 0.0;

        Ok(())
    }

    pub fn activate_velocity_mode<B: MotorBus>(
        &mut self,
        dev: &mut DeviceSession<B>,
    ) -> Result<(), MotorError> {
        let handle = self.handle(dev)?;
        let node = self.node_id;

        dev.bus_mut()
            .activate_profile_velocity_mode(handle, node)
            .map_err(|e| MotorError::ModeActivationFailed(node, e))
    }

    /// Command a velocity, applying the motor's direction.
    pub fn move_with_velocity<B: MotorBus>(
        &mut self,
        dev: &mut DeviceSession<B>,
        velocity: f64,
    ) -> Result<(), MotorError> {
        let handle = self.handle(dev)?;
        let node = self.node_id;
        let hw_velocity = (velocity * self.direction.as_f64()) as i32;

        trace!("Motor {} velocity {} (hardware {})", node, velocity, hw_velocity);

        dev.bus_mut()
            .move_with_velocity(handle, node, hw_velocity)
            .map_err(|e| MotorError::VelocityCommandFailed(node, e))?;

        self.commanded_velocity = velocity;
        self.running = velocity != 0.0;
        self.status = if self.running {
            MotorStatus::Moving
        } else {
            MotorStatus::Enabled
        };

        Ok(())
    }

    pub fn halt_velocity_movement<B: MotorBus>(
        &mut self,
        dev: &mut DeviceSession<B>,
    ) -> Result<(), MotorError> {
        let handle = self.handle(dev)?;
        let node = self.node_id;

        dev.bus_mut()
            .halt_velocity_movement(handle, node)
            .map_err(|e| MotorError::HaltFailed(node, e))?;

        self.commanded_velocity = 0.0;
        self.running = false;
        if self.status == MotorStatus::Moving {
            self.status = MotorStatus::Enabled;
        }

        Ok(())
    }

    /// Reset the motor controller, which leaves the motor disabled.
    pub fn reset<B: MotorBus>(&mut self, dev: &mut DeviceSession<B>) -> Result<(), MotorError> {
        let handle = self.handle(dev)?;
        let node = self.node_id;

        dev.bus_mut()
            .reset_device(handle, node)
            .map_err(|e| MotorError::ResetFailed(node, e))?;

        self.status = MotorStatus::Disabled;
        self.running = false;
        self.commanded_velocity = 0.0;

        Ok(())
    }

    pub fn activate_current_mode<B: MotorBus>(
        &mut self,
        dev: &mut DeviceSession<B>,
    ) -> Result<(), MotorError> {
        let handle = self.handle(dev)?;
        let node = self.node_id;

        dev.bus_mut()
            .activate_current_mode(handle, node)
            .map_err(|e| MotorError::CurrentModeFailed(node, e))
    }

    /// Set the current demand, applying the motor's direction.
    ///
    /// Values outside the device's 16 bit range saturate.
    pub fn set_current<B: MotorBus>(
        &mut self,
        dev: &mut DeviceSession<B>,
        current: f64,
    ) -> Result<(), MotorError> {
        let handle = self.handle(dev)?;
        let node = self.node_id;

        dev.bus_mut()
            .set_current_must(handle, node, (current * self.direction.as_f64()) as i16)
            .map_err(|e| MotorError::SetCurrentFailed(node, e))
    }

    /// Read the averaged current, in the motor's direction.
    pub fn get_current<B: MotorBus>(
        &mut self,
        dev: &mut DeviceSession<B>,
    ) -> Result<f64, MotorError> {
        let handle = self.handle(dev)?;
        let node = self.node_id;

        let raw = dev
            .bus_mut()
            .get_current_is_averaged(handle, node)
            .map_err(|e| MotorError::GetCurrentFailed(node, e))?;

        Ok(raw as f64 * self.direction.as_f64())
    }

    fn handle<B: MotorBus>(&self, dev: &DeviceSession<B>) -> Result<DeviceHandle, MotorError> {
        dev.handle().ok_or(MotorError::DeviceClosed(self.node_id))
    }

    fn clear_fault_if_present<B: MotorBus>(
        &mut self,
        dev: &mut DeviceSession<B>,
        handle: DeviceHandle,
    ) -> Result<(), MotorError> {
        let node = self.node_id;

        let faulted = dev
            .bus_mut()
            .get_fault_state(handle, node)
            .map_err(|e| MotorError::FaultStateReadFailed(node, e))?;

        if faulted {
            warn!("Motor {} is in the fault state, clearing it", node);
            self.status = MotorStatus::Fault;
            self.running = false;
            self.commanded_velocity = 0.0;

            dev.bus_mut()
                .clear_fault(handle, node)
                .map_err(|e| MotorError::FaultClearFailed(node, e))?;

            self.status = MotorStatus::Disabled;
        }

        Ok(())
    }
}

impl MotorError {
    /// Whether the operation may be retried, as opposed to aborting the move.
    ///
    /// Failures on the enable and disable paths are recoverable, failures of
    /// motion and current primitives are not.
    pub fn is_recoverable(&self) -> bool {
        match self {
            MotorError::FaultStateReadFailed(..)
            | MotorError::FaultClearFailed(..)
            | MotorError::EnableStateReadFailed(..)
            | MotorError::DisableStateReadFailed(..)
            | MotorError::EnableFailed(..)
            | MotorError::DisableFailed(..) => true,
            _ => false,
        }
    }

    pub fn node_id(&self) -> NodeId {
        match *self {
            MotorError::DeviceClosed(n)
            | MotorError::FaultStateReadFailed(n, _)
            | MotorError::FaultClearFailed(n, _)
            | MotorError::EnableStateReadFailed(n, _)
            | MotorError::DisableStateReadFailed(n, _)
            | MotorError::EnableFailed(n, _)
            | MotorError::DisableFailed(n, _)
            | MotorError::ModeActivationFailed(n, _)
            | MotorError::VelocityCommandFailed(n, _)
            | MotorError::HaltFailed(n, _)
            | MotorError::ResetFailed(n, _)
            | MotorError::CurrentModeFailed(n, _)
            | MotorError::SetCurrentFailed(n, _)
            | MotorError::GetCurrentFailed(n, _) => n,
        }
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::device::sim::{SimBus, SimHand, SimOp};
    use crate::device::DeviceConfig;

    fn open_session(sim: &SimHand) -> DeviceSession<SimBus> {
        let mut dev = DeviceSession::new(sim.bus());
        let config = DeviceConfig {
            device_name: String::from("EPOS2"),
            protocol_stack_name: String::from("MAXON SERIAL V2"),
            interface_name: String::from("USB"),
            port_name: String::from("USB0"),
            baud_rate: 1_000_000,
        };
        if let Err(e) = dev.open(&config) {
            panic!("Could not open the simulated device: {}", e);
        }
        sim.clear_command_log();
        dev
    }

    fn ops(sim: &SimHand) -> Vec<SimOp> {
        sim.command_log().iter().map(|c| c.op).collect()
    }

    #[test]
    fn test_enable_disable_idempotent() -> Result<(), MotorError> {
        let sim = SimHand::with_joints(1);
        let mut dev = open_session(&sim);
        let mut motor = JointMotor::new(1, Direction::Forward, 300.0, 0.0);

        motor.enable(&mut dev)?;
        assert_eq!(motor.status(), MotorStatus::Enabled);
        assert!(sim.is_enabled(1));
        assert_eq!(
            ops(&sim),
            vec![
                SimOp::GetFaultState,
                SimOp::GetEnableState,
                SimOp::SetEnableState
            ]
        );

        // Already enabled, so no enable command is sent
        sim.clear_command_log();
        motor.enable(&mut dev)?;
        assert_eq!(ops(&sim), vec![SimOp::GetFaultState, SimOp::GetEnableState]);

        motor.disable(&mut dev)?;
        assert_eq!(motor.status(), MotorStatus::Disabled);
        assert!(!sim.is_enabled(1));

        sim.clear_command_log();
        motor.disable(&mut dev)?;
        assert_eq!(ops(&sim), vec![SimOp::GetFaultState, SimOp::GetDisableState]);

        Ok(())
    }

    #[test]
    fn test_disable_state_read_failure() {
        let sim = SimHand::with_joints(1);
        let mut dev = open_session(&sim);
        let mut motor = JointMotor::new(1, Direction::Forward, 300.0, 0.0);

        sim.inject_failure(Some(1), SimOp::GetDisableState);

        match motor.disable(&mut dev) {
            Err(e @ MotorError::DisableStateReadFailed(1, _)) => {
                assert!(e.is_recoverable());
                assert_eq!(e.node_id(), 1);
            }
            r => panic!("Expected a disable state read failure, got {:?}", r),
        }
        assert!(!ops(&sim).contains(&SimOp::SetDisableState));
    }

    #[test]
    fn test_enable_clears_fault() -> Result<(), MotorError> {
        let sim = SimHand::with_joints(1);
        let mut dev = open_session(&sim);
        let mut motor = JointMotor::new(1, Direction::Forward, 300.0, 0.0);

        sim.set_fault(1, true);
        motor.enable(&mut dev)?;

        assert!(!sim.is_faulted(1));
        assert!(sim.is_enabled(1));
        assert_eq!(motor.status(), MotorStatus::Enabled);
        assert_eq!(
            ops(&sim),
            vec![
                SimOp::GetFaultState,
                SimOp::ClearFault,
                SimOp::GetEnableState,
                SimOp::SetEnableState
            ]
        );

        // A failing clear is reported as recoverable
        sim.set_fault(1, true);
        sim.inject_failure(Some(1), SimOp::ClearFault);
        let err = motor.enable(&mut dev).err();
        assert!(matches!(err, Some(MotorError::FaultClearFailed(1, _))));
        assert!(err.map(|e| e.is_recoverable()).unwrap_or(false));
        assert_eq!(motor.status(), MotorStatus::Fault);

        Ok(())
    }

    #[test]
    fn test_velocity_direction() -> Result<(), MotorError> {
        let sim = SimHand::with_joints(2);
        let mut dev = open_session(&sim);
        let mut fwd = JointMotor::new(1, Direction::Forward, 300.0, 0.0);
        let mut rev = JointMotor::new(2, Direction::Reverse, 300.0, 0.0);

        for m in [&mut fwd, &mut rev].iter_mut() {
            m.enable(&mut dev)?;
            m.activate_velocity_mode(&mut dev)?;
            m.move_with_velocity(&mut dev, 300.0)?;
            assert!(m.running);
            assert_eq!(m.status(), MotorStatus::Moving);
        }

        assert_eq!(sim.velocity(1), 300);
        assert_eq!(sim.velocity(2), -300);

        rev.halt_velocity_movement(&mut dev)?;
        assert_eq!(sim.velocity(2), 0);
        assert!(!rev.running);
        assert_eq!(rev.commanded_velocity, 0.0);
        assert_eq!(rev.status(), MotorStatus::Enabled);

        Ok(())
    }

    #[test]
    fn test_current_direction() -> Result<(), MotorError> {
        let sim = SimHand::with_joints(1);
        let mut dev = open_session(&sim);
        let mut motor = JointMotor::new(1, Direction::Reverse, 300.0, 500.0);

        motor.activate_current_mode(&mut dev)?;
        motor.set_current(&mut dev, 120.0)?;

        let log = sim.command_log();
        assert_eq!(log[1].op, SimOp::SetCurrentMust);
        assert_eq!(log[1].value, Some(-120));

        assert_eq!(motor.get_current(&mut dev)?, 120.0);

        Ok(())
    }

    #[test]
    fn test_fatal_errors() {
        let sim = SimHand::with_joints(1);
        let mut dev = open_session(&sim);
        let mut motor = JointMotor::new(1, Direction::Forward, 300.0, 0.0);

        sim.inject_failure(Some(1), SimOp::ActivateProfileVelocityMode);
        match motor.activate_velocity_mode(&mut dev) {
            Err(e) => {
                assert!(matches!(e, MotorError::ModeActivationFailed(1, _)));
                assert!(!e.is_recoverable());
                assert_eq!(e.node_id(), 1);
            }
            Ok(()) => panic!("Mode activation should have failed"),
        }

        // Velocity is rejected while disabled
        assert!(matches!(
            motor.move_with_velocity(&mut dev, 10.0),
            Err(MotorError::VelocityCommandFailed(1, _))
        ));

        if let Err(e) = dev.close() {
            panic!("Could not close the device: {}", e);
        }
        assert_eq!(motor.enable(&mut dev), Err(MotorError::DeviceClosed(1)));
    }
}

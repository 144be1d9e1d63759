//! Target seeking policy
//!
//! A single step decision for one joint: given its current position and a
//! target, either command a velocity towards the target or halt. Convergence
//! comes from the caller invoking [`TargetSeeker::seek`] again on fresh
//! position samples.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{trace, warn};

use crate::device::{DeviceSession, MotorBus};
use crate::motor::{JointMotor, MotorError};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// The target seeking controller.
#[derive(Debug, Clone, Copy)]
pub struct TargetSeeker {
    /// Distance from the target within which it is reached.
    ///
    /// Units: radians
    pub tolerance_rad: f64,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl TargetSeeker {
    pub fn new(tolerance_rad: f64) -> Self {
        Self { tolerance_rad }
    }

    /// Whether `current` is within the tolerance of `target`.
    pub fn is_target_reached(&self, current: f64, target: f64) -> bool {
        current == target || (current - target).abs() <= self.tolerance_rad
    }

    /// Perform one seeking step for the given motor.
    ///
    /// Returns whether the target was reached at the given position. If the
    /// motor can't be enabled no motion is commanded and `Ok(false)` is
    /// returned, the caller retrying on a later step. Failures of the motion
    /// primitives are returned as errors and must abort the move.
    ///
    /// # Inputs
    /// - `current`: the joint's latest calibrated position in radians.
    /// - `target`: the joint's target position in radians.
    pub fn seek<B: MotorBus>(
        &self,
        motor: &mut JointMotor,
        dev: &mut DeviceSession<B>,
        current: f64,
        target: f64,
    ) -> Result<bool, MotorError> {
        motor.target_position = target;
        motor.current_joint_position = current;

        if let Err(e) = motor.enable(dev) {
            if !e.is_recoverable() {
                return Err(e);
            }
            warn!("Seek could not enable the motor: {}", e);
            motor.running = false;
            return Ok(false);
        }

        let reached = self.is_target_reached(current, target);

        if reached {
            motor.halt_velocity_movement(dev)?;
        } else {
            let direction = if current < target { 1.0 } else { -1.0 };

            motor.activate_velocity_mode(dev)?;
            let velocity = motor.moving_velocity * direction;
            motor.move_with_velocity(dev, velocity)?;
        }

        trace!(
            "Seek motor {}: current {:.5} rad, target {:.5} rad, reached {}",
            motor.node_id(),
            current,
            target,
            reached
        );

        Ok(reached)
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
    use crate::direction::Direction;

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

    #[test]
    fn test_seek_direction() -> Result<(), MotorError> {
        let sim = SimHand::with_joints(2);
        let mut dev = open_session(&sim);
        let seeker = TargetSeeker::new(0.001);

        let mut fwd = JointMotor::new(1, Direction::Forward, 300.0, 0.0);
        let mut rev = JointMotor::new(2, Direction::Reverse, 250.0, 0.0);

        // Below target, positive logical velocity
        assert!(!seeker.seek(&mut fwd, &mut dev, 0.0, 1.0)?);
        assert_eq!(fwd.commanded_velocity, 300.0);
        assert_eq!(sim.velocity(1), 300);
        assert_eq!(fwd.target_position, 1.0);
        assert_eq!(fwd.current_joint_position, 0.0);

        // Above target, negative logical velocity, inverted by the motor
        assert!(!seeker.seek(&mut rev, &mut dev, 1.0, 0.0)?);
        assert_eq!(rev.commanded_velocity, -250.0);
        assert_eq!(sim.velocity(2), 250);

        Ok(())
    }

    #[test]
    fn test_seek_reached_halts() -> Result<(), MotorError> {
        let sim = SimHand::with_joints(1);
        let mut dev = open_session(&sim);
        let seeker = TargetSeeker::new(0.0);
        let mut motor = JointMotor::new(1, Direction::Forward, 300.0, 0.0);

        seeker.seek(&mut motor, &mut dev, 0.0, 0.5)?;
        assert!(motor.running);

        // Exact equality is reached even with no tolerance
        sim.clear_command_log();
        assert!(seeker.seek(&mut motor, &mut dev, 0.5, 0.5)?);
        assert!(!motor.running);
        assert_eq!(motor.commanded_velocity, 0.0);
        assert_eq!(sim.velocity(1), 0);

        let ops: Vec<SimOp> = sim.command_log().iter().map(|c| c.op).collect();
        assert!(ops.contains(&SimOp::HaltVelocityMovement));
        assert!(!ops.contains(&SimOp::MoveWithVelocity));

        Ok(())
    }

    #[test]
    fn test_seek_tolerance() {
        let seeker = TargetSeeker::new(0.01);

        assert!(seeker.is_target_reached(1.0, 1.0));
        assert!(seeker.is_target_reached(1.005, 1.0));
        assert!(seeker.is_target_reached(0.995, 1.0));
        assert!(!seeker.is_target_reached(1.02, 1.0));
    }

    #[test]
    fn test_seek_enable_failure_no_motion() -> Result<(), MotorError> {
        let sim = SimHand::with_joints(1);
        let mut dev = open_session(&sim);
        let seeker = TargetSeeker::new(0.001);
        let mut motor = JointMotor::new(1, Direction::Forward, 300.0, 0.0);

        sim.inject_failure(Some(1), SimOp::SetEnableState);

        assert!(!seeker.seek(&mut motor, &mut dev, 0.0, 1.0)?);
        assert!(!motor.running);

        let ops: Vec<SimOp> = sim.command_log().iter().map(|c| c.op).collect();
        assert!(!ops.contains(&SimOp::ActivateProfileVelocityMode));
        assert!(!ops.contains(&SimOp::MoveWithVelocity));

        Ok(())
    }

    #[test]
    fn test_seek_velocity_failure_is_fatal() {
        let sim = SimHand::with_joints(1);
        let mut dev = open_session(&sim);
        let seeker = TargetSeeker::new(0.001);
        let mut motor = JointMotor::new(1, Direction::Forward, 300.0, 0.0);

        sim.inject_failure(Some(1), SimOp::MoveWithVelocity);

        assert!(matches!(
            seeker.seek(&mut motor, &mut dev, 0.0, 1.0),
            Err(MotorError::VelocityCommandFailed(1, _))
        ));
    }
}

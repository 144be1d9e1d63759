//! Simulated hand device
//!
//! [`SimHand`] models the motor controller and the joint sensors of the hand.
//! It hands out a [`SimBus`] implementing [`MotorBus`] and a
//! [`SimSensorFeed`] producing raw sensor batches, both sharing the same
//! simulated world. Device calls are recorded in a bounded command log, and
//! failures can be injected per node and operation.
//!
//! Joints move by a fixed number of sensor counts each time a sensor batch is
//! produced, in the direction of the commanded velocity.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::Deserialize;
use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use super::{DeviceError, DeviceHandle, MotorBus, NodeId, ProtocolStackSettings};
use crate::hand_ctrl::SensorFeed;
use crate::joint_sensor::{deg_to_native, native_to, AngleUnit};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Error code returned by operations with an injected failure.
pub const ERROR_INJECTED: u32 = 0x0F00_FFB9;

/// Error code returned when the handle is not the open device's handle.
pub const ERROR_BAD_HANDLE: u32 = 0x1000_0008;

/// Error code returned when no node has the requested id.
pub const ERROR_UNKNOWN_NODE: u32 = 0x1000_000B;

/// Error code returned when a command is not valid in the node's state.
pub const ERROR_WRONG_STATE: u32 = 0x0503_0000;

const DEFAULT_BAUD_RATE: u32 = 115_200;
const DEFAULT_TIMEOUT_MS: u32 = 500;

/// Number of calls kept in the command log before the oldest are dropped.
pub const DEFAULT_COMMAND_LOG_CAPACITY: usize = 10_000;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Parameters of the simulation.
#[derive(Debug, Clone, Deserialize)]
pub struct SimParams {
    /// Distance a moving joint travels per sensor batch.
    ///
    /// Units: sensor counts
    pub counts_per_step: f64,

    /// Starting angle of each joint.
    ///
    /// Units: degrees
    #[serde(default)]
    pub initial_angles_deg: Vec<f64>,
}

/// Description of one simulated joint.
#[derive(Debug, Clone, Copy)]
pub struct SimJoint {
    pub node_id: NodeId,
    pub motor_direction: i32,
    pub sensor_zero_value: i32,
    pub sensor_direction: i32,
    pub initial_angle_deg: f64,
}

/// A record of one call made on the simulated device.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimCommand {
    /// Node addressed by the call, `None` for device level calls.
    pub node_id: Option<NodeId>,

    pub op: SimOp,

    /// Value carried by the call, if any.
    pub value: Option<i32>,

    /// Whether the simulated device accepted the call.
    pub ok: bool,
}

/// The simulated hand, shared between the bus and the sensor feed.
#[derive(Clone)]
pub struct SimHand {
    world: Arc<Mutex<SimWorld>>,
}

/// [`MotorBus`] implementation backed by a [`SimHand`].
#[derive(Clone)]
pub struct SimBus {
    world: Arc<Mutex<SimWorld>>,
}

/// [`SensorFeed`] implementation backed by a [`SimHand`].
///
/// Each batch advances the simulation by one step.
pub struct SimSensorFeed {
    world: Arc<Mutex<SimWorld>>,
}

struct SimWorld {
    open_handle: Option<DeviceHandle>,
    next_handle: u64,

    settings: ProtocolStackSettings,
    baud_lock: Option<u32>,

    nodes: Vec<SimNode>,
    counts_per_step: f64,

    failures: HashSet<(Option<NodeId>, SimOp)>,
    log: VecDeque<SimCommand>,
    log_capacity: usize,
}

struct SimNode {
    joint: SimJoint,
    angle_counts: f64,
    enabled: bool,
    fault: bool,
    mode: SimMode,
    velocity: i32,
    current: i16,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Operations of the simulated device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SimOp {
    OpenDevice,
    CloseDevice,
    GetProtocolStackSettings,
    SetProtocolStackSettings,
    GetFaultState,
    ClearFault,
    GetEnableState,
    GetDisableState,
    SetEnableState,
    SetDisableState,
    ActivateProfileVelocityMode,
    MoveWithVelocity,
    HaltVelocityMovement,
    ActivateCurrentMode,
    SetCurrentMust,
    GetCurrentIsAveraged,
    ResetDevice,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SimMode {
    None,
    ProfileVelocity,
    Current,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl SimJoint {
    /// A joint with positive directions whose sensor reads 2048 at zero.
    pub fn new(node_id: NodeId) -> Self {
        Self {
            node_id,
            motor_direction: 1,
            sensor_zero_value: 2048,
            sensor_direction: 1,
            initial_angle_deg: 0.0,
        }
    }
}

impl SimHand {
    /// Create a simulated hand with the given joints.
    pub fn new(joints: Vec<SimJoint>, counts_per_step: f64) -> Self {
        let nodes = joints
            .into_iter()
            .map(|joint| SimNode {
                angle_counts: deg_to_native(joint.initial_angle_deg),
                joint,
                enabled: false,
                fault: false,
                mode: SimMode::None,
                velocity: 0,
                current: 0,
            })
            .collect();

        Self {
            world: Arc::new(Mutex::new(SimWorld {
                open_handle: None,
                next_handle: 1,
                settings: ProtocolStackSettings {
                    baud_rate: DEFAULT_BAUD_RATE,
                    timeout_ms: DEFAULT_TIMEOUT_MS,
                },
                baud_lock: None,
                nodes,
                counts_per_step,
                failures: HashSet::new(),
                log: VecDeque::new(),
                log_capacity: DEFAULT_COMMAND_LOG_CAPACITY,
            })),
        }
    }

    /// Create `num_joints` default joints with node ids starting at 1, moving
    /// one count per step.
    pub fn with_joints(num_joints: usize) -> Self {
        let joints = (1..=num_joints as NodeId).map(SimJoint::new).collect();
        Self::new(joints, 1.0)
    }

    /// Get a [`MotorBus`] connected to this hand.
    pub fn bus(&self) -> SimBus {
        SimBus {
            world: self.world.clone(),
        }
    }

    /// Get a [`SensorFeed`] connected to this hand.
    pub fn sensor_feed(&self) -> SimSensorFeed {
        SimSensorFeed {
            world: self.world.clone(),
        }
    }

    /// Make every call of `op` fail, on `node` only or on every node if `None`.
    pub fn inject_failure(&self, node: Option<NodeId>, op: SimOp) {
        self.world().failures.insert((node, op));
    }

    pub fn clear_failures(&self) {
        self.world().failures.clear();
    }

    /// Force the device to report a fixed baud rate whatever is written.
    pub fn lock_baud_rate(&self, baud_rate: u32) {
        let mut world = self.world();
        world.baud_lock = Some(baud_rate);
        world.settings.baud_rate = baud_rate;
    }

    pub fn baud_rate(&self) -> u32 {
        self.world().settings.baud_rate
    }

    pub fn is_device_open(&self) -> bool {
        self.world().open_handle.is_some()
    }

    /// Put a node into (or out of) the fault state.
    ///
    /// A faulted node is disabled and stops moving.
    pub fn set_fault(&self, node: NodeId, fault: bool) {
        if let Some(n) = self.world().node_mut(node) {
            n.fault = fault;
            if fault {
                n.enabled = false;
                n.velocity = 0;
            }
        }
    }

    pub fn is_faulted(&self, node: NodeId) -> bool {
        self.world().node_mut(node).map(|n| n.fault).unwrap_or(false)
    }

    pub fn is_enabled(&self, node: NodeId) -> bool {
        self.world().node_mut(node).map(|n| n.enabled).unwrap_or(false)
    }

    /// Hardware velocity demand currently applied to the node.
    pub fn velocity(&self, node: NodeId) -> i32 {
        self.world().node_mut(node).map(|n| n.velocity).unwrap_or(0)
    }

    /// True joint angle of the joint at `index`.
    pub fn angle_deg(&self, index: usize) -> f64 {
        self.world()
            .nodes
            .get(index)
            .map(|n| native_to(AngleUnit::Deg, n.angle_counts))
            .unwrap_or(0.0)
    }

    pub fn set_angle_deg(&self, index: usize, angle_deg: f64) {
        if let Some(n) = self.world().nodes.get_mut(index) {
            n.angle_counts = deg_to_native(angle_deg);
        }
    }

    /// The raw sensor readings for the current joint angles.
    pub fn raw_batch(&self) -> Vec<i32> {
        self.world().raw_batch()
    }

    /// Advance the simulation by one step.
    pub fn step(&self) {
        self.world().step()
    }

    /// Copy of the most recent calls made on the device, oldest first.
    pub fn command_log(&self) -> Vec<SimCommand> {
        self.world().log.iter().cloned().collect()
    }

    /// Set how many calls the command log keeps. A capacity of zero turns
    /// recording off.
    pub fn set_command_log_capacity(&self, capacity: usize) {
        let mut world = self.world();
        world.log_capacity = capacity;
        world.trim_log();
    }

    pub fn clear_command_log(&self) {
        self.world().log.clear()
    }

    fn world(&self) -> MutexGuard<SimWorld> {
        lock(&self.world)
    }
}

impl SimBus {
    fn world(&self) -> MutexGuard<SimWorld> {
        lock(&self.world)
    }

    /// Run a node level operation, checking the handle, node and injected
    /// failures before applying `f`.
    fn node_op<T>(
        &mut self,
        handle: DeviceHandle,
        node: NodeId,
        op: SimOp,
        value: Option<i32>,
        f: impl FnOnce(&mut SimNode) -> Result<T, u32>,
    ) -> Result<T, DeviceError> {
        let mut world = self.world();

        let result = world
            .check(handle, Some(node), op)
            .and_then(|_| match world.node_mut(node) {
                Some(n) => f(n),
                None => Err(ERROR_UNKNOWN_NODE),
            });

        world.record(SimCommand {
            node_id: Some(node),
            op,
            value,
            ok: result.is_ok(),
        });

        result.map_err(DeviceError::new)
    }

    /// Run a device level operation.
    fn device_op<T>(
        &mut self,
        handle: Option<DeviceHandle>,
        op: SimOp,
        value: Option<i32>,
        f: impl FnOnce(&mut SimWorld) -> Result<T, u32>,
    ) -> Result<T, DeviceError> {
        let mut world = self.world();

        let checked = match handle {
            Some(h) => world.check(h, None, op),
            None if world.failures.contains(&(None, op)) => Err(ERROR_INJECTED),
            None => Ok(()),
        };
        let result = checked.and_then(|_| f(&mut *world));

        world.record(SimCommand {
            node_id: None,
            op,
            value,
            ok: result.is_ok(),
        });

        result.map_err(DeviceError::new)
    }
}

impl SimWorld {
    fn check(&self, handle: DeviceHandle, node: Option<NodeId>, op: SimOp) -> Result<(), u32> {
        if self.open_handle != Some(handle) {
            return Err(ERROR_BAD_HANDLE);
        }
        if self.failures.contains(&(None, op))
            || (node.is_some() && self.failures.contains(&(node, op)))
        {
            return Err(ERROR_INJECTED);
        }
        Ok(())
    }

    fn node_mut(&mut self, node: NodeId) -> Option<&mut SimNode> {
        self.nodes.iter_mut().find(|n| n.joint.node_id == node)
    }

    fn record(&mut self, command: SimCommand) {
        if self.log_capacity == 0 {
            return;
        }
        self.log.push_back(command);
        self.trim_log();
    }

    fn trim_log(&mut self) {
        while self.log.len() > self.log_capacity {
            self.log.pop_front();
        }
    }

    fn raw_batch(&self) -> Vec<i32> {
        self.nodes
            .iter()
            .map(|n| {
                let counts = n.angle_counts.round() as i32;
                n.joint.sensor_zero_value + n.joint.sensor_direction * counts
            })
            .collect()
    }

    fn step(&mut self) {
        let counts_per_step = self.counts_per_step;

        for n in self.nodes.iter_mut() {
            if n.enabled && n.mode == SimMode::ProfileVelocity && n.velocity != 0 {
                n.angle_counts +=
                    (n.velocity.signum() * n.joint.motor_direction) as f64 * counts_per_step;
            }
        }
    }
}

impl MotorBus for SimBus {
    fn open_device(
        &mut self,
        _device_name: &str,
        _protocol_stack_name: &str,
        _interface_name: &str,
        _port_name: &str,
    ) -> Result<DeviceHandle, DeviceError> {
        self.device_op(None, SimOp::OpenDevice, None, |w| {
            let handle = DeviceHandle::from_raw(w.next_handle);
            w.next_handle += 1;
            w.open_handle = Some(handle);
            Ok(handle)
        })
    }

    fn close_device(&mut self, handle: DeviceHandle) -> Result<(), DeviceError> {
        self.device_op(Some(handle), SimOp::CloseDevice, None, |w| {
            w.open_handle = None;
            Ok(())
        })
    }

    fn get_protocol_stack_settings(
        &mut self,
        handle: DeviceHandle,
    ) -> Result<ProtocolStackSettings, DeviceError> {
        self.device_op(Some(handle), SimOp::GetProtocolStackSettings, None, |w| {
            Ok(w.settings)
        })
    }

    fn set_protocol_stack_settings(
        &mut self,
        handle: DeviceHandle,
        settings: ProtocolStackSettings,
    ) -> Result<(), DeviceError> {
        self.device_op(
            Some(handle),
            SimOp::SetProtocolStackSettings,
            Some(settings.baud_rate as i32),
            |w| {
                w.settings = ProtocolStackSettings {
                    baud_rate: w.baud_lock.unwrap_or(settings.baud_rate),
                    timeout_ms: settings.timeout_ms,
                };
                Ok(())
            },
        )
    }

    fn get_fault_state(&mut self, handle: DeviceHandle, node: NodeId) -> Result<bool, DeviceError> {
        self.node_op(handle, node, SimOp::GetFaultState, None, |n| Ok(n.fault))
    }

    fn clear_fault(&mut self, handle: DeviceHandle, node: NodeId) -> Result<(), DeviceError> {
        self.node_op(handle, node, SimOp::ClearFault, None, |n| {
            n.fault = false;
            Ok(())
        })
    }

    fn get_enable_state(&mut self, handle: DeviceHandle, node: NodeId) -> Result<bool, DeviceError> {
        self.node_op(handle, node, SimOp::GetEnableState, None, |n| Ok(n.enabled))
    }

    fn get_disable_state(
        &mut self,
        handle: DeviceHandle,
        node: NodeId,
    ) -> Result<bool, DeviceError> {
        self.node_op(handle, node, SimOp::GetDisableState, None, |n| Ok(!n.enabled))
    }

    fn set_enable_state(&mut self, handle: DeviceHandle, node: NodeId) -> Result<(), DeviceError> {
        self.node_op(handle, node, SimOp::SetEnableState, None, |n| {
            if n.fault {
                return Err(ERROR_WRONG_STATE);
            }
            n.enabled = true;
            Ok(())
        })
    }

    fn set_disable_state(&mut self, handle: DeviceHandle, node: NodeId) -> Result<(), DeviceError> {
        self.node_op(handle, node, SimOp::SetDisableState, None, |n| {
            n.enabled = false;
            n.velocity = 0;
            Ok(())
        })
    }

    fn activate_profile_velocity_mode(
        &mut self,
        handle: DeviceHandle,
        node: NodeId,
    ) -> Result<(), DeviceError> {
        self.node_op(handle, node, SimOp::ActivateProfileVelocityMode, None, |n| {
            n.mode = SimMode::ProfileVelocity;
            Ok(())
        })
    }

    fn move_with_velocity(
        &mut self,
        handle: DeviceHandle,
        node: NodeId,
        velocity: i32,
    ) -> Result<(), DeviceError> {
        self.node_op(handle, node, SimOp::MoveWithVelocity, Some(velocity), |n| {
            if !n.enabled || n.mode != SimMode::ProfileVelocity {
                return Err(ERROR_WRONG_STATE);
            }
            n.velocity = velocity;
            Ok(())
        })
    }

    fn halt_velocity_movement(
        &mut self,
        handle: DeviceHandle,
        node: NodeId,
    ) -> Result<(), DeviceError> {
        self.node_op(handle, node, SimOp::HaltVelocityMovement, None, |n| {
            n.velocity = 0;
            Ok(())
        })
    }

    fn activate_current_mode(
        &mut self,
        handle: DeviceHandle,
        node: NodeId,
    ) -> Result<(), DeviceError> {
        self.node_op(handle, node, SimOp::ActivateCurrentMode, None, |n| {
            n.mode = SimMode::Current;
            n.velocity = 0;
            Ok(())
        })
    }

    fn set_current_must(
        &mut self,
        handle: DeviceHandle,
        node: NodeId,
        current: i16,
    ) -> Result<(), DeviceError> {
        self.node_op(
            handle,
            node,
            SimOp::SetCurrentMust,
            Some(current as i32),
            |n| {
                if n.mode != SimMode::Current {
                    return Err(ERROR_WRONG_STATE);
                }
                n.current = current;
                Ok(())
            },
        )
    }

    fn get_current_is_averaged(
        &mut self,
        handle: DeviceHandle,
        node: NodeId,
    ) -> Result<i16, DeviceError> {
        self.node_op(handle, node, SimOp::GetCurrentIsAveraged, None, |n| {
            Ok(n.current)
        })
    }

    fn reset_device(&mut self, handle: DeviceHandle, node: NodeId) -> Result<(), DeviceError> {
        self.node_op(handle, node, SimOp::ResetDevice, None, |n| {
            n.enabled = false;
            n.fault = false;
            n.mode = SimMode::None;
            n.velocity = 0;
            n.current = 0;
            Ok(())
        })
    }
}

impl SensorFeed for SimSensorFeed {
    fn next_batch(&mut self) -> Option<Vec<i32>> {
        let mut world = lock(&self.world);
        world.step();
        Some(world.raw_batch())
    }
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Lock the world, recovering it if a panicking test poisoned the mutex.
fn lock(world: &Arc<Mutex<SimWorld>>) -> MutexGuard<SimWorld> {
    world.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::joint_sensor::DEG_PER_COUNT;

    fn open(bus: &mut SimBus) -> DeviceHandle {
        match bus.open_device("EPOS2", "MAXON SERIAL V2", "USB", "USB0") {
            Ok(h) => h,
            Err(e) => panic!("Sim should open: {}", e),
        }
    }

    #[test]
    fn test_velocity_moves_joint() -> Result<(), DeviceError> {
        let sim = SimHand::with_joints(2);
        let mut bus = sim.bus();
        let mut feed = sim.sensor_feed();
        let h = open(&mut bus);

        bus.set_enable_state(h, 1)?;
        bus.activate_profile_velocity_mode(h, 1)?;
        bus.move_with_velocity(h, 1, 300)?;

        assert_eq!(feed.next_batch(), Some(vec![2049, 2048]));
        assert_eq!(feed.next_batch(), Some(vec![2050, 2048]));

        bus.halt_velocity_movement(h, 1)?;
        assert_eq!(feed.next_batch(), Some(vec![2050, 2048]));

        Ok(())
    }

    #[test]
    fn test_state_rules() -> Result<(), DeviceError> {
        let sim = SimHand::with_joints(1);
        let mut bus = sim.bus();
        let h = open(&mut bus);

        // Velocity needs an enabled node in velocity mode
        bus.activate_profile_velocity_mode(h, 1)?;
        assert_eq!(
            bus.move_with_velocity(h, 1, 10),
            Err(DeviceError::new(ERROR_WRONG_STATE))
        );

        // Faulted nodes refuse to enable until cleared
        sim.set_fault(1, true);
        assert!(bus.get_fault_state(h, 1)?);
        assert!(bus.set_enable_state(h, 1).is_err());
        bus.clear_fault(h, 1)?;
        bus.set_enable_state(h, 1)?;
        assert!(sim.is_enabled(1));

        // Unknown nodes and stale handles are rejected
        assert_eq!(
            bus.get_fault_state(h, 9),
            Err(DeviceError::new(ERROR_UNKNOWN_NODE))
        );
        assert_eq!(
            bus.get_fault_state(DeviceHandle::from_raw(99), 1),
            Err(DeviceError::new(ERROR_BAD_HANDLE))
        );

        Ok(())
    }

    #[test]
    fn test_injected_failures_are_logged() {
        let sim = SimHand::with_joints(3);
        let mut bus = sim.bus();
        let h = open(&mut bus);

        sim.inject_failure(Some(2), SimOp::SetEnableState);
        sim.clear_command_log();

        assert!(bus.set_enable_state(h, 1).is_ok());
        assert_eq!(
            bus.set_enable_state(h, 2),
            Err(DeviceError::new(ERROR_INJECTED))
        );

        let log = sim.command_log();
        assert_eq!(log.len(), 2);
        assert!(log[0].ok);
        assert_eq!(log[1].node_id, Some(2));
        assert!(!log[1].ok);

        sim.clear_failures();
        assert!(bus.set_enable_state(h, 2).is_ok());
    }

    #[test]
    fn test_command_log_is_bounded() {
        let sim = SimHand::with_joints(2);
        let mut bus = sim.bus();
        let h = open(&mut bus);

        sim.set_command_log_capacity(3);
        for node in [1, 2, 1, 2].iter() {
            assert!(bus.set_enable_state(h, *node).is_ok());
        }

        let nodes: Vec<_> = sim.command_log().iter().map(|c| c.node_id).collect();
        assert_eq!(nodes, vec![Some(2), Some(1), Some(2)]);

        sim.set_command_log_capacity(0);
        assert!(sim.command_log().is_empty());
        assert!(bus.set_disable_state(h, 1).is_ok());
        assert!(sim.command_log().is_empty());
    }

    #[test]
    fn test_reversed_joint() -> Result<(), DeviceError> {
        let joint = SimJoint {
            node_id: 4,
            motor_direction: -1,
            sensor_zero_value: 100,
            sensor_direction: -1,
            initial_angle_deg: 0.0,
        };
        let sim = SimHand::new(vec![joint], 2.0);
        let mut bus = sim.bus();
        let h = open(&mut bus);

        bus.set_enable_state(h, 4)?;
        bus.activate_profile_velocity_mode(h, 4)?;

        // A negative hardware velocity on a reversed motor moves the joint
        // positively, which a reversed sensor reads as a falling count.
        bus.move_with_velocity(h, 4, -300)?;
        sim.step();

        assert!((sim.angle_deg(0) - 2.0 * DEG_PER_COUNT).abs() < 1e-9);
        assert_eq!(sim.raw_batch(), vec![98]);

        Ok(())
    }
}

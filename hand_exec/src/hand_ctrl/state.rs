//! Implementations for the HandCtrl state structure

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{debug, error, info, trace, warn};
use serde::Serialize;
use std::convert::TryFrom;
use std::time::{Duration, Instant};

use comms_if::eqpt::hand::{
    HandMode, HandModeResult, JointState, MoveFingerResponse, MoveHandResponse,
};
use util::module::State;

use super::{
    CancelToken, DeviceParams, HandCtrlError, InitError, JointStateObserver, Params, SensorFeed,
    TargetSeeker,
};
use crate::device::{DeviceConfig, DeviceSession, MotorBus};
use crate::direction::Direction;
use crate::joint_sensor::{AngleUnit, JointSensor};
use crate::motor::{JointMotor, MotorError};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Hand control module state.
pub struct HandCtrl<B: MotorBus> {
    params: Option<Params>,

    device: DeviceSession<B>,

    sensors: Vec<JointSensor>,
    motors: Vec<JointMotor>,

    seeker: TargetSeeker,

    initialised: bool,

    /// Most recently published joint state.
    joint_state: JointState,

    feed: Option<Box<dyn SensorFeed>>,
    observer: Option<Box<dyn JointStateObserver>>,

    cancel: CancelToken,
}

/// Status report for HandCtrl processing.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StatusReport {
    /// Sequence number of the published joint state.
    pub seq: u64,

    /// Joints whose calibrated position is outside of their sensor's range.
    pub out_of_range: Vec<usize>,
}

/// Bounds on a single convergence loop.
struct ConvergenceGuard {
    max_iterations: u64,
    deadline: Option<Instant>,
    period: Option<Duration>,
    start: Instant,
    iterations: u64,
    cancel: CancelToken,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl<B: MotorBus> State for HandCtrl<B> {
    type InitData = Params;
    type InitError = InitError;

    type InputData = Vec<i32>;
    type OutputData = JointState;
    type StatusReport = StatusReport;
    type ProcError = HandCtrlError;

    /// Initialise the HandCtrl module.
    ///
    /// Every joint's sensor and motor are built from the parameters before the
    /// device is opened. The module is only initialised if all steps succeed.
    fn init(&mut self, params: Self::InitData) -> Result<(), Self::InitError> {
        if self.initialised {
            return Err(InitError::AlreadyInitialised);
        }

        if params.whole_hand_joints > params.num_joints {
            return Err(InitError::InvalidWholeHandJoints {
                whole_hand: params.whole_hand_joints,
                num_joints: params.num_joints,
            });
        }
        if params.joints.len() != params.num_joints {
            return Err(InitError::InvalidJointCount {
                expected: params.num_joints,
                found: params.joints.len(),
            });
        }
        if !(params.target_tolerance_rad >= 0.0) {
            return Err(InitError::InvalidTolerance(params.target_tolerance_rad));
        }

        let device_config = device_config(&params.device)?;

        let mut sensors = Vec::with_capacity(params.num_joints);
        let mut motors = Vec::with_capacity(params.num_joints);

        for (joint, joint_params) in params.joints.iter().enumerate() {
            sensors.push(JointSensor::new(joint, joint_params)?);

            let node_id = joint_params
                .node_id
                .ok_or(InitError::MissingMotorParameter {
                    joint,
                    param: "node_id",
                })?;
            let raw_direction =
                joint_params
                    .motor_direction
                    .ok_or(InitError::MissingMotorParameter {
                        joint,
                        param: "motor_direction",
                    })?;
            let direction = Direction::try_from(raw_direction)
                .map_err(|e| InitError::InvalidMotorDirection { joint, value: e.0 })?;

            motors.push(JointMotor::new(
                node_id,
                direction,
                params.moving_velocity,
                params.max_peak_current,
            ));
        }

        self.device.open(&device_config)?;

        info!(
            "HandCtrl initialised with {} joints ({} moved together)",
            params.num_joints, params.whole_hand_joints
        );

        self.joint_state = JointState {
            seq: 0,
            positions_deg: vec![0.0; params.num_joints],
            positions_rad: vec![0.0; params.num_joints],
        };
        self.sensors = sensors;
        self.motors = motors;
        self.seeker = TargetSeeker::new(params.target_tolerance_rad);
        self.params = Some(params);
        self.initialised = true;

        Ok(())
    }

    /// Calibrate a raw sensor batch and publish the resulting joint state.
    fn proc(
        &mut self,
        input_data: &Self::InputData,
    ) -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError> {
        let state = self.handle_raw_sensor_batch(input_data)?;

        let report = StatusReport {
            seq: state.seq,
            out_of_range: self
                .sensors
                .iter()
                .filter(|s| !s.in_range())
                .map(|s| s.joint())
                .collect(),
        };

        Ok((state, report))
    }
}

impl<B: MotorBus> HandCtrl<B> {
    /// Create an uninitialised controller around the given device driver.
    pub fn new(bus: B) -> Self {
        Self {
            params: None,
            device: DeviceSession::new(bus),
            sensors: Vec::new(),
            motors: Vec::new(),
            seeker: TargetSeeker::new(0.0),
            initialised: false,
            joint_state: JointState::default(),
            feed: None,
            observer: None,
            cancel: CancelToken::new(),
        }
    }

    /// Attach the source of fresh sensor batches used by the convergence
    /// loops.
    pub fn set_sensor_feed(&mut self, feed: Box<dyn SensorFeed>) {
        self.feed = Some(feed);
    }

    /// Attach the receiver of published joint states.
    pub fn set_observer(&mut self, observer: Box<dyn JointStateObserver>) {
        self.observer = Some(observer);
    }

    /// Get a token which cancels the move in progress.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn is_initialised(&self) -> bool {
        self.initialised
    }

    /// Number of joints, zero before initialisation.
    pub fn num_joints(&self) -> usize {
        self.motors.len()
    }

    /// Number of joints moved by [`HandCtrl::move_whole_hand`].
    pub fn whole_hand_joints(&self) -> usize {
        self.params
            .as_ref()
            .map(|p| p.whole_hand_joints)
            .unwrap_or(0)
    }

    /// Most recently published joint state.
    pub fn joint_state(&self) -> &JointState {
        &self.joint_state
    }

    pub fn motor(&self, index: usize) -> Option<&JointMotor> {
        self.motors.get(index)
    }

    pub fn sensor(&self, index: usize) -> Option<&JointSensor> {
        self.sensors.get(index)
    }

    pub fn device(&self) -> &DeviceSession<B> {
        &self.device
    }

    /// Update every joint's sensor from a raw batch and publish the calibrated
    /// joint state.
    ///
    /// The batch must hold exactly one value per joint, otherwise no sensor
    /// is updated.
    pub fn handle_raw_sensor_batch(&mut self, raw: &[i32]) -> Result<JointState, HandCtrlError> {
        if !self.initialised {
            return Err(HandCtrlError::NotInitialised);
        }
        if raw.len() != self.sensors.len() {
            return Err(HandCtrlError::SensorCountMismatch {
                expected: self.sensors.len(),
                found: raw.len(),
            });
        }

        for (sensor, &value) in self.sensors.iter_mut().zip(raw.iter()) {
            sensor.update(value);
        }

        let mut positions_deg = Vec::with_capacity(self.sensors.len());
        let mut positions_rad = Vec::with_capacity(self.sensors.len());
        for sensor in self.sensors.iter() {
            positions_deg.push(sensor.calibrated_value(AngleUnit::Deg)?);
            positions_rad.push(sensor.calibrated_value(AngleUnit::Rad)?);
        }

        let state = JointState {
            seq: self.joint_state.seq + 1,
            positions_deg,
            positions_rad,
        };

        trace!("Joint state {}: {:?}", state.seq, state.positions_deg);

        if let Some(observer) = self.observer.as_mut() {
            observer.publish(&state);
        }
        self.joint_state = state.clone();

        Ok(state)
    }

    /// Pull one batch from the sensor feed, if there is one, and handle it.
    pub fn poll_feed(&mut self) -> Result<Option<JointState>, HandCtrlError> {
        let batch = match self.feed.as_mut() {
            Some(feed) => feed.next_batch(),
            None => None,
        };

        match batch {
            Some(b) => self.handle_raw_sensor_batch(&b).map(Some),
            None => Ok(None),
        }
    }

    /// Move a single joint to the target angle, blocking until it is reached.
    ///
    /// One seeking step is performed before the motor's enable state is
    /// confirmed. The loop then repeats enable and seek on fresh samples
    /// until a step reports the target reached with the motor enabled.
    ///
    /// A move which fails or ends without reaching the target halts the joint.
    ///
    /// If the controller isn't initialised `reached` is `false` and nothing
    /// is commanded.
    pub fn move_single_joint(
        &mut self,
        joint_index: usize,
        target_angle_deg: f64,
    ) -> Result<MoveFingerResponse, HandCtrlError> {
        if !self.initialised {
            warn!("Move joint request received before HandCtrl is initialised");
            return Ok(MoveFingerResponse {
                reached: false,
                resulting_angle_deg: 0.0,
            });
        }
        if joint_index >= self.motors.len() {
            return Err(HandCtrlError::InvalidJointIndex {
                index: joint_index,
                num_joints: self.motors.len(),
            });
        }

        info!("Moving joint {} to {:.3} deg", joint_index, target_angle_deg);

        let target = target_angle_deg.to_radians();
        let joints = joint_index..joint_index + 1;

        let res = self.converge_single_joint(joint_index, target);
        match res {
            Ok(ref r) if r.reached => (),
            _ => self.halt_joints(joints),
        }

        res
    }

    /// Move the whole hand joints to their targets, blocking until all of
    /// them report reached in the same round.
    ///
    /// A move which fails halts every moved joint.
    ///
    /// If the controller isn't initialised `reached` is `false` and nothing
    /// is commanded.
    pub fn move_whole_hand(&mut self, targets: &[f64]) -> Result<MoveHandResponse, HandCtrlError> {
        if !self.initialised {
            warn!("Move hand request received before HandCtrl is initialised");
            return Ok(MoveHandResponse {
                reached: false,
                resulting_angles: Vec::new(),
            });
        }

        let num_moved = self.whole_hand_joints();
        if targets.len() != num_moved {
            return Err(HandCtrlError::TargetCountMismatch {
                expected: num_moved,
                found: targets.len(),
            });
        }

        info!("Moving hand to {:?} deg", targets);

        let targets_rad: Vec<f64> = targets.iter().map(|t| t.to_radians()).collect();

        let res = self.converge_whole_hand(&targets_rad);
        if res.is_err() {
            self.halt_joints(0..num_moved);
        }

        res
    }

    /// Disable (mode `0`) or enable (mode `1`) every motor.
    ///
    /// A motor failing does not stop the others from being attempted. If the
    /// controller isn't initialised or the mode is unknown no motor is
    /// commanded and the result is [`HandModeResult::NotReady`].
    pub fn set_operation_mode(&mut self, mode: u8) -> HandModeResult {
        if !self.initialised {
            warn!("Mode request received before HandCtrl is initialised");
            return HandModeResult::NotReady;
        }

        let mode = match HandMode::from_raw(mode) {
            Some(m) => m,
            None => {
                warn!("Unknown hand mode {}", mode);
                return HandModeResult::NotReady;
            }
        };

        info!("Setting hand mode {:?}", mode);

        let device = &mut self.device;
        for motor in self.motors.iter_mut() {
            let result = match mode {
                HandMode::DisableAll => motor.disable(device),
                HandMode::EnableAll => motor.enable(device),
            };
            if let Err(e) = result {
                warn!("{}", e);
            }
        }

        match mode {
            HandMode::DisableAll => HandModeResult::AllDisabled,
            HandMode::EnableAll => HandModeResult::AllEnabled,
        }
    }

    /// Halt then disable every motor, continuing through failures.
    ///
    /// Returns the failures which occurred.
    pub fn make_safe(&mut self) -> Vec<MotorError> {
        let mut failures = Vec::new();

        if !self.initialised {
            return failures;
        }

        info!("Making the hand safe");

        let device = &mut self.device;
        for motor in self.motors.iter_mut() {
            if let Err(e) = motor.halt_velocity_movement(device) {
                error!("{}", e);
                failures.push(e);
            }
            if let Err(e) = motor.disable(device) {
                error!("{}", e);
                failures.push(e);
            }
        }

        failures
    }

    fn guard(&self) -> ConvergenceGuard {
        // Only called once initialised
        let (max_iterations, timeout_s, period_s) = match self.params.as_ref() {
            Some(p) => (p.max_seek_iterations, p.seek_timeout_s, p.seek_period_s),
            None => (0, None, 0.0),
        };
        let start = Instant::now();

        ConvergenceGuard {
            max_iterations,
            deadline: timeout_s
                .filter(|t| t.is_finite() && *t >= 0.0)
                .map(|t| start + Duration::from_secs_f64(t)),
            period: if period_s.is_finite() && period_s > 0.0 {
                Some(Duration::from_secs_f64(period_s))
            } else {
                None
            },
            start,
            iterations: 0,
            cancel: self.cancel.clone(),
        }
    }

    /// Convergence loop of [`HandCtrl::move_single_joint`].
    ///
    /// Any error leaves the joint's motor in whatever state the last step
    /// commanded, the caller is responsible for halting it.
    fn converge_single_joint(
        &mut self,
        joint_index: usize,
        target: f64,
    ) -> Result<MoveFingerResponse, HandCtrlError> {
        let mut guard = self.guard();

        let mut reached = self.seek_joint(joint_index, target)?;

        if !self.enable_joint(joint_index)? {
            return Ok(MoveFingerResponse {
                reached: false,
                resulting_angle_deg: self.position_deg(joint_index)?,
            });
        }

        while !reached {
            guard.tick()?;
            self.poll_feed()?;

            let enabled = self.enable_joint(joint_index)?;
            reached = self.seek_joint(joint_index, target)? && enabled;
        }

        let resulting_angle_deg = self.position_deg(joint_index)?;
        info!(
            "Joint {} reached {:.3} deg after {} iterations",
            joint_index, resulting_angle_deg, guard.iterations
        );

        Ok(MoveFingerResponse {
            reached,
            resulting_angle_deg,
        })
    }

    /// Convergence loop of [`HandCtrl::move_whole_hand`], with targets in
    /// radians.
    fn converge_whole_hand(
        &mut self,
        targets_rad: &[f64],
    ) -> Result<MoveHandResponse, HandCtrlError> {
        let num_moved = targets_rad.len();
        let mut guard = self.guard();

        loop {
            let mut num_reached = 0;
            for (joint, &target) in targets_rad.iter().enumerate() {
                if self.seek_joint(joint, target)? {
                    num_reached += 1;
                }
            }

            debug!("Hand round {}: {}/{} reached", guard.iterations, num_reached, num_moved);

            if num_reached == num_moved {
                break;
            }

            guard.tick()?;
            self.poll_feed()?;
        }

        let mut resulting_angles = Vec::with_capacity(num_moved);
        for joint in 0..num_moved {
            resulting_angles.push(self.position_deg(joint)?);
        }

        info!("Hand reached {:?} deg", resulting_angles);

        Ok(MoveHandResponse {
            reached: true,
            resulting_angles,
        })
    }

    fn position_rad(&self, joint: usize) -> Result<f64, HandCtrlError> {
        Ok(self.sensors[joint].calibrated_value(AngleUnit::Rad)?)
    }

    fn position_deg(&self, joint: usize) -> Result<f64, HandCtrlError> {
        Ok(self.sensors[joint].calibrated_value(AngleUnit::Deg)?)
    }

    fn seek_joint(&mut self, joint: usize, target: f64) -> Result<bool, HandCtrlError> {
        let current = self.position_rad(joint)?;
        let reached = self
            .seeker
            .seek(&mut self.motors[joint], &mut self.device, current, target)
            .map_err(|e| {
                error!("Joint {}: {}", joint, e);
                e
            })?;

        Ok(reached)
    }

    /// Enable a joint's motor, returning whether it is enabled.
    ///
    /// Recoverable failures are reported as `false`.
    fn enable_joint(&mut self, joint: usize) -> Result<bool, HandCtrlError> {
        match self.motors[joint].enable(&mut self.device) {
            Ok(()) => Ok(true),
            Err(e) if e.is_recoverable() => {
                warn!("Joint {}: {}", joint, e);
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Best effort halt of the given joints after a move which failed or
    /// was aborted.
    fn halt_joints(&mut self, joints: std::ops::Range<usize>) {
        for joint in joints {
            if let Err(e) = self.motors[joint].halt_velocity_movement(&mut self.device) {
                error!("Could not halt joint {} after failed move: {}", joint, e);
            }
        }
    }
}

impl ConvergenceGuard {
    /// Account for one more iteration, failing if the loop must stop.
    ///
    /// Sleeps for the configured period before returning.
    fn tick(&mut self) -> Result<(), HandCtrlError> {
        if self.cancel.is_cancelled() {
            self.cancel.reset();
            warn!("Move cancelled");
            return Err(HandCtrlError::Cancelled {
                iterations: self.iterations,
            });
        }

        let now = Instant::now();
        let deadline_passed = self.deadline.map(|d| now >= d).unwrap_or(false);
        if self.iterations >= self.max_iterations || deadline_passed {
            let elapsed_s = (now - self.start).as_secs_f64();
            error!(
                "Move did not converge after {} iterations ({:.3} s)",
                self.iterations, elapsed_s
            );
            return Err(HandCtrlError::Timeout {
                iterations: self.iterations,
                elapsed_s,
            });
        }

        self.iterations += 1;

        if let Some(period) = self.period {
            std::thread::sleep(period);
        }

        Ok(())
    }
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn device_config(params: &DeviceParams) -> Result<DeviceConfig, InitError> {
    fn required<T: Clone>(value: &Option<T>, name: &'static str) -> Result<T, InitError> {
        value.clone().ok_or(InitError::MissingDeviceParameter(name))
    }

    Ok(DeviceConfig {
        device_name: required(&params.device_name, "device_name")?,
        protocol_stack_name: required(&params.protocol_stack_name, "protocol_stack_name")?,
        interface_name: required(&params.interface_name, "interface_name")?,
        port_name: required(&params.port_name, "port_name")?,
        baud_rate: required(&params.baud_rate, "baud_rate")?,
    })
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::device::sim::{SimBus, SimHand, SimOp};
    use crate::hand_ctrl::JointParams;
    use crate::joint_sensor::SensorError;

    fn joint(node_id: u16) -> JointParams {
        JointParams {
            sensor_zero_value: Some(2048),
            sensor_direction: Some(1),
            sensor_range_min: Some(-2048.0),
            sensor_range_max: Some(2048.0),
            node_id: Some(node_id),
            motor_direction: Some(1),
        }
    }

    fn params(num_joints: usize, whole_hand_joints: usize) -> Params {
        Params {
            num_joints,
            whole_hand_joints,
            joints: (1..=num_joints as u16).map(joint).collect(),
            moving_velocity: 300.0,
            max_peak_current: 0.0,
            target_tolerance_rad: crate::joint_sensor::RAD_PER_COUNT,
            max_seek_iterations: 10_000,
            seek_timeout_s: None,
            seek_period_s: 0.0,
            device: DeviceParams {
                device_name: Some(String::from("EPOS2")),
                protocol_stack_name: Some(String::from("MAXON SERIAL V2")),
                interface_name: Some(String::from("USB")),
                port_name: Some(String::from("USB0")),
                baud_rate: Some(1_000_000),
            },
        }
    }

    #[test]
    fn test_init() -> Result<(), InitError> {
        let sim = SimHand::with_joints(3);
        let mut hand = HandCtrl::new(sim.bus());
        assert!(!hand.is_initialised());

        hand.init(params(3, 2))?;

        assert!(hand.is_initialised());
        assert!(hand.device().is_open());
        assert_eq!(hand.num_joints(), 3);
        assert_eq!(hand.whole_hand_joints(), 2);
        assert_eq!(hand.joint_state().positions_deg, vec![0.0; 3]);

        assert!(matches!(
            hand.init(params(3, 2)),
            Err(InitError::AlreadyInitialised)
        ));

        Ok(())
    }

    #[test]
    fn test_init_validation() {
        let check = |p: Params| {
            let sim = SimHand::with_joints(3);
            let mut hand: HandCtrl<SimBus> = HandCtrl::new(sim.bus());
            let result = hand.init(p);
            assert!(!hand.is_initialised());
            assert!(!sim.is_device_open());
            result
        };

        assert!(matches!(
            check(params(2, 3)),
            Err(InitError::InvalidWholeHandJoints { .. })
        ));

        let mut p = params(3, 2);
        p.joints.pop();
        assert!(matches!(
            check(p),
            Err(InitError::InvalidJointCount {
                expected: 3,
                found: 2
            })
        ));

        let mut p = params(3, 2);
        p.target_tolerance_rad = -1.0;
        assert!(matches!(check(p), Err(InitError::InvalidTolerance(_))));

        let mut p = params(3, 2);
        p.device.baud_rate = None;
        assert!(matches!(
            check(p),
            Err(InitError::MissingDeviceParameter("baud_rate"))
        ));

        let mut p = params(3, 2);
        p.joints[1].sensor_zero_value = None;
        assert!(matches!(
            check(p),
            Err(InitError::Calibration(
                SensorError::MissingCalibrationParameter {
                    joint: 1,
                    param: "sensor_zero_value"
                }
            ))
        ));

        let mut p = params(3, 2);
        p.joints[2].node_id = None;
        assert!(matches!(
            check(p),
            Err(InitError::MissingMotorParameter {
                joint: 2,
                param: "node_id"
            })
        ));

        let mut p = params(3, 2);
        p.joints[0].motor_direction = Some(3);
        assert!(matches!(
            check(p),
            Err(InitError::InvalidMotorDirection { joint: 0, value: 3 })
        ));
    }

    #[test]
    fn test_init_device_failure() {
        let sim = SimHand::with_joints(2);
        sim.inject_failure(None, SimOp::OpenDevice);

        let mut hand = HandCtrl::new(sim.bus());
        assert!(matches!(
            hand.init(params(2, 2)),
            Err(InitError::DeviceOpenFailed(_))
        ));
        assert!(!hand.is_initialised());
    }

    #[test]
    fn test_proc_reports_out_of_range() -> Result<(), HandCtrlError> {
        let sim = SimHand::with_joints(2);
        let mut hand = HandCtrl::new(sim.bus());
        let mut p = params(2, 2);
        p.joints[1].sensor_range_max = Some(10.0);
        if let Err(e) = hand.init(p) {
            panic!("Init failed: {}", e);
        }

        let (state, report) = hand.proc(&vec![2048, 2148])?;

        assert_eq!(state.seq, 1);
        assert_eq!(report.seq, 1);
        assert_eq!(report.out_of_range, vec![1]);
        assert_eq!(hand.joint_state(), &state);

        Ok(())
    }

    #[test]
    fn test_observer_and_seq() -> Result<(), HandCtrlError> {
        use std::sync::{Arc, Mutex};

        let sim = SimHand::with_joints(2);
        let mut hand = HandCtrl::new(sim.bus());
        if let Err(e) = hand.init(params(2, 2)) {
            panic!("Init failed: {}", e);
        }

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        hand.set_observer(Box::new(move |s: &JointState| {
            sink.lock().unwrap().push(s.seq);
        }));

        hand.handle_raw_sensor_batch(&[2048, 2048])?;
        hand.handle_raw_sensor_batch(&[2049, 2047])?;

        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
        assert!((hand.joint_state().positions_deg[1] + 360.0 / 4096.0).abs() < 1e-9);

        Ok(())
    }

    #[test]
    fn test_cancel() {
        let sim = SimHand::with_joints(1);
        let mut hand = HandCtrl::new(sim.bus());
        if let Err(e) = hand.init(params(1, 1)) {
            panic!("Init failed: {}", e);
        }
        hand.set_sensor_feed(Box::new(sim.sensor_feed()));

        hand.cancel_token().cancel();

        assert!(matches!(
            hand.move_single_joint(0, 30.0),
            Err(HandCtrlError::Cancelled { iterations: 0 })
        ));
        assert_eq!(sim.velocity(1), 0);

        // The token is cleared once the cancellation is reported
        assert!(!hand.cancel_token().is_cancelled());
    }
}

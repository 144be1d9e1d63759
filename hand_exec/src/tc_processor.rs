//! # Telecommand processor module
//!
//! Executes the telecommands addressed to the hand and saves each response
//! into the session.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{debug, info, warn};

use comms_if::{
    eqpt::hand::{HandModeRequest, HandModeResponse, MoveFingerRequest, MoveHandRequest},
    tc::{Tc, TcParseError, TcType},
};
use hand_lib::{
    device::MotorBus,
    hand_ctrl::{HandCtrl, HandCtrlError},
};
use util::session::Session;

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Errors which can occur while executing a telecommand.
#[derive(Debug, thiserror::Error)]
pub enum TcExecError {
    #[error("Invalid telecommand payload: {0}")]
    InvalidPayload(#[from] TcParseError),

    #[error(transparent)]
    Hand(#[from] HandCtrlError),
}

// ------------------------------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Execute a telecommand.
///
/// The response to a request is saved as `responses/<tc_index>_<type>.json`
/// in the session directory.
pub fn exec<B: MotorBus>(
    hand: &mut HandCtrl<B>,
    session: &Session,
    tc_index: usize,
    tc: &Tc,
) -> Result<(), TcExecError> {
    match tc.tc_type {
        TcType::None => (),
        TcType::Heartbeat => debug!("Heartbeat"),
        TcType::MakeSafe => {
            info!("Recieved MakeSafe command");
            let failures = hand.make_safe();
            if !failures.is_empty() {
                warn!("{} motor failures while making safe", failures.len());
            }
        }
        TcType::MoveFinger => {
            let req: MoveFingerRequest = tc.parse_payload()?;
            let res = hand.move_single_joint(req.joint_index, req.target_angle_deg)?;
            session.save(response_path(tc_index, "move_finger"), res);
        }
        TcType::MoveHand => {
            let req: MoveHandRequest = tc.parse_payload()?;
            let res = hand.move_whole_hand(&req.targets)?;
            session.save(response_path(tc_index, "move_hand"), res);
        }
        TcType::HandMode => {
            let req: HandModeRequest = tc.parse_payload()?;
            let res = HandModeResponse::from(hand.set_operation_mode(req.mode));
            info!("Hand mode result code {}", res.result_code);
            session.save(response_path(tc_index, "hand_mode"), res);
        }
    }

    Ok(())
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn response_path(tc_index: usize, name: &str) -> String {
    format!("responses/{:04}_{}.json", tc_index, name)
}

//! # Telecommand module
//!
//! This module provides telecommand functionality to the communications
//! interface.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{self, Value};
use thiserror::Error;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A telecommand, i.e. an instruction sent to the hand by an operator or a
/// script.
#[derive(Debug, Serialize, Deserialize)]
pub struct Tc {
    /// The type of the telecommand
    pub tc_type: TcType,

    /// The payload associated with this TC
    pub payload: TcPayload,
}

// ---------------------------------------------------------------------------
// STATICS
// ---------------------------------------------------------------------------

static TYPE_HAS_NO_PAYLOAD: [TcType; 3] = [TcType::None, TcType::Heartbeat, TcType::MakeSafe];

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Telecommand types.
///
/// The type is used to identify the purpose of the telecommand, and should be
/// used by the telecommand processor to determine where to send the command.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq)]
pub enum TcType {
    None,
    Heartbeat,
    MakeSafe,
    MoveFinger,
    MoveHand,
    HandMode,
}

/// Telecommand payload.
///
/// The payload only indicates which serialisation format the data is in. Use
/// [`Tc::parse_payload`] to get the typed request out of it.
#[derive(Debug, Serialize, Deserialize)]
pub enum TcPayload {
    None,
    Json(String),
}

/// Possible parsing errors.
#[derive(Debug, Error)]
pub enum TcParseError {
    #[error("TC contains invalid JSON: {0}")]
    InvalidJson(serde_json::Error),

    #[error("TC has an invalid type ({0})")]
    InvalidType(String),

    #[error("TC of type {0:?} is expected to have a payload but it doesn't")]
    MissingPayload(TcType),

    #[error("TC of type {0:?} has an invalid payload: {1}")]
    InvalidPayload(TcType, serde_json::Error),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Tc {
    /// Parse a new TC from a JSON packet
    pub fn from_json(json_str: &str) -> Result<Self, TcParseError> {
        let val: Value = serde_json::from_str(json_str).map_err(TcParseError::InvalidJson)?;

        let type_str = match val["type"].as_str() {
            Some(s) => s,
            None => {
                return Err(TcParseError::InvalidType(String::from(
                    "Expected \"type\" to be a string",
                )))
            }
        };

        let tc_type = match TcType::from_str(type_str) {
            Some(t) => t,
            None => {
                return Err(TcParseError::InvalidType(format!(
                    "{} is not a recognised TC type",
                    type_str
                )))
            }
        };

        // If the payload is null and the type expects one an error is returned
        let payload = if val["payload"].is_null() {
            if !TYPE_HAS_NO_PAYLOAD.contains(&tc_type) {
                return Err(TcParseError::MissingPayload(tc_type));
            }
            TcPayload::None
        } else {
            TcPayload::Json(val["payload"].to_string())
        };

        Ok(Tc { tc_type, payload })
    }

    /// Deserialise the payload into a request type.
    pub fn parse_payload<T: DeserializeOwned>(&self) -> Result<T, TcParseError> {
        match self.payload {
            TcPayload::Json(ref s) => {
                serde_json::from_str(s).map_err(|e| TcParseError::InvalidPayload(self.tc_type, e))
            }
            TcPayload::None => Err(TcParseError::MissingPayload(self.tc_type)),
        }
    }
}

impl TcType {
    fn from_str(s: &str) -> Option<Self> {
        match s {
            "NONE" => Some(TcType::None),
            "HEARTBEAT" => Some(TcType::Heartbeat),
            "SAFE" => Some(TcType::MakeSafe),
            "MOVE_FINGER" => Some(TcType::MoveFinger),
            "MOVE_HAND" => Some(TcType::MoveHand),
            "HAND_MODE" => Some(TcType::HandMode),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

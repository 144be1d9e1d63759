//! # Communications interface crate.
//!
//! Provides all common communications interfaces for the software. Nothing in
//! here knows about a transport, these are the payloads carried across it.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Telecommand definitions
pub mod tc;

/// Command and response definitions for equipment (like the hand)
pub mod eqpt;

//! Archive of the published joint states

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::warn;

use comms_if::eqpt::hand::JointState;
use hand_lib::hand_ctrl::JointStateObserver;
use util::{
    archive::{ArchiveError, Archived, Archiver},
    session::Session,
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Writes every published joint state to `hand_ctrl/joint_states.csv`.
pub struct JointStateArchive {
    archiver: Archiver,
    latest: Option<JointState>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl JointStateArchive {
    pub fn new(session: &Session, num_joints: usize) -> Result<Self, ArchiveError> {
        let mut header = vec![String::from("seq")];
        header.extend((0..num_joints).map(|j| format!("joint_{}_deg", j)));
        let header: Vec<&str> = header.iter().map(|s| s.as_str()).collect();

        Ok(Self {
            archiver: Archiver::from_path(session, "hand_ctrl/joint_states.csv", &header)?,
            latest: None,
        })
    }
}

impl Archived for JointStateArchive {
    fn write(&mut self) -> Result<(), ArchiveError> {
        let state = match self.latest.take() {
            Some(s) => s,
            None => return Ok(()),
        };

        self.archiver.write_row(
            std::iter::once(state.seq.to_string())
                .chain(state.positions_deg.iter().map(|p| format!("{:.6}", p))),
        )
    }
}

impl JointStateObserver for JointStateArchive {
    fn publish(&mut self, state: &JointState) {
        self.latest = Some(state.clone());

        if let Err(e) = self.write() {
            warn!("Could not archive the joint state: {}", e);
        }
    }
}

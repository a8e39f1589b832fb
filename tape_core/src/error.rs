//! Error types for tape_core

use thiserror::Error;

use crate::entry::VarId;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TapeError {
    #[error("tape capacity of {capacity} entries exceeded; reset the tape before reuse")]
    CapacityExceeded { capacity: u32 },

    #[error("reverse pass requested on an empty tape")]
    EmptyTape,

    #[error("device recording of {merge_counter} entries has not been reconciled")]
    PendingReconcile { merge_counter: u32 },

    #[error("device image is stale: tape counters moved since upload (expected cursor {expected_cursor}, found {found_cursor})")]
    StaleImage {
        expected_cursor: u32,
        found_cursor: u32,
    },

    #[error("tape entry references id {id}, at or beyond next id {next_id}; a value outlived a reset or came from another tape")]
    StaleId { id: VarId, next_id: VarId },

    #[error("output id {id} was never assigned on this tape")]
    UnknownOutput { id: VarId },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, TapeError>;

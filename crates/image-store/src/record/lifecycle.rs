//! Image status transitions
//!
//! `Waiting → Inserting → Inserted | Failed`. Nothing leads back; a fresh
//! attempt starts from a clone, which is a new record at `Waiting`.

use imgpost_common::ImageStatus;
use thiserror::Error;

use super::ImageRecord;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("transition {from} -> {to} is not allowed")]
pub struct TransitionRejected {
    pub from: ImageStatus,
    pub to: ImageStatus,
}

/// Statuses reachable in one step from `from`
pub fn allowed_transitions(from: ImageStatus) -> &'static [ImageStatus] {
    use ImageStatus::*;
    match from {
        Waiting => &[Inserting],
        Inserting => &[Inserted, Failed],
        Inserted => &[],
        Failed => &[],
    }
}

pub fn is_allowed(from: ImageStatus, to: ImageStatus) -> bool {
    allowed_transitions(from).contains(&to)
}

/// Move `record` to `to`. The record is untouched when rejected.
pub fn transition(record: &mut ImageRecord, to: ImageStatus) -> Result<(), TransitionRejected> {
    let from = record.status;
    if !is_allowed(from, to) {
        return Err(TransitionRejected { from, to });
    }

    record.status = to;
    Ok(())
}

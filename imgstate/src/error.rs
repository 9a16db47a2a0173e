use crate::{
    range::{Extent, SubresourceRange},
    record::ResourceId,
    serial::DecodeError,
};

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("resource {id:?} is not tracked (destroyed, or never registered)")]
    StaleResource { id: ResourceId },
    #[error("no ledger entry of resource {id:?} covers {range:?}: the ledger is inconsistent")]
    InvariantViolation { id: ResourceId, range: SubresourceRange },
    #[error("range {range:?} of resource {id:?} does not fit its extent ({extent:?})")]
    RangeResolution {
        id: ResourceId,
        range: SubresourceRange,
        extent: Extent,
    },
    #[error("failed to decode image states")]
    Decode(#[from] DecodeError),
}

impl LedgerError {
    /// Errors that point at a defect in the tracker itself rather than in its input.
    pub fn is_fatal(&self) -> bool {
        matches!(self, LedgerError::InvariantViolation { .. })
    }
}

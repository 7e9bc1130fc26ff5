use thiserror::Error;

/// Two cumulative snapshots that cannot be subtracted.
///
/// Cumulative counts only grow while a handle lives, so a later snapshot holding
/// fewer observations than an earlier one means the snapshots were mixed up. It is
/// reported rather than clamped to zero so the inconsistency is not hidden.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum DiffError {
    /// A histogram bucket holds fewer observations than before
    #[error("bucket {bucket} went from {previous} to {current} observations")]
    BucketCountDecreased {
        /// Bucket index
        bucket: i32,
        /// Count in the earlier snapshot
        previous: u64,
        /// Count in the later snapshot
        current: u64,
    },
    /// The total (or zero bucket) count went down
    #[error("observation count went from {previous} to {current}")]
    CountDecreased {
        /// Count in the earlier snapshot
        previous: u64,
        /// Count in the later snapshot
        current: u64,
    },
}

pub(crate) fn checked_count_diff(previous: u64, current: u64) -> Result<u64, DiffError> {
    current
        .checked_sub(previous)
        .ok_or(DiffError::CountDecreased { previous, current })
}

pub mod memory;
pub mod qdrant;

pub use memory::InMemoryVectorStore;
pub use qdrant::{Distance, QdrantStore};

use crate::error::StoreError;
use std::ops::Range;

pub(crate) fn check_insert_arity(
    texts: usize,
    vectors: usize,
    metadata: usize,
    record_ids: Option<usize>,
) -> Result<(), StoreError> {
    if texts != vectors || texts != metadata {
        return Err(StoreError::ArityMismatch {
            details: format!("texts={texts} vectors={vectors} metadata={metadata}"),
        });
    }

    if let Some(ids) = record_ids {
        if ids != texts {
            return Err(StoreError::ArityMismatch {
                details: format!("record_ids={ids} texts={texts}"),
            });
        }
    }

    Ok(())
}

pub(crate) fn batch_ranges(len: usize, batch_size: usize) -> Vec<Range<usize>> {
    let step = batch_size.max(1);
    (0..len)
        .step_by(step)
        .map(|start| start..(start + step).min(len))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{batch_ranges, check_insert_arity};

    #[test]
    fn arity_check_accepts_matching_lengths() {
        assert!(check_insert_arity(3, 3, 3, None).is_ok());
        assert!(check_insert_arity(3, 3, 3, Some(3)).is_ok());
    }

    #[test]
    fn arity_check_rejects_mismatches() {
        assert!(check_insert_arity(3, 2, 3, None).is_err());
        assert!(check_insert_arity(3, 3, 1, None).is_err());
        assert!(check_insert_arity(3, 3, 3, Some(2)).is_err());
    }

    #[test]
    fn batches_cover_the_whole_range() {
        let ranges = batch_ranges(12, 5);
        assert_eq!(ranges, vec![0..5, 5..10, 10..12]);
    }

    #[test]
    fn zero_batch_size_still_makes_progress() {
        let ranges = batch_ranges(3, 0);
        assert_eq!(ranges.len(), 3);
    }

    #[test]
    fn empty_input_needs_no_batches() {
        assert!(batch_ranges(0, 10).is_empty());
    }
}

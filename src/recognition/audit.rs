//! Recoverability audit over the code's repetition scheme.
//!
//! The anonymity code is written out in interleaved copies: with a
//! stride of 3, cells 0 and 3 hold the same character, as do 1 and 4,
//! and 2 and 5. A cell that neither recognizer could read is tolerable
//! as long as its partner survived. Two failures that are exactly one
//! stride apart wipe out both copies of one character, and with them the
//! whole code.

use crate::core::constants::DEFAULT_REDUNDANCY_STRIDE;

/// True when `failed_indices` contains a pair of positions exactly
/// `stride` apart, i.e. both copies of one character are gone.
///
/// Any other failure pattern, including every cell of a single copy,
/// still leaves one readable instance per character.
pub fn is_unrecoverable(failed_indices: &[usize], stride: usize) -> bool {
    failed_indices.iter().any(|&a| {
        failed_indices
            .iter()
            .any(|&b| b > a && b - a == stride)
    })
}

/// [`is_unrecoverable`] with the standard three-character stride.
pub fn is_unrecoverable_default(failed_indices: &[usize]) -> bool {
    is_unrecoverable(failed_indices, DEFAULT_REDUNDANCY_STRIDE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_failures_is_recoverable() {
        assert!(!is_unrecoverable(&[], 3));
    }

    #[test]
    fn test_single_failure_is_recoverable() {
        assert!(!is_unrecoverable(&[4], 3));
    }

    #[test]
    fn test_paired_failure_one_stride_apart_is_fatal() {
        // Cells 2 and 5 are the two copies of the third character.
        assert!(is_unrecoverable(&[2, 5], 3));
        assert!(is_unrecoverable(&[0, 3], 3));
    }

    #[test]
    fn test_failures_not_one_stride_apart_are_recoverable() {
        assert!(!is_unrecoverable(&[2, 4], 3));
        // One whole copy lost still leaves the other intact.
        assert!(!is_unrecoverable(&[0, 1, 2], 3));
    }

    #[test]
    fn test_order_of_indices_does_not_matter() {
        assert!(is_unrecoverable(&[5, 2], 3));
        assert!(is_unrecoverable(&[1, 0, 4], 3));
    }

    #[test]
    fn test_default_stride_entry_point() {
        assert!(is_unrecoverable_default(&[0, 3]));
        assert!(!is_unrecoverable_default(&[0, 4]));
    }
}

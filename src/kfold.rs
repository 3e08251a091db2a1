//! Deterministic stratified K-fold index selection.
//!
//! Folding is pure over `(labels, cv_splits, cv_index)`: for every class the
//! sample indices are collected in corpus order, cut at integer fence posts,
//! and the requested split picks fold slices by a fixed rotation policy.
//! Because the fence posts do not depend on `cv_index`, the test folds over
//! all `cv_index` values partition each class exactly.
//!
//! The fold-slice rotation (including the zero-to-last-slice aliasing
//! correction for the validation and training folds, and the training loop
//! visiting `cv_splits - 2` folds) is load-bearing and must not be
//! "simplified": downstream experiment results are only comparable across
//! runs because every run selects identical folds.

use crate::emotion::NUM_EMOTIONS;
use crate::set::Set;

/// Integer fence posts cutting `count` samples into `splits` folds.
///
/// `borders[k] = k * count / splits` (floor), matching a
/// `linspace(0, count, splits + 1)` rounded toward zero. Fold `k` (1-based)
/// is the half-open range `[borders[k - 1], borders[k])`.
fn fold_borders(count: usize, splits: usize) -> Vec<usize> {
    (0..=splits).map(|k| k * count / splits).collect()
}

/// Select corpus indices for `which_set` under stratified K-fold
/// cross-validation.
///
/// For each class the folds are numbered 1..=`cv_splits` and the policy is:
///
/// - **Test**: fold `cv_splits - cv_index`.
/// - **Val**: fold `(cv_splits - 1 - cv_index) % cv_splits`, where a result
///   of zero aliases to the last fold.
/// - **Train**: folds `(j - cv_index) % cv_splits` for `j` in
///   `1..=cv_splits - 2`, with the same zero correction.
/// - **All**: the union of the test folds over every `cv_index`, in
///   `cv_index` order.
///
/// The returned indices are sorted ascending (per `cv_index` for `All`).
///
/// # Panics
///
/// Asserts `cv_index < cv_splits`; an out-of-range index is a programming
/// error, not a recoverable condition.
pub fn cross_validation_indices(
    labels: &[u8],
    which_set: Set,
    cv_splits: usize,
    cv_index: usize,
) -> Vec<usize> {
    if which_set == Set::All {
        let mut indices = Vec::new();
        for i in 0..cv_splits {
            indices.extend(cross_validation_indices(labels, Set::Test, cv_splits, i));
        }
        return indices;
    }
    assert!(
        cv_index < cv_splits,
        "cv_index {cv_index} out of range for {cv_splits} splits"
    );

    let mut all_indices = Vec::new();
    for class in 0..NUM_EMOTIONS as u8 {
        let samples: Vec<usize> = labels
            .iter()
            .enumerate()
            .filter_map(|(i, &l)| (l == class).then_some(i))
            .collect();
        let borders = fold_borders(samples.len(), cv_splits);

        let mut take_fold = |k: usize| {
            all_indices.extend_from_slice(&samples[borders[k - 1]..borders[k]]);
        };

        match which_set {
            Set::Test => take_fold(cv_splits - cv_index),
            Set::Val => {
                let mut k = (cv_splits - 1 - cv_index) % cv_splits;
                if k == 0 {
                    k = cv_splits;
                }
                take_fold(k);
            }
            Set::Train => {
                for j in 1..=cv_splits.saturating_sub(2) {
                    let mut k = (j + cv_splits - cv_index) % cv_splits;
                    if k == 0 {
                        k = cv_splits;
                    }
                    take_fold(k);
                }
            }
            Set::All => unreachable!("handled above"),
        }
    }
    all_indices.sort_unstable();
    all_indices
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    /// 10 samples per class, classes interleaved so per-class corpus order is
    /// non-trivial.
    fn interleaved_labels() -> Vec<u8> {
        let mut labels = Vec::new();
        for _ in 0..10 {
            labels.extend(0..NUM_EMOTIONS as u8);
        }
        labels
    }

    #[test]
    fn borders_match_integer_linspace() {
        assert_eq!(fold_borders(10, 5), vec![0, 2, 4, 6, 8, 10]);
        assert_eq!(fold_borders(7, 5), vec![0, 1, 2, 4, 5, 7]);
        assert_eq!(fold_borders(0, 5), vec![0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_folds_partition_every_class() {
        let labels = interleaved_labels();
        let mut seen: HashSet<usize> = HashSet::new();
        let mut total = 0;
        for i in 0..5 {
            let test = cross_validation_indices(&labels, Set::Test, 5, i);
            total += test.len();
            for idx in test {
                assert!(seen.insert(idx), "index {idx} appears in two test folds");
            }
        }
        assert_eq!(total, labels.len(), "test folds must cover the whole corpus");
    }

    #[test]
    fn all_is_union_of_test_folds() {
        let labels = interleaved_labels();
        let mut expected = Vec::new();
        for i in 0..5 {
            expected.extend(cross_validation_indices(&labels, Set::Test, 5, i));
        }
        let all = cross_validation_indices(&labels, Set::All, 5, 0);
        assert_eq!(all, expected);
    }

    #[test]
    fn splits_are_disjoint_within_one_cv_index() {
        let labels = interleaved_labels();
        for i in 0..5 {
            let train = cross_validation_indices(&labels, Set::Train, 5, i);
            let val = cross_validation_indices(&labels, Set::Val, 5, i);
            let test = cross_validation_indices(&labels, Set::Test, 5, i);
            let train: HashSet<_> = train.into_iter().collect();
            let val: HashSet<_> = val.into_iter().collect();
            let test: HashSet<_> = test.into_iter().collect();
            assert!(train.is_disjoint(&val), "train/val overlap at cv_index {i}");
            assert!(train.is_disjoint(&test), "train/test overlap at cv_index {i}");
            assert!(val.is_disjoint(&test), "val/test overlap at cv_index {i}");
        }
    }

    #[test]
    fn train_visits_splits_minus_two_folds() {
        // 70 samples, 5 splits: per class 10 samples → folds of 2.
        // Train takes 3 of the 5 folds per class.
        let labels = interleaved_labels();
        let train = cross_validation_indices(&labels, Set::Train, 5, 0);
        assert_eq!(train.len(), 7 * 3 * 2);
    }

    #[test]
    fn indices_are_sorted_ascending() {
        let labels = interleaved_labels();
        for &set in &[Set::Train, Set::Val, Set::Test] {
            for i in 0..5 {
                let indices = cross_validation_indices(&labels, set, 5, i);
                assert!(indices.windows(2).all(|w| w[0] < w[1]));
            }
        }
    }

    #[test]
    fn selection_is_deterministic() {
        let labels = interleaved_labels();
        let a = cross_validation_indices(&labels, Set::Train, 5, 2);
        let b = cross_validation_indices(&labels, Set::Train, 5, 2);
        assert_eq!(a, b);
    }

    #[test]
    fn val_aliases_to_last_fold_at_final_cv_index() {
        // At cv_index == cv_splits - 1 the rotation yields 0, which aliases
        // to the last fold; test occupies fold 1, so they stay disjoint.
        let labels = interleaved_labels();
        let val = cross_validation_indices(&labels, Set::Val, 5, 4);
        let test = cross_validation_indices(&labels, Set::Test, 5, 4);
        let val: HashSet<_> = val.into_iter().collect();
        let test: HashSet<_> = test.into_iter().collect();
        assert!(!val.is_empty());
        assert!(val.is_disjoint(&test));
    }

    #[test]
    #[should_panic(expected = "cv_index")]
    fn out_of_range_cv_index_panics() {
        let labels = interleaved_labels();
        cross_validation_indices(&labels, Set::Test, 5, 5);
    }

    #[test]
    fn uneven_class_counts_still_partition() {
        // Class sizes not divisible by the split count.
        let mut labels = Vec::new();
        for c in 0..NUM_EMOTIONS as u8 {
            for _ in 0..(7 + c as usize) {
                labels.push(c);
            }
        }
        let mut seen: HashSet<usize> = HashSet::new();
        for i in 0..5 {
            for idx in cross_validation_indices(&labels, Set::Test, 5, i) {
                assert!(seen.insert(idx));
            }
        }
        assert_eq!(seen.len(), labels.len());
    }
}

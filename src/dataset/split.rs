//! Reproducible row partitioning.

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Row indices of a train/test partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainTestIndices {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Shuffle `0..n_rows` with a seeded RNG and hold out `ceil(test_size * n)` rows.
///
/// The held-out rows are the head of the permutation, the training rows the
/// tail. The same `(n_rows, test_size, seed)` always yields the same split.
pub fn train_test_split(n_rows: usize, test_size: f64, seed: u64) -> TrainTestIndices {
    let mut indices: Vec<usize> = (0..n_rows).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let n_test = ((n_rows as f64) * test_size).ceil() as usize;
    let n_test = n_test.min(n_rows);
    let train = indices.split_off(n_test);

    TrainTestIndices {
        train,
        test: indices,
    }
}

/// Contiguous, unshuffled K-fold partition of `0..n_rows`.
///
/// Returns `(train, validation)` index pairs. The first `n_rows % k` folds get
/// one extra row. Requires `2 <= k <= n_rows`.
pub fn k_fold(n_rows: usize, k: usize) -> Vec<(Vec<usize>, Vec<usize>)> {
    assert!(k >= 2 && k <= n_rows, "k_fold needs 2 <= k <= n_rows");

    let base = n_rows / k;
    let extra = n_rows % k;
    let mut folds = Vec::with_capacity(k);
    let mut start = 0;

    for fold in 0..k {
        let size = base + usize::from(fold < extra);
        let end = start + size;
        let validation: Vec<usize> = (start..end).collect();
        let train: Vec<usize> = (0..start).chain(end..n_rows).collect();
        folds.push((train, validation));
        start = end;
    }

    folds
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_sizes() {
        let split = train_test_split(200, 0.2, 42);
        assert_eq!(split.test.len(), 40);
        assert_eq!(split.train.len(), 160);
    }

    #[test]
    fn test_split_rounds_test_up() {
        let split = train_test_split(26, 0.2, 42);
        assert_eq!(split.test.len(), 6);
        assert_eq!(split.train.len(), 20);
    }

    #[test]
    fn test_split_is_partition() {
        let split = train_test_split(50, 0.2, 1);
        let mut all: Vec<usize> = split.train.iter().chain(split.test.iter()).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn test_split_is_deterministic() {
        assert_eq!(train_test_split(100, 0.2, 42), train_test_split(100, 0.2, 42));
        assert_ne!(train_test_split(100, 0.2, 42), train_test_split(100, 0.2, 43));
    }

    #[test]
    fn test_k_fold_sizes() {
        let folds = k_fold(22, 5);
        let sizes: Vec<usize> = folds.iter().map(|(_, v)| v.len()).collect();
        assert_eq!(sizes, vec![5, 5, 4, 4, 4]);
        for (train, validation) in &folds {
            assert_eq!(train.len() + validation.len(), 22);
            assert!(validation.iter().all(|v| !train.contains(v)));
        }
    }

    #[test]
    fn test_k_fold_covers_every_row_once() {
        let folds = k_fold(10, 5);
        let mut seen: Vec<usize> = folds.iter().flat_map(|(_, v)| v.clone()).collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..10).collect::<Vec<_>>());
    }

    #[test]
    #[should_panic]
    fn test_k_fold_too_many_folds() {
        k_fold(3, 5);
    }
}

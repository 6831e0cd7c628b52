use crate::criterion::{self, Criterion};
use arboria_core::Tensor;

const MIN_GAIN: f64 = 1e-12;

/// A winning split: which feature, at which threshold, with what objective
/// value (impurity for classification, SSE for regression) the two children
/// attain together.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BestSplit {
    pub feature: u32,
    pub threshold: f32,
    pub score: f64,
}

/// Search `candidate_features` for the best axis-aligned split of
/// `rows` on a classification target.
///
/// For each feature, `rows` is sorted by that feature's value (on a throwaway
/// copy — the caller's owned index buffer is untouched until a winner is
/// chosen and partitioned), then scanned left to right with an incrementally
/// maintained class-count histogram so each candidate threshold costs O(1)
/// amortized rather than a full re-scan. Ties are broken by ascending feature
/// index, then ascending threshold, which falls out naturally from iterating
/// both in ascending order and only replacing the incumbent on a strict
/// improvement.
pub fn best_split_classification(
    x: &Tensor<f32>,
    y: &[i32],
    rows: &[u32],
    candidate_features: &[u32],
    n_classes: u32,
    criterion: Criterion,
) -> Option<BestSplit> {
    let n = rows.len() as u32;
    if n < 2 {
        return None;
    }

    let mut total_counts = vec![0u32; n_classes as usize];
    for &r in rows {
        total_counts[y[r as usize] as usize] += 1;
    }
    let parent_score = criterion::impurity(criterion, &total_counts, n);

    let mut best: Option<BestSplit> = None;
    let mut sorted = rows.to_vec();

    for &feature in candidate_features {
        sorted.clone_from_slice(rows);
        sorted.sort_by(|&a, &b| {
            let va = x.row_slice(a as usize).unwrap()[feature as usize];
            let vb = x.row_slice(b as usize).unwrap()[feature as usize];
            va.partial_cmp(&vb).unwrap()
        });

        let mut left_counts = vec![0u32; n_classes as usize];
        let mut right_counts = total_counts.clone();
        let mut left_n = 0u32;

        for i in 0..sorted.len() - 1 {
            let row = sorted[i] as usize;
            let class = y[row] as usize;
            left_counts[class] += 1;
            right_counts[class] -= 1;
            left_n += 1;

            let v_here = x.row_slice(row).unwrap()[feature as usize];
            let v_next = x.row_slice(sorted[i + 1] as usize).unwrap()[feature as usize];
            if v_here == v_next {
                continue; // can't split between equal values
            }

            let right_n = n - left_n;
            let left_score = criterion::impurity(criterion, &left_counts, left_n);
            let right_score = criterion::impurity(criterion, &right_counts, right_n);
            let weighted = (left_n as f64 * left_score + right_n as f64 * right_score) / n as f64;

            let improves = match &best {
                None => true,
                Some(b) => weighted < b.score,
            };
            if improves {
                let threshold = (v_here + v_next) / 2.0;
                best = Some(BestSplit {
                    feature,
                    threshold,
                    score: weighted,
                });
            }
        }
    }

    best.filter(|b| parent_score - b.score > MIN_GAIN)
}

/// Search `candidate_features` for the best axis-aligned split of `rows` on
/// a regression target, using running sum/sum-of-squares instead of a class
/// histogram. See [`best_split_classification`] for the shared sort/scan
/// structure.
pub fn best_split_regression(
    x: &Tensor<f32>,
    y: &[f32],
    rows: &[u32],
    candidate_features: &[u32],
) -> Option<BestSplit> {
    let n = rows.len() as u32;
    if n < 2 {
        return None;
    }

    let total_sum: f64 = rows.iter().map(|&r| y[r as usize] as f64).sum();
    let total_sq: f64 = rows.iter().map(|&r| (y[r as usize] as f64).powi(2)).sum();
    let parent_score = criterion::sse(total_sum, total_sq, n);

    let mut best: Option<BestSplit> = None;
    let mut sorted = rows.to_vec();

    for &feature in candidate_features {
        sorted.clone_from_slice(rows);
        sorted.sort_by(|&a, &b| {
            let va = x.row_slice(a as usize).unwrap()[feature as usize];
            let vb = x.row_slice(b as usize).unwrap()[feature as usize];
            va.partial_cmp(&vb).unwrap()
        });

        let mut left_sum = 0f64;
        let mut left_sq = 0f64;
        let mut left_n = 0u32;

        for i in 0..sorted.len() - 1 {
            let row = sorted[i] as usize;
            let v = y[row] as f64;
            left_sum += v;
            left_sq += v * v;
            left_n += 1;

            let v_here = x.row_slice(row).unwrap()[feature as usize];
            let v_next = x.row_slice(sorted[i + 1] as usize).unwrap()[feature as usize];
            if v_here == v_next {
                continue;
            }

            let right_n = n - left_n;
            let right_sum = total_sum - left_sum;
            let right_sq = total_sq - left_sq;
            let weighted = criterion::sse(left_sum, left_sq, left_n)
                + criterion::sse(right_sum, right_sq, right_n);

            let improves = match &best {
                None => true,
                Some(b) => weighted < b.score,
            };
            if improves {
                let threshold = (v_here + v_next) / 2.0;
                best = Some(BestSplit {
                    feature,
                    threshold,
                    score: weighted,
                });
            }
        }
    }

    best.filter(|b| parent_score - b.score > MIN_GAIN)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification_split_perfect_separation() {
        let x = Tensor::from_vec2d(&[
            vec![1.0f32, 2.0, 1.0],
            vec![4.0, 5.0, 5.0],
            vec![7.0, 8.0, 9.0],
        ])
        .unwrap();
        let y = [0i32, 1, 1];
        let rows = [0u32, 1, 2];
        let features = [0u32, 1, 2];
        let split =
            best_split_classification(&x, &y, &rows, &features, 2, Criterion::Gini).unwrap();
        assert!(split.threshold > 1.0 && split.threshold < 4.0);
    }

    #[test]
    fn test_regression_split_matches_midpoint() {
        let x = Tensor::from_vec2d(&[vec![0.0f32], vec![0.0], vec![10.0], vec![10.0]]).unwrap();
        let y = [1.0f32, 3.0, 5.0, 7.0];
        let rows = [0u32, 1, 2, 3];
        let features = [0u32];
        let split = best_split_regression(&x, &y, &rows, &features).unwrap();
        assert_eq!(split.feature, 0);
        assert!((split.threshold - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_no_split_on_constant_feature() {
        let x = Tensor::from_vec2d(&[vec![1.0f32], vec![1.0], vec![1.0]]).unwrap();
        let y = [0i32, 1, 0];
        let rows = [0u32, 1, 2];
        let features = [0u32];
        assert!(best_split_classification(&x, &y, &rows, &features, 2, Criterion::Gini).is_none());
    }

    #[test]
    fn test_no_split_below_two_rows() {
        let x = Tensor::from_vec2d(&[vec![1.0f32]]).unwrap();
        let y = [0i32];
        let rows = [0u32];
        let features = [0u32];
        assert!(best_split_classification(&x, &y, &rows, &features, 2, Criterion::Gini).is_none());
    }
}

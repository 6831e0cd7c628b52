use arboria_core::{ArboriaError, Tensor};
use rand::rngs::StdRng;
use rand::seq::index::sample as sample_indices;

use crate::criterion::Criterion;
use crate::split::{best_split_classification, best_split_regression};

/// A fitted classification tree, stored as a flat array of nodes. Node 0 is
/// always the root; every internal node's children have a strictly larger
/// index than their parent, since a node's index is reserved with a
/// placeholder before its children are built and patched in afterwards.
#[derive(Debug, Clone)]
enum ClsNode {
    Internal {
        feature: u32,
        threshold: f32,
        left: u32,
        right: u32,
    },
    Leaf {
        class: u32,
        probs: Vec<f32>,
    },
}

#[derive(Debug, Clone)]
enum RegNode {
    Internal {
        feature: u32,
        threshold: f32,
        left: u32,
        right: u32,
    },
    Leaf {
        value: f32,
    },
}

/// Index of the largest value, lowest index wins ties. `Iterator::max_by`
/// keeps the *last* equal-maximum element, which would break ties toward the
/// highest class index; this scans forward and only replaces the incumbent
/// on a strict improvement.
pub(crate) fn argmax_first(values: &[f32]) -> usize {
    let mut best = 0usize;
    let mut best_v = values[0];
    for (i, &v) in values.iter().enumerate().skip(1) {
        if v > best_v {
            best = i;
            best_v = v;
        }
    }
    best
}

/// Physically partition an owned row-index buffer around `threshold` on
/// `feature` in a single Lomuto-style swap pass: rows with value <=
/// threshold are moved to the front, the rest to the back. No index is ever
/// duplicated — the tail is handed off to the right side via `split_off`.
fn partition_rows(mut rows: Vec<u32>, x: &Tensor<f32>, feature: u32, threshold: f32) -> (Vec<u32>, Vec<u32>) {
    let mut boundary = 0usize;
    for j in 0..rows.len() {
        let v = x.row_slice(rows[j] as usize).unwrap()[feature as usize];
        if v <= threshold {
            rows.swap(boundary, j);
            boundary += 1;
        }
    }
    let right = rows.split_off(boundary);
    (rows, right)
}

/// Candidate feature set for one split decision: all features for a
/// standalone tree, or a fresh random subsample of size `max_features` when
/// training inside a forest.
fn candidate_features(n_features: u32, max_features: Option<u32>, rng: Option<&mut StdRng>) -> Vec<u32> {
    match (max_features, rng) {
        (Some(k), Some(rng)) if k < n_features => {
            sample_indices(rng, n_features as usize, k as usize)
                .into_iter()
                .map(|i| i as u32)
                .collect()
        }
        _ => (0..n_features).collect(),
    }
}

#[allow(clippy::too_many_arguments)]
fn build_classifier_node(
    nodes: &mut Vec<ClsNode>,
    x: &Tensor<f32>,
    y: &[i32],
    rows: Vec<u32>,
    depth: u32,
    max_depth: Option<u32>,
    min_sample_split: u32,
    n_features: u32,
    n_classes: u32,
    criterion: Criterion,
    max_features: Option<u32>,
    mut rng: Option<&mut StdRng>,
) -> u32 {
    let idx = nodes.len() as u32;
    nodes.push(ClsNode::Leaf { class: 0, probs: vec![] });

    let make_leaf = |rows: &[u32]| -> ClsNode {
        let mut counts = vec![0u32; n_classes as usize];
        for &r in rows {
            counts[y[r as usize] as usize] += 1;
        }
        let n = rows.len() as f32;
        let probs: Vec<f32> = counts.iter().map(|&c| c as f32 / n).collect();
        let class = argmax_first(&probs) as u32;
        ClsNode::Leaf { class, probs }
    };

    let all_same_class = rows.windows(2).all(|w| y[w[0] as usize] == y[w[1] as usize]);
    let depth_exhausted = max_depth.is_some_and(|d| depth >= d);

    if rows.len() < 2 || rows.len() < min_sample_split as usize || depth_exhausted || all_same_class {
        nodes[idx as usize] = make_leaf(&rows);
        return idx;
    }

    let features = candidate_features(n_features, max_features, rng.as_deref_mut());
    let split = best_split_classification(x, y, &rows, &features, n_classes, criterion);

    match split {
        None => {
            nodes[idx as usize] = make_leaf(&rows);
        }
        Some(s) => {
            let (left_rows, right_rows) = partition_rows(rows, x, s.feature, s.threshold);
            let left = build_classifier_node(
                nodes, x, y, left_rows, depth + 1, max_depth, min_sample_split, n_features,
                n_classes, criterion, max_features, rng.as_deref_mut(),
            );
            let right = build_classifier_node(
                nodes, x, y, right_rows, depth + 1, max_depth, min_sample_split, n_features,
                n_classes, criterion, max_features, rng,
            );
            nodes[idx as usize] = ClsNode::Internal {
                feature: s.feature,
                threshold: s.threshold,
                left,
                right,
            };
        }
    }
    idx
}

#[allow(clippy::too_many_arguments)]
fn build_regressor_node(
    nodes: &mut Vec<RegNode>,
    x: &Tensor<f32>,
    y: &[f32],
    rows: Vec<u32>,
    depth: u32,
    max_depth: Option<u32>,
    min_sample_split: u32,
    n_features: u32,
    max_features: Option<u32>,
    mut rng: Option<&mut StdRng>,
) -> u32 {
    let idx = nodes.len() as u32;
    nodes.push(RegNode::Leaf { value: 0.0 });

    let mean = |rows: &[u32]| -> f32 {
        rows.iter().map(|&r| y[r as usize]).sum::<f32>() / rows.len() as f32
    };
    let variance = |rows: &[u32], m: f32| -> f64 {
        rows.iter()
            .map(|&r| ((y[r as usize] - m) as f64).powi(2))
            .sum::<f64>()
            / rows.len() as f64
    };

    let m = mean(&rows);
    let depth_exhausted = max_depth.is_some_and(|d| depth >= d);

    if rows.len() < 2
        || rows.len() < min_sample_split as usize
        || depth_exhausted
        || variance(&rows, m) < 1e-12
    {
        nodes[idx as usize] = RegNode::Leaf { value: m };
        return idx;
    }

    let features = candidate_features(n_features, max_features, rng.as_deref_mut());
    let split = best_split_regression(x, y, &rows, &features);

    match split {
        None => {
            nodes[idx as usize] = RegNode::Leaf { value: m };
        }
        Some(s) => {
            let (left_rows, right_rows) = partition_rows(rows, x, s.feature, s.threshold);
            let left = build_regressor_node(
                nodes, x, y, left_rows, depth + 1, max_depth, min_sample_split, n_features,
                max_features, rng.as_deref_mut(),
            );
            let right = build_regressor_node(
                nodes, x, y, right_rows, depth + 1, max_depth, min_sample_split, n_features,
                max_features, rng,
            );
            nodes[idx as usize] = RegNode::Internal {
                feature: s.feature,
                threshold: s.threshold,
                left,
                right,
            };
        }
    }
    idx
}

fn validate_xy_len(x: &Tensor<f32>, y_len: usize) -> Result<(u32, u32), ArboriaError> {
    if x.ndim() != 2 {
        return Err(ArboriaError::TypeError(format!(
            "expected a 2-D feature matrix, got {} dimensions",
            x.ndim()
        )));
    }
    let n_rows = x.shape().dims()[0];
    let n_features = x.shape().dims()[1];
    if n_rows != y_len {
        return Err(ArboriaError::InvalidArgument(format!(
            "x has {n_rows} rows but y has {y_len} labels"
        )));
    }
    if n_rows == 0 {
        return Err(ArboriaError::InvalidArgument("cannot fit on an empty dataset".to_string()));
    }
    Ok((n_rows as u32, n_features as u32))
}

/// A CART classification tree trained with Gini or entropy impurity.
#[derive(Debug, Clone)]
pub struct DecisionTreeClassifier {
    max_depth: Option<u32>,
    min_sample_split: u32,
    nodes: Option<Vec<ClsNode>>,
    n_classes: u32,
}

impl DecisionTreeClassifier {
    pub fn new(max_depth: Option<u32>, min_sample_split: Option<u32>) -> Self {
        DecisionTreeClassifier {
            max_depth,
            min_sample_split: min_sample_split.unwrap_or(2),
            nodes: None,
            n_classes: 0,
        }
    }

    pub fn fit(&mut self, x: &Tensor<f32>, y: &[i32], criterion: &str) -> Result<(), ArboriaError> {
        let (n_rows, n_features) = validate_xy_len(x, y.len())?;
        let criterion = Criterion::parse(criterion)?;
        if !criterion.is_classification() {
            return Err(ArboriaError::InvalidArgument(format!(
                "{criterion:?} is not a classification criterion"
            )));
        }
        let n_classes = y.iter().copied().max().map(|m| m as u32 + 1).unwrap_or(0);
        if n_classes == 0 {
            return Err(ArboriaError::InvalidArgument("y must contain at least one class".to_string()));
        }

        let rows: Vec<u32> = (0..n_rows).collect();
        let mut nodes = Vec::new();
        build_classifier_node(
            &mut nodes, x, y, rows, 0, self.max_depth, self.min_sample_split, n_features,
            n_classes, criterion, None, None,
        );
        self.nodes = Some(nodes);
        self.n_classes = n_classes;
        Ok(())
    }

    fn traverse<'a>(&self, nodes: &'a [ClsNode], row: &[f32]) -> &'a ClsNode {
        let mut idx = 0usize;
        loop {
            match &nodes[idx] {
                ClsNode::Leaf { .. } => return &nodes[idx],
                ClsNode::Internal { feature, threshold, left, right } => {
                    idx = if row[*feature as usize] <= *threshold { *left as usize } else { *right as usize };
                }
            }
        }
    }

    pub fn predict(&self, x: &Tensor<f32>) -> Result<Vec<i32>, ArboriaError> {
        let probs = self.predict_proba(x)?;
        Ok(probs.iter().map(|row| argmax_first(row) as i32).collect())
    }

    pub fn predict_proba(&self, x: &Tensor<f32>) -> Result<Vec<Vec<f32>>, ArboriaError> {
        let nodes = self.nodes.as_ref().ok_or_else(|| {
            ArboriaError::InvalidArgument("model must be fit before predict".to_string())
        })?;
        if x.ndim() != 2 {
            return Err(ArboriaError::TypeError(format!(
                "expected a 2-D feature matrix, got {} dimensions",
                x.ndim()
            )));
        }
        let n_rows = x.shape().dims()[0];
        let mut out = Vec::with_capacity(n_rows);
        for r in 0..n_rows {
            let row = x.row_slice(r).unwrap();
            match self.traverse(nodes, row) {
                ClsNode::Leaf { probs, .. } => out.push(probs.clone()),
                ClsNode::Internal { .. } => unreachable!("traverse always stops at a leaf"),
            }
        }
        Ok(out)
    }
}

/// A CART regression tree trained by minimizing sum-of-squared-error.
#[derive(Debug, Clone)]
pub struct DecisionTreeRegressor {
    max_depth: Option<u32>,
    min_sample_split: u32,
    nodes: Option<Vec<RegNode>>,
}

impl DecisionTreeRegressor {
    pub fn new(max_depth: Option<u32>, min_sample_split: Option<u32>) -> Self {
        DecisionTreeRegressor {
            max_depth,
            min_sample_split: min_sample_split.unwrap_or(2),
            nodes: None,
        }
    }

    pub fn fit(&mut self, x: &Tensor<f32>, y: &[f32]) -> Result<(), ArboriaError> {
        let (n_rows, n_features) = validate_xy_len(x, y.len())?;
        let rows: Vec<u32> = (0..n_rows).collect();
        let mut nodes = Vec::new();
        build_regressor_node(
            &mut nodes, x, y, rows, 0, self.max_depth, self.min_sample_split, n_features, None, None,
        );
        self.nodes = Some(nodes);
        Ok(())
    }

    fn traverse(&self, nodes: &[RegNode], row: &[f32]) -> f32 {
        let mut idx = 0usize;
        loop {
            match &nodes[idx] {
                RegNode::Leaf { value } => return *value,
                RegNode::Internal { feature, threshold, left, right } => {
                    idx = if row[*feature as usize] <= *threshold { *left as usize } else { *right as usize };
                }
            }
        }
    }

    pub fn predict(&self, x: &Tensor<f32>) -> Result<Vec<f32>, ArboriaError> {
        let nodes = self.nodes.as_ref().ok_or_else(|| {
            ArboriaError::InvalidArgument("model must be fit before predict".to_string())
        })?;
        if x.ndim() != 2 {
            return Err(ArboriaError::TypeError(format!(
                "expected a 2-D feature matrix, got {} dimensions",
                x.ndim()
            )));
        }
        let n_rows = x.shape().dims()[0];
        let mut out = Vec::with_capacity(n_rows);
        for r in 0..n_rows {
            out.push(self.traverse(nodes, x.row_slice(r).unwrap()));
        }
        Ok(out)
    }
}

/// Crate-internal entry point used by the forest trainer: builds one
/// classification tree over a bootstrap row sample with per-split feature
/// resampling.
#[allow(clippy::too_many_arguments)]
pub(crate) fn fit_classifier_tree(
    x: &Tensor<f32>,
    y: &[i32],
    rows: Vec<u32>,
    max_depth: Option<u32>,
    min_sample_split: u32,
    n_features: u32,
    n_classes: u32,
    criterion: Criterion,
    max_features: u32,
    rng: &mut StdRng,
) -> DecisionTreeClassifier {
    let mut nodes = Vec::new();
    build_classifier_node(
        &mut nodes, x, y, rows, 0, max_depth, min_sample_split, n_features, n_classes, criterion,
        Some(max_features), Some(rng),
    );
    DecisionTreeClassifier {
        max_depth,
        min_sample_split,
        nodes: Some(nodes),
        n_classes,
    }
}

/// Crate-internal entry point used by the forest trainer: builds one
/// regression tree over a bootstrap row sample with per-split feature
/// resampling.
#[allow(clippy::too_many_arguments)]
pub(crate) fn fit_regressor_tree(
    x: &Tensor<f32>,
    y: &[f32],
    rows: Vec<u32>,
    max_depth: Option<u32>,
    min_sample_split: u32,
    n_features: u32,
    max_features: u32,
    rng: &mut StdRng,
) -> DecisionTreeRegressor {
    let mut nodes = Vec::new();
    build_regressor_node(
        &mut nodes, x, y, rows, 0, max_depth, min_sample_split, n_features, Some(max_features), Some(rng),
    );
    DecisionTreeRegressor { max_depth, min_sample_split, nodes: Some(nodes) }
}

pub(crate) fn classifier_predict_proba_rows(
    tree: &DecisionTreeClassifier,
    x: &Tensor<f32>,
) -> Vec<Vec<f32>> {
    tree.predict_proba(x).expect("internal trees are always fit and given valid 2-D input")
}

pub(crate) fn regressor_predict_rows(tree: &DecisionTreeRegressor, x: &Tensor<f32>) -> Vec<f32> {
    tree.predict(x).expect("internal trees are always fit and given valid 2-D input")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classifier_perfect_separation() {
        let x = Tensor::from_vec2d(&[
            vec![1.0f32, 2.0, 1.0],
            vec![4.0, 5.0, 5.0],
            vec![7.0, 8.0, 9.0],
        ])
        .unwrap();
        let y = [0i32, 1, 1];
        let mut tree = DecisionTreeClassifier::new(None, None);
        tree.fit(&x, &y, "gini").unwrap();
        assert_eq!(tree.predict(&x).unwrap(), vec![0, 1, 1]);
    }

    #[test]
    fn test_regressor_sse_split() {
        let x = Tensor::from_vec2d(&[vec![0.0f32], vec![0.0], vec![10.0], vec![10.0]]).unwrap();
        let y = [1.0f32, 3.0, 5.0, 7.0];
        let mut tree = DecisionTreeRegressor::new(Some(1), None);
        tree.fit(&x, &y).unwrap();
        let preds = tree.predict(&x).unwrap();
        assert!((preds[0] - 2.0).abs() < 1e-5);
        assert!((preds[1] - 2.0).abs() < 1e-5);
        assert!((preds[2] - 6.0).abs() < 1e-5);
        assert!((preds[3] - 6.0).abs() < 1e-5);
    }

    #[test]
    fn test_regressor_constant_feature_single_leaf() {
        let x = Tensor::from_vec2d(&[vec![1.0f32], vec![1.0], vec![1.0]]).unwrap();
        let y = [1.0f32, 2.0, 3.0];
        let mut tree = DecisionTreeRegressor::new(None, None);
        tree.fit(&x, &y).unwrap();
        let preds = tree.predict(&x).unwrap();
        assert!(preds.iter().all(|&p| (p - 2.0).abs() < 1e-5));
    }

    #[test]
    fn test_min_sample_split_changes_predictions() {
        let x = Tensor::from_vec2d(&[
            vec![1.0f32], vec![2.0], vec![3.0], vec![4.0], vec![5.0], vec![6.0],
        ])
        .unwrap();
        let y = [0i32, 0, 0, 1, 1, 1];
        let mut loose = DecisionTreeClassifier::new(None, Some(2));
        loose.fit(&x, &y, "gini").unwrap();
        let mut strict = DecisionTreeClassifier::new(None, Some(6));
        strict.fit(&x, &y, "gini").unwrap();
        assert_ne!(loose.predict(&x).unwrap(), strict.predict(&x).unwrap());
    }

    #[test]
    fn test_predict_before_fit_errors() {
        let x = Tensor::from_vec2d(&[vec![1.0f32]]).unwrap();
        let tree = DecisionTreeClassifier::new(None, None);
        assert!(tree.predict(&x).is_err());
    }

    #[test]
    fn test_fit_rejects_mismatched_lengths() {
        let x = Tensor::from_vec2d(&[vec![1.0f32], vec![2.0]]).unwrap();
        let y = [0i32];
        let mut tree = DecisionTreeClassifier::new(None, None);
        assert!(tree.fit(&x, &y, "gini").is_err());
    }

    #[test]
    fn test_probabilities_sum_to_one() {
        let x = Tensor::from_vec2d(&[vec![1.0f32], vec![2.0], vec![3.0]]).unwrap();
        let y = [0i32, 1, 0];
        let mut tree = DecisionTreeClassifier::new(Some(3), None);
        tree.fit(&x, &y, "entropy").unwrap();
        for row in tree.predict_proba(&x).unwrap() {
            let sum: f32 = row.iter().sum();
            assert!((sum - 1.0).abs() < 1e-5);
        }
    }
}

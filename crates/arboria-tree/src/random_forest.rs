use arboria_core::{ArboriaError, Tensor};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use crate::bootstrap::bootstrap_sample;
use crate::criterion::Criterion;
use crate::decision_tree::{
    argmax_first, classifier_predict_proba_rows, fit_classifier_tree, fit_regressor_tree,
    regressor_predict_rows, DecisionTreeClassifier, DecisionTreeRegressor,
};
use crate::params::{validate_forest_params, MaxFeatures};

/// Build the rayon thread pool a single `fit` call runs under.
///
/// `n_jobs == -1` uses all available cores (`std::thread::available_parallelism`);
/// any positive value pins the pool to that many threads; anything else is
/// rejected as an invalid argument.
fn build_pool(n_jobs: i32) -> Result<rayon::ThreadPool, ArboriaError> {
    let threads = match n_jobs {
        -1 => std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1),
        n if n > 0 => n as usize,
        n => {
            return Err(ArboriaError::InvalidArgument(format!(
                "n_jobs must be a positive integer or -1 (all cores); got {n}"
            )))
        }
    };
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .map_err(|e| ArboriaError::TrainFailed(e.to_string()))
}

/// Draw one independent seed per tree from a master RNG before any parallel
/// work starts, so the seed assigned to tree `i` never depends on thread
/// count or scheduling order — only on `seed` and `i`.
fn draw_tree_seeds(seed: u64, n_estimators: u32) -> Vec<u64> {
    let mut master = StdRng::seed_from_u64(seed);
    (0..n_estimators).map(|_| master.gen::<u64>()).collect()
}

fn validate_xy(x: &Tensor<f32>, y_len: usize) -> Result<(u32, u32), ArboriaError> {
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

/// An ensemble of bagged CART classification trees.
pub struct RandomForestClassifier {
    n_estimators: u32,
    max_features: MaxFeatures,
    max_depth: Option<u32>,
    max_samples: f32,
    min_sample_split: u32,
    n_jobs: i32,
    seed: u64,
    trees: Option<Vec<DecisionTreeClassifier>>,
    oob_masks: Option<Vec<Vec<bool>>>,
    n_classes: u32,
}

impl RandomForestClassifier {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        n_estimators: u32,
        max_features_raw: i64,
        max_depth: Option<u32>,
        max_samples: f32,
        min_sample_split: Option<u32>,
        n_jobs: i32,
        seed: u64,
    ) -> Result<Self, ArboriaError> {
        validate_forest_params(n_estimators, max_depth, max_samples, min_sample_split)?;
        let max_features = MaxFeatures::from_raw(max_features_raw)?;
        Ok(RandomForestClassifier {
            n_estimators,
            max_features,
            max_depth,
            max_samples,
            min_sample_split: min_sample_split.unwrap_or(2),
            n_jobs,
            seed,
            trees: None,
            oob_masks: None,
            n_classes: 0,
        })
    }

    pub fn get_max_samples(&self) -> f32 {
        self.max_samples
    }

    pub fn fit(&mut self, x: &Tensor<f32>, y: &[i32], criterion: &str) -> Result<(), ArboriaError> {
        let (n_rows, n_features) = validate_xy(x, y.len())?;
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
        let mtry = self.max_features.resolve(n_features);

        let pool = build_pool(self.n_jobs)?;
        let seeds = draw_tree_seeds(self.seed, self.n_estimators);

        let (trees, masks): (Vec<_>, Vec<_>) = pool.install(|| {
            seeds
                .into_par_iter()
                .map(|tree_seed| {
                    let mut rng = StdRng::seed_from_u64(tree_seed);
                    let (rows, oob_mask) = bootstrap_sample(n_rows, self.max_samples, &mut rng);
                    let tree = fit_classifier_tree(
                        x, y, rows, self.max_depth, self.min_sample_split, n_features, n_classes,
                        criterion, mtry, &mut rng,
                    );
                    (tree, oob_mask)
                })
                .collect::<Vec<_>>()
        })
        .into_iter()
        .unzip();

        self.trees = Some(trees);
        self.oob_masks = Some(masks);
        self.n_classes = n_classes;
        Ok(())
    }

    fn trees(&self) -> Result<&[DecisionTreeClassifier], ArboriaError> {
        self.trees
            .as_deref()
            .ok_or_else(|| ArboriaError::InvalidArgument("model must be fit before predict".to_string()))
    }

    pub fn predict_proba(&self, x: &Tensor<f32>) -> Result<Vec<Vec<f32>>, ArboriaError> {
        let trees = self.trees()?;
        let per_tree: Vec<Vec<Vec<f32>>> = trees.iter().map(|t| classifier_predict_proba_rows(t, x)).collect();
        let n_rows = per_tree[0].len();
        let mut out = vec![vec![0f32; self.n_classes as usize]; n_rows];
        for tree_probs in &per_tree {
            for (row, probs) in tree_probs.iter().enumerate() {
                for (c, p) in probs.iter().enumerate() {
                    out[row][c] += p;
                }
            }
        }
        let n_trees = trees.len() as f32;
        for row in out.iter_mut() {
            for v in row.iter_mut() {
                *v /= n_trees;
            }
        }
        Ok(out)
    }

    pub fn predict(&self, x: &Tensor<f32>) -> Result<Vec<i32>, ArboriaError> {
        let probs = self.predict_proba(x)?;
        Ok(probs.iter().map(|row| argmax_first(row) as i32).collect())
    }

    /// Accuracy of the ensemble's out-of-bag prediction: for each row,
    /// average the probability vectors of every tree that never saw it
    /// during training, then argmax against the true label. Averaged over
    /// the rows that were out-of-bag for at least one tree; `NaN` if no row
    /// ever was.
    pub fn out_of_bag(&self, x: &Tensor<f32>, y: &[i32]) -> Result<f64, ArboriaError> {
        let trees = self.trees()?;
        let masks = self.oob_masks.as_ref().unwrap();
        let n_rows = y.len();
        let mut correct = 0u32;
        let mut counted = 0u32;

        for row in 0..n_rows {
            let mut probs = vec![0f32; self.n_classes as usize];
            let mut n_oob = 0u32;
            for (tree, mask) in trees.iter().zip(masks.iter()) {
                if mask[row] {
                    n_oob += 1;
                    let row_slice = x.row_slice(row)?;
                    let tree_probs = tree.predict_proba(&Tensor::from_vec2d(&[row_slice.to_vec()])?)?;
                    for (c, p) in tree_probs[0].iter().enumerate() {
                        probs[c] += p;
                    }
                }
            }
            if n_oob > 0 {
                counted += 1;
                for p in probs.iter_mut() {
                    *p /= n_oob as f32;
                }
                let predicted = argmax_first(&probs) as i32;
                if predicted == y[row] {
                    correct += 1;
                }
            }
        }

        if counted == 0 {
            return Ok(f64::NAN);
        }
        Ok(correct as f64 / counted as f64)
    }
}

/// An ensemble of bagged CART regression trees.
pub struct RandomForestRegressor {
    n_estimators: u32,
    max_features: MaxFeatures,
    max_depth: Option<u32>,
    max_samples: f32,
    min_sample_split: u32,
    n_jobs: i32,
    seed: u64,
    trees: Option<Vec<DecisionTreeRegressor>>,
    oob_masks: Option<Vec<Vec<bool>>>,
}

impl RandomForestRegressor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        n_estimators: u32,
        max_features_raw: i64,
        max_depth: Option<u32>,
        max_samples: f32,
        min_sample_split: Option<u32>,
        n_jobs: i32,
        seed: u64,
    ) -> Result<Self, ArboriaError> {
        validate_forest_params(n_estimators, max_depth, max_samples, min_sample_split)?;
        let max_features = MaxFeatures::from_raw(max_features_raw)?;
        Ok(RandomForestRegressor {
            n_estimators,
            max_features,
            max_depth,
            max_samples,
            min_sample_split: min_sample_split.unwrap_or(2),
            n_jobs,
            seed,
            trees: None,
            oob_masks: None,
        })
    }

    pub fn get_max_samples(&self) -> f32 {
        self.max_samples
    }

    pub fn fit(&mut self, x: &Tensor<f32>, y: &[f32]) -> Result<(), ArboriaError> {
        let (n_rows, n_features) = validate_xy(x, y.len())?;
        let mtry = self.max_features.resolve(n_features);

        let pool = build_pool(self.n_jobs)?;
        let seeds = draw_tree_seeds(self.seed, self.n_estimators);

        let (trees, masks): (Vec<_>, Vec<_>) = pool.install(|| {
            seeds
                .into_par_iter()
                .map(|tree_seed| {
                    let mut rng = StdRng::seed_from_u64(tree_seed);
                    let (rows, oob_mask) = bootstrap_sample(n_rows, self.max_samples, &mut rng);
                    let tree = fit_regressor_tree(
                        x, y, rows, self.max_depth, self.min_sample_split, n_features, mtry, &mut rng,
                    );
                    (tree, oob_mask)
                })
                .collect::<Vec<_>>()
        })
        .into_iter()
        .unzip();

        self.trees = Some(trees);
        self.oob_masks = Some(masks);
        Ok(())
    }

    fn trees(&self) -> Result<&[DecisionTreeRegressor], ArboriaError> {
        self.trees
            .as_deref()
            .ok_or_else(|| ArboriaError::InvalidArgument("model must be fit before predict".to_string()))
    }

    pub fn predict(&self, x: &Tensor<f32>) -> Result<Vec<f32>, ArboriaError> {
        let trees = self.trees()?;
        let per_tree: Vec<Vec<f32>> = trees.iter().map(|t| regressor_predict_rows(t, x)).collect();
        let n_rows = per_tree[0].len();
        let n_trees = trees.len() as f32;
        let mut out = vec![0f32; n_rows];
        for preds in &per_tree {
            for (row, &v) in preds.iter().enumerate() {
                out[row] += v;
            }
        }
        for v in out.iter_mut() {
            *v /= n_trees;
        }
        Ok(out)
    }

    /// Mean squared error of each tree's prediction on the rows it never
    /// saw during training, averaged over rows out-of-bag for at least one
    /// tree.
    pub fn out_of_bag_mse(&self, x: &Tensor<f32>, y: &[f32]) -> Result<f64, ArboriaError> {
        let trees = self.trees()?;
        let masks = self.oob_masks.as_ref().unwrap();
        let n_rows = y.len();
        let mut sq_err = 0f64;
        let mut counted = 0u32;

        for row in 0..n_rows {
            let mut sum = 0f32;
            let mut n_votes = 0u32;
            for (tree, mask) in trees.iter().zip(masks.iter()) {
                if mask[row] {
                    let row_slice = x.row_slice(row)?;
                    let pred = tree.predict(&Tensor::from_vec2d(&[row_slice.to_vec()])?)?;
                    sum += pred[0];
                    n_votes += 1;
                }
            }
            if n_votes > 0 {
                counted += 1;
                let avg = sum / n_votes as f32;
                sq_err += ((avg - y[row]) as f64).powi(2);
            }
        }

        if counted == 0 {
            return Err(ArboriaError::TrainFailed(
                "no row was ever out-of-bag; increase n_estimators or decrease max_samples".to_string(),
            ));
        }
        Ok(sq_err / counted as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toy_classification() -> (Tensor<f32>, Vec<i32>) {
        let x = Tensor::from_vec2d(&[
            vec![0.0, 0.0], vec![0.5, 0.5], vec![1.0, 1.0],
            vec![5.0, 5.0], vec![5.5, 5.5], vec![6.0, 6.0],
        ])
        .unwrap();
        let y = vec![0i32, 0, 0, 1, 1, 1];
        (x, y)
    }

    #[test]
    fn test_random_forest_classifier_fits_cleanly() {
        let (x, y) = toy_classification();
        let mut rf = RandomForestClassifier::new(10, -99, Some(5), 1.0, None, 1, 42).unwrap();
        rf.fit(&x, &y, "gini").unwrap();
        assert_eq!(rf.predict(&x).unwrap(), y);
    }

    #[test]
    fn test_reproducible_across_thread_counts() {
        let (x, y) = toy_classification();
        let mut rf1 = RandomForestClassifier::new(20, -99, Some(5), 1.0, None, 1, 10).unwrap();
        rf1.fit(&x, &y, "entropy").unwrap();
        let mut rf2 = RandomForestClassifier::new(20, -99, Some(5), 1.0, None, 4, 10).unwrap();
        rf2.fit(&x, &y, "entropy").unwrap();
        assert_eq!(rf1.predict_proba(&x).unwrap(), rf2.predict_proba(&x).unwrap());
    }

    #[test]
    fn test_different_seeds_diverge() {
        let x = Tensor::from_vec2d(&[
            vec![0.0, 1.0], vec![1.0, 0.0], vec![2.0, 3.0], vec![3.0, 2.0],
            vec![10.0, 11.0], vec![11.0, 10.0], vec![12.0, 13.0], vec![13.0, 12.0],
        ])
        .unwrap();
        let y = vec![0i32, 0, 0, 0, 1, 1, 1, 1];
        let mut rf1 = RandomForestClassifier::new(5, 1, Some(2), 0.6, None, 1, 1).unwrap();
        rf1.fit(&x, &y, "gini").unwrap();
        let mut rf2 = RandomForestClassifier::new(5, 1, Some(2), 0.6, None, 1, 2).unwrap();
        rf2.fit(&x, &y, "gini").unwrap();
        assert_ne!(rf1.predict_proba(&x).unwrap(), rf2.predict_proba(&x).unwrap());
    }

    #[test]
    fn test_rejects_bad_hyperparameters() {
        assert!(RandomForestClassifier::new(0, -99, Some(5), 1.0, None, 1, 1).is_err());
        assert!(RandomForestClassifier::new(10, -97, Some(5), 1.0, None, 1, 1).is_err());
        assert!(RandomForestClassifier::new(10, -99, Some(0), 1.0, None, 1, 1).is_err());
    }

    #[test]
    fn test_out_of_bag_accuracy_in_range() {
        let (x, y) = toy_classification();
        let mut rf = RandomForestClassifier::new(30, -99, Some(5), 0.7, None, 2, 5).unwrap();
        rf.fit(&x, &y, "gini").unwrap();
        let acc = rf.out_of_bag(&x, &y).unwrap();
        assert!((0.0..=1.0).contains(&acc));
    }

    #[test]
    fn test_regressor_oversampling_with_max_samples_above_one() {
        let x = Tensor::from_vec2d(&[vec![0.0f32], vec![1.0], vec![2.0], vec![3.0], vec![4.0]]).unwrap();
        let y = vec![0.0f32, 1.0, 2.0, 3.0, 4.0];
        let mut rf = RandomForestRegressor::new(10, 1, Some(4), 1.5, None, 1, 3).unwrap();
        rf.fit(&x, &y).unwrap();
        let preds = rf.predict(&x).unwrap();
        for (p, expected) in preds.iter().zip(y.iter()) {
            assert!((p - expected).abs() < 1.5);
        }
    }
}

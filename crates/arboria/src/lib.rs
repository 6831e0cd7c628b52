//! # arboria
//!
//! CART decision trees and random forests over dense tabular data.
//!
//! ## Modules
//!
//! - **core** — Tensor and error primitives shared by the rest of the crate.
//! - **tree** — Decision trees and random forests: classification and regression.
//! - **metrics** — Evaluation: accuracy.

/// Tensor and error primitives.
pub use arboria_core as core;

/// Decision trees and random forests.
pub use arboria_tree as tree;

/// Evaluation metrics.
pub use arboria_metrics as metrics;

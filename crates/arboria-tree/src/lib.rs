pub mod bootstrap;
pub mod criterion;
pub mod decision_tree;
pub mod params;
pub mod random_forest;
pub mod split;

pub use criterion::Criterion;
pub use decision_tree::{DecisionTreeClassifier, DecisionTreeRegressor};
pub use params::MaxFeatures;
pub use random_forest::{RandomForestClassifier, RandomForestRegressor};

use serde::{Deserialize, Serialize};

/// A marker type indicating that a model is **not yet trained**.
///
/// Used as the state parameter (e.g. `DecisionTreeRegressor<Unfitted>`) so that:
/// - `fit` is only available on an `Unfitted` model.
/// - `predict` is **not available** until `fit` has returned a `Fitted` model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unfitted;

/// A marker type indicating that a model has been **fully trained**.
///
/// A `Fitted` model contains **only inference parameters**: no optimizer
/// state, no training rows beyond what prediction needs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fitted;

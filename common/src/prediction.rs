//! Classifier output.
//!
use serde::{Deserialize, Serialize};

/// A single class label with the probability the classifier assigned to it.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Prediction {
    pub label: String,
    pub probability: f32,
}

impl Prediction {
    pub fn new(label: impl Into<String>, probability: f32) -> Self {
        Self {
            label: label.into(),
            probability,
        }
    }
}

/// Select the most probable prediction.
///
/// Scans in input order and only replaces the current best on a strictly higher probability, so
/// on exact ties the first entry wins. Returns `None` for an empty list.
pub fn select_best(predictions: &[Prediction]) -> Option<&Prediction> {
    let (first, rest) = predictions.split_first()?;
    let mut best = first;
    for candidate in rest {
        if candidate.probability > best.probability {
            best = candidate;
        }
    }

    Some(best)
}

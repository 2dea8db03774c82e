//! Intent classifier port.

use crate::error::Result;
use serde::{Deserialize, Serialize};

/// What the classifier inferred for a piece of text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IntentPrediction {
    /// A named intent was recognized
    Named {
        name: String,
        confidence: Option<f64>,
    },
    /// No intent recognized
    Fallback { confidence: Option<f64> },
}

impl IntentPrediction {
    /// Build a prediction from loose parts; a missing or empty name is a fallback.
    pub fn from_parts(name: Option<String>, confidence: Option<f64>) -> Self {
        match name {
            Some(name) if !name.is_empty() => IntentPrediction::Named { name, confidence },
            _ => IntentPrediction::Fallback { confidence },
        }
    }

    pub fn named(name: impl Into<String>, confidence: Option<f64>) -> Self {
        Self::from_parts(Some(name.into()), confidence)
    }

    pub fn fallback() -> Self {
        IntentPrediction::Fallback { confidence: None }
    }

    /// Intent name, `None` for fallback.
    pub fn name(&self) -> Option<&str> {
        match self {
            IntentPrediction::Named { name, .. } => Some(name),
            IntentPrediction::Fallback { .. } => None,
        }
    }

    pub fn confidence(&self) -> Option<f64> {
        match self {
            IntentPrediction::Named { confidence, .. }
            | IntentPrediction::Fallback { confidence } => *confidence,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, IntentPrediction::Fallback { .. })
    }
}

/// Something that can assign an intent to text.
///
/// Errors are classifier-defined (transport, HTTP status, malformed body);
/// callers decide whether a failure is fatal.
pub trait IntentClassifier {
    fn classify(&self, text: &str) -> Result<IntentPrediction>;
}

impl<T: IntentClassifier + ?Sized> IntentClassifier for &T {
    fn classify(&self, text: &str) -> Result<IntentPrediction> {
        (**self).classify(text)
    }
}

impl<T: IntentClassifier + ?Sized> IntentClassifier for Box<T> {
    fn classify(&self, text: &str) -> Result<IntentPrediction> {
        (**self).classify(text)
    }
}

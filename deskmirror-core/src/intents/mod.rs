//! Intent coverage against a Rasa training set
//!
//! ```text
//! ┌──────────────┐     ┌──────────────────────────┐     ┌────────────────────┐
//! │ MessageRecord│ ──► │ IntentCoverageAggregator │ ──► │IntentCoverageReport│
//! │  (mirror db) │     │                          │     │  (format / json)   │
//! └──────────────┘     └────────────┬─────────────┘     └────────────────────┘
//!                                   │ classify(text)
//!                                   ▼
//!                      ┌──────────────────────────┐
//!                      │  IntentClassifier        │
//!                      │  └─ RasaIntentClassifier │
//!                      └──────────────────────────┘
//! ```
//!
//! Training intents come from the Rasa `nlu.yml` via [`load_nlu_intents`].
//!
//! ## Usage
//!
//! ```rust,ignore
//! use deskmirror_core::intents::{load_nlu_intents, CoverageOptions, IntentCoverageAggregator, RasaIntentClassifier};
//!
//! let intents = load_nlu_intents(Path::new("data/nlu.yml"))?;
//! let classifier = RasaIntentClassifier::from_config(&config.rasa)?;
//! let aggregator = IntentCoverageAggregator::new(classifier, intents, CoverageOptions::default());
//! let report = aggregator.execute(db.list_message_records(None)?);
//! ```

mod classifier;
mod coverage;
mod nlu;
mod rasa;

pub use classifier::{IntentClassifier, IntentPrediction};
pub use coverage::{
    ConversationSummary, CoverageOptions, IntentCoverageAggregator, IntentCoverageReport,
    IntentSample, TrainingIntentCoverage,
};
pub use nlu::{load_nlu_intents, parse_nlu_intents};
pub use rasa::{prediction_from_payload, secs_to_duration, RasaClient, RasaIntentClassifier};

//! Intent coverage aggregation.
//!
//! Turns a batch of [`MessageRecord`]s into an [`IntentCoverageReport`]:
//!
//! 1. **Ordering**: records are grouped by conversation; each group is sorted
//!    by timestamp and groups are visited from least to most recently active.
//! 2. **Scan**: every non-blank text goes through the classifier; results feed
//!    global counters, a per-conversation bucket and the sample list.
//!    A classifier failure is counted and logged, never propagated.
//! 3. **Assembly**: training-intent coverage, unknown-intent ranking and
//!    per-conversation summaries are derived from the accumulators.
//!
//! Missing timestamps sort as epoch 0. Conversation ids order as
//! `Option<i64>`: the `None` bucket first, then ascending ids.

use super::classifier::{IntentClassifier, IntentPrediction};
use crate::types::MessageRecord;
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// Tunables for [`IntentCoverageAggregator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoverageOptions {
    /// Observations needed for a training intent to count as covered
    pub min_count: usize,
    /// Debug progress every N named predictions (0 disables)
    pub progress_every: usize,
    /// Info progress every N messages with text (0 disables)
    pub scan_progress_every: usize,
    /// Max diagnostic samples kept, first-N (0 disables)
    pub sample_limit: usize,
}

impl Default for CoverageOptions {
    fn default() -> Self {
        Self {
            min_count: 5,
            progress_every: 200,
            scan_progress_every: 5000,
            sample_limit: 0,
        }
    }
}

// ============================================
// Report
// ============================================

/// Coverage of one intent defined in the training data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrainingIntentCoverage {
    pub intent: String,
    pub observed_count: usize,
    pub meets_threshold: bool,
}

/// Representative prediction captured for diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntentSample {
    pub text: String,
    pub intent: Option<String>,
    pub confidence: Option<f64>,
    pub is_fallback: bool,
}

/// Aggregated view of one conversation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversationSummary {
    pub conversation_id: Option<i64>,
    pub total_messages: usize,
    pub fallback_count: usize,
    pub fallback_pct: f64,
    pub top_intent: Option<String>,
    pub top_intent_count: usize,
    pub last_text: String,
    pub last_confidence: Option<f64>,
    pub last_activity: Option<i64>,
}

/// Final output of [`IntentCoverageAggregator::execute`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntentCoverageReport {
    pub total_rows: usize,
    pub messages_with_text: usize,
    pub messages_without_text: usize,
    pub parse_failures: usize,
    pub named_predictions: usize,
    pub fallback_predictions: usize,
    /// One entry per training intent, in training order
    pub training_coverage: Vec<TrainingIntentCoverage>,
    /// Intents outside the training set, most frequent first
    pub unknown_intents: Vec<(String, usize)>,
    pub samples: Vec<IntentSample>,
    /// Least recently active first
    pub conversations: Vec<ConversationSummary>,
}

impl IntentCoverageReport {
    /// Training intents observed fewer than `min_count` times.
    pub fn undercovered(&self) -> impl Iterator<Item = &str> {
        self.training_coverage
            .iter()
            .filter(|c| !c.meets_threshold)
            .map(|c| c.intent.as_str())
    }
}

// ============================================
// Accumulators
// ============================================

/// Counter that remembers first-seen order for tie-breaking.
#[derive(Debug, Default)]
struct IntentCounter {
    order: Vec<String>,
    counts: HashMap<String, usize>,
}

impl IntentCounter {
    fn increment(&mut self, name: &str) {
        match self.counts.get_mut(name) {
            Some(count) => *count += 1,
            None => {
                self.order.push(name.to_string());
                self.counts.insert(name.to_string(), 1);
            }
        }
    }

    fn get(&self, name: &str) -> usize {
        self.counts.get(name).copied().unwrap_or(0)
    }

    fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.order
            .iter()
            .map(|name| (name.as_str(), self.get(name)))
    }

    /// Highest count; the first-seen intent wins ties.
    fn most_common(&self) -> Option<(&str, usize)> {
        self.iter().fold(None, |best, (name, count)| match best {
            Some((_, best_count)) if best_count >= count => best,
            _ => Some((name, count)),
        })
    }
}

#[derive(Debug)]
struct ConversationBucket {
    intents: IntentCounter,
    fallback: usize,
    total: usize,
    last_text: String,
    last_confidence: Option<f64>,
    last_activity: Option<i64>,
}

impl ConversationBucket {
    fn new(created_at: Option<i64>) -> Self {
        Self {
            intents: IntentCounter::default(),
            fallback: 0,
            total: 0,
            last_text: String::new(),
            last_confidence: None,
            last_activity: created_at,
        }
    }

    fn record(&mut self, text: &str, prediction: &IntentPrediction, created_at: Option<i64>) {
        self.total += 1;
        self.last_text = text.to_string();
        self.last_confidence = prediction.confidence();
        self.last_activity = max_opt(self.last_activity, created_at);
        match prediction.name() {
            Some(name) => self.intents.increment(name),
            None => self.fallback += 1,
        }
    }

    fn summarize(&self, conversation_id: Option<i64>) -> ConversationSummary {
        let (top_intent, top_intent_count) = match self.intents.most_common() {
            Some((name, count)) => (Some(name.to_string()), count),
            None => (None, 0),
        };
        let fallback_pct = if self.total > 0 {
            self.fallback as f64 / self.total as f64 * 100.0
        } else {
            0.0
        };
        ConversationSummary {
            conversation_id,
            total_messages: self.total,
            fallback_count: self.fallback,
            fallback_pct,
            top_intent,
            top_intent_count,
            last_text: self.last_text.clone(),
            last_confidence: self.last_confidence,
            last_activity: self.last_activity,
        }
    }
}

/// Running state for one `execute` call.
#[derive(Debug, Default)]
struct ScanState {
    total_rows: usize,
    messages_with_text: usize,
    messages_without_text: usize,
    parse_failures: usize,
    named_predictions: usize,
    fallback_predictions: usize,
    intents: IntentCounter,
    samples: Vec<IntentSample>,
    conversations: HashMap<Option<i64>, ConversationBucket>,
}

// ============================================
// Aggregator
// ============================================

/// Compares classifier output over real messages with the training intents.
///
/// The aggregator holds only configuration; all accumulators live inside a
/// single [`execute`](Self::execute) call, so one instance can be reused.
pub struct IntentCoverageAggregator<C> {
    classifier: C,
    training_intents: Vec<String>,
    training_set: HashSet<String>,
    options: CoverageOptions,
}

impl<C: IntentClassifier> IntentCoverageAggregator<C> {
    /// Create an aggregator. Duplicate training intents collapse to their
    /// first occurrence.
    pub fn new<I, S>(classifier: C, training_intents: I, options: CoverageOptions) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut training_set = HashSet::new();
        let mut ordered = Vec::new();
        for intent in training_intents {
            let intent = intent.into();
            if training_set.insert(intent.clone()) {
                ordered.push(intent);
            }
        }

        Self {
            classifier,
            training_intents: ordered,
            training_set,
            options,
        }
    }

    pub fn training_intents(&self) -> &[String] {
        &self.training_intents
    }

    pub fn options(&self) -> &CoverageOptions {
        &self.options
    }

    /// Run the report over a fallible source. The first source error aborts
    /// the run before any classification happens.
    pub fn try_execute<I, E>(&self, messages: I) -> Result<IntentCoverageReport, E>
    where
        I: IntoIterator<Item = Result<MessageRecord, E>>,
    {
        let buffered = messages.into_iter().collect::<Result<Vec<_>, E>>()?;
        Ok(self.execute(buffered))
    }

    /// Classify every message and assemble the report.
    pub fn execute<I>(&self, messages: I) -> IntentCoverageReport
    where
        I: IntoIterator<Item = MessageRecord>,
    {
        let ordered = order_by_conversation(messages);
        let mut state = ScanState::default();

        for message in &ordered {
            self.scan_one(&mut state, message);
        }

        self.assemble(state)
    }

    fn scan_one(&self, state: &mut ScanState, message: &MessageRecord) {
        state.total_rows += 1;

        let text = message.text.as_deref().map(str::trim).unwrap_or("");
        if text.is_empty() {
            state.messages_without_text += 1;
            return;
        }

        state.messages_with_text += 1;
        if is_multiple(state.messages_with_text, self.options.scan_progress_every) {
            tracing::info!(processed = state.messages_with_text, "Scanning messages");
        }

        let prediction = match self.classifier.classify(text) {
            Ok(prediction) => prediction,
            Err(e) => {
                state.parse_failures += 1;
                tracing::warn!(error = %e, "Intent coverage parse failed");
                return;
            }
        };

        state
            .conversations
            .entry(message.conversation_id)
            .or_insert_with(|| ConversationBucket::new(message.created_at))
            .record(text, &prediction, message.created_at);

        if state.samples.len() < self.options.sample_limit {
            state.samples.push(IntentSample {
                text: text.to_string(),
                intent: prediction.name().map(str::to_string),
                confidence: prediction.confidence(),
                is_fallback: prediction.is_fallback(),
            });
        }

        let Some(name) = prediction.name() else {
            state.fallback_predictions += 1;
            return;
        };

        state.named_predictions += 1;
        state.intents.increment(name);

        if is_multiple(state.named_predictions, self.options.progress_every) {
            tracing::debug!(total = state.named_predictions, "Predictions processed");
        }
    }

    fn assemble(&self, state: ScanState) -> IntentCoverageReport {
        let training_coverage = self
            .training_intents
            .iter()
            .map(|intent| {
                let observed_count = state.intents.get(intent);
                TrainingIntentCoverage {
                    intent: intent.clone(),
                    observed_count,
                    meets_threshold: observed_count >= self.options.min_count,
                }
            })
            .collect();

        let mut unknown_intents: Vec<(String, usize)> = state
            .intents
            .iter()
            .filter(|(name, _)| !self.training_set.contains(*name))
            .map(|(name, count)| (name.to_string(), count))
            .collect();
        // Stable sort keeps first-seen order among equal counts
        unknown_intents.sort_by(|a, b| b.1.cmp(&a.1));

        let mut conversations: Vec<ConversationSummary> = state
            .conversations
            .iter()
            .map(|(id, bucket)| bucket.summarize(*id))
            .collect();
        conversations.sort_by_key(|c| (c.last_activity.unwrap_or(0), c.conversation_id));

        IntentCoverageReport {
            total_rows: state.total_rows,
            messages_with_text: state.messages_with_text,
            messages_without_text: state.messages_without_text,
            parse_failures: state.parse_failures,
            named_predictions: state.named_predictions,
            fallback_predictions: state.fallback_predictions,
            training_coverage,
            unknown_intents,
            samples: state.samples,
            conversations,
        }
    }
}

/// Group by conversation, sort each group chronologically and concatenate
/// the groups from least to most recently active.
fn order_by_conversation<I>(messages: I) -> Vec<MessageRecord>
where
    I: IntoIterator<Item = MessageRecord>,
{
    let mut groups: HashMap<Option<i64>, (i64, Vec<MessageRecord>)> = HashMap::new();
    for message in messages {
        let activity = message.created_at.unwrap_or(0);
        let (last_activity, items) = groups
            .entry(message.conversation_id)
            .or_insert((0, Vec::new()));
        if activity > *last_activity {
            *last_activity = activity;
        }
        items.push(message);
    }

    let mut groups: Vec<_> = groups.into_iter().collect();
    groups.sort_by_key(|(id, (last_activity, _))| (*last_activity, *id));

    let mut ordered = Vec::new();
    for (_, (_, mut items)) in groups {
        // Every item shares the conversation id, so the timestamp is the whole key
        items.sort_by_key(|m| m.created_at.unwrap_or(0));
        ordered.extend(items);
    }
    ordered
}

fn is_multiple(count: usize, every: usize) -> bool {
    every > 0 && count % every == 0
}

fn max_opt(left: Option<i64>, right: Option<i64>) -> Option<i64> {
    match (left, right) {
        (Some(l), Some(r)) => Some(l.max(r)),
        (l, None) => l,
        (None, r) => r,
    }
}

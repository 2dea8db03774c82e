//! Integration tests for the mirror and intent coverage pipeline
//!
//! A fake helpdesk serves the pages in `tests/fixtures/helpdesk.json`; the
//! mirrored messages are then fed through the coverage aggregator with a
//! keyword classifier and the training intents of `tests/fixtures/nlu.yml`.

use deskmirror_core::chatwoot::{ConnectionStatus, HelpdeskApi};
use deskmirror_core::db::Database;
use deskmirror_core::format::format_intent_coverage;
use deskmirror_core::intents::{
    load_nlu_intents, CoverageOptions, IntentClassifier, IntentCoverageAggregator,
    IntentPrediction,
};
use deskmirror_core::{Error, Result, SyncCoordinator};
use serde_json::{json, Value};
use std::path::PathBuf;
use tempfile::TempDir;

/// Get the path to a fixture file
fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

struct FixtureHelpdesk {
    data: Value,
}

impl FixtureHelpdesk {
    fn load() -> Self {
        let content = std::fs::read_to_string(fixture_path("helpdesk.json")).unwrap();
        Self {
            data: serde_json::from_str(&content).unwrap(),
        }
    }
}

impl HelpdeskApi for FixtureHelpdesk {
    fn account_details(&self) -> Result<Value> {
        Ok(self.data["account"].clone())
    }

    fn list_inboxes(&self) -> Result<Value> {
        Ok(self.data["inboxes"].clone())
    }

    fn list_conversations(&self, page: u32, _per_page: Option<u32>) -> Result<Value> {
        Ok(self.data["conversations"]
            .get(page as usize - 1)
            .cloned()
            .unwrap_or_else(|| json!({ "data": { "payload": [] } })))
    }

    fn list_conversation_messages(
        &self,
        conversation_id: i64,
        _page: u32,
        _per_page: Option<u32>,
    ) -> Result<Value> {
        // Chatwoot ignores the page parameter on this endpoint
        Ok(self.data["messages"]
            .get(conversation_id.to_string())
            .cloned()
            .unwrap_or_else(|| json!({ "payload": [] })))
    }

    fn check_connection(&self) -> ConnectionStatus {
        ConnectionStatus {
            ok: true,
            status_code: Some(200),
            error: None,
        }
    }
}

/// Maps known phrases to intents; everything else is a fallback.
struct KeywordClassifier;

impl IntentClassifier for KeywordClassifier {
    fn classify(&self, text: &str) -> Result<IntentPrediction> {
        let lower = text.to_lowercase();
        let prediction = if lower.contains("hola") {
            IntentPrediction::named("saludo", Some(0.95))
        } else if lower.contains("debo") {
            IntentPrediction::named("consultar_saldo", Some(0.8))
        } else if lower.contains("chau") {
            IntentPrediction::named("despedida", Some(0.9))
        } else if lower.contains("plan de pagos") {
            IntentPrediction::named("plan_de_pagos", Some(0.7))
        } else if lower.contains("timeout") {
            return Err(Error::Classifier("timed out".to_string()));
        } else {
            IntentPrediction::fallback()
        };
        Ok(prediction)
    }
}

fn mirrored_db() -> (TempDir, Database) {
    deskmirror_core::logging::init_test();
    let dir = TempDir::new().unwrap();
    let db = Database::open(&dir.path().join("data.db")).unwrap();
    db.migrate().unwrap();

    let coordinator = SyncCoordinator::new(FixtureHelpdesk::load(), db);
    let result = coordinator.sync_all().unwrap();
    assert_eq!(result.accounts, 1);
    assert_eq!(result.inboxes, 1);
    assert_eq!(result.conversations, 3);
    assert_eq!(result.messages, 7);
    assert!(result.errors.is_empty());

    // Reopen to prove the data hit the disk
    drop(coordinator);
    let db = Database::open(&dir.path().join("data.db")).unwrap();
    (dir, db)
}

#[test]
fn test_mirror_then_coverage_report() {
    let (_dir, db) = mirrored_db();
    let intents = load_nlu_intents(&fixture_path("nlu.yml")).unwrap();
    assert_eq!(intents, vec!["saludo", "consultar_saldo", "despedida"]);

    let options = CoverageOptions {
        min_count: 2,
        sample_limit: 3,
        ..Default::default()
    };
    let aggregator = IntentCoverageAggregator::new(KeywordClassifier, intents, options);
    let report = aggregator.execute(db.list_message_records(None).unwrap());

    assert_eq!(report.total_rows, 7);
    assert_eq!(report.messages_with_text, 6);
    assert_eq!(report.messages_without_text, 1);
    assert_eq!(report.named_predictions, 5);
    assert_eq!(report.fallback_predictions, 1);
    assert_eq!(report.parse_failures, 0);

    let coverage: Vec<(&str, usize, bool)> = report
        .training_coverage
        .iter()
        .map(|c| (c.intent.as_str(), c.observed_count, c.meets_threshold))
        .collect();
    assert_eq!(
        coverage,
        vec![
            ("saludo", 2, true),
            ("consultar_saldo", 1, false),
            ("despedida", 1, false)
        ]
    );
    assert_eq!(report.unknown_intents, vec![("plan_de_pagos".to_string(), 1)]);

    // Least recently active conversation is scanned first
    let sample_texts: Vec<&str> = report.samples.iter().map(|s| s.text.as_str()).collect();
    assert_eq!(
        sample_texts,
        vec!["chau", "necesito un plan de pagos", "asdfgh"]
    );
    assert!(report.samples[2].is_fallback);

    let order: Vec<Option<i64>> = report
        .conversations
        .iter()
        .map(|c| c.conversation_id)
        .collect();
    assert_eq!(order, vec![Some(32), Some(33), Some(31)]);
    let busiest = &report.conversations[2];
    assert_eq!(busiest.total_messages, 3);
    assert_eq!(busiest.top_intent.as_deref(), Some("saludo"));
    assert_eq!(busiest.last_text, "cuanto debo");

    let text = format_intent_coverage(&report, 2, 10);
    assert!(text.contains("Active coverage: 5/6 (83.3% with intent)"));
    assert!(text.contains(" - plan_de_pagos: 1"));
    assert!(text.contains("Conversation summary (max 10):"));
}

#[test]
fn test_limit_caps_rows_read() {
    let (_dir, db) = mirrored_db();
    let aggregator = IntentCoverageAggregator::new(
        KeywordClassifier,
        ["saludo"],
        CoverageOptions::default(),
    );

    let report = aggregator.execute(db.list_message_records(Some(2)).unwrap());

    assert_eq!(report.total_rows, 2);
}

#[test]
fn test_classifier_failures_are_counted() {
    deskmirror_core::logging::init_test();
    let aggregator = IntentCoverageAggregator::new(
        KeywordClassifier,
        ["saludo"],
        CoverageOptions::default(),
    );
    let records = vec![
        deskmirror_core::MessageRecord::new("hola", Some(1), Some(10)),
        deskmirror_core::MessageRecord::new("timeout please", Some(1), Some(20)),
    ];

    let report = aggregator.execute(records);

    assert_eq!(report.messages_with_text, 2);
    assert_eq!(report.parse_failures, 1);
    assert_eq!(report.named_predictions, 1);
    assert_eq!(report.conversations[0].total_messages, 1);
}

//! Text rendering for intent coverage reports.

use crate::intents::IntentCoverageReport;

/// Maximum unknown intents listed.
const UNKNOWN_INTENTS_SHOWN: usize = 10;

/// Render the report as plain text.
///
/// `conversation_limit` caps the per-conversation table; 0 omits it.
pub fn format_intent_coverage(
    report: &IntentCoverageReport,
    min_count: usize,
    conversation_limit: usize,
) -> String {
    let mut lines: Vec<String> = Vec::new();
    lines.push("=== Intent coverage report ===".to_string());
    lines.push(format!("Messages read: {}", report.total_rows));
    lines.push(format!("Messages with text: {}", report.messages_with_text));
    lines.push(format!(
        "Messages without text: {}",
        report.messages_without_text
    ));
    lines.push(format!("Parse failures: {}", report.parse_failures));
    lines.push(format!("Named predictions: {}", report.named_predictions));
    lines.push(format!(
        "Predictions without intent: {}",
        report.fallback_predictions
    ));

    lines.push(String::new());
    let coverage_pct = ratio_pct(report.named_predictions, report.messages_with_text);
    let fallback_pct = ratio_pct(report.fallback_predictions, report.messages_with_text);
    lines.push(format!(
        "Active coverage: {}/{} ({:.1}% with intent)",
        report.named_predictions, report.messages_with_text, coverage_pct
    ));
    lines.push(format!(
        "Fallback predictions: {} ({:.1}%)",
        report.fallback_predictions, fallback_pct
    ));

    lines.push(String::new());
    let header = format!("{:<32} {:>5} {:>6} {:>8}", "Intent", "Count", "Pct", "Status");
    lines.push(format!("Training intents (minimum {}):", min_count));
    lines.push(header.clone());
    lines.push("-".repeat(header.len()));
    for coverage in &report.training_coverage {
        let pct = ratio_pct(coverage.observed_count, report.messages_with_text.max(1));
        let status = if coverage.meets_threshold {
            "OK".to_string()
        } else {
            format!("< {}", min_count)
        };
        lines.push(format!(
            "{:<32} {:>5} {:>5.1}% {:>8}",
            coverage.intent, coverage.observed_count, pct, status
        ));
    }

    let undercovered: Vec<&str> = report.undercovered().collect();
    if !undercovered.is_empty() {
        lines.push(String::new());
        lines.push("Under-covered intents:".to_string());
        for intent in undercovered {
            lines.push(format!(" - {}", intent));
        }
    }

    if !report.unknown_intents.is_empty() {
        lines.push(String::new());
        lines.push("Intents inferred outside the NLU:".to_string());
        for (name, count) in report.unknown_intents.iter().take(UNKNOWN_INTENTS_SHOWN) {
            lines.push(format!(" - {}: {}", name, count));
        }
    }

    if !report.samples.is_empty() {
        lines.push(String::new());
        lines.push(format!("Samples ({} predictions):", report.samples.len()));
        for (idx, sample) in report.samples.iter().enumerate() {
            let fallback_suffix = if sample.is_fallback { " (fallback)" } else { "" };
            lines.push(format!(
                "{:02}. {} -> {}{} @ {}",
                idx + 1,
                truncate(&sample.text, 64),
                sample.intent.as_deref().unwrap_or("null"),
                fallback_suffix,
                format_confidence(sample.confidence)
            ));
        }
    }

    if conversation_limit > 0 && !report.conversations.is_empty() {
        lines.push(String::new());
        lines.push(format!(
            "Conversation summary (max {}):",
            conversation_limit
        ));
        let header = format!(
            "{:<10} {:<26} {:>4} {:>11} {:<48}",
            "Conv ID", "Top intent (count)", "Msgs", "Fallback %", "Last text"
        );
        lines.push(header.clone());
        lines.push("-".repeat(header.len()));
        for summary in report.conversations.iter().take(conversation_limit) {
            let intent_label = match &summary.top_intent {
                Some(intent) => format!("{} ({})", intent, summary.top_intent_count),
                None => "fallback".to_string(),
            };
            let conversation_id = summary
                .conversation_id
                .map(|id| id.to_string())
                .unwrap_or_else(|| "None".to_string());
            lines.push(format!(
                "{:<10} {:<26} {:>4} {:>10.1}% {} [{}]",
                conversation_id,
                intent_label,
                summary.total_messages,
                summary.fallback_pct,
                truncate(&summary.last_text, 42),
                format_confidence(summary.last_confidence)
            ));
        }
    }

    lines.join("\n")
}

fn ratio_pct(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 / total as f64 * 100.0
    }
}

fn format_confidence(confidence: Option<f64>) -> String {
    match confidence {
        Some(value) => format!("{:.3}", value),
        None => "n/a".to_string(),
    }
}

/// Collapse whitespace and cut to `max_chars`, ending in `...` when cut.
pub fn truncate(text: &str, max_chars: usize) -> String {
    let clean = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if clean.chars().count() <= max_chars {
        return clean;
    }
    let kept: String = clean.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{}...", kept)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intents::{ConversationSummary, IntentSample, TrainingIntentCoverage};

    fn sample_report() -> IntentCoverageReport {
        IntentCoverageReport {
            total_rows: 7,
            messages_with_text: 5,
            messages_without_text: 2,
            parse_failures: 0,
            named_predictions: 4,
            fallback_predictions: 1,
            training_coverage: vec![
                TrainingIntentCoverage {
                    intent: "saludo".to_string(),
                    observed_count: 2,
                    meets_threshold: true,
                },
                TrainingIntentCoverage {
                    intent: "despedida".to_string(),
                    observed_count: 1,
                    meets_threshold: false,
                },
            ],
            unknown_intents: vec![("sorpresa".to_string(), 1)],
            samples: vec![
                IntentSample {
                    text: "hola   que\ttal".to_string(),
                    intent: Some("saludo".to_string()),
                    confidence: Some(0.9),
                    is_fallback: false,
                },
                IntentSample {
                    text: "???".to_string(),
                    intent: None,
                    confidence: None,
                    is_fallback: true,
                },
            ],
            conversations: vec![ConversationSummary {
                conversation_id: Some(12),
                total_messages: 3,
                fallback_count: 1,
                fallback_pct: 100.0 / 3.0,
                top_intent: Some("saludo".to_string()),
                top_intent_count: 2,
                last_text: "gracias".to_string(),
                last_confidence: Some(0.75),
                last_activity: Some(1_700_000_000),
            }],
        }
    }

    #[test]
    fn test_header_and_percentages() {
        let text = format_intent_coverage(&sample_report(), 2, 0);

        assert!(text.starts_with("=== Intent coverage report ==="));
        assert!(text.contains("Messages read: 7"));
        assert!(text.contains("Active coverage: 4/5 (80.0% with intent)"));
        assert!(text.contains("Fallback predictions: 1 (20.0%)"));
    }

    #[test]
    fn test_training_table_and_undercovered() {
        let text = format_intent_coverage(&sample_report(), 2, 0);

        assert!(text.contains("Training intents (minimum 2):"));
        let saludo = text.lines().find(|l| l.starts_with("saludo ")).unwrap();
        assert!(saludo.contains(" 40.0%"));
        assert!(saludo.trim_end().ends_with("OK"));
        let despedida = text.lines().find(|l| l.starts_with("despedida ")).unwrap();
        assert!(despedida.trim_end().ends_with("< 2"));
        assert!(text.contains("Under-covered intents:\n - despedida"));
        assert!(text.contains(" - sorpresa: 1"));
    }

    #[test]
    fn test_samples_section() {
        let text = format_intent_coverage(&sample_report(), 2, 0);

        assert!(text.contains("Samples (2 predictions):"));
        assert!(text.contains("01. hola que tal -> saludo @ 0.900"));
        assert!(text.contains("02. ??? -> null (fallback) @ n/a"));
    }

    #[test]
    fn test_conversation_table_only_when_requested() {
        let without = format_intent_coverage(&sample_report(), 2, 0);
        assert!(!without.contains("Conversation summary"));

        let with = format_intent_coverage(&sample_report(), 2, 5);
        assert!(with.contains("Conversation summary (max 5):"));
        let row = with.lines().find(|l| l.starts_with("12 ")).unwrap();
        assert!(row.contains("saludo (2)"));
        assert!(row.contains("33.3%"));
        assert!(row.ends_with("gracias [0.750]"));
    }

    #[test]
    fn test_empty_report_has_zero_percentages() {
        let report = IntentCoverageReport {
            total_rows: 0,
            messages_with_text: 0,
            messages_without_text: 0,
            parse_failures: 0,
            named_predictions: 0,
            fallback_predictions: 0,
            training_coverage: vec![],
            unknown_intents: vec![],
            samples: vec![],
            conversations: vec![],
        };
        let text = format_intent_coverage(&report, 5, 10);

        assert!(text.contains("Active coverage: 0/0 (0.0% with intent)"));
        assert!(!text.contains("Under-covered"));
        assert!(!text.contains("Samples"));
    }

    #[test]
    fn test_unknown_intents_capped_at_ten() {
        let mut report = sample_report();
        report.unknown_intents = (0..15).map(|i| (format!("extra_{i:02}"), 15 - i)).collect();

        let text = format_intent_coverage(&report, 2, 0);

        assert!(text.contains("extra_09"));
        assert!(!text.contains("extra_10"));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("  short\ntext ", 64), "short text");
        let long = "a".repeat(70);
        let cut = truncate(&long, 64);
        assert_eq!(cut.chars().count(), 64);
        assert!(cut.ends_with("..."));
        assert_eq!(truncate("ñandú ñandú", 8), "ñandú...");
    }
}

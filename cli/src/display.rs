//! Plain-text rendering of a [`QueryResult`] for stdout.

use tog::QueryResult;

/// Truncates `s` to at most `max` chars, ending in "..." when cut. 0 means no limit.
pub fn truncate_display(s: &str, max: usize) -> String {
    const SUFFIX: &str = "...";
    if max == 0 || s.chars().count() <= max {
        return s.to_string();
    }
    if max <= SUFFIX.len() {
        return s.chars().take(max).collect();
    }
    let head: String = s.chars().take(max - SUFFIX.len()).collect();
    format!("{}{}", head, SUFFIX)
}

/// Answer first; with `verbose`, status line, per-hop triplets and degradations follow.
pub fn format_result(result: &QueryResult, verbose: bool, max_len: usize) -> String {
    let mut out = truncate_display(&result.answer, max_len);
    if !verbose {
        return out;
    }
    out.push_str(&format!(
        "\n\nstatus: {:?}  termination: {:?}  confidence: {:.2}  time: {} ms",
        result.status, result.termination, result.confidence, result.processing_time_ms
    ));
    if !result.topic_entities.is_empty() {
        let names: Vec<&str> = result.topic_entities.iter().map(|t| t.name.as_str()).collect();
        out.push_str(&format!("\ntopic entities: {}", names.join(", ")));
    }
    for step in result.path.steps() {
        out.push_str(&format!("\nhop {}:", step.depth));
        for e in &step.entities {
            out.push_str(&format!(
                "\n  ({}, {}, {})  score {:.3}",
                e.source_name, e.relation, e.name, e.score
            ));
        }
        if let Some(s) = &step.sufficiency {
            out.push_str(&format!("\n  sufficiency: {:?} ({:.2})", s.status, s.confidence));
        }
    }
    for d in &result.degradations {
        out.push_str(&format!("\nnote: {}", d));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tog::{QueryStatus, ReasoningPath, Termination};

    fn result(answer: &str) -> QueryResult {
        QueryResult {
            answer: answer.to_string(),
            confidence: 0.25,
            path: ReasoningPath::new(),
            triplets: Vec::new(),
            evidence: Vec::new(),
            processing_time_ms: 12,
            status: QueryStatus::Fallback,
            topic_entities: Vec::new(),
            termination: Termination::NoTopicEntities,
            degradations: vec!["topic extraction degraded to heuristics".to_string()],
        }
    }

    #[test]
    fn truncate_display_handles_short_exact_and_long() {
        assert_eq!(truncate_display("hello", 10), "hello");
        assert_eq!(truncate_display("hello", 5), "hello");
        assert_eq!(truncate_display("hello world", 8), "hello...");
        assert_eq!(truncate_display("hello", 2), "he");
        assert_eq!(truncate_display("hello", 0), "hello");
        assert_eq!(truncate_display("日本語テキスト", 5).chars().count(), 5);
    }

    #[test]
    fn quiet_output_is_just_the_answer() {
        assert_eq!(format_result(&result("Paris."), false, 0), "Paris.");
    }

    #[test]
    fn verbose_output_lists_status_and_notes() {
        let out = format_result(&result("Paris."), true, 0);
        assert!(out.starts_with("Paris."));
        assert!(out.contains("status: Fallback"));
        assert!(out.contains("termination: NoTopicEntities"));
        assert!(out.contains("note: topic extraction degraded"));
    }
}

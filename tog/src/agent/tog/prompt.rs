//! Prompt text for every ToG model call.

use super::state::{CandidateEntity, Triplet};
use super::text::humanize_relation;

pub const TOPIC_ENTITY_SYSTEM: &str = "\
You identify the named entities a question is about. Return the entity names exactly \
as they appear in the question, with a short type when obvious (person, organization, \
place, work, concept). Do not invent entities that are not mentioned.";

pub const RELATION_SCORE_SYSTEM: &str = "\
You are exploring a knowledge graph to answer a question. Given an entity and the \
relation types leaving it, pick the relations most likely to lead to the answer and \
score each from 0 to 1. Use the relation names exactly as listed.";

pub const ENTITY_SCORE_SYSTEM: &str = "\
You are exploring a knowledge graph to answer a question. Score how relevant each \
candidate fact is to answering the question, from 0 (irrelevant) to 1 (essential). \
Refer to candidates by their index.";

pub const SUFFICIENCY_SYSTEM: &str = "\
You decide whether the evidence gathered so far is enough to answer a question. \
Answer \"complete\" only when the facts below directly support an answer; otherwise \
answer \"incomplete\".";

pub const ANSWER_SYSTEM: &str = "\
You answer questions using facts retrieved from a knowledge graph. Base the answer on \
the numbered facts, cite the indices you used in \"evidence\", and give a confidence \
from 0 to 1. If the facts are insufficient, say so and lower the confidence.";

pub const FALLBACK_ANSWER_SYSTEM: &str = "\
No facts could be retrieved from the knowledge graph for this question. Answer from \
general knowledge if you can, and state that the answer is not grounded in the graph. \
Give a confidence from 0 to 1.";

/// Appended to the system prompt when the previous reply could not be parsed.
pub const STRICT_JSON_ADDON: &str = "\
Your previous reply could not be parsed. Reply with ONLY the JSON object: no prose, \
no markdown fences, no trailing commas.";

pub fn with_strict_addon(system: &str) -> String {
    format!("{}\n\n{}", system, STRICT_JSON_ADDON)
}

pub fn topic_entity_prompt(question: &str) -> String {
    format!("Question: {}\n\nList the entities.", question)
}

pub fn relation_score_prompt(
    question: &str,
    entity_name: &str,
    relations: &[String],
    top_k: usize,
) -> String {
    let listed = relations
        .iter()
        .enumerate()
        .map(|(i, r)| format!("{}. {} ({})", i + 1, r, humanize_relation(r)))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "Question: {}\nEntity: {}\nRelations:\n{}\n\nScore the top {} relations with a one-line rationale each.",
        question, entity_name, listed, top_k
    )
}

pub fn entity_score_prompt(question: &str, context: &str, candidates: &[CandidateEntity]) -> String {
    let listed = candidates
        .iter()
        .enumerate()
        .map(|(i, c)| {
            format!(
                "{}. {} -[{}]-> {} ({})",
                i, c.source_name, c.relation, c.name, c.entity_type
            )
        })
        .collect::<Vec<_>>()
        .join("\n");
    let context = if context.is_empty() {
        "(none yet)"
    } else {
        context
    };
    format!(
        "Question: {}\nKnown facts:\n{}\nCandidates:\n{}\n\nScore every candidate.",
        question, context, listed
    )
}

/// Numbered fact list: `[i] (subject, relation, object)`.
pub fn format_triplets(triplets: &[Triplet]) -> String {
    triplets
        .iter()
        .enumerate()
        .map(|(i, t)| format!("[{}] {} (hop {})", i, t, t.step_depth))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn sufficiency_prompt(question: &str, triplets: &[Triplet], depth: usize) -> String {
    format!(
        "Question: {}\nFacts after {} hop(s):\n{}\n\nIs this enough to answer?",
        question,
        depth,
        format_triplets(triplets)
    )
}

pub fn answer_prompt(question: &str, triplets: &[Triplet], notes: &[String]) -> String {
    let mut prompt = format!(
        "Question: {}\nFacts:\n{}",
        question,
        format_triplets(triplets)
    );
    if !notes.is_empty() {
        prompt.push_str("\nNotes:\n");
        prompt.push_str(&notes.join("\n"));
    }
    prompt.push_str("\n\nAnswer the question.");
    prompt
}

pub fn fallback_answer_prompt(question: &str) -> String {
    format!("Question: {}\n\nAnswer the question.", question)
}

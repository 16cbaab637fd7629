//! Lexical helpers: tokenizing, name similarity and heuristic phrase extraction.

use std::collections::HashSet;

const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "did", "do", "does", "for", "from", "has",
    "have", "how", "in", "is", "it", "of", "on", "or", "that", "the", "to", "was", "were", "what",
    "when", "where", "which", "who", "whom", "whose", "why", "with",
];

const QUESTION_WORDS: &[&str] = &[
    "how", "what", "when", "where", "which", "who", "whom", "whose", "why", "is", "are", "was",
    "were", "do", "does", "did", "can", "could", "should", "would", "will", "tell", "list", "name",
    "give", "find", "show", "the", "a", "an", "in", "of",
];

/// Lowercase alphanumeric tokens, stopwords removed.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .filter(|t| !STOPWORDS.contains(&t.as_str()))
        .collect()
}

/// `works_at` / `WorksAt` / `works-at` → `works at`.
pub fn humanize_relation(relation: &str) -> String {
    let mut out = String::with_capacity(relation.len() + 4);
    let mut prev_lower = false;
    for c in relation.chars() {
        if c == '_' || c == '-' || c == '.' || c == '/' {
            out.push(' ');
            prev_lower = false;
        } else if c.is_uppercase() && prev_lower {
            out.push(' ');
            out.extend(c.to_lowercase());
            prev_lower = false;
        } else {
            out.extend(c.to_lowercase());
            prev_lower = c.is_lowercase() || c.is_ascii_digit();
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Edit distance over chars.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut cur = vec![0; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        cur[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            cur[j + 1] = (prev[j + 1] + 1).min(cur[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    prev[b.len()]
}

/// `1 - distance / max_len`, in [0, 1]. Two empty strings are identical.
pub fn normalized_levenshtein(a: &str, b: &str) -> f32 {
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    1.0 - levenshtein(a, b) as f32 / max_len as f32
}

/// Jaccard index of the raw token sets (stopwords kept).
pub fn token_jaccard(a: &str, b: &str) -> f32 {
    let set = |s: &str| -> HashSet<String> {
        s.split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(str::to_lowercase)
            .collect()
    };
    let (sa, sb) = (set(a), set(b));
    if sa.is_empty() && sb.is_empty() {
        return 0.0;
    }
    let inter = sa.intersection(&sb).count();
    let union = sa.union(&sb).count();
    inter as f32 / union as f32
}

/// `max(normalized Levenshtein, token Jaccard)` on lowercased, trimmed names.
pub fn lexical_similarity(phrase: &str, name: &str) -> f32 {
    let a = phrase.trim().to_lowercase();
    let b = name.trim().to_lowercase();
    normalized_levenshtein(&a, &b).max(token_jaccard(&a, &b))
}

fn push_phrase(phrases: &mut Vec<String>, phrase: &str) {
    let p = phrase.trim();
    if !p.is_empty() && !phrases.iter().any(|q| q.eq_ignore_ascii_case(p)) {
        phrases.push(p.to_string());
    }
}

/// Candidate entity phrases without a model: quoted spans, runs of capitalized
/// words, and single capital letters. Sentence-leading question words are skipped.
/// Quoted spans come first, then the rest in order of appearance; duplicates are
/// removed case-insensitively.
pub fn extract_candidate_phrases(question: &str) -> Vec<String> {
    let mut phrases: Vec<String> = Vec::new();

    let mut unquoted = String::with_capacity(question.len());
    let mut in_quote = false;
    let mut span = String::new();
    for c in question.chars() {
        if c == '"' || c == '\u{201c}' || c == '\u{201d}' {
            if in_quote {
                push_phrase(&mut phrases, &span);
                span.clear();
            }
            in_quote = !in_quote;
            unquoted.push(' ');
        } else if in_quote {
            span.push(c);
        } else {
            unquoted.push(c);
        }
    }

    let mut run: Vec<&str> = Vec::new();
    let mut sentence_start = true;
    for word in unquoted.split_whitespace() {
        let clean = word.trim_matches(|c: char| !c.is_alphanumeric());
        let capitalized = clean.chars().next().is_some_and(char::is_uppercase);
        let leading_question_word =
            sentence_start && QUESTION_WORDS.contains(&clean.to_lowercase().as_str());
        if capitalized && !leading_question_word {
            run.push(clean);
        } else if !run.is_empty() {
            push_phrase(&mut phrases, &run.join(" "));
            run.clear();
        }
        if word.ends_with([',', '?', '.', '!', ';', ':']) && !run.is_empty() {
            push_phrase(&mut phrases, &run.join(" "));
            run.clear();
        }
        sentence_start = word.ends_with(['.', '?', '!']);
    }
    if !run.is_empty() {
        push_phrase(&mut phrases, &run.join(" "));
    }
    phrases
}

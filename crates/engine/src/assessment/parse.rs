//! Defensive parsing of language-model output
//!
//! Model text is untrusted. Every parser returns `None` instead of failing
//! so the caller can fall back to a deterministic answer.

use jobquest_core::{AnswerEvaluation, MAX_ANSWER_SCORE};
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

fn fence_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"```[A-Za-z0-9_-]*").expect("valid fence regex"))
}

fn object_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)\{.*\}").expect("valid object regex"))
}

fn array_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)\[.*\]").expect("valid array regex"))
}

fn score_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(?:score|puntaje|puntuaci[oó]n|calificaci[oó]n)\W{0,3}\s*[:=]?\s*(-?\d{1,3})")
            .expect("valid score regex")
    })
}

fn numbered_line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*\d{1,2}\s*[.)\-:]\s*(.+)$").expect("valid list regex"))
}

/// Remove markdown code fences (```json ... ```) keeping their content
pub fn strip_code_fences(text: &str) -> String {
    fence_re().replace_all(text, "").trim().to_string()
}

/// Find the first JSON value in `text`: the whole text, else the widest
/// `{...}` or `[...]` span.
fn extract_json(text: &str) -> Option<Value> {
    if let Ok(value) = serde_json::from_str::<Value>(text) {
        return Some(value);
    }
    [object_re(), array_re()]
        .iter()
        .filter_map(|re| re.find(text))
        .find_map(|m| serde_json::from_str::<Value>(m.as_str()).ok())
}

fn string_list(value: &Value) -> Option<Vec<String>> {
    let items = match value {
        Value::Array(items) => items,
        Value::Object(map) => ["questions", "preguntas"]
            .iter()
            .find_map(|k| map.get(*k))
            .and_then(Value::as_array)?,
        _ => return None,
    };

    Some(
        items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.clone()),
                Value::Object(o) => ["question", "pregunta", "text"]
                    .iter()
                    .find_map(|k| o.get(*k))
                    .and_then(Value::as_str)
                    .map(str::to_string),
                _ => None,
            })
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
    )
}

/// Parse generated questions, keeping exactly `count` of them.
///
/// Accepts a JSON array, a `{"questions": [...]}` object, or a numbered
/// list. Fewer than `count` usable questions is a failure.
pub fn parse_questions(text: &str, count: usize) -> Option<Vec<String>> {
    let cleaned = strip_code_fences(text);

    let mut questions = extract_json(&cleaned)
        .as_ref()
        .and_then(string_list)
        .unwrap_or_default();

    if questions.len() < count {
        questions = cleaned
            .lines()
            .filter_map(|line| numbered_line_re().captures(line))
            .filter_map(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
    }

    if questions.len() < count {
        return None;
    }
    questions.truncate(count);
    Some(questions)
}

fn as_score(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.round() as i64)),
        Value::String(s) => s.trim().parse::<f64>().ok().map(|f| f.round() as i64),
        _ => None,
    }
}

/// Parse `{"score": N, "feedback": "..."}`, or failing that a loose
/// `score: N` mention. Scores are clamped to 0..=50.
pub fn parse_evaluation(text: &str) -> Option<AnswerEvaluation> {
    let cleaned = strip_code_fences(text);

    if let Some(Value::Object(map)) = extract_json(&cleaned) {
        let score = ["score", "puntaje", "puntuacion"]
            .iter()
            .find_map(|k| map.get(*k))
            .and_then(as_score);

        if let Some(score) = score {
            let feedback = ["feedback", "retroalimentacion", "comentario"]
                .iter()
                .find_map(|k| map.get(*k))
                .and_then(Value::as_str)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| super::prompts::FALLBACK_FEEDBACK.to_string());

            return Some(AnswerEvaluation {
                score: score.clamp(0, MAX_ANSWER_SCORE),
                feedback,
            });
        }
    }

    let captures = score_re().captures(&cleaned)?;
    let score = captures.get(1)?.as_str().parse::<i64>().ok()?;

    let feedback = score_re().replace(&cleaned, "").trim().trim_matches(|c: char| c == '.' || c == ',').trim().to_string();
    Some(AnswerEvaluation {
        score: score.clamp(0, MAX_ANSWER_SCORE),
        feedback: if feedback.is_empty() {
            super::prompts::FALLBACK_FEEDBACK.to_string()
        } else {
            feedback
        },
    })
}

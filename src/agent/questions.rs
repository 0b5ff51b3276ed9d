//! Question generator: splits a query into `n` distinct sub-questions.
//!
//! The model is asked for exactly `n` angles in JSON. Whatever comes back is
//! normalized so the caller always receives exactly `n` non-empty, pairwise
//! distinct (case-insensitive) sub-questions: short lists are padded with
//! templated rephrasings, long lists truncated, duplicates replaced with a
//! variant naming a distinguishing angle.

use std::collections::HashSet;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};

use super::client::{InferenceClient, ModelTier};
use super::prompt::build_decompose_prompt;
use super::traits::Agent;
use crate::error::AgentError;

/// Angles appended to make a question distinct, in order of preference.
const ANGLES: &[&str] = &[
    "recent developments",
    "counter-arguments",
    "practical implications",
    "historical context",
    "key data and evidence",
    "expert perspectives",
    "risks and limitations",
    "future outlook",
];

/// Longest sub-question kept, in characters.
const MAX_QUESTION_CHARS: usize = 500;

/// Matches one numbered or bulleted list item.
static LIST_ITEM: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^\s*(?:\d+[.):]|[-*•])\s+(.+?)\s*$").ok());

/// Role that asks the model for investigative angles.
pub struct QuestionAgent {
    max_tokens: u32,
    system_prompt: String,
}

impl QuestionAgent {
    /// Creates the role with the given system prompt.
    pub const fn new(max_tokens: u32, system_prompt: String) -> Self {
        Self {
            max_tokens,
            system_prompt,
        }
    }

    /// Asks for `n` sub-questions and normalizes the answer.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] if the call fails or nothing usable comes back.
    pub async fn decompose(
        &self,
        client: &InferenceClient,
        tier: ModelTier,
        query: &str,
        n: usize,
    ) -> Result<Vec<String>, AgentError> {
        let response = self
            .execute(client, tier, &build_decompose_prompt(query, n))
            .await?;
        let raw = parse_questions(&response.content)?;
        debug!(requested = n, returned = raw.len(), "model returned sub-questions");
        Ok(normalize(query, raw, n))
    }
}

#[async_trait]
impl Agent for QuestionAgent {
    fn name(&self) -> &'static str {
        "question_generator"
    }

    fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    fn json_mode(&self) -> bool {
        true
    }

    fn max_tokens(&self) -> u32 {
        self.max_tokens
    }
}

/// Decomposes queries, never failing outright.
pub struct QuestionGenerator {
    agent: QuestionAgent,
}

impl QuestionGenerator {
    /// Creates a generator for the given role.
    pub const fn new(agent: QuestionAgent) -> Self {
        Self { agent }
    }

    /// Returns exactly `n` sub-questions for `query`.
    ///
    /// Falls back to [`fallback_questions`] when the model call fails.
    pub async fn generate(
        &self,
        client: &InferenceClient,
        tier: ModelTier,
        query: &str,
        n: usize,
    ) -> Vec<String> {
        match self.agent.decompose(client, tier, query, n).await {
            Ok(questions) => questions,
            Err(e) => {
                warn!(error = %e, "decomposition failed, using templated sub-questions");
                fallback_questions(query, n)
            }
        }
    }
}

/// Deterministic decomposition used when the model cannot be reached.
pub fn fallback_questions(query: &str, n: usize) -> Vec<String> {
    normalize(query, Vec::new(), n)
}

/// Extracts question strings from a model response.
///
/// Accepts a JSON array, `{"questions": [...]}` (strings or objects with a
/// `question` field), either wrapped in a markdown code block, or a plain
/// numbered/bulleted list.
///
/// # Errors
///
/// Returns [`AgentError::ResponseParse`] if nothing usable is found.
pub fn parse_questions(content: &str) -> Result<Vec<String>, AgentError> {
    let trimmed = content.trim();

    let json_str = if trimmed.starts_with("```") {
        trimmed
            .trim_start_matches("```json")
            .trim_start_matches("```")
            .trim_end_matches("```")
            .trim()
    } else {
        trimmed
    };

    if let Ok(value) = serde_json::from_str::<Value>(json_str) {
        let items = match &value {
            Value::Array(items) => Some(items),
            Value::Object(map) => ["questions", "subQuestions", "sub_questions"]
                .iter()
                .find_map(|k| map.get(*k))
                .and_then(Value::as_array),
            _ => None,
        };
        if let Some(items) = items {
            let questions: Vec<String> = items
                .iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(s.clone()),
                    Value::Object(o) => o.get("question").and_then(Value::as_str).map(String::from),
                    _ => None,
                })
                .collect();
            if !questions.is_empty() {
                return Ok(questions);
            }
        }
    }

    let listed: Vec<String> = LIST_ITEM
        .as_ref()
        .map(|re| {
            json_str
                .lines()
                .filter_map(|line| re.captures(line))
                .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_string()))
                .collect()
        })
        .unwrap_or_default();
    if !listed.is_empty() {
        return Ok(listed);
    }

    let preview: String = json_str.chars().take(200).collect();
    Err(AgentError::ResponseParse {
        message: format!("no sub-questions found in response, preview: {preview:?}"),
        content: content.to_string(),
    })
}

/// Yields distinguishing angles: the fixed list, then numbered perspectives.
struct AngleSource {
    next: usize,
}

impl AngleSource {
    const fn new() -> Self {
        Self { next: 0 }
    }

    fn take(&mut self) -> String {
        let i = self.next;
        self.next += 1;
        ANGLES.get(i).map_or_else(
            || format!("perspective {}", i - ANGLES.len() + 1),
            |a| (*a).to_string(),
        )
    }

    /// First variant of `base` whose key is not in `seen`.
    fn distinct_variant(&mut self, base: &str, seen: &HashSet<String>) -> String {
        loop {
            let candidate = format!("{base}, focusing on {}", self.take());
            if !seen.contains(&key(&candidate)) {
                return candidate;
            }
        }
    }
}

fn key(question: &str) -> String {
    question.trim().to_lowercase()
}

fn clean(question: &str) -> String {
    let stripped = LIST_ITEM
        .as_ref()
        .and_then(|re| re.captures(question))
        .and_then(|caps| caps.get(1))
        .map_or(question, |m| m.as_str());
    stripped.trim().chars().take(MAX_QUESTION_CHARS).collect()
}

/// Forces `raw` into exactly `n` non-empty, pairwise distinct questions.
pub fn normalize(query: &str, raw: Vec<String>, n: usize) -> Vec<String> {
    let mut angles = AngleSource::new();
    let mut seen: HashSet<String> = HashSet::with_capacity(n);
    let mut out: Vec<String> = Vec::with_capacity(n);

    for question in raw.iter().map(|q| clean(q)).filter(|q| !q.is_empty()) {
        if out.len() == n {
            break;
        }
        let question = if seen.contains(&key(&question)) {
            angles.distinct_variant(&question, &seen)
        } else {
            question
        };
        seen.insert(key(&question));
        out.push(question);
    }

    let base = query.trim();
    let base = if base.is_empty() { "the question" } else { base };
    while out.len() < n {
        let question = angles.distinct_variant(base, &seen);
        seen.insert(key(&question));
        out.push(question);
    }

    out
}

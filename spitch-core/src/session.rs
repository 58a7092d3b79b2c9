//! Session context: rolling conversation history plus derived context.
//!
//! The derived context keeps only the most recent value for each tracked
//! entity (`last_app`, `last_file`, `last_url`, `last_calculation`) and is what
//! pronoun resolution reads from.

use crate::error::Result;
use crate::store;
use crate::types::SkillParams;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::path::Path;

pub const LAST_APP: &str = "last_app";
pub const LAST_FILE: &str = "last_file";
pub const LAST_URL: &str = "last_url";
pub const LAST_CALCULATION: &str = "last_calculation";

const PRONOUNS: &[&str] = &["it", "this", "that"];

/// Entity key → derived context key.
const TRACKED_ENTITIES: &[(&str, &str)] = &[
    ("app", LAST_APP),
    ("file_path", LAST_FILE),
    ("url", LAST_URL),
    ("expression", LAST_CALCULATION),
];

/// One completed exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub timestamp: DateTime<Local>,
    pub user_input: String,
    pub response: String,
    pub intent: Option<String>,
    pub success: bool,
}

impl Interaction {
    pub fn new(
        user_input: impl Into<String>,
        response: impl Into<String>,
        intent: Option<String>,
        success: bool,
    ) -> Self {
        Self {
            timestamp: Local::now(),
            user_input: user_input.into(),
            response: response.into(),
            intent,
            success,
        }
    }
}

/// On-disk layout.
#[derive(Debug, Serialize, Deserialize)]
struct SessionFile {
    session_id: String,
    start_time: DateTime<Local>,
    #[serde(default)]
    conversation_history: Vec<Interaction>,
    #[serde(default)]
    context: BTreeMap<String, String>,
}

/// Bounded conversation history for the current session.
#[derive(Debug, Clone)]
pub struct SessionContext {
    session_id: String,
    start_time: DateTime<Local>,
    history: VecDeque<Interaction>,
    max_history: usize,
    context: BTreeMap<String, String>,
}

impl SessionContext {
    pub fn new(max_history: usize) -> Self {
        let start_time = Local::now();
        Self {
            session_id: start_time.format("session_%Y%m%d_%H%M%S").to_string(),
            start_time,
            history: VecDeque::with_capacity(max_history.max(1)),
            max_history: max_history.max(1),
            context: BTreeMap::new(),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn start_time(&self) -> DateTime<Local> {
        self.start_time
    }

    pub fn max_history(&self) -> usize {
        self.max_history
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// All interactions, oldest first.
    pub fn history(&self) -> impl DoubleEndedIterator<Item = &Interaction> + ExactSizeIterator {
        self.history.iter()
    }

    /// The last `n` interactions, oldest first.
    pub fn recent(&self, n: usize) -> Vec<&Interaction> {
        let skip = self.history.len().saturating_sub(n);
        self.history.iter().skip(skip).collect()
    }

    pub fn last(&self) -> Option<&Interaction> {
        self.history.back()
    }

    /// Append an interaction, evicting the oldest when full, and fold its
    /// entities into the derived context.
    pub fn record(&mut self, interaction: Interaction, entities: &SkillParams) {
        while self.history.len() >= self.max_history {
            self.history.pop_front();
        }
        self.history.push_back(interaction);
        self.update_context(entities);
    }

    /// Last-write-wins update of the tracked context keys.
    pub fn update_context(&mut self, entities: &SkillParams) {
        for (entity, key) in TRACKED_ENTITIES {
            if let Some(value) = entities.get(*entity).and_then(|v| v.as_str()) {
                if !value.trim().is_empty() {
                    self.context.insert(key.to_string(), value.trim().to_string());
                }
            }
        }
    }

    pub fn context_value(&self, key: &str) -> Option<&str> {
        self.context.get(key).map(String::as_str)
    }

    pub fn set_context(&mut self, key: &str, value: impl Into<String>) {
        self.context.insert(key.to_string(), value.into());
    }

    pub fn context(&self) -> &BTreeMap<String, String> {
        &self.context
    }

    /// Replace standalone "it" / "this" / "that" with the last app, falling
    /// back to the last file. Returns the input unchanged when neither is known.
    pub fn resolve_pronouns(&self, text: &str) -> String {
        let referent = self
            .context_value(LAST_APP)
            .or_else(|| self.context_value(LAST_FILE));
        match referent {
            Some(referent) => replace_words(text, PRONOUNS, referent),
            None => text.to_string(),
        }
    }

    /// Recent turns rendered for a model prompt.
    pub fn context_for_prompt(&self, turns: usize) -> String {
        self.recent(turns)
            .into_iter()
            .map(|i| format!("User: {}\nAssistant: {}", i.user_input, i.response))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// One-line description for status output.
    pub fn summary(&self) -> String {
        let successes = self.history.iter().filter(|i| i.success).count();
        let mut summary = format!(
            "Session {} started {}: {} interaction(s), {} successful",
            self.session_id,
            self.start_time.format("%Y-%m-%d %H:%M"),
            self.history.len(),
            successes
        );
        if !self.context.is_empty() {
            let context = self
                .context
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join(", ");
            summary.push_str(&format!(" [{context}]"));
        }
        summary
    }

    pub fn clear(&mut self) {
        self.history.clear();
        self.context.clear();
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let file = SessionFile {
            session_id: self.session_id.clone(),
            start_time: self.start_time,
            conversation_history: self.history.iter().cloned().collect(),
            context: self.context.clone(),
        };
        store::save_json(path, &file)?;
        tracing::debug!(path = %path.display(), interactions = self.history.len(), "Saved session");
        Ok(())
    }

    /// Load a saved session, or `None` if the file does not exist.
    ///
    /// A history longer than `max_history` keeps only its newest entries.
    pub fn load(path: &Path, max_history: usize) -> Result<Option<Self>> {
        let Some(file) = store::load_json::<SessionFile>(path)? else {
            return Ok(None);
        };
        let max_history = max_history.max(1);
        let mut history: VecDeque<Interaction> = file.conversation_history.into();
        while history.len() > max_history {
            history.pop_front();
        }
        Ok(Some(Self {
            session_id: file.session_id,
            start_time: file.start_time,
            history,
            max_history,
            context: file.context,
        }))
    }

    /// Load from `path`, or start a fresh session when nothing is saved.
    pub fn load_or_new(path: &Path, max_history: usize) -> Result<Self> {
        Ok(Self::load(path, max_history)?.unwrap_or_else(|| Self::new(max_history)))
    }
}

/// Replace whole-word, case-insensitive occurrences of `words` in `text`.
fn replace_words(text: &str, words: &[&str], replacement: &str) -> String {
    let mut out = String::with_capacity(text.len() + replacement.len());
    let mut word = String::new();

    let flush = |word: &mut String, out: &mut String| {
        if words.iter().any(|w| w.eq_ignore_ascii_case(word.as_str())) {
            out.push_str(replacement);
        } else {
            out.push_str(word.as_str());
        }
        word.clear();
    };

    for c in text.chars() {
        if c.is_alphanumeric() || c == '_' || c == '\'' {
            word.push(c);
        } else {
            flush(&mut word, &mut out);
            out.push(c);
        }
    }
    flush(&mut word, &mut out);
    out
}

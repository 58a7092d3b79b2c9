//! Last-resort keyword classifier.
//!
//! Recognises web searches, calculations, website names and "open <app>".
//! Its plans carry a confidence at or below the execution threshold, so they
//! are reported but never executed.

use super::patterns::google_search_url;
use super::{ResolveContext, ResolverStrategy};
use crate::error::Result;
use crate::types::{ActionKind, ActionPlan, ActionStep, PlanSource};
use regex::Regex;

const MAX_CONFIDENCE: f64 = 0.4;

const WEBSITES: &[(&str, &str)] = &[
    ("gemini", "https://gemini.google.com"),
    ("chatgpt", "https://chat.openai.com"),
    ("claude", "https://claude.ai"),
    ("youtube", "https://youtube.com"),
    ("google", "https://google.com"),
];

#[derive(Debug)]
pub struct KeywordStrategy {
    confidence: f64,
    search_words: Regex,
    expression: Regex,
    site_words: Regex,
    open_word: Regex,
}

impl KeywordStrategy {
    /// `threshold` is the resolver's acceptance threshold.
    pub fn new(threshold: f64) -> Result<Self> {
        Ok(Self {
            confidence: MAX_CONFIDENCE.min(threshold).max(0.0),
            search_words: Regex::new(r"search|find|for|on google|on web")?,
            expression: Regex::new(r"(?:calculate|what is|what's)\s+(.+)")?,
            site_words: Regex::new(r"open|launch|start|in browser|website")?,
            open_word: Regex::new(r"open\s+(\w+)")?,
        })
    }

    pub fn classify(&self, input: &str) -> Option<ActionPlan> {
        let lower = input.to_lowercase();

        let (intent, step) = if lower.contains("search") || lower.contains("find") {
            let query = self.search_words.replace_all(&lower, "");
            let query = query.split_whitespace().collect::<Vec<_>>().join(" ");
            if query.is_empty() {
                return None;
            }
            (
                "web_search",
                ActionStep::new(ActionKind::OpenWebsite).with("url", google_search_url(&query)),
            )
        } else if let Some(expression) = self
            .expression
            .captures(&lower)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string())
            .filter(|e| !e.is_empty())
        {
            (
                "calculate",
                ActionStep::new(ActionKind::Calculate).with("expression", expression),
            )
        } else if lower.contains("in browser")
            || lower.contains("website")
            || WEBSITES.iter().any(|(name, _)| lower.contains(name))
        {
            let target = self.site_words.replace_all(&lower, "");
            let target = target.trim();
            let url = WEBSITES
                .iter()
                .find(|(name, _)| target.contains(name))
                .map(|(_, url)| url.to_string())
                .unwrap_or_else(|| format!("https://{}.com", target.replace(' ', "")));
            ("open_website", ActionStep::new(ActionKind::OpenWebsite).with("url", url))
        } else {
            let app = self
                .open_word
                .captures(&lower)
                .and_then(|c| c.get(1))?
                .as_str()
                .to_string();
            ("open_app", ActionStep::new(ActionKind::OpenApp).with("app", app))
        };

        Some(ActionPlan::from_steps(
            intent,
            vec![step],
            self.confidence,
            PlanSource::Keyword,
        ))
    }
}

impl ResolverStrategy for KeywordStrategy {
    fn name(&self) -> &'static str {
        "keyword"
    }

    fn resolve(&self, input: &str, _ctx: &ResolveContext<'_>) -> Result<Option<ActionPlan>> {
        Ok(self.classify(input))
    }
}

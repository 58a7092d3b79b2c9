//! Skill registry
//!
//! A skill is a named handler plus a description and a parameter schema.
//! The registry maps names to skills; the resolver reads the catalogue to
//! build model prompts and the executor looks skills up by [`ActionKind`].
//!
//! ## Usage
//!
//! ```rust
//! use spitch_core::skills::SkillRegistry;
//!
//! let mut registry = SkillRegistry::new();
//! registry.register(
//!     "greet",
//!     "Say hello",
//!     &[("name", "who to greet")],
//!     |params: &spitch_core::SkillParams| {
//!         let name = spitch_core::skills::required_str("greet", params, "name")?;
//!         Ok(format!("Hello, {name}"))
//!     },
//! );
//!
//! let mut params = spitch_core::SkillParams::new();
//! params.insert("name".into(), "Ada".into());
//! assert_eq!(registry.execute("greet", &params).unwrap(), "Hello, Ada");
//! ```

pub mod builtins;
pub mod calc;
pub mod desktop;

use crate::error::{Error, Result};
use crate::types::{ActionKind, SkillParams};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

pub use builtins::register_builtins;
pub use desktop::{Desktop, SystemDesktop};

/// Executable body of a skill.
///
/// Errors are returned to the caller untouched; retry policy belongs to the
/// executor.
pub trait SkillHandler: Send + Sync {
    fn call(&self, params: &SkillParams) -> Result<String>;
}

impl<F> SkillHandler for F
where
    F: Fn(&SkillParams) -> Result<String> + Send + Sync,
{
    fn call(&self, params: &SkillParams) -> Result<String> {
        self(params)
    }
}

/// One declared parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParamSpec {
    pub name: String,
    pub description: String,
}

/// A registered skill.
pub struct Skill {
    pub name: String,
    pub description: String,
    pub params: Vec<ParamSpec>,
    handler: Box<dyn SkillHandler>,
}

impl Skill {
    pub fn call(&self, params: &SkillParams) -> Result<String> {
        self.handler.call(params)
    }

    pub fn info(&self) -> SkillInfo {
        SkillInfo {
            name: self.name.clone(),
            description: self.description.clone(),
            params: self.params.clone(),
        }
    }
}

impl fmt::Debug for Skill {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Skill")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

/// Handler-free snapshot of a skill, for listings and prompts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkillInfo {
    pub name: String,
    pub description: String,
    pub params: Vec<ParamSpec>,
}

/// Result of resolving an action kind against the registry.
#[derive(Debug)]
pub enum SkillLookup<'a> {
    Found(&'a Skill),
    Unknown,
}

/// Name → skill catalogue.
#[derive(Debug, Default)]
pub struct SkillRegistry {
    skills: HashMap<String, Skill>,
}

impl SkillRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the built-in skills.
    pub fn with_builtins(
        desktop: std::sync::Arc<dyn Desktop>,
        sandbox: std::sync::Arc<crate::safety::SafetySandbox>,
    ) -> Self {
        let mut registry = Self::new();
        register_builtins(&mut registry, desktop, sandbox);
        registry
    }

    /// Register a closure as a skill. An existing skill with the same name is
    /// replaced and returned.
    pub fn register<F>(
        &mut self,
        name: &str,
        description: &str,
        params: &[(&str, &str)],
        handler: F,
    ) -> Option<Skill>
    where
        F: Fn(&SkillParams) -> Result<String> + Send + Sync + 'static,
    {
        self.register_handler(name, description, params, Box::new(handler))
    }

    /// Register any [`SkillHandler`] implementation.
    pub fn register_handler(
        &mut self,
        name: &str,
        description: &str,
        params: &[(&str, &str)],
        handler: Box<dyn SkillHandler>,
    ) -> Option<Skill> {
        let skill = Skill {
            name: name.to_string(),
            description: description.to_string(),
            params: params
                .iter()
                .map(|(name, description)| ParamSpec {
                    name: name.to_string(),
                    description: description.to_string(),
                })
                .collect(),
            handler,
        };

        let previous = self.skills.insert(name.to_string(), skill);
        if previous.is_some() {
            tracing::debug!(skill = name, "Replaced skill");
        } else {
            tracing::debug!(skill = name, "Registered skill");
        }
        previous
    }

    pub fn get(&self, name: &str) -> Option<&Skill> {
        self.skills.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.skills.contains_key(name)
    }

    pub fn lookup(&self, kind: &ActionKind) -> SkillLookup<'_> {
        match self.skills.get(kind.as_str()) {
            Some(skill) => SkillLookup::Found(skill),
            None => SkillLookup::Unknown,
        }
    }

    /// Invoke a skill by name.
    pub fn execute(&self, name: &str, params: &SkillParams) -> Result<String> {
        let skill = self
            .get(name)
            .ok_or_else(|| Error::SkillNotFound(name.to_string()))?;
        skill.call(params)
    }

    /// Snapshot of all skills, sorted by name.
    pub fn list_all(&self) -> Vec<SkillInfo> {
        let mut infos: Vec<SkillInfo> = self.skills.values().map(Skill::info).collect();
        infos.sort_by(|a, b| a.name.cmp(&b.name));
        infos
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.skills.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.skills.len()
    }

    pub fn is_empty(&self) -> bool {
        self.skills.is_empty()
    }

    /// Catalogue lines for the model prompt: `- name(param: desc, ...): description`.
    pub fn prompt_snippet(&self) -> String {
        let mut lines = Vec::with_capacity(self.skills.len() + 1);
        lines.push("Available Skills:".to_string());
        for info in self.list_all() {
            let params = info
                .params
                .iter()
                .map(|p| format!("{}: {}", p.name, p.description))
                .collect::<Vec<_>>()
                .join(", ");
            lines.push(format!("- {}({}): {}", info.name, params, info.description));
        }
        lines.join("\n")
    }
}

// ============================================
// Parameter helpers for handlers
// ============================================

/// Required non-empty string parameter.
pub fn required_str<'a>(skill: &str, params: &'a SkillParams, key: &str) -> Result<&'a str> {
    match params.get(key) {
        Some(serde_json::Value::String(s)) if !s.trim().is_empty() => Ok(s.as_str()),
        Some(serde_json::Value::String(_)) => {
            Err(Error::invalid_params(skill, format!("`{key}` is empty")))
        }
        Some(other) => Err(Error::invalid_params(
            skill,
            format!("`{key}` must be a string, got {other}"),
        )),
        None => Err(Error::invalid_params(skill, format!("missing `{key}`"))),
    }
}

/// Optional string parameter; `null` counts as absent.
pub fn optional_str<'a>(params: &'a SkillParams, key: &str) -> Option<&'a str> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .filter(|s| !s.trim().is_empty())
}

/// Optional number parameter. Numeric strings ("5") are accepted too;
/// NaN and infinities are not.
pub fn optional_f64(params: &SkillParams, key: &str) -> Option<f64> {
    let n = match params.get(key)? {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    n.filter(|n| n.is_finite())
}

/// Like [`optional_f64`], but a value that is present and not a finite
/// number is an error instead of being ignored.
pub fn finite_f64(skill: &str, params: &SkillParams, key: &str) -> Result<Option<f64>> {
    match params.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(value) => optional_f64(params, key).map(Some).ok_or_else(|| {
            Error::invalid_params(skill, format!("`{key}` must be a finite number, got {value}"))
        }),
    }
}

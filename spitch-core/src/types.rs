//! Core domain types for spitch
//!
//! | Term | Definition |
//! |------|------------|
//! | **Skill** | A named, registered handler with a declared parameter schema |
//! | **Action Step** | One skill invocation: an [`ActionKind`] plus its parameters |
//! | **Action Plan** | Ordered steps with a confidence score and an intent label |
//! | **Entities** | Values pulled out of a command (app, file, url, expression) |
//!
//! Plans are transient: they exist for one command's resolution and
//! execution and are never persisted.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Parameters passed to a skill handler.
pub type SkillParams = serde_json::Map<String, serde_json::Value>;

// ============================================
// Action kinds
// ============================================

macro_rules! action_kinds {
    ($($variant:ident => $name:literal,)+) => {
        /// The action a step performs.
        ///
        /// Known kinds get their own variant; anything else (a model-invented
        /// action or an extension skill) lands in [`ActionKind::Other`]. Whether
        /// a kind is actually executable is decided by the skill registry.
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        pub enum ActionKind {
            $($variant,)+
            Other(String),
        }

        impl ActionKind {
            pub fn as_str(&self) -> &str {
                match self {
                    $(ActionKind::$variant => $name,)+
                    ActionKind::Other(name) => name,
                }
            }

            /// Every kind with a dedicated variant.
            pub fn known() -> &'static [ActionKind] {
                KNOWN_KINDS
            }
        }

        const KNOWN_KINDS: &[ActionKind] = &[$(ActionKind::$variant,)+];

        impl From<&str> for ActionKind {
            fn from(s: &str) -> Self {
                match s {
                    $($name => ActionKind::$variant,)+
                    other => ActionKind::Other(other.to_string()),
                }
            }
        }
    };
}

action_kinds! {
    OpenApp => "open_app",
    OpenWebsite => "open_website",
    TypeText => "type_text",
    PressKey => "press_key",
    Wait => "wait",
    Calculate => "calculate",
    WriteFile => "write_file",
    ReadFile => "read_file",
    DeleteFile => "delete_file",
    RenameFile => "rename_file",
    SetVolume => "set_volume",
    LockScreen => "lock_screen",
    Shutdown => "shutdown",
    CopyToClipboard => "copy_to_clipboard",
    KillProcess => "kill_process",
    TakeScreenshot => "take_screenshot",
    PlaySpotifySong => "play_spotify_song",
    OrganizeFiles => "organize_files",
    FindRecentFiles => "find_recent_files",
    SearchFiles => "search_files",
    FindDuplicates => "find_duplicates",
    GitStatus => "git_status",
    GitCommit => "git_commit",
    GitPush => "git_push",
    GitPull => "git_pull",
    RunShellCommand => "run_shell_command",
    OpenBrowser => "open_browser",
    NavigateToUrl => "navigate_to_url",
    FillFormField => "fill_form_field",
    SubmitForm => "submit_form",
    ClickOnElement => "click_on_element",
    TakePageScreenshot => "take_page_screenshot",
    ExtractText => "extract_text",
    CloseBrowser => "close_browser",
}

impl From<String> for ActionKind {
    fn from(s: String) -> Self {
        ActionKind::from(s.as_str())
    }
}

impl From<ActionKind> for String {
    fn from(kind: ActionKind) -> Self {
        kind.as_str().to_string()
    }
}

impl std::str::FromStr for ActionKind {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(ActionKind::from(s))
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ActionKind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ActionKind {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(ActionKind::from(name))
    }
}

// ============================================
// Steps and plans
// ============================================

/// One skill invocation inside a plan.
///
/// Decodes from either `{"type": ..}` (model output) or `{"action": ..}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionStep {
    #[serde(rename = "type", alias = "action")]
    pub kind: ActionKind,
    #[serde(default)]
    pub params: SkillParams,
}

impl ActionStep {
    pub fn new(kind: ActionKind) -> Self {
        Self {
            kind,
            params: SkillParams::new(),
        }
    }

    /// Builder-style parameter setter.
    pub fn with(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.params.insert(key.to_string(), value.into());
        self
    }

    /// String parameter, if present.
    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.params.get(key).and_then(|v| v.as_str())
    }
}

/// Which resolver tier produced a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanSource {
    /// Deterministic rule match
    Pattern,
    /// Language model output
    Model,
    /// Keyword heuristic (never executed by default)
    Keyword,
}

impl PlanSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanSource::Pattern => "pattern",
            PlanSource::Model => "model",
            PlanSource::Keyword => "keyword",
        }
    }
}

impl std::str::FromStr for PlanSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pattern" => Ok(PlanSource::Pattern),
            "model" => Ok(PlanSource::Model),
            "keyword" => Ok(PlanSource::Keyword),
            _ => Err(format!("unknown plan source: {}", s)),
        }
    }
}

/// An ordered list of steps with a confidence score and intent label.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionPlan {
    pub intent: String,
    pub steps: Vec<ActionStep>,
    /// 0.0 - 1.0
    pub confidence: f64,
    pub entities: SkillParams,
    pub source: PlanSource,
}

impl ActionPlan {
    /// Build a plan whose entities are derived from its own steps.
    pub fn from_steps(
        intent: impl Into<String>,
        steps: Vec<ActionStep>,
        confidence: f64,
        source: PlanSource,
    ) -> Self {
        let entities = derive_entities(&steps);
        Self {
            intent: intent.into(),
            steps,
            confidence: confidence.clamp(0.0, 1.0),
            entities,
            source,
        }
    }

    /// True when the plan has at least one step and clears `threshold`.
    pub fn is_executable(&self, threshold: f64) -> bool {
        !self.steps.is_empty() && self.confidence > threshold
    }

    /// Entity as a string, if present.
    pub fn entity(&self, key: &str) -> Option<&str> {
        self.entities.get(key).and_then(|v| v.as_str())
    }
}

/// Extract the tracked entities from a step list.
///
/// Later steps win, so "open a and open b" yields `app = b`.
pub fn derive_entities(steps: &[ActionStep]) -> SkillParams {
    let mut entities = SkillParams::new();
    for step in steps {
        let (key, param) = match step.kind {
            ActionKind::OpenApp => ("app", "app"),
            ActionKind::OpenWebsite | ActionKind::NavigateToUrl => ("url", "url"),
            ActionKind::Calculate => ("expression", "expression"),
            ActionKind::WriteFile | ActionKind::ReadFile | ActionKind::DeleteFile => {
                ("file_path", "file_path")
            }
            ActionKind::RenameFile => ("file_path", "new_path"),
            ActionKind::SearchFiles => ("query", "query"),
            _ => continue,
        };
        if let Some(value) = step.param_str(param) {
            entities.insert(key.to_string(), value.into());
        }
    }
    entities
}

// ============================================
// Time of day
// ============================================

/// Coarse part of the day used for routines and suggestions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeOfDay {
    /// 05:00 - 11:59
    Morning,
    /// 12:00 - 16:59
    Afternoon,
    /// 17:00 - 20:59
    Evening,
    /// 21:00 - 04:59
    Night,
}

impl TimeOfDay {
    pub fn from_hour(hour: u32) -> Self {
        match hour {
            5..=11 => TimeOfDay::Morning,
            12..=16 => TimeOfDay::Afternoon,
            17..=20 => TimeOfDay::Evening,
            _ => TimeOfDay::Night,
        }
    }

    pub fn now() -> Self {
        use chrono::Timelike;
        Self::from_hour(chrono::Local::now().hour())
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TimeOfDay::Morning => "morning",
            TimeOfDay::Afternoon => "afternoon",
            TimeOfDay::Evening => "evening",
            TimeOfDay::Night => "night",
        }
    }
}

// ============================================
// Execution results
// ============================================

/// Outcome of a single step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    /// 1-based position in the plan
    pub step: usize,
    pub action: ActionKind,
    pub params: SkillParams,
    pub success: bool,
    /// Handler output on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    /// Last error on failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub attempts: u32,
}

/// What the caller gets back for one command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub success: bool,
    pub message: String,
    #[serde(default)]
    pub steps: Vec<StepResult>,
}

impl TaskResult {
    pub fn failure(message: impl Into<String>, steps: Vec<StepResult>) -> Self {
        Self {
            success: false,
            message: message.into(),
            steps,
        }
    }

    /// Steps that ran to success, in order.
    pub fn completed_steps(&self) -> Vec<&StepResult> {
        self.steps.iter().filter(|s| s.success).collect()
    }
}

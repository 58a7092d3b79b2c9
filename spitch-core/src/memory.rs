//! Memory bank: durable record of command outcomes and learned facts.
//!
//! Successful and failed commands live in two separate bounded lists (oldest
//! evicted first). Aggregates are `command_patterns` (intent → success count),
//! `app_usage` (monotonic counters), `preferences`, `file_locations` and a
//! bounded feedback history.
//!
//! A bank opened with [`MemoryBank::open`] is write-through: every mutation
//! rewrites the file and reports a failed save to the caller.

use crate::config::MemoryConfig;
use crate::error::Result;
use crate::store;
use crate::types::TimeOfDay;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::path::{Path, PathBuf};

/// Apps suggested in the morning need more uses than this.
const MORNING_SUGGESTION_MIN_USES: u64 = 5;

/// One executed command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandRecord {
    pub timestamp: DateTime<Local>,
    pub command: String,
    pub intent: Option<String>,
    pub success: bool,
}

/// User rating of a command's outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    pub timestamp: DateTime<Local>,
    pub command: String,
    pub feedback: String,
    /// 1 - 5
    pub rating: u8,
}

/// Persisted document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryData {
    #[serde(default, alias = "user_preferences")]
    pub preferences: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub command_patterns: BTreeMap<String, u64>,
    #[serde(default)]
    pub successful_commands: VecDeque<CommandRecord>,
    #[serde(default)]
    pub failed_commands: VecDeque<CommandRecord>,
    #[serde(default)]
    pub app_usage: BTreeMap<String, u64>,
    #[serde(default)]
    pub file_locations: BTreeMap<String, String>,
    #[serde(default)]
    pub feedback_history: VecDeque<Feedback>,
}

/// Counts for status output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemorySummary {
    pub total_successful_commands: usize,
    pub total_failed_commands: usize,
    pub most_used_apps: Vec<(String, u64)>,
    pub learned_preferences: usize,
    pub known_file_locations: usize,
    pub feedback_count: usize,
}

#[derive(Debug, Clone)]
pub struct MemoryBank {
    data: MemoryData,
    path: Option<PathBuf>,
    max_records: usize,
    max_feedback: usize,
}

fn push_bounded<T>(list: &mut VecDeque<T>, item: T, cap: usize) {
    list.push_back(item);
    while list.len() > cap {
        list.pop_front();
    }
}

impl MemoryBank {
    /// In-memory bank; nothing is written to disk.
    pub fn new(config: &MemoryConfig) -> Self {
        Self {
            data: MemoryData::default(),
            path: None,
            max_records: config.max_records.max(1),
            max_feedback: config.max_feedback.max(1),
        }
    }

    /// Load the bank at `path` (empty if absent) and write through to it.
    pub fn open(path: &Path, config: &MemoryConfig) -> Result<Self> {
        let mut bank = Self::new(config);
        if let Some(data) = store::load_json::<MemoryData>(path)? {
            bank.data = data;
            bank.enforce_caps();
        }
        bank.path = Some(path.to_path_buf());
        tracing::debug!(
            path = %path.display(),
            successful = bank.data.successful_commands.len(),
            failed = bank.data.failed_commands.len(),
            "Opened memory bank"
        );
        Ok(bank)
    }

    pub fn data(&self) -> &MemoryData {
        &self.data
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Rewrite the backing file, if any.
    pub fn save(&self) -> Result<()> {
        match &self.path {
            Some(path) => store::save_json(path, &self.data),
            None => Ok(()),
        }
    }

    fn enforce_caps(&mut self) {
        while self.data.successful_commands.len() > self.max_records {
            self.data.successful_commands.pop_front();
        }
        while self.data.failed_commands.len() > self.max_records {
            self.data.failed_commands.pop_front();
        }
        while self.data.feedback_history.len() > self.max_feedback {
            self.data.feedback_history.pop_front();
        }
    }

    /// Record a command outcome.
    ///
    /// Successes also bump `command_patterns[intent]`; a present `app` bumps
    /// `app_usage[app]` by one.
    pub fn record_command(
        &mut self,
        command: &str,
        intent: Option<&str>,
        success: bool,
        app: Option<&str>,
    ) -> Result<()> {
        let record = CommandRecord {
            timestamp: Local::now(),
            command: command.to_string(),
            intent: intent.map(str::to_string),
            success,
        };

        if success {
            push_bounded(&mut self.data.successful_commands, record, self.max_records);
            if let Some(intent) = intent {
                *self
                    .data
                    .command_patterns
                    .entry(intent.to_string())
                    .or_insert(0) += 1;
            }
        } else {
            push_bounded(&mut self.data.failed_commands, record, self.max_records);
        }

        if let Some(app) = app.map(str::trim).filter(|a| !a.is_empty()) {
            *self.data.app_usage.entry(app.to_lowercase()).or_insert(0) += 1;
        }

        self.save()
    }

    pub fn learn_preference(&mut self, key: &str, value: impl Into<serde_json::Value>) -> Result<()> {
        self.data.preferences.insert(key.to_string(), value.into());
        self.save()
    }

    pub fn preference(&self, key: &str) -> Option<&serde_json::Value> {
        self.data.preferences.get(key)
    }

    /// Top `n` apps by usage, ties broken by name.
    pub fn most_used_apps(&self, n: usize) -> Vec<(String, u64)> {
        let mut apps: Vec<(String, u64)> = self
            .data
            .app_usage
            .iter()
            .map(|(app, count)| (app.clone(), *count))
            .collect();
        apps.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        apps.truncate(n);
        apps
    }

    pub fn app_usage(&self, app: &str) -> u64 {
        self.data
            .app_usage
            .get(&app.to_lowercase())
            .copied()
            .unwrap_or(0)
    }

    /// Share of recorded commands with this intent that succeeded (0.0 when none).
    pub fn command_success_rate(&self, intent: &str) -> f64 {
        let matches = |r: &&CommandRecord| r.intent.as_deref() == Some(intent);
        let successful = self.data.successful_commands.iter().filter(matches).count();
        let failed = self.data.failed_commands.iter().filter(matches).count();
        let total = successful + failed;
        if total == 0 {
            0.0
        } else {
            successful as f64 / total as f64
        }
    }

    pub fn remember_file_location(&mut self, name: &str, path: &str) -> Result<()> {
        self.data
            .file_locations
            .insert(name.to_string(), path.to_string());
        self.save()
    }

    pub fn file_location(&self, name: &str) -> Option<&str> {
        self.data.file_locations.get(name).map(String::as_str)
    }

    /// Store a rating (clamped to 1-5) for a command.
    pub fn add_feedback(&mut self, command: &str, feedback: &str, rating: u8) -> Result<()> {
        let entry = Feedback {
            timestamp: Local::now(),
            command: command.to_string(),
            feedback: feedback.to_string(),
            rating: rating.clamp(1, 5),
        };
        push_bounded(&mut self.data.feedback_history, entry, self.max_feedback);
        self.save()
    }

    /// Suggestions from usage alone: frequent apps in the morning.
    pub fn suggestions_for(&self, time_of_day: TimeOfDay) -> Vec<String> {
        if time_of_day != TimeOfDay::Morning {
            return Vec::new();
        }
        self.most_used_apps(3)
            .into_iter()
            .filter(|(_, count)| *count > MORNING_SUGGESTION_MIN_USES)
            .map(|(app, _)| format!("Open {app}?"))
            .collect()
    }

    pub fn summary(&self) -> MemorySummary {
        MemorySummary {
            total_successful_commands: self.data.successful_commands.len(),
            total_failed_commands: self.data.failed_commands.len(),
            most_used_apps: self.most_used_apps(5),
            learned_preferences: self.data.preferences.len(),
            known_file_locations: self.data.file_locations.len(),
            feedback_count: self.data.feedback_history.len(),
        }
    }
}

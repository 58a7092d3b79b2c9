//! Pattern tracker: when the user does what.
//!
//! Records every successful command by hour of day and weekday, counts app
//! launches per hour, and keeps counts of consecutive command pairs so the
//! next command can be guessed. Nothing is ever evicted.

use crate::error::Result;
use crate::store;
use chrono::{DateTime, Local, Timelike};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

/// A command seen at a given moment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandEntry {
    pub command: String,
    pub timestamp: DateTime<Local>,
}

/// Two commands issued back to back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandSequence {
    pub from: String,
    pub to: String,
    pub count: u64,
}

/// Persisted document. Hours are keyed "0".."23", days by English name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatternData {
    #[serde(default)]
    pub time_based: BTreeMap<String, Vec<CommandEntry>>,
    #[serde(default)]
    pub day_of_week: BTreeMap<String, Vec<CommandEntry>>,
    #[serde(default)]
    pub app_by_time: BTreeMap<String, BTreeMap<String, u64>>,
    #[serde(default)]
    pub sequences: Vec<CommandSequence>,
    #[serde(default)]
    pub last_command: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoutineSummary {
    pub total_tracked_hours: usize,
    /// e.g. "9:00"
    pub most_active_hour: Option<String>,
    pub most_active_day: Option<String>,
    pub top_apps: Vec<(String, u64)>,
}

#[derive(Debug, Clone, Default)]
pub struct PatternTracker {
    data: PatternData,
    path: Option<PathBuf>,
}

/// Sort counted items descending, ties by key, and keep `n`.
fn top_n(counts: impl IntoIterator<Item = (String, u64)>, n: usize) -> Vec<(String, u64)> {
    let mut items: Vec<_> = counts.into_iter().collect();
    items.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    items.truncate(n);
    items
}

/// Key with the most entries; ties go to the smallest key.
fn busiest<'a>(map: &'a BTreeMap<String, Vec<CommandEntry>>) -> Option<&'a String> {
    let mut best: Option<(&String, usize)> = None;
    for (key, entries) in map {
        if best.map_or(true, |(_, n)| entries.len() > n) {
            best = Some((key, entries.len()));
        }
    }
    best.map(|(key, _)| key)
}

impl PatternTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load patterns from `path` (empty if absent) and write through to it.
    pub fn open(path: &Path) -> Result<Self> {
        let data = store::load_json::<PatternData>(path)?.unwrap_or_default();
        tracing::debug!(
            path = %path.display(),
            hours = data.time_based.len(),
            sequences = data.sequences.len(),
            "Opened pattern tracker"
        );
        Ok(Self {
            data,
            path: Some(path.to_path_buf()),
        })
    }

    pub fn data(&self) -> &PatternData {
        &self.data
    }

    pub fn save(&self) -> Result<()> {
        match &self.path {
            Some(path) => store::save_json(path, &self.data),
            None => Ok(()),
        }
    }

    pub fn track_command(&mut self, command: &str, app: Option<&str>) -> Result<()> {
        self.track_command_at(command, app, Local::now())
    }

    /// Record `command` as issued at `at`.
    pub fn track_command_at(
        &mut self,
        command: &str,
        app: Option<&str>,
        at: DateTime<Local>,
    ) -> Result<()> {
        let hour = at.hour().to_string();
        let day = at.format("%A").to_string();
        let entry = CommandEntry {
            command: command.to_string(),
            timestamp: at,
        };

        self.data
            .time_based
            .entry(hour.clone())
            .or_default()
            .push(entry.clone());
        self.data.day_of_week.entry(day).or_default().push(entry);

        if let Some(app) = app.map(str::trim).filter(|a| !a.is_empty()) {
            *self
                .data
                .app_by_time
                .entry(hour)
                .or_default()
                .entry(app.to_lowercase())
                .or_insert(0) += 1;
        }

        if let Some(previous) = self.data.last_command.take() {
            match self
                .data
                .sequences
                .iter_mut()
                .find(|s| s.from == previous && s.to == command)
            {
                Some(sequence) => sequence.count += 1,
                None => self.data.sequences.push(CommandSequence {
                    from: previous,
                    to: command.to_string(),
                    count: 1,
                }),
            }
        }
        self.data.last_command = Some(command.to_string());

        self.save()
    }

    /// Up to three most frequent commands issued during `hour`.
    pub fn common_commands_for_hour(&self, hour: u32) -> Vec<String> {
        let Some(entries) = self.data.time_based.get(&hour.to_string()) else {
            return Vec::new();
        };
        let mut counts: HashMap<&str, u64> = HashMap::new();
        for entry in entries {
            *counts.entry(entry.command.as_str()).or_insert(0) += 1;
        }
        top_n(counts.into_iter().map(|(c, n)| (c.to_string(), n)), 3)
            .into_iter()
            .map(|(command, _)| command)
            .collect()
    }

    /// Up to three apps most often opened during `hour`, with counts.
    pub fn preferred_apps_for_hour(&self, hour: u32) -> Vec<(String, u64)> {
        self.data
            .app_by_time
            .get(&hour.to_string())
            .map(|apps| top_n(apps.iter().map(|(a, n)| (a.clone(), *n)), 3))
            .unwrap_or_default()
    }

    /// The command most often issued right after `last`.
    pub fn predict_next(&self, last: &str) -> Option<&str> {
        self.data
            .sequences
            .iter()
            .filter(|s| s.from == last)
            .max_by(|a, b| a.count.cmp(&b.count).then_with(|| b.to.cmp(&a.to)))
            .map(|s| s.to.as_str())
    }

    pub fn routine_summary(&self) -> RoutineSummary {
        let mut all_apps: BTreeMap<&str, u64> = BTreeMap::new();
        for apps in self.data.app_by_time.values() {
            for (app, count) in apps {
                *all_apps.entry(app.as_str()).or_insert(0) += count;
            }
        }

        RoutineSummary {
            total_tracked_hours: self.data.time_based.len(),
            most_active_hour: busiest(&self.data.time_based).map(|h| format!("{h}:00")),
            most_active_day: busiest(&self.data.day_of_week).cloned(),
            top_apps: top_n(all_apps.into_iter().map(|(a, n)| (a.to_string(), n)), 5),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(day: u32, hour: u32) -> DateTime<Local> {
        // 2024-01-01 was a Monday
        Local
            .with_ymd_and_hms(2024, 1, day, hour, 15, 0)
            .single()
            .unwrap()
    }

    #[test]
    fn tracks_by_hour_day_and_app() {
        let mut tracker = PatternTracker::new();
        tracker
            .track_command_at("open slack", Some("Slack"), at(1, 9))
            .unwrap();
        tracker.track_command_at("git pull", None, at(1, 9)).unwrap();

        let data = tracker.data();
        assert_eq!(data.time_based["9"].len(), 2);
        assert_eq!(data.day_of_week["Monday"].len(), 2);
        assert_eq!(data.app_by_time["9"]["slack"], 1);
    }

    #[test]
    fn common_commands_are_top_three() {
        let mut tracker = PatternTracker::new();
        for cmd in ["a", "b", "a", "c", "d", "a", "b", "c"] {
            tracker.track_command_at(cmd, None, at(2, 10)).unwrap();
        }
        assert_eq!(tracker.common_commands_for_hour(10), vec!["a", "b", "c"]);
        assert!(tracker.common_commands_for_hour(3).is_empty());
    }

    #[test]
    fn preferred_apps_for_hour() {
        let mut tracker = PatternTracker::new();
        for app in ["chrome", "slack", "chrome"] {
            tracker.track_command_at("open", Some(app), at(2, 8)).unwrap();
        }
        assert_eq!(
            tracker.preferred_apps_for_hour(8),
            vec![("chrome".to_string(), 2), ("slack".to_string(), 1)]
        );
    }

    #[test]
    fn predicts_most_frequent_follow_up() {
        let mut tracker = PatternTracker::new();
        for cmd in [
            "open slack",
            "check mail",
            "open slack",
            "check mail",
            "open slack",
            "git pull",
        ] {
            tracker.track_command_at(cmd, None, at(3, 9)).unwrap();
        }
        assert_eq!(tracker.predict_next("open slack"), Some("check mail"));
        assert_eq!(tracker.predict_next("git pull"), None);
    }

    #[test]
    fn routine_summary_finds_busiest_slots() {
        let mut tracker = PatternTracker::new();
        tracker.track_command_at("a", Some("chrome"), at(1, 9)).unwrap();
        tracker.track_command_at("b", Some("chrome"), at(2, 14)).unwrap();
        tracker.track_command_at("c", Some("slack"), at(2, 14)).unwrap();

        let summary = tracker.routine_summary();
        assert_eq!(summary.total_tracked_hours, 2);
        assert_eq!(summary.most_active_hour.as_deref(), Some("14:00"));
        assert_eq!(summary.most_active_day.as_deref(), Some("Tuesday"));
        assert_eq!(summary.top_apps[0], ("chrome".to_string(), 2));
    }

    #[test]
    fn empty_summary() {
        let summary = PatternTracker::new().routine_summary();
        assert_eq!(summary.most_active_hour, None);
        assert!(summary.top_apps.is_empty());
    }

    #[test]
    fn open_writes_through_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("patterns.json");

        let mut tracker = PatternTracker::open(&path).unwrap();
        tracker.track_command_at("open notepad", Some("notepad"), at(4, 20)).unwrap();
        tracker.track_command_at("close notepad", None, at(4, 20)).unwrap();

        let reloaded = PatternTracker::open(&path).unwrap();
        assert_eq!(reloaded.data(), tracker.data());
        assert_eq!(reloaded.predict_next("open notepad"), Some("close notepad"));
    }
}

//! Proactive suggestions from usage history. Purely advisory: nothing here
//! executes a command.

use crate::memory::MemoryBank;
use crate::patterns::PatternTracker;
use crate::types::TimeOfDay;
use chrono::{Local, Timelike};

pub const MAX_SUGGESTIONS: usize = 3;

/// Minimum uses before the top app is offered in the morning.
const MORNING_TOP_APP_MIN_USES: u64 = 3;

/// Render a suggestion for display.
pub fn format_suggestion(suggestion: &str) -> String {
    format!("💡 {suggestion}")
}

/// Suggestions for the current local time.
pub fn suggestions(
    memory: &MemoryBank,
    patterns: &PatternTracker,
    last_command: Option<&str>,
) -> Vec<String> {
    suggestions_at(memory, patterns, last_command, Local::now().hour())
}

/// Up to [`MAX_SUGGESTIONS`] suggestions for `hour` (0-23).
pub fn suggestions_at(
    memory: &MemoryBank,
    patterns: &PatternTracker,
    last_command: Option<&str>,
    hour: u32,
) -> Vec<String> {
    let mut out = Vec::new();

    match TimeOfDay::from_hour(hour) {
        TimeOfDay::Morning => {
            if let Some((app, count)) = memory.most_used_apps(1).into_iter().next() {
                if count > MORNING_TOP_APP_MIN_USES {
                    out.push(format!("Good morning! Would you like me to open {app}?"));
                }
            }
        }
        TimeOfDay::Afternoon if hour == 14 => {
            out.push("It's 2 PM. Time for a productivity boost?".to_string());
        }
        TimeOfDay::Evening if hour == 20 => {
            out.push("Evening time. Would you like me to help you wrap up?".to_string());
        }
        _ => {}
    }

    if let Some(next) = last_command.and_then(|last| patterns.predict_next(last)) {
        out.push(format!("You usually run \"{next}\" next. Want me to do that?"));
    }

    if let Some((app, _)) = patterns.preferred_apps_for_hour(hour).into_iter().next() {
        let suggestion = format!("You often use {app} around this time. Open it?");
        if !out.iter().any(|s| s.contains(&format!("open {app}?"))) {
            out.push(suggestion);
        }
    }

    out.truncate(MAX_SUGGESTIONS);
    tracing::debug!(hour, count = out.len(), "Computed suggestions");
    out
}

//! Desktop automation boundary.
//!
//! Skills that touch the user's desktop (launching apps, opening URLs,
//! keyboard input, killing processes) go through [`Desktop`] so the engine can
//! run against a fake in tests and headless environments.

use crate::error::{Error, Result};
use std::process::{Command, Stdio};

/// Operations the built-in desktop skills need from the host.
pub trait Desktop: Send + Sync {
    /// Start an application by its spoken name ("notepad", "calculator").
    fn launch_app(&self, app: &str) -> Result<()>;

    /// Open a URL in the default browser.
    fn open_url(&self, url: &str) -> Result<()>;

    /// Terminate processes whose name matches `name`.
    fn kill_process(&self, name: &str) -> Result<()>;

    /// Type text into the focused window.
    fn type_text(&self, text: &str) -> Result<()>;

    /// Press a key or chord such as `enter` or `ctrl+s`.
    fn press_keys(&self, keys: &str) -> Result<()>;
}

/// [`Desktop`] backed by the platform's command-line tools.
///
/// Linux uses `xdg-open`, `pkill` and `xdotool`; macOS uses `open`, `pkill`
/// and `osascript`; Windows uses `start` and `taskkill`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemDesktop;

impl SystemDesktop {
    pub fn new() -> Self {
        Self
    }

    /// Map a spoken app name to the executable for this platform.
    pub fn executable_for(app: &str) -> String {
        let app = app.trim().to_lowercase();
        let mapped = if cfg!(target_os = "windows") {
            match app.as_str() {
                "calculator" => "calc",
                "notepad" | "editor" => "notepad",
                "browser" | "chrome" => "chrome",
                "paint" => "mspaint",
                "explorer" | "files" => "explorer",
                _ => app.as_str(),
            }
        } else if cfg!(target_os = "macos") {
            match app.as_str() {
                "calculator" => "Calculator",
                "notepad" | "editor" | "textedit" => "TextEdit",
                "browser" | "safari" => "Safari",
                "chrome" => "Google Chrome",
                "files" | "finder" => "Finder",
                "terminal" => "Terminal",
                "spotify" => "Spotify",
                _ => app.as_str(),
            }
        } else {
            match app.as_str() {
                "calculator" => "gnome-calculator",
                "notepad" | "editor" => "gedit",
                "browser" => "xdg-open",
                "chrome" => "google-chrome",
                "files" | "explorer" => "nautilus",
                "terminal" => "x-terminal-emulator",
                _ => app.as_str(),
            }
        };
        mapped.to_string()
    }

    fn spawn(skill: &str, program: &str, args: &[&str]) -> Result<()> {
        Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map(|_| ())
            .map_err(|e| Error::skill(skill, format!("failed to start {program}: {e}")))
    }

    fn run(skill: &str, program: &str, args: &[&str]) -> Result<()> {
        let output = Command::new(program)
            .args(args)
            .output()
            .map_err(|e| Error::skill(skill, format!("failed to run {program}: {e}")))?;
        if output.status.success() {
            Ok(())
        } else {
            Err(Error::skill(
                skill,
                format!(
                    "{program} exited with {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            ))
        }
    }
}

/// AppleScript `keystroke` clause for a chord like `cmd+shift+s`.
fn applescript_chord(keys: &str) -> String {
    let parts: Vec<&str> = keys.split('+').map(str::trim).collect();
    let Some((key, modifiers)) = parts.split_last() else {
        return String::new();
    };
    let modifiers: Vec<&str> = modifiers
        .iter()
        .filter_map(|m| match m.to_lowercase().as_str() {
            "ctrl" | "control" => Some("control down"),
            "cmd" | "command" | "win" | "super" => Some("command down"),
            "alt" | "option" => Some("option down"),
            "shift" => Some("shift down"),
            _ => None,
        })
        .collect();

    let stroke = match key.to_lowercase().as_str() {
        "enter" | "return" => "key code 36".to_string(),
        "tab" => "key code 48".to_string(),
        "escape" | "esc" => "key code 53".to_string(),
        "space" => "key code 49".to_string(),
        other => format!("keystroke \"{}\"", other.replace('"', "\\\"")),
    };

    if modifiers.is_empty() {
        stroke
    } else {
        format!("{} using {{{}}}", stroke, modifiers.join(", "))
    }
}

impl Desktop for SystemDesktop {
    fn launch_app(&self, app: &str) -> Result<()> {
        let exe = Self::executable_for(app);
        tracing::info!(app, executable = %exe, "Launching application");
        if cfg!(target_os = "windows") {
            Self::spawn("open_app", "cmd", &["/C", "start", "", &exe])
        } else if cfg!(target_os = "macos") {
            Self::run("open_app", "open", &["-a", &exe])
        } else {
            Self::spawn("open_app", &exe, &[])
        }
    }

    fn open_url(&self, url: &str) -> Result<()> {
        tracing::info!(url, "Opening URL");
        if cfg!(target_os = "windows") {
            Self::spawn("open_website", "cmd", &["/C", "start", "", url])
        } else if cfg!(target_os = "macos") {
            Self::run("open_website", "open", &[url])
        } else {
            Self::spawn("open_website", "xdg-open", &[url])
        }
    }

    fn kill_process(&self, name: &str) -> Result<()> {
        let exe = Self::executable_for(name);
        tracing::info!(process = name, executable = %exe, "Killing process");
        if cfg!(target_os = "windows") {
            let image = format!("{exe}.exe");
            Self::run("kill_process", "taskkill", &["/IM", &image, "/F"])
        } else {
            Self::run("kill_process", "pkill", &["-i", "-f", &exe])
        }
    }

    fn type_text(&self, text: &str) -> Result<()> {
        if cfg!(target_os = "macos") {
            let script = format!(
                "tell application \"System Events\" to keystroke \"{}\"",
                text.replace('\\', "\\\\").replace('"', "\\\"")
            );
            Self::run("type_text", "osascript", &["-e", &script])
        } else if cfg!(target_os = "windows") {
            Err(Error::skill(
                "type_text",
                "keyboard automation is not available on this platform",
            ))
        } else {
            Self::run("type_text", "xdotool", &["type", "--delay", "50", text])
        }
    }

    fn press_keys(&self, keys: &str) -> Result<()> {
        if cfg!(target_os = "macos") {
            let script = format!(
                "tell application \"System Events\" to {}",
                applescript_chord(keys)
            );
            Self::run("press_key", "osascript", &["-e", &script])
        } else if cfg!(target_os = "windows") {
            Err(Error::skill(
                "press_key",
                "keyboard automation is not available on this platform",
            ))
        } else {
            let chord = keys
                .split('+')
                .map(|k| match k.trim().to_lowercase().as_str() {
                    "enter" => "Return".to_string(),
                    "esc" => "Escape".to_string(),
                    other => other.to_string(),
                })
                .collect::<Vec<_>>()
                .join("+");
            Self::run("press_key", "xdotool", &["key", &chord])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_apps_pass_through() {
        assert_eq!(SystemDesktop::executable_for("Firefox"), "firefox");
    }

    #[test]
    fn calculator_is_mapped() {
        assert_ne!(SystemDesktop::executable_for("calculator"), "calculator");
    }

    #[test]
    fn applescript_chords() {
        assert_eq!(
            applescript_chord("cmd+s"),
            "keystroke \"s\" using {command down}"
        );
        assert_eq!(applescript_chord("enter"), "key code 36");
        assert_eq!(
            applescript_chord("ctrl+shift+enter"),
            "key code 36 using {control down, shift down}"
        );
    }
}

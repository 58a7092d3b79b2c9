//! Built-in skills.
//!
//! Desktop skills delegate to a [`Desktop`]; shell and git skills go through
//! the [`SafetySandbox`]. File skills work on the local filesystem directly.
//! Vendor-backed actions (volume, clipboard, media, browser automation) are
//! left for the embedding application to register.

use super::calc;
use super::desktop::Desktop;
use super::{finite_f64, optional_f64, optional_str, required_str, SkillRegistry};
use crate::error::{Error, Result};
use crate::safety::SafetySandbox;
use crate::types::SkillParams;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

const MAX_WAIT_SECS: f64 = 60.0;
const MAX_READ_CHARS: usize = 4000;
const DEFAULT_LIMIT: usize = 10;

/// Register every built-in skill on `registry`.
pub fn register_builtins(
    registry: &mut SkillRegistry,
    desktop: Arc<dyn Desktop>,
    sandbox: Arc<SafetySandbox>,
) {
    register_desktop_skills(registry, desktop);
    register_file_skills(registry);
    register_shell_skills(registry, sandbox);

    registry.register(
        "calculate",
        "Evaluate an arithmetic expression",
        &[("expression", "math expression, e.g. 12*7")],
        |params| {
            let expression = required_str("calculate", params, "expression")?;
            let value = calc::evaluate(expression)?;
            Ok(format!("{} = {}", expression.trim(), calc::format_number(value)))
        },
    );

    registry.register(
        "wait",
        "Pause before the next step",
        &[("seconds", "how long to wait (max 60)")],
        |params| {
            let seconds = finite_f64("wait", params, "seconds")?
                .unwrap_or(1.0)
                .clamp(0.0, MAX_WAIT_SECS);
            std::thread::sleep(duration_secs("wait", seconds)?);
            Ok(format!("Waited {seconds} seconds"))
        },
    );

    tracing::info!(skills = registry.len(), "Registered built-in skills");
}

// ============================================
// Desktop
// ============================================

fn register_desktop_skills(registry: &mut SkillRegistry, desktop: Arc<dyn Desktop>) {
    let d = Arc::clone(&desktop);
    registry.register(
        "open_app",
        "Launch an application",
        &[("app", "application name, e.g. notepad")],
        move |params| {
            let app = required_str("open_app", params, "app")?;
            d.launch_app(app)?;
            Ok(format!("Opened {app}"))
        },
    );

    let d = Arc::clone(&desktop);
    registry.register(
        "open_website",
        "Open a URL in the browser",
        &[("url", "address to open")],
        move |params| {
            let url = normalize_url(required_str("open_website", params, "url")?);
            d.open_url(&url)?;
            Ok(format!("Opened {url}"))
        },
    );

    let d = Arc::clone(&desktop);
    registry.register(
        "type_text",
        "Type text into the focused window",
        &[("text", "text to type")],
        move |params| {
            let text = required_str("type_text", params, "text")?;
            d.type_text(text)?;
            Ok(format!("Typed {} characters", text.chars().count()))
        },
    );

    let d = Arc::clone(&desktop);
    registry.register(
        "press_key",
        "Press a key or key combination",
        &[("key", "key name or chord, e.g. enter or ctrl+s")],
        move |params| {
            let key = required_str("press_key", params, "key")?;
            d.press_keys(key)?;
            Ok(format!("Pressed {key}"))
        },
    );

    registry.register(
        "kill_process",
        "Close an application",
        &[("process", "application or process name")],
        move |params| {
            let process = required_str("kill_process", params, "process")?;
            desktop.kill_process(process)?;
            Ok(format!("Closed {process}"))
        },
    );
}

/// Prefix bare hosts with `https://`.
pub fn normalize_url(url: &str) -> String {
    let url = url.trim();
    if url.contains("://") {
        url.to_string()
    } else {
        format!("https://{url}")
    }
}

// ============================================
// Files
// ============================================

/// Expand a leading `~` to the home directory.
fn expand_path(path: &str) -> PathBuf {
    let path = path.trim();
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

fn io_err(skill: &str, path: &Path, e: std::io::Error) -> Error {
    Error::skill(skill, format!("{}: {e}", path.display()))
}

fn register_file_skills(registry: &mut SkillRegistry) {
    registry.register(
        "write_file",
        "Create or overwrite a text file",
        &[("file_path", "path of the file"), ("content", "text to write")],
        |params| {
            let path = expand_path(required_str("write_file", params, "file_path")?);
            let content = optional_str(params, "content").unwrap_or_default();
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent).map_err(|e| io_err("write_file", parent, e))?;
            }
            fs::write(&path, content).map_err(|e| io_err("write_file", &path, e))?;
            Ok(format!("Wrote {}", path.display()))
        },
    );

    registry.register(
        "read_file",
        "Read a text file",
        &[("file_path", "path of the file")],
        |params| {
            let path = expand_path(required_str("read_file", params, "file_path")?);
            let content = fs::read_to_string(&path).map_err(|e| io_err("read_file", &path, e))?;
            Ok(content.chars().take(MAX_READ_CHARS).collect())
        },
    );

    registry.register(
        "delete_file",
        "Delete a file",
        &[("file_path", "path of the file")],
        |params| {
            let path = expand_path(required_str("delete_file", params, "file_path")?);
            if !path.is_file() {
                return Err(Error::skill(
                    "delete_file",
                    format!("file not found: {}", path.display()),
                ));
            }
            fs::remove_file(&path).map_err(|e| io_err("delete_file", &path, e))?;
            Ok(format!("Deleted {}", path.display()))
        },
    );

    registry.register(
        "rename_file",
        "Rename or move a file",
        &[("old_path", "current path"), ("new_path", "new path")],
        |params| {
            let from = expand_path(required_str("rename_file", params, "old_path")?);
            let to = expand_path(required_str("rename_file", params, "new_path")?);
            if !from.exists() {
                return Err(Error::skill(
                    "rename_file",
                    format!("file not found: {}", from.display()),
                ));
            }
            fs::rename(&from, &to).map_err(|e| io_err("rename_file", &from, e))?;
            Ok(format!("Renamed {} to {}", from.display(), to.display()))
        },
    );

    registry.register(
        "search_files",
        "Find files whose name contains a query",
        &[
            ("query", "part of the file name"),
            ("directory", "where to search (default: current directory)"),
            ("limit", "maximum results (default 10)"),
        ],
        |params| {
            let query = required_str("search_files", params, "query")?;
            let dir = expand_path(optional_str(params, "directory").unwrap_or("."));
            let limit = limit_param(params);
            let found = search_files(&dir, query, limit)?;
            Ok(render_paths(&found, &format!("No files matching '{query}'")))
        },
    );

    registry.register(
        "find_recent_files",
        "List recently modified files",
        &[
            ("days", "look back this many days (default 7)"),
            ("directory", "where to look (default: current directory)"),
            ("limit", "maximum results (default 10)"),
        ],
        |params| {
            let days = finite_f64("find_recent_files", params, "days")?
                .unwrap_or(7.0)
                .max(0.0);
            let window = duration_secs("find_recent_files", days * 86_400.0)?;
            let dir = expand_path(optional_str(params, "directory").unwrap_or("."));
            let found = recent_files(&dir, window, limit_param(params))?;
            Ok(render_paths(&found, "No recent files"))
        },
    );

    registry.register(
        "find_duplicates",
        "Find files with identical contents",
        &[("directory", "where to look (default: current directory)")],
        |params| {
            let dir = expand_path(optional_str(params, "directory").unwrap_or("."));
            let groups = duplicate_files(&dir)?;
            if groups.is_empty() {
                return Ok("No duplicate files found".to_string());
            }
            let mut out = format!("Found {} group(s) of duplicates:", groups.len());
            for group in &groups {
                let names: Vec<String> = group.iter().map(|p| p.display().to_string()).collect();
                out.push_str(&format!("\n- {}", names.join(", ")));
            }
            Ok(out)
        },
    );

    registry.register(
        "organize_files",
        "Sort the files of a directory into folders by type",
        &[("directory", "directory to organize (default: ~/Downloads)")],
        |params| {
            let dir = match optional_str(params, "directory") {
                Some(d) => expand_path(d),
                None => dirs::download_dir()
                    .ok_or_else(|| Error::skill("organize_files", "no downloads directory"))?,
            };
            let moved = organize_directory(&dir)?;
            Ok(format!("Organized {moved} file(s) in {}", dir.display()))
        },
    );
}

fn duration_secs(skill: &str, seconds: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(seconds)
        .map_err(|e| Error::invalid_params(skill, format!("{seconds} seconds: {e}")))
}

fn limit_param(params: &SkillParams) -> usize {
    optional_f64(params, "limit")
        .map(|n| n.max(1.0) as usize)
        .unwrap_or(DEFAULT_LIMIT)
}

fn render_paths(paths: &[PathBuf], empty: &str) -> String {
    if paths.is_empty() {
        return empty.to_string();
    }
    let mut out = format!("Found {} file(s):", paths.len());
    for path in paths {
        out.push_str(&format!("\n- {}", path.display()));
    }
    out
}

/// All regular files under `dir`, recursively.
fn walk_files(skill: &str, dir: &Path) -> Result<Vec<PathBuf>> {
    let pattern = dir.join("**").join("*");
    let pattern = pattern.to_string_lossy();
    let entries = glob::glob(&pattern)
        .map_err(|e| Error::invalid_params(skill, format!("bad directory pattern: {e}")))?;
    Ok(entries.filter_map(|e| e.ok()).filter(|p| p.is_file()).collect())
}

fn search_files(dir: &Path, query: &str, limit: usize) -> Result<Vec<PathBuf>> {
    let escaped = glob::Pattern::escape(query.trim());
    let pattern = dir.join("**").join(format!("*{escaped}*"));
    let options = glob::MatchOptions {
        case_sensitive: false,
        ..Default::default()
    };
    let entries = glob::glob_with(&pattern.to_string_lossy(), options)
        .map_err(|e| Error::invalid_params("search_files", format!("bad query: {e}")))?;
    Ok(entries
        .filter_map(|e| e.ok())
        .filter(|p| p.is_file())
        .take(limit)
        .collect())
}

fn recent_files(dir: &Path, window: Duration, limit: usize) -> Result<Vec<PathBuf>> {
    let cutoff = SystemTime::now()
        .checked_sub(window)
        .unwrap_or(SystemTime::UNIX_EPOCH);
    let mut recent: Vec<(SystemTime, PathBuf)> = walk_files("find_recent_files", dir)?
        .into_iter()
        .filter_map(|p| {
            let modified = fs::metadata(&p).and_then(|m| m.modified()).ok()?;
            (modified >= cutoff).then_some((modified, p))
        })
        .collect();
    recent.sort_by(|a, b| b.0.cmp(&a.0));
    Ok(recent.into_iter().take(limit).map(|(_, p)| p).collect())
}

/// Groups of files with byte-identical contents. Sizes are compared first.
fn duplicate_files(dir: &Path) -> Result<Vec<Vec<PathBuf>>> {
    let mut by_size: HashMap<u64, Vec<PathBuf>> = HashMap::new();
    for path in walk_files("find_duplicates", dir)? {
        if let Ok(meta) = fs::metadata(&path) {
            if meta.len() > 0 {
                by_size.entry(meta.len()).or_default().push(path);
            }
        }
    }

    let mut groups = Vec::new();
    for candidates in by_size.into_values().filter(|v| v.len() > 1) {
        let mut by_content: HashMap<Vec<u8>, Vec<PathBuf>> = HashMap::new();
        for path in candidates {
            if let Ok(bytes) = fs::read(&path) {
                by_content.entry(bytes).or_default().push(path);
            }
        }
        groups.extend(by_content.into_values().filter(|v| v.len() > 1));
    }
    for group in &mut groups {
        group.sort();
    }
    groups.sort();
    Ok(groups)
}

fn category_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" | "png" | "gif" | "bmp" | "svg" | "webp" => "Images",
        "pdf" | "doc" | "docx" | "txt" | "md" | "odt" | "xls" | "xlsx" | "ppt" | "pptx"
        | "csv" => "Documents",
        "mp3" | "wav" | "flac" | "ogg" | "m4a" => "Audio",
        "mp4" | "mkv" | "avi" | "mov" | "webm" => "Videos",
        "zip" | "tar" | "gz" | "rar" | "7z" => "Archives",
        "rs" | "py" | "js" | "ts" | "java" | "c" | "cpp" | "go" | "html" | "css" | "json" => {
            "Code"
        }
        _ => "Other",
    }
}

/// Move the top-level files of `dir` into category folders. Returns the count moved.
fn organize_directory(dir: &Path) -> Result<usize> {
    let entries = fs::read_dir(dir).map_err(|e| io_err("organize_files", dir, e))?;
    let mut moved = 0;
    for entry in entries {
        let path = entry.map_err(|e| io_err("organize_files", dir, e))?.path();
        let hidden = path
            .file_name()
            .map(|n| n.to_string_lossy().starts_with('.'))
            .unwrap_or(true);
        if !path.is_file() || hidden {
            continue;
        }
        let Some(name) = path.file_name() else {
            continue;
        };
        let target_dir = dir.join(category_for(&path));
        fs::create_dir_all(&target_dir).map_err(|e| io_err("organize_files", &target_dir, e))?;
        let target = target_dir.join(name);
        if target.exists() {
            tracing::debug!(path = %path.display(), "Skipping file, target exists");
            continue;
        }
        fs::rename(&path, &target).map_err(|e| io_err("organize_files", &path, e))?;
        moved += 1;
    }
    Ok(moved)
}

// ============================================
// Shell and git
// ============================================

fn register_shell_skills(registry: &mut SkillRegistry, sandbox: Arc<SafetySandbox>) {
    let s = Arc::clone(&sandbox);
    registry.register(
        "run_shell_command",
        "Run a shell command (dangerous commands are refused)",
        &[("command", "command line to run"), ("cwd", "working directory")],
        move |params| {
            let command = required_str("run_shell_command", params, "command")?;
            let cwd = optional_str(params, "cwd").map(expand_path);
            s.run_shell("run_shell_command", command, cwd.as_deref())
        },
    );

    let git_skills: [(&'static str, &'static str, &'static [&'static str]); 3] = [
        ("git_status", "Show the working tree status", &["status", "--short", "--branch"]),
        ("git_push", "Push the current branch", &["push"]),
        ("git_pull", "Pull the current branch", &["pull", "--ff-only"]),
    ];
    for (name, description, args) in git_skills {
        let s = Arc::clone(&sandbox);
        registry.register(
            name,
            description,
            &[("repo", "repository path (default: current directory)")],
            move |params| {
                let repo = expand_path(optional_str(params, "repo").unwrap_or("."));
                let output = s.run_program(name, "git", args, Some(&repo))?;
                Ok(if output.is_empty() {
                    format!("{name}: done")
                } else {
                    output
                })
            },
        );
    }

    registry.register(
        "git_commit",
        "Stage all changes and commit",
        &[
            ("message", "commit message"),
            ("repo", "repository path (default: current directory)"),
        ],
        move |params| {
            let message = optional_str(params, "message").unwrap_or("Update");
            let repo = expand_path(optional_str(params, "repo").unwrap_or("."));
            sandbox.run_program("git_commit", "git", &["add", "-A"], Some(&repo))?;
            sandbox.run_program("git_commit", "git", &["commit", "-m", message], Some(&repo))
        },
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingDesktop {
        calls: Mutex<Vec<String>>,
    }

    impl Desktop for RecordingDesktop {
        fn launch_app(&self, app: &str) -> Result<()> {
            self.calls.lock().unwrap().push(format!("launch {app}"));
            Ok(())
        }
        fn open_url(&self, url: &str) -> Result<()> {
            self.calls.lock().unwrap().push(format!("url {url}"));
            Ok(())
        }
        fn kill_process(&self, name: &str) -> Result<()> {
            self.calls.lock().unwrap().push(format!("kill {name}"));
            Ok(())
        }
        fn type_text(&self, text: &str) -> Result<()> {
            self.calls.lock().unwrap().push(format!("type {text}"));
            Ok(())
        }
        fn press_keys(&self, keys: &str) -> Result<()> {
            self.calls.lock().unwrap().push(format!("keys {keys}"));
            Ok(())
        }
    }

    fn registry() -> (SkillRegistry, Arc<RecordingDesktop>) {
        let desktop = Arc::new(RecordingDesktop::default());
        let sandbox = Arc::new(SafetySandbox::new().unwrap());
        let registry = SkillRegistry::with_builtins(desktop.clone(), sandbox);
        (registry, desktop)
    }

    fn params(value: serde_json::Value) -> SkillParams {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn registers_core_skills() {
        let (registry, _) = registry();
        for name in [
            "open_app",
            "open_website",
            "type_text",
            "press_key",
            "kill_process",
            "calculate",
            "wait",
            "write_file",
            "read_file",
            "delete_file",
            "rename_file",
            "search_files",
            "find_recent_files",
            "find_duplicates",
            "organize_files",
            "run_shell_command",
            "git_status",
            "git_commit",
            "git_push",
            "git_pull",
        ] {
            assert!(registry.contains(name), "missing builtin {name}");
        }
    }

    #[test]
    fn desktop_skills_delegate() {
        let (registry, desktop) = registry();
        registry
            .execute("open_app", &params(serde_json::json!({"app": "notepad"})))
            .unwrap();
        registry
            .execute("open_website", &params(serde_json::json!({"url": "github.com"})))
            .unwrap();
        registry
            .execute("press_key", &params(serde_json::json!({"key": "ctrl+s"})))
            .unwrap();

        let calls = desktop.calls.lock().unwrap();
        assert_eq!(
            *calls,
            vec![
                "launch notepad".to_string(),
                "url https://github.com".to_string(),
                "keys ctrl+s".to_string(),
            ]
        );
    }

    #[test]
    fn missing_params_are_rejected() {
        let (registry, _) = registry();
        let err = registry.execute("open_app", &SkillParams::new()).unwrap_err();
        assert!(matches!(err, Error::InvalidParams { .. }));
    }

    #[test]
    fn wait_refuses_non_finite_seconds() {
        let (registry, _) = registry();
        for seconds in [serde_json::json!("NaN"), serde_json::json!("inf"), serde_json::json!("later")] {
            let err = registry
                .execute("wait", &params(serde_json::json!({ "seconds": seconds })))
                .unwrap_err();
            assert!(matches!(err, Error::InvalidParams { .. }), "{err}");
        }

        let out = registry
            .execute("wait", &params(serde_json::json!({"seconds": 0})))
            .unwrap();
        assert_eq!(out, "Waited 0 seconds");
    }

    #[test]
    fn recent_files_window_out_of_range() {
        let (registry, _) = registry();
        let dir = tempfile::tempdir().unwrap();
        let directory = dir.path().to_string_lossy().to_string();

        for days in [serde_json::json!(1e20), serde_json::json!("inf")] {
            let err = registry
                .execute(
                    "find_recent_files",
                    &params(serde_json::json!({"days": days, "directory": directory})),
                )
                .unwrap_err();
            assert!(matches!(err, Error::InvalidParams { .. }), "{err}");
        }

        let out = registry
            .execute(
                "find_recent_files",
                &params(serde_json::json!({"days": 1, "directory": directory})),
            )
            .unwrap();
        assert_eq!(out, "No recent files");
    }

    #[test]
    fn calculate_formats_result() {
        let (registry, _) = registry();
        let out = registry
            .execute("calculate", &params(serde_json::json!({"expression": "12*7"})))
            .unwrap();
        assert_eq!(out, "12*7 = 84");
    }

    #[test]
    fn file_lifecycle() {
        let (registry, _) = registry();
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("notes/today.txt");
        let renamed = dir.path().join("notes/renamed.txt");

        registry
            .execute(
                "write_file",
                &params(serde_json::json!({"file_path": file.to_str(), "content": "hello"})),
            )
            .unwrap();
        let read = registry
            .execute("read_file", &params(serde_json::json!({"file_path": file.to_str()})))
            .unwrap();
        assert_eq!(read, "hello");

        registry
            .execute(
                "rename_file",
                &params(serde_json::json!({"old_path": file.to_str(), "new_path": renamed.to_str()})),
            )
            .unwrap();
        assert!(renamed.exists());

        registry
            .execute("delete_file", &params(serde_json::json!({"file_path": renamed.to_str()})))
            .unwrap();
        assert!(!renamed.exists());

        assert!(registry
            .execute("delete_file", &params(serde_json::json!({"file_path": renamed.to_str()})))
            .is_err());
    }

    #[test]
    fn search_and_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("Report-2024.txt"), "same").unwrap();
        fs::write(dir.path().join("sub/copy.txt"), "same").unwrap();
        fs::write(dir.path().join("other.txt"), "different").unwrap();

        let found = search_files(dir.path(), "report", 10).unwrap();
        assert_eq!(found.len(), 1);

        let groups = duplicate_files(dir.path()).unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].len(), 2);

        let recent = recent_files(dir.path(), Duration::from_secs(3600), 2).unwrap();
        assert_eq!(recent.len(), 2);
    }

    #[test]
    fn organize_moves_by_category() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("photo.png"), "x").unwrap();
        fs::write(dir.path().join("paper.pdf"), "x").unwrap();
        fs::write(dir.path().join(".hidden"), "x").unwrap();

        let moved = organize_directory(dir.path()).unwrap();
        assert_eq!(moved, 2);
        assert!(dir.path().join("Images/photo.png").exists());
        assert!(dir.path().join("Documents/paper.pdf").exists());
        assert!(dir.path().join(".hidden").exists());
    }

    #[test]
    fn shell_skill_respects_sandbox() {
        let (registry, _) = registry();
        let err = registry
            .execute("run_shell_command", &params(serde_json::json!({"command": "rm -rf /"})))
            .unwrap_err();
        assert!(matches!(err, Error::Blocked(_)));
    }

    #[test]
    fn url_normalization() {
        assert_eq!(normalize_url("github.com"), "https://github.com");
        assert_eq!(normalize_url("http://x.org"), "http://x.org");
    }
}

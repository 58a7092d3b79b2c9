//! Integration tests for the command engine.
//!
//! These drive `TaskExecutor` end to end with the built-in skills, a
//! recording desktop and stores backed by temp files.

use spitch_core::config::{AssistantConfig, ExecutorConfig, MemoryConfig, ResolverConfig};
use spitch_core::executor::{Sleeper, NOT_UNDERSTOOD};
use spitch_core::llm::ModelClient;
use spitch_core::safety::SafetySandbox;
use spitch_core::skills::Desktop;
use spitch_core::{
    ActionKind, Error, IntentResolver, MemoryBank, PatternTracker, PlanSource, Resolution,
    Result, SessionContext, SkillRegistry, Stores, TaskExecutor,
};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

// ============================================
// Test fixtures
// ============================================

/// Desktop that records what it was asked to do.
#[derive(Default)]
struct RecordingDesktop {
    calls: Mutex<Vec<String>>,
}

impl RecordingDesktop {
    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn push(&self, call: String) -> Result<()> {
        self.calls.lock().unwrap().push(call);
        Ok(())
    }
}

impl Desktop for RecordingDesktop {
    fn launch_app(&self, app: &str) -> Result<()> {
        self.push(format!("launch {app}"))
    }

    fn open_url(&self, url: &str) -> Result<()> {
        self.push(format!("url {url}"))
    }

    fn kill_process(&self, name: &str) -> Result<()> {
        self.push(format!("kill {name}"))
    }

    fn type_text(&self, text: &str) -> Result<()> {
        self.push(format!("type {text}"))
    }

    fn press_keys(&self, keys: &str) -> Result<()> {
        self.push(format!("keys {keys}"))
    }
}

/// Model backend returning a canned reply and counting calls.
struct CannedModel {
    reply: Option<String>,
    calls: Arc<AtomicUsize>,
}

impl ModelClient for CannedModel {
    fn complete(&self, _prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.reply
            .clone()
            .ok_or_else(|| Error::Model("connection refused".to_string()))
    }
}

struct Harness {
    executor: TaskExecutor,
    desktop: Arc<RecordingDesktop>,
    model_calls: Arc<AtomicUsize>,
}

fn no_sleep() -> Sleeper {
    Arc::new(|_: Duration| {})
}

/// Executor over the built-in skills. `model_reply` adds a model tier;
/// `Some(None)` is a backend that always fails.
fn harness(model_reply: Option<Option<&str>>) -> Harness {
    spitch_core::logging::init_test();

    let desktop = Arc::new(RecordingDesktop::default());
    let sandbox = Arc::new(SafetySandbox::new().unwrap());
    let registry = SkillRegistry::with_builtins(desktop.clone(), sandbox);

    let model_calls = Arc::new(AtomicUsize::new(0));
    let client = model_reply.map(|reply| {
        Box::new(CannedModel {
            reply: reply.map(str::to_string),
            calls: Arc::clone(&model_calls),
        }) as Box<dyn ModelClient>
    });
    let resolver =
        IntentResolver::standard(&ResolverConfig::default(), &AssistantConfig::default(), client)
            .unwrap();

    let executor =
        TaskExecutor::new(registry, resolver, &ExecutorConfig::default()).with_sleeper(no_sleep());
    Harness {
        executor,
        desktop,
        model_calls,
    }
}

fn stores_in(dir: &Path) -> Stores {
    Stores {
        session: SessionContext::new(20),
        memory: MemoryBank::open(&dir.join("memory.json"), &MemoryConfig::default()).unwrap(),
        patterns: PatternTracker::open(&dir.join("patterns.json")).unwrap(),
    }
}

// ============================================
// End-to-end commands
// ============================================

#[test]
fn test_open_and_calculate_runs_both_steps_and_records() {
    let dir = TempDir::new().unwrap();
    let h = harness(None);
    let mut stores = stores_in(dir.path());

    let spoken = Mutex::new(Vec::new());
    let speak = |m: &str| spoken.lock().unwrap().push(m.to_string());
    let result = h
        .executor
        .execute_task("open calculator and calculate 12*7", &mut stores, Some(&speak));

    assert!(result.success, "{}", result.message);
    assert_eq!(result.message, "Calculation complete.");
    assert_eq!(result.steps.len(), 2);
    assert_eq!(result.steps[1].action, ActionKind::Calculate);
    assert!(result.steps[1].output.as_deref().unwrap().contains("84"));
    assert_eq!(h.desktop.calls(), vec!["launch calculator"]);
    assert_eq!(spoken.lock().unwrap().as_slice(), ["Calculation complete."]);

    assert_eq!(stores.memory.app_usage("calculator"), 1);
    assert_eq!(stores.session.context_value("last_app"), Some("calculator"));
    assert_eq!(stores.session.len(), 1);
}

#[test]
fn test_pronoun_refers_to_last_app() {
    let h = harness(None);
    let dir = TempDir::new().unwrap();
    let mut stores = stores_in(dir.path());

    assert!(h.executor.execute_task("open notepad", &mut stores, None).success);
    let result = h.executor.execute_task("close it", &mut stores, None);

    assert!(result.success, "{}", result.message);
    assert_eq!(result.steps[0].action, ActionKind::KillProcess);
    assert_eq!(result.steps[0].params["process"], "notepad");
    assert_eq!(h.desktop.calls(), vec!["launch notepad", "kill notepad"]);
}

#[test]
fn test_unrecognised_command_changes_nothing() {
    let h = harness(None);
    let dir = TempDir::new().unwrap();
    let mut stores = stores_in(dir.path());

    let result = h.executor.execute_task("tell me a joke", &mut stores, None);

    assert!(!result.success);
    assert_eq!(result.message, NOT_UNDERSTOOD);
    assert!(result.steps.is_empty());
    assert!(stores.session.is_empty());
    assert!(stores.memory.data().successful_commands.is_empty());
    assert!(!dir.path().join("memory.json").exists());
}

#[test]
fn test_model_written_file_lands_on_disk() {
    let dir = TempDir::new().unwrap();
    let target = dir.path().join("Notes").join("Todo.txt");
    let reply = serde_json::json!({
        "intent": "create_file",
        "actions": [{
            "type": "write_file",
            "params": {"file_path": target.to_string_lossy(), "content": "buy milk"}
        }],
        "confidence": 0.9
    })
    .to_string();
    let h = harness(Some(Some(reply.as_str())));
    let mut stores = stores_in(dir.path());

    let result = h
        .executor
        .execute_task("jot down my todo list", &mut stores, None);

    assert!(result.success, "{}", result.message);
    assert_eq!(std::fs::read_to_string(&target).unwrap(), "buy milk");
    assert_eq!(
        stores.session.context_value("last_file"),
        Some(target.to_string_lossy().as_ref())
    );
}

// ============================================
// Resolver tiers
// ============================================

#[test]
fn test_pattern_tier_skips_the_model() {
    let h = harness(Some(Some(r#"{"intent":"x","actions":[],"confidence":1.0}"#)));
    let dir = TempDir::new().unwrap();
    let mut stores = stores_in(dir.path());

    let result = h.executor.execute_task("calculate 2+2", &mut stores, None);

    assert!(result.success);
    assert_eq!(h.model_calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_model_tier_handles_what_patterns_miss() {
    let reply = r#"Sure! {"intent":"compose","entities":{"topic":"rust"},"actions":[{"type":"type_text","params":{"text":"ferris"}}],"confidence":0.9}"#;
    let h = harness(Some(Some(reply)));
    let dir = TempDir::new().unwrap();
    let mut stores = stores_in(dir.path());

    let dry = h
        .executor
        .dry_run("compose a haiku about rust", &stores.session);
    let plan = dry.resolution.plan().unwrap();
    assert_eq!(plan.source, PlanSource::Model);
    assert_eq!(plan.entity("topic"), Some("rust"));

    let result = h
        .executor
        .execute_task("compose a haiku about rust", &mut stores, None);
    assert!(result.success, "{}", result.message);
    assert_eq!(h.desktop.calls(), vec!["type ferris"]);
    assert_eq!(h.model_calls.load(Ordering::SeqCst), 2);
}

#[test]
fn test_low_confidence_model_plan_is_rejected() {
    let reply = r#"{"intent":"open_app","actions":[{"type":"open_app","params":{"app":"chrome"}}],"confidence":0.4}"#;
    let h = harness(Some(Some(reply)));
    let dir = TempDir::new().unwrap();
    let mut stores = stores_in(dir.path());

    let result = h.executor.execute_task("fire up the web thing", &mut stores, None);

    assert!(!result.success);
    assert_eq!(result.message, NOT_UNDERSTOOD);
    assert!(h.desktop.calls().is_empty());
}

#[test]
fn test_model_outage_falls_through_to_keywords() {
    let h = harness(Some(None));
    let session = SessionContext::new(20);

    let dry = h.executor.dry_run("launch chatgpt", &session);

    assert_eq!(h.model_calls.load(Ordering::SeqCst), 1);
    match dry.resolution {
        Resolution::Rejected(plan) => {
            assert_eq!(plan.source, PlanSource::Keyword);
            assert_eq!(plan.steps[0].param_str("url"), Some("https://chat.openai.com"));
        }
        other => panic!("expected a rejected keyword plan, got {other:?}"),
    }
}

// ============================================
// Persistence
// ============================================

#[test]
fn test_stores_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let session_path = dir.path().join("session.json");
    let h = harness(None);

    {
        let mut stores = stores_in(dir.path());
        assert!(h.executor.execute_task("open notepad", &mut stores, None).success);
        assert!(h.executor.execute_task("calculate 6*7", &mut stores, None).success);
        stores.session.save(&session_path).unwrap();
    }

    let stores = Stores {
        session: SessionContext::load(&session_path, 20).unwrap().unwrap(),
        ..stores_in(dir.path())
    };

    assert_eq!(stores.session.len(), 2);
    assert_eq!(stores.session.context_value("last_app"), Some("notepad"));
    assert_eq!(stores.memory.app_usage("notepad"), 1);
    assert_eq!(stores.memory.data().successful_commands.len(), 2);
    assert_eq!(stores.patterns.predict_next("open notepad"), Some("calculate 6*7"));
}

#[test]
fn test_unwritable_store_does_not_fail_the_command() {
    let dir = TempDir::new().unwrap();
    let data_dir = dir.path().join("data");
    std::fs::create_dir(&data_dir).unwrap();
    let h = harness(None);
    let mut stores = stores_in(&data_dir);

    // the data directory turns into a plain file, so every save fails
    std::fs::remove_dir_all(&data_dir).unwrap();
    std::fs::write(&data_dir, "not a directory").unwrap();

    let result = h.executor.execute_task("open notepad", &mut stores, None);

    assert!(result.success, "{}", result.message);
    assert_eq!(stores.session.len(), 1);
    assert_eq!(stores.memory.app_usage("notepad"), 1);
}

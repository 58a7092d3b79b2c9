//! Task executor: one command from text to recorded outcome.
//!
//! Per command:
//!
//! 1. Substitute pronouns from the session context.
//! 2. Resolve through the [`IntentResolver`] chain; anything but an accepted
//!    plan is reported as "couldn't understand" with no state change.
//! 3. Run the steps in order. Unknown skills abort at once; failing skills are
//!    retried under the [`RetryPolicy`] and abort the plan when exhausted.
//!    Actions listed as settling are followed by a fixed pause.
//! 4. On success, record the command in the session, memory bank and pattern
//!    tracker. Each write is independent and a failed write is only logged.

use crate::config::{Config, ExecutorConfig};
use crate::error::{Error, Result};
use crate::llm::create_model_client;
use crate::memory::MemoryBank;
use crate::patterns::PatternTracker;
use crate::resolver::{IntentResolver, Resolution};
use crate::retry::RetryPolicy;
use crate::safety::SafetySandbox;
use crate::session::{Interaction, SessionContext};
use crate::skills::{Desktop, SkillLookup, SkillRegistry};
use crate::types::{ActionPlan, StepResult, TaskResult};
use std::sync::Arc;
use std::time::Duration;

pub const NOT_UNDERSTOOD: &str =
    "I couldn't understand how to break down that task. Please try rephrasing.";

/// Blocking pause used for backoff and settling.
pub type Sleeper = Arc<dyn Fn(Duration) + Send + Sync>;

/// The three stores a command writes to.
#[derive(Debug)]
pub struct Stores {
    pub session: SessionContext,
    pub memory: MemoryBank,
    pub patterns: PatternTracker,
}

impl Stores {
    /// Fresh stores that never touch disk.
    pub fn in_memory(config: &Config) -> Self {
        Self {
            session: SessionContext::new(config.session.max_history),
            memory: MemoryBank::new(&config.memory),
            patterns: PatternTracker::new(),
        }
    }

    /// Load the persisted stores from the data directory.
    ///
    /// Memory and patterns write through on every change; the session is
    /// only written by [`Stores::save_session`].
    pub fn open(config: &Config) -> Result<Self> {
        Ok(Self {
            session: SessionContext::load_or_new(
                &Config::session_path(),
                config.session.max_history,
            )?,
            memory: MemoryBank::open(&Config::memory_path(), &config.memory)?,
            patterns: PatternTracker::open(&Config::patterns_path())?,
        })
    }

    pub fn save_session(&self) -> Result<()> {
        self.session.save(&Config::session_path())
    }
}

/// Result of resolving without executing.
#[derive(Debug, Clone, PartialEq)]
pub struct DryRun {
    /// Input after pronoun substitution
    pub resolved_input: String,
    pub resolution: Resolution,
}

pub struct TaskExecutor {
    registry: SkillRegistry,
    resolver: IntentResolver,
    retry: RetryPolicy,
    settle_delay: Duration,
    settle_actions: Vec<String>,
    sleeper: Sleeper,
}

impl std::fmt::Debug for TaskExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskExecutor")
            .field("skills", &self.registry.len())
            .field("resolver", &self.resolver)
            .field("retry", &self.retry)
            .field("settle_delay", &self.settle_delay)
            .field("settle_actions", &self.settle_actions)
            .finish_non_exhaustive()
    }
}

impl TaskExecutor {
    pub fn new(registry: SkillRegistry, resolver: IntentResolver, config: &ExecutorConfig) -> Self {
        Self {
            registry,
            resolver,
            retry: config.retry_policy(),
            settle_delay: config.settle_delay(),
            settle_actions: config.settle_actions.clone(),
            sleeper: Arc::new(std::thread::sleep),
        }
    }

    /// Executor with the built-in skills and the standard resolver chain.
    ///
    /// A model tier is added when `[model]` is configured; if its client
    /// cannot be built the chain runs without it.
    pub fn from_config(config: &Config, desktop: Arc<dyn Desktop>) -> Result<Self> {
        let sandbox = Arc::new(SafetySandbox::from_config(&config.safety)?);
        let registry = SkillRegistry::with_builtins(desktop, sandbox);

        let client = match &config.model {
            Some(model) => match create_model_client(model) {
                Ok(client) => Some(client),
                Err(e) => {
                    tracing::warn!(error = %e, "Model tier disabled");
                    None
                }
            },
            None => None,
        };
        let resolver = IntentResolver::standard(&config.resolver, &config.assistant, client)?;

        tracing::info!(
            skills = registry.len(),
            strategies = ?resolver.strategy_names(),
            "Task executor ready"
        );
        Ok(Self::new(registry, resolver, &config.executor))
    }

    /// Replace the thread sleep used for backoff and settling.
    pub fn with_sleeper(mut self, sleeper: Sleeper) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn registry(&self) -> &SkillRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut SkillRegistry {
        &mut self.registry
    }

    pub fn resolver(&self) -> &IntentResolver {
        &self.resolver
    }

    /// Resolve `command` without running anything.
    pub fn dry_run(&self, command: &str, session: &SessionContext) -> DryRun {
        let resolved_input = session.resolve_pronouns(command);
        let resolution = self.resolver.resolve(&resolved_input, session, &self.registry);
        DryRun {
            resolved_input,
            resolution,
        }
    }

    /// Resolve and run one command.
    ///
    /// `speak` receives the final message (success summary or failure).
    pub fn execute_task(
        &self,
        command: &str,
        stores: &mut Stores,
        speak: Option<&dyn Fn(&str)>,
    ) -> TaskResult {
        let say = |message: &str| {
            if let Some(speak) = speak {
                speak(message);
            }
        };

        let DryRun {
            resolved_input,
            resolution,
        } = self.dry_run(command, &stores.session);
        if resolved_input != command {
            tracing::debug!(command, resolved = %resolved_input, "Substituted pronouns");
        }

        let plan = match resolution {
            Resolution::Accepted(plan) => plan,
            Resolution::Rejected(plan) => {
                tracing::info!(
                    command,
                    source = plan.source.as_str(),
                    confidence = plan.confidence,
                    "Plan rejected"
                );
                say(NOT_UNDERSTOOD);
                return TaskResult::failure(NOT_UNDERSTOOD, Vec::new());
            }
            Resolution::NoMatch => {
                say(NOT_UNDERSTOOD);
                return TaskResult::failure(NOT_UNDERSTOOD, Vec::new());
            }
        };

        tracing::info!(
            command,
            intent = %plan.intent,
            source = plan.source.as_str(),
            steps = plan.steps.len(),
            "Executing plan"
        );

        let steps = match self.run_steps(&plan) {
            Ok(steps) => steps,
            Err((steps, message)) => {
                say(&message);
                return TaskResult::failure(message, steps);
            }
        };

        let message = success_message(&resolved_input, steps.len());
        self.record(command, &plan, &message, stores);
        say(&message);

        TaskResult {
            success: true,
            message,
            steps,
        }
    }

    /// Run every step, or stop at the first failure with its message.
    fn run_steps(
        &self,
        plan: &ActionPlan,
    ) -> std::result::Result<Vec<StepResult>, (Vec<StepResult>, String)> {
        let total = plan.steps.len();
        let mut results = Vec::with_capacity(total);

        for (index, step) in plan.steps.iter().enumerate() {
            let number = index + 1;
            let action = step.kind.as_str();
            tracing::debug!(step = number, total, skill = action, "Running step");

            let skill = match self.registry.lookup(&step.kind) {
                SkillLookup::Found(skill) => skill,
                SkillLookup::Unknown => {
                    let err = Error::SkillNotFound(action.to_string());
                    tracing::warn!(step = number, skill = action, "Plan references unknown skill");
                    let message = step_failure(number, action, &err);
                    results.push(StepResult {
                        step: number,
                        action: step.kind.clone(),
                        params: step.params.clone(),
                        success: false,
                        output: None,
                        error: Some(err.to_string()),
                        attempts: 0,
                    });
                    return Err((results, message));
                }
            };

            let outcome = self.retry.run_with_sleep(
                |attempt| {
                    tracing::debug!(step = number, skill = action, attempt, "Calling skill");
                    skill.call(&step.params)
                },
                |delay| (self.sleeper)(delay),
            );

            match outcome.result {
                Ok(output) => {
                    tracing::info!(
                        step = number,
                        skill = action,
                        attempts = outcome.attempts,
                        "Step completed"
                    );
                    results.push(StepResult {
                        step: number,
                        action: step.kind.clone(),
                        params: step.params.clone(),
                        success: true,
                        output: Some(output),
                        error: None,
                        attempts: outcome.attempts,
                    });
                    // only when another step follows
                    if number < total
                        && !self.settle_delay.is_zero()
                        && self.settle_actions.iter().any(|a| a == action)
                    {
                        tracing::debug!(
                            skill = action,
                            delay_ms = self.settle_delay.as_millis() as u64,
                            "Waiting for action to settle"
                        );
                        (self.sleeper)(self.settle_delay);
                    }
                }
                Err(err) => {
                    tracing::warn!(
                        step = number,
                        skill = action,
                        attempts = outcome.attempts,
                        error = %err,
                        "Step failed"
                    );
                    let message = step_failure(number, action, &err);
                    results.push(StepResult {
                        step: number,
                        action: step.kind.clone(),
                        params: step.params.clone(),
                        success: false,
                        output: None,
                        error: Some(err.to_string()),
                        attempts: outcome.attempts,
                    });
                    return Err((results, message));
                }
            }
        }

        Ok(results)
    }

    fn record(&self, command: &str, plan: &ActionPlan, message: &str, stores: &mut Stores) {
        let app = plan.entity("app");

        stores.session.record(
            Interaction::new(command, message, Some(plan.intent.clone()), true),
            &plan.entities,
        );

        if let Err(e) = stores
            .memory
            .record_command(command, Some(&plan.intent), true, app)
        {
            tracing::warn!(error = %e, "Failed to record command in memory bank");
        }

        if let Err(e) = stores.patterns.track_command(command, app) {
            tracing::warn!(error = %e, "Failed to record command pattern");
        }
    }
}

/// "Error in step N: action failed: reason"
fn step_failure(number: usize, action: &str, err: &Error) -> String {
    let reason = match err {
        Error::Skill { message, .. } => message.clone(),
        other => other.to_string(),
    };
    format!("Error in step {number}: {action} failed: {reason}")
}

/// Canned summary picked from the command wording, else a step count.
pub fn success_message(command: &str, steps: usize) -> String {
    let c = command.to_lowercase();
    let message = if c.contains("spotify") && c.contains("play") {
        "Spotify opened. Say 'play <song> on youtube' if playback does not start."
    } else if c.contains("open") && c.contains("write") {
        "Done. I've opened the application and entered your text."
    } else if c.contains("calculate") || c.contains("what is") {
        "Calculation complete."
    } else if c.contains("search") || c.contains("find") {
        "Here's what I found."
    } else if c.contains("create file") {
        "File created successfully."
    } else if c.contains("screenshot") {
        "Screenshot captured."
    } else if c.contains("volume") {
        "Volume adjusted."
    } else if steps == 1 {
        "Done."
    } else {
        return format!("All set. Completed {steps} steps.");
    };
    message.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MemoryConfig;
    use crate::types::{ActionKind, ActionStep, PlanSource, SkillParams};
    use crate::resolver::{ResolveContext, ResolverStrategy};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// Always returns the same plan.
    struct FixedPlan(ActionPlan);

    impl ResolverStrategy for FixedPlan {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn resolve(&self, _input: &str, _ctx: &ResolveContext<'_>) -> Result<Option<ActionPlan>> {
            Ok(Some(self.0.clone()))
        }
    }

    fn stores() -> Stores {
        Stores {
            session: SessionContext::new(20),
            memory: MemoryBank::new(&MemoryConfig::default()),
            patterns: PatternTracker::new(),
        }
    }

    fn recording_sleeper() -> (Sleeper, Arc<Mutex<Vec<Duration>>>) {
        let slept = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&slept);
        let sleeper: Sleeper = Arc::new(move |d: Duration| log.lock().unwrap().push(d));
        (sleeper, slept)
    }

    fn executor_with(registry: SkillRegistry, plan: ActionPlan) -> (TaskExecutor, Arc<Mutex<Vec<Duration>>>) {
        let mut resolver = IntentResolver::new(0.5);
        resolver.push(FixedPlan(plan));
        let (sleeper, slept) = recording_sleeper();
        let executor =
            TaskExecutor::new(registry, resolver, &ExecutorConfig::default()).with_sleeper(sleeper);
        (executor, slept)
    }

    fn plan(steps: Vec<ActionStep>, confidence: f64) -> ActionPlan {
        ActionPlan::from_steps("test", steps, confidence, PlanSource::Model)
    }

    #[test]
    fn retries_with_backoff_then_succeeds() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let mut registry = SkillRegistry::new();
        registry.register("flaky", "Fails twice", &[], move |_: &SkillParams| {
            if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(Error::skill("flaky", "not yet"))
            } else {
                Ok("ok".to_string())
            }
        });

        let (executor, slept) = executor_with(
            registry,
            plan(vec![ActionStep::new(ActionKind::from("flaky"))], 0.9),
        );
        let mut stores = stores();
        let result = executor.execute_task("do the flaky thing", &mut stores, None);

        assert!(result.success, "{}", result.message);
        assert_eq!(result.steps[0].attempts, 3);
        let slept = slept.lock().unwrap();
        let total: Duration = slept.iter().sum();
        assert_eq!(*slept, vec![Duration::from_millis(500), Duration::from_millis(1000)]);
        assert!(total >= Duration::from_millis(1500));
    }

    #[test]
    fn partial_failure_aborts_without_recording() {
        let mut registry = SkillRegistry::new();
        registry.register("ok", "Works", &[], |_: &SkillParams| Ok("fine".to_string()));
        registry.register("broken", "Fails", &[], |_: &SkillParams| {
            Err(Error::skill("broken", "disk on fire"))
        });
        let third_ran = Arc::new(AtomicU32::new(0));
        let flag = Arc::clone(&third_ran);
        registry.register("never", "Unreached", &[], move |_: &SkillParams| {
            flag.fetch_add(1, Ordering::SeqCst);
            Ok(String::new())
        });

        let (executor, _) = executor_with(
            registry,
            plan(
                vec![
                    ActionStep::new(ActionKind::from("ok")),
                    ActionStep::new(ActionKind::from("broken")),
                    ActionStep::new(ActionKind::from("never")),
                ],
                0.9,
            ),
        );
        let mut stores = stores();
        let spoken = Mutex::new(Vec::new());
        let speak = |m: &str| spoken.lock().unwrap().push(m.to_string());
        let result = executor.execute_task("ok then broken", &mut stores, Some(&speak));

        assert!(!result.success);
        assert_eq!(result.message, "Error in step 2: broken failed: disk on fire");
        assert_eq!(result.completed_steps().len(), 1);
        assert_eq!(result.steps.len(), 2);
        assert_eq!(result.steps[1].attempts, 3);
        assert_eq!(third_ran.load(Ordering::SeqCst), 0);

        assert!(stores.session.is_empty());
        assert_eq!(stores.memory.summary().total_successful_commands, 0);
        assert_eq!(stores.memory.summary().total_failed_commands, 0);
        assert!(stores.patterns.data().time_based.is_empty());
        assert_eq!(*spoken.lock().unwrap(), vec![result.message.clone()]);
    }

    #[test]
    fn unknown_skill_aborts_without_retry() {
        let (executor, slept) = executor_with(
            SkillRegistry::new(),
            plan(vec![ActionStep::new(ActionKind::from("teleport"))], 0.9),
        );
        let result = executor.execute_task("teleport me", &mut stores(), None);

        assert!(!result.success);
        assert_eq!(
            result.message,
            "Error in step 1: teleport failed: unknown skill: teleport"
        );
        assert_eq!(result.steps[0].attempts, 0);
        assert!(slept.lock().unwrap().is_empty());
    }

    #[test]
    fn low_confidence_plan_never_runs() {
        let ran = Arc::new(AtomicU32::new(0));
        let flag = Arc::clone(&ran);
        let mut registry = SkillRegistry::new();
        registry.register("open_app", "Open", &[], move |_: &SkillParams| {
            flag.fetch_add(1, Ordering::SeqCst);
            Ok(String::new())
        });

        let (executor, _) = executor_with(
            registry,
            plan(vec![ActionStep::new(ActionKind::OpenApp).with("app", "x")], 0.5),
        );
        let mut stores = stores();
        let result = executor.execute_task("maybe open x", &mut stores, None);

        assert!(!result.success);
        assert_eq!(result.message, NOT_UNDERSTOOD);
        assert_eq!(ran.load(Ordering::SeqCst), 0);
        assert!(stores.session.is_empty());
    }

    #[test]
    fn settling_pause_follows_open_app() {
        let mut registry = SkillRegistry::new();
        registry.register("open_app", "Open", &[], |_: &SkillParams| Ok(String::new()));
        registry.register("type_text", "Type", &[], |_: &SkillParams| Ok(String::new()));
        let (executor, slept) = executor_with(
            registry,
            plan(
                vec![
                    ActionStep::new(ActionKind::OpenApp).with("app", "notepad"),
                    ActionStep::new(ActionKind::TypeText).with("text", "hello"),
                ],
                0.9,
            ),
        );
        let mut stores = stores();
        let result = executor.execute_task("open notepad and write hello", &mut stores, None);

        assert!(result.success, "{}", result.message);
        assert_eq!(result.steps.len(), 2);
        assert_eq!(*slept.lock().unwrap(), vec![Duration::from_secs(5)]);
        assert_eq!(stores.memory.app_usage("notepad"), 1);
        assert_eq!(stores.session.context_value(crate::session::LAST_APP), Some("notepad"));
    }

    #[test]
    fn no_settling_pause_after_final_step() {
        let mut registry = SkillRegistry::new();
        registry.register("open_app", "Open", &[], |_: &SkillParams| Ok(String::new()));
        let (executor, slept) = executor_with(
            registry,
            plan(vec![ActionStep::new(ActionKind::OpenApp).with("app", "notepad")], 0.9),
        );
        let mut stores = stores();
        let result = executor.execute_task("open notepad", &mut stores, None);

        assert!(result.success);
        assert_eq!(result.message, "Done.");
        assert!(slept.lock().unwrap().is_empty());
        assert_eq!(stores.memory.app_usage("notepad"), 1);
    }

    #[test]
    fn success_messages() {
        assert_eq!(success_message("open calculator and calculate 2+2", 2), "Calculation complete.");
        assert_eq!(
            success_message("open notepad and write hi", 2),
            "Done. I've opened the application and entered your text."
        );
        assert_eq!(success_message("search web for cats", 1), "Here's what I found.");
        assert_eq!(success_message("create file a.txt", 1), "File created successfully.");
        assert_eq!(success_message("take a screenshot", 1), "Screenshot captured.");
        assert_eq!(success_message("set volume to 5", 1), "Volume adjusted.");
        assert_eq!(success_message("open slack", 1), "Done.");
        assert_eq!(success_message("open a and open b", 2), "All set. Completed 2 steps.");
        assert!(success_message("open spotify and play jazz", 1).starts_with("Spotify"));
    }
}

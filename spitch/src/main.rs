//! spitch - personal command assistant
//!
//! Turns free-text commands into skill calls on the local machine.
//!
//! Uses XDG Base Directory specification for file locations:
//! - State: $XDG_DATA_HOME/spitch/{session,memory,patterns}.json
//! - Config: $XDG_CONFIG_HOME/spitch/config.toml
//! - Logs: $XDG_STATE_HOME/spitch/spitch.<date>.log

use anyhow::{Context, Result};
use chrono::Timelike;
use clap::{Parser, Subcommand};
use serde::Serialize;
use spitch_core::executor::DryRun;
use spitch_core::skills::SystemDesktop;
use spitch_core::{advisor, ActionPlan, Config, Resolution, Stores, TaskExecutor};
use std::io::{self, BufRead, Write};
use std::process::ExitCode;
use std::sync::{Arc, Mutex};

#[derive(Parser)]
#[command(name = "spitch")]
#[command(about = "Personal voice/text command assistant")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve and execute one command
    Run {
        /// The command, e.g. "open notepad and write hello"
        #[arg(required = true, num_args = 1..)]
        words: Vec<String>,

        /// Show the resolved plan without executing it
        #[arg(long)]
        dry_run: bool,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Read commands from stdin until "exit" or end of input
    Repl,

    /// List registered skills
    Skills {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show what the memory bank has learned
    Memory {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the usage routine tracked so far
    Routine,

    /// Suggest commands for the current time
    Suggest {
        /// Hour of day to suggest for (0-23, default: now)
        #[arg(long, value_parser = clap::value_parser!(u32).range(0..24))]
        hour: Option<u32>,
    },

    /// Show this session's conversation history
    History {
        /// Number of recent interactions to show
        #[arg(short = 'n', long, default_value = "10")]
        limit: usize,
    },
}

fn main() -> Result<ExitCode> {
    let args = Args::parse();

    Config::ensure_xdg_env();

    // Load configuration
    let config = Config::load().context("failed to load configuration")?;

    // Initialize logging (to file, stdout is for the conversation)
    let _log_guard =
        spitch_core::logging::init(&config.logging).context("failed to initialize logging")?;

    tracing::info!("spitch starting up");

    let mut stores = Stores::open(&config).context("failed to open stores")?;

    match args.command {
        Command::Run {
            words,
            dry_run,
            json,
        } => {
            let executor = build_executor(&config)?;
            let command = words.join(" ");
            if dry_run {
                cmd_dry_run(&executor.dry_run(&command, &stores.session), json)?;
                return Ok(ExitCode::SUCCESS);
            }
            let success = cmd_run(&executor, &command, &mut stores, json)?;
            stores.save_session().context("failed to save session")?;
            Ok(if success {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Command::Repl => {
            let executor = build_executor(&config)?;
            cmd_repl(&config, &executor, &mut stores)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Skills { json } => {
            cmd_skills(&build_executor(&config)?, json)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Memory { json } => {
            cmd_memory(&stores, json)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Routine => {
            cmd_routine(&stores);
            Ok(ExitCode::SUCCESS)
        }
        Command::Suggest { hour } => {
            cmd_suggest(&stores, hour);
            Ok(ExitCode::SUCCESS)
        }
        Command::History { limit } => {
            cmd_history(&stores, limit);
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn build_executor(config: &Config) -> Result<TaskExecutor> {
    TaskExecutor::from_config(config, Arc::new(SystemDesktop::new()))
        .context("failed to build task executor")
}

fn cmd_run(executor: &TaskExecutor, command: &str, stores: &mut Stores, json: bool) -> Result<bool> {
    let result = executor.execute_task(command, stores, None);

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(result.success);
    }

    for step in result.completed_steps() {
        if let Some(output) = step.output.as_deref().filter(|o| !o.is_empty()) {
            println!("  [{}] {}", step.action, output);
        }
    }
    if result.success {
        println!("{}", result.message);
    } else {
        eprintln!("{}", result.message);
    }
    Ok(result.success)
}

#[derive(Serialize)]
struct DryRunReport<'a> {
    resolved_input: &'a str,
    accepted: bool,
    plan: Option<&'a ActionPlan>,
}

fn cmd_dry_run(dry: &DryRun, json: bool) -> Result<()> {
    if json {
        let report = DryRunReport {
            resolved_input: &dry.resolved_input,
            accepted: dry.resolution.is_accepted(),
            plan: dry.resolution.plan(),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Input:      {}", dry.resolved_input);
    let plan = match &dry.resolution {
        Resolution::Accepted(plan) => {
            println!("Status:     accepted");
            plan
        }
        Resolution::Rejected(plan) => {
            println!("Status:     rejected (confidence too low)");
            plan
        }
        Resolution::NoMatch => {
            println!("Status:     no match");
            return Ok(());
        }
    };
    println!("Intent:     {}", plan.intent);
    println!("Source:     {}", plan.source.as_str());
    println!("Confidence: {:.2}", plan.confidence);
    println!("Steps:");
    for (i, step) in plan.steps.iter().enumerate() {
        println!(
            "  {}. {} {}",
            i + 1,
            step.kind,
            serde_json::to_string(&step.params)?
        );
    }
    Ok(())
}

fn cmd_repl(config: &Config, executor: &TaskExecutor, stores: &mut Stores) -> Result<()> {
    let name = config.assistant.name.clone();

    // Ctrl+C while idle exits at once; during a command it waits for the save.
    let gate = InterruptGate::default();
    let handler_gate = gate.clone();
    let goodbye = name.clone();
    ctrlc::set_handler(move || {
        handler_gate.interrupt(|| {
            println!("\n{goodbye}: Goodbye!");
            std::process::exit(0);
        });
    })
    .context("failed to set Ctrl+C handler")?;

    println!("{name}: Hello! Type a command, or \"exit\" to quit.");
    for suggestion in advisor::suggestions(
        &stores.memory,
        &stores.patterns,
        stores.session.last().map(|i| i.user_input.as_str()),
    ) {
        println!("{}", advisor::format_suggestion(&suggestion));
    }

    let stdin = io::stdin();
    let mut line = String::new();
    loop {
        print!("> ");
        io::stdout().flush()?;

        line.clear();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let command = line.trim();
        if command.is_empty() {
            continue;
        }
        if matches!(command.to_lowercase().as_str(), "exit" | "quit" | "goodbye") {
            break;
        }

        gate.begin();
        let speak = |message: &str| println!("{name}: {message}");
        executor.execute_task(command, stores, Some(&speak));

        if let Err(e) = stores.save_session() {
            tracing::warn!(error = %e, "Failed to save session");
        }
        if gate.finish() {
            tracing::info!("Interrupted during a command, leaving after save");
            break;
        }
    }

    println!("{name}: Goodbye!");
    stores.save_session().context("failed to save session")?;
    Ok(())
}

#[derive(Default)]
struct GateState {
    busy: bool,
    interrupted: bool,
}

/// Ctrl+C bookkeeping shared between the signal handler and the REPL loop.
#[derive(Clone, Default)]
struct InterruptGate {
    state: Arc<Mutex<GateState>>,
}

impl InterruptGate {
    fn lock(&self) -> std::sync::MutexGuard<'_, GateState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Runs `exit_now` unless a command is in flight, in which case the
    /// interrupt is remembered for [`finish`](Self::finish).
    fn interrupt(&self, exit_now: impl FnOnce()) {
        let mut state = self.lock();
        if state.busy {
            state.interrupted = true;
        } else {
            // lock held so no command can start meanwhile
            exit_now();
        }
    }

    fn begin(&self) {
        self.lock().busy = true;
    }

    /// Marks the command done. True when an interrupt arrived during it.
    fn finish(&self) -> bool {
        let mut state = self.lock();
        state.busy = false;
        std::mem::take(&mut state.interrupted)
    }
}

fn cmd_skills(executor: &TaskExecutor, json: bool) -> Result<()> {
    let skills = executor.registry().list_all();
    if json {
        println!("{}", serde_json::to_string_pretty(&skills)?);
        return Ok(());
    }

    println!("Available skills ({}):", skills.len());
    for skill in skills {
        let params = skill
            .params
            .iter()
            .map(|p| p.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        println!("  - {}({}): {}", skill.name, params, skill.description);
    }
    Ok(())
}

fn cmd_memory(stores: &Stores, json: bool) -> Result<()> {
    let summary = stores.memory.summary();
    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("Memory Bank");
    println!("===========");
    println!("Successful commands: {}", summary.total_successful_commands);
    println!("Failed commands:     {}", summary.total_failed_commands);
    println!("Preferences:         {}", summary.learned_preferences);
    println!("File locations:      {}", summary.known_file_locations);
    println!("Feedback entries:    {}", summary.feedback_count);
    if !summary.most_used_apps.is_empty() {
        println!();
        println!("Most used apps:");
        for (app, count) in &summary.most_used_apps {
            println!("  {app:<20} {count}");
        }
    }
    Ok(())
}

fn cmd_routine(stores: &Stores) {
    let routine = stores.patterns.routine_summary();

    println!("Routine");
    println!("=======");
    println!("Tracked hours:    {}", routine.total_tracked_hours);
    println!(
        "Most active hour: {}",
        routine.most_active_hour.as_deref().unwrap_or("-")
    );
    println!(
        "Most active day:  {}",
        routine.most_active_day.as_deref().unwrap_or("-")
    );
    if !routine.top_apps.is_empty() {
        println!();
        println!("Top apps:");
        for (app, count) in &routine.top_apps {
            println!("  {app:<20} {count}");
        }
    }
}

fn cmd_suggest(stores: &Stores, hour: Option<u32>) {
    let hour = hour.unwrap_or_else(|| chrono::Local::now().hour());
    let last = stores.session.last().map(|i| i.user_input.as_str());
    let suggestions = advisor::suggestions_at(&stores.memory, &stores.patterns, last, hour);

    if suggestions.is_empty() {
        println!("No suggestions yet. Use spitch for a while and check back.");
        return;
    }
    for suggestion in suggestions {
        println!("{}", advisor::format_suggestion(&suggestion));
    }
}

fn cmd_history(stores: &Stores, limit: usize) {
    println!("{}", stores.session.summary());
    let recent = stores.session.recent(limit);
    if recent.is_empty() {
        return;
    }
    println!();
    for interaction in recent {
        let mark = if interaction.success { "ok" } else { "failed" };
        println!(
            "[{}] {} ({mark})",
            interaction.timestamp.format("%H:%M:%S"),
            interaction.user_input
        );
        println!("    {}", interaction.response);
    }
}

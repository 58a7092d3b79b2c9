//! # spitch-core
//!
//! Command engine for Spitch, a personal voice/text assistant.
//!
//! This library provides:
//! - A skill registry of named, parameterised handlers
//! - Intent resolution from free text to an action plan
//! - Step execution with retry, backoff and settling pauses
//! - Session context, a memory bank and a pattern tracker persisted as JSON
//! - Configuration and logging infrastructure
//!
//! ## Architecture
//!
//! A command flows through three stages:
//! - **Resolve:** pronoun substitution, then the pattern → model → keyword
//!   resolver chain and the confidence gate
//! - **Execute:** each step's skill runs under the retry policy; the first
//!   fatal failure aborts the plan
//! - **Record:** successful commands land in the session, memory bank and
//!   pattern tracker (best-effort)
//!
//! ## Example
//!
//! ```rust,no_run
//! use spitch_core::skills::SystemDesktop;
//! use spitch_core::{Config, Stores, TaskExecutor};
//! use std::sync::Arc;
//!
//! let config = Config::load().expect("failed to load config");
//! let executor = TaskExecutor::from_config(&config, Arc::new(SystemDesktop))
//!     .expect("failed to build executor");
//! let mut stores = Stores::open(&config).expect("failed to open stores");
//!
//! let result = executor.execute_task("calculate 12*7", &mut stores, None);
//! println!("{}", result.message);
//! ```

// Re-export commonly used items at the crate root
pub use config::Config;
pub use error::{Error, Result};
pub use executor::{Stores, TaskExecutor};
pub use memory::MemoryBank;
pub use patterns::PatternTracker;
pub use resolver::{IntentResolver, Resolution};
pub use session::SessionContext;
pub use skills::SkillRegistry;
pub use types::*;

// Public modules
pub mod advisor;
pub mod config;
pub mod error;
pub mod executor;
pub mod llm;
pub mod logging;
pub mod memory;
pub mod patterns;
pub mod resolver;
pub mod retry;
pub mod safety;
pub mod session;
pub mod skills;
pub mod store;
pub mod types;

//! Intent resolution: free text → [`ActionPlan`].
//!
//! Resolution runs an ordered chain of [`ResolverStrategy`] tiers and stops at
//! the first one that produces a plan:
//!
//! 1. [`PatternStrategy`] – deterministic rules, confidence 1.0
//! 2. [`ModelStrategy`] – language model, only when a client is configured
//! 3. [`KeywordStrategy`] – last-resort classifier whose plans sit below the
//!    execution threshold
//!
//! The first plan is then gated: it is accepted only when it has at least one
//! step and its confidence is strictly above the threshold.

pub mod keywords;
pub mod model;
pub mod patterns;

pub use keywords::KeywordStrategy;
pub use model::ModelStrategy;
pub use patterns::PatternStrategy;

use crate::config::{AssistantConfig, ResolverConfig};
use crate::error::Result;
use crate::llm::ModelClient;
use crate::session::SessionContext;
use crate::skills::SkillRegistry;
use crate::types::ActionPlan;

/// What a strategy may read while resolving.
#[derive(Debug, Clone, Copy)]
pub struct ResolveContext<'a> {
    pub session: &'a SessionContext,
    pub registry: &'a SkillRegistry,
}

/// One tier of the resolver chain.
pub trait ResolverStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// `Ok(None)` means "no match, ask the next tier".
    fn resolve(&self, input: &str, ctx: &ResolveContext<'_>) -> Result<Option<ActionPlan>>;
}

/// Outcome of running the chain.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// A plan cleared the gate and may be executed.
    Accepted(ActionPlan),
    /// A tier produced a plan but it is empty or not confident enough.
    Rejected(ActionPlan),
    /// No tier produced anything.
    NoMatch,
}

impl Resolution {
    pub fn plan(&self) -> Option<&ActionPlan> {
        match self {
            Resolution::Accepted(plan) | Resolution::Rejected(plan) => Some(plan),
            Resolution::NoMatch => None,
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, Resolution::Accepted(_))
    }
}

/// Ordered chain of strategies plus the acceptance threshold.
pub struct IntentResolver {
    strategies: Vec<Box<dyn ResolverStrategy>>,
    threshold: f64,
}

impl std::fmt::Debug for IntentResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntentResolver")
            .field("strategies", &self.strategy_names())
            .field("threshold", &self.threshold)
            .finish()
    }
}

impl IntentResolver {
    /// Empty chain; add tiers with [`IntentResolver::push`].
    pub fn new(threshold: f64) -> Self {
        Self {
            strategies: Vec::new(),
            threshold,
        }
    }

    /// Pattern tier, model tier (when `client` is given) and keyword tier.
    pub fn standard(
        config: &ResolverConfig,
        assistant: &AssistantConfig,
        client: Option<Box<dyn ModelClient>>,
    ) -> Result<Self> {
        let mut resolver = Self::new(config.confidence_threshold);
        resolver.push(PatternStrategy::new()?);
        if let Some(client) = client {
            resolver.push(ModelStrategy::new(
                client,
                &assistant.name,
                config.context_turns,
            ));
        }
        resolver.push(KeywordStrategy::new(config.confidence_threshold)?);
        Ok(resolver)
    }

    pub fn push(&mut self, strategy: impl ResolverStrategy + 'static) -> &mut Self {
        self.strategies.push(Box::new(strategy));
        self
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Run the chain over `input` and gate the first plan produced.
    ///
    /// A strategy that errors is logged and skipped.
    pub fn resolve(
        &self,
        input: &str,
        session: &SessionContext,
        registry: &SkillRegistry,
    ) -> Resolution {
        let ctx = ResolveContext { session, registry };

        for strategy in &self.strategies {
            let plan = match strategy.resolve(input, &ctx) {
                Ok(Some(plan)) => plan,
                Ok(None) => {
                    tracing::debug!(strategy = strategy.name(), "No match");
                    continue;
                }
                Err(e) => {
                    tracing::warn!(strategy = strategy.name(), error = %e, "Resolver tier failed");
                    continue;
                }
            };

            let accepted = plan.is_executable(self.threshold);
            tracing::info!(
                strategy = strategy.name(),
                intent = %plan.intent,
                steps = plan.steps.len(),
                confidence = plan.confidence,
                accepted,
                "Resolved command"
            );
            return if accepted {
                Resolution::Accepted(plan)
            } else {
                Resolution::Rejected(plan)
            };
        }

        tracing::info!(input, "No resolver tier matched");
        Resolution::NoMatch
    }
}

//! Language model tier.

use super::{ResolveContext, ResolverStrategy};
use crate::error::Result;
use crate::llm::{parse_json_object, ModelClient};
use crate::types::{ActionPlan, ActionStep, PlanSource, SkillParams};
use serde::Deserialize;

const EXAMPLES: &str = r#"Examples:

User: "I want to write a shopping list"
{
  "intent": "create_document",
  "entities": {"document_type": "shopping list", "app": "notepad"},
  "actions": [
    {"type": "open_app", "params": {"app": "notepad"}},
    {"type": "type_text", "params": {"text": "Shopping List:"}}
  ],
  "confidence": 0.9
}

User: "Find Python tutorials"
{
  "intent": "web_search",
  "entities": {"query": "Python tutorials"},
  "actions": [
    {"type": "open_website", "params": {"url": "https://www.google.com/search?q=Python+tutorials"}}
  ],
  "confidence": 0.95
}

User: "What's 25 times 4?"
{
  "intent": "calculate",
  "entities": {"expression": "25*4"},
  "actions": [
    {"type": "calculate", "params": {"expression": "25*4"}}
  ],
  "confidence": 1.0
}"#;

/// Shape of the JSON object the model is asked for.
#[derive(Debug, Deserialize)]
struct ModelPlan {
    #[serde(default)]
    intent: Option<String>,
    #[serde(default)]
    entities: SkillParams,
    #[serde(default)]
    actions: Vec<ActionStep>,
    #[serde(default)]
    confidence: f64,
}

/// Asks a [`ModelClient`] for a plan. Backend and parse failures are "no match".
pub struct ModelStrategy {
    client: Box<dyn ModelClient>,
    assistant_name: String,
    context_turns: usize,
}

impl ModelStrategy {
    pub fn new(client: Box<dyn ModelClient>, assistant_name: &str, context_turns: usize) -> Self {
        Self {
            client,
            assistant_name: assistant_name.to_string(),
            context_turns,
        }
    }

    pub fn build_prompt(&self, input: &str, ctx: &ResolveContext<'_>) -> String {
        let mut prompt = String::new();

        let history = ctx.session.context_for_prompt(self.context_turns);
        if !history.is_empty() {
            prompt.push_str("Previous Conversation:\n");
            prompt.push_str(&history);
            prompt.push_str("\n\n");
        }

        prompt.push_str(&format!(
            "You are {}, an intelligent assistant. Parse this user command and extract the intent and action plan.\n\n",
            self.assistant_name
        ));
        prompt.push_str(&format!("User Command: \"{input}\"\n\n"));
        prompt.push_str(
            "Analyze the command and return a JSON object with:\n\
             1. \"intent\": Primary goal (e.g., \"open_and_write\", \"search_web\", \"calculate\", \"control_system\")\n\
             2. \"entities\": Extracted entities like app names, file names, text content, numbers, websites\n\
             3. \"actions\": Step-by-step action plan as array of objects with 'type' and 'params'\n\
             4. \"confidence\": Your confidence level (0.0-1.0)\n\n",
        );
        prompt.push_str(&ctx.registry.prompt_snippet());
        prompt.push_str("\n\n");
        prompt.push_str(EXAMPLES);
        prompt.push_str("\n\nNow parse the user's command and return ONLY the JSON object, nothing else:");
        prompt
    }
}

/// Turn raw model output into a plan, or `None` if it is not a usable object.
pub fn parse_plan(raw: &str) -> Option<ActionPlan> {
    let value = match parse_json_object(raw) {
        Ok(value) => value,
        Err(e) => {
            tracing::debug!(error = %e, "Model output is not JSON");
            return None;
        }
    };
    let parsed: ModelPlan = match serde_json::from_value(value) {
        Ok(parsed) => parsed,
        Err(e) => {
            tracing::debug!(error = %e, "Model output has the wrong shape");
            return None;
        }
    };

    let intent = parsed
        .intent
        .filter(|i| !i.trim().is_empty())
        .unwrap_or_else(|| "unknown".to_string());
    let mut plan = ActionPlan::from_steps(intent, parsed.actions, parsed.confidence, PlanSource::Model);
    // step-derived entities win over what the model claims
    for (key, value) in parsed.entities {
        plan.entities.entry(key).or_insert(value);
    }
    Some(plan)
}

impl ResolverStrategy for ModelStrategy {
    fn name(&self) -> &'static str {
        "model"
    }

    fn resolve(&self, input: &str, ctx: &ResolveContext<'_>) -> Result<Option<ActionPlan>> {
        let prompt = self.build_prompt(input, ctx);
        let raw = match self.client.complete(&prompt) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(error = %e, "Model backend unavailable");
                return Ok(None);
            }
        };
        Ok(parse_plan(&raw))
    }
}

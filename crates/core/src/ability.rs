//! Abilities: locally registered functions the model can call as tools.
//!
//! An [`Ability`] is declared explicitly: a name, a description, and an
//! ordered list of typed [`AbilityArgument`]s. That declaration is what the
//! model sees as the tool schema. The [`AbilityRegistry`] looks abilities up
//! by name at dispatch time and turns every failure into text, so a single
//! bad call never aborts a round.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::{debug, warn};

use crate::error::AbilityError;
use crate::provider::ToolDefinition;

const MAX_NAME_LEN: usize = 64;

/// JSON-schema type of an ability argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArgumentType {
    String,
    Number,
    Boolean,
    Array,
    Object,
    Null,
}

impl ArgumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Array => "array",
            Self::Object => "object",
            Self::Null => "null",
        }
    }
}

/// One declared argument of an ability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbilityArgument {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ArgumentType,
    pub description: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<String>>,
}

impl AbilityArgument {
    /// An optional argument.
    pub fn new(name: impl Into<String>, kind: ArgumentType, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            description: description.into(),
            required: false,
            values: None,
        }
    }

    /// A required argument.
    pub fn required(
        name: impl Into<String>,
        kind: ArgumentType,
        description: impl Into<String>,
    ) -> Self {
        Self {
            required: true,
            ..Self::new(name, kind, description)
        }
    }

    /// Restrict the argument to an enumerated set of values.
    pub fn with_values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.values = Some(values.into_iter().map(Into::into).collect());
        self
    }

    fn to_schema(&self) -> Value {
        let mut schema = json!({
            "type": self.kind.as_str(),
            "description": self.description,
        });
        if let Some(values) = &self.values {
            schema["enum"] = json!(values);
        }
        schema
    }
}

/// Arguments bound to an ability call, keyed by argument name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AbilityArgs(Map<String, Value>);

impl AbilityArgs {
    pub fn new(map: Map<String, Value>) -> Self {
        Self(map)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }

    /// A string argument, or an `InvalidArguments` error naming it.
    pub fn str(&self, name: &str) -> Result<&str, AbilityError> {
        self.opt_str(name)
            .ok_or_else(|| AbilityError::InvalidArguments(format!("'{name}' must be a string")))
    }

    pub fn opt_str(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(Value::as_str)
    }

    pub fn number(&self, name: &str) -> Result<f64, AbilityError> {
        self.0
            .get(name)
            .and_then(Value::as_f64)
            .ok_or_else(|| AbilityError::InvalidArguments(format!("'{name}' must be a number")))
    }

    pub fn boolean(&self, name: &str) -> Result<bool, AbilityError> {
        self.0
            .get(name)
            .and_then(Value::as_bool)
            .ok_or_else(|| AbilityError::InvalidArguments(format!("'{name}' must be a boolean")))
    }
}

/// The callable behind an ability.
#[async_trait]
pub trait AbilityHandler: Send + Sync {
    async fn call(&self, args: AbilityArgs) -> Result<String, AbilityError>;
}

/// Adapter for plain synchronous closures.
struct FnHandler<F>(F);

#[async_trait]
impl<F> AbilityHandler for FnHandler<F>
where
    F: Fn(AbilityArgs) -> Result<String, AbilityError> + Send + Sync,
{
    async fn call(&self, args: AbilityArgs) -> Result<String, AbilityError> {
        (self.0)(args)
    }
}

/// A named, described, callable ability.
#[derive(Clone)]
pub struct Ability {
    name: String,
    description: String,
    arguments: Vec<AbilityArgument>,
    handler: Arc<dyn AbilityHandler>,
}

impl std::fmt::Debug for Ability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ability")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("arguments", &self.arguments)
            .finish_non_exhaustive()
    }
}

impl Ability {
    pub fn builder(name: impl Into<String>, description: impl Into<String>) -> AbilityBuilder {
        AbilityBuilder {
            name: name.into(),
            description: description.into(),
            arguments: Vec::new(),
            handler: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn arguments(&self) -> &[AbilityArgument] {
        &self.arguments
    }

    /// The schema sent to the model.
    pub fn to_definition(&self) -> ToolDefinition {
        let properties: Map<String, Value> = self
            .arguments
            .iter()
            .map(|arg| (arg.name.clone(), arg.to_schema()))
            .collect();
        let required: Vec<&str> = self
            .arguments
            .iter()
            .filter(|arg| arg.required)
            .map(|arg| arg.name.as_str())
            .collect();

        ToolDefinition {
            name: self.name.clone(),
            description: self.description.clone(),
            parameters: json!({
                "type": "object",
                "properties": properties,
                "required": required,
            }),
        }
    }

    /// Parse raw arguments text and bind it to the declared arguments.
    ///
    /// Like keyword binding: every required argument must be present and no
    /// undeclared argument is accepted.
    pub fn bind(&self, arguments_text: &str) -> Result<AbilityArgs, AbilityError> {
        let map: Map<String, Value> = if arguments_text.trim().is_empty() {
            Map::new()
        } else {
            serde_json::from_str(arguments_text)
                .map_err(|e| AbilityError::InvalidArguments(e.to_string()))?
        };

        if let Some(unexpected) = map
            .keys()
            .find(|key| !self.arguments.iter().any(|arg| &arg.name == *key))
        {
            return Err(AbilityError::UnexpectedArgument(unexpected.clone()));
        }

        if let Some(missing) = self
            .arguments
            .iter()
            .find(|arg| arg.required && !map.contains_key(&arg.name))
        {
            return Err(AbilityError::MissingArgument(missing.name.clone()));
        }

        Ok(AbilityArgs(map))
    }

    /// Bind and invoke.
    pub async fn call(&self, arguments_text: &str) -> Result<String, AbilityError> {
        let args = self.bind(arguments_text)?;
        self.handler.call(args).await
    }
}

/// Builder for [`Ability`]; `build` validates the declaration.
pub struct AbilityBuilder {
    name: String,
    description: String,
    arguments: Vec<AbilityArgument>,
    handler: Option<Arc<dyn AbilityHandler>>,
}

impl AbilityBuilder {
    pub fn argument(mut self, argument: AbilityArgument) -> Self {
        self.arguments.push(argument);
        self
    }

    pub fn handler(mut self, handler: impl AbilityHandler + 'static) -> Self {
        self.handler = Some(Arc::new(handler));
        self
    }

    pub fn handler_fn<F>(self, f: F) -> Self
    where
        F: Fn(AbilityArgs) -> Result<String, AbilityError> + Send + Sync + 'static,
    {
        self.handler(FnHandler(f))
    }

    pub fn build(self) -> Result<Ability, AbilityError> {
        let fail = |reason: &str| AbilityError::Definition {
            ability: self.name.clone(),
            reason: reason.to_string(),
        };

        if self.name.is_empty() {
            return Err(fail("name must not be empty"));
        }
        if self.name.len() > MAX_NAME_LEN {
            return Err(fail("name must be at most 64 characters"));
        }
        if !self
            .name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(fail("name may only contain letters, digits, '_' and '-'"));
        }
        if self.description.trim().is_empty() {
            return Err(fail("description must not be empty"));
        }
        for (i, arg) in self.arguments.iter().enumerate() {
            if arg.name.is_empty() {
                return Err(fail("argument names must not be empty"));
            }
            if self.arguments[..i].iter().any(|prev| prev.name == arg.name) {
                return Err(fail(&format!("argument '{}' is declared twice", arg.name)));
            }
        }
        let Some(handler) = self.handler.clone() else {
            return Err(fail("no handler was provided"));
        };

        Ok(Ability {
            name: self.name,
            description: self.description,
            arguments: self.arguments,
            handler,
        })
    }
}

/// The textual result of dispatching one tool call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbilityOutcome {
    /// The ability ran and returned text.
    Success(String),
    /// No ability is registered under this name.
    Unknown(String),
    /// Argument parsing, binding, or the handler failed.
    Failed(String),
}

impl AbilityOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// The tool-result message content.
    pub fn content(&self) -> String {
        match self {
            Self::Success(text) => text.clone(),
            Self::Unknown(name) => format!("Unknown ability: {name}"),
            Self::Failed(reason) => format!("Error: {reason}"),
        }
    }
}

/// Abilities by name, in registration order.
#[derive(Debug, Clone, Default)]
pub struct AbilityRegistry {
    abilities: Vec<Ability>,
}

impl AbilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an ability. Replaces, in place, any ability with the same name.
    pub fn register(&mut self, ability: Ability) {
        match self.abilities.iter_mut().find(|a| a.name == ability.name) {
            Some(existing) => *existing = ability,
            None => self.abilities.push(ability),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Ability> {
        self.abilities.iter().find(|a| a.name == name)
    }

    pub fn len(&self) -> usize {
        self.abilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.abilities.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.abilities.iter().map(|a| a.name.as_str()).collect()
    }

    /// Schemas for every registered ability, in registration order.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.abilities.iter().map(Ability::to_definition).collect()
    }

    /// Execute a call by name. Never fails: problems become diagnostic text.
    pub async fn execute(&self, name: &str, arguments_text: &str) -> AbilityOutcome {
        let Some(ability) = self.get(name) else {
            warn!(ability = %name, "Model called an unknown ability");
            return AbilityOutcome::Unknown(name.to_string());
        };

        let start = Instant::now();
        let outcome = match ability.call(arguments_text).await {
            Ok(text) => AbilityOutcome::Success(text),
            Err(e) => {
                warn!(ability = %name, error = %e, "Ability execution failed");
                AbilityOutcome::Failed(e.to_string())
            }
        };
        debug!(
            ability = %name,
            success = outcome.is_success(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Ability executed"
        );
        outcome
    }
}

impl FromIterator<Ability> for AbilityRegistry {
    fn from_iter<I: IntoIterator<Item = Ability>>(iter: I) -> Self {
        let mut registry = Self::new();
        for ability in iter {
            registry.register(ability);
        }
        registry
    }
}

//! The collaborator trait boundary: the external generative text model.
//!
//! The pipeline never talks to a provider directly. Everything network-shaped
//! sits behind [`GenerativeModel`], passed in explicitly by the caller, so the
//! refiner can be driven by a real provider in production and by
//! [`MockGenerativeModel`] in tests. Authentication, rate limits, and model
//! selection are the implementor's concern.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::error::{Error, Result};
use crate::schema::Schema;

/// A generative text model that accepts a natural-language instruction plus an
/// optional schema constraint and returns freeform text (ideally JSON text).
///
/// Implementors provide `_generate`; callers go through [`generate`]
/// (`GenerativeModel::generate`), which wraps it.
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    /// Produce a text response for the instruction.
    ///
    /// When `schema_hint` is given, implementations that support constrained
    /// decoding should ask the service for a response conforming to it; others
    /// may ignore the hint — the refiner validates the response either way.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Collaborator`] when the service call fails. A timeout
    /// is reported the same way; the refiner treats both as one consumed
    /// attempt.
    async fn _generate(&self, instruction: &str, schema_hint: Option<&Schema>) -> Result<String>;

    /// Identifier of the underlying model/provider, for logging.
    fn model_type(&self) -> &str;

    /// Public interface to produce a text response for the instruction.
    async fn generate(&self, instruction: &str, schema_hint: Option<&Schema>) -> Result<String> {
        self._generate(instruction, schema_hint).await
    }
}

/// Scripted response for [`MockGenerativeModel`].
#[derive(Debug, Clone)]
enum Scripted {
    Text(String),
    Failure(String),
}

/// Handler function type for dynamic mock responses.
pub type MockModelHandler = Arc<dyn Fn(&str) -> Result<String> + Send + Sync>;

/// A configurable mock collaborator for testing.
///
/// Responses can be scripted as a queue (consumed in call order) or computed
/// by a handler inspecting the instruction. Every call is recorded, so tests
/// can assert attempt counts and instruction content.
///
/// # Example
///
/// ```
/// use refinery::model::MockGenerativeModel;
///
/// // Fails twice, then succeeds.
/// let model = MockGenerativeModel::new()
///     .with_failure("quota exceeded")
///     .with_failure("quota exceeded")
///     .with_response(r#"{"x":"ok"}"#);
/// ```
#[derive(Clone)]
pub struct MockGenerativeModel {
    /// Scripted responses, consumed front to back
    script: Arc<Mutex<VecDeque<Scripted>>>,
    /// Handler for dynamic responses (used when the script is empty)
    handler: Option<MockModelHandler>,
    /// Fixed response when neither script nor handler applies
    fixed_response: String,
    /// Instructions received, in call order
    instructions: Arc<Mutex<Vec<String>>>,
    /// Schema hints received, in call order
    schema_hints: Arc<Mutex<Vec<Option<Schema>>>>,
}

impl std::fmt::Debug for MockGenerativeModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockGenerativeModel")
            .field("call_count", &self.call_count())
            .finish()
    }
}

impl MockGenerativeModel {
    /// Create a new mock with no scripted responses.
    #[must_use]
    pub fn new() -> Self {
        Self {
            script: Arc::new(Mutex::new(VecDeque::new())),
            handler: None,
            fixed_response: "{}".to_string(),
            instructions: Arc::new(Mutex::new(Vec::new())),
            schema_hints: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Queue a successful response.
    #[must_use]
    pub fn with_response(self, text: impl Into<String>) -> Self {
        self.script
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push_back(Scripted::Text(text.into()));
        self
    }

    /// Queue a collaborator failure.
    #[must_use]
    pub fn with_failure(self, message: impl Into<String>) -> Self {
        self.script
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push_back(Scripted::Failure(message.into()));
        self
    }

    /// Set a handler for dynamic responses, used when the script is empty.
    #[must_use]
    pub fn with_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&str) -> Result<String> + Send + Sync + 'static,
    {
        self.handler = Some(Arc::new(handler));
        self
    }

    /// Set the fixed response used when neither script nor handler applies.
    #[must_use]
    pub fn with_fixed_response(mut self, text: impl Into<String>) -> Self {
        self.fixed_response = text.into();
        self
    }

    /// Number of calls received so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.instructions
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    /// Instructions received, in call order.
    #[must_use]
    pub fn instructions(&self) -> Vec<String> {
        self.instructions
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// Schema hints received, in call order.
    #[must_use]
    pub fn schema_hints(&self) -> Vec<Option<Schema>> {
        self.schema_hints
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// Whether any received instruction contains `needle`.
    #[must_use]
    pub fn was_called_with(&self, needle: &str) -> bool {
        self.instructions().iter().any(|i| i.contains(needle))
    }
}

impl Default for MockGenerativeModel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GenerativeModel for MockGenerativeModel {
    async fn _generate(&self, instruction: &str, schema_hint: Option<&Schema>) -> Result<String> {
        self.instructions
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(instruction.to_string());
        self.schema_hints
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(schema_hint.cloned());

        let scripted = self
            .script
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .pop_front();
        match scripted {
            Some(Scripted::Text(text)) => Ok(text),
            Some(Scripted::Failure(message)) => Err(Error::collaborator(message)),
            None => match &self.handler {
                Some(handler) => handler(instruction),
                None => Ok(self.fixed_response.clone()),
            },
        }
    }

    fn model_type(&self) -> &str {
        "mock"
    }
}

//! The refiner: one (text, schema) pair to one schema-conformant JSON value.
//!
//! Per attempt: build the conversion instruction, invoke the collaborator
//! with the schema as a constraint hint, strip any markdown fence from the
//! response, and deserialize it as JSON. Collaborator failures and invalid
//! JSON both consume one attempt. Once the budget is spent the call fails
//! with the terminal [`Error::RefinementExhausted`] — never a silent null.
//!
//! This is the only component in the pipeline that performs network I/O or
//! sleeps.

use serde_json::Value;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::model::GenerativeModel;
use crate::normalize::strip_code_fence;
use crate::prompts::conversion_instruction;
use crate::retry::{with_retry, RetryPolicy};
use crate::schema::Schema;

/// Converts one text fragment into a schema-conformant value via the
/// collaborator, with bounded fixed-delay retries.
///
/// # Example
///
/// ```
/// use refinery::{MockGenerativeModel, Refiner, Schema};
/// use std::sync::Arc;
///
/// # async fn example() -> refinery::Result<()> {
/// let model = MockGenerativeModel::new().with_response(r#"{"x":"ok"}"#);
/// let refiner = Refiner::new(Arc::new(model));
///
/// let schema = Schema::object(vec![("x".to_string(), Schema::string())])?;
/// let value = refiner.refine("the value of x is ok", &schema).await?;
/// assert_eq!(value["x"], "ok");
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Refiner {
    model: Arc<dyn GenerativeModel>,
    policy: RetryPolicy,
}

impl Refiner {
    /// Create a refiner with the default retry policy (3 attempts, 500 ms
    /// fixed delay).
    #[must_use]
    pub fn new(model: Arc<dyn GenerativeModel>) -> Self {
        Self {
            model,
            policy: RetryPolicy::default(),
        }
    }

    /// Set the retry policy.
    #[must_use]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// The configured retry policy.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Convert `text` into a JSON value conforming to `schema`.
    ///
    /// The same instruction is reused unchanged on every attempt.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RefinementExhausted`] once every attempt in the retry
    /// budget has failed.
    pub async fn refine(&self, text: &str, schema: &Schema) -> Result<Value> {
        let instruction = conversion_instruction(text, schema);
        let attempts = self.policy.max_attempts.max(1);

        let model = &self.model;
        let instruction_ref = &instruction;
        with_retry(&self.policy, move || async move {
            Self::attempt(model, instruction_ref, schema).await
        })
        .await
        .map_err(|error| self.wrap_exhausted(attempts, error))
    }

    /// Convert the whole `text` against a one-property wrapper schema around
    /// `property` and extract that property's value.
    ///
    /// The key-presence check runs inside the retry loop: a response that
    /// parses but lacks the requested key consumes one attempt, the same as
    /// any other deserialization failure.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RefinementExhausted`] once every attempt in the retry
    /// budget has failed.
    pub async fn refine_property(
        &self,
        text: &str,
        name: &str,
        property: &Schema,
    ) -> Result<Value> {
        let wrapper = Schema::wrap_property(name, property);
        let instruction = conversion_instruction(text, &wrapper);
        let attempts = self.policy.max_attempts.max(1);

        let model = &self.model;
        let instruction_ref = &instruction;
        let wrapper_ref = &wrapper;
        with_retry(&self.policy, move || async move {
            let mut refined = Self::attempt(model, instruction_ref, wrapper_ref).await?;
            match refined.get_mut(name) {
                Some(value) => Ok(value.take()),
                None => Err(Error::deserialization(format!(
                    "refined object is missing property '{name}'"
                ))),
            }
        })
        .await
        .map_err(|error| self.wrap_exhausted(attempts, error))
    }

    /// One attempt: invoke the collaborator, normalize, parse.
    async fn attempt(
        model: &Arc<dyn GenerativeModel>,
        instruction: &str,
        schema: &Schema,
    ) -> Result<Value> {
        let response = model.generate(instruction, Some(schema)).await?;
        let payload = strip_code_fence(&response);
        serde_json::from_str::<Value>(payload.trim()).map_err(|e| {
            Error::deserialization(format!("collaborator returned invalid JSON: {e}"))
        })
    }

    /// A non-retryable failure aborted the loop early and surfaces as-is;
    /// only a spent budget becomes the terminal kind.
    fn wrap_exhausted(&self, attempts: usize, error: Error) -> Error {
        if !error.retryable() {
            return error;
        }
        tracing::warn!(
            attempts,
            model = self.model.model_type(),
            %error,
            "refinement exhausted"
        );
        Error::RefinementExhausted {
            attempts,
            last_error: error.to_string(),
        }
    }
}

impl std::fmt::Debug for Refiner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Refiner")
            .field("model", &self.model.model_type())
            .field("policy", &self.policy)
            .finish()
    }
}

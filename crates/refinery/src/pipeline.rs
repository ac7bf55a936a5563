//! The pipeline entry point: schema walking, segmentation fan-out, and
//! result assembly.
//!
//! [`Refinery`] walks the root schema property by property. A property whose
//! type is `ARRAY` of `OBJECT` is segmented into atoms with its configured
//! anchor keyword and refined one atom at a time; every other property is
//! wrapped into a minimal one-property object schema and refined once against
//! the full raw text. Properties (and atoms within a property) resolve
//! concurrently, but the assembled object always carries the root schema's
//! keys in declaration order.
//!
//! A single atom's terminal failure fails the whole request: a partial array
//! with missing entries is data corruption, not acceptable degradation.

use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::model::GenerativeModel;
use crate::normalize::strip_code_fence;
use crate::refiner::Refiner;
use crate::retry::RetryPolicy;
use crate::schema::Schema;
use crate::sieve::SegmentSieve;

/// Static mapping from array-of-object property name to the anchor keyword
/// used to segment that property's raw text.
///
/// This is external configuration, not inferred from the text: the anchor is
/// whatever label the content-generation prompt asked the model to repeat
/// before each entity instance.
///
/// # Example
///
/// ```
/// use refinery::pipeline::AnchorConfig;
///
/// let anchors = AnchorConfig::new()
///     .with_anchor("personas", "페르소나")
///     .with_anchor("keywords", "키워드");
///
/// assert_eq!(anchors.anchor_for("personas"), Some("페르소나"));
/// assert_eq!(anchors.anchor_for("summary"), None);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnchorConfig {
    anchors: HashMap<String, String>,
}

impl AnchorConfig {
    /// An empty mapping.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an anchor keyword for a property.
    #[must_use]
    pub fn with_anchor(mut self, property: impl Into<String>, keyword: impl Into<String>) -> Self {
        self.anchors.insert(property.into(), keyword.into());
        self
    }

    /// The anchor keyword configured for a property, if any.
    #[must_use]
    pub fn anchor_for(&self, property: &str) -> Option<&str> {
        self.anchors.get(property).map(String::as_str)
    }

    /// Number of configured anchors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.anchors.len()
    }

    /// Whether no anchors are configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }
}

impl FromIterator<(String, String)> for AnchorConfig {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            anchors: iter.into_iter().collect(),
        }
    }
}

/// The schema-guided text-to-structured-data pipeline.
///
/// Takes one freeform model response plus a schema and deterministically
/// produces a value conforming to that schema, or a definitive failure. Every
/// request is resolved independently from the inputs supplied to it; there is
/// no cache and no cross-request state.
///
/// # Example
///
/// ```
/// use refinery::{AnchorConfig, MockGenerativeModel, Refinery, Schema};
/// use std::sync::Arc;
///
/// # async fn example() -> refinery::Result<()> {
/// let model = MockGenerativeModel::new()
///     .with_response(r#"{"name":"Alice"}"#)
///     .with_response(r#"{"name":"Bob"}"#);
///
/// let refinery = Refinery::new(Arc::new(model))
///     .with_anchor("personas", "페르소나");
///
/// let schema = Schema::object(vec![(
///     "personas".to_string(),
///     Schema::array(Schema::object(vec![("name".to_string(), Schema::string())])?),
/// )])?;
///
/// let result = refinery.refine("페르소나1: Alice\n페르소나2: Bob", &schema).await?;
/// assert_eq!(result["personas"][0]["name"], "Alice");
/// # Ok(())
/// # }
/// ```
pub struct Refinery {
    model: Arc<dyn GenerativeModel>,
    anchors: AnchorConfig,
    policy: RetryPolicy,
}

impl Refinery {
    /// Create a pipeline over the given collaborator with no anchors
    /// configured and the default retry policy.
    #[must_use]
    pub fn new(model: Arc<dyn GenerativeModel>) -> Self {
        Self {
            model,
            anchors: AnchorConfig::new(),
            policy: RetryPolicy::default(),
        }
    }

    /// Add an anchor keyword for an array-of-object property.
    #[must_use]
    pub fn with_anchor(mut self, property: impl Into<String>, keyword: impl Into<String>) -> Self {
        self.anchors = self.anchors.with_anchor(property, keyword);
        self
    }

    /// Replace the whole anchor configuration.
    #[must_use]
    pub fn with_anchors(mut self, anchors: AnchorConfig) -> Self {
        self.anchors = anchors;
        self
    }

    /// Set the retry policy used by every refiner call.
    #[must_use]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Refine one raw model response into a value conforming to `schema`.
    ///
    /// For an object schema the result carries exactly the declared
    /// properties, in declaration order. For a bare terminal or array root
    /// the single refined value is returned unwrapped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RefinementExhausted`] when any refiner call spends
    /// its whole retry budget; no partial result is returned in that case.
    pub async fn refine(&self, raw_text: &str, schema: &Schema) -> Result<Value> {
        let text = strip_code_fence(raw_text);
        let refiner = Refiner::new(Arc::clone(&self.model)).with_retry_policy(self.policy);

        // Bare terminal/array at the root: one whole-text call, unwrapped.
        if !schema.is_object() {
            return refiner.refine(&text, schema).await;
        }

        let resolutions = schema
            .properties()
            .iter()
            .map(|(name, property)| self.resolve_property(&refiner, &text, name, property));
        let values = try_join_all(resolutions).await?;

        let mut object = Map::with_capacity(values.len());
        for ((name, _), value) in schema.properties().iter().zip(values) {
            object.insert(name.clone(), value);
        }
        tracing::debug!(properties = object.len(), "assembled refined object");
        Ok(Value::Object(object))
    }

    async fn resolve_property(
        &self,
        refiner: &Refiner,
        text: &str,
        name: &str,
        property: &Schema,
    ) -> Result<Value> {
        if property.is_array_of_objects() {
            self.resolve_segmented(refiner, text, name, property).await
        } else {
            self.resolve_singular(refiner, text, name, property).await
        }
    }

    /// Array-of-object property: segment, then refine one atom at a time.
    async fn resolve_segmented(
        &self,
        refiner: &Refiner,
        text: &str,
        name: &str,
        property: &Schema,
    ) -> Result<Value> {
        let atoms = match self.anchors.anchor_for(name) {
            Some(keyword) => SegmentSieve::new(keyword)?.split(text),
            None => {
                tracing::debug!(property = name, "no anchor keyword configured");
                Vec::new()
            }
        };

        // Zero atoms is a legitimate outcome: fall back to exactly one
        // whole-text refinement against the full array schema.
        if atoms.is_empty() {
            tracing::debug!(property = name, "refining whole text against array schema");
            return refiner.refine(text, property).await;
        }

        let items = property.items().ok_or_else(|| {
            Error::invalid_input(format!("array property '{name}' has no items schema"))
        })?;

        tracing::debug!(property = name, atoms = atoms.len(), "refining atoms");
        let refinements = atoms.iter().map(|atom| refiner.refine(atom, items));
        let values = try_join_all(refinements).await?;
        Ok(Value::Array(values))
    }

    /// Scalar/singular property: the refiner wraps it into a one-property
    /// object schema, refines the whole text, and extracts the key inside
    /// its retry loop.
    async fn resolve_singular(
        &self,
        refiner: &Refiner,
        text: &str,
        name: &str,
        property: &Schema,
    ) -> Result<Value> {
        refiner.refine_property(text, name, property).await
    }
}

impl std::fmt::Debug for Refinery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Refinery")
            .field("model", &self.model.model_type())
            .field("anchors", &self.anchors)
            .field("policy", &self.policy)
            .finish()
    }
}

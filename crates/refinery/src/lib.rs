//! Schema-guided refinement of freeform model output into structured data.
//!
//! A generative model asked for prose plus structure rarely returns clean
//! JSON: it wraps the payload in markdown fences, interleaves entities with
//! commentary, or drops fields. This crate turns one such freeform response
//! into a value conforming to a caller-supplied schema, deterministically or
//! not at all:
//!
//! - [`normalize`] strips markdown code fences from raw text.
//! - [`sieve`] splits text into per-entity atoms at anchor-keyword boundaries
//!   (`페르소나1:`, `Persona 2.`, ...).
//! - [`schema`] describes the desired output shape as a recursive tree of
//!   typed nodes with ordered properties.
//! - [`refiner`] converts one (text, schema) pair into a JSON value through
//!   the collaborator model, with bounded fixed-delay retries.
//! - [`pipeline`] walks the schema property by property, fans atoms out to
//!   the refiner, and assembles the result in declaration order.
//!
//! The external model sits behind the [`GenerativeModel`] trait; production
//! code plugs in a provider crate, tests use [`MockGenerativeModel`].
//!
//! # Example
//!
//! ```
//! use refinery::{MockGenerativeModel, Refinery, Schema};
//! use std::sync::Arc;
//!
//! # async fn example() -> refinery::Result<()> {
//! let model = MockGenerativeModel::new()
//!     .with_response(r#"{"name":"Alice"}"#)
//!     .with_response(r#"{"name":"Bob"}"#);
//!
//! let refinery = Refinery::new(Arc::new(model)).with_anchor("personas", "페르소나");
//!
//! let schema = Schema::object(vec![(
//!     "personas".to_string(),
//!     Schema::array(Schema::object(vec![("name".to_string(), Schema::string())])?),
//! )])?;
//!
//! let value = refinery
//!     .refine("페르소나1: Alice the baker\n페르소나2: Bob the dispatcher", &schema)
//!     .await?;
//! assert_eq!(value["personas"][1]["name"], "Bob");
//! # Ok(())
//! # }
//! ```
//!
//! Every request is stateless: no cache, no cross-request mutation. A single
//! terminal failure anywhere in the walk fails the whole request rather than
//! returning a partially-populated value.

pub mod error;
pub mod model;
pub mod normalize;
pub mod pipeline;
pub mod prompts;
pub mod refiner;
pub mod retry;
pub mod schema;
pub mod sieve;

pub use error::{Error, Result};
pub use model::{GenerativeModel, MockGenerativeModel};
pub use pipeline::{AnchorConfig, Refinery};
pub use refiner::Refiner;
pub use retry::RetryPolicy;
pub use schema::{Schema, SchemaType};
pub use sieve::SegmentSieve;

/// Convenience re-exports for callers that want everything at once.
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::model::{GenerativeModel, MockGenerativeModel};
    pub use crate::pipeline::{AnchorConfig, Refinery};
    pub use crate::refiner::Refiner;
    pub use crate::retry::RetryPolicy;
    pub use crate::schema::{Schema, SchemaType};
    pub use crate::sieve::SegmentSieve;
}

//! Vertex models: Entity, AssertionRecord, PropertyValue, ChangeEvent,
//! ImportRun, Source, and the batch type the gateway applies atomically.

mod assertion;
mod batch;
mod entity;
mod event;
mod import;
mod source;
mod value;

pub use assertion::{AssertionRecord, SourceRef, SourceType};
pub use batch::{ImportBatch, NewAssertion, ObjectRef};
pub use entity::Entity;
pub use event::{Actor, ChangeEvent, ChangeEventType, EventStats};
pub use import::{ImportRun, ImportStatus};
pub use source::Source;
pub use value::{PropertyValue, ValueType};

/// Confidence in an assertion, clamped to `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct Confidence(f64);

impl Confidence {
    pub fn new(value: f64) -> Self {
        Self(value.clamp(0.0, 1.0))
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}

impl Default for Confidence {
    fn default() -> Self {
        Self(1.0)
    }
}

//! # lattice-ingest
//!
//! The ingestion pipeline: a tabular source plus a mapping spec in, a set
//! of opened/closed assertions bound into one ChangeEvent out. Also the
//! manual-edit path, which shares the same visibility machinery.

pub mod hash;
pub mod manual;
pub mod orchestrator;
pub mod stage;
pub mod workbook;

pub use manual::{ManualAssertionRequest, ManualTarget};
pub use orchestrator::{ImportOptions, ImportOutcome, IngestEngine};
pub use stage::{EntityCandidate, PropertyCandidate, RelationshipCandidate, StagedRow};
pub use workbook::{CellValue, Sheet, Workbook};

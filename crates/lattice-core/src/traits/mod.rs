//! Seams between the core and its collaborators.

mod gateway;

pub use gateway::{EntityFilter, GraphGateway};

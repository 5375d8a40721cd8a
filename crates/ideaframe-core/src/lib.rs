#![allow(async_fn_in_trait)]

//! Domain model and business rules for IdeaFrame initiatives: weighted
//! scoring, tri-state PATCH fields, vote aggregation, the update state
//! machine, list queries and request deadlines.

pub mod comment;
pub mod deadline;
pub mod error;
pub mod initiative;
pub mod query;
pub mod scoring;
pub mod service;
pub mod store;
pub mod tristate;
pub mod user;
pub mod vote;

pub use error::{Error, Result};
pub use service::InitiativeService;
pub use store::IdeaStore;

//! Data models for the question bank.
//!
//! These models match the frontend TypeScript interfaces for seamless interoperability.

mod datastore;
mod linked_question;
mod pending_change;
mod question;
mod syllabus;

pub use datastore::*;
pub use linked_question::*;
pub use pending_change::*;
pub use question::*;
pub use syllabus::*;

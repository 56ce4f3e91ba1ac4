//! The deep research pipeline
//!
//! For one query the stages run strictly in sequence, with concurrency only
//! inside the search stage:
//!
//! ```text
//! query
//!   │
//!   ▼
//! planner   → a fixed-size set of web searches with reasoning
//!   │
//!   ▼
//! searches  → full fan-out, results collected as they complete,
//!   │          individual failures swallowed
//!   ▼
//! writer    → structured markdown report with follow-ups
//!   │
//!   ▼
//! email     → the report handed to a tool-calling agent that sends it
//! ```
//!
//! [`manager::ResearchManager`] sequences the stages and streams one status
//! event per completed stage plus a final event carrying the report body.
pub mod email;
pub mod manager;
pub mod planner;
pub mod search;
pub mod writer;

pub use manager::ResearchManager;
pub use planner::{SearchItem, SearchPlan};
pub use writer::Report;

//! Parse engine.
//!
//! This module is the public entry point for the two-stage engine: plugin
//! dispatch collects candidate tag events, and the resolver reconciles them
//! into one consistent, well-nested tag list under the schema's rules.
//!
//! ## How the parts work together
//!
//! ```text
//! schema ──┐
//!          │  Engine::new            (parser.rs: builds the recognizer registry)
//!          └──────────┬─────────────
//!                     │
//! text ── dispatch ───┼─ run plugin patterns, invoke recognizers (dispatch.rs)
//!                     │
//!                     ▼
//!             Resolver (parser.rs)
//!               - normalize + sort candidates
//!               - enforce schema rules, repair nesting
//!               - filter attributes, absorb whitespace
//!                     │
//!                     ▼
//!             Parsed { tags, log } ── serializer::Emitter ──► output tree
//! ```
//!
//! ## Responsibilities by module
//!
//! - `dispatch.rs`: pattern matching with offsets, match budgets, recognizer
//!   invocation, event normalization (suffix/plugin stamping).
//! - `parser.rs`: the resolution loop and all per-parse state.
//! - `log.rs`: the structured parse log callers inspect after a parse.
//!
//! ## Concurrency
//!
//! An [`Engine`] is immutable after construction and can be shared freely;
//! every call to [`Engine::parse`] owns its state. There is no I/O and no
//! blocking inside a parse.

mod dispatch;
mod log;
mod parser;

#[cfg(test)]
mod tests;

pub use dispatch::EngineError;
pub use log::{LogEntry, ParseLog, Severity};
pub use parser::{Engine, Parsed};

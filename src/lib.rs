// Only allow lints that are either transitive-dependency noise or
// genuinely opinionated style choices that don't indicate real issues.
#![allow(
    // Transitive dependency version mismatches we can't control
    clippy::multiple_crate_versions,
    // module_name_repetitions is pure style preference (e.g. osc::OscClient)
    clippy::module_name_repetitions
)]

//! # sclink
//!
//! Send SuperCollider code from any editor to a running `sclang`.
//!
//! sclink is meant to be bound to editor keys:
//! - Evaluate the selection, the enclosing `( ... )` block, or the line
//! - Evaluate a whole file, optionally on every save
//! - Boot, quit, and silence the default server
//! - Look up class help
//! - Bridge a stdio language client to the LanguageServer quark
//!
//! ## Modules
//!
//! - [`block`]: Enclosing-block detection
//! - [`document`]: Document text and cursor geometry
//! - [`eval`]: Choosing the code to send
//! - [`osc`]: OSC codec and UDP client
//! - [`sclang`]: sclang child processes
//! - [`help`]: Class help lookup
//! - [`lsp`]: Language server bridge
//! - [`session`]: Application context and commands
//! - [`config`]: Flag-file configuration
//! - [`watcher`]: File watching

pub mod block;
pub mod config;
pub mod document;
pub mod eval;
pub mod flash;
pub mod help;
pub mod lsp;
pub mod osc;
pub mod sclang;
pub mod session;
pub mod status;
pub mod watcher;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::block::{Span, locate};
    pub use crate::document::{Document, Position, Range, TextSource};
    pub use crate::eval::{EvalTarget, TargetKind};
    pub use crate::session::{Session, SessionError};
}

//! Snare - a security-rules compiler front-end.
//!
//! This is the main library crate that re-exports functionality from the various
//! component crates in the workspace.

// Re-export the rules core
pub use snare_rules as rules;

// Re-export other major components
pub use snare_ast as ast;
pub use snare_utils as utils;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

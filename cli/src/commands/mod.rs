//! Subcommand implementations.

pub mod ci;
pub mod compare;
pub mod completions;
pub mod diff;

pub use ci::run_ci;
pub use compare::run_compare;
pub use completions::generate_completions;
pub use diff::run_diff;

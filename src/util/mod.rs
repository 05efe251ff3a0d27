//! Small shared pieces: verbosity handling.

pub mod verbosity;

pub use verbosity::{verbosity, verbosity_at_least, Verbosity};

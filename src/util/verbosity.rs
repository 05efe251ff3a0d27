//! User-facing verbosity, read once from the `EVA_VERBOSITY` environment
//! variable.
//!
//! Pass-level diagnostics go through the [`log`] facade; this setting only
//! gates the human-readable reports the compiler prints on standard output
//! (such as the selected encryption parameters). Accepted values are
//! `silent`, `info`, `debug`, `trace` (case-insensitive) or an integer
//! `0..=3`; anything else falls back to silent with a note on stderr.

use lazy_static::lazy_static;

/// How chatty the compiler is on standard output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verbosity {
    /// No output.
    Silent = 0,
    /// Summaries, like the selected encryption parameters.
    Info = 1,
    /// Pass-by-pass progress.
    Debug = 2,
    /// Per-term detail.
    Trace = 3,
}

impl Verbosity {
    fn from_int(i: u32) -> Verbosity {
        match i {
            0 => Verbosity::Silent,
            1 => Verbosity::Info,
            2 => Verbosity::Debug,
            _ => Verbosity::Trace,
        }
    }
}

fn parse_env() -> Verbosity {
    match std::env::var("EVA_VERBOSITY") {
        Ok(value) => {
            if let Ok(i) = value.parse::<u32>() {
                return Verbosity::from_int(i);
            }
            match value.to_lowercase().as_str() {
                "silent" => Verbosity::Silent,
                "info" => Verbosity::Info,
                "debug" => Verbosity::Debug,
                "trace" => Verbosity::Trace,
                _ => {
                    eprintln!(
                        "Invalid verbosity EVA_VERBOSITY={} Defaulting to silent.",
                        value
                    );
                    Verbosity::Silent
                }
            }
        }
        Err(_) => Verbosity::Silent,
    }
}

lazy_static! {
    static ref VERBOSITY: Verbosity = parse_env();
}

/// The verbosity selected through the environment.
pub fn verbosity() -> Verbosity {
    *VERBOSITY
}

/// Whether the selected verbosity is at least `v`.
pub fn verbosity_at_least(v: Verbosity) -> bool {
    verbosity() >= v
}

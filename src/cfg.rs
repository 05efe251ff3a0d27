//! Compiler configuration.
//!
//! Options can be set programmatically on [`CkksConfig`] or parsed from
//! string pairs with [`CkksConfig::from_options`]. Unknown options and
//! malformed values for the warning-class options are reported and skipped;
//! malformed values for `security_level` and `quantum_safe` are errors, since
//! silently falling back would weaken the parameters the user asked for.

use crate::error::{Error, Result};
use log::warn;
use std::fmt::{self, Display, Formatter};

/// Help text listing the recognized options.
pub const OPTIONS_HELP: &str = "\
balance_reductions - Balance trees of mul, add or sub operations. bool (default=true)
rescaler           - Rescaling policy. One of: lazy_waterline (default), eager_waterline, always, minimum
lazy_relinearize   - Relinearize as late as possible. bool (default=true)
security_level     - How many bits of security parameters should be selected for. int (default=128)
quantum_safe       - Select quantum safe parameters. bool (default=false)
warn_vec_size      - Warn about possibly inefficient vector size selection. bool (default=true)";

/// The rescaling policy to use.
///
/// The waterline policies handle all programs; `Always` and `Minimum` are
/// kept for their lower rescale counts on the programs they do handle, and
/// reject the rest at validation time.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum RescalerPolicy {
    /// Delay rescaling until a multiplication, output or shared use forces it.
    LazyWaterline,
    /// Rescale greedily down to the waterline after every multiplication.
    EagerWaterline,
    /// Rescale after every multiplication, all the way to the waterline.
    Always,
    /// Rescale operands before multiplication when that provably saves a
    /// level.
    Minimum,
}

impl Display for RescalerPolicy {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let name = match self {
            RescalerPolicy::LazyWaterline => "lazy_waterline",
            RescalerPolicy::EagerWaterline => "eager_waterline",
            RescalerPolicy::Always => "always",
            RescalerPolicy::Minimum => "minimum",
        };
        write!(f, "{}", name)
    }
}

/// Controls the behavior of [`CkksCompiler`](crate::ckks::CkksCompiler).
#[derive(Clone, Debug)]
pub struct CkksConfig {
    /// Run the reduction balancer.
    pub balance_reductions: bool,
    /// The rescaling policy.
    pub rescaler: RescalerPolicy,
    /// Use the lazy relinearization policy.
    pub lazy_relinearize: bool,
    /// Target security level in bits; 128, 192 and 256 are supported.
    pub security_level: u32,
    /// Select parameters from the post-quantum table.
    pub quantum_safe: bool,
    /// Warn about sub-optimal vector size selection.
    pub warn_vec_size: bool,
}

impl Default for CkksConfig {
    fn default() -> CkksConfig {
        CkksConfig {
            balance_reductions: true,
            rescaler: RescalerPolicy::LazyWaterline,
            lazy_relinearize: true,
            security_level: 128,
            quantum_safe: false,
            warn_vec_size: true,
        }
    }
}

fn parse_bool(option: &'static str, value: &str, target: &mut bool) {
    match value.parse::<bool>() {
        Ok(b) => *target = b,
        Err(_) => warn!(
            "Could not parse boolean in {}={}. Falling back to default.",
            option, value
        ),
    }
}

impl CkksConfig {
    /// Build a configuration from `(name, value)` string pairs.
    ///
    /// Option names are case-sensitive. Unrecognized names produce a warning
    /// and are otherwise ignored.
    pub fn from_options<'a>(
        options: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Result<CkksConfig> {
        let mut config = CkksConfig::default();
        for (option, value) in options {
            match option {
                "balance_reductions" => {
                    parse_bool("balance_reductions", value, &mut config.balance_reductions)
                }
                "rescaler" => match value {
                    "lazy_waterline" => config.rescaler = RescalerPolicy::LazyWaterline,
                    "eager_waterline" => config.rescaler = RescalerPolicy::EagerWaterline,
                    "always" => config.rescaler = RescalerPolicy::Always,
                    "minimum" => config.rescaler = RescalerPolicy::Minimum,
                    _ => warn!(
                        "Unknown value rescaler={}. Available rescalers are lazy_waterline, \
                         eager_waterline, always, minimum. Falling back to default.",
                        value
                    ),
                },
                "lazy_relinearize" => {
                    parse_bool("lazy_relinearize", value, &mut config.lazy_relinearize)
                }
                "security_level" => {
                    config.security_level =
                        value.parse::<u32>().map_err(|_| Error::BadOptionValue {
                            kind: "unsigned int",
                            option: "security_level",
                            value: value.into(),
                        })?
                }
                "quantum_safe" => {
                    config.quantum_safe =
                        value.parse::<bool>().map_err(|_| Error::BadOptionValue {
                            kind: "boolean",
                            option: "quantum_safe",
                            value: value.into(),
                        })?
                }
                "warn_vec_size" => parse_bool("warn_vec_size", value, &mut config.warn_vec_size),
                _ => warn!(
                    "Unknown option {}. Available options are:\n{}",
                    option, OPTIONS_HELP
                ),
            }
        }
        Ok(config)
    }
}

impl Display for CkksConfig {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        writeln!(f, "  balance_reductions = {}", self.balance_reductions)?;
        writeln!(f, "  rescaler = {}", self.rescaler)?;
        writeln!(f, "  lazy_relinearize = {}", self.lazy_relinearize)?;
        writeln!(f, "  security_level = {}", self.security_level)?;
        writeln!(f, "  quantum_safe = {}", self.quantum_safe)?;
        write!(f, "  warn_vec_size = {}", self.warn_vec_size)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults() {
        let c = CkksConfig::default();
        assert!(c.balance_reductions);
        assert_eq!(c.rescaler, RescalerPolicy::LazyWaterline);
        assert!(c.lazy_relinearize);
        assert_eq!(c.security_level, 128);
        assert!(!c.quantum_safe);
        assert!(c.warn_vec_size);
    }

    #[test]
    fn parses_options() {
        let c = CkksConfig::from_options([
            ("rescaler", "eager_waterline"),
            ("lazy_relinearize", "false"),
            ("security_level", "192"),
            ("quantum_safe", "true"),
        ])
        .unwrap();
        assert_eq!(c.rescaler, RescalerPolicy::EagerWaterline);
        assert!(!c.lazy_relinearize);
        assert_eq!(c.security_level, 192);
        assert!(c.quantum_safe);
    }

    #[test]
    fn unknown_options_are_non_fatal() {
        let c = CkksConfig::from_options([("no_such_option", "1")]).unwrap();
        assert!(c.balance_reductions);
    }

    #[test]
    fn bad_warning_class_value_keeps_default() {
        let c = CkksConfig::from_options([("balance_reductions", "yes")]).unwrap();
        assert!(c.balance_reductions);
    }

    #[test]
    fn bad_security_level_is_an_error() {
        assert!(matches!(
            CkksConfig::from_options([("security_level", "high")]),
            Err(Error::BadOptionValue { .. })
        ));
        assert!(matches!(
            CkksConfig::from_options([("quantum_safe", "1")]),
            Err(Error::BadOptionValue { .. })
        ));
    }
}

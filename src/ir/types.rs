use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// The three-point type lattice terms live on.
///
/// Any Cipher operand makes the result Cipher; `Encode` always produces
/// Plain; everything built purely from Raw data stays Raw.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default, Serialize, Deserialize)]
pub enum Type {
    /// Not yet deduced.
    #[default]
    Undef,
    /// Encrypted.
    Cipher,
    /// An unencoded vector of reals.
    Raw,
    /// Encoded for the backend, but not encrypted.
    Plain,
}

impl Display for Type {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let name = match self {
            Type::Undef => "Undef",
            Type::Cipher => "Cipher",
            Type::Raw => "Raw",
            Type::Plain => "Plain",
        };
        write!(f, "{}", name)
    }
}

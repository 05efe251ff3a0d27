//! The input signature of a compiled program: how each input must be
//! prepared before execution.

use crate::ir::Type;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How one input must be encoded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodingInfo {
    /// Whether the input is a ciphertext, an encoded plaintext or raw data.
    pub input_type: Type,
    /// Scale in bits to encode at.
    pub scale: u32,
    /// Level to encode at.
    pub level: u32,
}

/// The public signature of a compiled program.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CkksSignature {
    /// The vector size every input must tile to.
    pub vec_size: u32,
    /// Per-input encoding requirements.
    pub inputs: BTreeMap<String, EncodingInfo>,
}

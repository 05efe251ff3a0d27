//! The CKKS-specific passes and the compilation pipeline: rescaling,
//! encoding insertion, relinearization, modulus switching, validation,
//! parameter and rotation-key selection, and backend lowering.

pub mod compiler;
pub mod encode_insert;
pub mod levels_check;
pub mod lowering;
pub mod mod_switch;
pub mod parameter_check;
pub mod parameters;
pub mod relinearize;
pub mod rescale;
pub mod rotation_keys;
pub mod scales_check;
pub mod signature;

pub use compiler::CkksCompiler;
pub use parameters::CkksParameters;
pub use signature::{CkksSignature, EncodingInfo};

//! `ckksc` is an optimizing compiler for programs that compute on vectors of
//! real numbers under the CKKS homomorphic encryption scheme.
//!
//! A computation is built as a [`Program`](ir::Program): a directed acyclic
//! graph of arithmetic terms. [`CkksCompiler`](ckks::CkksCompiler) rewrites
//! the graph so that it can be executed by a CKKS library (inserting rescale,
//! relinearize, modulus-switch and encode operations), derives the encryption
//! parameters the rewritten program needs, and describes how each input must
//! be encoded.
//!
//! The CKKS library itself is abstract: implement
//! [`CkksBackend`](backend::CkksBackend) for your library of choice and drive
//! compiled programs through [`Executor`](backend::Executor). The unencrypted
//! reference semantics are available through [`evaluate`](ir::eval::evaluate).

pub mod backend;
pub mod cfg;
pub mod ckks;
mod error;
pub mod ir;
pub mod opt;
pub mod serialize;
pub mod util;

pub use cfg::CkksConfig;
pub use ckks::CkksCompiler;
pub use error::{Error, Result};

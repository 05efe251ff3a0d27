//! The program intermediate representation: a directed acyclic graph of
//! arithmetic and scheme-level terms, owned by a [`Program`] arena, plus the
//! traversal driver and side tables the rewriting passes build on.

mod attributes;
mod constant_value;
pub mod eval;
mod ops;
mod program;
mod term_map;
mod traversal;
mod types;

pub use attributes::{Attribute, AttributeKey, AttributeList};
pub use constant_value::ConstantValue;
pub use ops::Op;
pub use program::{Program, TermData, TermId};
pub use term_map::{TermMap, TermMapOptional};
pub use traversal::{backward_pass, forward_pass};
pub use types::Type;

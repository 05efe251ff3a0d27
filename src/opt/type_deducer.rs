//! Assigns every term a [`Type`].
//!
//! The lattice rule: any Cipher operand makes the result Cipher; otherwise
//! the result is Raw. `Encode` always produces Plain, constants are Raw, and
//! other sources declare their type through an attribute. Rewriting passes
//! leave the map stale for the terms they insert, so this pass is re-run
//! between pipeline stages.

use crate::ir::{forward_pass, Op, Program, TermId, TermMap, Type};

fn deduce(program: &Program, types: &mut TermMap<Type>, term: TermId) {
    let data = program.term(term);
    if data.num_operands() > 0 {
        let mut inferred = Type::Raw;
        for &operand in data.operands() {
            if types[operand] == Type::Cipher {
                inferred = Type::Cipher;
            }
        }
        types[term] = if data.op() == Op::Encode {
            Type::Plain
        } else {
            inferred
        };
    } else if data.op() == Op::Constant {
        types[term] = Type::Raw;
    } else {
        types[term] = data
            .type_attribute()
            .unwrap_or_else(|| panic!("source {} has no declared type", term));
    }
}

/// Deduce a type for every term into `types`.
pub fn deduce_types(program: &mut Program, types: &mut TermMap<Type>) {
    forward_pass(program, |p, t| deduce(p, types, t));
}

//! Final rewrites that paper over backend gaps.
//!
//! CKKS libraries typically cannot subtract a ciphertext from a plaintext
//! directly, so `plain - cipher` is rewritten to `plain + negate(cipher)`.
//! Further gap-fillers slot in alongside this one.

use crate::ir::{Op, Program, TermMap, Type};

/// Rewrite operations the backend cannot execute directly.
pub fn lower_for_backend(program: &mut Program, types: &mut TermMap<Type>) {
    // A snapshot walk rather than a driver pass: rewrites here redirect the
    // uses of the visited term itself, which would strand the downstream of
    // the rewrite in a readiness-based traversal.
    for term in program.topological_order() {
        if !program.is_live(term) {
            continue;
        }
        let data = program.term(term);
        if data.op() != Op::Sub {
            continue;
        }
        let lhs = data.operands()[0];
        let rhs = data.operands()[1];
        if types[lhs] == Type::Cipher || types[rhs] != Type::Cipher {
            continue;
        }
        let negation = program.make_term(Op::Negate, &[rhs]);
        types[negation] = types[rhs];
        let addition = program.make_term(Op::Add, &[lhs, negation]);
        types[addition] = types[term];
        program.replace_all_uses_with(term, addition);
        program.erase_if_unused(term);
    }
}

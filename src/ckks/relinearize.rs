//! Relinearization insertion.
//!
//! Multiplying two ciphertexts raises the ciphertext degree; `Relinearize`
//! brings it back down. The eager policy pays the cost immediately after
//! every Cipher×Cipher multiplication; the lazy policy rides the raised
//! degree through single-use chains of additions and negations, inserting
//! the relinearization only where a multiplication, rotation, output or
//! shared use demands a canonical ciphertext.

use crate::ir::{forward_pass, Op, Program, TermId, TermMap, TermMapOptional, Type};

fn all_operands_encrypted(program: &Program, types: &TermMap<Type>, term: TermId) -> bool {
    program.term(term).operands().iter().all(|&o| {
        debug_assert_ne!(types[o], Type::Undef);
        types[o] == Type::Cipher
    })
}

fn is_encrypted_mul(program: &Program, types: &TermMap<Type>, term: TermId) -> bool {
    program.term(term).op() == Op::Mul && all_operands_encrypted(program, types, term)
}

fn insert_relin_node(
    program: &mut Program,
    types: &mut TermMap<Type>,
    scales: &mut TermMapOptional<u32>,
    term: TermId,
) {
    let node = program.make_term(Op::Relinearize, &[term]);
    types[node] = types[term];
    scales.set(node, scales[term]);
    program.replace_other_uses_with(term, node);
}

/// Insert a `Relinearize` directly after every Cipher×Cipher multiplication.
pub fn eager_relinearize(
    program: &mut Program,
    types: &mut TermMap<Type>,
    scales: &mut TermMapOptional<u32>,
) {
    forward_pass(program, |p, t| {
        if p.term(t).num_operands() == 0 {
            return;
        }
        if p.term(t).op() != Op::Mul || !all_operands_encrypted(p, types, t) {
            return;
        }
        insert_relin_node(p, types, scales, t);
    });
}

/// Insert `Relinearize` terms as late as their uses allow.
pub fn lazy_relinearize(
    program: &mut Program,
    types: &mut TermMap<Type>,
    scales: &mut TermMapOptional<u32>,
) {
    let mut pending: TermMap<bool> = TermMap::new();
    forward_pass(program, |p, t| {
        if p.term(t).num_operands() == 0 {
            return;
        }
        if is_encrypted_mul(p, types, t) {
            debug_assert!(!pending[t]);
            pending[t] = true;
        } else if !pending[t] {
            return;
        }

        let uses = p.term(t).uses().to_vec();
        assert!(!uses.is_empty(), "pending relinearization on a sink");
        let first_use = uses[0];
        let must_insert = uses.iter().any(|&u| {
            is_encrypted_mul(p, types, u)
                || p.term(u).op().is_rotation()
                || p.term(u).op() == Op::Output
                || u != first_use
        });

        if must_insert {
            insert_relin_node(p, types, scales, t);
        } else {
            for &u in &uses {
                pending[u] = true;
            }
        }
    });
}

//! The `always` policy: rescale straight to the waterline after every
//! multiplication.
//!
//! Simple and aggressive, but only sound when every input and constant sits
//! at the same scale; mismatched scales make its rescale amounts diverge
//! between paths, which the parameter checker later rejects.

use super::RescalerContext;
use crate::ir::{forward_pass, Op, Program, TermId, TermMap, TermMapOptional, Type};

fn visit(ctx: &mut RescalerContext, program: &mut Program, term: TermId) {
    if program.term(term).num_operands() == 0 {
        return;
    }
    if ctx.types[term] == Type::Raw {
        ctx.handle_raw_scale(program, term);
        return;
    }

    let op = program.term(term).op();
    if op == Op::Rescale {
        return;
    }

    if op != Op::Mul {
        let first = program.term(term).operands()[0];
        ctx.scales.set(term, ctx.scales[first]);
        if op.is_additive() {
            for &operand in program.term(term).operands() {
                debug_assert!(
                    ctx.scales[term] == ctx.scales[operand] || ctx.types[operand] == Type::Raw,
                    "always rescaler requires equal addition operand scales"
                );
            }
        }
        return;
    }

    let mult_scale = ctx.mult_scale(program, term);
    assert_ne!(mult_scale, 0);
    ctx.scales.set(term, mult_scale);
    ctx.insert_rescale(program, term, mult_scale - ctx.min_scale);
}

/// Run the `always` rescaling policy.
pub fn always_rescale(
    program: &mut Program,
    types: &mut TermMap<Type>,
    scales: &mut TermMapOptional<u32>,
) {
    let mut ctx = RescalerContext::new(program, types, scales);
    forward_pass(program, |p, t| visit(&mut ctx, p, t));
}

//! The `minimum` policy: produce as few rescales as possible.
//!
//! When a post-multiplication rescale is inevitable anyway, both operands
//! are rescaled *before* the multiplication instead, halving the scale
//! growth. Like `always`, this policy is not general; programs it cannot
//! handle fail parameter checking.

use super::{RescalerContext, FIXED_RESCALE};
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
        debug_assert_ne!(program.term(first).op(), Op::Constant);
        debug_assert_ne!(ctx.scales[first], 0);
        ctx.scales.set(term, ctx.scales[first]);
        if op.is_additive() {
            let max_scale = ctx.equalize_addition_operands(program, term);
            ctx.scales.set(term, max_scale);
        }
        return;
    }

    let operands = program.term(term).operands().to_vec();
    debug_assert_eq!(operands.len(), 2);
    let mult_scale = ctx.scales[operands[0]] + ctx.scales[operands[1]];
    assert_ne!(mult_scale, 0);
    ctx.scales.set(term, mult_scale);

    let min_of_scales = ctx.scales[operands[0]].min(ctx.scales[operands[1]]);
    let rescale_by = min_of_scales.saturating_sub(ctx.min_scale).min(FIXED_RESCALE);
    if 2 * rescale_by >= FIXED_RESCALE {
        // A rescale after this multiplication is inevitable; rescaling both
        // operands first keeps the product scale lower.
        ctx.insert_rescale_between(program, operands[0], term, rescale_by);
        if operands[0] != operands[1] {
            ctx.insert_rescale_between(program, operands[1], term, rescale_by);
        }
        ctx.scales.set(term, mult_scale - 2 * rescale_by);
    } else {
        let mut temp = term;
        let mut scale = mult_scale;
        while scale >= FIXED_RESCALE + ctx.min_scale {
            temp = ctx.insert_rescale(program, temp, FIXED_RESCALE);
            scale -= FIXED_RESCALE;
            debug_assert_eq!(scale, ctx.scales[temp]);
        }
    }
}

/// Run the `minimum` rescaling policy.
pub fn minimum_rescale(
    program: &mut Program,
    types: &mut TermMap<Type>,
    scales: &mut TermMapOptional<u32>,
) {
    let mut ctx = RescalerContext::new(program, types, scales);
    forward_pass(program, |p, t| visit(&mut ctx, p, t));
}

//! The `eager_waterline` policy: after each multiplication, rescale by fixed
//! steps while the scale stays a full step above the waterline.

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
        ctx.scales.set(term, ctx.scales[first]);
        if op.is_additive() {
            let max_scale = ctx.equalize_addition_operands(program, term);
            ctx.scales.set(term, max_scale);
        }
        return;
    }

    let mut mult_scale = ctx.mult_scale(program, term);
    assert_ne!(mult_scale, 0);
    ctx.scales.set(term, mult_scale);

    let mut temp = term;
    while mult_scale >= FIXED_RESCALE + ctx.min_scale {
        temp = ctx.insert_rescale(program, temp, FIXED_RESCALE);
        mult_scale -= FIXED_RESCALE;
        debug_assert_eq!(mult_scale, ctx.scales[temp]);
    }
}

/// Run the `eager_waterline` rescaling policy.
pub fn eager_waterline_rescale(
    program: &mut Program,
    types: &mut TermMap<Type>,
    scales: &mut TermMapOptional<u32>,
) {
    let mut ctx = RescalerContext::new(program, types, scales);
    forward_pass(program, |p, t| visit(&mut ctx, p, t));
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ckks::rescale::test_util::*;

    #[test]
    fn rescales_only_above_the_waterline() {
        // At scale 30, the product scale 60 stays below 60 + 30.
        let mut p = Program::new("p", 4).unwrap();
        let a = p.make_input("a", Type::Cipher);
        let b = p.make_input("b", Type::Cipher);
        let m = p.make_term(Op::Mul, &[a, b]);
        p.make_output("y", m);

        let mut scales = seed_scales(&mut p, 30);
        let mut types = typed(&mut p);
        eager_waterline_rescale(&mut p, &mut types, &mut scales);
        assert_eq!(count_ops(&p, Op::Rescale), 0);
        assert_eq!(scales[m], 60);
    }

    #[test]
    fn rescales_by_fixed_steps() {
        // At scale 60 the product reaches 120, one step above the waterline.
        let mut p = Program::new("p", 4).unwrap();
        let a = p.make_input("a", Type::Cipher);
        let b = p.make_input("b", Type::Cipher);
        let m = p.make_term(Op::Mul, &[a, b]);
        let y = p.make_output("y", m);

        let mut scales = seed_scales(&mut p, 60);
        let mut types = typed(&mut p);
        eager_waterline_rescale(&mut p, &mut types, &mut scales);

        assert_eq!(count_ops(&p, Op::Rescale), 1);
        let r = p.term(y).operands()[0];
        assert_eq!(p.term(r).op(), Op::Rescale);
        assert_eq!(p.term(r).rescale_divisor(), Some(FIXED_RESCALE));
        assert_eq!(scales[r], 60);
    }

    #[test]
    fn lifts_mismatched_addition_operand() {
        // y = a + b*c at scale 30: the product sits at 60, so `a` is lifted
        // by a unit-constant multiplication before the addition.
        let mut p = Program::new("p", 4).unwrap();
        let a = p.make_input("a", Type::Cipher);
        let b = p.make_input("b", Type::Cipher);
        let c = p.make_input("c", Type::Cipher);
        let m = p.make_term(Op::Mul, &[b, c]);
        let add = p.make_term(Op::Add, &[a, m]);
        p.make_output("y", add);

        let mut scales = seed_scales(&mut p, 30);
        let mut types = typed(&mut p);
        eager_waterline_rescale(&mut p, &mut types, &mut scales);

        let lifted = p.term(add).operands()[0];
        assert_ne!(lifted, a);
        assert_eq!(p.term(lifted).op(), Op::Mul);
        let unit = p.term(lifted).operands()[1];
        assert_eq!(p.term(unit).op(), Op::Constant);
        assert_eq!(p.term(unit).encode_at_scale(), Some(30));
        assert_eq!(scales[lifted], 60);
        assert_eq!(scales[add], 60);
    }
}

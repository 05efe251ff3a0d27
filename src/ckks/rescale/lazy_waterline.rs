//! The `lazy_waterline` policy: mark an over-waterline multiplication as
//! pending and push the mark through single-use chains of cheap operations;
//! the rescale chain is materialized only when a multiplication, an output
//! or a shared use forces it. Delaying keeps rescales off paths where later
//! additions would have had to lift operands back up.

use super::{RescalerContext, FIXED_RESCALE};
use crate::ir::{forward_pass, Op, Program, TermId, TermMap, TermMapOptional, Type};

struct LazyWaterlineRescaler {
    pending: TermMap<bool>,
}

impl LazyWaterlineRescaler {
    fn visit(&mut self, ctx: &mut RescalerContext, program: &mut Program, term: TermId) {
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
        } else if op == Op::Mul {
            debug_assert!(!self.pending[term]);
            let mult_scale = ctx.mult_scale(program, term);
            assert_ne!(mult_scale, 0);
            ctx.scales.set(term, mult_scale);

            if mult_scale >= FIXED_RESCALE + ctx.min_scale {
                self.pending[term] = true;
            } else {
                return;
            }
        } else {
            let first = program.term(term).operands()[0];
            ctx.scales.set(term, ctx.scales[first]);
            if op.is_additive() {
                let max_scale = ctx.equalize_addition_operands(program, term);
                ctx.scales.set(term, max_scale);
            }
            if !self.pending[term] {
                return;
            }
        }

        debug_assert!(self.pending[term]);
        let uses = program.term(term).uses().to_vec();
        assert!(!uses.is_empty(), "pending scale on a sink");
        let first_use = uses[0];
        let must_insert = uses.iter().any(|&u| {
            program.term(u).op() == Op::Mul || program.term(u).op() == Op::Output || u != first_use
        });

        if must_insert {
            self.pending[term] = false;
            ctx.insert_rescale_chain(program, term);
        } else {
            for &u in &uses {
                self.pending[u] = true;
            }
        }
    }
}

/// Run the `lazy_waterline` rescaling policy.
pub fn lazy_waterline_rescale(
    program: &mut Program,
    types: &mut TermMap<Type>,
    scales: &mut TermMapOptional<u32>,
) {
    let mut ctx = RescalerContext::new(program, types, scales);
    let mut rescaler = LazyWaterlineRescaler {
        pending: TermMap::new(),
    };
    forward_pass(program, |p, t| rescaler.visit(&mut ctx, p, t));
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ckks::rescale::test_util::*;

    #[test]
    fn below_waterline_products_are_left_alone() {
        let mut p = Program::new("p", 8).unwrap();
        let a = p.make_input("a", Type::Cipher);
        let b = p.make_input("b", Type::Cipher);
        let m = p.make_term(Op::Mul, &[a, b]);
        p.make_output("y", m);

        let mut scales = seed_scales(&mut p, 30);
        let mut types = typed(&mut p);
        lazy_waterline_rescale(&mut p, &mut types, &mut scales);
        assert_eq!(count_ops(&p, Op::Rescale), 0);
        assert_eq!(scales[m], 60);
    }

    #[test]
    fn output_use_forces_the_rescale() {
        let mut p = Program::new("p", 8).unwrap();
        let a = p.make_input("a", Type::Cipher);
        let b = p.make_input("b", Type::Cipher);
        let m = p.make_term(Op::Mul, &[a, b]);
        let y = p.make_output("y", m);

        let mut scales = seed_scales(&mut p, 60);
        let mut types = typed(&mut p);
        lazy_waterline_rescale(&mut p, &mut types, &mut scales);

        assert_eq!(count_ops(&p, Op::Rescale), 1);
        let r = p.term(y).operands()[0];
        assert_eq!(p.term(r).op(), Op::Rescale);
        assert_eq!(p.term(r).rescale_divisor(), Some(FIXED_RESCALE));
        assert_eq!(scales[r], 60);
    }

    #[test]
    fn pending_mark_rides_through_cheap_ops() {
        // mul -> negate -> rotate, each single-use: the rescale lands only
        // where the output forces it, after the rotation.
        let mut p = Program::new("p", 8).unwrap();
        let a = p.make_input("a", Type::Cipher);
        let b = p.make_input("b", Type::Cipher);
        let m = p.make_term(Op::Mul, &[a, b]);
        let n = p.make_term(Op::Negate, &[m]);
        let r = p.make_left_rotation(n, 2);
        let y = p.make_output("y", r);

        let mut scales = seed_scales(&mut p, 60);
        let mut types = typed(&mut p);
        lazy_waterline_rescale(&mut p, &mut types, &mut scales);

        assert_eq!(count_ops(&p, Op::Rescale), 1);
        // The multiply feeds the negation un-rescaled.
        assert_eq!(p.term(n).operands(), &[m]);
        let rescale = p.term(y).operands()[0];
        assert_eq!(p.term(rescale).op(), Op::Rescale);
        assert_eq!(p.term(rescale).operands(), &[r]);
    }

    #[test]
    fn downstream_mul_forces_the_rescale() {
        let mut p = Program::new("p", 8).unwrap();
        let a = p.make_input("a", Type::Cipher);
        let b = p.make_input("b", Type::Cipher);
        let m1 = p.make_term(Op::Mul, &[a, b]);
        let m2 = p.make_term(Op::Mul, &[m1, a]);
        p.make_output("y", m2);

        let mut scales = seed_scales(&mut p, 60);
        let mut types = typed(&mut p);
        lazy_waterline_rescale(&mut p, &mut types, &mut scales);

        // m1 is rescaled before m2 consumes it, and m2 is rescaled for the
        // output.
        assert_eq!(count_ops(&p, Op::Rescale), 2);
        let r1 = p.term(m2).operands()[0];
        assert_eq!(p.term(r1).op(), Op::Rescale);
        assert_eq!(p.term(r1).operands(), &[m1]);
        assert_eq!(scales[m2], 120);
    }

    #[test]
    fn shared_use_forces_the_rescale() {
        let mut p = Program::new("p", 8).unwrap();
        let a = p.make_input("a", Type::Cipher);
        let b = p.make_input("b", Type::Cipher);
        let m = p.make_term(Op::Mul, &[a, b]);
        let n1 = p.make_term(Op::Negate, &[m]);
        let n2 = p.make_term(Op::Negate, &[m]);
        let add = p.make_term(Op::Add, &[n1, n2]);
        p.make_output("y", add);

        let mut scales = seed_scales(&mut p, 60);
        let mut types = typed(&mut p);
        lazy_waterline_rescale(&mut p, &mut types, &mut scales);

        // Two distinct users of the pending multiply force the chain right
        // after it; the negations then share the rescaled value.
        let r = p.term(n1).operands()[0];
        assert_eq!(p.term(r).op(), Op::Rescale);
        assert_eq!(p.term(n2).operands(), &[r]);
        assert_eq!(scales[add], 60);
    }
}

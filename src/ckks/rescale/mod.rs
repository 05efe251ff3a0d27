//! The rescaler family.
//!
//! CKKS multiplication multiplies operand scales; left alone, scales (and
//! with them noise and the required modulus) grow without bound. Each policy
//! here decides where to insert `Rescale` terms to keep every scale between
//! the waterline (the largest source scale, `min_scale`) and one rescale
//! step above it, while propagating scales to all other terms:
//!
//! * scale of a `Mul` is the sum of its operand scales;
//! * `Add`/`Sub` require all non-Raw operands at one scale, multiplying a
//!   lower-scale operand by a uniform `1` constant to lift it when needed;
//! * every other operation copies the scale of its first operand;
//! * Raw terms take the maximum of their operand scales and are never
//!   rescaled.

mod always;
mod eager_waterline;
mod lazy_waterline;
mod minimum;

pub use always::always_rescale;
pub use eager_waterline::eager_waterline_rescale;
pub use lazy_waterline::lazy_waterline_rescale;
pub use minimum::minimum_rescale;

use crate::ir::{Attribute, Op, Program, TermId, TermMap, TermMapOptional, Type};
use log::trace;

/// One rescale step, in bits.
pub const FIXED_RESCALE: u32 = 60;

/// State shared by all rescaling policies.
pub(crate) struct RescalerContext<'a> {
    pub types: &'a mut TermMap<Type>,
    pub scales: &'a mut TermMapOptional<u32>,
    /// The waterline: the largest scale among the program's sources.
    pub min_scale: u32,
}

impl<'a> RescalerContext<'a> {
    pub fn new(
        program: &Program,
        types: &'a mut TermMap<Type>,
        scales: &'a mut TermMapOptional<u32>,
    ) -> RescalerContext<'a> {
        let mut min_scale = 0;
        for source in program.sources() {
            min_scale = min_scale.max(scales[source]);
        }
        assert_ne!(min_scale, 0, "no source has a positive scale");
        RescalerContext {
            types,
            scales,
            min_scale,
        }
    }

    /// Insert a `Rescale` consuming `term` and redirect all other uses of
    /// `term` to it.
    pub fn insert_rescale(
        &mut self,
        program: &mut Program,
        term: TermId,
        rescale_by: u32,
    ) -> TermId {
        let node = program.make_rescale(term, rescale_by);
        self.types[node] = self.types[term];
        self.scales.set(node, self.scales[term] - rescale_by);
        program.replace_other_uses_with(term, node);
        node
    }

    /// Insert a `Rescale` of `term` on its edge to `user` only.
    pub fn insert_rescale_between(
        &mut self,
        program: &mut Program,
        term: TermId,
        user: TermId,
        rescale_by: u32,
    ) {
        let node = program.make_rescale(term, rescale_by);
        self.types[node] = self.types[term];
        self.scales.set(node, self.scales[term] - rescale_by);
        program.replace_operand(user, term, node);
    }

    /// Keep inserting rescales under `term` until its scale is within one
    /// step of the waterline.
    pub fn insert_rescale_chain(&mut self, program: &mut Program, term: TermId) {
        let mut temp = term;
        let mut term_scale = self.scales[temp];
        while term_scale >= FIXED_RESCALE + self.min_scale {
            temp = self.insert_rescale(program, temp, FIXED_RESCALE);
            term_scale -= FIXED_RESCALE;
            debug_assert_eq!(term_scale, self.scales[temp]);
        }
    }

    /// Scale for a Raw term: the maximum of its operand scales.
    pub fn handle_raw_scale(&mut self, program: &Program, term: TermId) {
        if program.term(term).num_operands() == 0 {
            return;
        }
        let max_scale = program
            .term(term)
            .operands()
            .iter()
            .map(|o| self.scales[*o])
            .max()
            .expect("term has operands");
        self.scales.set(term, max_scale);
    }

    /// Bring all non-Raw operands of an `Add`/`Sub` to a common scale by
    /// multiplying lower-scale operands with a uniform `1` constant carrying
    /// the scale difference. Returns the common scale.
    pub fn equalize_addition_operands(&mut self, program: &mut Program, term: TermId) -> u32 {
        let mut max_scale = self.scales[term];
        // Raw operands may raise the target scale too.
        for &operand in program.term(term).operands() {
            max_scale = max_scale.max(self.scales[operand]);
        }
        // Iterate by slot: replacing an operand rewrites every slot holding
        // it, and the replacement is already at the target scale.
        for i in 0..program.term(term).num_operands() {
            let operand = program.term(term).operands()[i];
            if self.scales[operand] < max_scale && self.types[operand] != Type::Raw {
                trace!(
                    "Scaling up {} from scale {} to match other addition operands at scale {}",
                    operand,
                    self.scales[operand],
                    max_scale
                );
                let delta = max_scale - self.scales[operand];
                let scale_constant = program.make_uniform_constant(1.0);
                self.scales.set(scale_constant, delta);
                program
                    .term_mut(scale_constant)
                    .set_attribute(Attribute::EncodeAtScale(delta));
                let mul_node = program.make_term(Op::Mul, &[operand, scale_constant]);
                self.scales.set(mul_node, max_scale);
                program.replace_operand(term, operand, mul_node);
            }
        }
        for &operand in program.term(term).operands() {
            debug_assert!(
                self.scales[operand] == max_scale || self.types[operand] == Type::Raw,
                "addition operand left at a mismatched scale"
            );
        }
        max_scale
    }

    /// Sum of operand scales: the scale a multiplication produces.
    pub fn mult_scale(&self, program: &Program, term: TermId) -> u32 {
        program
            .term(term)
            .operands()
            .iter()
            .map(|o| self.scales[*o])
            .sum()
    }
}

#[cfg(test)]
pub(crate) mod test_util {
    use super::*;
    use crate::ir::Attribute;
    use crate::opt::type_deducer::deduce_types;

    /// Set scale attributes on all sources and seed the scales map, as the
    /// pipeline does before rescaling.
    pub fn seed_scales(program: &mut Program, scale: u32) -> TermMapOptional<u32> {
        let mut scales = TermMapOptional::new();
        for source in program.sources() {
            program
                .term_mut(source)
                .set_attribute(Attribute::EncodeAtScale(scale));
            scales.set(source, scale);
        }
        scales
    }

    pub fn typed(program: &mut Program) -> TermMap<Type> {
        let mut types = TermMap::new();
        deduce_types(program, &mut types);
        types
    }

    /// Count terms with the given op.
    pub fn count_ops(program: &Program, op: Op) -> usize {
        program
            .term_ids()
            .filter(|t| program.term(*t).op() == op)
            .count()
    }
}

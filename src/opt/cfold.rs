//! Folds operations whose operands are all constants.
//!
//! The folded term's uses are redirected to a fresh dense constant whose
//! scale is the maximum of the operand scales; the orphaned subgraph is
//! erased. Scheme-level operations cannot appear in an all-constant subgraph,
//! since constants are never encrypted.

use crate::ir::{forward_pass, Attribute, Op, Program, TermId, TermMapOptional};

struct ConstantFolder<'a> {
    scales: &'a mut TermMapOptional<u32>,
    scratch1: Vec<f64>,
    scratch2: Vec<f64>,
}

impl ConstantFolder<'_> {
    fn expand<'s>(program: &Program, scratch: &'s mut Vec<f64>, term: TermId) -> &'s [f64] {
        program
            .term(term)
            .constant_value()
            .expect("constant term carries a value")
            .expand_to(scratch, program.vec_size() as usize);
        scratch
    }

    fn replace_with_constant(
        &mut self,
        program: &mut Program,
        term: TermId,
        values: Vec<f64>,
        scale: u32,
    ) {
        let constant = program
            .make_dense_constant(values)
            .expect("folded vector has full length");
        self.scales.set(constant, scale);
        program
            .term_mut(constant)
            .set_attribute(Attribute::EncodeAtScale(scale));
        program.replace_all_uses_with(term, constant);
        debug_assert_eq!(program.term(term).num_uses(), 0);
        program.erase_if_unused(term);
    }

    fn fold_binary(
        &mut self,
        program: &mut Program,
        term: TermId,
        f: impl Fn(f64, f64) -> f64,
    ) {
        let args = program.term(term).operands().to_vec();
        let in1 = Self::expand(program, &mut self.scratch1, args[0]).to_vec();
        let in2 = Self::expand(program, &mut self.scratch2, args[1]);
        let out: Vec<f64> = in1.iter().zip(in2).map(|(a, b)| f(*a, *b)).collect();
        let scale = self.scales[args[0]].max(self.scales[args[1]]);
        self.replace_with_constant(program, term, out, scale);
    }

    fn fold_rotation(&mut self, program: &mut Program, term: TermId, right: bool) {
        let arg = program.term(term).operands()[0];
        let shift = program.term(term).rotation().expect("rotation step");
        let input = Self::expand(program, &mut self.scratch1, arg);
        let len = input.len() as i32;
        let shift = if right {
            (-shift).rem_euclid(len) as usize
        } else {
            shift.rem_euclid(len) as usize
        };
        let mut out = Vec::with_capacity(input.len());
        out.extend_from_slice(&input[shift..]);
        out.extend_from_slice(&input[..shift]);
        let scale = self.scales[arg];
        self.replace_with_constant(program, term, out, scale);
    }

    fn fold_negate(&mut self, program: &mut Program, term: TermId) {
        let arg = program.term(term).operands()[0];
        let out: Vec<f64> = Self::expand(program, &mut self.scratch1, arg)
            .iter()
            .map(|v| -v)
            .collect();
        let scale = self.scales[arg];
        self.replace_with_constant(program, term, out, scale);
    }

    fn visit(&mut self, program: &mut Program, term: TermId) {
        let data = program.term(term);
        if data.num_operands() == 0 {
            return;
        }
        if data
            .operands()
            .iter()
            .any(|o| program.term(*o).op() != Op::Constant)
        {
            return;
        }

        let op = data.op();
        match op {
            Op::Add => self.fold_binary(program, term, |a, b| a + b),
            Op::Sub => self.fold_binary(program, term, |a, b| a - b),
            Op::Mul => self.fold_binary(program, term, |a, b| a * b),
            Op::RotateLeftConst => self.fold_rotation(program, term, false),
            Op::RotateRightConst => self.fold_rotation(program, term, true),
            Op::Negate => self.fold_negate(program, term),
            Op::Output | Op::Encode => {}
            Op::Relinearize | Op::ModSwitch | Op::Rescale => panic!(
                "Encountered scheme operation {} in unencrypted computation",
                op
            ),
            Op::Undef | Op::Input | Op::Constant => {
                panic!("Unhandled op {} with constant operands", op)
            }
        }
    }
}

/// Fold all-constant subgraphs into single dense constants.
///
/// `scales` must hold the scales of the constants already present; folded
/// results are entered into it.
pub fn fold_constants(program: &mut Program, scales: &mut TermMapOptional<u32>) {
    let mut folder = ConstantFolder {
        scales,
        scratch1: Vec::new(),
        scratch2: Vec::new(),
    };
    forward_pass(program, |p, t| folder.visit(p, t));
}

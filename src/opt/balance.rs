//! Reduction balancing: flattens chains of `Add`/`Mul` into variadic terms,
//! then re-trees them as balanced binary reductions.
//!
//! Combining first produces the flat form (`a * (b * (c * d))` becomes
//! `a * b * c * d`), and expansion then pairs operands into a tree of depth
//! logarithmic in the fan-in, which keeps the multiplicative depth of long
//! reductions low. Expansion must run before any rescaling: it uses scale as
//! a proxy for level and sorts operands so terms likely to sit at the same
//! level are paired together.

use crate::ir::{forward_pass, Op, Program, TermId, TermMap, TermMapOptional, Type};
use std::collections::BTreeMap;

fn combine_visit(program: &mut Program, term: TermId) {
    let data = program.term(term);
    if !data.is_internal() || !data.op().is_reduction() {
        return;
    }
    let uses = data.uses();
    if uses.len() != 1 {
        return;
    }
    let user = uses[0];
    if program.term(user).op() != program.term(term).op() {
        return;
    }
    // Move this term's operands into its single user and erase it.
    while program.erase_operand(user, term) {
        for operand in program.term(term).operands().to_vec() {
            program.add_operand(user, operand);
        }
    }
    program.erase_if_unused(term);
}

/// Merge single-use `Add`/`Mul` terms into same-op users, producing variadic
/// reductions.
pub fn combine_reductions(program: &mut Program) {
    forward_pass(program, combine_visit);
}

struct ReductionLogExpander<'a> {
    types: &'a TermMap<Type>,
    // Scale accumulated as if no rescaling will happen; a proxy for the
    // level each operand will end up at.
    scale: TermMapOptional<u32>,
}

impl ReductionLogExpander<'_> {
    fn visit(&mut self, program: &mut Program, term: TermId) {
        let data = program.term(term);
        if matches!(data.op(), Op::Rescale | Op::ModSwitch) {
            panic!(
                "{} encountered, but reduction balancing uses scale as a proxy \
                 for level and assumes rescaling has not happened yet",
                data.op()
            );
        }

        let proxy = if data.num_operands() == 0 {
            data.encode_at_scale()
                .unwrap_or_else(|| panic!("source {} has no scale", term))
        } else if data.op() == Op::Mul {
            data.operands().iter().map(|o| self.scale[*o]).sum()
        } else {
            data.operands()
                .iter()
                .map(|o| self.scale[*o])
                .max()
                .expect("non-source term has operands")
        };
        self.scale.set(term, proxy);

        if !data.op().is_reduction() || data.num_operands() <= 2 {
            return;
        }

        // Sort operands into constants, then plaintext and raw, then
        // ciphertexts by scale, to avoid needless accumulation of scale.
        let mut sorted: BTreeMap<u32, Vec<TermId>> = BTreeMap::new();
        for &operand in program.term(term).operands() {
            let order = if program.term(operand).op() == Op::Constant {
                0
            } else if self.types[operand] == Type::Cipher {
                2 + self.scale[operand]
            } else {
                1
            };
            sorted.entry(order).or_default().push(operand);
        }
        let mut operands: Vec<TermId> = sorted.into_values().flatten().collect();

        // Pair adjacent operands until only two remain.
        let op = program.term(term).op();
        let mut next_operands = Vec::new();
        assert!(operands.len() >= 2);
        while operands.len() > 2 {
            let mut i = 0;
            while i + 1 < operands.len() {
                next_operands.push(program.make_term(op, &[operands[i], operands[i + 1]]));
                i += 2;
            }
            if i < operands.len() {
                next_operands.push(operands[i]);
            }
            std::mem::swap(&mut operands, &mut next_operands);
            next_operands.clear();
        }

        assert_eq!(operands.len(), 2);
        program.set_operands(term, operands);
    }
}

/// Re-tree variadic `Add`/`Mul` terms into balanced binary reductions.
pub fn expand_reductions(program: &mut Program, types: &TermMap<Type>) {
    let mut expander = ReductionLogExpander {
        types,
        scale: TermMapOptional::new(),
    };
    forward_pass(program, |p, t| expander.visit(p, t));
}

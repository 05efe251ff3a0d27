//! Modulus switching: equalizes the level at which each term's users
//! consume it.
//!
//! A backward pass assigns every term a reverse level (sinks at 0, sources
//! at the maximum) and, where users sit at different levels, interposes a
//! chain of `ModSwitch` terms stepping the value down one prime at a time.
//! A `Rescale` consumes a prime of its own, so it raises its term's level by
//! one. When the pass finishes, the final levels are written back onto
//! sources and `Encode` terms as their encoding level.

use crate::ir::{backward_pass, Attribute, Op, Program, TermId, TermMap, TermMapOptional, Type};
use std::collections::BTreeMap;

struct ModSwitcher {
    /// Reverse level: sinks have 0, sources the maximum.
    level: TermMap<u32>,
    encode_nodes: Vec<TermId>,
}

impl ModSwitcher {
    fn insert_mod_switch_node(
        &mut self,
        program: &mut Program,
        scales: &mut TermMapOptional<u32>,
        term: TermId,
        term_level: u32,
    ) -> TermId {
        let node = program.make_term(Op::ModSwitch, &[term]);
        scales.set(node, scales[term]);
        self.level[node] = term_level;
        node
    }

    fn visit(
        &mut self,
        types: &TermMap<Type>,
        scales: &mut TermMapOptional<u32>,
        program: &mut Program,
        term: TermId,
    ) {
        if program.term(term).num_uses() == 0 {
            return;
        }
        // Raw values carry no modulus, so they never switch.
        if types[term] == Type::Raw {
            return;
        }
        if program.term(term).op() == Op::Encode {
            self.encode_nodes.push(term);
        }

        let mut use_levels: BTreeMap<u32, Vec<TermId>> = BTreeMap::new();
        for &user in program.term(term).uses() {
            use_levels.entry(self.level[user]).or_default().push(user);
        }

        let mut term_level = 0;
        if use_levels.len() > 1 {
            let mut iter = use_levels.iter().rev();
            let (&max_level, _) = iter.next().expect("at least two levels");
            term_level = max_level;

            let mut temp = term;
            let mut temp_level = term_level;
            for (&expected_level, users) in iter {
                while temp_level > expected_level {
                    temp = self.insert_mod_switch_node(program, scales, temp, temp_level);
                    temp_level -= 1;
                }
                for &user in users {
                    program.replace_operand(user, term, temp);
                }
            }
        } else if let Some((&level, _)) = use_levels.iter().next() {
            term_level = level;
        }
        if program.term(term).op() == Op::Rescale {
            term_level += 1;
        }
        self.level[term] = term_level;
    }

    /// Write final levels onto sources and encode nodes.
    fn finish(self, program: &mut Program) {
        let sources = program.sources();
        let max_level = sources.iter().map(|s| self.level[*s]).max().unwrap_or(0);
        for &source in &sources {
            program
                .term_mut(source)
                .set_attribute(Attribute::EncodeAtLevel(max_level - self.level[source]));
        }
        for &encode in &self.encode_nodes {
            program
                .term_mut(encode)
                .set_attribute(Attribute::EncodeAtLevel(max_level - self.level[encode]));
        }
    }
}

/// Insert `ModSwitch` chains so all users of a term agree on its level, and
/// record encoding levels on sources and `Encode` terms.
pub fn insert_mod_switches(
    program: &mut Program,
    types: &TermMap<Type>,
    scales: &mut TermMapOptional<u32>,
) {
    let mut switcher = ModSwitcher {
        level: TermMap::new(),
        encode_nodes: Vec::new(),
    };
    backward_pass(program, |p, t| switcher.visit(types, scales, p, t));
    switcher.finish(program);
}

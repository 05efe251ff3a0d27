//! Verifies that all Cipher operands of every term sit at one level.
//!
//! Levels are propagated forward from the encoding levels the modulus
//! switcher recorded, incrementing across `Rescale` and `ModSwitch`. Any
//! mismatch here is a compiler bug, not a user error.

use crate::ir::{Op, Program, TermMap, Type};

/// Check level compatibility across the whole program.
pub fn check_levels(program: &Program, types: &TermMap<Type>) {
    let mut levels: TermMap<u32> = TermMap::new();
    for term in program.topological_order() {
        let data = program.term(term);
        if data.num_operands() == 0 {
            levels[term] = data
                .encode_at_level()
                .unwrap_or_else(|| panic!("source {} has no encoding level", term));
            continue;
        }
        let mut operand_level = None;
        for &operand in data.operands() {
            if types[operand] == Type::Cipher {
                match operand_level {
                    None => operand_level = Some(levels[operand]),
                    Some(level) => assert_eq!(
                        level, levels[operand],
                        "cipher operands of {} are at different levels",
                        term
                    ),
                }
            }
        }
        let mut level = operand_level.unwrap_or(0);
        if matches!(data.op(), Op::Rescale | Op::ModSwitch) {
            level += 1;
        }
        levels[term] = level;
    }
}

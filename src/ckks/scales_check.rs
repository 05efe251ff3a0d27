//! Re-derives every term's scale from scratch and rejects programs where a
//! scale reaches zero or an addition mixes scales.
//!
//! This checker deliberately ignores the scales the rescaler recorded: it
//! recomputes them from the operations alone, so a bookkeeping slip in an
//! earlier pass cannot hide.

use crate::error::{Error, Result};
use crate::ir::{Op, Program, TermMap, TermMapOptional, Type};

/// Check scale consistency across the whole program.
pub fn check_scales(program: &Program, types: &TermMap<Type>) -> Result<()> {
    let mut scales: TermMapOptional<u32> = TermMapOptional::new();
    for term in program.topological_order() {
        if types[term] == Type::Raw {
            continue;
        }
        let data = program.term(term);
        let scale = match data.op() {
            Op::Input | Op::Encode => {
                let scale = data
                    .encode_at_scale()
                    .unwrap_or_else(|| panic!("{} has no recorded scale", term));
                if scale == 0 {
                    return Err(if data.op() == Op::Input {
                        Error::ZeroScaleInput
                    } else {
                        Error::ZeroScaleTerm
                    });
                }
                scale
            }
            Op::Mul => {
                debug_assert_eq!(data.num_operands(), 2);
                let scale = data.operands().iter().map(|o| scales[*o]).sum();
                if scale == 0 {
                    return Err(Error::ZeroScaleTerm);
                }
                scale
            }
            Op::Rescale => {
                debug_assert_eq!(data.num_operands(), 1);
                let divisor = data.rescale_divisor().expect("rescale carries a divisor");
                let scale = scales[data.operands()[0]] - divisor;
                if scale == 0 {
                    return Err(Error::ZeroScaleTerm);
                }
                scale
            }
            Op::Add | Op::Sub => {
                let mut scale = 0;
                for &operand in data.operands() {
                    if scale == 0 {
                        scale = scales[operand];
                    } else if scale != scales[operand] {
                        return Err(Error::UnequalAdditionScales);
                    }
                }
                if scale == 0 {
                    return Err(Error::ZeroScaleTerm);
                }
                scale
            }
            _ => {
                let scale = scales[data.operands()[0]];
                if scale == 0 {
                    return Err(Error::ZeroScaleTerm);
                }
                scale
            }
        };
        scales.set(term, scale);
    }
    Ok(())
}

//! The unencrypted reference semantics: a double-precision evaluator used as
//! the correctness oracle for everything the compiler does.
//!
//! Scheme-level operations (`Encode`, `Rescale`, `ModSwitch`, `Relinearize`)
//! are pass-through copies here, so the same function evaluates a program
//! before or after compilation.

use crate::error::{Error, Result};
use crate::ir::{Op, Program, TermMapOptional};
use fxhash::FxHashMap;

/// Named vectors: the inputs and outputs of an evaluation.
pub type Valuation = FxHashMap<String, Vec<f64>>;

fn rotate_left(input: &[f64], shift: i32) -> Vec<f64> {
    let len = input.len() as i32;
    let shift = shift.rem_euclid(len) as usize;
    let mut out = Vec::with_capacity(input.len());
    out.extend_from_slice(&input[shift..]);
    out.extend_from_slice(&input[..shift]);
    out
}

fn rotate_right(input: &[f64], shift: i32) -> Vec<f64> {
    let len = input.len() as i32;
    let shift = shift.rem_euclid(len) as usize;
    let mut out = Vec::with_capacity(input.len());
    out.extend_from_slice(&input[input.len() - shift..]);
    out.extend_from_slice(&input[..input.len() - shift]);
    out
}

fn bin_op(f: impl Fn(f64, f64) -> f64, a: &[f64], b: &[f64]) -> Vec<f64> {
    assert_eq!(a.len(), b.len());
    a.iter().zip(b).map(|(x, y)| f(*x, *y)).collect()
}

/// Evaluate `program` on `inputs`, unencrypted.
///
/// Every input the program declares must be present with length equal to the
/// program's vector size.
pub fn evaluate(program: &Program, inputs: &Valuation) -> Result<Valuation> {
    let vec_size = program.vec_size() as usize;
    let mut values: TermMapOptional<Vec<f64>> = TermMapOptional::new();

    for (name, &id) in program.inputs() {
        let input = inputs
            .get(name)
            .ok_or_else(|| Error::InputNotSet(name.clone()))?;
        if input.len() != vec_size {
            return Err(Error::InputLengthMismatch {
                name: name.clone(),
                len: input.len(),
                vec_size: program.vec_size(),
            });
        }
        values.set(id, input.clone());
    }

    for id in program.topological_order() {
        let data = program.term(id);
        let args = data.operands();
        let result: Vec<f64> = match data.op() {
            Op::Input => continue,
            Op::Constant => {
                let mut out = Vec::new();
                data.constant_value()
                    .expect("constant term carries a value")
                    .expand_to(&mut out, vec_size);
                out
            }
            Op::Add => bin_op(|a, b| a + b, &values[args[0]], &values[args[1]]),
            Op::Sub => bin_op(|a, b| a - b, &values[args[0]], &values[args[1]]),
            Op::Mul => bin_op(|a, b| a * b, &values[args[0]], &values[args[1]]),
            Op::RotateLeftConst => rotate_left(
                &values[args[0]],
                data.rotation().expect("rotation term carries a step"),
            ),
            Op::RotateRightConst => rotate_right(
                &values[args[0]],
                data.rotation().expect("rotation term carries a step"),
            ),
            Op::Negate => values[args[0]].iter().map(|x| -x).collect(),
            Op::Output | Op::Encode | Op::Relinearize | Op::ModSwitch | Op::Rescale => {
                values[args[0]].clone()
            }
            Op::Undef => panic!("Undef term in program"),
        };
        values.set(id, result);
    }

    let mut outputs = Valuation::default();
    for (name, &id) in program.outputs() {
        outputs.insert(name.clone(), values[id].clone());
    }
    Ok(outputs)
}

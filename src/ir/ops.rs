use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// The operation a term performs.
///
/// The set is closed: passes dispatch on it with `match`, and the scheme
/// operations (`Relinearize`, `ModSwitch`, `Rescale`, `Encode`) are only ever
/// introduced by the compiler itself.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum Op {
    /// Placeholder; never appears in a valid program.
    Undef,
    /// A named program input.
    Input,
    /// A named program output; single operand.
    Output,
    /// A constant vector; carries a constant-value attribute.
    Constant,
    /// Element-wise negation.
    Negate,
    /// Element-wise addition.
    Add,
    /// Element-wise subtraction.
    Sub,
    /// Element-wise multiplication.
    Mul,
    /// Cyclic left rotation by a constant step.
    RotateLeftConst,
    /// Cyclic right rotation by a constant step.
    RotateRightConst,
    /// Degree reduction of a ciphertext after multiplication.
    Relinearize,
    /// Drop one prime from the modulus chain without changing scale.
    ModSwitch,
    /// Divide the scale by a prime, consuming one level.
    Rescale,
    /// Encoding of a raw vector into a backend plaintext.
    Encode,
}

impl Op {
    /// Operations that make a term eligible for reduction balancing.
    pub fn is_reduction(&self) -> bool {
        matches!(self, Op::Add | Op::Mul)
    }

    /// `Add` or `Sub`: the operations requiring equal operand scales.
    pub fn is_additive(&self) -> bool {
        matches!(self, Op::Add | Op::Sub)
    }

    /// Rotation by a constant step, in either direction.
    pub fn is_rotation(&self) -> bool {
        matches!(self, Op::RotateLeftConst | Op::RotateRightConst)
    }
}

impl Display for Op {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let name = match self {
            Op::Undef => "Undef",
            Op::Input => "Input",
            Op::Output => "Output",
            Op::Constant => "Constant",
            Op::Negate => "Negate",
            Op::Add => "Add",
            Op::Sub => "Sub",
            Op::Mul => "Mul",
            Op::RotateLeftConst => "RotateLeftConst",
            Op::RotateRightConst => "RotateRightConst",
            Op::Relinearize => "Relinearize",
            Op::ModSwitch => "ModSwitch",
            Op::Rescale => "Rescale",
            Op::Encode => "Encode",
        };
        write!(f, "{}", name)
    }
}

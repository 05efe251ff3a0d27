use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// A constant vector of reals, in dense or sparse form.
///
/// A constant of length `L` conceptually tiles to fill any slot count `S`
/// with `L | S`; expansion is deferred until a pass or executor needs the
/// full vector.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ConstantValue {
    /// All `size` entries, given explicitly (possibly as a shorter vector
    /// that tiles to `size`).
    Dense {
        /// Logical length; divides the slot counts it will be expanded to.
        size: usize,
        /// The entries; their number divides `size`.
        values: Vec<f64>,
    },
    /// Explicit (index, value) entries; all other entries are zero.
    Sparse {
        /// Logical length; divides the slot counts it will be expanded to.
        size: usize,
        /// The non-zero entries, with indices in `[0, size)`.
        entries: Vec<(u32, f64)>,
    },
}

impl ConstantValue {
    /// A dense constant. The number of values must exactly divide `size`.
    pub fn dense(size: usize, values: Vec<f64>) -> Result<ConstantValue> {
        if values.is_empty() || size % values.len() != 0 {
            return Err(Error::BadConstantSize);
        }
        Ok(ConstantValue::Dense { size, values })
    }

    /// A sparse constant over `[0, size)`.
    pub fn sparse(size: usize, entries: Vec<(u32, f64)>) -> ConstantValue {
        ConstantValue::Sparse { size, entries }
    }

    /// The logical length of this constant.
    pub fn size(&self) -> usize {
        match self {
            ConstantValue::Dense { size, .. } | ConstantValue::Sparse { size, .. } => *size,
        }
    }

    /// Whether every entry is zero.
    pub fn is_zero(&self) -> bool {
        match self {
            ConstantValue::Dense { values, .. } => values.iter().all(|v| *v == 0.0),
            ConstantValue::Sparse { entries, .. } => entries.iter().all(|(_, v)| *v == 0.0),
        }
    }

    fn validate_slots(&self, slots: usize) {
        assert!(
            slots >= self.size() && slots % self.size() == 0,
            "constant of size {} cannot tile {} slots",
            self.size(),
            slots
        );
    }

    /// Expand into `result`, tiling to exactly `slots` entries.
    pub fn expand_to(&self, result: &mut Vec<f64>, slots: usize) {
        self.validate_slots(slots);
        result.clear();
        match self {
            ConstantValue::Dense { values, .. } => {
                result.reserve(slots);
                for _ in 0..slots / values.len() {
                    result.extend_from_slice(values);
                }
            }
            ConstantValue::Sparse { entries, .. } => {
                result.resize(slots, 0.0);
                let stride = self.size();
                for &(index, value) in entries {
                    let mut i = index as usize;
                    while i < slots {
                        result[i] = value;
                        i += stride;
                    }
                }
            }
        }
    }

    /// Expand, reusing `scratch` when tiling is needed and borrowing the
    /// stored values directly when it is not.
    pub fn expand<'a>(&'a self, scratch: &'a mut Vec<f64>, slots: usize) -> &'a [f64] {
        if let ConstantValue::Dense { values, .. } = self {
            if values.len() == slots {
                return values;
            }
        }
        self.expand_to(scratch, slots);
        scratch
    }
}

//! Collects the set of rotation steps the backend must generate Galois keys
//! for. Right rotations are recorded as negated left rotations; rotations of
//! Raw data run outside the scheme and need no keys.

use crate::ir::{Op, Program, TermMap, Type};
use std::collections::BTreeSet;

/// The rotation steps used by non-Raw rotation terms.
pub fn select_rotation_keys(program: &Program, types: &TermMap<Type>) -> BTreeSet<i32> {
    let mut keys = BTreeSet::new();
    for term in program.topological_order() {
        let data = program.term(term);
        if !data.op().is_rotation() || types[term] == Type::Raw {
            continue;
        }
        let rotation = data.rotation().expect("rotation term carries a step");
        keys.insert(if data.op() == Op::RotateRightConst {
            -rotation
        } else {
            rotation
        });
    }
    keys
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ckks::rescale::test_util::typed;

    #[test]
    fn collects_signed_steps() {
        let mut p = Program::new("p", 8).unwrap();
        let a = p.make_input("a", Type::Cipher);
        let l = p.make_left_rotation(a, 3);
        let r = p.make_right_rotation(a, 5);
        let add = p.make_term(Op::Add, &[l, r]);
        p.make_output("y", add);

        let types = typed(&mut p);
        let keys = select_rotation_keys(&p, &types);
        assert_eq!(keys, BTreeSet::from([3, -5]));
    }

    #[test]
    fn raw_rotations_need_no_keys() {
        let mut p = Program::new("p", 8).unwrap();
        let a = p.make_input("a", Type::Raw);
        let l = p.make_left_rotation(a, 2);
        p.make_output("y", l);

        let types = typed(&mut p);
        assert!(select_rotation_keys(&p, &types).is_empty());
    }

    #[test]
    fn duplicate_steps_collapse() {
        let mut p = Program::new("p", 8).unwrap();
        let a = p.make_input("a", Type::Cipher);
        let l1 = p.make_left_rotation(a, 3);
        let l2 = p.make_left_rotation(a, 3);
        let add = p.make_term(Op::Add, &[l1, l2]);
        p.make_output("y", add);

        let types = typed(&mut p);
        assert_eq!(select_rotation_keys(&p, &types).len(), 1);
    }
}

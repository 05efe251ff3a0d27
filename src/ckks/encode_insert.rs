//! Wraps Raw operands of mixed Cipher/Raw operations in `Encode` terms.
//!
//! For additions the encode takes the scale of the other operand, since the
//! backend requires equal scales to add; for multiplications it keeps the
//! Raw operand's own scale.

use crate::ir::{forward_pass, Attribute, Op, Program, TermId, TermMap, TermMapOptional, Type};

fn insert_encode_node(
    program: &mut Program,
    types: &mut TermMap<Type>,
    scales: &mut TermMapOptional<u32>,
    op: Op,
    other: TermId,
    raw: TermId,
) -> TermId {
    let node = program.make_term(Op::Encode, &[raw]);
    types[node] = Type::Plain;
    let scale = if op.is_additive() {
        scales[other]
    } else {
        scales[raw]
    };
    scales.set(node, scale);
    program
        .term_mut(node)
        .set_attribute(Attribute::EncodeAtScale(scale));
    node
}

fn visit(
    types: &mut TermMap<Type>,
    scales: &mut TermMapOptional<u32>,
    program: &mut Program,
    term: TermId,
) {
    let data = program.term(term);
    if data.num_operands() == 0 {
        return;
    }
    debug_assert!(data.num_operands() <= 2, "reductions must be binary here");
    if data.num_operands() != 2 {
        return;
    }

    let op = data.op();
    let left = data.operands()[0];
    let right = data.operands()[1];

    if types[left] == Type::Cipher && types[right] == Type::Raw {
        let node = insert_encode_node(program, types, scales, op, left, right);
        program.replace_operand(term, right, node);
    }
    if types[right] == Type::Cipher && types[left] == Type::Raw {
        let node = insert_encode_node(program, types, scales, op, right, left);
        program.replace_operand(term, left, node);
    }
}

/// Insert `Encode` terms between Cipher operations and their Raw operands.
pub fn insert_encodes(
    program: &mut Program,
    types: &mut TermMap<Type>,
    scales: &mut TermMapOptional<u32>,
) {
    forward_pass(program, |p, t| visit(types, scales, p, t));
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ckks::rescale::test_util::{count_ops, seed_scales, typed};

    #[test]
    fn addition_encodes_at_the_cipher_scale() {
        let mut p = Program::new("p", 4).unwrap();
        let a = p.make_input("a", Type::Cipher);
        let c = p.make_dense_constant(vec![1.0, 2.0]).unwrap();
        let add = p.make_term(Op::Add, &[a, c]);
        p.make_output("y", add);

        let mut scales = seed_scales(&mut p, 40);
        scales.set(c, 20);
        p.term_mut(c).set_attribute(Attribute::EncodeAtScale(20));
        let mut types = typed(&mut p);
        insert_encodes(&mut p, &mut types, &mut scales);

        let enc = p.term(add).operands()[1];
        assert_eq!(p.term(enc).op(), Op::Encode);
        assert_eq!(p.term(enc).operands(), &[c]);
        assert_eq!(types[enc], Type::Plain);
        assert_eq!(p.term(enc).encode_at_scale(), Some(40));
        assert_eq!(scales[enc], 40);
    }

    #[test]
    fn multiplication_encodes_at_the_raw_scale() {
        let mut p = Program::new("p", 4).unwrap();
        let a = p.make_input("a", Type::Cipher);
        let c = p.make_dense_constant(vec![1.0, 2.0]).unwrap();
        let mul = p.make_term(Op::Mul, &[c, a]);
        p.make_output("y", mul);

        let mut scales = seed_scales(&mut p, 40);
        scales.set(c, 20);
        p.term_mut(c).set_attribute(Attribute::EncodeAtScale(20));
        let mut types = typed(&mut p);
        insert_encodes(&mut p, &mut types, &mut scales);

        let enc = p.term(mul).operands()[0];
        assert_eq!(p.term(enc).op(), Op::Encode);
        assert_eq!(p.term(enc).encode_at_scale(), Some(20));
    }

    #[test]
    fn cipher_only_operations_are_untouched() {
        let mut p = Program::new("p", 4).unwrap();
        let a = p.make_input("a", Type::Cipher);
        let b = p.make_input("b", Type::Cipher);
        let add = p.make_term(Op::Add, &[a, b]);
        p.make_output("y", add);

        let mut scales = seed_scales(&mut p, 40);
        let mut types = typed(&mut p);
        insert_encodes(&mut p, &mut types, &mut scales);
        assert_eq!(count_ops(&p, Op::Encode), 0);
    }

    #[test]
    fn raw_only_operations_are_untouched() {
        let mut p = Program::new("p", 4).unwrap();
        let a = p.make_input("a", Type::Raw);
        let c = p.make_dense_constant(vec![1.0]).unwrap();
        let mul = p.make_term(Op::Mul, &[a, c]);
        p.make_output("y", mul);

        let mut scales = seed_scales(&mut p, 40);
        let mut types = typed(&mut p);
        insert_encodes(&mut p, &mut types, &mut scales);
        assert_eq!(count_ops(&p, Op::Encode), 0);
    }
}

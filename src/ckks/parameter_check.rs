//! Verifies that the prime chains implied by different operands of each term
//! agree.
//!
//! Like the parameter selector, this tracks the list of rescale primes
//! needed to reach each term, but it also records `ModSwitch` steps as
//! placeholder zeroes and requires all operands of a term to impose
//! compatible chains: equal lengths, and pairwise equal primes wherever both
//! sides know the concrete value. Disagreement means the rescaling policy
//! mis-balanced the program.

use crate::error::{Error, Result};
use crate::ir::{Op, Program, TermMap, Type};

/// Check prime-chain consistency across the whole program.
pub fn check_parameters(program: &Program, types: &TermMap<Type>) -> Result<()> {
    let mut parms: TermMap<Vec<u32>> = TermMap::new();
    for term in program.topological_order() {
        let data = program.term(term);
        if types[term] == Type::Raw || data.op() == Op::Encode {
            continue;
        }
        if data.num_operands() == 0 {
            let level = data
                .encode_at_level()
                .unwrap_or_else(|| panic!("source {} has no encoding level", term));
            parms[term] = vec![0; level as usize];
            continue;
        }

        let mut chain: Vec<u32> = Vec::new();
        for &operand in data.operands() {
            let operand_chain = &parms[operand];
            if operand_chain.is_empty() {
                continue;
            }
            if chain.is_empty() {
                chain = operand_chain.clone();
                continue;
            }
            if operand_chain.len() != chain.len() {
                return Err(Error::InconsistentParameters(
                    "Two operands require different number of primes",
                ));
            }
            for (slot, &prime) in chain.iter_mut().zip(operand_chain) {
                if *slot == 0 {
                    *slot = prime;
                } else if prime != 0 && *slot != prime {
                    return Err(Error::InconsistentParameters(
                        "Primes required by two operands do not match",
                    ));
                }
            }
        }

        match data.op() {
            Op::ModSwitch => chain.push(0),
            Op::Rescale => {
                let divisor = data.rescale_divisor().expect("rescale carries a divisor");
                assert_ne!(divisor, 0);
                chain.push(divisor);
            }
            _ => {}
        }
        parms[term] = chain;
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ckks::rescale::test_util::typed;
    use crate::ir::Attribute;

    fn leveled_input(p: &mut Program, name: &str, level: u32) -> crate::ir::TermId {
        let t = p.make_input(name, Type::Cipher);
        p.term_mut(t).set_attribute(Attribute::EncodeAtLevel(level));
        t
    }

    #[test]
    fn accepts_matching_chains() {
        let mut p = Program::new("p", 4).unwrap();
        let a = leveled_input(&mut p, "a", 0);
        let b = leveled_input(&mut p, "b", 0);
        let m1 = p.make_term(Op::Mul, &[a, b]);
        let r1 = p.make_rescale(m1, 60);
        let m2 = p.make_term(Op::Mul, &[a, a]);
        let r2 = p.make_rescale(m2, 60);
        let add = p.make_term(Op::Add, &[r1, r2]);
        p.make_output("y", add);

        let types = typed(&mut p);
        assert!(check_parameters(&p, &types).is_ok());
    }

    #[test]
    fn mod_switch_placeholder_matches_any_prime() {
        let mut p = Program::new("p", 4).unwrap();
        let a = leveled_input(&mut p, "a", 0);
        let b = leveled_input(&mut p, "b", 0);
        let m = p.make_term(Op::Mul, &[a, b]);
        let r = p.make_rescale(m, 60);
        let ms = p.make_term(Op::ModSwitch, &[a]);
        let add = p.make_term(Op::Add, &[r, ms]);
        p.make_output("y", add);

        let types = typed(&mut p);
        assert!(check_parameters(&p, &types).is_ok());
    }

    #[test]
    fn rejects_mismatched_primes() {
        let mut p = Program::new("p", 4).unwrap();
        let a = leveled_input(&mut p, "a", 0);
        let b = leveled_input(&mut p, "b", 0);
        let m1 = p.make_term(Op::Mul, &[a, b]);
        let r1 = p.make_rescale(m1, 60);
        let m2 = p.make_term(Op::Mul, &[a, a]);
        let r2 = p.make_rescale(m2, 40);
        let add = p.make_term(Op::Add, &[r1, r2]);
        p.make_output("y", add);

        let types = typed(&mut p);
        assert!(matches!(
            check_parameters(&p, &types),
            Err(Error::InconsistentParameters(_))
        ));
    }

    #[test]
    fn rejects_mismatched_chain_lengths() {
        let mut p = Program::new("p", 4).unwrap();
        let a = leveled_input(&mut p, "a", 0);
        let b = leveled_input(&mut p, "b", 0);
        let m = p.make_term(Op::Mul, &[a, b]);
        let r1 = p.make_rescale(m, 60);
        let r2 = p.make_rescale(r1, 60);
        // Two primes down one side, a single switch down the other.
        let ms = p.make_term(Op::ModSwitch, &[a]);
        let add = p.make_term(Op::Add, &[r2, ms]);
        p.make_output("y", add);

        let types = typed(&mut p);
        assert!(matches!(
            check_parameters(&p, &types),
            Err(Error::InconsistentParameters(_))
        ));
    }
}

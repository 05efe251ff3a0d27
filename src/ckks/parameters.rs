//! Encryption parameter selection: the prime chain and the ring degree.
//!
//! A forward sweep computes, for each term, the list of rescale primes
//! needed to reach it (the longest operand chain dominates; `Rescale`
//! appends its divisor). The global chain is then assembled from the output
//! terms: primes to hold the output value on top, the longest rescale chain
//! reversed in the middle, and the key prime last. The ring degree is the
//! smallest power of two whose standard-parameter row admits the total bit
//! budget.

use crate::error::{Error, Result};
use crate::ir::{Op, Program, TermMap, TermMapOptional, Type};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// The encryption parameters a compiled program requires.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CkksParameters {
    /// Prime bit widths, highest level first, ending with the key prime.
    pub prime_bits: Vec<u32>,
    /// Rotation steps the backend needs Galois keys for.
    pub rotations: BTreeSet<i32>,
    /// The polynomial modulus degree.
    pub poly_modulus_degree: u32,
}

/// Compute the prime bit chain for `program`.
///
/// Every output must carry a range attribute; the scales map is the one the
/// rescaler filled in.
pub fn select_prime_bits(
    program: &Program,
    scales: &TermMapOptional<u32>,
    types: &TermMap<Type>,
) -> Result<Vec<u32>> {
    // Per-term prime chains, considering rescales only. Modulus switches are
    // ignored; there is always a longest path without them.
    let mut chains: TermMap<Vec<u32>> = TermMap::new();
    for term in program.topological_order() {
        let data = program.term(term);
        if types[term] == Type::Raw || data.op() == Op::Encode {
            continue;
        }
        if data.num_operands() == 0 {
            continue;
        }
        let mut chain: Vec<u32> = Vec::new();
        for &operand in data.operands() {
            if chains[operand].len() > chain.len() {
                chain = chains[operand].clone();
            }
        }
        if data.op() == Op::Rescale {
            let divisor = data.rescale_divisor().expect("rescale carries a divisor");
            assert_ne!(divisor, 0);
            chain.push(divisor);
        }
        chains[term] = chain;
    }

    // The size in bits needed to store the largest output: its range plus
    // its scale.
    let mut max_output_size = 0;
    // The largest prime appearing in any output chain.
    let mut max_parm = 0;
    // The length of the longest output chain.
    let mut max_len = 0;
    for (name, &output) in program.outputs() {
        let range = program
            .term(output)
            .range()
            .ok_or_else(|| Error::OutputRangeNotSet(name.clone()))?;
        max_output_size = max_output_size.max(range + scales[output]);
        max_len = max_len.max(chains[output].len());
        for &parm in &chains[output] {
            max_parm = max_parm.max(parm);
        }
    }
    assert_ne!(max_output_size, 0, "output size must be positive");

    let mut parms = Vec::new();
    if max_output_size > 60 {
        // More than one top prime is needed to hold the output.
        max_parm = 60;
        while max_output_size >= 60 {
            parms.push(60);
            max_output_size -= 60;
        }
        if max_output_size > 0 {
            parms.push(max_output_size.max(20));
        }
    } else {
        max_parm = max_parm.max(max_output_size);
        parms.push(max_parm);
    }

    // The longest output chain, reversed: highest level first.
    for (_, &output) in program.outputs() {
        if chains[output].len() == max_len {
            parms.extend(chains[output].iter().rev());
            break;
        }
    }

    // The key prime.
    parms.push(max_parm);
    Ok(parms)
}

/// Largest total modulus bit count the homomorphic encryption standard
/// admits for a degree, security level and quantum-safety choice; zero when
/// the degree is out of table range.
fn he_std_max_bits(security_level: u32, quantum_safe: bool, degree: u32) -> u32 {
    let row: [u32; 6] = match (security_level, quantum_safe) {
        (128, false) => [27, 54, 109, 218, 438, 881],
        (192, false) => [19, 37, 75, 152, 305, 611],
        (256, false) => [14, 29, 58, 118, 237, 476],
        (128, true) => [25, 51, 101, 202, 411, 827],
        (192, true) => [17, 35, 70, 141, 284, 571],
        (256, true) => [13, 27, 54, 109, 220, 443],
        _ => unreachable!("security level normalized before lookup"),
    };
    match degree {
        1024 => row[0],
        2048 => row[1],
        4096 => row[2],
        8192 => row[3],
        16384 => row[4],
        32768 => row[5],
        _ => 0,
    }
}

/// The smallest degree whose standard row admits `bit_count` total bits.
pub fn min_degree_for_bit_count(
    security_level: u32,
    quantum_safe: bool,
    bit_count: u32,
) -> Result<u32> {
    let tier = if security_level <= 128 {
        128
    } else if security_level <= 192 {
        192
    } else if security_level <= 256 {
        256
    } else {
        return Err(Error::UnsupportedSecurityLevel(security_level));
    };
    let mut degree = 1024;
    let mut max_bits_seen = 0;
    loop {
        let max_bits = he_std_max_bits(tier, quantum_safe, degree);
        max_bits_seen = max_bits_seen.max(max_bits);
        if max_bits == 0 {
            return Err(Error::ModulusTooLarge {
                required: bit_count,
                available: max_bits_seen,
            });
        }
        if max_bits >= bit_count {
            return Ok(degree);
        }
        degree *= 2;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ckks::rescale::test_util::typed;
    use crate::ir::{Attribute, TermId};

    fn scaled_input(p: &mut Program, name: &str, scale: u32) -> TermId {
        let t = p.make_input(name, Type::Cipher);
        p.term_mut(t)
            .set_attribute(Attribute::EncodeAtScale(scale));
        t
    }

    fn output_with_range(p: &mut Program, name: &str, term: TermId, range: u32) -> TermId {
        let out = p.make_output(name, term);
        p.term_mut(out).set_attribute(Attribute::Range(range));
        out
    }

    #[test]
    fn rescale_path_sets_the_middle_primes() {
        let mut p = Program::new("p", 4).unwrap();
        let a = scaled_input(&mut p, "a", 60);
        let b = scaled_input(&mut p, "b", 60);
        let m = p.make_term(Op::Mul, &[a, b]);
        let r = p.make_rescale(m, 60);
        output_with_range(&mut p, "y", r, 30);

        let mut scales = TermMapOptional::new();
        for t in [a, b] {
            scales.set(t, 60);
        }
        scales.set(m, 120);
        scales.set(r, 60);
        let y = p.get_output("y").unwrap();
        scales.set(y, 60);
        let types = typed(&mut p);

        // Output needs 30 + 60 = 90 bits: top primes [60, 30], middle [60],
        // key prime 60.
        let parms = select_prime_bits(&p, &scales, &types).unwrap();
        assert_eq!(parms, vec![60, 30, 60, 60]);
    }

    #[test]
    fn output_range_drives_the_top_primes() {
        // Two identical programs differing only in output range.
        let build = |range: u32| {
            let mut p = Program::new("p", 4).unwrap();
            let a = scaled_input(&mut p, "a", 40);
            output_with_range(&mut p, "y", a, range);
            let mut scales = TermMapOptional::new();
            scales.set(a, 40);
            let y = p.get_output("y").unwrap();
            scales.set(y, 40);
            let types = typed(&mut p);
            select_prime_bits(&p, &scales, &types).unwrap()
        };
        // 40 + 20 = 60 bits fit one top prime; 40 + 80 = 120 take two.
        assert_eq!(build(20), vec![60, 60]);
        assert_eq!(build(80), vec![60, 60, 60]);
    }

    #[test]
    fn small_remainders_round_up_to_twenty_bits() {
        let mut p = Program::new("p", 4).unwrap();
        let a = scaled_input(&mut p, "a", 60);
        output_with_range(&mut p, "y", a, 10);
        let mut scales = TermMapOptional::new();
        scales.set(a, 60);
        let y = p.get_output("y").unwrap();
        scales.set(y, 60);
        let types = typed(&mut p);
        // 70 bits: one 60-bit prime plus max(20, 10).
        let parms = select_prime_bits(&p, &scales, &types).unwrap();
        assert_eq!(parms, vec![60, 20, 60]);
    }

    #[test]
    fn missing_output_range_is_an_error() {
        let mut p = Program::new("p", 4).unwrap();
        let a = scaled_input(&mut p, "a", 40);
        let y = p.make_output("y", a);
        let mut scales = TermMapOptional::new();
        scales.set(a, 40);
        scales.set(y, 40);
        let types = typed(&mut p);
        assert!(matches!(
            select_prime_bits(&p, &scales, &types),
            Err(Error::OutputRangeNotSet(_))
        ));
    }

    #[test]
    fn degree_grows_with_the_bit_budget() {
        assert_eq!(min_degree_for_bit_count(128, false, 27).unwrap(), 1024);
        assert_eq!(min_degree_for_bit_count(128, false, 28).unwrap(), 2048);
        assert_eq!(min_degree_for_bit_count(128, false, 200).unwrap(), 8192);
        assert_eq!(min_degree_for_bit_count(128, false, 881).unwrap(), 32768);
    }

    #[test]
    fn quantum_safe_rows_are_tighter() {
        let classical = min_degree_for_bit_count(128, false, 100).unwrap();
        let quantum = min_degree_for_bit_count(128, true, 100).unwrap();
        assert_eq!(classical, 4096);
        assert_eq!(quantum, 4096);
        assert_eq!(min_degree_for_bit_count(128, true, 105).unwrap(), 8192);
        assert_eq!(min_degree_for_bit_count(128, false, 105).unwrap(), 4096);
    }

    #[test]
    fn higher_security_needs_higher_degrees() {
        assert_eq!(min_degree_for_bit_count(192, false, 100).unwrap(), 8192);
        assert_eq!(min_degree_for_bit_count(256, false, 100).unwrap(), 8192);
    }

    #[test]
    fn unsupported_security_level_is_an_error() {
        assert!(matches!(
            min_degree_for_bit_count(300, false, 100),
            Err(Error::UnsupportedSecurityLevel(300))
        ));
    }

    #[test]
    fn over_budget_is_an_error() {
        assert!(matches!(
            min_degree_for_bit_count(128, false, 900),
            Err(Error::ModulusTooLarge {
                required: 900,
                available: 881
            })
        ));
    }
}

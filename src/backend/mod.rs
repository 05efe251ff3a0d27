//! The backend boundary: the capability contract a CKKS library must
//! implement, and a generic executor that drives compiled programs against
//! any implementation.
//!
//! The compiler never links a CKKS library itself. It emits a rewritten
//! [`Program`], [`CkksParameters`] and a [`CkksSignature`](crate::ckks::CkksSignature);
//! everything cryptographic happens behind [`CkksBackend`].

use crate::ckks::CkksParameters;
use crate::error::{Error, Result};
use crate::ir::{Op, Program, TermId, TermMapOptional, Type};

/// The operations a CKKS library must provide.
///
/// Implementations are expected to be approximate: results only match the
/// reference semantics up to CKKS noise.
pub trait CkksBackend {
    /// An encrypted vector.
    type Ciphertext: Clone;
    /// An encoded but unencrypted vector.
    type Plaintext: Clone;

    /// Generate keys for the given parameters (including Galois keys for
    /// every rotation listed).
    fn generate_keys(&mut self, parameters: &CkksParameters) -> Result<()>;

    /// Encode a vector at the given level and scale.
    fn encode(&mut self, values: &[f64], level: u32, scale: u32) -> Result<Self::Plaintext>;
    /// Encrypt an encoded plaintext.
    fn encrypt(&mut self, plain: &Self::Plaintext) -> Result<Self::Ciphertext>;
    /// Decrypt to a plaintext.
    fn decrypt(&mut self, cipher: &Self::Ciphertext) -> Result<Self::Plaintext>;
    /// Decode a plaintext back to a vector.
    fn decode(&mut self, plain: &Self::Plaintext) -> Result<Vec<f64>>;

    /// Ciphertext + ciphertext.
    fn add(&mut self, a: &Self::Ciphertext, b: &Self::Ciphertext) -> Result<Self::Ciphertext>;
    /// Ciphertext + plaintext.
    fn add_plain(&mut self, a: &Self::Ciphertext, b: &Self::Plaintext)
        -> Result<Self::Ciphertext>;
    /// Ciphertext − ciphertext.
    fn sub(&mut self, a: &Self::Ciphertext, b: &Self::Ciphertext) -> Result<Self::Ciphertext>;
    /// Ciphertext − plaintext.
    fn sub_plain(&mut self, a: &Self::Ciphertext, b: &Self::Plaintext)
        -> Result<Self::Ciphertext>;
    /// Ciphertext × ciphertext.
    fn mul(&mut self, a: &Self::Ciphertext, b: &Self::Ciphertext) -> Result<Self::Ciphertext>;
    /// Ciphertext × plaintext.
    fn mul_plain(&mut self, a: &Self::Ciphertext, b: &Self::Plaintext)
        -> Result<Self::Ciphertext>;
    /// Negate a ciphertext.
    fn negate(&mut self, a: &Self::Ciphertext) -> Result<Self::Ciphertext>;
    /// Rotate a ciphertext left by `steps` (negative steps rotate right).
    fn rotate(&mut self, a: &Self::Ciphertext, steps: i32) -> Result<Self::Ciphertext>;
    /// Reduce ciphertext degree after multiplication.
    fn relinearize(&mut self, a: &Self::Ciphertext) -> Result<Self::Ciphertext>;
    /// Drop to the next modulus level without changing scale.
    fn mod_switch_to_next(&mut self, a: &Self::Ciphertext) -> Result<Self::Ciphertext>;
    /// Divide the scale by the next prime and drop a level.
    fn rescale_to_next(&mut self, a: &Self::Ciphertext) -> Result<Self::Ciphertext>;
}

/// A value flowing through execution: encrypted, encoded, or still raw.
pub enum RuntimeValue<B: CkksBackend> {
    /// An encrypted vector.
    Cipher(B::Ciphertext),
    /// An encoded plaintext.
    Plain(B::Plaintext),
    /// An unencoded vector, evaluated locally.
    Raw(Vec<f64>),
}

impl<B: CkksBackend> Clone for RuntimeValue<B> {
    fn clone(&self) -> Self {
        match self {
            RuntimeValue::Cipher(c) => RuntimeValue::Cipher(c.clone()),
            RuntimeValue::Plain(p) => RuntimeValue::Plain(p.clone()),
            RuntimeValue::Raw(v) => RuntimeValue::Raw(v.clone()),
        }
    }
}

/// Drives a compiled program through a backend.
///
/// Inputs are set per the program's signature (encrypted inputs as
/// ciphertexts, plain inputs as plaintexts, raw inputs as vectors); the
/// executor walks the graph once, dispatching each term to the backend or,
/// for Raw subgraphs, computing locally in double precision.
pub struct Executor<'a, B: CkksBackend> {
    program: &'a Program,
    backend: &'a mut B,
    values: TermMapOptional<RuntimeValue<B>>,
    scratch: Vec<f64>,
}

fn rotate_raw(input: &[f64], steps: i32) -> Vec<f64> {
    let len = input.len() as i32;
    let steps = steps.rem_euclid(len) as usize;
    let mut out = Vec::with_capacity(input.len());
    out.extend_from_slice(&input[steps..]);
    out.extend_from_slice(&input[..steps]);
    out
}

// Free accessors keep the borrows scoped to the value table, leaving the
// backend free for mutable calls in the same expression.
fn cipher_of<B: CkksBackend>(
    values: &TermMapOptional<RuntimeValue<B>>,
    term: TermId,
) -> Result<&B::Ciphertext> {
    match &values[term] {
        RuntimeValue::Cipher(c) => Ok(c),
        _ => Err(Error::UnsupportedOperation),
    }
}

fn raw_of<B: CkksBackend>(
    values: &TermMapOptional<RuntimeValue<B>>,
    term: TermId,
) -> Result<&Vec<f64>> {
    match &values[term] {
        RuntimeValue::Raw(v) => Ok(v),
        _ => Err(Error::UnsupportedOperation),
    }
}

impl<'a, B: CkksBackend> Executor<'a, B> {
    /// An executor for one run of `program`.
    pub fn new(program: &'a Program, backend: &'a mut B) -> Executor<'a, B> {
        Executor {
            program,
            backend,
            values: TermMapOptional::new(),
            scratch: Vec::new(),
        }
    }

    /// Provide the value for a named input.
    pub fn set_input(&mut self, name: &str, value: RuntimeValue<B>) -> Result<()> {
        let id = self.program.get_input(name)?;
        if let RuntimeValue::Raw(v) = &value {
            if v.len() != self.program.vec_size() as usize {
                return Err(Error::InputLengthMismatch {
                    name: name.into(),
                    len: v.len(),
                    vec_size: self.program.vec_size(),
                });
            }
        }
        self.values.set(id, value);
        Ok(())
    }

    fn is_cipher(&self, term: TermId) -> bool {
        matches!(self.values[term], RuntimeValue::Cipher(_))
    }

    fn is_raw(&self, term: TermId) -> bool {
        matches!(self.values[term], RuntimeValue::Raw(_))
    }

    fn add_dispatch(&mut self, a: TermId, b: TermId) -> Result<RuntimeValue<B>> {
        // The cipher operand leads; addition commutes.
        if !self.is_cipher(a) && self.is_cipher(b) {
            return self.add_dispatch(b, a);
        }
        if self.is_raw(a) && self.is_raw(b) {
            let out = raw_of(&self.values, a)?
                .iter()
                .zip(raw_of(&self.values, b)?)
                .map(|(x, y)| x + y)
                .collect();
            return Ok(RuntimeValue::Raw(out));
        }
        let lhs = cipher_of(&self.values, a)?;
        match &self.values[b] {
            RuntimeValue::Cipher(rhs) => Ok(RuntimeValue::Cipher(self.backend.add(lhs, rhs)?)),
            RuntimeValue::Plain(rhs) => {
                Ok(RuntimeValue::Cipher(self.backend.add_plain(lhs, rhs)?))
            }
            RuntimeValue::Raw(_) => Err(Error::UnsupportedOperation),
        }
    }

    fn sub_dispatch(&mut self, a: TermId, b: TermId) -> Result<RuntimeValue<B>> {
        if self.is_raw(a) && self.is_raw(b) {
            let out = raw_of(&self.values, a)?
                .iter()
                .zip(raw_of(&self.values, b)?)
                .map(|(x, y)| x - y)
                .collect();
            return Ok(RuntimeValue::Raw(out));
        }
        // Lowering guarantees the left operand of a remaining Sub is cipher.
        let lhs = cipher_of(&self.values, a)?;
        match &self.values[b] {
            RuntimeValue::Cipher(rhs) => Ok(RuntimeValue::Cipher(self.backend.sub(lhs, rhs)?)),
            RuntimeValue::Plain(rhs) => {
                Ok(RuntimeValue::Cipher(self.backend.sub_plain(lhs, rhs)?))
            }
            RuntimeValue::Raw(_) => Err(Error::UnsupportedOperation),
        }
    }

    fn mul_dispatch(&mut self, a: TermId, b: TermId) -> Result<RuntimeValue<B>> {
        if !self.is_cipher(a) && self.is_cipher(b) {
            return self.mul_dispatch(b, a);
        }
        if self.is_raw(a) && self.is_raw(b) {
            let out = raw_of(&self.values, a)?
                .iter()
                .zip(raw_of(&self.values, b)?)
                .map(|(x, y)| x * y)
                .collect();
            return Ok(RuntimeValue::Raw(out));
        }
        let lhs = cipher_of(&self.values, a)?;
        match &self.values[b] {
            RuntimeValue::Cipher(rhs) => Ok(RuntimeValue::Cipher(self.backend.mul(lhs, rhs)?)),
            RuntimeValue::Plain(rhs) => {
                Ok(RuntimeValue::Cipher(self.backend.mul_plain(lhs, rhs)?))
            }
            RuntimeValue::Raw(_) => Err(Error::UnsupportedOperation),
        }
    }

    /// Execute the program. All inputs must have been set.
    pub fn run(&mut self) -> Result<()> {
        for (name, &id) in self.program.inputs() {
            if !self.values.has(id) {
                return Err(Error::InputNotSet(name.clone()));
            }
        }
        for term in self.program.topological_order() {
            let data = self.program.term(term);
            let args = data.operands();
            let result = match data.op() {
                Op::Input => continue,
                Op::Constant => {
                    data.constant_value()
                        .expect("constant term carries a value")
                        .expand_to(&mut self.scratch, self.program.vec_size() as usize);
                    RuntimeValue::Raw(self.scratch.clone())
                }
                Op::Encode => {
                    let values = raw_of(&self.values, args[0])?.clone();
                    let level = data.encode_at_level().expect("encode level recorded");
                    let scale = data.encode_at_scale().expect("encode scale recorded");
                    RuntimeValue::Plain(self.backend.encode(&values, level, scale)?)
                }
                Op::Add => self.add_dispatch(args[0], args[1])?,
                Op::Sub => self.sub_dispatch(args[0], args[1])?,
                Op::Mul => self.mul_dispatch(args[0], args[1])?,
                Op::Negate => {
                    if self.is_raw(args[0]) {
                        RuntimeValue::Raw(
                            raw_of(&self.values, args[0])?.iter().map(|v| -v).collect(),
                        )
                    } else {
                        RuntimeValue::Cipher(
                            self.backend.negate(cipher_of(&self.values, args[0])?)?,
                        )
                    }
                }
                Op::RotateLeftConst => {
                    let steps = data.rotation().expect("rotation step recorded");
                    if self.is_raw(args[0]) {
                        RuntimeValue::Raw(rotate_raw(raw_of(&self.values, args[0])?, steps))
                    } else {
                        RuntimeValue::Cipher(
                            self.backend.rotate(cipher_of(&self.values, args[0])?, steps)?,
                        )
                    }
                }
                Op::RotateRightConst => {
                    let steps = data.rotation().expect("rotation step recorded");
                    if self.is_raw(args[0]) {
                        RuntimeValue::Raw(rotate_raw(raw_of(&self.values, args[0])?, -steps))
                    } else {
                        RuntimeValue::Cipher(
                            self.backend
                                .rotate(cipher_of(&self.values, args[0])?, -steps)?,
                        )
                    }
                }
                Op::Relinearize => RuntimeValue::Cipher(
                    self.backend
                        .relinearize(cipher_of(&self.values, args[0])?)?,
                ),
                Op::ModSwitch => RuntimeValue::Cipher(
                    self.backend
                        .mod_switch_to_next(cipher_of(&self.values, args[0])?)?,
                ),
                Op::Rescale => RuntimeValue::Cipher(
                    self.backend
                        .rescale_to_next(cipher_of(&self.values, args[0])?)?,
                ),
                Op::Output => self.values[args[0]].clone(),
                Op::Undef => panic!("Undef term in program"),
            };
            self.values.set(term, result);
        }
        Ok(())
    }

    /// The value computed for a named output.
    pub fn output(&self, name: &str) -> Result<&RuntimeValue<B>> {
        let id = self.program.get_output(name)?;
        Ok(&self.values[id])
    }
}

/// Whether the compiled signature marks `name` as an encrypted input.
pub fn input_is_cipher(program: &Program, name: &str) -> Result<bool> {
    let id = program.get_input(name)?;
    Ok(program.term(id).type_attribute() == Some(Type::Cipher))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::cfg::CkksConfig;
    use crate::ckks::CkksCompiler;
    use crate::ir::eval::{evaluate, Valuation};
    use crate::ir::Attribute;

    /// A transparent backend: ciphertexts and plaintexts are bare vectors.
    /// It exercises the executor's dispatch without any cryptography.
    struct PlainBackend {
        keys_generated: bool,
        rotations: Vec<i32>,
    }

    impl PlainBackend {
        fn new() -> PlainBackend {
            PlainBackend {
                keys_generated: false,
                rotations: Vec::new(),
            }
        }
    }

    impl CkksBackend for PlainBackend {
        type Ciphertext = Vec<f64>;
        type Plaintext = Vec<f64>;

        fn generate_keys(&mut self, parameters: &CkksParameters) -> Result<()> {
            self.keys_generated = true;
            self.rotations = parameters.rotations.iter().copied().collect();
            Ok(())
        }

        fn encode(&mut self, values: &[f64], _level: u32, _scale: u32) -> Result<Vec<f64>> {
            Ok(values.to_vec())
        }

        fn encrypt(&mut self, plain: &Vec<f64>) -> Result<Vec<f64>> {
            Ok(plain.clone())
        }

        fn decrypt(&mut self, cipher: &Vec<f64>) -> Result<Vec<f64>> {
            Ok(cipher.clone())
        }

        fn decode(&mut self, plain: &Vec<f64>) -> Result<Vec<f64>> {
            Ok(plain.clone())
        }

        fn add(&mut self, a: &Vec<f64>, b: &Vec<f64>) -> Result<Vec<f64>> {
            Ok(a.iter().zip(b).map(|(x, y)| x + y).collect())
        }

        fn add_plain(&mut self, a: &Vec<f64>, b: &Vec<f64>) -> Result<Vec<f64>> {
            self.add(a, b)
        }

        fn sub(&mut self, a: &Vec<f64>, b: &Vec<f64>) -> Result<Vec<f64>> {
            Ok(a.iter().zip(b).map(|(x, y)| x - y).collect())
        }

        fn sub_plain(&mut self, a: &Vec<f64>, b: &Vec<f64>) -> Result<Vec<f64>> {
            self.sub(a, b)
        }

        fn mul(&mut self, a: &Vec<f64>, b: &Vec<f64>) -> Result<Vec<f64>> {
            Ok(a.iter().zip(b).map(|(x, y)| x * y).collect())
        }

        fn mul_plain(&mut self, a: &Vec<f64>, b: &Vec<f64>) -> Result<Vec<f64>> {
            self.mul(a, b)
        }

        fn negate(&mut self, a: &Vec<f64>) -> Result<Vec<f64>> {
            Ok(a.iter().map(|v| -v).collect())
        }

        fn rotate(&mut self, a: &Vec<f64>, steps: i32) -> Result<Vec<f64>> {
            Ok(rotate_raw(a, steps))
        }

        fn relinearize(&mut self, a: &Vec<f64>) -> Result<Vec<f64>> {
            Ok(a.clone())
        }

        fn mod_switch_to_next(&mut self, a: &Vec<f64>) -> Result<Vec<f64>> {
            Ok(a.clone())
        }

        fn rescale_to_next(&mut self, a: &Vec<f64>) -> Result<Vec<f64>> {
            Ok(a.clone())
        }
    }

    #[test]
    fn executor_matches_the_reference_interpreter() {
        let mut p = Program::new("exec", 4).unwrap();
        let a = p.make_input("a", Type::Cipher);
        p.term_mut(a).set_attribute(Attribute::EncodeAtScale(60));
        let b = p.make_input("b", Type::Cipher);
        p.term_mut(b).set_attribute(Attribute::EncodeAtScale(60));
        let k = p.make_dense_constant(vec![0.5, 2.0]).unwrap();
        p.term_mut(k).set_attribute(Attribute::EncodeAtScale(30));
        let m = p.make_term(Op::Mul, &[a, b]);
        let scaled = p.make_term(Op::Mul, &[m, k]);
        let rot = p.make_left_rotation(scaled, 1);
        let sum = p.make_term(Op::Add, &[rot, a]);
        let y = p.make_output("y", sum);
        p.term_mut(y).set_attribute(Attribute::Range(30));

        let compiler = CkksCompiler::with_config(CkksConfig {
            warn_vec_size: false,
            ..CkksConfig::default()
        });
        let (compiled, parameters, signature) = compiler.compile(&p).unwrap();

        let mut backend = PlainBackend::new();
        backend.generate_keys(&parameters).unwrap();

        let input_a = vec![1.5, -2.0, 3.0, 0.25];
        let input_b = vec![4.0, 0.5, -1.0, 8.0];
        let mut executor = Executor::new(&compiled, &mut backend);
        for (name, values) in [("a", &input_a), ("b", &input_b)] {
            let info = &signature.inputs[name];
            assert_eq!(info.input_type, Type::Cipher);
            executor
                .set_input(name, RuntimeValue::Cipher(values.clone()))
                .unwrap();
        }
        executor.run().unwrap();

        let mut inputs = Valuation::default();
        inputs.insert("a".into(), input_a);
        inputs.insert("b".into(), input_b);
        let reference = evaluate(&p, &inputs).unwrap();

        match executor.output("y").unwrap() {
            RuntimeValue::Cipher(values) => assert_eq!(values, &reference["y"]),
            _ => panic!("expected an encrypted output"),
        }
    }

    #[test]
    fn missing_executor_input_errors() {
        let mut p = Program::new("exec", 4).unwrap();
        let a = p.make_input("a", Type::Cipher);
        p.make_output("y", a);
        let mut backend = PlainBackend::new();
        let mut executor = Executor::new(&p, &mut backend);
        assert!(matches!(executor.run(), Err(Error::InputNotSet(_))));
    }

    #[test]
    fn raw_inputs_are_length_checked() {
        let mut p = Program::new("exec", 4).unwrap();
        p.make_input("a", Type::Raw);
        let mut backend = PlainBackend::new();
        let mut executor = Executor::new(&p, &mut backend);
        assert!(matches!(
            executor.set_input("a", RuntimeValue::Raw(vec![1.0])),
            Err(Error::InputLengthMismatch { .. })
        ));
    }

    #[test]
    fn raw_operands_under_cipher_ops_are_rejected() {
        // An uncompiled mixed program reaches the executor: the raw operand
        // was never encoded, which the backend cannot handle.
        let mut p = Program::new("exec", 2).unwrap();
        let a = p.make_input("a", Type::Cipher);
        let c = p.make_dense_constant(vec![1.0, 2.0]).unwrap();
        let m = p.make_term(Op::Mul, &[a, c]);
        p.make_output("y", m);

        let mut backend = PlainBackend::new();
        let mut executor = Executor::new(&p, &mut backend);
        executor
            .set_input("a", RuntimeValue::Cipher(vec![1.0, 2.0]))
            .unwrap();
        assert!(matches!(executor.run(), Err(Error::UnsupportedOperation)));
    }
}

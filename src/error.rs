use thiserror::Error;

/// Errors surfaced to users of the compiler.
///
/// Internal invariant violations (inconsistent use lists, scheme operations
/// reaching unencrypted subgraphs, and the like) are bugs and panic instead.
#[derive(Debug, Error)]
pub enum Error {
    /// Program construction with a zero vector size.
    #[error("Vector size must be non-zero")]
    ZeroVecSize,
    /// Program construction with a non-power-of-two vector size.
    #[error("Vector size must be a power-of-two")]
    NonPowerOfTwoVecSize,
    /// A constant whose length does not divide the vector size.
    #[error("Constant size must exactly divide the vector size")]
    BadConstantSize,
    /// Lookup of an input name that does not exist.
    #[error("No input named {0}")]
    UnknownInput(String),
    /// Lookup of an output name that does not exist.
    #[error("No output named {0}")]
    UnknownOutput(String),
    /// An input was not given a scale before compilation.
    #[error("The scale for input {0} was not set")]
    InputScaleNotSet(String),
    /// A constant was not given a scale before compilation.
    #[error("The scale for a constant was not set")]
    ConstantScaleNotSet,
    /// An output was not given a range before parameter selection.
    #[error("The range for output {0} was not set")]
    OutputRangeNotSet(String),
    /// An input was given a scale of zero.
    #[error("Program has an input with 0 scale")]
    ZeroScaleInput,
    /// Rewriting produced a term with scale zero.
    #[error("Compiled program results in a 0 scale term")]
    ZeroScaleTerm,
    /// Addition or subtraction with operands at different scales survived
    /// rescaling.
    #[error("Addition or subtraction in program has operands of non-equal scale")]
    UnequalAdditionScales,
    /// Two operands of some term impose incompatible prime chains.
    #[error("Inconsistent parameters: {0}")]
    InconsistentParameters(&'static str),
    /// An [`InconsistentParameters`](Self::InconsistentParameters) failure,
    /// rephrased with advice about the rescaling policy that produced it.
    #[error("{0}")]
    RescalerFailure(String),
    /// The program needs a larger modulus than any standard parameter set
    /// provides.
    #[error(
        "Program requires a {required} bit modulus, but parameters are \
         available for a maximum of {available}"
    )]
    ModulusTooLarge {
        /// Total modulus bit count the program needs.
        required: u32,
        /// Largest bit count any supported degree provides.
        available: u32,
    },
    /// A security level above 256 bits was requested.
    #[error("Up to 256 bit security is supported, but {0} bit security was requested")]
    UnsupportedSecurityLevel(u32),
    /// A configuration value that must parse failed to parse.
    #[error("Could not parse {kind} in {option}={value}")]
    BadOptionValue {
        /// Expected value kind, e.g. "boolean".
        kind: &'static str,
        /// Option name.
        option: &'static str,
        /// The value that failed to parse.
        value: String,
    },
    /// An executor input whose length does not match the program vector size.
    #[error(
        "The length of all inputs must be the same as program's vector size. \
         Input {name} has length {len}, but vector size is {vec_size}"
    )]
    InputLengthMismatch {
        /// Input name.
        name: String,
        /// Provided length.
        len: usize,
        /// Program vector size.
        vec_size: u32,
    },
    /// An executor input that was never provided.
    #[error("No value set for input {0}")]
    InputNotSet(String),
    /// The backend cannot execute an operation the program contains.
    #[error("Unsupported operation encountered")]
    UnsupportedOperation,
    /// A backend implementation failed.
    #[error("Backend error: {0}")]
    Backend(String),
    /// A persisted artifact with an unknown format version.
    #[error("Unsupported format version {found}, expected {expected}")]
    FormatVersion {
        /// Version found in the artifact.
        found: u32,
        /// Version this build reads and writes.
        expected: u32,
    },
    /// A persisted artifact that does not decode.
    #[error("Malformed serialized artifact: {0}")]
    MalformedArtifact(String),
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

//! The compilation pipeline: rewrites a program for CKKS execution,
//! validates it, and derives encryption parameters and the input signature.

use crate::cfg::{CkksConfig, RescalerPolicy};
use crate::ckks::encode_insert::insert_encodes;
use crate::ckks::levels_check::check_levels;
use crate::ckks::lowering::lower_for_backend;
use crate::ckks::mod_switch::insert_mod_switches;
use crate::ckks::parameter_check::check_parameters;
use crate::ckks::parameters::{min_degree_for_bit_count, select_prime_bits, CkksParameters};
use crate::ckks::relinearize::{eager_relinearize, lazy_relinearize};
use crate::ckks::rescale::{
    always_rescale, eager_waterline_rescale, lazy_waterline_rescale, minimum_rescale,
};
use crate::ckks::rotation_keys::select_rotation_keys;
use crate::ckks::scales_check::check_scales;
use crate::ckks::signature::{CkksSignature, EncodingInfo};
use crate::error::{Error, Result};
use crate::ir::{Program, TermMap, TermMapOptional, Type};
use crate::opt::balance::{combine_reductions, expand_reductions};
use crate::opt::cfold::fold_constants;
use crate::opt::type_deducer::deduce_types;
use crate::util::{verbosity_at_least, Verbosity};
use itertools::Itertools;
use log::{debug, info, warn};
use std::collections::BTreeMap;

/// Compiles programs for execution under CKKS.
pub struct CkksCompiler {
    config: CkksConfig,
}

impl Default for CkksCompiler {
    fn default() -> CkksCompiler {
        CkksCompiler::new()
    }
}

impl CkksCompiler {
    /// A compiler with the default configuration.
    pub fn new() -> CkksCompiler {
        CkksCompiler {
            config: CkksConfig::default(),
        }
    }

    /// A compiler with the given configuration.
    pub fn with_config(config: CkksConfig) -> CkksCompiler {
        CkksCompiler { config }
    }

    /// Compile `input`: returns the rewritten program, the encryption
    /// parameters it needs, and its input signature. The input program is
    /// not modified.
    pub fn compile(
        &self,
        input: &Program,
    ) -> Result<(Program, CkksParameters, CkksSignature)> {
        let mut program = input.deep_copy();
        info!(
            "Compiling {} for CKKS with:\n{}",
            program.name(),
            self.config
        );

        let mut types: TermMap<Type> = TermMap::new();
        let mut scales: TermMapOptional<u32> = TermMapOptional::new();
        for source in program.sources() {
            match program.term(source).encode_at_scale() {
                Some(scale) => scales.set(source, scale),
                None => {
                    for (name, &id) in program.inputs() {
                        if id == source {
                            return Err(Error::InputScaleNotSet(name.clone()));
                        }
                    }
                    return Err(Error::ConstantScaleNotSet);
                }
            }
        }

        self.transform(&mut program, &mut types, &mut scales);
        self.validate(&program, &types)?;
        let parameters = self.determine_parameters(&program, &scales, &types)?;
        let signature = extract_signature(&program);
        Ok((program, parameters, signature))
    }

    fn transform(
        &self,
        program: &mut Program,
        types: &mut TermMap<Type>,
        scales: &mut TermMapOptional<u32>,
    ) {
        debug!("Running type deduction");
        deduce_types(program, types);
        debug!("Running constant folding");
        fold_constants(program, scales);
        if self.config.balance_reductions {
            debug!("Running reduction combining");
            combine_reductions(program);
            debug!("Running reduction expansion");
            expand_reductions(program, types);
        }
        debug!("Running {} rescaler", self.config.rescaler);
        match self.config.rescaler {
            RescalerPolicy::Minimum => minimum_rescale(program, types, scales),
            RescalerPolicy::Always => always_rescale(program, types, scales),
            RescalerPolicy::EagerWaterline => eager_waterline_rescale(program, types, scales),
            RescalerPolicy::LazyWaterline => lazy_waterline_rescale(program, types, scales),
        }
        debug!("Running type deduction");
        deduce_types(program, types);
        debug!("Running encode insertion");
        insert_encodes(program, types, scales);
        debug!("Running type deduction");
        deduce_types(program, types);
        if self.config.lazy_relinearize {
            debug!("Running lazy relinearization");
            lazy_relinearize(program, types, scales);
        } else {
            debug!("Running eager relinearization");
            eager_relinearize(program, types, scales);
        }
        debug!("Running type deduction");
        deduce_types(program, types);
        debug!("Running modulus switching");
        insert_mod_switches(program, types, scales);
        debug!("Running type deduction");
        deduce_types(program, types);
        debug!("Running backend lowering");
        lower_for_backend(program, types);
    }

    fn validate(&self, program: &Program, types: &TermMap<Type>) -> Result<()> {
        debug!("Running level checking");
        check_levels(program, types);
        debug!("Running parameter checking");
        if let Err(Error::InconsistentParameters(_)) = check_parameters(program, types) {
            let message = match self.config.rescaler {
                RescalerPolicy::Minimum => {
                    "The 'minimum' rescaler produced inconsistent parameters. Note that this \
                     rescaling policy is not general and thus will not work for all programs. \
                     Please use a different rescaler for this program."
                }
                RescalerPolicy::Always => {
                    "The 'always' rescaler produced inconsistent parameters. Note that this \
                     rescaling policy is not general. It is only guaranteed to work for programs \
                     that have equal scale for all inputs and constants."
                }
                _ => {
                    "The current rescaler produced inconsistent parameters. This is a bug, as \
                     this rescaler should be able to handle all programs."
                }
            };
            return Err(Error::RescalerFailure(message.into()));
        }
        debug!("Running scale checking");
        check_scales(program, types)
    }

    fn determine_parameters(
        &self,
        program: &Program,
        scales: &TermMapOptional<u32>,
        types: &TermMap<Type>,
    ) -> Result<CkksParameters> {
        debug!("Running encryption parameter selection");
        let prime_bits = select_prime_bits(program, scales, types)?;
        debug!("Running rotation key selection");
        let rotations = select_rotation_keys(program, types);

        let bit_count: u32 = prime_bits.iter().sum();
        let mut degree = min_degree_for_bit_count(
            self.config.security_level,
            self.config.quantum_safe,
            bit_count,
        )?;

        let slots = degree / 2;
        if self.config.warn_vec_size && slots > program.vec_size() {
            warn!(
                "Program specifies vector size {} while at least {} slots are required for \
                 security. This does not affect correctness, as the smaller vector size will be \
                 transparently emulated. However, using a vector size up to {} would come at no \
                 additional cost.",
                program.vec_size(),
                slots,
                slots
            );
        }
        if slots < program.vec_size() {
            if self.config.warn_vec_size {
                warn!(
                    "Program uses vector size {} while only {} slots are required for security. \
                     This does not affect correctness, but higher performance may be available \
                     with a smaller vector size.",
                    program.vec_size(),
                    slots
                );
            }
            degree = 2 * program.vec_size();
        }

        if verbosity_at_least(Verbosity::Info) {
            println!(
                "Encryption parameters for {} are:\n  Q = [{}] (total bits {})\n  N = 2^{} \
                 (available slots {})\n  Rotation keys: {} (count {})",
                program.name(),
                prime_bits.iter().join(","),
                bit_count,
                degree.trailing_zeros(),
                degree / 2,
                rotations.iter().join(", "),
                rotations.len()
            );
        }

        Ok(CkksParameters {
            prime_bits,
            rotations,
            poly_modulus_degree: degree,
        })
    }
}

fn extract_signature(program: &Program) -> CkksSignature {
    let mut inputs = BTreeMap::new();
    for (name, &id) in program.inputs() {
        let data = program.term(id);
        let input_type = data.type_attribute().expect("inputs declare a type");
        debug_assert_ne!(input_type, Type::Undef);
        inputs.insert(
            name.clone(),
            EncodingInfo {
                input_type,
                scale: data.encode_at_scale().expect("input scale checked"),
                level: data.encode_at_level().expect("levels recorded"),
            },
        );
    }
    CkksSignature {
        vec_size: program.vec_size(),
        inputs,
    }
}

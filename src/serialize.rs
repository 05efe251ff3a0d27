//! Serialization of the persisted artifacts: programs, encryption parameters
//! and signatures.
//!
//! A [`Program`] serializes as its terms in topological order, with operand
//! edges as positions into that order and attributes as their tagged
//! variants; names and indices are reassigned densely on load. Every
//! artifact is wrapped in a version tag, and loading rejects versions this
//! build does not understand. Byte framing is bincode.

use crate::ckks::{CkksParameters, CkksSignature};
use crate::error::{Error, Result};
use crate::ir::{Attribute, Op, Program, TermMap};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::{Read, Write};

/// Bumped for any change that breaks the serialized layout.
pub const FORMAT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct Envelope<T> {
    version: u32,
    payload: T,
}

/// One serialized term: its operation, operand positions and attributes.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TermFormat {
    op: Op,
    operands: Vec<u64>,
    attributes: Vec<Attribute>,
}

/// The serialized form of a [`Program`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProgramFormat {
    name: String,
    vec_size: u32,
    terms: Vec<TermFormat>,
    inputs: BTreeMap<String, u64>,
    outputs: BTreeMap<String, u64>,
}

/// Flatten a program into its serialized form.
pub fn encode_program(program: &Program) -> ProgramFormat {
    let order = program.topological_order();
    let mut position: TermMap<u64> = TermMap::new();
    for (i, &id) in order.iter().enumerate() {
        position[id] = i as u64;
    }
    let terms = order
        .iter()
        .map(|&id| {
            let data = program.term(id);
            TermFormat {
                op: data.op(),
                operands: data.operands().iter().map(|o| position[*o]).collect(),
                attributes: data.attributes().iter().cloned().collect(),
            }
        })
        .collect();
    let inputs = program
        .inputs()
        .iter()
        .map(|(name, id)| (name.clone(), position[*id]))
        .collect();
    let outputs = program
        .outputs()
        .iter()
        .map(|(name, id)| (name.clone(), position[*id]))
        .collect();
    ProgramFormat {
        name: program.name().to_string(),
        vec_size: program.vec_size(),
        terms,
        inputs,
        outputs,
    }
}

/// Rebuild a program from its serialized form.
pub fn decode_program(format: &ProgramFormat) -> Result<Program> {
    let mut program = Program::new(format.name.clone(), format.vec_size)?;
    let mut ids = Vec::with_capacity(format.terms.len());
    for term in &format.terms {
        let mut operands = Vec::with_capacity(term.operands.len());
        for &position in &term.operands {
            let &id = ids
                .get(position as usize)
                .ok_or_else(|| Error::MalformedArtifact("operand before definition".into()))?;
            operands.push(id);
        }
        let id = program.make_term(term.op, &operands);
        for attr in &term.attributes {
            program.term_mut(id).set_attribute(attr.clone());
        }
        ids.push(id);
    }
    let resolve = |positions: &BTreeMap<String, u64>| -> Result<BTreeMap<String, _>> {
        positions
            .iter()
            .map(|(name, &position)| {
                ids.get(position as usize)
                    .map(|&id| (name.clone(), id))
                    .ok_or_else(|| Error::MalformedArtifact("name references no term".into()))
            })
            .collect()
    };
    for (name, id) in resolve(&format.inputs)? {
        program.register_input(name, id);
    }
    for (name, id) in resolve(&format.outputs)? {
        program.register_output(name, id);
    }
    Ok(program)
}

fn save<T: Serialize>(writer: impl Write, payload: T) -> Result<()> {
    bincode::serialize_into(
        writer,
        &Envelope {
            version: FORMAT_VERSION,
            payload,
        },
    )
    .map_err(|e| Error::MalformedArtifact(e.to_string()))
}

fn load<T: DeserializeOwned>(reader: impl Read) -> Result<T> {
    let envelope: Envelope<T> =
        bincode::deserialize_from(reader).map_err(|e| Error::MalformedArtifact(e.to_string()))?;
    if envelope.version != FORMAT_VERSION {
        return Err(Error::FormatVersion {
            found: envelope.version,
            expected: FORMAT_VERSION,
        });
    }
    Ok(envelope.payload)
}

/// Write a version-tagged program.
pub fn save_program(writer: impl Write, program: &Program) -> Result<()> {
    save(writer, encode_program(program))
}

/// Read a version-tagged program.
pub fn load_program(reader: impl Read) -> Result<Program> {
    decode_program(&load::<ProgramFormat>(reader)?)
}

/// Write version-tagged encryption parameters.
pub fn save_parameters(writer: impl Write, parameters: &CkksParameters) -> Result<()> {
    save(writer, parameters)
}

/// Read version-tagged encryption parameters.
pub fn load_parameters(reader: impl Read) -> Result<CkksParameters> {
    load(reader)
}

/// Write a version-tagged signature.
pub fn save_signature(writer: impl Write, signature: &CkksSignature) -> Result<()> {
    save(writer, signature)
}

/// Read a version-tagged signature.
pub fn load_signature(reader: impl Read) -> Result<CkksSignature> {
    load(reader)
}

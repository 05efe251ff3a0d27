use crate::error::{Error, Result};
use crate::ir::{Attribute, AttributeKey, AttributeList, ConstantValue, Op, TermMap, Type};
use itertools::Itertools;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{self, Display, Formatter};
use std::sync::Arc;

/// A stable handle for a term, keying every side table.
///
/// Indices are assigned monotonically and never reused, even after a term is
/// erased, so a side table built at any point in the pipeline stays valid.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct TermId(u64);

impl TermId {
    pub(crate) fn from_index(index: usize) -> TermId {
        TermId(index as u64)
    }

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl Display for TermId {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

/// One node of the program graph.
///
/// Operand edges are ordered use→def references; the use list is the
/// unordered def→use mirror, with one entry per operand slot that refers to
/// this term. Both are maintained by the [`Program`] mutators only.
#[derive(Clone, Debug)]
pub struct TermData {
    op: Op,
    operands: Vec<TermId>,
    uses: Vec<TermId>,
    attributes: AttributeList,
}

impl TermData {
    fn new(op: Op) -> TermData {
        TermData {
            op,
            operands: Vec::new(),
            uses: Vec::new(),
            attributes: AttributeList::new(),
        }
    }

    /// The operation this term performs.
    pub fn op(&self) -> Op {
        self.op
    }

    /// The ordered operand edges.
    pub fn operands(&self) -> &[TermId] {
        &self.operands
    }

    /// The use edges; duplicates mean a user holds this term in several
    /// operand slots.
    pub fn uses(&self) -> &[TermId] {
        &self.uses
    }

    /// Number of operand edges.
    pub fn num_operands(&self) -> usize {
        self.operands.len()
    }

    /// Number of use edges.
    pub fn num_uses(&self) -> usize {
        self.uses.len()
    }

    /// Whether this term has both operands and uses.
    pub fn is_internal(&self) -> bool {
        !self.operands.is_empty() && !self.uses.is_empty()
    }

    /// The attribute list.
    pub fn attributes(&self) -> &AttributeList {
        &self.attributes
    }

    /// Insert or replace an attribute.
    pub fn set_attribute(&mut self, attr: Attribute) {
        self.attributes.set(attr);
    }

    /// The rescale exponent, on `Rescale` terms.
    pub fn rescale_divisor(&self) -> Option<u32> {
        match self.attributes.get(AttributeKey::RescaleDivisor) {
            Some(Attribute::RescaleDivisor(d)) => Some(*d),
            _ => None,
        }
    }

    /// The rotation step, on rotation terms.
    pub fn rotation(&self) -> Option<i32> {
        match self.attributes.get(AttributeKey::Rotation) {
            Some(Attribute::Rotation(r)) => Some(*r),
            _ => None,
        }
    }

    /// The constant payload, on `Constant` terms.
    pub fn constant_value(&self) -> Option<&Arc<ConstantValue>> {
        match self.attributes.get(AttributeKey::ConstantValue) {
            Some(Attribute::ConstantValue(v)) => Some(v),
            _ => None,
        }
    }

    /// The declared type, on `Input` terms.
    pub fn type_attribute(&self) -> Option<Type> {
        match self.attributes.get(AttributeKey::Type) {
            Some(Attribute::Type(t)) => Some(*t),
            _ => None,
        }
    }

    /// The output range in bits, on `Output` terms.
    pub fn range(&self) -> Option<u32> {
        match self.attributes.get(AttributeKey::Range) {
            Some(Attribute::Range(r)) => Some(*r),
            _ => None,
        }
    }

    /// The scale at encoding time, on sources and `Encode` terms.
    pub fn encode_at_scale(&self) -> Option<u32> {
        match self.attributes.get(AttributeKey::EncodeAtScale) {
            Some(Attribute::EncodeAtScale(s)) => Some(*s),
            _ => None,
        }
    }

    /// The level at encoding time, on sources and `Encode` terms.
    pub fn encode_at_level(&self) -> Option<u32> {
        match self.attributes.get(AttributeKey::EncodeAtLevel) {
            Some(Attribute::EncodeAtLevel(l)) => Some(*l),
            _ => None,
        }
    }
}

/// A program: the arena of terms plus the named inputs and outputs.
///
/// The graph must stay acyclic; every edge mutator keeps operand and use
/// lists mirrored and the source/sink sets consistent.
pub struct Program {
    name: String,
    vec_size: u32,
    terms: Vec<Option<TermData>>,
    inputs: BTreeMap<String, TermId>,
    outputs: BTreeMap<String, TermId>,
    sources: BTreeSet<TermId>,
    sinks: BTreeSet<TermId>,
}

impl Program {
    /// A new, empty program. The vector size must be a positive power of two.
    pub fn new(name: impl Into<String>, vec_size: u32) -> Result<Program> {
        if vec_size == 0 {
            return Err(Error::ZeroVecSize);
        }
        if vec_size & (vec_size - 1) != 0 {
            return Err(Error::NonPowerOfTwoVecSize);
        }
        Ok(Program {
            name: name.into(),
            vec_size,
            terms: Vec::new(),
            inputs: BTreeMap::new(),
            outputs: BTreeMap::new(),
            sources: BTreeSet::new(),
            sinks: BTreeSet::new(),
        })
    }

    /// The program name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rename the program.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// The vector size every input, constant and output tiles to.
    pub fn vec_size(&self) -> u32 {
        self.vec_size
    }

    /// One beyond the largest index ever assigned.
    pub fn next_term_index(&self) -> u64 {
        self.terms.len() as u64
    }

    /// Whether `id` refers to a term that has not been erased.
    pub fn is_live(&self, id: TermId) -> bool {
        matches!(self.terms.get(id.index()), Some(Some(_)))
    }

    /// The term data for `id`. Panics if the term was erased.
    pub fn term(&self, id: TermId) -> &TermData {
        self.terms[id.index()]
            .as_ref()
            .unwrap_or_else(|| panic!("{} is not live", id))
    }

    /// Mutable term data for `id`. Panics if the term was erased.
    ///
    /// Edge lists are not reachable through this; use the `Program` mutators
    /// so the graph invariants hold.
    pub fn term_mut(&mut self, id: TermId) -> &mut TermData {
        self.terms[id.index()]
            .as_mut()
            .unwrap_or_else(|| panic!("{} is not live", id))
    }

    /// All live term ids, in index order.
    pub fn term_ids(&self) -> impl Iterator<Item = TermId> + '_ {
        self.terms
            .iter()
            .enumerate()
            .filter(|(_, t)| t.is_some())
            .map(|(i, _)| TermId::from_index(i))
    }

    /// The named inputs.
    pub fn inputs(&self) -> &BTreeMap<String, TermId> {
        &self.inputs
    }

    /// The named outputs.
    pub fn outputs(&self) -> &BTreeMap<String, TermId> {
        &self.outputs
    }

    /// The input named `name`.
    pub fn get_input(&self, name: &str) -> Result<TermId> {
        self.inputs
            .get(name)
            .copied()
            .ok_or_else(|| Error::UnknownInput(name.into()))
    }

    /// The output named `name`.
    pub fn get_output(&self, name: &str) -> Result<TermId> {
        self.outputs
            .get(name)
            .copied()
            .ok_or_else(|| Error::UnknownOutput(name.into()))
    }

    /// Snapshot of the terms with no operands, in index order.
    pub fn sources(&self) -> Vec<TermId> {
        self.sources.iter().copied().collect()
    }

    /// Snapshot of the terms with no uses, in index order.
    pub fn sinks(&self) -> Vec<TermId> {
        self.sinks.iter().copied().collect()
    }

    /// Create a term. It joins the sources iff `operands` is empty, and the
    /// sinks unconditionally.
    pub fn make_term(&mut self, op: Op, operands: &[TermId]) -> TermId {
        let id = TermId::from_index(self.terms.len());
        self.terms.push(Some(TermData::new(op)));
        self.sources.insert(id);
        self.sinks.insert(id);
        if !operands.is_empty() {
            self.set_operands(id, operands.to_vec());
        }
        id
    }

    /// Create a `Constant` term holding `value`.
    pub fn make_constant(&mut self, value: ConstantValue) -> TermId {
        let id = self.make_term(Op::Constant, &[]);
        self.term_mut(id)
            .set_attribute(Attribute::ConstantValue(Arc::new(value)));
        id
    }

    /// Create a dense constant; the value length must divide the vector size.
    pub fn make_dense_constant(&mut self, values: Vec<f64>) -> Result<TermId> {
        let value = ConstantValue::dense(self.vec_size as usize, values)?;
        Ok(self.make_constant(value))
    }

    /// Create a constant with the same value in every slot.
    pub fn make_uniform_constant(&mut self, value: f64) -> TermId {
        self.make_constant(ConstantValue::Dense {
            size: self.vec_size as usize,
            values: vec![value],
        })
    }

    pub(crate) fn register_input(&mut self, name: String, term: TermId) {
        self.inputs.insert(name, term);
    }

    pub(crate) fn register_output(&mut self, name: String, term: TermId) {
        self.outputs.insert(name, term);
    }

    /// Create and register a named input of the given type.
    pub fn make_input(&mut self, name: impl Into<String>, input_type: Type) -> TermId {
        let id = self.make_term(Op::Input, &[]);
        self.term_mut(id).set_attribute(Attribute::Type(input_type));
        self.inputs.insert(name.into(), id);
        id
    }

    /// Create and register a named output of `term`.
    pub fn make_output(&mut self, name: impl Into<String>, term: TermId) -> TermId {
        let id = self.make_term(Op::Output, &[term]);
        self.outputs.insert(name.into(), id);
        id
    }

    /// Create a left rotation of `term` by `steps`.
    pub fn make_left_rotation(&mut self, term: TermId, steps: i32) -> TermId {
        let id = self.make_term(Op::RotateLeftConst, &[term]);
        self.term_mut(id).set_attribute(Attribute::Rotation(steps));
        id
    }

    /// Create a right rotation of `term` by `steps`.
    pub fn make_right_rotation(&mut self, term: TermId, steps: i32) -> TermId {
        let id = self.make_term(Op::RotateRightConst, &[term]);
        self.term_mut(id).set_attribute(Attribute::Rotation(steps));
        id
    }

    /// Create a `Rescale` of `term` by `rescale_by` bits.
    pub fn make_rescale(&mut self, term: TermId, rescale_by: u32) -> TermId {
        let id = self.make_term(Op::Rescale, &[term]);
        self.term_mut(id)
            .set_attribute(Attribute::RescaleDivisor(rescale_by));
        id
    }

    fn add_use(&mut self, def: TermId, user: TermId) {
        let data = self.term_mut(def);
        if data.uses.is_empty() {
            self.sinks.remove(&def);
        }
        self.term_mut(def).uses.push(user);
    }

    fn erase_use(&mut self, def: TermId, user: TermId) {
        let data = self.term_mut(def);
        let pos = data
            .uses
            .iter()
            .position(|u| *u == user)
            .unwrap_or_else(|| panic!("{} has no use edge to {}", def, user));
        data.uses.remove(pos);
        let now_sink = data.uses.is_empty();
        if now_sink {
            self.sinks.insert(def);
        }
    }

    /// Append `operand` to `term`'s operand list.
    pub fn add_operand(&mut self, term: TermId, operand: TermId) {
        let data = self.term_mut(term);
        if data.operands.is_empty() {
            self.sources.remove(&term);
        }
        self.term_mut(term).operands.push(operand);
        self.add_use(operand, term);
    }

    /// Remove the first occurrence of `operand` from `term`'s operand list.
    /// Returns whether anything was removed.
    pub fn erase_operand(&mut self, term: TermId, operand: TermId) -> bool {
        let data = self.term_mut(term);
        let pos = match data.operands.iter().position(|o| *o == operand) {
            Some(pos) => pos,
            None => return false,
        };
        data.operands.remove(pos);
        let now_source = data.operands.is_empty();
        self.erase_use(operand, term);
        if now_source {
            self.sources.insert(term);
        }
        true
    }

    /// Replace every occurrence of `old` in `term`'s operand list with `new`.
    /// Returns whether anything was replaced.
    pub fn replace_operand(&mut self, term: TermId, old: TermId, new: TermId) -> bool {
        let mut replaced = 0;
        let data = self.term_mut(term);
        for slot in &mut data.operands {
            if *slot == old {
                *slot = new;
                replaced += 1;
            }
        }
        for _ in 0..replaced {
            self.erase_use(old, term);
            self.add_use(new, term);
        }
        replaced > 0
    }

    /// Replace `term`'s operand list wholesale.
    pub fn set_operands(&mut self, term: TermId, operands: Vec<TermId>) {
        let old = std::mem::take(&mut self.term_mut(term).operands);
        for o in old {
            self.erase_use(o, term);
        }
        for &o in &operands {
            self.add_use(o, term);
        }
        let now_empty = operands.is_empty();
        self.term_mut(term).operands = operands;
        if now_empty {
            self.sources.insert(term);
        } else {
            self.sources.remove(&term);
        }
    }

    /// Substitute `new` for `term` in the operand lists of every user.
    pub fn replace_all_uses_with(&mut self, term: TermId, new: TermId) {
        for user in self.term(term).uses.clone() {
            self.replace_operand(user, term, new);
        }
    }

    /// Substitute `new` for `term` in every user except `new` itself.
    pub fn replace_other_uses_with(&mut self, term: TermId, new: TermId) {
        for user in self.term(term).uses.clone() {
            if user != new {
                self.replace_operand(user, term, new);
            }
        }
    }

    fn is_retained(&self, id: TermId) -> bool {
        self.inputs.values().any(|t| *t == id) || self.outputs.values().any(|t| *t == id)
    }

    /// Erase `id` if nothing uses it and it is not a named input or output,
    /// cascading to operands that become unused in turn.
    ///
    /// This is how rewriting passes drop the subgraphs they orphan.
    pub fn erase_if_unused(&mut self, id: TermId) {
        let mut work = vec![id];
        while let Some(t) = work.pop() {
            if !self.is_live(t) || !self.term(t).uses.is_empty() || self.is_retained(t) {
                continue;
            }
            let data = self.terms[t.index()].take().expect("live term");
            self.sources.remove(&t);
            self.sinks.remove(&t);
            for o in data.operands {
                // erase_use on a tombstoned slot is impossible here: operands
                // of a live term are always live
                let uses = &mut self.terms[o.index()].as_mut().expect("live operand").uses;
                let pos = uses.iter().position(|u| *u == t).expect("mirrored edge");
                uses.remove(pos);
                if uses.is_empty() {
                    self.sinks.insert(o);
                    work.push(o);
                }
            }
        }
    }

    /// Live term ids in topological order: every term after its operands.
    ///
    /// Walks backward from the sinks, so terms unreachable from any sink
    /// (impossible in an acyclic graph) cannot be missed.
    pub fn topological_order(&self) -> Vec<TermId> {
        let mut order = Vec::new();
        let mut done = TermMap::<bool>::new();
        let mut work: Vec<(bool, TermId)> =
            self.sinks().into_iter().map(|t| (true, t)).collect();
        while let Some((visit, t)) = work.pop() {
            if done[t] {
                continue;
            }
            if visit {
                work.push((false, t));
                for &o in self.term(t).operands() {
                    if !done[o] {
                        work.push((true, o));
                    }
                }
            } else {
                done[t] = true;
                order.push(t);
            }
        }
        order
    }

    /// A structural copy with freshly assigned, dense indices.
    pub fn deep_copy(&self) -> Program {
        let mut copy = Program::new(self.name.clone(), self.vec_size)
            .expect("vector size validated at construction");
        let mut old_to_new = TermMap::<Option<TermId>>::new();
        for old in self.topological_order() {
            let data = self.term(old);
            let operands: Vec<TermId> = data
                .operands()
                .iter()
                .map(|o| old_to_new[*o].expect("operands precede users"))
                .collect();
            let new = copy.make_term(data.op(), &operands);
            copy.term_mut(new).attributes.assign_from(data.attributes());
            old_to_new[old] = Some(new);
        }
        for (name, id) in &self.inputs {
            copy.inputs
                .insert(name.clone(), old_to_new[*id].expect("input copied"));
        }
        for (name, id) in &self.outputs {
            copy.outputs
                .insert(name.clone(), old_to_new[*id].expect("output copied"));
        }
        copy
    }

    /// Render one term like `t3:Mul(t1,t2)`.
    pub fn display_term(&self, id: TermId) -> String {
        let data = self.term(id);
        format!(
            "{}:{}({})",
            id,
            data.op(),
            data.operands().iter().map(|o| o.to_string()).join(",")
        )
    }

    /// The graph in DOT format, for debugging.
    pub fn to_dot(&self) -> String {
        let mut s = String::new();
        s.push_str(&format!("digraph \"{}\" {{\n", self.name));
        for t in self.topological_order() {
            let data = self.term(t);
            let mut label = data.op().to_string();
            if let Some(d) = data.rescale_divisor() {
                label.push_str(&format!("({})", d));
            }
            if let Some(r) = data.rotation() {
                label.push_str(&format!("({})", r));
            }
            if let Some(ty) = data.type_attribute() {
                label.push_str(&format!(" : {}", ty));
            }
            s.push_str(&format!("{} [label=\"{}\"];\n", t, label));
            for (i, o) in data.operands().iter().enumerate() {
                s.push_str(&format!("{} -> {} [label=\"{}\"];\n", o, t, i));
            }
        }
        s.push_str("}\n");
        s
    }
}

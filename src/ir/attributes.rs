use crate::ir::{ConstantValue, Type};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Keys identifying term attributes.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Serialize, Deserialize)]
pub enum AttributeKey {
    /// See [`Attribute::RescaleDivisor`].
    RescaleDivisor,
    /// See [`Attribute::Rotation`].
    Rotation,
    /// See [`Attribute::ConstantValue`].
    ConstantValue,
    /// See [`Attribute::Type`].
    Type,
    /// See [`Attribute::Range`].
    Range,
    /// See [`Attribute::EncodeAtScale`].
    EncodeAtScale,
    /// See [`Attribute::EncodeAtLevel`].
    EncodeAtLevel,
}

/// A single term attribute: a tagged value attached to a term.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum Attribute {
    /// Rescale exponent in bits, on `Rescale` terms.
    RescaleDivisor(u32),
    /// Signed rotation step, on rotation terms.
    Rotation(i32),
    /// The value of a `Constant` term; shared so copies stay cheap.
    ConstantValue(Arc<ConstantValue>),
    /// Declared type, on `Input` terms.
    Type(Type),
    /// Output value range in bits, on `Output` terms.
    Range(u32),
    /// Scale in bits at encoding time, on sources and `Encode` terms.
    EncodeAtScale(u32),
    /// Modulus level at encoding time, on sources and `Encode` terms.
    EncodeAtLevel(u32),
}

impl Attribute {
    /// The key this attribute is stored under.
    pub fn key(&self) -> AttributeKey {
        match self {
            Attribute::RescaleDivisor(_) => AttributeKey::RescaleDivisor,
            Attribute::Rotation(_) => AttributeKey::Rotation,
            Attribute::ConstantValue(_) => AttributeKey::ConstantValue,
            Attribute::Type(_) => AttributeKey::Type,
            Attribute::Range(_) => AttributeKey::Range,
            Attribute::EncodeAtScale(_) => AttributeKey::EncodeAtScale,
            Attribute::EncodeAtLevel(_) => AttributeKey::EncodeAtLevel,
        }
    }
}

/// The attributes of one term: a small sorted list with linear lookup.
///
/// The cardinality is single-digit, so a sorted `Vec` beats any hashed
/// structure here.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AttributeList {
    entries: Vec<Attribute>,
}

impl AttributeList {
    /// An empty list.
    pub fn new() -> AttributeList {
        AttributeList::default()
    }

    /// Insert or replace the attribute with `attr`'s key.
    pub fn set(&mut self, attr: Attribute) {
        match self.entries.iter().position(|e| e.key() >= attr.key()) {
            Some(i) if self.entries[i].key() == attr.key() => self.entries[i] = attr,
            Some(i) => self.entries.insert(i, attr),
            None => self.entries.push(attr),
        }
    }

    /// The attribute stored under `key`, if any.
    pub fn get(&self, key: AttributeKey) -> Option<&Attribute> {
        self.entries.iter().find(|e| e.key() == key)
    }

    /// Whether an attribute is stored under `key`.
    pub fn has(&self, key: AttributeKey) -> bool {
        self.get(key).is_some()
    }

    /// All attributes, in key order.
    pub fn iter(&self) -> impl Iterator<Item = &Attribute> {
        self.entries.iter()
    }

    /// Copy every attribute of `other` into this list.
    pub fn assign_from(&mut self, other: &AttributeList) {
        for attr in other.iter() {
            self.set(attr.clone());
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn set_get_replace() {
        let mut l = AttributeList::new();
        assert!(!l.has(AttributeKey::Rotation));
        l.set(Attribute::Rotation(3));
        l.set(Attribute::EncodeAtScale(30));
        l.set(Attribute::RescaleDivisor(60));
        match l.get(AttributeKey::Rotation) {
            Some(Attribute::Rotation(3)) => {}
            other => panic!("unexpected: {:?}", other),
        }
        l.set(Attribute::Rotation(-5));
        match l.get(AttributeKey::Rotation) {
            Some(Attribute::Rotation(-5)) => {}
            other => panic!("unexpected: {:?}", other),
        }
        assert_eq!(l.iter().count(), 3);
    }

    #[test]
    fn entries_stay_sorted() {
        let mut l = AttributeList::new();
        l.set(Attribute::EncodeAtLevel(1));
        l.set(Attribute::RescaleDivisor(60));
        l.set(Attribute::Range(20));
        let keys: Vec<_> = l.iter().map(|a| a.key()).collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
    }

    #[test]
    fn assign_from_copies_all() {
        let mut a = AttributeList::new();
        a.set(Attribute::Rotation(7));
        a.set(Attribute::EncodeAtScale(40));
        let mut b = AttributeList::new();
        b.set(Attribute::Rotation(1));
        b.assign_from(&a);
        match b.get(AttributeKey::Rotation) {
            Some(Attribute::Rotation(7)) => {}
            other => panic!("unexpected: {:?}", other),
        }
        assert!(b.has(AttributeKey::EncodeAtScale));
    }
}

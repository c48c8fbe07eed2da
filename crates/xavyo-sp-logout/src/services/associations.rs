//! Cross-party associations recorded on a local session.
//!
//! Keys at the top level are party ids (the IdPs or SPs a local session is
//! also logged into). Merging keeps first-seen key order, which becomes the
//! order in which parties are visited during logout.

/// A value stored under an association key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssociationValue {
    Scalar(String),
    Sequence(Vec<AssociationValue>),
    Map(Associations),
}

impl AssociationValue {
    /// Combine two values stored under the same key.
    ///
    /// Maps merge recursively; anything else becomes a sequence holding both
    /// sides, flattening sequences that are already present.
    #[must_use]
    pub fn combine(self, other: AssociationValue) -> AssociationValue {
        match (self, other) {
            (AssociationValue::Map(mut left), AssociationValue::Map(right)) => {
                left.merge(right);
                AssociationValue::Map(left)
            }
            (AssociationValue::Sequence(mut left), AssociationValue::Sequence(right)) => {
                left.extend(right);
                AssociationValue::Sequence(left)
            }
            (AssociationValue::Sequence(mut left), right) => {
                left.push(right);
                AssociationValue::Sequence(left)
            }
            (left, AssociationValue::Sequence(right)) => {
                let mut values = Vec::with_capacity(right.len() + 1);
                values.push(left);
                values.extend(right);
                AssociationValue::Sequence(values)
            }
            (left, right) => AssociationValue::Sequence(vec![left, right]),
        }
    }
}

impl From<&str> for AssociationValue {
    fn from(value: &str) -> Self {
        AssociationValue::Scalar(value.to_string())
    }
}

impl From<String> for AssociationValue {
    fn from(value: String) -> Self {
        AssociationValue::Scalar(value)
    }
}

impl From<Associations> for AssociationValue {
    fn from(value: Associations) -> Self {
        AssociationValue::Map(value)
    }
}

/// Insertion-ordered association map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Associations {
    entries: Vec<(String, AssociationValue)>,
}

impl Associations {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert; a repeated key is combined, not replaced.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<AssociationValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert a value, combining with any value already stored under `key`.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<AssociationValue>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter().position(|(k, _)| *k == key) {
            Some(pos) => {
                let (_, existing) = self.entries.remove(pos);
                self.entries.insert(pos, (key, existing.combine(value)));
            }
            None => self.entries.push((key, value)),
        }
    }

    /// Deep-merge `other` into `self`.
    pub fn merge(&mut self, other: Associations) {
        for (key, value) in other.entries {
            self.insert(key, value);
        }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&AssociationValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Party ids in first-seen order.
    pub fn party_ids(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

use crate::values::Value;

/// An association list over arena storage.
///
/// Entry order is the construction order; equality and lookup ignore it.
/// Construction steps reject duplicate keys, so lookup can stop at the first
/// match.
#[derive(Debug, Clone, Copy)]
pub struct MapValue<'a> {
    pub entries: &'a [(Value<'a>, Value<'a>)],
}

impl<'a> MapValue<'a> {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Find the value for `key`. With `heterogeneous` set, int/uint/double
    /// keys match across kinds where the conversion is lossless, so
    /// `m[2]` and `m[2u]` address the same entry.
    pub fn lookup(&self, key: Value<'a>, heterogeneous: bool) -> Option<Value<'a>> {
        self.entries
            .iter()
            .find(|(k, _)| k.equals(&key, heterogeneous))
            .map(|(_, v)| *v)
    }

    pub fn contains_key(&self, key: Value<'a>, heterogeneous: bool) -> bool {
        self.lookup(key, heterogeneous).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = Value<'a>> + '_ {
        self.entries.iter().map(|(k, _)| *k)
    }
}

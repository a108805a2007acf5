use std::sync::LazyLock;

use crate::descriptor::TypeSchema;
use crate::object::{Reach, Reflect, ReflectSchema, Slot};
use crate::value::Value;

/// String-keyed dynamic object.
///
/// Keys compare case-insensitively; the casing of the first insert is
/// preserved. Entry order is insertion order, which keeps mapping output
/// deterministic.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyBag {
    entries: Vec<(String, Value)>,
}

impl PropertyBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();
        match self.position(&key) {
            Some(i) => self.entries[i].1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.position(key).map(|i| &self.entries[i].1)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.position(key).map(|i| self.entries.remove(i).1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Build a bag from a JSON object. Returns `None` for non-object JSON.
    pub fn from_json(json: &serde_json::Value) -> Option<Self> {
        let obj = json.as_object()?;
        let mut bag = Self::new();
        for (k, v) in obj {
            bag.insert(k.clone(), Value::from(v.clone()));
        }
        Some(bag)
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|(k, _)| k.eq_ignore_ascii_case(key))
    }
}

impl FromIterator<(String, Value)> for PropertyBag {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        let mut bag = Self::new();
        for (k, v) in iter {
            bag.insert(k, v);
        }
        bag
    }
}

static BAG_SCHEMA: LazyLock<TypeSchema> =
    LazyLock::new(|| TypeSchema::keyed_of::<PropertyBag>("PropertyBag"));

impl Reflect for PropertyBag {
    fn schema(&self) -> &TypeSchema {
        &BAG_SCHEMA
    }

    fn read(&self, _name: &str) -> Slot<'_> {
        Slot::Missing
    }

    fn write(&mut self, _name: &str, _value: Value) -> bool {
        false
    }

    fn reach(&mut self, _name: &str) -> Reach<'_> {
        Reach::None
    }

    fn has_key(&self, key: &str) -> bool {
        self.position(key).is_some()
    }

    fn read_key(&self, key: &str) -> Option<Value> {
        self.get(key).cloned()
    }

    fn write_key(&mut self, key: &str, value: Value) -> bool {
        self.insert(key, value);
        true
    }

    fn keys(&self) -> Vec<String> {
        self.entries.iter().map(|(k, _)| k.clone()).collect()
    }
}

impl ReflectSchema for PropertyBag {
    fn type_schema() -> &'static TypeSchema {
        &BAG_SCHEMA
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_case_insensitive() {
        let mut bag = PropertyBag::new();
        bag.insert("Name", "Bob");
        assert_eq!(bag.get("name"), Some(&Value::Str("Bob".into())));
        assert!(bag.has_key("NAME"));

        bag.insert("NAME", "Alice");
        assert_eq!(bag.len(), 1);
        assert_eq!(bag.get("Name"), Some(&Value::Str("Alice".into())));
        // first-insert casing survives the overwrite
        assert_eq!(bag.keys(), vec!["Name".to_string()]);
    }

    #[test]
    fn from_json_object() {
        let json: serde_json::Value = serde_json::from_str(r#"{"Age":30}"#).unwrap();
        let bag = PropertyBag::from_json(&json).unwrap();
        assert_eq!(bag.get("age"), Some(&Value::I64(30)));
        assert!(PropertyBag::from_json(&serde_json::Value::Null).is_none());
    }
}

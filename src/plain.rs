//! Conversion of store-specific bucket values into plain [`Bucket`]s.
//!
//! Storage bindings hand buckets over in whatever shape their driver
//! returns: JSON documents, hash maps, key/value rows. Implementing
//! [`ToPlainMapping`] for such a shape is all the analytics core needs.

use std::collections::{BTreeMap, HashMap};

use crate::models::{Bucket, RawValue};

pub trait ToPlainMapping {
    fn to_plain_mapping(&self) -> Bucket;
}

impl ToPlainMapping for Bucket {
    fn to_plain_mapping(&self) -> Bucket {
        self.clone()
    }
}

impl<S: std::hash::BuildHasher> ToPlainMapping for HashMap<String, RawValue, S> {
    fn to_plain_mapping(&self) -> Bucket {
        self.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }
}

impl ToPlainMapping for [(String, RawValue)] {
    fn to_plain_mapping(&self) -> Bucket {
        self.iter().cloned().collect()
    }
}

impl ToPlainMapping for Vec<(String, RawValue)> {
    fn to_plain_mapping(&self) -> Bucket {
        self.as_slice().to_plain_mapping()
    }
}

impl ToPlainMapping for serde_json::Map<String, serde_json::Value> {
    fn to_plain_mapping(&self) -> Bucket {
        self.iter()
            .filter_map(|(key, value)| raw_from_json(value).map(|raw| (key.clone(), raw)))
            .collect()
    }
}

/// Objects map key by key; any other JSON value is an empty bucket.
impl ToPlainMapping for serde_json::Value {
    fn to_plain_mapping(&self) -> Bucket {
        match self {
            serde_json::Value::Object(map) => map.to_plain_mapping(),
            _ => BTreeMap::new(),
        }
    }
}

impl<T: ToPlainMapping> ToPlainMapping for Option<T> {
    fn to_plain_mapping(&self) -> Bucket {
        self.as_ref().map(T::to_plain_mapping).unwrap_or_default()
    }
}

fn raw_from_json(value: &serde_json::Value) -> Option<RawValue> {
    match value {
        serde_json::Value::Number(n) => n.as_f64().map(RawValue::Number),
        serde_json::Value::String(s) => Some(RawValue::Text(s.clone())),
        _ => None,
    }
}

/// Materializes `candidate` into a plain bucket; a missing value yields an
/// empty one.
pub fn map_to_plain_object<T: ToPlainMapping + ?Sized>(candidate: Option<&T>) -> Bucket {
    candidate.map(T::to_plain_mapping).unwrap_or_default()
}

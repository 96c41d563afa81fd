//! Per-row value container backed by a model's metadata.

use crate::orm::schema::ModelMeta;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

/// Values of one row, keyed by attribute name. Any key may be set; only mapped
/// attributes take part in persistence. Null and missing are both "unset".
#[derive(Clone, Debug)]
pub struct Record {
    meta: &'static ModelMeta,
    values: Map<String, Value>,
}

impl Record {
    pub fn new(meta: &'static ModelMeta) -> Self {
        Record {
            meta,
            values: Map::new(),
        }
    }

    /// Wrap a row returned by a select.
    pub fn from_row(meta: &'static ModelMeta, values: Map<String, Value>) -> Self {
        Record { meta, values }
    }

    pub fn meta(&self) -> &'static ModelMeta {
        self.meta
    }

    pub fn values(&self) -> &Map<String, Value> {
        &self.values
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key).filter(|v| !v.is_null())
    }

    /// Current value, `Null` when unset. Never consults defaults.
    pub fn value(&self, key: &str) -> Value {
        self.get(key).cloned().unwrap_or(Value::Null)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.values.insert(key.to_string(), value.into());
    }

    /// Current value, or the field's default when unset. A resolved default is
    /// stored on the record so producers run at most once per record.
    pub fn value_or_default(&mut self, key: &str) -> Value {
        if let Some(v) = self.get(key) {
            return v.clone();
        }
        let Some(default) = self.meta.field(key).and_then(|f| f.default.resolve()) else {
            return Value::Null;
        };
        tracing::debug!(field = %key, value = %default, "using default value");
        self.values.insert(key.to_string(), default.clone());
        default
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.values.serialize(serializer)
    }
}

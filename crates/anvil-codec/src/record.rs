//! A self-describing record keyed by explicit, stable field IDs — for
//! schemas where field identity must survive reordering or renaming a
//! struct field in source, independent of serde's usual positional/name
//! matching.

use ciborium::value::Value;
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors from reading a typed field out of a [`Record`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FieldError {
    /// The field id was absent. Not necessarily an error for optional
    /// fields — callers of [`Record::get_optional`] get `None` instead.
    #[error("field {0} absent")]
    Absent(u32),
    /// The field was present but not the requested shape.
    #[error("field {0} had unexpected representation")]
    WrongType(u32),
}

/// A record of explicit-field-id values, self-describing its own field
/// count on the wire (CBOR maps carry their own length).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: BTreeMap<u32, Value>,
}

impl Record {
    /// An empty record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an integer field.
    pub fn set_u64(&mut self, id: u32, value: u64) -> &mut Self {
        self.fields.insert(id, Value::Integer(value.into()));
        self
    }

    /// Set a string field.
    pub fn set_str(&mut self, id: u32, value: impl Into<String>) -> &mut Self {
        self.fields.insert(id, Value::Text(value.into()));
        self
    }

    /// Set a byte-string field.
    pub fn set_bytes(&mut self, id: u32, value: impl Into<Vec<u8>>) -> &mut Self {
        self.fields.insert(id, Value::Bytes(value.into()));
        self
    }

    /// Set a nested record as a field (self-describing nesting, per
    /// §4.8's "nested structures are self-describing with their own field
    /// counts").
    pub fn set_record(&mut self, id: u32, value: Record) -> &mut Self {
        self.fields.insert(id, value.into_value());
        self
    }

    /// Get a required `u64` field.
    pub fn get_u64(&self, id: u32) -> Result<u64, FieldError> {
        match self.fields.get(&id) {
            Some(Value::Integer(i)) => {
                u64::try_from(*i).map_err(|_| FieldError::WrongType(id))
            }
            Some(_) => Err(FieldError::WrongType(id)),
            None => Err(FieldError::Absent(id)),
        }
    }

    /// Get an optional `u64` field — absence is not an error.
    #[must_use]
    pub fn get_optional_u64(&self, id: u32) -> Option<u64> {
        self.get_u64(id).ok()
    }

    /// Get a required string field.
    pub fn get_str(&self, id: u32) -> Result<&str, FieldError> {
        match self.fields.get(&id) {
            Some(Value::Text(s)) => Ok(s.as_str()),
            Some(_) => Err(FieldError::WrongType(id)),
            None => Err(FieldError::Absent(id)),
        }
    }

    /// Get a required byte-string field.
    pub fn get_bytes(&self, id: u32) -> Result<&[u8], FieldError> {
        match self.fields.get(&id) {
            Some(Value::Bytes(b)) => Ok(b.as_slice()),
            Some(_) => Err(FieldError::WrongType(id)),
            None => Err(FieldError::Absent(id)),
        }
    }

    /// Number of fields present — part of making the record
    /// self-describing rather than relying on a fixed schema length.
    #[must_use]
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    fn into_value(self) -> Value {
        Value::Map(
            self.fields
                .into_iter()
                .map(|(k, v)| (Value::Integer(k.into()), v))
                .collect(),
        )
    }

    /// Serialize to CBOR bytes.
    pub fn encode(&self) -> Result<Vec<u8>, String> {
        let mut out = Vec::new();
        ciborium::ser::into_writer(&self.clone().into_value(), &mut out)
            .map_err(|e| e.to_string())?;
        Ok(out)
    }

    /// Deserialize from CBOR bytes produced by [`Record::encode`]. Unknown
    /// field ids are kept (not dropped) so a round-trip through an older
    /// reader and back out doesn't silently lose newer-minor fields.
    pub fn decode(bytes: &[u8]) -> Result<Self, String> {
        let value: Value = ciborium::de::from_reader(bytes).map_err(|e| e.to_string())?;
        let Value::Map(entries) = value else {
            return Err("expected a CBOR map at record root".to_owned());
        };
        let mut fields = BTreeMap::new();
        for (k, v) in entries {
            let Value::Integer(i) = k else {
                return Err("record field key must be an integer id".to_owned());
            };
            let id = u32::try_from(i128::from(i)).map_err(|_| "field id out of range".to_owned())?;
            fields.insert(id, v);
        }
        Ok(Self { fields })
    }
}

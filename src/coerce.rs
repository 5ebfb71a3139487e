//! Cardinality normalisation and text-to-value conversion.
//!
//! For every field, in schema order:
//!
//! 1. absent (or JSON `null`) → `None`; required-ness is the validator's job;
//! 2. collection field → a non-list value is wrapped into a one-element list,
//!    lists pass through unchanged;
//! 3. scalar field → a list keeps its first element (an empty list is
//!    absent); strings are atomic and never unwrapped;
//! 4. text values are converted with [`FieldType::from_text`], element-wise
//!    for collections. Text that does not convert is kept verbatim so the
//!    type check can report it.

use serde_json::Value;

use crate::extract::RawParams;
use crate::schema::{FieldSpec, FieldType, Schema};

/// Coerces `params` against `schema`: one entry per field, positionally
/// aligned with the schema's declaration order.
pub fn coerce(schema: &Schema, params: &RawParams) -> Vec<Option<Value>> {
    schema.fields()
        .iter()
        .map(|field| coerce_field(field, params.get(field.name()).cloned()))
        .collect()
}

/// Coerces one raw value for `field`.
pub fn coerce_field(field: &FieldSpec, raw: Option<Value>) -> Option<Value> {
    let raw = raw.filter(|v| !v.is_null())?;
    let ty = field.field_type();
    if field.is_collection() {
        let items = match raw {
            Value::Array(items) => items,
            single => vec![single],
        };
        Some(Value::Array(items.into_iter().map(|item| convert(ty, item)).collect()))
    } else {
        let value = match raw {
            Value::Array(items) => items.into_iter().next()?,
            single => single,
        };
        Some(convert(ty, value))
    }
}

fn convert(ty: FieldType, value: Value) -> Value {
    match value {
        Value::String(text) if ty.converts() => ty.from_text(&text).unwrap_or(Value::String(text)),
        other => other,
    }
}

//! The typed, ordered result of a successful validation.

use std::fmt;

use serde_json::{Map, Value};

use crate::schema::Schema;

/// An immutable request record: one optional value per schema field, in the
/// schema's declaration order.
///
/// Every record built from the same [`Schema`] shares its name table; the
/// record itself only owns the values. `None` marks a field that was not
/// supplied (only possible for optional fields).
#[derive(Clone)]
pub struct Record {
    schema: Schema,
    values: Vec<Option<Value>>,
}

impl Record {
    /// Builds a record positionally. `values` must hold exactly one entry per
    /// schema field.
    pub(crate) fn new(schema: Schema, values: Vec<Option<Value>>) -> Self {
        debug_assert_eq!(schema.len(), values.len());
        Self { schema, values }
    }

    pub fn schema(&self) -> &Schema { &self.schema }
    pub fn values(&self) -> &[Option<Value>] { &self.values }
    pub fn len(&self) -> usize { self.values.len() }
    pub fn is_empty(&self) -> bool { self.values.is_empty() }

    /// Value of `name`. `None` for unknown names and for absent fields.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.schema.index_of(name).and_then(|i| self.at(i))
    }

    /// Value at `position` in declaration order.
    pub fn at(&self, position: usize) -> Option<&Value> {
        self.values.get(position).and_then(Option::as_ref)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    pub fn get_i64(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(Value::as_i64)
    }

    /// `true` when the schema declares `name`, whether or not it was supplied.
    pub fn contains(&self, name: &str) -> bool {
        self.schema.index_of(name).is_some()
    }

    /// `(name, value)` pairs in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&Value>)> {
        self.schema.names().zip(self.values.iter().map(Option::as_ref))
    }

    /// The record as a JSON object; absent fields become `null`.
    pub fn to_json(&self) -> Value {
        let map: Map<String, Value> = self.iter()
            .map(|(name, value)| (name.to_owned(), value.cloned().unwrap_or(Value::Null)))
            .collect();
        Value::Object(map)
    }
}

/// Records are equal when their schemas declare the same names in the same
/// order and every value matches.
impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.schema.same_shape(&other.schema) && self.values == other.values
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldSpec;
    use serde_json::json;

    fn record() -> Record {
        let schema = Schema::new([FieldSpec::text("name"), FieldSpec::int("age")]).unwrap();
        Record::new(schema, vec![Some(json!("alice")), None])
    }

    #[test]
    fn lookup_by_name_and_position() {
        let rec = record();
        assert_eq!(rec.get_str("name"), Some("alice"));
        assert_eq!(rec.at(0), Some(&json!("alice")));
        assert_eq!(rec.get("age"), None);
        assert!(rec.contains("age"));
        assert!(!rec.contains("email"));
    }

    #[test]
    fn iterates_in_declaration_order() {
        let rec = record();
        let names: Vec<_> = rec.iter().map(|(n, _)| n).collect();
        assert_eq!(names, ["name", "age"]);
    }

    #[test]
    fn absent_fields_serialise_as_null() {
        assert_eq!(record().to_json(), json!({"name": "alice", "age": null}));
    }

    #[test]
    fn equality_ignores_descriptor_identity() {
        assert_eq!(record(), record());
    }
}

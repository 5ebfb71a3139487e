//! The per-request "overhead": validated data and routing metadata carried
//! through the stages in front of a handler.
//!
//! One [`Overhead`] is created per request by the [`Endpoint`](crate::Endpoint)
//! (or by the caller, when an [`Action`](crate::Action) is driven directly)
//! and dropped with the response. It is never shared between requests.
//!
//! # Single-writer rule
//!
//! The first validator to succeed stores its [`Record`]. A later validator in
//! the same chain merges into it: every field both records declare must hold
//! the same value, otherwise the merge fails with
//! [`Error::ContextConflict`] and the stored data is left untouched. The JSON
//! payload slot follows the same rule.

use http::Extensions;
use serde_json::Value;

use crate::error::Error;
use crate::method::Method;
use crate::record::Record;

/// Where the dispatcher sent the request.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RoutingInfo {
    /// Dispatch key the endpoint matched, if the request went through one.
    pub path: Option<String>,
    /// Verb the action dispatched on.
    pub method: Option<Method>,
}

/// Per-request mutable context.
#[derive(Debug, Default)]
pub struct Overhead {
    records: Vec<Record>,
    json: Option<Value>,
    routing: RoutingInfo,
    extensions: Extensions,
}

impl Overhead {
    pub fn new() -> Self {
        Self::default()
    }

    /// The first validated record, if any validator ran.
    pub fn record(&self) -> Option<&Record> {
        self.records.first()
    }

    /// Every validated record, in the order the validators ran.
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Looks `name` up across every stored record.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.records.iter().find_map(|r| r.get(name))
    }

    /// Stores a validated record, merging with earlier ones.
    ///
    /// # Errors
    ///
    /// [`Error::ContextConflict`] when a field already validated by an earlier
    /// validator holds a different value in `record`.
    pub fn set_record(&mut self, record: Record) -> Result<(), Error> {
        for existing in &self.records {
            if *existing == record {
                return Ok(());
            }
            for (name, value) in record.iter() {
                if existing.contains(name) && existing.get(name) != value {
                    return Err(Error::ContextConflict(name.to_owned()));
                }
            }
        }
        self.records.push(record);
        Ok(())
    }

    /// The decoded JSON payload stored by a JSON Schema validator.
    pub fn json(&self) -> Option<&Value> {
        self.json.as_ref()
    }

    /// Stores the decoded JSON payload. Storing an equal payload again is a
    /// no-op.
    ///
    /// # Errors
    ///
    /// [`Error::ContextConflict`] when a different payload is already stored.
    pub fn set_json(&mut self, payload: Value) -> Result<(), Error> {
        match &self.json {
            Some(existing) if *existing != payload => Err(Error::ContextConflict("<json body>".to_owned())),
            Some(_) => Ok(()),
            None => {
                self.json = Some(payload);
                Ok(())
            }
        }
    }

    pub fn routing(&self) -> &RoutingInfo {
        &self.routing
    }

    pub(crate) fn routing_mut(&mut self) -> &mut RoutingInfo {
        &mut self.routing
    }

    /// Application data seeded by an overhead factory or an earlier stage.
    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    pub fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.extensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldSpec, Schema};
    use serde_json::json;

    fn record(fields: &[(&str, Value)]) -> Record {
        let schema = Schema::new(fields.iter().map(|(n, _)| FieldSpec::json(*n))).unwrap();
        Record::new(schema, fields.iter().map(|(_, v)| Some(v.clone())).collect())
    }

    #[test]
    fn first_record_wins_the_slot() {
        let mut ov = Overhead::new();
        ov.set_record(record(&[("a", json!(1))])).unwrap();
        assert_eq!(ov.record().unwrap().get("a"), Some(&json!(1)));
    }

    #[test]
    fn identical_record_is_not_stored_twice() {
        let mut ov = Overhead::new();
        ov.set_record(record(&[("a", json!(1))])).unwrap();
        ov.set_record(record(&[("a", json!(1))])).unwrap();
        assert_eq!(ov.records().len(), 1);
    }

    #[test]
    fn compatible_records_merge() {
        let mut ov = Overhead::new();
        ov.set_record(record(&[("a", json!(1)), ("b", json!("x"))])).unwrap();
        ov.set_record(record(&[("a", json!(1)), ("c", json!(true))])).unwrap();
        assert_eq!(ov.records().len(), 2);
        assert_eq!(ov.field("c"), Some(&json!(true)));
        assert_eq!(ov.record().unwrap().get("b"), Some(&json!("x")));
    }

    #[test]
    fn conflicting_record_is_rejected_and_not_stored() {
        let mut ov = Overhead::new();
        ov.set_record(record(&[("a", json!(1))])).unwrap();
        let err = ov.set_record(record(&[("a", json!("1"))])).unwrap_err();
        assert!(matches!(err, Error::ContextConflict(name) if name == "a"));
        assert_eq!(ov.records().len(), 1);
        assert_eq!(ov.field("a"), Some(&json!(1)));
    }

    #[test]
    fn json_slot_follows_the_same_rule() {
        let mut ov = Overhead::new();
        ov.set_json(json!({"a": 1})).unwrap();
        ov.set_json(json!({"a": 1})).unwrap();
        assert!(ov.set_json(json!({"a": 2})).is_err());
        assert_eq!(ov.json(), Some(&json!({"a": 1})));
    }

    #[test]
    fn extensions_carry_application_data() {
        #[derive(Clone, Debug, PartialEq)]
        struct User(&'static str);

        let mut ov = Overhead::new();
        ov.extensions_mut().insert(User("alice"));
        assert_eq!(ov.extensions().get::<User>(), Some(&User("alice")));
    }
}

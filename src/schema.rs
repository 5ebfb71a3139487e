//! Schema descriptors: the declared shape of a validated request.
//!
//! A [`Schema`] is an ordered list of [`FieldSpec`]s. The order matters: it
//! is the positional order of every [`Record`] built from the schema, so two
//! schemas with the same names in a different order are different schemas.
//!
//! ```rust
//! use menhir::schema::{FieldSpec, MaxLength, Schema};
//!
//! let schema = Schema::new([
//!     FieldSpec::text("name").required().rule(MaxLength(64)),
//!     FieldSpec::text("tags").collection(),
//!     FieldSpec::int("age"),
//! ]).unwrap();
//!
//! assert_eq!(schema.names().collect::<Vec<_>>(), ["name", "tags", "age"]);
//! ```
//!
//! Schemas are built once at startup and shared read-only afterwards;
//! cloning one is a reference-count increment.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::{Number, Value};

use crate::error::Error;
use crate::record::Record;
use crate::validate::Violation;

// ── Field types ───────────────────────────────────────────────────────────────

/// Value type of a field (of each element, for collection fields).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FieldType {
    Text,
    Int,
    Float,
    Bool,
    /// Any JSON value. No text conversion and no type check.
    Json,
}

impl FieldType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text  => "text",
            Self::Int   => "integer",
            Self::Float => "number",
            Self::Bool  => "boolean",
            Self::Json  => "value",
        }
    }

    /// Text-to-value conversion. `None` when the text does not denote a value
    /// of this type, in which case the raw text is kept and the type check
    /// reports it.
    pub fn from_text(self, raw: &str) -> Option<Value> {
        match self {
            Self::Text => Some(Value::String(raw.to_owned())),
            Self::Int => raw.trim().parse::<i64>().ok().map(Value::from),
            Self::Float => raw.trim().parse::<f64>().ok()
                .and_then(Number::from_f64)
                .map(Value::Number),
            Self::Bool => match raw.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "on" | "yes" => Some(Value::Bool(true)),
                "false" | "0" | "off" | "no" => Some(Value::Bool(false)),
                _ => None,
            },
            Self::Json => None,
        }
    }

    /// `true` when `value` conforms to this type.
    pub fn accepts(self, value: &Value) -> bool {
        match self {
            Self::Text  => value.is_string(),
            Self::Int   => value.is_i64() || value.is_u64(),
            Self::Float => value.is_number(),
            Self::Bool  => value.is_boolean(),
            Self::Json  => true,
        }
    }

    pub(crate) fn converts(self) -> bool {
        !matches!(self, Self::Json)
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cardinality of a field.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Kind {
    /// One value. Multi-valued input keeps its first element.
    Scalar,
    /// A list. Single values are wrapped into a one-element list.
    Collection,
}

// ── Rules ─────────────────────────────────────────────────────────────────────

/// A domain constraint on a coerced field value.
///
/// Rules only see values that are present and already passed the type check.
/// Any `Fn(&Value) -> Result<(), Violation>` is a rule:
///
/// ```rust
/// use menhir::schema::FieldSpec;
/// use menhir::Violation;
///
/// let even = FieldSpec::int("n").rule(|v: &serde_json::Value| {
///     match v.as_i64() {
///         Some(n) if n % 2 != 0 => Err(Violation::new("NotEven").with_doc("Must be even.")),
///         _ => Ok(()),
///     }
/// });
/// ```
pub trait Rule: Send + Sync + 'static {
    fn check(&self, value: &Value) -> Result<(), Violation>;
}

impl<F> Rule for F
where
    F: Fn(&Value) -> Result<(), Violation> + Send + Sync + 'static,
{
    fn check(&self, value: &Value) -> Result<(), Violation> {
        self(value)
    }
}

fn length_of(value: &Value) -> Option<usize> {
    match value {
        Value::String(s) => Some(s.chars().count()),
        Value::Array(items) => Some(items.len()),
        _ => None,
    }
}

/// Minimum length of a text (in characters) or a collection (in items).
#[derive(Clone, Copy, Debug)]
pub struct MinLength(pub usize);

impl Rule for MinLength {
    fn check(&self, value: &Value) -> Result<(), Violation> {
        match length_of(value) {
            Some(len) if len < self.0 => Err(Violation::new("TooShort")
                .with_doc(format!("Must have at least {} characters or items.", self.0))),
            _ => Ok(()),
        }
    }
}

/// Maximum length of a text (in characters) or a collection (in items).
#[derive(Clone, Copy, Debug)]
pub struct MaxLength(pub usize);

impl Rule for MaxLength {
    fn check(&self, value: &Value) -> Result<(), Violation> {
        match length_of(value) {
            Some(len) if len > self.0 => Err(Violation::new("TooLong")
                .with_doc(format!("Must have at most {} characters or items.", self.0))),
            _ => Ok(()),
        }
    }
}

/// Inclusive numeric bounds.
#[derive(Clone, Copy, Debug, Default)]
pub struct Range {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl Rule for Range {
    fn check(&self, value: &Value) -> Result<(), Violation> {
        let Some(n) = value.as_f64() else { return Ok(()) };
        if let Some(min) = self.min.filter(|min| n < *min) {
            return Err(Violation::new("TooSmall").with_doc(format!("Must be at least {min}.")));
        }
        if let Some(max) = self.max.filter(|max| n > *max) {
            return Err(Violation::new("TooBig").with_doc(format!("Must be at most {max}.")));
        }
        Ok(())
    }
}

/// The value must equal one of the listed values.
#[derive(Clone, Debug)]
pub struct OneOf(pub Vec<Value>);

impl Rule for OneOf {
    fn check(&self, value: &Value) -> Result<(), Violation> {
        if self.0.contains(value) {
            return Ok(());
        }
        let choices: Vec<String> = self.0.iter().map(Value::to_string).collect();
        Err(Violation::new("ConstraintNotSatisfied")
            .with_doc(format!("Must be one of: {}.", choices.join(", "))))
    }
}

// ── FieldSpec ─────────────────────────────────────────────────────────────────

/// Declarative description of one expected request field.
#[derive(Clone)]
pub struct FieldSpec {
    name: String,
    field_type: FieldType,
    kind: Kind,
    required: bool,
    rules: Vec<Arc<dyn Rule>>,
}

impl FieldSpec {
    /// An optional scalar field.
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            kind: Kind::Scalar,
            required: false,
            rules: Vec::new(),
        }
    }

    pub fn text(name: impl Into<String>) -> Self { Self::new(name, FieldType::Text) }
    pub fn int(name: impl Into<String>) -> Self { Self::new(name, FieldType::Int) }
    pub fn float(name: impl Into<String>) -> Self { Self::new(name, FieldType::Float) }
    pub fn bool(name: impl Into<String>) -> Self { Self::new(name, FieldType::Bool) }

    /// A field holding any JSON value.
    ///
    /// As a scalar it still keeps only the first element of a list, so a
    /// JSON array body value is cut down to its first item. Declare it with
    /// [`collection`](Self::collection) to keep the whole array.
    pub fn json(name: impl Into<String>) -> Self { Self::new(name, FieldType::Json) }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn collection(mut self) -> Self {
        self.kind = Kind::Collection;
        self
    }

    /// Appends a rule. Rules run in the order they were added.
    pub fn rule(mut self, rule: impl Rule) -> Self {
        self.rules.push(Arc::new(rule));
        self
    }

    pub fn name(&self) -> &str { &self.name }
    pub fn field_type(&self) -> FieldType { self.field_type }
    pub fn kind(&self) -> Kind { self.kind }
    pub fn is_required(&self) -> bool { self.required }
    pub fn is_collection(&self) -> bool { self.kind == Kind::Collection }

    pub(crate) fn rules(&self) -> &[Arc<dyn Rule>] { &self.rules }
}

impl fmt::Debug for FieldSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldSpec")
            .field("name", &self.name)
            .field("field_type", &self.field_type)
            .field("kind", &self.kind)
            .field("required", &self.required)
            .field("rules", &self.rules.len())
            .finish()
    }
}

// ── Schema ────────────────────────────────────────────────────────────────────

/// A cross-field rule run on the candidate record once every field passed.
pub type Invariant = Arc<dyn Fn(&Record) -> Result<(), Violation> + Send + Sync>;

/// Ordered, immutable collection of [`FieldSpec`]s with unique names.
#[derive(Clone)]
pub struct Schema {
    inner: Arc<SchemaInner>,
}

#[derive(Clone)]
struct SchemaInner {
    fields: Vec<FieldSpec>,
    index: HashMap<String, usize>,
    invariants: Vec<Invariant>,
}

impl Schema {
    /// Builds a schema from fields in declaration order.
    ///
    /// # Errors
    ///
    /// [`Error::DuplicateField`] when two fields share a name.
    pub fn new(fields: impl IntoIterator<Item = FieldSpec>) -> Result<Self, Error> {
        let fields: Vec<FieldSpec> = fields.into_iter().collect();
        let mut index = HashMap::with_capacity(fields.len());
        for (position, field) in fields.iter().enumerate() {
            if index.insert(field.name.clone(), position).is_some() {
                return Err(Error::DuplicateField(field.name.clone()));
            }
        }
        Ok(Self { inner: Arc::new(SchemaInner { fields, index, invariants: Vec::new() }) })
    }

    /// Adds a cross-field invariant. Call during configuration, before the
    /// schema is shared.
    pub fn invariant<F>(mut self, check: F) -> Self
    where
        F: Fn(&Record) -> Result<(), Violation> + Send + Sync + 'static,
    {
        Arc::make_mut(&mut self.inner).invariants.push(Arc::new(check));
        self
    }

    pub fn fields(&self) -> &[FieldSpec] { &self.inner.fields }
    pub fn len(&self) -> usize { self.inner.fields.len() }
    pub fn is_empty(&self) -> bool { self.inner.fields.is_empty() }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.inner.fields.iter().map(FieldSpec::name)
    }

    /// Position of `name` in declaration order.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.inner.index.get(name).copied()
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.index_of(name).map(|i| &self.inner.fields[i])
    }

    pub(crate) fn invariants(&self) -> &[Invariant] { &self.inner.invariants }

    /// `true` when both handles share one descriptor.
    pub fn ptr_eq(&self, other: &Schema) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// `true` when both schemas declare the same names in the same order.
    pub fn same_shape(&self, other: &Schema) -> bool {
        self.ptr_eq(other) || self.names().eq(other.names())
    }
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.fields()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn duplicate_names_are_rejected() {
        let err = Schema::new([FieldSpec::text("a"), FieldSpec::int("a")]).unwrap_err();
        assert!(matches!(err, Error::DuplicateField(name) if name == "a"));
    }

    #[test]
    fn order_is_declaration_order() {
        let schema = Schema::new([FieldSpec::text("b"), FieldSpec::text("a")]).unwrap();
        assert_eq!(schema.index_of("b"), Some(0));
        assert_eq!(schema.index_of("a"), Some(1));
        assert_eq!(schema.index_of("c"), None);
    }

    #[test]
    fn same_names_in_another_order_is_another_shape() {
        let ab = Schema::new([FieldSpec::text("a"), FieldSpec::text("b")]).unwrap();
        let ba = Schema::new([FieldSpec::text("b"), FieldSpec::text("a")]).unwrap();
        let ab2 = Schema::new([FieldSpec::text("a"), FieldSpec::int("b")]).unwrap();
        assert!(!ab.same_shape(&ba));
        assert!(ab.same_shape(&ab2));
        assert!(ab.same_shape(&ab.clone()));
    }

    #[test]
    fn text_conversion_per_type() {
        assert_eq!(FieldType::Int.from_text(" 42 "), Some(json!(42)));
        assert_eq!(FieldType::Int.from_text("4.2"), None);
        assert_eq!(FieldType::Float.from_text("4.5"), Some(json!(4.5)));
        assert_eq!(FieldType::Bool.from_text("on"), Some(json!(true)));
        assert_eq!(FieldType::Bool.from_text("maybe"), None);
        assert_eq!(FieldType::Text.from_text("x"), Some(json!("x")));
        assert_eq!(FieldType::Json.from_text("{}"), None);
    }

    #[test]
    fn type_acceptance() {
        assert!(FieldType::Int.accepts(&json!(3)));
        assert!(!FieldType::Int.accepts(&json!(3.5)));
        assert!(FieldType::Float.accepts(&json!(3)));
        assert!(!FieldType::Text.accepts(&json!(3)));
        assert!(FieldType::Json.accepts(&json!({"a": 1})));
    }

    #[test]
    fn length_rules_count_characters_and_items() {
        assert!(MinLength(2).check(&json!("é")).is_err());
        assert!(MinLength(2).check(&json!(["a", "b"])).is_ok());
        assert!(MaxLength(1).check(&json!(["a", "b"])).is_err());
        assert!(MaxLength(1).check(&json!(10)).is_ok());
    }

    #[test]
    fn range_reports_the_violated_bound() {
        let range = Range { min: Some(1.0), max: Some(10.0) };
        assert_eq!(range.check(&json!(0)).unwrap_err().code(), "TooSmall");
        assert_eq!(range.check(&json!(11)).unwrap_err().code(), "TooBig");
        assert!(range.check(&json!(5)).is_ok());
    }

    #[test]
    fn one_of_lists_the_choices() {
        let rule = OneOf(vec![json!("asc"), json!("desc")]);
        let err = rule.check(&json!("up")).unwrap_err();
        assert_eq!(err.doc(), Some(r#"Must be one of: "asc", "desc"."#));
    }
}

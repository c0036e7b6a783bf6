//! Typed instances.
//!
//! An [`Instance`] is built through [`InstanceBuilder`], which checks every
//! value against the field's declared target and refuses to produce a
//! partially populated instance. Identities not given explicitly come from
//! a process-wide per-type counter and read `TypeName_N`.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::rc::Rc;
use std::sync::{Mutex, PoisonError};

use serde_json::{json, Map};

use crate::error::{CoercionError, DefinitionError, Error, Result};
use crate::model::{Field, FieldBinding, Primitive, Target, TypeId};
use crate::registry::Registry;

static IDENTITY_COUNTERS: Mutex<BTreeMap<String, u64>> = Mutex::new(BTreeMap::new());

/// Returns the next auto-generated identity for a type name.
///
/// The counter is keyed on the bare name, is shared by the whole process
/// and is never reset, so two calls never return the same identity.
#[must_use]
pub fn next_identity(type_name: &str) -> String {
    let mut counters = IDENTITY_COUNTERS
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    let n = counters.entry(type_name.to_owned()).or_insert(0);
    *n += 1;
    format!("{type_name}_{n}")
}

/// A field value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// String scalar.
    Str(String),
    /// Integer scalar.
    Int(i64),
    /// Decimal scalar.
    Decimal(f64),
    /// Boolean scalar.
    Bool(bool),
    /// A named identity, such as a unit or a fixed value.
    Named(TypeId),
    /// A nested instance, possibly shared.
    Resource(Rc<Instance>),
    /// Several values of a collection field.
    List(Vec<Value>),
    /// An identity revisited while it was still being constructed.
    CircularRef(String),
}

impl Value {
    /// The nested instance, if any.
    #[must_use]
    pub fn as_instance(&self) -> Option<&Instance> {
        match self {
            Value::Resource(inst) => Some(inst),
            _ => None,
        }
    }

    /// Lexical form of a scalar.
    #[must_use]
    pub fn lexical(&self) -> Option<String> {
        match self {
            Value::Str(s) => Some(s.clone()),
            Value::Int(i) => Some(i.to_string()),
            Value::Decimal(d) => Some(d.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    fn is_scalar(&self) -> bool {
        self.lexical().is_some()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Decimal(d) => write!(f, "{d}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Named(t) => write!(f, "#{}", t.index()),
            Value::Resource(inst) => write!(f, "{}", inst.id),
            Value::List(items) => write!(f, "[{} values]", items.len()),
            Value::CircularRef(id) => write!(f, "<circular {id}>"),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(d: f64) -> Self {
        Value::Decimal(d)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<TypeId> for Value {
    fn from(t: TypeId) -> Self {
        Value::Named(t)
    }
}

impl From<Instance> for Value {
    fn from(inst: Instance) -> Self {
        Value::Resource(Rc::new(inst))
    }
}

impl From<Rc<Instance>> for Value {
    fn from(inst: Rc<Instance>) -> Self {
        Value::Resource(inst)
    }
}

/// A concrete value of a resource type.
#[derive(Debug, Clone, PartialEq)]
pub struct Instance {
    id: String,
    ty: TypeId,
    values: BTreeMap<&'static str, Value>,
}

impl Instance {
    /// Starts building an instance of `ty`.
    #[must_use]
    pub fn builder(registry: &Registry, ty: TypeId) -> InstanceBuilder<'_> {
        InstanceBuilder {
            registry,
            ty,
            id: None,
            values: BTreeMap::new(),
            error: None,
        }
    }

    /// The identity (local name).
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The instance's type.
    #[must_use]
    pub fn type_id(&self) -> TypeId {
        self.ty
    }

    /// The value of a field; `None` when unset.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.values.get(field)
    }

    /// Set fields, by name.
    pub fn values(&self) -> impl Iterator<Item = (&'static str, &Value)> {
        self.values.iter().map(|(k, v)| (*k, v))
    }

    /// A JSON view of the field values.
    ///
    /// With `recursive`, nested instances are expanded in place; an
    /// instance met again below itself becomes
    /// `{"_circular_ref": true, "_name": id}`. Without it they are
    /// rendered as their identity.
    #[must_use]
    pub fn field_values(&self, registry: &Registry, recursive: bool) -> serde_json::Value {
        let mut visiting = HashSet::new();
        self.to_json(registry, recursive, &mut visiting)
    }

    fn to_json(
        &self,
        registry: &Registry,
        recursive: bool,
        visiting: &mut HashSet<String>,
    ) -> serde_json::Value {
        if !visiting.insert(self.id.clone()) {
            return json!({ "_circular_ref": true, "_name": self.id });
        }
        let mut map = Map::new();
        map.insert("_name".into(), json!(self.id));
        map.insert("_type".into(), json!(registry.display(self.ty)));
        for (name, value) in &self.values {
            map.insert((*name).to_owned(), value_json(value, registry, recursive, visiting));
        }
        visiting.remove(&self.id);
        serde_json::Value::Object(map)
    }
}

fn value_json(
    value: &Value,
    registry: &Registry,
    recursive: bool,
    visiting: &mut HashSet<String>,
) -> serde_json::Value {
    match value {
        Value::Str(s) => json!(s),
        Value::Int(i) => json!(i),
        Value::Decimal(d) => json!(d),
        Value::Bool(b) => json!(b),
        Value::Named(t) => json!(registry.get(*t).iri().to_string()),
        Value::Resource(inst) if recursive => inst.to_json(registry, recursive, visiting),
        Value::Resource(inst) => json!(inst.id),
        Value::List(items) => serde_json::Value::Array(
            items
                .iter()
                .map(|v| value_json(v, registry, recursive, visiting))
                .collect(),
        ),
        Value::CircularRef(id) => json!({ "_circular_ref": true, "_name": id }),
    }
}

/// Builds an [`Instance`]; see [`Instance::builder`].
#[derive(Debug)]
pub struct InstanceBuilder<'r> {
    registry: &'r Registry,
    ty: TypeId,
    id: Option<String>,
    values: BTreeMap<&'static str, Value>,
    error: Option<CoercionError>,
}

impl InstanceBuilder<'_> {
    /// Uses an explicit identity instead of a generated one.
    #[must_use]
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Sets a field. Unknown names are reported by [`build`](Self::build).
    #[must_use]
    pub fn set(mut self, field: &str, value: impl Into<Value>) -> Self {
        match self.registry.field(self.ty, field) {
            Some(decl) => {
                self.values.insert(decl.name, value.into());
            }
            None => {
                self.error.get_or_insert_with(|| CoercionError::UnknownField {
                    type_name: self.registry.display(self.ty),
                    field: field.to_owned(),
                });
            }
        }
        self
    }

    /// Validates and coerces every value, then assigns the identity.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Definition`] for abstract types and
    /// [`Error::Coercion`] for unknown fields, values that do not fit their
    /// field, and required fields left without a value.
    pub fn build(mut self) -> Result<Instance> {
        if let Some(err) = self.error.take() {
            return Err(err.into());
        }
        let registry = self.registry;
        let ty = registry.get(self.ty);
        if ty.is_abstract {
            return Err(DefinitionError::MissingIdentity {
                type_name: ty.qualified_name(),
            }
            .into());
        }

        let mut values = BTreeMap::new();
        for field in registry.fields(self.ty) {
            let supplied = self.values.remove(field.name);
            let value = match (field.binding, supplied) {
                (FieldBinding::Fixed(fixed), None) => Some(Value::Named(fixed)),
                (FieldBinding::Fixed(fixed), Some(Value::Named(given))) if given == fixed => {
                    Some(Value::Named(fixed))
                }
                (FieldBinding::Fixed(fixed), Some(other)) => {
                    return Err(CoercionError::Uncoercible {
                        field: field.name.to_owned(),
                        value: other.to_string(),
                        expected: format!("fixed value {}", registry.display(fixed)),
                    }
                    .into())
                }
                (FieldBinding::Parameterized, Some(given)) => {
                    Some(coerce(registry, self.ty, field, given)?)
                }
                (FieldBinding::Parameterized, None) => match &field.exact_values {
                    Some(exact) => Some(Value::List(
                        exact.iter().copied().map(Value::Named).collect(),
                    )),
                    _ if field.is_required() => {
                        return Err(CoercionError::MissingField {
                            type_name: ty.qualified_name(),
                            field: field.name.to_owned(),
                        }
                        .into())
                    }
                    _ => None,
                },
            };
            if let Some(value) = value {
                values.insert(field.name, value);
            }
        }

        let id = self.id.unwrap_or_else(|| next_identity(ty.name));
        Ok(Instance {
            id,
            ty: self.ty,
            values,
        })
    }
}

/// Coerces `value` into what `field` (seen from `context`) accepts.
///
/// # Errors
///
/// Returns [`CoercionError`] when the value does not fit.
pub fn coerce(registry: &Registry, context: TypeId, field: &Field, value: Value) -> Result<Value> {
    let target = field.value_type.target(context);
    if let Value::List(items) = value {
        if !field.value_type.is_collection() {
            return Err(uncoercible(registry, field, &Value::List(items), target).into());
        }
        return items
            .into_iter()
            .map(|item| coerce_one(registry, field, item, target))
            .collect::<Result<Vec<_>>>()
            .map(Value::List);
    }
    coerce_one(registry, field, value, target)
}

fn coerce_one(registry: &Registry, field: &Field, value: Value, target: Target) -> Result<Value> {
    match target {
        Target::Primitive(p) => coerce_scalar(p, &value)
            .ok_or_else(|| uncoercible(registry, field, &value, target).into()),
        Target::Type(t) => {
            let fits = match &value {
                Value::Resource(inst) => registry.is_a(inst.ty, t),
                Value::Named(n) => registry.is_a(*n, t),
                Value::CircularRef(_) => true,
                _ => false,
            };
            if fits {
                Ok(value)
            } else if value.is_scalar() {
                promote(registry, field, t, value)
            } else {
                Err(uncoercible(registry, field, &value, target).into())
            }
        }
    }
}

/// Parses or widens a scalar into `p`.
#[must_use]
pub fn coerce_scalar(p: Primitive, value: &Value) -> Option<Value> {
    match (p, value) {
        (Primitive::String, Value::Str(s)) => Some(Value::Str(s.clone())),
        (Primitive::Integer, Value::Int(i)) => Some(Value::Int(*i)),
        (Primitive::Integer, Value::Str(s)) => s.trim().parse().ok().map(Value::Int),
        (Primitive::Decimal, Value::Decimal(d)) => Some(Value::Decimal(*d)),
        (Primitive::Decimal, Value::Int(i)) => Some(Value::Decimal(*i as f64)),
        (Primitive::Decimal, Value::Str(s)) => s.trim().parse().ok().map(Value::Decimal),
        (Primitive::Boolean, Value::Bool(b)) => Some(Value::Bool(*b)),
        (Primitive::Boolean, Value::Str(s)) => match s.trim() {
            "true" | "1" => Some(Value::Bool(true)),
            "false" | "0" => Some(Value::Bool(false)),
            _ => None,
        },
        _ => None,
    }
}

/// Wraps a raw scalar into an instance of `t` through its primary field:
/// the first required, parameterized field with a scalar target.
fn promote(registry: &Registry, field: &Field, t: TypeId, value: Value) -> Result<Value> {
    let primary = registry.fields(t).into_iter().find(|f| {
        f.is_required() && !f.is_fixed() && matches!(f.value_type.target(t), Target::Primitive(_))
    });
    let Some(primary) = primary else {
        return Err(uncoercible(registry, field, &value, Target::Type(t)).into());
    };
    match Instance::builder(registry, t).set(primary.name, value).build() {
        Ok(inst) => Ok(Value::from(inst)),
        Err(Error::Coercion(err)) => Err(err.into()),
        Err(_) => Err(CoercionError::Uncoercible {
            field: field.name.to_owned(),
            value: "scalar".to_owned(),
            expected: registry.display(t),
        }
        .into()),
    }
}

fn uncoercible(registry: &Registry, field: &Field, value: &Value, target: Target) -> CoercionError {
    CoercionError::Uncoercible {
        field: field.name.to_owned(),
        value: value.to_string(),
        expected: registry.display_target(target),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Namespace, ValueType};
    use crate::registry::{FieldDecl, TypeDecl};

    const EX: Namespace = Namespace::new("ex", "urn:ex#");

    struct Fixture {
        registry: Registry,
        length: TypeId,
        boxed: TypeId,
        metre: TypeId,
    }

    fn fixture() -> Fixture {
        let mut b = Registry::builder();
        let m = b.markers();
        let has_dimension = b
            .declare(TypeDecl::new("hasDimension", EX).extends(m.predicate))
            .expect("rel");
        let unit = b
            .declare(TypeDecl::new("Unit", EX).extends(m.named_node).abstract_type())
            .expect("unit");
        let metre = b
            .declare(TypeDecl::new("M", EX).extends(unit))
            .expect("metre");
        let length = b
            .declare(
                TypeDecl::new("Length", EX)
                    .extends(m.value)
                    .field(FieldDecl::required(
                        "value",
                        ValueType::Primitive(Primitive::Decimal),
                    ))
                    .field(FieldDecl::optional("unit", ValueType::Type(unit))),
            )
            .expect("length");
        let boxed = b
            .declare(
                TypeDecl::new("Box", EX)
                    .extends(m.node)
                    .allows(has_dimension, length)
                    .field(FieldDecl::required("width", ValueType::Type(length)))
                    .field(FieldDecl::optional(
                        "label",
                        ValueType::Primitive(Primitive::String),
                    )),
            )
            .expect("box");
        Fixture {
            registry: b.build(),
            length,
            boxed,
            metre,
        }
    }

    #[test]
    fn generated_identities_never_collide() {
        let f = fixture();
        let a = Instance::builder(&f.registry, f.boxed)
            .set("width", 1.0)
            .build()
            .expect("a");
        let b = Instance::builder(&f.registry, f.boxed)
            .set("width", 2.0)
            .build()
            .expect("b");
        assert_ne!(a.id(), b.id());
        assert!(a.id().starts_with("Box_"));
    }

    #[test]
    fn promotion_uses_the_primary_field() {
        let f = fixture();
        let inst = Instance::builder(&f.registry, f.boxed)
            .id("box")
            .set("width", 3_i64)
            .build()
            .expect("box");
        let width = inst.get("width").and_then(Value::as_instance).expect("nested");
        assert_eq!(width.type_id(), f.length);
        assert_eq!(width.get("value"), Some(&Value::Decimal(3.0)));
        assert_eq!(inst.get("label"), None);
    }

    #[test]
    fn missing_required_field_fails() {
        let f = fixture();
        let err = Instance::builder(&f.registry, f.boxed).build().unwrap_err();
        assert!(matches!(
            err,
            Error::Coercion(CoercionError::MissingField { ref field, .. }) if field == "width"
        ));
    }

    #[test]
    fn empty_exact_values_fill_an_empty_list() {
        let mut b = Registry::builder();
        let m = b.markers();
        let unit = b
            .declare(TypeDecl::new("Unit", EX).extends(m.named_node))
            .expect("unit");
        let plain = b
            .declare(
                TypeDecl::new("Plain", EX).extends(m.node).field(
                    FieldDecl::required("units", ValueType::collection(ValueType::Type(unit)))
                        .exact_values(Vec::new()),
                ),
            )
            .expect("plain");
        let registry = b.build();
        let inst = Instance::builder(&registry, plain).build().expect("plain");
        assert_eq!(inst.get("units"), Some(&Value::List(Vec::new())));
    }

    #[test]
    fn unknown_field_fails() {
        let f = fixture();
        let err = Instance::builder(&f.registry, f.boxed)
            .set("depth", 1.0)
            .set("width", 1.0)
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Coercion(CoercionError::UnknownField { .. })));
    }

    #[test]
    fn named_identities_must_fit_the_target() {
        let f = fixture();
        let ok = Instance::builder(&f.registry, f.length)
            .set("value", "2.5")
            .set("unit", f.metre)
            .build()
            .expect("length");
        assert_eq!(ok.get("value"), Some(&Value::Decimal(2.5)));
        let err = Instance::builder(&f.registry, f.length)
            .set("value", 1.0)
            .set("unit", f.boxed)
            .build();
        assert!(err.is_err());
    }

    #[test]
    fn field_values_expands_nested_instances() {
        let f = fixture();
        let inst = Instance::builder(&f.registry, f.boxed)
            .id("b")
            .set("width", 1.5)
            .set("label", "crate")
            .build()
            .expect("box");
        let flat = inst.field_values(&f.registry, false);
        assert_eq!(flat["_name"], "b");
        assert_eq!(flat["label"], "crate");
        assert!(flat["width"].is_string());
        let deep = inst.field_values(&f.registry, true);
        assert_eq!(deep["width"]["value"], 1.5);
    }
}

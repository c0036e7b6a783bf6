//! End-to-end behavior of the mapping engine.
//!
//! Each section exercises one observable guarantee across modules:
//! relation inference, closure, templates, shapes, queries and the
//! serialize → query → load round trip.

use std::collections::BTreeMap;

use semobj::closure::closure;
use semobj::namespaces::{rdf_type, MODEL};
use semobj::query::{query, Filter};
use semobj::resolver::resolve;
use semobj::serializer::instance::instance_triples;
use semobj::serializer::template::{template, Dependency};
use semobj::shape::shape;
use semobj::store::Row;
use semobj::{
    CoercionError, Error, FieldDecl, Instance, Literal, Loader, MemoryStore, Namespace,
    Primitive, Registry, Resolution, ResultTable, Term, Triple, TypeDecl, TypeId, Value,
    ValueType,
};

const EX: Namespace = Namespace::new("ex", "urn:ex#");

struct Building {
    registry: Registry,
    has_dimension: TypeId,
    length: TypeId,
    metric: TypeId,
    metre: TypeId,
    boxed: TypeId,
    crate_: TypeId,
    panel: TypeId,
}

fn building() -> Building {
    let mut b = Registry::builder();
    let m = b.markers();
    let rel = |b: &mut semobj::RegistryBuilder, name| {
        b.declare(TypeDecl::new(name, EX).extends(m.predicate))
            .expect("relation")
    };
    let has_dimension = rel(&mut b, "hasDimension");
    let has_value = rel(&mut b, "hasValue");
    let has_unit = rel(&mut b, "hasUnit");
    let has_label = rel(&mut b, "hasLabel");
    let has_count = rel(&mut b, "hasCount");

    let unit = b
        .declare(TypeDecl::new("Unit", EX).extends(m.named_node).abstract_type())
        .expect("unit");
    let metre = b.declare(TypeDecl::new("M", EX).extends(unit)).expect("m");
    let length = b
        .declare(
            TypeDecl::new("Length", EX)
                .extends(m.value)
                .allows(has_value, Primitive::Decimal)
                .allows(has_unit, unit)
                .field(FieldDecl::required(
                    "value",
                    ValueType::Primitive(Primitive::Decimal),
                ))
                .field(FieldDecl::required("unit", ValueType::Type(unit))),
        )
        .expect("length");
    let metric = b
        .declare(
            TypeDecl::new("MetricLength", EX)
                .extends(length)
                .fix("unit", metre),
        )
        .expect("metric");
    let boxed = b
        .declare(
            TypeDecl::new("Box", EX)
                .extends(m.node)
                .allows(has_dimension, length)
                .field(FieldDecl::required("width", ValueType::Type(length))),
        )
        .expect("box");
    let crate_ = b
        .declare(
            TypeDecl::new("Crate", EX)
                .extends(m.node)
                .allows(has_dimension, length)
                .allows(has_label, Primitive::String)
                .allows(has_count, Primitive::Integer)
                .field(FieldDecl::required("width", ValueType::Type(metric)))
                .field(FieldDecl::required("height", ValueType::Type(metric)))
                .field(FieldDecl::required(
                    "count",
                    ValueType::Primitive(Primitive::Integer),
                ))
                .field(FieldDecl::optional(
                    "label",
                    ValueType::Primitive(Primitive::String),
                )),
        )
        .expect("crate");
    let panel = b
        .declare(
            TypeDecl::new("Panel", EX)
                .extends(m.node)
                .allows(has_dimension, length)
                .allows(has_label, Primitive::String)
                .allows(has_count, Primitive::Integer)
                .field(FieldDecl::required("width", ValueType::Type(metric)))
                .field(FieldDecl::required(
                    "count",
                    ValueType::Primitive(Primitive::Integer),
                ))
                .field(FieldDecl::optional(
                    "label",
                    ValueType::Primitive(Primitive::String),
                )),
        )
        .expect("panel");

    Building {
        registry: b.build(),
        has_dimension,
        length,
        metric,
        metre,
        boxed,
        crate_,
        panel,
    }
}

fn metric(b: &Building, value: f64) -> Instance {
    Instance::builder(&b.registry, b.metric)
        .set("value", value)
        .build()
        .expect("metric length")
}

// =============================================================================
// Box scenario
// =============================================================================

#[test]
fn box_width_resolves_to_has_dimension() {
    let b = building();
    let width = b.registry.field(b.boxed, "width").expect("width");
    assert_eq!(
        resolve(&b.registry, b.boxed, width).expect("resolve"),
        Resolution::Relation(b.has_dimension)
    );
}

#[test]
fn box_template_has_two_statements_and_one_dependency() {
    let b = building();
    let t = template(&b.registry, b.boxed).expect("template");
    assert_eq!(t.body.len(), 2);
    assert_eq!(t.body[0].predicate, rdf_type());
    assert_eq!(
        t.body[1],
        Triple::new(
            semobj::term::param("name"),
            EX.iri("hasDimension"),
            semobj::term::param("width")
        )
    );
    assert_eq!(
        t.dependencies,
        [Dependency {
            target: b.length,
            args: BTreeMap::from([("name".to_owned(), "width".to_owned())]),
        }]
    );
}

// =============================================================================
// Relation inference
// =============================================================================

#[test]
fn inference_is_deterministic_and_explicit_wins() {
    let mut reg = Registry::builder();
    let m = reg.markers();
    let r1 = reg
        .declare(TypeDecl::new("r1", EX).extends(m.predicate))
        .expect("r1");
    let r2 = reg
        .declare(TypeDecl::new("r2", EX).extends(m.predicate))
        .expect("r2");
    let r3 = reg
        .declare(TypeDecl::new("r3", EX).extends(m.predicate))
        .expect("r3");
    let x = reg.declare(TypeDecl::new("X", EX).extends(m.node)).expect("x");
    let parent = reg
        .declare(TypeDecl::new("P", EX).extends(m.node).allows(r2, x))
        .expect("p");
    let t = reg
        .declare(
            TypeDecl::new("T", EX)
                .extends(parent)
                .allows(r1, x)
                .field(FieldDecl::required("inferred", ValueType::Type(x)))
                .field(FieldDecl::required("pinned", ValueType::Type(x)).relation(r3)),
        )
        .expect("t");
    let registry = reg.build();

    let inferred = registry.field(t, "inferred").expect("field");
    let first = resolve(&registry, t, inferred).expect("resolve");
    assert_eq!(first, resolve(&registry, t, inferred).expect("resolve"));
    // Own table beats the ancestor's entry for the same target.
    assert_eq!(first, Resolution::Relation(r1));

    let pinned = registry.field(t, "pinned").expect("field");
    assert_eq!(
        resolve(&registry, t, pinned).expect("resolve"),
        Resolution::Relation(r3)
    );
}

// =============================================================================
// Closure
// =============================================================================

#[test]
fn diamond_target_appears_once_in_closure() {
    let mut reg = Registry::builder();
    let m = reg.markers();
    let has = reg
        .declare(TypeDecl::new("has", EX).extends(m.predicate))
        .expect("has");
    let a = reg.declare(TypeDecl::new("A", EX).extends(m.node)).expect("a");
    let bb = reg.declare(TypeDecl::new("B", EX).extends(m.node)).expect("b");
    let c = reg
        .declare(TypeDecl::new("C", EX).extends(a).extends(bb))
        .expect("c");
    let z = reg
        .declare(
            TypeDecl::new("Z", EX)
                .extends(m.node)
                .allows(has, m.node)
                .field(FieldDecl::required("a", ValueType::Type(a)))
                .field(FieldDecl::required("b", ValueType::Type(bb)))
                .field(FieldDecl::required("c1", ValueType::Type(c)))
                .field(FieldDecl::required("c2", ValueType::Type(c))),
        )
        .expect("z");
    let registry = reg.build();

    let found = closure(&registry, &[z]).expect("closure");
    assert_eq!(found.entities.iter().filter(|&&t| t == c).count(), 1);
    assert_eq!(found.relations, [has]);
    assert!(found.contains(a) && found.contains(bb));
}

// =============================================================================
// Shapes and queries
// =============================================================================

#[test]
fn two_fields_on_one_relation_give_min_count_two() {
    let b = building();
    let s = shape(&b.registry, b.crate_, true).expect("shape");
    let dims: Vec<_> = s
        .properties
        .iter()
        .filter(|p| p.path == EX.iri("hasDimension"))
        .collect();
    assert_eq!(dims.len(), 1);
    assert_eq!(dims[0].min_count, 2);
}

#[test]
fn exact_values_are_closed_world() {
    let mut reg = Registry::builder();
    let m = reg.markers();
    let has_aspect = reg
        .declare(TypeDecl::new("hasAspect", EX).extends(m.predicate))
        .expect("rel");
    let aspect = reg
        .declare(TypeDecl::new("Aspect", EX).extends(m.named_node))
        .expect("aspect");
    let values: Vec<TypeId> = ["A", "B", "C"]
        .into_iter()
        .map(|n| {
            reg.declare(TypeDecl::new(n, EX).extends(aspect))
                .expect("value")
        })
        .collect();
    let mut declare = |name, exact: Vec<TypeId>| {
        reg.declare(
            TypeDecl::new(name, EX)
                .extends(m.node)
                .allows(has_aspect, aspect)
                .field(
                    FieldDecl::required("aspects", ValueType::collection(ValueType::Type(aspect)))
                        .exact_values(exact),
                ),
        )
        .expect("type")
    };
    let closed = declare("Closed", values);
    let bare = declare("Bare", Vec::new());
    let registry = reg.build();

    let q = query(&registry, closed).expect("query");
    let listed: Vec<_> = q
        .required
        .filters
        .iter()
        .filter_map(|f| match f {
            Filter::In { values, .. } => Some(values.clone()),
            Filter::NotExists(_) => None,
        })
        .collect();
    assert_eq!(listed, [vec![EX.iri("A"), EX.iri("B"), EX.iri("C")]]);

    let q = query(&registry, bare).expect("query");
    assert!(q
        .required
        .filters
        .iter()
        .any(|f| matches!(f, Filter::NotExists(p) if p[0].predicate == EX.iri("hasAspect"))));
    assert!(q
        .required
        .patterns
        .iter()
        .chain(q.optional.iter().flat_map(|g| &g.patterns))
        .all(|p| p.predicate != EX.iri("hasAspect")));
}

struct Aspects {
    registry: Registry,
    values: Vec<TypeId>,
    tagged: TypeId,
    bare: TypeId,
}

/// `Tagged` carries an open collection of aspects, `Bare` forbids any.
fn aspects() -> Aspects {
    let mut reg = Registry::builder();
    let m = reg.markers();
    let has_aspect = reg
        .declare(TypeDecl::new("hasAspect", EX).extends(m.predicate))
        .expect("rel");
    let aspect = reg
        .declare(TypeDecl::new("Aspect", EX).extends(m.named_node))
        .expect("aspect");
    let values = ["A", "B"]
        .into_iter()
        .map(|n| {
            reg.declare(TypeDecl::new(n, EX).extends(aspect))
                .expect("value")
        })
        .collect();
    let collection = || ValueType::collection(ValueType::Type(aspect));
    let tagged = reg
        .declare(
            TypeDecl::new("Tagged", EX)
                .extends(m.node)
                .allows(has_aspect, aspect)
                .field(FieldDecl::required("aspects", collection())),
        )
        .expect("tagged");
    let bare = reg
        .declare(
            TypeDecl::new("Bare", EX)
                .extends(m.node)
                .allows(has_aspect, aspect)
                .field(FieldDecl::required("aspects", collection()).exact_values(Vec::new())),
        )
        .expect("bare");
    Aspects {
        registry: reg.build(),
        values,
        tagged,
        bare,
    }
}

#[test]
fn root_collection_keeps_every_value() {
    let a = aspects();
    let both = Value::List(a.values.iter().copied().map(Value::Named).collect());
    let original = Instance::builder(&a.registry, a.tagged)
        .id("t1")
        .set("aspects", both.clone())
        .build()
        .expect("tagged");

    let store: MemoryStore = instance_triples(&a.registry, &original, MODEL)
        .expect("triples")
        .into_iter()
        .collect();
    let report = Loader::new(&a.registry, &store)
        .query_and_load(a.tagged)
        .expect("load");

    assert!(report.errors.is_empty());
    assert_eq!(report.instances.len(), 1);
    let loaded = report.get("t1").expect("t1");
    assert_eq!(loaded.get("aspects"), Some(&both));
    assert_eq!(loaded.as_ref(), &original);
}

#[test]
fn empty_exact_values_build_and_load() {
    let a = aspects();
    let original = Instance::builder(&a.registry, a.bare)
        .id("plain")
        .build()
        .expect("bare");
    assert_eq!(original.get("aspects"), Some(&Value::List(Vec::new())));

    let mut store: MemoryStore = instance_triples(&a.registry, &original, MODEL)
        .expect("triples")
        .into_iter()
        .collect();
    store.insert(Triple::new(MODEL.iri("tagged"), rdf_type(), EX.iri("Bare")));
    store.insert(Triple::new(MODEL.iri("tagged"), EX.iri("hasAspect"), EX.iri("A")));

    let report = Loader::new(&a.registry, &store)
        .query_and_load(a.bare)
        .expect("load");
    assert!(report.errors.is_empty());
    assert_eq!(report.instances.len(), 1);
    assert_eq!(report.get("plain").expect("plain").as_ref(), &original);
    assert!(report.get("tagged").is_none());
}

#[test]
fn empty_exact_values_forbid_the_relation_in_the_shape() {
    let a = aspects();
    let s = shape(&a.registry, a.bare, true).expect("shape");
    let property = s
        .properties
        .iter()
        .find(|p| p.path == EX.iri("hasAspect"))
        .expect("hasAspect property");
    assert_eq!(property.min_count, 0);
    assert_eq!(property.max_count, Some(0));
    assert!(property.restrictions.is_empty());

    let turtle = s.to_turtle();
    assert!(turtle.contains("sh:maxCount \"0\"^^xsd:integer"), "{turtle}");
    assert!(!turtle.contains("sh:minCount"), "{turtle}");
}

// =============================================================================
// Round trip and batch loading
// =============================================================================

#[test]
fn instances_round_trip_through_the_store() {
    let b = building();
    let original = Instance::builder(&b.registry, b.panel)
        .id("panel1")
        .set("width", metric(&b, 2.0))
        .set("count", 4_i64)
        .build()
        .expect("crate");

    let store: MemoryStore = instance_triples(&b.registry, &original, MODEL)
        .expect("triples")
        .into_iter()
        .collect();
    let report = Loader::new(&b.registry, &store)
        .query_and_load(b.panel)
        .expect("load");

    assert!(report.errors.is_empty());
    assert_eq!(report.instances.len(), 1);
    let loaded = report.get("panel1").expect("panel1");
    assert_eq!(loaded.get("count"), Some(&Value::Int(4)));
    assert_eq!(loaded.get("label"), None);
    let width = loaded.get("width").and_then(Value::as_instance).expect("width");
    assert_eq!(width.get("unit"), Some(&Value::Named(b.metre)));
    assert_eq!(loaded.as_ref(), &original);
}

#[test]
fn one_bad_row_does_not_sink_the_batch() {
    let b = building();
    let store = MemoryStore::new();
    let mut table = ResultTable::new(["name", "value"]);
    let good: Row = [
        ("name".to_owned(), Term::from(MODEL.iri("ok"))),
        (
            "value".to_owned(),
            Term::from(Literal::new("1.5", Primitive::Decimal)),
        ),
    ]
    .into_iter()
    .collect();
    let bad: Row = [("name".to_owned(), Term::from(MODEL.iri("broken")))]
        .into_iter()
        .collect();
    table.push(good);
    table.push(bad);

    let report = Loader::new(&b.registry, &store)
        .load(b.metric, &table)
        .expect("load");
    assert_eq!(report.instances.len(), 1);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].row, 1);
    assert!(Error::from(report.errors[0].error.clone()).is_recoverable());
    assert!(matches!(
        report.errors[0].error,
        CoercionError::MissingColumn { ref column } if column == "value"
    ));
}

#[test]
fn shared_nested_identity_is_materialized_once() {
    let b = building();
    let side = std::rc::Rc::new(metric(&b, 1.0));
    let cube = Instance::builder(&b.registry, b.crate_)
        .id("cube")
        .set("width", side.clone())
        .set("height", side)
        .set("count", 1_i64)
        .build()
        .expect("cube");
    let mut store: MemoryStore = instance_triples(&b.registry, &cube, MODEL)
        .expect("triples")
        .into_iter()
        .collect();
    store.insert(Triple::new(
        MODEL.iri("cube"),
        EX.iri("hasLabel"),
        Literal::new("unit cube", Primitive::String),
    ));

    let report = Loader::new(&b.registry, &store)
        .query_and_load(b.crate_)
        .expect("load");
    let loaded = report.get("cube").expect("cube");
    let (Some(Value::Resource(w)), Some(Value::Resource(h))) =
        (loaded.get("width"), loaded.get("height"))
    else {
        panic!("nested values missing");
    };
    assert!(std::rc::Rc::ptr_eq(w, h));
    assert_eq!(loaded.get("label"), Some(&Value::Str("unit cube".into())));
}

//! Reference building vocabulary.
//!
//! A small slice of an s223/QUDT-style model: physical and domain spaces,
//! windows, quantifiable properties with a fixed quantity kind, units and
//! aspect qualifiers. Every validator runs against it.

use semobj::{
    FieldDecl, InterFieldRelation, Namespace, Primitive, QualifierPolicy, Registry, TypeDecl,
    TypeId, ValueType,
};

/// Building vocabulary namespace.
pub const S223: Namespace = Namespace::new("s223", "http://data.ashrae.org/standard223#");
/// QUDT schema namespace.
pub const QUDT: Namespace = Namespace::new("qudt", "http://qudt.org/schema/qudt/");
/// QUDT quantity kinds.
pub const QK: Namespace = Namespace::new("quantitykind", "http://qudt.org/vocab/quantitykind/");
/// QUDT units.
pub const UNIT: Namespace = Namespace::new("unit", "http://qudt.org/vocab/unit/");

/// Handles of the declared types the validators refer to.
#[derive(Debug, Clone, Copy)]
pub struct Handles {
    /// `s223:hasAspect`.
    pub has_aspect: TypeId,
    /// `s223:Property`.
    pub property: TypeId,
    /// `s223:Area`.
    pub area: TypeId,
    /// `s223:AreaSetpoint`.
    pub area_setpoint: TypeId,
    /// `s223:Azimuth`.
    pub azimuth: TypeId,
    /// `s223:Tilt`.
    pub tilt: TypeId,
    /// `s223:Space`.
    pub space: TypeId,
    /// `s223:Window`.
    pub window: TypeId,
    /// `s223:Zone`.
    pub zone: TypeId,
    /// `unit:M2`.
    pub square_metre: TypeId,
    /// `unit:DEG`.
    pub degree: TypeId,
}

/// The vocabulary and its handles.
#[derive(Debug)]
pub struct Vocabulary {
    /// The registry.
    pub registry: Registry,
    /// Frequently used types.
    pub handles: Handles,
}

impl Vocabulary {
    /// The default root types: every concrete entity that is not a value.
    pub fn default_roots(&self) -> Vec<TypeId> {
        let h = self.handles;
        vec![h.space, h.window, h.zone]
    }

    /// Looks a root up by name in the building namespace.
    pub fn root(&self, name: &str) -> Option<TypeId> {
        self.registry.find(S223, name)
    }

    /// Closed-world treatment of aspects on properties.
    pub fn qualifier_policy(&self) -> QualifierPolicy {
        QualifierPolicy {
            relation: self.handles.has_aspect,
            applies_to: vec![self.handles.property],
        }
    }
}

/// Declares the vocabulary.
///
/// # Errors
///
/// Returns an error if a declaration is rejected.
pub fn building() -> anyhow::Result<Vocabulary> {
    let mut b = Registry::builder();
    let m = b.markers();

    let mut relation = |ns: Namespace, name: &'static str| {
        b.declare(TypeDecl::new(name, ns).extends(m.predicate))
    };
    let has_value = relation(S223, "hasValue")?;
    let has_unit = relation(S223, "hasUnit")?;
    let has_property = relation(S223, "hasProperty")?;
    let has_aspect = relation(S223, "hasAspect")?;
    let contains = relation(S223, "contains")?;
    let encloses = relation(S223, "encloses")?;
    let has_quantity_kind = relation(QUDT, "hasQuantityKind")?;
    let connected_to = b.declare(
        TypeDecl::new("connectedTo", S223)
            .extends(m.predicate)
            .label("connected to")
            .comment("Indicates that two entities are connected in some way."),
    )?;

    // Named identities
    let quantity_kind = b.declare(
        TypeDecl::new("QuantityKind", QUDT)
            .extends(m.named_node)
            .abstract_type(),
    )?;
    let qk_area = b.declare(TypeDecl::new("Area", QK).extends(quantity_kind))?;
    let qk_angle = b.declare(TypeDecl::new("Angle", QK).extends(quantity_kind))?;
    let unit = b.declare(TypeDecl::new("Unit", QUDT).extends(m.named_node).abstract_type())?;
    let square_metre = b.declare(TypeDecl::new("M2", UNIT).extends(unit))?;
    let _square_foot = b.declare(TypeDecl::new("FT2", UNIT).extends(unit))?;
    let degree = b.declare(TypeDecl::new("DEG", UNIT).extends(unit))?;
    let enumeration = b.declare(
        TypeDecl::new("EnumerationKind", S223)
            .extends(m.named_node)
            .abstract_type(),
    )?;
    let aspect = b.declare(
        TypeDecl::new("EnumerationKind-Aspect", S223)
            .extends(enumeration)
            .abstract_type(),
    )?;
    let setpoint = b.declare(TypeDecl::new("Aspect-Setpoint", S223).extends(aspect))?;

    // Properties
    let property = b.declare(
        TypeDecl::new("Property", S223)
            .extends(m.value)
            .abstract_type()
            .allows(has_aspect, aspect)
            .allows(has_value, Primitive::Decimal)
            .allows(has_unit, unit)
            .allows(has_quantity_kind, quantity_kind),
    )?;
    let observable = b.declare(
        TypeDecl::new("QuantifiableObservableProperty", S223)
            .extends(property)
            .abstract_type()
            .field(
                FieldDecl::required("qk", ValueType::Type(quantity_kind))
                    .qualified(false)
                    .comment("The quantity kind of the property."),
            )
            .field(FieldDecl::required(
                "value",
                ValueType::Primitive(Primitive::Decimal),
            ))
            .field(FieldDecl::required("unit", ValueType::Type(unit))),
    )?;
    let area = b.declare(TypeDecl::new("Area", S223).extends(observable).fix("qk", qk_area))?;
    let area_setpoint = b.declare(
        TypeDecl::new("AreaSetpoint", S223).extends(area).field(
            FieldDecl::required("aspects", ValueType::collection(ValueType::Type(aspect)))
                .exact_values(vec![setpoint]),
        ),
    )?;
    let azimuth = b.declare(
        TypeDecl::new("Azimuth", S223)
            .extends(observable)
            .fix("qk", qk_angle),
    )?;
    let tilt = b.declare(TypeDecl::new("Tilt", S223).extends(observable).fix("qk", qk_angle))?;

    // Spaces and windows
    let physical_space = b.declare(
        TypeDecl::new("PhysicalSpace", S223)
            .extends(m.node)
            .label("Physical Space")
            .comment(
                "An architectural concept representing a room, a part of a room, \
                 a collection of rooms, or any other physical region in a building.",
            )
            .allows_self(contains)
            .allows(has_property, observable),
    )?;
    let space = b.declare(
        TypeDecl::new("Space", S223)
            .extends(physical_space)
            .field(FieldDecl::required("area", ValueType::Type(area)))
            .field(FieldDecl::optional("setpoint", ValueType::Type(area_setpoint))),
    )?;
    let window = b.declare(
        TypeDecl::new("Window", S223)
            .extends(m.node)
            .allows(has_property, observable)
            .field(FieldDecl::required("area", ValueType::Type(area)))
            .field(FieldDecl::required("azimuth", ValueType::Type(azimuth)))
            .field(FieldDecl::required("tilt", ValueType::Type(tilt))),
    )?;
    let domain_space = b.declare(
        TypeDecl::new("DomainSpace", S223)
            .extends(m.node)
            .label("Domain Space")
            .allows(has_property, observable),
    )?;
    let has_window = b.declare(
        TypeDecl::new("hasWindow", S223)
            .extends(m.predicate)
            .label("has window")
            .sub_property_of(connected_to)
            .domain(domain_space)
            .range(window),
    )?;
    b.allow(domain_space, has_window, window)?;
    b.allow(physical_space, encloses, domain_space)?;

    let zone = b.declare(
        TypeDecl::new("Zone", S223)
            .extends(domain_space)
            .field(FieldDecl::required("space", ValueType::Type(space)).no_relation())
            .field(FieldDecl::required("window", ValueType::Type(window)))
            .link(InterFieldRelation::new("space", connected_to, "window")),
    )?;

    Ok(Vocabulary {
        registry: b.build(),
        handles: Handles {
            has_aspect,
            property,
            area,
            area_setpoint,
            azimuth,
            tilt,
            space,
            window,
            zone,
            square_metre,
            degree,
        },
    })
}

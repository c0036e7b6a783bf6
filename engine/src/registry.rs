//! The type registry and its builder.
//!
//! A [`Registry`] is built once from [`TypeDecl`]s and is read-only
//! afterwards. It answers the lookups every other component needs: the
//! ancestry linearization, the applicable field set, own relation tables and
//! inherited inter-field links.
//!
//! # Linearization
//!
//! Ancestry lists a type first, then its ancestors most-specific first and
//! left to right across multiple parents. It is the depth-first preorder
//! with only the *last* occurrence of each type kept, so a shared ancestor
//! of a diamond follows every type that inherits from it:
//!
//! ```
//! use semobj::{Namespace, Registry, TypeDecl};
//!
//! const EX: Namespace = Namespace::new("ex", "urn:ex#");
//! let mut b = Registry::builder();
//! let node = b.markers().node;
//! let z = b.declare(TypeDecl::new("Z", EX).extends(node)).unwrap();
//! let a = b.declare(TypeDecl::new("A", EX).extends(z)).unwrap();
//! let bb = b.declare(TypeDecl::new("B", EX).extends(z)).unwrap();
//! let c = b.declare(TypeDecl::new("C", EX).extends(a).extends(bb)).unwrap();
//! let registry = b.build();
//! assert_eq!(&registry.ancestry(c)[..4], &[c, a, bb, z]);
//! ```

use std::collections::{HashMap, HashSet};

use crate::error::DefinitionError;
use crate::model::{
    Field, FieldBinding, InterFieldRelation, Markers, Namespace, Primitive, RelationBinding,
    RelationEntry, RelationMeta, ResourceType, Target, TypeId, ValueType,
};
use crate::namespaces::CORE;
use crate::term::Iri;

/// All declared types.
#[derive(Debug, Clone)]
pub struct Registry {
    types: Vec<ResourceType>,
    by_iri: HashMap<String, TypeId>,
    markers: Markers,
}

impl Registry {
    /// Starts a registry seeded with the marker types.
    #[must_use]
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// The seeded marker types.
    #[must_use]
    pub fn markers(&self) -> Markers {
        self.markers
    }

    /// The declaration behind a handle.
    ///
    /// Handles are only produced by this registry's builder, so indexing
    /// always succeeds for them.
    #[must_use]
    pub fn get(&self, id: TypeId) -> &ResourceType {
        &self.types[id.index()]
    }

    /// All declarations, markers first, in declaration order.
    pub fn types(&self) -> impl Iterator<Item = &ResourceType> {
        self.types.iter()
    }

    /// Number of declared types, markers included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Whether only the markers are declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.iter().all(|t| self.markers.contains(t.id))
    }

    /// Looks a type up by namespace and name.
    #[must_use]
    pub fn find(&self, namespace: Namespace, name: &str) -> Option<TypeId> {
        self.by_iri.get(&format!("{}{}", namespace.iri, name)).copied()
    }

    /// Looks a type up by its full IRI.
    #[must_use]
    pub fn find_by_iri(&self, iri: &Iri) -> Option<TypeId> {
        self.by_iri.get(&iri.to_string()).copied()
    }

    /// Self first, then ancestors most-specific first.
    #[must_use]
    pub fn ancestry(&self, id: TypeId) -> &[TypeId] {
        &self.get(id).ancestry
    }

    /// Whether `ancestor` is `id` or one of its ancestors.
    #[must_use]
    pub fn is_a(&self, id: TypeId, ancestor: TypeId) -> bool {
        self.ancestry(id).contains(&ancestor)
    }

    /// Whether `id` is a relation type.
    #[must_use]
    pub fn is_relation(&self, id: TypeId) -> bool {
        id != self.markers.predicate && self.is_a(id, self.markers.predicate)
    }

    /// Whether `id` is an entity or value type.
    #[must_use]
    pub fn is_entity(&self, id: TypeId) -> bool {
        self.is_a(id, self.markers.node)
    }

    /// Whether `id` is a value type.
    #[must_use]
    pub fn is_value(&self, id: TypeId) -> bool {
        self.is_a(id, self.markers.value)
    }

    /// `prefix:Name` of a type.
    #[must_use]
    pub fn display(&self, id: TypeId) -> String {
        self.get(id).qualified_name()
    }

    /// Renders a target for messages.
    #[must_use]
    pub fn display_target(&self, target: Target) -> String {
        match target {
            Target::Primitive(p) => p.as_str().to_owned(),
            Target::Type(t) => self.display(t),
        }
    }

    /// The IRI of a concrete type.
    ///
    /// # Errors
    ///
    /// Returns [`DefinitionError::MissingIdentity`] for abstract types.
    pub fn identity(&self, id: TypeId) -> Result<Iri, DefinitionError> {
        let ty = self.get(id);
        if ty.is_abstract {
            return Err(DefinitionError::MissingIdentity {
                type_name: ty.qualified_name(),
            });
        }
        Ok(ty.iri())
    }

    /// Own and inherited fields; the most specific declaration of a name
    /// wins. Own fields come first, then each ancestor's in ancestry order.
    #[must_use]
    pub fn fields(&self, id: TypeId) -> Vec<&Field> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for &t in self.ancestry(id) {
            for field in &self.get(t).fields {
                if seen.insert(field.name) {
                    out.push(field);
                }
            }
        }
        out
    }

    /// Fields declared on the type itself.
    #[must_use]
    pub fn own_fields(&self, id: TypeId) -> Vec<&Field> {
        self.get(id).fields.iter().collect()
    }

    /// The applicable field named `name`.
    #[must_use]
    pub fn field(&self, id: TypeId, name: &str) -> Option<&Field> {
        self.ancestry(id)
            .iter()
            .find_map(|&t| self.get(t).own_field(name))
    }

    /// The explicit relation table of this exact type; never inherited.
    #[must_use]
    pub fn relation_table(&self, id: TypeId) -> &[RelationEntry] {
        &self.get(id).relations
    }

    /// Own and inherited inter-field links, deduplicated on
    /// `(source, relation, target)`, least specific first.
    #[must_use]
    pub fn inter_field_relations(&self, id: TypeId) -> Vec<&InterFieldRelation> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for &t in self.ancestry(id).iter().rev() {
            for link in &self.get(t).links {
                if seen.insert((link.source, link.relation, link.target)) {
                    out.push(link);
                }
            }
        }
        out
    }

    /// The nearest ancestor (excluding `id`) that is not a marker.
    #[must_use]
    pub fn meaningful_parent(&self, id: TypeId) -> Option<TypeId> {
        self.ancestry(id)
            .iter()
            .skip(1)
            .copied()
            .find(|&t| !self.markers.contains(t))
    }

    fn push(&mut self, ty: ResourceType) -> TypeId {
        let id = ty.id;
        self.by_iri.insert(ty.iri().to_string(), id);
        self.types.push(ty);
        id
    }

    fn next_id(&self) -> TypeId {
        TypeId(self.types.len() as u32)
    }

    fn contains(&self, id: TypeId) -> bool {
        id.index() < self.types.len()
    }
}

/// Linearizes `parents` for a new type `id`.
fn linearize(registry: &Registry, id: TypeId, parents: &[TypeId]) -> Vec<TypeId> {
    let mut preorder = vec![id];
    for &p in parents {
        preorder.extend_from_slice(registry.ancestry(p));
    }
    let mut seen = HashSet::new();
    let mut kept: Vec<TypeId> = preorder
        .into_iter()
        .rev()
        .filter(|t| seen.insert(*t))
        .collect();
    kept.reverse();
    kept
}

/// Builds a [`Registry`].
#[derive(Debug, Clone)]
pub struct RegistryBuilder {
    registry: Registry,
}

impl Default for RegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RegistryBuilder {
    /// A builder holding only the marker types.
    #[must_use]
    pub fn new() -> Self {
        let mut registry = Registry {
            types: Vec::new(),
            by_iri: HashMap::new(),
            markers: Markers {
                resource: TypeId(0),
                predicate: TypeId(1),
                node: TypeId(2),
                value: TypeId(3),
                named_node: TypeId(4),
            },
        };
        let seeds: [(&'static str, Option<TypeId>, bool); 5] = [
            ("Resource", None, true),
            ("Predicate", Some(TypeId(0)), true),
            ("Node", Some(TypeId(0)), true),
            ("Value", Some(TypeId(2)), true),
            ("NamedNode", Some(TypeId(2)), false),
        ];
        for (name, parent, templatize) in seeds {
            let id = registry.next_id();
            let parents: Vec<TypeId> = parent.into_iter().collect();
            let ancestry = linearize(&registry, id, &parents);
            registry.push(ResourceType {
                id,
                name,
                namespace: CORE,
                label: None,
                comment: None,
                is_abstract: true,
                templatize,
                parents,
                fields: Vec::new(),
                relations: Vec::new(),
                links: Vec::new(),
                relation_meta: None,
                extra_types: Vec::new(),
                ancestry,
            });
        }
        Self { registry }
    }

    /// The seeded marker types.
    #[must_use]
    pub fn markers(&self) -> Markers {
        self.registry.markers
    }

    /// Read access to what has been declared so far.
    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Declares a type.
    ///
    /// # Errors
    ///
    /// Returns a [`DefinitionError`] if the name is taken, a parent or
    /// relation is unknown, a fixed or linked field is not applicable, or
    /// a relation slot names a type that is not a relation.
    pub fn declare(&mut self, decl: TypeDecl) -> Result<TypeId, DefinitionError> {
        let reg = &self.registry;
        let type_name = format!("{}:{}", decl.namespace.prefix, decl.name);
        let invalid = |reason: &str| DefinitionError::InvalidDeclaration {
            type_name: type_name.clone(),
            reason: reason.to_owned(),
        };

        if decl.name.is_empty() {
            return Err(invalid("empty type name"));
        }
        if reg.find(decl.namespace, decl.name).is_some() {
            return Err(DefinitionError::DuplicateType {
                type_name: type_name.clone(),
            });
        }
        if decl.parents.is_empty() {
            return Err(invalid("no parent type; extend a marker type"));
        }
        for &p in &decl.parents {
            if !reg.contains(p) {
                return Err(DefinitionError::UnknownType(format!("#{}", p.index())));
            }
        }

        let id = reg.next_id();
        let ancestry = linearize(reg, id, &decl.parents);
        let is_relation = ancestry.contains(&reg.markers.predicate);
        let templatize = decl
            .templatize
            .unwrap_or_else(|| decl.parents.iter().all(|&p| reg.get(p).templatize));
        let check_relation = |rel: TypeId| -> Result<(), DefinitionError> {
            if reg.contains(rel) && reg.is_relation(rel) {
                Ok(())
            } else if rel == id && is_relation {
                Ok(())
            } else {
                Err(invalid("relation slot names a type that is not a relation"))
            }
        };
        let check_type = |t: TypeId| -> Result<(), DefinitionError> {
            if reg.contains(t) || t == id {
                Ok(())
            } else {
                Err(DefinitionError::UnknownType(format!("#{}", t.index())))
            }
        };

        let mut fields: Vec<Field> = Vec::with_capacity(decl.fields.len() + decl.fixes.len());
        for FieldDecl(mut field) in decl.fields {
            if fields.iter().any(|f| f.name == field.name) {
                return Err(invalid(&format!("field '{}' declared twice", field.name)));
            }
            if let RelationBinding::Explicit(rel) = field.relation {
                check_relation(rel)?;
            }
            if let Target::Type(t) = field.value_type.target(id) {
                check_type(t)?;
            }
            for &v in field.exact_values.iter().flatten() {
                check_type(v)?;
            }
            field.declared_by = id;
            fields.push(field);
        }

        for (name, value) in decl.fixes {
            if fields.iter().any(|f| f.name == name) {
                return Err(invalid(&format!(
                    "field '{name}' is both declared and fixed"
                )));
            }
            check_type(value)?;
            let inherited = ancestry[1..]
                .iter()
                .find_map(|&t| reg.get(t).own_field(name))
                .ok_or_else(|| DefinitionError::UnknownField {
                    type_name: type_name.clone(),
                    field: name.to_owned(),
                })?;
            fields.push(Field {
                binding: FieldBinding::Fixed(value),
                exact_values: None,
                optional: false,
                declared_by: id,
                ..inherited.clone()
            });
        }

        let mut relations = Vec::with_capacity(decl.relations.len());
        for (relation, target) in decl.relations {
            check_relation(relation)?;
            let target = target.unwrap_or(Target::Type(id));
            if let Target::Type(t) = target {
                check_type(t)?;
            }
            relations.push(RelationEntry { relation, target });
        }

        let applicable = |name: &str| {
            fields.iter().any(|f| f.name == name)
                || ancestry[1..]
                    .iter()
                    .any(|&t| reg.get(t).own_field(name).is_some())
        };
        for link in &decl.links {
            check_relation(link.relation)?;
            for name in [link.source, link.target] {
                if !applicable(name) {
                    return Err(DefinitionError::UnknownField {
                        type_name: type_name.clone(),
                        field: name.to_owned(),
                    });
                }
            }
        }

        if let Some(meta) = decl.relation_meta {
            if !is_relation {
                return Err(invalid("property metadata on a non-relation type"));
            }
            if let Some(parent) = meta.sub_property_of {
                check_relation(parent)?;
            }
            for t in [meta.domain, meta.range].into_iter().flatten() {
                check_type(t)?;
            }
        }

        let ty = ResourceType {
            id,
            name: decl.name,
            namespace: decl.namespace,
            label: decl.label,
            comment: decl.comment,
            is_abstract: decl.is_abstract,
            templatize,
            parents: decl.parents,
            fields,
            relations,
            links: decl.links,
            relation_meta: decl.relation_meta,
            extra_types: decl.extra_types,
            ancestry,
        };
        tracing::trace!(type_name = %ty.qualified_name(), "declared type");
        Ok(self.registry.push(ty))
    }

    /// Appends an entry to an already-declared type's relation table.
    ///
    /// Tables may name types declared after their owner, so entries can be
    /// added once both ends exist.
    ///
    /// # Errors
    ///
    /// Returns a [`DefinitionError`] if either handle is unknown or
    /// `relation` is not a relation type.
    pub fn allow(
        &mut self,
        owner: TypeId,
        relation: TypeId,
        target: impl Into<Target>,
    ) -> Result<(), DefinitionError> {
        let target = target.into();
        let reg = &self.registry;
        for t in [Some(owner), target.type_id()].into_iter().flatten() {
            if !reg.contains(t) {
                return Err(DefinitionError::UnknownType(format!("#{}", t.index())));
            }
        }
        if !reg.contains(relation) || !reg.is_relation(relation) {
            return Err(DefinitionError::InvalidDeclaration {
                type_name: reg.display(owner),
                reason: "relation slot names a type that is not a relation".to_owned(),
            });
        }
        self.registry.types[owner.index()]
            .relations
            .push(RelationEntry { relation, target });
        Ok(())
    }

    /// Finishes the registry.
    #[must_use]
    pub fn build(self) -> Registry {
        self.registry
    }
}

impl From<TypeId> for Target {
    fn from(t: TypeId) -> Self {
        Target::Type(t)
    }
}

impl From<Primitive> for Target {
    fn from(p: Primitive) -> Self {
        Target::Primitive(p)
    }
}

/// Declaration of one type, consumed by [`RegistryBuilder::declare`].
#[derive(Debug, Clone)]
pub struct TypeDecl {
    name: &'static str,
    namespace: Namespace,
    label: Option<&'static str>,
    comment: Option<&'static str>,
    is_abstract: bool,
    templatize: Option<bool>,
    parents: Vec<TypeId>,
    fields: Vec<FieldDecl>,
    fixes: Vec<(&'static str, TypeId)>,
    relations: Vec<(TypeId, Option<Target>)>,
    links: Vec<InterFieldRelation>,
    relation_meta: Option<RelationMeta>,
    extra_types: Vec<Iri>,
}

impl TypeDecl {
    /// A concrete type with no parents yet.
    #[must_use]
    pub fn new(name: &'static str, namespace: Namespace) -> Self {
        Self {
            name,
            namespace,
            label: None,
            comment: None,
            is_abstract: false,
            templatize: None,
            parents: Vec::new(),
            fields: Vec::new(),
            fixes: Vec::new(),
            relations: Vec::new(),
            links: Vec::new(),
            relation_meta: None,
            extra_types: Vec::new(),
        }
    }

    /// Adds a parent; parents are ordered left to right.
    #[must_use]
    pub fn extends(mut self, parent: TypeId) -> Self {
        self.parents.push(parent);
        self
    }

    /// Marks the type abstract.
    #[must_use]
    pub fn abstract_type(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    /// Overrides the inherited templatize flag.
    #[must_use]
    pub fn templatize(mut self, on: bool) -> Self {
        self.templatize = Some(on);
        self
    }

    /// Sets the label.
    #[must_use]
    pub fn label(mut self, label: &'static str) -> Self {
        self.label = Some(label);
        self
    }

    /// Sets the comment.
    #[must_use]
    pub fn comment(mut self, comment: &'static str) -> Self {
        self.comment = Some(comment);
        self
    }

    /// Declares a field.
    #[must_use]
    pub fn field(mut self, field: FieldDecl) -> Self {
        self.fields.push(field);
        self
    }

    /// Fixes an inherited field to `value` in this subtree.
    #[must_use]
    pub fn fix(mut self, field: &'static str, value: TypeId) -> Self {
        self.fixes.push((field, value));
        self
    }

    /// Adds an explicit relation table entry.
    #[must_use]
    pub fn allows(mut self, relation: TypeId, target: impl Into<Target>) -> Self {
        self.relations.push((relation, Some(target.into())));
        self
    }

    /// Adds an explicit relation table entry targeting the type itself.
    #[must_use]
    pub fn allows_self(mut self, relation: TypeId) -> Self {
        self.relations.push((relation, None));
        self
    }

    /// Declares an inter-field link.
    #[must_use]
    pub fn link(mut self, link: InterFieldRelation) -> Self {
        self.links.push(link);
        self
    }

    /// Sets the parent relation.
    #[must_use]
    pub fn sub_property_of(mut self, relation: TypeId) -> Self {
        self.relation_meta.get_or_insert_with(RelationMeta::default).sub_property_of =
            Some(relation);
        self
    }

    /// Sets the relation domain.
    #[must_use]
    pub fn domain(mut self, domain: TypeId) -> Self {
        self.relation_meta.get_or_insert_with(RelationMeta::default).domain = Some(domain);
        self
    }

    /// Sets the relation range.
    #[must_use]
    pub fn range(mut self, range: TypeId) -> Self {
        self.relation_meta.get_or_insert_with(RelationMeta::default).range = Some(range);
        self
    }

    /// Adds an `rdf:type` asserted by the shape.
    #[must_use]
    pub fn extra_type(mut self, iri: Iri) -> Self {
        self.extra_types.push(iri);
        self
    }
}

/// Declaration of one field.
#[derive(Debug, Clone)]
pub struct FieldDecl(Field);

impl FieldDecl {
    fn base(name: &'static str, value_type: ValueType, min: u32, max: Option<u32>) -> Self {
        Self(Field {
            name,
            value_type,
            min,
            max,
            qualified: true,
            templatize: true,
            optional: false,
            relation: RelationBinding::Infer,
            binding: FieldBinding::Parameterized,
            exact_values: None,
            label: None,
            comment: None,
            declared_by: TypeId(u32::MAX),
        })
    }

    /// At least one value.
    #[must_use]
    pub fn required(name: &'static str, value_type: ValueType) -> Self {
        Self::base(name, value_type, 1, None)
    }

    /// May stay unset.
    #[must_use]
    pub fn optional(name: &'static str, value_type: ValueType) -> Self {
        let mut decl = Self::base(name, value_type, 0, None);
        decl.0.optional = true;
        decl
    }

    /// Exactly one value.
    #[must_use]
    pub fn exclusive(name: &'static str, value_type: ValueType) -> Self {
        Self::base(name, value_type, 1, Some(1))
    }

    /// Binds an explicit relation instead of inferring one.
    #[must_use]
    pub fn relation(mut self, relation: TypeId) -> Self {
        self.0.relation = RelationBinding::Explicit(relation);
        self
    }

    /// No graph relation; the field is skipped when serializing.
    #[must_use]
    pub fn no_relation(mut self) -> Self {
        self.0.relation = RelationBinding::Suppressed;
        self
    }

    /// Sets the minimum cardinality.
    #[must_use]
    pub fn min(mut self, min: u32) -> Self {
        self.0.min = min;
        self
    }

    /// Sets the maximum cardinality.
    #[must_use]
    pub fn max(mut self, max: u32) -> Self {
        self.0.max = Some(max);
        self
    }

    /// Sets the qualified flag.
    #[must_use]
    pub fn qualified(mut self, on: bool) -> Self {
        self.0.qualified = on;
        self
    }

    /// Sets the templatize flag.
    #[must_use]
    pub fn templatize(mut self, on: bool) -> Self {
        self.0.templatize = on;
        self
    }

    /// Restricts the field to exactly these identities (possibly none).
    #[must_use]
    pub fn exact_values(mut self, values: Vec<TypeId>) -> Self {
        self.0.exact_values = Some(values);
        self
    }

    /// Sets the label.
    #[must_use]
    pub fn label(mut self, label: &'static str) -> Self {
        self.0.label = Some(label);
        self
    }

    /// Sets the comment.
    #[must_use]
    pub fn comment(mut self, comment: &'static str) -> Self {
        self.0.comment = Some(comment);
        self
    }
}

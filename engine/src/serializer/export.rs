//! Template export surface.
//!
//! Given root types, discovers their closure and produces one record per
//! type, grouped into relations, entities and values. Records serialize with
//! serde to the layout template libraries consume:
//!
//! ```yaml
//! Box:
//!   body: |
//!     @prefix P: <urn:___param___#> .
//!     ...
//!   dependencies:
//!   - template: Length
//!     args:
//!       name: width
//!   optional: label
//! ```

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::closure::closure;
use crate::error::{DefinitionError, Result};
use crate::model::TypeId;
use crate::registry::Registry;
use crate::serializer::template::{template, Template};
use crate::serializer::turtle::to_turtle;

/// One dependency as exported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencyRecord {
    /// Name of the template that fills the parameter.
    pub template: String,
    /// Argument mapping.
    pub args: BTreeMap<String, String>,
}

/// The optional-parameters marker: a scalar for one, a list otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum OptionalFields {
    /// Exactly one optional parameter.
    One(String),
    /// Several optional parameters.
    Many(Vec<String>),
}

/// One exported template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TemplateRecord {
    /// Turtle body.
    pub body: String,
    /// Dependencies; omitted when empty.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<DependencyRecord>,
    /// Optional parameters; omitted when none.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub optional: Option<OptionalFields>,
}

impl TemplateRecord {
    /// Builds the record of a generated template.
    #[must_use]
    pub fn from_template(registry: &Registry, template: &Template) -> Self {
        let dependencies = template
            .dependencies
            .iter()
            .map(|d| DependencyRecord {
                template: registry.get(d.target).name.to_owned(),
                args: d.args.clone(),
            })
            .collect();
        let optional = match template.optional.as_slice() {
            [] => None,
            [one] => Some(OptionalFields::One((*one).to_owned())),
            many => Some(OptionalFields::Many(
                many.iter().map(|s| (*s).to_owned()).collect(),
            )),
        };
        Self {
            body: to_turtle(&template.body),
            dependencies,
            optional,
        }
    }
}

/// All records for a set of roots, keyed by template name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TemplateExport {
    /// Relation templates.
    pub relations: BTreeMap<String, TemplateRecord>,
    /// Entity templates that are not values.
    pub entities: BTreeMap<String, TemplateRecord>,
    /// Value templates.
    pub values: BTreeMap<String, TemplateRecord>,
}

impl TemplateExport {
    /// Total number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.relations.len() + self.entities.len() + self.values.len()
    }

    /// Whether no record was produced.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A record by name, from any category.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&TemplateRecord> {
        self.relations
            .get(name)
            .or_else(|| self.entities.get(name))
            .or_else(|| self.values.get(name))
    }

    /// The whole export as one YAML document.
    ///
    /// # Errors
    ///
    /// Returns an error if YAML serialization fails.
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }

    /// The whole export as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// One YAML document per category: `relations.yml`, `entities.yml`,
    /// `values.yml`.
    ///
    /// # Errors
    ///
    /// Returns an error if YAML serialization fails.
    pub fn to_yaml_files(&self) -> Result<Vec<(&'static str, String)>, serde_yaml::Error> {
        Ok(vec![
            ("relations.yml", serde_yaml::to_string(&self.relations)?),
            ("entities.yml", serde_yaml::to_string(&self.entities)?),
            ("values.yml", serde_yaml::to_string(&self.values)?),
        ])
    }
}

/// Exports templates for the closure of `roots`.
///
/// Types without templates of their own (named identities such as units)
/// are skipped. Records and dependencies are keyed by bare type name, so
/// two exported types sharing a name in different namespaces are rejected.
///
/// # Errors
///
/// Returns a definition or divergence error from closure or template
/// generation, and [`DefinitionError::InvalidDeclaration`] for a name
/// collision.
pub fn export_templates(registry: &Registry, roots: &[TypeId]) -> Result<TemplateExport> {
    let found = closure(registry, roots)?;
    let mut export = TemplateExport::default();
    let mut owners: HashMap<&str, TypeId> = HashMap::new();
    for &t in found.relations.iter().chain(&found.entities) {
        let ty = registry.get(t);
        if !ty.templatize {
            continue;
        }
        if let Some(&owner) = owners.get(ty.name) {
            return Err(DefinitionError::InvalidDeclaration {
                type_name: ty.qualified_name(),
                reason: format!(
                    "template name {} is already exported for {}",
                    ty.name,
                    registry.display(owner)
                ),
            }
            .into());
        }
        owners.insert(ty.name, t);
        let record = TemplateRecord::from_template(registry, &template(registry, t)?);
        let bucket = if registry.is_relation(t) {
            &mut export.relations
        } else if registry.is_value(t) {
            &mut export.values
        } else {
            &mut export.entities
        };
        bucket.insert(ty.name.to_owned(), record);
    }
    tracing::debug!(records = export.len(), "exported templates");
    Ok(export)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Namespace, Primitive, ValueType};
    use crate::registry::{FieldDecl, TypeDecl};

    const EX: Namespace = Namespace::new("ex", "urn:ex#");

    fn registry() -> (Registry, TypeId) {
        let mut b = Registry::builder();
        let m = b.markers();
        let has_dimension = b
            .declare(TypeDecl::new("hasDimension", EX).extends(m.predicate))
            .expect("rel");
        let has_label = b
            .declare(TypeDecl::new("label", EX).extends(m.predicate))
            .expect("rel");
        let unit = b
            .declare(TypeDecl::new("Unit", EX).extends(m.named_node))
            .expect("unit");
        let length = b
            .declare(
                TypeDecl::new("Length", EX)
                    .extends(m.value)
                    .field(FieldDecl::optional("unit", ValueType::Type(unit)).relation(has_label)),
            )
            .expect("length");
        let boxed = b
            .declare(
                TypeDecl::new("Box", EX)
                    .extends(m.node)
                    .allows(has_dimension, length)
                    .allows(has_label, Primitive::String)
                    .field(FieldDecl::required("width", ValueType::Type(length)))
                    .field(FieldDecl::optional(
                        "label",
                        ValueType::Primitive(Primitive::String),
                    ))
                    .field(FieldDecl::optional(
                        "comment",
                        ValueType::Primitive(Primitive::String),
                    )),
            )
            .expect("box");
        (b.build(), boxed)
    }

    #[test]
    fn categories_split_relations_entities_values() {
        let (registry, boxed) = registry();
        let export = export_templates(&registry, &[boxed]).expect("export");
        assert!(export.relations.contains_key("hasDimension"));
        assert!(export.entities.contains_key("Box"));
        assert!(export.values.contains_key("Length"));
        assert!(export.get("Unit").is_none());
    }

    #[test]
    fn optional_marker_is_scalar_or_list() {
        let (registry, boxed) = registry();
        let export = export_templates(&registry, &[boxed]).expect("export");
        assert_eq!(
            export.get("Box").and_then(|r| r.optional.clone()),
            Some(OptionalFields::Many(vec!["label".into(), "comment".into()]))
        );
        assert_eq!(
            export.get("Length").and_then(|r| r.optional.clone()),
            Some(OptionalFields::One("unit".into()))
        );

        let yaml = export.to_yaml().expect("yaml");
        assert!(yaml.contains("optional: unit"));
        assert!(yaml.contains("template: Length"));
        let json: serde_json::Value =
            serde_json::from_str(&export.to_json().expect("json")).expect("parse");
        assert_eq!(json["entities"]["Box"]["dependencies"][0]["args"]["name"], "width");
    }

    #[test]
    fn yaml_files_per_category() {
        let (registry, boxed) = registry();
        let export = export_templates(&registry, &[boxed]).expect("export");
        let files = export.to_yaml_files().expect("yaml");
        let names: Vec<_> = files.iter().map(|(n, _)| *n).collect();
        assert_eq!(names, ["relations.yml", "entities.yml", "values.yml"]);
        assert!(files[1].1.contains("Box:"));
    }

    #[test]
    fn same_name_in_two_namespaces_is_rejected() {
        const OTHER: Namespace = Namespace::new("other", "urn:other#");
        let mut b = Registry::builder();
        let m = b.markers();
        let has_dimension = b
            .declare(TypeDecl::new("hasDimension", EX).extends(m.predicate))
            .expect("rel");
        let ours = b
            .declare(TypeDecl::new("Length", EX).extends(m.value))
            .expect("length");
        let theirs = b
            .declare(TypeDecl::new("Length", OTHER).extends(m.value))
            .expect("other length");
        let boxed = b
            .declare(
                TypeDecl::new("Box", EX)
                    .extends(m.node)
                    .allows(has_dimension, m.value)
                    .field(FieldDecl::required("width", ValueType::Type(ours)))
                    .field(FieldDecl::required("depth", ValueType::Type(theirs))),
            )
            .expect("box");
        let registry = b.build();

        let err = export_templates(&registry, &[boxed]).unwrap_err();
        assert!(matches!(
            err,
            crate::Error::Definition(DefinitionError::InvalidDeclaration { ref reason, .. })
                if reason.contains("Length")
        ));
        assert!(export_templates(&registry, &[ours]).is_ok());
    }
}

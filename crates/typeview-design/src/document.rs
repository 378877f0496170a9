//! Conversion between design documents and type graphs.
//!
//! Loading resolves the string type references of a [`DesignDocument`] into
//! arena ids. Exporting walks the other way and writes named references by
//! user type name or media type identifier, which stay unique even when a
//! projection produces several views of the same media type.

use std::collections::{HashMap, HashSet};
use std::io::{Read, Write};

use indexmap::IndexMap;
use tracing::{debug, instrument, warn};
use typeview_schemas::{
    AttributeDoc, DesignDocument, LinkDoc, MediaTypeDoc, ProjectionDocument,
    TypeDoc, ValidationDoc, ViewFieldDoc,
};

use crate::collect::{declaration_order, direct_references};
use crate::error::{DesignError, DesignErrorKind};
use crate::model::{
    Attribute, DataType, Design, LinkDefinition, MediaType, MediaTypeId,
    NamedTypeId, Object, Primitive, TypeGraph, UserTypeId, Validation,
    ViewDefinition, ViewField,
};
use crate::project::Projection;

/// Reads a JSON design document and builds its type graph.
///
/// # Errors
///
/// Returns [`DesignError`] if reading fails ([`DesignError::is_io`]), the
/// input is not a design document ([`DesignError::is_deserialization`]) or
/// the document is inconsistent (see [`Design::from_document`]).
pub fn load_design(mut input: impl Read) -> Result<Design, DesignError> {
    let mut json = String::new();
    input.read_to_string(&mut json)?;
    let doc: DesignDocument = serde_json::from_str(&json)
        .map_err(|e| DesignError::new(DesignErrorKind::Deserialization(e)))?;
    Design::from_document(&doc)
}

/// Writes `value` as pretty JSON followed by a newline.
///
/// # Errors
///
/// Returns [`DesignError`] if serialization or writing fails.
pub fn write_json<T: serde::Serialize>(
    mut output: impl Write,
    value: &T,
) -> Result<(), DesignError> {
    serde_json::to_writer_pretty(&mut output, value)
        .map_err(|e| DesignError::new(DesignErrorKind::Serialization(e)))?;
    writeln!(output)?;
    Ok(())
}

impl Design {
    /// Builds a type graph from a design document.
    ///
    /// # Errors
    ///
    /// Returns [`DesignError`] if a type reference cannot be resolved
    /// ([`DesignError::is_unknown_type`]), a user type name clashes with a
    /// primitive, another user type or a media type name
    /// ([`DesignError::is_duplicate_type`]), or a collection's element is
    /// not a media type ([`DesignError::is_invalid_collection`]).
    #[instrument(skip_all, fields(types = doc.len()))]
    pub fn from_document(doc: &DesignDocument) -> Result<Self, DesignError> {
        let mut design = Design::new();
        let mut resolver = Resolver::default();

        for (id, mt) in &doc.media_types {
            let media_id = design.declare_media_type(id, &mt.type_name);
            resolver.identifiers.insert(id.clone(), media_id);
            resolver
                .media_names
                .entry(mt.type_name.clone())
                .and_modify(|slot| *slot = None)
                .or_insert(Some(media_id));
        }
        for name in doc.user_types.keys() {
            if Primitive::from_name(name).is_some()
                || resolver.media_names.contains_key(name)
            {
                return Err(DesignError::new(DesignErrorKind::DuplicateType {
                    name: name.clone(),
                }));
            }
            let user_id = design.declare_user_type(name);
            resolver.user_names.insert(name.clone(), user_id);
        }

        for (name, att) in &doc.user_types {
            let attribute =
                resolver.attribute(att, &format!("user type {name}"))?;
            design.define_user_type(resolver.user_names[name], attribute);
        }
        for (identifier, mt) in &doc.media_types {
            let media_id = resolver.identifiers[identifier];
            let media_type = resolver.media_type(identifier, mt)?;
            *design.media_type_mut(media_id) = media_type;
        }

        debug!(
            user_types = design.user_type_count(),
            media_types = design.media_type_count(),
            "loaded design"
        );
        Ok(design)
    }

    /// Exports every type of the design.
    pub fn to_document(&self) -> DesignDocument {
        let ids = self
            .user_types()
            .map(|(id, _)| NamedTypeId::User(id))
            .chain(self.media_types().map(|(id, _)| NamedTypeId::Media(id)));
        export_types(self, ids)
    }
}

/// Exports the given named types of `graph`.
///
/// References to types not in `ids` are still written by name; the
/// resulting document only loads if it is closed under references.
pub fn export_types<G>(
    graph: &G,
    ids: impl IntoIterator<Item = NamedTypeId>,
) -> DesignDocument
where
    G: TypeGraph + ?Sized,
{
    let mut doc = DesignDocument::default();
    for id in ids {
        match id {
            NamedTypeId::User(id) => {
                let ut = graph.user_type(id);
                doc.user_types
                    .insert(ut.name.clone(), attribute_doc(graph, &ut.attribute));
            }
            NamedTypeId::Media(id) => {
                let mt = graph.media_type(id);
                doc.media_types
                    .insert(mt.identifier.clone(), media_type_doc(graph, mt));
            }
        }
    }
    doc
}

/// Exports a projection and every named type reachable from it, in
/// declaration order.
pub fn export_projection<G>(projection: &Projection<'_, G>) -> ProjectionDocument
where
    G: TypeGraph + ?Sized,
{
    let mut roots = Object::new();
    roots.insert(
        "root".to_owned(),
        Attribute::new(DataType::Media(projection.root_id())),
    );
    if let Some(links) = projection.links_id() {
        roots.insert("links".to_owned(), Attribute::new(DataType::User(links)));
    }
    let types = export_keys(projection, &roots);
    let ordered = declaration_order(projection, &types);

    ProjectionDocument {
        media_type: projection.root().identifier.clone(),
        links: projection.links_type().map(|ut| ut.name.clone()),
        types: export_types(projection, ordered.into_iter().flatten()),
    }
}

/// Every named type reachable from `roots`, keyed by the name an export
/// declares it under.
///
/// Unlike [`collect_user_types`](crate::collect_user_types) this keeps
/// media types apart by id, so several views of one media type all make it
/// into the export.
fn export_keys<G>(graph: &G, roots: &Object) -> HashMap<String, NamedTypeId>
where
    G: TypeGraph + ?Sized,
{
    let mut pending = Vec::new();
    for att in roots.values() {
        direct_references(att, &mut pending);
    }
    let mut seen = HashSet::new();
    while let Some(id) = pending.pop() {
        if seen.insert(id) {
            direct_references(&graph.named_type(id).attribute, &mut pending);
        }
    }
    seen.into_iter()
        .map(|id| {
            let key = match id {
                NamedTypeId::User(u) => graph.user_type(u).name.clone(),
                NamedTypeId::Media(m) => graph.media_type(m).identifier.clone(),
            };
            (key, id)
        })
        .collect()
}

/// Name lookups used while loading a document.
#[derive(Default)]
struct Resolver {
    user_names: HashMap<String, UserTypeId>,
    /// `None` marks a type name shared by several media types; those must
    /// be referenced by identifier.
    media_names: HashMap<String, Option<MediaTypeId>>,
    identifiers: HashMap<String, MediaTypeId>,
}

impl Resolver {
    fn named(&self, name: &str, context: &str) -> Result<DataType, DesignError> {
        if let Some(p) = Primitive::from_name(name) {
            return Ok(DataType::Primitive(p));
        }
        if let Some(&id) = self.user_names.get(name) {
            return Ok(DataType::User(id));
        }
        if let Some(&Some(id)) = self.media_names.get(name) {
            return Ok(DataType::Media(id));
        }
        if let Some(&id) = self.identifiers.get(name) {
            return Ok(DataType::Media(id));
        }
        Err(DesignError::new(DesignErrorKind::UnknownType {
            name: name.to_owned(),
            context: context.to_owned(),
        }))
    }

    fn attribute(
        &self,
        doc: &AttributeDoc,
        context: &str,
    ) -> Result<Attribute, DesignError> {
        let mut validation = validation(&doc.validation);
        let data_type = match &doc.type_ref {
            TypeDoc::Named(name) => self.named(name, context)?,
            TypeDoc::Array { array_of } => DataType::Array(Box::new(
                self.attribute(array_of, &format!("{context} (element)"))?,
            )),
            TypeDoc::Object {
                attributes,
                required,
            } => {
                validation.required.extend(required.iter().cloned());
                DataType::Object(self.object(attributes, context)?)
            }
        };
        Ok(Attribute {
            data_type,
            description: doc.description.clone(),
            validation,
            default: doc.default.clone(),
            metadata: doc.metadata.clone(),
            view: doc.view.clone(),
        })
    }

    fn object(
        &self,
        attributes: &IndexMap<String, AttributeDoc>,
        context: &str,
    ) -> Result<Object, DesignError> {
        attributes
            .iter()
            .map(|(name, att)| {
                let context = format!("attribute {name:?} of {context}");
                Ok((name.clone(), self.attribute(att, &context)?))
            })
            .collect()
    }

    fn media_type(
        &self,
        identifier: &str,
        doc: &MediaTypeDoc,
    ) -> Result<MediaType, DesignError> {
        let context = format!("media type {}", doc.type_name);

        let mut attribute = match &doc.collection_of {
            Some(element) => {
                let Ok(DataType::Media(elem)) = self.named(element, &context)
                else {
                    return Err(DesignError::new(
                        DesignErrorKind::InvalidCollection {
                            type_name: doc.type_name.clone(),
                            element: element.clone(),
                        },
                    ));
                };
                if !doc.attributes.is_empty() {
                    warn!(
                        media_type = %doc.type_name,
                        "collection declares attributes, ignoring them"
                    );
                }
                Attribute::new(DataType::Array(Box::new(Attribute::new(
                    DataType::Media(elem),
                ))))
            }
            None => Attribute::new(DataType::Object(
                self.object(&doc.attributes, &context)?,
            )),
        };
        attribute.description.clone_from(&doc.description);
        attribute.validation.required.clone_from(&doc.required);

        let mut media_type =
            MediaType::new(identifier, &doc.type_name, attribute);

        for (view_name, selected) in &doc.views {
            let mut fields = IndexMap::new();
            for (field, field_doc) in selected {
                let context = format!(
                    "field {field:?} of view {view_name:?} of {}",
                    doc.type_name
                );
                let declared = doc.attributes.get(field);
                fields.insert(
                    field.clone(),
                    self.view_field(field_doc, declared, &context)?,
                );
            }
            media_type.add_view(ViewDefinition {
                name: view_name.clone(),
                fields,
            });
        }

        for (name, link) in &doc.links {
            media_type.add_link(LinkDefinition {
                name: name.clone(),
                view: link.view.clone(),
                description: link.description.clone(),
            });
        }

        Ok(media_type)
    }

    fn view_field(
        &self,
        doc: &ViewFieldDoc,
        declared: Option<&AttributeDoc>,
        context: &str,
    ) -> Result<ViewField, DesignError> {
        let override_attribute = match (&doc.type_ref, declared) {
            (Some(type_ref), _) => {
                let mut att = self
                    .attribute(&AttributeDoc::new(type_ref.clone()), context)?;
                att.description.clone_from(&doc.description);
                Some(att)
            }
            // A description-only override keeps the declared type.
            (None, Some(declared)) if doc.description.is_some() => {
                let mut att = self.attribute(declared, context)?;
                att.description.clone_from(&doc.description);
                Some(att)
            }
            (None, _) => None,
        };
        Ok(ViewField {
            override_attribute,
            view: doc.view.clone(),
        })
    }
}

fn validation(doc: &ValidationDoc) -> Validation {
    Validation {
        required: doc.required.clone(),
        values: doc.values.clone(),
        format: doc.format.clone(),
        pattern: doc.pattern.clone(),
        minimum: doc.minimum,
        maximum: doc.maximum,
        min_length: doc.min_length,
        max_length: doc.max_length,
    }
}

fn validation_doc(v: &Validation) -> ValidationDoc {
    ValidationDoc {
        required: v.required.clone(),
        values: v.values.clone(),
        format: v.format.clone(),
        pattern: v.pattern.clone(),
        minimum: v.minimum,
        maximum: v.maximum,
        min_length: v.min_length,
        max_length: v.max_length,
    }
}

/// Writes a type reference. Object types carry their required list inline.
fn type_doc<G: TypeGraph + ?Sized>(
    graph: &G,
    att: &Attribute,
) -> (TypeDoc, ValidationDoc) {
    let mut validation = validation_doc(&att.validation);
    let type_ref = match &att.data_type {
        DataType::Primitive(p) => TypeDoc::Named(p.name().to_owned()),
        DataType::Array(elem) => TypeDoc::Array {
            array_of: Box::new(attribute_doc(graph, elem)),
        },
        DataType::Object(fields) => TypeDoc::Object {
            attributes: fields
                .iter()
                .map(|(name, field)| (name.clone(), attribute_doc(graph, field)))
                .collect(),
            required: std::mem::take(&mut validation.required),
        },
        DataType::User(id) => TypeDoc::Named(graph.user_type(*id).name.clone()),
        DataType::Media(id) => {
            TypeDoc::Named(graph.media_type(*id).identifier.clone())
        }
    };
    (type_ref, validation)
}

fn attribute_doc<G: TypeGraph + ?Sized>(
    graph: &G,
    att: &Attribute,
) -> AttributeDoc {
    let (type_ref, validation) = type_doc(graph, att);
    AttributeDoc {
        type_ref,
        description: att.description.clone(),
        default: att.default.clone(),
        view: att.view.clone(),
        validation,
        metadata: att.metadata.clone(),
    }
}

fn media_type_doc<G: TypeGraph + ?Sized>(
    graph: &G,
    mt: &MediaType,
) -> MediaTypeDoc {
    let attribute = mt.attribute();
    let attributes = attribute
        .data_type
        .as_object()
        .map(|fields| {
            fields
                .iter()
                .map(|(name, att)| (name.clone(), attribute_doc(graph, att)))
                .collect()
        })
        .unwrap_or_default();
    let collection_of = mt
        .collection_element()
        .map(|elem| graph.media_type(elem).identifier.clone());

    let mut views: Vec<_> = mt.views.values().collect();
    views.sort_by(|a, b| a.name.cmp(&b.name));
    let views = views
        .into_iter()
        .map(|view| {
            let fields = view
                .fields
                .iter()
                .map(|(name, field)| (name.clone(), view_field_doc(graph, field)))
                .collect();
            (view.name.clone(), fields)
        })
        .collect();

    MediaTypeDoc {
        type_name: mt.name().to_owned(),
        description: attribute.description.clone(),
        attributes,
        required: attribute.validation.required.clone(),
        views,
        links: mt
            .links
            .values()
            .map(|link| {
                (
                    link.name.clone(),
                    LinkDoc {
                        view: link.view.clone(),
                        description: link.description.clone(),
                    },
                )
            })
            .collect(),
        collection_of,
    }
}

fn view_field_doc<G: TypeGraph + ?Sized>(
    graph: &G,
    field: &ViewField,
) -> ViewFieldDoc {
    let (type_ref, description) = match &field.override_attribute {
        Some(att) => (Some(type_doc(graph, att).0), att.description.clone()),
        None => (None, None),
    };
    ViewFieldDoc {
        type_ref,
        description,
        view: field.view.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Kind;
    use crate::project::project;

    const CYCLIC: &str = r#"{
        "media_types": {
            "vnd.application/MT1": {
                "type_name": "Mt1",
                "attributes": { "att": { "type": "vnd.application/MT2" } },
                "links": { "att": { "view": "default" } },
                "views": { "default": { "att": {}, "links": {} } }
            },
            "vnd.application/MT2": {
                "type_name": "Mt2",
                "attributes": { "att2": { "type": "Mt1" } },
                "links": { "att2": { "view": "default" } },
                "views": { "default": { "att2": {}, "links": {} } }
            }
        }
    }"#;

    /// Mutually referencing media types resolve to each other's ids.
    #[test]
    fn test_load_resolves_cycles() {
        let design = load_design(CYCLIC.as_bytes()).unwrap();
        let mt1 = design.media_type_with_identifier("Mt1").unwrap();
        let mt2 = design
            .media_type_with_identifier("vnd.application/MT2")
            .unwrap();

        let fields = design.media_type(mt1).attribute().data_type.as_object();
        assert_eq!(fields.unwrap()["att"].data_type, DataType::Media(mt2));
        let fields = design.media_type(mt2).attribute().data_type.as_object();
        assert_eq!(fields.unwrap()["att2"].data_type, DataType::Media(mt1));
        assert_eq!(design.media_type(mt1).links.len(), 1);
    }

    /// Input that is not JSON is a deserialization error.
    #[test]
    fn test_load_rejects_invalid_json() {
        let err = load_design("not valid json".as_bytes()).unwrap_err();
        assert!(err.is_deserialization());
    }

    /// A reference to an undeclared type names the missing type.
    #[test]
    fn test_load_rejects_unknown_type() {
        let json = r#"{
            "user_types": { "Foo": { "type": "Bar" } }
        }"#;
        let err = load_design(json.as_bytes()).unwrap_err();
        assert!(err.is_unknown_type());
        assert!(err.to_string().contains("\"Bar\""));
    }

    /// User type names may not shadow media type names or primitives.
    #[test]
    fn test_load_rejects_duplicate_names() {
        let json = r#"{
            "user_types": { "Mt1": { "type": "string" } },
            "media_types": {
                "vnd.application/MT1": { "type_name": "Mt1" }
            }
        }"#;
        let err = load_design(json.as_bytes()).unwrap_err();
        assert!(err.is_duplicate_type());

        let json = r#"{ "user_types": { "string": { "type": "integer" } } }"#;
        let err = load_design(json.as_bytes()).unwrap_err();
        assert!(err.is_duplicate_type());
    }

    /// Collections must hold media types.
    #[test]
    fn test_load_rejects_invalid_collection() {
        let json = r#"{
            "user_types": { "Tag": { "type": "string" } },
            "media_types": {
                "vnd.application/tags": {
                    "type_name": "Tags",
                    "collection_of": "Tag"
                }
            }
        }"#;
        let err = load_design(json.as_bytes()).unwrap_err();
        assert!(err.is_invalid_collection());
    }

    /// View fields carry type and description overrides.
    #[test]
    fn test_view_overrides_are_loaded() {
        let json = r#"{
            "media_types": {
                "vnd.application/foo": {
                    "type_name": "Foo",
                    "attributes": {
                        "att1": { "type": "integer", "description": "first" },
                        "att2": { "type": "string" }
                    },
                    "views": {
                        "default": {
                            "att1": { "type": "string" },
                            "att2": { "description": "second" }
                        },
                        "tiny": { "att2": {} }
                    }
                }
            }
        }"#;
        let design = load_design(json.as_bytes()).unwrap();
        let foo = design.media_type_with_identifier("Foo").unwrap();
        let default = &design.media_type(foo).views["default"];

        let att1 = default.fields["att1"].override_attribute.as_ref().unwrap();
        assert_eq!(att1.data_type.kind(), Kind::Primitive(Primitive::String));
        let att2 = default.fields["att2"].override_attribute.as_ref().unwrap();
        assert_eq!(att2.data_type.kind(), Kind::Primitive(Primitive::String));
        assert_eq!(att2.description.as_deref(), Some("second"));
        assert!(design.media_type(foo).views["tiny"].fields["att2"]
            .override_attribute
            .is_none());
    }

    /// A type name shared by two media types does not resolve.
    #[test]
    fn test_ambiguous_media_name_needs_identifier() {
        let json = r#"{
            "user_types": { "Holder": { "type": "Bottle" } },
            "media_types": {
                "vnd.application/bottle": { "type_name": "Bottle" },
                "vnd.application/bottle; view=tiny": { "type_name": "Bottle" }
            }
        }"#;
        let err = load_design(json.as_bytes()).unwrap_err();
        assert!(err.is_unknown_type());
    }

    /// Exporting and reloading a design yields the same graph.
    #[test]
    fn test_design_roundtrip() {
        let design = load_design(CYCLIC.as_bytes()).unwrap();
        let doc = design.to_document();
        let reloaded = Design::from_document(&doc).unwrap();
        assert_eq!(reloaded, design);
    }

    /// A projection exports as a closed, loadable design.
    #[test]
    fn test_export_projection() {
        let design = load_design(CYCLIC.as_bytes()).unwrap();
        let mt1 = design.media_type_with_identifier("Mt1").unwrap();
        let projection = project(&design, mt1, "default").unwrap();

        let doc = export_projection(&projection);
        assert_eq!(doc.media_type, "vnd.application/MT1");
        assert_eq!(doc.links.as_deref(), Some("Mt1Links"));
        assert!(doc.types.user_types.contains_key("Mt1Links"));
        assert!(doc.types.user_types.contains_key("Mt2Links"));
        assert!(doc.types.media_types.contains_key("vnd.application/MT1"));
        assert!(doc.types.media_types.contains_key("vnd.application/MT2"));

        // The exported projection is a closed design of its own.
        let reloaded = Design::from_document(&doc.types).unwrap();
        assert_eq!(reloaded.media_type_count(), 2);
        assert_eq!(reloaded.user_type_count(), 2);
    }

    /// JSON output ends with a newline.
    #[test]
    fn test_write_json_appends_newline() {
        let mut out = Vec::new();
        write_json(&mut out, &DesignDocument::default()).unwrap();
        assert_eq!(out, b"{}\n");
    }
}

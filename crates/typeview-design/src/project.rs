//! View projection of media types.
//!
//! Projecting a media type through a view builds a new media type holding
//! only the attributes the view selects. Attributes whose type is itself a
//! media type are projected recursively through their own view, and the
//! `links` pseudo-field becomes a separate links user type.
//!
//! ## Cycles
//!
//! Media types may refer to each other (`Mt1.att: Mt2`, `Mt2.att2: Mt1`).
//! Every projection started during one top-level call is memoized by
//! `(media type id, view)` before its fields are computed. A repeated key
//! returns the node already allocated for it, even while that node is still
//! being filled in, so the projected graph keeps the cycle instead of
//! unrolling it.
//!
//! ## Output
//!
//! New nodes are appended to a [`Projection`], an overlay that borrows the
//! source graph and implements [`TypeGraph`] over both. The source graph is
//! never modified.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use tracing::{debug_span, trace, warn};

use crate::error::ProjectError;
use crate::model::{
    Attribute, DEFAULT_VIEW, DataType, Design, LINK_VIEW, LINKS_FIELD,
    MediaType, MediaTypeId, Object, TypeGraph, UserType, UserTypeId,
    ViewDefinition, ViewField,
};

/// What to do when a view selects a field its media type does not declare.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MissingFields {
    /// Fail with [`ProjectError::is_unknown_attribute`].
    #[default]
    Error,
    /// Drop the field and log a warning.
    Skip,
}

/// Options controlling [`project_with`].
#[derive(Debug, Clone, Default)]
pub struct ProjectOptions {
    pub missing_fields: MissingFields,
}

/// Result of projecting a media type through a view.
///
/// Holds the newly allocated nodes on top of the borrowed source graph. Ids
/// below the source graph's counts refer to source nodes; the rest refer to
/// nodes owned by the projection.
#[derive(Debug)]
pub struct Projection<'g, G: ?Sized = Design> {
    graph: &'g G,
    user_types: Vec<UserType>,
    media_types: Vec<MediaType>,
    root: MediaTypeId,
    links: Option<UserTypeId>,
}

impl<'g, G: TypeGraph + ?Sized> Projection<'g, G> {
    /// Id of the projected media type.
    pub fn root_id(&self) -> MediaTypeId {
        self.root
    }

    /// Id of the links user type, if the view selected links.
    pub fn links_id(&self) -> Option<UserTypeId> {
        self.links
    }

    /// The projected media type.
    pub fn root(&self) -> &MediaType {
        self.media_type(self.root)
    }

    /// The links user type, if the view selected links.
    pub fn links_type(&self) -> Option<&UserType> {
        self.links.map(|id| self.user_type(id))
    }

    /// Fields of the projected media type. `None` for collections, which
    /// project to arrays.
    pub fn fields(&self) -> Option<&Object> {
        self.root().attribute().data_type.as_object()
    }

    /// The source graph the projection was computed from.
    pub fn source(&self) -> &'g G {
        self.graph
    }

    /// Returns `true` if `id` refers to a node created by this projection.
    pub fn is_projected(&self, id: MediaTypeId) -> bool {
        id.0 >= self.graph.media_type_count()
    }

    /// Iterates over the media types created by this projection.
    pub fn projected_media_types(
        &self,
    ) -> impl Iterator<Item = (MediaTypeId, &MediaType)> {
        let base = self.graph.media_type_count();
        self.media_types
            .iter()
            .enumerate()
            .map(move |(i, mt)| (MediaTypeId(base + i), mt))
    }
}

impl<G: TypeGraph + ?Sized> TypeGraph for Projection<'_, G> {
    fn user_type(&self, id: UserTypeId) -> &UserType {
        let base = self.graph.user_type_count();
        if id.0 < base {
            self.graph.user_type(id)
        } else {
            &self.user_types[id.0 - base]
        }
    }

    fn media_type(&self, id: MediaTypeId) -> &MediaType {
        let base = self.graph.media_type_count();
        if id.0 < base {
            self.graph.media_type(id)
        } else {
            &self.media_types[id.0 - base]
        }
    }

    fn user_type_count(&self) -> usize {
        self.graph.user_type_count() + self.user_types.len()
    }

    fn media_type_count(&self) -> usize {
        self.graph.media_type_count() + self.media_types.len()
    }
}

/// Projects the media type `id` through `view` with default options.
///
/// # Errors
///
/// See [`project_with`].
pub fn project<'g, G>(
    graph: &'g G,
    id: MediaTypeId,
    view: &str,
) -> Result<Projection<'g, G>, ProjectError>
where
    G: TypeGraph + ?Sized,
{
    project_with(graph, id, view, &ProjectOptions::default())
}

/// Projects the media type `id` through `view`.
///
/// Returns the projected media type together with its links type. The
/// projected media type keeps the source type name; its identifier gains a
/// `view` parameter for views other than `default`.
///
/// # Errors
///
/// Returns [`ProjectError`] if:
/// - `view` is empty or not defined by the media type, or a nested media
///   type lacks the view its field asks for
///   ([`ProjectError::is_view_not_found`])
/// - a view selects an undeclared attribute and `options` asks for an error
///   ([`ProjectError::is_unknown_attribute`])
/// - a link names an attribute that is missing or not a media type
///   ([`ProjectError::is_invalid_link`])
pub fn project_with<'g, G>(
    graph: &'g G,
    id: MediaTypeId,
    view: &str,
    options: &ProjectOptions,
) -> Result<Projection<'g, G>, ProjectError>
where
    G: TypeGraph + ?Sized,
{
    let _span = debug_span!(
        "project",
        media_type = graph.media_type(id).name(),
        view
    )
    .entered();

    let mut projector = Projector {
        graph,
        options,
        user_types: Vec::new(),
        media_types: Vec::new(),
        memo: HashMap::new(),
    };
    let projected = projector.project(id, view)?;

    Ok(Projection {
        graph,
        user_types: projector.user_types,
        media_types: projector.media_types,
        root: projected.media_type,
        links: projected.links,
    })
}

/// A finished or in-flight projection.
#[derive(Debug, Clone, Copy)]
struct Projected {
    media_type: MediaTypeId,
    /// Unset while the projection is in flight.
    links: Option<UserTypeId>,
}

/// Per-call projection state.
struct Projector<'g, 'o, G: ?Sized> {
    graph: &'g G,
    options: &'o ProjectOptions,
    user_types: Vec<UserType>,
    media_types: Vec<MediaType>,
    memo: HashMap<(MediaTypeId, String), Projected>,
}

impl<'g, G: TypeGraph + ?Sized> Projector<'g, '_, G> {
    fn project(
        &mut self,
        id: MediaTypeId,
        view: &str,
    ) -> Result<Projected, ProjectError> {
        if let Some(projected) = self.memo.get(&(id, view.to_owned())) {
            trace!(view, "reusing projection");
            return Ok(*projected);
        }
        match self.graph.media_type(id).collection_element() {
            Some(elem) => self.project_collection(id, elem, view),
            None => self.project_single(id, view),
        }
    }

    fn project_single(
        &mut self,
        id: MediaTypeId,
        view: &str,
    ) -> Result<Projected, ProjectError> {
        let graph = self.graph;
        let source = graph.media_type(id);
        let view_def = lookup_view(source, view)?;
        let source_fields = source.attribute().data_type.to_object(graph);

        let mut validation = source.attribute().validation.clone();
        validation.required.retain(|name| view_def.selects(name));
        let mut attribute = Attribute::new(DataType::Object(Object::new()))
            .with_description(view_description(source, view));
        attribute.validation = validation;

        let projected_id = self.alloc_media(MediaType {
            user_type: UserType::new(source.name(), attribute),
            identifier: projected_identifier(&source.identifier, view),
            views: default_view(view_def.fields.clone()),
            links: IndexMap::new(),
        });
        self.memo.insert(
            (id, view.to_owned()),
            Projected {
                media_type: projected_id,
                links: None,
            },
        );

        let has_links_attribute =
            source_fields.is_some_and(|f| f.contains_key(LINKS_FIELD));
        let mut fields = Object::new();
        let mut links = None;
        for (name, selected) in &view_def.fields {
            if name == LINKS_FIELD && !has_links_attribute {
                let links_id = self.links_type(source, view)?;
                links = Some(links_id);
                fields.insert(
                    name.clone(),
                    Attribute::new(DataType::User(links_id))
                        .with_description("Links to related resources"),
                );
                continue;
            }

            let Some(declared) = source_fields.and_then(|f| f.get(name)) else {
                match self.options.missing_fields {
                    MissingFields::Error => {
                        return Err(ProjectError::unknown_attribute(
                            source.name(),
                            view,
                            name,
                        ));
                    }
                    MissingFields::Skip => {
                        warn!(
                            media_type = source.name(),
                            view,
                            attribute = %name,
                            "view selects unknown attribute, skipping"
                        );
                        continue;
                    }
                }
            };

            let mut att = declared.clone();
            if let Some(replacement) = &selected.override_attribute {
                att.data_type = replacement.data_type.clone();
                if replacement.description.is_some() {
                    att.description.clone_from(&replacement.description);
                }
            }
            let nested_view = selected
                .view
                .as_deref()
                .or(att.view.as_deref())
                .unwrap_or(DEFAULT_VIEW)
                .to_owned();
            self.project_nested(&mut att.data_type, &nested_view)?;
            fields.insert(name.clone(), att);
        }

        self.local_media_mut(projected_id).user_type.attribute.data_type =
            DataType::Object(fields);
        let projected = Projected {
            media_type: projected_id,
            links,
        };
        self.memo.insert((id, view.to_owned()), projected);
        Ok(projected)
    }

    /// Replaces media types in `data_type` (directly or as array elements)
    /// with their projection through `view`.
    fn project_nested(
        &mut self,
        data_type: &mut DataType,
        view: &str,
    ) -> Result<(), ProjectError> {
        match data_type {
            DataType::Media(nested) => {
                *nested = self.project(*nested, view)?.media_type;
            }
            DataType::Array(elem) => {
                self.project_nested(&mut elem.data_type, view)?;
            }
            DataType::Primitive(_) | DataType::Object(_) | DataType::User(_) => {
            }
        }
        Ok(())
    }

    /// Builds the `<TypeName>Links` user type of `source`.
    fn links_type(
        &mut self,
        source: &'g MediaType,
        view: &str,
    ) -> Result<UserTypeId, ProjectError> {
        let graph = self.graph;
        let source_fields = source.attribute().data_type.to_object(graph);

        let mut link_fields = Object::new();
        for (name, link) in &source.links {
            let invalid =
                || ProjectError::invalid_link(source.name(), view, name);
            let target_att =
                source_fields.and_then(|f| f.get(name)).ok_or_else(invalid)?;
            let DataType::Media(target) = target_att.data_type else {
                return Err(invalid());
            };

            let link_view = match link.view.as_deref() {
                Some(v) => v,
                None if self.has_view(target, LINK_VIEW) => LINK_VIEW,
                None => DEFAULT_VIEW,
            };
            let projected = self.project(target, link_view)?;

            let mut att = Attribute::new(DataType::Media(projected.media_type));
            att.description.clone_from(&link.description);
            att.validation = graph.media_type(target).attribute().validation.clone();
            att.metadata = target_att.metadata.clone();
            link_fields.insert(name.clone(), att);
        }

        let type_name = format!("{}Links", source.name());
        let description = format!(
            "{type_name} contains links to related resources of {}.",
            source.name()
        );
        Ok(self.alloc_user(UserType::new(
            type_name,
            Attribute::new(DataType::Object(link_fields))
                .with_description(description),
        )))
    }

    /// Projects a collection by projecting its element through `view`.
    fn project_collection(
        &mut self,
        id: MediaTypeId,
        elem: MediaTypeId,
        view: &str,
    ) -> Result<Projected, ProjectError> {
        let graph = self.graph;
        let source = graph.media_type(id);
        if view.is_empty() {
            return Err(ProjectError::view_not_found(source.name(), view));
        }
        let elem_name = graph.media_type(elem).name();

        // Reserve the node first so cycles through the element find it.
        let mut attribute = source.attribute().clone();
        attribute.description = Some(format!(
            "{} is the media type for an array of {elem_name} ({view} view)",
            source.name()
        ));
        let projected_id = self.alloc_media(MediaType {
            user_type: UserType::new(source.name(), attribute),
            identifier: projected_identifier(&source.identifier, view),
            views: HashMap::new(),
            links: IndexMap::new(),
        });
        self.memo.insert(
            (id, view.to_owned()),
            Projected {
                media_type: projected_id,
                links: None,
            },
        );

        let element = self.project(elem, view)?;
        let element_views = self.media(element.media_type).views.clone();
        let links = element.links.map(|le| {
            let name = format!("{}Array", self.user(le).name);
            self.alloc_user(UserType::new(
                name,
                Attribute::new(DataType::Array(Box::new(Attribute::new(
                    DataType::User(le),
                )))),
            ))
        });

        let projected_mt = self.local_media_mut(projected_id);
        if let DataType::Array(elem_att) =
            &mut projected_mt.user_type.attribute.data_type
        {
            elem_att.data_type = DataType::Media(element.media_type);
        }
        projected_mt.views = element_views;

        let projected = Projected {
            media_type: projected_id,
            links,
        };
        self.memo.insert((id, view.to_owned()), projected);
        Ok(projected)
    }

    /// Returns `true` if the media type (or a collection's element) defines
    /// `view`.
    fn has_view(&self, id: MediaTypeId, view: &str) -> bool {
        let mut seen = HashSet::new();
        let mut current = id;
        while seen.insert(current) {
            let mt = self.graph.media_type(current);
            match mt.collection_element() {
                Some(elem) => current = elem,
                None => return mt.views.contains_key(view),
            }
        }
        false
    }

    fn alloc_media(&mut self, media_type: MediaType) -> MediaTypeId {
        let id = MediaTypeId(
            self.graph.media_type_count() + self.media_types.len(),
        );
        self.media_types.push(media_type);
        id
    }

    fn alloc_user(&mut self, user_type: UserType) -> UserTypeId {
        let id =
            UserTypeId(self.graph.user_type_count() + self.user_types.len());
        self.user_types.push(user_type);
        id
    }

    fn local_media_mut(&mut self, id: MediaTypeId) -> &mut MediaType {
        &mut self.media_types[id.0 - self.graph.media_type_count()]
    }

    fn media(&self, id: MediaTypeId) -> &MediaType {
        let base = self.graph.media_type_count();
        if id.0 < base {
            self.graph.media_type(id)
        } else {
            &self.media_types[id.0 - base]
        }
    }

    fn user(&self, id: UserTypeId) -> &UserType {
        let base = self.graph.user_type_count();
        if id.0 < base {
            self.graph.user_type(id)
        } else {
            &self.user_types[id.0 - base]
        }
    }
}

fn lookup_view<'a>(
    source: &'a MediaType,
    view: &str,
) -> Result<&'a ViewDefinition, ProjectError> {
    if view.is_empty() {
        return Err(ProjectError::view_not_found(source.name(), view));
    }
    source
        .views
        .get(view)
        .ok_or_else(|| ProjectError::view_not_found(source.name(), view))
}

fn view_description(source: &MediaType, view: &str) -> String {
    let base = source
        .attribute()
        .description
        .clone()
        .unwrap_or_else(|| format!("{} media type", source.name()));
    format!("{base} ({view} view)")
}

/// Identifier of a projected media type: unchanged for the default view,
/// with a `view` parameter otherwise.
fn projected_identifier(identifier: &str, view: &str) -> String {
    if view == DEFAULT_VIEW {
        identifier.to_owned()
    } else {
        format!("{identifier}; view={view}")
    }
}

/// The single `default` view of a projected media type.
fn default_view(
    fields: IndexMap<String, ViewField>,
) -> HashMap<String, ViewDefinition> {
    HashMap::from([(
        DEFAULT_VIEW.to_owned(),
        ViewDefinition {
            name: DEFAULT_VIEW.to_owned(),
            fields,
        },
    )])
}

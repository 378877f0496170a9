//! Type graph model.
//!
//! Named types (user types and media types) live in an arena and refer to
//! each other through typed indices, so the graph may contain arbitrary
//! cycles. Attribute trees below a named type are owned values; the only
//! edges between named types are [`DataType::User`] and [`DataType::Media`].
//!
//! Identity of a named type is its id. Two nodes with identical content at
//! different ids are distinct.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use indexmap::IndexMap;

/// Name of the view every media type is expected to define.
pub const DEFAULT_VIEW: &str = "default";

/// Name of the view preferred when rendering links.
pub const LINK_VIEW: &str = "link";

/// Pseudo-field a view selects to include the media type's links.
pub const LINKS_FIELD: &str = "links";

/// Index of a user type in a [`TypeGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UserTypeId(pub(crate) usize);

/// Index of a media type in a [`TypeGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MediaTypeId(pub(crate) usize);

impl UserTypeId {
    /// Position of the user type in its graph's arena.
    pub fn index(self) -> usize {
        self.0
    }
}

impl MediaTypeId {
    /// Position of the media type in its graph's arena.
    pub fn index(self) -> usize {
        self.0
    }
}

/// Identity of any named type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NamedTypeId {
    User(UserTypeId),
    Media(MediaTypeId),
}

impl From<UserTypeId> for NamedTypeId {
    fn from(id: UserTypeId) -> Self {
        Self::User(id)
    }
}

impl From<MediaTypeId> for NamedTypeId {
    fn from(id: MediaTypeId) -> Self {
        Self::Media(id)
    }
}

/// Primitive type kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    Integer,
    String,
    Number,
    Boolean,
    DateTime,
    Uuid,
    Any,
}

impl Primitive {
    /// All primitive kinds, in declaration order.
    pub const ALL: [Primitive; 7] = [
        Primitive::Integer,
        Primitive::String,
        Primitive::Number,
        Primitive::Boolean,
        Primitive::DateTime,
        Primitive::Uuid,
        Primitive::Any,
    ];

    /// Name used for the primitive in design documents.
    pub fn name(self) -> &'static str {
        match self {
            Primitive::Integer => "integer",
            Primitive::String => "string",
            Primitive::Number => "number",
            Primitive::Boolean => "boolean",
            Primitive::DateTime => "datetime",
            Primitive::Uuid => "uuid",
            Primitive::Any => "any",
        }
    }

    /// Parses a primitive from its document name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.name() == name)
    }
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Field name to attribute mapping of an object type.
pub type Object = IndexMap<String, Attribute>;

/// A data type. Closed: every traversal matches all variants.
#[derive(Debug, Clone, PartialEq)]
pub enum DataType {
    Primitive(Primitive),
    /// Array of the element attribute.
    Array(Box<Attribute>),
    Object(Object),
    User(UserTypeId),
    Media(MediaTypeId),
}

/// Coarse classification of a [`DataType`], for callers that only need to
/// branch on the shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Primitive(Primitive),
    Array,
    Object,
    User,
    Media,
}

impl DataType {
    pub fn kind(&self) -> Kind {
        match self {
            DataType::Primitive(p) => Kind::Primitive(*p),
            DataType::Array(_) => Kind::Array,
            DataType::Object(_) => Kind::Object,
            DataType::User(_) => Kind::User,
            DataType::Media(_) => Kind::Media,
        }
    }

    /// Returns the object fields if this is an inline object type.
    pub fn as_object(&self) -> Option<&Object> {
        match self {
            DataType::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Returns the named type this type refers to, if any.
    pub fn named(&self) -> Option<NamedTypeId> {
        match self {
            DataType::User(id) => Some(NamedTypeId::User(*id)),
            DataType::Media(id) => Some(NamedTypeId::Media(*id)),
            DataType::Primitive(_) | DataType::Array(_) | DataType::Object(_) => {
                None
            }
        }
    }

    /// Returns the object fields of this type, looking through named types.
    pub fn to_object<'g, G: TypeGraph + ?Sized>(
        &'g self,
        graph: &'g G,
    ) -> Option<&'g Object> {
        match self {
            DataType::Object(o) => Some(o),
            DataType::User(id) => {
                graph.user_type(*id).attribute.data_type.to_object(graph)
            }
            DataType::Media(id) => {
                graph.media_type(*id).attribute().data_type.to_object(graph)
            }
            DataType::Primitive(_) | DataType::Array(_) => None,
        }
    }
}

/// Validation rules attached to an attribute.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Validation {
    /// Names of mandatory fields (object types only).
    pub required: Vec<String>,
    pub values: Vec<serde_json::Value>,
    pub format: Option<String>,
    pub pattern: Option<String>,
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    pub min_length: Option<u64>,
    pub max_length: Option<u64>,
}

impl Validation {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// A typed field definition.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub data_type: DataType,
    pub description: Option<String>,
    pub validation: Validation,
    pub default: Option<serde_json::Value>,
    pub metadata: BTreeMap<String, Vec<String>>,
    /// View used to render the attribute when its type is a media type.
    pub view: Option<String>,
}

impl Attribute {
    /// Creates an attribute with no metadata.
    pub fn new(data_type: DataType) -> Self {
        Self {
            data_type,
            description: None,
            validation: Validation::default(),
            default: None,
            metadata: BTreeMap::new(),
            view: None,
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Returns `true` if `field` is listed as required by this attribute.
    pub fn is_required(&self, field: &str) -> bool {
        self.validation.required.iter().any(|r| r == field)
    }
}

impl From<Primitive> for Attribute {
    fn from(p: Primitive) -> Self {
        Attribute::new(DataType::Primitive(p))
    }
}

impl From<DataType> for Attribute {
    fn from(t: DataType) -> Self {
        Attribute::new(t)
    }
}

/// A named wrapper around one attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct UserType {
    pub name: String,
    pub attribute: Attribute,
}

impl UserType {
    pub fn new(name: impl Into<String>, attribute: Attribute) -> Self {
        Self {
            name: name.into(),
            attribute,
        }
    }
}

/// A field selected by a view.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewField {
    /// Replacement type and description for this view.
    pub override_attribute: Option<Attribute>,
    /// View used when the field's type is a media type.
    pub view: Option<String>,
}

/// A named partial projection of a media type's attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewDefinition {
    pub name: String,
    /// Selected fields, keyed by attribute name.
    pub fields: IndexMap<String, ViewField>,
}

impl ViewDefinition {
    /// Creates a view selecting `fields` without overrides.
    pub fn new<I, S>(name: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            fields: fields
                .into_iter()
                .map(|f| (f.into(), ViewField::default()))
                .collect(),
        }
    }

    /// Selects `field` with an override attribute.
    #[must_use]
    pub fn with_override(
        mut self,
        field: impl Into<String>,
        attribute: Attribute,
    ) -> Self {
        self.fields.entry(field.into()).or_default().override_attribute =
            Some(attribute);
        self
    }

    /// Returns `true` if the view selects `field`.
    pub fn selects(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }
}

/// A link from a media type to the media type of one of its attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkDefinition {
    /// Name of the linked attribute.
    pub name: String,
    /// View of the target media type used to render the link.
    pub view: Option<String>,
    pub description: Option<String>,
}

impl LinkDefinition {
    pub fn new(name: impl Into<String>, view: Option<&str>) -> Self {
        Self {
            name: name.into(),
            view: view.map(str::to_owned),
            description: None,
        }
    }
}

/// A user type with an identifier, views and links.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaType {
    pub user_type: UserType,
    pub identifier: String,
    pub views: HashMap<String, ViewDefinition>,
    pub links: IndexMap<String, LinkDefinition>,
}

impl MediaType {
    pub fn new(
        identifier: impl Into<String>,
        name: impl Into<String>,
        attribute: Attribute,
    ) -> Self {
        Self {
            user_type: UserType::new(name, attribute),
            identifier: identifier.into(),
            views: HashMap::new(),
            links: IndexMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.user_type.name
    }

    pub fn attribute(&self) -> &Attribute {
        &self.user_type.attribute
    }

    /// Adds or replaces a view, keyed by its name.
    pub fn add_view(&mut self, view: ViewDefinition) {
        self.views.insert(view.name.clone(), view);
    }

    /// Adds or replaces a link, keyed by its name.
    pub fn add_link(&mut self, link: LinkDefinition) {
        self.links.insert(link.name.clone(), link);
    }

    /// Returns the element media type if this is a collection media type.
    pub fn collection_element(&self) -> Option<MediaTypeId> {
        match &self.attribute().data_type {
            DataType::Array(elem) => match elem.data_type {
                DataType::Media(id) => Some(id),
                _ => None,
            },
            _ => None,
        }
    }
}

/// Read access to a graph of named types.
///
/// Implemented by [`Design`] and by projections, which overlay new nodes on
/// top of a borrowed graph.
pub trait TypeGraph {
    /// Returns the user type with the given id.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not produced by this graph.
    fn user_type(&self, id: UserTypeId) -> &UserType;

    /// Returns the media type with the given id.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not produced by this graph.
    fn media_type(&self, id: MediaTypeId) -> &MediaType;

    fn user_type_count(&self) -> usize;

    fn media_type_count(&self) -> usize;

    /// Returns the user type part of any named type.
    fn named_type(&self, id: NamedTypeId) -> &UserType {
        match id {
            NamedTypeId::User(id) => self.user_type(id),
            NamedTypeId::Media(id) => &self.media_type(id).user_type,
        }
    }
}

/// Arena holding every named type of a design.
///
/// Types that refer to each other are built in two steps: `declare_*`
/// reserves an id with an empty object body, `define_*` fills it in once
/// the ids of its dependencies are known.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Design {
    user_types: Vec<UserType>,
    media_types: Vec<MediaType>,
}

impl Design {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a fully defined user type.
    pub fn add_user_type(&mut self, user_type: UserType) -> UserTypeId {
        self.user_types.push(user_type);
        UserTypeId(self.user_types.len() - 1)
    }

    /// Adds a fully defined media type.
    pub fn add_media_type(&mut self, media_type: MediaType) -> MediaTypeId {
        self.media_types.push(media_type);
        MediaTypeId(self.media_types.len() - 1)
    }

    /// Reserves a user type whose body is defined later.
    pub fn declare_user_type(&mut self, name: impl Into<String>) -> UserTypeId {
        self.add_user_type(UserType::new(
            name,
            Attribute::new(DataType::Object(Object::new())),
        ))
    }

    /// Reserves a media type whose body is defined later.
    pub fn declare_media_type(
        &mut self,
        identifier: impl Into<String>,
        name: impl Into<String>,
    ) -> MediaTypeId {
        self.add_media_type(MediaType::new(
            identifier,
            name,
            Attribute::new(DataType::Object(Object::new())),
        ))
    }

    /// Sets the body of a declared user type.
    pub fn define_user_type(&mut self, id: UserTypeId, attribute: Attribute) {
        self.user_types[id.0].attribute = attribute;
    }

    /// Mutable access to a media type during assembly.
    pub fn media_type_mut(&mut self, id: MediaTypeId) -> &mut MediaType {
        &mut self.media_types[id.0]
    }

    /// Mutable access to a user type during assembly.
    pub fn user_type_mut(&mut self, id: UserTypeId) -> &mut UserType {
        &mut self.user_types[id.0]
    }

    /// Iterates over all user types with their ids, in arena order.
    pub fn user_types(&self) -> impl Iterator<Item = (UserTypeId, &UserType)> {
        self.user_types
            .iter()
            .enumerate()
            .map(|(i, ut)| (UserTypeId(i), ut))
    }

    /// Iterates over all media types with their ids, in arena order.
    pub fn media_types(
        &self,
    ) -> impl Iterator<Item = (MediaTypeId, &MediaType)> {
        self.media_types
            .iter()
            .enumerate()
            .map(|(i, mt)| (MediaTypeId(i), mt))
    }

    /// Finds a user type by name.
    pub fn user_type_named(&self, name: &str) -> Option<UserTypeId> {
        self.user_types().find(|(_, ut)| ut.name == name).map(|(id, _)| id)
    }

    /// Finds a media type by identifier, falling back to its type name.
    pub fn media_type_with_identifier(
        &self,
        identifier: &str,
    ) -> Option<MediaTypeId> {
        self.media_types()
            .find(|(_, mt)| mt.identifier == identifier)
            .or_else(|| self.media_types().find(|(_, mt)| mt.name() == identifier))
            .map(|(id, _)| id)
    }
}

impl TypeGraph for Design {
    fn user_type(&self, id: UserTypeId) -> &UserType {
        &self.user_types[id.0]
    }

    fn media_type(&self, id: MediaTypeId) -> &MediaType {
        &self.media_types[id.0]
    }

    fn user_type_count(&self) -> usize {
        self.user_types.len()
    }

    fn media_type_count(&self) -> usize {
        self.media_types.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Every primitive parses back from its name.
    #[test]
    fn test_primitive_names_roundtrip() {
        for p in Primitive::ALL {
            assert_eq!(Primitive::from_name(p.name()), Some(p));
        }
        assert_eq!(Primitive::from_name("Integer"), None);
    }

    /// Declaring before defining allows self reference.
    #[test]
    fn test_declare_then_define_cycle() {
        let mut design = Design::new();
        let foo = design.declare_user_type("foo");
        let mut body = Object::new();
        body.insert("recurse".into(), Attribute::new(DataType::User(foo)));
        design.define_user_type(foo, Attribute::new(DataType::Object(body)));

        let data_type = DataType::User(foo);
        let fields = data_type.to_object(&design).unwrap();
        assert_eq!(fields["recurse"].data_type, DataType::User(foo));
        assert_eq!(design.user_type_named("foo"), Some(foo));
        assert_eq!(design.user_type_named("bar"), None);
    }

    /// Media types are found by identifier first, then name.
    #[test]
    fn test_media_type_lookup_by_identifier_or_name() {
        let mut design = Design::new();
        let id = design.declare_media_type("application/vnd.bottle", "Bottle");
        assert_eq!(
            design.media_type_with_identifier("application/vnd.bottle"),
            Some(id)
        );
        assert_eq!(design.media_type_with_identifier("Bottle"), Some(id));
        assert_eq!(design.media_type_with_identifier("Box"), None);
    }

    /// Only arrays of media types are collections.
    #[test]
    fn test_collection_element() {
        let mut design = Design::new();
        let bottle = design.declare_media_type("application/vnd.bottle", "Bottle");
        let collection = MediaType::new(
            "application/vnd.bottle; type=collection",
            "BottleCollection",
            Attribute::new(DataType::Array(Box::new(Attribute::new(
                DataType::Media(bottle),
            )))),
        );
        assert_eq!(collection.collection_element(), Some(bottle));
        assert_eq!(design.media_type(bottle).collection_element(), None);
    }

    /// Overrides select the field they replace.
    #[test]
    fn test_view_overrides() {
        let view = ViewDefinition::new("default", ["att1", "att2"])
            .with_override("att1", Primitive::String.into());
        assert!(view.selects("att2"));
        assert!(!view.selects("att3"));
        assert_eq!(
            view.fields["att1"].override_attribute,
            Some(Attribute::from(Primitive::String))
        );
        assert_eq!(view.fields["att2"].override_attribute, None);
    }

    /// Required checks consult the validation list.
    #[test]
    fn test_required() {
        let mut att = Attribute::new(DataType::Object(Object::new()));
        att.validation.required.push("id".into());
        assert!(att.is_required("id"));
        assert!(!att.is_required("name"));
    }
}

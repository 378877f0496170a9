//! Design document schema: the on-disk form of a type graph.
//!
//! A design document names every user type and media type once. Attribute
//! types refer to other named types by string, so cycles between types are
//! expressed without nesting. Resolving those strings into graph edges is the
//! job of the consumer (see `typeview-design`).
//!
//! ## Type references
//!
//! A [`TypeDoc`] written as a plain string is resolved in this order:
//! 1. Primitive names (`integer`, `string`, `number`, `boolean`,
//!    `datetime`, `uuid`, `any`)
//! 2. User type names
//! 3. Media type names (`type_name`)
//! 4. Media type identifiers

use std::collections::BTreeMap;

use indexmap::IndexMap;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Root structure of a design document.
///
/// Both maps are keyed by the name other documents and attributes use to
/// refer to the entry: user types by type name, media types by identifier.
#[derive(
    Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema,
)]
pub struct DesignDocument {
    /// Named user types, keyed by type name.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub user_types: IndexMap<String, AttributeDoc>,

    /// Media types, keyed by identifier (e.g. `application/vnd.bottle`).
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub media_types: IndexMap<String, MediaTypeDoc>,
}

impl DesignDocument {
    /// Total number of named types declared by the document.
    pub fn len(&self) -> usize {
        self.user_types.len() + self.media_types.len()
    }

    /// Returns `true` if the document declares no types at all.
    pub fn is_empty(&self) -> bool {
        self.user_types.is_empty() && self.media_types.is_empty()
    }
}

/// A media type declaration.
///
/// A media type is an object type with a type name, a set of views and an
/// optional set of links. When `collection_of` is set the media type is a
/// collection: its payload is an array of the referenced media type and it
/// borrows that type's views.
#[derive(
    Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema,
)]
pub struct MediaTypeDoc {
    /// Type name used when referring to the media type from code.
    pub type_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Object attributes of the media type.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub attributes: IndexMap<String, AttributeDoc>,

    /// Names of attributes that must be present.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,

    /// Views keyed by view name. Each view maps selected attribute names to
    /// an optional override.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub views: IndexMap<String, IndexMap<String, ViewFieldDoc>>,

    /// Links keyed by the name of the attribute they point at.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub links: IndexMap<String, LinkDoc>,

    /// Element media type (identifier or type name) for collections.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection_of: Option<String>,
}

/// A field selected by a view.
///
/// An empty object (`{}`) selects the attribute as declared on the media
/// type. Setting `type` or `description` overrides the declaration for this
/// view only; `view` picks the view used to render a nested media type.
#[derive(
    Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema,
)]
pub struct ViewFieldDoc {
    #[serde(
        rename = "type",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub type_ref: Option<TypeDoc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view: Option<String>,
}

/// A link from a media type to the media type of one of its attributes.
#[derive(
    Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema,
)]
pub struct LinkDoc {
    /// View of the target media type used to render the link. Defaults to
    /// `link` when the target defines it, `default` otherwise.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// An attribute: a type plus documentation and validation metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AttributeDoc {
    #[serde(rename = "type")]
    pub type_ref: TypeDoc,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Default value, as JSON.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,

    /// View used when the attribute type is a media type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view: Option<String>,

    #[serde(flatten)]
    pub validation: ValidationDoc,

    /// Free-form metadata, e.g. struct tags for code generators.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, Vec<String>>,
}

impl AttributeDoc {
    /// Creates an attribute of the given type with no metadata.
    pub fn new(type_ref: TypeDoc) -> Self {
        Self {
            type_ref,
            description: None,
            default: None,
            view: None,
            validation: ValidationDoc::default(),
            metadata: BTreeMap::new(),
        }
    }

    /// Creates an attribute referring to a primitive or named type.
    pub fn named(name: impl Into<String>) -> Self {
        Self::new(TypeDoc::Named(name.into()))
    }
}

/// Validation rules attached to an attribute.
///
/// Flattened into the owning [`AttributeDoc`]. `required` only makes sense
/// on object-typed attributes and lists the names of mandatory fields.
#[derive(
    Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema,
)]
pub struct ValidationDoc {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,

    /// Enumeration of allowed values.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u64>,
}

impl ValidationDoc {
    /// Returns `true` if no rule is set.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// A type expression.
///
/// Untagged: a bare string names a primitive or named type, an object with
/// `array_of` declares an array, an object with `attributes` declares an
/// inline object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum TypeDoc {
    /// Primitive name, user type name, media type name or identifier.
    Named(String),
    /// Array of the element attribute.
    Array { array_of: Box<AttributeDoc> },
    /// Inline object type.
    Object {
        attributes: IndexMap<String, AttributeDoc>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        required: Vec<String>,
    },
}

/// Exported result of projecting a media type through a view.
///
/// `types` holds every named type reachable from the projected media type,
/// including the projected media type itself and its links type.
#[derive(
    Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema,
)]
pub struct ProjectionDocument {
    /// Identifier of the projected media type within `types.media_types`.
    pub media_type: String,

    /// Type name of the links user type within `types.user_types`, if the
    /// view selected links.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub links: Option<String>,

    pub types: DesignDocument,
}

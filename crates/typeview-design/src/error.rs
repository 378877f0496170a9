//! Error types for the typeview-design crate.

use std::backtrace::Backtrace;
use std::fmt;

/// Error returned when a media type cannot be projected through a view.
///
/// Uses the canonical struct pattern with backtrace capture and `is_xxx()`
/// helper methods. Every variant is recoverable: callers typically fall back
/// to another view or report a design error to the user.
#[derive(Debug)]
pub struct ProjectError {
    kind: ProjectErrorKind,
    backtrace: Backtrace,
}

/// Internal error variants. Not exposed publicly; use `is_xxx()` methods.
#[derive(Debug)]
pub(crate) enum ProjectErrorKind {
    /// The view name is empty or not defined by the media type.
    ViewNotFound { type_name: String, view: String },
    /// The view selects a field the media type does not declare.
    UnknownAttribute {
        type_name: String,
        view: String,
        attribute: String,
    },
    /// A link names an attribute that is missing or not a media type.
    InvalidLink {
        type_name: String,
        view: String,
        link: String,
    },
}

impl ProjectError {
    /// Creates an error from an error kind, capturing a backtrace.
    pub(crate) fn new(kind: ProjectErrorKind) -> Self {
        Self {
            kind,
            backtrace: Backtrace::capture(),
        }
    }

    pub(crate) fn view_not_found(type_name: &str, view: &str) -> Self {
        Self::new(ProjectErrorKind::ViewNotFound {
            type_name: type_name.to_owned(),
            view: view.to_owned(),
        })
    }

    pub(crate) fn unknown_attribute(
        type_name: &str,
        view: &str,
        attribute: &str,
    ) -> Self {
        Self::new(ProjectErrorKind::UnknownAttribute {
            type_name: type_name.to_owned(),
            view: view.to_owned(),
            attribute: attribute.to_owned(),
        })
    }

    pub(crate) fn invalid_link(type_name: &str, view: &str, link: &str) -> Self {
        Self::new(ProjectErrorKind::InvalidLink {
            type_name: type_name.to_owned(),
            view: view.to_owned(),
            link: link.to_owned(),
        })
    }

    /// Returns true if the requested view is empty or undefined.
    pub fn is_view_not_found(&self) -> bool {
        matches!(self.kind, ProjectErrorKind::ViewNotFound { .. })
    }

    /// Returns true if a view selects an attribute the type lacks.
    pub fn is_unknown_attribute(&self) -> bool {
        matches!(self.kind, ProjectErrorKind::UnknownAttribute { .. })
    }

    /// Returns true if a link cannot be resolved to a media type.
    pub fn is_invalid_link(&self) -> bool {
        matches!(self.kind, ProjectErrorKind::InvalidLink { .. })
    }

    /// Name of the media type whose projection failed.
    ///
    /// For nested projections this is the innermost failing type.
    pub fn type_name(&self) -> &str {
        match &self.kind {
            ProjectErrorKind::ViewNotFound { type_name, .. }
            | ProjectErrorKind::UnknownAttribute { type_name, .. }
            | ProjectErrorKind::InvalidLink { type_name, .. } => type_name,
        }
    }

    /// Name of the view being projected when the error occurred.
    pub fn view(&self) -> &str {
        match &self.kind {
            ProjectErrorKind::ViewNotFound { view, .. }
            | ProjectErrorKind::UnknownAttribute { view, .. }
            | ProjectErrorKind::InvalidLink { view, .. } => view,
        }
    }

    /// Returns the backtrace captured when this error was created.
    pub fn backtrace(&self) -> &Backtrace {
        &self.backtrace
    }
}

impl fmt::Display for ProjectErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProjectErrorKind::ViewNotFound { type_name, view } => {
                if view.is_empty() {
                    write!(f, "no view requested for media type {type_name}")
                } else {
                    write!(f, "unknown view {view:?} on media type {type_name}")
                }
            }
            ProjectErrorKind::UnknownAttribute {
                type_name,
                view,
                attribute,
            } => write!(
                f,
                "view {view:?} of media type {type_name} selects unknown \
                 attribute {attribute:?}"
            ),
            ProjectErrorKind::InvalidLink {
                type_name,
                view,
                link,
            } => write!(
                f,
                "link {link:?} of media type {type_name} (view {view:?}) does \
                 not refer to a media type attribute"
            ),
        }
    }
}

impl fmt::Display for ProjectError {
    /// Formats the error with a summary and captured backtrace.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.kind)?;

        // Backtrace (will be empty unless RUST_BACKTRACE is set).
        write!(f, "{}", self.backtrace)
    }
}

impl std::error::Error for ProjectError {}

/// Error returned when a design document cannot be turned into a type graph.
#[derive(Debug)]
pub struct DesignError {
    kind: DesignErrorKind,
    backtrace: Backtrace,
}

#[derive(Debug)]
pub(crate) enum DesignErrorKind {
    /// Failed to deserialize the input JSON.
    Deserialization(serde_json::Error),
    /// Failed to serialize output JSON.
    Serialization(serde_json::Error),
    /// An attribute refers to a type name the document does not declare.
    UnknownType { name: String, context: String },
    /// Two types share a name.
    DuplicateType { name: String },
    /// `collection_of` does not name a media type.
    InvalidCollection { type_name: String, element: String },
    /// I/O error when reading input or writing output.
    Io(std::io::Error),
}

impl DesignError {
    pub(crate) fn new(kind: DesignErrorKind) -> Self {
        Self {
            kind,
            backtrace: Backtrace::capture(),
        }
    }

    /// Returns true if the input is not a valid design document.
    pub fn is_deserialization(&self) -> bool {
        matches!(self.kind, DesignErrorKind::Deserialization(_))
    }

    /// Returns true if writing JSON output failed.
    pub fn is_serialization(&self) -> bool {
        matches!(self.kind, DesignErrorKind::Serialization(_))
    }

    /// Returns true if a type reference could not be resolved.
    pub fn is_unknown_type(&self) -> bool {
        matches!(self.kind, DesignErrorKind::UnknownType { .. })
    }

    /// Returns true if two declarations use the same type name.
    pub fn is_duplicate_type(&self) -> bool {
        matches!(self.kind, DesignErrorKind::DuplicateType { .. })
    }

    /// Returns true if a collection's element is not a media type.
    pub fn is_invalid_collection(&self) -> bool {
        matches!(self.kind, DesignErrorKind::InvalidCollection { .. })
    }

    /// Returns true if this error is due to I/O failure.
    pub fn is_io(&self) -> bool {
        matches!(self.kind, DesignErrorKind::Io(_))
    }

    pub fn backtrace(&self) -> &Backtrace {
        &self.backtrace
    }
}

impl fmt::Display for DesignErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DesignErrorKind::Deserialization(err) => {
                write!(f, "failed to deserialize design: {err}")
            }
            DesignErrorKind::Serialization(err) => {
                write!(f, "failed to serialize output: {err}")
            }
            DesignErrorKind::UnknownType { name, context } => {
                write!(f, "unknown type {name:?} referenced by {context}")
            }
            DesignErrorKind::DuplicateType { name } => {
                write!(f, "type name {name:?} is declared more than once")
            }
            DesignErrorKind::InvalidCollection { type_name, element } => write!(
                f,
                "collection {type_name} has element {element:?}, which is not \
                 a media type"
            ),
            DesignErrorKind::Io(err) => write!(f, "I/O error: {err}"),
        }
    }
}

impl fmt::Display for DesignError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.kind)?;
        write!(f, "{}", self.backtrace)
    }
}

impl std::error::Error for DesignError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.kind {
            DesignErrorKind::Deserialization(err)
            | DesignErrorKind::Serialization(err) => Some(err),
            DesignErrorKind::Io(err) => Some(err),
            DesignErrorKind::UnknownType { .. }
            | DesignErrorKind::DuplicateType { .. }
            | DesignErrorKind::InvalidCollection { .. } => None,
        }
    }
}

impl From<std::io::Error> for DesignError {
    fn from(err: std::io::Error) -> Self {
        Self::new(DesignErrorKind::Io(err))
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use super::*;

    /// View-not-found errors expose the type and view.
    #[test]
    fn test_view_not_found() {
        let err = ProjectError::view_not_found("Bottle", "tiny");
        assert!(err.is_view_not_found());
        assert!(!err.is_unknown_attribute());
        assert!(!err.is_invalid_link());
        assert_eq!(err.type_name(), "Bottle");
        assert_eq!(err.view(), "tiny");
        assert!(err.to_string().contains("unknown view \"tiny\""));
    }

    /// An empty view gets its own message.
    #[test]
    fn test_empty_view_message() {
        let err = ProjectError::view_not_found("Bottle", "");
        assert!(err.is_view_not_found());
        assert!(err.to_string().contains("no view requested"));
    }

    /// Unknown attribute errors name the attribute.
    #[test]
    fn test_unknown_attribute() {
        let err = ProjectError::unknown_attribute("Bottle", "default", "vintage");
        assert!(err.is_unknown_attribute());
        assert!(!err.is_view_not_found());
        assert!(err.to_string().contains("\"vintage\""));
    }

    /// Invalid link errors keep the view.
    #[test]
    fn test_invalid_link() {
        let err = ProjectError::invalid_link("Bottle", "default", "account");
        assert!(err.is_invalid_link());
        assert_eq!(err.view(), "default");
        let _ = err.backtrace();
    }

    /// Deserialization errors keep their source.
    #[test]
    fn test_design_deserialization() {
        let json_err =
            serde_json::from_str::<String>("not valid json").unwrap_err();
        let err = DesignError::new(DesignErrorKind::Deserialization(json_err));

        assert!(err.is_deserialization());
        assert!(!err.is_io());
        assert!(err.to_string().contains("failed to deserialize design"));
        assert!(err.source().is_some());
    }

    /// I/O errors convert and keep their source.
    #[test]
    fn test_design_io_from() {
        let io_err =
            std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = DesignError::from(io_err);

        assert!(err.is_io());
        assert!(err.to_string().contains("I/O error"));
        assert!(err.source().is_some());
    }

    /// Resolution errors have no underlying source.
    #[test]
    fn test_unknown_type_has_no_source() {
        let err = DesignError::new(DesignErrorKind::UnknownType {
            name: "Bottel".into(),
            context: "attribute \"bottle\" of Account".into(),
        });
        assert!(err.is_unknown_type());
        assert!(err.source().is_none());
        let debug_str = format!("{err:?}");
        assert!(debug_str.contains("DesignError"));
    }
}

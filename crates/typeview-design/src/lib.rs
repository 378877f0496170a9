//! Declarative type graphs and view projection.
//!
//! A [`Design`] is an arena of named types: user types, which are named
//! attributes, and media types, which add an identifier, views and links on
//! top of a user type. Attributes refer to named types by id, so types may
//! refer to themselves and to each other.
//!
//! The crate provides the algorithms consumers run over such graphs:
//!
//! - [`walk`] visits every attribute reachable from a root without looping
//!   on recursive types.
//! - [`collect_user_types`] finds the named types an object depends on, and
//!   [`declaration_order`] sorts them dependencies first.
//! - [`project`] derives the media type a view describes, along with the
//!   user type holding its links. Cyclic media types project to cyclic
//!   results; each (media type, view) pair is projected once.
//! - [`MediaType::iterate_views`] and friends visit views and types in a
//!   stable order.
//!
//! Designs are usually loaded from JSON documents (see
//! [`typeview_schemas::DesignDocument`]):
//!
//! ```no_run
//! use typeview_design::{export_projection, load_design, project, write_json};
//!
//! let design = load_design(std::io::stdin().lock()).unwrap();
//! let bottle = design.media_type_with_identifier("Bottle").unwrap();
//! let projection = project(&design, bottle, "default").unwrap();
//! write_json(std::io::stdout().lock(), &export_projection(&projection))
//!     .unwrap();
//! ```

mod collect;
mod document;
mod error;
mod model;
mod project;
mod views;
mod walk;

#[doc(inline)]
pub use crate::collect::{collect_user_types, declaration_order};
#[doc(inline)]
pub use crate::document::{
    export_projection, export_types, load_design, write_json,
};
#[doc(inline)]
pub use crate::error::{DesignError, ProjectError};
#[doc(inline)]
pub use crate::model::*;
#[doc(inline)]
pub use crate::project::{
    MissingFields, ProjectOptions, Projection, project, project_with,
};
#[doc(inline)]
pub use crate::walk::{walk, walk_object};

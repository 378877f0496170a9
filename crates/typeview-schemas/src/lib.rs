//! Schema definitions for typeview input and output documents.
//!
//! A design document describes a type graph as JSON: user types and media
//! types declared once by name, with attributes referring to each other by
//! name so that cyclic designs need no special syntax. The same document
//! format carries the output of a view projection.
//!
//! The schemas are:
//! - **Self-describing**: JSON Schema is derived with `schemars`
//! - **Order-preserving**: maps keep declaration order so exported
//!   documents diff cleanly

mod design;
#[cfg(test)]
mod testutil;

#[doc(inline)]
pub use design::*;

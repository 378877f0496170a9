//! Deterministic iteration over views and named types.
//!
//! Generated declarations and documentation must come out identical across
//! runs, so every iterator here sorts before visiting and stops at the first
//! error the visitor returns, handing it back unchanged.

use itertools::Itertools;

use crate::model::{
    Design, MediaType, MediaTypeId, UserType, UserTypeId, ViewDefinition,
};

impl MediaType {
    /// Calls `visit` on each view in name order.
    ///
    /// Returns the first error produced by `visit` without visiting the
    /// remaining views.
    ///
    /// # Errors
    ///
    /// Returns whatever `visit` returns, verbatim.
    pub fn iterate_views<E, F>(&self, mut visit: F) -> Result<(), E>
    where
        F: FnMut(&ViewDefinition) -> Result<(), E>,
    {
        self.views
            .iter()
            .sorted_by(|a, b| a.0.cmp(b.0))
            .try_for_each(|(_, view)| visit(view))
    }

    /// View names in sorted order.
    pub fn view_names(&self) -> Vec<&str> {
        self.views.keys().map(String::as_str).sorted().collect()
    }
}

impl Design {
    /// Calls `visit` on each user type in type name order.
    ///
    /// # Errors
    ///
    /// Returns the first error produced by `visit`, verbatim.
    pub fn iterate_user_types<E, F>(&self, mut visit: F) -> Result<(), E>
    where
        F: FnMut(UserTypeId, &UserType) -> Result<(), E>,
    {
        self.user_types()
            .sorted_by(|a, b| a.1.name.cmp(&b.1.name))
            .try_for_each(|(id, ut)| visit(id, ut))
    }

    /// Calls `visit` on each media type in identifier order.
    ///
    /// # Errors
    ///
    /// Returns the first error produced by `visit`, verbatim.
    pub fn iterate_media_types<E, F>(&self, mut visit: F) -> Result<(), E>
    where
        F: FnMut(MediaTypeId, &MediaType) -> Result<(), E>,
    {
        self.media_types()
            .sorted_by(|a, b| a.1.identifier.cmp(&b.1.identifier))
            .try_for_each(|(id, mt)| visit(id, mt))
    }
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;

    use super::*;
    use crate::model::{Attribute, DataType, Object, Primitive};

    fn media_type_with_views(names: &[&str]) -> MediaType {
        let mut mt = MediaType::new(
            "application/vnd.foo",
            "Foo",
            Attribute::new(DataType::Object(Object::new())),
        );
        for name in names {
            mt.add_view(ViewDefinition::new(*name, Vec::<String>::new()));
        }
        mt
    }

    /// No views means no calls and no error.
    #[test]
    fn test_empty_views() {
        let mt = media_type_with_views(&[]);
        let mut iterated = Vec::new();
        let result: Result<(), Infallible> = mt.iterate_views(|v| {
            iterated.push(v.name.clone());
            Ok(())
        });
        assert!(result.is_ok());
        assert!(iterated.is_empty());
    }

    /// Views are visited in name order.
    #[test]
    fn test_sorts_views() {
        let mt = media_type_with_views(&["d", "c", "a", "b"]);
        let mut iterated = Vec::new();
        let result: Result<(), Infallible> = mt.iterate_views(|v| {
            iterated.push(v.name.clone());
            Ok(())
        });
        assert!(result.is_ok());
        assert_eq!(iterated, ["a", "b", "c", "d"]);
        assert_eq!(mt.view_names(), ["a", "b", "c", "d"]);
    }

    /// The visitor's error comes back unchanged.
    #[test]
    fn test_propagates_error() {
        #[derive(Debug, PartialEq)]
        struct Foo;

        let mt = media_type_with_views(&["d", "c", "a", "b"]);
        let mut iterated = Vec::new();
        let result = mt.iterate_views(|v| {
            if iterated.len() > 2 {
                return Err(Foo);
            }
            iterated.push(v.name.clone());
            Ok(())
        });
        assert_eq!(result, Err(Foo));
        assert_eq!(iterated, ["a", "b", "c"]);
    }

    /// No view is visited after the visitor fails.
    #[test]
    fn test_stops_after_first_error() {
        let mt = media_type_with_views(&["d", "c", "a", "b"]);
        let mut calls = 0;
        let result = mt.iterate_views(|v| {
            calls += 1;
            if v.name == "b" {
                return Err(v.name.clone());
            }
            Ok(())
        });
        assert_eq!(result, Err("b".to_string()));
        assert_eq!(calls, 2);
    }

    /// User types are visited in name order.
    #[test]
    fn test_iterate_user_types_sorted() {
        let mut design = Design::new();
        for name in ["Zebra", "Apple", "Mango"] {
            design.add_user_type(UserType::new(name, Primitive::String.into()));
        }
        let mut names = Vec::new();
        let result: Result<(), Infallible> =
            design.iterate_user_types(|_, ut| {
                names.push(ut.name.clone());
                Ok(())
            });
        assert!(result.is_ok());
        assert_eq!(names, ["Apple", "Mango", "Zebra"]);
    }

    /// Media type iteration stops at the first error.
    #[test]
    fn test_iterate_media_types_stops_on_error() {
        let mut design = Design::new();
        design.declare_media_type("application/vnd.b", "B");
        design.declare_media_type("application/vnd.a", "A");
        design.declare_media_type("application/vnd.c", "C");

        let mut seen = Vec::new();
        let result = design.iterate_media_types(|_, mt| {
            if mt.name() == "B" {
                return Err(format!("refusing {}", mt.identifier));
            }
            seen.push(mt.name().to_string());
            Ok(())
        });
        assert_eq!(result, Err("refusing application/vnd.b".to_string()));
        assert_eq!(seen, ["A"]);
    }
}

//! Cycle-safe depth-first traversal of attribute trees.

use std::collections::HashSet;

use crate::model::{Attribute, DataType, NamedTypeId, Object, TypeGraph};

/// Walks `root` depth-first, calling `visit` on every attribute reached.
///
/// The walk descends into object fields, array elements and the body of
/// named types. `visit` fires once per attribute occurrence, so a user type
/// referenced from two fields is visited through both. The body of a named
/// type is not re-entered while it is already being walked higher up the
/// stack; once finished it may be entered again from another reference.
///
/// Object fields are visited in declaration order, which callers should not
/// rely on.
pub fn walk<G, F>(graph: &G, root: &Attribute, visit: F)
where
    G: TypeGraph + ?Sized,
    F: FnMut(&Attribute),
{
    let mut walker = Walker {
        graph,
        visit,
        active: HashSet::new(),
    };
    walker.attribute(root);
}

/// Walks every field of `object` as if it were the body of an attribute,
/// without visiting an enclosing attribute.
pub fn walk_object<G, F>(
    graph: &G,
    object: &Object,
    visit: F,
) where
    G: TypeGraph + ?Sized,
    F: FnMut(&Attribute),
{
    let mut walker = Walker {
        graph,
        visit,
        active: HashSet::new(),
    };
    for att in object.values() {
        walker.attribute(att);
    }
}

/// Per-call traversal state.
struct Walker<'g, G: ?Sized, F> {
    graph: &'g G,
    visit: F,
    /// Named types whose body is on the current recursion stack.
    active: HashSet<NamedTypeId>,
}

impl<G, F> Walker<'_, G, F>
where
    G: TypeGraph + ?Sized,
    F: FnMut(&Attribute),
{
    fn attribute(&mut self, att: &Attribute) {
        (self.visit)(att);
        match &att.data_type {
            DataType::Primitive(_) => {}
            DataType::Array(elem) => self.attribute(elem),
            DataType::Object(fields) => {
                for field in fields.values() {
                    self.attribute(field);
                }
            }
            DataType::User(id) => self.named((*id).into()),
            DataType::Media(id) => self.named((*id).into()),
        }
    }

    fn named(&mut self, id: NamedTypeId) {
        if !self.active.insert(id) {
            return;
        }
        let graph = self.graph;
        self.attribute(&graph.named_type(id).attribute);
        self.active.remove(&id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        Design, MediaType, Primitive, UserType, UserTypeId,
    };

    fn count(design: &Design, root: &Attribute) -> usize {
        let mut n = 0;
        walk(design, root, |_| n += 1);
        n
    }

    fn object(fields: Vec<(&'static str, Attribute)>) -> Attribute {
        let o: Object = fields
            .into_iter()
            .map(|(name, att)| (name.to_string(), att))
            .collect();
        Attribute::new(DataType::Object(o))
    }

    /// Returns `true` if walking `root` reaches an attribute of the named
    /// user type.
    fn reaches(design: &Design, root: &Attribute, name: &str) -> bool {
        let mut matched = false;
        walk(design, root, |att| {
            if let Some(id) = att.data_type.named() {
                matched |= design.named_type(id).name == name;
            }
        });
        matched
    }

    /// A primitive attribute is visited once.
    #[test]
    fn test_simple_attribute() {
        let design = Design::new();
        assert_eq!(count(&design, &Primitive::String.into()), 1);
    }

    /// An object is visited along with its field.
    #[test]
    fn test_object_attribute() {
        let design = Design::new();
        let root = object(vec![("foo", Primitive::String.into())]);
        assert_eq!(count(&design, &root), 2);
    }

    /// Walking enters user type bodies.
    #[test]
    fn test_object_with_user_type() {
        let mut design = Design::new();
        let ut = design
            .add_user_type(UserType::new("foo", Primitive::String.into()));
        let root = object(vec![("foo", DataType::User(ut).into())]);

        assert_eq!(count(&design, &root), 3);
        assert!(reaches(&design, &root, "foo"));
        assert!(!reaches(&design, &root, "bar"));
    }

    /// A self-referential user type is entered once per stack.
    #[test]
    fn test_recursive_user_type() {
        let mut design = Design::new();
        let ut = design.declare_user_type("foo");
        design.define_user_type(
            ut,
            object(vec![("recurse", DataType::User(ut).into())]),
        );
        let root = object(vec![("foo", DataType::User(ut).into())]);

        assert_eq!(count(&design, &root), 4);
        assert!(reaches(&design, &root, "foo"));
    }

    /// Each reference to a shared type is walked.
    #[test]
    fn test_repeated_reference_visits_each_occurrence() {
        let mut design = Design::new();
        let ut = design.add_user_type(UserType::new(
            "point",
            object(vec![("x", Primitive::Number.into())]),
        ));
        let root = object(vec![
            ("from", DataType::User(ut).into()),
            ("to", DataType::User(ut).into()),
        ]);

        // root + 2 * (reference + body + field)
        assert_eq!(count(&design, &root), 7);
    }

    /// Mutually recursive media types terminate.
    #[test]
    fn test_mutual_recursion_through_media_types() {
        let mut design = Design::new();
        let mt1 = design.declare_media_type("application/vnd.mt1", "Mt1");
        let mt2 = design.declare_media_type("application/vnd.mt2", "Mt2");
        design.media_type_mut(mt1).user_type.attribute =
            object(vec![("att", DataType::Media(mt2).into())]);
        design.media_type_mut(mt2).user_type.attribute =
            object(vec![("att2", DataType::Media(mt1).into())]);

        let root: Attribute = DataType::Media(mt1).into();
        // root, Mt1 body, att, Mt2 body, att2 (Mt1 active: stop)
        assert_eq!(count(&design, &root), 5);
    }

    /// Array elements and their bodies are walked.
    #[test]
    fn test_array_elements() {
        let mut design = Design::new();
        let mt = design.add_media_type(MediaType::new(
            "application/vnd.leaf",
            "Leaf",
            object(vec![("id", Primitive::Integer.into())]),
        ));
        let root = Attribute::new(DataType::Array(Box::new(
            DataType::Media(mt).into(),
        )));
        // array, element, Leaf body, id
        assert_eq!(count(&design, &root), 4);
    }

    /// Walking an object visits only its fields.
    #[test]
    fn test_walk_object_skips_enclosing_attribute() {
        let mut design = Design::new();
        let ut: UserTypeId = design
            .add_user_type(UserType::new("foo", Primitive::String.into()));
        let mut fields = Object::new();
        fields.insert("foo".into(), DataType::User(ut).into());
        fields.insert("bar".into(), Primitive::Boolean.into());

        let mut n = 0;
        walk_object(&design, &fields, |_| n += 1);
        assert_eq!(n, 3);
    }
}

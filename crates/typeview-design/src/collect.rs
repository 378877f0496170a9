//! Collection of the named types reachable from an object.
//!
//! Consumers that emit one declaration per named type use
//! [`collect_user_types`] to find the types and [`declaration_order`] to
//! emit them reproducibly, dependencies first.

use std::collections::HashMap;

use itertools::Itertools;
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use tracing::debug;

use crate::model::{Attribute, DataType, NamedTypeId, Object, TypeGraph};

/// Returns every user type and media type reachable from `object`, keyed by
/// type name.
///
/// Each named type's own body is searched once, so self-referential and
/// mutually referential types terminate. The result is empty when the object
/// uses no named types.
pub fn collect_user_types<G>(
    graph: &G,
    object: &Object,
) -> HashMap<String, NamedTypeId>
where
    G: TypeGraph + ?Sized,
{
    let mut collector = Collector {
        graph,
        types: HashMap::new(),
    };
    collector.object(object);
    debug!(count = collector.types.len(), "collected user types");
    collector.types
}

/// Per-call collection state.
struct Collector<'g, G: ?Sized> {
    graph: &'g G,
    /// Output and visited set, both keyed by type name.
    types: HashMap<String, NamedTypeId>,
}

impl<G: TypeGraph + ?Sized> Collector<'_, G> {
    fn object(&mut self, object: &Object) {
        for att in object.values() {
            self.attribute(att);
        }
    }

    fn attribute(&mut self, att: &Attribute) {
        match &att.data_type {
            DataType::Primitive(_) => {}
            DataType::Array(elem) => self.attribute(elem),
            DataType::Object(fields) => self.object(fields),
            DataType::User(id) => self.named((*id).into()),
            DataType::Media(id) => self.named((*id).into()),
        }
    }

    fn named(&mut self, id: NamedTypeId) {
        let graph = self.graph;
        let user_type = graph.named_type(id);
        if self.types.contains_key(&user_type.name) {
            return;
        }
        self.types.insert(user_type.name.clone(), id);
        self.attribute(&user_type.attribute);
    }
}

/// Orders collected types so that every type comes after the types it
/// refers to.
///
/// Mutually recursive types cannot be ordered against each other and are
/// returned together as one group, sorted by name. Groups and their contents
/// are deterministic for a given input regardless of map iteration order.
/// References to types outside `types` are ignored.
pub fn declaration_order<G>(
    graph: &G,
    types: &HashMap<String, NamedTypeId>,
) -> Vec<Vec<NamedTypeId>>
where
    G: TypeGraph + ?Sized,
{
    // Insert nodes in name order so SCC discovery order is reproducible.
    let mut dag = DiGraph::<NamedTypeId, ()>::with_capacity(types.len(), 0);
    let mut nodes: HashMap<NamedTypeId, NodeIndex> = HashMap::new();
    for (_, &id) in types.iter().sorted_by(|a, b| a.0.cmp(b.0)) {
        nodes.insert(id, dag.add_node(id));
    }

    for (&id, &node) in nodes.iter().sorted_by_key(|(_, n)| **n) {
        let mut refs = Vec::new();
        direct_references(&graph.named_type(id).attribute, &mut refs);
        for target in refs.into_iter().unique() {
            if let Some(&dep) = nodes.get(&target) {
                dag.add_edge(node, dep, ());
            }
        }
    }

    // tarjan_scc yields components in reverse topological order, which for
    // edges pointing at dependencies is dependencies first.
    tarjan_scc(&dag)
        .into_iter()
        .map(|scc| {
            scc.into_iter()
                .map(|n| dag[n])
                .sorted_by(|a, b| {
                    graph.named_type(*a).name.cmp(&graph.named_type(*b).name)
                })
                .collect()
        })
        .collect()
}

/// Collects the named types an attribute refers to without entering them.
pub(crate) fn direct_references(att: &Attribute, out: &mut Vec<NamedTypeId>) {
    match &att.data_type {
        DataType::Primitive(_) => {}
        DataType::Array(elem) => direct_references(elem, out),
        DataType::Object(fields) => {
            for field in fields.values() {
                direct_references(field, out);
            }
        }
        DataType::User(id) => out.push((*id).into()),
        DataType::Media(id) => out.push((*id).into()),
    }
}

use indexmap::IndexSet;

use super::Query;
use crate::comp::CompId;
use crate::entity::EntityState;
use crate::tag::{Key, Tag};

/// Builds a [`Query`] that requires all of a set of components and tags.
///
/// Only conjunctions can be expressed.
/// Write the predicate by hand for anything else.
#[derive(Debug, Default, Clone)]
pub struct QueryBuilder {
    keys: IndexSet<Key>,
}

impl QueryBuilder {
    /// Creates a builder that requires nothing.
    pub fn new() -> Self { Self::default() }

    /// Requires an instance registered as `K`.
    pub fn contains<K: ?Sized + 'static>(self) -> Self { self.key(Key::comp::<K>()) }

    /// Requires an instance registered under `id`.
    pub fn contains_id(self, id: CompId) -> Self { self.key(Key::Comp(id)) }

    /// Requires a tag.
    pub fn tag(self, tag: impl Into<Tag>) -> Self { self.key(Key::Tag(tag.into())) }

    /// Requires a component type or tag. Duplicates are ignored.
    pub fn key(mut self, key: Key) -> Self {
        self.keys.insert(key);
        self
    }

    /// The required keys in the order they were first added.
    pub fn keys(&self) -> impl Iterator<Item = &Key> { self.keys.iter() }

    /// The predicate that the built query uses.
    pub fn predicate(&self) -> impl Fn(&EntityState) -> bool + 'static {
        let keys: Vec<Key> = self.keys.iter().cloned().collect();
        move |state| state.has_all(&keys)
    }

    /// Creates the query.
    pub fn build(&self) -> Query { Query::new(self.predicate()) }
}

//! Queries maintain the live set of entities that satisfy a predicate.
//!
//! A query does not observe entities by itself.
//! The [`Engine`](crate::Engine) forwards every structural change of its entities
//! to each registered query, which re-tests only the affected entity.
//! Queries can also be driven manually through the `entity_*` methods.
//!
//! Each entity is either matching (a member of the result set) or not matching.
//! Membership changes are reported through
//! [`on_entity_added`](Query::on_entity_added) and [`on_entity_removed`](Query::on_entity_removed)
//! with an [`EntitySnapshot`] describing the entity before the triggering change.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::entity::{Entity, EntityId, EntitySnapshot, EntityState, Item};
use crate::signal::Signal;

mod builder;
pub use builder::QueryBuilder;

/// A handle to a live-maintained set of entities.
///
/// Clones refer to the same query.
#[derive(Clone)]
pub struct Query(Rc<Inner>);

struct Inner {
    predicate: Box<dyn Fn(&EntityState) -> bool>,
    /// Matching entities in the order they started matching.
    members:   RefCell<IndexMap<EntityId, Entity>>,
    added:     Signal<EntitySnapshot>,
    removed:   Signal<EntitySnapshot>,
    /// Reused between events; taken out while a signal is being emitted.
    snapshot:  RefCell<Option<EntitySnapshot>>,
}

static_assertions::assert_not_impl_any!(Query: Send, Sync);

impl Query {
    /// Creates a query from a predicate over the state of an entity.
    ///
    /// The predicate must be pure: it must not mutate any entity.
    pub fn new(predicate: impl Fn(&EntityState) -> bool + 'static) -> Self {
        Self(Rc::new(Inner {
            predicate: Box::new(predicate),
            members:   RefCell::default(),
            added:     Signal::new(),
            removed:   Signal::new(),
            snapshot:  RefCell::new(None),
        }))
    }

    /// Starts building a query that requires a set of components and tags.
    pub fn builder() -> QueryBuilder { QueryBuilder::new() }

    /// Tests the predicate against the current state of `entity`.
    pub fn matches(&self, entity: &Entity) -> bool { (self.0.predicate)(&entity.state()) }

    /// Emitted after an entity has started matching.
    pub fn on_entity_added(&self) -> &Signal<EntitySnapshot> { &self.0.added }

    /// Emitted after an entity has stopped matching.
    pub fn on_entity_removed(&self) -> &Signal<EntitySnapshot> { &self.0.removed }

    /// Handles an entity joining the observed population.
    pub fn entity_added(&self, entity: &Entity) {
        if !self.has(entity) && self.matches(entity) {
            self.admit(entity, None);
        }
    }

    /// Handles an entity leaving the observed population.
    pub fn entity_removed(&self, entity: &Entity) {
        if self.has(entity) {
            self.evict(entity, None);
        }
    }

    /// Handles a component or tag that was just added to `entity`.
    ///
    /// The entity may start or stop matching,
    /// since predicates are free to exclude components.
    pub fn entity_component_added(&self, entity: &Entity, item: &Item) {
        self.revalidate(entity, Some(item));
    }

    /// Handles a component or tag that was just removed from `entity`.
    pub fn entity_component_removed(&self, entity: &Entity, item: &Item) {
        self.revalidate(entity, Some(item));
    }

    /// Re-tests `entity` after its component fields were changed in place.
    pub fn validate_entity(&self, entity: &Entity) { self.revalidate(entity, None); }

    fn revalidate(&self, entity: &Entity, item: Option<&Item>) {
        match (self.has(entity), self.matches(entity)) {
            (false, true) => self.admit(entity, item),
            (true, false) => self.evict(entity, item),
            _ => {}
        }
    }

    fn admit(&self, entity: &Entity, item: Option<&Item>) {
        self.0.members.borrow_mut().insert(entity.id(), entity.clone());
        log::trace!("{} started matching a query", entity.id());
        self.emit(&self.0.added, entity, item);
    }

    fn evict(&self, entity: &Entity, item: Option<&Item>) {
        self.0.members.borrow_mut().shift_remove(&entity.id());
        log::trace!("{} stopped matching a query", entity.id());
        self.emit(&self.0.removed, entity, item);
    }

    fn emit(&self, signal: &Signal<EntitySnapshot>, entity: &Entity, item: Option<&Item>) {
        if signal.is_empty() {
            return;
        }

        // a handler may cause another emission, which then builds its own snapshot
        let reused = self.0.snapshot.borrow_mut().take();
        let mut snapshot = reused.unwrap_or_else(|| EntitySnapshot::new(entity.clone()));
        entity.take_snapshot(&mut snapshot, item);
        signal.emit(&snapshot);

        snapshot.previous.slots.clear();
        snapshot.previous.tags.clear();
        *self.0.snapshot.borrow_mut() = Some(snapshot);
    }

    /// Drops `entity` from the result set without emitting anything.
    pub(crate) fn forget(&self, entity: &Entity) {
        self.0.members.borrow_mut().shift_remove(&entity.id());
    }

    /// Drops all members without emitting anything.
    pub fn clear(&self) { self.0.members.borrow_mut().clear(); }

    /// The matching entities in the order they started matching.
    pub fn entities(&self) -> Vec<Entity> { self.0.members.borrow().values().cloned().collect() }

    /// Calls `f` with an iterator over the matching entities without cloning the list.
    ///
    /// # Panics
    /// Panics if `f` changes the membership of this query.
    pub fn with_entities<R>(&self, f: impl FnOnce(&mut dyn Iterator<Item = &Entity>) -> R) -> R {
        let members = self.0.members.borrow();
        f(&mut members.values())
    }

    /// The entity that has been matching the longest.
    pub fn first(&self) -> Option<Entity> { self.0.members.borrow().values().next().cloned() }

    /// The entity that started matching most recently.
    pub fn last(&self) -> Option<Entity> { self.0.members.borrow().values().next_back().cloned() }

    /// The number of matching entities.
    pub fn len(&self) -> usize { self.0.members.borrow().len() }

    /// Whether no entity is matching.
    pub fn is_empty(&self) -> bool { self.0.members.borrow().is_empty() }

    /// Whether `entity` is matching.
    pub fn has(&self, entity: &Entity) -> bool {
        self.0.members.borrow().contains_key(&entity.id())
    }

    /// Returns the first matching entity that satisfies `predicate`.
    ///
    /// `predicate` may mutate entities;
    /// it iterates over the members as they were when the call started.
    pub fn find(&self, mut predicate: impl FnMut(&Entity) -> bool) -> Option<Entity> {
        self.entities().into_iter().find(|entity| predicate(entity))
    }

    /// Returns all matching entities that satisfy `predicate`.
    pub fn filter(&self, mut predicate: impl FnMut(&Entity) -> bool) -> Vec<Entity> {
        self.entities().into_iter().filter(|entity| predicate(entity)).collect()
    }

    /// Counts the matching entities that satisfy `predicate`.
    pub fn count_by(&self, mut predicate: impl FnMut(&Entity) -> bool) -> usize {
        self.entities().iter().filter(|entity| predicate(entity)).count()
    }
}

impl PartialEq for Query {
    fn eq(&self, other: &Self) -> bool { Rc::ptr_eq(&self.0, &other.0) }
}

impl Eq for Query {}

impl fmt::Debug for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.members.try_borrow() {
            Ok(members) => f.debug_list().entries(members.keys()).finish(),
            Err(_) => f.write_str("[<borrowed>]"),
        }
    }
}

//! An entity is a single object that owns components and tags.
//!
//! [`Entity`] is a cheap reference-counted handle;
//! clones refer to the same entity.
//! Entities can be created and mutated without an [`Engine`](crate::Engine).
//! Once added to an engine, every change is forwarded to the engine's queries
//! through the entity's signals.
//!
//! All mutating methods take `&self`.
//! No internal borrow is held while a signal is emitted,
//! so handlers may freely mutate the entity again.

use std::any;
use std::cell::{Ref, RefCell};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use itertools::Itertools;

use crate::comp::chain::Chain;
use crate::comp::{self, AnyComp, CompId, CompRef, Component, IntoComp};
use crate::signal::Signal;
use crate::tag::{Key, Tag};

mod snapshot;
pub use snapshot::EntitySnapshot;

mod state;
pub use state::EntityState;
use state::Slot;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// The unique identifier of an entity.
///
/// Identifiers are allocated in increasing order and never reused within a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityId(u64);

impl EntityId {
    fn allocate() -> Self { Self(NEXT_ID.fetch_add(1, Ordering::Relaxed)) }

    /// The raw integer value.
    pub fn get(self) -> u64 { self.0 }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "Entity#{}", self.0) }
}

/// A component or tag that was added to or removed from an entity.
#[derive(Debug, Clone)]
pub enum Item {
    /// A component instance and the id it is registered under.
    Comp {
        /// The id the instance is registered under.
        id:    CompId,
        /// The instance.
        comp:  AnyComp,
        /// The position of the instance among all instances registered under `id`:
        /// where it was inserted, or where it was before being removed.
        index: usize,
    },
    /// A tag.
    Tag(Tag),
}

impl Item {
    /// The key this item is looked up with.
    pub fn key(&self) -> Key {
        match self {
            Self::Comp { id, .. } => Key::Comp(*id),
            Self::Tag(tag) => Key::Tag(tag.clone()),
        }
    }

    /// The component instance, if this item is a component.
    pub fn comp(&self) -> Option<&AnyComp> {
        match self {
            Self::Comp { comp, .. } => Some(comp),
            Self::Tag(_) => None,
        }
    }
}

/// The payload of [`Entity::on_component_added`] and [`Entity::on_component_removed`].
#[derive(Debug, Clone)]
pub struct Change {
    /// The entity that changed.
    pub entity: Entity,
    /// The item that was added or removed.
    pub item:   Item,
}

/// A handle to an entity.
#[derive(Clone)]
pub struct Entity(Rc<Inner>);

struct Inner {
    id:          EntityId,
    state:       RefCell<EntityState>,
    added:       Signal<Change>,
    removed:     Signal<Change>,
    invalidated: Signal<Entity>,
}

static_assertions::assert_not_impl_any!(Entity: Send, Sync);

impl Default for Entity {
    fn default() -> Self { Self::new() }
}

impl Entity {
    /// Creates an entity with no components or tags.
    pub fn new() -> Self {
        Self(Rc::new(Inner {
            id:          EntityId::allocate(),
            state:       RefCell::default(),
            added:       Signal::new(),
            removed:     Signal::new(),
            invalidated: Signal::new(),
        }))
    }

    /// The unique identifier of this entity.
    pub fn id(&self) -> EntityId { self.0.id }

    /// Borrows the current state.
    ///
    /// Do not hold the borrow while mutating the entity.
    pub fn state(&self) -> Ref<'_, EntityState> { self.0.state.borrow() }

    /// Emitted after a component or tag has been added.
    pub fn on_component_added(&self) -> &Signal<Change> { &self.0.added }

    /// Emitted after a component or tag has been removed.
    pub fn on_component_removed(&self) -> &Signal<Change> { &self.0.removed }

    /// Emitted by [`invalidate`](Self::invalidate).
    pub fn on_invalidated(&self) -> &Signal<Entity> { &self.0.invalidated }

    /// Adds a tag. Nothing happens if the tag is already present.
    pub fn add_tag(&self, tag: impl Into<Tag>) -> &Self {
        let tag = tag.into();
        if !self.0.state.borrow_mut().tags.insert(tag.clone()) {
            log::trace!("{} already has tag {tag}", self.id());
            return self;
        }
        self.emit_added(Item::Tag(tag));
        self
    }

    /// Removes a tag. Returns false if the tag was absent.
    pub fn remove_tag(&self, tag: impl Into<Tag>) -> bool {
        let tag = tag.into();
        if !self.0.state.borrow_mut().tags.remove(&tag) {
            return false;
        }
        self.emit_removed(Item::Tag(tag));
        true
    }

    /// Adds a component.
    ///
    /// If another instance of the same (non-linked) type is present,
    /// it is removed first, emitting the removal before the addition.
    /// Adding the instance that is already present does nothing.
    /// Linked components are [appended](Self::append) instead.
    pub fn add<T: IntoComp>(&self, comp: T) -> &Self { self.add_as::<T::Comp>(comp) }

    /// Adds a component registered as `K` instead of its own type.
    ///
    /// # Panics
    /// Panics if `K` is not the component type or one of its [`ANCESTORS`](Component::ANCESTORS).
    pub fn add_as<K: ?Sized + 'static>(&self, comp: impl IntoComp) -> &Self {
        self.install::<K, _>(comp.into_comp());
        self
    }

    fn install<K: ?Sized + 'static, C: Component>(&self, comp: CompRef<C>) {
        let id = comp::resolve::<K, C>();
        if C::LINKED {
            self.append_at(id, comp.erase());
        } else {
            self.replace_at(id, comp.erase());
        }
    }

    fn replace_at(&self, id: CompId, comp: AnyComp) {
        loop {
            let existing = self.slot(id);
            match existing {
                None => break,
                Some(Slot::Single(current)) if current.ptr_eq(&comp) => {
                    log::trace!("{} already has {comp:?}", self.id());
                    return;
                }
                // a removal handler may have installed something else, so check again
                Some(_) => {
                    self.remove_by_id(id);
                }
            }
        }

        self.0.state.borrow_mut().slots.insert(id, Slot::Single(comp.clone()));
        self.emit_added(Item::Comp { id, comp, index: 0 });
    }

    /// Appends a linked component after all existing instances of its type.
    ///
    /// # Panics
    /// Panics if the type is not linked,
    /// or if the instance is already in a chain (on any entity).
    pub fn append<T: IntoComp>(&self, comp: T) -> &Self { self.append_as::<T::Comp>(comp) }

    /// Appends a linked component registered as `K` instead of its own type.
    ///
    /// # Panics
    /// Panics for the same reasons as [`append`](Self::append) and [`add_as`](Self::add_as).
    pub fn append_as<K: ?Sized + 'static>(&self, comp: impl IntoComp) -> &Self {
        self.append_resolved::<K, _>(comp.into_comp());
        self
    }

    fn append_resolved<K: ?Sized + 'static, C: Component>(&self, comp: CompRef<C>) {
        assert!(
            C::LINKED,
            "{} is not a linked component and cannot be appended",
            any::type_name::<C>()
        );
        let id = comp::resolve::<K, C>();
        self.append_at(id, comp.erase());
    }

    fn append_at(&self, id: CompId, comp: AnyComp) {
        if comp.chained() {
            panic!(
                "{comp:?} is already in a chain and must be removed before it is appended again"
            );
        }

        let index = loop {
            let existing = self.slot(id);
            match existing {
                None => {
                    let chain = Chain::start(&comp);
                    self.0.state.borrow_mut().slots.insert(id, Slot::Chain(chain));
                    break 0;
                }
                Some(Slot::Chain(chain)) => break chain.push(&comp),
                // a non-linked instance registered under the same id
                Some(_) => {
                    self.remove_by_id(id);
                }
            }
        };

        self.emit_added(Item::Comp { id, comp, index });
    }

    /// Removes every instance registered as `K`.
    ///
    /// A removal is emitted for each instance in order.
    /// Returns the first removed instance, or `None` if there was none.
    pub fn remove<K: ?Sized + 'static>(&self) -> Option<AnyComp> {
        self.remove_by_id(CompId::lookup::<K>()?)
    }

    /// Removes every instance registered under `id`.
    ///
    /// Instances are removed one at a time, emitting a removal after each,
    /// so every handler sees the instances not yet removed.
    /// Removing a chain shared with other entities only removes it from this entity.
    pub fn remove_by_id(&self, id: CompId) -> Option<AnyComp> {
        let slot = self.slot(id);
        let nodes: Rc<[AnyComp]> = match slot {
            None => {
                log::trace!("{} has no component {id} to remove", self.id());
                return None;
            }
            Some(Slot::Chain(chain)) => {
                let nodes = chain.iter().collect();
                chain.release();
                nodes
            }
            Some(slot) => slot.nodes().collect(),
        };

        let mut first = None;
        let mut remaining = nodes;
        loop {
            let node = {
                let mut state = self.0.state.borrow_mut();
                let node = match remaining.first() {
                    Some(node) => node.clone(),
                    None => {
                        state.slots.remove(&id);
                        break;
                    }
                };
                remaining = remaining[1..].into();
                if remaining.is_empty() {
                    state.slots.remove(&id);
                } else {
                    state.slots.insert(id, Slot::Detached(Rc::clone(&remaining)));
                }
                node
            };
            first.get_or_insert_with(|| node.clone());
            self.emit_removed(Item::Comp { id, comp: node, index: 0 });

            // a handler may have installed something else under the same id
            match self.slot(id) {
                Some(Slot::Detached(rest)) if Rc::ptr_eq(&rest, &remaining) => {}
                _ => break,
            }
        }
        first
    }

    /// Removes only the first instance registered as `K`.
    ///
    /// For linked components, the next instance becomes the first one.
    /// For other components, this is the same as [`remove`](Self::remove).
    pub fn withdraw<K: ?Sized + 'static>(&self) -> Option<AnyComp> {
        let id = CompId::lookup::<K>()?;
        match self.slot(id)? {
            Slot::Chain(chain) => {
                let head = chain.head()?;
                self.unlink_at(id, &chain, &head);
                Some(head)
            }
            _ => self.remove_by_id(id),
        }
    }

    /// Removes one specific instance of `C`, leaving other instances in order.
    ///
    /// Returns false if the instance is not on this entity.
    pub fn pick<C: Component>(&self, comp: &CompRef<C>) -> bool { self.pick_as::<C, C>(comp) }

    /// Removes one specific instance that was registered as `K`.
    pub fn pick_as<K: ?Sized + 'static, C: Component>(&self, comp: &CompRef<C>) -> bool {
        match CompId::lookup::<K>() {
            Some(id) => self.pick_by_id(id, &comp.erase()),
            None => false,
        }
    }

    /// Removes the first instance registered as `K` whose [`Component::key`] is `key`.
    pub fn pick_by_key<K: ?Sized + 'static>(&self, key: &str) -> Option<AnyComp> {
        let id = CompId::lookup::<K>()?;
        let node = self.state().nodes_by_id(id).find(|node| node.has_key(key))?;
        self.pick_by_id(id, &node).then_some(node)
    }

    fn pick_by_id(&self, id: CompId, target: &AnyComp) -> bool {
        match self.slot(id) {
            Some(Slot::Single(comp)) if comp.ptr_eq(target) => {
                self.remove_by_id(id);
                true
            }
            Some(Slot::Chain(chain)) => self.unlink_at(id, &chain, target),
            _ => false,
        }
    }

    fn unlink_at(&self, id: CompId, chain: &Rc<Chain>, target: &AnyComp) -> bool {
        let index = match chain.unlink(target) {
            Some(index) => index,
            None => return false,
        };

        if chain.is_empty() {
            self.0.state.borrow_mut().slots.remove(&id);
            chain.release();
        }

        self.emit_removed(Item::Comp { id, comp: target.clone(), index });
        true
    }

    /// Whether there is at least one instance registered as `K`.
    pub fn has<K: ?Sized + 'static>(&self) -> bool { self.state().has::<K>() }

    /// Whether there is at least one instance registered under `id`.
    pub fn has_id(&self, id: CompId) -> bool { self.state().has_id(id) }

    /// Whether the tag is present.
    pub fn has_tag(&self, tag: impl Into<Tag>) -> bool { self.state().has_tag(tag) }

    /// Whether all of the keys are present.
    pub fn has_all(&self, keys: &[Key]) -> bool { self.state().has_all(keys) }

    /// Whether any of the keys is present.
    pub fn has_any(&self, keys: &[Key]) -> bool { self.state().has_any(keys) }

    /// Returns the first instance of `C`.
    pub fn get<C: Component>(&self) -> Option<CompRef<C>> { self.state().get::<C>() }

    /// Returns the first instance registered as `K`, whatever its concrete type.
    pub fn get_any<K: ?Sized + 'static>(&self) -> Option<AnyComp> { self.state().get_any::<K>() }

    /// Returns the first instance of `C` whose [`Component::key`] is `key`.
    pub fn get_by_key<C: Component>(&self, key: &str) -> Option<CompRef<C>> {
        self.state().get_by_key::<C>(key)
    }

    /// Returns the first instance of `C` that satisfies `predicate`.
    pub fn find<C: Component>(&self, mut predicate: impl FnMut(&C) -> bool) -> Option<CompRef<C>> {
        let nodes = self.state().nodes::<C>();
        nodes.filter_map(|node| node.downcast::<C>()).find(|comp| predicate(&comp.borrow()))
    }

    /// Calls `action` for every instance registered as `K` in order.
    ///
    /// `action` may remove the instance it is visiting,
    /// but must not remove other instances of the same type.
    pub fn iterate<K: ?Sized + 'static>(&self, mut action: impl FnMut(AnyComp)) {
        let nodes = self.state().nodes::<K>();
        for node in nodes {
            action(node);
        }
    }

    /// Calls `action` for every instance of `C` in order.
    ///
    /// The same removal rules as [`iterate`](Self::iterate) apply.
    pub fn for_each<C: Component>(&self, mut action: impl FnMut(CompRef<C>)) {
        self.iterate::<C>(|node| {
            if let Some(comp) = node.downcast::<C>() {
                action(comp);
            }
        });
    }

    /// The number of instances registered as `K`.
    pub fn len_of<K: ?Sized + 'static>(&self) -> usize { self.state().len_of::<K>() }

    /// Replaces all components and tags with a shallow copy of those of `other`.
    ///
    /// No signals are emitted. Chains of linked components are shared with `other`:
    /// instances withdrawn or appended through either entity are seen by both.
    /// Chains previously held by this entity alone are released.
    pub fn copy_from(&self, other: &Entity) {
        if Rc::ptr_eq(&self.0, &other.0) {
            return;
        }
        let mut state = self.0.state.borrow_mut();
        let other = other.0.state.borrow();
        other.hold_chains();
        state.release();
        state.copy_from(&other);
    }

    /// Removes all components and tags without emitting any signal.
    ///
    /// Chains shared with other entities are left intact for them.
    pub fn clear(&self) { self.0.state.borrow_mut().release(); }

    /// Requests queries to re-test this entity.
    ///
    /// Call this after mutating component fields that query predicates depend on.
    pub fn invalidate(&self) { self.0.invalidated.emit(self); }

    /// Creates a snapshot of this entity around `item`.
    pub fn snapshot(&self, item: Option<&Item>) -> EntitySnapshot {
        let mut snapshot = EntitySnapshot::new(self.clone());
        self.take_snapshot(&mut snapshot, item);
        snapshot
    }

    /// Fills `target` with the current entity and its state before `item` changed.
    ///
    /// If the entity currently has `item`, the previous state does not;
    /// if the entity currently lacks `item`, the previous state has it.
    /// Without `item`, the previous state is a copy of the current one.
    pub fn take_snapshot(&self, target: &mut EntitySnapshot, item: Option<&Item>) {
        let state = self.0.state.borrow();
        target.current = self.clone();
        target.previous.copy_from(&state);

        match item {
            None => {}
            Some(Item::Tag(tag)) => {
                if state.tags.contains(tag) {
                    target.previous.tags.remove(tag);
                } else {
                    target.previous.tags.insert(tag.clone());
                }
            }
            Some(Item::Comp { id, comp, index }) => {
                if state.slots.get(id).map_or(false, |slot| slot.contains(comp)) {
                    target.previous.hide(*id, comp);
                } else {
                    target.previous.reveal(*id, comp, *index);
                }
            }
        }
    }

    fn slot(&self, id: CompId) -> Option<Slot> { self.0.state.borrow().slots.get(&id).cloned() }

    fn emit_added(&self, item: Item) {
        self.0.added.emit(&Change { entity: self.clone(), item });
    }

    fn emit_removed(&self, item: Item) {
        self.0.removed.emit(&Change { entity: self.clone(), item });
    }
}

impl Drop for Inner {
    fn drop(&mut self) { self.state.get_mut().release(); }
}

impl PartialEq for Entity {
    fn eq(&self, other: &Self) -> bool { self.id() == other.id() }
}

impl Eq for Entity {}

impl Hash for Entity {
    fn hash<H: Hasher>(&self, state: &mut H) { self.id().hash(state) }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.state.try_borrow() {
            Ok(state) => write!(
                f,
                "{} {{ comps: [{}], tags: [{}] }}",
                self.id(),
                state.comp_ids().map(CompId::name).join(", "),
                state.tags().join(", "),
            ),
            Err(_) => write!(f, "{} {{ <borrowed> }}", self.id()),
        }
    }
}

#[cfg(test)]
mod tests;

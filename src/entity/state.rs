use std::collections::{HashMap, HashSet};
use std::iter;
use std::rc::Rc;

use auto_enums::auto_enum;

use crate::comp::chain::Chain;
use crate::comp::{AnyComp, CompId, CompRef, Component};
use crate::tag::{Key, Tag};

/// The storage behind one component id on an entity.
#[derive(Clone)]
pub(crate) enum Slot {
    /// A single (non-linked) instance.
    Single(AnyComp),
    /// A chain of linked instances, possibly shared with other entities.
    Chain(Rc<Chain>),
    /// A materialized list of instances.
    /// Used in snapshots where one node of a live chain has to be hidden or revealed,
    /// and transiently while [`Entity::remove`](crate::Entity::remove) empties a chain.
    Detached(Rc<[AnyComp]>),
}

impl Slot {
    /// The instances in this slot in order.
    #[auto_enum(Iterator)]
    pub(crate) fn nodes(self) -> impl Iterator<Item = AnyComp> {
        match self {
            Slot::Single(comp) => iter::once(comp),
            Slot::Chain(chain) => chain.iter(),
            Slot::Detached(nodes) => (0..nodes.len()).map(move |index| nodes[index].clone()),
        }
    }

    pub(crate) fn head(&self) -> Option<AnyComp> {
        match self {
            Slot::Single(comp) => Some(comp.clone()),
            Slot::Chain(chain) => chain.head(),
            Slot::Detached(nodes) => nodes.first().cloned(),
        }
    }

    /// Whether the slot has at least one instance.
    ///
    /// A shared chain emptied through another holder leaves an empty slot behind.
    pub(crate) fn is_present(&self) -> bool {
        match self {
            Slot::Single(_) => true,
            Slot::Chain(chain) => !chain.is_empty(),
            Slot::Detached(nodes) => !nodes.is_empty(),
        }
    }

    pub(crate) fn contains(&self, comp: &AnyComp) -> bool {
        match self {
            Slot::Single(single) => single.ptr_eq(comp),
            Slot::Chain(chain) => chain.contains(comp),
            Slot::Detached(nodes) => nodes.iter().any(|node| node.ptr_eq(comp)),
        }
    }
}

/// The components and tags of an entity at some point in time.
///
/// This is the type that query predicates inspect,
/// and the type of [`EntitySnapshot::previous`](super::EntitySnapshot::previous).
/// Chains of linked components are shared with the entity it was copied from,
/// so a copy is cheap but must not outlive the change it describes.
#[derive(Clone, Default)]
pub struct EntityState {
    pub(crate) slots: HashMap<CompId, Slot>,
    pub(crate) tags:  HashSet<Tag>,
}

impl EntityState {
    /// Whether there is at least one instance registered as `K`.
    pub fn has<K: ?Sized + 'static>(&self) -> bool {
        CompId::lookup::<K>().map_or(false, |id| self.has_id(id))
    }

    /// Whether there is at least one instance registered under `id`.
    pub fn has_id(&self, id: CompId) -> bool { self.slots.get(&id).map_or(false, Slot::is_present) }

    /// Whether the tag is present.
    pub fn has_tag(&self, tag: impl Into<Tag>) -> bool { self.tags.contains(&tag.into()) }

    /// Whether the component type or tag is present.
    pub fn has_key(&self, key: &Key) -> bool {
        match key {
            Key::Comp(id) => self.has_id(*id),
            Key::Tag(tag) => self.tags.contains(tag),
        }
    }

    /// Whether all of the keys are present.
    pub fn has_all(&self, keys: &[Key]) -> bool { keys.iter().all(|key| self.has_key(key)) }

    /// Whether any of the keys is present.
    pub fn has_any(&self, keys: &[Key]) -> bool { keys.iter().any(|key| self.has_key(key)) }

    /// Returns the first instance registered as `C`.
    ///
    /// Returns `None` if the first instance registered as `C` is actually of a different type,
    /// which can only happen through [`Entity::add_as`](crate::Entity::add_as).
    /// Use [`get_any`](Self::get_any) in that case.
    pub fn get<C: Component>(&self) -> Option<CompRef<C>> { self.get_any::<C>()?.downcast() }

    /// Returns the first instance registered as `K`.
    pub fn get_any<K: ?Sized + 'static>(&self) -> Option<AnyComp> {
        self.get_by_id(CompId::lookup::<K>()?)
    }

    /// Returns the first instance registered under `id`.
    pub fn get_by_id(&self, id: CompId) -> Option<AnyComp> { self.slots.get(&id)?.head() }

    /// Returns the first instance registered as `C` whose [`Component::key`] is `key`.
    pub fn get_by_key<C: Component>(&self, key: &str) -> Option<CompRef<C>> {
        self.nodes::<C>().find(|node| node.has_key(key))?.downcast()
    }

    /// Returns the first instance of `C` that satisfies `predicate`.
    pub fn find<C: Component>(&self, mut predicate: impl FnMut(&C) -> bool) -> Option<CompRef<C>> {
        self.nodes::<C>()
            .filter_map(|node| node.downcast::<C>())
            .find(|comp| predicate(&comp.borrow()))
    }

    /// Iterates over all instances registered as `K` in order.
    ///
    /// The iterator does not borrow the state.
    pub fn nodes<K: ?Sized + 'static>(&self) -> impl Iterator<Item = AnyComp> {
        CompId::lookup::<K>().map(|id| self.nodes_by_id(id)).into_iter().flatten()
    }

    /// Iterates over all instances registered under `id` in order.
    pub fn nodes_by_id(&self, id: CompId) -> impl Iterator<Item = AnyComp> {
        self.slots.get(&id).cloned().into_iter().flat_map(Slot::nodes)
    }

    /// The number of instances registered as `K`.
    pub fn len_of<K: ?Sized + 'static>(&self) -> usize { self.nodes::<K>().count() }

    /// The component ids present.
    pub fn comp_ids(&self) -> impl Iterator<Item = CompId> + '_ {
        self.slots.iter().filter(|(_, slot)| slot.is_present()).map(|(&id, _)| id)
    }

    /// The tags present.
    pub fn tags(&self) -> impl Iterator<Item = &Tag> { self.tags.iter() }

    /// Whether there are no components and no tags.
    pub fn is_empty(&self) -> bool { self.comp_ids().next().is_none() && self.tags.is_empty() }

    /// Replaces the contents with a shallow copy of `other`.
    ///
    /// Chains are shared rather than cloned.
    pub fn copy_from(&mut self, other: &EntityState) {
        self.slots.clear();
        self.slots.extend(other.slots.iter().map(|(&id, slot)| (id, slot.clone())));
        self.tags.clone_from(&other.tags);
    }

    /// Registers this state as a holder of all its chains.
    pub(crate) fn hold_chains(&self) {
        for slot in self.slots.values() {
            if let Slot::Chain(chain) = slot {
                chain.hold();
            }
        }
    }

    /// Removes everything, giving up the hold on all chains.
    ///
    /// Chains not held by any other entity are dismantled
    /// so that their nodes can be appended again.
    pub(crate) fn release(&mut self) {
        for (_, slot) in self.slots.drain() {
            if let Slot::Chain(chain) = slot {
                chain.release();
            }
        }
        self.tags.clear();
    }

    /// Makes `comp` absent from the slot `id` without touching shared chains.
    pub(crate) fn hide(&mut self, id: CompId, comp: &AnyComp) {
        let slot = match self.slots.remove(&id) {
            Some(slot) => slot,
            None => return,
        };
        let rest: Vec<_> = slot.nodes().filter(|node| !node.ptr_eq(comp)).collect();
        if !rest.is_empty() {
            self.slots.insert(id, Slot::Detached(rest.into()));
        }
    }

    /// Makes `comp` present at `index` in the slot `id` without touching shared chains.
    pub(crate) fn reveal(&mut self, id: CompId, comp: &AnyComp, index: usize) {
        let mut nodes: Vec<_> = match self.slots.remove(&id) {
            Some(slot) => slot.nodes().collect(),
            None => Vec::new(),
        };
        if !nodes.iter().any(|node| node.ptr_eq(comp)) {
            nodes.insert(index.min(nodes.len()), comp.clone());
        }
        self.slots.insert(id, Slot::Detached(nodes.into()));
    }
}

//! The engine owns entities, systems and queries, and keeps queries up to date.
//!
//! Every entity added to the engine is observed through its signals.
//! Each structural change is forwarded synchronously to every registered query
//! in registration order, so query membership is always consistent
//! by the time the mutating call returns.
//!
//! The engine also owns one special entity, the [shared config](Engine::shared_config),
//! which participates in queries like any other entity
//! but is never listed in [`entities`](Engine::entities) and cannot be removed.

use std::any::TypeId;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::mem;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;

use crate::entity::{Change, Entity, EntityId};
use crate::query::Query;
use crate::signal::{Signal, SlotId};
use crate::system::{System, SystemId, SystemInfo};
use crate::tracer::{self, Tracer};

mod messages;
pub use messages::Subscription;
use messages::Channel;

/// The container that coordinates entities, systems and queries.
pub struct Engine {
    inner: Rc<Inner>,
}

static_assertions::assert_not_impl_any!(Engine: Send, Sync);

struct Inner {
    entities:       RefCell<IndexMap<EntityId, Tracked>>,
    config:         Tracked,
    /// Sorted by ascending priority, stable among equal priorities.
    systems:        RefCell<Vec<Registered>>,
    next_system_id: Cell<u64>,
    /// Systems whose removal hook waits for their running update to return.
    deferred:       RefCell<Vec<Rc<RefCell<dyn System>>>>,
    queries:        RefCell<Vec<Query>>,
    entity_added:   Signal<Entity>,
    entity_removed: Signal<Entity>,
    channels:       RefCell<HashMap<TypeId, Rc<dyn Channel>>>,
}

/// An entity together with the engine's connections to its signals.
struct Tracked {
    entity:      Entity,
    added:       SlotId,
    removed:     SlotId,
    invalidated: SlotId,
}

impl Tracked {
    fn connect(engine: &Weak<Inner>, entity: &Entity) -> Self {
        let added = {
            let engine = engine.clone();
            entity.on_component_added().connect(move |change: &Change| {
                if let Some(engine) = engine.upgrade() {
                    for query in engine.query_list() {
                        query.entity_component_added(&change.entity, &change.item);
                    }
                }
            })
        };
        let removed = {
            let engine = engine.clone();
            entity.on_component_removed().connect(move |change: &Change| {
                if let Some(engine) = engine.upgrade() {
                    for query in engine.query_list() {
                        query.entity_component_removed(&change.entity, &change.item);
                    }
                }
            })
        };
        let invalidated = {
            let engine = engine.clone();
            entity.on_invalidated().connect(move |entity: &Entity| {
                if let Some(engine) = engine.upgrade() {
                    for query in engine.query_list() {
                        query.validate_entity(entity);
                    }
                }
            })
        };
        log::trace!("Connected to the signals of {}", entity.id());

        Self { entity: entity.clone(), added, removed, invalidated }
    }

    fn disconnect(&self) {
        self.entity.on_component_added().disconnect(self.added);
        self.entity.on_component_removed().disconnect(self.removed);
        self.entity.on_invalidated().disconnect(self.invalidated);
        log::trace!("Disconnected from the signals of {}", self.entity.id());
    }
}

struct Registered {
    id:       SystemId,
    priority: i32,
    name:     String,
    system:   Rc<RefCell<dyn System>>,
}

impl Inner {
    /// A copy of the query list, so that handlers may add or remove queries.
    fn query_list(&self) -> Vec<Query> { self.queries.borrow().clone() }
}

impl Drop for Inner {
    fn drop(&mut self) {
        for tracked in self.entities.get_mut().values() {
            tracked.disconnect();
        }
        self.config.disconnect();
    }
}

impl Default for Engine {
    fn default() -> Self { Self::new() }
}

impl Engine {
    /// Creates an engine with no entities, systems or queries.
    pub fn new() -> Self {
        let inner = Rc::new_cyclic(|weak| Inner {
            entities:       RefCell::default(),
            config:         Tracked::connect(weak, &Entity::new()),
            systems:        RefCell::default(),
            next_system_id: Cell::new(1),
            deferred:       RefCell::default(),
            queries:        RefCell::default(),
            entity_added:   Signal::new(),
            entity_removed: Signal::new(),
            channels:       RefCell::default(),
        });
        Self { inner }
    }

    /// The entity holding configuration shared by all systems.
    ///
    /// It is matched by queries like any other entity,
    /// but it is not part of [`entities`](Self::entities) and cannot be removed.
    pub fn shared_config(&self) -> &Entity { &self.inner.config.entity }

    /// Emitted after an entity has been added and all queries have been notified.
    pub fn on_entity_added(&self) -> &Signal<Entity> { &self.inner.entity_added }

    /// Emitted after an entity has been removed and all queries have been notified.
    pub fn on_entity_removed(&self) -> &Signal<Entity> { &self.inner.entity_removed }

    /// Adds an entity. Returns false if it was already added.
    pub fn add_entity(&self, entity: &Entity) -> bool {
        if self.has_entity(entity) || *entity == self.inner.config.entity {
            log::trace!("{} is already in the engine", entity.id());
            return false;
        }

        let tracked = Tracked::connect(&Rc::downgrade(&self.inner), entity);
        self.inner.entities.borrow_mut().insert(entity.id(), tracked);
        log::debug!("Added {}", entity.id());

        for query in self.inner.query_list() {
            query.entity_added(entity);
        }
        self.inner.entity_added.emit(entity);
        true
    }

    /// Adds every entity in `entities`. Returns the number of entities actually added.
    pub fn add_entities<'t>(&self, entities: impl IntoIterator<Item = &'t Entity>) -> usize {
        entities.into_iter().filter(|entity| self.add_entity(entity)).count()
    }

    /// Removes an entity. Returns false if it was not in the engine.
    ///
    /// The engine stops observing the entity before notifying anyone,
    /// so handlers may keep mutating it without affecting queries.
    pub fn remove_entity(&self, entity: &Entity) -> bool {
        if *entity == self.inner.config.entity {
            log::warn!("The shared config entity cannot be removed");
            return false;
        }

        let tracked = self.inner.entities.borrow_mut().shift_remove(&entity.id());
        let tracked = match tracked {
            Some(tracked) => tracked,
            None => {
                log::trace!("{} is not in the engine", entity.id());
                return false;
            }
        };
        tracked.disconnect();
        log::debug!("Removed {}", entity.id());

        for query in self.inner.query_list() {
            query.entity_removed(entity);
        }
        self.inner.entity_removed.emit(entity);
        true
    }

    /// Whether `entity` has been added.
    pub fn has_entity(&self, entity: &Entity) -> bool {
        self.inner.entities.borrow().contains_key(&entity.id())
    }

    /// Returns the added entity with the given id.
    pub fn get_entity_by_id(&self, id: EntityId) -> Option<Entity> {
        self.inner.entities.borrow().get(&id).map(|tracked| tracked.entity.clone())
    }

    /// The added entities in insertion order.
    pub fn entities(&self) -> Vec<Entity> {
        self.inner.entities.borrow().values().map(|tracked| tracked.entity.clone()).collect()
    }

    /// The number of added entities.
    pub fn entity_count(&self) -> usize { self.inner.entities.borrow().len() }

    /// Removes all entities.
    ///
    /// If `silent` is true, query membership is updated but no signal is emitted.
    pub fn remove_all_entities(&self, silent: bool) {
        if !silent {
            for entity in self.entities() {
                self.remove_entity(&entity);
            }
            return;
        }

        let drained: Vec<_> = self.inner.entities.borrow_mut().drain(..).collect();
        let queries = self.inner.query_list();
        for (_, tracked) in drained {
            tracked.disconnect();
            for query in &queries {
                query.forget(&tracked.entity);
            }
        }
        log::debug!("Removed all entities silently");
    }

    /// Adds a system with the given priority and calls [`System::on_added`].
    ///
    /// Systems run in ascending priority order.
    /// Systems with equal priority run in the order they were added.
    pub fn add_system(&self, system: impl System, priority: i32) -> SystemId {
        let id = SystemId(self.inner.next_system_id.get());
        self.inner.next_system_id.set(id.0 + 1);

        let name = system.name().to_string();
        let system: Rc<RefCell<dyn System>> = Rc::new(RefCell::new(system));
        {
            let mut systems = self.inner.systems.borrow_mut();
            let index = systems.partition_point(|registered| registered.priority <= priority);
            systems.insert(index, Registered { id, priority, name, system: Rc::clone(&system) });
        }
        log::debug!("Added {id} with priority {priority}");

        system.borrow_mut().on_added(self);
        self.flush_deferred();
        id
    }

    /// Removes a system and calls [`System::on_removed`].
    ///
    /// Returns false if there is no such system.
    /// If the system is currently running, the hook is called after its update returns.
    pub fn remove_system(&self, id: SystemId) -> bool {
        let removed = {
            let mut systems = self.inner.systems.borrow_mut();
            let index = systems.iter().position(|registered| registered.id == id);
            index.map(|index| systems.remove(index))
        };
        let removed = match removed {
            Some(removed) => removed,
            None => {
                log::trace!("{id} is not in the engine");
                return false;
            }
        };
        log::debug!("Removed {id}");

        self.notify_removed(removed.system);
        true
    }

    fn notify_removed(&self, system: Rc<RefCell<dyn System>>) {
        if let Ok(mut idle) = system.try_borrow_mut() {
            idle.on_removed(self);
            return;
        }
        self.inner.deferred.borrow_mut().push(system);
    }

    fn flush_deferred(&self) {
        let pending = mem::take(&mut *self.inner.deferred.borrow_mut());
        for system in pending {
            self.notify_removed(system);
        }
    }

    /// Whether a system with this id is registered.
    pub fn has_system(&self, id: SystemId) -> bool {
        self.inner.systems.borrow().iter().any(|registered| registered.id == id)
    }

    /// The registered systems in the order they run.
    pub fn systems(&self) -> Vec<SystemInfo> {
        self.inner
            .systems
            .borrow()
            .iter()
            .map(|registered| SystemInfo {
                id:       registered.id,
                priority: registered.priority,
                name:     registered.name.clone(),
            })
            .collect()
    }

    /// Removes all systems, calling [`System::on_removed`] on each.
    pub fn remove_all_systems(&self) {
        let drained = mem::take(&mut *self.inner.systems.borrow_mut());
        for registered in drained {
            log::debug!("Removed {}", registered.id);
            self.notify_removed(registered.system);
        }
    }

    /// Registers a query and fills it with the current entities.
    ///
    /// Returns false if the query was already registered.
    pub fn add_query(&self, query: &Query) -> bool {
        if self.inner.queries.borrow().contains(query) {
            return false;
        }
        self.inner.queries.borrow_mut().push(query.clone());
        log::debug!("Added a query");

        query.entity_added(&self.inner.config.entity);
        for entity in self.entities() {
            query.entity_added(&entity);
        }
        true
    }

    /// Unregisters a query and clears it without emitting anything.
    ///
    /// Returns false if the query was not registered.
    pub fn remove_query(&self, query: &Query) -> bool {
        let removed = {
            let mut queries = self.inner.queries.borrow_mut();
            let index = queries.iter().position(|registered| registered == query);
            index.map(|index| queries.remove(index))
        };
        match removed {
            Some(removed) => {
                removed.clear();
                log::debug!("Removed a query");
                true
            }
            None => false,
        }
    }

    /// The registered queries in registration order.
    pub fn queries(&self) -> Vec<Query> { self.inner.query_list() }

    /// Unregisters and clears all queries.
    pub fn remove_all_queries(&self) {
        let drained = mem::take(&mut *self.inner.queries.borrow_mut());
        for query in drained {
            query.clear();
        }
    }

    /// Removes all entities, systems and queries.
    ///
    /// The shared config entity is kept.
    pub fn clear(&self) {
        self.remove_all_entities(false);
        self.remove_all_systems();
        self.remove_all_queries();
    }

    /// Runs every system once in priority order.
    pub fn update(&self, dt: f64) { self.update_traced(dt, &tracer::Noop) }

    /// Runs every system once in priority order, reporting to `tracer`.
    ///
    /// Systems added during the update first run in the next update.
    /// Systems removed during the update are skipped if they have not run yet.
    pub fn update_traced(&self, dt: f64, tracer: &impl Tracer) {
        let cycle = tracer.start_cycle(dt);

        let pass: Vec<_> = self
            .inner
            .systems
            .borrow()
            .iter()
            .map(|registered| (registered.id, Rc::clone(&registered.system)))
            .collect();

        let mut ran = 0;
        for (id, system) in pass {
            if !self.has_system(id) {
                continue;
            }
            let mut system = match system.try_borrow_mut() {
                Ok(system) => system,
                Err(_) => {
                    log::warn!("{id} is already running and cannot be updated re-entrantly");
                    continue;
                }
            };

            let context = tracer.start_system(id, system.name());
            system.update(self, dt);
            tracer.end_system(context, id, system.name());
            drop(system);

            ran += 1;
            self.flush_deferred();
        }

        tracer.end_cycle(cycle, dt, ran);
    }

    /// Subscribes to messages of type `M`.
    pub fn subscribe<M: 'static>(&self, handler: impl Fn(&M) + 'static) -> Subscription {
        let channel = self.channel::<M>();
        Subscription::new::<M>(channel.connect(handler))
    }

    /// Cancels a subscription. Returns false if it was already cancelled.
    pub fn unsubscribe(&self, subscription: Subscription) -> bool {
        let channel = self.inner.channels.borrow().get(&subscription.type_id).cloned();
        channel.map_or(false, |channel| channel.disconnect(subscription.slot))
    }

    /// Delivers `message` to every subscriber of its exact type in subscription order.
    ///
    /// Returns the number of subscribers at the time of dispatch.
    pub fn dispatch<M: 'static>(&self, message: &M) -> usize {
        let channel = self.inner.channels.borrow().get(&TypeId::of::<M>()).cloned();
        match channel.and_then(messages::downcast::<M>) {
            Some(signal) => {
                let count = signal.len();
                signal.emit(message);
                count
            }
            None => {
                log::trace!("No subscribers for {}", std::any::type_name::<M>());
                0
            }
        }
    }

    fn channel<M: 'static>(&self) -> Rc<Signal<M>> {
        let existing = self.inner.channels.borrow().get(&TypeId::of::<M>()).cloned();
        if let Some(signal) = existing.and_then(messages::downcast::<M>) {
            return signal;
        }

        let signal = Rc::new(Signal::<M>::new());
        let erased: Rc<dyn Channel> = signal.clone();
        self.inner.channels.borrow_mut().insert(TypeId::of::<M>(), erased);
        signal
    }
}

//! Systems are actions performed every update to manipulate entities and components.
//!
//! Systems are owned by the [`Engine`] and run in ascending priority order.
//! A system receives the engine on every call,
//! so it can add and remove entities, queries and even systems (including itself).
//! Structural changes take effect immediately,
//! but a system added during an update only runs from the next update.

use std::any;
use std::fmt;

use crate::{Engine, Entity, Query};

/// The identifier of a system within an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SystemId(pub(crate) u64);

impl SystemId {
    /// The raw integer value.
    pub fn get(self) -> u64 { self.0 }
}

impl fmt::Display for SystemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "System#{}", self.0) }
}

/// Logic that runs once per [`Engine::update`].
pub trait System: 'static {
    /// Runs the system.
    ///
    /// `dt` is the value passed to [`Engine::update`], usually the elapsed time.
    fn update(&mut self, engine: &Engine, dt: f64);

    /// Called after the system has been added to `engine`.
    fn on_added(&mut self, _engine: &Engine) {}

    /// Called after the system has been removed from `engine`.
    ///
    /// If the system removes itself during [`update`](Self::update),
    /// this is called right after `update` returns.
    fn on_removed(&mut self, _engine: &Engine) {}

    /// A human-readable name for diagnostics.
    fn name(&self) -> &str { any::type_name::<Self>() }
}

/// A system that calls a closure once per update.
pub struct FnSystem<F> {
    name: String,
    func: F,
}

/// Creates a system from a closure.
pub fn from_fn<F: FnMut(&Engine, f64) + 'static>(name: impl Into<String>, func: F) -> FnSystem<F> {
    FnSystem { name: name.into(), func }
}

impl<F: FnMut(&Engine, f64) + 'static> System for FnSystem<F> {
    fn update(&mut self, engine: &Engine, dt: f64) { (self.func)(engine, dt) }

    fn name(&self) -> &str { &self.name }
}

/// A system that visits every entity matched by its own query.
///
/// The query is registered when the system is added to an engine
/// and unregistered when the system is removed.
/// Entities are visited in the order they started matching;
/// the visitor may freely mutate them, since the list is collected before visiting.
pub struct Iterative<F> {
    query: Query,
    visit: F,
}

impl<F: FnMut(&Engine, &Entity, f64) + 'static> Iterative<F> {
    /// Creates a system that calls `visit` for each entity matched by `query`.
    pub fn new(query: Query, visit: F) -> Self { Self { query, visit } }

    /// The query this system iterates over.
    pub fn query(&self) -> &Query { &self.query }
}

impl<F: FnMut(&Engine, &Entity, f64) + 'static> System for Iterative<F> {
    fn update(&mut self, engine: &Engine, dt: f64) {
        for entity in self.query.entities() {
            // an earlier visit may have caused this entity to stop matching
            if self.query.has(&entity) {
                (self.visit)(engine, &entity, dt);
            }
        }
    }

    fn on_added(&mut self, engine: &Engine) { engine.add_query(&self.query); }

    fn on_removed(&mut self, engine: &Engine) { engine.remove_query(&self.query); }
}

/// Describes a system registered in an engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemInfo {
    /// The identifier returned by [`Engine::add_system`].
    pub id:       SystemId,
    /// The priority the system was added with.
    pub priority: i32,
    /// The [name](System::name) of the system.
    pub name:     String,
}

//! A reactive single-threaded ECS with live queries.
//!
//! # Entities, components and tags
//! An [`Entity`] is an identity with a bag of components and tags.
//! Components are plain Rust types implementing [`Component`],
//! usually through `#[derive(Component)]`.
//! Tags are integer or string markers that carry no data.
//!
//! ```
//! use reflex::{Component, Entity};
//!
//! #[derive(Component)]
//! struct Position {
//!     x: f32,
//!     y: f32,
//! }
//!
//! let entity = Entity::new();
//! entity.add(Position { x: 1.0, y: 2.0 }).add_tag("player");
//! assert!(entity.has::<Position>());
//! assert!(entity.has_tag("player"));
//! ```
//!
//! Most component types allow one instance per entity;
//! adding another instance replaces the previous one.
//! Linked components (`#[component(linked)]`) may have any number of instances per entity,
//! kept in insertion order.
//!
//! # Queries
//! A [`Query`] is a live set of entities satisfying a predicate.
//! Queries are kept up to date by the [`Engine`],
//! which observes all its entities and forwards every change to every query.
//! Queries report membership changes with an [`EntitySnapshot`]
//! that shows the entity both before and after the change.
//!
//! ```
//! use reflex::{Component, Engine, Entity, Query};
//!
//! #[derive(Component)]
//! struct Health(u32);
//!
//! let engine = Engine::new();
//! let alive = Query::builder().contains::<Health>().build();
//! engine.add_query(&alive);
//!
//! let entity = Entity::new();
//! engine.add_entity(&entity);
//! assert!(alive.is_empty());
//!
//! entity.add(Health(10));
//! assert_eq!(alive.first(), Some(entity.clone()));
//!
//! entity.remove::<Health>();
//! assert!(alive.is_empty());
//! ```
//!
//! # Systems
//! A [`System`] runs once per [`Engine::update`], in ascending priority order.
//! Changes made by a system cascade through all queries synchronously,
//! before the next system runs.
//!
//! # Threading
//! Everything except the component id registry is single-threaded.
//! [`Entity`], [`Query`] and [`Engine`] are neither [`Send`] nor [`Sync`].

#![cfg_attr(not(debug_assertions), deny(missing_docs))]
#![cfg_attr(doc, warn(missing_docs))]

pub mod comp;
pub use comp::{AnyComp, CompId, CompRef, Component, IntoComp};
/// Derives [`Component`].
///
/// Options are passed through `#[component(...)]`:
///
/// - `linked`: multiple instances may coexist on the same entity.
/// - `extends(A, B, ...)`: instances may also be registered as `A`, `B` and so on,
///   e.g. `extends(dyn Shape)`.
/// - `key = field`: [`Component::key`] returns this field, which must implement `AsRef<str>`.
/// - `reflex_as(path)`: the path to this crate, if it is not `::reflex`.
pub use reflex_codegen::Component;

pub mod engine;
pub use engine::Engine;

pub mod entity;
pub use entity::{Entity, EntityId, EntitySnapshot, EntityState};

pub mod query;
pub use query::{Query, QueryBuilder};

pub mod signal;
pub use signal::Signal;

pub mod system;
pub use system::System;

pub mod tag;
pub use tag::{Key, Tag};

pub mod tracer;

#[cfg(test)]
pub(crate) mod test_util;

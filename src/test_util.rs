#![allow(missing_docs)]

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Once;

use crate::entity::{Change, Item};
use crate::{Component, Entity};

/// Initializes test logging once per process.
pub(crate) fn init() {
    static SET_LOGGER_ONCE: Once = Once::new();
    SET_LOGGER_ONCE.call_once(|| env_logger::builder().is_test(true).init());
}

pub(crate) const HERO: i64 = 1;

/// a plain component
#[derive(Debug, Clone, PartialEq, Component)]
#[component(reflex_as(crate))]
pub(crate) struct Position {
    pub(crate) x: f32,
    pub(crate) y: f32,
}

/// a plain component
#[derive(Debug, Clone, PartialEq, Component)]
#[component(reflex_as(crate))]
pub(crate) struct Velocity {
    pub(crate) dx: f32,
    pub(crate) dy: f32,
}

/// a linked component with a string key
#[derive(Debug, Clone, PartialEq, Component)]
#[component(reflex_as(crate), linked, key = name)]
pub(crate) struct Buff {
    pub(crate) name:  String,
    pub(crate) power: i32,
}

impl Buff {
    pub(crate) fn new(name: &str, power: i32) -> Self { Self { name: name.to_string(), power } }
}

pub(crate) trait Shape {
    fn area(&self) -> f32;
}

/// resolvable as `dyn Shape`
#[derive(Debug, Component)]
#[component(reflex_as(crate), extends(dyn Shape))]
pub(crate) struct Circle {
    pub(crate) radius: f32,
}

impl Shape for Circle {
    fn area(&self) -> f32 { std::f32::consts::PI * self.radius * self.radius }
}

/// resolvable as `dyn Shape`, linked
#[derive(Debug, Component)]
#[component(reflex_as(crate), extends(dyn Shape), linked)]
pub(crate) struct Square {
    pub(crate) side: f32,
}

impl Shape for Square {
    fn area(&self) -> f32 { self.side * self.side }
}

/// A human-readable description of an item, e.g. `Position` or `tag 1`.
pub(crate) fn label(item: &Item) -> String {
    match item {
        Item::Comp { comp, .. } => {
            comp.type_name().rsplit("::").next().unwrap_or_default().to_string()
        }
        Item::Tag(tag) => format!("tag {tag}"),
    }
}

/// Records every added/removed event of an entity as `+Label` / `-Label`.
pub(crate) fn record(entity: &Entity) -> Rc<RefCell<Vec<String>>> {
    let events = Rc::new(RefCell::new(Vec::new()));
    {
        let events = Rc::clone(&events);
        entity.on_component_added().connect(move |change: &Change| {
            events.borrow_mut().push(format!("+{}", label(&change.item)));
        });
    }
    {
        let events = Rc::clone(&events);
        entity.on_component_removed().connect(move |change: &Change| {
            events.borrow_mut().push(format!("-{}", label(&change.item)));
        });
    }
    events
}

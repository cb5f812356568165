//! A component is a small data structure that can be attached to an entity.
//!
//! Components are identified by their type.
//! Each type used as a component key is assigned a [`CompId`] on first use,
//! which is what entities and queries actually compare.
//!
//! # Instances and identity
//! A component instance lives in a shared cell, so that systems can mutate its fields
//! while the entity (and possibly snapshots of it) still refer to the same instance.
//! [`CompRef<C>`] is the typed handle and [`AnyComp`] is the type-erased handle.
//! Two handles refer to the same instance if [`ptr_eq`](AnyComp::ptr_eq) returns true;
//! this is the identity used by [`Entity::pick`](crate::Entity::pick)
//! and by the "same instance" check in [`Entity::add`](crate::Entity::add).
//!
//! # Linked components
//! There can only be one instance of an ordinary component type on each entity.
//! Types with [`Component::LINKED`] set to `true` are linked components instead:
//! every added instance is appended to an intrusive chain,
//! so an entity may carry any number of them in insertion order.
//! An instance may only be in one chain at a time.
//!
//! # Resolving as another type
//! Rust has no class hierarchy, so an instance can only be registered under
//! a different key if its type lists that key in [`Component::ANCESTORS`].
//! The key can be any `'static` type, including trait objects such as `dyn Shape`.

use std::any::{self, Any};
use std::cell::{Cell, Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;

pub(crate) mod chain;

mod registry;
pub use registry::{CompId, Registry, TypeDesc};

/// A data type that can be attached to an entity.
///
/// This trait is usually implemented with `#[derive(Component)]`.
pub trait Component: 'static {
    /// Whether multiple instances of this type can coexist on the same entity.
    const LINKED: bool = false;

    /// The types that instances of this type may be registered as,
    /// in addition to the type itself.
    const ANCESTORS: &'static [fn() -> TypeDesc] = &[];

    /// A string identifier distinguishing instances of the same type,
    /// used by [`Entity::get_by_key`](crate::Entity::get_by_key)
    /// and [`Entity::pick_by_key`](crate::Entity::pick_by_key).
    fn key(&self) -> Option<&str> { None }
}

/// Returns the id that an instance of `C` should be stored under when resolved as `K`.
///
/// # Panics
/// Panics if `K` is neither `C` nor one of its declared ancestors.
pub(crate) fn resolve<K: ?Sized + 'static, C: Component>() -> CompId {
    let target = TypeDesc::of::<K>();
    if target.id != TypeDesc::of::<C>().id
        && !C::ANCESTORS.iter().any(|ancestor| ancestor().id == target.id)
    {
        panic!(
            "{} cannot be resolved as {} because it is not declared as an ancestor",
            any::type_name::<C>(),
            target.name,
        );
    }
    CompId::of::<K>()
}

/// Converts values into component handles.
///
/// Implemented for component values (wrapped into a new instance)
/// and for existing [`CompRef`] handles (reusing the same instance).
pub trait IntoComp {
    /// The component type.
    type Comp: Component;

    /// Performs the conversion.
    fn into_comp(self) -> CompRef<Self::Comp>;
}

impl<C: Component> IntoComp for C {
    type Comp = C;

    fn into_comp(self) -> CompRef<C> { CompRef::new(self) }
}

impl<C: Component> IntoComp for CompRef<C> {
    type Comp = C;

    fn into_comp(self) -> CompRef<C> { self }
}

/// The heap cell holding one component instance.
pub(crate) struct Node<C> {
    /// The next node in the chain, if this is a linked component.
    next:    RefCell<Option<AnyComp>>,
    /// Whether this node is currently part of a chain.
    chained: Cell<bool>,
    value:   RefCell<C>,
}

/// Object-safe operations on [`Node`] used by the type-erased storage.
pub(crate) trait Erased {
    fn next(&self) -> Option<AnyComp>;
    fn set_next(&self, next: Option<AnyComp>);
    fn chained(&self) -> bool;
    fn set_chained(&self, chained: bool);
    fn linked(&self) -> bool;
    fn key_matches(&self, key: &str) -> bool;
    fn type_name(&self) -> &'static str;
    fn into_any(self: Rc<Self>) -> Rc<dyn Any>;
}

impl<C: Component> Erased for Node<C> {
    fn next(&self) -> Option<AnyComp> { self.next.borrow().clone() }

    fn set_next(&self, next: Option<AnyComp>) { *self.next.borrow_mut() = next; }

    fn chained(&self) -> bool { self.chained.get() }

    fn set_chained(&self, chained: bool) { self.chained.set(chained) }

    fn linked(&self) -> bool { C::LINKED }

    fn key_matches(&self, key: &str) -> bool { self.value.borrow().key() == Some(key) }

    fn type_name(&self) -> &'static str { any::type_name::<C>() }

    fn into_any(self: Rc<Self>) -> Rc<dyn Any> { self }
}

/// A typed handle to a component instance.
pub struct CompRef<C>(Rc<Node<C>>);

impl<C: Component> CompRef<C> {
    /// Wraps a value into a new component instance.
    pub fn new(value: C) -> Self {
        Self(Rc::new(Node {
            next:    RefCell::new(None),
            chained: Cell::new(false),
            value:   RefCell::new(value),
        }))
    }

    /// Immutably borrows the component value.
    ///
    /// # Panics
    /// Panics if the value is currently mutably borrowed.
    pub fn borrow(&self) -> Ref<'_, C> { self.0.value.borrow() }

    /// Mutably borrows the component value.
    ///
    /// Changing fields does not notify anyone;
    /// call [`Entity::invalidate`](crate::Entity::invalidate)
    /// if queries depend on the changed fields.
    ///
    /// # Panics
    /// Panics if the value is currently borrowed.
    pub fn borrow_mut(&self) -> RefMut<'_, C> { self.0.value.borrow_mut() }

    /// Converts into a type-erased handle to the same instance.
    pub fn erase(&self) -> AnyComp { AnyComp(Rc::clone(&self.0) as Rc<dyn Erased>) }

    /// Whether both handles refer to the same instance.
    pub fn ptr_eq(&self, other: &Self) -> bool { Rc::ptr_eq(&self.0, &other.0) }
}

impl<C> Clone for CompRef<C> {
    fn clone(&self) -> Self { Self(Rc::clone(&self.0)) }
}

impl<C: fmt::Debug> fmt::Debug for CompRef<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.value.try_borrow() {
            Ok(value) => f.debug_tuple("CompRef").field(&*value).finish(),
            Err(_) => f.write_str("CompRef(<borrowed>)"),
        }
    }
}

/// A type-erased handle to a component instance.
#[derive(Clone)]
pub struct AnyComp(pub(crate) Rc<dyn Erased>);

impl AnyComp {
    /// Whether both handles refer to the same instance.
    pub fn ptr_eq(&self, other: &Self) -> bool { self.addr() == other.addr() }

    /// Returns a typed handle if the instance is of type `C`.
    pub fn downcast<C: Component>(&self) -> Option<CompRef<C>> {
        Rc::clone(&self.0).into_any().downcast::<Node<C>>().ok().map(CompRef)
    }

    /// Whether the instance is of type `C`.
    pub fn is<C: Component>(&self) -> bool { self.downcast::<C>().is_some() }

    /// The name of the concrete type of the instance.
    pub fn type_name(&self) -> &'static str { self.0.type_name() }

    /// Whether the concrete type is a linked component.
    pub fn is_linked(&self) -> bool { self.0.linked() }

    /// Whether the instance returns `key` from [`Component::key`].
    pub fn has_key(&self, key: &str) -> bool { self.0.key_matches(key) }

    pub(crate) fn next(&self) -> Option<AnyComp> { self.0.next() }

    pub(crate) fn set_next(&self, next: Option<AnyComp>) { self.0.set_next(next) }

    pub(crate) fn chained(&self) -> bool { self.0.chained() }

    pub(crate) fn set_chained(&self, chained: bool) { self.0.set_chained(chained) }

    // compare data pointers only, vtable pointers are not unique
    fn addr(&self) -> *const () { Rc::as_ptr(&self.0) as *const () }
}

impl fmt::Debug for AnyComp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AnyComp({}@{:p})", self.type_name(), self.addr())
    }
}

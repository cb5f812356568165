//! Assigns dense identifiers to component types.
//!
//! Every Rust type used as a component key is mapped to a [`CompId`]
//! the first time it is registered.
//! Identifiers are never reassigned or removed,
//! which is fine because the number of distinct component types
//! is bounded by the program source rather than by runtime data.

use std::any::{self, TypeId};
use std::collections::HashMap;
use std::fmt;

use parking_lot::RwLock;

/// The smallest identifier assigned by a registry. `0` is reserved.
const FIRST_ID: u32 = 1;

/// A dense identifier for a component type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CompId(u32);

impl CompId {
    /// Returns the identifier of `T` in the global registry, assigning one if necessary.
    pub fn of<T: ?Sized + 'static>() -> Self {
        Registry::global().get_or_assign(TypeDesc::of::<T>(), true).expect("create = true")
    }

    /// Returns the identifier of `T` in the global registry if it has already been assigned.
    pub fn lookup<T: ?Sized + 'static>() -> Option<Self> {
        Registry::global().get_or_assign(TypeDesc::of::<T>(), false)
    }

    /// The raw integer value.
    pub fn get(self) -> u32 { self.0 }

    /// The name of the type this identifier was assigned to in the global registry.
    pub fn name(self) -> &'static str {
        Registry::global().name_of(self).unwrap_or("<unregistered>")
    }
}

impl fmt::Display for CompId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "#{}", self.0) }
}

/// Runtime identity of a Rust type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeDesc {
    /// The [`TypeId`] of the type.
    pub id:   TypeId,
    /// The [`type_name`](any::type_name) of the type, used in diagnostics only.
    pub name: &'static str,
}

impl TypeDesc {
    /// Describes the type `T`.
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self { id: TypeId::of::<T>(), name: any::type_name::<T>() }
    }
}

/// A side table from type identity to [`CompId`].
///
/// Most code should use the process-wide instance through [`CompId::of`].
/// Independent registries only guarantee uniqueness among their own identifiers.
#[derive(Default)]
pub struct Registry {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    ids:   HashMap<TypeId, CompId>,
    /// `names[i]` is the type assigned `CompId(FIRST_ID + i)`.
    names: Vec<&'static str>,
}

lazy_static::lazy_static! {
    static ref GLOBAL: Registry = Registry::new();
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self { Self::default() }

    /// The process-wide registry.
    pub fn global() -> &'static Self { &GLOBAL }

    /// Returns the identifier previously assigned to `ty`.
    ///
    /// If there is none, a new identifier is assigned if `create` is true;
    /// otherwise `None` is returned.
    pub fn get_or_assign(&self, ty: TypeDesc, create: bool) -> Option<CompId> {
        if let Some(&id) = self.inner.read().ids.get(&ty.id) {
            return Some(id);
        }

        if !create {
            return None;
        }

        let mut inner = self.inner.write();
        // another caller may have assigned it between the two locks
        if let Some(&id) = inner.ids.get(&ty.id) {
            return Some(id);
        }

        let offset = u32::try_from(inner.names.len()).expect("too many component types");
        let id = CompId(FIRST_ID + offset);
        inner.ids.insert(ty.id, id);
        inner.names.push(ty.name);
        log::trace!("Assigned component id {id} to {}", ty.name);
        Some(id)
    }

    /// Returns the type name registered for `id`.
    pub fn name_of(&self, id: CompId) -> Option<&'static str> {
        let index = id.0.checked_sub(FIRST_ID)?;
        self.inner.read().names.get(index as usize).copied()
    }

    /// The number of identifiers assigned so far.
    pub fn len(&self) -> usize { self.inner.read().names.len() }

    /// Whether no identifiers have been assigned yet.
    pub fn is_empty(&self) -> bool { self.len() == 0 }
}

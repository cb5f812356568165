//! Tags are zero-data markers that can be used in place of components.

use std::fmt;
use std::rc::Rc;

use crate::comp::CompId;

/// A marker attached to an entity.
///
/// A tag is its own identifier: two tags are the same if they are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Tag {
    /// An integer tag.
    Int(i64),
    /// A string tag.
    Str(Rc<str>),
}

impl From<i64> for Tag {
    fn from(value: i64) -> Self { Self::Int(value) }
}

impl From<&str> for Tag {
    fn from(value: &str) -> Self { Self::Str(Rc::from(value)) }
}

impl From<String> for Tag {
    fn from(value: String) -> Self { Self::Str(Rc::from(value)) }
}

impl From<Rc<str>> for Tag {
    fn from(value: Rc<str>) -> Self { Self::Str(value) }
}

impl From<&Tag> for Tag {
    fn from(value: &Tag) -> Self { value.clone() }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(value) => write!(f, "{value}"),
            Self::Str(value) => write!(f, "{value:?}"),
        }
    }
}

/// Either a component type or a tag, used for membership checks.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    /// A component type.
    Comp(CompId),
    /// A tag.
    Tag(Tag),
}

impl Key {
    /// The key of component type `K`.
    pub fn comp<K: ?Sized + 'static>() -> Self { Self::Comp(CompId::of::<K>()) }

    /// The key of a tag.
    pub fn tag(tag: impl Into<Tag>) -> Self { Self::Tag(tag.into()) }
}

impl From<Tag> for Key {
    fn from(tag: Tag) -> Self { Self::Tag(tag) }
}

impl From<CompId> for Key {
    fn from(id: CompId) -> Self { Self::Comp(id) }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Comp(id) => write!(f, "{}", id.name()),
            Self::Tag(tag) => write!(f, "tag {tag}"),
        }
    }
}

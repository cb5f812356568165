//! Type-keyed publish/subscribe channels between systems and the host.

use std::any::{self, Any, TypeId};
use std::rc::Rc;

use crate::signal::{Signal, SlotId};

/// A handle returned by [`Engine::subscribe`](crate::Engine::subscribe).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[must_use = "dropping a subscription does not unsubscribe, but it can no longer be cancelled"]
pub struct Subscription {
    pub(super) type_id: TypeId,
    pub(super) slot:    SlotId,
    type_name:          &'static str,
}

impl Subscription {
    pub(super) fn new<M: 'static>(slot: SlotId) -> Self {
        Self { type_id: TypeId::of::<M>(), slot, type_name: any::type_name::<M>() }
    }

    /// The name of the message type this subscription receives.
    pub fn message_type(&self) -> &'static str { self.type_name }
}

/// The type-erased view of a `Signal<M>` stored in the channel table.
pub(super) trait Channel {
    fn disconnect(&self, slot: SlotId) -> bool;

    fn into_any(self: Rc<Self>) -> Rc<dyn Any>;
}

impl<M: 'static> Channel for Signal<M> {
    fn disconnect(&self, slot: SlotId) -> bool { Signal::disconnect(self, slot) }

    fn into_any(self: Rc<Self>) -> Rc<dyn Any> { self }
}

/// Recovers the typed signal of a channel keyed by `TypeId::of::<M>()`.
pub(super) fn downcast<M: 'static>(channel: Rc<dyn Channel>) -> Option<Rc<Signal<M>>> {
    channel.into_any().downcast::<Signal<M>>().ok()
}

//! Ordered multi-subscriber broadcast channels.
//!
//! Signals dispatch synchronously in connection order.
//! Handlers may connect, disconnect or emit re-entrantly:
//! dispatch iterates a snapshot of the subscriber list,
//! but skips handlers that were disconnected before their turn.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

/// Identifies a connection to a [`Signal`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotId(u64);

type Handler<A> = Rc<dyn Fn(&A)>;

/// A broadcast channel carrying `&A` to every connected handler.
pub struct Signal<A: ?Sized> {
    handlers: RefCell<Vec<(SlotId, Handler<A>)>>,
    next_id:  Cell<u64>,
}

impl<A: ?Sized> Default for Signal<A> {
    fn default() -> Self { Self { handlers: RefCell::new(Vec::new()), next_id: Cell::new(0) } }
}

impl<A: ?Sized + 'static> Signal<A> {
    /// Creates a signal with no handlers.
    pub fn new() -> Self { Self::default() }

    /// Connects a new handler.
    pub fn connect(&self, handler: impl Fn(&A) + 'static) -> SlotId {
        self.connect_rc(Rc::new(handler))
    }

    /// Connects a shared handler.
    ///
    /// If the same handler is already connected,
    /// its existing slot is returned and nothing changes.
    pub fn connect_rc(&self, handler: Handler<A>) -> SlotId {
        let mut handlers = self.handlers.borrow_mut();
        let existing = handlers.iter().find(|(_, existing)| same_handler(existing, &handler));
        if let Some((id, _)) = existing {
            return *id;
        }

        let id = SlotId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        handlers.push((id, handler));
        id
    }

    /// Disconnects a handler. Returns false if it was not connected.
    pub fn disconnect(&self, id: SlotId) -> bool {
        let mut handlers = self.handlers.borrow_mut();
        match handlers.iter().position(|&(slot, _)| slot == id) {
            Some(index) => {
                handlers.remove(index);
                true
            }
            None => false,
        }
    }

    /// Disconnects all handlers.
    pub fn disconnect_all(&self) { self.handlers.borrow_mut().clear(); }

    /// Whether `id` is still connected.
    pub fn is_connected(&self, id: SlotId) -> bool {
        self.handlers.borrow().iter().any(|&(slot, _)| slot == id)
    }

    /// The number of connected handlers.
    pub fn len(&self) -> usize { self.handlers.borrow().len() }

    /// Whether no handlers are connected.
    pub fn is_empty(&self) -> bool { self.handlers.borrow().is_empty() }

    /// Calls every connected handler with `arg` in connection order.
    pub fn emit(&self, arg: &A) {
        let snapshot: Vec<_> = self.handlers.borrow().clone();
        for (id, handler) in snapshot {
            if self.is_connected(id) {
                handler(arg);
            }
        }
    }
}

fn same_handler<A: ?Sized>(left: &Handler<A>, right: &Handler<A>) -> bool {
    Rc::as_ptr(left) as *const () == Rc::as_ptr(right) as *const ()
}

impl<A: ?Sized> fmt::Debug for Signal<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal").field("handlers", &self.handlers.borrow().len()).finish()
    }
}

//! Intrusive singly linked chains of linked component instances.
//!
//! Each node owns the next one through its `next` link,
//! and the [`Chain`] owns the head.
//! A chain may be held by several entities at once
//! after [`Entity::copy_from`](crate::Entity::copy_from);
//! its nodes are only released when the last holder lets go.
//! Released nodes have their link cleared and their `chained` flag reset,
//! so they can be appended again later.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use super::AnyComp;

/// Iterates a chain from its head.
///
/// The successor of each node is read before the node is yielded,
/// so the consumer may unlink the node it is currently visiting.
pub(crate) struct Iter {
    cursor: Option<AnyComp>,
}

impl Iterator for Iter {
    type Item = AnyComp;

    fn next(&mut self) -> Option<AnyComp> {
        let node = self.cursor.take()?;
        self.cursor = node.next();
        Some(node)
    }
}

/// The head of a chain, shared by every entity holding it.
pub(crate) struct Chain {
    head:    RefCell<Option<AnyComp>>,
    /// The number of entities holding this chain.
    /// Snapshots refer to chains without holding them.
    holders: Cell<usize>,
}

impl Chain {
    /// Starts a new chain consisting of `node` only, held by one entity.
    pub(crate) fn start(node: &AnyComp) -> Rc<Self> {
        debug_assert!(!node.chained());
        node.set_next(None);
        node.set_chained(true);
        Rc::new(Self { head: RefCell::new(Some(node.clone())), holders: Cell::new(1) })
    }

    pub(crate) fn head(&self) -> Option<AnyComp> { self.head.borrow().clone() }

    pub(crate) fn is_empty(&self) -> bool { self.head.borrow().is_none() }

    pub(crate) fn iter(&self) -> Iter { Iter { cursor: self.head() } }

    /// Whether `node` is in this chain.
    pub(crate) fn contains(&self, node: &AnyComp) -> bool {
        self.iter().any(|item| item.ptr_eq(node))
    }

    /// Appends `node` to the tail and returns its position.
    pub(crate) fn push(&self, node: &AnyComp) -> usize {
        debug_assert!(!node.chained());
        if cfg!(all(debug_assertions, feature = "debug-checks")) {
            assert!(!self.contains(node), "{node:?} is already in the chain");
        }

        node.set_next(None);
        node.set_chained(true);

        let mut tail = match self.head() {
            Some(head) => head,
            None => {
                *self.head.borrow_mut() = Some(node.clone());
                return 0;
            }
        };
        let mut index = 1;
        while let Some(next) = tail.next() {
            tail = next;
            index += 1;
        }
        tail.set_next(Some(node.clone()));
        index
    }

    /// Unlinks `target` from this chain.
    ///
    /// Returns the position `target` had, or `None` if it is not in the chain.
    pub(crate) fn unlink(&self, target: &AnyComp) -> Option<usize> {
        let head = self.head()?;
        if head.ptr_eq(target) {
            *self.head.borrow_mut() = head.next();
            release(&head);
            return Some(0);
        }

        let mut prev = head;
        let mut index = 1;
        while let Some(current) = prev.next() {
            if current.ptr_eq(target) {
                prev.set_next(current.next());
                release(&current);
                return Some(index);
            }
            prev = current;
            index += 1;
        }

        None
    }

    /// Registers one more entity holding this chain.
    pub(crate) fn hold(&self) { self.holders.set(self.holders.get() + 1); }

    /// Unregisters one entity holding this chain.
    ///
    /// The last holder dismantles the chain, releasing all its nodes.
    pub(crate) fn release(&self) {
        let holders = self.holders.get().saturating_sub(1);
        self.holders.set(holders);
        if holders == 0 {
            let head = self.head.borrow_mut().take();
            if let Some(head) = head {
                for node in (Iter { cursor: Some(head) }).collect::<Vec<_>>() {
                    release(&node);
                }
            }
        }
    }
}

fn release(node: &AnyComp) {
    node.set_next(None);
    node.set_chained(false);
}

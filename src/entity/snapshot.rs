use super::{Entity, EntityState};

/// A two-sided view of an entity around one change.
///
/// [`current`](Self::current) is the live entity,
/// [`previous`](Self::previous) is its state immediately before the change:
/// an item that was just added is absent from it,
/// and an item that was just removed is still present in it.
///
/// Snapshots passed to query handlers are reused between events,
/// so handlers should not keep them beyond the call.
pub struct EntitySnapshot {
    pub(crate) current:  Entity,
    pub(crate) previous: EntityState,
}

impl EntitySnapshot {
    /// Creates a snapshot of `entity` with an empty previous state.
    ///
    /// Fill it with [`Entity::take_snapshot`].
    pub fn new(entity: Entity) -> Self {
        Self { current: entity, previous: EntityState::default() }
    }

    /// The live entity.
    pub fn current(&self) -> &Entity { &self.current }

    /// The state of the entity before the change.
    pub fn previous(&self) -> &EntityState { &self.previous }
}

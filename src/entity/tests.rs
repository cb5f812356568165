use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::comp::{CompId, CompRef};
use crate::entity::{Change, Item};
use crate::tag::{Key, Tag};
use crate::test_util::*;
use crate::Entity;

#[test]
fn test_add_then_get_returns_same_instance() {
    init();

    let entity = Entity::new();
    let position = CompRef::new(Position { x: 1.0, y: 2.0 });
    entity.add(position.clone());

    assert!(entity.has::<Position>());
    assert!(!entity.has::<Velocity>());
    let fetched = entity.get::<Position>().expect("position was added");
    assert!(fetched.ptr_eq(&position));
    assert_eq!(*fetched.borrow(), Position { x: 1.0, y: 2.0 });
}

#[test]
fn test_entity_ids_are_unique_and_increasing() {
    let first = Entity::new();
    let second = Entity::new();
    assert!(first.id() < second.id());
    assert_ne!(first, second);
    assert_eq!(first.clone(), first);
}

#[test]
fn test_replace_emits_removal_before_addition() {
    init();

    let entity = Entity::new();
    entity.add(Position { x: 0.0, y: 0.0 });
    let events = record(&entity);

    let replacement = CompRef::new(Position { x: 5.0, y: 5.0 });
    entity.add(replacement.clone());
    assert_eq!(*events.borrow(), vec!["-Position", "+Position"]);

    entity.add(replacement.clone());
    assert_eq!(events.borrow().len(), 2, "re-adding the same instance must not emit");
    assert!(entity.get::<Position>().expect("present").ptr_eq(&replacement));
}

#[test]
fn test_tags_are_deduplicated() {
    init();

    let entity = Entity::new();
    let events = record(&entity);

    entity.add_tag(HERO).add_tag(HERO).add_tag("enemy");
    assert!(entity.has_tag(HERO));
    assert!(entity.has_tag("enemy"));
    assert!(!entity.has_tag("1"), "string and integer tags are distinct");
    assert_eq!(*events.borrow(), vec!["+tag 1", "+tag \"enemy\""]);

    assert!(entity.remove_tag(HERO));
    assert!(!entity.remove_tag(HERO));
    assert_eq!(events.borrow().len(), 3);
    assert!(!entity.has_tag(HERO));
}

#[test]
fn test_has_all_and_has_any() {
    let entity = Entity::new();
    entity.add(Position { x: 0.0, y: 0.0 }).add_tag(HERO);

    let position = Key::comp::<Position>();
    let velocity = Key::comp::<Velocity>();
    let hero = Key::tag(HERO);

    assert!(entity.has_all(&[position.clone(), hero.clone()]));
    assert!(!entity.has_all(&[position.clone(), velocity.clone()]));
    assert!(entity.has_any(&[velocity.clone(), hero]));
    assert!(!entity.has_any(&[velocity]));
    assert!(entity.has_all(&[]));
}

#[test]
fn test_remove_absent_component() {
    let entity = Entity::new();
    let events = record(&entity);

    assert!(entity.remove::<Position>().is_none());
    assert!(entity.withdraw::<Buff>().is_none());
    assert!(events.borrow().is_empty());
}

#[test]
fn test_remove_returns_instance() {
    let entity = Entity::new();
    let position = CompRef::new(Position { x: 3.0, y: 4.0 });
    entity.add(position.clone());
    let events = record(&entity);

    let removed = entity.remove::<Position>().expect("position was present");
    assert!(removed.downcast::<Position>().expect("is a Position").ptr_eq(&position));
    assert!(!entity.has::<Position>());
    assert_eq!(*events.borrow(), vec!["-Position"]);
}

#[test]
fn test_linked_append_iterate_withdraw() {
    init();

    let entity = Entity::new();
    let events = record(&entity);
    for (name, power) in [("haste", 1), ("shield", 2), ("regen", 3)] {
        entity.add(Buff::new(name, power));
    }

    assert_eq!(entity.len_of::<Buff>(), 3);
    assert_eq!(events.borrow().len(), 3, "every append emits");

    let mut names = Vec::new();
    entity.for_each::<Buff>(|buff| names.push(buff.borrow().name.clone()));
    assert_eq!(names, vec!["haste", "shield", "regen"]);

    let mut withdrawn = Vec::new();
    for _ in 0..3 {
        let buff = entity.withdraw::<Buff>().expect("chain is not empty");
        withdrawn.push(buff.downcast::<Buff>().expect("is a Buff").borrow().name.clone());
    }
    assert_eq!(withdrawn, vec!["haste", "shield", "regen"]);
    assert!(!entity.has::<Buff>());
    assert_eq!(entity.len_of::<Buff>(), 0);
    assert!(entity.withdraw::<Buff>().is_none());
}

#[test]
fn test_remove_linked_removes_whole_chain() {
    let entity = Entity::new();
    let first = CompRef::new(Buff::new("a", 1));
    entity.append(first.clone()).append(Buff::new("b", 2));
    let events = record(&entity);

    let removed = entity.remove::<Buff>().expect("chain was present");
    assert!(removed.downcast::<Buff>().expect("is a Buff").ptr_eq(&first));
    assert_eq!(*events.borrow(), vec!["-Buff", "-Buff"]);
    assert!(!entity.has::<Buff>());

    // released nodes can be appended again
    let other = Entity::new();
    other.append(first);
    assert_eq!(other.len_of::<Buff>(), 1);
}

#[test]
#[should_panic(expected = "already in a chain")]
fn test_append_same_instance_twice_panics() {
    let entity = Entity::new();
    let buff = CompRef::new(Buff::new("haste", 1));
    entity.append(buff.clone());
    entity.append(buff);
}

#[test]
#[should_panic(expected = "already in a chain")]
fn test_append_instance_chained_elsewhere_panics() {
    let buff = CompRef::new(Buff::new("haste", 1));
    let owner = Entity::new();
    owner.append(buff.clone());
    Entity::new().append(buff);
}

#[test]
#[should_panic(expected = "is not a linked component")]
fn test_append_plain_component_panics() {
    Entity::new().append(Position { x: 0.0, y: 0.0 });
}

#[test]
fn test_pick_keeps_order_of_other_instances() {
    let entity = Entity::new();
    let buffs: Vec<_> =
        ["a", "b", "c", "d"].iter().map(|name| CompRef::new(Buff::new(name, 0))).collect();
    for buff in &buffs {
        entity.append(buff.clone());
    }
    let events = record(&entity);

    assert!(entity.pick(&buffs[2]));
    assert!(!entity.pick(&buffs[2]), "already picked");
    assert!(entity.pick(&buffs[0]));
    assert_eq!(events.borrow().len(), 2);

    let mut names = Vec::new();
    entity.for_each::<Buff>(|buff| names.push(buff.borrow().name.clone()));
    assert_eq!(names, vec!["b", "d"]);
    assert!(entity.get::<Buff>().expect("head").ptr_eq(&buffs[1]));
}

#[test]
fn test_pick_single_component() {
    let entity = Entity::new();
    let position = CompRef::new(Position { x: 0.0, y: 0.0 });
    entity.add(position.clone());

    assert!(!entity.pick(&CompRef::new(Position { x: 0.0, y: 0.0 })), "different instance");
    assert!(entity.has::<Position>());
    assert!(entity.pick(&position));
    assert!(!entity.has::<Position>());
}

#[test]
fn test_get_and_pick_by_key() {
    let entity = Entity::new();
    entity.append(Buff::new("haste", 1)).append(Buff::new("shield", 2));

    let shield = entity.get_by_key::<Buff>("shield").expect("shield is present");
    assert_eq!(shield.borrow().power, 2);
    assert!(entity.get_by_key::<Buff>("regen").is_none());

    let picked = entity.pick_by_key::<Buff>("haste").expect("haste is present");
    assert!(picked.has_key("haste"));
    assert_eq!(entity.len_of::<Buff>(), 1);
    assert!(entity.pick_by_key::<Buff>("haste").is_none());
}

#[test]
fn test_find() {
    let entity = Entity::new();
    entity.append(Buff::new("haste", 1)).append(Buff::new("shield", 5));
    entity.add(Position { x: 2.0, y: 0.0 });

    let strong = entity.find::<Buff>(|buff| buff.power > 3).expect("shield matches");
    assert_eq!(strong.borrow().name, "shield");
    assert!(entity.find::<Buff>(|buff| buff.power > 10).is_none());
    assert!(entity.find::<Position>(|position| position.x == 2.0).is_some());
}

#[test]
fn test_iterate_may_remove_current_node() {
    let entity = Entity::new();
    for power in 0..5 {
        entity.append(Buff::new("buff", power));
    }

    let mut visited = Vec::new();
    entity.for_each::<Buff>(|buff| {
        let power = buff.borrow().power;
        visited.push(power);
        if power % 2 == 0 {
            assert!(entity.pick(&buff));
        }
    });

    assert_eq!(visited, vec![0, 1, 2, 3, 4]);
    let mut remaining = Vec::new();
    entity.for_each::<Buff>(|buff| remaining.push(buff.borrow().power));
    assert_eq!(remaining, vec![1, 3]);
}

#[test]
fn test_iterate_plain_component_visits_once() {
    let entity = Entity::new();
    entity.add(Position { x: 0.0, y: 0.0 });

    let mut count = 0;
    entity.iterate::<Position>(|_| count += 1);
    assert_eq!(count, 1);
    assert_eq!(entity.len_of::<Position>(), 1);
    assert_eq!(entity.len_of::<Velocity>(), 0);
}

#[test]
fn test_add_as_ancestor() {
    init();

    let entity = Entity::new();
    entity.add_as::<dyn Shape>(Circle { radius: 1.0 });

    assert!(entity.has::<dyn Shape>());
    assert!(!entity.has::<Circle>());
    assert!(entity.get::<Circle>().is_none(), "registered as dyn Shape, not as Circle");
    let shape = entity.get_any::<dyn Shape>().expect("registered as dyn Shape");
    assert!(shape.is::<Circle>());

    // a different shape replaces it because the slot is shared
    entity.add_as::<dyn Shape>(Circle { radius: 2.0 });
    assert_eq!(entity.len_of::<dyn Shape>(), 1);
    let circle = entity.get_any::<dyn Shape>().and_then(|comp| comp.downcast::<Circle>());
    assert_eq!(circle.expect("still a circle").borrow().radius, 2.0);
}

#[test]
fn test_append_as_ancestor() {
    let entity = Entity::new();
    let square = CompRef::new(Square { side: 2.0 });
    entity.append_as::<dyn Shape>(square.clone()).append_as::<dyn Shape>(Square { side: 3.0 });

    assert_eq!(entity.len_of::<dyn Shape>(), 2);
    assert!(entity.pick_as::<dyn Shape, _>(&square));
    assert_eq!(entity.len_of::<dyn Shape>(), 1);
}

#[test]
#[should_panic(expected = "cannot be resolved as")]
fn test_add_as_non_ancestor_panics() {
    Entity::new().add_as::<Velocity>(Position { x: 0.0, y: 0.0 });
}

#[test]
fn test_clear_is_silent() {
    let entity = Entity::new();
    let buff = CompRef::new(Buff::new("haste", 1));
    entity.add(Position { x: 0.0, y: 0.0 }).append(buff.clone()).add_tag(HERO);
    let events = record(&entity);

    entity.clear();
    assert!(events.borrow().is_empty());
    assert!(entity.state().is_empty());

    // chained nodes are released
    Entity::new().append(buff);
}

#[test]
fn test_copy_from_shares_chains() {
    let source = Entity::new();
    source.add(Position { x: 1.0, y: 1.0 }).append(Buff::new("a", 1)).add_tag(HERO);

    let copy = Entity::new();
    copy.add(Velocity { dx: 0.0, dy: 0.0 });
    copy.copy_from(&source);

    assert!(copy.has::<Position>());
    assert!(!copy.has::<Velocity>());
    assert!(copy.has_tag(HERO));
    let position = source.get::<Position>().expect("present");
    assert!(copy.get::<Position>().expect("copied").ptr_eq(&position));

    // the chain is shared, so appending on the source is visible through the copy
    source.append(Buff::new("b", 2));
    assert_eq!(copy.len_of::<Buff>(), 2);

    // and so is withdrawing through the copy
    copy.withdraw::<Buff>();
    assert_eq!(source.get::<Buff>().expect("b is left").borrow().name, "b");
}

#[test]
fn test_clear_keeps_chain_shared_with_other_entity() {
    let source = Entity::new();
    source.append(Buff::new("a", 1)).append(Buff::new("b", 2));

    let copy = Entity::new();
    copy.copy_from(&source);
    copy.clear();

    assert!(!copy.has::<Buff>());
    assert_eq!(source.len_of::<Buff>(), 2);

    // the last holder releases the nodes
    let first = source.get::<Buff>().expect("a is left");
    source.clear();
    Entity::new().append(first);
}

#[test]
fn test_copy_from_releases_replaced_chain() {
    let target = Entity::new();
    let buff = CompRef::new(Buff::new("haste", 1));
    target.append(buff.clone());

    target.copy_from(&Entity::new());
    assert!(!target.has::<Buff>());

    let other = Entity::new();
    other.append(buff);
    assert_eq!(other.len_of::<Buff>(), 1);
}

#[test]
fn test_remove_on_shared_chain_only_detaches_this_entity() {
    let source = Entity::new();
    source.append(Buff::new("a", 1)).append(Buff::new("b", 2));

    let copy = Entity::new();
    copy.copy_from(&source);
    let events = record(&copy);

    copy.remove::<Buff>();
    assert_eq!(*events.borrow(), vec!["-Buff", "-Buff"]);
    assert!(!copy.has::<Buff>());
    assert_eq!(source.len_of::<Buff>(), 2);
}

#[test]
fn test_dropped_entity_releases_chains() {
    let buff = CompRef::new(Buff::new("haste", 1));
    {
        let entity = Entity::new();
        entity.append(buff.clone());
    }
    Entity::new().append(buff);
}

#[test]
fn test_invalidate_emits_entity() {
    let entity = Entity::new();
    let count = Rc::new(Cell::new(0));
    {
        let count = Rc::clone(&count);
        let id = entity.id();
        entity.on_invalidated().connect(move |invalidated: &Entity| {
            assert_eq!(invalidated.id(), id);
            count.set(count.get() + 1);
        });
    }

    entity.invalidate();
    assert_eq!(count.get(), 1);
}

#[test]
fn test_snapshot_of_added_component() {
    let entity = Entity::new();
    entity.add(Velocity { dx: 0.0, dy: 0.0 });
    let position = CompRef::new(Position { x: 0.0, y: 0.0 });
    entity.add(position.clone());

    let item = Item::Comp { id: CompId::of::<Position>(), comp: position.erase(), index: 0 };
    let snapshot = entity.snapshot(Some(&item));

    assert_eq!(snapshot.current(), &entity);
    assert!(snapshot.current().has::<Position>());
    assert!(!snapshot.previous().has::<Position>());
    assert!(snapshot.previous().has::<Velocity>());
}

#[test]
fn test_snapshot_of_removed_component() {
    let entity = Entity::new();
    entity.add(Position { x: 0.0, y: 0.0 });
    let removed = entity.remove::<Position>().expect("present");

    let item = Item::Comp { id: CompId::of::<Position>(), comp: removed.clone(), index: 0 };
    let snapshot = entity.snapshot(Some(&item));

    assert!(!snapshot.current().has::<Position>());
    assert!(snapshot.previous().has::<Position>());
    assert!(snapshot.previous().get_any::<Position>().expect("revealed").ptr_eq(&removed));
}

#[test]
fn test_snapshot_of_tags() {
    let entity = Entity::new();
    entity.add_tag(HERO);

    let added = entity.snapshot(Some(&Item::Tag(Tag::from(HERO))));
    assert!(!added.previous().has_tag(HERO));

    entity.remove_tag(HERO);
    let removed = entity.snapshot(Some(&Item::Tag(Tag::from(HERO))));
    assert!(removed.previous().has_tag(HERO));
    assert!(!removed.current().has_tag(HERO));
}

#[test]
fn test_snapshot_of_linked_does_not_touch_live_chain() {
    let entity = Entity::new();
    let first = CompRef::new(Buff::new("a", 1));
    let second = CompRef::new(Buff::new("b", 2));
    entity.append(first.clone()).append(second.clone());

    let item = Item::Comp { id: CompId::of::<Buff>(), comp: second.erase(), index: 1 };
    let mut snapshot = entity.snapshot(Some(&item));
    assert_eq!(snapshot.previous().len_of::<Buff>(), 1);
    assert!(snapshot.previous().get_by_key::<Buff>("b").is_none());
    assert_eq!(entity.len_of::<Buff>(), 2);

    // reusing the snapshot for a removal reveals the picked node
    entity.pick(&first);
    let item = Item::Comp { id: CompId::of::<Buff>(), comp: first.erase(), index: 0 };
    entity.take_snapshot(&mut snapshot, Some(&item));
    assert_eq!(snapshot.previous().len_of::<Buff>(), 2);
    assert_eq!(entity.len_of::<Buff>(), 1);
}

/// Records the keys of the `Buff` instances in the previous state of each removal.
fn record_previous_buffs(entity: &Entity) -> Rc<RefCell<Vec<Vec<String>>>> {
    let previous = Rc::new(RefCell::new(Vec::new()));
    {
        let previous = Rc::clone(&previous);
        entity.on_component_removed().connect(move |change: &Change| {
            let snapshot = change.entity.snapshot(Some(&change.item));
            let keys = snapshot
                .previous()
                .nodes::<Buff>()
                .map(|node| {
                    let buff = node.downcast::<Buff>().expect("is a Buff");
                    let name = buff.borrow().name.clone();
                    name
                })
                .collect();
            previous.borrow_mut().push(keys);
        });
    }
    previous
}

#[test]
fn test_snapshot_keeps_position_of_withdrawn_node() {
    let entity = Entity::new();
    entity.append(Buff::new("a", 1)).append(Buff::new("b", 2));
    let previous = record_previous_buffs(&entity);

    let withdrawn = entity.withdraw::<Buff>().expect("a is first");
    assert!(withdrawn.has_key("a"));
    assert_eq!(*previous.borrow(), vec![vec!["a", "b"]]);

    let change = Item::Comp { id: CompId::of::<Buff>(), comp: withdrawn.clone(), index: 0 };
    let snapshot = entity.snapshot(Some(&change));
    let head = snapshot.previous().get::<Buff>().expect("revealed");
    assert!(head.erase().ptr_eq(&withdrawn));
}

#[test]
fn test_snapshot_keeps_position_of_picked_node() {
    let entity = Entity::new();
    let middle = CompRef::new(Buff::new("b", 2));
    entity.append(Buff::new("a", 1)).append(middle.clone()).append(Buff::new("c", 3));
    let previous = record_previous_buffs(&entity);

    assert!(entity.pick(&middle));
    assert_eq!(*previous.borrow(), vec![vec!["a", "b", "c"]]);
}

#[test]
fn test_remove_linked_shows_remaining_nodes_to_each_handler() {
    let entity = Entity::new();
    entity.append(Buff::new("a", 1)).append(Buff::new("b", 2)).append(Buff::new("c", 3));
    let previous = record_previous_buffs(&entity);
    let live = Rc::new(RefCell::new(Vec::new()));
    {
        let live = Rc::clone(&live);
        entity.on_component_removed().connect(move |change: &Change| {
            live.borrow_mut().push(change.entity.len_of::<Buff>());
        });
    }

    entity.remove::<Buff>();
    assert_eq!(*previous.borrow(), vec![vec!["a", "b", "c"], vec!["b", "c"], vec!["c"]]);
    assert_eq!(*live.borrow(), vec![2, 1, 0]);
}

//! End-to-end scenarios against a fake host, covering the reconciler's
//! contract: exact mutation counts for text sync, keyed reorder/insertion,
//! the prefix/suffix append shortcut, and dynamic-shape attribute diffing.

mod support;

use std::collections::HashMap;
use std::rc::{Rc, Weak};

use frame_vdom_core::{sync, ContainerManagerDescriptor, Owner, VNode, VNodeFlags};

use support::{ElementId, FakeHost, Mutation};

fn owner(host: &Rc<FakeHost>) -> Owner<FakeHost> {
    Owner {
        host: host.clone(),
        scheduler: Weak::new(),
    }
}

fn keyed_child(key: &str) -> frame_vdom_core::VNodeRef<FakeHost> {
    let node = VNode::<FakeHost>::new_element("li", VNodeFlags::empty());
    node.borrow_mut().key = Some(key.into());
    node
}

#[test]
fn text_sync_produces_a_single_set_text_mutation() {
    let host = Rc::new(FakeHost::new());
    let owner = owner(&host);

    let a = VNode::<FakeHost>::new_text("a");
    VNode::create(&a, &owner, 0);
    VNode::render(&a, &owner, 0);
    host.drain_mutations();

    let b = VNode::<FakeHost>::new_text("b");
    sync(&a, &b, &owner, 0);

    let mutations = host.drain_mutations();
    assert_eq!(mutations.len(), 1);
    assert!(matches!(&mutations[0], Mutation::SetText(_, value) if value == "b"));
}

#[test]
fn keyed_reorder_moves_only_the_two_displaced_entries() {
    let host = Rc::new(FakeHost::new());
    let owner = owner(&host);

    let old_keys = ["a", "b", "c", "d", "e"];
    let old_children: Vec<_> = old_keys.iter().map(|k| keyed_child(k)).collect();

    let old_parent = VNode::<FakeHost>::new_element(
        "ul",
        VNodeFlags::TRACK_BY_KEY_CHILDREN | VNodeFlags::MANAGED_CONTAINER,
    );
    old_parent.borrow_mut().children = frame_vdom_core::ChildrenData::Nodes(old_children.clone());

    VNode::create(&old_parent, &owner, 0);
    VNode::render(&old_parent, &owner, 0);
    host.drain_mutations();

    let id_to_key: Rc<std::cell::RefCell<HashMap<ElementId, String>>> =
        Rc::new(std::cell::RefCell::new(HashMap::new()));
    for (key, node) in old_keys.iter().zip(old_children.iter()) {
        let id = node.borrow().host_ref.clone().unwrap();
        id_to_key.borrow_mut().insert(id, key.to_string());
    }

    let moves: Rc<std::cell::RefCell<Vec<String>>> = Rc::new(std::cell::RefCell::new(Vec::new()));
    let moves_for_hook = moves.clone();
    let id_to_key_for_hook = id_to_key.clone();
    let cm = ContainerManagerDescriptor::new().with_move(move |_host, _parent, node_el, _reference| {
        let key = id_to_key_for_hook
            .borrow()
            .get(node_el)
            .cloned()
            .unwrap_or_else(|| "?".to_string());
        moves_for_hook.borrow_mut().push(key);
    });

    let new_order = ["c", "a", "b", "e", "d"];
    let new_children: Vec<_> = new_order.iter().map(|k| keyed_child(k)).collect();
    let new_parent = VNode::<FakeHost>::new_element(
        "ul",
        VNodeFlags::TRACK_BY_KEY_CHILDREN | VNodeFlags::MANAGED_CONTAINER,
    );
    new_parent.borrow_mut().container_manager = Some(Rc::new(cm));
    new_parent.borrow_mut().children = frame_vdom_core::ChildrenData::Nodes(new_children);

    sync(&old_parent, &new_parent, &owner, 0);

    let recorded = moves.borrow().clone();
    assert_eq!(recorded.len(), 2, "expected exactly two moves, got {:?}", recorded);
    assert!(recorded.contains(&"c".to_string()));
    assert!(recorded.contains(&"d".to_string()));

    let mutations = host.drain_mutations();
    assert!(
        mutations.iter().all(|m| !matches!(m, Mutation::CreateElement(_, _))),
        "no new elements should have been created: {:?}",
        mutations
    );
}

#[test]
fn insertion_into_keyed_list_creates_and_inserts_without_moving() {
    let host = Rc::new(FakeHost::new());
    let owner = owner(&host);

    let old_children = vec![keyed_child("a"), keyed_child("c")];
    let old_parent = VNode::<FakeHost>::new_element(
        "ul",
        VNodeFlags::TRACK_BY_KEY_CHILDREN | VNodeFlags::MANAGED_CONTAINER,
    );
    old_parent.borrow_mut().children = frame_vdom_core::ChildrenData::Nodes(old_children);
    VNode::create(&old_parent, &owner, 0);
    VNode::render(&old_parent, &owner, 0);
    host.drain_mutations();

    let moves: Rc<std::cell::RefCell<u32>> = Rc::new(std::cell::RefCell::new(0));
    let moves_for_hook = moves.clone();
    let cm = ContainerManagerDescriptor::new().with_move(move |_h, _p, _n, _r| {
        *moves_for_hook.borrow_mut() += 1;
    });

    let new_children = vec![keyed_child("a"), keyed_child("b"), keyed_child("c")];
    let new_parent = VNode::<FakeHost>::new_element(
        "ul",
        VNodeFlags::TRACK_BY_KEY_CHILDREN | VNodeFlags::MANAGED_CONTAINER,
    );
    new_parent.borrow_mut().container_manager = Some(Rc::new(cm));
    new_parent.borrow_mut().children = frame_vdom_core::ChildrenData::Nodes(new_children);

    sync(&old_parent, &new_parent, &owner, 0);

    assert_eq!(*moves.borrow(), 0, "no entry should have been moved");

    let mutations = host.drain_mutations();
    let creates = mutations
        .iter()
        .filter(|m| matches!(m, Mutation::CreateElement(_, tag) if tag == "li"))
        .count();
    assert_eq!(creates, 1, "exactly one new <li> should have been created");
}

#[test]
fn prefix_suffix_shortcut_appends_without_revisiting_matched_entries() {
    let host = Rc::new(FakeHost::new());
    let owner = owner(&host);

    let make = |n: usize| -> Vec<_> {
        (0..n)
            .map(|_| VNode::<FakeHost>::new_element("li", VNodeFlags::empty()))
            .collect::<Vec<_>>()
    };

    let old_parent = VNode::<FakeHost>::new_element("ul", VNodeFlags::empty());
    old_parent.borrow_mut().children = frame_vdom_core::ChildrenData::Nodes(make(5));
    VNode::create(&old_parent, &owner, 0);
    VNode::render(&old_parent, &owner, 0);
    host.drain_mutations();

    let new_parent = VNode::<FakeHost>::new_element("ul", VNodeFlags::empty());
    new_parent.borrow_mut().children = frame_vdom_core::ChildrenData::Nodes(make(6));

    sync(&old_parent, &new_parent, &owner, 0);

    let mutations = host.drain_mutations();
    let creates = mutations.iter().filter(|m| matches!(m, Mutation::CreateElement(_, _))).count();
    let inserts = mutations.iter().filter(|m| matches!(m, Mutation::InsertBefore(_, _, _))).count();
    assert_eq!(creates, 1, "only the appended node should be created: {:?}", mutations);
    assert_eq!(inserts, 1, "exactly one insert for the appended node: {:?}", mutations);
}

#[test]
fn dynamic_shape_attrs_diff_touches_only_changed_keys() {
    let host = Rc::new(FakeHost::new());
    let owner = owner(&host);

    let a = VNode::<FakeHost>::new_element("div", VNodeFlags::DYNAMIC_SHAPE_ATTRS);
    a.borrow_mut().attrs.insert("id".into(), "x".to_string());
    a.borrow_mut().attrs.insert("class".into(), "y".to_string());
    VNode::create(&a, &owner, 0);
    VNode::render(&a, &owner, 0);
    host.drain_mutations();

    let b = VNode::<FakeHost>::new_element("div", VNodeFlags::DYNAMIC_SHAPE_ATTRS);
    b.borrow_mut().attrs.insert("id".into(), "x".to_string());
    b.borrow_mut().attrs.insert("role".into(), "r".to_string());

    sync(&a, &b, &owner, 0);

    let mutations = host.drain_mutations();
    assert!(
        mutations
            .iter()
            .any(|m| matches!(m, Mutation::SetAttribute(_, k, v) if k == "role" && v == "r"))
    );
    assert!(mutations.iter().any(|m| matches!(m, Mutation::RemoveAttribute(_, k) if k == "class")));
    assert!(
        !mutations.iter().any(|m| match m {
            Mutation::SetAttribute(_, k, _) | Mutation::RemoveAttribute(_, k) => k == "id",
            _ => false,
        }),
        "id must not be touched: {:?}",
        mutations
    );
    assert_eq!(mutations.len(), 2);
}

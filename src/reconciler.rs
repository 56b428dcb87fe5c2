//! Pure function over two sync-compatible virtual nodes producing host
//! mutations. Holds the attribute/property sync functions and the two
//! children-diff algorithms — naive prefix/suffix and track-by-key + LIS.

use std::collections::HashSet;

use fxhash::FxHashMap;

use crate::component::Component;
use crate::flags::VNodeFlags;
use crate::host::{write_attribute, Host};
use crate::vnode::{Key, Owner, VNode, VNodeKind, VNodeRef};

/// Reconciles `a` into `b`: `b` inherits `a`'s host element (and, for
/// component nodes, its live `Component` instance) and becomes the subtree's
/// new canonical description; `a` is left for the caller to drop.
pub fn sync<H: Host>(a: &VNodeRef<H>, b: &VNodeRef<H>, owner: &Owner<H>, depth: u32) {
    crate::precondition!(
        VNode::is_sync_compatible(&a.borrow(), &b.borrow()),
        "sync() called on a pair of VNodes that are not sync-compatible"
    );

    let host_ref = a.borrow().host_ref.clone();
    b.borrow_mut().host_ref = host_ref;

    let kind = a.borrow().kind;
    match kind {
        VNodeKind::Text => sync_text(a, b, owner),
        VNodeKind::Element | VNodeKind::Root => sync_element(a, b, owner, depth),
        VNodeKind::Component => sync_component(a, b, owner),
    }
}

fn sync_text<H: Host>(a: &VNodeRef<H>, b: &VNodeRef<H>, owner: &Owner<H>) {
    let old_text = a.borrow().children.as_text().map(str::to_string);
    let new_text = b.borrow().children.as_text().map(str::to_string);
    if old_text != new_text {
        let el = b.borrow().host_ref.clone().unwrap();
        owner.host.set_text(&el, new_text.as_deref().unwrap_or(""));
    }
}

fn sync_element<H: Host>(a: &VNodeRef<H>, b: &VNodeRef<H>, owner: &Owner<H>, depth: u32) {
    sync_props(a, b, owner);
    sync_attrs(a, b, owner);
    sync_style(a, b, owner);
    sync_class_name(a, b, owner);

    let has_input_flags = b
        .borrow()
        .flags
        .intersects(VNodeFlags::TEXT_INPUT_ELEMENT | VNodeFlags::CHECKED_INPUT_ELEMENT);
    if has_input_flags {
        sync_input_value(a, b, owner);
    } else {
        sync_children(a, b, owner, depth);
    }
}

fn sync_component<H: Host>(a: &VNodeRef<H>, b: &VNodeRef<H>, owner: &Owner<H>) {
    let component = a.borrow().component.clone();
    b.borrow_mut().component = component.clone();

    sync_class_name(a, b, owner);

    if let Some(component) = component {
        if let Some(new_props) = b.borrow_mut().component_props.take() {
            Component::set_props(&component, new_props);
        }
    }
}

/// Static-shape: key sets of `a`/`b` are assumed identical; debug builds
/// verify that. Dynamic-shape: walks both maps, writing or removing as
/// needed. Shared by `sync_props`/`sync_attrs` via the two small wrappers
/// below — property writes go through `Host::set_property`, attribute writes
/// through the namespace-aware `write_attribute`.
fn sync_props<H: Host>(a: &VNodeRef<H>, b: &VNodeRef<H>, owner: &Owner<H>) {
    let el = b.borrow().host_ref.clone().unwrap();
    let dynamic = b.borrow().flags.contains(VNodeFlags::DYNAMIC_SHAPE_PROPS);
    let a_ref = a.borrow();
    let b_ref = b.borrow();

    if dynamic {
        for (k, old_v) in a_ref.props.iter() {
            match b_ref.props.get(k) {
                Some(new_v) if new_v != old_v => owner.host.set_property(&el, k, new_v),
                Some(_) => {}
                None => owner.host.set_property(&el, k, &crate::host::PropValue::Null),
            }
        }
        for (k, new_v) in b_ref.props.iter() {
            if !a_ref.props.contains_key(k) {
                owner.host.set_property(&el, k, new_v);
            }
        }
    } else {
        debug_assert!(
            a_ref.props.len() == b_ref.props.len() && a_ref.props.keys().all(|k| b_ref.props.contains_key(k)),
            "static-shape props key set changed between syncs"
        );
        for (k, old_v) in a_ref.props.iter() {
            if let Some(new_v) = b_ref.props.get(k) {
                if new_v != old_v {
                    owner.host.set_property(&el, k, new_v);
                }
            }
        }
    }
}

fn sync_attrs<H: Host>(a: &VNodeRef<H>, b: &VNodeRef<H>, owner: &Owner<H>) {
    let el = b.borrow().host_ref.clone().unwrap();
    let dynamic = b.borrow().flags.contains(VNodeFlags::DYNAMIC_SHAPE_ATTRS);
    let a_ref = a.borrow();
    let b_ref = b.borrow();

    if dynamic {
        for (k, old_v) in a_ref.attrs.iter() {
            match b_ref.attrs.get(k) {
                Some(new_v) if new_v != old_v => {
                    VNode::<H>::check_attribute_key(k);
                    write_attribute(&*owner.host, &el, k, new_v);
                }
                Some(_) => {}
                None => owner.host.remove_attribute(&el, k),
            }
        }
        for (k, new_v) in b_ref.attrs.iter() {
            if !a_ref.attrs.contains_key(k) {
                VNode::<H>::check_attribute_key(k);
                write_attribute(&*owner.host, &el, k, new_v);
            }
        }
    } else {
        debug_assert!(
            a_ref.attrs.len() == b_ref.attrs.len() && a_ref.attrs.keys().all(|k| b_ref.attrs.contains_key(k)),
            "static-shape attrs key set changed between syncs"
        );
        for (k, old_v) in a_ref.attrs.iter() {
            if let Some(new_v) = b_ref.attrs.get(k) {
                if new_v != old_v {
                    VNode::<H>::check_attribute_key(k);
                    write_attribute(&*owner.host, &el, k, new_v);
                }
            }
        }
    }
}

fn sync_style<H: Host>(a: &VNodeRef<H>, b: &VNodeRef<H>, owner: &Owner<H>) {
    let old = a.borrow().style.clone();
    let new = b.borrow().style.clone();
    if old != new {
        let el = b.borrow().host_ref.clone().unwrap();
        owner.host.set_style_text(&el, new.as_deref().unwrap_or(""));
    }
}

fn sync_class_name<H: Host>(a: &VNodeRef<H>, b: &VNodeRef<H>, owner: &Owner<H>) {
    let old = a.borrow().class_name.clone();
    let new = b.borrow().class_name.clone();
    if old == new {
        return;
    }
    let el = match b.borrow().host_ref.clone() {
        Some(el) => el,
        None => return,
    };
    let svg = b.borrow().flags.contains(VNodeFlags::SVG);
    let value = new.as_deref().unwrap_or("");
    if svg {
        owner.host.set_class_attribute(&el, value);
    } else {
        owner.host.set_class_name(&el, value);
    }
}

fn sync_input_value<H: Host>(a: &VNodeRef<H>, b: &VNodeRef<H>, owner: &Owner<H>) {
    let el = b.borrow().host_ref.clone().unwrap();
    if b.borrow().flags.contains(VNodeFlags::CHECKED_INPUT_ELEMENT) {
        let old = a.borrow().children.as_checked();
        let new = b.borrow().children.as_checked();
        if old != new {
            if let Some(checked) = new {
                owner.host.set_input_checked(&el, checked);
            }
        }
    } else {
        let old = a.borrow().children.as_text().map(str::to_string);
        let new = b.borrow().children.as_text().map(str::to_string);
        if old != new {
            if let Some(text) = &new {
                owner.host.set_input_value(&el, text);
            }
        }
    }
}

fn sync_children<H: Host>(a: &VNodeRef<H>, b: &VNodeRef<H>, owner: &Owner<H>, depth: u32) {
    let parent = b.borrow().host_ref.clone().unwrap();

    let a_text = a.borrow().children.as_text().map(str::to_string);
    let a_nodes = a.borrow().children.as_nodes().map(<[_]>::to_vec);
    let b_text = b.borrow().children.as_text().map(str::to_string);
    let b_nodes = b.borrow().children.as_nodes().map(<[_]>::to_vec);

    match (a_text, a_nodes, b_text, b_nodes) {
        (Some(_), None, None, None) => owner.host.set_text(&parent, ""),
        (Some(old), None, Some(new), None) => {
            if old != new {
                owner.host.set_text(&parent, &new);
            }
        }
        (Some(_), None, None, Some(new_nodes)) => {
            owner.host.set_text(&parent, "");
            mount_new_children(&parent, &new_nodes, owner, depth);
        }
        (None, Some(old_nodes), Some(new), None) => {
            for child in &old_nodes {
                VNode::dispose(child);
            }
            owner.host.set_text(&parent, &new);
        }
        (None, None, None, Some(new_nodes)) => {
            mount_new_children(&parent, &new_nodes, owner, depth);
        }
        (None, Some(old_nodes), None, None) => {
            for child in &old_nodes {
                remove_child(b, &parent, child, owner);
                VNode::dispose(child);
            }
        }
        (None, None, None, None) => {}
        (None, Some(old_nodes), None, Some(new_nodes)) => {
            if old_nodes.len() == 1 && new_nodes.len() == 1 {
                sync_or_replace(b, &parent, &old_nodes[0], &new_nodes[0], owner, depth);
            } else if b.borrow().flags.contains(VNodeFlags::TRACK_BY_KEY_CHILDREN) {
                keyed_children_diff(b, &parent, &old_nodes, &new_nodes, owner, depth);
            } else {
                naive_children_diff(b, &parent, &old_nodes, &new_nodes, owner, depth);
            }
        }
        _ => unreachable!("children shape combination not covered by the diff dispatch"),
    }
}

fn mount_new_children<H: Host>(parent: &H::Element, nodes: &[VNodeRef<H>], owner: &Owner<H>, depth: u32) {
    for node in nodes {
        VNode::create(node, owner, depth + 1);
        VNode::render(node, owner, depth + 1);
        let el = node.borrow().host_ref.clone().unwrap();
        owner.host.append_child(parent, &el);
    }
}

fn sync_or_replace<H: Host>(
    parent_vnode: &VNodeRef<H>,
    parent_el: &H::Element,
    old: &VNodeRef<H>,
    new: &VNodeRef<H>,
    owner: &Owner<H>,
    depth: u32,
) {
    let compatible = VNode::is_sync_compatible(&old.borrow(), &new.borrow());
    if compatible {
        sync(old, new, owner, depth + 1);
    } else {
        VNode::create(new, owner, depth + 1);
        VNode::render(new, owner, depth + 1);
        let old_el = old.borrow().host_ref.clone().unwrap();
        replace_child(parent_vnode, parent_el, new, &old_el, owner);
        VNode::dispose(old);
    }
}

fn insert_child<H: Host>(
    parent_vnode: &VNodeRef<H>,
    parent_el: &H::Element,
    node: &VNodeRef<H>,
    reference: Option<&H::Element>,
    owner: &Owner<H>,
) {
    if parent_vnode.borrow().flags.contains(VNodeFlags::MANAGED_CONTAINER) {
        let cm = parent_vnode.borrow().container_manager.clone();
        if let Some(hook) = cm.as_ref().and_then(|cm| cm.insert_child.as_ref()) {
            hook(&owner.host, parent_el, node, reference);
            return;
        }
    }
    let el = node.borrow().host_ref.clone().unwrap();
    owner.host.insert_before(parent_el, &el, reference);
}

fn replace_child<H: Host>(
    parent_vnode: &VNodeRef<H>,
    parent_el: &H::Element,
    new_node: &VNodeRef<H>,
    old_el: &H::Element,
    owner: &Owner<H>,
) {
    if parent_vnode.borrow().flags.contains(VNodeFlags::MANAGED_CONTAINER) {
        let cm = parent_vnode.borrow().container_manager.clone();
        if let Some(hook) = cm.as_ref().and_then(|cm| cm.replace_child.as_ref()) {
            hook(&owner.host, parent_el, new_node, old_el);
            return;
        }
    }
    let new_el = new_node.borrow().host_ref.clone().unwrap();
    owner.host.replace_child(parent_el, &new_el, old_el);
}

fn move_child<H: Host>(
    parent_vnode: &VNodeRef<H>,
    parent_el: &H::Element,
    node_el: &H::Element,
    reference: Option<&H::Element>,
    owner: &Owner<H>,
) {
    if parent_vnode.borrow().flags.contains(VNodeFlags::MANAGED_CONTAINER) {
        let cm = parent_vnode.borrow().container_manager.clone();
        if let Some(hook) = cm.as_ref().and_then(|cm| cm.move_child.as_ref()) {
            hook(&owner.host, parent_el, node_el, reference);
            return;
        }
    }
    owner.host.insert_before(parent_el, node_el, reference);
}

fn remove_child<H: Host>(parent_vnode: &VNodeRef<H>, parent_el: &H::Element, node: &VNodeRef<H>, owner: &Owner<H>) {
    let el = node.borrow().host_ref.clone().unwrap();
    if parent_vnode.borrow().flags.contains(VNodeFlags::MANAGED_CONTAINER) {
        let cm = parent_vnode.borrow().container_manager.clone();
        if let Some(hook) = cm.as_ref().and_then(|cm| cm.remove_child.as_ref()) {
            hook(&owner.host, parent_el, &el);
            return;
        }
    }
    owner.host.remove_child(parent_el, &el);
}

/// Common prefix/suffix of sync-compatible runs, replace-or-sync in the
/// middle, append/remove any length difference.
fn naive_children_diff<H: Host>(
    parent_vnode: &VNodeRef<H>,
    parent_el: &H::Element,
    old: &[VNodeRef<H>],
    new: &[VNodeRef<H>],
    owner: &Owner<H>,
    depth: u32,
) {
    let old_len = old.len();
    let new_len = new.len();

    let mut start = 0;
    while start < old_len
        && start < new_len
        && VNode::is_sync_compatible(&old[start].borrow(), &new[start].borrow())
    {
        sync(&old[start], &new[start], owner, depth + 1);
        start += 1;
    }

    let mut old_end = old_len;
    let mut new_end = new_len;
    while old_end > start
        && new_end > start
        && VNode::is_sync_compatible(&old[old_end - 1].borrow(), &new[new_end - 1].borrow())
    {
        old_end -= 1;
        new_end -= 1;
        sync(&old[old_end], &new[new_end], owner, depth + 1);
    }

    if old_len == new_len && start < old_end {
        let disable_warn = parent_vnode
            .borrow()
            .flags
            .contains(VNodeFlags::DISABLE_CHILDREN_SHAPE_WARN);
        if !disable_warn {
            log::warn!(
                "{}",
                crate::error::CoreError::children_shape(
                    "equal-length children lists diverge outside the matched prefix/suffix; consider track-by-key"
                )
            );
        }
    }

    let next_ref = if new_end < new_len {
        new[new_end].borrow().host_ref.clone()
    } else {
        None
    };

    let mut i = start;
    let mut j = start;
    while i < old_end && j < new_end {
        if VNode::is_sync_compatible(&old[i].borrow(), &new[j].borrow()) {
            sync(&old[i], &new[j], owner, depth + 1);
        } else {
            VNode::create(&new[j], owner, depth + 1);
            VNode::render(&new[j], owner, depth + 1);
            let old_el = old[i].borrow().host_ref.clone().unwrap();
            replace_child(parent_vnode, parent_el, &new[j], &old_el, owner);
            VNode::dispose(&old[i]);
        }
        i += 1;
        j += 1;
    }

    while j < new_end {
        VNode::create(&new[j], owner, depth + 1);
        VNode::render(&new[j], owner, depth + 1);
        insert_child(parent_vnode, parent_el, &new[j], next_ref.as_ref(), owner);
        j += 1;
    }

    while i < old_end {
        remove_child(parent_vnode, parent_el, &old[i], owner);
        VNode::dispose(&old[i]);
        i += 1;
    }
}

/// Track-by-key diff: prefix/suffix + rotation shortcut, then an index-build
/// phase mapping surviving new positions back to old positions (`-1` for
/// insertions), then a right-to-left placement phase driven by the Longest
/// Increasing Subsequence of that mapping.
fn keyed_children_diff<H: Host>(
    parent_vnode: &VNodeRef<H>,
    parent_el: &H::Element,
    old: &[VNodeRef<H>],
    new: &[VNodeRef<H>],
    owner: &Owner<H>,
    depth: u32,
) {
    crate::precondition!(
        old.iter().all(|n| n.borrow().key.is_some()) && new.iter().all(|n| n.borrow().key.is_some()),
        "track-by-key children must all carry a key"
    );

    let mut old_start = 0usize;
    let mut old_end = old.len();
    let mut new_start = 0usize;
    let mut new_end = new.len();

    loop {
        if old_start >= old_end || new_start >= new_end {
            break;
        }
        let old_start_key = old[old_start].borrow().key.clone();
        let new_start_key = new[new_start].borrow().key.clone();
        if old_start_key == new_start_key {
            sync(&old[old_start], &new[new_start], owner, depth + 1);
            old_start += 1;
            new_start += 1;
            continue;
        }

        let old_end_key = old[old_end - 1].borrow().key.clone();
        let new_end_key = new[new_end - 1].borrow().key.clone();
        if old_end_key == new_end_key {
            sync(&old[old_end - 1], &new[new_end - 1], owner, depth + 1);
            old_end -= 1;
            new_end -= 1;
            continue;
        }

        if old_start_key == new_end_key {
            sync(&old[old_start], &new[new_end - 1], owner, depth + 1);
            let el = new[new_end - 1].borrow().host_ref.clone().unwrap();
            let reference = if new_end < new.len() {
                new[new_end].borrow().host_ref.clone()
            } else {
                None
            };
            move_child(parent_vnode, parent_el, &el, reference.as_ref(), owner);
            old_start += 1;
            new_end -= 1;
            continue;
        }

        if old_end_key == new_start_key {
            sync(&old[old_end - 1], &new[new_start], owner, depth + 1);
            let el = new[new_start].borrow().host_ref.clone().unwrap();
            let reference = old[old_start].borrow().host_ref.clone();
            move_child(parent_vnode, parent_el, &el, reference.as_ref(), owner);
            old_end -= 1;
            new_start += 1;
            continue;
        }

        break;
    }

    if old_start >= old_end {
        let reference = if new_end < new.len() {
            new[new_end].borrow().host_ref.clone()
        } else {
            None
        };
        for j in new_start..new_end {
            VNode::create(&new[j], owner, depth + 1);
            VNode::render(&new[j], owner, depth + 1);
            insert_child(parent_vnode, parent_el, &new[j], reference.as_ref(), owner);
        }
        return;
    }
    if new_start >= new_end {
        for old_node in old.iter().take(old_end).skip(old_start) {
            remove_child(parent_vnode, parent_el, old_node, owner);
            VNode::dispose(old_node);
        }
        return;
    }

    let old_mid = &old[old_start..old_end];
    let new_mid = &new[new_start..new_end];
    let old_len = old_mid.len();
    let new_len = new_mid.len();

    let mut sources = vec![-1i32; new_len];
    let mut moved = false;
    let mut last_placed: i32 = -1;

    if new_len <= 4 || old_len * new_len <= 16 {
        let mut matched_new = vec![false; new_len];
        for (old_pos, old_node) in old_mid.iter().enumerate() {
            let key = old_node.borrow().key.clone();
            let mut found = None;
            for (new_pos, flag) in matched_new.iter_mut().enumerate() {
                if !*flag && new_mid[new_pos].borrow().key == key {
                    *flag = true;
                    found = Some(new_pos);
                    break;
                }
            }
            match found {
                Some(new_pos) => {
                    sources[new_pos] = old_pos as i32;
                    sync(old_node, &new_mid[new_pos], owner, depth + 1);
                    if (new_pos as i32) < last_placed {
                        moved = true;
                    }
                    last_placed = new_pos as i32;
                }
                None => {
                    remove_child(parent_vnode, parent_el, old_node, owner);
                    VNode::dispose(old_node);
                }
            }
        }
    } else {
        let mut index: FxHashMap<Key, usize> = FxHashMap::default();
        index.reserve(new_len);
        for (new_pos, node) in new_mid.iter().enumerate() {
            if let Some(key) = node.borrow().key.clone() {
                index.insert(key, new_pos);
            }
        }
        for (old_pos, old_node) in old_mid.iter().enumerate() {
            let key = old_node.borrow().key.clone();
            let found = key.and_then(|k| index.get(&k).copied());
            match found {
                Some(new_pos) => {
                    sources[new_pos] = old_pos as i32;
                    sync(old_node, &new_mid[new_pos], owner, depth + 1);
                    if (new_pos as i32) < last_placed {
                        moved = true;
                    }
                    last_placed = new_pos as i32;
                }
                None => {
                    remove_child(parent_vnode, parent_el, old_node, owner);
                    VNode::dispose(old_node);
                }
            }
        }
    }

    let matched = sources.iter().filter(|&&s| s != -1).count();
    let removed = old_len - matched;

    let trailing_ref = if new_end < new.len() {
        new[new_end].borrow().host_ref.clone()
    } else {
        None
    };

    if moved {
        let lis_positions = lis_positions(&sources);
        let mut next_ref = trailing_ref;
        for pos in (0..new_len).rev() {
            let node = &new_mid[pos];
            if sources[pos] == -1 {
                VNode::create(node, owner, depth + 1);
                VNode::render(node, owner, depth + 1);
                insert_child(parent_vnode, parent_el, node, next_ref.as_ref(), owner);
            } else if !lis_positions.contains(&pos) {
                let el = node.borrow().host_ref.clone().unwrap();
                move_child(parent_vnode, parent_el, &el, next_ref.as_ref(), owner);
            }
            next_ref = node.borrow().host_ref.clone();
        }
    } else if old_len - removed != new_len {
        let mut next_ref = trailing_ref;
        for pos in (0..new_len).rev() {
            let node = &new_mid[pos];
            if sources[pos] == -1 {
                VNode::create(node, owner, depth + 1);
                VNode::render(node, owner, depth + 1);
                insert_child(parent_vnode, parent_el, node, next_ref.as_ref(), owner);
            }
            next_ref = node.borrow().host_ref.clone();
        }
    }
}

/// Longest Increasing Subsequence over `sources`, ignoring `-1` (insertion)
/// sentinels. Returns the set of positions in `sources` that do not need to
/// move.
fn lis_positions(sources: &[i32]) -> HashSet<usize> {
    let filtered: Vec<(usize, i32)> = sources
        .iter()
        .enumerate()
        .filter(|&(_, &v)| v != -1)
        .map(|(i, &v)| (i, v))
        .collect();
    let values: Vec<i32> = filtered.iter().map(|&(_, v)| v).collect();
    let lis_indices = longest_increasing_subsequence::lis(&values);
    lis_indices.into_iter().map(|idx| filtered[idx].0).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lis_positions_skips_insertions_and_finds_maximum_run() {
        // old [a,b,c,d,e] -> new [c,a,b,e,d]; sources = [2,0,1,4,3]
        let sources = [2, 0, 1, 4, 3];
        let positions = lis_positions(&sources);
        // one maximum increasing run of length 3: values 0,1,4 at positions 1,2,3
        assert_eq!(positions.len(), 3);
        assert!(positions.contains(&1));
        assert!(positions.contains(&2));
        assert!(positions.contains(&3));
    }

    #[test]
    fn lis_positions_handles_all_insertions() {
        let sources = [-1, -1, -1];
        assert!(lis_positions(&sources).is_empty());
    }
}

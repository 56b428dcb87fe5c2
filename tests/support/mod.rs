//! Fake `Host` + drivers shared across the integration tests: a minimal
//! in-memory tree plus a flat mutation log the tests assert against, rather
//! than a real renderer.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use frame_vdom_core::{FrameTickSource, Host, MacrotaskDriver, MicrotaskDriver, PropValue};

pub type ElementId = usize;

#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    CreateElement(ElementId, String),
    CreateElementNs(ElementId, String, String),
    CreateTextNode(ElementId, String),
    CreateCommentNode(ElementId),
    AppendChild(ElementId, ElementId),
    InsertBefore(ElementId, ElementId, Option<ElementId>),
    RemoveChild(ElementId, ElementId),
    ReplaceChild(ElementId, ElementId, ElementId),
    SetAttribute(ElementId, String, String),
    SetAttributeNs(ElementId, String, String, String),
    RemoveAttribute(ElementId, String),
    SetProperty(ElementId, String, String),
    SetStyleText(ElementId, String),
    SetClassName(ElementId, String),
    SetClassAttribute(ElementId, String),
    SetInputValue(ElementId, String),
    SetInputChecked(ElementId, bool),
    Focus(ElementId),
    SetText(ElementId, String),
}

#[derive(Default)]
struct NodeRecord {
    children: Vec<ElementId>,
}

pub struct FakeHost {
    next_id: Cell<ElementId>,
    nodes: RefCell<HashMap<ElementId, NodeRecord>>,
    mutations: RefCell<Vec<Mutation>>,
}

impl FakeHost {
    pub fn new() -> Self {
        FakeHost {
            next_id: Cell::new(0),
            nodes: RefCell::new(HashMap::new()),
            mutations: RefCell::new(Vec::new()),
        }
    }

    fn alloc(&self) -> ElementId {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.nodes.borrow_mut().insert(id, NodeRecord::default());
        id
    }

    fn log(&self, m: Mutation) {
        self.mutations.borrow_mut().push(m);
    }

    /// Returns and clears the mutation log, so each test phase only sees the
    /// mutations it triggered.
    pub fn drain_mutations(&self) -> Vec<Mutation> {
        std::mem::take(&mut self.mutations.borrow_mut())
    }

    pub fn mutations(&self) -> Vec<Mutation> {
        self.mutations.borrow().clone()
    }
}

impl Host for FakeHost {
    type Element = ElementId;

    fn create_element(&self, tag: &str) -> ElementId {
        let id = self.alloc();
        self.log(Mutation::CreateElement(id, tag.to_string()));
        id
    }

    fn create_element_ns(&self, namespace: &str, tag: &str) -> ElementId {
        let id = self.alloc();
        self.log(Mutation::CreateElementNs(id, namespace.to_string(), tag.to_string()));
        id
    }

    fn create_text_node(&self, value: &str) -> ElementId {
        let id = self.alloc();
        self.log(Mutation::CreateTextNode(id, value.to_string()));
        id
    }

    fn create_comment_node(&self) -> ElementId {
        let id = self.alloc();
        self.log(Mutation::CreateCommentNode(id));
        id
    }

    fn append_child(&self, parent: &ElementId, child: &ElementId) {
        self.nodes.borrow_mut().get_mut(parent).unwrap().children.push(*child);
        self.log(Mutation::AppendChild(*parent, *child));
    }

    fn insert_before(&self, parent: &ElementId, node: &ElementId, reference: Option<&ElementId>) {
        let mut nodes = self.nodes.borrow_mut();
        let rec = nodes.get_mut(parent).unwrap();
        let pos = match reference {
            Some(r) => rec.children.iter().position(|c| c == r).unwrap_or(rec.children.len()),
            None => rec.children.len(),
        };
        rec.children.insert(pos, *node);
        drop(nodes);
        self.log(Mutation::InsertBefore(*parent, *node, reference.copied()));
    }

    fn remove_child(&self, parent: &ElementId, child: &ElementId) {
        self.nodes.borrow_mut().get_mut(parent).unwrap().children.retain(|c| c != child);
        self.log(Mutation::RemoveChild(*parent, *child));
    }

    fn replace_child(&self, parent: &ElementId, new_node: &ElementId, old_node: &ElementId) {
        let mut nodes = self.nodes.borrow_mut();
        let rec = nodes.get_mut(parent).unwrap();
        if let Some(pos) = rec.children.iter().position(|c| c == old_node) {
            rec.children[pos] = *new_node;
        }
        drop(nodes);
        self.log(Mutation::ReplaceChild(*parent, *new_node, *old_node));
    }

    fn first_child(&self, node: &ElementId) -> Option<ElementId> {
        self.nodes.borrow().get(node).and_then(|r| r.children.first().copied())
    }

    fn next_sibling(&self, node: &ElementId) -> Option<ElementId> {
        let nodes = self.nodes.borrow();
        for rec in nodes.values() {
            if let Some(pos) = rec.children.iter().position(|c| c == node) {
                return rec.children.get(pos + 1).copied();
            }
        }
        None
    }

    fn set_attribute(&self, el: &ElementId, key: &str, value: &str) {
        self.log(Mutation::SetAttribute(*el, key.to_string(), value.to_string()));
    }

    fn set_attribute_ns(&self, el: &ElementId, namespace: &str, key: &str, value: &str) {
        self.log(Mutation::SetAttributeNs(
            *el,
            namespace.to_string(),
            key.to_string(),
            value.to_string(),
        ));
    }

    fn remove_attribute(&self, el: &ElementId, key: &str) {
        self.log(Mutation::RemoveAttribute(*el, key.to_string()));
    }

    fn set_property(&self, el: &ElementId, key: &str, value: &PropValue) {
        self.log(Mutation::SetProperty(*el, key.to_string(), format!("{:?}", value)));
    }

    fn set_style_text(&self, el: &ElementId, css: &str) {
        self.log(Mutation::SetStyleText(*el, css.to_string()));
    }

    fn set_class_name(&self, el: &ElementId, class: &str) {
        self.log(Mutation::SetClassName(*el, class.to_string()));
    }

    fn set_class_attribute(&self, el: &ElementId, class: &str) {
        self.log(Mutation::SetClassAttribute(*el, class.to_string()));
    }

    fn input_value(&self, _el: &ElementId) -> String {
        String::new()
    }

    fn set_input_value(&self, el: &ElementId, value: &str) {
        self.log(Mutation::SetInputValue(*el, value.to_string()));
    }

    fn input_checked(&self, _el: &ElementId) -> bool {
        false
    }

    fn set_input_checked(&self, el: &ElementId, checked: bool) {
        self.log(Mutation::SetInputChecked(*el, checked));
    }

    fn focus(&self, el: &ElementId) {
        self.log(Mutation::Focus(*el));
    }

    fn set_text(&self, node: &ElementId, value: &str) {
        self.log(Mutation::SetText(*node, value.to_string()));
    }
}

/// A `FrameTickSource` the test drives explicitly instead of a real
/// animation-frame loop.
#[derive(Default)]
pub struct ManualTickSource {
    pending: RefCell<Option<Box<dyn FnOnce(f64)>>>,
}

impl ManualTickSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fire(&self, timestamp: f64) {
        let cb = self.pending.borrow_mut().take();
        if let Some(cb) = cb {
            cb(timestamp);
        }
    }
}

impl FrameTickSource for ManualTickSource {
    fn request_tick(&self, callback: Box<dyn FnOnce(f64)>) {
        *self.pending.borrow_mut() = Some(callback);
    }
}

/// A microtask/macrotask driver that runs its callback immediately — fine
/// for these tests since none of them depend on a real deferred boundary.
#[derive(Default)]
pub struct ImmediateDriver;

impl ImmediateDriver {
    pub fn new() -> Self {
        ImmediateDriver
    }
}

impl MicrotaskDriver for ImmediateDriver {
    fn schedule(&self, callback: Box<dyn FnOnce()>) {
        callback();
    }
}

impl MacrotaskDriver for ImmediateDriver {
    fn schedule(&self, callback: Box<dyn FnOnce()>) {
        callback();
    }
}

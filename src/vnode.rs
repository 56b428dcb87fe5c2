//! `VNode`: a data-carrying descriptor for one tree position, plus the
//! per-node lifecycle operations that delegate mutations to the
//! [`crate::reconciler`].

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;

use crate::component::{Component, ComponentDescriptor};
use crate::container_manager::ContainerManagerDescriptor;
use crate::flags::VNodeFlags;
use crate::host::{classify_attribute_key, AttributeNamespace, Host, PropValue, SVG_NAMESPACE};
use crate::scheduler::Scheduler;

/// Shared context threaded through every lifecycle operation: the host
/// backend and a (possibly absent, e.g. in unit tests) handle back to the
/// scheduler that owns the clock and task queues.
pub struct Owner<H: Host> {
    pub host: Rc<H>,
    pub scheduler: Weak<RefCell<Scheduler<H>>>,
}

impl<H: Host> Clone for Owner<H> {
    fn clone(&self) -> Self {
        Owner {
            host: self.host.clone(),
            scheduler: self.scheduler.clone(),
        }
    }
}

pub type VNodeRef<H> = Rc<RefCell<VNode<H>>>;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum VNodeKind {
    Text,
    Element,
    Component,
    /// A component's own subtree anchor; same-shape rules as `Element`.
    Root,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Key {
    Int(u64),
    Str(Rc<str>),
}

impl From<u64> for Key {
    fn from(i: u64) -> Self {
        Key::Int(i)
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Key::Str(Rc::from(s))
    }
}

/// The node's tag: unused for `Text`, an element tag name for `Element`/`Root`,
/// a component descriptor reference for `Component`.
pub enum Tag<H: Host> {
    None,
    Name(Rc<str>),
    Descriptor(Rc<ComponentDescriptor<H>>),
}

impl<H: Host> Clone for Tag<H> {
    fn clone(&self) -> Self {
        match self {
            Tag::None => Tag::None,
            Tag::Name(n) => Tag::Name(n.clone()),
            Tag::Descriptor(d) => Tag::Descriptor(d.clone()),
        }
    }
}

impl<H: Host> Tag<H> {
    pub fn name(&self) -> Option<&str> {
        match self {
            Tag::Name(n) => Some(n),
            _ => None,
        }
    }

    pub fn descriptor(&self) -> Option<&Rc<ComponentDescriptor<H>>> {
        match self {
            Tag::Descriptor(d) => Some(d),
            _ => None,
        }
    }

    /// Part of sync-compatibility: same tag, where "same" for a
    /// component tag means the same descriptor instance (same component
    /// type), not merely an equal name.
    pub fn is_compatible(&self, other: &Self) -> bool {
        match (self, other) {
            (Tag::None, Tag::None) => true,
            (Tag::Name(a), Tag::Name(b)) => a == b,
            (Tag::Descriptor(a), Tag::Descriptor(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

pub type PropsMap = IndexMap<Rc<str>, PropValue>;
pub type AttrsMap = IndexMap<Rc<str>, String>;

/// `children`: an ordered list of child nodes, a text shortcut, or a
/// boolean for checked-input nodes.
pub enum ChildrenData<H: Host> {
    None,
    Text(String),
    Checked(bool),
    Nodes(Vec<VNodeRef<H>>),
}

impl<H: Host> ChildrenData<H> {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ChildrenData::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_nodes(&self) -> Option<&[VNodeRef<H>]> {
        match self {
            ChildrenData::Nodes(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_nodes_mut(&mut self) -> Option<&mut Vec<VNodeRef<H>>> {
        match self {
            ChildrenData::Nodes(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_checked(&self) -> Option<bool> {
        match self {
            ChildrenData::Checked(b) => Some(*b),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum LifecycleState {
    Created,
    Live,
    Detached,
    Disposed,
}

pub struct VNode<H: Host> {
    pub kind: VNodeKind,
    pub tag: Tag<H>,
    pub key: Option<Key>,
    pub props: PropsMap,
    pub attrs: AttrsMap,
    pub style: Option<String>,
    pub class_name: Option<String>,
    pub children: ChildrenData<H>,
    pub flags: VNodeFlags,
    pub host_ref: Option<H::Element>,
    pub component: Option<Rc<RefCell<Component<H>>>>,
    pub container_manager: Option<Rc<ContainerManagerDescriptor<H>>>,
    /// For `Component` kind only: the props value handed to the component,
    /// compared by [`ComponentDescriptor::props_changed`] (or by identity
    /// when the component's `ComponentFlags::IMMUTABLE_PROPS` is set) to
    /// decide whether an update is needed.
    pub component_props: Option<Box<dyn std::any::Any>>,
    state: LifecycleState,
}

impl<H: Host> VNode<H> {
    fn base(kind: VNodeKind, flags: VNodeFlags) -> Self {
        VNode {
            kind,
            tag: Tag::None,
            key: None,
            props: IndexMap::new(),
            attrs: IndexMap::new(),
            style: None,
            class_name: None,
            children: ChildrenData::None,
            flags,
            host_ref: None,
            component: None,
            container_manager: None,
            component_props: None,
            state: LifecycleState::Created,
        }
    }

    pub fn new_text(text: impl Into<String>) -> VNodeRef<H> {
        let mut node = Self::base(VNodeKind::Text, VNodeFlags::TEXT);
        node.children = ChildrenData::Text(text.into());
        Rc::new(RefCell::new(node))
    }

    pub fn new_element(tag: impl Into<Rc<str>>, flags: VNodeFlags) -> VNodeRef<H> {
        let mut node = Self::base(VNodeKind::Element, flags | VNodeFlags::ELEMENT);
        node.tag = Tag::Name(tag.into());
        Rc::new(RefCell::new(node))
    }

    pub fn new_root(tag: impl Into<Rc<str>>, flags: VNodeFlags) -> VNodeRef<H> {
        let mut node = Self::base(VNodeKind::Root, flags | VNodeFlags::ROOT);
        node.tag = Tag::Name(tag.into());
        Rc::new(RefCell::new(node))
    }

    pub fn new_component(
        descriptor: Rc<ComponentDescriptor<H>>,
        props: Box<dyn std::any::Any>,
        flags: VNodeFlags,
    ) -> VNodeRef<H> {
        let mark_flags = descriptor.mark_flags;
        let mut node = Self::base(VNodeKind::Component, flags | VNodeFlags::COMPONENT | mark_flags);
        node.tag = Tag::Descriptor(descriptor);
        node.component_props = Some(props);
        Rc::new(RefCell::new(node))
    }

    /// Two VNodes are sync-compatible when their flags, tag, and key all
    /// match.
    pub fn is_sync_compatible(a: &VNode<H>, b: &VNode<H>) -> bool {
        a.flags == b.flags && a.tag.is_compatible(&b.tag) && a.key == b.key
    }

    pub fn host_ref(&self) -> Option<&H::Element> {
        self.host_ref.as_ref()
    }

    /// Verifies an attribute key isn't a truncated `xml:`/`xlink:` prefix
    /// typo. Debug-only.
    pub fn check_attribute_key(key: &str) {
        if matches!(
            classify_attribute_key(key),
            AttributeNamespace::Xml(_) | AttributeNamespace::Xlink(_)
        ) {
            return;
        }
        crate::precondition!(
            !(key.len() > 1 && key.as_bytes()[0] == b'x' && key.as_bytes()[1] == b':'),
            "attribute key '{}' looks like a malformed xml:/xlink: prefix",
            key
        );
    }

    // ---- lifecycle ----

    /// Allocates the host node. For `Component` kind, instantiates a new
    /// `Component`, runs its `init` handler and first `update`, and inherits
    /// the resulting root's host element.
    pub fn create(node: &VNodeRef<H>, owner: &Owner<H>, depth: u32) {
        let mut this = node.borrow_mut();
        debug_assert_eq!(this.state, LifecycleState::Created, "VNode created twice");

        match this.kind {
            VNodeKind::Text => {
                let text = this.children.as_text().unwrap_or("").to_string();
                this.host_ref = Some(owner.host.create_text_node(&text));
            }
            VNodeKind::Element | VNodeKind::Root => {
                let tag = this.tag.name().expect("element/root VNode missing tag").to_string();
                let el = if this.flags.contains(VNodeFlags::SVG) {
                    owner.host.create_element_ns(SVG_NAMESPACE, &tag)
                } else {
                    owner.host.create_element(&tag)
                };
                this.host_ref = Some(el);
            }
            VNodeKind::Component => {
                let descriptor = this
                    .tag
                    .descriptor()
                    .expect("component VNode missing descriptor")
                    .clone();
                drop(this);

                let component = Component::instantiate(descriptor, owner.clone(), depth);
                {
                    let mut this = node.borrow_mut();
                    this.component = Some(component.clone());
                    component.borrow_mut().props = this.component_props.take().unwrap_or_else(|| Box::new(()));
                }
                Component::run_init_and_first_update(&component);
                let root = component.borrow().root.clone();
                if let Some(root) = root {
                    let mut this = node.borrow_mut();
                    this.host_ref = root.borrow().host_ref.clone();
                }
                let mut this = node.borrow_mut();
                this.state = LifecycleState::Created;
                return;
            }
        }
        this.state = LifecycleState::Created;
    }

    /// Writes all properties/attributes/style/className, then recurses into
    /// children (or sets textContent/value/checked). `create()` must already
    /// have run.
    pub fn render(node: &VNodeRef<H>, owner: &Owner<H>, depth: u32) {
        let kind = node.borrow().kind;
        if kind == VNodeKind::Component {
            // The component's first update already rendered its internal
            // root (see `create`); nothing further to do here.
            node.borrow_mut().state = LifecycleState::Live;
            return;
        }

        Self::write_props_attrs_style_class(node, owner);

        let has_input_flags = {
            let this = node.borrow();
            this.flags
                .intersects(VNodeFlags::TEXT_INPUT_ELEMENT | VNodeFlags::CHECKED_INPUT_ELEMENT)
        };

        if has_input_flags {
            Self::write_input_value(node, owner);
        } else {
            let text_shortcut = {
                let this = node.borrow();
                this.children.as_text().map(|s| s.to_string())
            };
            if let Some(text) = text_shortcut {
                let el = node.borrow().host_ref.clone().unwrap();
                owner.host.set_text(&el, &text);
            } else {
                let children = {
                    let this = node.borrow();
                    this.children.as_nodes().map(|c| c.to_vec())
                };
                if let Some(children) = children {
                    let parent = node.borrow().host_ref.clone().unwrap();
                    for child in &children {
                        Self::create(child, owner, depth + 1);
                        Self::render(child, owner, depth + 1);
                        let child_ref = child.borrow().host_ref.clone().unwrap();
                        owner.host.append_child(&parent, &child_ref);
                    }
                }
            }
        }

        node.borrow_mut().state = LifecycleState::Live;
    }

    fn write_props_attrs_style_class(node: &VNodeRef<H>, owner: &Owner<H>) {
        let this = node.borrow();
        let el = match &this.host_ref {
            Some(el) => el.clone(),
            None => return,
        };
        for (k, v) in this.props.iter() {
            owner.host.set_property(&el, k, v);
        }
        for (k, v) in this.attrs.iter() {
            Self::check_attribute_key(k);
            crate::host::write_attribute(&*owner.host, &el, k, v);
        }
        if let Some(style) = &this.style {
            owner.host.set_style_text(&el, style);
        }
        if let Some(class) = &this.class_name {
            if this.flags.contains(VNodeFlags::SVG) {
                owner.host.set_class_attribute(&el, class);
            } else {
                owner.host.set_class_name(&el, class);
            }
        }
    }

    fn write_input_value(node: &VNodeRef<H>, owner: &Owner<H>) {
        let this = node.borrow();
        let el = this.host_ref.clone().unwrap();
        if this.flags.contains(VNodeFlags::CHECKED_INPUT_ELEMENT) {
            if let Some(checked) = this.children.as_checked() {
                owner.host.set_input_checked(&el, checked);
            }
        } else if let Some(text) = this.children.as_text() {
            owner.host.set_input_value(&el, text);
        }
    }

    /// Binds to a pre-existing host subtree: one host node per VNode
    /// position, adjacent text children separated by comment placeholders
    /// which this consumes and removes.
    pub fn mount(node: &VNodeRef<H>, host_node: H::Element, owner: &Owner<H>, depth: u32) {
        let kind = node.borrow().kind;
        match kind {
            VNodeKind::Component => {
                let descriptor = {
                    let this = node.borrow();
                    this.tag.descriptor().expect("component VNode missing descriptor").clone()
                };
                let component = Component::instantiate(descriptor, owner.clone(), depth);
                {
                    let mut this = node.borrow_mut();
                    this.component = Some(component.clone());
                    this.host_ref = Some(host_node.clone());
                    component.borrow_mut().props = this.component_props.take().unwrap_or_else(|| Box::new(()));
                }
                Component::mount_and_first_update(&component, host_node);
            }
            VNodeKind::Text => {
                node.borrow_mut().host_ref = Some(host_node);
            }
            VNodeKind::Element | VNodeKind::Root => {
                node.borrow_mut().host_ref = Some(host_node.clone());
                Self::write_props_attrs_style_class(node, owner);

                let children = {
                    let this = node.borrow();
                    this.children.as_nodes().map(|c| c.to_vec())
                };
                if let Some(children) = children {
                    let mut cursor = owner.host.first_child(&host_node);
                    for child in &children {
                        let mut host_child = cursor.expect("mount: missing host node for VNode position");
                        if child.borrow().flags.contains(VNodeFlags::COMMENT_PLACEHOLDER) {
                            // A comment node was inserted ahead of this child to
                            // disambiguate it from the preceding adjacent text
                            // child; consume and discard it before binding.
                            let after_comment = owner
                                .host
                                .next_sibling(&host_child)
                                .expect("mount: missing host node after comment placeholder");
                            owner.host.remove_child(&host_node, &host_child);
                            host_child = after_comment;
                        }
                        let next = owner.host.next_sibling(&host_child);
                        Self::mount(child, host_child, owner, depth + 1);
                        cursor = next;
                    }
                }
            }
        }
        node.borrow_mut().state = LifecycleState::Live;
    }

    /// Propagates the `Attached` state down, recursing into children or the
    /// component's internal root. Component attachment resets `Recycled`.
    pub fn attach(node: &VNodeRef<H>) {
        let kind = node.borrow().kind;
        match kind {
            VNodeKind::Component => {
                let component = node.borrow().component.clone();
                if let Some(component) = component {
                    Component::attach(&component);
                }
            }
            _ => {
                let children = {
                    let this = node.borrow();
                    this.children.as_nodes().map(|c| c.to_vec())
                };
                if let Some(children) = children {
                    for child in &children {
                        Self::attach(child);
                    }
                }
            }
        }
        node.borrow_mut().state = LifecycleState::Live;
    }

    /// Symmetric to `attach`; additionally cancels the component's
    /// subscriptions (both permanent and transient) at detach time.
    pub fn detach(node: &VNodeRef<H>) {
        let kind = node.borrow().kind;
        match kind {
            VNodeKind::Component => {
                let component = node.borrow().component.clone();
                if let Some(component) = component {
                    Component::detach(&component);
                }
            }
            _ => {
                let children = {
                    let this = node.borrow();
                    this.children.as_nodes().map(|c| c.to_vec())
                };
                if let Some(children) = children {
                    for child in &children {
                        Self::detach(child);
                    }
                }
            }
        }
        node.borrow_mut().state = LifecycleState::Detached;
    }

    /// Frees the subtree. `KeepAlive` nodes are skipped (the owning component
    /// becomes responsible). Component nodes with recycling enabled and an
    /// unfilled pool are detached and pushed into the pool instead of
    /// disposed.
    pub fn dispose(node: &VNodeRef<H>) {
        {
            let this = node.borrow();
            if this.flags.contains(VNodeFlags::KEEP_ALIVE) {
                return;
            }
            crate::precondition!(this.state != LifecycleState::Disposed, "VNode disposed twice");
        }

        let kind = node.borrow().kind;
        match kind {
            VNodeKind::Component => {
                let component = node.borrow().component.clone();
                if let Some(component) = component {
                    Component::dispose(&component);
                }
            }
            _ => {
                let children = {
                    let this = node.borrow();
                    this.children.as_nodes().map(|c| c.to_vec())
                };
                if let Some(children) = children {
                    for child in &children {
                        Self::dispose(child);
                    }
                }
            }
        }
        node.borrow_mut().state = LifecycleState::Disposed;
    }
}

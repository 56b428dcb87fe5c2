//! External interfaces the core consumes: the host element API, the
//! frame-tick source, and the microtask/macrotask drivers. None of these are
//! implemented here — a concrete DOM/terminal/GPU-surface crate provides them.

/// SVG namespace, used for `create_element_ns` and attribute namespace routing.
pub const SVG_NAMESPACE: &str = "http://www.w3.org/2000/svg";
/// XLink namespace, routed to for attribute keys prefixed `xlink:`.
pub const XLINK_NAMESPACE: &str = "http://www.w3.org/1999/xlink";
/// XML namespace, routed to for attribute keys prefixed `xml:`.
pub const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// A host-property value. Host properties are assigned via direct property
/// writes (as opposed to attributes, which always go through string-based
/// setters).
#[derive(Clone, Debug, PartialEq)]
pub enum PropValue {
    Str(String),
    Bool(bool),
    Number(f64),
    Null,
}

impl From<&str> for PropValue {
    fn from(s: &str) -> Self {
        PropValue::Str(s.to_string())
    }
}

impl From<String> for PropValue {
    fn from(s: String) -> Self {
        PropValue::Str(s)
    }
}

impl From<bool> for PropValue {
    fn from(b: bool) -> Self {
        PropValue::Bool(b)
    }
}

impl From<f64> for PropValue {
    fn from(n: f64) -> Self {
        PropValue::Number(n)
    }
}

/// The host element API. Every mutating call is a direct effect on the
/// host tree — this core does not batch mutations into an edit stream; the
/// reconciler calls straight through to whichever of these methods apply.
///
/// `Element` models both real elements and text/comment nodes; which
/// operations are meaningful for a given node is a contract between the
/// reconciler and the host, not something this trait enforces structurally.
pub trait Host: 'static {
    type Element: Clone + PartialEq + std::fmt::Debug;

    fn create_element(&self, tag: &str) -> Self::Element;
    fn create_element_ns(&self, namespace: &str, tag: &str) -> Self::Element;
    fn create_text_node(&self, value: &str) -> Self::Element;
    fn create_comment_node(&self) -> Self::Element;

    fn append_child(&self, parent: &Self::Element, child: &Self::Element);
    fn insert_before(
        &self,
        parent: &Self::Element,
        node: &Self::Element,
        reference: Option<&Self::Element>,
    );
    fn remove_child(&self, parent: &Self::Element, child: &Self::Element);
    fn replace_child(&self, parent: &Self::Element, new_node: &Self::Element, old_node: &Self::Element);

    fn first_child(&self, node: &Self::Element) -> Option<Self::Element>;
    fn next_sibling(&self, node: &Self::Element) -> Option<Self::Element>;

    fn set_attribute(&self, el: &Self::Element, key: &str, value: &str);
    fn set_attribute_ns(&self, el: &Self::Element, namespace: &str, key: &str, value: &str);
    fn remove_attribute(&self, el: &Self::Element, key: &str);

    fn set_property(&self, el: &Self::Element, key: &str, value: &PropValue);

    /// Full cssText replacement (HTML) or `style` attribute write (SVG) — the
    /// reconciler decides which based on the node's `Svg` flag and calls
    /// through uniformly; hosts that only support one representation may
    /// ignore the distinction.
    fn set_style_text(&self, el: &Self::Element, css: &str);
    /// `className` property write (HTML).
    fn set_class_name(&self, el: &Self::Element, class: &str);
    /// `class` attribute write (SVG).
    fn set_class_attribute(&self, el: &Self::Element, class: &str);

    fn input_value(&self, el: &Self::Element) -> String;
    fn set_input_value(&self, el: &Self::Element, value: &str);
    fn input_checked(&self, el: &Self::Element) -> bool;
    fn set_input_checked(&self, el: &Self::Element, checked: bool);

    fn focus(&self, el: &Self::Element);

    /// Text-node content write, used by the reconciler's text diff.
    fn set_text(&self, node: &Self::Element, value: &str);
}

/// Delivers a high-resolution timestamp (milliseconds) to the scheduler's tick
/// handler. Implemented by an animation-frame callback or equivalent on the
/// host side; the scheduler calls [`FrameTickSource::request_tick`] whenever
/// it needs to be woken up for the next frame and is otherwise idle between
/// ticks.
pub trait FrameTickSource {
    fn request_tick(&self, callback: Box<dyn FnOnce(f64)>);
}

/// Invokes a registered callback after one microtask boundary.
pub trait MicrotaskDriver {
    fn schedule(&self, callback: Box<dyn FnOnce()>);
}

/// Invokes a registered callback after one macrotask boundary.
pub trait MacrotaskDriver {
    fn schedule(&self, callback: Box<dyn FnOnce()>);
}

/// Routes an attribute key to the namespace it must be set through.
/// Callers in debug builds should additionally reject a bare `x:`-prefixed key
/// via [`crate::vnode::VNode::check_attribute_key`], which is a precondition
/// violation (almost always a typo of `xml:`/`xlink:`).
pub fn classify_attribute_key(key: &str) -> AttributeNamespace {
    if let Some(name) = key.strip_prefix("xml:") {
        return AttributeNamespace::Xml(name);
    }
    if let Some(name) = key.strip_prefix("xlink:") {
        return AttributeNamespace::Xlink(name);
    }
    AttributeNamespace::None(key)
}

#[derive(Debug, PartialEq, Eq)]
pub enum AttributeNamespace<'a> {
    None(&'a str),
    Xml(&'a str),
    Xlink(&'a str),
}

/// Routes a single attribute write through [`classify_attribute_key`]. Shared
/// by the VNode render path and the reconciler's attribute diff so the two
/// can never disagree about namespace routing.
pub(crate) fn write_attribute<H: Host>(host: &H, el: &H::Element, key: &str, value: &str) {
    match classify_attribute_key(key) {
        AttributeNamespace::Xml(name) => host.set_attribute_ns(el, XML_NAMESPACE, name, value),
        AttributeNamespace::Xlink(name) => host.set_attribute_ns(el, XLINK_NAMESPACE, name, value),
        AttributeNamespace::None(name) => host.set_attribute(el, name, value),
    }
}

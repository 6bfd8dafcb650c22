//! # RustKit DOM
//!
//! A small DOM host for [`rustkit_listener`].
//! Uses html5ever for HTML parsing and constructs a traversable node tree
//! whose nodes, together with the [`Window`], are listener targets.
//!
//! ## Design Goals
//!
//! 1. **Standards-compliant parsing**: html5ever implements the HTML5 parsing algorithm
//! 2. **Document order**: traversal and selector queries follow tree order
//! 3. **Query support**: element lookup by ID, class, tag name and selector
//! 4. **Event dispatch**: DOM events with capture, target and bubble phases

pub mod events;
pub mod selector;

pub use events::{
    DispatchTarget, DomEvent, EventDetail, EventDispatcher, EventId, InputEventData,
    KeyboardEventData, MouseEventData,
};
pub use selector::{CompoundSelector, QuerySelector, SelectorList};

use html5ever::parse_document;
use html5ever::tendril::TendrilSink;
use markup5ever_rcdom::{Handle, NodeData, RcDom};
use rustkit_common::{OptionExt, Result};
use rustkit_listener::{
    DocumentQuery, Environment, EventTarget, Handler, ListenerRegistry, RegistrationOptions,
    SharedTarget, TimerQueue,
};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};
use tracing::debug;

/// Unique identifier for a DOM node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

impl NodeId {
    /// Create a new NodeId.
    pub fn new(id: usize) -> Self {
        Self(id)
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> usize {
        self.0
    }
}

/// Type of DOM node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeType {
    Document,
    DocumentType {
        name: String,
    },
    Element {
        tag_name: String,
        attributes: HashMap<String, String>,
    },
    Text(String),
    Comment(String),
}

/// A DOM node.
pub struct Node {
    /// Unique ID for this node.
    pub id: NodeId,
    /// Node type and associated data.
    pub node_type: NodeType,
    parent: RefCell<Option<Weak<Node>>>,
    children: RefCell<Vec<Rc<Node>>>,
    /// Listeners registered on this node.
    pub event_target: ListenerRegistry<DomEvent>,
}

impl Node {
    /// Create a new node.
    pub fn new(id: NodeId, node_type: NodeType) -> Rc<Self> {
        Rc::new(Self {
            id,
            node_type,
            parent: RefCell::new(None),
            children: RefCell::new(Vec::new()),
            event_target: ListenerRegistry::new(),
        })
    }

    /// Get the tag name for element nodes.
    pub fn tag_name(&self) -> Option<&str> {
        match &self.node_type {
            NodeType::Element { tag_name, .. } => Some(tag_name),
            _ => None,
        }
    }

    /// Get an attribute value.
    pub fn get_attribute(&self, name: &str) -> Option<&str> {
        match &self.node_type {
            NodeType::Element { attributes, .. } => attributes.get(name).map(|s| s.as_str()),
            _ => None,
        }
    }

    /// Whether the `class` attribute contains `class_name`.
    pub fn has_class(&self, class_name: &str) -> bool {
        self.get_attribute("class")
            .is_some_and(|c| c.split_whitespace().any(|cls| cls == class_name))
    }

    /// Get the text content.
    pub fn text_content(&self) -> String {
        let mut result = String::new();
        self.collect_text(&mut result);
        result
    }

    fn collect_text(&self, result: &mut String) {
        match &self.node_type {
            NodeType::Text(text) => result.push_str(text),
            _ => {
                for child in self.children.borrow().iter() {
                    child.collect_text(result);
                }
            }
        }
    }

    /// Get parent node.
    pub fn parent(&self) -> Option<Rc<Node>> {
        self.parent.borrow().as_ref().and_then(|w| w.upgrade())
    }

    /// Ancestors from the parent up to the document root.
    pub fn ancestors(&self) -> Vec<Rc<Node>> {
        let mut ancestors = Vec::new();
        let mut current = self.parent();
        while let Some(node) = current {
            current = node.parent();
            ancestors.push(node);
        }
        ancestors
    }

    /// Get child nodes.
    pub fn children(&self) -> Vec<Rc<Node>> {
        self.children.borrow().clone()
    }

    /// Check if this is an element node.
    pub fn is_element(&self) -> bool {
        matches!(self.node_type, NodeType::Element { .. })
    }

    /// Append a child node.
    pub fn append_child(self: &Rc<Self>, child: Rc<Node>) {
        *child.parent.borrow_mut() = Some(Rc::downgrade(self));
        self.children.borrow_mut().push(child);
    }
}

impl EventTarget<DomEvent> for Node {
    fn add_event_listener(
        &self,
        event_type: &str,
        handler: Handler<DomEvent>,
        options: RegistrationOptions,
    ) {
        self.event_target.add(event_type, handler, options);
    }

    fn remove_event_listener(&self, event_type: &str, handler: &Handler<DomEvent>, capture: bool) {
        self.event_target.remove(event_type, handler, capture);
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("node_type", &self.node_type)
            .field("children", &self.children.borrow().len())
            .field("event_target", &self.event_target)
            .finish()
    }
}

/// A complete DOM document.
pub struct Document {
    /// Root node of the document.
    root: Rc<Node>,
    /// Elements indexed by ID attribute; the first in tree order wins.
    elements_by_id: HashMap<String, Rc<Node>>,
    /// Next node ID.
    next_id: Cell<usize>,
}

impl Document {
    /// Create a new empty document.
    pub fn new() -> Self {
        Self {
            root: Node::new(NodeId::new(0), NodeType::Document),
            elements_by_id: HashMap::new(),
            next_id: Cell::new(1),
        }
    }

    /// Parse HTML and create a document.
    pub fn parse_html(html: &str) -> Result<Self> {
        debug!(len = html.len(), "Parsing HTML");

        let dom = parse_document(RcDom::default(), Default::default())
            .from_utf8()
            .read_from(&mut html.as_bytes())?;

        let mut doc = Document::new();
        doc.convert_rcdom(&dom.document, &doc.root.clone());
        doc.index_elements();

        debug!(node_count = doc.next_id.get(), "HTML parsed");
        Ok(doc)
    }

    fn convert_rcdom(&mut self, handle: &Handle, parent: &Rc<Node>) {
        for child_handle in handle.children.borrow().iter() {
            let node_type = match &child_handle.data {
                NodeData::Document | NodeData::ProcessingInstruction { .. } => continue,
                NodeData::Doctype { name, .. } => NodeType::DocumentType {
                    name: name.to_string(),
                },
                NodeData::Element { name, attrs, .. } => NodeType::Element {
                    tag_name: name.local.to_string(),
                    attributes: attrs
                        .borrow()
                        .iter()
                        .map(|attr| (attr.name.local.to_string(), attr.value.to_string()))
                        .collect(),
                },
                NodeData::Text { contents } => NodeType::Text(contents.borrow().to_string()),
                NodeData::Comment { contents } => NodeType::Comment(contents.to_string()),
            };

            let id = NodeId::new(self.next_id.get());
            self.next_id.set(self.next_id.get() + 1);

            let node = Node::new(id, node_type);
            parent.append_child(node.clone());

            self.convert_rcdom(child_handle, &node);
        }
    }

    fn index_elements(&mut self) {
        let mut by_id = HashMap::new();
        self.traverse(|node| {
            if let Some(id) = node.get_attribute("id") {
                by_id.entry(id.to_string()).or_insert_with(|| node.clone());
            }
        });
        self.elements_by_id = by_id;
    }

    /// Get the document root.
    pub fn root(&self) -> &Rc<Node> {
        &self.root
    }

    /// Get the document element (<html>).
    pub fn document_element(&self) -> Option<Rc<Node>> {
        self.root
            .children()
            .into_iter()
            .find(|n| n.tag_name() == Some("html"))
    }

    /// Get the <body> element.
    pub fn body(&self) -> Option<Rc<Node>> {
        self.document_element()?
            .children()
            .into_iter()
            .find(|n| n.tag_name() == Some("body"))
    }

    /// Get element by ID.
    pub fn get_element_by_id(&self, id: &str) -> Option<Rc<Node>> {
        self.elements_by_id.get(id).cloned()
    }

    /// Get element by ID, failing with `NotFound`.
    pub fn require_element_by_id(&self, id: &str) -> Result<Rc<Node>> {
        self.get_element_by_id(id)
            .ok_or_not_found(format!("element #{id}"))
    }

    /// Get elements by tag name, in document order.
    pub fn get_elements_by_tag_name(&self, tag_name: &str) -> Vec<Rc<Node>> {
        self.collect(|n| n.tag_name().is_some_and(|t| t.eq_ignore_ascii_case(tag_name)))
    }

    /// Get elements by class name, in document order.
    pub fn get_elements_by_class_name(&self, class_name: &str) -> Vec<Rc<Node>> {
        self.collect(|n| n.has_class(class_name))
    }

    /// Elements matching a CSS selector, in document order.
    pub fn query_selector_all(&self, selector: &str) -> Vec<Rc<Node>> {
        QuerySelector::select(self, selector)
    }

    /// Traverse all nodes depth-first, in document order.
    pub fn traverse<F>(&self, mut callback: F)
    where
        F: FnMut(&Rc<Node>),
    {
        traverse_node(&self.root, &mut callback);
    }

    fn collect(&self, predicate: impl Fn(&Node) -> bool) -> Vec<Rc<Node>> {
        let mut matched = Vec::new();
        self.traverse(|node| {
            if predicate(node) {
                matched.push(node.clone());
            }
        });
        matched
    }
}

fn traverse_node<F>(node: &Rc<Node>, callback: &mut F)
where
    F: FnMut(&Rc<Node>),
{
    callback(node);
    for child in node.children() {
        traverse_node(&child, callback);
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentQuery<DomEvent> for Document {
    fn query_selector_all(&self, selector: &str) -> Vec<SharedTarget<DomEvent>> {
        QuerySelector::select(self, selector)
            .into_iter()
            .map(|node| node as SharedTarget<DomEvent>)
            .collect()
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("node_count", &self.next_id.get())
            .field("ids", &self.elements_by_id.len())
            .finish()
    }
}

/// The global event target.
#[derive(Debug, Default)]
pub struct Window {
    /// Listeners registered on the window.
    pub event_target: ListenerRegistry<DomEvent>,
}

impl Window {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }
}

impl EventTarget<DomEvent> for Window {
    fn add_event_listener(
        &self,
        event_type: &str,
        handler: Handler<DomEvent>,
        options: RegistrationOptions,
    ) {
        self.event_target.add(event_type, handler, options);
    }

    fn remove_event_listener(&self, event_type: &str, handler: &Handler<DomEvent>, capture: bool) {
        self.event_target.remove(event_type, handler, capture);
    }
}

/// A loaded page: a document and its window.
#[derive(Debug, Clone)]
pub struct Page {
    pub document: Rc<Document>,
    pub window: Rc<Window>,
}

impl Page {
    /// Wrap an existing document with a fresh window.
    pub fn new(document: Document) -> Self {
        Self {
            document: Rc::new(document),
            window: Window::new(),
        }
    }

    /// Parse HTML into a page.
    pub fn parse_html(html: &str) -> Result<Self> {
        Ok(Self::new(Document::parse_html(html)?))
    }

    /// Dispatch `event` at `node`, propagating through the window.
    /// Returns true if the default action was not prevented.
    pub fn dispatch(&self, node: &Rc<Node>, event: &DomEvent) -> bool {
        EventDispatcher::dispatch(event, node, Some(&self.window))
    }

    /// Dispatch `event` at the window.
    pub fn dispatch_to_window(&self, event: &DomEvent) -> bool {
        EventDispatcher::dispatch_to_window(event, &self.window)
    }

    /// Dispatch a fresh `click` at `node`.
    pub fn click(&self, node: &Rc<Node>) -> bool {
        self.dispatch(node, &DomEvent::click())
    }

    /// A listener environment backed by this page's window and document.
    pub fn environment(&self, timers: Rc<dyn TimerQueue>) -> Environment<DomEvent> {
        Environment::new(timers)
            .with_global(self.window.clone())
            .with_document(self.document.clone())
    }
}

//! A small in-memory document: just enough DOM to render, morph and observe components without a browser.
//!
//! [`Node`] is a reference-counted handle, so clones refer to the same node.
//! Use [`Node::same_node`] for identity comparisons.

use crate::component::{same_instance, Owner};
use core::{
	cell::RefCell,
	fmt::{self, Debug, Display, Formatter, Write as _},
};
use hashbrown::HashMap;
use std::rc::{Rc, Weak};

/// Elements that never have content or an end tag.
pub const VOID_ELEMENTS: &[&str] = &[
	"area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source", "track", "wbr",
];

/// Elements whose text content is serialised and parsed verbatim.
pub const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

/// An event-handler property value, like `element.onclick`.
pub type Handler = Rc<dyn Fn(&Event)>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
	kind: String,
}
impl Event {
	#[must_use]
	pub fn new(kind: impl Into<String>) -> Self {
		Self { kind: kind.into() }
	}

	#[must_use]
	pub fn kind(&self) -> &str {
		&self.kind
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
	Document,
	Element,
	Text,
	Comment,
}

/// Capability tag of an element, derived from its tag name and `type` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlKind {
	Plain,
	Input,
	FileInput,
	TextArea,
	Select,
}
impl ControlKind {
	#[must_use]
	pub fn is_form_control(self) -> bool {
		!matches!(self, ControlKind::Plain)
	}

	/// Whether the control holds a user-editable value that can be assigned back to it.
	///
	/// File inputs are form controls but can't have their value assigned.
	#[must_use]
	pub fn has_editable_value(self) -> bool {
		matches!(self, ControlKind::Input | ControlKind::TextArea | ControlKind::Select)
	}
}

enum Kind {
	Document,
	Element(ElementData),
	Text(String),
	Comment(String),
}

struct ElementData {
	name: String,
	attributes: Vec<(String, String)>,
	/// The live value, once assigned. Takes precedence over markup-derived defaults.
	value: Option<String>,
	handlers: HashMap<String, Handler>,
}
impl ElementData {
	fn attribute(&self, name: &str) -> Option<&str> {
		self.attributes.iter().find(|(n, _)| n == name).map(|(_, v)| v.as_str())
	}
}

struct NodeData {
	kind: Kind,
	parent: Weak<RefCell<NodeData>>,
	children: Vec<Node>,
	owner: Option<Weak<dyn Owner>>,
}

#[derive(Clone)]
pub struct Node(Rc<RefCell<NodeData>>);

/// A non-owning [`Node`] handle.
#[derive(Debug, Clone, Default)]
pub struct WeakNode(Weak<RefCell<NodeData>>);
impl WeakNode {
	#[must_use]
	pub fn upgrade(&self) -> Option<Node> {
		self.0.upgrade().map(Node)
	}
}

impl Node {
	fn new(kind: Kind) -> Self {
		Self(Rc::new(RefCell::new(NodeData {
			kind,
			parent: Weak::new(),
			children: Vec::new(),
			owner: None,
		})))
	}

	/// Creates a detached element. The tag name is stored lowercased.
	#[must_use]
	pub fn element(name: &str) -> Self {
		Self::new(Kind::Element(ElementData {
			name: name.to_ascii_lowercase(),
			attributes: Vec::new(),
			value: None,
			handlers: HashMap::new(),
		}))
	}

	#[must_use]
	pub fn text(data: impl Into<String>) -> Self {
		Self::new(Kind::Text(data.into()))
	}

	#[must_use]
	pub fn comment(data: impl Into<String>) -> Self {
		Self::new(Kind::Comment(data.into()))
	}

	#[must_use]
	pub fn with_attribute(self, name: &str, value: impl Into<String>) -> Self {
		self.set_attribute(name, value);
		self
	}

	#[must_use]
	pub fn with_child(self, child: &Node) -> Self {
		self.append_child(child);
		self
	}

	#[must_use]
	pub fn with_text(self, data: impl Into<String>) -> Self {
		self.append_child(&Node::text(data));
		self
	}

	#[must_use]
	pub fn with_handler(self, name: &str, handler: impl Fn(&Event) + 'static) -> Self {
		self.set_handler(name, Some(Rc::new(handler)));
		self
	}

	#[must_use]
	pub fn node_type(&self) -> NodeType {
		match self.0.borrow().kind {
			Kind::Document => NodeType::Document,
			Kind::Element(_) => NodeType::Element,
			Kind::Text(_) => NodeType::Text,
			Kind::Comment(_) => NodeType::Comment,
		}
	}

	#[must_use]
	pub fn is_element(&self) -> bool {
		self.node_type() == NodeType::Element
	}

	/// The lowercase tag name of an element.
	#[must_use]
	pub fn name(&self) -> Option<String> {
		match &self.0.borrow().kind {
			Kind::Element(element) => Some(element.name.clone()),
			_ => None,
		}
	}

	#[must_use]
	pub fn same_node(&self, other: &Node) -> bool {
		Rc::ptr_eq(&self.0, &other.0)
	}

	#[must_use]
	pub fn downgrade(&self) -> WeakNode {
		WeakNode(Rc::downgrade(&self.0))
	}

	#[must_use]
	pub fn parent(&self) -> Option<Node> {
		self.0.borrow().parent.upgrade().map(Node)
	}

	#[must_use]
	pub fn children(&self) -> Vec<Node> {
		self.0.borrow().children.clone()
	}

	#[must_use]
	pub fn first_child(&self) -> Option<Node> {
		self.0.borrow().children.first().cloned()
	}

	#[must_use]
	pub fn next_sibling(&self) -> Option<Node> {
		let parent = self.parent()?;
		let data = parent.0.borrow();
		let index = data.children.iter().position(|child| child.same_node(self))?;
		let next = data.children.get(index + 1).cloned();
		next
	}

	/// All descendants in document order, excluding `self`.
	#[must_use]
	pub fn descendants(&self) -> Vec<Node> {
		let mut descendants = Vec::new();
		let mut stack: Vec<Node> = self.children().into_iter().rev().collect();
		while let Some(node) = stack.pop() {
			stack.extend(node.children().into_iter().rev());
			descendants.push(node);
		}
		descendants
	}

	pub fn append_child(&self, child: &Node) {
		self.insert_before(child, None)
	}

	/// Inserts `child` before `reference`, detaching it from its previous parent first.
	///
	/// Appends if `reference` is [`None`] or not a child of `self`.
	pub fn insert_before(&self, child: &Node, reference: Option<&Node>) {
		debug_assert!(!child.same_node(self), "A node can't be inserted into itself.");
		child.remove();
		{
			let mut data = self.0.borrow_mut();
			let index = reference
				.and_then(|reference| data.children.iter().position(|c| c.same_node(reference)))
				.unwrap_or_else(|| data.children.len());
			data.children.insert(index, child.clone());
		}
		child.0.borrow_mut().parent = Rc::downgrade(&self.0);
	}

	/// Returns whether `child` was a child of `self`.
	pub fn remove_child(&self, child: &Node) -> bool {
		let removed = {
			let mut data = self.0.borrow_mut();
			match data.children.iter().position(|c| c.same_node(child)) {
				Some(index) => {
					data.children.remove(index);
					true
				}
				None => false,
			}
		};
		if removed {
			child.0.borrow_mut().parent = Weak::new();
		}
		removed
	}

	/// Replaces `old_child` with `new_child` in place. Returns whether `old_child` was a child of `self`.
	pub fn replace_child(&self, new_child: &Node, old_child: &Node) -> bool {
		if new_child.same_node(old_child) {
			return true;
		}
		if !self.0.borrow().children.iter().any(|c| c.same_node(old_child)) {
			return false;
		}
		self.insert_before(new_child, Some(old_child));
		self.remove_child(old_child)
	}

	/// Detaches `self` from its parent, if any.
	pub fn remove(&self) {
		if let Some(parent) = self.parent() {
			parent.remove_child(self);
		}
	}

	/// The topmost ancestor, or `self` if detached.
	#[must_use]
	pub fn root(&self) -> Node {
		let mut current = self.clone();
		while let Some(parent) = current.parent() {
			current = parent;
		}
		current
	}

	/// Whether the topmost ancestor is a document.
	#[must_use]
	pub fn is_connected(&self) -> bool {
		self.root().node_type() == NodeType::Document
	}

	#[must_use]
	pub fn attribute(&self, name: &str) -> Option<String> {
		let name = name.to_ascii_lowercase();
		match &self.0.borrow().kind {
			Kind::Element(element) => element.attribute(&name).map(str::to_owned),
			_ => None,
		}
	}

	#[must_use]
	pub fn has_attribute(&self, name: &str) -> bool {
		self.attribute(name).is_some()
	}

	/// Attribute name/value pairs in insertion order.
	#[must_use]
	pub fn attributes(&self) -> Vec<(String, String)> {
		match &self.0.borrow().kind {
			Kind::Element(element) => element.attributes.clone(),
			_ => Vec::new(),
		}
	}

	/// Sets an attribute on an element. Does nothing for other node types.
	pub fn set_attribute(&self, name: &str, value: impl Into<String>) {
		let name = name.to_ascii_lowercase();
		let value = value.into();
		if let Kind::Element(element) = &mut self.0.borrow_mut().kind {
			match element.attributes.iter().position(|(n, _)| *n == name) {
				Some(index) => element.attributes[index].1 = value,
				None => element.attributes.push((name, value)),
			}
		}
	}

	/// Returns whether the attribute was present.
	pub fn remove_attribute(&self, name: &str) -> bool {
		let name = name.to_ascii_lowercase();
		if let Kind::Element(element) = &mut self.0.borrow_mut().kind {
			let before = element.attributes.len();
			element.attributes.retain(|(n, _)| *n != name);
			return element.attributes.len() != before;
		}
		false
	}

	#[must_use]
	pub fn control_kind(&self) -> ControlKind {
		match &self.0.borrow().kind {
			Kind::Element(element) => match element.name.as_str() {
				"input" if element.attribute("type").map_or(false, |t| t.eq_ignore_ascii_case("file")) => ControlKind::FileInput,
				"input" => ControlKind::Input,
				"textarea" => ControlKind::TextArea,
				"select" => ControlKind::Select,
				_ => ControlKind::Plain,
			},
			_ => ControlKind::Plain,
		}
	}

	/// The live value of a form control, or [`None`] for anything else.
	///
	/// Until a value is assigned, this falls back to what the markup says:
	/// the `value` attribute for inputs, the text content for `<textarea>`s
	/// and the selected (or first) `<option>` for `<select>`s.
	#[must_use]
	pub fn value(&self) -> Option<String> {
		let kind = self.control_kind();
		if !kind.is_form_control() {
			return None;
		}
		if let Kind::Element(ElementData { value: Some(value), .. }) = &self.0.borrow().kind {
			return Some(value.clone());
		}
		Some(match kind {
			ControlKind::Input => self.attribute("value").unwrap_or_default(),
			ControlKind::TextArea => self.text_content(),
			ControlKind::Select => self.selected_option_value().unwrap_or_default(),
			ControlKind::FileInput | ControlKind::Plain => String::new(),
		})
	}

	/// Assigns the live value of a form control. Does nothing for anything else.
	pub fn set_value(&self, value: impl Into<String>) {
		if !self.control_kind().is_form_control() {
			return;
		}
		if let Kind::Element(element) = &mut self.0.borrow_mut().kind {
			element.value = Some(value.into());
		}
	}

	fn selected_option_value(&self) -> Option<String> {
		let options: Vec<Node> = self.descendants().into_iter().filter(|node| node.name().as_deref() == Some("option")).collect();
		let option = options.iter().find(|option| option.has_attribute("selected")).or_else(|| options.first())?;
		Some(option.attribute("value").unwrap_or_else(|| option.text_content().trim().to_owned()))
	}

	/// Character data of text and comment nodes.
	#[must_use]
	pub fn data(&self) -> Option<String> {
		match &self.0.borrow().kind {
			Kind::Text(data) | Kind::Comment(data) => Some(data.clone()),
			_ => None,
		}
	}

	/// Replaces the character data of a text or comment node. Does nothing for other node types.
	pub fn set_data(&self, data: impl Into<String>) {
		match &mut self.0.borrow_mut().kind {
			Kind::Text(existing) | Kind::Comment(existing) => *existing = data.into(),
			_ => (),
		}
	}

	/// Concatenated text of all descendant text nodes (or the data of a text/comment node itself).
	#[must_use]
	pub fn text_content(&self) -> String {
		if let Some(data) = self.data() {
			return data;
		}
		self.descendants().iter().filter(|node| node.node_type() == NodeType::Text).filter_map(Node::data).collect()
	}

	/// The event-handler property `name` (for example `"onclick"`).
	#[must_use]
	pub fn handler(&self, name: &str) -> Option<Handler> {
		match &self.0.borrow().kind {
			Kind::Element(element) => element.handlers.get(name).cloned(),
			_ => None,
		}
	}

	pub fn set_handler(&self, name: &str, handler: Option<Handler>) {
		if let Kind::Element(element) = &mut self.0.borrow_mut().kind {
			match handler {
				Some(handler) => {
					element.handlers.insert(name.to_owned(), handler);
				}
				None => {
					element.handlers.remove(name);
				}
			}
		}
	}

	/// Calls the `on{kind}` handler property, if set. Returns whether a handler ran.
	pub fn dispatch(&self, event: &Event) -> bool {
		match self.handler(&format!("on{}", event.kind())) {
			Some(handler) => {
				handler(event);
				true
			}
			None => false,
		}
	}

	/// Whether a component instance that is still alive rendered this node.
	#[must_use]
	pub fn has_owner(&self) -> bool {
		self.owner().is_some()
	}

	pub(crate) fn owner(&self) -> Option<Rc<dyn Owner>> {
		self.0.borrow().owner.as_ref().and_then(Weak::upgrade)
	}

	/// Tags the node with its owning instance. The tag doesn't keep the instance alive.
	///
	/// Returns `false` (and keeps the existing tag) if the node is already owned by a different live instance.
	pub(crate) fn tag_owner(&self, owner: &Rc<dyn Owner>) -> bool {
		if let Some(existing) = self.owner() {
			return same_instance(&existing, owner);
		}
		self.0.borrow_mut().owner = Some(Rc::downgrade(owner));
		true
	}
}

impl Debug for Node {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		let data = self.0.borrow();
		let mut debug = f.debug_struct("Node");
		match &data.kind {
			Kind::Document => debug.field("type", &NodeType::Document),
			Kind::Element(element) => debug.field("name", &element.name),
			Kind::Text(_) => debug.field("type", &NodeType::Text),
			Kind::Comment(_) => debug.field("type", &NodeType::Comment),
		};
		debug.field("children", &data.children.len()).finish()
	}
}

/// Serialises the node as markup (outer HTML).
impl Display for Node {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		let data = self.0.borrow();
		match &data.kind {
			Kind::Document => data.children.iter().try_for_each(|child| Display::fmt(child, f)),
			Kind::Text(text) => escape(text, false, f),
			Kind::Comment(comment) => write!(f, "<!--{}-->", comment),
			Kind::Element(element) => {
				write!(f, "<{}", element.name)?;
				for (name, value) in &element.attributes {
					write!(f, " {}=\"", name)?;
					escape(value, true, f)?;
					f.write_char('"')?;
				}
				f.write_char('>')?;
				if VOID_ELEMENTS.contains(&element.name.as_str()) {
					return Ok(());
				}
				let raw = RAW_TEXT_ELEMENTS.contains(&element.name.as_str());
				for child in &data.children {
					match (raw, child.data()) {
						(true, Some(text)) => f.write_str(&text)?,
						_ => Display::fmt(child, f)?,
					}
				}
				write!(f, "</{}>", element.name)
			}
		}
	}
}

fn escape(text: &str, attribute: bool, f: &mut Formatter<'_>) -> fmt::Result {
	for c in text.chars() {
		match c {
			'&' => f.write_str("&amp;")?,
			'<' if !attribute => f.write_str("&lt;")?,
			'>' if !attribute => f.write_str("&gt;")?,
			'"' if attribute => f.write_str("&quot;")?,
			'\u{a0}' => f.write_str("&nbsp;")?,
			c => f.write_char(c)?,
		}
	}
	Ok(())
}

/// A document root with `<html><head></head><body></body></html>`.
#[derive(Debug, Clone)]
pub struct Document {
	node: Node,
	body: Node,
}
impl Document {
	#[must_use]
	pub fn new() -> Self {
		let node = Node::new(Kind::Document);
		let body = Node::element("body");
		let html = Node::element("html").with_child(&Node::element("head")).with_child(&body);
		node.append_child(&html);
		Self { node, body }
	}

	#[must_use]
	pub fn node(&self) -> &Node {
		&self.node
	}

	#[must_use]
	pub fn body(&self) -> &Node {
		&self.body
	}

	/// Delivers pending attach/detach notifications, like a host's mutation observer checkpoint.
	pub fn flush_mutations(&self) {
		crate::on_load::observe(self)
	}
}
impl Default for Document {
	fn default() -> Self {
		Self::new()
	}
}

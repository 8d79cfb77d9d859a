//! Conversions between browser DOM trees and [`Node`] trees.
//!
//! Event-handler properties aren't carried across in either direction.

use crate::dom::{Node, NodeType};
use tracing::{instrument, warn};
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{Attr, Comment, Document, Element, HtmlInputElement, HtmlSelectElement, HtmlTextAreaElement, NamedNodeMap, Node as wNode, NodeList, Text};

pub fn load_child_nodes(child_nodes: &NodeList) -> Vec<Node> {
	(0..child_nodes.length())
		.filter_map(|i| child_nodes.item(i))
		.filter_map(|child| load_node(&child))
		.collect()
}

/// Returns [`None`] for node types without a counterpart, like processing instructions.
pub fn load_node(node: &wNode) -> Option<Node> {
	if let Some(element) = node.dyn_ref::<Element>() {
		Some(load_element(element))
	} else if let Some(text) = node.dyn_ref::<Text>() {
		Some(Node::text(text.data()))
	} else if let Some(comment) = node.dyn_ref::<Comment>() {
		Some(Node::comment(comment.data()))
	} else {
		warn!("Skipping unrecognised node: {:?}", node);
		None
	}
}

/// Copies `element` with its attributes, descendants and live form value.
pub fn load_element(element: &Element) -> Node {
	let node = Node::element(&element.tag_name());
	load_attributes(&element.attributes(), &node);
	for child in load_child_nodes(&element.child_nodes()) {
		node.append_child(&child);
	}
	if let Some(value) = live_value(element) {
		node.set_value(value);
	}
	node
}

pub fn load_attributes(attributes: &NamedNodeMap, node: &Node) {
	for attribute in (0..attributes.length()).filter_map(|i| attributes.item(i)) {
		load_attribute(&attribute, node);
	}
}

pub fn load_attribute(attribute: &Attr, node: &Node) {
	node.set_attribute(&attribute.local_name(), attribute.value());
}

fn live_value(element: &Element) -> Option<String> {
	if let Some(input) = element.dyn_ref::<HtmlInputElement>() {
		Some(input.value())
	} else if let Some(textarea) = element.dyn_ref::<HtmlTextAreaElement>() {
		Some(textarea.value())
	} else {
		element.dyn_ref::<HtmlSelectElement>().map(HtmlSelectElement::value)
	}
}

/// Creates a browser DOM subtree from `node`, including live form values.
///
/// # Errors
///
/// Iff the browser rejects a tag or attribute name, or `node` is a document.
#[instrument(skip(document))]
pub fn project(node: &Node, document: &Document) -> Result<wNode, JsValue> {
	match node.node_type() {
		NodeType::Element => {
			let element = document.create_element(&node.name().unwrap_or_default())?;
			for (name, value) in node.attributes() {
				element.set_attribute(&name, &value)?;
			}
			for child in node.children() {
				element.append_child(&project(&child, document)?)?;
			}
			if node.control_kind().has_editable_value() {
				let value = node.value().unwrap_or_default();
				if let Some(input) = element.dyn_ref::<HtmlInputElement>() {
					input.set_value(&value);
				} else if let Some(textarea) = element.dyn_ref::<HtmlTextAreaElement>() {
					textarea.set_value(&value);
				} else if let Some(select) = element.dyn_ref::<HtmlSelectElement>() {
					select.set_value(&value);
				}
			}
			Ok(element.into())
		}
		NodeType::Text => Ok(document.create_text_node(&node.data().unwrap_or_default()).into()),
		NodeType::Comment => Ok(document.create_comment(&node.data().unwrap_or_default()).into()),
		NodeType::Document => Err(JsValue::from_str("peaceful-dom: Documents can't be projected.")),
	}
}

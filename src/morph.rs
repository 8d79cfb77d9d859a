//! In-place tree morphing: transforms a live subtree into the shape of a freshly built one,
//! reusing live nodes wherever they are compatible.
//!
//! Elements with an `id` attribute are matched by that key among their siblings.
//! Other nodes are matched in order against the first compatible unkeyed sibling.
//! New nodes that have no live counterpart are *moved* out of the target tree into the live one.

use crate::{dom::Node, redact};
use tracing::{instrument, trace, trace_span, warn};

/// Patches `from` in place until it matches `to`.
///
/// `on_before_el_updated` is called for each matched pair of elements, before the pair's attributes and children are patched.
/// It may mutate either node (or their subtrees) to steer the patch, and returns `false` to leave the live node of the pair as it is.
///
/// Returns `from`, or `to` if the roots were incompatible and `to` replaced `from` in its parent.
///
/// # Errors
///
/// Iff `on_before_el_updated` fails. The patch stops there and is left partially applied.
#[instrument(skip(on_before_el_updated))]
pub fn morph<F, E>(from: &Node, to: &Node, mut on_before_el_updated: F) -> Result<Node, E>
where
	F: FnMut(&Node, &Node) -> Result<bool, E>,
{
	if compatible(from, to) {
		morph_node(from, to, &mut on_before_el_updated)?;
		Ok(from.clone())
	} else {
		warn!("Incompatible roots; replacing the live node.");
		if let Some(parent) = from.parent() {
			parent.replace_child(to, from);
		}
		Ok(to.clone())
	}
}

fn compatible(a: &Node, b: &Node) -> bool {
	a.node_type() == b.node_type() && a.name() == b.name()
}

fn key(node: &Node) -> Option<String> {
	node.attribute("id")
}

fn morph_node<F, E>(from: &Node, to: &Node, on_before_el_updated: &mut F) -> Result<(), E>
where
	F: FnMut(&Node, &Node) -> Result<bool, E>,
{
	if from.is_element() {
		return morph_element(from, to, on_before_el_updated);
	}
	match (from.data(), to.data()) {
		(Some(old), Some(new)) => {
			if old != new {
				trace!(old = redact(&old), new = redact(&new), "Updating character data.");
				from.set_data(new);
			}
			Ok(())
		}
		_ => morph_children(from, to, on_before_el_updated),
	}
}

fn morph_element<F, E>(from: &Node, to: &Node, on_before_el_updated: &mut F) -> Result<(), E>
where
	F: FnMut(&Node, &Node) -> Result<bool, E>,
{
	let span = trace_span!("Morphing element", name = ?from.name());
	let _enter = span.enter();

	if !on_before_el_updated(from, to)? {
		trace!("Left as is.");
		return Ok(());
	}
	morph_attributes(from, to);
	morph_children(from, to, on_before_el_updated)?;

	if from.control_kind().has_editable_value() {
		if let (Some(old), Some(new)) = (from.value(), to.value()) {
			if old != new {
				trace!(old = redact(&old), new = redact(&new), "Synchronising form value.");
				from.set_value(new);
			}
		}
	}
	Ok(())
}

fn morph_attributes(from: &Node, to: &Node) {
	let target = to.attributes();
	for (name, value) in &target {
		if from.attribute(name).as_ref() != Some(value) {
			trace!(%name, value = redact(value), "Setting attribute.");
			from.set_attribute(name, value.as_str());
		}
	}
	for (name, _) in from.attributes() {
		if !target.iter().any(|(n, _)| *n == name) {
			trace!(%name, "Removing attribute.");
			from.remove_attribute(&name);
		}
	}
}

fn morph_children<F, E>(from: &Node, to: &Node, on_before_el_updated: &mut F) -> Result<(), E>
where
	F: FnMut(&Node, &Node) -> Result<bool, E>,
{
	let mut cursor = from.first_child();
	for to_child in to.children() {
		let matched = match key(&to_child) {
			Some(key) => siblings_from(cursor.clone()).find(|candidate| compatible(candidate, &to_child) && self::key(candidate).as_ref() == Some(&key)),
			None => siblings_from(cursor.clone()).find(|candidate| compatible(candidate, &to_child) && self::key(candidate).is_none()),
		};

		match matched {
			Some(matched) => {
				if cursor.as_ref().map_or(false, |cursor| cursor.same_node(&matched)) {
					cursor = matched.next_sibling();
				} else {
					from.insert_before(&matched, cursor.as_ref());
				}
				morph_node(&matched, &to_child, on_before_el_updated)?;
			}
			None => {
				trace!(name = ?to_child.name(), "Inserting new node.");
				from.insert_before(&to_child, cursor.as_ref());
			}
		}
	}

	while let Some(stale) = cursor {
		cursor = stale.next_sibling();
		trace!(name = ?stale.name(), "Removing stale node.");
		from.remove_child(&stale);
	}
	Ok(())
}

fn siblings_from(first: Option<Node>) -> impl Iterator<Item = Node> {
	let mut next = first;
	std::iter::from_fn(move || {
		let current = next.take()?;
		next = current.next_sibling();
		Some(current)
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::parse::parse_element;
	use core::convert::Infallible;

	fn no_op(_: &Node, _: &Node) -> Result<bool, Infallible> {
		Ok(true)
	}

	#[test]
	fn patches_in_place() {
		let live = parse_element("<div class=a><p>one</p><span>two</span></div>").unwrap();
		let paragraph = live.first_child().unwrap();
		let next = parse_element("<div title=t><p>uno</p><em>dos</em></div>").unwrap();

		let result = morph(&live, &next, no_op).unwrap();
		assert!(result.same_node(&live));
		assert_eq!(live.to_string(), "<div title=\"t\"><p>uno</p><em>dos</em></div>");
		assert!(live.first_child().unwrap().same_node(&paragraph));
	}

	#[test]
	fn keyed_children_keep_identity_when_reordered() {
		let live = parse_element("<ul><li id=a>A</li><li id=b>B</li><li id=c>C</li></ul>").unwrap();
		let old = live.children();
		let next = parse_element("<ul><li id=c>C</li><li id=a>A!</li></ul>").unwrap();

		morph(&live, &next, no_op).unwrap();
		let children = live.children();
		assert_eq!(children.len(), 2);
		assert!(children[0].same_node(&old[2]));
		assert!(children[1].same_node(&old[0]));
		assert_eq!(live.text_content(), "CA!");
	}

	#[test]
	fn callback_sees_each_element_pair_first() {
		let live = parse_element("<div><p>x</p><p>y</p></div>").unwrap();
		let next = parse_element("<div><p>x</p><p>z</p></div>").unwrap();
		let mut seen = Vec::new();
		morph(&live, &next, |from: &Node, to: &Node| -> Result<bool, Infallible> {
			seen.push((from.name(), to.text_content()));
			Ok(true)
		})
		.unwrap();
		assert_eq!(
			seen,
			vec![
				(Some("div".to_owned()), "xz".to_owned()),
				(Some("p".to_owned()), "x".to_owned()),
				(Some("p".to_owned()), "z".to_owned()),
			]
		);
	}

	#[test]
	fn callback_errors_abort() {
		let live = parse_element("<div><p>x</p></div>").unwrap();
		let next = parse_element("<div><p>y</p></div>").unwrap();
		let result = morph(&live, &next, |from: &Node, _: &Node| if from.name().as_deref() == Some("p") { Err("stop") } else { Ok(true) });
		assert_eq!(result.unwrap_err(), "stop");
		assert_eq!(live.text_content(), "x");
	}

	#[test]
	fn declined_pairs_are_left_alone() {
		let live = parse_element("<div><section class=a>x</section><p>y</p></div>").unwrap();
		let next = parse_element("<div><section class=b>z</section><p>w</p></div>").unwrap();
		morph(&live, &next, |from: &Node, _: &Node| -> Result<bool, Infallible> { Ok(from.name().as_deref() != Some("section")) }).unwrap();
		assert_eq!(live.to_string(), "<div><section class=\"a\">x</section><p>w</p></div>");
	}

	#[test]
	fn incompatible_roots_are_replaced() {
		let parent = Node::element("main");
		let live = Node::element("div");
		parent.append_child(&live);
		let next = Node::element("section");

		let result = morph(&live, &next, no_op).unwrap();
		assert!(result.same_node(&next));
		assert!(parent.first_child().unwrap().same_node(&next));
	}

	#[test]
	fn live_form_values_follow_the_new_tree() {
		let live = parse_element("<input value=a>").unwrap();
		live.set_value("typed");
		let next = parse_element("<input value=b>").unwrap();
		morph(&live, &next, no_op).unwrap();
		assert_eq!(live.value().as_deref(), Some("b"));
	}
}

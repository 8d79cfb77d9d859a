//! Attach/detach notifications for elements.
//!
//! Registered elements are marked with an [`ON_LOAD_ATTRIBUTE`] carrying a unique id.
//! Whenever a [`Document`] flushes its mutations, each registration is checked:
//! an element that is in that document *and still carries its marker* counts as attached.
//!
//! Since only the marker is checked, patches may move or rebuild an element freely as long as the marker is kept.

use crate::dom::{Document, Node, WeakNode};
use core::cell::RefCell;
use std::collections::BTreeMap;
use tracing::{debug, instrument, trace};

/// Marker attribute name. Contains [`ON_LOAD_MARKER`](`crate::merge::ON_LOAD_MARKER`).
pub const ON_LOAD_ATTRIBUTE: &str = "data-onloadid";

type Callback = Box<dyn FnOnce()>;

struct Registration {
	node: WeakNode,
	on_load: Option<Callback>,
	on_unload: Option<Callback>,
	loaded: bool,
}

#[derive(Default)]
struct Registry {
	next_id: u64,
	// Ordered by registration, which is also the notification order.
	registrations: BTreeMap<u64, Registration>,
}

thread_local! {
	static REGISTRY: RefCell<Registry> = RefCell::new(Registry::default());
}

/// Calls `on_load` once `node` is attached to a document, and then `on_unload` once it is detached again.
///
/// Each callback runs at most once. The registration only holds `node` weakly;
/// dropping it before it was ever attached silently discards the registration.
pub fn on_load(node: &Node, on_load: impl FnOnce() + 'static, on_unload: impl FnOnce() + 'static) {
	let id = REGISTRY.with(|registry| {
		let mut registry = registry.borrow_mut();
		registry.next_id += 1;
		let id = registry.next_id;
		registry.registrations.insert(
			id,
			Registration {
				node: node.downgrade(),
				on_load: Some(Box::new(on_load)),
				on_unload: Some(Box::new(on_unload)),
				loaded: false,
			},
		);
		id
	});
	trace!(id, "Registered for attach/detach notifications.");
	node.set_attribute(ON_LOAD_ATTRIBUTE, marker(id));
}

/// The number of registrations that are still waiting for a notification.
#[must_use]
pub fn pending_registrations() -> usize {
	REGISTRY.with(|registry| registry.borrow().registrations.len())
}

/// Hands the registration marked on `from` over to `to`, for when `to` replaced `from` as a whole.
///
/// The registration keeps its state, so this is neither a detach nor an attach.
/// Does nothing if `from` carries no current marker.
pub fn transfer(from: &Node, to: &Node) {
	let id = match from.attribute(ON_LOAD_ATTRIBUTE).and_then(|marker| marker.strip_prefix('o').and_then(|id| id.parse::<u64>().ok())) {
		Some(id) => id,
		None => return,
	};
	let moved = REGISTRY.with(|registry| match registry.borrow_mut().registrations.get_mut(&id) {
		Some(registration) if registration.node.upgrade().map_or(false, |node| node.same_node(from)) => {
			registration.node = to.downgrade();
			true
		}
		_ => false,
	});
	if moved {
		trace!(id, "Registration moved to a replacement node.");
		from.remove_attribute(ON_LOAD_ATTRIBUTE);
		to.set_attribute(ON_LOAD_ATTRIBUTE, marker(id));
	}
}

fn marker(id: u64) -> String {
	format!("o{}", id)
}

enum Placement {
	Attached,
	Detached,
	/// In a different document, which is responsible for it.
	Elsewhere,
}

fn placement(id: u64, node: Option<Node>, document: &Document) -> Placement {
	let node = match node {
		Some(node) => node,
		None => return Placement::Detached,
	};
	let root = node.root();
	if root.same_node(document.node()) {
		if node.attribute(ON_LOAD_ATTRIBUTE) == Some(marker(id)) {
			Placement::Attached
		} else {
			Placement::Detached
		}
	} else if root.is_connected() {
		Placement::Elsewhere
	} else {
		Placement::Detached
	}
}

/// Runs due notifications for registrations that belong to `document` (or to no document at all).
///
/// Callbacks run after the registry was updated, so they may register further elements.
#[instrument(skip_all)]
pub fn observe(document: &Document) {
	let mut due: Vec<Callback> = Vec::new();
	REGISTRY.with(|registry| {
		registry.borrow_mut().registrations.retain(|&id, registration| {
			let node = registration.node.upgrade();
			let alive = node.is_some();
			match (registration.loaded, placement(id, node, document)) {
				(false, Placement::Attached) => {
					trace!(id, "Attached.");
					registration.loaded = true;
					due.extend(registration.on_load.take());
					true
				}
				(true, Placement::Detached) => {
					trace!(id, "Detached.");
					due.extend(registration.on_unload.take());
					false
				}
				(false, Placement::Detached) => alive,
				(_, Placement::Elsewhere) | (true, Placement::Attached) => true,
			}
		});
	});

	if !due.is_empty() {
		debug!(count = due.len(), "Delivering attach/detach notifications.");
	}
	for callback in due {
		callback();
	}
}

//! The per-node merge policy applied while an instance patches its live element.

use crate::{component::same_instance, dom::Node, error::Error, redact};
use tracing::{debug, instrument, trace};

/// Event-handler properties that are carried over from freshly rendered nodes onto live ones.
///
/// Handler properties aren't attributes, so morphing alone would never transfer them.
pub const EVENT_HANDLERS: &[&str] = &[
	// mouse
	"onclick",
	"ondblclick",
	"onmousedown",
	"onmouseup",
	"onmouseover",
	"onmousemove",
	"onmouseout",
	"onmouseenter",
	"onmouseleave",
	// touch
	"ontouchcancel",
	"ontouchend",
	"ontouchmove",
	"ontouchstart",
	// drag
	"ondragstart",
	"ondrag",
	"ondragenter",
	"ondragleave",
	"ondragover",
	"ondrop",
	"ondragend",
	// keyboard
	"onkeydown",
	"onkeypress",
	"onkeyup",
	// frame/object
	"onunload",
	"onabort",
	"onerror",
	"onresize",
	"onscroll",
	// form
	"onselect",
	"onchange",
	"onsubmit",
	"onreset",
	"onfocus",
	"onblur",
	"oninput",
	// other
	"oncontextmenu",
	"onfocusin",
	"onfocusout",
];

/// Attributes whose name contains this belong to the mount/unmount bridge.
pub const ON_LOAD_MARKER: &str = "data-onload";

/// Prepares a matched pair of live (`from`) and freshly rendered (`to`) elements for patching.
///
/// In order:
///
/// 1. If both nodes were rendered by different component instances, the live instance receives the new props
///    if they differ (and may re-render itself). The fresh instance is discarded.
///    The live instance is in charge of its own element, so the pair is left alone by the surrounding patch.
/// 2. Whitelisted [event handlers](`EVENT_HANDLERS`) are copied onto the live node, or cleared there.
/// 3. Mount/unmount bridge markers are copied onto the fresh node, so the patch keeps them.
/// 4. Unless the fresh node specifies a `value` attribute, the live form value is copied onto it.
///
/// Returns whether the pair should be patched.
///
/// # Errors
///
/// Iff the live instance fails to re-render.
#[instrument(skip_all)]
pub fn on_before_el_updated(from: &Node, to: &Node) -> Result<bool, Error> {
	if propagate_props(from, to)? {
		return Ok(false);
	}
	copy_event_handlers(from, to);
	copy_on_load_markers(from, to);
	copy_form_value(from, to);
	Ok(true)
}

/// Returns whether `from` belongs to a nested instance.
fn propagate_props(from: &Node, to: &Node) -> Result<bool, Error> {
	match (from.owner(), to.owner()) {
		(Some(live), Some(fresh)) if !same_instance(&live, &fresh) => {
			let next_props = fresh.current_props();
			if live.current_props() != next_props {
				debug!(component = live.component_name(), "Props changed; passing them to the live instance.");
				live.receive_props(&next_props)?;
			}
			Ok(true)
		}
		_ => Ok(false),
	}
}

fn copy_event_handlers(from: &Node, to: &Node) {
	for &name in EVENT_HANDLERS {
		match to.handler(name) {
			Some(handler) => from.set_handler(name, Some(handler)),
			None => {
				if from.handler(name).is_some() {
					trace!(name, "Clearing event handler.");
					from.set_handler(name, None)
				}
			}
		}
	}
}

fn copy_on_load_markers(from: &Node, to: &Node) {
	for (name, value) in from.attributes() {
		if name.contains(ON_LOAD_MARKER) {
			trace!(%name, %value, "Keeping mount marker.");
			to.set_attribute(&name, value);
		}
	}
}

fn copy_form_value(from: &Node, to: &Node) {
	if from.control_kind().has_editable_value() && !to.has_attribute("value") {
		if let Some(value) = from.value() {
			trace!(value = redact(&value), "Keeping live form value.");
			to.set_value(value);
		}
	}
}

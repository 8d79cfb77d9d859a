//! Stateful components: props, state, a render contract and lifecycle hooks.
//!
//! An [`Instance`] owns one live element at most. Updates re-render the component
//! and morph the result into that element in place, so nested instances,
//! event handlers and typed-in form values survive re-renders.
//!
//! # Ownership
//!
//! Every element an instance renders is tagged with that instance, but neither side owns the other:
//! the tag and the instance's handle to its element are both weak.
//! A mounted instance is kept alive by its mount/unmount bridge registration until it is detached,
//! and after that only by whoever else holds its [`Rc`].

use crate::{
	dom::{Node, WeakNode},
	error::Error,
	merge,
	morph::morph,
	on_load,
	parse::parse_element,
};
use core::{
	any::type_name,
	cell::{Cell, RefCell},
	fmt::{self, Debug, Formatter},
	ptr,
};
use serde_json::{Map, Value};
use std::rc::{Rc, Weak};
use tracing::{debug, error, instrument, trace, warn};

/// External data, passed in by the owner of an instance.
pub type Props = Map<String, Value>;

/// Internal data of an instance.
pub type State = Map<String, Value>;

/// What [`Component::render`] returns.
#[derive(Debug, Clone)]
pub enum Rendered {
	Element(Node),
	/// Markup that must parse into exactly one element.
	Markup(String),
}
impl From<Node> for Rendered {
	fn from(node: Node) -> Self {
		Self::Element(node)
	}
}
impl From<String> for Rendered {
	fn from(markup: String) -> Self {
		Self::Markup(markup)
	}
}
impl From<&str> for Rendered {
	fn from(markup: &str) -> Self {
		Self::Markup(markup.to_owned())
	}
}

/// What mounting produced.
#[derive(Debug, Clone)]
pub enum Mounted {
	Element(Node),
	Markup(String),
}
impl Mounted {
	/// # Errors
	///
	/// Iff the instance was mounted as markup.
	pub fn into_element(self) -> Result<Node, Error> {
		match self {
			Mounted::Element(element) => Ok(element),
			Mounted::Markup(_) => Err(Error::MountedAsMarkup),
		}
	}

	#[must_use]
	pub fn markup(&self) -> Option<&str> {
		match self {
			Mounted::Element(_) => None,
			Mounted::Markup(markup) => Some(markup),
		}
	}
}

/// Lifecycle state of an [`Instance`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
	Unmounted,
	Mounted,
	Updating,
	Unmounting,
	/// Unmounted for good.
	Retired,
}

/// A component definition. Everything but [`render`](`Component::render`) is optional.
///
/// Hooks receive the [`Instance`] they run for, to read props and state or to call [`Instance::set_state`].
#[allow(unused_variables)]
pub trait Component: Sized + 'static {
	/// Computes the state of a new instance.
	fn initial_state(&self, props: &Props) -> State {
		State::new()
	}

	/// # Errors
	///
	/// [`Error::RenderNotImplemented`] unless overridden.
	fn render(&self, this: &Instance<Self>) -> Result<Rendered, Error> {
		Err(Error::RenderNotImplemented { component: type_name::<Self>() })
	}

	/// Runs once, before the first render.
	///
	/// # Errors
	///
	/// Errors are returned from [`Instance::mount`].
	fn component_will_mount(&self, this: &Instance<Self>) -> Result<(), Error> {
		Ok(())
	}

	/// Runs once the element is attached to a document.
	///
	/// # Errors
	///
	/// Errors are logged.
	fn component_did_mount(&self, this: &Instance<Self>) -> Result<(), Error> {
		Ok(())
	}

	/// Runs when an ancestor re-renders this component with different props, before they are merged.
	///
	/// # Errors
	///
	/// Errors abort the ancestor's update.
	fn component_will_receive_props(&self, this: &Instance<Self>, next_props: &Props) -> Result<(), Error> {
		Ok(())
	}

	/// Decides whether an update re-renders. Props and state are merged either way.
	fn should_component_update(&self, this: &Instance<Self>, next_props: &Props, next_state: &State) -> bool {
		true
	}

	/// Runs before a re-render, with the already merged props and state.
	///
	/// [`Instance::set_state`] fails in here.
	///
	/// # Errors
	///
	/// Errors abort the update before anything is patched.
	fn component_will_update(&self, this: &Instance<Self>, props: &Props, state: &State) -> Result<(), Error> {
		Ok(())
	}

	/// Runs after the live element was patched.
	///
	/// # Errors
	///
	/// Errors are returned from the update that triggered this hook.
	fn component_did_update(&self, this: &Instance<Self>, prev_props: &Props, prev_state: &State) -> Result<(), Error> {
		Ok(())
	}

	/// Runs once the element was detached from its document.
	///
	/// # Errors
	///
	/// Errors are logged.
	fn component_will_unmount(&self, this: &Instance<Self>) -> Result<(), Error> {
		Ok(())
	}
}

enum Output {
	Element(WeakNode),
	Markup(String),
}

pub struct Instance<C> {
	component: C,
	this: Weak<Self>,
	props: RefCell<Props>,
	state: RefCell<State>,
	output: RefCell<Option<Output>>,
	phase: Cell<Phase>,
	should_update: Cell<bool>,
	update_lock: Cell<bool>,
}

impl<C: Component> Instance<C> {
	#[must_use]
	pub fn new(component: C, props: Props) -> Rc<Self> {
		let state = component.initial_state(&props);
		Rc::new_cyclic(|this| Self {
			component,
			this: this.clone(),
			props: RefCell::new(props),
			state: RefCell::new(state),
			output: RefCell::new(None),
			phase: Cell::new(Phase::Unmounted),
			should_update: Cell::new(false),
			update_lock: Cell::new(false),
		})
	}

	#[must_use]
	pub fn component(&self) -> &C {
		&self.component
	}

	#[must_use]
	pub fn props(&self) -> Props {
		self.props.borrow().clone()
	}

	#[must_use]
	pub fn state(&self) -> State {
		self.state.borrow().clone()
	}

	#[must_use]
	pub fn phase(&self) -> Phase {
		self.phase.get()
	}

	/// The live element, if mounted as one and still alive.
	#[must_use]
	pub fn element(&self) -> Option<Node> {
		match &*self.output.borrow() {
			Some(Output::Element(element)) => element.upgrade(),
			_ => None,
		}
	}

	/// Renders the instance into its element and registers it for [`component_did_mount`](`Component::component_did_mount`)
	/// and [`component_will_unmount`](`Component::component_will_unmount`) notifications.
	///
	/// Once mounted, this returns the existing output without rendering again.
	///
	/// # Errors
	///
	/// Iff [`component_will_mount`](`Component::component_will_mount`) or rendering fails,
	/// or if the previously mounted element was dropped.
	#[instrument(skip(self), fields(component = type_name::<C>()))]
	pub fn mount(&self) -> Result<Mounted, Error> {
		if let Some(mounted) = self.mounted()? {
			trace!("Already mounted.");
			return Ok(mounted);
		}

		self.component.component_will_mount(self)?;
		let element = self.materialize()?;
		*self.output.borrow_mut() = Some(Output::Element(element.downgrade()));
		self.phase.set(Phase::Mounted);

		if let Some(this) = self.this.upgrade() {
			let unloading = Rc::clone(&this);
			on_load::on_load(&element, move || this.loaded(), move || unloading.unloaded());
		}

		debug!("Mounted.");
		Ok(Mounted::Element(element))
	}

	/// Renders the instance into markup instead of an element.
	///
	/// Nothing is tagged or registered, and later updates never render again.
	/// Once mounted, this returns the existing output without rendering again.
	///
	/// # Errors
	///
	/// Iff [`component_will_mount`](`Component::component_will_mount`) or rendering fails.
	#[instrument(skip(self), fields(component = type_name::<C>()))]
	pub fn mount_to_string(&self) -> Result<Mounted, Error> {
		if let Some(mounted) = self.mounted()? {
			trace!("Already mounted.");
			return Ok(mounted);
		}

		self.component.component_will_mount(self)?;
		let markup = match self.component.render(self)? {
			Rendered::Element(element) => element.to_string(),
			Rendered::Markup(markup) => markup,
		};
		*self.output.borrow_mut() = Some(Output::Markup(markup.clone()));
		self.phase.set(Phase::Mounted);

		debug!("Mounted as markup.");
		Ok(Mounted::Markup(markup))
	}

	/// Shallowly merges `partial` into the state and, if [`should_component_update`](`Component::should_component_update`) agrees,
	/// re-renders and patches the live element.
	///
	/// # Errors
	///
	/// [`Error::ReentrantSetState`] if called from [`component_will_update`](`Component::component_will_update`),
	/// otherwise iff re-rendering or a hook fails. The state stays merged in that case.
	#[instrument(skip(self, partial), fields(component = type_name::<C>()))]
	pub fn set_state(&self, partial: State) -> Result<(), Error> {
		if self.update_lock.get() {
			return Err(Error::ReentrantSetState { component: type_name::<C>() });
		}

		let props = self.props();
		let mut next_state = self.state();
		merge_shallow(&mut next_state, &partial);
		self.should_update.set(self.component.should_component_update(self, &props, &next_state));
		self.update(&props, &partial)
	}

	fn mounted(&self) -> Result<Option<Mounted>, Error> {
		match &*self.output.borrow() {
			None => Ok(None),
			Some(Output::Markup(markup)) => Ok(Some(Mounted::Markup(markup.clone()))),
			Some(Output::Element(element)) => element.upgrade().map(|element| Some(Mounted::Element(element))).ok_or(Error::ElementReleased),
		}
	}

	/// Renders into a concrete element tagged with this instance.
	fn materialize(&self) -> Result<Node, Error> {
		let component = type_name::<C>();
		let element = match self.component.render(self)? {
			Rendered::Element(element) => element,
			Rendered::Markup(markup) => parse_element(&markup).map_err(|source| Error::InvalidMarkup { component, source })?,
		};
		if !element.is_element() {
			return Err(Error::NotAnElement { component });
		}

		if let Some(this) = self.this.upgrade() {
			let this: Rc<dyn Owner> = this;
			if !element.tag_owner(&this) {
				warn!(component, "The rendered element already belongs to another instance, which stays its owner.");
			}
		}
		Ok(element)
	}

	fn update(&self, next_props: &Props, next_state: &State) -> Result<(), Error> {
		let prev_props = self.props();
		let prev_state = self.state();
		merge_shallow(&mut self.props.borrow_mut(), next_props);
		merge_shallow(&mut self.state.borrow_mut(), next_state);

		if !self.should_update.get() {
			trace!("Skipping re-render.");
			return Ok(());
		}
		let element = match self.element() {
			Some(element) => element,
			None => {
				trace!("No live element to patch.");
				return Ok(());
			}
		};

		let phase = self.phase.replace(Phase::Updating);
		let patched = self.patch(&element);
		self.phase.set(phase);
		patched?;

		self.component.component_did_update(self, &prev_props, &prev_state)
	}

	fn patch(&self, element: &Node) -> Result<(), Error> {
		let props = self.props();
		let state = self.state();
		self.update_lock.set(true);
		let will_update = self.component.component_will_update(self, &props, &state);
		self.update_lock.set(false);
		will_update?;

		let next = self.materialize()?;
		let patched = morph(element, &next, merge::on_before_el_updated)?;
		if !patched.same_node(element) {
			// Root tag changed. The bridge registration has to follow the new root.
			debug!("The live element was replaced.");
			on_load::transfer(element, &patched);
			*self.output.borrow_mut() = Some(Output::Element(patched.downgrade()));
		}
		Ok(())
	}

	fn loaded(&self) {
		debug!(component = type_name::<C>(), "Attached.");
		if let Err(error) = self.component.component_did_mount(self) {
			error!(component = type_name::<C>(), %error, "component_did_mount failed.");
		}
	}

	fn unloaded(&self) {
		debug!(component = type_name::<C>(), "Detached.");
		self.phase.set(Phase::Unmounting);
		if let Err(error) = self.component.component_will_unmount(self) {
			error!(component = type_name::<C>(), %error, "component_will_unmount failed.");
		}
		self.phase.set(Phase::Retired);
	}
}

impl<C> Debug for Instance<C> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("Instance")
			.field("component", &type_name::<C>())
			.field("props", &self.props.borrow())
			.field("state", &self.state.borrow())
			.field("phase", &self.phase.get())
			.finish()
	}
}

/// The type-erased view of an [`Instance`] that element tags refer to.
pub(crate) trait Owner {
	fn component_name(&self) -> &'static str;
	fn current_props(&self) -> Props;

	/// Absorbs props from a re-rendering ancestor and re-renders if due.
	fn receive_props(&self, next_props: &Props) -> Result<(), Error>;
}

impl<C: Component> Owner for Instance<C> {
	fn component_name(&self) -> &'static str {
		type_name::<C>()
	}

	fn current_props(&self) -> Props {
		self.props()
	}

	#[instrument(skip_all, fields(component = type_name::<C>()))]
	fn receive_props(&self, next_props: &Props) -> Result<(), Error> {
		self.should_update.set(false);
		self.component.component_will_receive_props(self, next_props)?;
		let state = self.state();
		self.should_update.set(self.component.should_component_update(self, next_props, &state));
		self.update(next_props, &state)
	}
}

pub(crate) fn same_instance(a: &Rc<dyn Owner>, b: &Rc<dyn Owner>) -> bool {
	ptr::eq(Rc::as_ptr(a).cast::<u8>(), Rc::as_ptr(b).cast::<u8>())
}

fn merge_shallow(target: &mut Map<String, Value>, source: &Map<String, Value>) {
	for (key, value) in source {
		target.insert(key.clone(), value.clone());
	}
}

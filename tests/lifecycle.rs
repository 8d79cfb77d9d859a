use peaceful_dom::{error::Error, on_load, props, Component, Document, Instance, Node, Phase, Props, Rendered, State};
use peaceful_dom::serde_json::json;
use std::{
	cell::{Cell, RefCell},
	rc::Rc,
};

mod log_;

#[derive(Default)]
struct Counter {
	frozen: Cell<bool>,
	calls: RefCell<Vec<&'static str>>,
	did_update: RefCell<Vec<(Props, State)>>,
}

impl Component for Counter {
	fn initial_state(&self, _: &Props) -> State {
		props! { "count": 0 }
	}

	fn render(&self, this: &Instance<Self>) -> Result<Rendered, Error> {
		self.calls.borrow_mut().push("render");
		Ok(format!("<p>{}</p>", this.state()["count"]).into())
	}

	fn component_will_mount(&self, _: &Instance<Self>) -> Result<(), Error> {
		self.calls.borrow_mut().push("will_mount");
		Ok(())
	}

	fn component_did_mount(&self, _: &Instance<Self>) -> Result<(), Error> {
		self.calls.borrow_mut().push("did_mount");
		Ok(())
	}

	fn should_component_update(&self, _: &Instance<Self>, _: &Props, _: &State) -> bool {
		self.calls.borrow_mut().push("should_update");
		!self.frozen.get()
	}

	fn component_will_update(&self, _: &Instance<Self>, _: &Props, _: &State) -> Result<(), Error> {
		self.calls.borrow_mut().push("will_update");
		Ok(())
	}

	fn component_did_update(&self, _: &Instance<Self>, prev_props: &Props, prev_state: &State) -> Result<(), Error> {
		self.calls.borrow_mut().push("did_update");
		self.did_update.borrow_mut().push((prev_props.clone(), prev_state.clone()));
		Ok(())
	}

	fn component_will_unmount(&self, _: &Instance<Self>) -> Result<(), Error> {
		self.calls.borrow_mut().push("will_unmount");
		Ok(())
	}
}

fn attached_counter(document: &Document) -> (Rc<Instance<Counter>>, Node) {
	let counter = Instance::new(Counter::default(), Props::new());
	let element = counter.mount().unwrap().into_element().unwrap();
	document.body().append_child(&element);
	document.flush_mutations();
	(counter, element)
}

#[test]
fn set_state_patches_the_live_element() {
	log_::init();
	let document = Document::new();
	let (counter, element) = attached_counter(&document);
	assert_eq!(element.text_content(), "0");

	counter.set_state(props! { "count": 1 }).unwrap();

	assert_eq!(element.text_content(), "1");
	assert!(counter.element().unwrap().same_node(&element));
	assert!(document.body().first_child().unwrap().same_node(&element));
	assert_eq!(*counter.component().did_update.borrow(), vec![(Props::new(), props! { "count": 0 })]);
	assert_eq!(counter.phase(), Phase::Mounted);
}

#[test]
fn hooks_run_in_order() {
	log_::init();
	let document = Document::new();
	let counter = Instance::new(Counter::default(), Props::new());
	assert_eq!(counter.phase(), Phase::Unmounted);

	let element = counter.mount().unwrap().into_element().unwrap();
	assert_eq!(*counter.component().calls.borrow(), ["will_mount", "render"]);
	assert_eq!(counter.phase(), Phase::Mounted);

	document.flush_mutations();
	assert_eq!(counter.component().calls.borrow().len(), 2);

	document.body().append_child(&element);
	document.flush_mutations();
	assert_eq!(*counter.component().calls.borrow(), ["will_mount", "render", "did_mount"]);

	counter.set_state(props! { "count": 2 }).unwrap();
	assert_eq!(
		*counter.component().calls.borrow(),
		["will_mount", "render", "did_mount", "should_update", "will_update", "render", "did_update"]
	);

	element.remove();
	document.flush_mutations();
	assert_eq!(counter.component().calls.borrow().last(), Some(&"will_unmount"));
	assert_eq!(counter.phase(), Phase::Retired);

	document.body().append_child(&element);
	document.flush_mutations();
	assert_eq!(counter.component().calls.borrow().iter().filter(|&&call| call == "did_mount").count(), 1);
}

#[test]
fn skipped_updates_still_merge_state() {
	log_::init();
	let document = Document::new();
	let (counter, element) = attached_counter(&document);
	counter.component().frozen.set(true);

	counter.set_state(props! { "count": 5, "extra": "x" }).unwrap();

	assert_eq!(element.text_content(), "0");
	assert_eq!(counter.state(), props! { "count": 5, "extra": "x" });
	assert!(counter.component().did_update.borrow().is_empty());

	counter.component().frozen.set(false);
	counter.set_state(props! { "extra": "y" }).unwrap();
	assert_eq!(element.text_content(), "5");
	assert_eq!(*counter.component().did_update.borrow(), vec![(Props::new(), props! { "count": 5, "extra": "x" })]);
}

#[test]
fn state_is_the_fold_of_all_partials() {
	log_::init();
	let document = Document::new();
	let (counter, element) = attached_counter(&document);
	let partials = vec![
		props! { "count": 1 },
		props! { "label": "a" },
		props! { "count": 2, "label": null },
		props! {},
		props! { "nested": { "deep": true } },
		props! { "nested": { "other": 1 } },
		props! { "count": 3 },
	];

	let mut expected = counter.state();
	for (i, partial) in partials.into_iter().enumerate() {
		counter.component().frozen.set(i % 2 == 1);
		for (key, value) in &partial {
			expected.insert(key.clone(), value.clone());
		}
		counter.set_state(partial).unwrap();
		assert_eq!(counter.state(), expected);
	}

	// Shallow: nested objects are replaced, not merged.
	assert_eq!(counter.state()["nested"], json!({ "other": 1 }));
	assert_eq!(element.text_content(), "3");
}

#[derive(Default)]
struct Sneaky {
	enabled: Cell<bool>,
}

impl Component for Sneaky {
	fn initial_state(&self, _: &Props) -> State {
		props! { "value": "a" }
	}

	fn render(&self, this: &Instance<Self>) -> Result<Rendered, Error> {
		Ok(Node::element("span").with_text(this.state()["value"].as_str().unwrap_or_default()).into())
	}

	fn component_will_update(&self, this: &Instance<Self>, _: &Props, _: &State) -> Result<(), Error> {
		if self.enabled.get() {
			this.set_state(props! { "value": "sneaky" })?;
		}
		Ok(())
	}
}

#[test]
fn set_state_is_refused_during_will_update() {
	log_::init();
	let document = Document::new();
	let sneaky = Instance::new(Sneaky::default(), Props::new());
	let element = sneaky.mount().unwrap().into_element().unwrap();
	document.body().append_child(&element);
	document.flush_mutations();

	sneaky.component().enabled.set(true);
	let result = sneaky.set_state(props! { "value": "b" });
	assert!(matches!(result, Err(Error::ReentrantSetState { .. })), "{:?}", result);
	assert_eq!(element.text_content(), "a");
	assert_eq!(sneaky.state()["value"], "b");
	assert_eq!(sneaky.phase(), Phase::Mounted);

	sneaky.component().enabled.set(false);
	sneaky.set_state(props! { "value": "c" }).unwrap();
	assert_eq!(element.text_content(), "c");
}

#[test]
fn mount_is_idempotent() {
	log_::init();
	let counter = Instance::new(Counter::default(), Props::new());
	let first = counter.mount().unwrap().into_element().unwrap();
	let second = counter.mount().unwrap().into_element().unwrap();
	assert!(first.same_node(&second));
	assert_eq!(*counter.component().calls.borrow(), ["will_mount", "render"]);
	assert!(first.has_owner());
	assert!(first.has_attribute(on_load::ON_LOAD_ATTRIBUTE));
}

#[test]
fn set_state_before_mount_only_merges() {
	log_::init();
	let counter = Instance::new(Counter::default(), Props::new());
	counter.set_state(props! { "count": 4 }).unwrap();
	assert_eq!(counter.state()["count"], 4);
	assert!(counter.component().did_update.borrow().is_empty());

	let element = counter.mount().unwrap().into_element().unwrap();
	assert_eq!(element.text_content(), "4");
}

#[test]
fn dropped_elements_are_reported() {
	log_::init();
	let counter = Instance::new(Counter::default(), Props::new());
	drop(counter.mount().unwrap());
	assert!(counter.element().is_none());
	assert!(matches!(counter.mount(), Err(Error::ElementReleased)));
}

#[test]
fn string_mounts_stay_inert() {
	log_::init();
	let before = on_load::pending_registrations();
	let counter = Instance::new(Counter::default(), Props::new());

	let mounted = counter.mount_to_string().unwrap();
	assert_eq!(mounted.markup(), Some("<p>0</p>"));
	assert!(matches!(mounted.into_element(), Err(Error::MountedAsMarkup)));
	assert_eq!(on_load::pending_registrations(), before);
	assert!(counter.element().is_none());
	assert_eq!(counter.phase(), Phase::Mounted);

	counter.set_state(props! { "count": 1 }).unwrap();
	assert_eq!(counter.state()["count"], 1);
	assert_eq!(counter.mount().unwrap().markup(), Some("<p>0</p>"));
	assert_eq!(counter.mount_to_string().unwrap().markup(), Some("<p>0</p>"));
	assert_eq!(counter.component().calls.borrow().iter().filter(|&&call| call == "render").count(), 1);
}

struct Fixed(Rendered);

impl Component for Fixed {
	fn render(&self, _: &Instance<Self>) -> Result<Rendered, Error> {
		Ok(self.0.clone())
	}
}

#[test]
fn string_mounts_serialise_elements_without_tagging_them() {
	log_::init();
	let element = Node::element("b").with_text("x & y");
	let fixed = Instance::new(Fixed(element.clone().into()), Props::new());
	assert_eq!(fixed.mount_to_string().unwrap().markup(), Some("<b>x &amp; y</b>"));
	assert!(!element.has_owner());
	assert!(!element.has_attribute(on_load::ON_LOAD_ATTRIBUTE));
}

#[test]
fn elements_owned_elsewhere_keep_their_owner() {
	log_::init();
	let first = Instance::new(Fixed(Node::element("div").into()), Props::new());
	let element = first.mount().unwrap().into_element().unwrap();

	let second = Instance::new(Fixed(element.clone().into()), Props::new());
	let reused = second.mount().unwrap().into_element().unwrap();
	assert!(reused.same_node(&element));
	assert!(reused.has_owner());
}

struct Silent;
impl Component for Silent {}

#[test]
fn render_must_be_provided() {
	log_::init();
	let silent = Instance::new(Silent, Props::new());
	assert!(matches!(silent.mount(), Err(Error::RenderNotImplemented { .. })));
	assert!(matches!(silent.mount_to_string(), Err(Error::RenderNotImplemented { .. })));
	assert_eq!(silent.phase(), Phase::Unmounted);
}

#[test]
fn render_must_produce_one_element() {
	log_::init();
	let text = Instance::new(Fixed(Node::text("loose").into()), Props::new());
	assert!(matches!(text.mount(), Err(Error::NotAnElement { .. })));

	for markup in &["", "plain text", "<p>a</p><p>b</p>", "<div></span>", "<p"] {
		let fixed = Instance::new(Fixed((*markup).into()), Props::new());
		let result = fixed.mount();
		assert!(matches!(result, Err(Error::InvalidMarkup { .. })), "{:?}: {:?}", markup, result);
	}

	let padded = Instance::new(Fixed("\n  <p>ok</p>\n".into()), Props::new());
	assert_eq!(padded.mount().unwrap().into_element().unwrap().text_content(), "ok");
}

#[derive(Default)]
struct Shape {
	mounts: Cell<u32>,
	unmounts: Cell<u32>,
}

impl Component for Shape {
	fn initial_state(&self, _: &Props) -> State {
		props! { "tag": "p", "valid": true }
	}

	fn render(&self, this: &Instance<Self>) -> Result<Rendered, Error> {
		let state = this.state();
		let tag = state["tag"].as_str().unwrap_or("p");
		if state["valid"] == true {
			Ok(format!("<{0}>shape</{0}>", tag).into())
		} else {
			Ok(format!("<{0}>a</{0}><{0}>b</{0}>", tag).into())
		}
	}

	fn component_did_mount(&self, _: &Instance<Self>) -> Result<(), Error> {
		self.mounts.set(self.mounts.get() + 1);
		Ok(())
	}

	fn component_will_unmount(&self, _: &Instance<Self>) -> Result<(), Error> {
		self.unmounts.set(self.unmounts.get() + 1);
		Ok(())
	}
}

#[test]
fn replaced_roots_stay_mounted() {
	log_::init();
	let document = Document::new();
	let shape = Instance::new(Shape::default(), Props::new());
	let old = shape.mount().unwrap().into_element().unwrap();
	document.body().append_child(&old);
	document.flush_mutations();

	shape.set_state(props! { "tag": "div" }).unwrap();

	let new = shape.element().unwrap();
	assert_eq!(new.name().as_deref(), Some("div"));
	assert!(!new.same_node(&old));
	assert!(new.parent().unwrap().same_node(document.body()));
	assert!(old.parent().is_none());
	assert!(new.has_attribute(on_load::ON_LOAD_ATTRIBUTE));
	assert!(!old.has_attribute(on_load::ON_LOAD_ATTRIBUTE));

	document.flush_mutations();
	assert_eq!((shape.component().mounts.get(), shape.component().unmounts.get()), (1, 0));
	assert_eq!(shape.phase(), Phase::Mounted);

	new.remove();
	document.flush_mutations();
	assert_eq!(shape.component().unmounts.get(), 1);
	assert_eq!(shape.phase(), Phase::Retired);
}

#[test]
fn failed_renders_keep_the_merge() {
	log_::init();
	let document = Document::new();
	let shape = Instance::new(Shape::default(), Props::new());
	let element = shape.mount().unwrap().into_element().unwrap();
	document.body().append_child(&element);
	document.flush_mutations();

	let result = shape.set_state(props! { "valid": false, "extra": 1 });
	assert!(matches!(result, Err(Error::InvalidMarkup { .. })), "{:?}", result);
	assert_eq!(shape.state(), props! { "tag": "p", "valid": false, "extra": 1 });
	assert_eq!(element.children().len(), 1);
	assert_eq!(element.text_content(), "shape");
	assert!(shape.element().unwrap().same_node(&element));
	assert_eq!(shape.phase(), Phase::Mounted);

	shape.set_state(props! { "valid": true, "tag": "p" }).unwrap();
	assert_eq!(element.text_content(), "shape");
}

#[test]
fn elements_do_not_keep_instances_alive() {
	log_::init();
	let document = Document::new();
	let counter = Instance::new(Counter::default(), Props::new());
	let weak = Rc::downgrade(&counter);
	let element = counter.mount().unwrap().into_element().unwrap();
	document.body().append_child(&element);
	document.flush_mutations();
	drop(counter);

	// Still owed component_will_unmount.
	assert!(weak.upgrade().is_some());
	assert!(element.has_owner());

	element.remove();
	document.flush_mutations();
	assert!(weak.upgrade().is_none());
	assert!(!element.has_owner());
}

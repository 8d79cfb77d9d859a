#![doc(html_root_url = "https://docs.rs/peaceful-dom/0.1.0")]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub use serde_json;

#[cfg(doctest)]
pub mod readme {
	doc_comment::doctest!("../README.md");
}

pub mod component;
pub mod dom;
pub mod error;
#[cfg(feature = "web")]
pub mod load;
pub mod merge;
pub mod morph;
pub mod on_load;
pub mod parse;

pub use component::{Component, Instance, Mounted, Phase, Props, Rendered, State};
pub use dom::{Document, Event, Node};
pub use error::Error;

/// Builds [`Props`] or [`State`] from [`json!`](`serde_json::json`) object syntax.
///
/// ```
/// let props = peaceful_dom::props! { "label": "a", "count": 1 };
/// assert_eq!(props["label"], "a");
/// ```
#[macro_export]
macro_rules! props {
	($($tt:tt)*) => {
		match $crate::serde_json::json!({ $($tt)* }) {
			$crate::serde_json::Value::Object(map) => map,
			_ => unreachable!("`json!` with braces always builds an object"),
		}
	};
}

/// Page content only makes it into log output with the `dangerous-logging` feature.
pub(crate) fn redact(value: &str) -> &str {
	if cfg!(feature = "dangerous-logging") {
		value
	} else {
		"<redacted>"
	}
}

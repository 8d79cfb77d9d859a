use core::fmt::{self, Display, Formatter};
use thiserror::Error;

/// Failures surfaced by mounting and updating component instances.
///
/// None of these are retried internally.
/// Merges of props and state that happened before the failing step are **not** rolled back.
#[derive(Debug, Error)]
pub enum Error {
	#[error("A render() function was not defined on {component}. You must define a render() function that returns an element, or a string of markup that can be parsed into an element.")]
	RenderNotImplemented { component: &'static str },

	#[error("render() of {component} must return an element, or a string of markup that parses into an element.")]
	NotAnElement { component: &'static str },

	#[error("render() of {component} returned markup that could not be parsed into an element: {source}")]
	InvalidMarkup {
		component: &'static str,
		#[source]
		source: ParseError,
	},

	#[error("set_state cannot be used inside of component_will_update ({component}).")]
	ReentrantSetState { component: &'static str },

	#[error("The instance was mounted as markup and has no element.")]
	MountedAsMarkup,

	#[error("The element of this mounted instance has been dropped.")]
	ElementReleased,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} at byte {offset}")]
pub struct ParseError {
	pub offset: usize,
	pub kind: ParseErrorKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseErrorKind {
	/// No element was found.
	Empty,
	/// More than one top-level node, or a top-level node that isn't an element.
	NotSingleElement,
	UnexpectedEndTag(String),
	UnterminatedTag,
	UnterminatedComment,
	InvalidTagName,
}

impl Display for ParseErrorKind {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		match self {
			ParseErrorKind::Empty => f.write_str("no element found"),
			ParseErrorKind::NotSingleElement => f.write_str("expected exactly one top-level element"),
			ParseErrorKind::UnexpectedEndTag(name) => write!(f, "unexpected end tag </{}>", name),
			ParseErrorKind::UnterminatedTag => f.write_str("unterminated tag"),
			ParseErrorKind::UnterminatedComment => f.write_str("unterminated comment"),
			ParseErrorKind::InvalidTagName => f.write_str("invalid tag name"),
		}
	}
}

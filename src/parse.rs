//! Markup parsing into detached [`Node`] trees.
//!
//! This is a forgiving subset of HTML parsing: elements, attributes, comments, void and raw-text elements
//! and the common character references. Unclosed elements are closed at the end of the input,
//! but stray end tags are rejected.

use crate::{
	dom::{Node, NodeType, RAW_TEXT_ELEMENTS, VOID_ELEMENTS},
	error::{ParseError, ParseErrorKind},
};
use hashbrown::{HashMap, HashSet};
use tracing::{instrument, trace};

thread_local! {
	static CONTEXT: ParseContext = ParseContext::new();
}

struct ParseContext {
	void_elements: HashSet<&'static str>,
	raw_text_elements: HashSet<&'static str>,
	escapable_raw_text_elements: HashSet<&'static str>,
	named_references: HashMap<&'static str, char>,
}
impl ParseContext {
	fn new() -> Self {
		trace!("Initialising parse context.");
		Self {
			void_elements: VOID_ELEMENTS.iter().copied().collect(),
			raw_text_elements: RAW_TEXT_ELEMENTS.iter().copied().collect(),
			escapable_raw_text_elements: ["textarea", "title"].iter().copied().collect(),
			named_references: [("amp", '&'), ("lt", '<'), ("gt", '>'), ("quot", '"'), ("apos", '\''), ("nbsp", '\u{a0}')]
				.iter()
				.copied()
				.collect(),
		}
	}

	fn decode(&self, text: &str) -> String {
		if !text.contains('&') {
			return text.to_owned();
		}

		let mut decoded = String::with_capacity(text.len());
		let mut rest = text;
		while let Some(ampersand) = rest.find('&') {
			decoded.push_str(&rest[..ampersand]);
			rest = &rest[ampersand..];
			let reference = rest
				.find(';')
				.and_then(|end| self.resolve(&rest[1..end]).map(|c| (c, end + 1)));
			match reference {
				Some((c, len)) => {
					decoded.push(c);
					rest = &rest[len..];
				}
				None => {
					decoded.push('&');
					rest = &rest[1..];
				}
			}
		}
		decoded.push_str(rest);
		decoded
	}

	fn resolve(&self, reference: &str) -> Option<char> {
		match reference.strip_prefix('#') {
			Some(number) => {
				let code = match number.strip_prefix('x').or_else(|| number.strip_prefix('X')) {
					Some(hex) => u32::from_str_radix(hex, 16).ok()?,
					None => number.parse().ok()?,
				};
				char::from_u32(code)
			}
			None => self.named_references.get(reference).copied(),
		}
	}
}

/// Parses `markup` into its top-level nodes.
///
/// # Errors
///
/// Iff the markup contains stray end tags or unterminated tags or comments.
#[instrument(skip(markup), fields(len = markup.len()))]
pub fn parse_fragment(markup: &str) -> Result<Vec<Node>, ParseError> {
	CONTEXT.with(|context| Parser { context, input: markup, position: 0 }.parse())
}

/// Parses `markup` that must contain exactly one top-level element.
///
/// Whitespace-only text around the element is ignored.
///
/// # Errors
///
/// Iff parsing fails or the markup doesn't consist of exactly one element.
pub fn parse_element(markup: &str) -> Result<Node, ParseError> {
	let nodes = parse_fragment(markup)?;
	let mut significant = nodes
		.into_iter()
		.filter(|node| !(node.node_type() == NodeType::Text && node.data().map_or(false, |data| data.trim().is_empty())));
	match (significant.next(), significant.next()) {
		(Some(element), None) if element.is_element() => Ok(element),
		(None, _) => Err(ParseError { offset: markup.len(), kind: ParseErrorKind::Empty }),
		_ => Err(ParseError { offset: 0, kind: ParseErrorKind::NotSingleElement }),
	}
}

struct Parser<'a> {
	context: &'a ParseContext,
	input: &'a str,
	position: usize,
}
impl<'a> Parser<'a> {
	fn error(&self, offset: usize, kind: ParseErrorKind) -> ParseError {
		trace!(offset, ?kind, "Markup parse error.");
		ParseError { offset, kind }
	}

	fn rest(&self) -> &'a str {
		&self.input[self.position..]
	}

	fn take_while(&mut self, predicate: impl Fn(char) -> bool) -> &'a str {
		let rest = self.rest();
		let len = rest.find(|c: char| !predicate(c)).unwrap_or_else(|| rest.len());
		self.position += len;
		&rest[..len]
	}

	fn skip_whitespace(&mut self) {
		self.take_while(char::is_whitespace);
	}

	fn parse(mut self) -> Result<Vec<Node>, ParseError> {
		let mut roots = Vec::new();
		let mut open: Vec<Node> = Vec::new();

		let insert = |open: &[Node], roots: &mut Vec<Node>, node: Node| match open.last() {
			Some(parent) => parent.append_child(&node),
			None => roots.push(node),
		};

		while self.position < self.input.len() {
			let start = self.position;
			let rest = self.rest();
			if let Some(comment) = rest.strip_prefix("<!--") {
				let end = comment.find("-->").ok_or_else(|| self.error(start, ParseErrorKind::UnterminatedComment))?;
				insert(&open, &mut roots, Node::comment(&comment[..end]));
				self.position += 4 + end + 3;
			} else if rest.starts_with("<!") || rest.starts_with("<?") {
				// Doctypes and processing instructions carry nothing we model.
				let end = rest.find('>').ok_or_else(|| self.error(start, ParseErrorKind::UnterminatedTag))?;
				self.position += end + 1;
			} else if let Some(end_tag) = rest.strip_prefix("</") {
				let end = end_tag.find('>').ok_or_else(|| self.error(start, ParseErrorKind::UnterminatedTag))?;
				let name = end_tag[..end].trim().to_ascii_lowercase();
				match open.iter().rposition(|node| node.name().as_deref() == Some(name.as_str())) {
					Some(index) => open.truncate(index),
					None => return Err(self.error(start, ParseErrorKind::UnexpectedEndTag(name))),
				}
				self.position += 2 + end + 1;
			} else if starts_tag(rest) {
				let (element, self_closing) = self.parse_start_tag()?;
				let name = element.name().unwrap_or_default();
				insert(&open, &mut roots, element.clone());
				if self_closing || self.context.void_elements.contains(name.as_str()) {
					continue;
				}
				let raw = self.context.raw_text_elements.contains(name.as_str());
				if raw || self.context.escapable_raw_text_elements.contains(name.as_str()) {
					self.parse_raw_text(&element, &name, !raw)?;
					continue;
				}
				open.push(element);
			} else {
				let end = text_end(rest);
				insert(&open, &mut roots, Node::text(self.context.decode(&rest[..end])));
				self.position += end;
			}
		}

		Ok(roots)
	}

	fn parse_start_tag(&mut self) -> Result<(Node, bool), ParseError> {
		let start = self.position;
		self.position += 1;
		let name = self.take_while(|c| !c.is_whitespace() && c != '/' && c != '>');
		if name.is_empty() {
			return Err(self.error(start, ParseErrorKind::InvalidTagName));
		}
		let element = Node::element(name);

		loop {
			self.skip_whitespace();
			let rest = self.rest();
			if rest.is_empty() {
				return Err(self.error(start, ParseErrorKind::UnterminatedTag));
			} else if rest.starts_with("/>") {
				self.position += 2;
				return Ok((element, true));
			} else if rest.starts_with('>') {
				self.position += 1;
				return Ok((element, false));
			} else if rest.starts_with('/') || rest.starts_with('=') {
				self.position += 1;
				continue;
			}

			let attribute_name = self.take_while(|c| !c.is_whitespace() && c != '=' && c != '>' && c != '/');
			self.skip_whitespace();
			let value = if self.rest().starts_with('=') {
				self.position += 1;
				self.skip_whitespace();
				let rest = self.rest();
				match rest.chars().next() {
					Some(quote @ ('"' | '\'')) => {
						let end = rest[1..].find(quote).ok_or_else(|| self.error(start, ParseErrorKind::UnterminatedTag))?;
						self.position += end + 2;
						self.context.decode(&rest[1..=end])
					}
					_ => {
						let unquoted = self.take_while(|c| !c.is_whitespace() && c != '>');
						self.context.decode(unquoted)
					}
				}
			} else {
				String::new()
			};

			// The first occurrence of an attribute wins.
			if !element.has_attribute(attribute_name) {
				element.set_attribute(attribute_name, value);
			}
		}
	}

	fn parse_raw_text(&mut self, element: &Node, name: &str, escapable: bool) -> Result<(), ParseError> {
		let start = self.position;
		let rest = self.rest();
		let end_tag = format!("</{}", name);
		let end = rest.to_ascii_lowercase().find(&end_tag).unwrap_or_else(|| rest.len());
		let text = &rest[..end];
		if !text.is_empty() {
			element.append_child(&Node::text(if escapable { self.context.decode(text) } else { text.to_owned() }));
		}
		self.position += end;
		if end < rest.len() {
			let close = rest[end..].find('>').ok_or_else(|| self.error(start + end, ParseErrorKind::UnterminatedTag))?;
			self.position += close + 1;
		}
		Ok(())
	}
}

fn starts_tag(rest: &str) -> bool {
	rest.strip_prefix('<').map_or(false, |rest| rest.starts_with(|c: char| c.is_ascii_alphabetic()))
}

/// Text runs until the next construct that starts markup. A lone `<` is text.
fn text_end(rest: &str) -> usize {
	rest.char_indices()
		.skip(1)
		.find(|&(i, c)| c == '<' && (starts_tag(&rest[i..]) || rest[i..].starts_with("</") || rest[i..].starts_with("<!") || rest[i..].starts_with("<?")))
		.map_or_else(|| rest.len(), |(i, _)| i)
}

//! Parsing of the `Content-Type` request header.
//!
//! The negotiator only cares about the media type and the `charset`
//! parameter, but parameter values may be quoted strings containing `;`,
//! so a simple split is not enough.

use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContentTypeError {
	#[error("empty media type")]
	EmptyMediaType,
	#[error("media type {0:?} is missing a slash")]
	MissingSlash(String),
	#[error("malformed parameter {0:?}")]
	MalformedParameter(String),
	#[error("unterminated quoted string")]
	UnterminatedQuote,
}

/// A parsed `Content-Type` header value.
///
/// The media type and all parameter names and values are lowercased,
/// parameter lookups are therefore case insensitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentTypeValue {
	media_type: String,
	params: Vec<(String, String)>,
}

impl ContentTypeValue {
	pub fn media_type(&self) -> &str {
		&self.media_type
	}

	pub fn param(&self, name: &str) -> Option<&str> {
		let name = name.to_ascii_lowercase();
		self.params
			.iter()
			.find(|(n, _)| *n == name)
			.map(|(_, v)| v.as_str())
	}

	pub fn parse(s: &str) -> Result<Self, ContentTypeError> {
		let mut chars = s.char_indices().peekable();

		let media_end = s.find(';').unwrap_or(s.len());
		let media_type = s[..media_end].trim().to_ascii_lowercase();
		if media_type.is_empty() {
			return Err(ContentTypeError::EmptyMediaType);
		}
		if !media_type.contains('/') {
			return Err(ContentTypeError::MissingSlash(media_type));
		}

		// skip past the media type
		while let Some((i, _)) = chars.peek() {
			if *i >= media_end {
				break;
			}
			chars.next();
		}

		let mut params = Vec::new();

		// each loop iteration consumes one `;name=value` parameter
		loop {
			match chars.next() {
				Some((_, ';')) => {}
				Some((i, _)) => {
					return Err(ContentTypeError::MalformedParameter(
						s[i..].to_string(),
					))
				}
				None => break,
			}

			// skip whitespace
			while matches!(chars.peek(), Some((_, c)) if c.is_whitespace()) {
				chars.next();
			}

			// a trailing `;` is tolerated
			if chars.peek().is_none() {
				break;
			}

			let mut name = String::new();
			let mut saw_eq = false;
			for (_, c) in chars.by_ref() {
				if c == '=' {
					saw_eq = true;
					break;
				}
				if c == ';' || c == '"' {
					return Err(ContentTypeError::MalformedParameter(
						name + &c.to_string(),
					));
				}
				name.push(c);
			}
			let name = name.trim().to_ascii_lowercase();
			if !saw_eq || name.is_empty() {
				return Err(ContentTypeError::MalformedParameter(name));
			}

			let mut value = String::new();
			if matches!(chars.peek(), Some((_, '"'))) {
				chars.next();
				let mut terminated = false;
				while let Some((_, c)) = chars.next() {
					match c {
						'"' => {
							terminated = true;
							break;
						}
						'\\' => match chars.next() {
							Some((_, esc)) => value.push(esc),
							None => {
								return Err(
									ContentTypeError::UnterminatedQuote,
								)
							}
						},
						c => value.push(c),
					}
				}
				if !terminated {
					return Err(ContentTypeError::UnterminatedQuote);
				}
				// only whitespace may follow until the next `;`
				while matches!(
					chars.peek(),
					Some((_, c)) if c.is_whitespace()
				) {
					chars.next();
				}
				if matches!(chars.peek(), Some((_, c)) if *c != ';') {
					return Err(ContentTypeError::MalformedParameter(
						name.clone(),
					));
				}
			} else {
				while matches!(chars.peek(), Some((_, c)) if *c != ';') {
					let (_, c) = chars.next().unwrap();
					value.push(c);
				}
				value = value.trim().to_string();
			}

			params.push((name, value.to_ascii_lowercase()));
		}

		Ok(Self { media_type, params })
	}
}

impl FromStr for ContentTypeValue {
	type Err = ContentTypeError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::parse(s)
	}
}

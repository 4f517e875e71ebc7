//! Path template compilation.
//!
//! A template is a `/` separated pattern where a segment is either a
//! literal, a single segment capture `{name}` or a variable length capture
//! `[name]`, `[name:N]`, `[name:N:M]` (a splat). The compiled form is
//! immutable and owned by a registry entry.

use thiserror::Error;

/// Default bounds of a splat without explicit bounds.
pub const SPLAT_DEFAULT_MIN: usize = 1;
pub const SPLAT_DEFAULT_MAX: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
	#[error("template must start with a slash")]
	MissingLeadingSlash,
	#[error("invalid identifier {0:?}")]
	InvalidIdent(String),
	#[error("malformed capture {0:?}")]
	MalformedCapture(String),
	#[error("invalid splat bounds {min}..{max}")]
	InvalidBounds { min: usize, max: usize },
}

/// One segment of a compiled template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
	Literal(String),
	/// Consumes exactly one request segment.
	Param { name: String },
	/// Consumes a contiguous run of `min_items..=max_items` request
	/// segments.
	Splat {
		name: String,
		min_items: usize,
		max_items: usize,
	},
}

impl Segment {
	fn min_items(&self) -> usize {
		match self {
			Self::Literal(_) | Self::Param { .. } => 1,
			Self::Splat { min_items, .. } => *min_items,
		}
	}

	fn is_capture(&self) -> bool {
		!matches!(self, Self::Literal(_))
	}
}

/// A compiled path template.
///
/// Immutable after construction; the registry classifies a template as
/// exact or dynamic once and the classification never changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTemplate {
	source: String,
	segments: Vec<Segment>,
	is_exact: bool,
	has_splat: bool,
	has_trailing_slash: bool,
	// suffix sums, entry i is the minimum number of request segments
	// needed to satisfy segments [i..]
	min_segments_from: Vec<usize>,
}

impl PathTemplate {
	/// Compiles a template string.
	pub fn compile(source: &str) -> Result<Self, TemplateError> {
		if !source.starts_with('/') {
			return Err(TemplateError::MissingLeadingSlash);
		}

		let mut segments = Vec::new();
		let mut has_trailing_slash = false;

		if source != "/" {
			let mut rest = &source[1..];
			if let Some(stripped) = rest.strip_suffix('/') {
				has_trailing_slash = true;
				rest = stripped;
			}

			for raw in rest.split('/') {
				segments.push(parse_segment(raw)?);
			}
		}

		let is_exact = !segments.iter().any(Segment::is_capture);
		let has_splat = segments
			.iter()
			.any(|s| matches!(s, Segment::Splat { .. }));

		// computed right to left, the sentinel past the last segment is 0
		let mut min_segments_from = vec![0; segments.len() + 1];
		for i in (0..segments.len()).rev() {
			min_segments_from[i] =
				min_segments_from[i + 1] + segments[i].min_items();
		}

		Ok(Self {
			source: source.to_string(),
			segments,
			is_exact,
			has_splat,
			has_trailing_slash,
			min_segments_from,
		})
	}

	/// The literal template string this was compiled from.
	pub fn source(&self) -> &str {
		&self.source
	}

	pub fn segments(&self) -> &[Segment] {
		&self.segments
	}

	/// True if the template contains no captures.
	pub fn is_exact(&self) -> bool {
		self.is_exact
	}

	pub fn has_splat(&self) -> bool {
		self.has_splat
	}

	pub fn has_trailing_slash(&self) -> bool {
		self.has_trailing_slash
	}

	/// The minimum number of request segments a matching path needs.
	pub fn min_segments(&self) -> usize {
		self.min_segments_from[0]
	}

	pub(crate) fn min_segments_from(&self, i: usize) -> usize {
		self.min_segments_from[i]
	}
}

fn parse_segment(raw: &str) -> Result<Segment, TemplateError> {
	if let Some(rest) = raw.strip_prefix('{') {
		let Some(name) = rest.strip_suffix('}') else {
			return Err(TemplateError::MalformedCapture(raw.to_string()));
		};
		check_ident(name)?;

		return Ok(Segment::Param {
			name: name.to_string(),
		});
	}

	if let Some(rest) = raw.strip_prefix('[') {
		let Some(inner) = rest.strip_suffix(']') else {
			return Err(TemplateError::MalformedCapture(raw.to_string()));
		};

		let mut parts = inner.split(':');
		let name = parts.next().unwrap_or("");
		check_ident(name)?;

		let bounds = (parts.next(), parts.next());
		if parts.next().is_some() {
			return Err(TemplateError::MalformedCapture(raw.to_string()));
		}

		let parse_bound = |s: &str| {
			s.parse::<usize>().map_err(|_| {
				TemplateError::MalformedCapture(raw.to_string())
			})
		};

		let (min_items, max_items) = match bounds {
			(None, _) => (SPLAT_DEFAULT_MIN, SPLAT_DEFAULT_MAX),
			(Some(n), None) => {
				let n = parse_bound(n)?;
				(n, n)
			}
			(Some(n), Some(m)) => (parse_bound(n)?, parse_bound(m)?),
		};

		if min_items < 1 || max_items < min_items {
			return Err(TemplateError::InvalidBounds {
				min: min_items,
				max: max_items,
			});
		}

		return Ok(Segment::Splat {
			name: name.to_string(),
			min_items,
			max_items,
		});
	}

	Ok(Segment::Literal(raw.to_string()))
}

fn check_ident(s: &str) -> Result<(), TemplateError> {
	let mut chars = s.chars();
	let valid = match chars.next() {
		Some(c) if c.is_ascii_alphabetic() || c == '_' => {
			chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
		}
		_ => false,
	};

	if valid {
		Ok(())
	} else {
		Err(TemplateError::InvalidIdent(s.to_string()))
	}
}

//! Matching of compiled templates against decomposed request paths.
//!
//! Splat backtracking runs on an explicit frame stack instead of
//! recursion, so adversarial paths with many splats cannot exhaust the
//! call stack. Candidate lengths are tried ascending, the first length
//! which lets the rest of the template match wins.

use super::template::{PathTemplate, Segment};
use crate::request::Params;

use percent_encoding::percent_decode_str;
use serde_json::Value;

/// A request path decomposed into segments plus a trailing slash flag.
///
/// One trailing slash is trimmed before splitting, when present and the
/// path is longer than the root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestPath {
	segments: Vec<String>,
	trailing_slash: bool,
}

impl RequestPath {
	pub fn decompose(path: &str) -> Self {
		let mut path = path;
		let mut trailing_slash = false;

		if path.len() > 1 {
			if let Some(stripped) = path.strip_suffix('/') {
				trailing_slash = true;
				path = stripped;
			}
		}

		let path = path.strip_prefix('/').unwrap_or(path);
		let segments = if path.is_empty() {
			Vec::new()
		} else {
			path.split('/').map(String::from).collect()
		};

		Self {
			segments,
			trailing_slash,
		}
	}

	pub fn segments(&self) -> &[String] {
		&self.segments
	}

	pub fn trailing_slash(&self) -> bool {
		self.trailing_slash
	}
}

// a splat choice point, remembering where to resume on backtrack
struct Frame {
	seg: usize,
	pos: usize,
	len: usize,
	bound: usize,
	caps_len: usize,
}

/// Matches a compiled template against a decomposed path.
///
/// Returns the captured names mapped to decoded values, a string for a
/// `{name}` capture and an array of strings for a splat. No partial
/// bindings survive a failed match.
pub fn match_template(
	template: &PathTemplate,
	path: &RequestPath,
) -> Option<Params> {
	if template.has_trailing_slash() && !path.trailing_slash() {
		return None;
	}

	let req = path.segments();
	if req.len() < template.min_segments() {
		return None;
	}

	let segs = template.segments();
	if !template.has_splat() && req.len() != segs.len() {
		return None;
	}

	let mut stack: Vec<Frame> = Vec::new();
	let mut caps: Vec<(String, Value)> = Vec::new();
	let mut seg = 0;
	let mut pos = 0;

	'walk: loop {
		if seg == segs.len() {
			if pos == req.len() {
				let mut params = Params::new();
				for (name, value) in caps {
					params.insert(name, value);
				}
				return Some(params);
			}
		} else {
			match &segs[seg] {
				Segment::Literal(value) => {
					if req.get(pos).map(String::as_str)
						== Some(value.as_str())
					{
						seg += 1;
						pos += 1;
						continue 'walk;
					}
				}
				Segment::Param { name } => {
					if let Some(raw) = req.get(pos) {
						if let Some(decoded) = decode(raw) {
							caps.push((
								name.clone(),
								Value::String(decoded),
							));
							seg += 1;
							pos += 1;
							continue 'walk;
						}
					}
				}
				Segment::Splat {
					name,
					min_items,
					max_items,
				} => {
					let available = req.len() - pos;
					let needed_after = template.min_segments_from(seg + 1);
					let bound = (*max_items)
						.min(available.saturating_sub(needed_after));

					let mut len = *min_items;
					while len <= bound {
						if let Some(items) =
							decode_slice(&req[pos..pos + len])
						{
							stack.push(Frame {
								seg,
								pos,
								len,
								bound,
								caps_len: caps.len(),
							});
							caps.push((
								name.clone(),
								Value::Array(items),
							));
							seg += 1;
							pos += len;
							continue 'walk;
						}
						len += 1;
					}
				}
			}
		}

		// dead end, resume at the innermost splat with a longer capture
		loop {
			let Some(frame) = stack.pop() else {
				return None;
			};

			caps.truncate(frame.caps_len);

			let Segment::Splat { name, .. } = &segs[frame.seg] else {
				unreachable!("only splats create frames");
			};

			let mut len = frame.len + 1;
			while len <= frame.bound {
				if let Some(items) =
					decode_slice(&req[frame.pos..frame.pos + len])
				{
					stack.push(Frame {
						len,
						caps_len: caps.len(),
						..frame
					});
					caps.push((name.clone(), Value::Array(items)));
					seg = frame.seg + 1;
					pos = frame.pos + len;
					continue 'walk;
				}
				len += 1;
			}
		}
	}
}

// decode failure is a match failure, not a server error
fn decode(raw: &str) -> Option<String> {
	percent_decode_str(raw)
		.decode_utf8()
		.ok()
		.map(|c| c.into_owned())
}

fn decode_slice(raw: &[String]) -> Option<Vec<Value>> {
	raw.iter()
		.map(|s| decode(s).map(Value::String))
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::routes::template::PathTemplate;

	fn matched(template: &str, path: &str) -> Option<Params> {
		let template = PathTemplate::compile(template).unwrap();
		match_template(&template, &RequestPath::decompose(path))
	}

	fn strings(params: &Params, name: &str) -> Vec<String> {
		params[name]
			.as_array()
			.unwrap()
			.iter()
			.map(|v| v.as_str().unwrap().to_string())
			.collect()
	}

	#[test]
	fn decompose() {
		let p = RequestPath::decompose("/");
		assert!(p.segments().is_empty());
		assert!(!p.trailing_slash());

		let p = RequestPath::decompose("/a/b/");
		assert_eq!(p.segments(), ["a", "b"]);
		assert!(p.trailing_slash());

		let p = RequestPath::decompose("/a/b");
		assert_eq!(p.segments(), ["a", "b"]);
		assert!(!p.trailing_slash());
	}

	#[test]
	fn single_param() {
		let params = matched("/user/{userId}", "/user/42").unwrap();
		assert_eq!(params["userId"], "42");
	}

	#[test]
	fn splat_collects_run() {
		let params = matched("/files/[parts]", "/files/a/b/c").unwrap();
		assert_eq!(strings(&params, "parts"), ["a", "b", "c"]);
	}

	#[test]
	fn param_decodes() {
		let params = matched("/user/{name}", "/user/a%20b").unwrap();
		assert_eq!(params["name"], "a b");
	}

	#[test]
	fn decode_failure_is_no_match() {
		// %FF is not valid utf8
		assert!(matched("/user/{name}", "/user/%FF").is_none());
		assert!(matched("/files/[parts]", "/files/a/%FF").is_none());
	}

	#[test]
	fn literal_needs_equality() {
		assert!(matched("/user/me", "/user/me").is_some());
		assert!(matched("/user/me", "/user/you").is_none());
		assert!(matched("/user/me", "/user/me/too").is_none());
	}

	#[test]
	fn trailing_slash_requirement() {
		assert!(matched("/needs-slash/", "/needs-slash").is_none());
		assert!(matched("/needs-slash/", "/needs-slash/").is_some());
		// absence matches both forms
		assert!(matched("/plain", "/plain").is_some());
		assert!(matched("/plain", "/plain/").is_some());
	}

	#[test]
	fn splat_prefers_shortest() {
		// both splats could cover the middle, the first one stays minimal
		let params = matched("/[a]/[b]", "/x/y/z").unwrap();
		assert_eq!(strings(&params, "a"), ["x"]);
		assert_eq!(strings(&params, "b"), ["y", "z"]);
	}

	#[test]
	fn splat_backtracks_over_literal() {
		// the splat has to grow until the literal lines up
		let params = matched("/[a]/end", "/x/y/z/end").unwrap();
		assert_eq!(strings(&params, "a"), ["x", "y", "z"]);

		assert!(matched("/[a]/end", "/x/y/z").is_none());
	}

	#[test]
	fn splat_bounds_are_honored() {
		assert!(matched("/f/[p:2:3]", "/f/a").is_none());
		assert!(matched("/f/[p:2:3]", "/f/a/b").is_some());
		assert!(matched("/f/[p:2:3]", "/f/a/b/c").is_some());
		assert!(matched("/f/[p:2:3]", "/f/a/b/c/d").is_none());
	}

	#[test]
	fn splat_leaves_room_for_suffix() {
		// the splat may not starve the trailing required segments
		let params = matched("/[a]/{b}/tail", "/1/2/3/tail").unwrap();
		assert_eq!(strings(&params, "a"), ["1", "2"]);
		assert_eq!(params["b"], "3");
	}

	#[test]
	fn captures_reconstruct_consumed_segments() {
		let cases = [
			("/u/{a}/{b}", "/u/x/y"),
			("/f/[p]", "/f/a/b/c"),
			("/f/[p:2:3]/{q}", "/f/a/b/c/d"),
			("/[a]/[b]", "/m/n/o/p"),
		];

		for (template, path) in cases {
			let compiled = PathTemplate::compile(template).unwrap();
			let decomposed = RequestPath::decompose(path);
			let params =
				match_template(&compiled, &decomposed).unwrap();

			// walk the template again, collecting captured values in
			// segment order
			let mut rebuilt = Vec::new();
			for seg in compiled.segments() {
				match seg {
					Segment::Literal(v) => rebuilt.push(v.clone()),
					Segment::Param { name } => rebuilt.push(
						params[name].as_str().unwrap().to_string(),
					),
					Segment::Splat { name, .. } => {
						rebuilt.extend(strings(&params, name))
					}
				}
			}

			assert_eq!(rebuilt, decomposed.segments(), "{template}");
		}
	}

	#[test]
	fn no_splat_requires_equal_len() {
		assert!(matched("/a/{b}", "/a").is_none());
		assert!(matched("/a/{b}", "/a/b/c").is_none());
	}

	#[test]
	fn root_matches_root() {
		assert!(matched("/", "/").is_some());
		assert!(matched("/", "/a").is_none());
	}
}

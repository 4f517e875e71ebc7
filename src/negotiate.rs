//! Content negotiation: decoding query strings and request bodies into
//! parameter objects.

use crate::error::Error;
use crate::header::{ContentTypeValue, RequestHeader, CONTENT_TYPE};
use crate::request::Params;
use crate::routes::Verb;

use serde_json::Value;

const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";
// a legacy alias some clients still send
const FORM_URLENCODED_LEGACY: &str = "application/www-form-urlencoded";
const JSON: &str = "application/json";

/// Decodes `name=value` pairs, repeated names become arrays in order of
/// appearance. Used for query strings and form encoded bodies alike.
pub(crate) fn parse_pairs(input: &[u8]) -> Params {
	let mut params = Params::new();

	for (name, value) in form_urlencoded::parse(input) {
		let value = Value::String(value.into_owned());

		match params.entry(name.into_owned()) {
			serde_json::map::Entry::Vacant(entry) => {
				entry.insert(value);
			}
			serde_json::map::Entry::Occupied(mut entry) => {
				match entry.get_mut() {
					Value::Array(values) => values.push(value),
					prev => {
						let first = prev.take();
						*prev = Value::Array(vec![first, value]);
					}
				}
			}
		}
	}

	params
}

/// Decodes the query string for GET and DELETE requests.
pub(crate) fn url_params_for_read(header: &RequestHeader) -> Params {
	let query = header.uri().query().unwrap_or("");
	parse_pairs(query.as_bytes())
}

/// A non empty body on GET and DELETE requests is rejected.
pub(crate) fn reject_body_for_read(raw_body: &[u8]) -> Result<(), Error> {
	if raw_body.is_empty() {
		Ok(())
	} else {
		Err(Error::bad_request(
			"a request body is not allowed for GET and DELETE",
		))
	}
}

/// Ensures POST and PUT requests carry their parameters in the body, not
/// the query string.
pub(crate) fn reject_query_for_write(
	header: &RequestHeader,
) -> Result<(), Error> {
	match header.uri().query() {
		Some(q) if !q.is_empty() => Err(Error::bad_request(
			"query parameters are not allowed for POST and PUT",
		)),
		_ => Ok(()),
	}
}

/// Decodes a POST or PUT body according to its media type.
///
/// An empty body decodes to an empty object without consulting the
/// content-type header.
pub(crate) fn body_params_for_write(
	header: &RequestHeader,
	raw_body: &[u8],
) -> Result<Params, Error> {
	if raw_body.is_empty() {
		return Ok(Params::new());
	}

	let content_type = match header.value(CONTENT_TYPE) {
		Some(raw) => ContentTypeValue::parse(raw)
			.map_err(|e| Error::bad_request(e.to_string()))?,
		None => {
			return Err(Error::bad_request(unsupported_media_type(
				"missing content-type",
			)))
		}
	};

	match content_type.media_type() {
		FORM_URLENCODED | FORM_URLENCODED_LEGACY => {
			Ok(parse_pairs(raw_body))
		}
		JSON => {
			match content_type.param("charset") {
				None | Some("utf-8") => {}
				Some(other) => {
					return Err(Error::bad_request(format!(
						"unsupported json charset {other:?}"
					)))
				}
			}

			let value: Value =
				serde_json::from_slice(raw_body).map_err(|e| {
					Error::bad_request(format!("invalid json body: {e}"))
				})?;

			match value {
				Value::Object(params) => Ok(params),
				_ => Err(Error::bad_request(
					"json body must be an object",
				)),
			}
		}
		other => {
			Err(Error::bad_request(unsupported_media_type(other)))
		}
	}
}

fn unsupported_media_type(got: &str) -> String {
	format!(
		"unsupported media type {got:?}, expected {JSON} or \
		 {FORM_URLENCODED}"
	)
}

/// True for the verbs whose parameters come from the body.
pub(crate) fn is_write_verb(verb: Verb) -> bool {
	matches!(verb, Verb::Post | Verb::Put)
}

//! Helpers to write json responses.

use crate::error::ServerErrorKind;
use crate::header::StatusCode;
use crate::{Body, Error, Response};

use serde::Serialize;

const APPLICATION_JSON: &str = "application/json; charset=utf-8";

/// Options for `serialize_to_response_with`.
#[derive(Debug, Clone)]
pub struct JsonOptions {
	pub status_code: StatusCode,
	/// Pretty print the body.
	pub pretty: bool,
	/// Send cache suppression headers alongside the body.
	pub no_cache: bool,
}

impl Default for JsonOptions {
	fn default() -> Self {
		Self {
			status_code: StatusCode::OK,
			pretty: false,
			no_cache: false,
		}
	}
}

/// Serializes `data` into a `200 OK` json response.
pub fn serialize_to_response<T: ?Sized>(data: &T) -> crate::Result<Response>
where
	T: Serialize,
{
	serialize_to_response_with(data, &JsonOptions::default())
}

/// Serializes `data` into a json response, honoring `JsonOptions`.
pub fn serialize_to_response_with<T: ?Sized>(
	data: &T,
	opts: &JsonOptions,
) -> crate::Result<Response>
where
	T: Serialize,
{
	let body = if opts.pretty {
		serde_json::to_vec_pretty(data)
	} else {
		serde_json::to_vec(data)
	};
	let body = Body::from(
		body.map_err(|e| Error::new(ServerErrorKind::InternalServerError, e))?,
	);

	let mut builder = Response::builder()
		.status_code(opts.status_code)
		.content_type(APPLICATION_JSON)
		.body(body);

	if opts.no_cache {
		builder = builder
			.header(
				crate::header::CACHE_CONTROL,
				"no-store, no-cache, must-revalidate",
			)
			.header(crate::header::PRAGMA, "no-cache");
	}

	Ok(builder.build())
}

//! The per request pipeline.
//!
//! One pipeline instance runs per request, stages strictly in sequence:
//! authentication gate, body accumulation, route resolution, per source
//! validators, parameter merge, merged object validator, handler. Every
//! stage may short circuit into exactly one error response.

use crate::data::Data;
use crate::error::{ClientErrorKind, Error, ServerErrorKind};
use crate::header::{RequestHeader, CONNECTION};
use crate::lifecycle;
use crate::negotiate;
use crate::request::{ParamSource, Params, Request, RequestContext};
use crate::routes::{
	AuthCheck, AuthFlow, Registry, UpgradeHandler, Validator, Verb,
};
use crate::response::Response;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, error};

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
// same as page size
const DEFAULT_REQUEST_SIZE_LIMIT: usize = 4096; // 4kb

#[derive(Debug)]
pub(crate) struct RequestConfigs {
	pub timeout: Duration,
	// in bytes
	pub size_limit: usize,
}

impl RequestConfigs {
	pub fn new() -> Self {
		Self {
			timeout: DEFAULT_REQUEST_TIMEOUT,
			size_limit: DEFAULT_REQUEST_SIZE_LIMIT,
		}
	}

	pub fn timeout(&mut self, timeout: Duration) {
		self.timeout = timeout;
	}

	/// ## Panics
	/// if is 0
	pub fn size_limit(&mut self, size_limit: usize) {
		assert!(size_limit > 0, "size limit needs to be bigger than zero");
		self.size_limit = size_limit;
	}
}

/// Everything a glowing ember needs: the shared state of a built server.
pub(crate) struct Coals {
	data: Data,
	registry: Arc<Registry>,
	configs: RequestConfigs,
	auth: Option<Arc<dyn AuthCheck>>,
	upgrade: Option<Box<dyn UpgradeHandler>>,
}

impl Coals {
	pub fn new(
		data: Data,
		registry: Arc<Registry>,
		configs: RequestConfigs,
		auth: Option<Arc<dyn AuthCheck>>,
		upgrade: Option<Box<dyn UpgradeHandler>>,
	) -> Self {
		Self {
			data,
			registry,
			configs,
			auth,
			upgrade,
		}
	}

	pub fn data(&self) -> &Data {
		&self.data
	}

	pub fn registry(&self) -> &Arc<Registry> {
		&self.registry
	}

	pub fn upgrade(&self) -> Option<&dyn UpgradeHandler> {
		self.upgrade.as_deref()
	}
}

/// Runs the authentication gate. Returns the response to write when the
/// request may not proceed.
pub(crate) async fn check_auth(
	coals: &Coals,
	header: &RequestHeader,
) -> Option<Response> {
	let auth = coals.auth.as_ref()?;

	match auth.check(header, &coals.data).await {
		Ok(AuthFlow::Allow) => None,
		Ok(AuthFlow::Deny(resp)) => Some(resp),
		Err(e) => {
			error!("auth check failed: {e}");
			Some(
				Error::empty(ServerErrorKind::InternalServerError)
					.to_response(),
			)
		}
	}
}

/// Drives one request through the full pipeline, producing exactly one
/// response.
pub(crate) async fn run(coals: &Coals, req: Request) -> Response {
	let Request { header, body } = req;

	// stage 1: the authentication gate, before any parameter parsing
	if let Some(resp) = check_auth(coals, &header).await {
		return resp;
	}

	// body accumulation under the configured limits
	let raw_body =
		match lifecycle::read_body(&header, body, &coals.configs).await {
			Ok(bytes) => bytes,
			Err(e) => {
				// the body was not drained, the connection cannot be
				// reused
				let mut resp = e.to_response();
				resp.header.values.insert(CONNECTION, "close");
				return resp;
			}
		};

	match process(coals, header, raw_body).await {
		Ok(resp) => resp,
		Err(e) => e.to_response(),
	}
}

async fn process(
	coals: &Coals,
	header: RequestHeader,
	raw_body: bytes::Bytes,
) -> Result<Response, Error> {
	// route resolution
	let Some(verb) = Verb::from_method(header.method()) else {
		return Err(Error::empty(ClientErrorKind::MethodNotAllowed));
	};

	let path = header.uri().path().to_string();
	let Some((entry, path_params)) = coals.registry.lookup(verb, &path)
	else {
		let kind = if coals.registry.has_other_method_match(verb, &path) {
			ClientErrorKind::MethodNotAllowed
		} else {
			ClientErrorKind::NotFound
		};
		return Err(Error::empty(kind));
	};

	let options = entry.options().clone();
	let mut ctx = RequestContext::new(header, raw_body);

	// stage 2: path parameters
	ctx.path_params = run_validator(
		options.path_params_validator.as_deref(),
		path_params,
		"path",
	)
	.await?;

	// stage 3: url parameters
	if !options.ignore_url_params {
		let url_params = if negotiate::is_write_verb(verb) {
			negotiate::reject_query_for_write(&ctx.header)?;
			Params::new()
		} else {
			negotiate::url_params_for_read(&ctx.header)
		};

		ctx.url_params = run_validator(
			options.url_params_validator.as_deref(),
			url_params,
			"url",
		)
		.await?;
	}

	// stage 4: body parameters
	let body_params = if negotiate::is_write_verb(verb) {
		negotiate::body_params_for_write(&ctx.header, &ctx.raw_body)?
	} else {
		negotiate::reject_body_for_read(&ctx.raw_body)?;
		Params::new()
	};
	ctx.body_params = run_validator(
		options.body_params_validator.as_deref(),
		body_params,
		"body",
	)
	.await?;

	// stage 5: merge body -> query -> path
	merge_params(&mut ctx);

	// stage 6: merged object validator
	if options.params_validator.is_some() {
		let merged = std::mem::take(&mut ctx.params);
		ctx.params = run_validator(
			options.params_validator.as_deref(),
			merged,
			"merged",
		)
		.await?;
	}

	// stage 7: the handler, invoked exactly once
	match entry.handler().call(&mut ctx, &coals.data).await {
		Ok(resp) => Ok(resp),
		Err(e) => {
			error!("handler error: {e}");
			Err(Error::empty(ServerErrorKind::InternalServerError))
		}
	}
}

/// Runs a configured validator over a parameter object.
///
/// The validators result replaces the object; a validator error is a bad
/// request carrying the message, a non object result an internal server
/// error.
async fn run_validator(
	validator: Option<&dyn Validator>,
	params: Params,
	label: &str,
) -> Result<Params, Error> {
	let Some(validator) = validator else {
		return Ok(params);
	};

	match validator.validate(params).await {
		Ok(Value::Object(map)) => Ok(map),
		Ok(other) => {
			error!(
				"{label} params validator returned a non object: {other:?}"
			);
			Err(Error::empty(ServerErrorKind::InternalServerError))
		}
		Err(e) => Err(Error::bad_request(e.message)),
	}
}

/// Merges the three parameter sources, body overwritten by query
/// overwritten by path. The first overwrite of a key logs one collision
/// diagnostic naming the key and both sources.
fn merge_params(ctx: &mut RequestContext) {
	let sources = [
		(ParamSource::Body, ctx.body_params.clone()),
		(ParamSource::Query, ctx.url_params.clone()),
		(ParamSource::Path, ctx.path_params.clone()),
	];

	let mut merged = Params::new();
	let mut logged: HashSet<String> = HashSet::new();

	for (source, params) in sources {
		for (name, value) in params {
			let prev = ctx.param_sources.insert(name.clone(), source);
			let overwritten =
				merged.insert(name.clone(), value).is_some();

			if overwritten && logged.insert(name.clone()) {
				// prev is always set when a value was overwritten
				let prev = prev.map(|s| s.as_str()).unwrap_or("?");
				debug!(
					"parameter collision: {name:?} from {prev} \
					 overridden by {source}"
				);
			}
		}
	}

	ctx.params = merged;
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::Request;

	use serde_json::json;
	use tracing_test::traced_test;

	fn ctx_with(
		body: Params,
		url: Params,
		path: Params,
	) -> RequestContext {
		let req = Request::builder("/x").build();
		let mut ctx =
			RequestContext::new(req.header, bytes::Bytes::new());
		ctx.body_params = body;
		ctx.url_params = url;
		ctx.path_params = path;
		ctx
	}

	fn obj(value: serde_json::Value) -> Params {
		match value {
			Value::Object(map) => map,
			_ => panic!("expected an object"),
		}
	}

	#[traced_test]
	#[test]
	fn merge_precedence_and_single_diagnostic() {
		let mut ctx = ctx_with(
			obj(json!({"a": 1})),
			obj(json!({"a": 2})),
			obj(json!({"a": 3})),
		);

		merge_params(&mut ctx);

		// path wins over query wins over body
		assert_eq!(ctx.params["a"], 3);
		assert_eq!(ctx.param_source("a"), Some(ParamSource::Path));

		// exactly one collision diagnostic for the key
		logs_assert(|lines: &[&str]| {
			let count = lines
				.iter()
				.filter(|l| {
					l.contains("parameter collision")
						&& l.contains("\"a\"")
				})
				.count();
			match count {
				1 => Ok(()),
				n => Err(format!("expected 1 collision log, got {n}")),
			}
		});
	}

	#[traced_test]
	#[test]
	fn merge_without_collisions_is_silent() {
		let mut ctx = ctx_with(
			obj(json!({"a": 1})),
			obj(json!({"b": 2})),
			obj(json!({"c": "3"})),
		);

		merge_params(&mut ctx);

		assert_eq!(ctx.params["a"], 1);
		assert_eq!(ctx.params["b"], 2);
		assert_eq!(ctx.params["c"], "3");
		assert_eq!(ctx.param_source("a"), Some(ParamSource::Body));
		assert_eq!(ctx.param_source("b"), Some(ParamSource::Query));
		assert_eq!(ctx.param_source("c"), Some(ParamSource::Path));

		assert!(!logs_contain("parameter collision"));
	}

	#[tokio::test]
	async fn validator_replaces_object() {
		let validator = crate::routes::validator_fn(|mut params| {
			params.insert("extra".into(), json!(true));
			Ok(Value::Object(params))
		});

		let params = run_validator(
			Some(&*validator),
			obj(json!({"a": 1})),
			"path",
		)
		.await
		.unwrap();

		assert_eq!(params["a"], 1);
		assert_eq!(params["extra"], true);
	}

	#[tokio::test]
	async fn validator_error_is_bad_request() {
		let validator = crate::routes::validator_fn(|_params| {
			Err(crate::routes::ValidatorError::new("id must be numeric"))
		});

		let err = run_validator(
			Some(&*validator),
			Params::new(),
			"path",
		)
		.await
		.unwrap_err();

		assert_eq!(err.status_code().as_u16(), 400);
		assert_eq!(
			err.message(),
			"Bad Request (id must be numeric)"
		);
	}

	#[tokio::test]
	async fn validator_non_object_is_server_error() {
		let validator =
			crate::routes::validator_fn(|_params| Ok(json!([1, 2])));

		let err = run_validator(
			Some(&*validator),
			Params::new(),
			"path",
		)
		.await
		.unwrap_err();

		assert_eq!(err.status_code().as_u16(), 500);
	}
}

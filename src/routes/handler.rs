use crate::header::RequestHeader;
use crate::request::{Params, RequestContext};
use crate::util::PinnedFuture;
use crate::{Data, Response};

use std::sync::Arc;

use serde_json::Value;

/// A request handler, invoked exactly once per resolved request with the
/// fully populated context.
///
/// Handlers are free to write non json responses.
pub trait Handler: Send + Sync {
	/// Check if every data you expect is in `Data`, called at
	/// registration.
	fn validate_data(&self, _data: &Data) {}

	fn call<'a>(
		&'a self,
		req: &'a mut RequestContext,
		data: &'a Data,
	) -> PinnedFuture<'a, crate::Result<Response>>;
}

/// Creates a `Handler` from a function or closure.
pub fn handler_fn<F>(f: F) -> FnHandler<F>
where
	F: for<'a> Fn(
			&'a mut RequestContext,
			&'a Data,
		) -> PinnedFuture<'a, crate::Result<Response>>
		+ Send
		+ Sync,
{
	FnHandler(f)
}

pub struct FnHandler<F>(F);

impl<F> Handler for FnHandler<F>
where
	F: for<'a> Fn(
			&'a mut RequestContext,
			&'a Data,
		) -> PinnedFuture<'a, crate::Result<Response>>
		+ Send
		+ Sync,
{
	fn call<'a>(
		&'a self,
		req: &'a mut RequestContext,
		data: &'a Data,
	) -> PinnedFuture<'a, crate::Result<Response>> {
		(self.0)(req, data)
	}
}

/// An error signaled by a validator, rendered as a bad request with the
/// message as detail.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct ValidatorError {
	pub message: String,
}

impl ValidatorError {
	pub fn new(message: impl Into<String>) -> Self {
		Self {
			message: message.into(),
		}
	}
}

/// Validates or transforms a parameter object.
///
/// The returned value replaces the validated object and therefore must be
/// a json object; a non object result is treated as an internal server
/// error, a `ValidatorError` as a bad request carrying the message.
pub trait Validator: Send + Sync {
	fn validate<'a>(
		&'a self,
		params: Params,
	) -> PinnedFuture<'a, Result<Value, ValidatorError>>;
}

/// Creates a `Validator` from a synchronous function or closure.
pub fn validator_fn<F>(f: F) -> Arc<dyn Validator>
where
	F: Fn(Params) -> Result<Value, ValidatorError>
		+ Send
		+ Sync
		+ 'static,
{
	Arc::new(FnValidator(f))
}

struct FnValidator<F>(F);

impl<F> Validator for FnValidator<F>
where
	F: Fn(Params) -> Result<Value, ValidatorError> + Send + Sync,
{
	fn validate<'a>(
		&'a self,
		params: Params,
	) -> PinnedFuture<'a, Result<Value, ValidatorError>> {
		PinnedFuture::ready((self.0)(params))
	}
}

/// The outcome of the authentication gate.
pub enum AuthFlow {
	Allow,
	/// Abort the pipeline and write this response, the auth implementation
	/// decides what the client sees.
	Deny(Response),
}

/// The authentication gate, it runs before any parameter parsing.
pub trait AuthCheck: Send + Sync {
	fn check<'a>(
		&'a self,
		header: &'a RequestHeader,
		data: &'a Data,
	) -> PinnedFuture<'a, crate::Result<AuthFlow>>;
}

/// Creates an `AuthCheck` from a synchronous predicate returning an
/// `AuthFlow`.
pub fn auth_fn<F>(f: F) -> Arc<dyn AuthCheck>
where
	F: Fn(&RequestHeader, &Data) -> crate::Result<AuthFlow>
		+ Send
		+ Sync
		+ 'static,
{
	Arc::new(FnAuthCheck(f))
}

struct FnAuthCheck<F>(F);

impl<F> AuthCheck for FnAuthCheck<F>
where
	F: Fn(&RequestHeader, &Data) -> crate::Result<AuthFlow> + Send + Sync,
{
	fn check<'a>(
		&'a self,
		header: &'a RequestHeader,
		data: &'a Data,
	) -> PinnedFuture<'a, crate::Result<AuthFlow>> {
		PinnedFuture::ready((self.0)(header, data))
	}
}

/// Handles protocol upgrade requests with the raw hyper request, invoked
/// after authentication succeeded.
pub trait UpgradeHandler: Send + Sync {
	fn call<'a>(
		&'a self,
		req: hyper::Request<hyper::body::Incoming>,
		data: &'a Data,
	) -> PinnedFuture<'a, crate::Result<Response>>;
}

/// Per handler options: optional validators for each parameter source and
/// the merged object, and the switch to skip url parameter processing.
#[derive(Default, Clone)]
pub struct HandlerOptions {
	pub path_params_validator: Option<Arc<dyn Validator>>,
	pub url_params_validator: Option<Arc<dyn Validator>>,
	pub body_params_validator: Option<Arc<dyn Validator>>,
	pub params_validator: Option<Arc<dyn Validator>>,
	/// Skip query string processing entirely, including the rejection of
	/// query strings on POST and PUT.
	pub ignore_url_params: bool,
}

impl std::fmt::Debug for HandlerOptions {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("HandlerOptions")
			.field(
				"path_params_validator",
				&self.path_params_validator.is_some(),
			)
			.field(
				"url_params_validator",
				&self.url_params_validator.is_some(),
			)
			.field(
				"body_params_validator",
				&self.body_params_validator.is_some(),
			)
			.field("params_validator", &self.params_validator.is_some())
			.field("ignore_url_params", &self.ignore_url_params)
			.finish()
	}
}

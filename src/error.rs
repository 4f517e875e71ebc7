use crate::header::StatusCode;
use crate::Response;

use std::error::Error as StdError;
use std::{fmt, io};

pub type Result<T> = std::result::Result<T, Error>;

/// A universal error type which contains a kind, an optional detail and an
/// optional source.
///
/// An error is either associated with the client or the server. Every error
/// renders to a canonical json body `{"code": <int>, "message": <string>}`
/// where the message is the status codes reason phrase; bad request errors
/// append their detail as `" (<detail>)"`.
#[derive(Debug)]
pub struct Error {
	kind: ErrorKind,
	detail: Option<String>,
	source: Option<Box<dyn StdError + Send + Sync>>,
}

impl Error {
	/// Creates a new error.
	pub fn new<K, E>(kind: K, error: E) -> Self
	where
		K: Into<ErrorKind>,
		E: Into<Box<dyn StdError + Send + Sync>>,
	{
		Self {
			kind: kind.into(),
			detail: None,
			source: Some(error.into()),
		}
	}

	/// Creates a new error without a source.
	pub fn empty<K>(kind: K) -> Self
	where
		K: Into<ErrorKind>,
	{
		Self {
			kind: kind.into(),
			detail: None,
			source: None,
		}
	}

	/// Creates a new error carrying a detail which is appended to the
	/// reason phrase of bad request responses.
	pub fn with_detail<K>(kind: K, detail: impl Into<String>) -> Self
	where
		K: Into<ErrorKind>,
	{
		Self {
			kind: kind.into(),
			detail: Some(detail.into()),
			source: None,
		}
	}

	/// A shorthand for a bad request with a detail.
	pub fn bad_request(detail: impl Into<String>) -> Self {
		Self::with_detail(ClientErrorKind::BadRequest, detail)
	}

	pub fn kind(&self) -> &ErrorKind {
		&self.kind
	}

	pub fn detail(&self) -> Option<&str> {
		self.detail.as_deref()
	}

	/// Returns the `StatusCode` corresponding to the `ErrorKind`.
	pub fn status_code(&self) -> StatusCode {
		match self.kind {
			ErrorKind::Client(c) => c.into(),
			ErrorKind::Server(s) => s.into(),
		}
	}

	/// Returns a new error from an io::Error originating from the client.
	pub fn from_client_io(error: io::Error) -> Self {
		// try to detect if source is known to us
		Self::new(ClientErrorKind::from_io(&error), error)
	}

	/// Returns a new error originating from the server.
	pub fn from_server_error<E>(error: E) -> Self
	where
		E: Into<Box<dyn StdError + Send + Sync>>,
	{
		Self::new(ServerErrorKind::InternalServerError, error)
	}

	/// The message used in the json error body.
	pub fn message(&self) -> String {
		let status = self.status_code();
		let phrase = status.canonical_reason().unwrap_or("Unknown");

		match &self.detail {
			Some(detail) if status == StatusCode::BAD_REQUEST => {
				format!("{phrase} ({detail})")
			}
			_ => phrase.to_string(),
		}
	}

	/// Converts the error into a json response
	/// `{"code": <int>, "message": <string>}`.
	pub fn to_response(&self) -> Response {
		let body = serde_json::json!({
			"code": self.status_code().as_u16(),
			"message": self.message()
		});
		// serializing a json value cannot fail
		let body = serde_json::to_vec(&body).unwrap();

		Response::builder()
			.status_code(self.status_code())
			.content_type("application/json; charset=utf-8")
			.body(body)
			.build()
	}
}

impl<T> From<T> for Error
where
	T: Into<ErrorKind>,
{
	fn from(e: T) -> Self {
		Self::empty(e)
	}
}

impl fmt::Display for Error {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		fmt::Debug::fmt(self, f)
	}
}

impl StdError for Error {
	fn source(&self) -> Option<&(dyn StdError + 'static)> {
		self.source.as_ref().and_then(|e| e.source())
	}
}

/// An error can either come from the client or the server.
#[derive(Debug)]
pub enum ErrorKind {
	Client(ClientErrorKind),
	Server(ServerErrorKind),
}

impl From<ClientErrorKind> for ErrorKind {
	fn from(k: ClientErrorKind) -> Self {
		Self::Client(k)
	}
}

impl From<ServerErrorKind> for ErrorKind {
	fn from(k: ServerErrorKind) -> Self {
		Self::Server(k)
	}
}

macro_rules! error_kind {
	($name:ident, $($kind:ident => $status:ident),*) => (
		#[derive(Debug, Clone, Copy, PartialEq, Eq)]
		pub enum $name {
			$($kind),*
		}

		impl From<$name> for StatusCode {
			fn from(k: $name) -> Self {
				match k {
					$($name::$kind => Self::$status),*
				}
			}
		}
	)
}

// impl ClientErrorKind
error_kind!( ClientErrorKind,
	BadRequest => BAD_REQUEST,
	Unauthorized => UNAUTHORIZED,
	Forbidden => FORBIDDEN,
	NotFound => NOT_FOUND,
	MethodNotAllowed => METHOD_NOT_ALLOWED,
	NotAcceptable => NOT_ACCEPTABLE,
	RequestTimeout => REQUEST_TIMEOUT,
	Conflict => CONFLICT,
	PayloadTooLarge => PAYLOAD_TOO_LARGE,
	TooManyRequests => TOO_MANY_REQUESTS
);

impl ClientErrorKind {
	/// Converts an io::Error into the appropriate kind.
	pub fn from_io(error: &io::Error) -> Self {
		use io::ErrorKind::*;
		match error.kind() {
			UnexpectedEof => Self::PayloadTooLarge,
			TimedOut => Self::RequestTimeout,
			_ => Self::BadRequest,
		}
	}
}

// impl ServerErrorKind
error_kind!( ServerErrorKind,
	InternalServerError => INTERNAL_SERVER_ERROR,
	NotImplemented => NOT_IMPLEMENTED,
	ServiceUnavailable => SERVICE_UNAVAILABLE
);

use crate::body::Body;
use crate::header::{values::IntoHeaderName, HeaderValue, HeaderValues};
use crate::header::{ResponseHeader, StatusCode};

use std::fmt;

/// The response created from a server.
#[derive(Debug)]
pub struct Response {
	pub header: ResponseHeader,
	// if you override the body you should probably reset the
	// content-length header
	pub body: Body,
}

impl Response {
	/// Creates a new `Response`.
	pub fn new(header: ResponseHeader, body: Body) -> Self {
		Self { header, body }
	}

	/// Creates a new `Response` with a builder.
	pub fn builder() -> ResponseBuilder {
		ResponseBuilder::new()
	}

	/// Get the response header by reference.
	pub fn header(&self) -> &ResponseHeader {
		&self.header
	}

	/// Takes the body replacing it with an empty one.
	pub fn take_body(&mut self) -> Body {
		self.body.take()
	}

	pub fn text(body: impl Into<Body>) -> Self {
		Self::builder()
			.content_type("text/plain; charset=utf-8")
			.body(body)
			.build()
	}

	pub fn html(body: impl Into<Body>) -> Self {
		Self::builder()
			.content_type("text/html; charset=utf-8")
			.body(body)
			.build()
	}
}

impl From<Body> for Response {
	fn from(body: Body) -> Self {
		Self::builder().body(body).build()
	}
}

impl From<StatusCode> for Response {
	fn from(status_code: StatusCode) -> Self {
		Self::builder().status_code(status_code).build()
	}
}

/// A builder to create a `Response`.
#[derive(Debug)]
pub struct ResponseBuilder {
	header: ResponseHeader,
	body: Body,
}

impl ResponseBuilder {
	/// Creates a new `ResponseBuilder`.
	pub fn new() -> Self {
		Self {
			header: ResponseHeader::default(),
			body: Body::new(),
		}
	}

	/// Sets the status code.
	pub fn status_code(mut self, status_code: StatusCode) -> Self {
		self.header.status_code = status_code;
		self
	}

	/// Sets the content type.
	pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
		self.header.content_type = Some(content_type.into());
		self
	}

	/// Sets a header value.
	///
	/// ## Panics
	/// If the value is not a valid `HeaderValue`.
	pub fn header<K, V>(mut self, key: K, val: V) -> Self
	where
		K: IntoHeaderName,
		V: TryInto<HeaderValue>,
		V::Error: fmt::Debug,
	{
		self.values_mut().insert(key, val);
		self
	}

	/// Returns `HeaderValues` mutably.
	pub fn values_mut(&mut self) -> &mut HeaderValues {
		&mut self.header.values
	}

	/// Sets the body dropping the previous one.
	pub fn body(mut self, body: impl Into<Body>) -> Self {
		self.body = body.into();
		self
	}

	/// Builds a `Response`. Adding the `content-length` header
	/// if the len of the body is known.
	pub fn build(mut self) -> Response {
		if let Some(len) = self.body.len() {
			self.values_mut().insert("content-length", len);
		}

		Response::new(self.header, self.body)
	}
}

impl Default for ResponseBuilder {
	fn default() -> Self {
		Self::new()
	}
}

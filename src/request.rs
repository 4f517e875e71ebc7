use crate::body::Body;
use crate::header::{HeaderValues, Method, RequestHeader, Uri};

use std::collections::HashMap;
use std::fmt;
use std::net::{Ipv4Addr, SocketAddr};

use bytes::Bytes;

/// A json parameter object as produced by the negotiator, the matcher and
/// the validators.
pub type Params = serde_json::Map<String, serde_json::Value>;

/// The request that is received from a client, before it entered the
/// pipeline.
#[derive(Debug)]
pub struct Request {
	pub header: RequestHeader,
	pub body: Body,
}

impl Request {
	/// Creates a new `Request`.
	pub fn new(header: RequestHeader, body: Body) -> Self {
		Self { header, body }
	}

	/// Creates a new `Request` with a builder.
	pub fn builder(uri: impl AsRef<str>) -> RequestBuilder {
		RequestBuilder::new(uri)
	}

	/// Get the request header by reference.
	pub fn header(&self) -> &RequestHeader {
		&self.header
	}

	/// Takes the body replacing it with an empty one.
	pub fn take_body(&mut self) -> Body {
		self.body.take()
	}
}

/// A builder to create a `Request`, mostly useful in tests and for
/// embedders which route requests without a server.
#[derive(Debug)]
pub struct RequestBuilder {
	header: RequestHeader,
	body: Body,
}

impl RequestBuilder {
	/// Creates a new builder for the given uri.
	///
	/// ## Panics
	/// If the uri is invalid.
	pub fn new(uri: impl AsRef<str>) -> Self {
		let uri: Uri = uri.as_ref().parse().expect("invalid uri");

		Self {
			header: RequestHeader {
				address: SocketAddr::new(Ipv4Addr::LOCALHOST.into(), 0),
				method: Method::GET,
				uri,
				values: HeaderValues::new(),
			},
			body: Body::new(),
		}
	}

	pub fn method(mut self, method: Method) -> Self {
		self.header.method = method;
		self
	}

	pub fn address(mut self, address: SocketAddr) -> Self {
		self.header.address = address;
		self
	}

	/// Sets a header value.
	///
	/// ## Panics
	/// If the value is not a valid `HeaderValue`.
	pub fn header<K, V>(mut self, key: K, val: V) -> Self
	where
		K: http::header::IntoHeaderName,
		V: TryInto<http::header::HeaderValue>,
		V::Error: fmt::Debug,
	{
		self.header.values.insert(key, val);
		self
	}

	/// Sets the body dropping the previous one.
	pub fn body(mut self, body: impl Into<Body>) -> Self {
		self.body = body.into();
		self
	}

	pub fn build(self) -> Request {
		Request::new(self.header, self.body)
	}
}

/// The source a merged parameter originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamSource {
	Body,
	Query,
	Path,
}

impl ParamSource {
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Body => "body",
			Self::Query => "query",
			Self::Path => "path",
		}
	}
}

impl fmt::Display for ParamSource {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// The per request context which is handed to the resolved handler.
///
/// Created when the pipeline starts and discarded once the response is
/// written. Only pipeline stages mutate it, strictly one after the other.
#[derive(Debug)]
pub struct RequestContext {
	pub header: RequestHeader,
	/// The raw assembled request body.
	pub raw_body: Bytes,
	/// Parameters decoded from the request body.
	pub body_params: Params,
	/// Parameters decoded from the query string.
	pub url_params: Params,
	/// Parameters captured from the request path.
	pub path_params: Params,
	/// The merged parameter object, body overwritten by query overwritten
	/// by path.
	pub params: Params,
	/// Which source a merged parameter came from, used only for
	/// diagnostics.
	pub param_sources: HashMap<String, ParamSource>,
}

impl RequestContext {
	pub(crate) fn new(header: RequestHeader, raw_body: Bytes) -> Self {
		Self {
			header,
			raw_body,
			body_params: Params::new(),
			url_params: Params::new(),
			path_params: Params::new(),
			params: Params::new(),
			param_sources: HashMap::new(),
		}
	}

	pub fn header(&self) -> &RequestHeader {
		&self.header
	}

	/// Returns a merged parameter by name.
	pub fn param(&self, name: &str) -> Option<&serde_json::Value> {
		self.params.get(name)
	}

	/// Returns the source of a merged parameter.
	pub fn param_source(&self, name: &str) -> Option<ParamSource> {
		self.param_sources.get(name).copied()
	}
}

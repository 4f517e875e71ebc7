use std::net::SocketAddr;

pub use http::{Method, StatusCode, Uri};

mod content_type;
pub use content_type::{ContentTypeError, ContentTypeValue};

pub mod values;
pub use values::{HeaderValue, HeaderValues};

pub use constants::*;

/// RequestHeader received from a client.
#[derive(Debug, Clone)]
pub struct RequestHeader {
	pub address: SocketAddr,
	pub method: Method,
	pub uri: Uri,
	pub values: HeaderValues,
}

impl RequestHeader {
	/// Returns the ip address of the requesting client.
	pub fn address(&self) -> &SocketAddr {
		&self.address
	}

	/// Returns the requesting method.
	pub fn method(&self) -> &Method {
		&self.method
	}

	/// Returns the requesting uri.
	pub fn uri(&self) -> &Uri {
		&self.uri
	}

	/// Returns all header values.
	pub fn values(&self) -> &HeaderValues {
		&self.values
	}

	/// Returns a header value from it's key if it exists and is valid ascii.
	pub fn value<K>(&self, key: K) -> Option<&str>
	where
		K: values::AsHeaderName,
	{
		self.values.get_str(key)
	}
}

/// ResponseHeader created from a server.
#[derive(Debug, Clone)]
pub struct ResponseHeader {
	pub status_code: StatusCode,
	pub content_type: Option<String>,
	pub values: HeaderValues,
}

impl ResponseHeader {
	/// Returns the used status code.
	pub fn status_code(&self) -> &StatusCode {
		&self.status_code
	}

	/// Returns the used content type.
	pub fn content_type(&self) -> Option<&str> {
		self.content_type.as_deref()
	}

	/// Returns all header values.
	pub fn values(&self) -> &HeaderValues {
		&self.values
	}

	/// Returns a header value from it's key if it exists and is valid ascii.
	pub fn value<K>(&self, key: K) -> Option<&str>
	where
		K: values::AsHeaderName,
	{
		self.values.get_str(key)
	}
}

impl Default for ResponseHeader {
	fn default() -> Self {
		Self {
			status_code: StatusCode::OK,
			content_type: None,
			values: HeaderValues::new(),
		}
	}
}

mod constants {
	pub use hyper::header::{
		CACHE_CONTROL, CONNECTION, CONTENT_LENGTH, CONTENT_TYPE, PRAGMA,
		TRANSFER_ENCODING, UPGRADE,
	};
}

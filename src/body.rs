use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::{fmt, mem};

use bytes::{Bytes, BytesMut};
use futures_core::Stream;
use hyper::body::{Body as HyperBody, Frame, Incoming};
use tokio_stream::StreamExt;

type PinnedByteStream =
	Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send + Sync>>;

enum Inner {
	Empty,
	// Bytes will never be empty
	Bytes(Bytes),
	Hyper(Incoming),
	Stream(PinnedByteStream),
}

impl fmt::Debug for Inner {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self {
			Self::Empty => f.write_str("Empty"),
			Self::Bytes(b) => f.debug_tuple("Bytes").field(&b.len()).finish(),
			Self::Hyper(_) => f.write_str("Hyper"),
			Self::Stream(_) => f.write_str("Stream"),
		}
	}
}

impl Default for Inner {
	fn default() -> Self {
		Self::Empty
	}
}

/// A request or response body.
///
/// Reading a request body is always bounded by the size and timeout limits
/// of the lifecycle controller, the `Body` itself carries no constraints.
#[derive(Debug, Default)]
pub struct Body {
	inner: Inner,
}

impl Body {
	fn new_inner(inner: Inner) -> Self {
		Self { inner }
	}

	/// Creates a new empty `Body`.
	pub fn new() -> Self {
		Self::new_inner(Inner::Empty)
	}

	/// Creates a new `Body` from the given bytes.
	pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
		let bytes = bytes.into();
		if !bytes.is_empty() {
			Self::new_inner(Inner::Bytes(bytes))
		} else {
			Self::new()
		}
	}

	/// Creates a new `Body` from a `hyper::body::Incoming`.
	pub fn from_hyper(body: Incoming) -> Self {
		Self::new_inner(Inner::Hyper(body))
	}

	/// Creates a new `Body` from a `Stream<Item = io::Result<Bytes>>`.
	pub fn from_stream<S>(stream: S) -> Self
	where
		S: Stream<Item = io::Result<Bytes>> + Send + Sync + 'static,
	{
		Self::new_inner(Inner::Stream(Box::pin(stream)))
	}

	/// Creates a new `Body` from a serializeable object.
	pub fn serialize<S>(value: &S) -> Result<Self, serde_json::Error>
	where
		S: serde::Serialize + ?Sized,
	{
		serde_json::to_vec(value).map(|v| v.into())
	}

	/// Returns true if we know the body is empty, the body still might be
	/// empty but we just don't know it yet.
	pub fn is_empty(&self) -> bool {
		matches!(self.inner, Inner::Empty)
	}

	/// Returns a length if it is already known.
	pub fn len(&self) -> Option<usize> {
		match &self.inner {
			Inner::Empty => Some(0),
			Inner::Bytes(b) => Some(b.len()),
			_ => None,
		}
	}

	/// Takes the body and replaces it with an empty one.
	pub fn take(&mut self) -> Self {
		mem::take(self)
	}

	/// Converts the Body into a `Stream` of byte chunks.
	pub fn into_stream(self) -> BodyStream {
		BodyStream { inner: self.inner }
	}

	/// Converts the Body into Bytes, without any limits.
	///
	/// ## Note
	/// Request bodies should be read through the lifecycle controller
	/// which enforces size and timeout limits.
	pub async fn into_bytes(self) -> io::Result<Bytes> {
		match self.inner {
			Inner::Empty => Ok(Bytes::new()),
			Inner::Bytes(b) => Ok(b),
			inner => {
				let mut stream = BodyStream { inner };
				let mut buf = BytesMut::new();
				while let Some(chunk) = stream.next().await {
					buf.extend_from_slice(&chunk?);
				}
				Ok(buf.freeze())
			}
		}
	}

	/// Converts the Body into a string.
	pub async fn into_string(self) -> io::Result<String> {
		let bytes = self.into_bytes().await?;
		String::from_utf8(bytes.into())
			.map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
	}

	/// Converts the Body into a deserializeable type.
	pub async fn deserialize<D>(self) -> io::Result<D>
	where
		D: serde::de::DeserializeOwned,
	{
		let bytes = self.into_bytes().await?;
		serde_json::from_slice(&bytes)
			.map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
	}

	/// Converts the Body into a type that implements `hyper::body::Body`.
	pub fn into_http_body(self) -> HttpBody {
		HttpBody {
			inner: self.into_stream(),
		}
	}
}

impl From<Bytes> for Body {
	fn from(b: Bytes) -> Self {
		Self::from_bytes(b)
	}
}

impl From<Vec<u8>> for Body {
	fn from(b: Vec<u8>) -> Self {
		Self::from_bytes(b)
	}
}

impl From<String> for Body {
	fn from(s: String) -> Self {
		Self::from_bytes(s)
	}
}

impl From<&'static str> for Body {
	fn from(s: &'static str) -> Self {
		Self::from_bytes(Bytes::from_static(s.as_bytes()))
	}
}

impl From<Incoming> for Body {
	fn from(i: Incoming) -> Self {
		Self::from_hyper(i)
	}
}

/// The chunks of a `Body` as a `Stream`.
pub struct BodyStream {
	inner: Inner,
}

impl Stream for BodyStream {
	type Item = io::Result<Bytes>;

	fn poll_next(
		self: Pin<&mut Self>,
		cx: &mut Context,
	) -> Poll<Option<io::Result<Bytes>>> {
		let me = self.get_mut();

		match &mut me.inner {
			Inner::Empty => Poll::Ready(None),
			Inner::Bytes(b) => {
				let bytes = mem::take(b);
				me.inner = Inner::Empty;
				Poll::Ready(Some(Ok(bytes)))
			}
			Inner::Hyper(i) => {
				// skip non data frames
				loop {
					break match Pin::new(&mut *i).poll_frame(cx) {
						Poll::Ready(Some(Ok(frame))) => {
							let Ok(data) = frame.into_data() else {
								continue;
							};

							Poll::Ready(Some(Ok(data)))
						}
						Poll::Ready(Some(Err(e))) => Poll::Ready(Some(Err(
							io::Error::new(io::ErrorKind::Other, e),
						))),
						Poll::Ready(None) => Poll::Ready(None),
						Poll::Pending => Poll::Pending,
					};
				}
			}
			Inner::Stream(s) => s.as_mut().poll_next(cx),
		}
	}
}

/// A response body handed to hyper.
pub struct HttpBody {
	inner: BodyStream,
}

impl HttpBody {
	pub fn empty() -> Self {
		Body::new().into_http_body()
	}
}

impl HyperBody for HttpBody {
	type Data = Bytes;
	type Error = io::Error;

	fn poll_frame(
		self: Pin<&mut Self>,
		cx: &mut Context,
	) -> Poll<Option<io::Result<Frame<Bytes>>>> {
		let me = self.get_mut();
		match Pin::new(&mut me.inner).poll_next(cx) {
			Poll::Ready(Some(Ok(b))) => Poll::Ready(Some(Ok(Frame::data(b)))),
			Poll::Ready(Some(Err(e))) => Poll::Ready(Some(Err(e))),
			Poll::Ready(None) => Poll::Ready(None),
			Poll::Pending => Poll::Pending,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn is_send<T: Send>() {}
	fn is_sync<T: Sync>() {}

	#[test]
	fn body_markers() {
		is_send::<Body>();
		is_sync::<Body>();
	}

	#[tokio::test]
	async fn bytes_roundtrip() {
		let body = Body::from_bytes("hello world");
		assert_eq!(body.len(), Some(11));
		let s = body.into_string().await.unwrap();
		assert_eq!(s, "hello world");
	}

	#[tokio::test]
	async fn empty_is_empty() {
		let body = Body::from_bytes("");
		assert!(body.is_empty());
		assert_eq!(body.into_bytes().await.unwrap().len(), 0);
	}
}

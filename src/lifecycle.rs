//! The per request body lifecycle controller.
//!
//! A terminal once state machine accumulates the request body under the
//! configured size and timeout limits. Exactly one terminal transition
//! happens per request; events arriving after completion are ignored.

use crate::body::Body;
use crate::error::{ClientErrorKind, Error};
use crate::header::{RequestHeader, CONTENT_LENGTH, TRANSFER_ENCODING};
use crate::pipeline::RequestConfigs;

use bytes::{Bytes, BytesMut};
use tokio_stream::StreamExt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
	Reading,
	Completed,
}

/// The terminal outcome of a body read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Terminal {
	Done,
	/// More bytes arrived than the declared content-length.
	LengthExceeded,
	/// The configured maximum body size was exceeded.
	TooLarge,
	/// The stream ended before the declared content-length was reached.
	LengthMismatch,
	TimedOut,
}

/// Tracks the accumulated byte count against the declared and configured
/// bounds. Once a terminal transition happened all further events are
/// ignored.
#[derive(Debug)]
pub(crate) struct Lifecycle {
	state: State,
	received: usize,
	expected: Option<usize>,
	size_limit: usize,
}

impl Lifecycle {
	pub fn new(expected: Option<usize>, size_limit: usize) -> Self {
		Self {
			state: State::Reading,
			received: 0,
			expected,
			size_limit,
		}
	}

	pub fn is_completed(&self) -> bool {
		self.state == State::Completed
	}

	pub fn received(&self) -> usize {
		self.received
	}

	fn complete(&mut self, terminal: Terminal) -> Option<Terminal> {
		if self.state == State::Completed {
			return None;
		}
		self.state = State::Completed;
		Some(terminal)
	}

	/// A chunk of `len` bytes arrived. Returns the terminal transition
	/// this event caused, if any.
	pub fn on_chunk(&mut self, len: usize) -> Option<Terminal> {
		if self.state == State::Completed {
			return None;
		}

		self.received += len;

		if matches!(self.expected, Some(e) if self.received > e) {
			return self.complete(Terminal::LengthExceeded);
		}
		if self.received > self.size_limit {
			return self.complete(Terminal::TooLarge);
		}

		None
	}

	/// The stream ended.
	pub fn on_end(&mut self) -> Option<Terminal> {
		if self.state == State::Completed {
			return None;
		}

		match self.expected {
			Some(e) if e != self.received => {
				self.complete(Terminal::LengthMismatch)
			}
			_ => self.complete(Terminal::Done),
		}
	}

	/// The read timer fired.
	pub fn on_timeout(&mut self) -> Option<Terminal> {
		if self.state == State::Completed {
			return None;
		}
		self.complete(Terminal::TimedOut)
	}
}

/// Validates the length related headers and accumulates the body.
///
/// Rejects before reading when a chunked transfer-encoding is combined
/// with a content-length, when the content-length is malformed or when it
/// already exceeds the size limit. While reading, the declared length and
/// the size limit bound the accumulated count and a timer bounds the
/// elapsed time.
pub(crate) async fn read_body(
	header: &RequestHeader,
	body: Body,
	configs: &RequestConfigs,
) -> Result<Bytes, Error> {
	let chunked = header
		.value(TRANSFER_ENCODING)
		.map(|v| v.to_ascii_lowercase().contains("chunked"))
		.unwrap_or(false);
	let content_length = header.value(CONTENT_LENGTH);

	if chunked && content_length.is_some() {
		return Err(Error::bad_request(
			"chunked transfer-encoding combined with content-length",
		));
	}

	let expected = match content_length {
		Some(raw) => match raw.trim().parse::<usize>() {
			Ok(len) => Some(len),
			Err(_) => {
				return Err(Error::bad_request(
					"content-length is not a valid integer",
				))
			}
		},
		None => None,
	};

	// destroy the transport without reading a single byte
	if matches!(expected, Some(e) if e > configs.size_limit) {
		return Err(Error::empty(ClientErrorKind::PayloadTooLarge));
	}

	let mut lifecycle = Lifecycle::new(expected, configs.size_limit);
	let mut stream = body.into_stream();
	let mut buf = BytesMut::new();

	let timer = tokio::time::sleep(configs.timeout);
	tokio::pin!(timer);

	let terminal = loop {
		tokio::select! {
			chunk = stream.next() => match chunk {
				Some(Ok(bytes)) => {
					buf.extend_from_slice(&bytes);
					if let Some(terminal) = lifecycle.on_chunk(bytes.len())
					{
						break terminal;
					}
				}
				Some(Err(e)) => return Err(Error::from_client_io(e)),
				None => {
					// on_end always yields the terminal here since no
					// prior event completed the lifecycle
					break lifecycle.on_end().expect("already completed");
				}
			},
			_ = &mut timer => {
				if let Some(terminal) = lifecycle.on_timeout() {
					break terminal;
				}
			}
		}
	};

	match terminal {
		Terminal::Done => Ok(buf.freeze()),
		Terminal::LengthExceeded => Err(Error::bad_request(
			"body exceeds the declared content-length",
		)),
		Terminal::TooLarge => {
			Err(Error::empty(ClientErrorKind::PayloadTooLarge))
		}
		Terminal::LengthMismatch => Err(Error::bad_request(
			"body is shorter than the declared content-length",
		)),
		Terminal::TimedOut => {
			Err(Error::empty(ClientErrorKind::RequestTimeout))
		}
	}
}

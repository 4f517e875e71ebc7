use std::fmt;

pub use http::header::{
	AsHeaderName, HeaderName, HeaderValue, IntoHeaderName, InvalidHeaderValue,
};

/// Contains all http header values.
///
/// This is really similar to `http::header::HeaderMap` except
/// that it uses `TryInto<HeaderValue>` for inserting and it does not allow
/// multiple values for a given key.
#[derive(Debug, Clone)]
pub struct HeaderValues(http::HeaderMap<HeaderValue>);

impl HeaderValues {
	/// Creates a new empty `HeaderValues`.
	pub fn new() -> Self {
		Self(http::HeaderMap::new())
	}

	/// Creates a new `HeaderValues` from it's inner type.
	pub fn from_inner(inner: http::HeaderMap<HeaderValue>) -> Self {
		Self(inner)
	}

	/// Insert a new key and value into the header.
	///
	/// If a value to this key is already present
	/// that value is dropped.
	///
	/// ## Panics
	/// If the value is not a valid HeaderValue.
	pub fn insert<K, V>(&mut self, key: K, val: V) -> Option<HeaderValue>
	where
		K: IntoHeaderName,
		V: TryInto<HeaderValue>,
		V::Error: fmt::Debug,
	{
		let val = val.try_into().expect("invalid HeaderValue");
		self.0.insert(key, val)
	}

	/// Insert a new key and value into the header. Returning
	/// an error if the value is not valid.
	pub fn try_insert<K, V>(
		&mut self,
		key: K,
		val: V,
	) -> Result<Option<HeaderValue>, InvalidHeaderValue>
	where
		K: IntoHeaderName,
		V: TryInto<HeaderValue, Error = InvalidHeaderValue>,
	{
		Ok(self.0.insert(key, val.try_into()?))
	}

	/// Returns the value if it exists.
	pub fn get<K>(&self, key: K) -> Option<&HeaderValue>
	where
		K: AsHeaderName,
	{
		self.0.get(key)
	}

	/// Returns the value as a string if it exists and is valid.
	pub fn get_str<K>(&self, key: K) -> Option<&str>
	where
		K: AsHeaderName,
	{
		self.get(key).and_then(|v| v.to_str().ok())
	}

	pub fn contains_key<K>(&self, key: K) -> bool
	where
		K: AsHeaderName,
	{
		self.0.contains_key(key)
	}

	/// Returns the inner `HeaderMap`.
	pub fn into_inner(self) -> http::HeaderMap<HeaderValue> {
		self.0
	}
}

impl Default for HeaderValues {
	fn default() -> Self {
		Self::new()
	}
}

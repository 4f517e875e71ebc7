//! The handler registry and its building blocks.
//!
//! Every verb owns two stores keyed by the literal template string: an
//! exact store for capture free templates and a dynamic store for
//! templates with captures. Exact lookups are a map probe, dynamic
//! lookups walk the entries in registration order.

pub mod template;
pub use template::{PathTemplate, Segment, TemplateError};

pub mod matcher;
pub use matcher::{match_template, RequestPath};

mod handler;
pub use handler::{
	auth_fn, handler_fn, validator_fn, AuthCheck, AuthFlow, Handler,
	HandlerOptions, UpgradeHandler, Validator, ValidatorError,
};

use crate::header::Method;
use crate::request::Params;

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use thiserror::Error;

/// The fixed verb set the registry accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
	Get,
	Post,
	Put,
	Delete,
}

impl Verb {
	pub const ALL: [Verb; 4] = [Verb::Get, Verb::Post, Verb::Put, Verb::Delete];

	/// Parses a verb case insensitively, normalizing to the fixed set.
	pub fn parse(s: &str) -> Option<Self> {
		match s.to_ascii_uppercase().as_str() {
			"GET" => Some(Self::Get),
			"POST" => Some(Self::Post),
			"PUT" => Some(Self::Put),
			"DELETE" => Some(Self::Delete),
			_ => None,
		}
	}

	pub fn from_method(method: &Method) -> Option<Self> {
		match *method {
			Method::GET => Some(Self::Get),
			Method::POST => Some(Self::Post),
			Method::PUT => Some(Self::Put),
			Method::DELETE => Some(Self::Delete),
			_ => None,
		}
	}

	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Get => "GET",
			Self::Post => "POST",
			Self::Put => "PUT",
			Self::Delete => "DELETE",
		}
	}
}

impl fmt::Display for Verb {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

#[derive(Debug, Error)]
pub enum AddRouteError {
	#[error("method {0:?} is not one of GET, POST, PUT, DELETE")]
	Method(String),
	#[error(transparent)]
	Template(#[from] TemplateError),
}

impl From<AddRouteError> for crate::Error {
	fn from(e: AddRouteError) -> Self {
		crate::Error::new(
			crate::error::ServerErrorKind::InternalServerError,
			e,
		)
	}
}

/// One registered route: a compiled template, its handler and options.
pub struct HandlerEntry {
	template: PathTemplate,
	handler: Box<dyn Handler>,
	options: HandlerOptions,
}

impl HandlerEntry {
	pub fn template(&self) -> &PathTemplate {
		&self.template
	}

	pub fn handler(&self) -> &dyn Handler {
		&*self.handler
	}

	pub fn options(&self) -> &HandlerOptions {
		&self.options
	}
}

impl fmt::Debug for HandlerEntry {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("HandlerEntry")
			.field("template", &self.template.source())
			.field("options", &self.options)
			.finish()
	}
}

#[derive(Default)]
struct MethodStore {
	exact: HashMap<String, Arc<HandlerEntry>>,
	// registration order matters, overlapping templates resolve to the
	// first registered match
	dynamic: Vec<Arc<HandlerEntry>>,
}

impl MethodStore {
	fn is_empty(&self) -> bool {
		self.exact.is_empty() && self.dynamic.is_empty()
	}

	fn insert(&mut self, entry: Arc<HandlerEntry>) {
		if entry.template.is_exact() {
			self.exact
				.insert(entry.template.source().to_string(), entry);
		} else if let Some(pos) = self
			.dynamic
			.iter()
			.position(|e| e.template.source() == entry.template.source())
		{
			// replacing keeps the original registration position
			self.dynamic[pos] = entry;
		} else {
			self.dynamic.push(entry);
		}
	}

	fn remove(&mut self, path: &str) -> bool {
		if self.exact.remove(path).is_some() {
			return true;
		}

		let before = self.dynamic.len();
		self.dynamic.retain(|e| e.template.source() != path);
		self.dynamic.len() != before
	}

	fn matches(&self, path: &str, decomposed: &RequestPath) -> bool {
		self.lookup(path, decomposed).is_some()
	}

	fn lookup(
		&self,
		path: &str,
		decomposed: &RequestPath,
	) -> Option<(Arc<HandlerEntry>, Params)> {
		if let Some(entry) = self.exact.get(path) {
			return Some((entry.clone(), Params::new()));
		}

		// an exact template without a trailing slash requirement also
		// matches the path with one trailing slash, the root is never
		// expanded
		if let Some(stripped) = path.strip_suffix('/') {
			if stripped.len() > 1 {
				if let Some(entry) = self.exact.get(stripped) {
					if !entry.template.has_trailing_slash() {
						return Some((entry.clone(), Params::new()));
					}
				}
			}
		}

		for entry in &self.dynamic {
			if let Some(params) =
				match_template(&entry.template, decomposed)
			{
				return Some((entry.clone(), params));
			}
		}

		None
	}
}

/// The per method store of registered handlers.
///
/// Mutation is safe while lookups are in flight: entries are whole
/// `Arc`s behind one lock, a lookup observes the pre or post mutation
/// state of an entry, never a torn one.
#[derive(Default)]
pub struct Registry {
	stores: RwLock<HashMap<Verb, MethodStore>>,
}

impl Registry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers a handler for a method and template.
	///
	/// Registering the same `(method, template)` twice replaces the prior
	/// entry.
	pub fn add<H>(
		&self,
		method: &str,
		template: &str,
		handler: H,
		options: HandlerOptions,
	) -> Result<(), AddRouteError>
	where
		H: Handler + 'static,
	{
		let verb = Verb::parse(method)
			.ok_or_else(|| AddRouteError::Method(method.to_string()))?;
		let template = PathTemplate::compile(template)?;

		let entry = Arc::new(HandlerEntry {
			template,
			handler: Box::new(handler),
			options,
		});

		let mut stores = self.stores.write().unwrap();
		stores.entry(verb).or_default().insert(entry);

		Ok(())
	}

	/// Removes the literal template string from a method's stores, or with
	/// `"*"` from every method's stores. Returns whether anything was
	/// removed; empty stores are pruned.
	pub fn delete(&self, method: &str, path: &str) -> bool {
		let mut stores = self.stores.write().unwrap();

		let removed = if method == "*" {
			let mut any = false;
			for verb in Verb::ALL {
				if let Some(store) = stores.get_mut(&verb) {
					any |= store.remove(path);
				}
			}
			any
		} else {
			match Verb::parse(method) {
				Some(verb) => stores
					.get_mut(&verb)
					.map(|s| s.remove(path))
					.unwrap_or(false),
				None => false,
			}
		};

		stores.retain(|_, store| !store.is_empty());

		removed
	}

	/// Resolves a request path against a method's store.
	///
	/// The exact store is probed first, then the dynamic entries in
	/// registration order.
	pub fn lookup(
		&self,
		verb: Verb,
		path: &str,
	) -> Option<(Arc<HandlerEntry>, Params)> {
		let stores = self.stores.read().unwrap();
		let store = stores.get(&verb)?;
		store.lookup(path, &RequestPath::decompose(path))
	}

	/// True if any other method's store matches the path, used to pick
	/// between 404 and 405.
	pub fn has_other_method_match(&self, verb: Verb, path: &str) -> bool {
		let stores = self.stores.read().unwrap();
		let decomposed = RequestPath::decompose(path);

		stores
			.iter()
			.filter(|(v, _)| **v != verb)
			.any(|(_, store)| store.matches(path, &decomposed))
	}
}

impl fmt::Debug for Registry {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let stores = self.stores.read().unwrap();
		let mut map = f.debug_map();
		for (verb, store) in stores.iter() {
			map.entry(
				verb,
				&(store.exact.len() + store.dynamic.len()),
			);
		}
		map.finish()
	}
}

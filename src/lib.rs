#![doc = include_str!("../README.md")]

mod data;
pub use data::Data;

pub mod routes;
use routes::{
	AddRouteError, AuthCheck, Handler, HandlerOptions, Registry,
	UpgradeHandler,
};

pub mod util;
pub use util::PinnedFuture;

pub mod error;
pub use error::{Error, Result};

mod server;
use server::Server;

mod pipeline;
use pipeline::{Coals, RequestConfigs};

mod lifecycle;
mod negotiate;

pub mod header;
pub use header::{Method, StatusCode, Uri};

mod body;
pub use body::{Body, BodyStream, HttpBody};

mod request;
pub use request::{
	ParamSource, Params, Request, RequestBuilder, RequestContext,
};

mod response;
pub use response::{Response, ResponseBuilder};

pub mod json;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use std::any::Any;

use tokio::net::ToSocketAddrs;

/// Prepares a server.
pub async fn build(addr: impl ToSocketAddrs) -> Result<EmberBuilder> {
	EmberBuilder::new(addr).await
}

/// `EmberBuilder` gathers everything needed to let an ember glow
/// (start a server).
pub struct EmberBuilder {
	addr: SocketAddr,
	data: Data,
	registry: Arc<Registry>,
	configs: RequestConfigs,
	auth: Option<Arc<dyn AuthCheck>>,
	upgrade: Option<Box<dyn UpgradeHandler>>,
	show_startup_msg: bool,
}

impl EmberBuilder {
	pub(crate) async fn new<A>(addr: A) -> Result<Self>
	where
		A: ToSocketAddrs,
	{
		let addr = tokio::net::lookup_host(addr)
			.await
			.map_err(Error::from_server_error)?
			.next()
			.unwrap();
		Ok(Self {
			addr,
			data: Data::new(),
			registry: Arc::new(Registry::new()),
			configs: RequestConfigs::new(),
			auth: None,
			upgrade: None,
			show_startup_msg: true,
		})
	}

	/// Returns a reference to the current data.
	pub fn data(&self) -> &Data {
		&self.data
	}

	pub fn add_data<D>(&mut self, data: D)
	where
		D: Any + Send + Sync,
	{
		self.data.insert(data);
	}

	/// Registers a handler for a method and path template.
	///
	/// Registering the same `(method, template)` twice replaces the
	/// prior entry.
	pub fn add_route<H>(
		&mut self,
		method: &str,
		template: &str,
		handler: H,
	) -> std::result::Result<(), AddRouteError>
	where
		H: Handler + 'static,
	{
		self.add_route_with(
			method,
			template,
			handler,
			HandlerOptions::default(),
		)
	}

	/// Registers a handler with options.
	pub fn add_route_with<H>(
		&mut self,
		method: &str,
		template: &str,
		handler: H,
		options: HandlerOptions,
	) -> std::result::Result<(), AddRouteError>
	where
		H: Handler + 'static,
	{
		handler.validate_data(&self.data);
		self.registry.add(method, template, handler, options)
	}

	/// Removes a route; `"*"` removes the path from every method.
	pub fn delete_route(&self, method: &str, path: &str) -> bool {
		self.registry.delete(method, path)
	}

	/// Returns the registry, which can also be mutated while the server
	/// is running.
	pub fn registry(&self) -> &Arc<Registry> {
		&self.registry
	}

	/// Sets the authentication gate which runs before any parameter
	/// parsing.
	pub fn set_auth(&mut self, auth: Arc<dyn AuthCheck>) {
		self.auth = Some(auth);
	}

	/// Sets the handler for protocol upgrade requests, invoked with the
	/// raw hyper request after authentication succeeded.
	pub fn set_upgrade<U>(&mut self, upgrade: U)
	where
		U: UpgradeHandler + 'static,
	{
		self.upgrade = Some(Box::new(upgrade));
	}

	/// Sets the request size limit. The default is 4 kilobytes.
	///
	/// ## Panics
	/// If the size is zero.
	pub fn request_size_limit(&mut self, size_limit: usize) {
		self.configs.size_limit(size_limit)
	}

	/// Sets the request body read timeout. The default is 60 seconds.
	pub fn request_timeout(&mut self, timeout: Duration) {
		self.configs.timeout(timeout)
	}

	/// Prevents the ember from showing a message when the server gets
	/// started.
	pub fn hide_startup_message(&mut self) {
		self.show_startup_msg = false;
	}

	fn into_coals(self) -> (SocketAddr, Arc<Coals>, bool) {
		let coals = Arc::new(Coals::new(
			self.data,
			self.registry,
			self.configs,
			self.auth,
			self.upgrade,
		));
		(self.addr, coals, self.show_startup_msg)
	}

	/// Binds to the address and prepares to serve requests.
	///
	/// You need to call ignite on the `Ember` so that it starts handling
	/// requests.
	pub async fn build(self) -> Result<Ember> {
		let (addr, coals, show_startup_msg) = self.into_coals();

		let server = Server::bind(addr, coals.clone())
			.await
			.map_err(Error::from_server_error)?;

		Ok(Ember {
			coals,
			server,
			show_startup_msg,
		})
	}

	/// Builds an `EmberPit` without binding a socket.
	///
	/// Useful for tests and embedders which feed requests through their
	/// own transport.
	pub fn build_pit(self) -> EmberPit {
		let (_, coals, _) = self.into_coals();
		EmberPit { coals }
	}

	/// Ignites the ember, which starts the server.
	///
	/// ## Note
	/// Under normal conditions this function should run forever.
	pub async fn ignite(self) -> Result<()> {
		let ember = self.build().await?;
		ember.ignite().await
	}
}

/// An Ember that is ready to be ignited.
pub struct Ember {
	coals: Arc<Coals>,
	server: Server,
	show_startup_msg: bool,
}

impl Ember {
	pub fn local_addr(&self) -> Option<SocketAddr> {
		self.server.local_addr().ok()
	}

	pub fn pit(&self) -> EmberPit {
		EmberPit {
			coals: self.coals.clone(),
		}
	}

	pub async fn ignite(self) -> Result<()> {
		if self.show_startup_msg {
			eprintln!(
				"Running server on addr: {}",
				self.local_addr().unwrap()
			);
		}

		self.server.serve().await.map_err(Error::from_server_error)
	}
}

/// A clonable handle to a built server which routes requests through the
/// full pipeline.
#[derive(Clone)]
pub struct EmberPit {
	coals: Arc<Coals>,
}

impl EmberPit {
	pub fn data(&self) -> &Data {
		self.coals.data()
	}

	/// Returns the registry for runtime mutation.
	pub fn registry(&self) -> &Arc<Registry> {
		self.coals.registry()
	}

	/// Routes the request through the full pipeline, the authentication
	/// gate included, and returns the produced response.
	///
	/// Useful for tests and niche applications.
	pub async fn route(&self, req: Request) -> Response {
		pipeline::run(&self.coals, req).await
	}
}

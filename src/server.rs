use crate::body::{Body, HttpBody};
use crate::error::{Error, ServerErrorKind};
use crate::header::{HeaderValues, RequestHeader, CONTENT_TYPE, UPGRADE};
use crate::pipeline::{self, Coals};
use crate::util::PinnedFuture;
use crate::{Request, Response};

use std::convert::Infallible;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::Service;
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tracing::{error, info, info_span, warn, Instrument};

pub type HyperRequest = hyper::Request<Incoming>;

pub(crate) struct Server {
	listener: TcpListener,
	coals: Arc<Coals>,
}

impl Server {
	pub(crate) async fn bind(
		addr: SocketAddr,
		coals: Arc<Coals>,
	) -> io::Result<Self> {
		let listener = TcpListener::bind(addr).await?;
		Ok(Self { listener, coals })
	}

	pub fn local_addr(&self) -> io::Result<SocketAddr> {
		self.listener.local_addr()
	}

	pub async fn serve(self) -> io::Result<()> {
		let Server { listener, coals } = self;

		loop {
			let (stream, addr) = listener.accept().await?;
			let service = EmberService {
				coals: coals.clone(),
				address: addr,
			};
			tokio::task::spawn(async move {
				let r = http1::Builder::new()
					.keep_alive(true)
					.serve_connection(TokioIo::new(stream), service)
					.with_upgrades()
					.await;
				if let Err(e) = r {
					error!("error while serving HTTP connection: {e}");
				}
			});
		}
	}
}

struct EmberService {
	coals: Arc<Coals>,
	address: SocketAddr,
}

impl Service<HyperRequest> for EmberService {
	type Response = hyper::Response<HttpBody>;
	type Error = Infallible;
	type Future = PinnedFuture<'static, Result<Self::Response, Self::Error>>;

	fn call(&self, req: HyperRequest) -> Self::Future {
		let coals = self.coals.clone();
		let address = self.address;
		PinnedFuture::new(async move {
			Ok(handle_hyper(&coals, req, address).await)
		})
	}
}

pub(crate) async fn handle_hyper(
	coals: &Coals,
	hyper_req: HyperRequest,
	address: SocketAddr,
) -> hyper::Response<HttpBody> {
	let span = info_span!(
		"req",
		method = ?hyper_req.method(),
		uri = ?hyper_req.uri(),
	);

	handle_hyper_inner(coals, hyper_req, address)
		.instrument(span)
		.await
}

async fn handle_hyper_inner(
	coals: &Coals,
	hyper_req: HyperRequest,
	address: SocketAddr,
) -> hyper::Response<HttpBody> {
	let method = hyper_req.method().clone();
	let uri = hyper_req.uri().clone();

	let resp = route_hyper_req(coals, hyper_req, address).await;
	let status_code = resp.header().status_code;

	if status_code.is_server_error() {
		error!(?status_code, "{method} {uri} | {status_code}");
	} else if status_code.is_client_error() {
		warn!(?status_code, "{method} {uri} | {status_code}");
	} else {
		info!(?status_code, "{method} {uri} | {status_code}");
	}

	convert_response_to_hyper(resp)
}

async fn route_hyper_req(
	coals: &Coals,
	hyper_req: HyperRequest,
	address: SocketAddr,
) -> Response {
	// the upgrade hand-off gets the raw request, after authentication
	if coals.upgrade().is_some()
		&& hyper_req.headers().contains_key(UPGRADE)
	{
		let header = request_header_from_req(&hyper_req, address);
		if let Some(resp) = pipeline::check_auth(coals, &header).await {
			return resp;
		}

		// checked above
		let upgrade = coals.upgrade().unwrap();
		return match upgrade.call(hyper_req, coals.data()).await {
			Ok(resp) => resp,
			Err(e) => {
				error!("upgrade handler error: {e}");
				Error::empty(ServerErrorKind::InternalServerError)
					.to_response()
			}
		};
	}

	let (parts, body) = hyper_req.into_parts();
	let header = RequestHeader {
		address,
		method: parts.method,
		uri: parts.uri,
		values: HeaderValues::from_inner(parts.headers),
	};

	pipeline::run(coals, Request::new(header, Body::from_hyper(body)))
		.await
}

fn request_header_from_req(
	req: &HyperRequest,
	address: SocketAddr,
) -> RequestHeader {
	RequestHeader {
		address,
		method: req.method().clone(),
		uri: req.uri().clone(),
		values: HeaderValues::from_inner(req.headers().clone()),
	}
}

pub(crate) fn convert_response_to_hyper(
	response: Response,
) -> hyper::Response<HttpBody> {
	let mut header = response.header;

	if let Some(content_type) = header.content_type.take() {
		let e = header.values.try_insert(CONTENT_TYPE, content_type);
		if let Err(e) = e {
			error!("could not insert content type: {e}");
		}
	}

	let mut builder = hyper::Response::builder().status(header.status_code);

	*builder.headers_mut().unwrap() = header.values.into_inner();

	// builder fails if any argument failed
	// but no argument can fail that we pass here
	builder.body(response.body.into_http_body()).unwrap()
}

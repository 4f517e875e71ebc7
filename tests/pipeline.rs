//! Lifecycle limits, content negotiation and validator behavior driven
//! through the full pipeline.

use ember_http::routes::{
	auth_fn, handler_fn, validator_fn, AuthFlow, HandlerOptions,
};
use ember_http::util::PinnedFuture;
use ember_http::{
	json, Body, Data, EmberBuilder, EmberPit, Method, Request,
	RequestContext, Response, StatusCode,
};

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use bytes::Bytes;
use serde_json::{json, Value};
use tokio_stream::wrappers::ReceiverStream;

struct Called(AtomicBool);

fn echo_params<'a>(
	req: &'a mut RequestContext,
	data: &'a Data,
) -> PinnedFuture<'a, ember_http::Result<Response>> {
	PinnedFuture::new(async move {
		if let Some(called) = data.get::<Called>() {
			called.0.store(true, Ordering::SeqCst);
		}
		json::serialize_to_response(&req.params)
	})
}

fn failing_handler<'a>(
	_req: &'a mut RequestContext,
	_data: &'a Data,
) -> PinnedFuture<'a, ember_http::Result<Response>> {
	PinnedFuture::new(async {
		Err(ember_http::Error::from_server_error("boom"))
	})
}

async fn builder() -> EmberBuilder {
	let mut builder = ember_http::build("127.0.0.1:0").await.unwrap();
	builder.hide_startup_message();
	builder.add_data(Called(AtomicBool::new(false)));
	builder
}

fn was_called(pit: &EmberPit) -> bool {
	pit.data().get::<Called>().unwrap().0.load(Ordering::SeqCst)
}

async fn body_json(resp: Response) -> Value {
	let bytes = resp.body.into_bytes().await.unwrap();
	serde_json::from_slice(&bytes).unwrap()
}

fn post(path: &str) -> ember_http::RequestBuilder {
	Request::builder(path).method(Method::POST)
}

#[tokio::test]
async fn content_length_overrun_yields_one_400() {
	let mut builder = builder().await;
	builder
		.add_route("POST", "/upload", handler_fn(echo_params))
		.unwrap();
	let pit = builder.build_pit();

	// 11 bytes arrive although only 10 were declared
	let (tx, rx) = tokio::sync::mpsc::channel(8);
	tx.send(Ok(Bytes::from_static(b"123456"))).await.unwrap();
	tx.send(Ok(Bytes::from_static(b"78901"))).await.unwrap();
	drop(tx);

	let req = post("/upload")
		.header("content-type", "application/json")
		.header("content-length", "10")
		.body(Body::from_stream(ReceiverStream::new(rx)))
		.build();

	let resp = pit.route(req).await;
	assert_eq!(resp.header().status_code.as_u16(), 400);
	// the connection cannot be reused
	assert_eq!(resp.header().value("connection"), Some("close"));
	assert!(!was_called(&pit));
}

#[tokio::test(start_paused = true)]
async fn slow_body_yields_408() {
	let mut builder = builder().await;
	builder.request_timeout(Duration::from_millis(50));
	builder
		.add_route("POST", "/upload", handler_fn(echo_params))
		.unwrap();
	let pit = builder.build_pit();

	// the body takes two seconds to arrive
	let (tx, rx) = tokio::sync::mpsc::channel(1);
	tokio::spawn(async move {
		tokio::time::sleep(Duration::from_millis(2000)).await;
		let _ = tx.send(Ok(Bytes::from_static(b"late"))).await;
	});

	let req = post("/upload")
		.header("content-type", "application/json")
		.body(Body::from_stream(ReceiverStream::new(rx)))
		.build();

	let resp = pit.route(req).await;
	assert_eq!(resp.header().status_code.as_u16(), 408);
	assert_eq!(
		body_json(resp).await,
		json!({"code": 408, "message": "Request Timeout"})
	);
	assert!(!was_called(&pit));
}

#[tokio::test]
async fn oversized_body_yields_413() {
	let mut builder = builder().await;
	builder.request_size_limit(8);
	builder
		.add_route("POST", "/upload", handler_fn(echo_params))
		.unwrap();
	let pit = builder.build_pit();

	let req = post("/upload")
		.header("content-type", "application/json")
		.body("way more than eight bytes")
		.build();

	let resp = pit.route(req).await;
	assert_eq!(resp.header().status_code.as_u16(), 413);
	assert_eq!(
		body_json(resp).await,
		json!({"code": 413, "message": "Payload Too Large"})
	);
	assert!(!was_called(&pit));
}

#[tokio::test]
async fn get_with_body_is_rejected() {
	let mut builder = builder().await;
	builder
		.add_route("GET", "/list", handler_fn(echo_params))
		.unwrap();
	let pit = builder.build_pit();

	let req = Request::builder("/list").body("unexpected").build();
	let resp = pit.route(req).await;
	assert_eq!(resp.header().status_code.as_u16(), 400);
	assert!(!was_called(&pit));
}

#[tokio::test]
async fn query_on_post_is_rejected_unless_ignored() {
	let mut builder = builder().await;
	builder
		.add_route("POST", "/submit", handler_fn(echo_params))
		.unwrap();
	builder
		.add_route_with(
			"POST",
			"/relaxed",
			handler_fn(echo_params),
			HandlerOptions {
				ignore_url_params: true,
				..Default::default()
			},
		)
		.unwrap();
	let pit = builder.build_pit();

	let resp = pit.route(post("/submit?a=1").build()).await;
	assert_eq!(resp.header().status_code.as_u16(), 400);

	let resp = pit.route(post("/relaxed?a=1").build()).await;
	assert_eq!(resp.header().status_code.as_u16(), 200);
}

#[tokio::test]
async fn query_parameters_reach_the_handler() {
	let mut builder = builder().await;
	builder
		.add_route("GET", "/list", handler_fn(echo_params))
		.unwrap();
	let pit = builder.build_pit();

	let resp = pit
		.route(Request::builder("/list?page=2&tag=a&tag=b").build())
		.await;
	assert_eq!(
		body_json(resp).await,
		json!({"page": "2", "tag": ["a", "b"]})
	);
}

#[tokio::test]
async fn json_body_reaches_the_handler() {
	let mut builder = builder().await;
	builder
		.add_route("POST", "/submit", handler_fn(echo_params))
		.unwrap();
	let pit = builder.build_pit();

	let resp = pit
		.route(
			post("/submit")
				.header("content-type", "application/json")
				.body("{\"n\": 1, \"name\": \"x\"}")
				.build(),
		)
		.await;
	assert_eq!(resp.header().status_code.as_u16(), 200);
	assert_eq!(body_json(resp).await, json!({"n": 1, "name": "x"}));
}

#[tokio::test]
async fn form_body_reaches_the_handler() {
	let mut builder = builder().await;
	builder
		.add_route("POST", "/submit", handler_fn(echo_params))
		.unwrap();
	let pit = builder.build_pit();

	let resp = pit
		.route(
			post("/submit")
				.header(
					"content-type",
					"application/x-www-form-urlencoded",
				)
				.body("x=1&x=2&y=z")
				.build(),
		)
		.await;
	assert_eq!(
		body_json(resp).await,
		json!({"x": ["1", "2"], "y": "z"})
	);
}

#[tokio::test]
async fn json_charset_must_be_utf8() {
	let mut builder = builder().await;
	builder
		.add_route("POST", "/submit", handler_fn(echo_params))
		.unwrap();
	let pit = builder.build_pit();

	let resp = pit
		.route(
			post("/submit")
				.header(
					"content-type",
					"application/json; charset=latin-1",
				)
				.body("{}")
				.build(),
		)
		.await;
	assert_eq!(resp.header().status_code.as_u16(), 400);
}

#[tokio::test]
async fn multipart_is_rejected_naming_the_supported_formats() {
	let mut builder = builder().await;
	builder
		.add_route("POST", "/submit", handler_fn(echo_params))
		.unwrap();
	let pit = builder.build_pit();

	let resp = pit
		.route(
			post("/submit")
				.header(
					"content-type",
					"multipart/form-data; boundary=xyz",
				)
				.body("data")
				.build(),
		)
		.await;
	assert_eq!(resp.header().status_code.as_u16(), 400);

	let body = body_json(resp).await;
	let message = body["message"].as_str().unwrap();
	assert!(message.contains("application/json"));
	assert!(message.contains("application/x-www-form-urlencoded"));
}

#[tokio::test]
async fn validators_transform_and_reject() {
	let mut builder = builder().await;
	builder
		.add_route_with(
			"GET",
			"/user/{userId}",
			handler_fn(echo_params),
			HandlerOptions {
				path_params_validator: Some(validator_fn(|params| {
					let id = params["userId"]
						.as_str()
						.and_then(|s| s.parse::<u64>().ok())
						.ok_or_else(|| {
							ember_http::routes::ValidatorError::new(
								"userId must be numeric",
							)
						})?;
					Ok(json!({"userId": id}))
				})),
				..Default::default()
			},
		)
		.unwrap();
	let pit = builder.build_pit();

	// transformed: the captured string became a number
	let resp = pit.route(Request::builder("/user/42").build()).await;
	assert_eq!(resp.header().status_code.as_u16(), 200);
	assert_eq!(body_json(resp).await, json!({"userId": 42}));

	// rejected with the validator message as detail
	let resp = pit.route(Request::builder("/user/abc").build()).await;
	assert_eq!(resp.header().status_code.as_u16(), 400);
	assert_eq!(
		body_json(resp).await,
		json!({
			"code": 400,
			"message": "Bad Request (userId must be numeric)"
		})
	);
}

#[tokio::test]
async fn non_object_validator_result_is_a_500() {
	let mut builder = builder().await;
	builder
		.add_route_with(
			"GET",
			"/broken",
			handler_fn(echo_params),
			HandlerOptions {
				params_validator: Some(validator_fn(|_params| {
					Ok(json!("not an object"))
				})),
				..Default::default()
			},
		)
		.unwrap();
	let pit = builder.build_pit();

	let resp = pit.route(Request::builder("/broken").build()).await;
	assert_eq!(resp.header().status_code.as_u16(), 500);
	assert!(!was_called(&pit));
}

#[tokio::test]
async fn auth_deny_short_circuits() {
	let mut builder = builder().await;
	builder.set_auth(auth_fn(|header, _data| {
		if header.value("authorization") == Some("let-me-in") {
			Ok(AuthFlow::Allow)
		} else {
			Ok(AuthFlow::Deny(Response::from(StatusCode::UNAUTHORIZED)))
		}
	}));
	builder
		.add_route("GET", "/secret", handler_fn(echo_params))
		.unwrap();
	let pit = builder.build_pit();

	let resp = pit.route(Request::builder("/secret").build()).await;
	assert_eq!(resp.header().status_code.as_u16(), 401);
	assert!(!was_called(&pit));

	let resp = pit
		.route(
			Request::builder("/secret")
				.header("authorization", "let-me-in")
				.build(),
		)
		.await;
	assert_eq!(resp.header().status_code.as_u16(), 200);
	assert!(was_called(&pit));
}

#[tokio::test]
async fn handler_failure_is_a_500() {
	let mut builder = builder().await;
	builder
		.add_route("GET", "/boom", handler_fn(failing_handler))
		.unwrap();
	let pit = builder.build_pit();

	let resp = pit.route(Request::builder("/boom").build()).await;
	assert_eq!(resp.header().status_code.as_u16(), 500);
	assert_eq!(
		body_json(resp).await,
		json!({"code": 500, "message": "Internal Server Error"})
	);
}

#[tokio::test]
async fn url_validator_can_inject_merge_sources() {
	// a url params validator may synthesize values, which lets body,
	// query and path all carry the same key
	let mut builder = builder().await;
	builder
		.add_route_with(
			"POST",
			"/merge/{a}",
			handler_fn(echo_params),
			HandlerOptions {
				url_params_validator: Some(validator_fn(|_params| {
					Ok(json!({"a": 2}))
				})),
				..Default::default()
			},
		)
		.unwrap();
	let pit = builder.build_pit();

	let resp = pit
		.route(
			post("/merge/3")
				.header("content-type", "application/json")
				.body("{\"a\": 1}")
				.build(),
		)
		.await;

	// path wins: body 1, query 2, path "3"
	assert_eq!(body_json(resp).await, json!({"a": "3"}));
}

//! Tests for the request pipeline
//!
//! # Test Coverage
//!
//! Validates the dispatcher's core responsibilities:
//! - First-match routing and capture extraction
//! - 404 for unmatched paths and unsupported methods
//! - Payload validation (411/413) and the lenient Content-Length rule
//! - Handler failures, panics and missing responses becoming logged 500s
//! - Rate limiting short-circuits before routing
//! - Shared use across threads


use http::Method;
use routegate::dispatcher::Dispatcher;
use routegate::ratelimit::RateLimiter;
use routegate::resource::Resource;
use routegate::router::Router;
use routegate::server::{RenderedResponse, Request, Response};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing_util::TestTracing;

fn addr(last: u8) -> SocketAddr {
    SocketAddr::from(([192, 168, 0, last], 40000))
}

fn req(method: Method, target: &str) -> Request {
    Request::new(addr(1), method, target)
}

fn body_json(rendered: RenderedResponse) -> Value {
    let bytes = rendered.body.into_bytes().unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn app() -> Router {
    let mut r = Resource::new("app");
    r.get("user", "/user/:name", |req| {
        Ok(Some(Response::json(json!({ "name": req.capture("name") }))))
    });
    r.get("user_tab", "/user/:name/:tab?", |req| {
        Ok(Some(Response::json(json!({
            "name": req.capture("name"),
            "tab": req.capture("tab"),
        }))))
    });
    r.get("files", "/files/:path*", |req| {
        Ok(Some(Response::text(req.capture("path").unwrap_or_default().to_string())))
    });
    r.put("upload", "/upload", |req| {
        let body = req.read_body()?;
        Ok(Some(Response::json(json!({ "size": body.len() }))))
    })
    .max_content_length(16);
    r.post("unlimited", "/unlimited", |_| Ok(Some(Response::text("ok"))))
        .no_content_limit();
    r.get("fail", "/fail", |_| Err(anyhow::anyhow!("database unreachable")));
    r.get("panic", "/panic", |_| panic!("handler exploded"));
    r.get("silent", "/silent", |_| Ok(None));
    r.get("query", "/query", |req| {
        Ok(Some(Response::json(json!({ "tags": req.params_all("tag") }))))
    });

    let mut router = Router::new();
    router.register_resource(r).unwrap();
    router
}

#[test]
fn test_dispatch_matches_and_captures() {
    let d = Dispatcher::unlimited(app());
    let rendered = d.dispatch(&mut req(Method::GET, "/user/alice"));
    assert_eq!(rendered.status, 200);
    assert_eq!(rendered.header("Content-Type"), Some("application/json"));
    assert_eq!(body_json(rendered), json!({ "name": "alice" }));
}

#[test]
fn test_earlier_route_takes_precedence() {
    // `/user/:name` is registered first, so the optional-tab route only sees
    // paths the first one rejects.
    let d = Dispatcher::unlimited(app());
    let v = body_json(d.dispatch(&mut req(Method::GET, "/user/alice/posts")));
    assert_eq!(v, json!({ "name": "alice", "tab": "posts" }));

    let v = body_json(d.dispatch(&mut req(Method::GET, "/user/alice/")));
    assert_eq!(v, json!({ "name": "alice" }));
}

#[test]
fn test_zero_or_more_capture() {
    let d = Dispatcher::unlimited(app());
    let mut r = req(Method::GET, "/files/a/b/c.txt");
    let text = d.dispatch(&mut r).body.into_bytes().unwrap();
    assert_eq!(text, b"a/b/c.txt");
    assert_eq!(r.capture("path"), Some("a/b/c.txt"));

    let text = d.dispatch(&mut req(Method::GET, "/files")).body.into_bytes().unwrap();
    assert!(text.is_empty());
}

#[test]
fn test_not_found() {
    let d = Dispatcher::unlimited(app());
    let rendered = d.dispatch(&mut req(Method::GET, "/nope"));
    assert_eq!(rendered.status, 404);
    assert_eq!(body_json(rendered), json!({ "error": "path not found" }));
}

#[test]
fn test_unsupported_method_is_not_found() {
    let d = Dispatcher::unlimited(app());
    assert_eq!(d.dispatch(&mut req(Method::PATCH, "/user/alice")).status, 404);
    assert_eq!(d.dispatch(&mut req(Method::POST, "/user/alice")).status, 404);
}

#[test]
fn test_length_required() {
    let d = Dispatcher::unlimited(app());
    let rendered = d.dispatch(&mut req(Method::PUT, "/upload").with_body_bytes("abc"));
    assert_eq!(rendered.status, 411);
    assert_eq!(
        body_json(rendered),
        json!({ "error": "Content-Length not specified" })
    );
}

#[test]
fn test_payload_too_large() {
    let d = Dispatcher::unlimited(app());
    let mut r = req(Method::PUT, "/upload")
        .with_header("Content-Length", "17")
        .with_body_bytes(vec![0u8; 17]);
    let rendered = d.dispatch(&mut r);
    assert_eq!(rendered.status, 413);
    assert_eq!(body_json(rendered), json!({ "error": "Payload too large" }));
}

#[test]
fn test_payload_at_limit_accepted() {
    let d = Dispatcher::unlimited(app());
    let mut r = req(Method::PUT, "/upload")
        .with_header("content-length", "16")
        .with_body_bytes(vec![1u8; 16]);
    let rendered = d.dispatch(&mut r);
    assert_eq!(rendered.status, 200);
    assert_eq!(body_json(rendered), json!({ "size": 16 }));
}

#[test]
fn test_malformed_length_counts_as_zero() {
    let d = Dispatcher::unlimited(app());
    for value in ["abc", "-5", ""] {
        let mut r = req(Method::PUT, "/upload").with_header("Content-Length", value);
        assert_eq!(d.dispatch(&mut r).status, 200, "Content-Length: {value:?}");
    }
}

#[test]
fn test_oversized_declared_length_is_413() {
    let d = Dispatcher::unlimited(app());
    for value in ["99999999999999999999999", "+18446744073709551616"] {
        let mut r = req(Method::PUT, "/upload").with_header("Content-Length", value);
        let rendered = d.dispatch(&mut r);
        assert_eq!(rendered.status, 413, "Content-Length: {value:?}");
        assert_eq!(body_json(rendered), json!({ "error": "Payload too large" }));
    }
}

#[test]
fn test_no_content_limit_skips_check() {
    let d = Dispatcher::unlimited(app());
    assert_eq!(d.dispatch(&mut req(Method::POST, "/unlimited")).status, 200);
}

#[test]
fn test_handler_error_is_logged_500() {
    let tracing = TestTracing::init();
    let d = Dispatcher::unlimited(app());
    let rendered = d.dispatch(&mut req(Method::GET, "/fail"));
    assert_eq!(rendered.status, 500);
    assert_eq!(body_json(rendered), json!({ "error": "internal server error" }));
    assert!(tracing.contains("Handler failed"));
    assert!(tracing.contains("database unreachable"));
    assert!(tracing.contains("app.fail"));
}

#[test]
fn test_handler_panic_is_logged_500() {
    let tracing = TestTracing::init();
    let d = Dispatcher::unlimited(app());
    let rendered = d.dispatch(&mut req(Method::GET, "/panic"));
    assert_eq!(rendered.status, 500);
    assert!(tracing.contains("Handler panicked"));
    assert!(tracing.contains("handler exploded"));

    // still serving afterwards
    assert_eq!(d.dispatch(&mut req(Method::GET, "/user/bob")).status, 200);
}

#[test]
fn test_missing_response_is_500() {
    let tracing = TestTracing::init();
    let d = Dispatcher::unlimited(app());
    let rendered = d.dispatch(&mut req(Method::GET, "/silent"));
    assert_eq!(rendered.status, 500);
    assert_eq!(
        body_json(rendered),
        json!({ "error": "route failed to return a response" })
    );
    assert!(tracing.contains("Handler returned no response"));
}

#[test]
fn test_routing_table_logged_once() {
    let tracing = TestTracing::init();
    let router = Router::from_routes(app().routes().iter().map(|r| (**r).clone())).unwrap();
    let _d = Dispatcher::unlimited(router);
    assert_eq!(tracing.output().matches("Routing table loaded").count(), 1);
}

#[test]
fn test_query_multi_values_reach_handler() {
    let d = Dispatcher::unlimited(app());
    let v = body_json(d.dispatch(&mut req(Method::GET, "/query?tag=a&tag=b&tag=c")));
    assert_eq!(v, json!({ "tags": ["a", "b", "c"] }));
}

#[test]
fn test_rate_limit_blocks_before_routing() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let mut r = Resource::new("counted");
    r.get("hit", "/hit", move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(Some(Response::text("hit")))
    });
    let mut router = Router::new();
    router.register_resource(r).unwrap();

    let limiter = RateLimiter::new(5, 60_000, NonZeroUsize::new(16).unwrap());
    let d = Dispatcher::with_rate_limiter(router, limiter);

    for _ in 0..5 {
        assert_eq!(d.dispatch(&mut req(Method::GET, "/hit")).status, 200);
    }
    let blocked = d.dispatch(&mut req(Method::GET, "/hit"));
    assert_eq!(blocked.status, 429);
    assert_eq!(body_json(blocked), json!({ "error": "Too Many Requests" }));
    assert_eq!(calls.load(Ordering::SeqCst), 5);

    // unknown paths are limited too, and other clients are unaffected
    assert_eq!(d.dispatch(&mut req(Method::GET, "/missing")).status, 429);
    let mut other = Request::new(addr(2), Method::GET, "/hit");
    assert_eq!(d.dispatch(&mut other).status, 200);
}

#[test]
fn test_rate_limit_keys_on_ip_not_port() {
    let limiter = RateLimiter::new(1, 60_000, NonZeroUsize::new(4).unwrap());
    let d = Dispatcher::with_rate_limiter(app(), limiter);
    let mut first = Request::new("10.0.0.9:1000".parse().unwrap(), Method::GET, "/user/a");
    let mut second = Request::new("10.0.0.9:2000".parse().unwrap(), Method::GET, "/user/a");
    assert_eq!(d.dispatch(&mut first).status, 200);
    assert_eq!(d.dispatch(&mut second).status, 429);
}

#[test]
fn test_handle_skips_rate_limit() {
    let limiter = RateLimiter::new(0, 60_000, NonZeroUsize::new(4).unwrap());
    let d = Dispatcher::with_rate_limiter(app(), limiter);
    assert_eq!(d.handle(&mut req(Method::GET, "/user/a")).status(), 200);
    assert_eq!(d.dispatch(&mut req(Method::GET, "/user/a")).status, 429);
}

#[test]
fn test_concurrent_dispatch() {
    let limiter = RateLimiter::new(50, 60_000, NonZeroUsize::new(64).unwrap());
    let d = Dispatcher::with_rate_limiter(app(), limiter);
    let ok = AtomicUsize::new(0);
    let limited = AtomicUsize::new(0);

    std::thread::scope(|s| {
        for _ in 0..8 {
            s.spawn(|| {
                for _ in 0..25 {
                    match d.dispatch(&mut req(Method::GET, "/user/t")).status {
                        200 => ok.fetch_add(1, Ordering::SeqCst),
                        429 => limited.fetch_add(1, Ordering::SeqCst),
                        other => panic!("unexpected status {other}"),
                    };
                }
            });
        }
    });

    // one client, 200 requests, limit 50: exactly 50 get through
    assert_eq!(ok.load(Ordering::SeqCst), 50);
    assert_eq!(limited.load(Ordering::SeqCst), 150);
}

#[test]
fn test_from_config() {
    let config = routegate::RouterConfig::from_toml_str("[rate_limit]\nlimit = 2\n").unwrap();
    let d = Dispatcher::from_config(app(), &config).unwrap();
    assert_eq!(d.limiter().limit(), 2);
    for _ in 0..2 {
        assert_eq!(d.dispatch(&mut req(Method::GET, "/user/x")).status, 200);
    }
    assert_eq!(d.dispatch(&mut req(Method::GET, "/user/x")).status, 429);
}

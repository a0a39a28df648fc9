//! Tests for the in-process test client against the demo resource

use routegate::dispatcher::Dispatcher;
use routegate::echo::demo_resource;
use routegate::router::Router;
use routegate::testing::{test_client_addr, TestClient};
use routegate::{RouterError, TestClientError};
use serde_json::{json, Value};
use std::fs;
use tempfile::tempdir;

fn dispatcher(static_root: &std::path::Path) -> Dispatcher {
    let mut router = Router::new();
    router.register_resource(demo_resource(static_root)).unwrap();
    Dispatcher::new(router)
}

#[test]
fn test_call_by_either_name_form() {
    let dir = tempdir().unwrap();
    let d = dispatcher(dir.path());
    let client = TestClient::new(&d);

    let a = client.call("echo.get_user", &["bob"]).unwrap();
    let b = client.call("echo_get_user", &["bob"]).unwrap();
    assert_eq!(a.status, 200);
    assert_eq!(a.json::<Value>().unwrap(), b.json::<Value>().unwrap());
    assert_eq!(a.request.path, "/user/bob");
    assert_eq!(a.request.client_addr, test_client_addr());
}

#[test]
fn test_optional_and_surplus_args() {
    let dir = tempdir().unwrap();
    let d = dispatcher(dir.path());
    let client = TestClient::new(&d);

    let r = client.call("echo.get_user", &["bob", "posts"]).unwrap();
    assert_eq!(r.request.path, "/user/bob/posts");
    assert_eq!(r.json::<Value>().unwrap()["tab"], json!("posts"));

    // a third argument does not fit `:tab?`, so nothing matches
    let r = client.call("echo.get_user", &["bob", "posts", "2"]).unwrap();
    assert_eq!(r.request.path, "/user/bob/posts/2");
    assert_eq!(r.status, 404);
}

#[test]
fn test_missing_arguments() {
    let dir = tempdir().unwrap();
    let d = dispatcher(dir.path());
    let err = TestClient::new(&d).call("echo.get_user", &[]).unwrap_err();
    assert!(matches!(
        err,
        TestClientError::Route(RouterError::MissingArguments {
            expected: 1,
            found: 0,
            ..
        })
    ));
}

#[test]
fn test_unknown_route() {
    let dir = tempdir().unwrap();
    let d = dispatcher(dir.path());
    let err = TestClient::new(&d).call("echo.nope", &[]).unwrap_err();
    assert!(matches!(err, TestClientError::UnknownRoute(name) if name == "echo.nope"));
}

#[test]
fn test_params_and_compression() {
    let dir = tempdir().unwrap();
    let d = dispatcher(dir.path());
    let r = TestClient::new(&d)
        .request("echo.get_user")
        .unwrap()
        .args(&["ann"])
        .param("sort", "asc")
        .param("sort", "desc")
        .header("accept-encoding", "gzip, deflate")
        .send()
        .unwrap();

    assert!(r.is_compressed());
    assert_eq!(r.header("Vary"), Some("Accept-Encoding"));
    assert_eq!(r.header("Content-Length"), Some(r.body.len().to_string().as_str()));
    let v: Value = r.json().unwrap();
    assert_eq!(v["name"], json!("ann"));
    assert_eq!(v["params"]["sort"], json!(["asc", "desc"]));
}

#[test]
fn test_body_declares_length() {
    let dir = tempdir().unwrap();
    let d = dispatcher(dir.path());
    let client = TestClient::new(&d);

    let r = client.request("echo.put_blob").unwrap().body("hello").send().unwrap();
    assert_eq!(r.status, 200);
    assert_eq!(r.json::<Value>().unwrap(), json!({ "received": 5, "body": "hello" }));

    let r = client
        .request("echo.put_blob")
        .unwrap()
        .body("0123456789abcdefghij")
        .send()
        .unwrap();
    assert_eq!(r.status, 413);

    let r = client.call("echo.put_blob", &[]).unwrap();
    assert_eq!(r.status, 411);
    assert_eq!(
        r.json::<Value>().unwrap(),
        json!({ "error": "Content-Length not specified" })
    );
}

#[test]
fn test_files_route() {
    let dir = tempdir().unwrap();
    fs::create_dir_all(dir.path().join("docs")).unwrap();
    fs::write(dir.path().join("docs/readme.txt"), "read me").unwrap();
    let d = dispatcher(dir.path());
    let client = TestClient::new(&d);

    let r = client.call("echo.files", &["docs", "readme.txt"]).unwrap();
    assert_eq!(r.status, 200);
    assert_eq!(r.text(), "read me");
    assert_eq!(r.header("Content-Type"), Some("text/plain"));

    assert_eq!(client.call("echo.files", &["missing.txt"]).unwrap().status, 404);
    assert_eq!(client.call("echo.files", &["..", "secret"]).unwrap().status, 400);
}

#[test]
fn test_failure_is_500() {
    let dir = tempdir().unwrap();
    let d = dispatcher(dir.path());
    let r = TestClient::new(&d).call("echo.fail", &[]).unwrap();
    assert_eq!(r.status, 500);
    assert_eq!(r.text(), "{\"error\":\"internal server error\"}\n");
}

#[test]
fn test_client_is_not_rate_limited() {
    let dir = tempdir().unwrap();
    let d = dispatcher(dir.path());
    let client = TestClient::new(&d);
    for _ in 0..20 {
        assert_eq!(client.call("echo.index", &[]).unwrap().status, 200);
    }
}

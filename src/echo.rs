//! Demo resource used by the `routegate` binary and the integration tests.

use std::io::ErrorKind;
use std::path::PathBuf;

use serde_json::json;

use crate::error::PathError;
use crate::resource::Resource;
use crate::server::Response;
use crate::static_files::StaticFiles;

/// Largest body `echo.put_blob` accepts.
pub const BLOB_LIMIT: u64 = 10;

/// Routes of the `echo` group:
///
/// ```text
/// GET     /                   echo.index
/// GET     /user/:name/:tab?   echo.get_user
/// PUT     /blob               echo.put_blob   (at most 10 bytes)
/// GET     /files/:path*       echo.files      (served from `static_root`)
/// GET     /fail               echo.fail       (always errors)
/// ```
pub fn demo_resource(static_root: impl Into<PathBuf>) -> Resource {
    let files = StaticFiles::new(static_root);
    let mut echo = Resource::new("EchoResource");

    echo.get("index", "/", |req| {
        Ok(Some(Response::json(json!({
            "service": "routegate",
            "client": req.client_key(),
        }))))
    });

    echo.get("get_user", "/user/:name/:tab?", |req| {
        let body = json!({
            "name": req.capture("name"),
            "tab": req.capture("tab").filter(|t| !t.is_empty()),
            "params": req.params,
        });
        let gzip = req
            .header("Accept-Encoding")
            .is_some_and(|v| v.contains("gzip"));
        let response = Response::json(body);
        Ok(Some(if gzip { response.compressed() } else { response }))
    });

    echo.put("put_blob", "/blob", |req| {
        let body = req.read_body()?;
        Ok(Some(Response::json(json!({
            "received": body.len(),
            "body": String::from_utf8_lossy(&body),
        }))))
    })
    .max_content_length(BLOB_LIMIT);

    echo.get("files", "/files/:path*", move |req| {
        let path = req.capture("path").unwrap_or_default();
        match files.open(path) {
            Ok(response) => Ok(Some(response)),
            Err(PathError::IllegalComponent(_)) => Ok(Some(Response::error(400, "invalid path"))),
            Err(PathError::Io(err)) if err.kind() == ErrorKind::NotFound => {
                Ok(Some(Response::error(404, "file not found")))
            }
            Err(err) => Err(err.into()),
        }
    });

    echo.get("fail", "/fail", |_| {
        Err(anyhow::anyhow!("demo handler failure"))
    });

    echo
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demo_routes() {
        let resource = demo_resource(".");
        let names: Vec<_> = resource.routes().iter().map(|r| r.name().to_string()).collect();
        assert_eq!(
            names,
            vec!["echo.index", "echo.get_user", "echo.put_blob", "echo.files", "echo.fail"]
        );
        assert_eq!(resource.routes()[2].options().max_content_length, Some(BLOB_LIMIT));
    }
}

#![allow(dead_code)]

use flate2::write::GzEncoder;
use flate2::Compression;
use std::time::Duration;
use tokio::net::TcpListener;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Build an in-memory `.tgz` with the given `(path, contents)` entries.
pub fn tar_gz(entries: &[(&str, &str)]) -> Vec<u8> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for (path, contents) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(contents.len() as u64);
        header.set_mode(0o644);
        builder
            .append_data(&mut header, path, contents.as_bytes())
            .expect("append tar entry");
    }
    builder
        .into_inner()
        .expect("finish tar")
        .finish()
        .expect("finish gzip")
}

/// Minimal package archive with one StructureDefinition.
pub fn package_archive(name: &str, version: &str) -> Vec<u8> {
    tar_gz(&[
        (
            "package/package.json",
            &format!(r#"{{"name":"{}","version":"{}"}}"#, name, version),
        ),
        (
            "package/StructureDefinition-Thing.json",
            r#"{"resourceType":"StructureDefinition","url":"http://example.org/StructureDefinition/Thing","type":"Thing"}"#,
        ),
    ])
}

/// A mock registry answering `GET /{name}/{version}` with `response`. Any other path gets
/// wiremock's default 404.
pub async fn registry_with(name: &str, version: &str, response: ResponseTemplate) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/{}/{}", name, version)))
        .respond_with(response)
        .mount(&server)
        .await;
    server
}

/// A mock registry serving `body` for one package version.
pub async fn registry_serving(name: &str, version: &str, body: Vec<u8>) -> MockServer {
    registry_with(name, version, ResponseTemplate::new(200).set_body_bytes(body)).await
}

/// A mock registry that accepts the request and answers only after `delay`.
pub async fn slow_registry(name: &str, version: &str, delay: Duration) -> MockServer {
    let body = package_archive(name, version);
    registry_with(
        name,
        version,
        ResponseTemplate::new(200).set_body_bytes(body).set_delay(delay),
    )
    .await
}

/// Number of requests `server` has seen.
pub async fn hits(server: &MockServer) -> usize {
    server
        .received_requests()
        .await
        .map(|requests| requests.len())
        .unwrap_or(0)
}

/// A URL on which nothing listens.
pub async fn unreachable_registry() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);
    format!("http://{}", addr)
}

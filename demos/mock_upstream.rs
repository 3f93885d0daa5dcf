//! A small upstream site for trying the proxy by hand.
//!
//! ```text
//! cargo run --example mock_upstream
//! cargo run -- --config demos/revproxy.toml
//! curl -i http://127.0.0.1:8080/
//! ```

use std::net::SocketAddr;

use axum::{
    http::header,
    response::{Html, IntoResponse, Redirect},
    routing::get,
    Router,
};

const ARTICLE: &str = r#"<!DOCTYPE html>
<html>
  <head>
    <title>Upstream article</title>
    <style>article { font-family: serif; }</style>
  </head>
  <body>
    <article><h1>Hello from upstream</h1><p>This page knows nothing about the site theme.</p></article>
  </body>
</html>"#;

const RAW: &str = r#"<html data-notheme><body><pre>left alone by the theme</pre></body></html>"#;

#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    let app = Router::new()
        .route("/", get(|| async { Html(ARTICLE) }))
        .route("/raw", get(|| async { Html(RAW) }))
        .route("/old", get(|| async { Redirect::temporary("/") }))
        .route(
            "/data.json",
            get(|| async { ([(header::CONTENT_TYPE, "application/json")], r#"{"ok":true}"#).into_response() }),
        );

    let addr = SocketAddr::from(([127, 0, 0, 1], 8081));
    println!("mock upstream listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await
}

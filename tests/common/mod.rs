#![allow(dead_code)]

pub mod requests {
    use bytes::Bytes;
    use futures::stream;
    use http::header::{CONTENT_LENGTH, CONTENT_TYPE};
    use http::Method;
    use serde_json::Value;
    use wayroute::server::{Body, Request, Response};

    /// Request without a body
    pub fn request(method: Method, uri: &str) -> Request {
        http::Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    pub fn get(uri: &str) -> Request {
        request(Method::GET, uri)
    }

    /// Request with a single-chunk body and a matching `content-length`
    pub fn with_body(method: Method, uri: &str, content_type: Option<&str>, body: &str) -> Request {
        let mut builder = http::Request::builder()
            .method(method)
            .uri(uri)
            .header(CONTENT_LENGTH, body.len());
        if let Some(content_type) = content_type {
            builder = builder.header(CONTENT_TYPE, content_type);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    pub fn json(method: Method, uri: &str, body: &str) -> Request {
        with_body(method, uri, Some("application/json"), body)
    }

    /// Request whose body arrives in `chunks` while declaring
    /// `declared_length` bytes
    pub fn streamed(
        method: Method,
        uri: &str,
        content_type: &str,
        declared_length: u64,
        chunks: Vec<&'static str>,
    ) -> Request {
        let chunks: Vec<std::io::Result<Bytes>> = chunks
            .into_iter()
            .map(|c| Ok(Bytes::from_static(c.as_bytes())))
            .collect();
        http::Request::builder()
            .method(method)
            .uri(uri)
            .header(CONTENT_LENGTH, declared_length)
            .header(CONTENT_TYPE, content_type)
            .body(Body::from_stream(stream::iter(chunks)))
            .unwrap()
    }

    /// Response body parsed as JSON
    pub fn body_json(res: &Response) -> Value {
        serde_json::from_slice(&res.snapshot().body).unwrap()
    }

    /// `message` field of a JSON error envelope
    pub fn message(res: &Response) -> String {
        body_json(res)["message"].as_str().unwrap().to_string()
    }
}

pub mod test_tracing {
    use tracing::subscriber::DefaultGuard;

    /// Routes `tracing` output to the test harness's captured output for
    /// the lifetime of the guard.
    pub struct TestTracing {
        _guard: DefaultGuard,
    }

    impl TestTracing {
        pub fn init() -> Self {
            let subscriber = tracing_subscriber::fmt()
                .with_env_filter("wayroute=debug")
                .with_test_writer()
                .finish();
            Self {
                _guard: tracing::subscriber::set_default(subscriber),
            }
        }
    }
}

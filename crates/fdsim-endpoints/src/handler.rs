//! The handler seam behind every virtual endpoint.

use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderName, HeaderValue, StatusCode};
use tower::ServiceExt;

use crate::{Request, Response};

/// Anything that can answer an HTTP request.
///
/// The request's path is already relative to the endpoint, and its extensions
/// carry the [`crate::RequestScope`].
#[async_trait]
pub trait RequestHandler: Send + Sync + 'static {
    /// Produce the response for `request`.
    async fn handle(&self, request: Request) -> Response;
}

#[async_trait]
impl<T: RequestHandler + ?Sized> RequestHandler for Arc<T> {
    async fn handle(&self, request: Request) -> Response {
        (**self).handle(request).await
    }
}

#[async_trait]
impl RequestHandler for Router {
    async fn handle(&self, request: Request) -> Response {
        let result: Result<Response, Infallible> = self.clone().oneshot(request).await;
        match result {
            Ok(response) => response,
            Err(never) => match never {},
        }
    }
}

/// Handler built from an async closure.
#[derive(Clone)]
pub struct HandlerFn<F> {
    f: F,
}

/// Wrap an async closure as a [`RequestHandler`].
pub const fn handler_fn<F, Fut>(f: F) -> HandlerFn<F>
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    HandlerFn { f }
}

#[async_trait]
impl<F, Fut> RequestHandler for HandlerFn<F>
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    async fn handle(&self, request: Request) -> Response {
        (self.f)(request).await
    }
}

/// A handler that always gives the same answer.
#[derive(Debug, Clone)]
pub struct StaticResponse {
    status: StatusCode,
    headers: Vec<(HeaderName, HeaderValue)>,
    body: Bytes,
}

impl StaticResponse {
    /// Empty response with `status`.
    #[must_use]
    pub const fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    /// `200 OK` with a JSON body.
    #[must_use]
    pub fn json(value: &serde_json::Value) -> Self {
        Self::new(StatusCode::OK)
            .with_header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .with_body(value.to_string())
    }

    /// Add a response header.
    #[must_use]
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.push((name, value));
        self
    }

    /// Set the body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Configured status.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Build the response.
    #[must_use]
    pub fn to_response(&self) -> Response {
        let mut response = Response::new(Body::from(self.body.clone()));
        *response.status_mut() = self.status;
        for (name, value) in &self.headers {
            response.headers_mut().append(name.clone(), value.clone());
        }
        response
    }
}

#[async_trait]
impl RequestHandler for StaticResponse {
    async fn handle(&self, _request: Request) -> Response {
        self.to_response()
    }
}

/// Empty response with `status`.
#[must_use]
pub fn status_response(status: StatusCode) -> Response {
    StaticResponse::new(status).to_response()
}

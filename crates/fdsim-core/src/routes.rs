//! Path tables for each simulated service.
//!
//! Patterns are `/`-separated with `{name}` placeholders matching exactly one
//! non-empty segment. Query strings are never part of the match.

use std::sync::LazyLock;

use http::Method;

use crate::SdkKind;

/// The alternate verb client-side SDKs use to send a context in the body.
pub static REPORT: LazyLock<Method> = LazyLock::new(|| {
    Method::from_bytes(b"REPORT").unwrap_or(Method::POST)
});

/// A single method + pattern pair.
#[derive(Debug, Clone)]
pub struct Route {
    /// Accepted method.
    pub method: Method,
    /// Path pattern.
    pub pattern: &'static str,
}

impl Route {
    fn get(pattern: &'static str) -> Self {
        Self {
            method: Method::GET,
            pattern,
        }
    }

    fn post(pattern: &'static str) -> Self {
        Self {
            method: Method::POST,
            pattern,
        }
    }

    fn report(pattern: &'static str) -> Self {
        Self {
            method: REPORT.clone(),
            pattern,
        }
    }
}

/// Result of matching a request against a [`RouteTable`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteMatch {
    /// Method and path both match; carries the matched pattern.
    Matched(&'static str),
    /// Some pattern matches the path but not with this method.
    MethodNotAllowed,
    /// No pattern matches the path.
    NotFound,
}

/// An ordered set of routes.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    /// Build a table from routes.
    #[must_use]
    pub const fn new(routes: Vec<Route>) -> Self {
        Self { routes }
    }

    /// Routes in declaration order.
    #[must_use]
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Resolve `method` + `path`.
    #[must_use]
    pub fn resolve(&self, method: &Method, path: &str) -> RouteMatch {
        let mut path_known = false;
        for route in &self.routes {
            if pattern_matches(route.pattern, path) {
                if &route.method == method {
                    return RouteMatch::Matched(route.pattern);
                }
                path_known = true;
            }
        }
        if path_known {
            RouteMatch::MethodNotAllowed
        } else {
            RouteMatch::NotFound
        }
    }
}

/// Whether `path` matches `pattern`.
#[must_use]
pub fn pattern_matches(pattern: &str, path: &str) -> bool {
    let mut pattern_segments = pattern.trim_start_matches('/').split('/');
    let mut path_segments = path.trim_start_matches('/').split('/');
    loop {
        match (pattern_segments.next(), path_segments.next()) {
            (None, None) => return true,
            (Some(expected), Some(actual)) => {
                let is_param = expected.starts_with('{') && expected.ends_with('}');
                if is_param {
                    if actual.is_empty() {
                        return false;
                    }
                } else if expected != actual {
                    return false;
                }
            }
            _ => return false,
        }
    }
}

/// Streaming subscription paths for `kind`.
#[must_use]
pub fn streaming_routes(kind: SdkKind) -> RouteTable {
    let routes = match kind {
        SdkKind::ServerSide => vec![Route::get("/all")],
        SdkKind::Mobile => vec![Route::get("/meval/{context}"), Route::report("/meval")],
        SdkKind::JsClient => vec![
            Route::get("/eval/{env}/{context}"),
            Route::report("/eval/{env}"),
        ],
    };
    RouteTable::new(routes)
}

/// Polling paths for `kind`.
#[must_use]
pub fn polling_routes(kind: SdkKind) -> RouteTable {
    let routes = match kind {
        SdkKind::ServerSide => vec![Route::get("/sdk/latest-all")],
        SdkKind::Mobile => vec![
            Route::get("/msdk/evalx/contexts/{context}"),
            Route::get("/msdk/evalx/users/{user}"),
            Route::report("/msdk/evalx/context"),
            Route::report("/msdk/evalx/user"),
        ],
        SdkKind::JsClient => vec![
            Route::get("/sdk/evalx/{env}/contexts/{context}"),
            Route::get("/sdk/evalx/{env}/users/{user}"),
            Route::report("/sdk/evalx/{env}/context"),
            Route::report("/sdk/evalx/{env}/user"),
        ],
    };
    RouteTable::new(routes)
}

/// Analytics batch paths for `kind`.
#[must_use]
pub fn event_batch_routes(kind: SdkKind) -> RouteTable {
    let routes = match kind {
        SdkKind::ServerSide => vec![Route::post("/bulk")],
        SdkKind::Mobile => vec![
            Route::post("/mobile"),
            Route::post("/mobile/events"),
            Route::post("/mobile/events/bulk"),
        ],
        SdkKind::JsClient => vec![Route::post("/events/bulk/{env}")],
    };
    RouteTable::new(routes)
}

/// Diagnostic event paths for `kind`.
#[must_use]
pub fn diagnostic_event_routes(kind: SdkKind) -> RouteTable {
    let routes = match kind {
        SdkKind::ServerSide => vec![Route::post("/diagnostic")],
        SdkKind::Mobile => vec![Route::post("/mobile/events/diagnostic")],
        SdkKind::JsClient => vec![Route::post("/events/diagnostic/{env}")],
    };
    RouteTable::new(routes)
}

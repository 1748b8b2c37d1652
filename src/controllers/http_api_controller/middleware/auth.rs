use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::Request;
use axum::response::Response;
use tower::{Layer, Service};

/// Header carrying the authenticated principal's role set, populated by the
/// fronting authentication layer (out of scope here). Comma-separated.
pub const ROLES_HEADER: &str = "x-auth-roles";

/// The authenticated principal as seen by the gateway: a role set.
#[derive(Clone, Debug, Default)]
pub struct Principal {
    pub roles: HashSet<String>,
}

impl Principal {
    pub fn with_roles<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            roles: roles.into_iter().map(Into::into).collect(),
        }
    }

    pub fn has_any_role<'a>(&self, allowed: impl IntoIterator<Item = &'a String>) -> bool {
        allowed.into_iter().any(|role| self.roles.contains(role))
    }
}

/// Middleware layer resolving the principal from the roles header and
/// attaching it as a request extension. Requests without the header carry an
/// empty role set.
#[derive(Clone, Default)]
pub struct PrincipalLayer;

impl<S> Layer<S> for PrincipalLayer {
    type Service = PrincipalService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        PrincipalService { inner }
    }
}

#[derive(Clone)]
pub struct PrincipalService<S> {
    inner: S,
}

impl<S> Service<Request<Body>> for PrincipalService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<Body>) -> Self::Future {
        let principal = principal_from_request(&req);
        req.extensions_mut().insert(principal);

        let mut inner = self.inner.clone();
        Box::pin(async move { inner.call(req).await })
    }
}

fn principal_from_request(req: &Request<Body>) -> Principal {
    let roles = req
        .headers()
        .get(ROLES_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(|value| {
            value
                .split(',')
                .map(str::trim)
                .filter(|role| !role.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    Principal { roles }
}

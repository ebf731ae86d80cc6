//! Axum integration utilities.

use std::future::poll_fn;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use crate::guard::{DenyReason, GuardDecision, RouteGuard};
use crate::store::PermissionStore;
use crate::types::UserId;

use ::axum::body::Body;
use ::axum::http::{Request, StatusCode};
use ::axum::response::{IntoResponse, Response};
use ::tower::{Layer, Service};

/// Authenticated identity, inserted into request extensions by the host's
/// authentication layer. Requests without it are treated as anonymous.
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// Authenticated user.
    pub user: UserId,
}

impl AuthContext {
    pub fn new(user: UserId) -> Self {
        Self { user }
    }
}

/// Middleware layer that runs a [`RouteGuard`] in front of a service.
#[derive(Debug)]
pub struct RouteGuardLayer<S> {
    guard: Arc<RouteGuard<S>>,
}

impl<S> Clone for RouteGuardLayer<S> {
    fn clone(&self) -> Self {
        Self {
            guard: Arc::clone(&self.guard),
        }
    }
}

impl<S> RouteGuardLayer<S> {
    /// Creates a new guard layer.
    pub fn new(guard: Arc<RouteGuard<S>>) -> Self {
        Self { guard }
    }
}

impl<S, Inner> Layer<Inner> for RouteGuardLayer<S>
where
    S: PermissionStore,
{
    type Service = RouteGuardService<Inner, S>;

    fn layer(&self, inner: Inner) -> Self::Service {
        RouteGuardService {
            inner,
            guard: Arc::clone(&self.guard),
        }
    }
}

/// Middleware service that enforces the rule table.
#[derive(Debug)]
pub struct RouteGuardService<Inner, S> {
    inner: Inner,
    guard: Arc<RouteGuard<S>>,
}

impl<Inner: Clone, S> Clone for RouteGuardService<Inner, S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            guard: Arc::clone(&self.guard),
        }
    }
}

impl<Inner, S> Service<Request<Body>> for RouteGuardService<Inner, S>
where
    Inner: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    Inner::Future: Send + 'static,
    S: PermissionStore + 'static,
{
    type Response = Response;
    type Error = Inner::Error;
    type Future = Pin<Box<dyn std::future::Future<Output = Result<Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let mut inner = self.inner.clone();
        let guard = Arc::clone(&self.guard);

        Box::pin(async move {
            let user = req
                .extensions()
                .get::<AuthContext>()
                .map(|context| context.user.clone());
            let path = req.uri().path().to_owned();

            match guard.check(&path, user.as_ref()).await {
                GuardDecision::Allow => {
                    poll_fn(|cx| inner.poll_ready(cx)).await?;
                    inner.call(req).await
                }
                GuardDecision::Deny(reason) => Ok(deny_response(reason)),
            }
        })
    }
}

// Bodies stay generic so nothing about roles, permissions or store errors leaks.
fn deny_response(reason: DenyReason) -> Response {
    match reason {
        DenyReason::Unauthenticated => (StatusCode::UNAUTHORIZED, "unauthorized").into_response(),
        DenyReason::Forbidden => (StatusCode::FORBIDDEN, "forbidden").into_response(),
        DenyReason::Unavailable => {
            (StatusCode::SERVICE_UNAVAILABLE, "authorization unavailable").into_response()
        }
    }
}

#[cfg(all(test, feature = "memory-store"))]
mod tests {
    use super::*;
    use crate::guard::{RouteGuardConfig, RouteRule};
    use crate::{EngineBuilder, MemoryStore, Permission, Role, RoleId};
    use std::convert::Infallible;
    use tower::ServiceExt;

    fn guard_with(store: MemoryStore) -> Arc<RouteGuard<MemoryStore>> {
        let engine = Arc::new(EngineBuilder::new(store).build());
        let config = RouteGuardConfig::new(vec![
            RouteRule::new("/menus").permissions([Permission::try_from("menus.view").unwrap()]),
        ]);
        Arc::new(RouteGuard::new(engine, config).unwrap())
    }

    fn store_with_viewer() -> MemoryStore {
        let store = MemoryStore::new();
        let role = RoleId::try_from("role_viewer").unwrap();
        store.upsert_role(
            Role::new(role.clone(), "Viewer", 10)
                .with_permissions([Permission::try_from("menus.view").unwrap()]),
        );
        store.assign_role(UserId::try_from("user_1").unwrap(), role);
        store
    }

    async fn call(guard: Arc<RouteGuard<MemoryStore>>, path: &str, user: Option<&str>) -> StatusCode {
        let service = RouteGuardLayer::new(guard).layer(tower::service_fn(
            |_req: Request<Body>| async { Ok::<_, Infallible>(Response::new(Body::from("ok"))) },
        ));
        let mut request = Request::builder().uri(path).body(Body::empty()).unwrap();
        if let Some(user) = user {
            request
                .extensions_mut()
                .insert(AuthContext::new(UserId::try_from(user).unwrap()));
        }
        service.oneshot(request).await.unwrap().status()
    }

    #[tokio::test]
    async fn layer_should_pass_authorized_request() {
        let guard = guard_with(store_with_viewer());

        assert_eq!(call(guard, "/menus/1", Some("user_1")).await, StatusCode::OK);
    }

    #[tokio::test]
    async fn layer_should_reject_anonymous_request() {
        let guard = guard_with(store_with_viewer());

        assert_eq!(call(guard, "/menus/1", None).await, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn layer_should_reject_user_without_permission() {
        let guard = guard_with(store_with_viewer());

        assert_eq!(call(guard, "/menus/1", Some("user_2")).await, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn layer_should_fail_closed_when_store_is_down() {
        let store = store_with_viewer();
        store.set_unavailable(true);
        let guard = guard_with(store);

        assert_eq!(
            call(guard, "/menus/1", Some("user_1")).await,
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[tokio::test]
    async fn layer_should_pass_unmatched_path() {
        let guard = guard_with(MemoryStore::new());

        assert_eq!(call(guard, "/dashboard", None).await, StatusCode::OK);
    }
}

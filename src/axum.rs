//! Axum integration utilities.

use std::future::poll_fn;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use crate::authorizer::Authorizer;
use crate::error::Error;
use crate::types::UserId;

use ::axum::body::Body;
use ::axum::extract::FromRequestParts;
use ::axum::http::request::Parts;
use ::axum::http::{Request, StatusCode};
use ::axum::response::{IntoResponse, Response};
use ::tower::{Layer, Service};
use tracing::warn;

/// Authenticated user extracted from a request.
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// User identifier.
    pub user_id: UserId,
}

impl AuthContext {
    /// Creates a context for an already authenticated user.
    pub fn new(user_id: UserId) -> Self {
        Self { user_id }
    }
}

/// Reads the context an authentication layer stored in request extensions.
///
/// Rejects with `401` when no layer authenticated the request.
impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .ok_or((StatusCode::UNAUTHORIZED, "missing auth context"))
    }
}

/// Middleware layer that requires a permission via [`Authorizer`].
#[derive(Debug)]
pub struct RequirePermissionLayer<S> {
    authorizer: Arc<Authorizer<S>>,
    permission: Arc<str>,
}

impl<S> Clone for RequirePermissionLayer<S> {
    fn clone(&self) -> Self {
        Self {
            authorizer: self.authorizer.clone(),
            permission: self.permission.clone(),
        }
    }
}

impl<S> RequirePermissionLayer<S> {
    /// Creates a new layer requiring `permission`.
    pub fn new(authorizer: Arc<Authorizer<S>>, permission: impl Into<Arc<str>>) -> Self {
        Self {
            authorizer,
            permission: permission.into(),
        }
    }
}

impl<S, Inner> Layer<Inner> for RequirePermissionLayer<S>
where
    S: crate::store::Store,
{
    type Service = RequirePermissionService<Inner, S>;

    fn layer(&self, inner: Inner) -> Self::Service {
        RequirePermissionService {
            inner,
            authorizer: self.authorizer.clone(),
            permission: self.permission.clone(),
        }
    }
}

/// Middleware service that enforces a permission check.
#[derive(Debug)]
pub struct RequirePermissionService<Inner, S> {
    inner: Inner,
    authorizer: Arc<Authorizer<S>>,
    permission: Arc<str>,
}

impl<Inner: Clone, S> Clone for RequirePermissionService<Inner, S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            authorizer: self.authorizer.clone(),
            permission: self.permission.clone(),
        }
    }
}

impl<Inner, S> Service<Request<Body>> for RequirePermissionService<Inner, S>
where
    Inner: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    Inner::Future: Send + 'static,
    S: crate::store::Store + 'static,
{
    type Response = Response;
    type Error = Inner::Error;
    type Future = Pin<Box<dyn std::future::Future<Output = Result<Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let mut inner = self.inner.clone();
        let authorizer = self.authorizer.clone();
        let permission = self.permission.clone();

        Box::pin(async move {
            let context = req.extensions().get::<AuthContext>().cloned();
            let Some(context) = context else {
                return Ok((StatusCode::UNAUTHORIZED, "missing auth context").into_response());
            };

            let user_id = context.user_id.to_string();
            match authorizer.has_permission(&user_id, &permission).await {
                Ok(true) => {
                    poll_fn(|cx| inner.poll_ready(cx)).await?;
                    inner.call(req).await
                }
                Ok(false) => Ok((StatusCode::FORBIDDEN, "forbidden").into_response()),
                Err(err @ Error::InvalidUserId { .. }) => {
                    Ok((StatusCode::BAD_REQUEST, err.to_string()).into_response())
                }
                Err(err) => {
                    warn!(
                        user_id = %context.user_id,
                        permission = &*permission,
                        error = %err,
                        "permission check failed"
                    );
                    Ok((StatusCode::INTERNAL_SERVER_ERROR, "auth error").into_response())
                }
            }
        })
    }
}

#[cfg(feature = "axum-jwt")]
pub mod jwt {
    //! Bearer-token authentication that feeds [`AuthContext`].

    use std::future::poll_fn;
    use std::marker::PhantomData;
    use std::pin::Pin;
    use std::sync::Arc;
    use std::task::{Context, Poll};

    use jsonwebtoken::{DecodingKey, Validation, decode};
    use serde::de::DeserializeOwned;
    use thiserror::Error;
    use tracing::debug;

    use crate::axum::AuthContext;
    use crate::types::UserId;

    use ::axum::body::Body;
    use ::axum::http::header::AUTHORIZATION;
    use ::axum::http::{HeaderMap, Request, StatusCode};
    use ::axum::response::{IntoResponse, Response};
    use ::tower::{Layer, Service};

    /// Reasons a request fails bearer-token authentication.
    ///
    /// Every variant maps to `401` with its message as the body.
    #[derive(Debug, Error)]
    pub enum AuthError {
        #[error("token not found")]
        MissingToken,
        #[error("invalid token format")]
        MalformedHeader,
        #[error("invalid token")]
        InvalidToken,
        /// The token carries no usable user identifier.
        #[error("invalid claims: {0}")]
        InvalidClaims(String),
    }

    impl IntoResponse for AuthError {
        fn into_response(self) -> Response {
            (StatusCode::UNAUTHORIZED, self.to_string()).into_response()
        }
    }

    /// Claims that name the authenticated user.
    pub trait UserClaims: DeserializeOwned + Send + Sync + 'static {
        /// Returns the raw user identifier, if the token carries one.
        fn user_id(&self) -> Option<&str>;
    }

    /// `{ user_id, sub, exp }`, preferring `user_id` over `sub`.
    #[derive(Debug, Clone, serde::Deserialize)]
    pub struct DefaultClaims {
        pub user_id: Option<String>,
        pub sub: Option<String>,
        pub exp: Option<u64>,
    }

    impl UserClaims for DefaultClaims {
        fn user_id(&self) -> Option<&str> {
            self.user_id.as_deref().or(self.sub.as_deref())
        }
    }

    /// Verifies bearer tokens and turns their claims into an [`AuthContext`].
    pub struct TokenVerifier<C = DefaultClaims> {
        key: DecodingKey,
        validation: Validation,
        _claims: PhantomData<fn() -> C>,
    }

    impl<C: UserClaims> TokenVerifier<C> {
        pub fn new(key: DecodingKey, validation: Validation) -> Self {
            Self {
                key,
                validation,
                _claims: PhantomData,
            }
        }

        /// Authenticates a request from its `Authorization` header.
        pub fn verify(&self, headers: &HeaderMap) -> Result<AuthContext, AuthError> {
            let token = bearer_token(headers)?;
            let claims = decode::<C>(token, &self.key, &self.validation)
                .map_err(|err| {
                    debug!(error = %err, "bearer token rejected");
                    AuthError::InvalidToken
                })?
                .claims;
            context_from_claims(&claims)
        }
    }

    fn context_from_claims<C: UserClaims>(claims: &C) -> Result<AuthContext, AuthError> {
        let raw = claims
            .user_id()
            .ok_or_else(|| AuthError::InvalidClaims("missing user id".to_string()))?;
        let user_id =
            UserId::parse(raw).map_err(|err| AuthError::InvalidClaims(err.to_string()))?;
        Ok(AuthContext::new(user_id))
    }

    fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
        let value = headers.get(AUTHORIZATION).ok_or(AuthError::MissingToken)?;
        let token = value
            .to_str()
            .ok()
            .and_then(|value| value.strip_prefix("Bearer "))
            .filter(|token| !token.is_empty())
            .ok_or(AuthError::MalformedHeader)?;
        Ok(token)
    }

    /// Layer that authenticates every request and stores its [`AuthContext`].
    ///
    /// Place it outside [`RequirePermissionLayer`](crate::axum::RequirePermissionLayer)
    /// so permission checks see the context.
    pub struct JwtAuthLayer<C = DefaultClaims> {
        verifier: Arc<TokenVerifier<C>>,
    }

    impl<C> Clone for JwtAuthLayer<C> {
        fn clone(&self) -> Self {
            Self {
                verifier: self.verifier.clone(),
            }
        }
    }

    impl<C: UserClaims> JwtAuthLayer<C> {
        pub fn new(verifier: TokenVerifier<C>) -> Self {
            Self {
                verifier: Arc::new(verifier),
            }
        }
    }

    impl<Inner, C> Layer<Inner> for JwtAuthLayer<C> {
        type Service = JwtAuthService<Inner, C>;

        fn layer(&self, inner: Inner) -> Self::Service {
            JwtAuthService {
                inner,
                verifier: self.verifier.clone(),
            }
        }
    }

    /// Service produced by [`JwtAuthLayer`].
    pub struct JwtAuthService<Inner, C = DefaultClaims> {
        inner: Inner,
        verifier: Arc<TokenVerifier<C>>,
    }

    impl<Inner: Clone, C> Clone for JwtAuthService<Inner, C> {
        fn clone(&self) -> Self {
            Self {
                inner: self.inner.clone(),
                verifier: self.verifier.clone(),
            }
        }
    }

    impl<Inner, C> Service<Request<Body>> for JwtAuthService<Inner, C>
    where
        Inner: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
        Inner::Future: Send + 'static,
        C: UserClaims,
    {
        type Response = Response;
        type Error = Inner::Error;
        type Future =
            Pin<Box<dyn std::future::Future<Output = Result<Response, Self::Error>> + Send>>;

        fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, mut req: Request<Body>) -> Self::Future {
            let context = self.verifier.verify(req.headers());
            let mut inner = self.inner.clone();

            Box::pin(async move {
                let context = match context {
                    Ok(context) => context,
                    Err(err) => return Ok(err.into_response()),
                };
                req.extensions_mut().insert(context);
                poll_fn(|cx| inner.poll_ready(cx)).await?;
                inner.call(req).await
            })
        }
    }

}

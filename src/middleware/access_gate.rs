/// Access control middleware.
///
/// Gates protected routes behind an ordered check chain: bearer
/// extraction, token decode, subject check, active-session lookup,
/// and, on admin routes, a role comparison. The chain is terminal at
/// the first failure and strictly ordered, so an invalid or revoked
/// token never reaches the role check. Validated claims are injected
/// into request extensions for the wrapped handler.

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error, HttpMessage,
};
use futures::future::LocalBoxFuture;
use std::rc::Rc;
use std::sync::Arc;

use crate::auth::TokenCodec;
use crate::error::{AppError, AuthError};
use crate::store::{Role, SessionStore, UserStore};

pub struct AccessGate {
    codec: TokenCodec,
    users: Arc<dyn UserStore>,
    sessions: Arc<dyn SessionStore>,
    required_role: Option<Role>,
}

impl AccessGate {
    /// Gate requiring a valid access token with an active session.
    pub fn bearer(
        codec: TokenCodec,
        users: Arc<dyn UserStore>,
        sessions: Arc<dyn SessionStore>,
    ) -> Self {
        Self {
            codec,
            users,
            sessions,
            required_role: None,
        }
    }

    /// Gate additionally requiring the Admin role, checked only after
    /// the token and session checks pass.
    pub fn admin(
        codec: TokenCodec,
        users: Arc<dyn UserStore>,
        sessions: Arc<dyn SessionStore>,
    ) -> Self {
        Self {
            codec,
            users,
            sessions,
            required_role: Some(Role::Admin),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AccessGate
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = AccessGateService<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(AccessGateService {
            service: Rc::new(service),
            codec: self.codec.clone(),
            users: self.users.clone(),
            sessions: self.sessions.clone(),
            required_role: self.required_role,
        }))
    }
}

pub struct AccessGateService<S> {
    service: Rc<S>,
    codec: TokenCodec,
    users: Arc<dyn UserStore>,
    sessions: Arc<dyn SessionStore>,
    required_role: Option<Role>,
}

impl<S, B> Service<ServiceRequest> for AccessGateService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let codec = self.codec.clone();
        let users = self.users.clone();
        let sessions = self.sessions.clone();
        let required_role = self.required_role;
        let service = self.service.clone();

        Box::pin(async move {
            // 1. Bearer extraction.
            let token = match bearer_token(&req) {
                Some(token) => token,
                None => {
                    tracing::warn!("Missing or malformed authorization header");
                    return Err(AppError::from(AuthError::MissingBearer).into());
                }
            };

            // 2. Signature and expiry.
            let claims = match codec.decode_access(&token) {
                Some(claims) => claims,
                None => {
                    tracing::warn!("Access token failed verification");
                    return Err(AppError::from(AuthError::InvalidToken).into());
                }
            };

            // 3. Subject must name a user id.
            let subject = match claims.subject_id() {
                Some(id) => id,
                None => {
                    tracing::warn!(sub = %claims.sub, "Token subject is not a user id");
                    return Err(AppError::from(AuthError::InvalidToken).into());
                }
            };

            // 4. The session row must still be active; a valid
            // signature alone is not enough.
            if sessions.find_active(subject, &token).await?.is_none() {
                tracing::warn!(user_id = subject, "No active session for presented token");
                return Err(AppError::from(AuthError::RevokedToken).into());
            }

            // 5. Role, for admin routes only.
            if let Some(required) = required_role {
                let user = users
                    .find_by_id(subject)
                    .await?
                    .ok_or_else(|| AppError::from(AuthError::InvalidToken))?;

                if user.role != required {
                    tracing::warn!(
                        user_id = subject,
                        role = user.role.as_str(),
                        "Insufficient role"
                    );
                    return Err(AppError::from(AuthError::Forbidden).into());
                }
            }

            req.extensions_mut().insert(claims);
            service.call(req).await
        })
    }
}

/// Pull the raw token out of an `Authorization: Bearer <token>`
/// header. The scheme comparison is case-insensitive.
fn bearer_token(req: &ServiceRequest) -> Option<String> {
    let header = req.headers().get("Authorization")?.to_str().ok()?;
    let (scheme, token) = header.split_once(' ')?;

    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return None;
    }

    Some(token.to_string())
}

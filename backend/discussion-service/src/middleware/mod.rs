/// HTTP middleware for discussion-service
///
/// Bearer tokens are issued by the external auth service and verified here
/// with the shared HS256 secret. The middleware never rejects a request by
/// itself: public routes work anonymously, and handlers that need a caller
/// take `UserId`, which answers 401 for a missing or invalid token.
use actix_web::dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::{Error, FromRequest, HttpMessage, HttpRequest};
use futures::future::LocalBoxFuture;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::future::{ready, Ready};
use std::rc::Rc;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::error::AppError;

/// Claims the auth service puts in its access tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: String,
    pub aud: String,
    pub exp: usize,
}

pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(secret: &str, audience: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[audience]);

        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Returns the user id carried in a valid token
    pub fn verify(&self, token: &str) -> Result<Uuid, AppError> {
        let data = decode::<Claims>(token, &self.key, &self.validation).map_err(|e| {
            debug!("Token rejected: {}", e);
            AppError::Unauthorized("invalid or expired token".to_string())
        })?;

        Uuid::parse_str(&data.claims.sub)
            .map_err(|_| AppError::Unauthorized("invalid user id in token".to_string()))
    }
}

/// Extracted user identifier stored in request extensions after auth.
#[derive(Debug, Clone, Copy)]
pub struct UserId(pub Uuid);

/// Why a presented token was not accepted
#[derive(Debug, Clone)]
struct AuthRejection(String);

/// Actix middleware that validates a Bearer token when one is present.
pub struct JwtAuthMiddleware {
    verifier: Arc<JwtVerifier>,
}

impl JwtAuthMiddleware {
    pub fn new(verifier: Arc<JwtVerifier>) -> Self {
        Self { verifier }
    }
}

impl<S, B> Transform<S, ServiceRequest> for JwtAuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = JwtAuthMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(JwtAuthMiddlewareService {
            service: Rc::new(service),
            verifier: self.verifier.clone(),
        }))
    }
}

pub struct JwtAuthMiddlewareService<S> {
    service: Rc<S>,
    verifier: Arc<JwtVerifier>,
}

impl<S, B> Service<ServiceRequest> for JwtAuthMiddlewareService<S>
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
        let service = self.service.clone();
        let verifier = self.verifier.clone();

        Box::pin(async move {
            let auth_header = req
                .headers()
                .get("Authorization")
                .and_then(|h| h.to_str().ok())
                .map(|h| h.to_string());

            if let Some(auth_header) = auth_header {
                let verified = match auth_header.strip_prefix("Bearer ") {
                    Some(token) => verifier.verify(token),
                    None => Err(AppError::Unauthorized(
                        "invalid Authorization scheme".to_string(),
                    )),
                };

                match verified {
                    Ok(user_id) => {
                        req.extensions_mut().insert(UserId(user_id));
                    }
                    Err(AppError::Unauthorized(reason)) => {
                        req.extensions_mut().insert(AuthRejection(reason));
                    }
                    Err(other) => {
                        req.extensions_mut().insert(AuthRejection(other.to_string()));
                    }
                }
            }

            service.call(req).await
        })
    }
}

impl FromRequest for UserId {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut actix_web::dev::Payload) -> Self::Future {
        let extensions = req.extensions();
        let result = match extensions.get::<UserId>() {
            Some(user_id) => Ok(*user_id),
            None => {
                let reason = extensions
                    .get::<AuthRejection>()
                    .map(|r| r.0.clone())
                    .unwrap_or_else(|| "sign in required".to_string());
                Err(Error::from(AppError::Unauthorized(reason)))
            }
        };
        ready(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn token(secret: &str, sub: &str, aud: &str) -> String {
        let claims = Claims {
            sub: sub.to_string(),
            aud: aud.to_string(),
            exp: (chrono::Utc::now().timestamp() + 600) as usize,
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn accepts_token_for_expected_audience() {
        let verifier = JwtVerifier::new("secret", "authenticated");
        let user_id = Uuid::new_v4();

        let verified = verifier
            .verify(&token("secret", &user_id.to_string(), "authenticated"))
            .unwrap();
        assert_eq!(verified, user_id);
    }

    #[test]
    fn rejects_wrong_secret_audience_or_subject() {
        let verifier = JwtVerifier::new("secret", "authenticated");
        let sub = Uuid::new_v4().to_string();

        assert!(verifier.verify(&token("other", &sub, "authenticated")).is_err());
        assert!(verifier.verify(&token("secret", &sub, "anon")).is_err());
        assert!(verifier
            .verify(&token("secret", "not-a-uuid", "authenticated"))
            .is_err());
    }
}

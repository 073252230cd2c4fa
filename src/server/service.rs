use std::time::Instant;

use metrics::{counter, histogram};
use tonic::{Request, Response, Status};

use super::config::RateLimiter;
use crate::group::{GroupElement, Scalar};
use crate::proto::auth_service_server::AuthService;
use crate::proto::{
    ChallengeRequest, ChallengeResponse, RegisterRequest, RegisterResponse, ValidateTokenRequest,
    ValidateTokenResponse, VerifyRequest, VerifyResponse,
};
use crate::protocol::ProtocolEngine;
use crate::store::{ChallengeStore, IdentityStore};
use crate::token::{TokenIssuer, TokenValidator};

/// gRPC service implementation for Schnorr login.
pub struct AuthServiceImpl<I, C> {
    engine: ProtocolEngine<I, C>,
    issuer: TokenIssuer,
    validator: TokenValidator,
    rate_limiter: RateLimiter,
}

impl<I, C> AuthServiceImpl<I, C> {
    /// Creates a new authentication service.
    pub fn new(
        engine: ProtocolEngine<I, C>,
        issuer: TokenIssuer,
        validator: TokenValidator,
        rate_limiter: RateLimiter,
    ) -> Self {
        Self {
            engine,
            issuer,
            validator,
            rate_limiter,
        }
    }

    #[allow(clippy::result_large_err)]
    fn validate_username(username: &str) -> Result<(), Status> {
        if username.is_empty() {
            return Err(Status::invalid_argument("Username cannot be empty"));
        }

        if username.len() > 256 {
            return Err(Status::invalid_argument("Username too long"));
        }

        if !username
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '-' || c == '.')
        {
            return Err(Status::invalid_argument(
                "Username contains invalid characters",
            ));
        }

        Ok(())
    }

    #[allow(clippy::result_large_err)]
    fn validate_hex_field(name: &str, value: &str) -> Result<(), Status> {
        if value.is_empty() {
            return Err(Status::invalid_argument(format!("Empty {name} value")));
        }

        if value.len() > 4096 {
            return Err(Status::invalid_argument(format!("{name} value too large")));
        }

        Ok(())
    }
}

#[tonic::async_trait]
impl<I, C> AuthService for AuthServiceImpl<I, C>
where
    I: IdentityStore,
    C: ChallengeStore,
{
    async fn register(
        &self,
        request: Request<RegisterRequest>,
    ) -> Result<Response<RegisterResponse>, Status> {
        let start = Instant::now();
        counter!("auth.register.requests").increment(1);

        self.rate_limiter.check_rate_limit().await?;

        let req = request.into_inner();

        Self::validate_username(&req.username)?;
        Self::validate_hex_field("public_key_y", &req.public_key_y)?;

        if req.salt.len() > 1024 {
            return Err(Status::invalid_argument("salt value too large"));
        }

        let public_key = GroupElement::from_hex(&req.public_key_y)?;

        let result = self
            .engine
            .register(&req.username, public_key, req.salt.into_bytes())
            .await;

        histogram!("auth.register.duration").record(start.elapsed().as_secs_f64());

        if result.is_ok() {
            counter!("auth.register.success").increment(1);
        } else {
            counter!("auth.register.failure").increment(1);
        }

        result?;

        Ok(Response::new(RegisterResponse {
            success: true,
            message: format!("User '{}' registered successfully", req.username),
        }))
    }

    async fn create_challenge(
        &self,
        request: Request<ChallengeRequest>,
    ) -> Result<Response<ChallengeResponse>, Status> {
        let start = Instant::now();
        counter!("auth.challenge.requests").increment(1);

        self.rate_limiter.check_rate_limit().await?;

        let req = request.into_inner();

        Self::validate_username(&req.username)?;
        Self::validate_hex_field("client_r", &req.client_r)?;

        let client_r = GroupElement::from_hex(&req.client_r)?;

        let issued = self.engine.issue_challenge(&req.username, client_r).await;

        histogram!("auth.challenge.duration").record(start.elapsed().as_secs_f64());

        let issued = match issued {
            Ok(issued) => {
                counter!("auth.challenge.success").increment(1);
                issued
            }
            Err(err) => {
                counter!("auth.challenge.failure").increment(1);
                return Err(err.into());
            }
        };

        Ok(Response::new(ChallengeResponse {
            challenge_id: issued.challenge_id,
            c: issued.c.to_hex(),
            expires_in: issued.expires_in,
        }))
    }

    async fn verify_proof(
        &self,
        request: Request<VerifyRequest>,
    ) -> Result<Response<VerifyResponse>, Status> {
        let start = Instant::now();
        counter!("auth.verify.requests").increment(1);

        self.rate_limiter.check_rate_limit().await?;

        let req = request.into_inner();

        Self::validate_username(&req.username)?;
        Self::validate_hex_field("s", &req.s)?;
        Self::validate_hex_field("client_r", &req.client_r)?;

        if req.challenge_id.is_empty() || req.challenge_id.len() > 128 {
            return Err(Status::invalid_argument("Invalid challenge ID length"));
        }

        // Undecodable hex is a malformed request, not a protocol outcome; it
        // is rejected here and leaves the challenge unconsumed.
        let s = Scalar::from_hex(&req.s)
            .map_err(|_| Status::invalid_argument("s is not a valid hex value"))?;
        let client_r = GroupElement::from_hex(&req.client_r)
            .map_err(|_| Status::invalid_argument("client_r is not a valid hex value"))?;

        let result = self
            .engine
            .verify(&req.challenge_id, s, client_r, &req.username)
            .await;

        histogram!("auth.verify.duration").record(start.elapsed().as_secs_f64());

        let username = match result {
            Ok(username) => {
                counter!("auth.verify.success").increment(1);
                username
            }
            Err(err) => {
                counter!("auth.verify.failure").increment(1);
                return Err(err.into());
            }
        };

        let issued = self.issuer.issue(&username)?;

        Ok(Response::new(VerifyResponse {
            token: issued.token,
            expires_in: issued.expires_in,
        }))
    }

    async fn validate_token(
        &self,
        request: Request<ValidateTokenRequest>,
    ) -> Result<Response<ValidateTokenResponse>, Status> {
        counter!("auth.validate_token.requests").increment(1);

        self.rate_limiter.check_rate_limit().await?;

        let req = request.into_inner();

        if req.token.is_empty() || req.token.len() > 4096 {
            return Err(Status::unauthenticated("Malformed token"));
        }

        let username = self.validator.validate(&req.token).map_err(|err| {
            counter!("auth.validate_token.failure").increment(1);
            Status::from(err)
        })?;

        counter!("auth.validate_token.success").increment(1);
        Ok(Response::new(ValidateTokenResponse { username }))
    }
}

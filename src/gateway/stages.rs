//! Protected-route stages: verify identity → enforce rate limit → forward

use crate::auth::AuthManager;
use crate::config::REQUEST_COST;
use crate::gateway::pipeline::{PipelineState, RequestContext, Stage, StageOutcome};
use crate::gateway::service_client::ServiceClient;
use crate::rate_limit::TokenBucketLimiter;
use async_trait::async_trait;
use axum::http::{HeaderName, HeaderValue};
use gatekeeper_error::AppError;
use std::sync::Arc;
use tracing::info;

pub const HEADER_RATE_LIMIT_LIMIT: &str = "x-ratelimit-limit";
pub const HEADER_RATE_LIMIT_REMAINING: &str = "x-ratelimit-remaining";

/// Verify the bearer credential and attach the caller identity
pub struct VerifyIdentity {
    auth_manager: Arc<AuthManager>,
}

impl VerifyIdentity {
    pub fn new(auth_manager: Arc<AuthManager>) -> Self {
        Self { auth_manager }
    }
}

#[async_trait]
impl Stage for VerifyIdentity {
    fn name(&self) -> &'static str {
        "verify_identity"
    }

    fn reached_state(&self) -> PipelineState {
        PipelineState::Verified
    }

    async fn run(&self, ctx: &mut RequestContext) -> StageOutcome {
        match self.auth_manager.verify_request(ctx.request.headers()) {
            Ok(claims) => {
                ctx.identity = Some(claims.identity());
                ctx.claims = Some(claims);
                StageOutcome::Continue
            }
            Err(err) => StageOutcome::Reject(err),
        }
    }
}

/// Charge one request against the caller's bucket for the request path
pub struct EnforceRateLimit {
    limiter: Arc<TokenBucketLimiter>,
    cost: f64,
}

impl EnforceRateLimit {
    pub fn new(limiter: Arc<TokenBucketLimiter>) -> Self {
        Self {
            limiter,
            cost: REQUEST_COST,
        }
    }

    pub fn with_cost(mut self, cost: f64) -> Self {
        self.cost = cost;
        self
    }
}

#[async_trait]
impl Stage for EnforceRateLimit {
    fn name(&self) -> &'static str {
        "enforce_rate_limit"
    }

    fn reached_state(&self) -> PipelineState {
        PipelineState::Admitted
    }

    async fn run(&self, ctx: &mut RequestContext) -> StageOutcome {
        let Some(identity) = ctx.identity.clone() else {
            return StageOutcome::Reject(AppError::internal(
                "rate limit stage reached without a verified identity",
            ));
        };
        let path = ctx.request.uri().path().to_string();

        let decision = match self
            .limiter
            .check(&identity, &path, ctx.received_at, self.cost)
            .await
        {
            Ok(decision) => decision,
            Err(err) => return StageOutcome::Reject(err),
        };

        // Reported on every outcome so callers can observe their budget
        for (name, value) in [
            (HEADER_RATE_LIMIT_LIMIT, decision.limit_header()),
            (HEADER_RATE_LIMIT_REMAINING, decision.remaining_header()),
        ] {
            if let Ok(value) = HeaderValue::from_str(&value) {
                ctx.response_headers
                    .insert(HeaderName::from_static(name), value);
            }
        }

        if decision.allowed {
            return StageOutcome::Continue;
        }

        let retry_after = decision.retry_after(self.cost);
        info!(
            user_id = %identity,
            path = %path,
            remaining = decision.remaining,
            retry_after = retry_after,
            "Rate limit exceeded"
        );
        StageOutcome::Reject(AppError::RateLimited { retry_after })
    }
}

/// Hand the admitted request to the downstream service
pub struct ForwardRequest {
    client: Arc<ServiceClient>,
}

impl ForwardRequest {
    pub fn new(client: Arc<ServiceClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Stage for ForwardRequest {
    fn name(&self) -> &'static str {
        "forward_request"
    }

    fn reached_state(&self) -> PipelineState {
        PipelineState::Forwarded
    }

    async fn run(&self, ctx: &mut RequestContext) -> StageOutcome {
        let Some(identity) = ctx.identity.clone() else {
            return StageOutcome::Reject(AppError::internal(
                "forward stage reached without a verified identity",
            ));
        };
        let request = std::mem::take(&mut ctx.request);

        match self.client.forward_request(&identity, request).await {
            Ok(response) => StageOutcome::Respond(response),
            Err(err) => StageOutcome::Reject(err),
        }
    }
}

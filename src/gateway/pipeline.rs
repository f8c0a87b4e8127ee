// ============================================================================
// Pipeline Composer
// ============================================================================
//
// An explicit ordered list of stages. Each stage either continues with an
// enriched context or terminates the request with a response. The state
// reached is reported with the response so every transition is observable:
//
//   START → VERIFIED → ADMITTED → FORWARDED
//     └──────┴───────────┴──→ REJECTED(reason)
//
// ============================================================================

use crate::auth::Claims;
use crate::rate_limit::current_time_secs;
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{HeaderMap, Request};
use axum::response::{IntoResponse, Response};
use gatekeeper_error::AppError;
use gatekeeper_metrics::PIPELINE_REJECTIONS_TOTAL;
use gatekeeper_types::Identity;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    Auth,
    RateLimited,
    LimiterError,
    BadGateway,
    GatewayTimeout,
    Internal,
}

impl RejectReason {
    pub fn from_error(err: &AppError) -> Self {
        match err {
            AppError::AuthMissing | AppError::AuthMalformed | AppError::AuthInvalid(_) => {
                RejectReason::Auth
            }
            AppError::RateLimited { .. } => RejectReason::RateLimited,
            AppError::LimiterUnavailable(_) => RejectReason::LimiterError,
            AppError::DownstreamUnavailable(_) | AppError::PayloadTooLarge(_) => {
                RejectReason::BadGateway
            }
            AppError::DownstreamTimeout(_) => RejectReason::GatewayTimeout,
            _ => RejectReason::Internal,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::Auth => "auth",
            RejectReason::RateLimited => "rate_limited",
            RejectReason::LimiterError => "limiter_error",
            RejectReason::BadGateway => "bad_gateway",
            RejectReason::GatewayTimeout => "gateway_timeout",
            RejectReason::Internal => "internal",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Start,
    Verified,
    Admitted,
    Forwarded,
    Rejected(RejectReason),
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineState::Start => f.write_str("START"),
            PipelineState::Verified => f.write_str("VERIFIED"),
            PipelineState::Admitted => f.write_str("ADMITTED"),
            PipelineState::Forwarded => f.write_str("FORWARDED"),
            PipelineState::Rejected(reason) => write!(f, "REJECTED({})", reason.as_str()),
        }
    }
}

/// Per-request state threaded through the stages
pub struct RequestContext {
    pub request: Request<Body>,
    /// Seconds since epoch at which the request entered the pipeline
    pub received_at: f64,
    pub claims: Option<Claims>,
    pub identity: Option<Identity>,
    /// Merged into the final response whatever the outcome
    pub response_headers: HeaderMap,
}

impl RequestContext {
    pub fn new(request: Request<Body>) -> Self {
        Self::at(request, current_time_secs())
    }

    pub fn at(request: Request<Body>, received_at: f64) -> Self {
        Self {
            request,
            received_at,
            claims: None,
            identity: None,
            response_headers: HeaderMap::new(),
        }
    }
}

pub enum StageOutcome {
    Continue,
    Respond(Response),
    Reject(AppError),
}

#[async_trait]
pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;

    /// State the request is in once this stage succeeds
    fn reached_state(&self) -> PipelineState;

    async fn run(&self, ctx: &mut RequestContext) -> StageOutcome;
}

pub struct PipelineRun {
    pub state: PipelineState,
    pub response: Response,
}

#[derive(Clone, Default)]
pub struct Pipeline {
    stages: Vec<Arc<dyn Stage>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stage(mut self, stage: impl Stage + 'static) -> Self {
        self.stages.push(Arc::new(stage));
        self
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|stage| stage.name()).collect()
    }

    /// Run the stages in order, stopping at the first that terminates
    pub async fn execute(&self, mut ctx: RequestContext) -> PipelineRun {
        let mut state = PipelineState::Start;

        for stage in &self.stages {
            match stage.run(&mut ctx).await {
                StageOutcome::Continue => {
                    state = stage.reached_state();
                }
                StageOutcome::Respond(response) => {
                    return finish(stage.reached_state(), response, ctx.response_headers);
                }
                StageOutcome::Reject(err) => {
                    let reason = RejectReason::from_error(&err);
                    PIPELINE_REJECTIONS_TOTAL
                        .with_label_values(&[reason.as_str()])
                        .inc();
                    debug!(stage = stage.name(), reason = reason.as_str(), "Request rejected");
                    return finish(
                        PipelineState::Rejected(reason),
                        err.into_response(),
                        ctx.response_headers,
                    );
                }
            }
        }

        // A chain that never produces a response is a wiring error
        let err = AppError::internal(format!("pipeline ended in state {} without a response", state));
        finish(
            PipelineState::Rejected(RejectReason::Internal),
            err.into_response(),
            ctx.response_headers,
        )
    }
}

fn finish(state: PipelineState, mut response: Response, headers: HeaderMap) -> PipelineRun {
    response.headers_mut().extend(headers);
    PipelineRun { state, response }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderValue, StatusCode};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Scripted {
        name: &'static str,
        reached: PipelineState,
        outcome: fn() -> StageOutcome,
        runs: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Stage for Scripted {
        fn name(&self) -> &'static str {
            self.name
        }

        fn reached_state(&self) -> PipelineState {
            self.reached
        }

        async fn run(&self, ctx: &mut RequestContext) -> StageOutcome {
            self.runs.fetch_add(1, Ordering::SeqCst);
            ctx.response_headers
                .insert("x-stage", HeaderValue::from_static(self.name));
            (self.outcome)()
        }
    }

    fn stage(
        name: &'static str,
        reached: PipelineState,
        outcome: fn() -> StageOutcome,
    ) -> (Scripted, Arc<AtomicUsize>) {
        let runs = Arc::new(AtomicUsize::new(0));
        (
            Scripted {
                name,
                reached,
                outcome,
                runs: runs.clone(),
            },
            runs,
        )
    }

    fn context() -> RequestContext {
        RequestContext::at(Request::new(Body::empty()), 1_000.0)
    }

    #[tokio::test]
    async fn test_full_chain_reaches_forwarded() {
        let (verify, _) = stage("verify", PipelineState::Verified, || StageOutcome::Continue);
        let (limit, _) = stage("limit", PipelineState::Admitted, || StageOutcome::Continue);
        let (forward, _) = stage("forward", PipelineState::Forwarded, || {
            StageOutcome::Respond(StatusCode::OK.into_response())
        });
        let pipeline = Pipeline::new()
            .with_stage(verify)
            .with_stage(limit)
            .with_stage(forward);

        assert_eq!(pipeline.stage_names(), vec!["verify", "limit", "forward"]);

        let run = pipeline.execute(context()).await;
        assert_eq!(run.state, PipelineState::Forwarded);
        assert_eq!(run.response.status(), StatusCode::OK);
        assert_eq!(run.response.headers().get("x-stage").unwrap(), "forward");
    }

    #[tokio::test]
    async fn test_rejection_short_circuits() {
        let (verify, _) = stage("verify", PipelineState::Verified, || {
            StageOutcome::Reject(AppError::AuthMissing)
        });
        let (forward, forward_runs) = stage("forward", PipelineState::Forwarded, || {
            StageOutcome::Respond(StatusCode::OK.into_response())
        });
        let pipeline = Pipeline::new().with_stage(verify).with_stage(forward);

        let run = pipeline.execute(context()).await;
        assert_eq!(run.state, PipelineState::Rejected(RejectReason::Auth));
        assert_eq!(run.response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(forward_runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_headers_survive_rejection() {
        let (verify, _) = stage("verify", PipelineState::Verified, || StageOutcome::Continue);
        let (limit, _) = stage("limit", PipelineState::Admitted, || {
            StageOutcome::Reject(AppError::RateLimited { retry_after: 2 })
        });
        let pipeline = Pipeline::new().with_stage(verify).with_stage(limit);

        let run = pipeline.execute(context()).await;
        assert_eq!(run.state, PipelineState::Rejected(RejectReason::RateLimited));
        assert_eq!(run.response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(run.response.headers().get("x-stage").unwrap(), "limit");
        assert_eq!(run.response.headers().get("retry-after").unwrap(), "2");
    }

    #[tokio::test]
    async fn test_chain_without_response_is_internal_error() {
        let (verify, _) = stage("verify", PipelineState::Verified, || StageOutcome::Continue);
        let pipeline = Pipeline::new().with_stage(verify);

        let run = pipeline.execute(context()).await;
        assert_eq!(run.state, PipelineState::Rejected(RejectReason::Internal));
        assert_eq!(run.response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_reject_reasons() {
        assert_eq!(
            RejectReason::from_error(&AppError::limiter_unavailable("down")),
            RejectReason::LimiterError
        );
        assert_eq!(
            RejectReason::from_error(&AppError::downstream_unavailable("refused")),
            RejectReason::BadGateway
        );
        assert_eq!(
            PipelineState::Rejected(RejectReason::GatewayTimeout).to_string(),
            "REJECTED(gateway_timeout)"
        );
    }
}

// ============================================================================
// API Gateway
// ============================================================================
//
// Single entry point for client requests. Requests under the protected prefix
// run the admission pipeline:
// - JWT verification (caller identity)
// - Token bucket rate limiting per (identity, route)
// - Forwarding to the downstream service with x-user-id propagation
//
// Architecture:
// - Stateless: bucket and config state live in the Shared Token Store
// - Scales horizontally; every instance shares the same buckets
//
// ============================================================================

pub mod middleware;
pub mod pipeline;
pub mod router;
pub mod service_client;
pub mod stages;

pub use pipeline::{Pipeline, PipelineRun, PipelineState, RejectReason, RequestContext, Stage, StageOutcome};
pub use router::{GatewayRouter, GatewayState, create_router};
pub use service_client::ServiceClient;

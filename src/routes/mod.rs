// ============================================================================
// Axum Routes Module
// ============================================================================
//
// Handlers outside the protected-route pipeline.
//
// Structure:
// - auth.rs: token issuance
// - admin.rs: per-route rate config (GET / POST)
// - health.rs: liveness, readiness and metrics endpoints
//
// Router assembly lives in gateway::router.
//
// ============================================================================

pub mod admin;
pub mod auth;
pub mod health;

// ============================================================================
// Orders Service - mock downstream
// ============================================================================
//
// In-memory orders store behind the gateway. Trusts the x-user-id header set
// by the gateway and never verifies credentials itself.
//
// Endpoints:
// - GET /api/orders
// - POST /api/orders {item, amount}
// - GET /api/payments/{orderId}
// - anything else → 404
//
// ============================================================================

use anyhow::{Context, Result};
use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::get,
};
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_PORT: u16 = 3001;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct Order {
    id: u64,
    item: Value,
    amount: Value,
    status: &'static str,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct CreateOrderRequest {
    item: Option<Value>,
    amount: Option<Value>,
}

#[derive(Default)]
struct OrderBook {
    orders: Vec<Order>,
    next_id: u64,
}

struct OrdersState {
    book: Mutex<OrderBook>,
    simulate_latency: bool,
}

impl OrdersState {
    fn new(simulate_latency: bool) -> Self {
        Self {
            book: Mutex::new(OrderBook {
                orders: Vec::new(),
                next_id: 1,
            }),
            simulate_latency,
        }
    }

    async fn latency(&self, min_ms: u64, max_ms: u64) {
        if !self.simulate_latency {
            return;
        }
        let ms = rand::thread_rng().gen_range(min_ms..=max_ms);
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }
}

fn caller(headers: &HeaderMap) -> &str {
    headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("anonymous")
}

/// JSON truthiness: null, false, 0 and "" count as missing
fn is_present(value: &Option<Value>) -> bool {
    match value {
        None | Some(Value::Null) | Some(Value::Bool(false)) => false,
        Some(Value::Number(n)) => n.as_f64() != Some(0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(_) => true,
    }
}

async fn list_orders(
    State(state): State<Arc<OrdersState>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    state.latency(50, 250).await;

    let book = state.book.lock().await;
    info!(user_id = %caller(&headers), count = book.orders.len(), "GET /api/orders");

    Json(json!({
        "data": book.orders,
        "meta": { "count": book.orders.len(), "timestamp": Utc::now() },
    }))
}

async fn create_order(
    State(state): State<Arc<OrdersState>>,
    headers: HeaderMap,
    body: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> impl IntoResponse {
    state.latency(100, 400).await;

    let Ok(Json(request)) = body else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Item and amount required" })),
        );
    };
    if !is_present(&request.item) || !is_present(&request.amount) {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Item and amount required" })),
        );
    }

    let mut book = state.book.lock().await;
    let order = Order {
        id: book.next_id,
        item: request.item.unwrap_or(Value::Null),
        amount: request.amount.unwrap_or(Value::Null),
        status: "pending",
        created_at: Utc::now(),
    };
    book.next_id += 1;
    book.orders.push(order.clone());

    info!(user_id = %caller(&headers), order_id = order.id, "POST /api/orders");

    (StatusCode::CREATED, Json(json!(order)))
}

async fn payment_status(
    State(state): State<Arc<OrdersState>>,
    Path(order_id): Path<String>,
) -> impl IntoResponse {
    state.latency(100, 100).await;

    let book = state.book.lock().await;
    let order = order_id
        .parse::<u64>()
        .ok()
        .and_then(|id| book.orders.iter().find(|o| o.id == id));

    match order {
        Some(order) => (
            StatusCode::OK,
            Json(json!({
                "orderId": order.id,
                "status": "paid",
                "transactionId": format!("tx_{}_{}", Utc::now().timestamp_millis(), order.id),
                "amount": order.amount,
            })),
        ),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Order not found" })),
        ),
    }
}

async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "Endpoint not found on Backend Service" })),
    )
}

fn app(state: Arc<OrdersState>) -> Router {
    Router::new()
        .route("/api/orders", get(list_orders).post(create_order))
        .route("/api/payments/:order_id", get(payment_status))
        .fallback(not_found)
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let port = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(DEFAULT_PORT);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("Orders service running on {}", addr);

    axum::serve(listener, app(Arc::new(OrdersState::new(true))))
        .await
        .context("Failed to start server")?;

    Ok(())
}

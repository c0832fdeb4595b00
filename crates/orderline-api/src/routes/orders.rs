//! Routes for order creation and reads.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Json, Router, routing::get};
use orderline_core::error::PipelineError;
use orderline_core::order::{NewOrder, Order, Page};
use orderline_orders::domain::commands::CreateOrder;
use serde::Deserialize;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::OrderAppState;

/// Query parameters for GET /orders.
///
/// Kept as raw strings: values that do not parse fall back to the defaults.
#[derive(Debug, Default, Deserialize)]
pub struct ListOrdersQuery {
    /// Page size.
    pub limit: Option<String>,
    /// Rows to skip.
    pub offset: Option<String>,
}

impl ListOrdersQuery {
    fn page(&self) -> Page {
        let parse = |raw: &Option<String>| raw.as_deref().and_then(|v| v.trim().parse().ok());
        Page::clamped(parse(&self.limit), parse(&self.offset))
    }
}

/// POST /orders
#[instrument(skip(state, body))]
async fn create_order(
    State(state): State<OrderAppState>,
    body: Result<Json<NewOrder>, JsonRejection>,
) -> Result<(StatusCode, Json<Order>), ApiError> {
    let Json(request) =
        body.map_err(|rejection| PipelineError::validation("body", rejection.body_text()))?;

    let command = CreateOrder::new(Uuid::new_v4(), request);

    info!(
        correlation_id = %command.correlation_id,
        order_id = %command.order_id,
        "handling create_order command"
    );

    let order = state.pipeline.create_order(&command).await?;

    Ok((StatusCode::CREATED, Json(order)))
}

/// GET /orders/{id}
#[instrument(skip(state))]
async fn get_order(
    State(state): State<OrderAppState>,
    Path(id): Path<String>,
) -> Result<Json<Order>, ApiError> {
    let id: Uuid = id
        .parse()
        .map_err(|_| PipelineError::validation("id", "must be a UUID"))?;

    let order = state.pipeline.get_order(id).await?;
    Ok(Json(order))
}

/// GET /orders
#[instrument(skip(state))]
async fn list_orders(
    State(state): State<OrderAppState>,
    Query(query): Query<ListOrdersQuery>,
) -> Result<Json<Vec<Order>>, ApiError> {
    let orders = state.pipeline.list_orders(query.page()).await?;
    Ok(Json(orders))
}

/// Returns the orders router.
pub fn router() -> Router<OrderAppState> {
    Router::new()
        .route("/", get(list_orders).post(create_order))
        .route("/{id}", get(get_order))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(limit: Option<&str>, offset: Option<&str>) -> ListOrdersQuery {
        ListOrdersQuery {
            limit: limit.map(str::to_owned),
            offset: offset.map(str::to_owned),
        }
    }

    #[test]
    fn test_unparseable_paging_falls_back_to_defaults() {
        assert_eq!(query(Some("ten"), Some("x")).page(), Page::default());
        assert_eq!(query(None, None).page(), Page::default());
    }

    #[test]
    fn test_paging_is_clamped() {
        assert_eq!(
            query(Some("1000"), Some("5")).page(),
            Page { limit: 100, offset: 5 }
        );
        assert_eq!(query(Some(" 3 "), Some("-1")).page(), Page { limit: 3, offset: 0 });
    }
}

//! Integration tests for `PgMetricRepository`.

use chrono::Utc;
use orderline_core::metric::{AggregateMetric, MetricTotals};
use orderline_core::repository::MetricRepository;
use orderline_store::pg_metric_repository::PgMetricRepository;
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

fn make_metric(order_id: Uuid, cents: i64) -> AggregateMetric {
    AggregateMetric {
        order_id,
        customer_id: "customer-123".to_owned(),
        product_id: "product-456".to_owned(),
        quantity: 1,
        total_amount: Decimal::new(cents, 2),
        processed_at: Utc::now(),
    }
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_totals_are_zero_on_empty_table(pool: PgPool) {
    let repo = PgMetricRepository::new(pool);

    let totals = repo.totals().await.unwrap();

    assert_eq!(totals, MetricTotals::default());
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_append_accumulates_totals(pool: PgPool) {
    let repo = PgMetricRepository::new(pool);

    let first = repo.append(&make_metric(Uuid::new_v4(), 9999)).await.unwrap();
    let second = repo.append(&make_metric(Uuid::new_v4(), 1)).await.unwrap();

    assert!(second > first);
    let totals = repo.totals().await.unwrap();
    assert_eq!(totals.count, 2);
    assert_eq!(totals.revenue, Decimal::new(10000, 2));
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_append_does_not_deduplicate_by_order_id(pool: PgPool) {
    let repo = PgMetricRepository::new(pool);
    let order_id = Uuid::new_v4();

    repo.append(&make_metric(order_id, 9999)).await.unwrap();
    repo.append(&make_metric(order_id, 9999)).await.unwrap();

    assert_eq!(repo.totals().await.unwrap().count, 2);
}

//! Stock ledger: the authoritative per-product unit count.
//!
//! All oversell protection in the system reduces to the conditional update in
//! [`decrement_if_available`]. The check and the write are one statement, so
//! the database serializes concurrent callers on the product row and exactly
//! one of two racers for the last unit sees a row affected.

use sqlx::PgExecutor;
use uuid::Uuid;

use crate::error::AppResult;

/// Attempt to take `quantity` units off a product's stock. Returns false when
/// the product is unknown or holds fewer units than requested; the caller
/// must treat that as a hard failure for the line, never a partial success.
pub async fn decrement_if_available(
    executor: impl PgExecutor<'_>,
    product_id: Uuid,
    quantity: i32,
) -> AppResult<bool> {
    let result = sqlx::query(
        r#"
        UPDATE products
        SET stock_quantity = stock_quantity - $2, updated_at = NOW()
        WHERE id = $1 AND stock_quantity >= $2
        "#,
    )
    .bind(product_id)
    .bind(quantity)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Compensating increment, used when a pending order is cancelled.
pub async fn restock(
    executor: impl PgExecutor<'_>,
    product_id: Uuid,
    quantity: i32,
) -> AppResult<()> {
    sqlx::query(
        "UPDATE products SET stock_quantity = stock_quantity + $2, updated_at = NOW() WHERE id = $1",
    )
    .bind(product_id)
    .bind(quantity)
    .execute(executor)
    .await?;

    Ok(())
}

/// Current stock for a product, for shortage messages. None if the product
/// does not exist.
pub async fn remaining(
    executor: impl PgExecutor<'_>,
    product_id: Uuid,
) -> AppResult<Option<i32>> {
    let row: Option<(i32,)> =
        sqlx::query_as("SELECT stock_quantity FROM products WHERE id = $1")
            .bind(product_id)
            .fetch_optional(executor)
            .await?;

    Ok(row.map(|(stock,)| stock))
}

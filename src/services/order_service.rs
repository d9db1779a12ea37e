use uuid::Uuid;

use crate::{
    audit::log_audit,
    db::DbPool,
    dto::orders::{OrderList, OrderPlaced, OrderWithItems, PlaceOrderRequest},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Order, OrderItem, OrderStatus},
    response::{ApiResponse, Meta},
    routes::params::OrderListQuery,
    services::stock,
};

/// Convert a validated line list into a persisted order, all or nothing.
///
/// The whole sequence runs in one transaction: order insert, one conditional
/// stock decrement per line, one order-item insert per line, cart wipe. Any
/// failure returns early and drops the transaction, which rolls everything
/// back and releases the connection to the pool. Nothing slow or external
/// happens between `begin` and `commit`.
pub async fn place_order(
    pool: &DbPool,
    user: &AuthUser,
    payload: PlaceOrderRequest,
) -> AppResult<ApiResponse<OrderPlaced>> {
    payload.validate()?;

    let mut txn = pool.begin().await?;

    // The catalog price read inside the transaction is the only trusted
    // figure; the client-supplied price is an optimistic-UI hint and a
    // mismatch means the customer saw a stale page.
    let mut lines: Vec<(Uuid, String, i64, i32)> = Vec::with_capacity(payload.items.len());
    let mut total_amount: i64 = 0;
    for line in &payload.items {
        let row: Option<(String, i64)> =
            sqlx::query_as("SELECT name, price FROM products WHERE id = $1")
                .bind(line.product_id)
                .fetch_optional(&mut *txn)
                .await?;
        let (name, catalog_price) = match row {
            Some(r) => r,
            None => {
                return Err(AppError::BadRequest(format!(
                    "Product {} does not exist",
                    line.product_id
                )));
            }
        };

        if line.price != catalog_price {
            return Err(AppError::Conflict(format!(
                "Price for {} has changed (now {})",
                name, catalog_price
            )));
        }

        total_amount += catalog_price * i64::from(line.quantity);
        lines.push((line.product_id, name, catalog_price, line.quantity));
    }

    let order: Order = sqlx::query_as(
        "INSERT INTO orders (user_id, total_amount) VALUES ($1, $2) RETURNING *",
    )
    .bind(user.user_id)
    .bind(total_amount)
    .fetch_one(&mut *txn)
    .await?;

    for (product_id, name, price, quantity) in &lines {
        if !stock::decrement_if_available(&mut *txn, *product_id, *quantity).await? {
            let remaining = stock::remaining(&mut *txn, *product_id).await?.unwrap_or(0);
            return Err(AppError::InsufficientStock {
                product: name.clone(),
                remaining,
            });
        }

        sqlx::query(
            r#"
            INSERT INTO order_items (order_id, product_id, quantity, price_at_order)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(order.id)
        .bind(product_id)
        .bind(quantity)
        .bind(price)
        .execute(&mut *txn)
        .await?;
    }

    // The cart was only ever a draft of this order.
    sqlx::query("DELETE FROM cart_items WHERE user_id = $1")
        .bind(user.user_id)
        .execute(&mut *txn)
        .await?;

    txn.commit().await?;

    if let Err(err) = log_audit(
        pool,
        Some(user.user_id),
        "order_placed",
        Some("orders"),
        Some(serde_json::json!({ "order_id": order.id, "total_amount": total_amount })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Order placed",
        OrderPlaced {
            order_id: order.id,
            total_amount,
        },
        None,
    ))
}

pub async fn list_orders(
    pool: &DbPool,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let (page, limit, offset) = query.pagination.normalize();

    let items = sqlx::query_as::<_, Order>(
        r#"
        SELECT * FROM orders
        WHERE user_id = $1 AND ($2::order_status IS NULL OR status = $2)
        ORDER BY created_at DESC
        LIMIT $3 OFFSET $4
        "#,
    )
    .bind(user.user_id)
    .bind(query.status)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    let total: (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM orders WHERE user_id = $1 AND ($2::order_status IS NULL OR status = $2)",
    )
    .bind(user.user_id)
    .bind(query.status)
    .fetch_one(pool)
    .await?;

    let meta = Meta::new(page, limit, total.0);
    Ok(ApiResponse::success("Ok", OrderList { items }, Some(meta)))
}

pub async fn get_order(
    pool: &DbPool,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let order = sqlx::query_as::<_, Order>(
        "SELECT * FROM orders WHERE id = $1 AND user_id = $2",
    )
    .bind(id)
    .bind(user.user_id)
    .fetch_optional(pool)
    .await?;
    let order = match order {
        Some(o) => o,
        None => return Err(AppError::NotFound),
    };

    let items = sqlx::query_as::<_, OrderItem>(
        "SELECT * FROM order_items WHERE order_id = $1 ORDER BY created_at",
    )
    .bind(order.id)
    .fetch_all(pool)
    .await?;

    Ok(ApiResponse::success(
        "OK",
        OrderWithItems { order, items },
        Some(Meta::empty()),
    ))
}

/// Customer-side cancellation. Only a pending order can be cancelled, and the
/// reserved units go back on the shelf inside the same transaction.
pub async fn cancel_order(
    pool: &DbPool,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Order>> {
    let mut txn = pool.begin().await?;

    let order = sqlx::query_as::<_, Order>(
        "SELECT * FROM orders WHERE id = $1 AND user_id = $2 FOR UPDATE",
    )
    .bind(id)
    .bind(user.user_id)
    .fetch_optional(&mut *txn)
    .await?;
    let order = match order {
        Some(o) => o,
        None => return Err(AppError::NotFound),
    };

    if !order.status.can_transition_to(OrderStatus::Cancelled) {
        return Err(AppError::Conflict(format!(
            "Order is already {} and cannot be cancelled",
            order.status
        )));
    }

    let items = sqlx::query_as::<_, OrderItem>(
        "SELECT * FROM order_items WHERE order_id = $1",
    )
    .bind(order.id)
    .fetch_all(&mut *txn)
    .await?;

    for item in &items {
        stock::restock(&mut *txn, item.product_id, item.quantity).await?;
    }

    let order = sqlx::query_as::<_, Order>(
        "UPDATE orders SET status = 'cancelled', updated_at = NOW() WHERE id = $1 RETURNING *",
    )
    .bind(order.id)
    .fetch_one(&mut *txn)
    .await?;

    txn.commit().await?;

    if let Err(err) = log_audit(
        pool,
        Some(user.user_id),
        "order_cancelled",
        Some("orders"),
        Some(serde_json::json!({ "order_id": order.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success("Order cancelled", order, Some(Meta::empty())))
}

use uuid::Uuid;

use crate::{
    audit::log_audit,
    db::DbPool,
    dto::{
        orders::{OrderList, OrderWithItems},
        products::ProductList,
        users::{AdminUpdateUserRequest, UserList},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{Order, OrderItem, OrderStatus, Product, User},
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, SortOrder, UserListQuery},
    services::stock,
};

pub async fn list_users(
    pool: &DbPool,
    user: &AuthUser,
    query: UserListQuery,
) -> AppResult<ApiResponse<UserList>> {
    ensure_admin(user)?;
    let (page, limit, offset) = query.pagination.normalize();
    let search = query.search.as_ref().filter(|s| !s.is_empty());
    // role=admin|user, status=active|inactive; anything else means no filter.
    let admin_filter = match query.role.as_deref() {
        Some("admin") => Some(true),
        Some("user") => Some(false),
        _ => None,
    };
    let active_filter = match query.status.as_deref() {
        Some("active") => Some(true),
        Some("inactive") => Some(false),
        _ => None,
    };

    let items = sqlx::query_as::<_, User>(
        r#"
        SELECT * FROM users
        WHERE ($1::text IS NULL OR login_id ILIKE '%' || $1 || '%'
               OR email ILIKE '%' || $1 || '%' OR username ILIKE '%' || $1 || '%')
          AND ($2::boolean IS NULL OR is_admin = $2)
          AND ($3::boolean IS NULL OR is_active = $3)
        ORDER BY created_at DESC
        LIMIT $4 OFFSET $5
        "#,
    )
    .bind(search)
    .bind(admin_filter)
    .bind(active_filter)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    let total: (i64,) = sqlx::query_as(
        r#"
        SELECT COUNT(*) FROM users
        WHERE ($1::text IS NULL OR login_id ILIKE '%' || $1 || '%'
               OR email ILIKE '%' || $1 || '%' OR username ILIKE '%' || $1 || '%')
          AND ($2::boolean IS NULL OR is_admin = $2)
          AND ($3::boolean IS NULL OR is_active = $3)
        "#,
    )
    .bind(search)
    .bind(admin_filter)
    .bind(active_filter)
    .fetch_one(pool)
    .await?;

    let meta = Meta::new(page, limit, total.0);
    Ok(ApiResponse::success("Users", UserList { items }, Some(meta)))
}

pub async fn get_user(pool: &DbPool, user: &AuthUser, id: Uuid) -> AppResult<ApiResponse<User>> {
    ensure_admin(user)?;
    let row = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    match row {
        Some(u) => Ok(ApiResponse::success("User", u, None)),
        None => Err(AppError::NotFound),
    }
}

pub async fn update_user(
    pool: &DbPool,
    user: &AuthUser,
    id: Uuid,
    payload: AdminUpdateUserRequest,
) -> AppResult<ApiResponse<User>> {
    ensure_admin(user)?;

    let existing = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    let existing = match existing {
        Some(u) => u,
        None => return Err(AppError::NotFound),
    };

    let updated = sqlx::query_as::<_, User>(
        r#"
        UPDATE users
        SET username = $2, email = $3, phone_number = $4, address = $5,
            is_admin = $6, is_active = $7, updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(payload.username.or(existing.username))
    .bind(payload.email.unwrap_or(existing.email))
    .bind(payload.phone_number.or(existing.phone_number))
    .bind(payload.address.or(existing.address))
    .bind(payload.is_admin.unwrap_or(existing.is_admin))
    .bind(payload.is_active.unwrap_or(existing.is_active))
    .fetch_one(pool)
    .await
    .map_err(|err| match &err {
        sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505") => {
            AppError::Conflict("Email is already registered".into())
        }
        _ => AppError::DbError(err),
    })?;

    if let Err(err) = log_audit(
        pool,
        Some(user.user_id),
        "admin_user_update",
        Some("users"),
        Some(serde_json::json!({ "target_user_id": id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success("User updated", updated, Some(Meta::empty())))
}

pub async fn delete_user(
    pool: &DbPool,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_admin(user)?;

    let result = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }

    Ok(ApiResponse::success(
        "User deleted",
        serde_json::json!({ "deleted_id": id }),
        Some(Meta::empty()),
    ))
}

pub async fn list_all_orders(
    pool: &DbPool,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    ensure_admin(user)?;
    let (page, limit, offset) = query.pagination.normalize();
    let sort = query.sort_order.unwrap_or(SortOrder::Desc);

    let sql = format!(
        r#"
        SELECT * FROM orders
        WHERE ($1::order_status IS NULL OR status = $1)
        ORDER BY created_at {}
        LIMIT $2 OFFSET $3
        "#,
        sort.as_sql()
    );
    let items = sqlx::query_as::<_, Order>(&sql)
        .bind(query.status)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

    let total: (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM orders WHERE ($1::order_status IS NULL OR status = $1)")
            .bind(query.status)
            .fetch_one(pool)
            .await?;

    let meta = Meta::new(page, limit, total.0);
    Ok(ApiResponse::success("Orders", OrderList { items }, Some(meta)))
}

pub async fn get_order_admin(
    pool: &DbPool,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    ensure_admin(user)?;

    let order = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1")
        .bind(id)
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
        "Order found",
        OrderWithItems { order, items },
        Some(Meta::empty()),
    ))
}

/// Admin status change, gated on the order transition table. Moving an order
/// to cancelled also returns its reserved units to stock, in the same
/// transaction as the status write.
pub async fn update_order_status(
    pool: &DbPool,
    user: &AuthUser,
    id: Uuid,
    status: OrderStatus,
) -> AppResult<ApiResponse<Order>> {
    ensure_admin(user)?;

    let mut txn = pool.begin().await?;

    let order = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut *txn)
        .await?;
    let order = match order {
        Some(o) => o,
        None => return Err(AppError::NotFound),
    };

    if !order.status.can_transition_to(status) {
        return Err(AppError::Conflict(format!(
            "Cannot move order from {} to {}",
            order.status, status
        )));
    }

    if status == OrderStatus::Cancelled {
        let items = sqlx::query_as::<_, OrderItem>(
            "SELECT * FROM order_items WHERE order_id = $1",
        )
        .bind(order.id)
        .fetch_all(&mut *txn)
        .await?;
        for item in &items {
            stock::restock(&mut *txn, item.product_id, item.quantity).await?;
        }
    }

    let order = sqlx::query_as::<_, Order>(
        "UPDATE orders SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
    )
    .bind(order.id)
    .bind(status)
    .fetch_one(&mut *txn)
    .await?;

    txn.commit().await?;

    if let Err(err) = log_audit(
        pool,
        Some(user.user_id),
        "order_status_update",
        Some("orders"),
        Some(serde_json::json!({ "order_id": order.id, "status": order.status })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success("Order updated", order, Some(Meta::empty())))
}

pub async fn delete_order(
    pool: &DbPool,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_admin(user)?;

    let result = sqlx::query("DELETE FROM orders WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }

    Ok(ApiResponse::success(
        "Order deleted",
        serde_json::json!({ "deleted_id": id }),
        Some(Meta::empty()),
    ))
}

pub async fn list_low_stock(
    pool: &DbPool,
    user: &AuthUser,
    threshold: Option<i32>,
) -> AppResult<ApiResponse<ProductList>> {
    ensure_admin(user)?;
    let threshold = threshold.unwrap_or(5);

    let items = sqlx::query_as::<_, Product>(
        "SELECT * FROM products WHERE stock_quantity <= $1 ORDER BY stock_quantity ASC, created_at DESC",
    )
    .bind(threshold)
    .fetch_all(pool)
    .await?;

    Ok(ApiResponse::success(
        "Low stock",
        ProductList { items },
        Some(Meta::empty()),
    ))
}

/// Relative stock adjustment. Decrements reuse the ledger's conditional
/// update, so the quantity can never be pushed below zero by a race.
pub async fn adjust_inventory(
    pool: &DbPool,
    user: &AuthUser,
    id: Uuid,
    delta: i32,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(user)?;
    if delta == 0 {
        return Err(AppError::BadRequest("delta must not be 0".into()));
    }

    let mut txn = pool.begin().await?;

    if delta > 0 {
        stock::restock(&mut *txn, id, delta).await?;
    } else if !stock::decrement_if_available(&mut *txn, id, -delta).await? {
        let remaining = stock::remaining(&mut *txn, id).await?;
        let remaining = match remaining {
            Some(r) => r,
            None => return Err(AppError::NotFound),
        };
        return Err(AppError::BadRequest(format!(
            "Cannot remove {} units; only {} in stock",
            -delta, remaining
        )));
    }

    let product = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1")
        .bind(id)
        .fetch_optional(&mut *txn)
        .await?;
    let product = match product {
        Some(p) => p,
        None => return Err(AppError::NotFound),
    };

    txn.commit().await?;

    if let Err(err) = log_audit(
        pool,
        Some(user.user_id),
        "inventory_adjust",
        Some("products"),
        Some(serde_json::json!({ "product_id": id, "delta": delta })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Inventory updated",
        product,
        Some(Meta::empty()),
    ))
}

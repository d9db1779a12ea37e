use uuid::Uuid;

use crate::{
    audit::log_audit,
    db::DbPool,
    dto::reservations::{
        CancelReservationRequest, CreateReservationRequest, ReservationList,
        ReservationLookupQuery, UpdateReservationStatusRequest,
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{Reservation, ReservationStatus},
    response::{ApiResponse, Meta},
    routes::params::ReservationListQuery,
};

/// Public booking: no account required, pending by default. Foreign-key
/// violations on the optional user/product references surface as 400s.
pub async fn create_reservation(
    pool: &DbPool,
    payload: CreateReservationRequest,
) -> AppResult<ApiResponse<Reservation>> {
    payload.validate()?;

    let reservation = sqlx::query_as::<_, Reservation>(
        r#"
        INSERT INTO reservations
            (user_id, product_id, customer_name, phone_number,
             reservation_date, reservation_time, num_participants, notes)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING *
        "#,
    )
    .bind(payload.user_id)
    .bind(payload.product_id)
    .bind(payload.customer_name.trim())
    .bind(payload.phone_number.trim())
    .bind(payload.reservation_date)
    .bind(payload.reservation_time)
    .bind(payload.num_participants)
    .bind(payload.notes)
    .fetch_one(pool)
    .await
    .map_err(map_fk_violation)?;

    if let Err(err) = log_audit(
        pool,
        payload.user_id,
        "reservation_created",
        Some("reservations"),
        Some(serde_json::json!({ "reservation_id": reservation.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Reservation created",
        reservation,
        None,
    ))
}

/// Guest lookup by the stored name + phone pair.
pub async fn lookup_reservations(
    pool: &DbPool,
    query: ReservationLookupQuery,
) -> AppResult<ApiResponse<ReservationList>> {
    if query.customer_name.trim().is_empty() || query.phone_number.trim().is_empty() {
        return Err(AppError::BadRequest(
            "Both customer name and phone number are required".into(),
        ));
    }

    let items = sqlx::query_as::<_, Reservation>(
        r#"
        SELECT * FROM reservations
        WHERE customer_name = $1 AND phone_number = $2
        ORDER BY reservation_date DESC, reservation_time DESC
        "#,
    )
    .bind(query.customer_name.trim())
    .bind(query.phone_number.trim())
    .fetch_all(pool)
    .await?;

    if items.is_empty() {
        return Err(AppError::NotFound);
    }

    Ok(ApiResponse::success(
        "OK",
        ReservationList { items },
        Some(Meta::empty()),
    ))
}

/// A signed-in user may only read their own reservations.
pub async fn list_user_reservations(
    pool: &DbPool,
    user: &AuthUser,
    user_id: Uuid,
) -> AppResult<ApiResponse<ReservationList>> {
    if user.user_id != user_id && !user.is_admin {
        return Err(AppError::Forbidden);
    }

    let items = sqlx::query_as::<_, Reservation>(
        r#"
        SELECT * FROM reservations
        WHERE user_id = $1
        ORDER BY reservation_date DESC, reservation_time DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(ApiResponse::success(
        "OK",
        ReservationList { items },
        Some(Meta::empty()),
    ))
}

pub async fn get_reservation(pool: &DbPool, id: Uuid) -> AppResult<ApiResponse<Reservation>> {
    let reservation = sqlx::query_as::<_, Reservation>("SELECT * FROM reservations WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    match reservation {
        Some(r) => Ok(ApiResponse::success("OK", r, None)),
        None => Err(AppError::NotFound),
    }
}

/// Guest self-cancellation. The stored name + phone pair acts as the
/// capability token: a mismatch is indistinguishable from a missing
/// reservation on purpose, so the endpoint cannot be used to probe bookings.
pub async fn cancel_by_customer(
    pool: &DbPool,
    id: Uuid,
    payload: CancelReservationRequest,
) -> AppResult<ApiResponse<Reservation>> {
    if payload.customer_name.trim().is_empty() || payload.phone_number.trim().is_empty() {
        return Err(AppError::BadRequest(
            "Customer name and phone number are required to cancel".into(),
        ));
    }

    let mut txn = pool.begin().await?;

    let reservation = sqlx::query_as::<_, Reservation>(
        r#"
        SELECT * FROM reservations
        WHERE id = $1 AND customer_name = $2 AND phone_number = $3
        FOR UPDATE
        "#,
    )
    .bind(id)
    .bind(payload.customer_name.trim())
    .bind(payload.phone_number.trim())
    .fetch_optional(&mut *txn)
    .await?;
    let reservation = match reservation {
        Some(r) => r,
        None => return Err(AppError::NotFound),
    };

    check_transition(reservation.status, ReservationStatus::Cancelled)?;

    let reservation = sqlx::query_as::<_, Reservation>(
        "UPDATE reservations SET status = 'cancelled', updated_at = NOW() WHERE id = $1 RETURNING *",
    )
    .bind(reservation.id)
    .fetch_one(&mut *txn)
    .await?;

    txn.commit().await?;

    Ok(ApiResponse::success(
        "Reservation cancelled",
        reservation,
        Some(Meta::empty()),
    ))
}

pub async fn list_reservations_admin(
    pool: &DbPool,
    user: &AuthUser,
    query: ReservationListQuery,
) -> AppResult<ApiResponse<ReservationList>> {
    ensure_admin(user)?;
    let (page, limit, offset) = query.pagination.normalize();
    let search = query.search.as_ref().filter(|s| !s.is_empty());

    let items = sqlx::query_as::<_, Reservation>(
        r#"
        SELECT * FROM reservations
        WHERE ($1::text IS NULL OR customer_name ILIKE '%' || $1 || '%' OR id::text ILIKE '%' || $1 || '%')
          AND ($2::date IS NULL OR reservation_date = $2)
          AND ($3::reservation_status IS NULL OR status = $3)
        ORDER BY created_at DESC
        LIMIT $4 OFFSET $5
        "#,
    )
    .bind(search)
    .bind(query.date)
    .bind(query.status)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    let total: (i64,) = sqlx::query_as(
        r#"
        SELECT COUNT(*) FROM reservations
        WHERE ($1::text IS NULL OR customer_name ILIKE '%' || $1 || '%' OR id::text ILIKE '%' || $1 || '%')
          AND ($2::date IS NULL OR reservation_date = $2)
          AND ($3::reservation_status IS NULL OR status = $3)
        "#,
    )
    .bind(search)
    .bind(query.date)
    .bind(query.status)
    .fetch_one(pool)
    .await?;

    let meta = Meta::new(page, limit, total.0);
    Ok(ApiResponse::success(
        "Reservations",
        ReservationList { items },
        Some(meta),
    ))
}

/// Administrative status change. Bypasses the name/phone check but still
/// goes through the same transition table as everyone else.
pub async fn update_status_admin(
    pool: &DbPool,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateReservationStatusRequest,
) -> AppResult<ApiResponse<Reservation>> {
    ensure_admin(user)?;

    let mut txn = pool.begin().await?;

    let reservation = sqlx::query_as::<_, Reservation>(
        "SELECT * FROM reservations WHERE id = $1 FOR UPDATE",
    )
    .bind(id)
    .fetch_optional(&mut *txn)
    .await?;
    let reservation = match reservation {
        Some(r) => r,
        None => return Err(AppError::NotFound),
    };

    check_transition(reservation.status, payload.status)?;

    let reservation = sqlx::query_as::<_, Reservation>(
        "UPDATE reservations SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
    )
    .bind(reservation.id)
    .bind(payload.status)
    .fetch_one(&mut *txn)
    .await?;

    txn.commit().await?;

    if let Err(err) = log_audit(
        pool,
        Some(user.user_id),
        "reservation_status_update",
        Some("reservations"),
        Some(serde_json::json!({ "reservation_id": reservation.id, "status": reservation.status })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Reservation updated",
        reservation,
        Some(Meta::empty()),
    ))
}

pub async fn delete_reservation_admin(
    pool: &DbPool,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_admin(user)?;

    let result = sqlx::query("DELETE FROM reservations WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }

    if let Err(err) = log_audit(
        pool,
        Some(user.user_id),
        "reservation_deleted",
        Some("reservations"),
        Some(serde_json::json!({ "reservation_id": id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Reservation deleted",
        serde_json::json!({ "deleted_id": id }),
        Some(Meta::empty()),
    ))
}

/// Single gate for every status write. Terminal states reject all exits with
/// an error naming the current state, never a silent no-op.
fn check_transition(from: ReservationStatus, to: ReservationStatus) -> Result<(), AppError> {
    if from.is_terminal() {
        return Err(AppError::Conflict(format!(
            "Reservation is already {} and cannot change status",
            from
        )));
    }
    if !from.can_transition_to(to) {
        return Err(AppError::Conflict(format!(
            "Cannot move reservation from {} to {}",
            from, to
        )));
    }
    Ok(())
}

fn map_fk_violation(err: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.code().as_deref() == Some("23503") {
            return AppError::BadRequest(
                "Referenced user or product does not exist".into(),
            );
        }
    }
    AppError::DbError(err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states_are_rejected_with_current_state_named() {
        let err = check_transition(ReservationStatus::Completed, ReservationStatus::Cancelled)
            .unwrap_err();
        assert!(err.to_string().contains("completed"));

        let err = check_transition(ReservationStatus::Cancelled, ReservationStatus::Pending)
            .unwrap_err();
        assert!(err.to_string().contains("cancelled"));
    }

    #[test]
    fn disallowed_forward_jumps_are_rejected() {
        assert!(check_transition(ReservationStatus::Pending, ReservationStatus::Completed).is_err());
        assert!(check_transition(ReservationStatus::Pending, ReservationStatus::Confirmed).is_ok());
        assert!(check_transition(ReservationStatus::Confirmed, ReservationStatus::Completed).is_ok());
    }
}

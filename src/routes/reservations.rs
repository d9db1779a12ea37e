use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, put},
};
use uuid::Uuid;

use crate::{
    db::DbPool,
    dto::reservations::{
        CancelReservationRequest, CreateReservationRequest, ReservationList,
        ReservationLookupQuery, UpdateReservationStatusRequest,
    },
    error::AppResult,
    middleware::auth::AuthUser,
    models::Reservation,
    response::ApiResponse,
    routes::params::ReservationListQuery,
    services::reservation_service,
};

pub fn router() -> Router<DbPool> {
    Router::new()
        .route("/", get(list_reservations_admin).post(create_reservation))
        .route("/lookup", get(lookup_reservations))
        .route("/user/{user_id}", get(list_user_reservations))
        .route("/{id}", get(get_reservation).delete(delete_reservation))
        .route("/{id}/cancel", put(cancel_reservation))
        .route("/{id}/status", put(update_reservation_status))
}

#[utoipa::path(
    post,
    path = "/api/reservations",
    request_body = CreateReservationRequest,
    responses(
        (status = 201, description = "Reservation created", body = ApiResponse<Reservation>),
        (status = 400, description = "Missing name or phone, or bad references"),
    ),
    tag = "Reservations"
)]
pub async fn create_reservation(
    State(pool): State<DbPool>,
    Json(payload): Json<CreateReservationRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<Reservation>>)> {
    let resp = reservation_service::create_reservation(&pool, payload).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    get,
    path = "/api/reservations/lookup",
    params(
        ("customer_name" = String, Query, description = "Name given at booking"),
        ("phone_number" = String, Query, description = "Phone given at booking"),
    ),
    responses(
        (status = 200, description = "Reservations matching name and phone", body = ApiResponse<ReservationList>),
        (status = 404, description = "No match"),
    ),
    tag = "Reservations"
)]
pub async fn lookup_reservations(
    State(pool): State<DbPool>,
    Query(query): Query<ReservationLookupQuery>,
) -> AppResult<Json<ApiResponse<ReservationList>>> {
    let resp = reservation_service::lookup_reservations(&pool, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/reservations/user/{user_id}",
    params(
        ("user_id" = Uuid, Path, description = "Account whose reservations to list")
    ),
    responses(
        (status = 200, description = "Reservations for the account", body = ApiResponse<ReservationList>),
        (status = 403, description = "Not your account"),
    ),
    security(("bearer_auth" = [])),
    tag = "Reservations"
)]
pub async fn list_user_reservations(
    State(pool): State<DbPool>,
    user: AuthUser,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<ReservationList>>> {
    let resp = reservation_service::list_user_reservations(&pool, &user, user_id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/reservations/{id}",
    params(
        ("id" = Uuid, Path, description = "Reservation ID")
    ),
    responses(
        (status = 200, description = "Reservation", body = ApiResponse<Reservation>),
        (status = 404, description = "Not found"),
    ),
    tag = "Reservations"
)]
pub async fn get_reservation(
    State(pool): State<DbPool>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Reservation>>> {
    let resp = reservation_service::get_reservation(&pool, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    put,
    path = "/api/reservations/{id}/cancel",
    params(
        ("id" = Uuid, Path, description = "Reservation ID")
    ),
    request_body = CancelReservationRequest,
    responses(
        (status = 200, description = "Reservation cancelled", body = ApiResponse<Reservation>),
        (status = 404, description = "No reservation with that id, name and phone"),
        (status = 409, description = "Reservation is no longer cancellable"),
    ),
    tag = "Reservations"
)]
pub async fn cancel_reservation(
    State(pool): State<DbPool>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CancelReservationRequest>,
) -> AppResult<Json<ApiResponse<Reservation>>> {
    let resp = reservation_service::cancel_by_customer(&pool, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/reservations",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20"),
        ("search" = Option<String>, Query, description = "Match against customer name or phone"),
        ("date" = Option<String>, Query, description = "Filter by reservation date (YYYY-MM-DD)"),
        ("status" = Option<String>, Query, description = "Filter by status"),
    ),
    responses(
        (status = 200, description = "All reservations", body = ApiResponse<ReservationList>),
        (status = 403, description = "Admin only"),
    ),
    security(("bearer_auth" = [])),
    tag = "Reservations"
)]
pub async fn list_reservations_admin(
    State(pool): State<DbPool>,
    user: AuthUser,
    Query(query): Query<ReservationListQuery>,
) -> AppResult<Json<ApiResponse<ReservationList>>> {
    let resp = reservation_service::list_reservations_admin(&pool, &user, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    put,
    path = "/api/reservations/{id}/status",
    params(
        ("id" = Uuid, Path, description = "Reservation ID")
    ),
    request_body = UpdateReservationStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = ApiResponse<Reservation>),
        (status = 403, description = "Admin only"),
        (status = 409, description = "Transition not allowed"),
    ),
    security(("bearer_auth" = [])),
    tag = "Reservations"
)]
pub async fn update_reservation_status(
    State(pool): State<DbPool>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateReservationStatusRequest>,
) -> AppResult<Json<ApiResponse<Reservation>>> {
    let resp = reservation_service::update_status_admin(&pool, &user, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/reservations/{id}",
    params(
        ("id" = Uuid, Path, description = "Reservation ID")
    ),
    responses(
        (status = 200, description = "Reservation deleted"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Reservations"
)]
pub async fn delete_reservation(
    State(pool): State<DbPool>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = reservation_service::delete_reservation_admin(&pool, &user, id).await?;
    Ok(Json(resp))
}

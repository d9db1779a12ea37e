use axum::{Json, Router, extract::State, routing::get};

use crate::{
    db::DbPool,
    dto::products::CategoryList,
    error::AppResult,
    response::ApiResponse,
    services::product_service,
};

pub fn router() -> Router<DbPool> {
    Router::new().route("/", get(list_categories))
}

#[utoipa::path(
    get,
    path = "/api/categories",
    responses(
        (status = 200, description = "List categories", body = ApiResponse<CategoryList>)
    ),
    tag = "Products"
)]
pub async fn list_categories(
    State(pool): State<DbPool>,
) -> AppResult<Json<ApiResponse<CategoryList>>> {
    let resp = product_service::list_categories(&pool).await?;
    Ok(Json(resp))
}

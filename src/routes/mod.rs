use axum::Router;

use crate::db::DbPool;

pub mod admin;
pub mod auth;
pub mod cart;
pub mod categories;
pub mod doc;
pub mod health;
pub mod orders;
pub mod params;
pub mod products;
pub mod reservations;
pub mod users;

// Build the API router without binding state; it is provided at the top level.
pub fn create_api_router() -> Router<DbPool> {
    Router::new()
        .nest("/products", products::router())
        .nest("/categories", categories::router())
        .nest("/auth", auth::router())
        .nest("/user", users::router())
        .nest("/cart", cart::router())
        .nest("/orders", orders::router())
        .nest("/reservations", reservations::router())
        .nest("/admin", admin::router())
}

use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        auth::{LoginRequest, LoginResponse, RegisterRequest},
        cart::{AddToCartRequest, CartItemDto, CartList, UpdateCartQuantityRequest},
        orders::{
            OrderList, OrderPlaced, OrderWithItems, PlaceOrderRequest, UpdateOrderStatusRequest,
        },
        products::{
            AdjustInventoryRequest, CategoryList, CreateCategoryRequest, CreateProductRequest,
            ProductList, ProductStatusRequest, UpdateProductRequest,
        },
        reservations::{
            CancelReservationRequest, CreateReservationRequest, ReservationList,
            UpdateReservationStatusRequest,
        },
        users::{AdminUpdateUserRequest, UpdateProfileRequest, UserList},
    },
    models::{
        CartItem, Category, Order, OrderItem, OrderStatus, Product, Reservation,
        ReservationStatus, User,
    },
    response::{ApiResponse, Meta},
    routes::{
        admin, auth, cart, categories, health, orders, products as product_routes, reservations,
        users,
    },
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        auth::register,
        auth::login,
        auth::social_callback,
        users::me,
        users::update_profile,
        users::delete_account,
        product_routes::list_products,
        product_routes::get_product,
        categories::list_categories,
        cart::cart_list,
        cart::add_to_cart,
        cart::update_quantity,
        cart::remove_from_cart,
        cart::clear_cart,
        orders::list_orders,
        orders::place_order,
        orders::get_order,
        orders::cancel_order,
        reservations::create_reservation,
        reservations::lookup_reservations,
        reservations::list_user_reservations,
        reservations::get_reservation,
        reservations::cancel_reservation,
        reservations::list_reservations_admin,
        reservations::update_reservation_status,
        reservations::delete_reservation,
        admin::create_product,
        admin::update_product,
        admin::set_product_status,
        admin::delete_product,
        admin::create_category,
        admin::list_users,
        admin::get_user,
        admin::update_user,
        admin::delete_user,
        admin::list_all_orders,
        admin::get_order,
        admin::update_order_status,
        admin::delete_order,
        admin::list_low_stock,
        admin::adjust_inventory
    ),
    components(
        schemas(
            User,
            Product,
            Category,
            CartItem,
            Order,
            OrderItem,
            OrderStatus,
            Reservation,
            ReservationStatus,
            RegisterRequest,
            LoginRequest,
            LoginResponse,
            UpdateProfileRequest,
            AdminUpdateUserRequest,
            UserList,
            AddToCartRequest,
            UpdateCartQuantityRequest,
            CartItemDto,
            CartList,
            PlaceOrderRequest,
            OrderPlaced,
            OrderWithItems,
            OrderList,
            UpdateOrderStatusRequest,
            CreateProductRequest,
            UpdateProductRequest,
            ProductStatusRequest,
            CreateCategoryRequest,
            AdjustInventoryRequest,
            ProductList,
            CategoryList,
            CreateReservationRequest,
            CancelReservationRequest,
            UpdateReservationStatusRequest,
            ReservationList,
            Meta,
            ApiResponse<Product>,
            ApiResponse<ProductList>,
            ApiResponse<OrderPlaced>,
            ApiResponse<OrderWithItems>,
            ApiResponse<OrderList>,
            ApiResponse<Reservation>,
            ApiResponse<ReservationList>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "Authentication endpoints"),
        (name = "Users", description = "Profile endpoints"),
        (name = "Products", description = "Catalog endpoints"),
        (name = "Cart", description = "Cart endpoints"),
        (name = "Orders", description = "Order endpoints"),
        (name = "Reservations", description = "Reservation endpoints"),
        (name = "Admin", description = "Admin endpoints"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}

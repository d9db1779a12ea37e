use cafe_commerce_api::{
    db::{DbPool, create_pool},
    dto::{
        cart::AddToCartRequest,
        orders::{OrderLine, PlaceOrderRequest},
    },
    error::AppError,
    middleware::auth::AuthUser,
    services::{cart_service, order_service, stock},
};
use uuid::Uuid;

// Tests in this file hit a live Postgres instance. They skip themselves when
// no database is configured so the unit suite stays runnable anywhere.
async fn setup_pool() -> anyhow::Result<Option<DbPool>> {
    let database_url =
        match std::env::var("TEST_DATABASE_URL").or_else(|_| std::env::var("DATABASE_URL")) {
            Ok(url) => url,
            Err(_) => {
                eprintln!(
                    "Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration flow tests."
                );
                return Ok(None);
            }
        };

    let pool = create_pool(&database_url).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    Ok(Some(pool))
}

async fn seed_user(pool: &DbPool, is_admin: bool) -> anyhow::Result<Uuid> {
    let suffix = Uuid::new_v4().simple().to_string();
    let (id,): (Uuid,) = sqlx::query_as(
        "INSERT INTO users (login_id, email, password_hash, is_admin)
         VALUES ($1, $2, 'x', $3) RETURNING id",
    )
    .bind(format!("user_{suffix}"))
    .bind(format!("user_{suffix}@example.com"))
    .bind(is_admin)
    .fetch_one(pool)
    .await?;
    Ok(id)
}

async fn seed_product(pool: &DbPool, name: &str, price: i64, stock: i32) -> anyhow::Result<Uuid> {
    let (id,): (Uuid,) = sqlx::query_as(
        "INSERT INTO products (name, price, stock_quantity)
         VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(name)
    .bind(price)
    .bind(stock)
    .fetch_one(pool)
    .await?;
    Ok(id)
}

fn auth(user_id: Uuid) -> AuthUser {
    AuthUser {
        user_id,
        is_admin: false,
    }
}

#[tokio::test]
async fn place_order_decrements_stock_and_snapshots_price() -> anyhow::Result<()> {
    let Some(pool) = setup_pool().await? else {
        return Ok(());
    };

    let user_id = seed_user(&pool, false).await?;
    let product_id = seed_product(&pool, "Drip Coffee", 4500, 10).await?;
    let user = auth(user_id);

    let placed = order_service::place_order(
        &pool,
        &user,
        PlaceOrderRequest {
            items: vec![OrderLine {
                product_id,
                price: 4500,
                quantity: 2,
            }],
        },
    )
    .await?
    .data
    .expect("order placed");

    assert_eq!(placed.total_amount, 9000);
    assert_eq!(stock::remaining(&pool, product_id).await?, Some(8));

    // Raising the catalog price must not rewrite history.
    sqlx::query("UPDATE products SET price = 9999 WHERE id = $1")
        .bind(product_id)
        .execute(&pool)
        .await?;

    let detail = order_service::get_order(&pool, &user, placed.order_id)
        .await?
        .data
        .expect("order detail");
    assert_eq!(detail.items.len(), 1);
    assert_eq!(detail.items[0].price_at_order, 4500);
    assert_eq!(detail.order.total_amount, 9000);

    Ok(())
}

#[tokio::test]
async fn stale_client_price_is_rejected_without_touching_stock() -> anyhow::Result<()> {
    let Some(pool) = setup_pool().await? else {
        return Ok(());
    };

    let user_id = seed_user(&pool, false).await?;
    let product_id = seed_product(&pool, "Cold Brew", 5000, 5).await?;

    let result = order_service::place_order(
        &pool,
        &auth(user_id),
        PlaceOrderRequest {
            items: vec![OrderLine {
                product_id,
                price: 4000,
                quantity: 1,
            }],
        },
    )
    .await;

    assert!(matches!(result, Err(AppError::Conflict(_))));
    assert_eq!(stock::remaining(&pool, product_id).await?, Some(5));

    Ok(())
}

#[tokio::test]
async fn failed_line_rolls_back_the_whole_order() -> anyhow::Result<()> {
    let Some(pool) = setup_pool().await? else {
        return Ok(());
    };

    let user_id = seed_user(&pool, false).await?;
    let plenty = seed_product(&pool, "House Blend", 3000, 10).await?;
    let scarce = seed_product(&pool, "Single Origin", 7000, 1).await?;

    let result = order_service::place_order(
        &pool,
        &auth(user_id),
        PlaceOrderRequest {
            items: vec![
                OrderLine {
                    product_id: plenty,
                    price: 3000,
                    quantity: 2,
                },
                OrderLine {
                    product_id: scarce,
                    price: 7000,
                    quantity: 5,
                },
            ],
        },
    )
    .await;

    match result {
        Err(AppError::InsufficientStock { product, remaining }) => {
            assert_eq!(product, "Single Origin");
            assert_eq!(remaining, 1);
        }
        other => panic!("expected insufficient stock, got {other:?}"),
    }

    // The first line's decrement must have been rolled back with the rest.
    assert_eq!(stock::remaining(&pool, plenty).await?, Some(10));
    assert_eq!(stock::remaining(&pool, scarce).await?, Some(1));

    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM orders WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(&pool)
        .await?;
    assert_eq!(count, 0);

    Ok(())
}

#[tokio::test]
async fn concurrent_orders_never_oversell() -> anyhow::Result<()> {
    let Some(pool) = setup_pool().await? else {
        return Ok(());
    };

    let product_id = seed_product(&pool, "Limited Roast", 2500, 5).await?;

    let mut handles = Vec::new();
    for _ in 0..8 {
        let pool = pool.clone();
        let user_id = seed_user(&pool, false).await?;
        handles.push(tokio::spawn(async move {
            order_service::place_order(
                &pool,
                &auth(user_id),
                PlaceOrderRequest {
                    items: vec![OrderLine {
                        product_id,
                        price: 2500,
                        quantity: 1,
                    }],
                },
            )
            .await
        }));
    }

    let mut successes = 0;
    let mut shortages = 0;
    for handle in handles {
        match handle.await? {
            Ok(_) => successes += 1,
            Err(AppError::InsufficientStock { .. }) => shortages += 1,
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }

    assert_eq!(successes, 5);
    assert_eq!(shortages, 3);
    assert_eq!(stock::remaining(&pool, product_id).await?, Some(0));

    Ok(())
}

#[tokio::test]
async fn cart_cannot_accumulate_past_stock() -> anyhow::Result<()> {
    let Some(pool) = setup_pool().await? else {
        return Ok(());
    };

    let user_id = seed_user(&pool, false).await?;
    let product_id = seed_product(&pool, "Scone", 3500, 3).await?;
    let user = auth(user_id);

    cart_service::add_to_cart(
        &pool,
        &user,
        AddToCartRequest {
            product_id,
            quantity: 2,
        },
    )
    .await?;

    let result = cart_service::add_to_cart(
        &pool,
        &user,
        AddToCartRequest {
            product_id,
            quantity: 2,
        },
    )
    .await;
    assert!(matches!(result, Err(AppError::InsufficientStock { .. })));

    // The existing line must be untouched by the failed add.
    let (quantity,): (i32,) =
        sqlx::query_as("SELECT quantity FROM cart_items WHERE user_id = $1 AND product_id = $2")
            .bind(user_id)
            .bind(product_id)
            .fetch_one(&pool)
            .await?;
    assert_eq!(quantity, 2);

    Ok(())
}

#[tokio::test]
async fn placing_an_order_clears_the_cart() -> anyhow::Result<()> {
    let Some(pool) = setup_pool().await? else {
        return Ok(());
    };

    let user_id = seed_user(&pool, false).await?;
    let product_id = seed_product(&pool, "Latte", 5500, 10).await?;
    let user = auth(user_id);

    cart_service::add_to_cart(
        &pool,
        &user,
        AddToCartRequest {
            product_id,
            quantity: 3,
        },
    )
    .await?;

    order_service::place_order(
        &pool,
        &user,
        PlaceOrderRequest {
            items: vec![OrderLine {
                product_id,
                price: 5500,
                quantity: 3,
            }],
        },
    )
    .await?;

    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM cart_items WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(&pool)
        .await?;
    assert_eq!(count, 0);

    Ok(())
}

#[tokio::test]
async fn cancelling_a_pending_order_restocks_and_is_final() -> anyhow::Result<()> {
    let Some(pool) = setup_pool().await? else {
        return Ok(());
    };

    let user_id = seed_user(&pool, false).await?;
    let product_id = seed_product(&pool, "Americano", 4000, 10).await?;
    let user = auth(user_id);

    let placed = order_service::place_order(
        &pool,
        &user,
        PlaceOrderRequest {
            items: vec![OrderLine {
                product_id,
                price: 4000,
                quantity: 4,
            }],
        },
    )
    .await?
    .data
    .expect("order placed");
    assert_eq!(stock::remaining(&pool, product_id).await?, Some(6));

    order_service::cancel_order(&pool, &user, placed.order_id).await?;
    assert_eq!(stock::remaining(&pool, product_id).await?, Some(10));

    // Cancelled is terminal; a second cancel must not restock again.
    let result = order_service::cancel_order(&pool, &user, placed.order_id).await;
    assert!(matches!(result, Err(AppError::Conflict(_))));
    assert_eq!(stock::remaining(&pool, product_id).await?, Some(10));

    Ok(())
}

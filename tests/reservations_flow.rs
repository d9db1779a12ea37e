use cafe_commerce_api::{
    db::{DbPool, create_pool},
    dto::reservations::{
        CancelReservationRequest, CreateReservationRequest, ReservationLookupQuery,
        UpdateReservationStatusRequest,
    },
    error::AppError,
    middleware::auth::AuthUser,
    models::ReservationStatus,
    services::reservation_service,
};
use chrono::{NaiveDate, NaiveTime};
use uuid::Uuid;

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

async fn seed_admin(pool: &DbPool) -> anyhow::Result<AuthUser> {
    let suffix = Uuid::new_v4().simple().to_string();
    let (id,): (Uuid,) = sqlx::query_as(
        "INSERT INTO users (login_id, email, password_hash, is_admin)
         VALUES ($1, $2, 'x', TRUE) RETURNING id",
    )
    .bind(format!("admin_{suffix}"))
    .bind(format!("admin_{suffix}@example.com"))
    .fetch_one(pool)
    .await?;
    Ok(AuthUser {
        user_id: id,
        is_admin: true,
    })
}

fn booking(name: &str, phone: &str) -> CreateReservationRequest {
    CreateReservationRequest {
        customer_name: name.into(),
        phone_number: phone.into(),
        reservation_date: NaiveDate::from_ymd_opt(2026, 9, 12).unwrap(),
        reservation_time: NaiveTime::from_hms_opt(19, 0, 0).unwrap(),
        num_participants: 2,
        user_id: None,
        product_id: None,
        notes: None,
    }
}

fn status(to: ReservationStatus) -> UpdateReservationStatusRequest {
    UpdateReservationStatusRequest { status: to }
}

#[tokio::test]
async fn lifecycle_runs_pending_confirmed_completed_and_stops() -> anyhow::Result<()> {
    let Some(pool) = setup_pool().await? else {
        return Ok(());
    };
    let admin = seed_admin(&pool).await?;

    let created = reservation_service::create_reservation(&pool, booking("Park Jisoo", "010-2222-0001"))
        .await?
        .data
        .expect("reservation");
    assert_eq!(created.status, ReservationStatus::Pending);

    let confirmed = reservation_service::update_status_admin(
        &pool,
        &admin,
        created.id,
        status(ReservationStatus::Confirmed),
    )
    .await?
    .data
    .expect("confirmed");
    assert_eq!(confirmed.status, ReservationStatus::Confirmed);

    let completed = reservation_service::update_status_admin(
        &pool,
        &admin,
        created.id,
        status(ReservationStatus::Completed),
    )
    .await?
    .data
    .expect("completed");
    assert_eq!(completed.status, ReservationStatus::Completed);

    // Completed is terminal.
    let result = reservation_service::update_status_admin(
        &pool,
        &admin,
        created.id,
        status(ReservationStatus::Confirmed),
    )
    .await;
    assert!(matches!(result, Err(AppError::Conflict(_))));

    Ok(())
}

#[tokio::test]
async fn pending_cannot_jump_straight_to_completed() -> anyhow::Result<()> {
    let Some(pool) = setup_pool().await? else {
        return Ok(());
    };
    let admin = seed_admin(&pool).await?;

    let created = reservation_service::create_reservation(&pool, booking("Lee Haneul", "010-2222-0002"))
        .await?
        .data
        .expect("reservation");

    let result = reservation_service::update_status_admin(
        &pool,
        &admin,
        created.id,
        status(ReservationStatus::Completed),
    )
    .await;
    assert!(matches!(result, Err(AppError::Conflict(_))));

    Ok(())
}

#[tokio::test]
async fn guest_cancel_requires_the_exact_name_and_phone() -> anyhow::Result<()> {
    let Some(pool) = setup_pool().await? else {
        return Ok(());
    };

    let created = reservation_service::create_reservation(&pool, booking("Choi Dain", "010-2222-0003"))
        .await?
        .data
        .expect("reservation");

    // A wrong phone gets the same answer as a missing reservation.
    let result = reservation_service::cancel_by_customer(
        &pool,
        created.id,
        CancelReservationRequest {
            customer_name: "Choi Dain".into(),
            phone_number: "010-9999-9999".into(),
        },
    )
    .await;
    assert!(matches!(result, Err(AppError::NotFound)));

    let cancelled = reservation_service::cancel_by_customer(
        &pool,
        created.id,
        CancelReservationRequest {
            customer_name: "Choi Dain".into(),
            phone_number: "010-2222-0003".into(),
        },
    )
    .await?
    .data
    .expect("cancelled");
    assert_eq!(cancelled.status, ReservationStatus::Cancelled);

    // Cancelled is terminal even for the right identity.
    let again = reservation_service::cancel_by_customer(
        &pool,
        created.id,
        CancelReservationRequest {
            customer_name: "Choi Dain".into(),
            phone_number: "010-2222-0003".into(),
        },
    )
    .await;
    assert!(matches!(again, Err(AppError::Conflict(_))));

    Ok(())
}

#[tokio::test]
async fn lookup_matches_on_name_and_phone_together() -> anyhow::Result<()> {
    let Some(pool) = setup_pool().await? else {
        return Ok(());
    };

    let phone = format!("010-33{:02}-{:04}", rand_two(), rand_four());
    reservation_service::create_reservation(&pool, booking("Jung Hayoon", &phone)).await?;
    reservation_service::create_reservation(&pool, booking("Jung Hayoon", &phone)).await?;

    let found = reservation_service::lookup_reservations(
        &pool,
        ReservationLookupQuery {
            customer_name: "Jung Hayoon".into(),
            phone_number: phone.clone(),
        },
    )
    .await?
    .data
    .expect("lookup");
    assert_eq!(found.items.len(), 2);

    let miss = reservation_service::lookup_reservations(
        &pool,
        ReservationLookupQuery {
            customer_name: "Jung Hayoon".into(),
            phone_number: "010-0000-0000".into(),
        },
    )
    .await;
    assert!(matches!(miss, Err(AppError::NotFound)));

    Ok(())
}

fn rand_two() -> u16 {
    (Uuid::new_v4().as_u128() % 100) as u16
}

fn rand_four() -> u16 {
    (Uuid::new_v4().as_u128() % 10_000) as u16
}

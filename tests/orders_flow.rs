use std::sync::Arc;

use boutique_api::{
    config::MailConfig,
    db::{create_orm_conn, create_pool, run_migrations},
    dto::{
        orders::{OrderItemInput, PlaceOrderRequest, UpdateOrderRequest},
        products::AdjustStockRequest,
    },
    entity::{order_items, products::ActiveModel as ProductActive},
    error::AppError,
    mailer::RecordingMailer,
    models::OrderStatus,
    routes::params::{OrderListQuery, ProductQuery},
    services::{order_service, product_service},
    state::AppState,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::ActiveValue::NotSet;
use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set, Statement};
use uuid::Uuid;

// Integration flow: seed catalog -> place order -> notifications -> status
// transitions -> stock adjustment. Skipped when no database is configured.
#[tokio::test]
async fn place_confirm_and_adjust_stock_flow() -> anyhow::Result<()> {
    let database_url =
        match std::env::var("TEST_DATABASE_URL").or_else(|_| std::env::var("DATABASE_URL")) {
            Ok(url) => url,
            Err(_) => {
                eprintln!(
                    "Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration flow tests."
                );
                return Ok(());
            }
        };

    let (state, mailer) = setup_state(&database_url).await?;

    // Seed catalog
    let tomatoes = seed_product(&state, "Tomates Fraiches", dec!(250.00), 25).await?;
    let cheese = seed_product(&state, "Fromage de Chevre", dec!(1200.00), 8).await?;
    let sold_out = seed_product(&state, "Miel Local", dec!(2500.00), 0).await?;

    // Available filter keeps the relative order of the unfiltered list and
    // drops anything without stock.
    let full = product_service::list_products(&state, default_product_query())
        .await?
        .data
        .unwrap()
        .items;
    let available = product_service::list_available(&state, default_product_query())
        .await?
        .data
        .unwrap()
        .items;
    assert!(available.iter().all(|p| p.stock > 0));
    assert!(available.iter().all(|p| p.id != sold_out.id));
    let full_ids: Vec<Uuid> = full
        .iter()
        .map(|p| p.id)
        .filter(|id| available.iter().any(|a| a.id == *id))
        .collect();
    let available_ids: Vec<Uuid> = available.iter().map(|p| p.id).collect();
    assert_eq!(full_ids, available_ids);

    // Place the example order: 2 x 250.00 + 1 x 1200.00 = 1700.00
    let response = order_service::place_order(
        &state,
        place_request(vec![
            item(tomatoes.id, 2, dec!(250.00)),
            item(cheese.id, 1, dec!(1200.00)),
        ]),
    )
    .await?;
    let placed = response.data.unwrap();
    assert_eq!(placed.items.len(), 2);
    assert_eq!(placed.order.total_amount, dec!(1700.00));
    assert_eq!(placed.order.status, OrderStatus::Pending);
    let mut line_totals: Vec<Decimal> = placed.items.iter().map(|i| i.line_total).collect();
    line_totals.sort();
    assert_eq!(line_totals, vec![dec!(500.00), dec!(1200.00)]);
    assert!(placed.email_sent);
    assert!(placed.admin_notification_sent);
    assert_eq!(mailer.sent_count(), 2);

    // Placing an order never touches stock.
    let after = product_service::get_product(&state, tomatoes.id)
        .await?
        .data
        .unwrap();
    assert_eq!(after.stock, 25);

    // Unknown product id aborts the whole order, leaving nothing behind.
    let orders_before = count_orders(&state).await?;
    let err = order_service::place_order(
        &state,
        place_request(vec![
            item(tomatoes.id, 1, dec!(250.00)),
            item(Uuid::new_v4(), 1, dec!(999.00)),
        ]),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::NotFound));
    assert_eq!(count_orders(&state).await?, orders_before);

    // A client total that disagrees with the item sum is rejected.
    let mut bad_total = place_request(vec![item(tomatoes.id, 2, dec!(250.00))]);
    bad_total.total_amount = dec!(9999.00);
    let err = order_service::place_order(&state, bad_total).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    // pending -> confirmed, then an idempotent repeat.
    let confirmed = order_service::confirm_order(&state, placed.order.id)
        .await?
        .data
        .unwrap();
    assert_eq!(confirmed.status, OrderStatus::Confirmed);
    let again = order_service::confirm_order(&state, placed.order.id)
        .await?
        .data
        .unwrap();
    assert_eq!(again.status, OrderStatus::Confirmed);

    // confirmed -> shipped is allowed; shipped -> confirmed is not.
    let shipped = order_service::update_status(&state, placed.order.id, OrderStatus::Shipped)
        .await?
        .data
        .unwrap();
    assert_eq!(shipped.status, OrderStatus::Shipped);
    let err = order_service::confirm_order(&state, placed.order.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    // Stock moves only through the explicit adjustment endpoint.
    let restocked = product_service::adjust_stock(
        &state,
        tomatoes.id,
        AdjustStockRequest { delta: 5 },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(restocked.stock, 30);
    let err = product_service::adjust_stock(
        &state,
        tomatoes.id,
        AdjustStockRequest { delta: -100 },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    // Mailer failure degrades to flags, never to an order failure.
    mailer.set_failing(true);
    let degraded = order_service::place_order(
        &state,
        place_request(vec![item(cheese.id, 1, dec!(1200.00))]),
    )
    .await?
    .data
    .unwrap();
    assert!(!degraded.email_sent);
    assert!(!degraded.admin_notification_sent);
    mailer.set_failing(false);

    // Contact-field update normalizes a blank phone to absent.
    let updated = order_service::update_order(
        &state,
        degraded.order.id,
        UpdateOrderRequest {
            customer_name: None,
            customer_email: None,
            customer_phone: Some("   ".into()),
            customer_address: Some("7 Avenue de la Gare".into()),
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(updated.customer_phone, None);
    assert_eq!(updated.customer_address, "7 Avenue de la Gare");

    // Status filter on the listing.
    let shipped_only = order_service::list_orders(
        &state,
        OrderListQuery {
            page: Some(1),
            per_page: Some(20),
            status: Some(OrderStatus::Shipped),
            sort_order: None,
        },
    )
    .await?
    .data
    .unwrap();
    assert!(shipped_only.items.iter().all(|o| o.status == OrderStatus::Shipped));
    assert!(shipped_only.items.iter().any(|o| o.id == placed.order.id));

    // Deleting the order cascades to its items.
    order_service::delete_order(&state, placed.order.id).await?;
    let err = order_service::get_order(&state, placed.order.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound));
    let orphaned = order_items::Entity::find()
        .filter(order_items::Column::OrderId.eq(placed.order.id))
        .all(&state.orm)
        .await?;
    assert!(orphaned.is_empty());

    Ok(())
}

async fn setup_state(database_url: &str) -> anyhow::Result<(AppState, Arc<RecordingMailer>)> {
    let orm = create_orm_conn(database_url).await?;
    run_migrations(&orm).await?;
    let pool = create_pool(database_url).await?;

    // Clean tables between runs
    let backend = orm.get_database_backend();
    orm.execute(Statement::from_string(
        backend,
        "TRUNCATE TABLE order_items, orders, audit_logs, products RESTART IDENTITY CASCADE",
    ))
    .await?;

    let mailer = Arc::new(RecordingMailer::default());
    let state = AppState {
        pool,
        orm,
        mailer: mailer.clone(),
        mail: MailConfig::default(),
    };
    Ok((state, mailer))
}

async fn seed_product(
    state: &AppState,
    name: &str,
    price: Decimal,
    stock: i32,
) -> anyhow::Result<boutique_api::entity::products::Model> {
    let product = ProductActive {
        id: Set(Uuid::new_v4()),
        name: Set(name.to_string()),
        description: Set(Some(format!("{name} for testing"))),
        price: Set(price),
        stock: Set(stock),
        image_url: Set(None),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&state.orm)
    .await?;
    Ok(product)
}

fn default_product_query() -> ProductQuery {
    ProductQuery {
        page: Some(1),
        per_page: Some(50),
    }
}

fn place_request(items: Vec<OrderItemInput>) -> PlaceOrderRequest {
    let total = items
        .iter()
        .map(|i| i.unit_price * Decimal::from(i.quantity))
        .sum();
    PlaceOrderRequest {
        customer_name: "Awa Diallo".into(),
        customer_email: "awa@example.com".into(),
        customer_phone: Some("+221 77 000 00 00".into()),
        customer_address: "12 Rue du Marche".into(),
        total_amount: total,
        items,
    }
}

fn item(product_id: Uuid, quantity: i32, unit_price: Decimal) -> OrderItemInput {
    OrderItemInput {
        product_id,
        quantity,
        unit_price,
    }
}

async fn count_orders(state: &AppState) -> anyhow::Result<u64> {
    use sea_orm::PaginatorTrait;
    Ok(boutique_api::entity::orders::Entity::find()
        .count(&state.orm)
        .await?)
}

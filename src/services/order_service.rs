use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::ActiveValue::NotSet;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::orders::{
        OrderItemInput, OrderList, OrderWithItems, PlaceOrderRequest, PlaceOrderResponse,
        UpdateOrderRequest,
    },
    entity::{
        order_items::{
            ActiveModel as OrderItemActive, Column as OrderItemCol, Entity as OrderItems,
            Model as OrderItemModel,
        },
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel},
        products::Entity as Products,
    },
    error::{AppError, AppResult, FieldError},
    models::{Order, OrderItem, OrderStatus},
    notify,
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, SortOrder},
    state::AppState,
};

/// Assemble an order: validate the payload, create the header and all line
/// items inside one transaction, then fire the two best-effort notification
/// emails. A failed email never fails the order; the response carries one
/// delivery flag per send.
pub async fn place_order(
    state: &AppState,
    payload: PlaceOrderRequest,
) -> AppResult<ApiResponse<PlaceOrderResponse>> {
    let phone = validate_order_payload(&payload)?;

    let computed = compute_total(&payload.items);
    if computed != payload.total_amount {
        return Err(AppError::Validation(vec![FieldError::new(
            "total_amount",
            format!(
                "submitted total {} does not match item total {}",
                payload.total_amount, computed
            ),
        )]));
    }

    let txn = state.orm.begin().await?;

    // Every referenced product must exist before anything is written; a miss
    // aborts the transaction so no partial order survives.
    for item in &payload.items {
        if Products::find_by_id(item.product_id).one(&txn).await?.is_none() {
            return Err(AppError::NotFound);
        }
    }

    let order_id = Uuid::new_v4();
    let order = OrderActive {
        id: Set(order_id),
        customer_name: Set(payload.customer_name),
        customer_email: Set(payload.customer_email),
        customer_phone: Set(phone),
        customer_address: Set(payload.customer_address),
        total_amount: Set(payload.total_amount),
        status: Set(OrderStatus::Pending),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&txn)
    .await?;

    let mut items: Vec<OrderItem> = Vec::with_capacity(payload.items.len());
    for input in &payload.items {
        let item = OrderItemActive {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            product_id: Set(input.product_id),
            quantity: Set(input.quantity),
            price: Set(input.unit_price),
            created_at: NotSet,
        }
        .insert(&txn)
        .await?;
        items.push(order_item_from_entity(item));
    }

    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        "order_placed",
        Some("orders"),
        Some(serde_json::json!({ "order_id": order.id, "items": items.len() })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    let data = OrderWithItems {
        order: order_from_entity(order),
        items,
    };
    let email_sent = notify::notify_customer(state.mailer.as_ref(), &state.mail, &data).await;
    let admin_notification_sent =
        notify::notify_admin(state.mailer.as_ref(), &state.mail, &data).await;

    Ok(ApiResponse::success(
        "Order placed",
        PlaceOrderResponse {
            order: data.order,
            items: data.items,
            email_sent,
            admin_notification_sent,
        },
        Some(Meta::empty()),
    ))
}

pub async fn list_orders(
    state: &AppState,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let (page, limit, offset) = query.pagination().normalize();
    let mut condition = Condition::all();
    if let Some(status) = query.status {
        condition = condition.add(OrderCol::Status.eq(status));
    }

    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);

    let mut finder = Orders::find().filter(condition);
    finder = match sort_order {
        SortOrder::Asc => finder.order_by_asc(OrderCol::CreatedAt),
        SortOrder::Desc => finder.order_by_desc(OrderCol::CreatedAt),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let orders = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(order_from_entity)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "Orders",
        OrderList { items: orders },
        Some(meta),
    ))
}

pub async fn get_order(state: &AppState, id: Uuid) -> AppResult<ApiResponse<OrderWithItems>> {
    let order = Orders::find_by_id(id).one(&state.orm).await?;
    let order = match order {
        Some(o) => o,
        None => return Err(AppError::NotFound),
    };

    let items = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order.id))
        .all(&state.orm)
        .await?
        .into_iter()
        .map(order_item_from_entity)
        .collect();

    Ok(ApiResponse::success(
        "Order",
        OrderWithItems {
            order: order_from_entity(order),
            items,
        },
        Some(Meta::empty()),
    ))
}

/// Update customer contact fields only; totals, items and status are not
/// editable through this path.
pub async fn update_order(
    state: &AppState,
    id: Uuid,
    payload: UpdateOrderRequest,
) -> AppResult<ApiResponse<Order>> {
    let mut errors = Vec::new();
    if let Some(name) = payload.customer_name.as_deref()
        && name.trim().is_empty()
    {
        errors.push(FieldError::new("customer_name", "must not be empty"));
    }
    if let Some(email) = payload.customer_email.as_deref()
        && !is_valid_email(email)
    {
        errors.push(FieldError::new("customer_email", "must be a valid email address"));
    }
    if let Some(address) = payload.customer_address.as_deref()
        && address.trim().is_empty()
    {
        errors.push(FieldError::new("customer_address", "must not be empty"));
    }
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }

    let existing = Orders::find_by_id(id).one(&state.orm).await?;
    let existing = match existing {
        Some(o) => o,
        None => return Err(AppError::NotFound),
    };

    let mut active: OrderActive = existing.into();
    if let Some(name) = payload.customer_name {
        active.customer_name = Set(name);
    }
    if let Some(email) = payload.customer_email {
        active.customer_email = Set(email);
    }
    if let Some(phone) = payload.customer_phone {
        active.customer_phone = Set(normalize_phone(Some(&phone)));
    }
    if let Some(address) = payload.customer_address {
        active.customer_address = Set(address);
    }
    active.updated_at = Set(Utc::now().into());
    let order = active.update(&state.orm).await?;

    Ok(ApiResponse::success(
        "Updated",
        order_from_entity(order),
        Some(Meta::empty()),
    ))
}

pub async fn delete_order(state: &AppState, id: Uuid) -> AppResult<ApiResponse<serde_json::Value>> {
    // Line items go with the order via the FK cascade.
    let result = Orders::delete_by_id(id).exec(&state.orm).await?;

    if result.rows_affected == 0 {
        return Err(AppError::NotFound);
    }

    Ok(ApiResponse::success(
        "Deleted",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

/// The one transition wired to its own endpoint: move an order to confirmed.
pub async fn confirm_order(state: &AppState, id: Uuid) -> AppResult<ApiResponse<Order>> {
    update_status(state, id, OrderStatus::Confirmed).await
}

/// Move an order through the status table. A same-state update is an
/// idempotent no-op; anything the table does not allow is rejected.
pub async fn update_status(
    state: &AppState,
    id: Uuid,
    target: OrderStatus,
) -> AppResult<ApiResponse<Order>> {
    let existing = Orders::find_by_id(id).one(&state.orm).await?;
    let existing = match existing {
        Some(o) => o,
        None => return Err(AppError::NotFound),
    };

    if !existing.status.can_transition(target) {
        return Err(AppError::BadRequest(format!(
            "Cannot transition order from {} to {}",
            existing.status, target
        )));
    }

    if existing.status == target {
        return Ok(ApiResponse::success(
            "Status unchanged",
            order_from_entity(existing),
            Some(Meta::empty()),
        ));
    }

    let mut active: OrderActive = existing.into();
    active.status = Set(target);
    active.updated_at = Set(Utc::now().into());
    let order = active.update(&state.orm).await?;

    if let Err(err) = log_audit(
        &state.pool,
        "order_status",
        Some("orders"),
        Some(serde_json::json!({ "order_id": order.id, "status": target.as_str() })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Status updated",
        order_from_entity(order),
        Some(Meta::empty()),
    ))
}

/// Field-level checks for the placement payload. Returns the normalized phone
/// number (trimmed, empty collapsed to None) when everything passes.
fn validate_order_payload(payload: &PlaceOrderRequest) -> AppResult<Option<String>> {
    let mut errors = Vec::new();

    if payload.customer_name.trim().is_empty() {
        errors.push(FieldError::new("customer_name", "must not be empty"));
    }
    if !is_valid_email(&payload.customer_email) {
        errors.push(FieldError::new(
            "customer_email",
            "must be a valid email address",
        ));
    }
    if payload.customer_address.trim().is_empty() {
        errors.push(FieldError::new("customer_address", "must not be empty"));
    }
    if payload.items.is_empty() {
        errors.push(FieldError::new("items", "must contain at least one item"));
    }
    for (index, item) in payload.items.iter().enumerate() {
        if item.quantity <= 0 {
            errors.push(FieldError::new(
                format!("items[{index}].quantity"),
                "must be a positive integer",
            ));
        }
        if item.unit_price < Decimal::ZERO {
            errors.push(FieldError::new(
                format!("items[{index}].unit_price"),
                "must not be negative",
            ));
        }
    }

    if errors.is_empty() {
        Ok(normalize_phone(payload.customer_phone.as_deref()))
    } else {
        Err(AppError::Validation(errors))
    }
}

fn is_valid_email(email: &str) -> bool {
    let email = email.trim();
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !email.contains(char::is_whitespace)
}

fn normalize_phone(phone: Option<&str>) -> Option<String> {
    phone
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
}

fn compute_total(items: &[OrderItemInput]) -> Decimal {
    items
        .iter()
        .map(|item| item.unit_price * Decimal::from(item.quantity))
        .sum()
}

fn order_from_entity(model: OrderModel) -> Order {
    Order {
        id: model.id,
        customer_name: model.customer_name,
        customer_email: model.customer_email,
        customer_phone: model.customer_phone,
        customer_address: model.customer_address,
        total_amount: model.total_amount,
        status: model.status,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}

fn order_item_from_entity(model: OrderItemModel) -> OrderItem {
    OrderItem {
        id: model.id,
        order_id: model.order_id,
        product_id: model.product_id,
        quantity: model.quantity,
        price: model.price,
        line_total: model.price * Decimal::from(model.quantity),
        created_at: model.created_at.with_timezone(&Utc),
    }
}

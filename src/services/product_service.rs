use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::LockType;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::products::{AdjustStockRequest, CreateProductRequest, ProductList, UpdateProductRequest},
    entity::products::{ActiveModel, Column, Entity as Products, Model as ProductModel},
    error::{AppError, AppResult, FieldError},
    models::Product,
    response::{ApiResponse, Meta},
    routes::params::ProductQuery,
    state::AppState,
};

pub async fn list_products(
    state: &AppState,
    query: ProductQuery,
) -> AppResult<ApiResponse<ProductList>> {
    list_inner(state, query, false).await
}

/// The `available` variant of the catalog listing: only products with stock
/// remaining, in the same relative order as the unfiltered list.
pub async fn list_available(
    state: &AppState,
    query: ProductQuery,
) -> AppResult<ApiResponse<ProductList>> {
    list_inner(state, query, true).await
}

async fn list_inner(
    state: &AppState,
    query: ProductQuery,
    in_stock_only: bool,
) -> AppResult<ApiResponse<ProductList>> {
    let (page, limit, offset) = query.pagination().normalize();

    let mut finder = Products::find().order_by_desc(Column::CreatedAt);
    if in_stock_only {
        finder = finder.filter(Column::Stock.gt(0));
    }

    let total = finder.clone().count(&state.orm).await? as i64;

    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(product_from_entity)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "Products",
        ProductList { items },
        Some(meta),
    ))
}

pub async fn get_product(state: &AppState, id: Uuid) -> AppResult<ApiResponse<Product>> {
    let result = Products::find_by_id(id)
        .one(&state.orm)
        .await?
        .map(product_from_entity);
    let result = match result {
        Some(p) => p,
        None => return Err(AppError::NotFound),
    };
    Ok(ApiResponse::success("Product", result, None))
}

pub async fn create_product(
    state: &AppState,
    payload: CreateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    validate_product_fields(Some(&payload.name), payload.price, payload.stock)?;

    let id = Uuid::new_v4();
    let active = ActiveModel {
        id: Set(id),
        name: Set(payload.name),
        description: Set(Some(payload.description)),
        price: Set(payload.price),
        stock: Set(payload.stock),
        image_url: Set(payload.image_url),
        created_at: NotSet,
        updated_at: NotSet,
    };
    let product = active.insert(&state.orm).await?;

    if let Err(err) = log_audit(
        &state.pool,
        "product_create",
        Some("products"),
        Some(serde_json::json!({ "product_id": product.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Product created",
        product_from_entity(product),
        Some(Meta::empty()),
    ))
}

pub async fn update_product(
    state: &AppState,
    id: Uuid,
    payload: UpdateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    validate_product_fields(
        payload.name.as_deref(),
        payload.price.unwrap_or(Decimal::ZERO),
        payload.stock.unwrap_or(0),
    )?;

    let existing = Products::find_by_id(id).one(&state.orm).await?;
    let existing = match existing {
        Some(p) => p,
        None => return Err(AppError::NotFound),
    };

    let mut active: ActiveModel = existing.into();
    if let Some(name) = payload.name {
        active.name = Set(name);
    }
    if let Some(description) = payload.description {
        active.description = Set(Some(description));
    }
    if let Some(price) = payload.price {
        active.price = Set(price);
    }
    if let Some(stock) = payload.stock {
        active.stock = Set(stock);
    }
    if let Some(image_url) = payload.image_url {
        active.image_url = Set(Some(image_url));
    }
    active.updated_at = Set(Utc::now().into());

    let product = active.update(&state.orm).await?;

    if let Err(err) = log_audit(
        &state.pool,
        "product_update",
        Some("products"),
        Some(serde_json::json!({ "product_id": product.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Updated",
        product_from_entity(product),
        Some(Meta::empty()),
    ))
}

pub async fn delete_product(
    state: &AppState,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let result = Products::delete_by_id(id).exec(&state.orm).await?;

    if result.rows_affected == 0 {
        return Err(AppError::NotFound);
    }

    if let Err(err) = log_audit(
        &state.pool,
        "product_delete",
        Some("products"),
        Some(serde_json::json!({ "product_id": id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Deleted",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

/// Explicit stock mutation. Order placement never touches stock; restocks and
/// manual sell-downs go through here so the movement is auditable on its own.
pub async fn adjust_stock(
    state: &AppState,
    id: Uuid,
    payload: AdjustStockRequest,
) -> AppResult<ApiResponse<Product>> {
    let txn = state.orm.begin().await?;

    let existing = Products::find_by_id(id)
        .lock(LockType::Update)
        .one(&txn)
        .await?;
    let existing = match existing {
        Some(p) => p,
        None => return Err(AppError::NotFound),
    };

    let Some(new_stock) = apply_stock_delta(existing.stock, payload.delta) else {
        return Err(AppError::Validation(vec![FieldError::new(
            "delta",
            format!(
                "adjustment of {} cannot be applied to current stock {}",
                payload.delta, existing.stock
            ),
        )]));
    };

    let mut active: ActiveModel = existing.into();
    active.stock = Set(new_stock);
    active.updated_at = Set(Utc::now().into());
    let product = active.update(&txn).await?;

    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        "stock_adjust",
        Some("products"),
        Some(serde_json::json!({ "product_id": id, "delta": payload.delta, "stock": new_stock })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Stock adjusted",
        product_from_entity(product),
        Some(Meta::empty()),
    ))
}

/// Overflow-checked stock arithmetic; `None` when the delta would wrap or
/// take stock below zero.
fn apply_stock_delta(stock: i32, delta: i32) -> Option<i32> {
    stock.checked_add(delta).filter(|s| *s >= 0)
}

fn validate_product_fields(name: Option<&str>, price: Decimal, stock: i32) -> AppResult<()> {
    let mut errors = Vec::new();
    if let Some(name) = name
        && name.trim().is_empty()
    {
        errors.push(FieldError::new("name", "must not be empty"));
    }
    if price < Decimal::ZERO {
        errors.push(FieldError::new("price", "must not be negative"));
    }
    if stock < 0 {
        errors.push(FieldError::new("stock", "must not be negative"));
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation(errors))
    }
}

fn product_from_entity(model: ProductModel) -> Product {
    Product {
        id: model.id,
        name: model.name,
        description: model.description,
        price: model.price,
        stock: model.stock,
        image_url: model.image_url,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}

#[cfg(test)]
mod tests {
    use super::{apply_stock_delta, validate_product_fields};
    use rust_decimal_macros::dec;

    #[test]
    fn stock_delta_applies_within_bounds() {
        assert_eq!(apply_stock_delta(25, 5), Some(30));
        assert_eq!(apply_stock_delta(25, -25), Some(0));
    }

    #[test]
    fn stock_delta_rejects_negative_result_and_overflow() {
        assert_eq!(apply_stock_delta(25, -26), None);
        assert_eq!(apply_stock_delta(i32::MAX, 1), None);
        assert_eq!(apply_stock_delta(0, i32::MIN), None);
    }

    #[test]
    fn rejects_negative_price_and_stock() {
        let err = validate_product_fields(Some("Tomates"), dec!(-1), -3).unwrap_err();
        match err {
            crate::error::AppError::Validation(fields) => {
                assert_eq!(fields.len(), 2);
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn accepts_valid_fields() {
        assert!(validate_product_fields(Some("Tomates"), dec!(250.00), 25).is_ok());
    }
}

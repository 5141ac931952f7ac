use utoipa::{OpenApi, openapi::OpenApi as OpenApiSpec};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        orders::{
            OrderItemInput, OrderList, OrderWithItems, PlaceOrderRequest, PlaceOrderResponse,
            UpdateOrderRequest, UpdateOrderStatusRequest,
        },
        products::{AdjustStockRequest, CreateProductRequest, ProductList, UpdateProductRequest},
    },
    models::{Order, OrderItem, OrderStatus, Product},
    response::{ApiResponse, Meta},
    routes::{health, orders, params, products},
};

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        products::list_products,
        products::list_available,
        products::create_product,
        products::get_product,
        products::update_product,
        products::delete_product,
        products::adjust_stock,
        orders::list_orders,
        orders::place_order,
        orders::get_order,
        orders::update_order,
        orders::delete_order,
        orders::confirm_order,
        orders::update_status,
    ),
    components(
        schemas(
            Product,
            Order,
            OrderItem,
            OrderStatus,
            CreateProductRequest,
            UpdateProductRequest,
            AdjustStockRequest,
            ProductList,
            OrderItemInput,
            PlaceOrderRequest,
            PlaceOrderResponse,
            UpdateOrderRequest,
            UpdateOrderStatusRequest,
            OrderList,
            OrderWithItems,
            params::ProductQuery,
            params::OrderListQuery,
            params::SortOrder,
            Meta,
            ApiResponse<Product>,
            ApiResponse<ProductList>,
            ApiResponse<Order>,
            ApiResponse<OrderList>,
            ApiResponse<OrderWithItems>,
            ApiResponse<PlaceOrderResponse>
        )
    ),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Products", description = "Product catalog endpoints"),
        (name = "Orders", description = "Order endpoints"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        FromRef, Path, Query, State,
    },
    http::StatusCode,
    response::Json,
    routing::{get, post, put},
    Router,
};
use inventory::{CreateProduct, Product, ProductPage, ProductQuery, UpdateProduct};
use shared::{PlaceOrder, PlaceOrderRequest};
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::{Authenticated, TokenKeys};
use crate::error::AppError;
use crate::handlers::{CatalogService, OrderService};
use crate::models::{Order, StatusUpdate};

#[derive(Clone)]
pub struct AppState {
    pub orders: Arc<OrderService>,
    pub catalog: Arc<CatalogService>,
    pub keys: TokenKeys,
}

impl FromRef<AppState> for TokenKeys {
    fn from_ref(state: &AppState) -> Self {
        state.keys.clone()
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/orders", post(create_order).get(list_all_orders))
        .route("/orders/mine", get(list_my_orders))
        .route("/orders/:id", get(get_order))
        .route("/orders/:id/cancel", put(cancel_order))
        .route("/orders/:id/status", put(update_order_status))
        .route("/products", get(list_products).post(create_product))
        .route("/products/:id", get(get_product).put(update_product))
        .route("/health", get(health_check))
        .with_state(state)
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
}

// Malformed bodies, ids and query strings share the validation error shape
// instead of axum's plain-text rejections.
fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| AppError::Validation(rejection.body_text()))
}

fn path<T>(segment: Result<Path<T>, PathRejection>) -> Result<T, AppError> {
    segment
        .map(|Path(value)| value)
        .map_err(|rejection| AppError::Validation(rejection.body_text()))
}

fn query<T>(params: Result<Query<T>, QueryRejection>) -> Result<T, AppError> {
    params
        .map(|Query(value)| value)
        .map_err(|rejection| AppError::Validation(rejection.body_text()))
}

pub async fn create_order(
    State(state): State<AppState>,
    Authenticated(identity): Authenticated,
    payload: Result<Json<PlaceOrderRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Order>), AppError> {
    let order = PlaceOrder::try_from(body(payload)?)?;
    let placed = state.orders.place_order(&identity, order).await?;
    Ok((StatusCode::CREATED, Json(placed)))
}

pub async fn list_my_orders(
    State(state): State<AppState>,
    Authenticated(identity): Authenticated,
) -> Result<Json<Vec<Order>>, AppError> {
    Ok(Json(state.orders.my_orders(&identity).await?))
}

pub async fn list_all_orders(
    State(state): State<AppState>,
    Authenticated(identity): Authenticated,
) -> Result<Json<Vec<Order>>, AppError> {
    Ok(Json(state.orders.all_orders(&identity).await?))
}

pub async fn get_order(
    State(state): State<AppState>,
    Authenticated(identity): Authenticated,
    order_id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Order>, AppError> {
    Ok(Json(state.orders.order(&identity, path(order_id)?).await?))
}

pub async fn cancel_order(
    State(state): State<AppState>,
    Authenticated(identity): Authenticated,
    order_id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Order>, AppError> {
    Ok(Json(state.orders.cancel(&identity, path(order_id)?).await?))
}

pub async fn update_order_status(
    State(state): State<AppState>,
    Authenticated(identity): Authenticated,
    order_id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<StatusUpdate>, JsonRejection>,
) -> Result<Json<Order>, AppError> {
    let order_id = path(order_id)?;
    let update = body(payload)?;
    Ok(Json(
        state
            .orders
            .set_status(&identity, order_id, update.status)
            .await?,
    ))
}

pub async fn list_products(
    State(state): State<AppState>,
    params: Result<Query<ProductQuery>, QueryRejection>,
) -> Result<Json<ProductPage>, AppError> {
    Ok(Json(state.catalog.list(&query(params)?).await?))
}

pub async fn get_product(
    State(state): State<AppState>,
    product_id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Product>, AppError> {
    Ok(Json(state.catalog.get(path(product_id)?).await?))
}

pub async fn create_product(
    State(state): State<AppState>,
    Authenticated(identity): Authenticated,
    payload: Result<Json<CreateProduct>, JsonRejection>,
) -> Result<(StatusCode, Json<Product>), AppError> {
    let product = state.catalog.create(&identity, body(payload)?).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

pub async fn update_product(
    State(state): State<AppState>,
    Authenticated(identity): Authenticated,
    product_id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<UpdateProduct>, JsonRejection>,
) -> Result<Json<Product>, AppError> {
    let product = state
        .catalog
        .update(&identity, path(product_id)?, body(payload)?)
        .await?;
    Ok(Json(product))
}

pub async fn health_check() -> &'static str {
    "OK"
}

use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use uuid::Uuid;
use warp::http::StatusCode;
use warp::{Filter, Reply};

use crate::core::{HealthChecker, Metrics};
use crate::error::{MarketError, MarketResult};
use crate::external::ContentRegistry;
use crate::library::OwnershipVerifier;
use crate::library::VerifyOptions;
use crate::marketplace::store::{Currency, ListingFilter, ListingStatus};
use crate::marketplace::{
    AnalyticsAggregator, CreateListingRequest, ListingStore, MarketplaceProcessor,
};

#[derive(Clone)]
pub struct AppState {
    pub processor: Arc<MarketplaceProcessor>,
    pub listings: Arc<ListingStore>,
    pub verifier: Arc<OwnershipVerifier>,
    pub analytics: Arc<AnalyticsAggregator>,
    pub registry: Arc<dyn ContentRegistry>,
    pub health: Arc<HealthChecker>,
    pub metrics: Arc<Metrics>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Serialize)]
struct ErrorDetail {
    kind: &'static str,
    message: String,
    retryable: bool,
}

fn reply_result<T: Serialize>(result: MarketResult<T>) -> warp::reply::WithStatus<warp::reply::Json> {
    match result {
        Ok(value) => warp::reply::with_status(warp::reply::json(&value), StatusCode::OK),
        Err(e) => reply_error(e),
    }
}

fn reply_error(e: MarketError) -> warp::reply::WithStatus<warp::reply::Json> {
    let status =
        StatusCode::from_u16(e.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        tracing::error!("Request failed: {}", e);
    }
    let body = ErrorBody {
        error: ErrorDetail {
            kind: e.kind(),
            message: e.to_string(),
            retryable: e.is_retryable(),
        },
    };
    warp::reply::with_status(warp::reply::json(&body), status)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateListingBody {
    seller: String,
    content_ref: String,
    quantity: i64,
    price: f64,
    currency: Currency,
    expires_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PurchaseBody {
    buyer: String,
    #[serde(default = "default_quantity")]
    quantity: i64,
}

fn default_quantity() -> i64 {
    1
}

#[derive(Debug, Deserialize)]
struct CallerBody {
    caller: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PriceBody {
    caller: String,
    new_price: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ListQuery {
    page: i64,
    limit: i64,
    status: Option<String>,
    currency: Option<String>,
    content_ref: Option<String>,
    max_price: Option<f64>,
    show_all: bool,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            page: 1,
            limit: 10,
            status: None,
            currency: None,
            content_ref: None,
            max_price: None,
            show_all: false,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VerifyBody {
    content_ref: String,
    owner: String,
    #[serde(default)]
    force_reverify: bool,
    #[serde(default)]
    include_history: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VerifyBatchBody {
    owner: String,
    #[serde(default)]
    force_reverify: bool,
    #[serde(default)]
    include_history: bool,
}

pub fn routes(
    state: AppState,
) -> impl Filter<Extract = (impl Reply,), Error = warp::Rejection> + Clone {
    let create_listing = warp::path!("listings")
        .and(warp::post())
        .and(with_state(state.clone()))
        .and(warp::body::json())
        .and_then(handle_create_listing);

    let get_listing = warp::path!("listings" / Uuid)
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(handle_get_listing);

    let list_listings = warp::path!("listings")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and(warp::query::<ListQuery>())
        .and_then(handle_list_listings);

    let purchase = warp::path!("listings" / Uuid / "purchase")
        .and(warp::post())
        .and(with_state(state.clone()))
        .and(warp::body::json())
        .and_then(handle_purchase);

    let cancel = warp::path!("listings" / Uuid / "cancel")
        .and(warp::post())
        .and(with_state(state.clone()))
        .and(warp::body::json())
        .and_then(handle_cancel);

    let update_price = warp::path!("listings" / Uuid / "price")
        .and(warp::patch())
        .and(with_state(state.clone()))
        .and(warp::body::json())
        .and_then(handle_update_price);

    let by_token = warp::path!("tokens" / String / String / "listings")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and(warp::query::<ListQuery>())
        .and_then(handle_listings_by_token);

    let by_seller = warp::path!("sellers" / String / "listings")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and(warp::query::<ListQuery>())
        .and_then(handle_listings_by_seller);

    let analytics = warp::path!("analytics")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(handle_analytics);

    let verify = warp::path!("verify")
        .and(warp::post())
        .and(with_state(state.clone()))
        .and(warp::body::json())
        .and_then(handle_verify);

    let verify_batch = warp::path!("verify" / "batch")
        .and(warp::post())
        .and(with_state(state.clone()))
        .and(warp::body::json())
        .and_then(handle_verify_batch);

    let health = warp::path!("health")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(handle_health);

    let metrics = warp::path!("metrics")
        .and(warp::get())
        .and(with_state(state))
        .and_then(handle_metrics);

    create_listing
        .or(purchase)
        .or(cancel)
        .or(update_price)
        .or(get_listing)
        .or(list_listings)
        .or(by_token)
        .or(by_seller)
        .or(analytics)
        .or(verify_batch)
        .or(verify)
        .or(health)
        .or(metrics)
}

fn with_state(
    state: AppState,
) -> impl Filter<Extract = (AppState,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

async fn handle_create_listing(
    state: AppState,
    body: CreateListingBody,
) -> Result<impl Reply, Infallible> {
    let request = CreateListingRequest {
        content_ref: body.content_ref,
        quantity: body.quantity,
        price: body.price,
        currency: body.currency,
        expires_at: body.expires_at,
    };
    Ok(reply_result(
        state.processor.create_listing(&body.seller, request).await,
    ))
}

async fn handle_get_listing(id: Uuid, state: AppState) -> Result<impl Reply, Infallible> {
    Ok(reply_result(state.processor.get_listing(id).await))
}

async fn handle_list_listings(
    state: AppState,
    query: ListQuery,
) -> Result<impl Reply, Infallible> {
    let status = match query.status.as_deref() {
        Some(s) => match ListingStatus::parse(s) {
            Some(status) => Some(status),
            None => {
                return Ok(reply_error(MarketError::Validation(format!(
                    "unknown status: {}",
                    s
                ))))
            }
        },
        None => None,
    };
    let currency = match query.currency.as_deref() {
        Some(c) => match Currency::parse(c) {
            Some(currency) => Some(currency),
            None => {
                return Ok(reply_error(MarketError::Validation(format!(
                    "unknown currency: {}",
                    c
                ))))
            }
        },
        None => None,
    };

    let filter = ListingFilter {
        status,
        currency,
        content_ref: query.content_ref,
        max_price: query.max_price,
    };
    Ok(reply_result(
        state.listings.list(&filter, query.page, query.limit).await,
    ))
}

async fn handle_purchase(
    id: Uuid,
    state: AppState,
    body: PurchaseBody,
) -> Result<impl Reply, Infallible> {
    Ok(reply_result(
        state.processor.purchase(id, &body.buyer, body.quantity).await,
    ))
}

async fn handle_cancel(
    id: Uuid,
    state: AppState,
    body: CallerBody,
) -> Result<impl Reply, Infallible> {
    Ok(reply_result(state.processor.cancel(id, &body.caller).await))
}

async fn handle_update_price(
    id: Uuid,
    state: AppState,
    body: PriceBody,
) -> Result<impl Reply, Infallible> {
    Ok(reply_result(
        state
            .processor
            .update_price(id, &body.caller, body.new_price)
            .await,
    ))
}

async fn handle_listings_by_token(
    contract: String,
    token_id: String,
    state: AppState,
    query: ListQuery,
) -> Result<impl Reply, Infallible> {
    Ok(reply_result(
        state
            .listings
            .list_by_token(&contract, &token_id, query.page, query.limit)
            .await,
    ))
}

async fn handle_listings_by_seller(
    seller: String,
    state: AppState,
    query: ListQuery,
) -> Result<impl Reply, Infallible> {
    Ok(reply_result(
        state
            .listings
            .list_by_seller(&seller, query.show_all, query.page, query.limit)
            .await,
    ))
}

async fn handle_analytics(state: AppState) -> Result<impl Reply, Infallible> {
    Ok(reply_result(state.analytics.snapshot().await))
}

async fn handle_verify(state: AppState, body: VerifyBody) -> Result<impl Reply, Infallible> {
    let entry = match state.registry.resolve(&body.content_ref).await {
        Ok(entry) => entry,
        Err(e) => return Ok(reply_error(e)),
    };

    let opts = VerifyOptions {
        force_reverify: body.force_reverify,
        include_history: body.include_history,
    };
    Ok(reply_result(
        state
            .verifier
            .verify_ownership(&body.content_ref, &body.owner, &entry.token_ref, &opts)
            .await,
    ))
}

async fn handle_verify_batch(
    state: AppState,
    body: VerifyBatchBody,
) -> Result<impl Reply, Infallible> {
    let opts = VerifyOptions {
        force_reverify: body.force_reverify,
        include_history: body.include_history,
    };
    Ok(reply_result(
        state.verifier.verify_library(&body.owner, &opts).await,
    ))
}

async fn handle_health(state: AppState) -> Result<impl Reply, Infallible> {
    let status = state.health.get_status().await;
    Ok(warp::reply::with_status(
        warp::reply::json(&status),
        StatusCode::OK,
    ))
}

async fn handle_metrics(state: AppState) -> Result<impl Reply, Infallible> {
    Ok(warp::reply::with_header(
        state.metrics.export(),
        "content-type",
        "text/plain; version=0.0.4",
    ))
}

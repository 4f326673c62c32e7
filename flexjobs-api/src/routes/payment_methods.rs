/// Stored payment methods and billing addresses
///
/// All routes require a token and only ever touch the caller's own rows.
/// Every change that moves the default runs in one transaction with the
/// write it belongs to.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware,
    routing::{get, put},
    Extension, Json, Router,
};
use chrono::{Datelike, Utc};
use flexjobs_shared::{
    auth::middleware::{authenticate, AuthContext},
    db::query::Changes,
    models::{
        payment::{
            BillingAddress, CreateBillingAddress, CreatePaymentMethod, PaymentMethod, PaymentType,
        },
        subscription::UserSubscription,
    },
};
use serde::Deserialize;
use serde_json::{json, Value};
use validator::{Validate, ValidationError};

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::ValidatedJson,
};

const DEFAULT_COUNTRY: &str = "USA";
const EXPIRY_YEARS_AHEAD: i32 = 20;

pub fn routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(list_methods).post(create_method))
        .route("/billing-addresses", get(list_addresses).post(create_address))
        .route("/:id", put(update_method).delete(delete_method))
        .route("/:id/set-default", put(set_default))
        .route_layer(middleware::from_fn_with_state(state.auth_state(), authenticate))
}

fn four_digits(value: &str) -> Result<(), ValidationError> {
    if value.len() == 4 && value.bytes().all(|b| b.is_ascii_digit()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("four_digits");
        err.message = Some("Last four digits must be exactly 4 digits".into());
        Err(err)
    }
}

/// Cards may expire this year through twenty years out
fn valid_expiry_year(year: i32) -> Result<(), ValidationError> {
    let current = Utc::now().year();
    if (current..=current + EXPIRY_YEARS_AHEAD).contains(&year) {
        Ok(())
    } else {
        let mut err = ValidationError::new("expiry_year");
        err.message = Some(
            format!("Expiry year must be between {} and {}", current, current + EXPIRY_YEARS_AHEAD).into(),
        );
        Err(err)
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateMethodRequest {
    pub payment_type: PaymentType,

    #[validate(length(min = 1, max = 20, message = "Card brand must be 1-20 characters"))]
    pub card_brand: Option<String>,

    #[validate(custom(function = "four_digits"))]
    pub last_four_digits: String,

    #[validate(length(min = 1, max = 255, message = "Cardholder name is required"))]
    pub cardholder_name: String,

    #[validate(range(min = 1, max = 12, message = "Expiry month must be between 1 and 12"))]
    pub expiry_month: i32,

    #[validate(custom(function = "valid_expiry_year"))]
    pub expiry_year: i32,

    #[validate(length(max = 255))]
    pub billing_address_line1: Option<String>,
    #[validate(length(max = 255))]
    pub billing_address_line2: Option<String>,
    #[validate(length(max = 100))]
    pub billing_city: Option<String>,
    #[validate(length(max = 50))]
    pub billing_state: Option<String>,
    #[validate(length(max = 20))]
    pub billing_postal_code: Option<String>,

    #[validate(length(min = 2, max = 3, message = "Country must be a 2-3 letter code"))]
    pub billing_country: Option<String>,

    #[serde(default)]
    pub is_default: bool,
}

impl From<CreateMethodRequest> for CreatePaymentMethod {
    fn from(req: CreateMethodRequest) -> Self {
        CreatePaymentMethod {
            payment_type: req.payment_type,
            card_brand: req.card_brand.map(|b| b.trim().to_string()),
            last_four_digits: req.last_four_digits,
            cardholder_name: req.cardholder_name.trim().to_string(),
            expiry_month: req.expiry_month,
            expiry_year: req.expiry_year,
            billing_address_line1: req.billing_address_line1,
            billing_address_line2: req.billing_address_line2,
            billing_city: req.billing_city,
            billing_state: req.billing_state,
            billing_postal_code: req.billing_postal_code,
            billing_country: req
                .billing_country
                .unwrap_or_else(|| DEFAULT_COUNTRY.to_string()),
            is_default: req.is_default,
        }
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateMethodRequest {
    #[validate(length(min = 1, max = 255, message = "Cardholder name must be 1-255 characters"))]
    pub cardholder_name: Option<String>,

    #[validate(range(min = 1, max = 12, message = "Expiry month must be between 1 and 12"))]
    pub expiry_month: Option<i32>,

    #[validate(custom(function = "valid_expiry_year"))]
    pub expiry_year: Option<i32>,

    #[validate(length(max = 255))]
    pub billing_address_line1: Option<String>,
    #[validate(length(max = 255))]
    pub billing_address_line2: Option<String>,
    #[validate(length(max = 100))]
    pub billing_city: Option<String>,
    #[validate(length(max = 50))]
    pub billing_state: Option<String>,
    #[validate(length(max = 20))]
    pub billing_postal_code: Option<String>,

    #[validate(length(min = 2, max = 3, message = "Country must be a 2-3 letter code"))]
    pub billing_country: Option<String>,

    pub is_default: Option<bool>,
}

impl UpdateMethodRequest {
    /// Column changes, with the default flag returned separately
    fn split(self) -> (Changes, Option<bool>) {
        let mut changes = Changes::new();
        changes
            .set_opt("cardholder_name", self.cardholder_name.map(|n| n.trim().to_string()))
            .set_opt("expiry_month", self.expiry_month)
            .set_opt("expiry_year", self.expiry_year)
            .set_opt("billing_address_line1", self.billing_address_line1)
            .set_opt("billing_address_line2", self.billing_address_line2)
            .set_opt("billing_city", self.billing_city)
            .set_opt("billing_state", self.billing_state)
            .set_opt("billing_postal_code", self.billing_postal_code)
            .set_opt("billing_country", self.billing_country);
        (changes, self.is_default)
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateAddressRequest {
    #[validate(length(max = 100))]
    pub address_name: Option<String>,

    #[validate(length(min = 1, max = 255, message = "Address line 1 is required"))]
    pub address_line1: String,

    #[validate(length(max = 255))]
    pub address_line2: Option<String>,

    #[validate(length(min = 1, max = 100, message = "City is required"))]
    pub city: String,

    #[validate(length(min = 1, max = 50, message = "State is required"))]
    pub state: String,

    #[validate(length(min = 1, max = 20, message = "Postal code is required"))]
    pub postal_code: String,

    #[validate(length(min = 2, max = 3, message = "Country must be a 2-3 letter code"))]
    pub country: Option<String>,

    #[serde(default)]
    pub is_default: bool,
}

pub async fn list_methods(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Value>> {
    let methods = PaymentMethod::list_for_user(&state.db, auth.user_id).await?;
    Ok(Json(json!({ "paymentMethods": methods })))
}

pub async fn create_method(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ValidatedJson(req): ValidatedJson<CreateMethodRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let mut tx = state.db.begin().await?;
    let method = PaymentMethod::create(&mut tx, auth.user_id, req.into()).await?;
    tx.commit().await?;

    tracing::info!(payment_method_id = method.id, user_id = %auth.user_id, is_default = method.is_default, "Payment method added");

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Payment method added successfully",
            "paymentMethod": method,
        })),
    ))
}

pub async fn update_method(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<i64>,
    ValidatedJson(req): ValidatedJson<UpdateMethodRequest>,
) -> ApiResult<Json<Value>> {
    let (changes, make_default) = req.split();
    if changes.is_empty() && make_default.is_none() {
        return Err(ApiError::BadRequest("No valid fields to update".to_string()));
    }

    let mut tx = state.db.begin().await?;
    PaymentMethod::find_owned(&mut tx, id, auth.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Payment method not found".to_string()))?;

    let method = PaymentMethod::update(&mut tx, id, auth.user_id, &changes, make_default)
        .await?
        .ok_or_else(|| ApiError::NotFound("Payment method not found".to_string()))?;
    tx.commit().await?;

    tracing::info!(payment_method_id = id, user_id = %auth.user_id, "Payment method updated");

    Ok(Json(json!({
        "message": "Payment method updated successfully",
        "paymentMethod": method,
    })))
}

pub async fn delete_method(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Value>> {
    let mut tx = state.db.begin().await?;
    let method = PaymentMethod::find_owned(&mut tx, id, auth.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Payment method not found".to_string()))?;

    if UserSubscription::is_billed_to(&mut tx, auth.user_id, &method.label()).await? {
        return Err(ApiError::BadRequest(
            "Cannot delete payment method that is being used for active subscription".to_string(),
        ));
    }

    let promoted = PaymentMethod::deactivate(&mut tx, &method).await?;
    tx.commit().await?;

    tracing::info!(payment_method_id = id, promoted_default = ?promoted, user_id = %auth.user_id, "Payment method deleted");

    Ok(Json(json!({ "message": "Payment method deleted successfully" })))
}

pub async fn set_default(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Value>> {
    let mut tx = state.db.begin().await?;
    PaymentMethod::find_owned(&mut tx, id, auth.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Payment method not found".to_string()))?;

    let method = PaymentMethod::set_default(&mut tx, id, auth.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Payment method not found".to_string()))?;
    tx.commit().await?;

    Ok(Json(json!({
        "message": "Default payment method updated successfully",
        "paymentMethod": method,
    })))
}

pub async fn list_addresses(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Value>> {
    let addresses = BillingAddress::list_for_user(&state.db, auth.user_id).await?;
    Ok(Json(json!({ "billingAddresses": addresses })))
}

pub async fn create_address(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ValidatedJson(req): ValidatedJson<CreateAddressRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let data = CreateBillingAddress {
        address_name: req.address_name,
        address_line1: req.address_line1.trim().to_string(),
        address_line2: req.address_line2,
        city: req.city.trim().to_string(),
        state: req.state.trim().to_string(),
        postal_code: req.postal_code.trim().to_string(),
        country: req.country.unwrap_or_else(|| DEFAULT_COUNTRY.to_string()),
        is_default: req.is_default,
    };

    let mut tx = state.db.begin().await?;
    let address = BillingAddress::create(&mut tx, auth.user_id, data).await?;
    tx.commit().await?;

    tracing::info!(billing_address_id = address.id, user_id = %auth.user_id, "Billing address added");

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Billing address added successfully",
            "billingAddress": address,
        })),
    ))
}

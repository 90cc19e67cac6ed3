use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::errors::DomainError;
use crate::record::check_order_uid;

/// Full order document as published on the order stream.
///
/// Keys are PascalCase to match the producers already in the field. Absent
/// fields fall back to their defaults; a field present with the wrong JSON
/// type fails the parse.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "PascalCase", default)]
pub struct Order {
    #[serde(rename = "OrderUID")]
    #[validate(custom(function = "validate_order_uid"))]
    pub order_uid: String,
    pub track_number: String,
    pub entry: String,
    pub delivery: Delivery,
    pub payment: Payment,
    pub items: Vec<Item>,
    pub locale: String,
    pub internal_signature: String,
    #[serde(rename = "CustomerID")]
    pub customer_id: String,
    pub delivery_service: String,
    pub shard_key: String,
    #[serde(rename = "SmID")]
    pub sm_id: i64,
    pub date_created: Option<DateTime<Utc>>,
    pub oof_shard: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Delivery {
    #[serde(rename = "DeliveryID")]
    pub delivery_id: i64,
    pub name: String,
    pub phone: String,
    pub zip: String,
    pub city: String,
    pub address: String,
    pub region: String,
    pub email: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Payment {
    pub transaction: String,
    #[serde(rename = "RequestID")]
    pub request_id: String,
    pub currency: String,
    pub provider: String,
    pub amount: i64,
    pub payment_dt: i64,
    pub bank: String,
    pub delivery_cost: i64,
    pub goods_total: i64,
    pub custom_fee: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Item {
    #[serde(rename = "ChrtID")]
    pub chrt_id: i64,
    pub track_number: String,
    pub price: i64,
    pub rid: String,
    pub name: String,
    pub sale: i64,
    pub size: String,
    pub total_price: i64,
    #[serde(rename = "NmID")]
    pub nm_id: i64,
    pub brand: String,
    pub status: i64,
}

impl Order {
    /// Parse and validate an order document from raw bytes
    pub fn from_slice(payload: &[u8]) -> Result<Self, DomainError> {
        let order: Order = serde_json::from_slice(payload)?;
        order
            .validate()
            .map_err(|e| DomainError::Validation(e.to_string()))?;
        Ok(order)
    }
}

fn validate_order_uid(order_uid: &str) -> Result<(), ValidationError> {
    check_order_uid(order_uid).map_err(|reason| {
        let mut err = ValidationError::new("order_uid");
        err.message = Some(reason.into());
        err
    })
}

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

use crate::errors::DomainError;
use crate::order::Order;

/// Producer-assigned order identifier. Any non-empty string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OrderUid(String);

impl OrderUid {
    pub fn parse(value: &str) -> Result<Self, DomainError> {
        check_order_uid(value).map_err(|reason| DomainError::Validation(reason.to_string()))?;
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for OrderUid {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for OrderUid {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for OrderUid {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        check_order_uid(&value).map_err(|reason| DomainError::Validation(reason.to_string()))?;
        Ok(Self(value))
    }
}

impl From<OrderUid> for String {
    fn from(uid: OrderUid) -> Self {
        uid.0
    }
}

pub(crate) fn check_order_uid(value: &str) -> Result<(), &'static str> {
    if value.is_empty() {
        return Err("OrderUID cannot be empty");
    }
    Ok(())
}

/// The persisted and cached unit: an order's raw document plus the key
/// extracted from it.
///
/// The payload is kept byte-for-byte as received and is otherwise opaque:
/// only `OrderUID` is read from it, so a record can never carry a key that
/// disagrees with its document. The rest of the document is not checked
/// against [`Order`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderRecord {
    order_uid: OrderUid,
    payload: Vec<u8>,
}

impl OrderRecord {
    /// Build a record from a document, taking the key from the document itself
    pub fn from_payload(payload: Vec<u8>) -> Result<Self, DomainError> {
        let key: PayloadKey = serde_json::from_slice(&payload)?;
        let order_uid = OrderUid::parse(&key.order_uid)?;
        Ok(Self { order_uid, payload })
    }

    /// Build a record for a known key, rejecting documents that carry a different one
    pub fn with_key(key: &str, payload: Vec<u8>) -> Result<Self, DomainError> {
        let record = Self::from_payload(payload)?;
        if record.order_uid.as_str() != key {
            return Err(DomainError::KeyMismatch {
                expected: key.to_string(),
                actual: record.order_uid.into(),
            });
        }
        Ok(record)
    }

    pub fn order_uid(&self) -> &OrderUid {
        &self.order_uid
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Parse the stored document into the full order shape
    pub fn order(&self) -> Result<Order, DomainError> {
        Order::from_slice(&self.payload)
    }
}

/// The only part of a payload ingestion looks at
#[derive(Deserialize)]
struct PayloadKey {
    #[serde(rename = "OrderUID", default)]
    order_uid: String,
}

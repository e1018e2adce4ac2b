//! Request validation.
//!
//! Turns raw request parts (path user id, `Source-Type` header, JSON body)
//! into a typed [`ValidatedTransaction`]. Checks run in a fixed order and
//! the first failure wins; nothing here touches the store.

use serde::Deserialize;
use thiserror::Error;

use crate::amount::{Amount, AmountError};
use crate::ledger::{SourceType, TransactionRequest, TransactionState, UserId};

/// Validation failures, each with a stable wire code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("User ID must be a positive integer")]
    InvalidUserId,

    #[error("Source-Type header is required")]
    MissingSourceType,

    #[error("Source-Type must be one of: game, server, payment")]
    InvalidSourceType,

    #[error("Invalid JSON format")]
    InvalidBody,

    #[error("State field is required")]
    MissingState,

    #[error("State must be 'win' or 'lose'")]
    InvalidState,

    #[error("TransactionId field is required")]
    MissingTransactionId,

    #[error("{0}")]
    InvalidAmount(AmountError),
}

impl ValidationError {
    /// Machine-readable code reported alongside the message.
    pub fn code(&self) -> &'static str {
        match self {
            ValidationError::InvalidUserId => "invalid_user_id",
            ValidationError::MissingSourceType => "missing_header",
            ValidationError::InvalidSourceType => "invalid_source_type",
            ValidationError::InvalidBody => "invalid_request_body",
            ValidationError::MissingState => "missing_state",
            ValidationError::InvalidState => "invalid_state",
            ValidationError::MissingTransactionId => "missing_transaction_id",
            ValidationError::InvalidAmount(_) => "invalid_amount",
        }
    }
}

/// A transaction request that passed every check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedTransaction {
    pub user_id: UserId,
    pub source_type: SourceType,
    pub request: TransactionRequest,
}

/// Wire shape of the transaction body. Every field is optional here so that
/// absence is reported by the ordered checks rather than by the decoder.
#[derive(Debug, Default, Deserialize)]
struct TransactionBody {
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    amount: Option<String>,
    #[serde(default, rename = "transactionId")]
    transaction_id: Option<String>,
}

/// Decode the body as a JSON object. Arrays would otherwise bind to the
/// fields by position.
fn decode_body(body: &[u8]) -> Result<TransactionBody, ValidationError> {
    match serde_json::from_slice(body) {
        Ok(value @ serde_json::Value::Object(_)) => {
            serde_json::from_value(value).map_err(|_| ValidationError::InvalidBody)
        }
        _ => Err(ValidationError::InvalidBody),
    }
}

/// Parse a path user id. ASCII digits only, no sign.
pub fn parse_user_id(raw: &str) -> Result<UserId, ValidationError> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ValidationError::InvalidUserId);
    }
    raw.parse().map_err(|_| ValidationError::InvalidUserId)
}

/// Parse the `Source-Type` header. An empty value counts as missing.
pub fn parse_source_type(raw: Option<&str>) -> Result<SourceType, ValidationError> {
    match raw {
        None | Some("") => Err(ValidationError::MissingSourceType),
        Some(value) => SourceType::parse(value).ok_or(ValidationError::InvalidSourceType),
    }
}

/// Validate every part of a transaction request.
///
/// Precedence: user id, source type, body syntax, state, transaction id,
/// amount.
///
/// # Examples
///
/// ```
/// use balance_core::validation::{validate_transaction, ValidationError};
///
/// let body = br#"{"state": "win", "amount": "10.123", "transactionId": "tx-1"}"#;
/// let err = validate_transaction("1", Some("game"), body).unwrap_err();
/// assert_eq!(err.code(), "invalid_amount");
/// assert_eq!(err.to_string(), "amount can have at most 2 decimal places");
/// ```
pub fn validate_transaction(
    raw_user_id: &str,
    source_type: Option<&str>,
    body: &[u8],
) -> Result<ValidatedTransaction, ValidationError> {
    let user_id = parse_user_id(raw_user_id)?;
    let source_type = parse_source_type(source_type)?;

    let body = decode_body(body)?;

    let state = match body.state.as_deref() {
        None | Some("") => return Err(ValidationError::MissingState),
        Some(state) => TransactionState::parse(state).ok_or(ValidationError::InvalidState)?,
    };

    let transaction_id = match body.transaction_id {
        Some(id) if !id.is_empty() => id,
        _ => return Err(ValidationError::MissingTransactionId),
    };

    let amount = Amount::parse_transaction(body.amount.as_deref().unwrap_or(""))
        .map_err(ValidationError::InvalidAmount)?;

    Ok(ValidatedTransaction {
        user_id,
        source_type,
        request: TransactionRequest {
            state,
            amount,
            transaction_id,
        },
    })
}

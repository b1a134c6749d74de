//! Payme merchant API envelope: JSON-RPC requests, results and localized
//! errors.

use be_remote_db::DbError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Deserialize)]
pub struct RpcRequest {
    pub method: String,
    #[serde(default)]
    pub params: RpcParams,
    #[serde(default)]
    pub id: Value,
}

#[derive(Debug, Default, Deserialize)]
pub struct RpcParams {
    /// Gateway transaction id.
    pub id: Option<String>,
    /// Gateway timestamp in milliseconds.
    pub time: Option<i64>,
    pub amount: Option<serde_json::Number>,
    pub account: Option<Account>,
    pub reason: Option<i32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Account {
    pub order_id: Option<String>,
}

impl RpcParams {
    pub fn order_id(&self) -> Option<&str> {
        self.account
            .as_ref()
            .and_then(|account| account.order_id.as_deref())
            .filter(|id| !id.is_empty())
    }

    pub fn transaction_id(&self) -> Option<&str> {
        self.id.as_deref().filter(|id| !id.is_empty())
    }

    /// Compares the request amount with the stored one; a missing amount
    /// never matches.
    pub fn amount_matches(&self, stored: i64) -> bool {
        match &self.amount {
            Some(amount) => match amount.as_i64() {
                Some(value) => value == stored,
                None => amount.as_f64() == Some(stored as f64),
            },
            None => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RpcResult {
    CheckPerform {
        allow: bool,
    },
    Create {
        create_time: i64,
        transaction: String,
        state: i16,
    },
    Perform {
        transaction: String,
        perform_time: i64,
        state: i16,
    },
    Cancel {
        transaction: String,
        cancel_time: i64,
        state: i16,
        reason: Option<i32>,
    },
    Check {
        create_time: i64,
        perform_time: i64,
        cancel_time: i64,
        transaction: Option<String>,
        state: i16,
        reason: Option<i32>,
    },
    Statement {
        transactions: Vec<Value>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LocalizedMessage {
    pub ru: &'static str,
    pub uz: &'static str,
    pub en: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RpcError {
    pub code: i32,
    pub message: LocalizedMessage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<&'static str>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RpcResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<RpcResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
    pub id: Value,
}

impl RpcResponse {
    pub fn result(result: RpcResult, id: Value) -> Self {
        Self {
            result: Some(result),
            error: None,
            id,
        }
    }

    pub fn error(error: &WebhookError, id: Value) -> Self {
        Self {
            result: None,
            error: Some(error.to_rpc()),
            id,
        }
    }
}

const PARSE_ERROR: &str = "Parse error";
const INVALID_REQUEST: &str = "Invalid request";
const UNAUTHORIZED: &str = "Insufficient privileges to perform the method";
const METHOD_NOT_FOUND: &str = "Method not found";
const ORDER_NOT_FOUND: &str = "Order not found";
const INVALID_AMOUNT: &str = "Invalid amount";
const CANNOT_PERFORM: &str = "Unable to perform operation";
const CANNOT_CANCEL: &str = "Order completed, transaction cannot be canceled";
const INTERNAL_ERROR: &str = "Internal error";

/// Failures reported to the gateway. The display text is the English message.
#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    #[error("{}", PARSE_ERROR)]
    Parse,

    #[error("{}", INVALID_REQUEST)]
    InvalidRequest,

    #[error("{}", UNAUTHORIZED)]
    Unauthorized,

    #[error("{}", METHOD_NOT_FOUND)]
    MethodNotFound,

    #[error("{}", ORDER_NOT_FOUND)]
    OrderNotFound,

    #[error("{}", INVALID_AMOUNT)]
    InvalidAmount,

    #[error("{}", CANNOT_PERFORM)]
    CannotPerform,

    #[error("{}", CANNOT_CANCEL)]
    CannotCancel,

    #[error("{}", INTERNAL_ERROR)]
    Internal(#[source] DbError),
}

impl From<DbError> for WebhookError {
    fn from(err: DbError) -> Self {
        WebhookError::Internal(err)
    }
}

impl WebhookError {
    pub fn code(&self) -> i32 {
        match self {
            WebhookError::Parse => -32700,
            WebhookError::InvalidRequest => -32600,
            WebhookError::Unauthorized => -32504,
            WebhookError::MethodNotFound => -32601,
            WebhookError::OrderNotFound => -31050,
            WebhookError::InvalidAmount => -31001,
            WebhookError::CannotPerform => -31008,
            WebhookError::CannotCancel => -31007,
            WebhookError::Internal(_) => -32400,
        }
    }

    /// Account errors name the offending request field.
    pub fn data(&self) -> Option<&'static str> {
        match self {
            WebhookError::OrderNotFound => Some("order_id"),
            WebhookError::InvalidAmount => Some("amount"),
            _ => None,
        }
    }

    pub fn message(&self) -> LocalizedMessage {
        let (ru, uz) = match self {
            WebhookError::Parse => ("Ошибка разбора JSON", "JSON tahlil xatosi"),
            WebhookError::InvalidRequest => ("Неверный запрос", "Noto'g'ri so'rov"),
            WebhookError::Unauthorized => (
                "Недостаточно привилегий для выполнения метода",
                "Metodni bajarish uchun huquqlar yetarli emas",
            ),
            WebhookError::MethodNotFound => ("Метод не найден", "Metod topilmadi"),
            WebhookError::OrderNotFound => ("Заказ не найден", "Buyurtma topilmadi"),
            WebhookError::InvalidAmount => ("Неверная сумма", "Noto'g'ri summa"),
            WebhookError::CannotPerform => {
                ("Невозможно выполнить операцию", "Amalni bajarib bo'lmaydi")
            }
            WebhookError::CannotCancel => (
                "Заказ выполнен, невозможно отменить транзакцию",
                "Buyurtma bajarilgan, tranzaksiyani bekor qilib bo'lmaydi",
            ),
            WebhookError::Internal(_) => ("Системная ошибка", "Tizim xatosi"),
        };
        let en = match self {
            WebhookError::Parse => PARSE_ERROR,
            WebhookError::InvalidRequest => INVALID_REQUEST,
            WebhookError::Unauthorized => UNAUTHORIZED,
            WebhookError::MethodNotFound => METHOD_NOT_FOUND,
            WebhookError::OrderNotFound => ORDER_NOT_FOUND,
            WebhookError::InvalidAmount => INVALID_AMOUNT,
            WebhookError::CannotPerform => CANNOT_PERFORM,
            WebhookError::CannotCancel => CANNOT_CANCEL,
            WebhookError::Internal(_) => INTERNAL_ERROR,
        };
        LocalizedMessage { ru, uz, en }
    }

    pub fn to_rpc(&self) -> RpcError {
        RpcError {
            code: self.code(),
            message: self.message(),
            data: self.data(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_errors_carry_field_name() {
        let json = serde_json::to_value(RpcResponse::error(
            &WebhookError::InvalidAmount,
            Value::from(7),
        ))
        .unwrap();
        assert_eq!(json["error"]["code"], -31001);
        assert_eq!(json["error"]["data"], "amount");
        assert_eq!(json["error"]["message"]["en"], "Invalid amount");
        assert_eq!(json["id"], 7);
        assert!(json.get("result").is_none());
    }

    #[test]
    fn protocol_errors_have_no_data() {
        let error = WebhookError::MethodNotFound.to_rpc();
        assert_eq!(error.code, -32601);
        assert_eq!(error.data, None);
        assert_eq!(error.message.en, WebhookError::MethodNotFound.to_string());
    }

    #[test]
    fn english_message_matches_display() {
        let errors = [
            WebhookError::Parse,
            WebhookError::InvalidRequest,
            WebhookError::Unauthorized,
            WebhookError::MethodNotFound,
            WebhookError::OrderNotFound,
            WebhookError::InvalidAmount,
            WebhookError::CannotPerform,
            WebhookError::CannotCancel,
            WebhookError::Internal(DbError::Pool("closed".into())),
        ];
        for error in errors {
            assert_eq!(error.message().en, error.to_string());
        }
    }

    #[test]
    fn amount_comparison_accepts_integral_floats() {
        let params: RpcParams =
            serde_json::from_value(serde_json::json!({ "amount": 50000.0 })).unwrap();
        assert!(params.amount_matches(50_000));
        assert!(!params.amount_matches(49_999));

        let params: RpcParams = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(!params.amount_matches(0));
    }

    #[test]
    fn params_expose_order_and_transaction_ids() {
        let params: RpcParams = serde_json::from_value(serde_json::json!({
            "id": "5305e3bab097f420a62ced0b",
            "account": { "order_id": "order_1" }
        }))
        .unwrap();
        assert_eq!(params.order_id(), Some("order_1"));
        assert_eq!(params.transaction_id(), Some("5305e3bab097f420a62ced0b"));
    }
}

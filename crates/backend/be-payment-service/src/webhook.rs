//! Payme merchant API endpoint.
//!
//! The gateway drives every payment through JSON-RPC calls on one URL. The
//! handler authenticates the call, hands the decoded request to [`dispatch`]
//! and always answers with HTTP 200; failures travel inside the envelope.

use std::sync::Arc;

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::{HeaderMap, header},
};
use base64::{Engine, engine::general_purpose::STANDARD};
use be_remote_db::{LedgerOutcome, Payment, PaymentState};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tracing::{debug, warn};

use crate::{
    AppState,
    rpc::{RpcParams, RpcRequest, RpcResponse, RpcResult, WebhookError},
    store::PaymentLedger,
};

pub async fn handle_webhook<L: PaymentLedger>(
    State(state): State<Arc<AppState<L>>>,
    headers: HeaderMap,
    body: Bytes,
) -> Json<RpcResponse> {
    let parsed = serde_json::from_slice::<Value>(&body);
    let id = parsed
        .as_ref()
        .ok()
        .and_then(|value| value.get("id").cloned())
        .unwrap_or(Value::Null);

    if let Err(err) = authorize(&headers, &state.config.secret_key) {
        warn!(error = %err, "Rejected webhook call without valid credentials");
        return Json(RpcResponse::error(&err, id));
    }

    let request = match parsed.map(serde_json::from_value::<RpcRequest>) {
        Ok(Ok(request)) => request,
        Ok(Err(err)) => {
            warn!(error = %err, "Webhook body is not a valid RPC request");
            return Json(RpcResponse::error(&WebhookError::InvalidRequest, id));
        }
        Err(err) => {
            warn!(error = %err, "Webhook body is not JSON");
            return Json(RpcResponse::error(&WebhookError::Parse, id));
        }
    };

    let method = request.method.clone();
    let now_ms = chrono::Utc::now().timestamp_millis();
    match dispatch(state.ledger.as_ref(), &request, now_ms).await {
        Ok(result) => Json(RpcResponse::result(result, request.id)),
        Err(err) => {
            match &err {
                WebhookError::Internal(source) => {
                    tracing::error!(%method, error = %source, "Webhook call failed")
                }
                _ => warn!(
                    %method,
                    order_id = request.params.order_id(),
                    code = err.code(),
                    "Webhook call rejected"
                ),
            }
            Json(RpcResponse::error(&err, request.id))
        }
    }
}

/// Checks `Authorization: Basic base64(login:password)`. Only the password
/// is compared with the merchant secret.
pub fn authorize(headers: &HeaderMap, secret: &SecretString) -> Result<(), WebhookError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or(WebhookError::Unauthorized)?;

    let encoded = value
        .strip_prefix("Basic ")
        .ok_or(WebhookError::Unauthorized)?;
    let decoded = STANDARD
        .decode(encoded.trim())
        .map_err(|_| WebhookError::Unauthorized)?;
    let credentials = String::from_utf8(decoded).map_err(|_| WebhookError::Unauthorized)?;
    let (_, password) = credentials
        .split_once(':')
        .ok_or(WebhookError::Unauthorized)?;

    if password != secret.expose_secret() {
        return Err(WebhookError::Unauthorized);
    }
    Ok(())
}

/// Runs one authenticated gateway call against the ledger.
pub async fn dispatch<L: PaymentLedger>(
    ledger: &L,
    request: &RpcRequest,
    now_ms: i64,
) -> Result<RpcResult, WebhookError> {
    let params = &request.params;
    debug!(method = %request.method, "Dispatching webhook call");

    match request.method.as_str() {
        "CheckPerformTransaction" => {
            let payment = find_payment(ledger, params).await?;
            ensure_amount(params, &payment)?;
            Ok(RpcResult::CheckPerform { allow: true })
        }
        "CreateTransaction" => {
            let payment = find_payment(ledger, params).await?;
            ensure_amount(params, &payment)?;
            let transaction_id = params.transaction_id().ok_or(WebhookError::InvalidRequest)?;
            let time_ms = params.time.unwrap_or(now_ms);

            let outcome = ledger
                .create_transaction(&payment.order_id, transaction_id, time_ms)
                .await?;
            let payment = settled(outcome, WebhookError::CannotPerform)?;
            Ok(RpcResult::Create {
                create_time: payment.create_time.unwrap_or(time_ms),
                transaction: transaction_label(&payment),
                state: payment.state.code(),
            })
        }
        "PerformTransaction" => {
            let payment = find_payment(ledger, params).await?;
            let outcome = ledger
                .perform_transaction(&payment.order_id, now_ms)
                .await?;
            let payment = settled(outcome, WebhookError::CannotPerform)?;
            Ok(RpcResult::Perform {
                transaction: transaction_label(&payment),
                perform_time: payment.perform_time.unwrap_or(now_ms),
                state: payment.state.code(),
            })
        }
        "CancelTransaction" => {
            let payment = find_payment(ledger, params).await?;
            let outcome = ledger
                .cancel_transaction(&payment.order_id, params.reason, now_ms)
                .await?;
            let payment = settled(outcome, WebhookError::CannotCancel)?;
            Ok(RpcResult::Cancel {
                transaction: transaction_label(&payment),
                cancel_time: payment.cancel_time.unwrap_or(now_ms),
                state: payment.state.code(),
                reason: payment.reason,
            })
        }
        "CheckTransaction" => Ok(match lookup_payment(ledger, params).await? {
            Some(payment) => RpcResult::Check {
                create_time: payment.create_time.unwrap_or(0),
                perform_time: payment.perform_time.unwrap_or(0),
                cancel_time: payment.cancel_time.unwrap_or(0),
                transaction: Some(transaction_label(&payment)),
                state: payment.state.code(),
                reason: payment.reason,
            },
            None => RpcResult::Check {
                create_time: 0,
                perform_time: 0,
                cancel_time: 0,
                transaction: params.transaction_id().map(str::to_string),
                state: PaymentState::Pending.code(),
                reason: None,
            },
        }),
        "GetStatement" => Ok(RpcResult::Statement {
            transactions: Vec::new(),
        }),
        _ => Err(WebhookError::MethodNotFound),
    }
}

/// Finds the payment by `account.order_id`. Only calls without an order id
/// (they carry just `params.id`) are resolved by gateway transaction id.
async fn lookup_payment<L: PaymentLedger>(
    ledger: &L,
    params: &RpcParams,
) -> Result<Option<Payment>, WebhookError> {
    if let Some(order_id) = params.order_id() {
        return Ok(ledger.payment_by_order_id(order_id).await?);
    }
    match params.transaction_id() {
        Some(transaction_id) => Ok(ledger.payment_by_transaction_id(transaction_id).await?),
        None => Ok(None),
    }
}

async fn find_payment<L: PaymentLedger>(
    ledger: &L,
    params: &RpcParams,
) -> Result<Payment, WebhookError> {
    lookup_payment(ledger, params)
        .await?
        .ok_or(WebhookError::OrderNotFound)
}

fn ensure_amount(params: &RpcParams, payment: &Payment) -> Result<(), WebhookError> {
    if params.amount_matches(payment.amount) {
        Ok(())
    } else {
        Err(WebhookError::InvalidAmount)
    }
}

/// Transition logging happens in the ledger; this only maps the outcome.
fn settled(outcome: LedgerOutcome, refused: WebhookError) -> Result<Payment, WebhookError> {
    match outcome {
        LedgerOutcome::Applied(payment) | LedgerOutcome::Replayed(payment) => Ok(payment),
        LedgerOutcome::Refused(_) => Err(refused),
        LedgerOutcome::NotFound => Err(WebhookError::OrderNotFound),
    }
}

fn transaction_label(payment: &Payment) -> String {
    payment
        .transaction_id
        .clone()
        .unwrap_or_else(|| payment.id.to_string())
}

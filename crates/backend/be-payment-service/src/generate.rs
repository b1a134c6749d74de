use std::sync::Arc;

use axum::{
    Json,
    extract::{Query, State, rejection::QueryRejection},
};
use base64::{Engine, engine::general_purpose::STANDARD};
use be_authz::AuthUser;
use be_remote_db::{DbError, NewPayment, Purchase};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::{AppState, error::PaymentError, store::PaymentLedger};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateQuery {
    pub card_id: Option<String>,
    #[serde(rename = "type")]
    pub payment_type: Option<String>,
    pub tariff_id: Option<String>,
    pub promotion_id: Option<String>,
}

impl GenerateQuery {
    /// Resolves the card and what is being bought; first problem wins.
    pub fn purchase(&self) -> Result<(i64, Purchase), PaymentError> {
        let (Some(card_id), Some(payment_type)) = (
            present(&self.card_id),
            present(&self.payment_type),
        ) else {
            return Err(PaymentError::InvalidInput(
                "cardId and type are required".into(),
            ));
        };
        let card_id = parse_id("cardId", card_id)?;

        let purchase = match payment_type {
            "tariff" => {
                let id = present(&self.tariff_id).ok_or_else(|| {
                    PaymentError::InvalidInput("tariffId is required when type=tariff".into())
                })?;
                Purchase::Tariff(parse_id("tariffId", id)?)
            }
            "promotion" => {
                let id = present(&self.promotion_id).ok_or_else(|| {
                    PaymentError::InvalidInput(
                        "promotionId is required when type=promotion".into(),
                    )
                })?;
                Purchase::Promotion(parse_id("promotionId", id)?)
            }
            _ => {
                return Err(PaymentError::InvalidInput(
                    "type must be 'tariff' or 'promotion'".into(),
                ));
            }
        };

        Ok((card_id, purchase))
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn parse_id(field: &str, value: &str) -> Result<i64, PaymentError> {
    value
        .parse()
        .map_err(|_| PaymentError::InvalidInput(format!("{field} must be an integer")))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentLink {
    pub payment_id: i64,
    pub order_id: String,
    pub amount: i64,
    #[serde(rename = "payment_url")]
    pub payment_url: String,
}

pub fn new_order_id() -> String {
    format!("order_{}", Uuid::now_v7().simple())
}

/// `<checkout>/<base64("m=<merchant>;ac.order_id=<order>;a=<amount>")>`
pub fn checkout_url(base: &str, merchant_id: &str, order_id: &str, amount: i64) -> String {
    let params = format!("m={merchant_id};ac.order_id={order_id};a={amount}");
    format!("{}/{}", base.trim_end_matches('/'), STANDARD.encode(params))
}

async fn price<L: PaymentLedger>(ledger: &L, purchase: Purchase) -> Result<i64, PaymentError> {
    let priced = match purchase {
        Purchase::Tariff(id) => ledger.get_tariff(id).await.map(|t| t.price),
        Purchase::Promotion(id) => ledger.get_promotion(id).await.map(|p| p.price),
    };
    priced.map_err(|err| match (err, purchase) {
        (DbError::NotFound { .. }, Purchase::Tariff(id)) => {
            PaymentError::NotFound(format!("Tariff {id} not found"))
        }
        (DbError::NotFound { .. }, Purchase::Promotion(id)) => {
            PaymentError::NotFound(format!("Promotion {id} not found"))
        }
        (err, _) => PaymentError::Database(err),
    })
}

/// Creates a pending payment for a card the caller owns and returns the
/// gateway checkout link for it.
pub async fn generate_payment<L: PaymentLedger>(
    State(state): State<Arc<AppState<L>>>,
    user: AuthUser,
    query: Result<Query<GenerateQuery>, QueryRejection>,
) -> Result<Json<PaymentLink>, PaymentError> {
    let Query(query) = query?;
    let (card_id, purchase) = query.purchase()?;
    let user_id = user.user_id();

    let owner = state.ledger.card_owner(card_id).await?;
    if owner != Some(user_id) {
        return Err(PaymentError::CardNotFound);
    }

    let amount = price(state.ledger.as_ref(), purchase).await?;
    let payment = state
        .ledger
        .create_payment(&NewPayment {
            order_id: new_order_id(),
            user_id,
            card_id,
            purchase,
            amount,
        })
        .await?;

    info!(
        order_id = %payment.order_id,
        card_id,
        user_id,
        payment_type = %payment.payment_type,
        amount,
        "Payment link generated"
    );

    let payment_url = checkout_url(
        &state.config.checkout_url,
        &state.config.merchant_id,
        &payment.order_id,
        amount,
    );
    Ok(Json(PaymentLink {
        payment_id: payment.id,
        order_id: payment.order_id,
        amount,
        payment_url,
    }))
}

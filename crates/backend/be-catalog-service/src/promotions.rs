use std::sync::Arc;

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
};
use be_remote_db::{NewPromotion, Promotion, PromotionPatch};
use serde::Deserialize;
use tracing::info;

use crate::{AppState, DeletedResponse, error::CatalogError};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePromotionRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub duration_days: Option<i32>,
    pub price: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePromotionRequest {
    pub promotion_id: Option<i64>,
    #[serde(flatten)]
    pub patch: PromotionPatch,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletePromotionRequest {
    pub promotion_id: Option<i64>,
}

pub fn validate_promotion(promotion: &NewPromotion) -> Result<(), CatalogError> {
    if promotion.name.trim().is_empty() {
        return Err(CatalogError::InvalidInput("name is required".into()));
    }
    if promotion.duration_days < 1 {
        return Err(CatalogError::InvalidInput(
            "durationDays must be at least 1".into(),
        ));
    }
    if promotion.price < 0 {
        return Err(CatalogError::InvalidInput("price cannot be negative".into()));
    }
    Ok(())
}

impl TryFrom<CreatePromotionRequest> for NewPromotion {
    type Error = CatalogError;

    fn try_from(req: CreatePromotionRequest) -> Result<Self, Self::Error> {
        let promotion = NewPromotion {
            name: req.name.trim().to_string(),
            description: req.description,
            duration_days: req
                .duration_days
                .ok_or_else(|| CatalogError::InvalidInput("durationDays is required".into()))?,
            price: req
                .price
                .ok_or_else(|| CatalogError::InvalidInput("price is required".into()))?,
        };
        validate_promotion(&promotion)?;
        Ok(promotion)
    }
}

pub async fn list_promotions(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Promotion>>, CatalogError> {
    Ok(Json(state.db.list_promotions().await?))
}

pub async fn create_promotion(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CreatePromotionRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Promotion>), CatalogError> {
    let Json(body) = payload?;
    let promotion = NewPromotion::try_from(body)?;

    let created = state
        .db
        .create_promotion()
        .promotion(&promotion)
        .call()
        .await?;
    info!(promotion_id = created.id, "Promotion created");

    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update_promotion(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<UpdatePromotionRequest>, JsonRejection>,
) -> Result<Json<Promotion>, CatalogError> {
    let Json(body) = payload?;
    let promotion_id = body
        .promotion_id
        .ok_or_else(|| CatalogError::InvalidInput("promotionId is required".into()))?;

    let current = state
        .db
        .get_promotion()
        .executor(&state.db.pool)
        .promotion_id(promotion_id)
        .call()
        .await?;
    let merged = body.patch.apply_to(&current);
    validate_promotion(&merged)?;

    let updated = state
        .db
        .update_promotion()
        .promotion_id(promotion_id)
        .promotion(&merged)
        .call()
        .await?;
    info!(promotion_id, "Promotion updated");

    Ok(Json(updated))
}

pub async fn delete_promotion(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<DeletePromotionRequest>, JsonRejection>,
) -> Result<Json<DeletedResponse>, CatalogError> {
    let Json(body) = payload?;
    let promotion_id = body
        .promotion_id
        .ok_or_else(|| CatalogError::InvalidInput("promotionId is required".into()))?;

    state
        .db
        .delete_promotion()
        .promotion_id(promotion_id)
        .call()
        .await?;
    info!(promotion_id, "Promotion deleted");

    Ok(Json(DeletedResponse::new("Promotion deleted")))
}

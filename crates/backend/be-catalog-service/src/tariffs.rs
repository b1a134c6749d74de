use std::sync::Arc;

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
};
use be_remote_db::{NewTariff, Tariff, TariffPatch};
use serde::Deserialize;
use tracing::info;

use crate::{AppState, DeletedResponse, error::CatalogError};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateTariffRequest {
    pub tariff_name: String,
    pub min_phones: i32,
    pub max_phones: i32,
    pub min_socials: i32,
    pub max_socials: i32,
    pub min_photos: i32,
    pub max_photos: i32,
    pub max_description_length: i32,
    pub website_allowed: bool,
    pub price: i64,
}

impl Default for CreateTariffRequest {
    fn default() -> Self {
        Self {
            tariff_name: String::new(),
            min_phones: 1,
            max_phones: 1,
            min_socials: 0,
            max_socials: 1,
            min_photos: 1,
            max_photos: 1,
            max_description_length: 200,
            website_allowed: false,
            price: 0,
        }
    }
}

impl From<CreateTariffRequest> for NewTariff {
    fn from(req: CreateTariffRequest) -> Self {
        NewTariff {
            name: req.tariff_name.trim().to_string(),
            min_phones: req.min_phones,
            max_phones: req.max_phones,
            min_socials: req.min_socials,
            max_socials: req.max_socials,
            min_photos: req.min_photos,
            max_photos: req.max_photos,
            max_description_length: req.max_description_length,
            website_allowed: req.website_allowed,
            price: req.price,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTariffRequest {
    pub tariff_id: Option<i64>,
    #[serde(flatten)]
    pub patch: TariffPatch,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteTariffRequest {
    pub tariff_id: Option<i64>,
}

/// Rejects tariffs whose limits could never be satisfied by a card.
pub fn validate_tariff(tariff: &NewTariff) -> Result<(), CatalogError> {
    if tariff.name.trim().is_empty() {
        return Err(CatalogError::InvalidInput("tariffName is required".into()));
    }

    let limits = [
        ("minPhones", tariff.min_phones),
        ("maxPhones", tariff.max_phones),
        ("minSocials", tariff.min_socials),
        ("maxSocials", tariff.max_socials),
        ("minPhotos", tariff.min_photos),
        ("maxPhotos", tariff.max_photos),
        ("maxDescriptionLength", tariff.max_description_length),
    ];
    if let Some((field, _)) = limits.iter().find(|(_, value)| *value < 0) {
        return Err(CatalogError::InvalidInput(format!(
            "{field} cannot be negative"
        )));
    }
    if tariff.price < 0 {
        return Err(CatalogError::InvalidInput("price cannot be negative".into()));
    }

    let pairs = [
        ("minPhones", tariff.min_phones, "maxPhones", tariff.max_phones),
        ("minSocials", tariff.min_socials, "maxSocials", tariff.max_socials),
        ("minPhotos", tariff.min_photos, "maxPhotos", tariff.max_photos),
    ];
    for (min_name, min, max_name, max) in pairs {
        if min > max {
            return Err(CatalogError::InvalidInput(format!(
                "{min_name} ({min}) cannot exceed {max_name} ({max})"
            )));
        }
    }

    Ok(())
}

pub async fn list_tariffs(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Tariff>>, CatalogError> {
    Ok(Json(state.db.list_tariffs().await?))
}

pub async fn create_tariff(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CreateTariffRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Tariff>), CatalogError> {
    let Json(body) = payload?;
    let tariff = NewTariff::from(body);
    validate_tariff(&tariff)?;

    let created = state.db.create_tariff().tariff(&tariff).call().await?;
    info!(tariff_id = created.id, "Tariff created");

    Ok((StatusCode::CREATED, Json(created)))
}

/// Only the provided fields change; the merged result must still be valid.
pub async fn update_tariff(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<UpdateTariffRequest>, JsonRejection>,
) -> Result<Json<Tariff>, CatalogError> {
    let Json(body) = payload?;
    let tariff_id = body
        .tariff_id
        .ok_or_else(|| CatalogError::InvalidInput("tariffId is required".into()))?;

    let current = state
        .db
        .get_tariff()
        .executor(&state.db.pool)
        .tariff_id(tariff_id)
        .call()
        .await?;
    let merged = body.patch.apply_to(&current);
    validate_tariff(&merged)?;

    let updated = state
        .db
        .update_tariff()
        .tariff_id(tariff_id)
        .tariff(&merged)
        .call()
        .await?;
    info!(tariff_id, "Tariff updated");

    Ok(Json(updated))
}

pub async fn delete_tariff(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<DeleteTariffRequest>, JsonRejection>,
) -> Result<Json<DeletedResponse>, CatalogError> {
    let Json(body) = payload?;
    let tariff_id = body
        .tariff_id
        .ok_or_else(|| CatalogError::InvalidInput("tariffId is required".into()))?;

    state.db.delete_tariff().tariff_id(tariff_id).call().await?;
    info!(tariff_id, "Tariff deleted");

    Ok(Json(DeletedResponse::new("Tariff deleted")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> NewTariff {
        NewTariff::from(CreateTariffRequest {
            tariff_name: "Basic".into(),
            ..Default::default()
        })
    }

    #[test]
    fn omitted_fields_take_defaults() {
        let req: CreateTariffRequest =
            serde_json::from_value(serde_json::json!({ "tariffName": "Basic" })).unwrap();
        assert_eq!(req.min_phones, 1);
        assert_eq!(req.max_phones, 1);
        assert_eq!(req.min_socials, 0);
        assert_eq!(req.max_socials, 1);
        assert_eq!(req.min_photos, 1);
        assert_eq!(req.max_photos, 1);
        assert_eq!(req.max_description_length, 200);
        assert!(!req.website_allowed);
        assert_eq!(req.price, 0);
        assert!(validate_tariff(&NewTariff::from(req)).is_ok());
    }

    #[test]
    fn min_above_max_is_rejected() {
        let tariff = NewTariff {
            min_photos: 3,
            max_photos: 2,
            ..valid()
        };
        let err = validate_tariff(&tariff).unwrap_err();
        assert_eq!(err.to_string(), "minPhotos (3) cannot exceed maxPhotos (2)");
    }

    #[test]
    fn negative_limits_and_price_are_rejected() {
        let tariff = NewTariff {
            max_description_length: -1,
            ..valid()
        };
        assert_eq!(
            validate_tariff(&tariff).unwrap_err().to_string(),
            "maxDescriptionLength cannot be negative"
        );

        let tariff = NewTariff {
            price: -5,
            ..valid()
        };
        assert_eq!(
            validate_tariff(&tariff).unwrap_err().to_string(),
            "price cannot be negative"
        );
    }

    #[test]
    fn blank_name_is_rejected() {
        let tariff = NewTariff {
            name: "  ".into(),
            ..valid()
        };
        assert_eq!(
            validate_tariff(&tariff).unwrap_err().to_string(),
            "tariffName is required"
        );
    }

    #[test]
    fn update_request_carries_partial_patch() {
        let req: UpdateTariffRequest = serde_json::from_value(serde_json::json!({
            "tariffId": 4,
            "maxPhotos": 10,
            "price": 75000
        }))
        .unwrap();
        assert_eq!(req.tariff_id, Some(4));
        assert_eq!(req.patch.max_photos, Some(10));
        assert_eq!(req.patch.price, Some(75000));
        assert_eq!(req.patch.min_photos, None);
        assert_eq!(req.patch.name, None);
    }
}

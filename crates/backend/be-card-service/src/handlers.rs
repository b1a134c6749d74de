use std::sync::Arc;

use axum::{
    Json,
    extract::{
        Multipart, Query, State,
        multipart::MultipartRejection,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
};
use be_authz::AuthUser;
use be_remote_db::{Card, CardFilter, PageRequest};
use be_storage::StorageService;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    AppState, MessageResponse,
    error::CardError,
    form::{CardForm, PhotoPart, parse_id},
    store::CardStore,
    validator::{CardDraft, ValidatedCard, ValidationError, validate_card},
};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedCard {
    pub card_id: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardIdRequest {
    pub card_id: Option<i64>,
}

impl CardIdRequest {
    pub fn id(&self) -> Result<i64, CardError> {
        self.card_id
            .ok_or(CardError::Validation(ValidationError::MissingField("cardId")))
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardQuery {
    pub card_id: Option<String>,
    pub category_id: Option<String>,
    pub user_id: Option<String>,
    pub my_cards: Option<String>,
    pub page: Option<String>,
    pub per_page: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum CardsResponse {
    One(Card),
    Page { pages: i64, cards: Vec<Card> },
}

fn parse_positive(field: &str, value: Option<&str>) -> Result<Option<u32>, ValidationError> {
    let Some(value) = value.map(str::trim).filter(|value| !value.is_empty()) else {
        return Ok(None);
    };
    match value.parse::<u32>() {
        Ok(number) if number > 0 => Ok(Some(number)),
        _ => Err(ValidationError::malformed(format!(
            "{field} must be a positive integer"
        ))),
    }
}

fn parse_flag(field: &str, value: Option<&str>) -> Result<bool, ValidationError> {
    match value.map(str::trim) {
        None | Some("") | Some("false") | Some("0") => Ok(false),
        Some("true") | Some("1") => Ok(true),
        Some(_) => Err(ValidationError::malformed(format!(
            "{field} must be true or false"
        ))),
    }
}

impl CardQuery {
    /// Resolves the listing filter; `myCards` overrides `userId`.
    pub fn filter(&self, caller_id: i64) -> Result<CardFilter, ValidationError> {
        let category_id = parse_id("categoryId", self.category_id.as_deref().unwrap_or_default())?;
        let user_id = if parse_flag("myCards", self.my_cards.as_deref())? {
            Some(caller_id)
        } else {
            parse_id("userId", self.user_id.as_deref().unwrap_or_default())?
        };
        Ok(CardFilter {
            category_id,
            user_id,
        })
    }

    pub fn page(&self) -> Result<PageRequest, ValidationError> {
        let page = parse_positive("page", self.page.as_deref())?.unwrap_or(1);
        let per_page = parse_positive("perPage", self.per_page.as_deref())?
            .unwrap_or(PageRequest::DEFAULT_PER_PAGE);
        Ok(PageRequest::new(page, per_page))
    }
}

/// Looks up the tariff named by the draft and applies its rules.
async fn validate_with_tariff<S: CardStore>(
    store: &S,
    draft: CardDraft<PhotoPart>,
) -> Result<ValidatedCard<PhotoPart>, CardError> {
    let tariff_id = draft
        .tariff_id
        .ok_or(ValidationError::MissingField("tariffId"))?;
    let tariff = store.get_tariff(tariff_id).await?;
    Ok(validate_card(&tariff, draft)?)
}

/// Uploads new photos and returns the URL list in submitted order.
///
/// Kept photos must be among `current`. Every part is checked before the
/// first upload so a rejected form writes nothing.
async fn store_photos(
    storage: &StorageService,
    user_id: i64,
    photos: &[PhotoPart],
    current: &[String],
) -> Result<Vec<String>, CardError> {
    for photo in photos {
        match photo {
            PhotoPart::Existing(url) if !current.contains(url) => {
                return Err(ValidationError::malformed(format!(
                    "photo {url} does not belong to this card"
                ))
                .into());
            }
            PhotoPart::Upload(upload)
                if StorageService::extension_from_mime(&upload.content_type).is_none() =>
            {
                return Err(CardError::UnsupportedPhoto(upload.content_type.clone()));
            }
            _ => {}
        }
    }

    let mut urls = Vec::with_capacity(photos.len());
    for photo in photos {
        let url = match photo {
            PhotoPart::Existing(url) => url.clone(),
            PhotoPart::Upload(upload) => {
                storage
                    .upload_photo(user_id, &upload.bytes, &upload.content_type)
                    .await?
            }
        };
        urls.push(url);
    }
    Ok(urls)
}

pub async fn create_card<S: CardStore>(
    State(state): State<Arc<AppState<S>>>,
    user: AuthUser,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<CreatedCard>), CardError> {
    let user_id = user.user_id();
    let form = CardForm::read(multipart?).await?;

    let validated = validate_with_tariff(state.store.as_ref(), form.draft).await?;
    let urls = store_photos(&state.storage, user_id, &validated.photos, &[]).await?;

    let card_id = state
        .store
        .create_card(user_id, &validated.into_new_card(urls))
        .await?;
    info!(card_id, user_id, "Card created");

    Ok((StatusCode::CREATED, Json(CreatedCard { card_id })))
}

/// Full replace: scalar fields and every child collection come from the
/// form, validated against the tariff the form names.
pub async fn update_card<S: CardStore>(
    State(state): State<Arc<AppState<S>>>,
    user: AuthUser,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Card>, CardError> {
    let user_id = user.user_id();
    let form = CardForm::read(multipart?).await?;
    let card_id = form
        .card_id
        .ok_or(ValidationError::MissingField("cardId"))?;

    let current = state
        .store
        .get_card(card_id)
        .await?
        .filter(|card| card.user_id == user_id)
        .ok_or(CardError::NotFound("card"))?;

    let validated = validate_with_tariff(state.store.as_ref(), form.draft).await?;
    let urls = store_photos(&state.storage, user_id, &validated.photos, &current.photos).await?;

    // Ownership is checked again inside the write.
    state
        .store
        .replace_card(card_id, user_id, &validated.into_new_card(urls))
        .await?;
    info!(card_id, user_id, "Card updated");

    let card = state
        .store
        .get_card(card_id)
        .await?
        .ok_or(CardError::NotFound("card"))?;
    Ok(Json(card))
}

pub async fn get_cards<S: CardStore>(
    State(state): State<Arc<AppState<S>>>,
    user: AuthUser,
    query: Result<Query<CardQuery>, QueryRejection>,
) -> Result<Json<CardsResponse>, CardError> {
    let Query(query) = query?;

    if let Some(card_id) = parse_id("cardId", query.card_id.as_deref().unwrap_or_default())? {
        let card = state
            .store
            .get_card(card_id)
            .await?
            .ok_or(CardError::CardNotFound)?;
        return Ok(Json(CardsResponse::One(card)));
    }

    let filter = query.filter(user.user_id())?;
    let page = query.page()?;
    let (total, cards) = state.store.list_cards(filter, page).await?;
    debug!(
        total,
        page = page.page(),
        per_page = page.per_page(),
        "Listed cards"
    );

    Ok(Json(CardsResponse::Page {
        pages: page.page_count(total),
        cards,
    }))
}

pub async fn delete_card<S: CardStore>(
    State(state): State<Arc<AppState<S>>>,
    user: AuthUser,
    payload: Result<Json<CardIdRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, CardError> {
    let Json(body) = payload?;
    let card_id = body.id()?;
    let user_id = user.user_id();

    state.store.delete_card(card_id, user_id).await?;
    info!(card_id, user_id, "Card deleted");

    Ok(Json(MessageResponse::new("Card deleted")))
}

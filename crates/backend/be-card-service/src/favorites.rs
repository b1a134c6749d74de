use std::sync::Arc;

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
};
use be_authz::AuthUser;
use be_remote_db::Card;
use tracing::info;

use crate::{
    AppState, MessageResponse, error::CardError, handlers::CardIdRequest, store::CardStore,
};

pub async fn add_favorite<S: CardStore>(
    State(state): State<Arc<AppState<S>>>,
    user: AuthUser,
    payload: Result<Json<CardIdRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<MessageResponse>), CardError> {
    let Json(body) = payload?;
    let card_id = body.id()?;
    let user_id = user.user_id();

    state.store.add_favorite(user_id, card_id).await?;
    info!(card_id, user_id, "Favorite added");

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::new("Card added to favorites")),
    ))
}

pub async fn list_favorites<S: CardStore>(
    State(state): State<Arc<AppState<S>>>,
    user: AuthUser,
) -> Result<Json<Vec<Card>>, CardError> {
    Ok(Json(state.store.list_favorites(user.user_id()).await?))
}

pub async fn remove_favorite<S: CardStore>(
    State(state): State<Arc<AppState<S>>>,
    user: AuthUser,
    payload: Result<Json<CardIdRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, CardError> {
    let Json(body) = payload?;
    let card_id = body.id()?;
    let user_id = user.user_id();

    state.store.remove_favorite(user_id, card_id).await?;
    info!(card_id, user_id, "Favorite removed");

    Ok(Json(MessageResponse::new("Card removed from favorites")))
}

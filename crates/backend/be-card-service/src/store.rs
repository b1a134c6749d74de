use std::future::Future;

use be_remote_db::{Card, CardFilter, DatabaseManager, DbResult, NewCard, PageRequest, Tariff};

/// Persistence used by the card and favorite handlers.
///
/// Writes keyed by `(card_id, user_id)` must fail with `DbError::NotFound`
/// when the card is missing or owned by another user, and must leave the
/// card untouched in that case.
pub trait CardStore: Send + Sync + 'static {
    fn get_tariff(&self, tariff_id: i64) -> impl Future<Output = DbResult<Tariff>> + Send;

    fn create_card(
        &self,
        user_id: i64,
        card: &NewCard,
    ) -> impl Future<Output = DbResult<i64>> + Send;

    /// Full replace of scalar fields and child collections.
    fn replace_card(
        &self,
        card_id: i64,
        user_id: i64,
        card: &NewCard,
    ) -> impl Future<Output = DbResult<()>> + Send;

    fn delete_card(&self, card_id: i64, user_id: i64) -> impl Future<Output = DbResult<()>> + Send;

    fn get_card(&self, card_id: i64) -> impl Future<Output = DbResult<Option<Card>>> + Send;

    fn list_cards(
        &self,
        filter: CardFilter,
        page: PageRequest,
    ) -> impl Future<Output = DbResult<(i64, Vec<Card>)>> + Send;

    fn add_favorite(&self, user_id: i64, card_id: i64) -> impl Future<Output = DbResult<()>> + Send;

    fn remove_favorite(
        &self,
        user_id: i64,
        card_id: i64,
    ) -> impl Future<Output = DbResult<()>> + Send;

    fn list_favorites(&self, user_id: i64) -> impl Future<Output = DbResult<Vec<Card>>> + Send;
}

impl CardStore for DatabaseManager {
    async fn get_tariff(&self, tariff_id: i64) -> DbResult<Tariff> {
        self.get_tariff()
            .executor(&self.pool)
            .tariff_id(tariff_id)
            .call()
            .await
    }

    async fn create_card(&self, user_id: i64, card: &NewCard) -> DbResult<i64> {
        self.create_card().user_id(user_id).card(card).call().await
    }

    async fn replace_card(&self, card_id: i64, user_id: i64, card: &NewCard) -> DbResult<()> {
        self.replace_card()
            .card_id(card_id)
            .user_id(user_id)
            .card(card)
            .call()
            .await
    }

    async fn delete_card(&self, card_id: i64, user_id: i64) -> DbResult<()> {
        self.delete_card()
            .card_id(card_id)
            .user_id(user_id)
            .call()
            .await
    }

    async fn get_card(&self, card_id: i64) -> DbResult<Option<Card>> {
        self.get_card().card_id(card_id).call().await
    }

    async fn list_cards(&self, filter: CardFilter, page: PageRequest) -> DbResult<(i64, Vec<Card>)> {
        self.list_cards().filter(filter).page(page).call().await
    }

    async fn add_favorite(&self, user_id: i64, card_id: i64) -> DbResult<()> {
        self.add_favorite()
            .user_id(user_id)
            .card_id(card_id)
            .call()
            .await
    }

    async fn remove_favorite(&self, user_id: i64, card_id: i64) -> DbResult<()> {
        self.remove_favorite()
            .user_id(user_id)
            .card_id(card_id)
            .call()
            .await
    }

    async fn list_favorites(&self, user_id: i64) -> DbResult<Vec<Card>> {
        self.list_favorites().user_id(user_id).call().await
    }
}

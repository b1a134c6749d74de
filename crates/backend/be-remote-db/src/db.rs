use bon::bon;
use chrono::{Duration as ChronoDuration, Utc};
use sqlx::{
    PgConnection,
    migrate::MigrateDatabase,
    postgres::{PgPool, PgPoolOptions},
};
use std::{collections::HashMap, time::Duration};

use crate::{
    error::{DbError, DbResult},
    ledger::{LedgerEvent, LedgerOutcome, PaymentState, Transition},
    types::{
        Card, CardFilter, CardPromotion, CardRow, Category, NewCard, NewPayment, NewPromotion,
        NewTariff, PageRequest, Payment, ProfilePatch, Promotion, Purchase, SocialMedia, Tariff,
        User, UserCredentials,
    },
};

const USER_COLUMNS: &str = "id, email, full_name, profile_photo, created_at";

const TARIFF_COLUMNS: &str = "id, name, min_phones, max_phones, min_socials, max_socials, \
     min_photos, max_photos, max_description_length, website_allowed, price, created_at";

const PROMOTION_COLUMNS: &str = "id, name, description, duration_days, price, created_at";

const CARD_COLUMNS: &str = "id, user_id, category_id, tariff_id, name, description, address, \
     location_lat, location_lng, website, created_at, updated_at";

const PAYMENT_COLUMNS: &str = "id, order_id, user_id, card_id, payment_type, tariff_id, \
     promotion_id, amount, transaction_id, state, reason, create_time, perform_time, \
     cancel_time, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct DatabaseManager {
    pub pool: PgPool,
}

#[bon]
impl DatabaseManager {
    pub async fn new(database_url: &str) -> DbResult<Self> {
        if !sqlx::Postgres::database_exists(database_url).await? {
            sqlx::Postgres::create_database(database_url).await?;
        }

        let pool = PgPoolOptions::new()
            .max_connections(20)
            .min_connections(2)
            .acquire_timeout(Duration::from_secs(10))
            .connect(database_url)
            .await?;

        let db_manager = DatabaseManager { pool };

        Self::run_migrations(&db_manager.pool).await?;

        Ok(db_manager)
    }

    async fn run_migrations(pool: &PgPool) -> DbResult<()> {
        let migrator = sqlx::migrate!("./src/migrations");
        migrator.run(pool).await?;
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Users
    // ---------------------------------------------------------------------

    #[builder]
    pub async fn create_user(
        &self,
        email: &str,
        full_name: &str,
        password_hash: &str,
    ) -> DbResult<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (email, full_name, password_hash)
            VALUES ($1, $2, $3)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(email)
        .bind(full_name)
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|err| match DbError::from(err) {
            DbError::Duplicate { .. } => DbError::duplicate("email", email),
            other => other,
        })?;

        Ok(user)
    }

    #[builder]
    pub async fn get_credentials_by_email(&self, email: &str) -> DbResult<UserCredentials> {
        sqlx::query_as::<_, UserCredentials>(
            "SELECT id, email, password_hash FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("user"))
    }

    #[builder]
    pub async fn get_user(&self, user_id: i64) -> DbResult<User> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found_with_id("user", user_id))
    }

    #[builder]
    pub async fn update_profile(&self, user_id: i64, patch: &ProfilePatch) -> DbResult<User> {
        let result = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET email = COALESCE($2, email),
                full_name = COALESCE($3, full_name),
                profile_photo = COALESCE($4, profile_photo),
                updated_at = now()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(patch.email.as_deref())
        .bind(patch.full_name.as_deref())
        .bind(patch.profile_photo.as_deref())
        .fetch_optional(&self.pool)
        .await;

        match result {
            Ok(Some(user)) => Ok(user),
            Ok(None) => Err(DbError::not_found_with_id("user", user_id)),
            Err(err) => match DbError::from(err) {
                DbError::Duplicate { .. } => Err(DbError::duplicate(
                    "email",
                    patch.email.clone().unwrap_or_default(),
                )),
                other => Err(other),
            },
        }
    }

    // ---------------------------------------------------------------------
    // Categories
    // ---------------------------------------------------------------------

    pub async fn list_categories(&self) -> DbResult<Vec<Category>> {
        let categories = sqlx::query_as::<_, Category>(
            "SELECT id, name, created_at FROM categories ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(categories)
    }

    #[builder]
    pub async fn create_category(&self, name: &str) -> DbResult<Category> {
        sqlx::query_as::<_, Category>(
            "INSERT INTO categories (name) VALUES ($1) RETURNING id, name, created_at",
        )
        .bind(name)
        .fetch_one(&self.pool)
        .await
        .map_err(|err| match DbError::from(err) {
            DbError::Duplicate { .. } => DbError::duplicate("categoryName", name),
            other => other,
        })
    }

    #[builder]
    pub async fn update_category(&self, category_id: i64, name: &str) -> DbResult<Category> {
        sqlx::query_as::<_, Category>(
            "UPDATE categories SET name = $2 WHERE id = $1 RETURNING id, name, created_at",
        )
        .bind(category_id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found_with_id("category", category_id))
    }

    #[builder]
    pub async fn delete_category(&self, category_id: i64) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(category_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found_with_id("category", category_id));
        }
        Ok(())
    }

    /// Every category paired with up to `per_category` of its newest cards.
    #[builder]
    pub async fn list_categories_with_cards(
        &self,
        per_category: i64,
    ) -> DbResult<Vec<(Category, Vec<Card>)>> {
        let categories = self.list_categories().await?;

        let rows = sqlx::query_as::<_, CardRow>(&format!(
            r#"
            SELECT {CARD_COLUMNS}
            FROM (
                SELECT c.*,
                       ROW_NUMBER() OVER (
                           PARTITION BY c.category_id
                           ORDER BY c.created_at DESC, c.id DESC
                       ) AS rn
                FROM cards c
            ) ranked
            WHERE rn <= $1
            ORDER BY created_at DESC, id DESC
            "#
        ))
        .bind(per_category)
        .fetch_all(&self.pool)
        .await?;

        let mut by_category: HashMap<i64, Vec<Card>> = HashMap::new();
        for card in self.hydrate_cards(rows).await? {
            by_category.entry(card.category_id).or_default().push(card);
        }

        Ok(categories
            .into_iter()
            .map(|category| {
                let cards = by_category.remove(&category.id).unwrap_or_default();
                (category, cards)
            })
            .collect())
    }

    // ---------------------------------------------------------------------
    // Tariffs
    // ---------------------------------------------------------------------

    pub async fn list_tariffs(&self) -> DbResult<Vec<Tariff>> {
        let tariffs = sqlx::query_as::<_, Tariff>(&format!(
            "SELECT {TARIFF_COLUMNS} FROM tariffs ORDER BY price, id"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(tariffs)
    }

    #[builder]
    pub async fn get_tariff<'e, E>(&self, executor: E, tariff_id: i64) -> DbResult<Tariff>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>,
    {
        sqlx::query_as::<_, Tariff>(&format!(
            "SELECT {TARIFF_COLUMNS} FROM tariffs WHERE id = $1"
        ))
        .bind(tariff_id)
        .fetch_optional(executor)
        .await?
        .ok_or_else(|| DbError::not_found_with_id("tariff", tariff_id))
    }

    #[builder]
    pub async fn create_tariff(&self, tariff: &NewTariff) -> DbResult<Tariff> {
        let created = sqlx::query_as::<_, Tariff>(&format!(
            r#"
            INSERT INTO tariffs (
                name, min_phones, max_phones, min_socials, max_socials,
                min_photos, max_photos, max_description_length, website_allowed, price
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {TARIFF_COLUMNS}
            "#
        ))
        .bind(&tariff.name)
        .bind(tariff.min_phones)
        .bind(tariff.max_phones)
        .bind(tariff.min_socials)
        .bind(tariff.max_socials)
        .bind(tariff.min_photos)
        .bind(tariff.max_photos)
        .bind(tariff.max_description_length)
        .bind(tariff.website_allowed)
        .bind(tariff.price)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    #[builder]
    pub async fn update_tariff(&self, tariff_id: i64, tariff: &NewTariff) -> DbResult<Tariff> {
        sqlx::query_as::<_, Tariff>(&format!(
            r#"
            UPDATE tariffs
            SET name = $2, min_phones = $3, max_phones = $4, min_socials = $5,
                max_socials = $6, min_photos = $7, max_photos = $8,
                max_description_length = $9, website_allowed = $10, price = $11
            WHERE id = $1
            RETURNING {TARIFF_COLUMNS}
            "#
        ))
        .bind(tariff_id)
        .bind(&tariff.name)
        .bind(tariff.min_phones)
        .bind(tariff.max_phones)
        .bind(tariff.min_socials)
        .bind(tariff.max_socials)
        .bind(tariff.min_photos)
        .bind(tariff.max_photos)
        .bind(tariff.max_description_length)
        .bind(tariff.website_allowed)
        .bind(tariff.price)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found_with_id("tariff", tariff_id))
    }

    /// Cards keep a foreign key on their tariff, so deleting a referenced
    /// tariff surfaces as [`DbError::ForeignKeyViolation`].
    #[builder]
    pub async fn delete_tariff(&self, tariff_id: i64) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM tariffs WHERE id = $1")
            .bind(tariff_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found_with_id("tariff", tariff_id));
        }
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Promotions
    // ---------------------------------------------------------------------

    pub async fn list_promotions(&self) -> DbResult<Vec<Promotion>> {
        let promotions = sqlx::query_as::<_, Promotion>(&format!(
            "SELECT {PROMOTION_COLUMNS} FROM promotions ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(promotions)
    }

    #[builder]
    pub async fn get_promotion<'e, E>(&self, executor: E, promotion_id: i64) -> DbResult<Promotion>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>,
    {
        sqlx::query_as::<_, Promotion>(&format!(
            "SELECT {PROMOTION_COLUMNS} FROM promotions WHERE id = $1"
        ))
        .bind(promotion_id)
        .fetch_optional(executor)
        .await?
        .ok_or_else(|| DbError::not_found_with_id("promotion", promotion_id))
    }

    #[builder]
    pub async fn create_promotion(&self, promotion: &NewPromotion) -> DbResult<Promotion> {
        let created = sqlx::query_as::<_, Promotion>(&format!(
            r#"
            INSERT INTO promotions (name, description, duration_days, price)
            VALUES ($1, $2, $3, $4)
            RETURNING {PROMOTION_COLUMNS}
            "#
        ))
        .bind(&promotion.name)
        .bind(&promotion.description)
        .bind(promotion.duration_days)
        .bind(promotion.price)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    #[builder]
    pub async fn update_promotion(
        &self,
        promotion_id: i64,
        promotion: &NewPromotion,
    ) -> DbResult<Promotion> {
        sqlx::query_as::<_, Promotion>(&format!(
            r#"
            UPDATE promotions
            SET name = $2, description = $3, duration_days = $4, price = $5
            WHERE id = $1
            RETURNING {PROMOTION_COLUMNS}
            "#
        ))
        .bind(promotion_id)
        .bind(&promotion.name)
        .bind(&promotion.description)
        .bind(promotion.duration_days)
        .bind(promotion.price)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found_with_id("promotion", promotion_id))
    }

    #[builder]
    pub async fn delete_promotion(&self, promotion_id: i64) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM promotions WHERE id = $1")
            .bind(promotion_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found_with_id("promotion", promotion_id));
        }
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Cards
    // ---------------------------------------------------------------------

    #[builder]
    pub async fn create_card(&self, user_id: i64, card: &NewCard) -> DbResult<i64> {
        let mut tx = self.pool.begin().await?;

        let (card_id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO cards (
                user_id, category_id, tariff_id, name, description, address,
                location_lat, location_lng, website
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id
            "#,
        )
        .bind(user_id)
        .bind(card.category_id)
        .bind(card.tariff_id)
        .bind(&card.name)
        .bind(&card.description)
        .bind(&card.address)
        .bind(card.location_lat)
        .bind(card.location_lng)
        .bind(card.website.as_deref())
        .fetch_one(&mut *tx)
        .await?;

        write_card_children(&mut tx, card_id, card).await?;

        tx.commit().await?;

        tracing::debug!(card_id, user_id, "card created");
        Ok(card_id)
    }

    /// Rewrites every scalar field and replaces all child collections.
    ///
    /// The owner check is part of the `UPDATE`, so a card owned by someone
    /// else reports [`DbError::NotFound`] and nothing is written.
    #[builder]
    pub async fn replace_card(&self, card_id: i64, user_id: i64, card: &NewCard) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE cards
            SET category_id = $3, tariff_id = $4, name = $5, description = $6,
                address = $7, location_lat = $8, location_lng = $9, website = $10,
                updated_at = now()
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(card_id)
        .bind(user_id)
        .bind(card.category_id)
        .bind(card.tariff_id)
        .bind(&card.name)
        .bind(&card.description)
        .bind(&card.address)
        .bind(card.location_lat)
        .bind(card.location_lng)
        .bind(card.website.as_deref())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found_with_id("card", card_id));
        }

        for table in ["card_phones", "card_socials", "card_photos"] {
            sqlx::query(&format!("DELETE FROM {table} WHERE card_id = $1"))
                .bind(card_id)
                .execute(&mut *tx)
                .await?;
        }

        write_card_children(&mut tx, card_id, card).await?;

        tx.commit().await?;

        tracing::debug!(card_id, user_id, "card replaced");
        Ok(())
    }

    #[builder]
    pub async fn delete_card(&self, card_id: i64, user_id: i64) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM cards WHERE id = $1 AND user_id = $2")
            .bind(card_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found_with_id("card", card_id));
        }

        tracing::debug!(card_id, user_id, "card deleted");
        Ok(())
    }

    #[builder]
    pub async fn card_owner(&self, card_id: i64) -> DbResult<Option<i64>> {
        let owner: Option<i64> = sqlx::query_scalar("SELECT user_id FROM cards WHERE id = $1")
            .bind(card_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(owner)
    }

    #[builder]
    pub async fn get_card(&self, card_id: i64) -> DbResult<Option<Card>> {
        let row = sqlx::query_as::<_, CardRow>(&format!(
            "SELECT {CARD_COLUMNS} FROM cards WHERE id = $1"
        ))
        .bind(card_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(self.hydrate_cards(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    /// Returns the total number of matching cards and the requested page,
    /// newest first.
    #[builder]
    pub async fn list_cards(
        &self,
        filter: CardFilter,
        page: PageRequest,
    ) -> DbResult<(i64, Vec<Card>)> {
        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM cards
            WHERE ($1::BIGINT IS NULL OR category_id = $1)
              AND ($2::BIGINT IS NULL OR user_id = $2)
            "#,
        )
        .bind(filter.category_id)
        .bind(filter.user_id)
        .fetch_one(&self.pool)
        .await?;

        let rows = sqlx::query_as::<_, CardRow>(&format!(
            r#"
            SELECT {CARD_COLUMNS} FROM cards
            WHERE ($1::BIGINT IS NULL OR category_id = $1)
              AND ($2::BIGINT IS NULL OR user_id = $2)
            ORDER BY created_at DESC, id DESC
            LIMIT $3 OFFSET $4
            "#
        ))
        .bind(filter.category_id)
        .bind(filter.user_id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok((total, self.hydrate_cards(rows).await?))
    }

    /// Single-field tariff change used by the payment effect.
    /// Returns `false` when the card no longer exists.
    #[builder]
    pub async fn set_card_tariff<'e, E>(
        &self,
        executor: E,
        card_id: i64,
        tariff_id: i64,
    ) -> DbResult<bool>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>,
    {
        let result = sqlx::query(
            "UPDATE cards SET tariff_id = $2, updated_at = now() WHERE id = $1",
        )
        .bind(card_id)
        .bind(tariff_id)
        .execute(executor)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Inserts a new activation starting now. Returns `None` when the card no
    /// longer exists.
    #[builder]
    pub async fn activate_promotion<'e, E>(
        &self,
        executor: E,
        card_id: i64,
        promotion: &Promotion,
    ) -> DbResult<Option<CardPromotion>>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>,
    {
        let start = Utc::now();
        let end = start + ChronoDuration::days(promotion.duration_days as i64);

        let activation = sqlx::query_as::<_, CardPromotion>(
            r#"
            INSERT INTO card_promotions (card_id, promotion_id, start_date, end_date)
            SELECT $1, $2, $3, $4
            WHERE EXISTS (SELECT 1 FROM cards WHERE id = $1)
            RETURNING id, card_id, promotion_id, start_date, end_date
            "#,
        )
        .bind(card_id)
        .bind(promotion.id)
        .bind(start)
        .bind(end)
        .fetch_optional(executor)
        .await?;

        Ok(activation)
    }

    /// Loads child collections and active promotions for a batch of rows,
    /// preserving the row order.
    async fn hydrate_cards(&self, rows: Vec<CardRow>) -> DbResult<Vec<Card>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<i64> = rows.iter().map(|row| row.id).collect();

        let phones: Vec<(i64, String)> = sqlx::query_as(
            "SELECT card_id, phone FROM card_phones WHERE card_id = ANY($1) ORDER BY card_id, position",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let socials: Vec<(i64, String, String)> = sqlx::query_as(
            r#"
            SELECT card_id, social_type, social_link FROM card_socials
            WHERE card_id = ANY($1) ORDER BY card_id, position
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let photos: Vec<(i64, String)> = sqlx::query_as(
            "SELECT card_id, url FROM card_photos WHERE card_id = ANY($1) ORDER BY card_id, position",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let promotions = sqlx::query_as::<_, CardPromotion>(
            r#"
            SELECT id, card_id, promotion_id, start_date, end_date FROM card_promotions
            WHERE card_id = ANY($1) AND end_date > now()
            ORDER BY card_id, start_date
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut cards: Vec<Card> = rows.into_iter().map(Card::from_row).collect();
        let index: HashMap<i64, usize> = cards
            .iter()
            .enumerate()
            .map(|(pos, card)| (card.id, pos))
            .collect();

        for (card_id, phone) in phones {
            if let Some(&pos) = index.get(&card_id) {
                cards[pos].phone_numbers.push(phone);
            }
        }
        for (card_id, social_type, social_link) in socials {
            if let Some(&pos) = index.get(&card_id) {
                cards[pos].social_medias.push(SocialMedia {
                    social_type,
                    social_link,
                });
            }
        }
        for (card_id, url) in photos {
            if let Some(&pos) = index.get(&card_id) {
                cards[pos].photos.push(url);
            }
        }
        for promotion in promotions {
            if let Some(&pos) = index.get(&promotion.card_id) {
                cards[pos].active_promotions.push(promotion);
            }
        }

        Ok(cards)
    }

    // ---------------------------------------------------------------------
    // Favorites
    // ---------------------------------------------------------------------

    #[builder]
    pub async fn add_favorite(&self, user_id: i64, card_id: i64) -> DbResult<()> {
        sqlx::query("INSERT INTO favorites (user_id, card_id) VALUES ($1, $2)")
            .bind(user_id)
            .bind(card_id)
            .execute(&self.pool)
            .await
            .map_err(|err| match DbError::from(err) {
                DbError::Duplicate { .. } => DbError::duplicate("favorite", card_id.to_string()),
                DbError::ForeignKeyViolation { .. } => DbError::not_found_with_id("card", card_id),
                other => other,
            })?;
        Ok(())
    }

    #[builder]
    pub async fn remove_favorite(&self, user_id: i64, card_id: i64) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM favorites WHERE user_id = $1 AND card_id = $2")
            .bind(user_id)
            .bind(card_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found_with_id("favorite", card_id));
        }
        Ok(())
    }

    #[builder]
    pub async fn list_favorites(&self, user_id: i64) -> DbResult<Vec<Card>> {
        let rows = sqlx::query_as::<_, CardRow>(
            r#"
            SELECT c.id, c.user_id, c.category_id, c.tariff_id, c.name, c.description,
                   c.address, c.location_lat, c.location_lng, c.website,
                   c.created_at, c.updated_at
            FROM favorites f
            INNER JOIN cards c ON c.id = f.card_id
            WHERE f.user_id = $1
            ORDER BY f.created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        self.hydrate_cards(rows).await
    }

    // ---------------------------------------------------------------------
    // Payments
    // ---------------------------------------------------------------------

    #[builder]
    pub async fn create_payment(&self, payment: &NewPayment) -> DbResult<Payment> {
        let created = sqlx::query_as::<_, Payment>(&format!(
            r#"
            INSERT INTO payments (
                order_id, user_id, card_id, payment_type, tariff_id, promotion_id, amount, state
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {PAYMENT_COLUMNS}
            "#
        ))
        .bind(&payment.order_id)
        .bind(payment.user_id)
        .bind(payment.card_id)
        .bind(payment.purchase.payment_type())
        .bind(payment.purchase.tariff_id())
        .bind(payment.purchase.promotion_id())
        .bind(payment.amount)
        .bind(PaymentState::Pending)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(
            order_id = %created.order_id,
            user_id = created.user_id,
            card_id = created.card_id,
            amount = created.amount,
            "payment created"
        );
        Ok(created)
    }

    #[builder]
    pub async fn get_payment_by_order_id(&self, order_id: &str) -> DbResult<Option<Payment>> {
        let payment = sqlx::query_as::<_, Payment>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE order_id = $1"
        ))
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(payment)
    }

    /// Gateway calls after `CreateTransaction` may identify the payment only
    /// by the gateway transaction id.
    #[builder]
    pub async fn get_payment_by_transaction_id(
        &self,
        transaction_id: &str,
    ) -> DbResult<Option<Payment>> {
        let payment = sqlx::query_as::<_, Payment>(&format!(
            r#"
            SELECT {PAYMENT_COLUMNS} FROM payments
            WHERE transaction_id = $1
            ORDER BY id DESC
            LIMIT 1
            "#
        ))
        .bind(transaction_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(payment)
    }

    /// Gateway `CreateTransaction`: moves the payment to `Created` and keeps the
    /// latest gateway transaction id. The first create time is preserved.
    #[builder]
    pub async fn create_transaction(
        &self,
        order_id: &str,
        transaction_id: &str,
        time_ms: i64,
    ) -> DbResult<LedgerOutcome> {
        let mut tx = self.pool.begin().await?;

        let Some(payment) = lock_payment(&mut tx, order_id).await? else {
            return Ok(LedgerOutcome::NotFound);
        };

        let outcome = match payment.state.on(LedgerEvent::Create) {
            Transition::Advance { to } => {
                let updated = sqlx::query_as::<_, Payment>(&format!(
                    r#"
                    UPDATE payments
                    SET state = $2, transaction_id = $3,
                        create_time = COALESCE(create_time, $4), updated_at = now()
                    WHERE id = $1
                    RETURNING {PAYMENT_COLUMNS}
                    "#
                ))
                .bind(payment.id)
                .bind(to)
                .bind(transaction_id)
                .bind(time_ms)
                .fetch_one(&mut *tx)
                .await?;
                LedgerOutcome::Applied(updated)
            }
            Transition::Replay => LedgerOutcome::Replayed(payment),
            Transition::Refused => LedgerOutcome::Refused(payment),
        };

        tx.commit().await?;
        log_outcome(order_id, LedgerEvent::Create, &outcome);
        Ok(outcome)
    }

    /// Gateway `PerformTransaction`: moves the payment to `Performed` and applies
    /// the purchase effect in the same transaction. A replay on an already
    /// performed payment changes nothing.
    #[builder]
    pub async fn perform_transaction(&self, order_id: &str, time_ms: i64) -> DbResult<LedgerOutcome> {
        let mut tx = self.pool.begin().await?;

        let Some(payment) = lock_payment(&mut tx, order_id).await? else {
            return Ok(LedgerOutcome::NotFound);
        };

        let outcome = match payment.state.on(LedgerEvent::Perform) {
            Transition::Advance { to } => {
                self.apply_purchase(&mut tx, &payment).await?;

                let updated = sqlx::query_as::<_, Payment>(&format!(
                    r#"
                    UPDATE payments
                    SET state = $2, perform_time = $3, updated_at = now()
                    WHERE id = $1
                    RETURNING {PAYMENT_COLUMNS}
                    "#
                ))
                .bind(payment.id)
                .bind(to)
                .bind(time_ms)
                .fetch_one(&mut *tx)
                .await?;
                LedgerOutcome::Applied(updated)
            }
            Transition::Replay => LedgerOutcome::Replayed(payment),
            Transition::Refused => LedgerOutcome::Refused(payment),
        };

        tx.commit().await?;
        log_outcome(order_id, LedgerEvent::Perform, &outcome);
        Ok(outcome)
    }

    #[builder]
    pub async fn cancel_transaction(
        &self,
        order_id: &str,
        reason: Option<i32>,
        time_ms: i64,
    ) -> DbResult<LedgerOutcome> {
        let mut tx = self.pool.begin().await?;

        let Some(payment) = lock_payment(&mut tx, order_id).await? else {
            return Ok(LedgerOutcome::NotFound);
        };

        let outcome = match payment.state.on(LedgerEvent::Cancel) {
            Transition::Advance { to } => {
                let updated = sqlx::query_as::<_, Payment>(&format!(
                    r#"
                    UPDATE payments
                    SET state = $2, reason = $3, cancel_time = $4, updated_at = now()
                    WHERE id = $1
                    RETURNING {PAYMENT_COLUMNS}
                    "#
                ))
                .bind(payment.id)
                .bind(to)
                .bind(reason)
                .bind(time_ms)
                .fetch_one(&mut *tx)
                .await?;
                LedgerOutcome::Applied(updated)
            }
            Transition::Replay => LedgerOutcome::Replayed(payment),
            Transition::Refused => LedgerOutcome::Refused(payment),
        };

        tx.commit().await?;
        log_outcome(order_id, LedgerEvent::Cancel, &outcome);
        Ok(outcome)
    }

    async fn apply_purchase(&self, conn: &mut PgConnection, payment: &Payment) -> DbResult<()> {
        let purchase = payment.purchase().ok_or_else(|| {
            DbError::Internal(format!(
                "payment {} has no target for type {}",
                payment.order_id, payment.payment_type
            ))
        })?;

        match purchase {
            Purchase::Tariff(tariff_id) => {
                let updated = self
                    .set_card_tariff()
                    .executor(&mut *conn)
                    .card_id(payment.card_id)
                    .tariff_id(tariff_id)
                    .call()
                    .await?;
                if !updated {
                    tracing::warn!(
                        order_id = %payment.order_id,
                        card_id = payment.card_id,
                        "card vanished before tariff purchase was applied"
                    );
                }
            }
            Purchase::Promotion(promotion_id) => {
                let promotion = self
                    .get_promotion()
                    .executor(&mut *conn)
                    .promotion_id(promotion_id)
                    .call()
                    .await?;
                let activation = self
                    .activate_promotion()
                    .executor(&mut *conn)
                    .card_id(payment.card_id)
                    .promotion(&promotion)
                    .call()
                    .await?;
                if activation.is_none() {
                    tracing::warn!(
                        order_id = %payment.order_id,
                        card_id = payment.card_id,
                        "card vanished before promotion purchase was applied"
                    );
                }
            }
        }

        Ok(())
    }
}

async fn lock_payment(conn: &mut PgConnection, order_id: &str) -> DbResult<Option<Payment>> {
    let payment = sqlx::query_as::<_, Payment>(&format!(
        "SELECT {PAYMENT_COLUMNS} FROM payments WHERE order_id = $1 FOR UPDATE"
    ))
    .bind(order_id)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(payment)
}

async fn write_card_children(
    conn: &mut PgConnection,
    card_id: i64,
    card: &NewCard,
) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO card_phones (card_id, position, phone)
        SELECT $1, t.ord::INTEGER, t.phone
        FROM UNNEST($2::TEXT[]) WITH ORDINALITY AS t(phone, ord)
        "#,
    )
    .bind(card_id)
    .bind(&card.phone_numbers)
    .execute(&mut *conn)
    .await?;

    let (types, links): (Vec<String>, Vec<String>) = card
        .social_medias
        .iter()
        .map(|social| (social.social_type.clone(), social.social_link.clone()))
        .unzip();

    sqlx::query(
        r#"
        INSERT INTO card_socials (card_id, position, social_type, social_link)
        SELECT $1, t.ord::INTEGER, t.social_type, t.social_link
        FROM UNNEST($2::TEXT[], $3::TEXT[]) WITH ORDINALITY AS t(social_type, social_link, ord)
        "#,
    )
    .bind(card_id)
    .bind(&types)
    .bind(&links)
    .execute(&mut *conn)
    .await?;

    sqlx::query(
        r#"
        INSERT INTO card_photos (card_id, position, url)
        SELECT $1, t.ord::INTEGER, t.url
        FROM UNNEST($2::TEXT[]) WITH ORDINALITY AS t(url, ord)
        "#,
    )
    .bind(card_id)
    .bind(&card.photos)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

fn log_outcome(order_id: &str, event: LedgerEvent, outcome: &LedgerOutcome) {
    match outcome {
        LedgerOutcome::Applied(payment) => tracing::info!(
            order_id,
            ?event,
            state = %payment.state,
            card_id = payment.card_id,
            "payment transition applied"
        ),
        LedgerOutcome::Replayed(payment) => tracing::info!(
            order_id,
            ?event,
            state = %payment.state,
            "payment transition replayed"
        ),
        LedgerOutcome::Refused(payment) => tracing::warn!(
            order_id,
            ?event,
            state = %payment.state,
            "payment transition refused"
        ),
        LedgerOutcome::NotFound => tracing::warn!(order_id, ?event, "payment not found"),
    }
}

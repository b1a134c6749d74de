use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};

use crate::ledger::PaymentState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    page: u32,
    per_page: u32,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(1, Self::DEFAULT_PER_PAGE)
    }
}

impl PageRequest {
    pub const DEFAULT_PER_PAGE: u32 = 10;
    pub const MAX_PER_PAGE: u32 = 100;

    /// Pages are 1-based; zero values are lifted to the first page / one item.
    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.clamp(1, Self::MAX_PER_PAGE),
        }
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn per_page(&self) -> u32 {
        self.per_page
    }

    pub fn offset(&self) -> i64 {
        (self.page as i64 - 1) * self.per_page as i64
    }

    pub fn limit(&self) -> i64 {
        self.per_page as i64
    }

    /// `ceil(total / per_page)`; zero matches yield zero pages.
    pub fn page_count(&self, total: i64) -> i64 {
        if total <= 0 {
            return 0;
        }
        let per_page = self.per_page as i64;
        (total + per_page - 1) / per_page
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "userId")]
    pub id: i64,
    pub email: String,
    pub full_name: String,
    pub profile_photo: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct UserCredentials {
    pub id: i64,
    pub email: String,
    pub password_hash: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfilePatch {
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub profile_photo: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    #[serde(rename = "categoryId")]
    pub id: i64,
    #[serde(rename = "categoryName")]
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Per-tariff limits applied to every card that references the tariff.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Tariff {
    #[serde(rename = "tariffId")]
    pub id: i64,
    #[serde(rename = "tariffName")]
    pub name: String,
    pub min_phones: i32,
    pub max_phones: i32,
    pub min_socials: i32,
    pub max_socials: i32,
    pub min_photos: i32,
    pub max_photos: i32,
    pub max_description_length: i32,
    pub website_allowed: bool,
    pub price: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTariff {
    pub name: String,
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

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TariffPatch {
    #[serde(rename = "tariffName")]
    pub name: Option<String>,
    pub min_phones: Option<i32>,
    pub max_phones: Option<i32>,
    pub min_socials: Option<i32>,
    pub max_socials: Option<i32>,
    pub min_photos: Option<i32>,
    pub max_photos: Option<i32>,
    pub max_description_length: Option<i32>,
    pub website_allowed: Option<bool>,
    pub price: Option<i64>,
}

impl TariffPatch {
    pub fn apply_to(&self, tariff: &Tariff) -> NewTariff {
        NewTariff {
            name: self.name.clone().unwrap_or_else(|| tariff.name.clone()),
            min_phones: self.min_phones.unwrap_or(tariff.min_phones),
            max_phones: self.max_phones.unwrap_or(tariff.max_phones),
            min_socials: self.min_socials.unwrap_or(tariff.min_socials),
            max_socials: self.max_socials.unwrap_or(tariff.max_socials),
            min_photos: self.min_photos.unwrap_or(tariff.min_photos),
            max_photos: self.max_photos.unwrap_or(tariff.max_photos),
            max_description_length: self
                .max_description_length
                .unwrap_or(tariff.max_description_length),
            website_allowed: self.website_allowed.unwrap_or(tariff.website_allowed),
            price: self.price.unwrap_or(tariff.price),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Promotion {
    #[serde(rename = "promotionId")]
    pub id: i64,
    pub name: String,
    pub description: String,
    pub duration_days: i32,
    pub price: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPromotion {
    pub name: String,
    pub description: String,
    pub duration_days: i32,
    pub price: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromotionPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub duration_days: Option<i32>,
    pub price: Option<i64>,
}

impl PromotionPatch {
    pub fn apply_to(&self, promotion: &Promotion) -> NewPromotion {
        NewPromotion {
            name: self.name.clone().unwrap_or_else(|| promotion.name.clone()),
            description: self
                .description
                .clone()
                .unwrap_or_else(|| promotion.description.clone()),
            duration_days: self.duration_days.unwrap_or(promotion.duration_days),
            price: self.price.unwrap_or(promotion.price),
        }
    }
}

/// One purchased activation of a promotion on a card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CardPromotion {
    #[serde(skip_serializing)]
    pub id: i64,
    #[serde(skip_serializing)]
    pub card_id: i64,
    pub promotion_id: i64,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SocialMedia {
    pub social_type: String,
    pub social_link: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct CardRow {
    pub id: i64,
    pub user_id: i64,
    pub category_id: i64,
    pub tariff_id: i64,
    pub name: String,
    pub description: String,
    pub address: String,
    pub location_lat: Option<f64>,
    pub location_lng: Option<f64>,
    pub website: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A card together with its owned child collections.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    #[serde(rename = "cardId")]
    pub id: i64,
    pub user_id: i64,
    pub category_id: i64,
    pub tariff_id: i64,
    #[serde(rename = "cardName")]
    pub name: String,
    pub description: String,
    pub address: String,
    pub location_lat: Option<f64>,
    pub location_lng: Option<f64>,
    pub website: Option<String>,
    pub phone_numbers: Vec<String>,
    pub social_medias: Vec<SocialMedia>,
    pub photos: Vec<String>,
    pub active_promotions: Vec<CardPromotion>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Card {
    pub fn from_row(row: CardRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            category_id: row.category_id,
            tariff_id: row.tariff_id,
            name: row.name,
            description: row.description,
            address: row.address,
            location_lat: row.location_lat,
            location_lng: row.location_lng,
            website: row.website,
            phone_numbers: Vec::new(),
            social_medias: Vec::new(),
            photos: Vec::new(),
            active_promotions: Vec::new(),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Field values written on card create and on full-replace update.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCard {
    pub category_id: i64,
    pub tariff_id: i64,
    pub name: String,
    pub description: String,
    pub address: String,
    pub location_lat: Option<f64>,
    pub location_lng: Option<f64>,
    pub website: Option<String>,
    pub phone_numbers: Vec<String>,
    pub social_medias: Vec<SocialMedia>,
    pub photos: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CardFilter {
    pub category_id: Option<i64>,
    pub user_id: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "payment_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentType {
    Tariff,
    Promotion,
}

impl std::fmt::Display for PaymentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentType::Tariff => write!(f, "tariff"),
            PaymentType::Promotion => write!(f, "promotion"),
        }
    }
}

/// What a payment buys; exactly one target id per payment type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Purchase {
    Tariff(i64),
    Promotion(i64),
}

impl Purchase {
    pub fn payment_type(&self) -> PaymentType {
        match self {
            Purchase::Tariff(_) => PaymentType::Tariff,
            Purchase::Promotion(_) => PaymentType::Promotion,
        }
    }

    pub fn tariff_id(&self) -> Option<i64> {
        match self {
            Purchase::Tariff(id) => Some(*id),
            Purchase::Promotion(_) => None,
        }
    }

    pub fn promotion_id(&self) -> Option<i64> {
        match self {
            Purchase::Tariff(_) => None,
            Purchase::Promotion(id) => Some(*id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct Payment {
    pub id: i64,
    pub order_id: String,
    pub user_id: i64,
    pub card_id: i64,
    pub payment_type: PaymentType,
    pub tariff_id: Option<i64>,
    pub promotion_id: Option<i64>,
    pub amount: i64,
    pub transaction_id: Option<String>,
    pub state: PaymentState,
    pub reason: Option<i32>,
    pub create_time: Option<i64>,
    pub perform_time: Option<i64>,
    pub cancel_time: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    pub fn purchase(&self) -> Option<Purchase> {
        match self.payment_type {
            PaymentType::Tariff => self.tariff_id.map(Purchase::Tariff),
            PaymentType::Promotion => self.promotion_id.map(Purchase::Promotion),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPayment {
    pub order_id: String,
    pub user_id: i64,
    pub card_id: i64,
    pub purchase: Purchase,
    pub amount: i64,
}

//! Tariff-rule enforcement for card writes.
//!
//! [`validate_card`] is a pure decision over a parsed [`CardDraft`] and the
//! tariff the card will reference after the write. Checks run in a fixed
//! order and the first failing check is reported.

use be_remote_db::{NewCard, SocialMedia, Tariff};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("{0}")]
    Malformed(String),

    #[error(
        "description is {length} characters long but tariff '{tariff}' (id {tariff_id}) allows at most {max}"
    )]
    DescriptionTooLong {
        length: usize,
        max: i32,
        tariff: String,
        tariff_id: i64,
    },

    #[error("tariff '{tariff}' does not allow a website")]
    WebsiteNotAllowed { tariff: String },

    #[error("tariff '{tariff}' requires between {min} and {max} {kind}, got {count}")]
    CountOutOfBounds {
        kind: &'static str,
        min: i32,
        max: i32,
        count: usize,
        tariff: String,
    },
}

impl ValidationError {
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed(message.into())
    }
}

/// Card fields as submitted, before any tariff rule is applied.
///
/// `P` is the photo representation: submitted parts on the way in, stored
/// URLs once uploads have happened.
#[derive(Debug, Clone, PartialEq)]
pub struct CardDraft<P> {
    pub category_id: Option<i64>,
    pub tariff_id: Option<i64>,
    pub name: String,
    pub description: String,
    pub address: String,
    pub location_lat: Option<f64>,
    pub location_lng: Option<f64>,
    pub website: Option<String>,
    pub phone_numbers: Vec<String>,
    pub social_medias: Vec<SocialMedia>,
    pub photos: Vec<P>,
}

impl<P> Default for CardDraft<P> {
    fn default() -> Self {
        Self {
            category_id: None,
            tariff_id: None,
            name: String::new(),
            description: String::new(),
            address: String::new(),
            location_lat: None,
            location_lng: None,
            website: None,
            phone_numbers: Vec::new(),
            social_medias: Vec::new(),
            photos: Vec::new(),
        }
    }
}

/// A draft that satisfied every rule of `tariff_id`.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedCard<P> {
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
    pub photos: Vec<P>,
}

impl<P> ValidatedCard<P> {
    /// Swaps the photo parts for their stored URLs. The URL list must keep
    /// the submitted order and length.
    pub fn into_new_card(self, photo_urls: Vec<String>) -> NewCard {
        debug_assert_eq!(photo_urls.len(), self.photos.len());
        NewCard {
            category_id: self.category_id,
            tariff_id: self.tariff_id,
            name: self.name,
            description: self.description,
            address: self.address,
            location_lat: self.location_lat,
            location_lng: self.location_lng,
            website: self.website,
            phone_numbers: self.phone_numbers,
            social_medias: self.social_medias,
            photos: photo_urls,
        }
    }
}

fn required(value: &str, field: &'static str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::MissingField(field));
    }
    Ok(trimmed.to_string())
}

fn check_count(
    kind: &'static str,
    count: usize,
    min: i32,
    max: i32,
    tariff: &Tariff,
) -> Result<(), ValidationError> {
    let within = i64::try_from(count)
        .map(|count| count >= i64::from(min) && count <= i64::from(max))
        .unwrap_or(false);
    if within {
        Ok(())
    } else {
        Err(ValidationError::CountOutOfBounds {
            kind,
            min,
            max,
            count,
            tariff: tariff.name.clone(),
        })
    }
}

/// Applies the rules of `tariff` to `draft`.
///
/// The draft's `tariff_id` is not consulted; the caller resolved `tariff`
/// from it, and the validated card references `tariff.id`.
pub fn validate_card<P>(
    tariff: &Tariff,
    draft: CardDraft<P>,
) -> Result<ValidatedCard<P>, ValidationError> {
    let category_id = draft
        .category_id
        .ok_or(ValidationError::MissingField("categoryId"))?;
    let name = required(&draft.name, "cardName")?;
    required(&draft.description, "description")?;
    let address = required(&draft.address, "address")?;

    let length = draft.description.chars().count();
    let within_limit = i64::try_from(length)
        .map(|length| length <= i64::from(tariff.max_description_length))
        .unwrap_or(false);
    if !within_limit {
        return Err(ValidationError::DescriptionTooLong {
            length,
            max: tariff.max_description_length,
            tariff: tariff.name.clone(),
            tariff_id: tariff.id,
        });
    }

    let website = draft
        .website
        .map(|website| website.trim().to_string())
        .filter(|website| !website.is_empty());
    if website.is_some() && !tariff.website_allowed {
        return Err(ValidationError::WebsiteNotAllowed {
            tariff: tariff.name.clone(),
        });
    }

    check_count(
        "phone numbers",
        draft.phone_numbers.len(),
        tariff.min_phones,
        tariff.max_phones,
        tariff,
    )?;
    check_count(
        "social media links",
        draft.social_medias.len(),
        tariff.min_socials,
        tariff.max_socials,
        tariff,
    )?;
    check_count(
        "photos",
        draft.photos.len(),
        tariff.min_photos,
        tariff.max_photos,
        tariff,
    )?;

    Ok(ValidatedCard {
        category_id,
        tariff_id: tariff.id,
        name,
        description: draft.description,
        address,
        location_lat: draft.location_lat,
        location_lng: draft.location_lng,
        website,
        phone_numbers: draft.phone_numbers,
        social_medias: draft.social_medias,
        photos: draft.photos,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tariff() -> Tariff {
        Tariff {
            id: 7,
            name: "Standard".into(),
            min_phones: 1,
            max_phones: 3,
            min_socials: 0,
            max_socials: 2,
            min_photos: 1,
            max_photos: 5,
            max_description_length: 400,
            website_allowed: true,
            price: 50_000,
            created_at: chrono::Utc::now(),
        }
    }

    fn social(n: usize) -> SocialMedia {
        SocialMedia {
            social_type: "instagram".into(),
            social_link: format!("https://instagram.com/shop{n}"),
        }
    }

    fn draft() -> CardDraft<u8> {
        CardDraft {
            category_id: Some(2),
            tariff_id: Some(7),
            name: "Corner bakery".into(),
            description: "Fresh bread every morning".into(),
            address: "12 Main St".into(),
            phone_numbers: vec!["+998901112233".into(), "+998901112244".into()],
            social_medias: vec![social(1)],
            photos: vec![1, 2, 3],
            ..Default::default()
        }
    }

    #[test]
    fn valid_draft_is_accepted_and_trimmed() {
        let mut input = draft();
        input.name = "  Corner bakery ".into();
        input.website = Some("   ".into());

        let card = validate_card(&tariff(), input).unwrap();
        assert_eq!(card.name, "Corner bakery");
        assert_eq!(card.tariff_id, 7);
        assert_eq!(card.website, None);
        assert_eq!(card.photos, vec![1, 2, 3]);
    }

    #[test]
    fn required_fields_are_checked_in_order() {
        let mut input = draft();
        input.category_id = None;
        input.name = String::new();
        assert_eq!(
            validate_card(&tariff(), input).unwrap_err(),
            ValidationError::MissingField("categoryId")
        );

        let mut input = draft();
        input.name = "   ".into();
        input.address = String::new();
        assert_eq!(
            validate_card(&tariff(), input).unwrap_err().to_string(),
            "cardName is required"
        );

        let mut input = draft();
        input.address = "\t".into();
        assert_eq!(
            validate_card(&tariff(), input).unwrap_err().to_string(),
            "address is required"
        );
    }

    #[test]
    fn description_limit_is_inclusive() {
        let mut input = draft();
        input.description = "a".repeat(400);
        assert!(validate_card(&tariff(), input).is_ok());

        let mut input = draft();
        input.description = "a".repeat(401);
        let err = validate_card(&tariff(), input).unwrap_err();
        assert_eq!(
            err.to_string(),
            "description is 401 characters long but tariff 'Standard' (id 7) allows at most 400"
        );
    }

    #[test]
    fn description_counts_characters_not_bytes() {
        let mut input = draft();
        input.description = "ё".repeat(400);
        assert!(validate_card(&tariff(), input).is_ok());
    }

    #[test]
    fn website_requires_permission() {
        let mut rules = tariff();
        rules.website_allowed = false;

        let mut input = draft();
        input.website = Some("https://bakery.example".into());
        assert_eq!(
            validate_card(&rules, input).unwrap_err(),
            ValidationError::WebsiteNotAllowed {
                tariff: "Standard".into()
            }
        );
    }

    #[test]
    fn website_is_rejected_before_count_violations() {
        let mut rules = tariff();
        rules.website_allowed = false;

        let mut input = draft();
        input.website = Some("https://bakery.example".into());
        input.phone_numbers.clear();
        input.photos.clear();
        assert!(matches!(
            validate_card(&rules, input).unwrap_err(),
            ValidationError::WebsiteNotAllowed { .. }
        ));
    }

    #[test]
    fn phone_bounds_are_inclusive_and_named() {
        for count in 1..=3 {
            let mut input = draft();
            input.phone_numbers = vec!["+1".into(); count];
            assert!(validate_card(&tariff(), input).is_ok(), "{count} phones");
        }

        for count in [0, 4] {
            let mut input = draft();
            input.phone_numbers = vec!["+1".into(); count];
            assert_eq!(
                validate_card(&tariff(), input).unwrap_err().to_string(),
                format!("tariff 'Standard' requires between 1 and 3 phone numbers, got {count}")
            );
        }
    }

    #[test]
    fn social_bounds_are_checked_before_photos() {
        let mut input = draft();
        input.social_medias = (0..3).map(social).collect();
        input.photos.clear();
        assert_eq!(
            validate_card(&tariff(), input).unwrap_err().to_string(),
            "tariff 'Standard' requires between 0 and 2 social media links, got 3"
        );
    }

    #[test]
    fn photo_bounds_are_inclusive_and_named() {
        let mut input = draft();
        input.photos = vec![0; 5];
        assert!(validate_card(&tariff(), input).is_ok());

        let mut input = draft();
        input.photos = vec![0; 6];
        assert_eq!(
            validate_card(&tariff(), input).unwrap_err(),
            ValidationError::CountOutOfBounds {
                kind: "photos",
                min: 1,
                max: 5,
                count: 6,
                tariff: "Standard".into(),
            }
        );

        let mut input = draft();
        input.photos.clear();
        assert!(matches!(
            validate_card(&tariff(), input).unwrap_err(),
            ValidationError::CountOutOfBounds { kind: "photos", count: 0, .. }
        ));
    }

    #[test]
    fn validated_card_keeps_photo_order() {
        let card = validate_card(&tariff(), draft()).unwrap();
        let new_card = card.into_new_card(vec!["/a".into(), "/b".into(), "/c".into()]);
        assert_eq!(new_card.photos, vec!["/a", "/b", "/c"]);
        assert_eq!(new_card.category_id, 2);
    }
}

//! Multipart card form parsing.

use axum::{body::Bytes, extract::Multipart};
use be_remote_db::SocialMedia;

use crate::{
    error::CardError,
    validator::{CardDraft, ValidationError},
};

/// An image file submitted with the form.
#[derive(Debug, Clone, PartialEq)]
pub struct PhotoUpload {
    pub content_type: String,
    pub bytes: Bytes,
}

/// One entry of the `photos` field: a new file, or the URL of a photo the
/// card already has (kept on update).
#[derive(Debug, Clone, PartialEq)]
pub enum PhotoPart {
    Upload(PhotoUpload),
    Existing(String),
}

#[derive(Debug, Default)]
pub struct CardForm {
    pub card_id: Option<i64>,
    pub draft: CardDraft<PhotoPart>,
}

/// Blank values mean "absent"; anything else must be an integer.
pub fn parse_id(field: &str, value: &str) -> Result<Option<i64>, ValidationError> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    value
        .parse::<i64>()
        .map(Some)
        .map_err(|_| ValidationError::malformed(format!("{field} must be an integer")))
}

pub fn parse_coordinate(field: &str, value: &str) -> Result<Option<f64>, ValidationError> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    match value.parse::<f64>() {
        Ok(number) if number.is_finite() => Ok(Some(number)),
        _ => Err(ValidationError::malformed(format!(
            "{field} must be a number"
        ))),
    }
}

pub fn parse_social(value: &str) -> Result<SocialMedia, ValidationError> {
    serde_json::from_str::<SocialMedia>(value).map_err(|_| {
        ValidationError::malformed(
            "socialMedias entries must be JSON objects with socialType and socialLink",
        )
    })
}

impl CardForm {
    /// Applies one text field. Unknown names are ignored.
    pub fn apply_text(&mut self, name: &str, value: String) -> Result<(), ValidationError> {
        let draft = &mut self.draft;
        match name {
            "cardId" => self.card_id = parse_id(name, &value)?,
            "tariffId" => draft.tariff_id = parse_id(name, &value)?,
            "categoryId" => draft.category_id = parse_id(name, &value)?,
            "cardName" => draft.name = value,
            "description" => draft.description = value,
            "address" => draft.address = value,
            "locationLat" => draft.location_lat = parse_coordinate(name, &value)?,
            "locationLng" => draft.location_lng = parse_coordinate(name, &value)?,
            "website" => draft.website = Some(value),
            "phoneNumbers" => {
                let phone = value.trim();
                if !phone.is_empty() {
                    draft.phone_numbers.push(phone.to_string());
                }
            }
            "socialMedias" => {
                if !value.trim().is_empty() {
                    draft.social_medias.push(parse_social(&value)?);
                }
            }
            "photos" => {
                let url = value.trim();
                if !url.is_empty() {
                    draft.photos.push(PhotoPart::Existing(url.to_string()));
                }
            }
            _ => {}
        }
        Ok(())
    }

    pub async fn read(mut multipart: Multipart) -> Result<Self, CardError> {
        let mut form = CardForm::default();

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();

            if name == "photos" && field.file_name().is_some() {
                let content_type = field.content_type().unwrap_or_default().to_string();
                let bytes = field.bytes().await?;
                // Browsers send an empty part for an untouched file input.
                if !bytes.is_empty() {
                    form.draft.photos.push(PhotoPart::Upload(PhotoUpload {
                        content_type,
                        bytes,
                    }));
                }
                continue;
            }

            let value = field.text().await?;
            form.apply_text(&name, value)?;
        }

        Ok(form)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_must_be_integers() {
        assert_eq!(parse_id("tariffId", " 12 ").unwrap(), Some(12));
        assert_eq!(parse_id("tariffId", "").unwrap(), None);
        assert_eq!(
            parse_id("tariffId", "twelve").unwrap_err().to_string(),
            "tariffId must be an integer"
        );
        assert!(parse_id("categoryId", "1.5").is_err());
    }

    #[test]
    fn empty_coordinates_are_absent_not_zero() {
        assert_eq!(parse_coordinate("locationLat", "").unwrap(), None);
        assert_eq!(
            parse_coordinate("locationLat", "41.311").unwrap(),
            Some(41.311)
        );
        assert!(parse_coordinate("locationLng", "NaN").is_err());
        assert!(parse_coordinate("locationLng", "east").is_err());
    }

    #[test]
    fn text_fields_accumulate_repeated_values() {
        let mut form = CardForm::default();
        form.apply_text("phoneNumbers", "+998901112233".into()).unwrap();
        form.apply_text("phoneNumbers", "  ".into()).unwrap();
        form.apply_text("phoneNumbers", "+998901112244".into()).unwrap();
        form.apply_text(
            "socialMedias",
            r#"{"socialType":"telegram","socialLink":"https://t.me/shop"}"#.into(),
        )
        .unwrap();
        form.apply_text("photos", "/uploads/cards/1/abc.png".into())
            .unwrap();
        form.apply_text("unknown", "ignored".into()).unwrap();

        assert_eq!(form.draft.phone_numbers.len(), 2);
        assert_eq!(form.draft.social_medias[0].social_type, "telegram");
        assert_eq!(
            form.draft.photos,
            vec![PhotoPart::Existing("/uploads/cards/1/abc.png".into())]
        );
    }

    #[test]
    fn malformed_social_entry_is_rejected() {
        let mut form = CardForm::default();
        let err = form
            .apply_text("socialMedias", "instagram.com/shop".into())
            .unwrap_err();
        assert!(matches!(err, ValidationError::Malformed(_)));
    }
}

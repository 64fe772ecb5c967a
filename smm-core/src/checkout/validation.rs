//! Draft validation, run before any network call.

use smm_sdk::objects::{CardData, OrderDraft, PaymentMethod, Service};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("enter a quantity")]
    MissingQuantity,

    #[error("quantity {quantity} must be between {min} and {max}")]
    QuantityOutOfRange { quantity: u64, min: u64, max: u64 },

    #[error("enter the profile or post link")]
    MissingTargetUrl,

    #[error("enter a WhatsApp number")]
    MissingWhatsapp,

    #[error("invalid e-mail address: {0}")]
    InvalidEmail(String),

    #[error("daily drip-feed quantity {daily} must be between 1 and {quantity}")]
    InvalidDripFeed { daily: u64, quantity: u64 },

    #[error("card payments need card data")]
    MissingCardData,
}

/// Check `quantity` against the service bounds.
pub fn validate_quantity(service: &Service, quantity: u64) -> Result<u64, ValidationError> {
    if quantity == 0 {
        return Err(ValidationError::MissingQuantity);
    }
    if !service.accepts_quantity(quantity) {
        return Err(ValidationError::QuantityOutOfRange {
            quantity,
            min: service.min_quantity,
            max: service.max_quantity,
        });
    }
    Ok(quantity)
}

/// Validate a draft for `service`. Returns the first problem found.
pub fn validate_draft(service: &Service, draft: &OrderDraft) -> Result<(), ValidationError> {
    let quantity = validate_quantity(service, draft.quantity)?;

    if draft.target_url.trim().is_empty() {
        return Err(ValidationError::MissingTargetUrl);
    }

    let whatsapp_digits = draft
        .customer_whatsapp
        .chars()
        .filter(char::is_ascii_digit)
        .count();
    if whatsapp_digits == 0 {
        return Err(ValidationError::MissingWhatsapp);
    }

    if let Some(email) = draft.customer_email.as_deref().map(str::trim)
        && !email.is_empty()
        && !looks_like_email(email)
    {
        return Err(ValidationError::InvalidEmail(email.to_string()));
    }

    if let Some(drip) = draft.drip_feed
        && (drip.daily_quantity == 0 || drip.daily_quantity > quantity)
    {
        return Err(ValidationError::InvalidDripFeed {
            daily: drip.daily_quantity,
            quantity,
        });
    }

    Ok(())
}

/// Card payments must carry a non-empty card token.
pub fn validate_payment_method(
    method: PaymentMethod,
    card: Option<&CardData>,
) -> Result<(), ValidationError> {
    match (method, card) {
        (PaymentMethod::Card, None) => Err(ValidationError::MissingCardData),
        (PaymentMethod::Card, Some(card)) if card.token.trim().is_empty() => {
            Err(ValidationError::MissingCardData)
        }
        _ => Ok(()),
    }
}

fn looks_like_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.ends_with('.'),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use smm_sdk::objects::DripFeed;

    fn service() -> Service {
        Service {
            id: 1,
            name: "TikTok Views".to_string(),
            platform: "tiktok".to_string(),
            service_type: "views".to_string(),
            price_per_thousand: Decimal::new(350, 2),
            min_quantity: 100,
            max_quantity: 100_000,
            default_quantity: 1000,
            is_express_eligible: false,
        }
    }

    fn draft() -> OrderDraft {
        OrderDraft {
            target_url: "https://tiktok.com/@someone/video/1".to_string(),
            quantity: 1000,
            customer_email: Some("buyer@example.com".to_string()),
            customer_whatsapp: "+55 (11) 99999-9999".to_string(),
            ..OrderDraft::default()
        }
    }

    #[test]
    fn test_valid_draft() {
        assert_eq!(validate_draft(&service(), &draft()), Ok(()));
    }

    #[test]
    fn test_quantity_errors() {
        let mut d = draft();
        d.quantity = 0;
        assert_eq!(
            validate_draft(&service(), &d),
            Err(ValidationError::MissingQuantity)
        );

        d.quantity = 50;
        assert_eq!(
            validate_draft(&service(), &d),
            Err(ValidationError::QuantityOutOfRange {
                quantity: 50,
                min: 100,
                max: 100_000
            })
        );
    }

    #[test]
    fn test_contact_errors() {
        let mut d = draft();
        d.customer_whatsapp = "  ".to_string();
        assert_eq!(
            validate_draft(&service(), &d),
            Err(ValidationError::MissingWhatsapp)
        );

        let mut d = draft();
        d.customer_email = Some("not-an-email".to_string());
        assert!(matches!(
            validate_draft(&service(), &d),
            Err(ValidationError::InvalidEmail(_))
        ));

        let mut d = draft();
        d.customer_email = Some(String::new());
        assert_eq!(validate_draft(&service(), &d), Ok(()));

        let mut d = draft();
        d.target_url = " ".to_string();
        assert_eq!(
            validate_draft(&service(), &d),
            Err(ValidationError::MissingTargetUrl)
        );
    }

    #[test]
    fn test_drip_feed() {
        let mut d = draft();
        d.drip_feed = Some(DripFeed { daily_quantity: 250 });
        assert_eq!(validate_draft(&service(), &d), Ok(()));

        d.drip_feed = Some(DripFeed { daily_quantity: 0 });
        assert!(matches!(
            validate_draft(&service(), &d),
            Err(ValidationError::InvalidDripFeed { .. })
        ));

        d.drip_feed = Some(DripFeed { daily_quantity: 5000 });
        assert!(matches!(
            validate_draft(&service(), &d),
            Err(ValidationError::InvalidDripFeed { .. })
        ));
    }

    #[test]
    fn test_card_needs_token() {
        assert!(validate_payment_method(PaymentMethod::Pix, None).is_ok());
        assert_eq!(
            validate_payment_method(PaymentMethod::Card, None),
            Err(ValidationError::MissingCardData)
        );
        let card = CardData {
            token: "tok_visa".to_string(),
            installments: 1,
        };
        assert!(validate_payment_method(PaymentMethod::Card, Some(&card)).is_ok());
    }
}

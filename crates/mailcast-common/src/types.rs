//! Common types for Mailcast

use uuid::Uuid;

/// Unique identifier for templates
pub type TemplateId = String;

/// Unique identifier for contact lists
pub type ContactListId = String;

/// Unique identifier for contacts
pub type ContactId = String;

/// Unique identifier for campaigns
pub type CampaignId = String;

/// Generate a new record identifier.
///
/// Identifiers are opaque strings. New ones are UUIDv7 (millisecond timestamp
/// followed by random bits), so they sort by creation time. Older records may
/// carry purely numeric ids and must keep working.
pub fn new_id() -> String {
    Uuid::now_v7().to_string()
}

/// Minimal email sanity check used when accepting contacts.
///
/// Only requires a non-empty local part and domain around a single `@`;
/// the relay is the final judge of deliverability.
pub fn looks_like_email(value: &str) -> bool {
    match value.trim().split_once('@') {
        Some((local, domain)) => !local.is_empty() && !domain.is_empty() && !domain.contains('@'),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_id_is_unique_uuid() {
        let a = new_id();
        let b = new_id();
        assert_ne!(a, b);
        assert!(Uuid::parse_str(&a).is_ok());
    }

    #[test]
    fn test_looks_like_email() {
        assert!(looks_like_email("ann@example.com"));
        assert!(looks_like_email("  bob@example.org "));
        assert!(!looks_like_email("example.com"));
        assert!(!looks_like_email("@example.com"));
        assert!(!looks_like_email("ann@"));
        assert!(!looks_like_email("a@b@c"));
    }
}

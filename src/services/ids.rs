//! Logical identifier generation
//!
//! Ids are a prefix plus the millisecond timestamp. The timestamp part is kept strictly
//! increasing within the process so two ids minted in the same millisecond never collide.

use chrono::Utc;
use rand::Rng;
use std::sync::atomic::{AtomicI64, Ordering};

/// Known service names and their application id prefix
const SERVICE_CODES: &[(&str, &str)] = &[
    ("driving_license", "DL"),
    ("driving license", "DL"),
    ("learners_license", "LL"),
    ("learner license", "LL"),
    ("vehicle_registration", "VR"),
    ("birth_certificate", "BC"),
    ("death_certificate", "DC"),
    ("income_certificate", "IC"),
    ("caste_certificate", "CC"),
    ("ration_card", "RC"),
    ("property_tax", "PT"),
    ("trade_license", "TL"),
];

/// Monotonic id source
#[derive(Debug, Default)]
pub struct IdGenerator {
    last_millis: AtomicI64,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current time in milliseconds, bumped past the last value handed out
    fn next_millis(&self) -> i64 {
        let now = Utc::now().timestamp_millis();
        let mut last = self.last_millis.load(Ordering::SeqCst);
        loop {
            let next = now.max(last + 1);
            match self
                .last_millis
                .compare_exchange(last, next, Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(_) => return next,
                Err(current) => last = current,
            }
        }
    }

    /// `CIT<millis><3 digits>`
    pub fn citizen_id(&self) -> String {
        format!("CIT{}{}", self.next_millis(), random_digits(3))
    }

    /// Service prefix plus millisecond timestamp, e.g. `DL1729250000000`
    pub fn application_id(&self, service_type: &str) -> String {
        format!("{}{}", service_prefix(service_type), self.next_millis())
    }

    pub fn payment_id(&self) -> String {
        format!("PAY{}{}", self.next_millis(), random_digits(3))
    }

    pub fn transaction_id(&self) -> String {
        format!("TXN{}{}", self.next_millis(), random_digits(6))
    }

    pub fn refund_id(&self) -> String {
        format!("RFD{}{}", self.next_millis(), random_digits(3))
    }
}

fn random_digits(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect()
}

/// Longest prefix kept, so prefix + timestamp never reaches ObjectId length
const MAX_PREFIX_LEN: usize = 6;

/// Application id prefix for a service type
///
/// Short alphanumeric codes (`DL`, `bc`) are used as-is, uppercased. Known service names
/// map to their code. Anything else becomes the initials of its words. A prefix that does
/// not start with a letter would make the id all digits, so those become `APP`.
pub fn service_prefix(service_type: &str) -> String {
    let trimmed = service_type.trim();
    let lowered = trimmed.to_ascii_lowercase();

    let candidate = if (1..=4).contains(&trimmed.len())
        && trimmed.chars().all(|c| c.is_ascii_alphanumeric())
    {
        trimmed.to_ascii_uppercase()
    } else if let Some((_, code)) = SERVICE_CODES.iter().find(|(name, _)| *name == lowered) {
        code.to_string()
    } else {
        lowered
            .split(|c: char| !c.is_ascii_alphanumeric())
            .filter_map(|word| word.chars().next())
            .map(|c| c.to_ascii_uppercase())
            .take(MAX_PREFIX_LEN)
            .collect()
    };

    match candidate.chars().next() {
        Some(first) if first.is_ascii_alphabetic() => candidate,
        _ => "APP".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RecordId;

    #[test]
    fn test_service_prefix() {
        assert_eq!(service_prefix("DL"), "DL");
        assert_eq!(service_prefix("dl"), "DL");
        assert_eq!(service_prefix("driving_license"), "DL");
        assert_eq!(service_prefix("Birth_Certificate"), "BC");
        assert_eq!(service_prefix("water connection request"), "WCR");
        assert_eq!(service_prefix(""), "APP");
        assert_eq!(service_prefix("---"), "APP");
    }

    #[test]
    fn test_prefix_always_starts_with_letter() {
        assert_eq!(service_prefix("7"), "APP");
        assert_eq!(service_prefix("42"), "APP");
        assert_eq!(service_prefix("2 wheeler permit"), "APP");
        assert_eq!(service_prefix("a7"), "A7");
        assert_eq!(service_prefix("a b c d e f a b c d e"), "ABCDEF");

        let ids = IdGenerator::new();
        for service in ["7", "DL", "a b c d e f a b c d e", "birth_certificate"] {
            let id = ids.application_id(service);
            assert!(id.len() < 24);
            assert!(matches!(RecordId::parse(&id), RecordId::Logical(_)), "{id}");
        }
    }

    #[test]
    fn test_application_ids_are_unique_and_prefixed() {
        let ids = IdGenerator::new();
        let first = ids.application_id("DL");
        let second = ids.application_id("DL");

        assert!(first.starts_with("DL"));
        assert_eq!(first.len(), 2 + 13);
        assert!(first[2..].chars().all(|c| c.is_ascii_digit()));
        assert_ne!(first, second);
    }

    #[test]
    fn test_other_prefixes() {
        let ids = IdGenerator::new();
        assert!(ids.citizen_id().starts_with("CIT"));
        assert!(ids.payment_id().starts_with("PAY"));
        assert!(ids.transaction_id().starts_with("TXN"));
        assert!(ids.refund_id().starts_with("RFD"));
    }
}

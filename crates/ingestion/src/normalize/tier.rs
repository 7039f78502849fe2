//! Subscription tier normalizer

use contracts::{RawValue, SubscriptionTier};

/// Known spellings (trimmed, lowercase) and the tier they stand for.
pub const TIER_SYNONYMS: &[(&str, SubscriptionTier)] = &[
    ("pro", SubscriptionTier::Pro),
    ("professional", SubscriptionTier::Pro),
    ("prem", SubscriptionTier::Pro),
    ("premium", SubscriptionTier::Pro),
    ("premium plan", SubscriptionTier::Pro),
    ("pro plan", SubscriptionTier::Pro),
    ("proffesional", SubscriptionTier::Pro),
    ("profesional", SubscriptionTier::Pro),
    ("premuim", SubscriptionTier::Pro),
    ("basic", SubscriptionTier::Basic),
    ("free", SubscriptionTier::Basic),
    ("standard", SubscriptionTier::Basic),
    ("starter", SubscriptionTier::Basic),
];

/// Map a raw tier onto the canonical set. Unknown input is `Basic`.
pub fn normalize_tier(value: &RawValue) -> SubscriptionTier {
    let Some(text) = value.as_text() else {
        return SubscriptionTier::Basic;
    };
    let key = text.trim().to_lowercase();

    TIER_SYNONYMS
        .iter()
        .find(|(synonym, _)| *synonym == key)
        .map(|(_, tier)| *tier)
        .unwrap_or_default()
}

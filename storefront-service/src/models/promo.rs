use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromoKind {
    Percentage,
    Fixed,
}

/// A promo code as stored on a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromoDiscount {
    pub code: String,
    pub discount: Decimal,
    #[serde(rename = "type")]
    pub kind: PromoKind,
}

const CATALOG: &[(&str, i64, PromoKind)] = &[
    ("WELCOME10", 10, PromoKind::Percentage),
    ("SAVE20", 20, PromoKind::Percentage),
    ("SAVE5", 5, PromoKind::Fixed),
    ("FREESHIP", 15, PromoKind::Fixed),
];

impl PromoDiscount {
    /// Look a code up in the promo catalog. Codes are matched trimmed and
    /// case-insensitively.
    pub fn lookup(code: &str) -> Option<Self> {
        let normalized = code.trim().to_uppercase();
        CATALOG
            .iter()
            .find(|(name, ..)| *name == normalized)
            .map(|(name, amount, kind)| PromoDiscount {
                code: name.to_string(),
                discount: Decimal::from(*amount),
                kind: *kind,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_insensitive() {
        let promo = PromoDiscount::lookup("  welcome10 ").unwrap();
        assert_eq!(promo.code, "WELCOME10");
        assert_eq!(promo.kind, PromoKind::Percentage);
        assert_eq!(promo.discount, Decimal::new(10, 0));
    }

    #[test]
    fn fixed_codes() {
        let promo = PromoDiscount::lookup("FREESHIP").unwrap();
        assert_eq!(promo.kind, PromoKind::Fixed);
        assert_eq!(promo.discount, Decimal::new(15, 0));
    }

    #[test]
    fn unknown_code() {
        assert!(PromoDiscount::lookup("BOGUS").is_none());
    }

    #[test]
    fn serializes_kind_as_type() {
        let json = serde_json::to_value(PromoDiscount::lookup("SAVE5").unwrap()).unwrap();
        assert_eq!(json["type"], "fixed");
        assert_eq!(json["code"], "SAVE5");
    }
}

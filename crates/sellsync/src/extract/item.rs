use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::heuristic::{normalize_currency, parse_amount};

/// One line item pulled out of free-form text.
///
/// `price` and `currency` are always serialized (as `null` when unknown);
/// `description` and `confidence` only when present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedItem {
    pub name: String,
    pub price: Option<f64>,
    pub currency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Only set by the AI-assisted extractor, always within `[0, 1]`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

impl ParsedItem {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            price: None,
            currency: None,
            description: None,
            confidence: None,
        }
    }

    pub fn with_price(mut self, price: f64, currency: Option<String>) -> Self {
        self.price = Some(price);
        self.currency = currency;
        self
    }

    /// Builds an item from an untrusted JSON value.
    ///
    /// Returns `None` when the value is not an object or has no usable name.
    /// Every other field is coerced or dropped: prices may be numbers or
    /// numeric strings, currencies may be codes or symbols, and confidence
    /// is clamped into `[0, 1]`.
    pub fn from_untrusted(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;

        let name = obj
            .get("name")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())?
            .to_string();

        let price = match obj.get("price") {
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::String(s)) => parse_amount(s),
            _ => None,
        }
        .filter(|p| p.is_finite() && *p >= 0.0);

        let currency = obj
            .get("currency")
            .and_then(Value::as_str)
            .and_then(normalize_currency);

        let description = obj
            .get("description")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        let confidence = obj
            .get("confidence")
            .and_then(Value::as_f64)
            .filter(|c| c.is_finite())
            .map(|c| c.clamp(0.0, 1.0));

        Some(Self {
            name,
            price,
            currency,
            description,
            confidence,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_serializes_null_price_and_currency() {
        let value = serde_json::to_value(ParsedItem::named("Scarf")).unwrap();
        assert_eq!(value, json!({ "name": "Scarf", "price": null, "currency": null }));
    }

    #[test]
    fn test_from_untrusted_coerces_fields() {
        let item = ParsedItem::from_untrusted(&json!({
            "name": "  Ankara dress ",
            "price": "12,500",
            "currency": "₦",
            "description": "",
            "confidence": 1.7
        }))
        .unwrap();

        assert_eq!(item.name, "Ankara dress");
        assert_eq!(item.price, Some(12500.0));
        assert_eq!(item.currency.as_deref(), Some("NGN"));
        assert_eq!(item.description, None);
        assert_eq!(item.confidence, Some(1.0));
    }

    #[test]
    fn test_from_untrusted_rejects_missing_name() {
        assert!(ParsedItem::from_untrusted(&json!({ "price": 10 })).is_none());
        assert!(ParsedItem::from_untrusted(&json!({ "name": "   " })).is_none());
        assert!(ParsedItem::from_untrusted(&json!("Scarf")).is_none());
    }

    #[test]
    fn test_from_untrusted_drops_bad_values() {
        let item = ParsedItem::from_untrusted(&json!({
            "name": "Hat",
            "price": -4,
            "currency": "dollars",
            "confidence": "high"
        }))
        .unwrap();

        assert_eq!(item.price, None);
        assert_eq!(item.currency, None);
        assert_eq!(item.confidence, None);
    }
}

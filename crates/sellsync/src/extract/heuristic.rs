//! Line-based item parser.
//!
//! Every non-empty line becomes exactly one item. A trailing price
//! expression is split off the name when one is found; otherwise the item
//! carries `price: null`.

use std::sync::LazyLock;

use regex::Regex;

use super::item::ParsedItem;

/// Currency symbols and the codes they stand for. `$` is read as USD.
const SYMBOLS: &[(char, &str)] = &[
    ('$', "USD"),
    ('€', "EUR"),
    ('£', "GBP"),
    ('₦', "NGN"),
    ('₵', "GHS"),
    ('¥', "JPY"),
    ('₹', "INR"),
];

/// Codes recognised next to an amount. Uppercase only, so ordinary words
/// such as "cad" never turn into a currency.
const CODES: &[&str] = &[
    "USD", "EUR", "GBP", "NGN", "GHS", "KES", "ZAR", "INR", "JPY", "CAD", "AUD", "PLN", "CHF",
    "CNY", "BRL", "MXN", "AED",
];

/// An amount with optional thousands groups and up to two decimals.
const NUM: &str = r"\d{1,3}(?:[,.\x{00A0}']\d{3})+(?:[.,]\d{1,2})?|\d+(?:[.,]\d{1,2})?";

/// Characters allowed between the name and the price.
const SEP: &str = r"[\s\-:|=@–—,]";

static RE_BULLET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:[-*•·▪]+|\d{1,3}[.)])\s+").unwrap());

struct PricePattern {
    re: Regex,
    /// Whether the pattern captures `sym` or `code`; bare amounts capture neither.
    has_currency: bool,
}

static PRICE_PATTERNS: LazyLock<Vec<PricePattern>> = LazyLock::new(|| {
    let sym: String = format!(
        "[{}]",
        SYMBOLS.iter().map(|(c, _)| *c).collect::<String>()
    );
    let code = format!("(?:{})", CODES.join("|"));

    let templates: [(&str, bool); 5] = [
        // "Shoes - $1,200" / "Shoes $20 USD"
        (r"^(?P<name>.*?)SEP*(?P<sym>SYM)\s?(?P<num>NUM)(?:\s*CODE)?\s*$", true),
        // "Shoes USD 20"
        (r"^(?P<name>.*?)SEP*\b(?P<code>CODE)\.?\s*(?P<num>NUM)\s*$", true),
        // "Shoes 20 €"
        (r"^(?P<name>.*?)(?:^|SEP+)(?P<num>NUM)\s?(?P<sym>SYM)\s*$", true),
        // "Shoes 5000 NGN"
        (r"^(?P<name>.*?)(?:^|SEP+)(?P<num>NUM)\s*(?P<code>CODE)\s*$", true),
        // "Shoes - 5000": a bare amount only counts after an explicit separator
        (r"^(?P<name>.*?)\s*[-:|=@–—]\s*(?P<num>NUM)\s*$", false),
    ];

    templates
        .iter()
        .map(|(template, has_currency)| PricePattern {
            re: Regex::new(
                &template
                    .replace("NUM", &format!("(?:{})", NUM))
                    .replace("SEP", SEP)
                    .replace("SYM", &sym)
                    .replace("CODE", &code),
            )
            .unwrap(),
            has_currency: *has_currency,
        })
        .collect()
});

/// Parses raw text into one item per non-empty line.
pub fn extract(raw: &str) -> Vec<ParsedItem> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(parse_line)
        .collect()
}

fn parse_line(line: &str) -> ParsedItem {
    let line = RE_BULLET.replace(line, "");
    let line = line.trim();

    for pattern in PRICE_PATTERNS.iter() {
        let Some(caps) = pattern.re.captures(line) else {
            continue;
        };
        let Some(price) = caps.name("num").and_then(|m| parse_amount(m.as_str())) else {
            continue;
        };

        let currency = if pattern.has_currency {
            caps.name("sym")
                .or_else(|| caps.name("code"))
                .and_then(|m| normalize_currency(m.as_str()))
        } else {
            None
        };

        let name = caps
            .name("name")
            .map(|m| trim_separators(m.as_str()))
            .filter(|n| !n.is_empty())
            .unwrap_or(line);

        return ParsedItem::named(name).with_price(price, currency);
    }

    ParsedItem::named(line)
}

fn trim_separators(s: &str) -> &str {
    s.trim_matches(|c: char| c.is_whitespace() || "-:|=@–—,".contains(c))
}

/// Maps a symbol or a three-letter code to an uppercase currency code.
pub fn normalize_currency(raw: &str) -> Option<String> {
    let raw = raw.trim();
    let mut chars = raw.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        return SYMBOLS
            .iter()
            .find(|(sym, _)| *sym == c)
            .map(|(_, code)| code.to_string());
    }

    if raw.len() == 3 && raw.chars().all(|c| c.is_ascii_alphabetic()) {
        return Some(raw.to_ascii_uppercase());
    }

    None
}

/// Turns a human-written amount into a number.
///
/// When both `,` and `.` appear, the last one is the decimal separator. A
/// single separator followed by exactly three digits is a thousands group
/// (unless the integer part is `0`); repeated separators are always groups.
pub fn parse_amount(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == ',' || *c == '.')
        .collect();
    let cleaned = cleaned.trim_matches(|c| c == ',' || c == '.');
    if cleaned.is_empty() {
        return None;
    }

    let normalized = match (cleaned.rfind(','), cleaned.rfind('.')) {
        (Some(comma), Some(dot)) => {
            let (decimal, group) = if comma > dot { (',', '.') } else { ('.', ',') };
            cleaned.replace(group, "").replace(decimal, ".")
        }
        (Some(_), None) => single_separator(cleaned, ','),
        (None, Some(_)) => single_separator(cleaned, '.'),
        (None, None) => cleaned.to_string(),
    };

    normalized.parse::<f64>().ok()
}

fn single_separator(s: &str, sep: char) -> String {
    if s.matches(sep).count() > 1 {
        return s.replace(sep, "");
    }
    match s.split_once(sep) {
        Some((int, frac)) if frac.len() == 3 && int != "0" => s.replace(sep, ""),
        _ => s.replace(sep, "."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one(line: &str) -> ParsedItem {
        let mut items = extract(line);
        assert_eq!(items.len(), 1, "expected one item for {:?}", line);
        items.remove(0)
    }

    #[test]
    fn test_empty_input_yields_nothing() {
        assert!(extract("").is_empty());
        assert!(extract("  \n\n \t\n").is_empty());
    }

    #[test]
    fn test_lines_without_price_yield_null_price() {
        let items = extract("Red ankara gown\n\nBlue beaded sandals\r\nsize 42 available");
        assert_eq!(items.len(), 3);
        for item in &items {
            assert_eq!(item.price, None);
            assert_eq!(item.currency, None);
        }
        assert_eq!(items[0].name, "Red ankara gown");
        assert_eq!(items[2].name, "size 42 available");
    }

    #[test]
    fn test_symbol_prefix() {
        let item = one("Leather bag - $1,200.50");
        assert_eq!(item.name, "Leather bag");
        assert_eq!(item.price, Some(1200.5));
        assert_eq!(item.currency.as_deref(), Some("USD"));
    }

    #[test]
    fn test_naira_symbol_with_thousands() {
        let item = one("Jollof rice tray ₦15,000");
        assert_eq!(item.name, "Jollof rice tray");
        assert_eq!(item.price, Some(15000.0));
        assert_eq!(item.currency.as_deref(), Some("NGN"));
    }

    #[test]
    fn test_code_suffix_and_prefix() {
        let item = one("Shea butter 500g: 2500 NGN");
        assert_eq!(item.name, "Shea butter 500g");
        assert_eq!(item.price, Some(2500.0));
        assert_eq!(item.currency.as_deref(), Some("NGN"));

        let item = one("Kente scarf KES 1,250");
        assert_eq!(item.name, "Kente scarf");
        assert_eq!(item.price, Some(1250.0));
        assert_eq!(item.currency.as_deref(), Some("KES"));
    }

    #[test]
    fn test_european_format_with_trailing_symbol() {
        let item = one("Phone case 1.234,56 €");
        assert_eq!(item.name, "Phone case");
        assert_eq!(item.price, Some(1234.56));
        assert_eq!(item.currency.as_deref(), Some("EUR"));
    }

    #[test]
    fn test_bare_amount_needs_separator() {
        let item = one("Plantain chips - 800");
        assert_eq!(item.name, "Plantain chips");
        assert_eq!(item.price, Some(800.0));
        assert_eq!(item.currency, None);

        let item = one("iPhone 13");
        assert_eq!(item.name, "iPhone 13");
        assert_eq!(item.price, None);
    }

    #[test]
    fn test_bullets_are_stripped() {
        let items = extract("- Socks £4\n2) Gloves £12.99\n• Beanie");
        assert_eq!(items[0].name, "Socks");
        assert_eq!(items[0].currency.as_deref(), Some("GBP"));
        assert_eq!(items[1].name, "Gloves");
        assert_eq!(items[1].price, Some(12.99));
        assert_eq!(items[2].name, "Beanie");
    }

    #[test]
    fn test_price_only_line_keeps_line_as_name() {
        let item = one("$20");
        assert_eq!(item.name, "$20");
        assert_eq!(item.price, Some(20.0));
    }

    #[test]
    fn test_lowercase_code_is_not_a_currency() {
        let item = one("Pack of 3 cad");
        assert_eq!(item.price, None);
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("1,200"), Some(1200.0));
        assert_eq!(parse_amount("12,50"), Some(12.5));
        assert_eq!(parse_amount("1.234.567"), Some(1234567.0));
        assert_eq!(parse_amount("1,234,567.89"), Some(1234567.89));
        assert_eq!(parse_amount("0.500"), Some(0.5));
        assert_eq!(parse_amount("₦ 5,000"), Some(5000.0));
        assert_eq!(parse_amount("free"), None);
    }

    #[test]
    fn test_normalize_currency() {
        assert_eq!(normalize_currency("€").as_deref(), Some("EUR"));
        assert_eq!(normalize_currency(" ghs ").as_deref(), Some("GHS"));
        assert_eq!(normalize_currency("naira"), None);
        assert_eq!(normalize_currency("X"), None);
    }
}

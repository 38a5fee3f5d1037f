//! Conversions from feed values to stored field values

use scraper::{Html, Node};
use std::fmt;

/// Department a listing is filed under
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Department {
    ResidentialSales,
    ResidentialLettings,
    Commercial,
}

impl Department {
    /// Derive from the feed's `property_category` and `transaction_type`
    pub fn from_feed(category: &str, transaction: &str) -> Self {
        match (category, transaction) {
            ("0", "2") => Department::ResidentialLettings,
            ("1", _) => Department::Commercial,
            _ => Department::ResidentialSales,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Department::ResidentialSales => "residential-sales",
            Department::ResidentialLettings => "residential-lettings",
            Department::Commercial => "commercial",
        }
    }

    pub fn is_residential(&self) -> bool {
        !matches!(self, Department::Commercial)
    }
}

impl fmt::Display for Department {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Keep only digits and dots
pub fn price_digits(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit() || *c == '.').collect()
}

/// Price cleaned and rounded to a whole number; unparseable reads as 0
pub fn rounded_price(raw: &str) -> String {
    let digits = price_digits(raw);
    let value = leading_number(&digits);
    format!("{}", value.round() as i64)
}

/// Longest numeric prefix of a digits-and-dots string
fn leading_number(digits: &str) -> f64 {
    let mut end = 0;
    let mut seen_dot = false;
    for (i, c) in digits.char_indices() {
        if c == '.' {
            if seen_dot {
                break;
            }
            seen_dot = true;
        }
        end = i + c.len_utf8();
    }
    digits[..end].parse().unwrap_or(0.0)
}

/// `yes` when the price type means "price on application"
pub fn poa_flag(pricetype: &str) -> &'static str {
    match pricetype.to_lowercase().as_str() {
        "poa" | "price on application" => "yes",
        _ => "",
    }
}

/// Text content of an HTML fragment, without `script`/`style` bodies and
/// surrounding whitespace. A `<` that does not open a tag is kept.
pub fn strip_tags(input: &str) -> String {
    let fragment = Html::parse_fragment(input);
    let mut out = String::with_capacity(input.len());
    for node in fragment.tree.root().descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        let hidden = node.ancestors().any(|a| {
            a.value()
                .as_element()
                .map_or(false, |e| matches!(e.name(), "script" | "style"))
        });
        if !hidden {
            out.push_str(text);
        }
    }
    out.trim().to_string()
}

/// Drop line breaks
pub fn single_line(input: &str) -> String {
    input.replace("\r\n", "").replace('\n', "")
}

//! Turning a model's candidate JSON into an accepted receipt.

use chrono::NaiveDate;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::AttemptError;
use crate::models::{ExtractedReceipt, ReceiptItem};

/// Date layouts seen on receipts, tried in order after ISO.
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%Y.%m.%d",
    "%m/%d/%Y",
    "%d.%m.%Y",
    "%d-%m-%Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%d %B %Y",
    "%d %b %Y",
];

/// Parse model output text into JSON.
///
/// Tolerates a surrounding Markdown code fence.
pub fn parse_candidate(text: &str) -> Result<Value, AttemptError> {
    let trimmed = text.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .unwrap_or(trimmed);
    serde_json::from_str(body.trim()).map_err(|e| AttemptError::Parse(e.to_string()))
}

/// Check a candidate against the receipt schema and normalize it.
///
/// `date`, `currency` and `vendor_name` must be non-empty strings,
/// `receipt_items` an array of `{item_name, item_cost}` and `total` a number.
/// A zero total is valid. `tax` is optional.
pub fn validate_candidate(candidate: Value) -> Result<ExtractedReceipt, AttemptError> {
    let Value::Object(obj) = candidate else {
        return Err(invalid("response is not a JSON object"));
    };

    let date = required_string(&obj, "date")?;
    let currency = required_string(&obj, "currency")?;
    let vendor_name = required_string(&obj, "vendor_name")?;

    let items = match obj.get("receipt_items") {
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .map(|(i, item)| parse_item(i, item))
            .collect::<Result<Vec<_>, _>>()?,
        Some(_) => return Err(invalid("receipt_items must be an array")),
        None => return Err(invalid("missing receipt_items")),
    };

    let total = match obj.get("total") {
        None | Some(Value::Null) => return Err(invalid("missing total")),
        Some(value) => as_number(value).ok_or_else(|| invalid("total must be a number"))?,
    };

    let tax = match obj.get("tax") {
        None | Some(Value::Null) => None,
        Some(value) => {
            let tax = as_number(value);
            if tax.is_none() {
                debug!(tax = %value, "Ignoring non-numeric tax");
            }
            tax
        }
    };

    Ok(ExtractedReceipt {
        date: normalize_date(&date),
        currency: normalize_currency(&currency),
        vendor_name,
        items,
        tax,
        total,
    })
}

fn invalid(message: impl Into<String>) -> AttemptError {
    AttemptError::Invalid(message.into())
}

fn required_string(obj: &Map<String, Value>, field: &str) -> Result<String, AttemptError> {
    match obj.get(field) {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        Some(Value::String(_)) => Err(invalid(format!("{} is empty", field))),
        Some(Value::Null) | None => Err(invalid(format!("missing {}", field))),
        Some(_) => Err(invalid(format!("{} must be a string", field))),
    }
}

fn parse_item(index: usize, item: &Value) -> Result<ReceiptItem, AttemptError> {
    let name = item
        .get("item_name")
        .and_then(Value::as_str)
        .map(str::trim)
        .ok_or_else(|| invalid(format!("receipt_items[{}].item_name must be a string", index)))?;
    let cost = item
        .get("item_cost")
        .and_then(as_number)
        .ok_or_else(|| invalid(format!("receipt_items[{}].item_cost must be a number", index)))?;
    Ok(ReceiptItem {
        name: name.to_string(),
        cost,
    })
}

/// A finite JSON number, or a string holding one (`"11.00"`).
fn as_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    n.is_finite().then_some(n)
}

/// Normalize a date to `YYYY-MM-DD`. Unparseable dates are kept as given.
pub fn normalize_date(raw: &str) -> String {
    let raw = raw.trim();
    // Timestamps like 2025-08-23T10:15:00
    let candidate = raw.split(['T', ' ']).next().unwrap_or(raw);

    for input in [candidate, raw] {
        for format in DATE_FORMATS {
            if let Ok(date) = NaiveDate::parse_from_str(input, format) {
                return date.format("%Y-%m-%d").to_string();
            }
        }
    }

    warn!(date = raw, "Could not normalize receipt date");
    raw.to_string()
}

/// Upper-case a currency code, mapping a bare symbol to its usual code.
pub fn normalize_currency(raw: &str) -> String {
    match raw.trim() {
        "$" => "USD".to_string(),
        "€" => "EUR".to_string(),
        "£" => "GBP".to_string(),
        "¥" => "JPY".to_string(),
        "₹" => "INR".to_string(),
        other => other.to_uppercase(),
    }
}

//! Normalization of extracted text fields into a [`NewOrder`].
//!
//! Extraction works on printed documents, so every value arrives as text:
//! currency as `"$1,234.00"`, counts as `"12.00"`. Recognized keys are
//! `invoice_number`, `client`, `address`, `phone`, `items`, `value`, `biller`,
//! `payment_method` and `notes`; `phone` and `notes` may be absent.

use crate::ingest::ExtractedFields;
use crate::model::{LifecycleError, NewOrder};

fn invalid(field: &str, raw: &str) -> LifecycleError {
    LifecycleError::ValidationError(format!("invalid {field}: '{raw}'"))
}

fn required<'a>(fields: &'a ExtractedFields, key: &str) -> Result<&'a str, LifecycleError> {
    fields
        .get(key)
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| LifecycleError::ValidationError(format!("missing field '{key}'")))
}

fn optional(fields: &ExtractedFields, key: &str) -> String {
    fields.get(key).map(|value| value.trim().to_string()).unwrap_or_default()
}

/// Splits `"1,234.56"` into its integer digits (`"1234"`), rejecting anything
/// but digits, thousands separators and a decimal part.
fn integer_part(field: &str, raw: &str) -> Result<String, LifecycleError> {
    let (whole, fraction) = raw.split_once('.').unwrap_or((raw, ""));
    let whole: String = whole.chars().filter(|c| *c != ',').collect();
    if whole.is_empty()
        || !whole.chars().all(|c| c.is_ascii_digit())
        || !fraction.chars().all(|c| c.is_ascii_digit())
    {
        return Err(invalid(field, raw));
    }
    Ok(whole)
}

/// `"$1,234.00"` to `1234`. Cents are dropped.
pub fn parse_currency(raw: &str) -> Result<i64, LifecycleError> {
    let text = raw.trim();
    let (negative, text) = match text.strip_prefix('-') {
        Some(rest) => (true, rest.trim_start()),
        None => (false, text),
    };
    let text = text.strip_prefix('$').unwrap_or(text).trim();
    let units: i64 = integer_part("value", text)?
        .parse()
        .map_err(|_| invalid("value", raw))?;
    Ok(if negative { -units } else { units })
}

/// `"12.00"` to `12`.
pub fn parse_count(raw: &str) -> Result<u32, LifecycleError> {
    integer_part("items", raw.trim())?
        .parse()
        .map_err(|_| invalid("items", raw))
}

/// A strictly positive integer.
pub fn parse_invoice_number(raw: &str) -> Result<u64, LifecycleError> {
    match raw.trim().parse::<u64>() {
        Ok(number) if number > 0 => Ok(number),
        _ => Err(invalid("invoice_number", raw)),
    }
}

/// Builds a [`NewOrder`] from one document's extracted fields.
///
/// # Errors
///
/// [`LifecycleError::ValidationError`] naming the first missing or unparseable field.
pub fn normalize(fields: &ExtractedFields) -> Result<NewOrder, LifecycleError> {
    Ok(NewOrder {
        invoice_number: parse_invoice_number(required(fields, "invoice_number")?)?,
        client: required(fields, "client")?.to_string(),
        address: required(fields, "address")?.to_string(),
        phone: optional(fields, "phone"),
        items: parse_count(required(fields, "items")?)?,
        value: parse_currency(required(fields, "value")?)?,
        biller: required(fields, "biller")?.to_string(),
        payment_method: required(fields, "payment_method")?.to_string(),
        notes: optional(fields, "notes"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(pairs: &[(&str, &str)]) -> ExtractedFields {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn complete() -> ExtractedFields {
        fields(&[
            ("invoice_number", " 1001 "),
            ("client", "Drogueria Alfa"),
            ("address", "Cl 1 # 1-1"),
            ("items", "12.00"),
            ("value", "$1,234.00"),
            ("biller", "ana"),
            ("payment_method", "Contado"),
        ])
    }

    #[test]
    fn test_currency_formats() {
        assert_eq!(parse_currency("$1,234.00"), Ok(1234));
        assert_eq!(parse_currency("$ 250,000"), Ok(250_000));
        assert_eq!(parse_currency("99.99"), Ok(99));
        assert_eq!(parse_currency("-$5.00"), Ok(-5));
        assert!(parse_currency("$").is_err());
        assert!(parse_currency("12a").is_err());
        assert!(parse_currency("1.2.3").is_err());
    }

    #[test]
    fn test_count_formats() {
        assert_eq!(parse_count("12.00"), Ok(12));
        assert_eq!(parse_count("7"), Ok(7));
        assert_eq!(parse_count("1,024"), Ok(1024));
        assert!(parse_count("-3").is_err());
        assert!(parse_count("doce").is_err());
    }

    #[test]
    fn test_invoice_number_must_be_positive() {
        assert_eq!(parse_invoice_number("42"), Ok(42));
        assert!(parse_invoice_number("0").is_err());
        assert!(parse_invoice_number("-7").is_err());
        assert!(parse_invoice_number("A-100").is_err());
    }

    #[test]
    fn test_normalize_complete_document() {
        let order = normalize(&complete()).unwrap();
        assert_eq!(order.invoice_number, 1001);
        assert_eq!(order.items, 12);
        assert_eq!(order.value, 1234);
        assert_eq!(order.phone, "");
        assert_eq!(order.notes, "");
    }

    #[test]
    fn test_normalize_reports_missing_field() {
        let mut incomplete = complete();
        incomplete.remove("biller");
        assert_eq!(
            normalize(&incomplete),
            Err(LifecycleError::ValidationError("missing field 'biller'".to_string()))
        );

        let mut blank = complete();
        blank.insert("client".to_string(), "   ".to_string());
        assert!(normalize(&blank).is_err());
    }
}

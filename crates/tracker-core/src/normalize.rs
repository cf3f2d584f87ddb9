//! Cell-value normalization: locale-formatted counts and provider names.

/// Parse a count cell into a number.
///
/// * `None` or blank text → `0.0`
/// * every comma and whitespace character is removed first, so `"1,234"` and
///   `"1 234"` both read as `1234`
/// * anything that is still not a finite number → `0.0`
///
/// Commas are always grouping separators; decimal commas are not supported.
///
/// # Examples
///
/// ```
/// use tracker_core::normalize::parse_number;
///
/// assert_eq!(parse_number(Some("1,234")), 1234.0);
/// assert_eq!(parse_number(Some(" 12.5 ")), 12.5);
/// assert_eq!(parse_number(Some("n/a")), 0.0);
/// assert_eq!(parse_number(None), 0.0);
/// ```
pub fn parse_number(value: Option<&str>) -> f64 {
    let Some(raw) = value else {
        return 0.0;
    };

    let cleaned: String = raw
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .collect();
    if cleaned.is_empty() {
        return 0.0;
    }

    match cleaned.parse::<f64>() {
        Ok(n) if n.is_finite() => n,
        _ => 0.0,
    }
}

/// Fold a free-text payment provider name to its canonical identifier.
///
/// Rules, first hit wins:
/// 1. contains `adyen` (any case) → `"Adyen"`
/// 2. contains `stripe` (any case) → `"Stripe"`
/// 3. contains `(` → text before the first `(`, trimmed
/// 4. contains a space → text before the first space, trimmed
/// 5. otherwise the input unchanged
///
/// # Examples
///
/// ```
/// use tracker_core::normalize::canonicalize_psp;
///
/// assert_eq!(canonicalize_psp("ADYEN Express"), "Adyen");
/// assert_eq!(canonicalize_psp("Stripe (EU)"), "Stripe");
/// assert_eq!(canonicalize_psp("Worldpay (UK)"), "Worldpay");
/// assert_eq!(canonicalize_psp("PayPal Checkout"), "PayPal");
/// assert_eq!(canonicalize_psp("Klarna"), "Klarna");
/// ```
pub fn canonicalize_psp(name: &str) -> String {
    let lower = name.to_lowercase();

    if lower.contains("adyen") {
        return "Adyen".to_string();
    }
    if lower.contains("stripe") {
        return "Stripe".to_string();
    }

    if let Some((head, _)) = name.split_once('(') {
        return head.trim().to_string();
    }
    if let Some((head, _)) = name.split_once(' ') {
        return head.trim().to_string();
    }

    name.to_string()
}

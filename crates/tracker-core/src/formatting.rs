use crate::models::Metric;

/// Format a count with thousands separators.
///
/// Whole numbers print without decimals; fractional counts keep two.
///
/// # Examples
///
/// ```
/// use tracker_core::formatting::format_count;
///
/// assert_eq!(format_count(1234567.0), "1,234,567");
/// assert_eq!(format_count(1234.5), "1,234.50");
/// assert_eq!(format_count(0.0), "0");
/// ```
pub fn format_count(value: f64) -> String {
    let decimals = if value.fract() == 0.0 { 0 } else { 2 };
    format_grouped(value, decimals)
}

/// Format a percentage with two decimals and a `%` suffix.
///
/// # Examples
///
/// ```
/// use tracker_core::formatting::format_percent;
///
/// assert_eq!(format_percent(66.666), "66.67%");
/// assert_eq!(format_percent(0.0), "0.00%");
/// ```
pub fn format_percent(value: f64) -> String {
    format!("{}%", format_grouped(value, 2))
}

/// Format `value` the way `metric` is usually displayed.
pub fn format_metric(value: f64, metric: Metric) -> String {
    if metric.is_percentage() {
        format_percent(value)
    } else {
        format_count(value)
    }
}

/// Render a plain-text table with a header rule.
///
/// The first column is left-aligned, the rest right-aligned. Rows shorter
/// than the header are padded with blanks.
pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate().take(widths.len()) {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }

    let render_row = |cells: &[String]| -> String {
        widths
            .iter()
            .enumerate()
            .map(|(i, width)| {
                let cell = cells.get(i).map(String::as_str).unwrap_or("");
                if i == 0 {
                    format!("{:<width$}", cell, width = *width)
                } else {
                    format!("{:>width$}", cell, width = *width)
                }
            })
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut out = render_row(headers);
    out.push('\n');
    let rule_len: usize = widths.iter().sum::<usize>() + 2 * widths.len().saturating_sub(1);
    out.push_str(&"-".repeat(rule_len));
    for row in rows {
        out.push('\n');
        out.push_str(&render_row(row));
    }
    out
}

// ── Internal helpers ──────────────────────────────────────────────────────────

fn format_grouped(value: f64, decimals: u32) -> String {
    let negative = value < 0.0;
    let factor = 10_f64.powi(decimals as i32);
    let rounded = (value.abs() * factor).round() / factor;

    let integer_part = rounded.trunc() as u64;
    let grouped = group_thousands(&integer_part.to_string());

    let body = if decimals == 0 {
        grouped
    } else {
        let frac_str = format!("{:.prec$}", rounded.fract(), prec = decimals as usize);
        // "0.50" → ".50"
        format!("{}{}", grouped, &frac_str[1..])
    };

    if negative && rounded != 0.0 {
        format!("-{}", body)
    } else {
        body
    }
}

/// Insert commas every three digits from the right of an integer string.
fn group_thousands(s: &str) -> String {
    let len = s.len();
    let mut result = String::with_capacity(len + len / 3);
    for (i, c) in s.chars().enumerate() {
        if i != 0 && (len - i) % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result
}

// ── Tests ──────────────────────────────────────────────────────────────────────

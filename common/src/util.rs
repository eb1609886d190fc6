use eyre::{Context, Result, bail};
use itertools::Itertools;

/// Parse an fio style size such as `4k`, `128K`, `1m` or `512` into bytes.
/// Suffixes are binary multiples.
pub fn parse_data_size(size: &str) -> Result<u64> {
    let size = size.trim().to_lowercase();
    let (digits, multiplier) = if let Some(x) = size.strip_suffix('k') {
        (x, 1024)
    } else if let Some(x) = size.strip_suffix('m') {
        (x, 1024 * 1024)
    } else if let Some(x) = size.strip_suffix('g') {
        (x, 1024 * 1024 * 1024)
    } else if size.chars().all(|c| c.is_ascii_digit()) && !size.is_empty() {
        (size.as_str(), 1)
    } else {
        bail!("Unsupported data size {size}")
    };
    Ok(digits
        .parse::<u64>()
        .context(format!("Parse data size: {size}"))?
        * multiplier)
}

/// `zero_copy_io` -> `Zero Copy Io`
pub fn title_case(name: &str) -> String {
    name.replace('_', " ")
        .split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect(),
                None => String::new(),
            }
        })
        .join(" ")
}

pub fn format_value(value: Option<f64>) -> String {
    match value {
        Some(x) if x.fract() == 0.0 && x.abs() < 1e15 => format!("{x:.0}"),
        Some(x) => format!("{x:.3}"),
        None => "-".to_owned(),
    }
}

/// Render a right-aligned Markdown table
pub fn markdown_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let widths = headers
        .iter()
        .enumerate()
        .map(|(idx, header)| {
            rows.iter()
                .filter_map(|row| row.get(idx))
                .map(|cell| cell.len())
                .chain([header.len(), 3])
                .max()
                .unwrap_or(3)
        })
        .collect::<Vec<_>>();

    let line = |cells: Vec<String>| format!("| {} |", cells.join(" | "));
    let mut out = vec![
        line(
            headers
                .iter()
                .zip(&widths)
                .map(|(h, &w)| format!("{h:>w$}"))
                .collect(),
        ),
        line(
            widths
                .iter()
                .map(|w| format!("{}:", "-".repeat(w - 1)))
                .collect(),
        ),
    ];
    for row in rows {
        out.push(line(
            widths
                .iter()
                .enumerate()
                .map(|(idx, &w)| format!("{:>w$}", row.get(idx).map(String::as_str).unwrap_or("")))
                .collect(),
        ));
    }
    out.join("\n")
}

/// Renders rows as a GitHub-flavored markdown table, optionally truncated.
pub fn markdown_table(headers: &[&str], rows: &[Vec<String>], max_rows: Option<usize>) -> String {
    let shown = match max_rows {
        Some(n) => &rows[..rows.len().min(n)],
        None => rows,
    };
    if shown.is_empty() {
        return "_No rows_".to_string();
    }

    let mut lines = Vec::with_capacity(shown.len() + 2);
    lines.push(format!("| {} |", headers.join(" | ")));
    lines.push(format!("| {} |", vec!["---"; headers.len()].join(" | ")));
    for row in shown {
        lines.push(format!("| {} |", row.join(" | ")));
    }
    lines.join("\n")
}

/// `1234567` renders as `1,234,567`.
pub fn thousands(n: usize) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_header_separator_and_rows() {
        let table = markdown_table(
            &["column", "null_count"],
            &[vec!["Price".into(), "0".into()], vec!["Customer ID".into(), "12".into()]],
            None,
        );
        assert_eq!(
            table,
            "| column | null_count |\n| --- | --- |\n| Price | 0 |\n| Customer ID | 12 |"
        );
    }

    #[test]
    fn truncates_and_handles_empty() {
        let rows: Vec<Vec<String>> = (0..5).map(|i| vec![i.to_string()]).collect();
        assert_eq!(markdown_table(&["n"], &rows, Some(2)).lines().count(), 4);
        assert_eq!(markdown_table(&["n"], &[], None), "_No rows_");
    }

    #[test]
    fn thousands_separators() {
        assert_eq!(thousands(0), "0");
        assert_eq!(thousands(999), "999");
        assert_eq!(thousands(1000), "1,000");
        assert_eq!(thousands(1067371), "1,067,371");
    }
}

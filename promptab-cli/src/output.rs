use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Cell, Color, Table};

pub fn new_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(
            headers
                .iter()
                .map(|h| Cell::new(h).fg(Color::White))
                .collect::<Vec<_>>(),
        );
    table
}

pub fn format_duration_ms(ms: i64) -> String {
    let seconds = ms / 1000;
    if seconds < 1 {
        format!("{}ms", ms)
    } else if seconds < 60 {
        format!("{}s", seconds)
    } else if seconds < 3600 {
        format!("{}m {}s", seconds / 60, seconds % 60)
    } else {
        let hours = seconds / 3600;
        let minutes = (seconds % 3600) / 60;
        format!("{}h {}m", hours, minutes)
    }
}

pub fn format_tokens(tokens: u64) -> String {
    if tokens >= 1_000_000 {
        format!("{:.1}M", tokens as f64 / 1_000_000.0)
    } else if tokens >= 1_000 {
        format!("{:.1}K", tokens as f64 / 1_000.0)
    } else {
        tokens.to_string()
    }
}

pub fn format_cost(cost: f64) -> String {
    format!("${:.4}", cost)
}

pub fn truncate_uuid(uuid: &str) -> String {
    if uuid.len() > 8 {
        format!("{}…", &uuid[..8])
    } else {
        uuid.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration_ms() {
        assert_eq!(format_duration_ms(250), "250ms");
        assert_eq!(format_duration_ms(42_000), "42s");
        assert_eq!(format_duration_ms(125_000), "2m 5s");
        assert_eq!(format_duration_ms(7_380_000), "2h 3m");
    }

    #[test]
    fn test_format_tokens() {
        assert_eq!(format_tokens(999), "999");
        assert_eq!(format_tokens(1_500), "1.5K");
        assert_eq!(format_tokens(2_300_000), "2.3M");
    }

    #[test]
    fn test_format_cost() {
        assert_eq!(format_cost(0.00312), "$0.0031");
    }

    #[test]
    fn test_truncate_uuid() {
        assert_eq!(
            truncate_uuid("6f1c2d3e-0000-4000-8000-000000000000"),
            "6f1c2d3e…"
        );
        assert_eq!(truncate_uuid("short"), "short");
    }
}

use chrono::{DateTime, Utc};
use colored::*;
use common::{IncidentStatus, ServiceStatus, StatusColor};

pub const WIDTH: usize = 63;

pub fn color_of(color: StatusColor) -> Color {
    match color {
        StatusColor::Green => Color::Green,
        StatusColor::Yellow => Color::Yellow,
        StatusColor::Orange => Color::TrueColor { r: 255, g: 140, b: 0 },
        StatusColor::Red => Color::Red,
        StatusColor::Grey => Color::BrightBlack,
    }
}

/// Coloured dot followed by the status label.
pub fn service_badge(status: ServiceStatus) -> String {
    let color = color_of(status.color());
    format!("{} {}", "●".color(color), status.label().color(color).bold())
}

pub fn incident_badge(status: IncidentStatus) -> String {
    let color = color_of(status.color());
    format!("[{}]", status.label().to_uppercase()).color(color).bold().to_string()
}

/// Printable width, ignoring ANSI escape sequences.
pub fn display_width(s: &str) -> usize {
    let mut width = 0;
    let mut in_escape = false;
    let mut in_bracket = false;

    for ch in s.chars() {
        if in_escape {
            if ch == '[' {
                in_bracket = true;
            } else if in_bracket && ch.is_ascii_alphabetic() {
                in_escape = false;
                in_bracket = false;
            } else if !in_bracket {
                in_escape = false;
            }
        } else if ch == '\x1b' {
            in_escape = true;
        } else {
            width += 1;
        }
    }
    width
}

/// Pads to exactly `max_len` characters, cutting with `..` when longer.
pub fn truncate(s: &str, max_len: usize) -> String {
    let count = s.chars().count();
    if count <= max_len {
        format!("{:width$}", s, width = max_len)
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(2)).collect();
        format!("{}..", kept)
    }
}

pub fn wrap_text(text: &str, max_width: usize) -> Vec<String> {
    let mut result = Vec::new();
    let mut current_line = String::new();

    for word in text.split_whitespace() {
        if current_line.is_empty() {
            current_line = word.to_string();
        } else if current_line.chars().count() + word.chars().count() < max_width {
            current_line.push(' ');
            current_line.push_str(word);
        } else {
            result.push(std::mem::take(&mut current_line));
            current_line = word.to_string();
        }
    }

    if !current_line.is_empty() {
        result.push(current_line);
    }
    if result.is_empty() {
        result.push(String::new());
    }
    result
}

/// "5 minutes ago" style distance from `now`.
pub fn time_ago(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let seconds = (now - then).num_seconds().max(0);
    let minutes = seconds / 60;
    let hours = minutes / 60;
    let days = hours / 24;

    match () {
        _ if seconds < 60 => "less than a minute ago".to_string(),
        _ if minutes == 1 => "1 minute ago".to_string(),
        _ if minutes < 60 => format!("{} minutes ago", minutes),
        _ if hours == 1 => "about 1 hour ago".to_string(),
        _ if hours < 24 => format!("about {} hours ago", hours),
        _ if days == 1 => "1 day ago".to_string(),
        _ if days < 30 => format!("{} days ago", days),
        _ if days < 60 => "about 1 month ago".to_string(),
        _ if days < 365 => format!("{} months ago", days / 30),
        _ if days < 730 => "about 1 year ago".to_string(),
        _ => format!("{} years ago", days / 365),
    }
}

pub fn format_time(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

/// Box-drawn block of lines, `WIDTH` columns between the borders.
pub struct Panel {
    lines: Vec<String>,
}

impl Panel {
    pub fn new(title: &str) -> Self {
        let mut panel = Panel { lines: Vec::new() };
        panel.lines.push(format!("╔{}╗", "═".repeat(WIDTH)).bright_cyan().to_string());
        let pad = WIDTH.saturating_sub(display_width(title));
        let left = pad / 2;
        panel.lines.push(format!(
            "{}{}{}{}{}",
            "║".bright_cyan(),
            " ".repeat(left),
            title.bright_cyan().bold(),
            " ".repeat(pad - left),
            "║".bright_cyan()
        ));
        panel.separator();
        panel
    }

    pub fn separator(&mut self) -> &mut Self {
        self.lines.push(format!("╠{}╣", "═".repeat(WIDTH)).bright_cyan().to_string());
        self
    }

    /// One row; content wider than the box is cut.
    pub fn line(&mut self, content: impl AsRef<str>) -> &mut Self {
        let content = content.as_ref();
        let width = display_width(content);
        let row = if width + 1 > WIDTH {
            let plain = strip_ansi(content);
            format!(" {}", truncate(&plain, WIDTH - 1))
        } else {
            format!(" {}{}", content, " ".repeat(WIDTH - 1 - width))
        };
        self.lines.push(format!("{}{}{}", "║".bright_cyan(), row, "║".bright_cyan()));
        self
    }

    pub fn blank(&mut self) -> &mut Self {
        self.line("")
    }

    pub fn field(&mut self, label: &str, value: impl AsRef<str>) -> &mut Self {
        let label = format!("{:14}", format!("{}:", label));
        self.line(format!("{}{}", label.bright_cyan(), value.as_ref()))
    }

    pub fn paragraph(&mut self, text: &str) -> &mut Self {
        for line in wrap_text(text, WIDTH - 3) {
            self.line(format!(" {}", line));
        }
        self
    }

    pub fn finish(mut self) -> Vec<String> {
        self.lines.push(format!("╚{}╝", "═".repeat(WIDTH)).bright_cyan().to_string());
        self.lines
    }

    pub fn print(self) {
        println!();
        for line in self.finish() {
            println!("{}", line);
        }
        println!();
    }
}

pub(crate) fn strip_ansi(s: &str) -> String {
    let mut out = String::new();
    let mut in_escape = false;
    for ch in s.chars() {
        if in_escape {
            if ch.is_ascii_alphabetic() {
                in_escape = false;
            }
        } else if ch == '\x1b' {
            in_escape = true;
        } else {
            out.push(ch);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn width_ignores_colour_codes() {
        colored::control::set_override(true);
        let painted = "Operational".green().bold().to_string();
        assert_ne!(painted.len(), 11);
        assert_eq!(display_width(&painted), 11);
        assert_eq!(strip_ansi(&painted), "Operational");
    }

    #[test]
    fn truncate_pads_or_cuts() {
        assert_eq!(truncate("api", 6), "api   ");
        assert_eq!(truncate("payments-gateway", 8), "paymen..");
        assert_eq!(truncate("größe-service", 7).chars().count(), 7);
    }

    #[test]
    fn wraps_on_word_boundaries() {
        let lines = wrap_text("the quick brown fox jumps over the lazy dog", 15);
        assert!(lines.iter().all(|l| l.chars().count() <= 15));
        assert_eq!(lines.join(" "), "the quick brown fox jumps over the lazy dog");
        assert_eq!(wrap_text("", 10), vec![String::new()]);
    }

    #[test]
    fn relative_times() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        assert_eq!(time_ago(now - Duration::seconds(20), now), "less than a minute ago");
        assert_eq!(time_ago(now - Duration::minutes(1), now), "1 minute ago");
        assert_eq!(time_ago(now - Duration::minutes(45), now), "45 minutes ago");
        assert_eq!(time_ago(now - Duration::hours(3), now), "about 3 hours ago");
        assert_eq!(time_ago(now - Duration::days(2), now), "2 days ago");
        assert_eq!(time_ago(now - Duration::days(400), now), "about 1 year ago");
        // clock skew
        assert_eq!(time_ago(now + Duration::minutes(5), now), "less than a minute ago");
    }

    #[test]
    fn panel_rows_have_constant_width() {
        let mut panel = Panel::new("Acme Status");
        panel
            .field("Status", service_badge(ServiceStatus::PartialOutage))
            .line("x".repeat(200))
            .paragraph("a fairly long description that needs wrapping across more than one row of the box");
        for line in panel.finish() {
            assert_eq!(display_width(&line), WIDTH + 2, "{:?}", line);
        }
    }
}

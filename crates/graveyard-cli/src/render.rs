use anstyle::{AnsiColor, Effects, Style};
use graveyard_ledger::{LedgerRecord, MigrationReport};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum OutputStyle {
    Plain,
    Rich,
}

pub(crate) fn resolve_output_style(stdout_is_tty: bool) -> OutputStyle {
    if stdout_is_tty {
        OutputStyle::Rich
    } else {
        OutputStyle::Plain
    }
}

pub(crate) fn print_status(style: OutputStyle, status: &str, message: &str) {
    match style {
        OutputStyle::Plain => println!("{}", render_status_line(style, status, message)),
        OutputStyle::Rich => println!(
            "{} {message}",
            colorize(badge_style(status), &status_badge(status))
        ),
    }
}

pub(crate) fn print_section(style: OutputStyle, title: &str) {
    if style == OutputStyle::Rich {
        println!("{}", colorize(section_style(), &format!("== {title} ==")));
    }
}

pub(crate) fn render_status_line(style: OutputStyle, status: &str, message: &str) -> String {
    match style {
        OutputStyle::Plain => message.to_string(),
        OutputStyle::Rich => format!("{} {message}", status_badge(status)),
    }
}

pub(crate) fn format_record_lines(records: &[LedgerRecord]) -> Vec<String> {
    records
        .iter()
        .map(|record| format!("{}\t{}", record.install, record.path))
        .collect()
}

pub(crate) fn format_migration_lines(ledger_key: &str, report: &MigrationReport) -> Vec<String> {
    let mut lines = vec![format!(
        "ledger '{ledger_key}': shape={} records={} migrated={} skipped={}",
        report.source_shape.as_str(),
        report.record_count,
        report.migrated,
        report.skipped.len()
    )];
    lines.extend(report.skipped.iter().map(|entry| {
        format!(
            "skipped {} ({}): {}",
            entry.install_key, entry.path, entry.reason
        )
    }));
    lines
}

fn status_badge(status: &str) -> String {
    format!("[{}]", status.to_ascii_uppercase())
}

fn badge_style(status: &str) -> Style {
    let color = match status {
        "ok" => AnsiColor::BrightGreen,
        "warn" => AnsiColor::BrightYellow,
        "error" => AnsiColor::BrightRed,
        _ => AnsiColor::BrightCyan,
    };
    Style::new()
        .fg_color(Some(color.into()))
        .effects(Effects::BOLD)
}

fn section_style() -> Style {
    Style::new()
        .fg_color(Some(AnsiColor::BrightBlue.into()))
        .effects(Effects::BOLD)
}

fn colorize(style: Style, text: &str) -> String {
    format!("{}{}{}", style.render(), text, style.render_reset())
}

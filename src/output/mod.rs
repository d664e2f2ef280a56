use console::{measure_text_width, pad_str, style, Alignment, Style, Term};
use std::io;

use crate::models::{AttributeSource, AttributeTrace, HostSession, OperationSummary, ResolvedHost};

const NOT_AVAILABLE: &str = "N/A";

/// Table title for a filtered device list
pub fn hosts_title(count: usize, filter_text: Option<&str>) -> String {
    let plural = if count == 1 { "" } else { "s" };
    let title = format!("Filtered Devices ({} device{})", count, plural);
    match filter_text {
        Some(text) if !text.is_empty() => format!("{} - Filter: {}", title, text),
        _ => title,
    }
}

/// Render a plain table: header row, a rule and the rows. Each column gets its
/// own style; cells are padded before styling so widths stay correct.
fn format_table(headers: &[&str], rows: &[Vec<String>], styles: &[Style]) -> Vec<String> {
    let mut widths: Vec<usize> = headers.iter().map(|h| measure_text_width(h)).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(measure_text_width(cell));
        }
    }

    let header = headers
        .iter()
        .zip(&widths)
        .map(|(h, w)| style(pad_str(h, *w, Alignment::Left, None)).bold().magenta().to_string())
        .collect::<Vec<_>>()
        .join("  ");
    let rule = widths.iter().map(|w| "─".repeat(*w)).collect::<Vec<_>>().join("  ");

    let last = headers.len().saturating_sub(1);
    let mut lines = vec![header, rule];
    for row in rows {
        let line = row
            .iter()
            .zip(&widths)
            .zip(styles)
            .enumerate()
            .map(|(i, ((cell, w), s))| {
                // no trailing padding on the last column
                let width = if i == last { 0 } else { *w };
                s.apply_to(pad_str(cell, width, Alignment::Left, None)).to_string()
            })
            .collect::<Vec<_>>()
            .join("  ");
        lines.push(line);
    }
    lines
}

pub fn format_filtered_hosts(hosts: &[ResolvedHost], filter_text: Option<&str>) -> Vec<String> {
    let rows: Vec<Vec<String>> = hosts
        .iter()
        .map(|h| {
            vec![
                h.name.clone(),
                h.data
                    .get("role")
                    .map(crate::models::value_to_string)
                    .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
                h.platform.clone().unwrap_or_else(|| NOT_AVAILABLE.to_string()),
            ]
        })
        .collect();

    let mut lines = vec![style(hosts_title(hosts.len(), filter_text)).bold().to_string()];
    lines.extend(format_table(
        &["Hostname", "Role", "Platform"],
        &rows,
        &[Style::new().cyan(), Style::new().yellow(), Style::new().green()],
    ));
    lines
}

pub fn display_filtered_hosts(hosts: &[ResolvedHost], filter_text: Option<&str>) -> io::Result<()> {
    let term = Term::stdout();
    term.write_line("")?;
    for line in format_filtered_hosts(hosts, filter_text) {
        term.write_line(&line)?;
    }
    term.write_line("")
}

/// Panel title and border color for a summary
fn summary_title(summary: &OperationSummary) -> (&'static str, Style) {
    if summary.failure_count == 0 {
        ("✓ Operation Complete", Style::new().green())
    } else if summary.success_count == 0 {
        ("✗ Operation Failed", Style::new().red())
    } else {
        ("⚠ Operation Complete with Errors", Style::new().yellow())
    }
}

pub fn format_operation_summary(summary: &OperationSummary) -> Vec<String> {
    let body = vec![
        format!("Operation: {}", summary.operation_name),
        format!("Total Devices: {}", summary.total),
        style(format!("Successful: {}", summary.success_count)).green().to_string(),
        style(format!("Failed: {}", summary.failure_count)).red().to_string(),
        format!("Skipped: {}", summary.skipped_count),
        format!("Success Rate: {:.1}%", summary.success_rate * 100.0),
    ];

    let (title, border) = summary_title(summary);
    let title = format!(" {} ", title);
    let inner = body
        .iter()
        .map(|l| measure_text_width(l))
        .chain(std::iter::once(measure_text_width(&title) + 1))
        .max()
        .unwrap_or(0)
        + 2;

    let mut lines = Vec::with_capacity(body.len() + 2);
    let top_fill = inner.saturating_sub(measure_text_width(&title) + 1);
    lines.push(border.apply_to(format!("╭─{}{}╮", title, "─".repeat(top_fill))).to_string());
    for line in &body {
        let pad = inner - 2 - measure_text_width(line);
        lines.push(format!(
            "{} {}{} {}",
            border.apply_to("│"),
            line,
            " ".repeat(pad),
            border.apply_to("│")
        ));
    }
    lines.push(border.apply_to(format!("╰{}╯", "─".repeat(inner))).to_string());
    lines
}

pub fn display_operation_summary(summary: &OperationSummary) -> io::Result<()> {
    let term = Term::stdout();
    term.write_line("")?;
    for line in format_operation_summary(summary) {
        term.write_line(&line)?;
    }
    Ok(())
}

pub fn format_diff(hostname: &str, diff: &str) -> Vec<String> {
    let mut lines = vec![style(format!("── Configuration Diff: {} ──", hostname)).bold().blue().to_string()];
    for line in diff.lines() {
        let styled = if line.starts_with('+') {
            style(line).green().to_string()
        } else if line.starts_with('-') {
            style(line).red().to_string()
        } else if line.starts_with('@') {
            style(line).cyan().to_string()
        } else {
            line.to_string()
        };
        lines.push(styled);
    }
    lines
}

pub fn display_diff(hostname: &str, diff: &str) -> io::Result<()> {
    let term = Term::stdout();
    for line in format_diff(hostname, diff) {
        term.write_line(&line)?;
    }
    term.write_line("")
}

pub fn format_sessions_table(sessions: &[HostSession]) -> Vec<String> {
    let rows: Vec<Vec<String>> = sessions
        .iter()
        .enumerate()
        .map(|(i, s)| {
            vec![
                (i + 1).to_string(),
                s.hostname.clone(),
                s.session.name.clone(),
                s.session.state.clone(),
            ]
        })
        .collect();

    format_table(
        &["#", "Device", "Session Name", "Status"],
        &rows,
        &[
            Style::new().dim(),
            Style::new().yellow(),
            Style::new().cyan(),
            Style::new().magenta(),
        ],
    )
}

/// Where each of a host's variables comes from. Overridden values list the
/// lower layers they hide.
pub fn format_trace(host: &ResolvedHost, traces: &[AttributeTrace]) -> Vec<String> {
    let rows: Vec<Vec<String>> = traces
        .iter()
        .map(|t| {
            let mut source = t.source.to_string();
            if t.is_overridden() {
                let hidden = t.defined_in[1..].iter().map(|s| s.to_string()).collect::<Vec<_>>();
                source = format!("{} (overrides {})", source, hidden.join(", "));
            }
            vec![t.key.clone(), t.value.clone(), source]
        })
        .collect();

    let from = |pick: fn(&AttributeSource) -> bool| traces.iter().filter(|t| pick(&t.source)).count();
    let groups = if host.groups.is_empty() { "none".to_string() } else { host.groups.join(", ") };

    let mut lines = vec![
        style(format!("Variable Inheritance for Host: {}", host.name)).bold().to_string(),
        format!("{} {}", style("Hostname:").cyan().bold(), host.hostname),
        format!("{} {}", style("Groups:").cyan().bold(), groups),
        String::new(),
    ];
    lines.extend(format_table(
        &["Variable", "Value", "Source"],
        &rows,
        &[Style::new().magenta(), Style::new().green(), Style::new().yellow()],
    ));
    lines.push(String::new());
    lines.push(format!(
        "{} {} variable(s): {} from host, {} from groups, {} from defaults",
        style("Summary:").bold(),
        traces.len(),
        from(|s| matches!(s, AttributeSource::Host)),
        from(|s| matches!(s, AttributeSource::Group(_))),
        from(|s| matches!(s, AttributeSource::Defaults)),
    ));
    lines
}

pub fn display_trace(host: &ResolvedHost, traces: &[AttributeTrace]) -> io::Result<()> {
    let term = Term::stdout();
    term.write_line("")?;
    for line in format_trace(host, traces) {
        term.write_line(&line)?;
    }
    term.write_line("")
}

/// Write one status line to stdout
pub fn print(line: impl AsRef<str>) -> io::Result<()> {
    Term::stdout().write_line(line.as_ref())
}

/// Write one line to stderr
pub fn eprint(line: impl AsRef<str>) -> io::Result<()> {
    Term::stderr().write_line(line.as_ref())
}

pub fn print_error(label: &str, message: impl AsRef<str>) -> io::Result<()> {
    Term::stderr().write_line(&format!("{} {}", style(label).red().bold(), message.as_ref()))
}

pub fn print_tip(message: impl AsRef<str>) -> io::Result<()> {
    Term::stderr().write_line(&format!("{} {}", style("Tip:").yellow(), message.as_ref()))
}

/// Ask a yes/no question; anything but y/yes is a no
pub fn confirm(question: &str) -> io::Result<bool> {
    let term = Term::stdout();
    term.write_str(&format!("{} [y/n]: ", style(question).yellow()))?;
    let answer = term.read_line()?;
    Ok(parse_yes(&answer))
}

fn parse_yes(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

/// Prompt for a free-form answer, falling back to `default` on empty input
pub fn prompt(question: &str, default: &str) -> io::Result<String> {
    let term = Term::stdout();
    if default.is_empty() {
        term.write_str(&format!("{}: ", style(question).cyan()))?;
    } else {
        term.write_str(&format!("{} ({}): ", style(question).cyan(), default))?;
    }
    let answer = term.read_line()?;
    let answer = answer.trim();
    Ok(if answer.is_empty() { default.to_string() } else { answer.to_string() })
}

/// Prompt until the answer is one of `choices`
pub fn prompt_choice(question: &str, choices: &[&str], default: &str) -> io::Result<String> {
    let question = format!("{} [{}]", question, choices.join("/"));
    loop {
        let answer = prompt(&question, default)?;
        if choices.contains(&answer.as_str()) {
            return Ok(answer);
        }
        print(style("Please select one of the available options").red().to_string())?;
    }
}

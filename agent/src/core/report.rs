//! Text rendering for tool results.

/// One immediate child of a listed directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingEntry {
    pub name: String,
    pub size: u64,
    pub is_dir: bool,
}

/// Render a directory listing, one `- name: file_size=N, is_dir=B` line per entry.
///
/// Entries are rendered in the order given; callers pass enumeration order.
pub fn format_listing(requested: &str, entries: &[ListingEntry]) -> String {
    if entries.is_empty() {
        return format!("Directory \"{requested}\" is empty");
    }
    entries
        .iter()
        .map(|entry| {
            format!(
                "- {}: file_size={}, is_dir={}",
                entry.name, entry.size, entry.is_dir
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Cap `content` at `limit` characters, appending a marker naming `requested`.
pub fn truncate_chars(content: String, limit: usize, requested: &str) -> String {
    match content.char_indices().nth(limit) {
        None => content,
        Some((cut, _)) => {
            let mut kept = content;
            kept.truncate(cut);
            kept.push_str(&format!(
                "[...File \"{requested}\" truncated at {limit} characters]"
            ));
            kept
        }
    }
}

/// Captured output of a finished script.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport<'a> {
    pub stdout: &'a str,
    pub stderr: &'a str,
    /// `None` when the process was ended by a signal.
    pub exit_code: Option<i32>,
    pub stdout_truncated: usize,
    pub stderr_truncated: usize,
}

/// Combine stdout, stderr and a non-zero exit notice into the text shown to the model.
pub fn compose_run_report(report: &RunReport<'_>) -> String {
    let mut lines = Vec::new();
    if let Some(line) = stream_line("STDOUT", report.stdout, report.stdout_truncated) {
        lines.push(line);
    }
    if let Some(line) = stream_line("STDERR", report.stderr, report.stderr_truncated) {
        lines.push(line);
    }
    match report.exit_code {
        Some(0) => {}
        Some(code) => lines.push(format!("Process exited with code {code}")),
        None => lines.push("Process terminated by signal".to_string()),
    }
    if lines.is_empty() {
        return "No output produced.".to_string();
    }
    lines.join("\n")
}

fn stream_line(label: &str, text: &str, truncated: usize) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() && truncated == 0 {
        return None;
    }
    let mut line = format!("{label}: {trimmed}");
    if truncated > 0 {
        line.push_str(&format!(" [{} truncated {truncated} bytes]", label.to_lowercase()));
    }
    Some(line)
}

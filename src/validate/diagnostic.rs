// ABOUTME: Builds human-readable failure diagnostics from container output.
// ABOUTME: Strips colour codes and engine timestamps, keeps the recent tail.

/// Lines of container output kept in a diagnostic.
pub const DIAGNOSTIC_TAIL: usize = 20;

pub const OUTPUT_BANNER: &str = "--- Container output ---";

/// `reason`, followed by the cleaned tail of `logs` when there is any.
pub fn format_diagnostic(reason: &str, logs: &[String]) -> String {
    let cleaned: Vec<String> = logs
        .iter()
        .map(|line| clean_line(line))
        .filter(|line| !line.trim().is_empty())
        .collect();

    if cleaned.is_empty() {
        return reason.to_string();
    }

    let tail = &cleaned[cleaned.len().saturating_sub(DIAGNOSTIC_TAIL)..];
    format!("{reason}\n\n{OUTPUT_BANNER}\n{}", tail.join("\n"))
}

/// Remove SGR colour sequences and a leading `...Z` timestamp token.
pub fn clean_line(line: &str) -> String {
    let stripped = strip_sgr(line);
    strip_timestamp(&stripped).to_string()
}

fn strip_sgr(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut rest = line;
    while let Some(start) = rest.find("\x1b[") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let params = after
            .find(|c: char| !(c.is_ascii_digit() || c == ';'))
            .unwrap_or(after.len());
        if after[params..].starts_with('m') {
            rest = &after[params + 1..];
        } else {
            // Not a colour sequence; keep it verbatim.
            out.push_str("\x1b[");
            rest = after;
        }
    }
    out.push_str(rest);
    out
}

fn strip_timestamp(line: &str) -> &str {
    let Some(end) = line.find(char::is_whitespace) else {
        return line;
    };
    let token = &line[..end];
    if token.len() >= 2 && token.ends_with('Z') {
        line[end..].trim_start()
    } else {
        line
    }
}

//! Playlist parsing
//!
//! Two surface syntaxes are accepted, freely intermixed:
//!
//! - tagged: an `#EXTINF` marker line carrying the display name after its last
//!   comma, followed by the URL on the next non-blank, non-comment line
//! - flat: `name,url` on a single line, split on the first comma
//!
//! Parsing never fails. Anything unrecognized is skipped and a missing name is
//! synthesized as `Unknown{index}`.

use tracing::{debug, trace};

use crate::models::Entry;

const MARKER: &str = "#EXTINF";

/// Parse raw playlist text into entries, in first-appearance order.
///
/// An `#EXTINF` marker with no URL after it (end of input, or directly followed
/// by another marker) still yields an entry, with an empty URL.
pub fn parse(raw: &str) -> Vec<Entry> {
    let lines: Vec<&str> = raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();

    let mut entries = Vec::new();
    let mut skipped = 0usize;
    let mut index = 0;

    while index < lines.len() {
        let line = lines[index];

        if is_marker(line) {
            let (name, attributes) = parse_marker(line, index);

            let mut cursor = index + 1;
            while cursor < lines.len() && lines[cursor].starts_with('#') && !is_marker(lines[cursor])
            {
                trace!("Skipping comment between marker and URL: {}", lines[cursor]);
                cursor += 1;
            }

            let url = match lines.get(cursor) {
                Some(candidate) if !is_marker(candidate) => {
                    cursor += 1;
                    candidate.to_string()
                }
                _ => {
                    debug!("Marker '{}' has no URL line", name);
                    String::new()
                }
            };

            entries.push(Entry::new(name, url).with_attributes(attributes));
            index = cursor;
            continue;
        }

        if line.starts_with('#') {
            skipped += 1;
        } else if let Some((name, url)) = line.split_once(',') {
            let name = name.trim();
            let name = if name.is_empty() {
                synthesized_name(index)
            } else {
                name.to_string()
            };
            entries.push(Entry::new(name, url.trim()));
        } else {
            trace!("Skipping line without a separator: {}", line);
            skipped += 1;
        }
        index += 1;
    }

    debug!(
        "Parsed {} entries from {} non-blank lines ({} skipped)",
        entries.len(),
        lines.len(),
        skipped
    );
    entries
}

fn is_marker(line: &str) -> bool {
    line.get(..MARKER.len())
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(MARKER))
}

fn synthesized_name(index: usize) -> String {
    format!("Unknown{index}")
}

/// Split a marker line into its display name and attributes.
///
/// Format: `#EXTINF:<duration> [key="value" ...],<name>`. The name is whatever
/// follows the last comma.
fn parse_marker(line: &str, index: usize) -> (String, Vec<(String, String)>) {
    let body = line.get(MARKER.len()..).unwrap_or_default();
    let body = body.strip_prefix(':').unwrap_or(body);

    match body.rfind(',') {
        Some(comma) => {
            let (head, name) = body.split_at(comma);
            let name = name[1..].trim();
            let name = if name.is_empty() {
                synthesized_name(index)
            } else {
                name.to_string()
            };
            (name, parse_attributes(head))
        }
        None => (synthesized_name(index), parse_attributes(body)),
    }
}

/// Parse `key="value"` / `key=value` pairs following the duration.
fn parse_attributes(attrs_part: &str) -> Vec<(String, String)> {
    let mut attributes: Vec<(String, String)> = Vec::new();
    let mut chars = attrs_part.chars().peekable();
    let mut current_key = String::new();
    let mut current_value = String::new();
    let mut in_quotes = false;
    let mut in_key = false;
    let mut in_value = false;

    let mut push = |key: &mut String, value: &mut String| {
        if !key.is_empty() {
            attributes.push((std::mem::take(key), std::mem::take(value)));
        }
        key.clear();
        value.clear();
    };

    while let Some(ch) = chars.next() {
        match ch {
            ' ' | '\t' if !in_quotes => {
                if in_value {
                    if !current_value.is_empty() {
                        push(&mut current_key, &mut current_value);
                    }
                    current_key.clear();
                    current_value.clear();
                    in_value = false;
                } else {
                    current_key.clear();
                }
                in_key = true;
            }
            '=' if !in_quotes && in_key => {
                in_key = false;
                in_value = true;
                if chars.peek() == Some(&'"') {
                    chars.next();
                    in_quotes = true;
                }
            }
            '"' if in_value => {
                in_quotes = false;
                in_value = false;
                push(&mut current_key, &mut current_value);
            }
            _ => {
                if in_key {
                    current_key.push(ch);
                } else if in_value {
                    current_value.push(ch);
                }
            }
        }
    }

    if in_value && !current_value.is_empty() {
        push(&mut current_key, &mut current_value);
    }

    attributes
}

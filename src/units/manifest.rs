use crate::units::registry::DiscoveryError;

/// Well-known manifest key naming the ordered unit list.
pub const MANIFEST_KEY: &str = "ignition.units";

/// Parse one manifest source into its ordered unit identifiers.
///
/// Format: a text resource where `ignition.units = a, b` maps the fixed key
/// to a comma/newline-separated identifier list. A trailing backslash
/// continues a line; after the key line, bare lines are literal identifiers;
/// `#` starts a comment. Other keys are ignored for forward compatibility.
pub fn parse_manifest(source: &str) -> Result<Vec<String>, DiscoveryError> {
    let mut ids = Vec::new();
    let mut key_seen = false;

    for line in logical_lines(source) {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some((key, value)) = line.split_once('=') {
            if key.trim() != MANIFEST_KEY {
                continue;
            }
            key_seen = true;
            push_ids(value, &mut ids);
        } else {
            if !key_seen {
                return Err(DiscoveryError::InvalidManifest {
                    message: format!(
                        "identifier '{}' appears before the '{}' key",
                        line, MANIFEST_KEY
                    ),
                });
            }
            push_ids(line, &mut ids);
        }
    }

    Ok(ids)
}

/// Join physical lines ending in a backslash and strip comments.
fn logical_lines(source: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for raw in source.lines() {
        let without_comment = match raw.find('#') {
            Some(pos) => &raw[..pos],
            None => raw,
        };
        let trimmed = without_comment.trim_end();
        if let Some(stripped) = trimmed.strip_suffix('\\') {
            current.push_str(stripped);
        } else {
            current.push_str(trimmed);
            lines.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }

    lines
}

fn push_ids(value: &str, out: &mut Vec<String>) {
    for id in value.split(',').map(str::trim).filter(|id| !id.is_empty()) {
        out.push(id.to_string());
    }
}

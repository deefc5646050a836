use regex::Regex;
use std::sync::LazyLock;

use crate::models::BuildDescriptor;

static CONTAINER_NAME_HEADER_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^#\s*Container-Name:\s*(.+)$").ok());

static PORT_MAP_HEADER_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^#\s*Port-Map:\s*(.+)$").ok());

// The source token is the greedy run between the line's first and last
// whitespace. A directive whose source token is the last token on the line
// has no trailing whitespace and is therefore not matched. Known sharp edge,
// kept for compatibility with existing build descriptions.
static SOURCE_TOKEN_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\s(.*)\s").ok());

fn capture<'t>(re: &Option<Regex>, line: &'t str) -> Option<&'t str> {
    re.as_ref()
        .and_then(|re| re.captures(line))
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str())
}

/// Scans a build description for its metadata header and input references.
///
/// Header lines are `# Container-Name: <name>` and `# Port-Map: <spec>`;
/// if a header appears more than once the last occurrence wins. Input
/// references come from lines starting with `COPY` or `ADD` (case-sensitive
/// prefix match), excluding `http://` and `https://` sources, which the
/// remote build fetches itself.
pub fn parse(content: &str) -> BuildDescriptor {
    let mut descriptor = BuildDescriptor::default();

    for line in content.lines() {
        if let Some(name) = capture(&CONTAINER_NAME_HEADER_RE, line) {
            descriptor.container_name = Some(name.trim().to_string());
        }

        if let Some(port_map) = capture(&PORT_MAP_HEADER_RE, line) {
            // An empty value is the same as no header: there is nothing to
            // publish, and a bare `-p` would break the run command.
            let port_map = port_map.trim();
            descriptor.port_map = if port_map.is_empty() {
                None
            } else {
                Some(port_map.to_string())
            };
        }

        if line.starts_with("COPY") || line.starts_with("ADD") {
            let token = match capture(&SOURCE_TOKEN_RE, line) {
                Some(token) => token,
                None => continue,
            };

            if token.starts_with("http://") || token.starts_with("https://") {
                continue;
            }

            descriptor.input_references.push(token.to_string());
        }
    }

    descriptor
}

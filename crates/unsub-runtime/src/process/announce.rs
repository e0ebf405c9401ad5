//! Port announcement parsing.
//!
//! The backend binds a port of its own choosing and prints `PORT:<n>` on
//! stdout. Everything else on stdout is ordinary log output.

/// Marker that precedes the announced port number.
pub const PORT_ANNOUNCEMENT_PREFIX: &str = "PORT:";

/// Extract the announced port from one line of backend output.
///
/// The marker must start the line or follow a non-alphanumeric character,
/// and be followed directly by a decimal port in `1..=65535`.
pub fn parse_port_announcement(line: &str) -> Option<u16> {
    line.match_indices(PORT_ANNOUNCEMENT_PREFIX)
        .filter(|(idx, _)| {
            line[..*idx]
                .chars()
                .next_back()
                .is_none_or(|c| !c.is_ascii_alphanumeric())
        })
        .find_map(|(idx, _)| parse_port_digits(&line[idx + PORT_ANNOUNCEMENT_PREFIX.len()..]))
}

fn parse_port_digits(rest: &str) -> Option<u16> {
    let end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    if end == 0 {
        return None;
    }
    if rest[end..]
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphanumeric())
    {
        return None;
    }
    match rest[..end].parse::<u16>() {
        Ok(0) | Err(_) => None,
        Ok(port) => Some(port),
    }
}

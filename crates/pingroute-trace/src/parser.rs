use std::collections::BTreeSet;
use tracing::trace;

/// Marker that starts a reply from an intermediate router.
const REPLY_FROM: &str = "From";
/// Marker present on an echo reply from the destination itself.
const RTT_MARKER: &str = "time=";

/// Collects the addresses that answered one probe.
///
/// Router replies contribute the address found on their `From` line, unless it
/// is the destination. Any other line with a round trip time means the
/// destination answered, so `destination` is added.
pub fn parse_hop<I, S>(lines: I, destination: &str) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut addresses = BTreeSet::new();

    for line in lines {
        let line = line.as_ref();
        trace!(line, "probe output");

        if line.starts_with(REPLY_FROM) {
            if let Some(ip) = reply_address(line) {
                if ip != destination {
                    addresses.insert(ip.to_string());
                }
            }
        } else if line.contains(RTT_MARKER) {
            addresses.insert(destination.to_string());
        }
    }

    addresses
}

/// Usually the token right after `From` is the address; otherwise take the
/// first address-shaped token on the line.
fn reply_address(line: &str) -> Option<&str> {
    let mut tokens = line[REPLY_FROM.len()..].split_whitespace();
    let first = tokens.next()?;
    if is_ipv4(first) {
        return Some(first);
    }
    tokens.find(|token| is_ipv4(token))
}

pub fn is_ipv4(token: &str) -> bool {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 4 {
        return false;
    }

    parts.iter().all(|part| {
        !part.is_empty()
            && part.len() <= 3
            && part.chars().all(|c| c.is_ascii_digit())
            && part.parse::<u8>().is_ok()
    })
}

//! Host header normalisation.
//!
//! Both configured domains and inbound `Host` values go through
//! [`normalize_host`], so lookups compare like with like.

/// Lowercase a host, drop any `:port` and a trailing root dot.
///
/// IPv6 literals keep their brackets: `[::1]:8080` becomes `[::1]`.
pub fn normalize_host(host: &str) -> String {
    let host = host.trim();

    let without_port = if host.starts_with('[') {
        match host.find(']') {
            Some(end) => &host[..=end],
            None => host,
        }
    } else {
        match host.rsplit_once(':') {
            Some((name, port)) if port.bytes().all(|b| b.is_ascii_digit()) => name,
            _ => host,
        }
    };

    without_port.trim_end_matches('.').to_ascii_lowercase()
}

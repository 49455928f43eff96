use std::net::IpAddr;

use url::{Host, Url};

use super::PreviewError;

/// Hostnames that always point back at the machine running the server.
const BLOCKED_HOSTNAMES: &[&str] = &["localhost", "0.0.0.0", "127.0.0.1", "::1"];
const BLOCKED_SUFFIXES: &[&str] = &[".localhost", ".local"];

/// Returns `true` if `ip` is a private, loopback, or link-local address.
pub fn is_private_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            let o = v4.octets();
            matches!(o, [127, ..] | [10, ..] | [169, 254, ..] | [192, 168, ..])
                || (o[0] == 172 && (16..=31).contains(&o[1]))
        }
        IpAddr::V6(v6) => {
            if let Some(v4) = v6.to_ipv4_mapped() {
                return is_private_ip(IpAddr::V4(v4));
            }
            v6.is_loopback()
                || (v6.segments()[0] & 0xfe00 == 0xfc00)
                || (v6.segments()[0] & 0xffc0 == 0xfe80)
        }
    }
}

/// Returns `true` for names like `localhost`, `printer.local` or `app.localhost`.
pub fn is_blocked_hostname(hostname: &str) -> bool {
    let h = hostname
        .trim_start_matches('[')
        .trim_end_matches(']')
        .trim_end_matches('.')
        .to_ascii_lowercase();
    BLOCKED_HOSTNAMES.contains(&h.as_str()) || BLOCKED_SUFFIXES.iter().any(|s| h.ends_with(s))
}

/// Reject URLs whose host is a local name or a literal private address.
///
/// Only the literal host is inspected; see [`super::Previewer`] for the
/// optional resolved-address check.
pub fn check_host(url: &Url) -> Result<(), PreviewError> {
    let host = url.host().ok_or(PreviewError::InvalidUrl)?;

    let hostname = match &host {
        Host::Domain(d) => d.to_string(),
        Host::Ipv4(ip) => ip.to_string(),
        Host::Ipv6(ip) => ip.to_string(),
    };
    if is_blocked_hostname(&hostname) {
        return Err(PreviewError::BlockedHost);
    }

    let literal = match host {
        Host::Ipv4(ip) => Some(IpAddr::V4(ip)),
        Host::Ipv6(ip) => Some(IpAddr::V6(ip)),
        Host::Domain(_) => None,
    };
    match literal {
        Some(ip) if is_private_ip(ip) => Err(PreviewError::BlockedIp),
        _ => Ok(()),
    }
}

/// Parse and vet a user-supplied target URL before any network call.
///
/// When `allow_private_hosts` is set only the scheme is enforced.
pub fn validate_target(raw: &str, allow_private_hosts: bool) -> Result<Url, PreviewError> {
    let url = Url::parse(raw.trim()).map_err(|_| PreviewError::InvalidUrl)?;

    match url.scheme() {
        "http" | "https" => {}
        _ => return Err(PreviewError::UnsupportedScheme),
    }

    if !allow_private_hosts {
        check_host(&url)?;
    }

    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rejects(raw: &str) -> PreviewError {
        validate_target(raw, false).expect_err("expected the guard to reject")
    }

    #[test]
    fn blocks_loopback_ipv4() {
        assert!(is_private_ip("127.0.0.1".parse().unwrap()));
        assert!(is_private_ip("127.255.255.255".parse().unwrap()));
    }

    #[test]
    fn blocks_private_class_a() {
        assert!(is_private_ip("10.0.0.1".parse().unwrap()));
    }

    #[test]
    fn blocks_private_class_b_range_edges() {
        assert!(is_private_ip("172.16.0.1".parse().unwrap()));
        assert!(is_private_ip("172.31.255.255".parse().unwrap()));
        assert!(!is_private_ip("172.15.255.255".parse().unwrap()));
        assert!(!is_private_ip("172.32.0.1".parse().unwrap()));
    }

    #[test]
    fn blocks_private_class_c() {
        assert!(is_private_ip("192.168.1.1".parse().unwrap()));
    }

    #[test]
    fn blocks_link_local() {
        assert!(is_private_ip("169.254.0.1".parse().unwrap()));
    }

    #[test]
    fn blocks_ipv6_loopback_ula_and_link_local() {
        assert!(is_private_ip("::1".parse().unwrap()));
        assert!(is_private_ip("fc00::1".parse().unwrap()));
        assert!(is_private_ip("fd12:3456::1".parse().unwrap()));
        assert!(is_private_ip("fe80::1".parse().unwrap()));
        assert!(is_private_ip("febf::1".parse().unwrap()));
    }

    #[test]
    fn blocks_ipv4_mapped_private() {
        assert!(is_private_ip("::ffff:10.0.0.1".parse().unwrap()));
    }

    #[test]
    fn allows_public_addresses() {
        assert!(!is_private_ip("8.8.8.8".parse().unwrap()));
        assert!(!is_private_ip("1.1.1.1".parse().unwrap()));
        assert!(!is_private_ip("2606:4700:4700::1111".parse().unwrap()));
        assert!(!is_private_ip("fec0::1".parse().unwrap()));
    }

    #[test]
    fn rejects_non_http_schemes() {
        for raw in [
            "ftp://example.com/file",
            "file:///etc/passwd",
            "javascript:alert(1)",
            "data:text/html,hi",
            "gopher://example.com",
        ] {
            assert!(
                matches!(rejects(raw), PreviewError::UnsupportedScheme),
                "{raw} should be an unsupported scheme"
            );
        }
    }

    #[test]
    fn scheme_is_checked_even_when_private_hosts_are_allowed() {
        assert!(matches!(
            validate_target("ftp://127.0.0.1/", true),
            Err(PreviewError::UnsupportedScheme)
        ));
    }

    #[test]
    fn rejects_unparsable_input() {
        assert!(matches!(rejects("not-a-url"), PreviewError::InvalidUrl));
        assert!(matches!(rejects(""), PreviewError::InvalidUrl));
    }

    #[test]
    fn rejects_local_hostnames() {
        for raw in [
            "http://localhost/",
            "http://LOCALHOST:3000/",
            "http://127.0.0.1/",
            "http://[::1]/",
            "http://0.0.0.0/",
            "https://a.localhost/",
            "https://b.local/",
            "http://localhost./",
            "http://a.localhost./",
            "http://printer.local./",
        ] {
            assert!(
                matches!(rejects(raw), PreviewError::BlockedHost),
                "{raw} should be a blocked hostname"
            );
        }
    }

    #[test]
    fn rejects_private_ip_literals() {
        for raw in [
            "http://10.1.2.3/",
            "http://127.0.0.2/",
            "http://169.254.169.254/latest/meta-data",
            "http://172.20.0.5/",
            "http://192.168.0.10:8080/",
            "http://[fe80::1]/",
            "http://[fd00::5]/",
        ] {
            assert!(
                matches!(rejects(raw), PreviewError::BlockedIp),
                "{raw} should be a blocked IP"
            );
        }
    }

    #[test]
    fn accepts_public_targets() {
        let url = validate_target("http://8.8.8.8/", false).unwrap();
        assert_eq!(url.host_str(), Some("8.8.8.8"));
        let url = validate_target("  https://example.com/page?q=1  ", false).unwrap();
        assert_eq!(url.as_str(), "https://example.com/page?q=1");
    }

    #[test]
    fn private_hosts_pass_when_allowed() {
        assert!(validate_target("http://127.0.0.1:9000/", true).is_ok());
    }
}

//! Bridge line parsing
//!
//! Every bridge list carries one bridge per line, but the position and
//! shape of the address differ per list:
//!
//! | Grammar   | Example line                                          |
//! |-----------|-------------------------------------------------------|
//! | snowflake | `203.0.113.5`                                         |
//! | obfs4     | `obfs4 [2001:db8::1]:443 ABCD cert=x iat-mode=0`      |
//! | vanilla   | `38.229.1.78:443 3C3430CFB5...`                       |
//! | webtunnel | `webtunnel 10.0.0.1:443 FP url=https://x ver=0.0.1`   |
//!
//! [`parse_line`] is the pure grammar. [`LineParser`] wraps it with a
//! run-scoped memo table so a line shared by several files is parsed once.

use dashmap::DashMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::trace;

use crate::models::{BridgeType, LineGrammar};

/// Extract the bridge address from one trimmed, non-empty line
///
/// Returns `None` when the line does not follow the grammar of `bridge_type`
/// or the extracted text is not an IPv4/IPv6 literal.
pub fn parse_line(line: &str, bridge_type: BridgeType) -> Option<IpAddr> {
    let candidate = match bridge_type.grammar() {
        LineGrammar::Snowflake => line,
        LineGrammar::Obfs4 | LineGrammar::Webtunnel => {
            let endpoint = line.split_whitespace().nth(1)?;
            host_of(endpoint)
        },
        LineGrammar::Vanilla => {
            let endpoint = line.split_whitespace().next()?;
            host_before_colon(endpoint)
        },
    };

    candidate.parse().ok()
}

/// `[host]:port` -> `host`, `host:port` -> `host`
fn host_of(endpoint: &str) -> &str {
    if endpoint.starts_with('[') {
        if let Some(end) = endpoint.find("]:") {
            return &endpoint[1..end];
        }
    }
    host_before_colon(endpoint)
}

fn host_before_colon(endpoint: &str) -> &str {
    endpoint.split(':').next().unwrap_or(endpoint)
}

/// Parse cache counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
    pub entries: usize,
}

/// Memoizing front end for [`parse_line`]
///
/// One table per bridge type, keyed by the exact line, so a hit is a
/// borrowed lookup with no allocation. Safe to share between the concurrent
/// file tasks of one run. There is no eviction: the tables live for a
/// single run and grow with the number of distinct input lines.
#[derive(Debug, Default)]
pub struct LineParser {
    caches: [DashMap<String, Option<IpAddr>>; 6],
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl LineParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `line`, reusing the result of an earlier identical call
    pub fn parse(&self, line: &str, bridge_type: BridgeType) -> Option<IpAddr> {
        let cache = &self.caches[bridge_type.index()];

        if let Some(cached) = cache.get(line) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return *cached;
        }

        let parsed = parse_line(line, bridge_type);
        if parsed.is_none() {
            trace!(bridge_type = %bridge_type, line, "Line did not match grammar");
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        cache.insert(line.to_owned(), parsed);
        parsed
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.caches.iter().map(DashMap::len).sum(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn ip(s: &str) -> Option<IpAddr> {
        Some(s.parse().unwrap())
    }

    #[test]
    fn test_snowflake_whole_line() {
        assert_eq!(parse_line("198.51.100.7", BridgeType::SnowflakeIpv4), ip("198.51.100.7"));
        assert_eq!(parse_line("2001:db8::42", BridgeType::SnowflakeIpv6), ip("2001:db8::42"));
        assert_eq!(parse_line("198.51.100.7:443", BridgeType::SnowflakeIpv4), None);
        assert_eq!(parse_line("snowflake", BridgeType::SnowflakeIpv6), None);
    }

    #[test]
    fn test_obfs4_plain_and_bracketed() {
        let line = "obfs4 192.0.2.10:9001 0123456789ABCDEF cert=abc iat-mode=0";
        assert_eq!(parse_line(line, BridgeType::Obfs4), ip("192.0.2.10"));

        let line = "obfs4 [2001:db8::1]:443 ABCD cert=x iat-mode=1";
        assert_eq!(parse_line(line, BridgeType::Obfs4Ipv6), ip("2001:db8::1"));
    }

    #[test]
    fn test_obfs4_rejects_short_or_invalid() {
        assert_eq!(parse_line("obfs4", BridgeType::Obfs4), None);
        assert_eq!(parse_line("obfs4 999.0.2.10:9001 FP", BridgeType::Obfs4), None);
        // Bracket without "]:" falls back to text before the first colon
        assert_eq!(parse_line("obfs4 [2001:db8::1] FP", BridgeType::Obfs4Ipv6), None);
        // Unbracketed IPv6 cannot be told apart from the port
        assert_eq!(parse_line("obfs4 2001:db8::1:443 FP", BridgeType::Obfs4Ipv6), None);
    }

    #[test]
    fn test_vanilla_first_token() {
        let line = "38.229.1.78:80 3C3430CFB5A8B1F0E8E0A1B6F7C7D7E7F7A7B7C7";
        assert_eq!(parse_line(line, BridgeType::Vanilla), ip("38.229.1.78"));
        assert_eq!(parse_line("38.229.1.78", BridgeType::Vanilla), ip("38.229.1.78"));
        assert_eq!(parse_line("38.229.1:80 FP", BridgeType::Vanilla), None);
    }

    #[test]
    fn test_webtunnel_second_token() {
        let line = "webtunnel [2001:db8:abcd::5]:443 FP url=https://example.net/path ver=0.0.1";
        assert_eq!(parse_line(line, BridgeType::Webtunnel), ip("2001:db8:abcd::5"));
        assert_eq!(parse_line("webtunnel", BridgeType::Webtunnel), None);
        assert_eq!(parse_line("webtunnel host.example:443 FP", BridgeType::Webtunnel), None);
    }

    #[test]
    fn test_empty_line_never_matches() {
        for ty in BridgeType::ALL {
            assert_eq!(parse_line("", ty), None);
        }
    }

    #[test]
    fn test_line_parser_counts_hits() {
        let parser = LineParser::new();
        let line = "obfs4 192.0.2.10:9001 FP cert=abc";

        assert_eq!(parser.parse(line, BridgeType::Obfs4), ip("192.0.2.10"));
        assert_eq!(parser.parse(line, BridgeType::Obfs4), ip("192.0.2.10"));
        // Same text under another grammar is a separate entry
        assert_eq!(parser.parse(line, BridgeType::Vanilla), None);

        let stats = parser.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 2);
        assert_eq!(stats.entries, 2);
    }

    #[test]
    fn test_line_parser_tables_are_per_type() {
        let parser = LineParser::new();
        let line = "203.0.113.5";

        assert_eq!(parser.parse(line, BridgeType::SnowflakeIpv4), ip("203.0.113.5"));
        assert_eq!(parser.parse(line, BridgeType::SnowflakeIpv6), ip("203.0.113.5"));
        assert_eq!(parser.stats().entries, 2);

        // Hits under either type leave the tables as they were
        for _ in 0..3 {
            parser.parse(line, BridgeType::SnowflakeIpv4);
            parser.parse(line, BridgeType::SnowflakeIpv6);
        }
        let stats = parser.stats();
        assert_eq!(stats.entries, 2);
        assert_eq!(stats.hits, 6);
        assert_eq!(stats.misses, 2);
    }
}

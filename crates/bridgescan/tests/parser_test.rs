//! Line grammar behavior through the public API

use bridgescan::parser::{parse_line, LineParser};
use bridgescan::BridgeType;
use proptest::prelude::*;
use std::net::IpAddr;

fn ip(s: &str) -> Option<IpAddr> {
    Some(s.parse().unwrap())
}

#[test]
fn test_one_line_per_format() {
    assert_eq!(parse_line("38.229.1.78 3C3430CFB5...", BridgeType::Vanilla), ip("38.229.1.78"));
    assert_eq!(
        parse_line("obfs4 [2001:db8::1]:443 ABCD cert=x", BridgeType::Obfs4Ipv6),
        ip("2001:db8::1")
    );
    assert_eq!(parse_line("203.0.113.5", BridgeType::SnowflakeIpv4), ip("203.0.113.5"));
    assert_eq!(
        parse_line("webtunnel 10.0.0.1:443 FP url=https://x ver=1", BridgeType::Webtunnel),
        ip("10.0.0.1")
    );
}

#[test]
fn test_format_tag_selects_grammar() {
    // A snowflake line is not a valid obfs4 line and vice versa
    assert_eq!(parse_line("203.0.113.5", BridgeType::Obfs4), None);
    assert_eq!(parse_line("obfs4 192.0.2.1:443 FP", BridgeType::SnowflakeIpv4), None);
    // Vanilla reads the first token, obfs4 the second
    assert_eq!(parse_line("192.0.2.1:443 198.51.100.2:80", BridgeType::Vanilla), ip("192.0.2.1"));
    assert_eq!(parse_line("192.0.2.1:443 198.51.100.2:80", BridgeType::Obfs4), ip("198.51.100.2"));
}

#[test]
fn test_ipv6_is_normalized() {
    let parsed = parse_line("2001:0db8:0000:0000:0000:0000:0000:0001", BridgeType::SnowflakeIpv6).unwrap();
    assert_eq!(parsed.to_string(), "2001:db8::1");
}

proptest! {
    #[test]
    fn prop_memoized_parse_matches_pure_parse(
        a in 0u8..=255, b in 0u8..=255, c in 0u8..=255, d in 0u8..=255,
        port in 1u16..=65535,
        idx in 0usize..6,
    ) {
        let ty = BridgeType::ALL[idx];
        let line = match ty {
            BridgeType::SnowflakeIpv4 | BridgeType::SnowflakeIpv6 => format!("{a}.{b}.{c}.{d}"),
            BridgeType::Vanilla => format!("{a}.{b}.{c}.{d}:{port} FP"),
            BridgeType::Obfs4 | BridgeType::Obfs4Ipv6 => format!("obfs4 {a}.{b}.{c}.{d}:{port} FP cert=x"),
            BridgeType::Webtunnel => format!("webtunnel {a}.{b}.{c}.{d}:{port} FP url=https://x"),
        };

        let parser = LineParser::new();
        let first = parser.parse(&line, ty);
        let second = parser.parse(&line, ty);

        prop_assert_eq!(first, parse_line(&line, ty));
        prop_assert_eq!(first, second);
        prop_assert_eq!(first.map(|ip| ip.to_string()), Some(format!("{a}.{b}.{c}.{d}")));
        prop_assert_eq!(parser.stats().hits, 1);
    }

    #[test]
    fn prop_parse_never_panics(line in "\\PC{1,80}", idx in 0usize..6) {
        let _ = parse_line(line.trim(), BridgeType::ALL[idx]);
    }
}

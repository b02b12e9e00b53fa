//! Data models for bridge records and their enrichment

use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// Bridge transport / list format
///
/// Each variant names one source list. Several lists share a line grammar,
/// see [`BridgeType::grammar`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BridgeType {
    #[serde(rename = "obfs4")]
    Obfs4,
    #[serde(rename = "obfs4-ipv6")]
    Obfs4Ipv6,
    #[serde(rename = "vanilla")]
    Vanilla,
    #[serde(rename = "webtunnel")]
    Webtunnel,
    #[serde(rename = "snowflake-ipv4")]
    SnowflakeIpv4,
    #[serde(rename = "snowflake-ipv6")]
    SnowflakeIpv6,
}

/// Line grammar families
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineGrammar {
    /// `IP`
    Snowflake,
    /// `obfs4 IP:PORT FINGERPRINT cert=... iat-mode=...`
    Obfs4,
    /// `IP:PORT FINGERPRINT`
    Vanilla,
    /// `webtunnel [IP]:PORT FINGERPRINT url=... ver=...`
    Webtunnel,
}

impl BridgeType {
    pub const ALL: [BridgeType; 6] = [
        BridgeType::Obfs4,
        BridgeType::Obfs4Ipv6,
        BridgeType::Vanilla,
        BridgeType::Webtunnel,
        BridgeType::SnowflakeIpv4,
        BridgeType::SnowflakeIpv6,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BridgeType::Obfs4 => "obfs4",
            BridgeType::Obfs4Ipv6 => "obfs4-ipv6",
            BridgeType::Vanilla => "vanilla",
            BridgeType::Webtunnel => "webtunnel",
            BridgeType::SnowflakeIpv4 => "snowflake-ipv4",
            BridgeType::SnowflakeIpv6 => "snowflake-ipv6",
        }
    }

    /// Position in [`BridgeType::ALL`]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn grammar(&self) -> LineGrammar {
        match self {
            BridgeType::SnowflakeIpv4 | BridgeType::SnowflakeIpv6 => LineGrammar::Snowflake,
            BridgeType::Obfs4 | BridgeType::Obfs4Ipv6 => LineGrammar::Obfs4,
            BridgeType::Vanilla => LineGrammar::Vanilla,
            BridgeType::Webtunnel => LineGrammar::Webtunnel,
        }
    }

    /// Snowflake lists are published as RAR archives and read after extraction
    pub fn is_archived(&self) -> bool {
        matches!(self, BridgeType::SnowflakeIpv4 | BridgeType::SnowflakeIpv6)
    }

    /// File name the list is read from inside the bridges directory
    pub fn file_name(&self) -> String {
        if self.is_archived() {
            format!("bridges-{}", self.as_str())
        } else {
            format!("{}.txt", self.as_str())
        }
    }
}

impl std::fmt::Display for BridgeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BridgeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BridgeType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("Unknown bridge type: {}", s))
    }
}

/// One successfully parsed bridge line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BridgeRecord {
    pub address: IpAddr,
    pub bridge_type: BridgeType,
}

impl BridgeRecord {
    pub fn new(address: IpAddr, bridge_type: BridgeType) -> Self {
        Self {
            address,
            bridge_type,
        }
    }
}

/// Lookup results for one unique address
///
/// `None` fields mean the corresponding database had no entry (or was not
/// available), not that the lookup failed the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressInfo {
    pub address: IpAddr,
    pub asn: Option<u32>,
    pub as_org: Option<String>,
    pub country: Option<String>,
    pub country_code: Option<String>,
}

impl AddressInfo {
    /// An entry with every lookup field empty
    pub fn empty(address: IpAddr) -> Self {
        Self {
            address,
            asn: None,
            as_org: None,
            country: None,
            country_code: None,
        }
    }
}

/// Enriched bridge, the unit written to the JSON outputs
///
/// Optional fields serialize as `null` so every object has the same keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichedRecord {
    pub ip: IpAddr,
    pub asn: Option<u32>,
    pub as_org: Option<String>,
    pub country: Option<String>,
    pub country_code: Option<String>,
    pub bridge_type: BridgeType,
}

impl EnrichedRecord {
    pub fn new(info: &AddressInfo, bridge_type: BridgeType) -> Self {
        Self {
            ip: info.address,
            asn: info.asn,
            as_org: info.as_org.clone(),
            country: info.country.clone(),
            country_code: info.country_code.clone(),
            bridge_type,
        }
    }
}

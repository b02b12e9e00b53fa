//! Result subsets
//!
//! Both filters are pure single passes over the enriched records. They are
//! not exclusive: a record can land in both subsets.

use crate::models::EnrichedRecord;

/// Country code selected by the China subset
pub const CHINA_COUNTRY_CODE: &str = "CN";

/// Organization name fragments selected by the organization subset
pub const TARGET_ORGANIZATIONS: [&str; 3] = ["alibaba", "tencent", "huawei"];

/// Records whose `country_code` equals `code` exactly
pub fn filter_country(records: &[EnrichedRecord], code: &str) -> Vec<EnrichedRecord> {
    records
        .iter()
        .filter(|record| record.country_code.as_deref() == Some(code))
        .cloned()
        .collect()
}

/// Records whose `as_org` contains any of `organizations`, ignoring case
pub fn filter_organizations(records: &[EnrichedRecord], organizations: &[&str]) -> Vec<EnrichedRecord> {
    let needles: Vec<String> = organizations.iter().map(|org| org.to_lowercase()).collect();

    records
        .iter()
        .filter(|record| {
            record.as_org.as_deref().is_some_and(|org| {
                let org = org.to_lowercase();
                needles.iter().any(|needle| org.contains(needle.as_str()))
            })
        })
        .cloned()
        .collect()
}

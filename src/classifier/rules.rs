//! Classification rules and their keyword sets

use super::content;
use super::Subject;
use crate::types::leak::{Leak, LeakKind};
use regex::Regex;

/// Location terms looked for in the request URL
pub const LOCATION_KEYWORDS: &[&str] = &[
    "location",
    "gps",
    "latitude",
    "longitude",
    "coordinates",
    "geolocation",
    "position",
    "geocode",
    "maps",
    "directions",
];

/// Device identifier terms looked for in the request URL
pub const DEVICE_KEYWORDS: &[&str] = &[
    "device_id",
    "imei",
    "udid",
    "android_id",
    "ios_id",
    "device_info",
    "hardware_id",
    "serial",
    "mac_address",
];

/// Personal data terms looked for in the request URL
pub const PERSONAL_KEYWORDS: &[&str] = &[
    "email",
    "phone",
    "contact",
    "profile",
    "personal",
    "address",
    "name",
    "birthday",
    "social_security",
];

/// Known third-party tracking domains, matched as host substrings
pub const TRACKING_HOSTS: &[&str] = &[
    "google-analytics",
    "googletagmanager",
    "doubleclick",
    "facebook.com",
    "connect.facebook",
    "adsystem",
    "googlesyndication",
    "amazon-adsystem",
    "scorecardresearch",
    "quantserve",
    "outbrain",
    "taboola",
];

/// What part of a flow a rule inspects
pub enum Matcher {
    /// Any keyword appears in the lower-cased host and path
    UrlKeywords(&'static [&'static str]),
    /// Any substring appears in the lower-cased host
    HostSubstrings(&'static [&'static str]),
    /// Pattern found in the request body; never matches without a body
    BodyPattern(&'static Regex),
}

impl Matcher {
    fn matches(&self, subject: &Subject<'_>) -> bool {
        match self {
            Matcher::UrlKeywords(keywords) => keywords.iter().any(|k| subject.url.contains(k)),
            Matcher::HostSubstrings(hosts) => hosts.iter().any(|h| subject.host.contains(h)),
            Matcher::BodyPattern(pattern) => subject
                .body()
                .is_some_and(|body| pattern.is_match(body)),
        }
    }
}

/// Builds the human-readable detail for a match
pub type DetailFn = fn(&Subject<'_>) -> String;

/// One link of the classification chain
pub struct Rule {
    name: &'static str,
    kind: LeakKind,
    matcher: Matcher,
    detail: DetailFn,
}

impl Rule {
    pub fn new(name: &'static str, kind: LeakKind, matcher: Matcher, detail: DetailFn) -> Self {
        Self {
            name,
            kind,
            matcher,
            detail,
        }
    }

    pub fn url_keywords(
        name: &'static str,
        kind: LeakKind,
        keywords: &'static [&'static str],
        detail: DetailFn,
    ) -> Self {
        Self::new(name, kind, Matcher::UrlKeywords(keywords), detail)
    }

    pub fn host_substrings(
        name: &'static str,
        kind: LeakKind,
        hosts: &'static [&'static str],
        detail: DetailFn,
    ) -> Self {
        Self::new(name, kind, Matcher::HostSubstrings(hosts), detail)
    }

    pub fn body_pattern(
        name: &'static str,
        kind: LeakKind,
        pattern: &'static Regex,
        detail: DetailFn,
    ) -> Self {
        Self::new(name, kind, Matcher::BodyPattern(pattern), detail)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn kind(&self) -> LeakKind {
        self.kind
    }

    /// Label the subject if this rule matches it
    pub fn evaluate(&self, subject: &Subject<'_>) -> Option<Leak> {
        if self.matcher.matches(subject) {
            Some(Leak::new(self.kind, (self.detail)(subject)))
        } else {
            None
        }
    }
}

/// The default chain, in priority order
pub fn default_rules() -> Vec<Rule> {
    vec![
        Rule::url_keywords("location_keywords", LeakKind::GpsData, LOCATION_KEYWORDS, |s| {
            format!(
                "Location data detected in {} request to {}",
                s.record.method, s.record.host
            )
        }),
        Rule::url_keywords("device_keywords", LeakKind::DeviceInfo, DEVICE_KEYWORDS, |s| {
            format!("Device identifier detected in request to {}", s.record.host)
        }),
        Rule::url_keywords(
            "personal_keywords",
            LeakKind::PersonalData,
            PERSONAL_KEYWORDS,
            |s| format!("Personal information detected in request to {}", s.record.host),
        ),
        Rule::host_substrings("tracking_hosts", LeakKind::Tracking, TRACKING_HOSTS, |s| {
            format!("Third-party tracking detected: {}", s.host)
        }),
        Rule::body_pattern(
            "body_email",
            LeakKind::PersonalData,
            &content::EMAIL,
            |s| format!("Email address detected in request content to {}", s.record.host),
        ),
        Rule::body_pattern(
            "body_phone",
            LeakKind::PersonalData,
            &content::PHONE,
            |s| format!("Phone number detected in request content to {}", s.record.host),
        ),
        Rule::body_pattern(
            "body_coordinates",
            LeakKind::GpsData,
            &content::COORDINATES,
            |s| format!("GPS coordinates detected in request content to {}", s.record.host),
        ),
    ]
}

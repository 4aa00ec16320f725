//! Patterns for request body inspection

use regex::Regex;
use std::sync::LazyLock;

pub static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)[a-z0-9._%+-]+@[a-z0-9.-]+\.[a-z]{2,}").expect("email regex should compile")
});

pub static PHONE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\+?\d{1,3}[-.\s]?)?\(?\d{3}\)?[-.\s]?\d{3}[-.\s]?\d{4}")
        .expect("phone regex should compile")
});

/// A latitude, longitude pair such as `37.7749, -122.4194`
pub static COORDINATES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"[-+]?([1-8]?\d(\.\d+)?|90(\.0+)?),\s*[-+]?(180(\.0+)?|((1[0-7]\d)|([1-9]?\d))(\.\d+)?)",
    )
    .expect("coordinate regex should compile")
});

//! Key expression helpers.
//!
//! Readings are published under `<key_prefix>/<topic>`, or just `<topic>`
//! when the backend has no prefix.

use crate::error::{Error, Result};

/// Characters that Zenoh reserves for wildcards, selectors and verbatim chunks.
const RESERVED: [char; 4] = ['*', '$', '?', '#'];

/// Build the key expression a reading is published to.
///
/// # Example
/// ```
/// use sensorsim_common::keyexpr::build_key;
///
/// assert_eq!(build_key("plant1", "telemetry"), "plant1/telemetry");
/// assert_eq!(build_key("", "telemetry"), "telemetry");
/// ```
pub fn build_key(prefix: &str, topic: &str) -> String {
    if prefix.is_empty() {
        topic.to_string()
    } else {
        format!("{}/{}", prefix, topic)
    }
}

/// Check that a topic is a concrete key expression.
///
/// Topics may contain `/` separated chunks but no empty chunk, no leading
/// or trailing slash and no wildcard or reserved characters.
pub fn validate_topic(topic: &str) -> Result<()> {
    let invalid = |reason: &str| Error::InvalidTopic {
        topic: topic.to_string(),
        reason: reason.to_string(),
    };

    if topic.trim().is_empty() {
        return Err(invalid("must not be empty"));
    }
    if topic.starts_with('/') || topic.ends_with('/') {
        return Err(invalid("must not start or end with '/'"));
    }
    if topic.split('/').any(str::is_empty) {
        return Err(invalid("must not contain empty chunks"));
    }
    if let Some(c) = topic.chars().find(|c| RESERVED.contains(c)) {
        return Err(invalid(&format!("reserved character '{}'", c)));
    }
    if topic.chars().any(char::is_whitespace) {
        return Err(invalid("must not contain whitespace"));
    }

    Ok(())
}

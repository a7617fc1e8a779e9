//! Destination newtype for type safety
//!
//! Wraps routing-key strings so channel identifiers cannot be confused
//! with message ids or payload fragments. A destination is the channel
//! identifier of the downstream chat API, optionally followed by
//! `#<thread>` to address a sub-thread within the channel.

use std::{
    fmt::{self, Display},
    ops::Deref,
    sync::Arc,
};

use serde::{Deserialize, Serialize};

/// A routing key for the downstream messaging API
///
/// The delivery core treats destinations as opaque keys: they group
/// circuit-breaker state and appear in logs and metrics, nothing more.
/// The `channel`/`thread` split exists for the transport layer, which
/// addresses sub-threads separately.
///
/// # Examples
///
/// ```
/// use corvid_common::Destination;
///
/// let dest = Destination::new("general");
/// assert_eq!(dest.channel(), "general");
/// assert_eq!(dest.thread(), None);
///
/// let dest: Destination = "general#birdwatch".into();
/// assert_eq!(dest.channel(), "general");
/// assert_eq!(dest.thread(), Some("birdwatch"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct Destination(Arc<str>);

impl Destination {
    /// Create a new `Destination` from any type convertible to `Arc<str>`
    #[must_use]
    pub fn new(s: impl Into<Arc<str>>) -> Self {
        Self(s.into())
    }

    /// The full routing key as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The channel component (everything before the first `#`)
    #[must_use]
    pub fn channel(&self) -> &str {
        self.0.split('#').next().unwrap_or(&self.0)
    }

    /// The optional sub-thread component (everything after the first `#`)
    #[must_use]
    pub fn thread(&self) -> Option<&str> {
        self.0.split_once('#').map(|(_, thread)| thread)
    }

    /// Convert into the inner `Arc<str>`
    #[must_use]
    pub fn into_inner(self) -> Arc<str> {
        self.0
    }
}

impl Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for Destination {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Deref for Destination {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<String> for Destination {
    fn from(s: String) -> Self {
        Self(Arc::from(s))
    }
}

impl From<&str> for Destination {
    fn from(s: &str) -> Self {
        Self(Arc::from(s))
    }
}

impl From<Arc<str>> for Destination {
    fn from(s: Arc<str>) -> Self {
        Self(s)
    }
}

impl From<Destination> for Arc<str> {
    fn from(destination: Destination) -> Self {
        destination.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_destination_creation() {
        let dest = Destination::new("announcements");
        assert_eq!(dest.as_str(), "announcements");
    }

    #[test]
    fn test_destination_channel_only() {
        let dest = Destination::new("general");
        assert_eq!(dest.channel(), "general");
        assert_eq!(dest.thread(), None);
    }

    #[test]
    fn test_destination_with_thread() {
        let dest = Destination::new("general#birdwatch");
        assert_eq!(dest.channel(), "general");
        assert_eq!(dest.thread(), Some("birdwatch"));
    }

    #[test]
    fn test_destination_thread_with_hash() {
        // Only the first '#' splits; the rest belongs to the thread key.
        let dest = Destination::new("general#a#b");
        assert_eq!(dest.channel(), "general");
        assert_eq!(dest.thread(), Some("a#b"));
    }

    #[test]
    fn test_destination_from_string() {
        let s = String::from("updates");
        let dest: Destination = s.into();
        assert_eq!(dest.as_str(), "updates");
    }

    #[test]
    fn test_destination_display() {
        let dest = Destination::new("general#news");
        assert_eq!(format!("{dest}"), "general#news");
    }

    #[test]
    fn test_destination_equality() {
        let a = Destination::new("general");
        let b = Destination::new("general");
        let c = Destination::new("other");

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_destination_deref() {
        let dest = Destination::new("general");
        assert_eq!(dest.len(), "general".len());
        assert!(!dest.is_empty());
    }

    #[test]
    fn test_destination_serde() {
        let dest = Destination::new("general#news");
        let serialized = serde_json::to_string(&dest).unwrap();
        assert_eq!(serialized, "\"general#news\"");

        let deserialized: Destination = serde_json::from_str(&serialized).unwrap();
        assert_eq!(deserialized, dest);
    }

    #[test]
    fn test_destination_hash() {
        use std::collections::HashMap;

        let mut map = HashMap::new();
        let dest = Destination::new("general");
        map.insert(dest.clone(), 42);

        assert_eq!(map.get(&dest), Some(&42));
    }
}

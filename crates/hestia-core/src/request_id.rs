//! Request identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Identifier the pipeline attaches to each request and echoes back in a
/// response header.
///
/// Always a freshly generated UUID v4; identifiers supplied by clients are
/// never adopted.
///
/// ```
/// use hestia_core::RequestId;
///
/// let id = RequestId::new();
/// let echoed: RequestId = id.to_string().parse().unwrap();
/// assert_eq!(id, echoed);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Generates a fresh identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0.hyphenated(), f)
    }
}

/// Parses the hyphenated form written by [`Display`](fmt::Display).
impl FromStr for RequestId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_display_is_hyphenated_v4() {
        let text = RequestId::new().to_string();
        assert_eq!(text.len(), 36);
        assert_eq!(text.as_bytes()[14], b'4');
        assert_eq!(text.matches('-').count(), 4);
    }

    #[test]
    fn test_rejects_garbage() {
        assert!("not-a-request-id".parse::<RequestId>().is_err());
        assert!("".parse::<RequestId>().is_err());
    }

    #[test]
    fn test_json_is_a_bare_string() {
        let id: RequestId = "67e55044-10b1-426f-9247-bb680e5fe0c8".parse().unwrap();
        assert_eq!(
            serde_json::to_string(&id).unwrap(),
            "\"67e55044-10b1-426f-9247-bb680e5fe0c8\""
        );
    }

    proptest! {
        #[test]
        fn generated_ids_do_not_collide(n in 2usize..64) {
            let ids: std::collections::HashSet<_> = (0..n).map(|_| RequestId::new()).collect();
            prop_assert_eq!(ids.len(), n);
        }
    }
}

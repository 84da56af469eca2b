//! Decision scopes: the requestable personalization slots.
//!
//! On the wire a scope is only ever its name. Scopes built from an
//! activity/placement pair use a base64-encoded JSON object as their name, so a
//! scope constructed from the pair and one constructed from the pre-encoded
//! name compare equal and hash identically.

use std::fmt;

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Standard alphabet, padded on encode, padding optional on decode.
const SCOPE_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// The structured form of an encoded decision scope.
///
/// Field order is the canonical wire order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeTarget {
    pub activity_id: String,
    pub placement_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_count: Option<i64>,
}

impl ScopeTarget {
    pub fn new(
        activity_id: impl Into<String>,
        placement_id: impl Into<String>,
        item_count: Option<i64>,
    ) -> Self {
        Self {
            activity_id: activity_id.into(),
            placement_id: placement_id.into(),
            item_count: item_count.filter(|count| *count > 0),
        }
    }

    /// Encode into the wire-form scope name.
    pub fn encode(&self) -> String {
        match serde_json::to_vec(self) {
            Ok(json) => SCOPE_ENGINE.encode(json),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to serialize decision scope target");
                String::new()
            }
        }
    }

    /// Decode a wire-form scope name.
    ///
    /// Returns `None` when the name is not base64 or does not hold the
    /// activity/placement object, i.e. when it is a raw scope name.
    pub fn decode(name: &str) -> Option<Self> {
        let bytes = SCOPE_ENGINE.decode(name.trim()).ok()?;
        serde_json::from_slice(&bytes).ok()
    }
}

/// A requestable content slot, identified by its wire-form name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DecisionScope {
    name: String,
}

impl DecisionScope {
    /// Create a scope from a raw or pre-encoded name. The name is used verbatim.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Create a scope from an activity/placement pair.
    ///
    /// `item_count` is omitted from the encoding when absent or non-positive.
    pub fn from_activity(
        activity_id: impl Into<String>,
        placement_id: impl Into<String>,
        item_count: Option<i64>,
    ) -> Self {
        Self::new(ScopeTarget::new(activity_id, placement_id, item_count).encode())
    }

    /// The wire-form name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The activity/placement form, if this scope carries one.
    pub fn target(&self) -> Option<ScopeTarget> {
        ScopeTarget::decode(&self.name)
    }

    /// Check that this scope can be sent in a request.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidScope` if:
    /// - The name is empty
    /// - The encoded activity id or placement id is empty
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.name.trim().is_empty() {
            return Err(DomainError::invalid_scope(&self.name, "name is empty"));
        }
        if let Some(target) = self.target() {
            if target.activity_id.trim().is_empty() {
                return Err(DomainError::invalid_scope(&self.name, "activityId is empty"));
            }
            if target.placement_id.trim().is_empty() {
                return Err(DomainError::invalid_scope(
                    &self.name,
                    "placementId is empty",
                ));
            }
        }
        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }
}

impl fmt::Display for DecisionScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

impl From<&str> for DecisionScope {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for DecisionScope {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

impl From<ScopeTarget> for DecisionScope {
    fn from(target: ScopeTarget) -> Self {
        Self::new(target.encode())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    const ACTIVITY: &str = "xcore:offer-activity:1111111111111111";
    const PLACEMENT: &str = "xcore:offer-placement:1111111111111111";
    const ENCODED: &str = "eyJhY3Rpdml0eUlkIjoieGNvcmU6b2ZmZXItYWN0aXZpdHk6MTExMTExMTExMTExMTExMSIsInBsYWNlbWVudElkIjoieGNvcmU6b2ZmZXItcGxhY2VtZW50OjExMTExMTExMTExMTExMTEifQ==";
    const ENCODED_WITH_COUNT: &str = "eyJhY3Rpdml0eUlkIjoieGNvcmU6b2ZmZXItYWN0aXZpdHk6MTExMTExMTExMTExMTExMSIsInBsYWNlbWVudElkIjoieGNvcmU6b2ZmZXItcGxhY2VtZW50OjExMTExMTExMTExMTExMTEiLCJpdGVtQ291bnQiOjMwfQ==";

    #[test]
    fn encodes_activity_and_placement_in_canonical_order() {
        let scope = DecisionScope::from_activity(ACTIVITY, PLACEMENT, None);
        assert_eq!(scope.name(), ENCODED);
    }

    #[test]
    fn encodes_positive_item_count() {
        let scope = DecisionScope::from_activity(ACTIVITY, PLACEMENT, Some(30));
        assert_eq!(scope.name(), ENCODED_WITH_COUNT);
    }

    #[test]
    fn omits_non_positive_item_count() {
        assert_eq!(
            DecisionScope::from_activity(ACTIVITY, PLACEMENT, Some(0)).name(),
            ENCODED
        );
        assert_eq!(
            DecisionScope::from_activity(ACTIVITY, PLACEMENT, Some(-4)).name(),
            ENCODED
        );
    }

    #[test]
    fn decode_recovers_the_encoded_pair() {
        let pairs = [
            ("a", "p"),
            (ACTIVITY, PLACEMENT),
            ("activity with spaces", "placement/with/slashes"),
            ("ünïcødé", "\"quoted\""),
        ];
        for (activity, placement) in pairs {
            let target = DecisionScope::from_activity(activity, placement, None)
                .target()
                .expect("encoded scope should decode");
            assert_eq!(target.activity_id, activity);
            assert_eq!(target.placement_id, placement);
            assert_eq!(target.item_count, None);
        }
    }

    #[test]
    fn decode_accepts_missing_padding() {
        let unpadded = ENCODED.trim_end_matches('=');
        let target = ScopeTarget::decode(unpadded).expect("unpadded scope should decode");
        assert_eq!(target.activity_id, ACTIVITY);
    }

    #[test]
    fn raw_names_are_used_verbatim() {
        let scope = DecisionScope::new("myMbox");
        assert_eq!(scope.name(), "myMbox");
        assert!(scope.target().is_none());
        assert!(scope.is_valid());
    }

    #[test]
    fn encoded_and_pair_scopes_are_interchangeable_keys() {
        let from_pair = DecisionScope::from_activity(ACTIVITY, PLACEMENT, None);
        let from_name = DecisionScope::new(ENCODED);
        assert_eq!(from_pair, from_name);

        let mut set = HashSet::new();
        set.insert(from_pair);
        assert!(set.contains(&from_name));
    }

    #[test]
    fn empty_activity_id_is_invalid() {
        let scope = DecisionScope::from_activity("", PLACEMENT, None);
        assert!(!scope.is_valid());
        assert!(matches!(
            scope.validate(),
            Err(DomainError::InvalidScope { .. })
        ));
    }

    #[test]
    fn empty_placement_id_is_invalid() {
        let scope = DecisionScope::from_activity(ACTIVITY, "", None);
        assert!(!scope.is_valid());
    }

    #[test]
    fn pre_encoded_scope_with_empty_activity_is_invalid() {
        let scope = DecisionScope::new(
            "eyJhY3Rpdml0eUlkIjoiIiwicGxhY2VtZW50SWQiOiJ4Y29yZTpvZmZlci1wbGFjZW1lbnQ6MTExMTExMTExMTExMTExMSJ9",
        );
        assert!(!scope.is_valid());
    }

    #[test]
    fn empty_name_is_invalid() {
        assert!(!DecisionScope::new("").is_valid());
        assert!(!DecisionScope::new("   ").is_valid());
    }

    #[test]
    fn serializes_as_name_object() {
        let json = serde_json::to_value(DecisionScope::new("myMbox")).unwrap();
        assert_eq!(json, serde_json::json!({ "name": "myMbox" }));
    }
}

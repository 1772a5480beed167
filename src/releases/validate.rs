//! Per-item validation of listing entries.
//!
//! Malformed entries are skipped and counted; they never abort a sync.

use super::Release;
use serde_json::Value;
use std::fmt;

/// Why a listing entry was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NotAnObject,
    MissingGroup,
    MissingHash,
    PlaceholderHash,
    MissingPreferred,
    BadTitle,
    BadSize,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            SkipReason::NotAnObject => "entry is not an object",
            SkipReason::MissingGroup => "groupId missing or empty",
            SkipReason::MissingHash => "hash missing or empty",
            SkipReason::PlaceholderHash => "hash is a placeholder",
            SkipReason::MissingPreferred => "preferred missing or not a boolean",
            SkipReason::BadTitle => "title is not a string",
            SkipReason::BadSize => "size is not an unsigned integer",
        };
        f.write_str(reason)
    }
}

/// Validate one listing entry.
///
/// `groupId` and `hash` must be non-empty strings, `hash` must not contain
/// `placeholder`, and `preferred` must be a boolean. `title` and `size` are
/// optional but must have the right type when present.
pub fn classify(item: &Value, placeholder: &str) -> Result<Release, SkipReason> {
    let obj = item.as_object().ok_or(SkipReason::NotAnObject)?;

    let group_id = non_empty_str(obj.get("groupId")).ok_or(SkipReason::MissingGroup)?;
    let hash = non_empty_str(obj.get("hash")).ok_or(SkipReason::MissingHash)?;
    if !placeholder.is_empty() && hash.contains(placeholder) {
        return Err(SkipReason::PlaceholderHash);
    }
    let preferred = obj
        .get("preferred")
        .and_then(Value::as_bool)
        .ok_or(SkipReason::MissingPreferred)?;

    let title = match obj.get("title") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(_) => return Err(SkipReason::BadTitle),
    };
    let size = match obj.get("size") {
        None | Some(Value::Null) => None,
        Some(v) => Some(v.as_u64().ok_or(SkipReason::BadSize)?),
    };

    Ok(Release {
        group_id: group_id.to_string(),
        hash: hash.to_string(),
        title,
        size,
        preferred,
    })
}

fn non_empty_str(value: Option<&Value>) -> Option<&str> {
    value.and_then(Value::as_str).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const PLACEHOLDER: &str = "REDACTED";

    fn valid() -> Value {
        json!({
            "groupId": "tt0111161",
            "hash": "c9e15763f722f23e98a29decdfae341b98d53056",
            "title": "The Shawshank Redemption 1080p",
            "size": 2147483648u64,
            "preferred": true
        })
    }

    #[test]
    fn test_accepts_complete_entry() {
        let release = classify(&valid(), PLACEHOLDER).unwrap();
        assert_eq!(release.group_id, "tt0111161");
        assert_eq!(release.size, Some(2147483648));
        assert!(release.preferred);
    }

    #[test]
    fn test_optional_fields_may_be_absent_or_null() {
        let release = classify(
            &json!({"groupId": "g", "hash": "h", "preferred": false, "title": null}),
            PLACEHOLDER,
        )
        .unwrap();
        assert_eq!(release.title, None);
        assert_eq!(release.size, None);
    }

    #[test]
    fn test_rejects_placeholder_hash() {
        let mut item = valid();
        item["hash"] = json!("xxREDACTEDxx");
        assert_eq!(classify(&item, PLACEHOLDER), Err(SkipReason::PlaceholderHash));
    }

    #[test]
    fn test_rejects_missing_or_empty_hash() {
        let mut item = valid();
        item["hash"] = json!("");
        assert_eq!(classify(&item, PLACEHOLDER), Err(SkipReason::MissingHash));

        item.as_object_mut().unwrap().remove("hash");
        assert_eq!(classify(&item, PLACEHOLDER), Err(SkipReason::MissingHash));

        item["hash"] = json!(42);
        assert_eq!(classify(&item, PLACEHOLDER), Err(SkipReason::MissingHash));
    }

    #[test]
    fn test_rejects_non_boolean_preferred() {
        let mut item = valid();
        item["preferred"] = json!("true");
        assert_eq!(classify(&item, PLACEHOLDER), Err(SkipReason::MissingPreferred));

        item.as_object_mut().unwrap().remove("preferred");
        assert_eq!(classify(&item, PLACEHOLDER), Err(SkipReason::MissingPreferred));
    }

    #[test]
    fn test_rejects_missing_group() {
        let mut item = valid();
        item["groupId"] = json!("");
        assert_eq!(classify(&item, PLACEHOLDER), Err(SkipReason::MissingGroup));
    }

    #[test]
    fn test_rejects_mistyped_optionals() {
        let mut item = valid();
        item["size"] = json!(-1);
        assert_eq!(classify(&item, PLACEHOLDER), Err(SkipReason::BadSize));

        let mut item = valid();
        item["title"] = json!(["a"]);
        assert_eq!(classify(&item, PLACEHOLDER), Err(SkipReason::BadTitle));
    }

    #[test]
    fn test_rejects_non_objects() {
        assert_eq!(classify(&json!("hash"), PLACEHOLDER), Err(SkipReason::NotAnObject));
        assert_eq!(classify(&Value::Null, PLACEHOLDER), Err(SkipReason::NotAnObject));
    }

    #[test]
    fn test_empty_placeholder_disables_the_check() {
        assert!(classify(&valid(), "").is_ok());
    }
}

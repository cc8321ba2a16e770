// id.rs — Changeset id validation and generation.
//
// A changeset id becomes a directory name under the changesets root, so
// every id-accepting operation runs `validate_changeset_id` before touching
// the filesystem. The rules are checked in a fixed order so the error names
// the first rule that failed:
//
// 1. non-empty and not whitespace-only      → InvalidArgument
// 2. no `/`, `\`, or `..`                   → PathTraversal
// 3. none of `< > : " | ? *`                → IllegalCharacter

use serde_json::Value;
use uuid::Uuid;

use crate::error::ChangesetError;

/// Characters that are unsafe in file names on at least one platform.
pub const ILLEGAL_ID_CHARS: [char; 7] = ['<', '>', ':', '"', '|', '?', '*'];

/// Validate a changeset id before it is used as a path component.
pub fn validate_changeset_id(id: &str) -> Result<(), ChangesetError> {
    if id.trim().is_empty() {
        return Err(ChangesetError::InvalidArgument {
            reason: "id must be a non-empty string".to_string(),
        });
    }

    if id.contains('/') || id.contains('\\') || id.contains("..") {
        return Err(ChangesetError::PathTraversal { id: id.to_string() });
    }

    if let Some(character) = id.chars().find(|c| ILLEGAL_ID_CHARS.contains(c)) {
        return Err(ChangesetError::IllegalCharacter {
            id: id.to_string(),
            character,
        });
    }

    // Control characters (NUL, newlines) never belong in a directory name.
    if let Some(character) = id.chars().find(|c| c.is_control()) {
        return Err(ChangesetError::IllegalCharacter {
            id: id.to_string(),
            character,
        });
    }

    Ok(())
}

/// Extract and validate a changeset id from untyped input (JSON payloads,
/// automation requests). Anything other than a string is rejected.
pub fn changeset_id_from_value(value: &Value) -> Result<&str, ChangesetError> {
    let id = match value {
        Value::String(s) => s.as_str(),
        Value::Null => {
            return Err(ChangesetError::InvalidArgument {
                reason: "id is missing".to_string(),
            })
        }
        other => {
            return Err(ChangesetError::InvalidArgument {
                reason: format!("id must be a string, got {}", json_type_name(other)),
            })
        }
    };
    validate_changeset_id(id)?;
    Ok(id)
}

/// Generate a filesystem-safe id from a human name.
///
/// The name is slugified (`"Add Ping API"` → `add-ping-api`) and suffixed
/// with 8 random hex characters so two changesets with the same name get
/// distinct ids.
pub fn generate_changeset_id(name: &str) -> String {
    let mut slug = String::new();
    let mut last_dash = true;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
        if slug.len() >= 40 {
            break;
        }
    }
    let slug = slug.trim_matches('-');
    let suffix = &Uuid::new_v4().simple().to_string()[..8];

    if slug.is_empty() {
        format!("changeset-{}", suffix)
    } else {
        format!("{}-{}", slug, suffix)
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_ordinary_ids() {
        for id in ["demo", "add-ping-api-1a2b3c4d", "c1", "with space", "v1.2"] {
            assert!(validate_changeset_id(id).is_ok(), "{id} should be valid");
        }
    }

    #[test]
    fn rejects_empty_and_whitespace() {
        for id in ["", "   ", "\t"] {
            assert!(matches!(
                validate_changeset_id(id),
                Err(ChangesetError::InvalidArgument { .. })
            ));
        }
    }

    #[test]
    fn rejects_path_traversal() {
        for id in ["../../etc/passwd", "a/b", "a\\b", "..", "x..y"] {
            assert!(
                matches!(
                    validate_changeset_id(id),
                    Err(ChangesetError::PathTraversal { .. })
                ),
                "{id} should be a traversal"
            );
        }
    }

    #[test]
    fn rejects_illegal_characters() {
        for (id, expected) in [("a|b", '|'), ("a<b", '<'), ("x:y", ':'), ("q?", '?'), ("*", '*')] {
            match validate_changeset_id(id) {
                Err(ChangesetError::IllegalCharacter { character, .. }) => {
                    assert_eq!(character, expected)
                }
                other => panic!("{id}: expected IllegalCharacter, got {:?}", other),
            }
        }
        assert!(matches!(
            validate_changeset_id("a\0b"),
            Err(ChangesetError::IllegalCharacter { .. })
        ));
    }

    #[test]
    fn non_string_values_rejected() {
        for value in [json!(null), json!(12345), json!(true), json!(["a"]), json!({})] {
            assert!(matches!(
                changeset_id_from_value(&value),
                Err(ChangesetError::InvalidArgument { .. })
            ));
        }
        assert!(matches!(
            changeset_id_from_value(&json!("../../etc/passwd")),
            Err(ChangesetError::PathTraversal { .. })
        ));
        assert_eq!(changeset_id_from_value(&json!("demo")).unwrap(), "demo");
    }

    #[test]
    fn generated_ids_are_valid_and_distinct() {
        let a = generate_changeset_id("Add Ping API!");
        let b = generate_changeset_id("Add Ping API!");
        assert!(a.starts_with("add-ping-api-"));
        assert_ne!(a, b);
        validate_changeset_id(&a).unwrap();

        let weird = generate_changeset_id("../<>|");
        assert!(weird.starts_with("changeset-"));
        validate_changeset_id(&weird).unwrap();
    }
}

//! Annotation fixtures and wire body helpers.
//!
//! Provides convenience builders for the annotations and form values used
//! across engine and server tests.

use confirmsync_protocol::{FieldAnnotation, LastSelected};

/// Field names of the sample site form.
pub const SAMPLE_FIELDS: [&str; 5] = ["website", "phone", "email", "address", "opening_hours"];

/// Builds an annotation with the given flags and a derived `last_selected`.
pub fn annotation(
    field_name: &str,
    is_pre_filled: bool,
    is_confirmed: bool,
    is_new_data: bool,
) -> FieldAnnotation {
    FieldAnnotation {
        field_name: field_name.to_string(),
        is_pre_filled,
        is_confirmed,
        is_new_data,
        last_selected: LastSelected::None,
    }
    .normalized()
}

/// Builds a confirmed, pre-filled annotation.
pub fn confirmed(field_name: &str) -> FieldAnnotation {
    annotation(field_name, true, true, false)
}

/// Builds a pre-filled annotation marked as new data.
pub fn new_data(field_name: &str) -> FieldAnnotation {
    annotation(field_name, true, false, true)
}

/// Returns sample form values, one per [`SAMPLE_FIELDS`] entry.
///
/// Every second value is blank so auto-marking can be checked against
/// fields that must stay untouched.
pub fn sample_form_values() -> Vec<(String, String)> {
    SAMPLE_FIELDS
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let value = if i % 2 == 0 {
                format!("value of {}", name)
            } else {
                "  ".to_string()
            };
            (name.to_string(), value)
        })
        .collect()
}

/// Builds a fetch response body in the object form.
pub fn fetch_body(annotations: &[FieldAnnotation]) -> Vec<u8> {
    serde_json::json!({ "annotations": annotations }).to_string().into_bytes()
}

/// Builds a fetch response body in the bare array form.
pub fn fetch_body_bare(annotations: &[FieldAnnotation]) -> Vec<u8> {
    serde_json::json!(annotations).to_string().into_bytes()
}

/// Builds a bulk update response body that only carries a count.
pub fn bulk_count_body(updated_count: u64) -> Vec<u8> {
    serde_json::json!({ "updatedCount": updated_count })
        .to_string()
        .into_bytes()
}

/// Asserts the flag invariants of an annotation.
///
/// # Panics
///
/// Panics when `is_confirmed` and `is_new_data` are both set, or when
/// `last_selected` names a flag that is not set.
pub fn assert_consistent(annotation: &FieldAnnotation) {
    assert!(
        !(annotation.is_confirmed && annotation.is_new_data),
        "confirmed and new_data both set on {:?}",
        annotation
    );
    if let Some(flag) = annotation.last_selected.flag() {
        assert!(
            annotation.flag(flag),
            "last_selected {:?} is not set on {:?}",
            annotation.last_selected,
            annotation
        );
    }
}

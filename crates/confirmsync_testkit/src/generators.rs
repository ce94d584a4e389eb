//! Property-based test generators using proptest.
//!
//! Provides strategies for generating annotations and click sequences.

use confirmsync_protocol::{FieldAnnotation, FlagName};
use proptest::prelude::*;

use crate::fixtures::SAMPLE_FIELDS;

/// One user click on a flag checkbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Click {
    /// Field the checkbox belongs to.
    pub field_name: String,
    /// Checkbox that was clicked.
    pub flag: FlagName,
}

/// Strategy for generating flag names.
pub fn flag_strategy() -> impl Strategy<Value = FlagName> {
    prop::sample::select(FlagName::ALL.to_vec())
}

/// Strategy for generating field names from the sample form.
pub fn field_name_strategy() -> impl Strategy<Value = String> {
    prop::sample::select(SAMPLE_FIELDS.to_vec()).prop_map(str::to_string)
}

/// Strategy for generating arbitrary field names.
pub fn any_field_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9_]{0,23}").expect("Invalid regex")
}

/// Strategy for generating consistent annotations.
pub fn annotation_strategy() -> impl Strategy<Value = FieldAnnotation> {
    (
        field_name_strategy(),
        any::<bool>(),
        prop_oneof![Just((false, false)), Just((true, false)), Just((false, true))],
    )
        .prop_map(|(name, pre_filled, (confirmed, new_data))| {
            crate::fixtures::annotation(&name, pre_filled, confirmed, new_data)
        })
}

/// Strategy for generating a click.
pub fn click_strategy() -> impl Strategy<Value = Click> {
    (field_name_strategy(), flag_strategy())
        .prop_map(|(field_name, flag)| Click { field_name, flag })
}

/// Strategy for generating a sequence of clicks.
pub fn click_sequence_strategy(max_len: usize) -> impl Strategy<Value = Vec<Click>> {
    prop::collection::vec(click_strategy(), 0..=max_len)
}

//! Field annotations and the review rules that mutate them.

use crate::error::ProtocolError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One of the three review flags a reviewer can click.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagName {
    /// The value was already present before review began.
    PreFilled,
    /// A reviewer affirmed the current value is correct.
    Confirmed,
    /// A reviewer affirmed the current value is newly supplied or corrected.
    NewData,
}

impl FlagName {
    /// All flags, in display order.
    pub const ALL: [FlagName; 3] = [FlagName::PreFilled, FlagName::Confirmed, FlagName::NewData];

    /// Returns the canonical wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            FlagName::PreFilled => "pre_filled",
            FlagName::Confirmed => "confirmed",
            FlagName::NewData => "new_data",
        }
    }

    /// Returns the other half of the mutually exclusive pair, if any.
    pub fn exclusive_partner(&self) -> Option<FlagName> {
        match self {
            FlagName::PreFilled => None,
            FlagName::Confirmed => Some(FlagName::NewData),
            FlagName::NewData => Some(FlagName::Confirmed),
        }
    }
}

impl fmt::Display for FlagName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FlagName {
    type Err = ProtocolError;

    /// Accepts snake_case, camelCase, kebab-case and run-together spellings.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let folded: String = s
            .trim()
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .flat_map(char::to_lowercase)
            .collect();

        match folded.as_str() {
            "prefilled" => Ok(FlagName::PreFilled),
            "confirmed" => Ok(FlagName::Confirmed),
            "newdata" => Ok(FlagName::NewData),
            _ => Err(ProtocolError::UnknownFlag(s.to_string())),
        }
    }
}

/// Which flag was set most recently; drives the single display state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LastSelected {
    /// `is_pre_filled` was set last.
    PreFilled,
    /// `is_confirmed` was set last.
    Confirmed,
    /// `is_new_data` was set last.
    NewData,
    /// No flag is set.
    #[default]
    None,
}

impl LastSelected {
    /// Returns the flag this selection names, or `None` for [`LastSelected::None`].
    pub fn flag(&self) -> Option<FlagName> {
        match self {
            LastSelected::PreFilled => Some(FlagName::PreFilled),
            LastSelected::Confirmed => Some(FlagName::Confirmed),
            LastSelected::NewData => Some(FlagName::NewData),
            LastSelected::None => None,
        }
    }
}

impl From<FlagName> for LastSelected {
    fn from(flag: FlagName) -> Self {
        match flag {
            FlagName::PreFilled => LastSelected::PreFilled,
            FlagName::Confirmed => LastSelected::Confirmed,
            FlagName::NewData => LastSelected::NewData,
        }
    }
}

/// Review state of a single form field of a site.
///
/// # Invariants
///
/// - `is_confirmed` and `is_new_data` are mutually exclusive
/// - `is_pre_filled` never goes from true to false through [`FieldAnnotation::toggle`]
/// - `last_selected` names a flag that is currently true, or is `None`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldAnnotation {
    /// Field identifier, unique within a site.
    pub field_name: String,
    /// The value was present before review began.
    #[serde(default)]
    pub is_pre_filled: bool,
    /// The value was affirmed as correct.
    #[serde(default)]
    pub is_confirmed: bool,
    /// The value was affirmed as newly supplied.
    #[serde(default)]
    pub is_new_data: bool,
    /// Most recently set flag.
    #[serde(default)]
    pub last_selected: LastSelected,
}

impl FieldAnnotation {
    /// Creates an annotation with no flags set.
    pub fn new(field_name: impl Into<String>) -> Self {
        Self {
            field_name: field_name.into(),
            is_pre_filled: false,
            is_confirmed: false,
            is_new_data: false,
            last_selected: LastSelected::None,
        }
    }

    /// Creates an annotation marked as pre-filled.
    pub fn pre_filled(field_name: impl Into<String>) -> Self {
        Self {
            is_pre_filled: true,
            last_selected: LastSelected::PreFilled,
            ..Self::new(field_name)
        }
    }

    /// Returns the value of a flag.
    pub fn flag(&self, flag: FlagName) -> bool {
        match flag {
            FlagName::PreFilled => self.is_pre_filled,
            FlagName::Confirmed => self.is_confirmed,
            FlagName::NewData => self.is_new_data,
        }
    }

    fn set_flag(&mut self, flag: FlagName, value: bool) {
        match flag {
            FlagName::PreFilled => self.is_pre_filled = value,
            FlagName::Confirmed => self.is_confirmed = value,
            FlagName::NewData => self.is_new_data = value,
        }
    }

    /// Returns true if no flag is set.
    pub fn is_unset(&self) -> bool {
        !self.is_pre_filled && !self.is_confirmed && !self.is_new_data
    }

    /// Picks the selection by priority: confirmed, new data, pre-filled, none.
    pub fn resolve_last_selected(&self) -> LastSelected {
        if self.is_confirmed {
            LastSelected::Confirmed
        } else if self.is_new_data {
            LastSelected::NewData
        } else if self.is_pre_filled {
            LastSelected::PreFilled
        } else {
            LastSelected::None
        }
    }

    /// Returns true if all invariants hold.
    pub fn is_consistent(&self) -> bool {
        if self.is_confirmed && self.is_new_data {
            return false;
        }
        match self.last_selected.flag() {
            Some(flag) => self.flag(flag),
            None => self.is_unset(),
        }
    }

    /// Repairs a record received from elsewhere so the invariants hold.
    ///
    /// When both exclusive flags are set, the one named by `last_selected`
    /// survives (`confirmed` otherwise). A `last_selected` naming a cleared
    /// flag is recomputed by priority.
    pub fn normalized(mut self) -> Self {
        if self.is_confirmed && self.is_new_data {
            if self.last_selected == LastSelected::NewData {
                self.is_confirmed = false;
            } else {
                self.is_new_data = false;
            }
        }
        if !self.is_consistent() {
            self.last_selected = self.resolve_last_selected();
        }
        self
    }

    /// Applies a reviewer click on `flag` and returns the outcome.
    ///
    /// Unchecking `pre_filled` is rejected and leaves the annotation as is.
    pub fn toggle(&self, flag: FlagName) -> ToggleOutcome {
        let mut next = self.clone();

        if self.flag(flag) {
            if flag == FlagName::PreFilled {
                return ToggleOutcome::Rejected(next);
            }
            next.set_flag(flag, false);
            next.last_selected = next.resolve_last_selected();
        } else {
            next.set_flag(flag, true);
            if let Some(partner) = flag.exclusive_partner() {
                next.set_flag(partner, false);
            }
            next.last_selected = flag.into();
        }

        ToggleOutcome::Applied(next)
    }

    /// Returns the pre-filled version of this annotation if no flag is set yet.
    pub fn mark_pre_filled_if_unset(&self) -> Option<FieldAnnotation> {
        if !self.is_unset() {
            return None;
        }
        Some(Self::pre_filled(self.field_name.clone()))
    }
}

/// Result of [`FieldAnnotation::toggle`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToggleOutcome {
    /// The click changed the annotation; carries the new state.
    Applied(FieldAnnotation),
    /// The click tried to clear `pre_filled`; carries the unchanged state.
    Rejected(FieldAnnotation),
}

impl ToggleOutcome {
    /// Returns the annotation carried by either variant.
    pub fn annotation(&self) -> &FieldAnnotation {
        match self {
            ToggleOutcome::Applied(a) | ToggleOutcome::Rejected(a) => a,
        }
    }

    /// Consumes the outcome, returning the annotation.
    pub fn into_annotation(self) -> FieldAnnotation {
        match self {
            ToggleOutcome::Applied(a) | ToggleOutcome::Rejected(a) => a,
        }
    }

    /// Returns true if the click was applied.
    pub fn is_applied(&self) -> bool {
        matches!(self, ToggleOutcome::Applied(_))
    }

    /// Returns true if the click was rejected.
    pub fn is_rejected(&self) -> bool {
        matches!(self, ToggleOutcome::Rejected(_))
    }
}

//! Browser-form protocol: detect → fill → snapshot → confirm.
//!
//! Everything here runs against the opaque [`Page`] capability so the
//! concrete browser backend (and the simulated page used in tests) stays
//! swappable.

pub mod confirm;
pub mod detector;
pub mod filler;
pub mod page;
pub mod snapshot;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub use confirm::{Confirmation, ConfirmationSignal, detect_confirmation};
pub use detector::{FieldKind, FormField, SelectOption, detect_fields};
pub use filler::{FillData, fill_form};
pub use page::{ElementInfo, Page, PageFactory, RouteAction, Wait};
pub use snapshot::{FieldMismatch, FormSnapshot, refill_fast, serialize_fields, take_snapshot, verify_fields};

/// A serialized form field value. Checkboxes and radios snapshot as flags,
/// everything else as text; file inputs carry the uploaded source path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Flag(bool),
    Text(String),
}

impl FieldValue {
    /// Trimmed string form used for replay-mismatch comparison.
    pub fn as_comparable(&self) -> String {
        match self {
            FieldValue::Flag(b) => b.to_string(),
            FieldValue::Text(s) => s.trim().to_string(),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, FieldValue::Text(s) if s.is_empty())
    }
}

/// `ref → value` mapping persisted verbatim before human review.
pub type SnapshotFields = BTreeMap<String, FieldValue>;

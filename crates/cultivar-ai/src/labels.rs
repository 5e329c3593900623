//! Human-readable names for the model's class ids.

use crate::adapter::ClassId;

/// Fixed lookup table: model output → cultivar name.
pub const CLASS_LABELS: [(ClassId, &str); 3] =
    [(0, "Cultivar A"), (1, "Cultivar B"), (2, "Cultivar C")];

/// Name for a class id, if the id is known.
pub fn class_name(id: ClassId) -> Option<&'static str> {
    CLASS_LABELS
        .iter()
        .find(|(known, _)| *known == id)
        .map(|(_, name)| *name)
}

/// All class names in class-id order.
pub fn names() -> impl Iterator<Item = &'static str> {
    CLASS_LABELS.iter().map(|(_, name)| *name)
}

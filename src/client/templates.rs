//! Fixed zero-shot template set.
//!
//! One system instruction per subject. Adapters resolve the configured
//! subject at construction time, so an unknown key fails before any
//! request exists.

use crate::models::{FewshotError, Result};

/// The fixed (subject, instruction) template set.
const ZERO_SHOT_TEMPLATES: &[(&str, &str)] = &[(
    "chemistry",
    "You are an expert in the synthesis of nanomaterials. You analyze the conditions \
     for obtaining a nanomaterial and predict what particle shapes will be present \
     in the synthesized material. There are five particle shapes: 'Cube', 'Stick', \
     'Sphere', 'Flat' and 'Amorphous'. A nanomaterial can contain particles \
     of different shapes. If you cannot say exactly what it is, \
     list the forms that have the highest probability in those conditions.",
)];

/// Resolve a template key to its system instruction.
pub fn zero_shot_template(subject: &str) -> Result<&'static str> {
    ZERO_SHOT_TEMPLATES
        .iter()
        .find(|(key, _)| *key == subject)
        .map(|(_, text)| *text)
        .ok_or_else(|| FewshotError::Template {
            template: subject.to_string(),
            available: ZERO_SHOT_TEMPLATES
                .iter()
                .map(|(key, _)| *key)
                .collect::<Vec<_>>()
                .join(", "),
        })
}

// SPDX-FileCopyrightText: 2026 BrainSurgeon Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Path-component validation for agent and session ids.

use brainsurgeon_core::BrainsurgeonError;

/// Accept ids made of ASCII letters, digits, `_` and `-` only.
///
/// Ids become directory names, so anything that could escape the root
/// (`..`, separators, NUL) is rejected before a path is built.
pub fn validate_id(kind: &str, value: &str) -> Result<(), BrainsurgeonError> {
    if value.is_empty() {
        return Err(BrainsurgeonError::Validation(format!("{kind} must not be empty")));
    }
    if let Some(bad) = value
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '-'))
    {
        return Err(BrainsurgeonError::Validation(format!(
            "{kind} contains invalid character {bad:?}: {value}"
        )));
    }
    Ok(())
}

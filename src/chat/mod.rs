//! Typed chat protocol.
//!
//! The conversational agent mutates pipeline state only through this
//! discriminated contract, carried in the chat reply's `protocol` field.
//! Payloads are validated by serde at the boundary; an unknown action is a
//! deserialization error, never a silent no-op.

use crate::session::ProductDataPatch;
use serde::{Deserialize, Serialize};

/// A machine-readable directive from the chat agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", content = "data")]
pub enum ChatDirective {
    /// Patch the discovered product DNA
    #[serde(rename = "UPDATE_DNA")]
    UpdateDna(ProductDataPatch),
    /// Attach edit instructions to one landing section
    #[serde(rename = "UPDATE_SECTION")]
    UpdateSection {
        #[serde(rename = "sectionId")]
        section_id: String,
        #[serde(rename = "extraInstructions")]
        extra_instructions: String,
    },
    /// Re-run landing design for the currently selected creative path
    #[serde(rename = "REGENERATE_STRUCTURE")]
    RegenerateStructure,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_update_dna() {
        let directive: ChatDirective = serde_json::from_str(
            r#"{"action": "UPDATE_DNA", "data": {"angle": "Now in walnut"}}"#,
        )
        .unwrap();
        match directive {
            ChatDirective::UpdateDna(patch) => {
                assert_eq!(patch.angle.as_deref(), Some("Now in walnut"));
                assert!(patch.name.is_none());
            }
            other => panic!("unexpected directive: {:?}", other),
        }
    }

    #[test]
    fn parses_update_section() {
        let directive: ChatDirective = serde_json::from_str(
            r#"{"action": "UPDATE_SECTION", "data": {"sectionId": "hero", "extraInstructions": "less text"}}"#,
        )
        .unwrap();
        assert_eq!(
            directive,
            ChatDirective::UpdateSection {
                section_id: "hero".to_string(),
                extra_instructions: "less text".to_string(),
            }
        );
    }

    #[test]
    fn parses_regenerate_structure_without_payload() {
        let directive: ChatDirective =
            serde_json::from_str(r#"{"action": "REGENERATE_STRUCTURE"}"#).unwrap();
        assert_eq!(directive, ChatDirective::RegenerateStructure);
    }

    #[test]
    fn unknown_action_is_rejected() {
        let result: Result<ChatDirective, _> =
            serde_json::from_str(r#"{"action": "DELETE_EVERYTHING"}"#);
        assert!(result.is_err());
    }
}

//! Tool definitions the handler exposes to the model, and the decoder
//! that turns a tool call back into an [`EditCommand`].
//!
//! Tool names are the serde tags of `EditCommand`, so decoding is just
//! injecting the name as the `op` field and deserializing. Anything the
//! model invents that is not one of these four operations fails to
//! decode and is reported back as a tool error.

use anyhow::{Context, Result};
use score::EditCommand;
use serde_json::{json, Value};

use crate::provider::ToolDef;

fn note_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "pitch": {
                "type": "integer",
                "minimum": 0,
                "maximum": 127,
                "description": "MIDI pitch number"
            },
            "beat": {
                "type": "number",
                "minimum": 0,
                "description": "Onset in quarter-note beats from the start of the measure"
            },
            "duration": {
                "type": "number",
                "exclusiveMinimum": 0,
                "description": "Length in quarter-note beats"
            },
            "velocity": {
                "type": "integer",
                "minimum": 1,
                "maximum": 127,
                "description": "Optional MIDI velocity, default 80"
            }
        },
        "required": ["pitch", "beat", "duration"]
    })
}

fn tool(name: &str, description: &str, parameters: Value) -> ToolDef {
    ToolDef {
        name: name.to_string(),
        description: description.to_string(),
        parameters,
    }
}

fn add_notes() -> ToolDef {
    tool(
        "add_notes",
        "Add notes to a measure. Using the current measure count as the \
         index appends one new empty measure first.",
        json!({
            "type": "object",
            "properties": {
                "measure": {
                    "type": "integer",
                    "minimum": 0,
                    "description": "Zero-based measure index"
                },
                "notes": {
                    "type": "array",
                    "items": note_schema(),
                    "description": "Notes to insert"
                }
            },
            "required": ["measure", "notes"]
        }),
    )
}

fn remove_notes() -> ToolDef {
    tool(
        "remove_notes",
        "Remove notes from a measure by their zero-based indices within \
         that measure.",
        json!({
            "type": "object",
            "properties": {
                "measure": {
                    "type": "integer",
                    "minimum": 0,
                    "description": "Zero-based measure index"
                },
                "indices": {
                    "type": "array",
                    "items": { "type": "integer", "minimum": 0 },
                    "description": "Note indices to delete"
                }
            },
            "required": ["measure", "indices"]
        }),
    )
}

fn edit_note() -> ToolDef {
    tool(
        "edit_note",
        "Change one note in place. Only the fields given are updated.",
        json!({
            "type": "object",
            "properties": {
                "measure": {
                    "type": "integer",
                    "minimum": 0,
                    "description": "Zero-based measure index"
                },
                "index": {
                    "type": "integer",
                    "minimum": 0,
                    "description": "Zero-based note index within the measure"
                },
                "pitch": { "type": "integer", "minimum": 0, "maximum": 127 },
                "beat": { "type": "number", "minimum": 0 },
                "duration": { "type": "number", "exclusiveMinimum": 0 },
                "velocity": { "type": "integer", "minimum": 1, "maximum": 127 }
            },
            "required": ["measure", "index"]
        }),
    )
}

fn replace_measure() -> ToolDef {
    tool(
        "replace_measure",
        "Replace the entire contents of an existing measure with the \
         given notes.",
        json!({
            "type": "object",
            "properties": {
                "measure": {
                    "type": "integer",
                    "minimum": 0,
                    "description": "Zero-based measure index"
                },
                "notes": {
                    "type": "array",
                    "items": note_schema(),
                    "description": "Replacement notes"
                }
            },
            "required": ["measure", "notes"]
        }),
    )
}

/// Tools available while composing new measures.
pub fn composer_toolset() -> Vec<ToolDef> {
    vec![add_notes(), remove_notes(), edit_note()]
}

/// Tools available while applying reviewer corrections. Adds wholesale
/// measure replacement on top of the composer set.
pub fn reviewer_toolset() -> Vec<ToolDef> {
    vec![add_notes(), remove_notes(), edit_note(), replace_measure()]
}

/// Turn a tool call into an edit command.
pub fn decode(name: &str, arguments: &str) -> Result<EditCommand> {
    let mut value: Value = serde_json::from_str(arguments)
        .with_context(|| format!("arguments for {name} are not valid JSON"))?;
    let Some(object) = value.as_object_mut() else {
        anyhow::bail!("arguments for {name} must be a JSON object");
    };
    object.insert("op".to_string(), Value::String(name.to_string()));
    serde_json::from_value(value).with_context(|| format!("no such edit operation: {name}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn composer_toolset_has_no_replace() {
        let names: Vec<String> = composer_toolset().into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["add_notes", "remove_notes", "edit_note"]);
    }

    #[test]
    fn reviewer_toolset_adds_replace() {
        let names: Vec<String> = reviewer_toolset().into_iter().map(|t| t.name).collect();
        assert_eq!(
            names,
            vec!["add_notes", "remove_notes", "edit_note", "replace_measure"]
        );
    }

    #[test]
    fn decodes_add_notes_call() {
        let command = decode(
            "add_notes",
            r#"{"measure": 4, "notes": [{"pitch": 60, "beat": 0.0, "duration": 1.0}]}"#,
        )
        .unwrap();
        let EditCommand::AddNotes { measure, notes } = command else {
            panic!("expected add_notes");
        };
        assert_eq!(measure, 4);
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].pitch, 60);
        assert_eq!(notes[0].velocity, None);
    }

    #[test]
    fn decodes_partial_edit_note() {
        let command = decode("edit_note", r#"{"measure": 2, "index": 1, "velocity": 40}"#).unwrap();
        let EditCommand::EditNote {
            measure,
            index,
            pitch,
            velocity,
            ..
        } = command
        else {
            panic!("expected edit_note");
        };
        assert_eq!((measure, index), (2, 1));
        assert_eq!(pitch, None);
        assert_eq!(velocity, Some(40));
    }

    #[test]
    fn rejects_unknown_tool_name() {
        let err = decode("transpose_piece", r#"{"semitones": 2}"#).unwrap_err();
        assert!(err.to_string().contains("transpose_piece"));
    }

    #[test]
    fn rejects_non_object_arguments() {
        assert!(decode("add_notes", "[1, 2, 3]").is_err());
        assert!(decode("add_notes", "not json").is_err());
    }
}

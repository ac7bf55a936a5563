//! Conversion instruction construction.
//!
//! One template, filled with the source text and the serialized target
//! schema. The same instruction is reused unchanged on every retry attempt.

use crate::schema::Schema;

/// Template for the conversion instruction sent to the collaborator.
pub const CONVERSION_PROMPT: &str = r"Convert the text below into a single JSON value that conforms exactly to the given JSON schema.
Respond with ONLY the JSON value - no surrounding prose, no markdown code fences.

Schema:
--------------
{schema}
--------------
Text:
--------------
{text}
--------------";

/// Build the conversion instruction for one (text, schema) pair.
///
/// # Example
///
/// ```
/// use refinery::prompts::conversion_instruction;
/// use refinery::schema::Schema;
///
/// let instruction = conversion_instruction("Alice, 30", &Schema::string());
/// assert!(instruction.contains("Alice, 30"));
/// assert!(instruction.contains(r#""type":"STRING""#));
/// ```
#[must_use]
pub fn conversion_instruction(text: &str, schema: &Schema) -> String {
    let schema_json = schema.to_value().to_string();
    let mut instruction =
        String::with_capacity(CONVERSION_PROMPT.len() + schema_json.len() + text.len());

    // One pass over the template only: substituted content is appended
    // verbatim, so placeholder-shaped fragments inside the schema rendering
    // or the source text stay literal.
    let mut rest = CONVERSION_PROMPT;
    for (placeholder, value) in [("{schema}", schema_json.as_str()), ("{text}", text)] {
        if let Some((head, tail)) = rest.split_once(placeholder) {
            instruction.push_str(head);
            instruction.push_str(value);
            rest = tail;
        }
    }
    instruction.push_str(rest);
    instruction
}

//! Modeling-prompt composition.

use tb_domain::Tag;

const HEADER: [&str; 3] = [
    "You are analyzing OPC UA tag data for an industrial system.",
    "The following tags are available:",
    "",
];

const CLOSING: &str =
    "Generate a structured model (e.g., JSON schema or UNS layout) that represents these tags logically.";

/// Render the prompt for `tags`, one bullet per tag in input order.
pub fn compose<'a, I>(tags: I) -> String
where
    I: IntoIterator<Item = &'a Tag>,
{
    let mut lines: Vec<String> = HEADER.iter().map(|line| (*line).to_owned()).collect();
    lines.extend(
        tags.into_iter()
            .map(|tag| format!("- {} ({}) [{}]", tag.browse_path, tag.data_type, tag.node_id)),
    );
    lines.push(String::new());
    lines.push(CLOSING.to_owned());
    lines.join("\n")
}

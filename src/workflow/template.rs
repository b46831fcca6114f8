//! Placeholder Detection and Substitution
//!
//! Step commands may contain `{{identifier}}` placeholders where the
//! identifier matches `[A-Za-z0-9_-]+`. Anything else, including braces
//! with whitespace inside, is plain text.
//!
//! Resolution is soft: a placeholder without a usable value renders as
//! `<identifier>` so previews work with incomplete input. Blocking a run on
//! missing values is the caller's job, see [`get_missing_params`].

use std::collections::BTreeSet;

use crate::workflow::{ParameterMap, Step};

/// A piece of a command template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment<'a> {
    Text(&'a str),
    Placeholder(&'a str),
}

fn is_identifier_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_' || ch == '-'
}

/// Tries to read a placeholder at the start of `rest`.
///
/// Returns the identifier and the number of bytes consumed.
fn read_placeholder(rest: &str) -> Option<(&str, usize)> {
    let body = rest.strip_prefix("{{")?;
    let len = body
        .find(|ch: char| !is_identifier_char(ch))
        .unwrap_or(body.len());

    if len == 0 || !body[len..].starts_with("}}") {
        return None;
    }

    Some((&body[..len], len + 4))
}

/// Splits a template into text and placeholder segments.
///
/// # Example
/// ```
/// use stepgate::workflow::template::{segments, Segment};
///
/// let parts = segments("git push {{remote}} main");
/// assert_eq!(
///     parts,
///     vec![
///         Segment::Text("git push "),
///         Segment::Placeholder("remote"),
///         Segment::Text(" main"),
///     ]
/// );
/// ```
pub fn segments(template: &str) -> Vec<Segment<'_>> {
    let mut parts = Vec::new();
    let mut text_start = 0;
    let mut pos = 0;

    while pos < template.len() {
        match read_placeholder(&template[pos..]) {
            Some((name, consumed)) => {
                if text_start < pos {
                    parts.push(Segment::Text(&template[text_start..pos]));
                }
                parts.push(Segment::Placeholder(name));
                pos += consumed;
                text_start = pos;
            }
            None => {
                pos += template[pos..].chars().next().map_or(1, char::len_utf8);
            }
        }
    }

    if text_start < template.len() {
        parts.push(Segment::Text(&template[text_start..]));
    }

    parts
}

/// Extracts placeholder names from a single template, in order of appearance.
pub fn placeholder_names(template: &str) -> Vec<String> {
    segments(template)
        .into_iter()
        .filter_map(|segment| match segment {
            Segment::Placeholder(name) => Some(name.to_string()),
            Segment::Text(_) => None,
        })
        .collect()
}

/// Checks if a string contains at least one placeholder.
pub fn has_placeholders(text: &str) -> bool {
    segments(text)
        .iter()
        .any(|segment| matches!(segment, Segment::Placeholder(_)))
}

/// Collects the parameter keys used by a set of steps.
///
/// Only `command` is scanned. The result is de-duplicated and sorted.
///
/// # Example
/// ```
/// use stepgate::workflow::Step;
/// use stepgate::workflow::template::extract_param_keys;
///
/// let steps = vec![
///     Step::new("a", "git checkout {{branch}}"),
///     Step::new("b", "git push {{remote}} {{branch}}"),
/// ];
/// assert_eq!(extract_param_keys(&steps), vec!["branch", "remote"]);
/// ```
pub fn extract_param_keys(steps: &[Step]) -> Vec<String> {
    let keys: BTreeSet<String> = steps
        .iter()
        .flat_map(|step| placeholder_names(&step.command))
        .collect();

    keys.into_iter().collect()
}

/// Returns the trimmed value for `key` if it is present and non-blank.
fn usable_value<'a>(values: &'a ParameterMap, key: &str) -> Option<&'a str> {
    values
        .get(key)
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
}

/// Substitutes every placeholder in `command`.
///
/// Missing or blank values render as `<key>`.
pub fn resolve_command(command: &str, values: &ParameterMap) -> String {
    let mut resolved = String::with_capacity(command.len());

    for segment in segments(command) {
        match segment {
            Segment::Text(text) => resolved.push_str(text),
            Segment::Placeholder(key) => match usable_value(values, key) {
                Some(value) => resolved.push_str(value),
                None => {
                    resolved.push('<');
                    resolved.push_str(key);
                    resolved.push('>');
                }
            },
        }
    }

    resolved
}

/// Returns the keys that have no usable value, preserving the order of `keys`.
pub fn get_missing_params(keys: &[String], values: &ParameterMap) -> Vec<String> {
    keys.iter()
        .filter(|key| usable_value(values, key).is_none())
        .cloned()
        .collect()
}

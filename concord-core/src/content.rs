//! Conversion between text and unit sequences.
//!
//! Line units keep their `\n` terminator so `join(split(text))` reproduces the
//! text byte for byte, including a missing final newline.

use serde::{Deserialize, Serialize};

/// How text is cut into units before diffing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    /// One unit per line, terminator included
    #[default]
    Line,
    /// One unit per Unicode scalar value
    Char,
}

/// Split `text` into units.
pub fn split(text: &str, granularity: Granularity) -> Vec<String> {
    match granularity {
        Granularity::Line => text.split_inclusive('\n').map(String::from).collect(),
        Granularity::Char => text.chars().map(String::from).collect(),
    }
}

/// Concatenate units back into text.
pub fn join<S: AsRef<str>>(units: &[S]) -> String {
    let mut text = String::with_capacity(units.iter().map(|u| u.as_ref().len()).sum());
    for unit in units {
        text.push_str(unit.as_ref());
    }
    text
}

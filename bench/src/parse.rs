//! Compact textual graph format: `AB5, BC4, CD8`.
//!
//! Each entry is a source name, a destination name (one character each) and
//! an integer weight. Entries are comma separated; whitespace around them and
//! a leading `Graph:` label are ignored.

use route_search_core::Weight;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("graph description is empty")]
    Empty,

    #[error("entry {index} ({entry:?}) needs two node names and a weight")]
    Truncated { index: usize, entry: String },

    #[error("entry {index} ({entry:?}) has an invalid weight")]
    BadWeight { index: usize, entry: String },
}

pub fn parse_graph(input: &str) -> Result<Vec<(char, char, Weight)>, ParseError> {
    let body = input.trim();
    let body = body.strip_prefix("Graph:").unwrap_or(body).trim();
    if body.is_empty() {
        return Err(ParseError::Empty);
    }

    body.split(',')
        .map(str::trim)
        .enumerate()
        .map(|(index, entry)| {
            let mut chars = entry.chars();
            let (Some(from), Some(to)) = (chars.next(), chars.next()) else {
                return Err(ParseError::Truncated {
                    index,
                    entry: entry.to_string(),
                });
            };
            let weight = chars.as_str().trim().parse().map_err(|_| ParseError::BadWeight {
                index,
                entry: entry.to_string(),
            })?;
            Ok((from, to, weight))
        })
        .collect()
}

//! Extraction of [`EditBlock`]s from free-form model output.
//!
//! Marker lines are matched as literal strings anchored at the start of a line;
//! the text between them is captured non-greedily so a response with several
//! blocks never merges two of them into one.

use regex::Regex;
use std::ops::Range;
use std::sync::LazyLock;

use crate::types::{EditBlock, EditProposal, ParseError};

pub const FILE_HEADER: &str = "FILE:";
pub const SEARCH_MARKER: &str = "<<<<<<< SEARCH";
pub const SEPARATOR_MARKER: &str = "=======";
pub const REPLACE_MARKER: &str = ">>>>>>> REPLACE";

static BLOCK_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    let pattern = format!(
        r"(?ms)^{}\r?\n(.*?)^{}\r?\n(.*?)^{}",
        regex::escape(SEARCH_MARKER),
        regex::escape(SEPARATOR_MARKER),
        regex::escape(REPLACE_MARKER),
    );
    Regex::new(&pattern).unwrap()
});

static HEADER_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    let pattern = format!(r"(?m)^[ \t]*{}[ \t]*([^\r\n]*)", regex::escape(FILE_HEADER));
    Regex::new(&pattern).unwrap()
});

/// Cheap check used by the agent loop before accepting a reply as final.
pub fn looks_like_proposal(text: &str) -> bool {
    text.contains(FILE_HEADER) && text.contains(SEARCH_MARKER)
}

struct RawBlock<'a> {
    span: Range<usize>,
    search: &'a str,
    replace: &'a str,
}

impl EditProposal {
    /// Parse every `FILE:` section and SEARCH/REPLACE block in `raw`.
    ///
    /// Each block belongs to the closest `FILE:` header above it; blocks that
    /// precede every header are attributed to the first one. Blocks with an
    /// empty search text are dropped.
    pub fn parse(raw: &str) -> Result<Self, ParseError> {
        let raw_blocks: Vec<RawBlock<'_>> = BLOCK_REGEX
            .captures_iter(raw)
            .filter_map(|cap| {
                let whole = cap.get(0)?;
                Some(RawBlock {
                    span: whole.range(),
                    search: strip_line_terminator(cap.get(1)?.as_str()),
                    replace: strip_line_terminator(cap.get(2)?.as_str()),
                })
            })
            .collect();

        if raw_blocks.is_empty() {
            return Err(ParseError::NoBlocks);
        }

        // A `FILE:` line inside a block's search or replace text is code.
        let headers: Vec<(usize, String)> = HEADER_REGEX
            .captures_iter(raw)
            .filter_map(|cap| {
                let start = cap.get(0)?.start();
                if raw_blocks.iter().any(|b| b.span.contains(&start)) {
                    return None;
                }
                let path = clean_path(cap.get(1)?.as_str());
                (!path.is_empty()).then(|| (start, path.to_string()))
            })
            .collect();

        let Some((_, primary)) = headers.first() else {
            return Err(ParseError::MissingFileHeader {
                blocks: raw_blocks.len(),
            });
        };
        let primary = primary.clone();

        let mut blocks = Vec::with_capacity(raw_blocks.len());
        for raw_block in raw_blocks {
            let target = headers
                .iter()
                .take_while(|(pos, _)| *pos < raw_block.span.start)
                .last()
                .map(|(_, path)| path.as_str())
                .unwrap_or(primary.as_str());

            if raw_block.search.is_empty() {
                tracing::warn!(target_file = %target, "skipping edit block with empty SEARCH section");
                continue;
            }

            blocks.push(EditBlock::new(target, raw_block.search, raw_block.replace));
        }

        if blocks.is_empty() {
            return Err(ParseError::NoBlocks);
        }

        tracing::debug!(
            blocks = blocks.len(),
            primary = %primary,
            "parsed edit proposal"
        );

        Ok(Self { primary, blocks })
    }
}

/// Drop the one line break that separates captured text from the next marker.
fn strip_line_terminator(text: &str) -> &str {
    match text.strip_suffix('\n') {
        Some(rest) => rest.strip_suffix('\r').unwrap_or(rest),
        None => text,
    }
}

fn clean_path(raw: &str) -> &str {
    raw.trim()
        .trim_matches(|c| c == '`' || c == '"' || c == '\'')
        .trim()
}

use thiserror::Error;

/// A single search/replace instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditBlock {
    /// Path relative to the repository root, as written after `FILE:`.
    pub target_file: String,
    /// Text expected verbatim in the target file. Never empty.
    pub search: String,
    /// Replacement text. Empty means delete the matched text.
    pub replace: String,
}

impl EditBlock {
    pub fn new(
        target_file: impl Into<String>,
        search: impl Into<String>,
        replace: impl Into<String>,
    ) -> Self {
        Self {
            target_file: target_file.into(),
            search: search.into(),
            replace: replace.into(),
        }
    }
}

/// The ordered edit blocks parsed from one model response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditProposal {
    pub(crate) primary: String,
    pub(crate) blocks: Vec<EditBlock>,
}

impl EditProposal {
    pub fn blocks(&self) -> &[EditBlock] {
        &self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Path of the first `FILE:` section. Only this file is patched.
    pub fn primary_target(&self) -> &str {
        &self.primary
    }

    /// Distinct target paths in order of first appearance.
    pub fn targets(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for block in &self.blocks {
            if !seen.contains(&block.target_file.as_str()) {
                seen.push(&block.target_file);
            }
        }
        seen
    }

    /// Blocks addressed to `target`, in response order.
    pub fn blocks_for<'a>(&'a self, target: &'a str) -> impl Iterator<Item = &'a EditBlock> + 'a {
        self.blocks.iter().filter(move |b| b.target_file == target)
    }
}

/// How one block fared against the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockOutcome {
    /// Search text found verbatim.
    Exact,
    /// Search text found only after trimming surrounding whitespace.
    TrimmedFallback,
    /// Neither form found; content untouched by this block.
    Mismatch,
}

impl BlockOutcome {
    pub fn is_applied(self) -> bool {
        !matches!(self, BlockOutcome::Mismatch)
    }
}

/// Outcome of applying a set of blocks to one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchResult {
    /// Content after every applicable block, even when some blocks failed.
    pub final_content: String,
    /// One entry per attempted block, in order.
    pub outcomes: Vec<BlockOutcome>,
}

impl PatchResult {
    pub fn applied_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_applied()).count()
    }

    pub fn mismatch_count(&self) -> usize {
        self.outcomes.len() - self.applied_count()
    }

    pub fn is_success(&self) -> bool {
        self.applied_count() > 0
    }

    /// Turn a zero-applied result into a [`PatchMismatch`] for `target`.
    pub fn ensure_applied(self, target: &str) -> Result<Self, PatchMismatch> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(PatchMismatch {
                target: target.to_string(),
                attempted: self.outcomes.len(),
            })
        }
    }
}

/// The response did not follow the edit-block contract.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("response contains no SEARCH/REPLACE blocks")]
    NoBlocks,

    #[error("response contains {blocks} SEARCH/REPLACE block(s) but no FILE: header")]
    MissingFileHeader { blocks: usize },
}

/// Blocks parsed fine but none of them matched the file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("none of the {attempted} edit block(s) matched {target}")]
pub struct PatchMismatch {
    pub target: String,
    pub attempted: usize,
}

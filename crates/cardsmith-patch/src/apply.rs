use crate::types::{BlockOutcome, EditBlock, EditProposal, ParseError, PatchResult};

const PREVIEW_CHARS: usize = 50;

/// Apply `blocks` in order to `original`.
///
/// Each block replaces only the first occurrence of its search text. When the
/// verbatim text is absent, the search text trimmed of surrounding whitespace is
/// tried once; otherwise the block is recorded as a mismatch and skipped.
pub fn apply_blocks<'a>(
    original: &str,
    blocks: impl IntoIterator<Item = &'a EditBlock>,
) -> PatchResult {
    let mut content = original.to_string();
    let mut outcomes = Vec::new();

    for (index, block) in blocks.into_iter().enumerate() {
        let outcome = apply_one(&mut content, block);
        if outcome == BlockOutcome::Mismatch {
            tracing::warn!(
                block = index,
                target_file = %block.target_file,
                search = %preview(&block.search),
                "search block did not match"
            );
        }
        outcomes.push(outcome);
    }

    PatchResult {
        final_content: content,
        outcomes,
    }
}

fn apply_one(content: &mut String, block: &EditBlock) -> BlockOutcome {
    if content.contains(block.search.as_str()) {
        *content = content.replacen(block.search.as_str(), &block.replace, 1);
        return BlockOutcome::Exact;
    }

    let trimmed = block.search.trim();
    // An all-whitespace search would otherwise match at offset 0.
    if !trimmed.is_empty() && content.contains(trimmed) {
        *content = content.replacen(trimmed, &block.replace, 1);
        return BlockOutcome::TrimmedFallback;
    }

    BlockOutcome::Mismatch
}

fn preview(text: &str) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

impl EditProposal {
    /// Apply the blocks of the first `FILE:` section to `original`.
    pub fn apply_primary(&self, original: &str) -> PatchResult {
        apply_blocks(original, self.blocks_for(self.primary_target()))
    }
}

/// Parse `response` and apply its primary section to `original`.
pub fn apply_patch(original: &str, response: &str) -> Result<PatchResult, ParseError> {
    let proposal = EditProposal::parse(response)?;
    Ok(proposal.apply_primary(original))
}

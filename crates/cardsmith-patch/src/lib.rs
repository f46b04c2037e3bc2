//! Search/replace edit blocks produced by a language model.
//!
//! A model response looks like:
//!
//! ```text
//! FILE: src/app.ts
//! <<<<<<< SEARCH
//! const x = 1;
//! =======
//! const x = 2;
//! >>>>>>> REPLACE
//! ```
//!
//! [`EditProposal::parse`] turns the free text into typed [`EditBlock`]s and
//! [`EditProposal::apply_primary`] applies the blocks of the first `FILE:` section
//! to a file's content, producing a [`PatchResult`].
//!
//! Parsing and application fail in different ways on purpose: a [`ParseError`]
//! means the model ignored the output contract, while a [`PatchMismatch`] means
//! the blocks were well-formed but their search text is not in the file.

mod apply;
mod parser;
mod types;

pub use apply::{apply_blocks, apply_patch};
pub use parser::{FILE_HEADER, REPLACE_MARKER, SEARCH_MARKER, SEPARATOR_MARKER, looks_like_proposal};
pub use types::{BlockOutcome, EditBlock, EditProposal, ParseError, PatchMismatch, PatchResult};

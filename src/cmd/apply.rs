//! Offline patch application (`cardsmith apply`).

use std::path::Path;

use anyhow::{Context, Result};

use cardsmith_patch::{BlockOutcome, EditProposal};

pub fn cmd_apply(file: &Path, proposal_path: &Path, write: bool) -> Result<()> {
    let raw = std::fs::read_to_string(proposal_path)
        .with_context(|| format!("Failed to read proposal: {}", proposal_path.display()))?;
    let proposal = EditProposal::parse(&raw).context("Proposal could not be parsed")?;

    let original = if file.exists() {
        std::fs::read_to_string(file)
            .with_context(|| format!("Failed to read file: {}", file.display()))?
    } else {
        String::new()
    };

    let target = proposal.primary_target();
    let result = proposal.apply_primary(&original);

    println!("Target: {} -> {}", target, file.display());
    for (i, outcome) in result.outcomes.iter().enumerate() {
        let label = match outcome {
            BlockOutcome::Exact => "applied",
            BlockOutcome::TrimmedFallback => "applied (trimmed)",
            BlockOutcome::Mismatch => "no match",
        };
        println!("  block {}: {}", i + 1, label);
    }
    println!(
        "Applied {}/{} block(s)",
        result.applied_count(),
        result.outcomes.len()
    );

    let skipped = proposal.targets().len().saturating_sub(1);
    if skipped > 0 {
        println!("Ignored {} additional FILE: section(s)", skipped);
    }

    let result = result.ensure_applied(target)?;

    if write {
        std::fs::write(file, &result.final_content)
            .with_context(|| format!("Failed to write file: {}", file.display()))?;
        println!("Wrote {}", file.display());
    } else {
        println!();
        print!("{}", result.final_content);
    }

    Ok(())
}

//! Prompt text for the edit agent.

/// System prompt: role, task, repository files and the output contract.
pub fn system_prompt(title: &str, files: &str) -> String {
    format!(
        r#"You are an expert full-stack developer working in an existing repository.

Task: {title}

Repository files:
{files}

RULES:
1. Answer only with SEARCH/REPLACE blocks.
2. Use the read_file tool to inspect a file before editing it.
3. Output must start with 'FILE: <path>'. No explanations, no prose.
4. The SEARCH text must be copied exactly from the file, with its indentation.

FORMAT:
FILE: path/to/file.ts
<<<<<<< SEARCH
old_code
=======
new_code
>>>>>>> REPLACE
"#
    )
}

pub fn task_message(description: &str) -> String {
    format!("Details: {}", description)
}

/// Appended after a reply that was neither a tool call nor a valid proposal.
pub const FORMAT_REMINDER: &str = "Your reply did not follow the required format. \
Respond only with 'FILE: <path>' followed by SEARCH/REPLACE blocks, or call read_file.";

use std::io::{self, BufRead, IsTerminal, Write};

use fintrack_core::{DeleteConfirmation, Resource};

use crate::error::CliError;

const SHORT_ID_LEN: usize = 13;

pub fn short_id(id: &str) -> String {
    id.chars().take(SHORT_ID_LEN).collect()
}

pub fn format_amount(amount: f64) -> String {
    format!("{amount:.2}")
}

/// First line of `text`, whitespace collapsed, cut to `max_chars`.
pub fn preview(text: &str, max_chars: usize) -> String {
    let first_line = text.lines().next().unwrap_or("").trim();
    let collapsed = first_line.split_whitespace().collect::<Vec<_>>().join(" ");

    if collapsed.chars().count() <= max_chars {
        collapsed
    } else {
        let take_len = max_chars.saturating_sub(3);
        let mut truncated = collapsed.chars().take(take_len).collect::<String>();
        truncated.push_str("...");
        truncated
    }
}

pub fn normalize_record_identifier(id: &str) -> Result<String, CliError> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        return Err(CliError::EmptyRecordId);
    }
    Ok(trimmed.to_string())
}

/// Find a record by full id or unique id prefix.
pub fn resolve_record<'a, R: Resource>(records: &'a [R], query: &str) -> Result<&'a R, CliError> {
    let query = normalize_record_identifier(query)?;
    if let Some(exact) = records.iter().find(|record| record.id().as_str() == query) {
        return Ok(exact);
    }

    let matches = records
        .iter()
        .filter(|record| record.id().as_str().starts_with(&query))
        .collect::<Vec<_>>();

    match matches.as_slice() {
        [] => Err(CliError::RecordNotFound(R::TABLE, query)),
        [record] => Ok(record),
        many => {
            let options = many
                .iter()
                .take(3)
                .map(|record| short_id(record.id().as_str()))
                .collect::<Vec<_>>()
                .join(", ");
            Err(CliError::AmbiguousRecordId(format!(
                "ID prefix '{query}' is ambiguous; matches: {options}"
            )))
        }
    }
}

pub fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

/// Ask before deleting. Returns `None` when the user declines.
///
/// Without a terminal there is nobody to ask, so `--yes` is required.
pub fn confirm_delete<R: Resource>(
    label: &str,
    record: &R,
    skip_prompt: bool,
) -> Result<Option<DeleteConfirmation>, CliError> {
    if skip_prompt {
        return Ok(Some(DeleteConfirmation::confirm(record.id().clone())));
    }
    let stdin = io::stdin();
    if !stdin.is_terminal() {
        return Err(CliError::ConfirmationRequired);
    }

    let mut stderr = io::stderr();
    write!(stderr, "Delete {label}? [y/N] ")?;
    stderr.flush()?;
    let mut answer = String::new();
    stdin.lock().read_line(&mut answer)?;

    Ok(is_affirmative(&answer).then(|| DeleteConfirmation::confirm(record.id().clone())))
}

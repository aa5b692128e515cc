use crate::catalog::SymbolCatalog;

/// Candidates for the completion popup: answer references first, then basic
/// functions, then advanced functions and variables.
///
/// `query` is the text before the cursor. When it ends in a letter, only
/// candidates starting with its trailing alphanumeric word are kept
/// (case-insensitive); otherwise everything is offered.
pub fn completion_candidates(
    query: &str,
    results: &[String],
    catalog: &SymbolCatalog,
) -> Vec<String> {
    let last = results.len().saturating_sub(1);
    let mut candidates: Vec<String> = Vec::new();
    if results.len() != 1 {
        candidates.push("ans".into());
    }
    candidates.extend(
        results
            .iter()
            .enumerate()
            .filter(|(i, r)| !r.is_empty() && *i != last)
            .map(|(i, _)| format!("ans{}", i + 1)),
    );
    candidates.extend(catalog.basic().iter().cloned());
    candidates.extend(catalog.advanced().iter().cloned());

    if !query.chars().next_back().is_some_and(char::is_alphabetic) {
        return candidates;
    }
    let start = query
        .char_indices()
        .rev()
        .find(|(_, c)| !c.is_alphanumeric())
        .map_or(0, |(i, c)| i + c.len_utf8());
    let prefix = query[start..].to_lowercase();
    candidates.retain(|c| c.to_lowercase().starts_with(&prefix));
    candidates
}

/// Returns the keywords from `skills` that occur in `text`, preserving input order.
///
/// Matching is case-insensitive and requires a word boundary on both sides of the
/// keyword (any non-alphanumeric character or the ends of the text), so "java" does
/// not match inside "javascript" while "c++" and "ci/cd" still match as written.
pub fn find_matches<'a>(text: &str, skills: &[&'a str]) -> Vec<&'a str> {
    let haystack = text.to_lowercase();
    skills
        .iter()
        .copied()
        .filter(|skill| mentions(&haystack, &skill.to_lowercase()))
        .collect()
}

fn mentions(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return false;
    }
    haystack.match_indices(needle).any(|(start, _)| {
        let before = haystack[..start].chars().next_back();
        let after = haystack[start + needle.len()..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}

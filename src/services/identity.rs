//! Owner identity resolution.
//!
//! Matches the importing user against a season's owner-name list so exactly
//! one stored row per season carries their user id. Matching is
//! case-insensitive bidirectional substring containment; the first owner in
//! provider order that matches any known name for the user wins. True
//! ambiguity (two rosters sharing a display name) is not detected; the
//! first-match rule is a documented simplification.

/// True when either trimmed, lowercased name contains the other.
fn names_match(a: &str, b: &str) -> bool {
    let a = a.trim().to_lowercase();
    let b = b.trim().to_lowercase();
    if a.is_empty() || b.is_empty() {
        return false;
    }
    a.contains(&b) || b.contains(&a)
}

/// Returns the index of the first owner (in provider order) matching any of
/// the user's known names, or `None`.
#[must_use]
pub fn resolve_owner(known_names: &[String], owner_names: &[String]) -> Option<usize> {
    owner_names
        .iter()
        .position(|owner| known_names.iter().any(|name| names_match(name, owner)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn substring_containment_matches_either_direction() {
        assert!(names_match("Mike Smith", "Smith"));
        assert!(names_match("Smith", "Mike Smith"));
        assert!(names_match("MIKE SMITH", "mike smith"));
        assert!(!names_match("Mike Smith", "Jones"));
    }

    #[test]
    fn empty_names_never_match() {
        assert!(!names_match("", "Smith"));
        assert!(!names_match("  ", "Smith"));
    }

    #[test]
    fn first_owner_in_provider_order_wins() {
        let owners = names(&["Jones", "Smith", "Smitherson"]);
        let known = names(&["Mike Smith"]);
        assert_eq!(resolve_owner(&known, &owners), Some(1));
    }

    #[test]
    fn display_name_smith_matches_owner_mike_smith() {
        let owners = names(&["Derek", "Mike Smith", "Sarah K"]);
        let known = names(&["Smith"]);
        assert_eq!(resolve_owner(&known, &owners), Some(1));
    }

    #[test]
    fn no_candidate_yields_none() {
        let owners = names(&["Derek", "Sarah K"]);
        let known = names(&["Mike Smith"]);
        assert_eq!(resolve_owner(&known, &owners), None);
    }

    #[test]
    fn aliases_extend_the_match_set() {
        let owners = names(&["The Commish", "dman42"]);
        let known = names(&["Daniel Ng", "dman42"]);
        assert_eq!(resolve_owner(&known, &owners), Some(1));
    }
}

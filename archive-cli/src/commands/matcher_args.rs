use archive_core::matcher::Matcher;

/// Builds a [`Matcher`] from the raw `--include`/`--exclude` glob strings
/// common to both subcommands.
pub(crate) fn build_matcher(include: &[String], exclude: &[String]) -> Matcher {
    let mut matcher = Matcher::new();
    for pattern in include {
        matcher.add_include(pattern.as_bytes(), false);
    }
    for pattern in exclude {
        matcher.add_exclude(pattern.as_bytes(), false);
    }
    matcher
}

#[cfg(test)]
mod tests {
    use super::*;
    use archive_core::entry::Entry;

    #[test]
    fn include_and_exclude_compose() {
        let mut matcher = build_matcher(&["*.txt".to_string()], &["secret.*".to_string()]);
        assert!(matcher.matches(&Entry::new(b"a.txt".to_vec())));
        assert!(!matcher.matches(&Entry::new(b"secret.txt".to_vec())));
        assert!(!matcher.matches(&Entry::new(b"a.rs".to_vec())));
    }
}

//! Options string parser (spec.md §6.4).
//!
//! `compression=9, zip:experimental, !verbose` — comma-separated
//! `key=value` (or bare boolean) pairs, an optional `modulename:` prefix
//! scoping a pair to one format/filter, and `!` negating a boolean.
//! Parsing is strict: malformed syntax is an error; unknown keys are the
//! caller's problem (spec.md says plug-ins WARN on an unrecognized key,
//! which requires caller context this parser doesn't have — it just
//! hands back the parsed pairs).

use crate::error::{Error, Result};

/// One parsed `key=value` pair, with its optional module scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionEntry {
    /// `Some("zip")` for `zip:experimental`, `None` for an unprefixed key.
    pub module: Option<String>,
    pub key: String,
    pub value: OptionValue,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionValue {
    /// A bare key with no `=value`, e.g. `verbose` or `!verbose`.
    Bool(bool),
    String(String),
}

/// Parses a full options string into its entries. Returns a FAILED-kind
/// error on malformed syntax (spec.md §6.4: "malformed syntax yields a
/// negative return").
pub fn parse(options: &str) -> Result<Vec<OptionEntry>> {
    let mut entries = Vec::new();
    for raw in options.split(',') {
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }
        entries.push(parse_one(raw)?);
    }
    Ok(entries)
}

fn parse_one(raw: &str) -> Result<OptionEntry> {
    let negate = raw.starts_with('!');
    let rest = if negate { &raw[1..] } else { raw };
    if rest.is_empty() {
        return Err(malformed(raw));
    }

    let (module, rest) = match rest.split_once(':') {
        Some((module, after)) => {
            if module.is_empty() || after.is_empty() {
                return Err(malformed(raw));
            }
            (Some(module.to_string()), after)
        }
        None => (None, rest),
    };

    match rest.split_once('=') {
        Some((key, value)) => {
            if negate {
                return Err(malformed(raw));
            }
            if key.is_empty() {
                return Err(malformed(raw));
            }
            Ok(OptionEntry {
                module,
                key: key.to_string(),
                value: OptionValue::String(value.to_string()),
            })
        }
        None => {
            if rest.is_empty() {
                return Err(malformed(raw));
            }
            Ok(OptionEntry {
                module,
                key: rest.to_string(),
                value: OptionValue::Bool(!negate),
            })
        }
    }
}

fn malformed(raw: &str) -> Error {
    Error::failed(format!("malformed option syntax: {raw:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_mixed_example_from_the_interface_doc() {
        let parsed = parse("compression=9, zip:experimental, !verbose").unwrap();
        assert_eq!(
            parsed,
            vec![
                OptionEntry {
                    module: None,
                    key: "compression".into(),
                    value: OptionValue::String("9".into()),
                },
                OptionEntry {
                    module: Some("zip".into()),
                    key: "experimental".into(),
                    value: OptionValue::Bool(true),
                },
                OptionEntry {
                    module: None,
                    key: "verbose".into(),
                    value: OptionValue::Bool(false),
                },
            ]
        );
    }

    #[test]
    fn rejects_negated_key_value_pair() {
        assert!(parse("!compression=9").is_err());
    }

    #[test]
    fn rejects_empty_module_prefix() {
        assert!(parse(":key=1").is_err());
    }

    #[test]
    fn ignores_blank_segments_between_commas() {
        let parsed = parse("a,,b").unwrap();
        assert_eq!(parsed.len(), 2);
    }

    #[test]
    fn rejects_bare_negation() {
        assert!(parse("!").is_err());
    }
}

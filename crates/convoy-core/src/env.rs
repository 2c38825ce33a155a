//! Environment variable merging
//!
//! POSIX environments are case sensitive. Windows environments are case
//! insensitive but preserve the spelling of the first definition, so an
//! existing `FOO` overwritten by a supplied `foo` stays spelled `FOO`.

use std::collections::HashMap;

/// Case rule used when merging environments
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvCase {
    /// Keys differing only in case are distinct
    Sensitive,
    /// Keys differing only in case name the same variable
    InsensitivePreserving,
}

impl EnvCase {
    /// The rule of the platform this binary was built for
    pub fn native() -> Self {
        if cfg!(windows) {
            Self::InsensitivePreserving
        } else {
            Self::Sensitive
        }
    }
}

/// Merge `new_values` into `current` using the native platform rule
pub fn merge_environment(
    current: HashMap<String, String>,
    new_values: HashMap<String, String>,
) -> HashMap<String, String> {
    merge_environment_with(EnvCase::native(), current, new_values)
}

/// Merge `new_values` into `current` using an explicit case rule
pub fn merge_environment_with(
    case: EnvCase,
    mut current: HashMap<String, String>,
    new_values: HashMap<String, String>,
) -> HashMap<String, String> {
    match case {
        EnvCase::Sensitive => {
            current.extend(new_values);
        }
        EnvCase::InsensitivePreserving => {
            let mut spellings: HashMap<String, Vec<String>> = HashMap::new();
            for key in current.keys() {
                spellings.entry(key.to_uppercase()).or_default().push(key.clone());
            }
            for (key, value) in new_values {
                match spellings.get(&key.to_uppercase()) {
                    // Every spelling already present is the same variable.
                    Some(existing) => {
                        for spelling in existing {
                            current.insert(spelling.clone(), value.clone());
                        }
                    }
                    None => {
                        current.insert(key, value);
                    }
                }
            }
        }
    }
    current
}

/// Apply `KEY=VALUE` pairs in order, later entries overriding earlier ones
pub fn merge_pairs<I, K, V>(case: EnvCase, pairs: I) -> HashMap<String, String>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    pairs.into_iter().fold(HashMap::new(), |acc, (k, v)| {
        merge_environment_with(case, acc, HashMap::from([(k.into(), v.into())]))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_case_insensitive_merge_preserves_spelling() {
        let merged = merge_environment_with(
            EnvCase::InsensitivePreserving,
            env(&[("FOO", "1")]),
            env(&[("foo", "2")]),
        );
        assert_eq!(merged, env(&[("FOO", "2")]));
    }

    #[test]
    fn test_case_insensitive_merge_overwrites_every_spelling() {
        let merged = merge_environment_with(
            EnvCase::InsensitivePreserving,
            env(&[("FOO", "1"), ("foo", "2"), ("BAR", "3")]),
            env(&[("Foo", "9")]),
        );
        assert_eq!(merged, env(&[("FOO", "9"), ("foo", "9"), ("BAR", "3")]));
    }

    #[test]
    fn test_case_sensitive_merge_keeps_both() {
        let merged = merge_environment_with(
            EnvCase::Sensitive,
            env(&[("FOO", "1")]),
            env(&[("foo", "2")]),
        );
        assert_eq!(merged, env(&[("FOO", "1"), ("foo", "2")]));
    }

    #[test]
    fn test_new_keys_are_added() {
        for case in [EnvCase::Sensitive, EnvCase::InsensitivePreserving] {
            let merged = merge_environment_with(case, env(&[("A", "1")]), env(&[("B", "2")]));
            assert_eq!(merged, env(&[("A", "1"), ("B", "2")]));
        }
    }

    #[test]
    fn test_merge_into_empty() {
        let merged = merge_environment(HashMap::new(), env(&[("PATH", "/bin")]));
        assert_eq!(merged, env(&[("PATH", "/bin")]));
    }

    #[test]
    fn test_merge_pairs_later_wins() {
        let merged = merge_pairs(
            EnvCase::InsensitivePreserving,
            [("Path", "/bin"), ("PATH", "/usr/bin")],
        );
        assert_eq!(merged, env(&[("Path", "/usr/bin")]));

        let merged = merge_pairs(EnvCase::Sensitive, [("X", "1"), ("X", "2")]);
        assert_eq!(merged, env(&[("X", "2")]));
    }
}

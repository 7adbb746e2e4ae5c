//! Path glob patterns over object storage.
//!
//! A pattern such as `s3a://udacity-dend/log_data/*/*/*.json` is split into
//! a literal root (`s3a://udacity-dend/log_data`), which selects the storage
//! location to list, and a relative pattern (`*/*/*.json`) matched against
//! every listed key.

use regex::Regex;

use crate::error::SourceError;

/// A compiled glob over one storage location.
#[derive(Debug, Clone)]
pub struct GlobPattern {
    root: String,
    relative: String,
    regex: Regex,
}

fn has_wildcard(segment: &str) -> bool {
    segment.contains(['*', '?', '['])
}

impl GlobPattern {
    /// Parse a glob.
    ///
    /// Supported wildcards: `*` (any run of characters except `/`), `?` (one
    /// character except `/`) and `[...]` classes (`[!...]` negates). A
    /// pattern without wildcards matches the single object it names.
    pub fn parse(pattern: &str) -> Result<Self, SourceError> {
        let invalid = |message: &str| SourceError::InvalidPattern {
            pattern: pattern.to_string(),
            message: message.to_string(),
        };

        let trimmed = pattern.trim_end_matches('/');
        let segments: Vec<&str> = trimmed.split('/').collect();
        let first_wild = segments
            .iter()
            .position(|segment| has_wildcard(segment))
            .unwrap_or(segments.len().saturating_sub(1));

        let root = segments[..first_wild].join("/");
        let relative = segments[first_wild..].join("/");
        if root.is_empty() || root.ends_with(':') || root.ends_with(":/") || relative.is_empty() {
            return Err(invalid("wildcards must follow a literal bucket or directory"));
        }
        if has_wildcard(&root) {
            return Err(invalid("the storage root cannot contain wildcards"));
        }

        let regex = Regex::new(&format!("^{}$", glob_to_regex(&relative).map_err(invalid)?))
            .map_err(|e| invalid(&e.to_string()))?;

        Ok(Self {
            root,
            relative,
            regex,
        })
    }

    /// Storage location to list.
    pub fn root(&self) -> &str {
        &self.root
    }

    /// The wildcard part, relative to [`GlobPattern::root`].
    pub fn relative(&self) -> &str {
        &self.relative
    }

    /// Whether a key relative to the root matches.
    ///
    /// Hidden files (names starting with `.` or `_`, such as `_SUCCESS`)
    /// never match.
    pub fn matches(&self, key: &str) -> bool {
        let name = key.rsplit('/').next().unwrap_or(key);
        if name.starts_with('.') || name.starts_with('_') {
            return false;
        }
        self.regex.is_match(key)
    }

    /// Keep the matching keys, preserving order.
    pub fn filter<'a>(&self, keys: impl IntoIterator<Item = &'a String>) -> Vec<String> {
        keys.into_iter()
            .filter(|key| self.matches(key))
            .cloned()
            .collect()
    }
}

/// Translate a glob into a regex body.
fn glob_to_regex(glob: &str) -> Result<String, &'static str> {
    let mut out = String::with_capacity(glob.len() * 2);
    let mut chars = glob.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '*' => out.push_str("[^/]*"),
            '?' => out.push_str("[^/]"),
            '[' => {
                let mut class = String::from("[");
                if chars.peek() == Some(&'!') {
                    chars.next();
                    class.push('^');
                }
                let mut closed = false;
                let mut first = true;
                while let Some(c) = chars.next() {
                    match c {
                        ']' if !first => {
                            closed = true;
                            break;
                        }
                        '\\' | '[' | ']' | '^' | '&' | '~' => {
                            class.push('\\');
                            class.push(c);
                        }
                        '/' => return Err("character classes cannot match '/'"),
                        _ => class.push(c),
                    }
                    first = false;
                }
                if !closed {
                    return Err("unclosed character class");
                }
                class.push(']');
                out.push_str(&class);
            }
            _ => out.push_str(&regex::escape(&c.to_string())),
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_song_data_pattern() {
        let glob = GlobPattern::parse("s3a://udacity-dend/song_data/*/*/*/*.json").unwrap();
        assert_eq!(glob.root(), "s3a://udacity-dend/song_data");
        assert_eq!(glob.relative(), "*/*/*/*.json");
    }

    #[test]
    fn test_split_local_pattern() {
        let glob = GlobPattern::parse("/data/in/log_data/*/*/*.json").unwrap();
        assert_eq!(glob.root(), "/data/in/log_data");
        assert!(glob.matches("2018/11/2018-11-12-events.json"));
    }

    #[test]
    fn test_star_does_not_cross_directories() {
        let glob = GlobPattern::parse("/in/log_data/*/*/*.json").unwrap();
        assert!(!glob.matches("2018/2018-11-12-events.json"));
        assert!(!glob.matches("2018/11/extra/2018-11-12-events.json"));
        assert!(!glob.matches("2018/11/2018-11-12-events.jsonl"));
    }

    #[test]
    fn test_hidden_files_never_match() {
        let glob = GlobPattern::parse("/in/*").unwrap();
        assert!(glob.matches("a.json"));
        assert!(!glob.matches("_SUCCESS"));
        assert!(!glob.matches(".a.json.crc"));
    }

    #[test]
    fn test_question_mark_and_classes() {
        let glob = GlobPattern::parse("/in/[A-C]/?.json").unwrap();
        assert!(glob.matches("A/1.json"));
        assert!(glob.matches("C/x.json"));
        assert!(!glob.matches("D/1.json"));
        assert!(!glob.matches("A/12.json"));

        let glob = GlobPattern::parse("/in/[!A]*.json").unwrap();
        assert!(glob.matches("B.json"));
        assert!(!glob.matches("A.json"));
    }

    #[test]
    fn test_regex_metacharacters_are_literal() {
        let glob = GlobPattern::parse("/in/*/a+b(1).json").unwrap();
        assert!(glob.matches("x/a+b(1).json"));
        assert!(!glob.matches("x/aab1.json"));
    }

    #[test]
    fn test_literal_path_matches_itself() {
        let glob = GlobPattern::parse("/in/log_data/events.json").unwrap();
        assert_eq!(glob.root(), "/in/log_data");
        assert!(glob.matches("events.json"));
        assert!(!glob.matches("other.json"));
    }

    #[test]
    fn test_filter_keeps_order() {
        let glob = GlobPattern::parse("/in/*.json").unwrap();
        let keys = vec![
            "a.json".to_string(),
            "b.txt".to_string(),
            "c.json".to_string(),
        ];
        assert_eq!(glob.filter(&keys), vec!["a.json", "c.json"]);
    }

    #[test]
    fn test_invalid_patterns() {
        assert!(GlobPattern::parse("s3a://*/song_data/*.json").is_err());
        assert!(GlobPattern::parse("/in/[abc.json").is_err());
        assert!(GlobPattern::parse("*.json").is_err());
    }
}

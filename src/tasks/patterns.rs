//! Path pattern matching for implicit dependency inference.
//!
//! A declared input is either a literal path or a glob. Matching is pure and
//! independent of the scheduler: [`PathPattern::matches`] decides whether a
//! candidate path (typically another task's declared output) satisfies the
//! pattern, and [`PathPattern::expand_on_disk`] lists existing files.
//!
//! Supported syntax, per path component:
//! - `*` matches zero or more characters, never `/`
//! - `?` matches exactly one character
//! - `[abc]`, `[a-z]` match a character in the set
//! - `[!abc]` or `[^abc]` match a character NOT in the set
//! - `{a,b,c}` matches any of the alternatives

use std::fs;
use std::path::{Component, Path, PathBuf};

/// A compiled input pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    raw: String,
    normalized: String,
    alternatives: Vec<Vec<String>>,
    literal: bool,
}

impl PathPattern {
    /// Compile a pattern. Leading `./` components are ignored.
    pub fn new(pattern: &str) -> Self {
        let normalized = normalize(Path::new(pattern));
        let literal = !normalized.chars().any(is_meta);
        let alternatives = expand_braces(&normalized)
            .into_iter()
            .map(|alt| alt.split('/').map(str::to_string).collect())
            .collect();
        Self {
            raw: pattern.to_string(),
            normalized,
            alternatives,
            literal,
        }
    }

    /// The pattern as declared.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Whether the pattern has no glob metacharacters.
    pub fn is_literal(&self) -> bool {
        self.literal
    }

    /// The literal path, if this pattern is literal.
    pub fn literal_path(&self) -> Option<PathBuf> {
        self.literal.then(|| PathBuf::from(&self.raw))
    }

    /// Whether `path` satisfies this pattern.
    pub fn matches(&self, path: &Path) -> bool {
        let candidate = normalize(path);
        if self.literal {
            return candidate == self.normalized;
        }
        let parts: Vec<&str> = candidate.split('/').collect();
        self.alternatives.iter().any(|alt| {
            alt.len() == parts.len()
                && alt
                    .iter()
                    .zip(&parts)
                    .all(|(pat, part)| glob_match(pat, part))
        })
    }

    /// List existing files matching the pattern, sorted.
    pub fn expand_on_disk(&self) -> Vec<PathBuf> {
        let mut found = Vec::new();
        for alt in &self.alternatives {
            let absolute = self.normalized.starts_with('/');
            let start = if absolute {
                PathBuf::from("/")
            } else {
                PathBuf::new()
            };
            let components: Vec<&str> = alt
                .iter()
                .map(String::as_str)
                .filter(|c| !c.is_empty())
                .collect();
            walk(&start, &components, &mut found);
        }
        found.sort();
        found.dedup();
        found
    }
}

fn walk(base: &Path, components: &[&str], found: &mut Vec<PathBuf>) {
    let Some((first, rest)) = components.split_first() else {
        if base.is_file() {
            found.push(base.to_path_buf());
        }
        return;
    };

    if !first.chars().any(is_meta) {
        let next = base.join(first);
        if rest.is_empty() || next.is_dir() {
            walk(&next, rest, found);
        }
        return;
    }

    let dir = if base.as_os_str().is_empty() {
        Path::new(".")
    } else {
        base
    };
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if glob_match(first, &name) {
            walk(&base.join(name.as_ref()), rest, found);
        }
    }
}

fn is_meta(c: char) -> bool {
    matches!(c, '*' | '?' | '[' | '{')
}

/// Render a path with `.` components removed and `/` separators.
pub fn normalize(path: &Path) -> String {
    let mut parts: Vec<String> = Vec::new();
    let mut absolute = false;
    for component in path.components() {
        match component {
            Component::RootDir => absolute = true,
            Component::CurDir => {}
            Component::Prefix(p) => parts.push(p.as_os_str().to_string_lossy().into_owned()),
            Component::ParentDir => parts.push("..".to_string()),
            Component::Normal(s) => parts.push(s.to_string_lossy().into_owned()),
        }
    }
    let joined = parts.join("/");
    if absolute {
        format!("/{}", joined)
    } else {
        joined
    }
}

/// Match a single path component against a glob pattern.
///
/// # Examples
/// ```
/// use runnel::tasks::patterns::glob_match;
///
/// assert!(glob_match("*.fastGWA", "test.fastGWA"));
/// assert!(glob_match("chr?.tsv", "chr1.tsv"));
/// assert!(glob_match("[abc]", "b"));
/// assert!(!glob_match("*.tsv", "test.png"));
/// ```
pub fn glob_match(pattern: &str, input: &str) -> bool {
    expand_braces(pattern).iter().any(|pat| {
        let pat_chars: Vec<char> = pat.chars().collect();
        let input_chars: Vec<char> = input.chars().collect();
        match_recursive(&pat_chars, 0, &input_chars, 0)
    })
}

/// Expand brace expressions in a pattern. Supports nested braces.
pub fn expand_braces(pattern: &str) -> Vec<String> {
    let chars: Vec<char> = pattern.chars().collect();

    let mut depth = 0usize;
    let mut brace_start = None;
    let mut brace_end = None;

    for (i, &c) in chars.iter().enumerate() {
        match c {
            '{' => {
                if depth == 0 {
                    brace_start = Some(i);
                }
                depth += 1;
            }
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    brace_end = Some(i);
                    break;
                }
            }
            _ => {}
        }
    }

    let (start, end) = match (brace_start, brace_end) {
        (Some(s), Some(e)) => (s, e),
        _ => return vec![pattern.to_string()],
    };

    let prefix: String = chars[..start].iter().collect();
    let suffix: String = chars[end + 1..].iter().collect();
    let content: String = chars[start + 1..end].iter().collect();

    split_alternatives(&content)
        .into_iter()
        .flat_map(|alt| expand_braces(&format!("{}{}{}", prefix, alt, suffix)))
        .collect()
}

fn split_alternatives(content: &str) -> Vec<String> {
    let mut alternatives = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;

    for c in content.chars() {
        match c {
            '{' => {
                depth += 1;
                current.push(c);
            }
            '}' => {
                depth = depth.saturating_sub(1);
                current.push(c);
            }
            ',' if depth == 0 => alternatives.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    alternatives.push(current);

    alternatives
}

fn match_recursive(pattern: &[char], pi: usize, input: &[char], ii: usize) -> bool {
    if pi >= pattern.len() {
        return ii >= input.len();
    }

    match pattern[pi] {
        '*' => {
            let mut next_pi = pi;
            while next_pi < pattern.len() && pattern[next_pi] == '*' {
                next_pi += 1;
            }
            if next_pi >= pattern.len() {
                return true;
            }
            (ii..=input.len()).any(|start| match_recursive(pattern, next_pi, input, start))
        }

        '?' => ii < input.len() && match_recursive(pattern, pi + 1, input, ii + 1),

        '[' => {
            if ii >= input.len() {
                return false;
            }
            match parse_char_class(&pattern[pi..], input[ii]) {
                Some((true, len)) => match_recursive(pattern, pi + len, input, ii + 1),
                Some((false, _)) => false,
                // Unterminated class: treat '[' literally
                None => input[ii] == '[' && match_recursive(pattern, pi + 1, input, ii + 1),
            }
        }

        '\\' if pi + 1 < pattern.len() => {
            ii < input.len()
                && pattern[pi + 1] == input[ii]
                && match_recursive(pattern, pi + 2, input, ii + 1)
        }

        c => ii < input.len() && c == input[ii] && match_recursive(pattern, pi + 1, input, ii + 1),
    }
}

/// Parse a `[...]` class at the start of `pattern`.
///
/// Returns whether `c` matches and the class length, or `None` if unterminated.
fn parse_char_class(pattern: &[char], c: char) -> Option<(bool, usize)> {
    let mut i = 1;
    let negated = matches!(pattern.get(i), Some('!') | Some('^'));
    if negated {
        i += 1;
    }

    let mut matched = false;
    let mut first = true;
    while i < pattern.len() {
        let current = pattern[i];
        if current == ']' && !first {
            return Some((matched != negated, i + 1));
        }
        first = false;
        if i + 2 < pattern.len() && pattern[i + 1] == '-' && pattern[i + 2] != ']' {
            if current <= c && c <= pattern[i + 2] {
                matched = true;
            }
            i += 3;
        } else {
            if current == c {
                matched = true;
            }
            i += 1;
        }
    }

    None
}

//! # Code Parser (C1)
//!
//! Regex/line-scan extraction of [`SemanticUnit`]s from source files. Not a
//! grammar parser — grounded in the teacher's own `regex`-based
//! `search::{regex, fuzzy}` modules, which is the only parsing idiom present
//! anywhere in the corpus, and matches the spec's "tolerant, best-effort"
//! requirement better than a full grammar would. Pure and referentially
//! transparent: same bytes in, same units out, no I/O beyond the initial
//! read.

use crate::constants::errors::EMPTY_QUERY;
use crate::types::SemanticUnit;
use crate::{Error, Result};
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockStyle {
    /// Extent delimited by balanced `{`/`}`.
    Brace,
    /// Extent delimited by Python-style indentation.
    Indent,
    /// Extent delimited by a trailing `end` keyword at the defining indent.
    EndKeyword,
}

struct LanguageProfile {
    name: &'static str,
    extensions: &'static [&'static str],
    block_style: BlockStyle,
    /// One regex per unit type, checked in order; first match on a line wins.
    patterns: &'static [(&'static str, &'static str)],
}

macro_rules! regex_once {
    ($body:expr) => {{
        static RE: LazyLock<Regex> = LazyLock::new(|| Regex::new($body).expect("valid pattern"));
        &*RE
    }};
}

fn profile_for(language: &str) -> Option<&'static LanguageProfile> {
    PROFILES.iter().find(|p| p.name == language)
}

static PROFILES: &[LanguageProfile] = &[
    LanguageProfile {
        name: "python",
        extensions: &["py"],
        block_style: BlockStyle::Indent,
        patterns: &[
            ("function", r"^(\s*)def\s+([A-Za-z_][A-Za-z0-9_]*)\s*\("),
            ("class", r"^(\s*)class\s+([A-Za-z_][A-Za-z0-9_]*)"),
        ],
    },
    LanguageProfile {
        name: "javascript",
        extensions: &["js", "jsx", "mjs"],
        block_style: BlockStyle::Brace,
        patterns: &[
            (
                "function",
                r"^\s*(?:export\s+)?(?:async\s+)?function\s*\*?\s+([A-Za-z_$][A-Za-z0-9_$]*)",
            ),
            (
                "function",
                r"^\s*(?:export\s+)?const\s+([A-Za-z_$][A-Za-z0-9_$]*)\s*=\s*(?:async\s*)?\(",
            ),
            ("class", r"^\s*(?:export\s+)?class\s+([A-Za-z_$][A-Za-z0-9_$]*)"),
        ],
    },
    LanguageProfile {
        name: "typescript",
        extensions: &["ts", "tsx"],
        block_style: BlockStyle::Brace,
        patterns: &[
            (
                "function",
                r"^\s*(?:export\s+)?(?:async\s+)?function\s*\*?\s+([A-Za-z_$][A-Za-z0-9_$]*)",
            ),
            (
                "function",
                r"^\s*(?:export\s+)?const\s+([A-Za-z_$][A-Za-z0-9_$]*)\s*[:=].*?=>\s*\{?",
            ),
            ("class", r"^\s*(?:export\s+)?class\s+([A-Za-z_$][A-Za-z0-9_$]*)"),
            ("interface", r"^\s*(?:export\s+)?interface\s+([A-Za-z_$][A-Za-z0-9_$]*)"),
        ],
    },
    LanguageProfile {
        name: "java",
        extensions: &["java"],
        block_style: BlockStyle::Brace,
        patterns: &[
            ("class", r"^\s*(?:public|private|protected)?\s*(?:static\s+)?(?:final\s+)?class\s+([A-Za-z_][A-Za-z0-9_]*)"),
            ("interface", r"^\s*(?:public\s+)?interface\s+([A-Za-z_][A-Za-z0-9_]*)"),
            (
                "function",
                r"^\s*(?:public|private|protected)\s+(?:static\s+)?(?:final\s+)?[\w<>\[\],\s]+?\s+([A-Za-z_][A-Za-z0-9_]*)\s*\([^;]*$",
            ),
        ],
    },
    LanguageProfile {
        name: "go",
        extensions: &["go"],
        block_style: BlockStyle::Brace,
        patterns: &[
            ("function", r"^func\s+(?:\([^)]*\)\s*)?([A-Za-z_][A-Za-z0-9_]*)\s*\("),
            ("struct", r"^type\s+([A-Za-z_][A-Za-z0-9_]*)\s+struct"),
            ("interface", r"^type\s+([A-Za-z_][A-Za-z0-9_]*)\s+interface"),
        ],
    },
    LanguageProfile {
        name: "rust",
        extensions: &["rs"],
        block_style: BlockStyle::Brace,
        patterns: &[
            (
                "function",
                r"^\s*(?:pub(?:\([^)]*\))?\s+)?(?:async\s+)?fn\s+([A-Za-z_][A-Za-z0-9_]*)",
            ),
            ("struct", r"^\s*(?:pub(?:\([^)]*\))?\s+)?struct\s+([A-Za-z_][A-Za-z0-9_]*)"),
            ("trait", r"^\s*(?:pub(?:\([^)]*\))?\s+)?trait\s+([A-Za-z_][A-Za-z0-9_]*)"),
            ("enum", r"^\s*(?:pub(?:\([^)]*\))?\s+)?enum\s+([A-Za-z_][A-Za-z0-9_]*)"),
        ],
    },
    LanguageProfile {
        name: "ruby",
        extensions: &["rb"],
        block_style: BlockStyle::EndKeyword,
        patterns: &[
            ("function", r"^(\s*)def\s+(?:self\.)?([A-Za-z_][A-Za-z0-9_?!=]*)"),
            ("class", r"^(\s*)class\s+([A-Za-z_][A-Za-z0-9_]*)"),
            ("module", r"^(\s*)module\s+([A-Za-z_][A-Za-z0-9_]*)"),
        ],
    },
    LanguageProfile {
        name: "kotlin",
        extensions: &["kt", "kts"],
        block_style: BlockStyle::Brace,
        patterns: &[
            (
                "function",
                r"^\s*(?:override\s+)?(?:public|private|protected|internal\s+)?(?:suspend\s+)?fun\s+([A-Za-z_][A-Za-z0-9_]*)",
            ),
            ("class", r"^\s*(?:data\s+|open\s+|abstract\s+|sealed\s+)*class\s+([A-Za-z_][A-Za-z0-9_]*)"),
            ("interface", r"^\s*interface\s+([A-Za-z_][A-Za-z0-9_]*)"),
            ("object", r"^\s*(?:companion\s+)?object\s+([A-Za-z_][A-Za-z0-9_]*)?"),
        ],
    },
    LanguageProfile {
        name: "swift",
        extensions: &["swift"],
        block_style: BlockStyle::Brace,
        patterns: &[
            (
                "function",
                r"^\s*(?:public|private|internal|fileprivate|open)?\s*(?:static\s+)?func\s+([A-Za-z_][A-Za-z0-9_]*)",
            ),
            ("class", r"^\s*(?:public|private|internal|open)?\s*class\s+([A-Za-z_][A-Za-z0-9_]*)"),
            ("struct", r"^\s*(?:public|private|internal)?\s*struct\s+([A-Za-z_][A-Za-z0-9_]*)"),
            ("protocol", r"^\s*(?:public|private|internal)?\s*protocol\s+([A-Za-z_][A-Za-z0-9_]*)"),
        ],
    },
];

/// Whether `path`'s extension maps to a supported language.
#[must_use]
pub fn can_parse(path: &Path) -> bool {
    language_for(path).is_some()
}

fn language_for(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?;
    PROFILES
        .iter()
        .find(|p| p.extensions.contains(&ext))
        .map(|p| p.name)
}

/// Parse `content` (the current on-disk text of `path`) into an ordered
/// sequence of [`SemanticUnit`]s. Never errors on malformed source — it
/// returns whatever units it can find. Errors only for an unsupported
/// extension.
pub fn parse_file(path: &Path, content: &str) -> Result<Vec<SemanticUnit>> {
    let Some(language) = language_for(path) else {
        return Err(Error::Validation(format!(
            "no parser registered for {}",
            path.display()
        )));
    };
    let profile = profile_for(language).expect("language_for only returns registered languages");
    let file_path = path.to_string_lossy().to_string();
    Ok(extract_units(&file_path, profile, content))
}

fn extract_units(file_path: &str, profile: &LanguageProfile, content: &str) -> Vec<SemanticUnit> {
    let lines: Vec<&str> = content.lines().collect();
    let mut units = Vec::new();

    for (idx, line) in lines.iter().enumerate() {
        for (unit_type, pattern) in profile.patterns {
            let re = compiled_pattern(pattern);
            let Some(captures) = re.captures(line) else {
                continue;
            };
            let Some(name) = captures
                .iter()
                .skip(1)
                .filter_map(|m| m)
                .last()
                .map(|m| m.as_str().to_string())
            else {
                continue;
            };
            if name.is_empty() {
                continue;
            }
            let indent = leading_whitespace(line);
            let end_idx = block_end(&lines, idx, profile.block_style, indent);
            let body_lines = &lines[idx..=end_idx];
            let body = body_lines.join("\n");
            if body.trim().is_empty() {
                continue;
            }
            units.push(SemanticUnit {
                file_path: file_path.to_string(),
                language: profile.name.to_string(),
                unit_type: (*unit_type).to_string(),
                unit_name: name,
                content: body,
                start_line: idx + 1,
                end_line: end_idx + 1,
                signature: Some(line.trim().to_string()),
            });
            break;
        }
    }
    units
}

fn compiled_pattern(pattern: &str) -> Regex {
    // Patterns are a small fixed set re-parsed per call; correctness over a
    // cache here since `parse_file` already runs off the I/O scheduler.
    Regex::new(pattern).unwrap_or_else(|_| regex_once!(r"$^").clone())
}

fn leading_whitespace(line: &str) -> usize {
    line.len() - line.trim_start().len()
}

fn block_end(lines: &[&str], start: usize, style: BlockStyle, def_indent: usize) -> usize {
    match style {
        BlockStyle::Brace => brace_block_end(lines, start),
        BlockStyle::Indent => indent_block_end(lines, start, def_indent),
        BlockStyle::EndKeyword => end_keyword_block_end(lines, start),
    }
}

fn brace_block_end(lines: &[&str], start: usize) -> usize {
    let mut depth = 0i32;
    let mut seen_open = false;
    for (offset, line) in lines[start..].iter().enumerate() {
        for ch in line.chars() {
            match ch {
                '{' => {
                    depth += 1;
                    seen_open = true;
                }
                '}' => depth -= 1,
                _ => {}
            }
        }
        if seen_open && depth <= 0 {
            return start + offset;
        }
    }
    // No balanced close found (truncated/syntactically invalid source):
    // take just the signature line rather than swallow the rest of the file.
    start
}

fn indent_block_end(lines: &[&str], start: usize, def_indent: usize) -> usize {
    let mut last_nonblank = start;
    for (offset, line) in lines[start + 1..].iter().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        if leading_whitespace(line) <= def_indent {
            return last_nonblank;
        }
        last_nonblank = start + 1 + offset;
    }
    last_nonblank
}

fn end_keyword_block_end(lines: &[&str], start: usize) -> usize {
    let mut depth = 0i32;
    for (offset, line) in lines[start..].iter().enumerate() {
        let trimmed = line.trim();
        if offset > 0
            && (trimmed.starts_with("def ")
                || trimmed.starts_with("class ")
                || trimmed.starts_with("module ")
                || trimmed.starts_with("do")
                || trimmed.starts_with("if ")
                || trimmed.starts_with("unless ")
                || trimmed.starts_with("while "))
        {
            depth += 1;
        }
        if trimmed == "end" || trimmed.starts_with("end ") || trimmed.starts_with("end.") {
            if depth == 0 {
                return start + offset;
            }
            depth -= 1;
        }
    }
    start
}

/// A parse error at the `can_parse`/`parse_file` boundary; empty queries
/// reuse the shared validation message for consistency with the rest of the
/// crate's validation errors.
#[must_use]
pub fn empty_query_message() -> &'static str {
    EMPTY_QUERY
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn can_parse_recognizes_registered_extensions() {
        assert!(can_parse(Path::new("a.py")));
        assert!(can_parse(Path::new("a.rs")));
        assert!(can_parse(Path::new("a.kt")));
        assert!(!can_parse(Path::new("a.exe")));
    }

    #[test]
    fn empty_file_yields_zero_units() {
        let units = parse_file(Path::new("a.py"), "").unwrap();
        assert!(units.is_empty());
    }

    #[test]
    fn comment_only_file_yields_zero_units() {
        let units = parse_file(Path::new("a.py"), "# just a comment\n# another\n").unwrap();
        assert!(units.is_empty());
    }

    #[test]
    fn python_function_is_extracted_with_span() {
        let content = "def authenticate(user):\n    return validate(user)\n";
        let units = parse_file(Path::new("auth.py"), content).unwrap();
        assert_eq!(units.len(), 1);
        let unit = &units[0];
        assert_eq!(unit.unit_name, "authenticate");
        assert_eq!(unit.unit_type, "function");
        assert_eq!(unit.start_line, 1);
        assert_eq!(unit.end_line, 2);
        assert!(unit.content.contains("validate"));
    }

    #[test]
    fn rust_function_balances_braces() {
        let content = "pub fn add(a: i32, b: i32) -> i32 {\n    a + b\n}\n";
        let units = parse_file(Path::new("lib.rs"), content).unwrap();
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].unit_name, "add");
        assert_eq!(units[0].start_line, 1);
        assert_eq!(units[0].end_line, 3);
    }

    #[test]
    fn ruby_method_ends_at_matching_end() {
        let content = "class Calculator\n  def add(a, b)\n    a + b\n  end\nend\n";
        let units = parse_file(Path::new("calc.rb"), content).unwrap();
        let method = units.iter().find(|u| u.unit_name == "add").unwrap();
        assert_eq!(method.start_line, 2);
        assert_eq!(method.end_line, 4);
        let class = units.iter().find(|u| u.unit_name == "Calculator").unwrap();
        assert_eq!(class.start_line, 1);
        assert_eq!(class.end_line, 5);
    }

    #[test]
    fn kotlin_function_and_class_are_extracted() {
        let content = "fun greet(person: String) {\n    println(person)\n}\n\nclass Shape(var color: String) {\n    fun draw() {\n        println(color)\n    }\n}\n";
        let units = parse_file(Path::new("Shape.kt"), content).unwrap();
        assert!(units.iter().any(|u| u.unit_name == "greet" && u.unit_type == "function"));
        assert!(units.iter().any(|u| u.unit_name == "Shape" && u.unit_type == "class"));
        assert!(units.iter().any(|u| u.unit_name == "draw"));
    }

    #[test]
    fn unsupported_extension_errors() {
        assert!(parse_file(Path::new("a.exe"), "whatever").is_err());
    }

    #[test]
    fn truncated_brace_block_does_not_swallow_whole_file() {
        let content = "fn broken(a: i32 {\n    a\n";
        let units = parse_file(Path::new("lib.rs"), content).unwrap();
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].start_line, units[0].end_line);
    }

    #[test]
    fn reparsing_same_content_is_deterministic() {
        let content = "def foo():\n    pass\n";
        let a = parse_file(Path::new("a.py"), content).unwrap();
        let b = parse_file(Path::new("a.py"), content).unwrap();
        assert_eq!(a, b);
    }
}

use grep::regex::RegexMatcher;
use grep::searcher::{Searcher, Sink, SinkMatch};
use std::error::Error;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

// Directories holding the crate's own Rust sources. Nothing else is linted.
const SOURCE_ROOTS: [&str; 4] = ["screen", "cli", "tests", "benches"];

const FORBIDDEN_COMMENT_WORDS: [&str; 14] = [
    "FIXED",
    "CORRECTED",
    "FIX",
    "FIXES",
    "NEW",
    "CHANGED",
    "CHANGES",
    "CHANGE",
    "MODIFIED",
    "MODIFIES",
    "MODIFY",
    "UPDATED",
    "UPDATES",
    "UPDATE",
];

/// One source policy: a line-level regex plus a filter over the lines it matches.
#[derive(Clone, Copy)]
enum Rule {
    UnderscorePrefix,
    ForbiddenCommentWord,
    StarsInComment,
    AllCapsComment,
    AllowDeadCode,
}

impl Rule {
    const ALL: [Rule; 5] = [
        Rule::UnderscorePrefix,
        Rule::ForbiddenCommentWord,
        Rule::StarsInComment,
        Rule::AllCapsComment,
        Rule::AllowDeadCode,
    ];

    fn pattern(self) -> String {
        match self {
            Rule::UnderscorePrefix => r"\b(_[a-zA-Z0-9_]+)\b".to_string(),
            Rule::ForbiddenCommentWord => {
                format!(r"(//|/\*).*(?:{})", FORBIDDEN_COMMENT_WORDS.join("|"))
            }
            Rule::StarsInComment => r"(//|/\*).*\*\*".to_string(),
            Rule::AllCapsComment => r"(//|/\*).*".to_string(),
            Rule::AllowDeadCode => r"#\s*\[\s*allow\s*\(\s*dead_code\s*\)\s*\]".to_string(),
        }
    }

    fn description(self) -> &'static str {
        match self {
            Rule::UnderscorePrefix => "underscore-prefixed identifiers",
            Rule::ForbiddenCommentWord => "comments containing edit markers",
            Rule::StarsInComment => "'**' in non-doc comments",
            Rule::AllCapsComment => "comments written entirely in uppercase",
            Rule::AllowDeadCode => "#[allow(dead_code)] attributes",
        }
    }

    fn remedy(self) -> &'static str {
        match self {
            Rule::UnderscorePrefix => {
                "Either use the binding (removing the underscore) or remove it completely."
            }
            Rule::ForbiddenCommentWord => {
                "Describe what the code does, not how it came to be. Remove the marker."
            }
            Rule::StarsInComment => "Bold markup belongs in doc comments only.",
            Rule::AllCapsComment => "Strongly consider deleting the comment completely.",
            Rule::AllowDeadCode => "Either use the code (removing the attribute) or remove it.",
        }
    }

    /// Whether a line the regex matched is a real violation.
    fn is_violation(self, line: &str) -> bool {
        match self {
            Rule::UnderscorePrefix => !is_comment(line) && !underscore_only_in_strings(line),
            Rule::ForbiddenCommentWord => true,
            Rule::StarsInComment => !is_doc_comment(line),
            Rule::AllCapsComment => comment_text(line).is_some_and(|text| {
                let mut letters = text.chars().filter(|c| c.is_alphabetic()).peekable();
                letters.peek().is_some() && letters.all(|c| c.is_uppercase())
            }),
            Rule::AllowDeadCode => true,
        }
    }
}

// Collects every violating line of a single file for one rule.
struct RuleCollector {
    rule: Rule,
    file_path: PathBuf,
    violations: Vec<String>,
}

impl RuleCollector {
    fn new(rule: Rule, file_path: &Path) -> Self {
        Self {
            rule,
            file_path: file_path.to_path_buf(),
            violations: Vec::new(),
        }
    }

    fn check_and_get_error_message(&self) -> Option<String> {
        if self.violations.is_empty() {
            return None;
        }

        let file_name = self.file_path.to_str().unwrap_or("?");
        let mut error_msg = format!(
            "\n❌ ERROR: Found {} {} in {}:\n",
            self.violations.len(),
            self.rule.description(),
            file_name
        );
        for violation in &self.violations {
            error_msg.push_str(&format!("   {violation}\n"));
        }
        error_msg.push_str(&format!(
            "\n⚠️ These are not allowed in this project.\n   {}\n",
            self.rule.remedy()
        ));
        Some(error_msg)
    }
}

impl Sink for RuleCollector {
    type Error = std::io::Error;

    fn matched(&mut self, _: &Searcher, mat: &SinkMatch) -> Result<bool, Self::Error> {
        let line_number = mat.line_number().unwrap_or(0);
        let line_text = std::str::from_utf8(mat.bytes()).unwrap_or("").trim_end();

        if self.rule.is_violation(line_text) {
            self.violations.push(format!("{line_number}:{line_text}"));
        }
        Ok(true)
    }
}

fn is_comment(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.starts_with("//") || trimmed.starts_with("/*")
}

fn is_doc_comment(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.starts_with("///") || trimmed.starts_with("//!")
}

// Underscores that only appear between double quotes belong to string literals.
fn underscore_only_in_strings(line: &str) -> bool {
    line.contains('"')
        && line
            .split('"')
            .enumerate()
            .filter(|(i, _)| i % 2 == 0)
            .all(|(_, outside)| {
                !outside
                    .split(|c: char| !c.is_alphanumeric() && c != '_')
                    .any(|word| word.starts_with('_') && word.len() > 1)
            })
}

fn comment_text(line: &str) -> Option<&str> {
    let trimmed = line.trim_start();
    for prefix in ["///", "//!", "//"] {
        if let Some(rest) = trimmed.strip_prefix(prefix) {
            return Some(rest.trim());
        }
    }
    let start = line.find("/*")?;
    let rest = &line[start + 2..];
    Some(match rest.find("*/") {
        Some(end) => rest[..end].trim(),
        None => rest.trim(),
    })
}

fn rust_sources() -> Vec<PathBuf> {
    SOURCE_ROOTS
        .iter()
        .flat_map(|root| WalkDir::new(root).into_iter().filter_map(|e| e.ok()))
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "rs"))
        .map(|e| e.into_path())
        .collect()
}

fn lint_sources() -> Result<(), Box<dyn Error>> {
    let sources = rust_sources();
    let mut searcher = Searcher::new();

    for rule in Rule::ALL {
        let matcher = RegexMatcher::new_line_matcher(&rule.pattern())?;
        for path in &sources {
            let mut collector = RuleCollector::new(rule, path);
            searcher.search_path(&matcher, path, &mut collector)?;
            if let Some(error_message) = collector.check_and_get_error_message() {
                return Err(error_message.into());
            }
        }
    }
    Ok(())
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    for root in SOURCE_ROOTS {
        println!("cargo:rerun-if-changed={root}");
    }

    // The eprintln! output is what cargo shows when the build fails.
    if let Err(e) = lint_sources() {
        eprintln!("{e}");
        std::process::exit(1);
    }
}

//! Pattern-based symbol extraction for source files.
//!
//! Each [`Language`] maps to a [`PatternSet`] of line-anchored regexes for
//! function/method declarations, class-like declarations and imports. This is
//! not a parser: it finds declarations that start a line, which covers the
//! overwhelming majority of real code.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};

use super::detect::Language;
use super::tasks::{extract_marker_tasks, Task};

/// A named declaration and the line it starts on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symbol {
    pub name: String,
    /// 1-based
    pub line: usize,
}

/// Everything extracted from one source file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CodeDoc {
    pub functions: Vec<Symbol>,
    pub classes: Vec<Symbol>,
    pub imports: Vec<String>,
    pub tasks: Vec<Task>,
}

/// Compiled patterns for one language. Every regex captures `name`.
pub struct PatternSet {
    pub functions: Vec<Regex>,
    pub classes: Vec<Regex>,
    pub imports: Vec<Regex>,
    /// Grouped imports such as Go's `import ( ... )`, captured as `block`.
    pub import_block: Option<Regex>,
}

// Names a loose method pattern can pick up from control flow.
const KEYWORDS: &[&str] = &[
    "if", "else", "elif", "for", "foreach", "while", "do", "switch", "case", "return", "catch",
    "try", "sizeof", "new", "delete", "throw", "function", "with", "match", "until", "unless",
];

static QUOTED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""([^"]+)""#).expect("valid quoted string regex"));

static PATTERNS: Lazy<HashMap<Language, PatternSet>> = Lazy::new(|| {
    Language::ALL
        .iter()
        .map(|lang| (*lang, build_patterns(*lang)))
        .collect()
});

fn compile(sources: &[&str]) -> Vec<Regex> {
    sources
        .iter()
        .map(|src| Regex::new(src).expect("valid language pattern"))
        .collect()
}

const C_FUNCTION: &str = r"(?m)^(?:(?:static|inline|extern|const|unsigned|signed|volatile|struct|enum)[ \t]+)*[A-Za-z_]\w*[ \t\*]+(?P<name>[A-Za-z_]\w*)[ \t]*\([^;{}\n]*\)[ \t]*\{?[ \t\r]*$";
const C_INCLUDE: &str = r#"(?m)^[ \t]*#[ \t]*include[ \t]*[<"](?P<name>[^>"\n]+)[>"]"#;

fn build_patterns(lang: Language) -> PatternSet {
    match lang {
        Language::Python => PatternSet {
            functions: compile(&[r"(?m)^[ \t]*(?:async[ \t]+)?def[ \t]+(?P<name>[A-Za-z_]\w*)[ \t]*\("]),
            classes: compile(&[r"(?m)^[ \t]*class[ \t]+(?P<name>[A-Za-z_]\w*)"]),
            imports: compile(&[
                r"(?m)^[ \t]*import[ \t]+(?P<name>[\w.]+(?:[ \t]+as[ \t]+\w+)?(?:[ \t]*,[ \t]*[\w.]+(?:[ \t]+as[ \t]+\w+)?)*)",
                r"(?m)^[ \t]*from[ \t]+(?P<name>[\w.]+)[ \t]+import\b",
            ]),
            import_block: None,
        },
        Language::Rust => PatternSet {
            functions: compile(&[
                r#"(?m)^[ \t]*(?:pub(?:\([^)\n]*\))?[ \t]+)?(?:default[ \t]+)?(?:const[ \t]+)?(?:async[ \t]+)?(?:unsafe[ \t]+)?(?:extern[ \t]+"[^"\n]*"[ \t]+)?fn[ \t]+(?P<name>[A-Za-z_]\w*)"#,
            ]),
            classes: compile(&[
                r"(?m)^[ \t]*(?:pub(?:\([^)\n]*\))?[ \t]+)?(?:unsafe[ \t]+)?(?:struct|enum|trait|union)[ \t]+(?P<name>[A-Za-z_]\w*)",
            ]),
            imports: compile(&[
                r"(?m)^[ \t]*(?:pub(?:\([^)\n]*\))?[ \t]+)?use[ \t]+(?:::)?(?P<name>[A-Za-z_][\w:]*)",
                r"(?m)^[ \t]*extern[ \t]+crate[ \t]+(?P<name>\w+)",
            ]),
            import_block: None,
        },
        Language::JavaScript => PatternSet {
            functions: compile(&[
                r"(?m)^[ \t]*(?:export[ \t]+)?(?:default[ \t]+)?(?:async[ \t]+)?function\*?[ \t]*(?P<name>[A-Za-z_$][\w$]*)",
                r"(?m)^[ \t]*(?:export[ \t]+)?(?:const|let|var)[ \t]+(?P<name>[A-Za-z_$][\w$]*)[ \t]*=[ \t]*(?:async[ \t]+)?(?:function\b|\([^)\n]*\)[ \t]*=>|[A-Za-z_$][\w$]*[ \t]*=>)",
                r"(?m)^[ \t]+(?:static[ \t]+)?(?:async[ \t]+)?(?P<name>[A-Za-z_$][\w$]*)[ \t]*\([^)\n]*\)[ \t]*\{",
            ]),
            classes: compile(&[
                r"(?m)^[ \t]*(?:export[ \t]+)?(?:default[ \t]+)?class[ \t]+(?P<name>[A-Za-z_$][\w$]*)",
            ]),
            imports: compile(&[
                r#"(?m)^[ \t]*import[ \t]+(?:[^'";]*?[ \t]+from[ \t]+)?['"](?P<name>[^'"\n]+)['"]"#,
                r#"\brequire\([ \t]*['"](?P<name>[^'"\n]+)['"][ \t]*\)"#,
            ]),
            import_block: None,
        },
        Language::TypeScript => PatternSet {
            functions: compile(&[
                r"(?m)^[ \t]*(?:export[ \t]+)?(?:default[ \t]+)?(?:declare[ \t]+)?(?:async[ \t]+)?function\*?[ \t]*(?P<name>[A-Za-z_$][\w$]*)",
                r"(?m)^[ \t]*(?:export[ \t]+)?(?:const|let|var)[ \t]+(?P<name>[A-Za-z_$][\w$]*)[ \t]*(?::[^=\n]+)?=[ \t]*(?:async[ \t]+)?(?:function\b|(?:<[^>\n]*>)?\([^)\n]*\)[ \t]*(?::[^=\n]+)?=>|[A-Za-z_$][\w$]*[ \t]*=>)",
                r"(?m)^[ \t]+(?:(?:public|private|protected|static|readonly|abstract|async|override)[ \t]+)*(?P<name>[A-Za-z_$][\w$]*)[ \t]*(?:<[^>\n]*>)?\([^)\n]*\)[ \t]*(?::[^{;\n]+)?\{",
            ]),
            classes: compile(&[
                r"(?m)^[ \t]*(?:export[ \t]+)?(?:default[ \t]+)?(?:declare[ \t]+)?(?:abstract[ \t]+)?(?:class|interface|enum)[ \t]+(?P<name>[A-Za-z_$][\w$]*)",
                r"(?m)^[ \t]*(?:export[ \t]+)?(?:declare[ \t]+)?type[ \t]+(?P<name>[A-Za-z_$][\w$]*)[ \t]*(?:<[^>\n]*>)?[ \t]*=",
            ]),
            imports: compile(&[
                r#"(?m)^[ \t]*import[ \t]+(?:type[ \t]+)?(?:[^'";]*?[ \t]+from[ \t]+)?['"](?P<name>[^'"\n]+)['"]"#,
                r#"\brequire\([ \t]*['"](?P<name>[^'"\n]+)['"][ \t]*\)"#,
            ]),
            import_block: None,
        },
        Language::Go => PatternSet {
            functions: compile(&[r"(?m)^func[ \t]+(?:\([^)\n]*\)[ \t]*)?(?P<name>[A-Za-z_]\w*)"]),
            classes: compile(&[r"(?m)^type[ \t]+(?P<name>[A-Za-z_]\w*)[ \t]+(?:struct|interface)\b"]),
            imports: compile(&[r#"(?m)^import[ \t]+(?:[A-Za-z_.]\w*[ \t]+)?"(?P<name>[^"\n]+)""#]),
            import_block: Some(
                Regex::new(r"(?ms)^import[ \t]*\((?P<block>.*?)\)").expect("valid go import block regex"),
            ),
        },
        Language::Java => PatternSet {
            functions: compile(&[
                r"(?m)^[ \t]*(?:(?:public|protected|private|static|final|abstract|synchronized|native|default|strictfp)[ \t]+)+(?:<[^>\n]+>[ \t]+)?[\w<>\[\],.?]+(?:[ \t]*<[^>\n]*>)?(?:\[\])*[ \t]+(?P<name>[A-Za-z_]\w*)[ \t]*\(",
            ]),
            classes: compile(&[
                r"(?m)^[ \t]*(?:(?:public|protected|private|static|final|abstract|sealed|non-sealed|strictfp)[ \t]+)*(?:class|interface|enum|record|@interface)[ \t]+(?P<name>[A-Za-z_]\w*)",
            ]),
            imports: compile(&[r"(?m)^[ \t]*import[ \t]+(?:static[ \t]+)?(?P<name>[\w.]+(?:\.\*)?)[ \t]*;"]),
            import_block: None,
        },
        Language::C => PatternSet {
            functions: compile(&[C_FUNCTION]),
            classes: compile(&[
                r"(?m)^[ \t]*(?:typedef[ \t]+)?(?:struct|union|enum)[ \t]+(?P<name>[A-Za-z_]\w*)[ \t]*\{?[ \t\r]*$",
            ]),
            imports: compile(&[C_INCLUDE]),
            import_block: None,
        },
        Language::Cpp => PatternSet {
            functions: compile(&[
                r"(?m)^(?:(?:static|inline|extern|const|unsigned|signed|virtual|constexpr|explicit|struct|enum)[ \t]+)*[A-Za-z_][\w:<>]*[ \t\*&]+(?:[A-Za-z_]\w*::)*(?P<name>[A-Za-z_]\w*)[ \t]*\([^;{}\n]*\)[ \t]*(?:const[ \t]*)?(?:noexcept[ \t]*)?(?:override[ \t]*)?\{?[ \t\r]*$",
            ]),
            classes: compile(&[
                r"(?m)^[ \t]*(?:template[ \t]*<[^>\n]*>[ \t]*)?(?:typedef[ \t]+)?(?:class|struct|union|enum(?:[ \t]+class)?)[ \t]+(?P<name>[A-Za-z_]\w*)[^;\n]*$",
            ]),
            imports: compile(&[C_INCLUDE]),
            import_block: None,
        },
        Language::Ruby => PatternSet {
            functions: compile(&[r"(?m)^[ \t]*def[ \t]+(?:self\.)?(?P<name>[A-Za-z_]\w*[?!=]?)"]),
            classes: compile(&[r"(?m)^[ \t]*(?:class|module)[ \t]+(?P<name>[A-Z]\w*(?:::[A-Z]\w*)*)"]),
            imports: compile(&[r#"(?m)^[ \t]*require(?:_relative)?[ \t]*\(?[ \t]*['"](?P<name>[^'"\n]+)['"]"#]),
            import_block: None,
        },
    }
}

/// Pattern set for a language.
pub fn patterns_for(lang: Language) -> Option<&'static PatternSet> {
    PATTERNS.get(&lang)
}

/// Extract symbols, imports and tasks from source text.
pub fn parse_code(lang: Language, content: &str) -> CodeDoc {
    let Some(patterns) = patterns_for(lang) else {
        return CodeDoc::default();
    };
    let lines = LineIndex::new(content);

    CodeDoc {
        functions: collect_symbols(&patterns.functions, content, &lines),
        classes: collect_symbols(&patterns.classes, content, &lines),
        imports: collect_imports(patterns, content),
        tasks: extract_marker_tasks(content),
    }
}

fn collect_symbols(patterns: &[Regex], content: &str, lines: &LineIndex) -> Vec<Symbol> {
    let mut found: Vec<Symbol> = Vec::new();
    for re in patterns {
        for caps in re.captures_iter(content) {
            let Some(name) = caps.name("name") else {
                continue;
            };
            if KEYWORDS.contains(&name.as_str()) {
                continue;
            }
            found.push(Symbol {
                name: name.as_str().to_string(),
                line: lines.line_of(name.start()),
            });
        }
    }

    // Duplicate names keep the earliest declaration.
    found.sort_by(|a, b| a.line.cmp(&b.line).then_with(|| a.name.cmp(&b.name)));
    let mut seen = HashSet::new();
    found.retain(|s| seen.insert(s.name.clone()));
    found
}

fn collect_imports(patterns: &PatternSet, content: &str) -> Vec<String> {
    let mut modules = BTreeSet::new();
    for re in &patterns.imports {
        for caps in re.captures_iter(content) {
            if let Some(name) = caps.name("name") {
                for module in split_import_list(name.as_str()) {
                    modules.insert(module);
                }
            }
        }
    }
    if let Some(block_re) = &patterns.import_block {
        for caps in block_re.captures_iter(content) {
            if let Some(block) = caps.name("block") {
                for quoted in QUOTED_RE.captures_iter(block.as_str()) {
                    if let Some(path) = quoted.get(1) {
                        modules.insert(path.as_str().to_string());
                    }
                }
            }
        }
    }
    modules.into_iter().collect()
}

/// `a.b as c, d` becomes `[a.b, d]`; `std::{x, y}` prefixes lose trailing `::`.
fn split_import_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .filter_map(|part| part.split_whitespace().next())
        .map(|module| module.trim_end_matches(':').to_string())
        .filter(|module| !module.is_empty())
        .collect()
}

/// Byte offset to 1-based line number.
struct LineIndex {
    starts: Vec<usize>,
}

impl LineIndex {
    fn new(content: &str) -> Self {
        let mut starts = vec![0];
        starts.extend(content.match_indices('\n').map(|(i, _)| i + 1));
        Self { starts }
    }

    fn line_of(&self, offset: usize) -> usize {
        match self.starts.binary_search(&offset) {
            Ok(idx) => idx + 1,
            Err(idx) => idx,
        }
    }
}

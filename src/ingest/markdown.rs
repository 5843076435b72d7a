//! Markdown metadata extraction.
//!
//! Pulls frontmatter tags, inline tags, wikilinks, embeds, heading counts and
//! tasks out of a note. Fenced code blocks and inline code spans are opaque:
//! nothing inside them is extracted.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

use super::tasks::{checkbox_task, marker_task, Task};

/// Everything extracted from one markdown document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarkdownDoc {
    pub tags: Vec<String>,
    pub links: Vec<String>,
    pub embeds: Vec<String>,
    /// Count of headings per level, index 0 is `#`.
    pub headings: [u32; 6],
    pub tasks: Vec<Task>,
}

static INLINE_TAG_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|[^\w&/#])#([A-Za-z][\w/-]*)").expect("valid inline tag regex")
});

/// Parse a markdown document.
pub fn parse_markdown(content: &str) -> MarkdownDoc {
    let content = content.trim_start_matches('\u{feff}');
    let mut doc = MarkdownDoc::default();
    let mut tags = BTreeSet::new();
    let mut links = BTreeSet::new();
    let mut embeds = BTreeSet::new();

    let (frontmatter, body_start) = match extract_frontmatter(content) {
        Some((fields, end_line)) => (Some(fields), end_line),
        None => (None, 0),
    };
    if let Some(fields) = &frontmatter {
        tags.extend(frontmatter_tags(fields));
    }

    let mut fence: Option<(char, usize)> = None;
    for (idx, line) in content.lines().enumerate() {
        let line_no = idx + 1;
        if line_no <= body_start {
            continue;
        }

        if let Some(open) = fence {
            if closes_fence(line, open) {
                fence = None;
            }
            continue;
        }
        if let Some(open) = opens_fence(line) {
            fence = Some(open);
            continue;
        }

        if let Some(level) = heading_level(line) {
            doc.headings[level - 1] += 1;
        }

        if let Some(task) = checkbox_task(line, line_no).or_else(|| marker_task(line, line_no)) {
            doc.tasks.push(task);
        }

        let visible = strip_code_spans(line);
        for caps in INLINE_TAG_RE.captures_iter(&visible) {
            if let Some(tag) = caps.get(1) {
                let tag = tag.as_str().trim_end_matches('/');
                if !tag.is_empty() {
                    tags.insert(tag.to_string());
                }
            }
        }
        for link in extract_wikilinks(&visible) {
            if link.embed {
                embeds.insert(link.target);
            } else {
                links.insert(link.target);
            }
        }
    }

    doc.tags = tags.into_iter().collect();
    doc.links = links.into_iter().collect();
    doc.embeds = embeds.into_iter().collect();
    doc
}

/// Extract YAML frontmatter from the start of a document.
///
/// Returns the fields and the 1-based line of the closing delimiter. Missing,
/// empty, unterminated or non-mapping frontmatter yields `None`.
pub fn extract_frontmatter(input: &str) -> Option<(BTreeMap<String, Value>, usize)> {
    let mut lines = input.lines();
    let first = lines.next()?.trim_start_matches('\u{feff}').trim_end();
    if first != "---" {
        return None;
    }

    let mut yaml_lines: Vec<&str> = Vec::new();
    let mut end_line = 1usize;
    let mut closed = false;
    for line in lines {
        end_line += 1;
        let trimmed = line.trim_end();
        if trimmed == "---" || trimmed == "..." {
            closed = true;
            break;
        }
        yaml_lines.push(line);
    }
    if !closed || yaml_lines.is_empty() {
        return None;
    }

    let raw_yaml = yaml_lines.join("\n");
    match parse_yaml_to_json_map(&raw_yaml) {
        Some(map) => Some((map, end_line)),
        None => {
            tracing::debug!("ignoring malformed frontmatter");
            None
        }
    }
}

fn parse_yaml_to_json_map(yaml: &str) -> Option<BTreeMap<String, Value>> {
    let yaml_value: serde_yaml::Value = serde_yaml::from_str(yaml).ok()?;
    let json_value: Value = serde_json::to_value(yaml_value).ok()?;
    match json_value {
        Value::Object(map) => Some(map.into_iter().collect()),
        _ => None,
    }
}

/// `tags` as a YAML list, or as one comma/space separated string.
fn frontmatter_tags(fields: &BTreeMap<String, Value>) -> Vec<String> {
    let raw: Vec<String> = match fields.get("tags") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| match v {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .collect(),
        Some(Value::String(s)) => s
            .split(|c: char| c == ',' || c.is_whitespace())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    };
    raw.into_iter()
        .map(|t| t.trim().trim_start_matches('#').to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

/// A wikilink target after normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WikiLink {
    pub target: String,
    pub embed: bool,
}

/// Scan one line for `[[...]]` and `![[...]]`.
pub fn extract_wikilinks(line: &str) -> Vec<WikiLink> {
    let mut out = Vec::new();
    let bytes = line.as_bytes();
    let mut i = 0usize;
    while i + 1 < bytes.len() {
        if bytes[i] == b'[' && bytes[i + 1] == b'[' {
            let embed = i > 0 && bytes[i - 1] == b'!';
            let inner_start = i + 2;
            let mut j = inner_start;
            let mut end = None;
            while j + 1 < bytes.len() {
                if bytes[j] == b']' && bytes[j + 1] == b']' {
                    end = Some(j);
                    break;
                }
                j += 1;
            }
            if let Some(end) = end {
                if let Some(target) = normalize_link_target(&line[inner_start..end]) {
                    out.push(WikiLink { target, embed });
                }
                i = end + 2;
                continue;
            }
        }
        i += 1;
    }
    out
}

/// Reduce `folder/Target.md#Heading|Alias` to `Target`.
pub fn normalize_link_target(inner: &str) -> Option<String> {
    let left = inner.split('|').next()?.trim();
    let target = left.split('#').next()?.trim();
    let target = target.rsplit('/').next()?.trim();
    let target = strip_md_suffix(target).trim();
    if target.is_empty() {
        None
    } else {
        Some(target.to_string())
    }
}

fn strip_md_suffix(name: &str) -> &str {
    let len = name.len();
    if len > 3 && name.is_char_boundary(len - 3) && name[len - 3..].eq_ignore_ascii_case(".md") {
        &name[..len - 3]
    } else {
        name
    }
}

fn heading_level(line: &str) -> Option<usize> {
    let trimmed = line.trim_start_matches(' ');
    if line.len() - trimmed.len() > 3 {
        return None;
    }
    let hashes = trimmed.bytes().take_while(|b| *b == b'#').count();
    if !(1..=6).contains(&hashes) {
        return None;
    }
    match trimmed.as_bytes().get(hashes) {
        None | Some(b' ') | Some(b'\t') => Some(hashes),
        _ => None,
    }
}

fn opens_fence(line: &str) -> Option<(char, usize)> {
    let trimmed = line.trim_start();
    let marker = trimmed.chars().next()?;
    if marker != '`' && marker != '~' {
        return None;
    }
    let run = trimmed.chars().take_while(|c| *c == marker).count();
    if run >= 3 {
        Some((marker, run))
    } else {
        None
    }
}

fn closes_fence(line: &str, (marker, len): (char, usize)) -> bool {
    let trimmed = line.trim();
    let run = trimmed.chars().take_while(|c| *c == marker).count();
    run >= len && trimmed.chars().all(|c| c == marker)
}

/// Blank out inline `code` spans so their content is not extracted.
fn strip_code_spans(line: &str) -> String {
    if !line.contains('`') {
        return line.to_string();
    }
    let mut out = String::with_capacity(line.len());
    let mut in_code = false;
    for c in line.chars() {
        if c == '`' {
            in_code = !in_code;
            out.push(' ');
        } else if in_code {
            out.push(' ');
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::tasks::TaskStatus;

    #[test]
    fn test_frontmatter_tags_list_and_string() {
        let doc = parse_markdown("---\ntags:\n  - alpha\n  - '#beta'\n---\nbody\n");
        assert_eq!(doc.tags, vec!["alpha", "beta"]);

        let doc = parse_markdown("---\ntags: one, two three\n---\n");
        assert_eq!(doc.tags, vec!["one", "three", "two"]);
    }

    #[test]
    fn test_frontmatter_with_bom_and_malformed_yaml() {
        let doc = parse_markdown("\u{feff}---\ntags: [x]\n---\n");
        assert_eq!(doc.tags, vec!["x"]);

        let doc = parse_markdown("---\ntags: [unterminated\n---\n#real\n");
        assert_eq!(doc.tags, vec!["real"]);
    }

    #[test]
    fn test_inline_tags() {
        let doc = parse_markdown("Working on #project/alpha and #todo.\nIssue#12 and #123 are not tags, nor is a#b.\n");
        assert_eq!(doc.tags, vec!["project/alpha", "todo"]);
    }

    #[test]
    fn test_url_fragments_and_entities_are_not_tags() {
        let doc = parse_markdown("see https://example.com/#section and &#x27;\n");
        assert!(doc.tags.is_empty());
    }

    #[test]
    fn test_headings_are_not_tags() {
        let doc = parse_markdown("# Title\n## Sub\n### Deep\n#hashtag\n####### seven\n");
        assert_eq!(doc.headings, [1, 1, 1, 0, 0, 0]);
        assert_eq!(doc.tags, vec!["hashtag"]);
    }

    #[test]
    fn test_wikilinks_normalized() {
        let doc = parse_markdown(
            "See [[Second]], [[folder/Third.md|alias]] and [[Fourth#Heading]].\n![[Diagram.png]] ![[Embedded]]\n",
        );
        assert_eq!(doc.links, vec!["Fourth", "Second", "Third"]);
        assert_eq!(doc.embeds, vec!["Diagram.png", "Embedded"]);
    }

    #[test]
    fn test_self_heading_link_is_dropped() {
        assert_eq!(normalize_link_target("#Only Heading"), None);
        assert_eq!(normalize_link_target("  "), None);
    }

    #[test]
    fn test_fenced_code_is_opaque() {
        let doc = parse_markdown("```python\n# comment #nottag [[NotLink]]\n# TODO: not a task\n```\nafter #real [[Real]]\n");
        assert_eq!(doc.tags, vec!["real"]);
        assert_eq!(doc.links, vec!["Real"]);
        assert!(doc.tasks.is_empty());
        assert_eq!(doc.headings, [0; 6]);
    }

    #[test]
    fn test_inline_code_is_opaque() {
        let doc = parse_markdown("use `#define` and `[[x]]` but #yes\n");
        assert_eq!(doc.tags, vec!["yes"]);
        assert!(doc.links.is_empty());
    }

    #[test]
    fn test_tasks_from_markers_and_checkboxes() {
        let doc = parse_markdown("intro\nTODO: write more\n- [ ] open item\n- [x] closed item\n");
        assert_eq!(doc.tasks.len(), 3);
        assert_eq!(doc.tasks[0].status, TaskStatus::Todo);
        assert_eq!(doc.tasks[0].line, 2);
        assert_eq!(doc.tasks[2].status, TaskStatus::Done);
        assert_eq!(doc.tasks[2].text, "closed item");
    }

    #[test]
    fn test_lowercase_todo_tag_is_not_a_task() {
        let doc = parse_markdown("#todo [[Second]]\n");
        assert!(doc.tasks.is_empty());
        assert_eq!(doc.tags, vec!["todo"]);
    }

    #[test]
    fn test_frontmatter_lines_are_skipped_for_body_extraction() {
        let doc = parse_markdown("---\ntitle: x\nnote: '#fake'\n---\nbody\n");
        assert!(doc.tags.is_empty());
    }
}

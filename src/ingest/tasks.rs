//! Task extraction shared by the markdown and code parsers.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Status stored on Task nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TaskStatus {
    Todo,
    Fixme,
    Note,
    Hack,
    Xxx,
    Done,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "TODO",
            TaskStatus::Fixme => "FIXME",
            TaskStatus::Note => "NOTE",
            TaskStatus::Hack => "HACK",
            TaskStatus::Xxx => "XXX",
            TaskStatus::Done => "DONE",
        }
    }

    fn from_marker(marker: &str) -> Option<TaskStatus> {
        match marker {
            "TODO" => Some(TaskStatus::Todo),
            "FIXME" => Some(TaskStatus::Fixme),
            "NOTE" => Some(TaskStatus::Note),
            "HACK" => Some(TaskStatus::Hack),
            "XXX" => Some(TaskStatus::Xxx),
            _ => None,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A task found in a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub text: String,
    /// 1-based
    pub line: usize,
    pub status: TaskStatus,
}

// Marker must be a whole uppercase word followed by ':' or whitespace.
static MARKER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|[^A-Za-z0-9_])(TODO|FIXME|NOTE|HACK|XXX)(?::|\s)[ \t:]*(.*)$")
        .expect("valid task marker regex")
});

static CHECKBOX_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[ \t]*(?:[-*+]|\d+[.)])[ \t]+\[([ xX])\][ \t]+(.+)$").expect("valid checkbox regex")
});

/// Extract marker tasks from a single line.
pub fn marker_task(line: &str, line_no: usize) -> Option<Task> {
    let caps = MARKER_RE.captures(line)?;
    let status = TaskStatus::from_marker(caps.get(1)?.as_str())?;
    let text = caps
        .get(2)
        .map(|m| clean_task_text(m.as_str()))
        .unwrap_or_default();
    Some(Task {
        text,
        line: line_no,
        status,
    })
}

/// Extract a markdown checkbox item from a single line.
pub fn checkbox_task(line: &str, line_no: usize) -> Option<Task> {
    let caps = CHECKBOX_RE.captures(line)?;
    let status = match caps.get(1)?.as_str() {
        " " => TaskStatus::Todo,
        _ => TaskStatus::Done,
    };
    Some(Task {
        text: clean_task_text(caps.get(2)?.as_str()),
        line: line_no,
        status,
    })
}

/// Marker tasks for every line of `content`.
pub fn extract_marker_tasks(content: &str) -> Vec<Task> {
    content
        .lines()
        .enumerate()
        .filter_map(|(idx, line)| marker_task(line, idx + 1))
        .collect()
}

fn clean_task_text(raw: &str) -> String {
    raw.trim()
        .trim_end_matches("*/")
        .trim_end_matches("-->")
        .trim()
        .to_string()
}

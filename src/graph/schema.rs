//! Graph schema: node labels and relationship types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Node labels stored in the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NodeLabel {
    Note,
    Code,
    Tag,
    Function,
    Class,
    Module,
    Project,
    Task,
}

impl NodeLabel {
    pub const ALL: [NodeLabel; 8] = [
        NodeLabel::Note,
        NodeLabel::Code,
        NodeLabel::Tag,
        NodeLabel::Function,
        NodeLabel::Class,
        NodeLabel::Module,
        NodeLabel::Project,
        NodeLabel::Task,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeLabel::Note => "Note",
            NodeLabel::Code => "Code",
            NodeLabel::Tag => "Tag",
            NodeLabel::Function => "Function",
            NodeLabel::Class => "Class",
            NodeLabel::Module => "Module",
            NodeLabel::Project => "Project",
            NodeLabel::Task => "Task",
        }
    }

    pub fn parse(s: &str) -> Option<NodeLabel> {
        NodeLabel::ALL.into_iter().find(|l| l.as_str() == s)
    }
}

impl fmt::Display for NodeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Relationship types stored in the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EdgeType {
    LinksTo,
    Embeds,
    Tagged,
    HasTask,
    Defines,
    Imports,
    Contains,
}

impl EdgeType {
    pub const ALL: [EdgeType; 7] = [
        EdgeType::LinksTo,
        EdgeType::Embeds,
        EdgeType::Tagged,
        EdgeType::HasTask,
        EdgeType::Defines,
        EdgeType::Imports,
        EdgeType::Contains,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeType::LinksTo => "LINKS_TO",
            EdgeType::Embeds => "EMBEDS",
            EdgeType::Tagged => "TAGGED",
            EdgeType::HasTask => "HAS_TASK",
            EdgeType::Defines => "DEFINES",
            EdgeType::Imports => "IMPORTS",
            EdgeType::Contains => "CONTAINS",
        }
    }

    pub fn parse(s: &str) -> Option<EdgeType> {
        EdgeType::ALL.into_iter().find(|e| e.as_str() == s)
    }
}

impl fmt::Display for EdgeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The two labels a file can be indexed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileLabel {
    Note,
    Code,
}

impl FileLabel {
    pub fn node_label(&self) -> NodeLabel {
        match self {
            FileLabel::Note => NodeLabel::Note,
            FileLabel::Code => NodeLabel::Code,
        }
    }

    pub fn as_str(&self) -> &'static str {
        self.node_label().as_str()
    }

    /// Outgoing edge types whose full set is replaced on each re-index.
    pub fn owned_edges(&self) -> &'static [EdgeType] {
        match self {
            FileLabel::Note => &[EdgeType::LinksTo, EdgeType::Embeds, EdgeType::Tagged],
            FileLabel::Code => &[EdgeType::Defines, EdgeType::Imports],
        }
    }

    /// Edge types whose far endpoints are owned and deleted with the file.
    pub fn owned_node_edges(&self) -> &'static [EdgeType] {
        match self {
            FileLabel::Note => &[EdgeType::HasTask],
            FileLabel::Code => &[EdgeType::HasTask, EdgeType::Defines],
        }
    }
}

/// Kinds of definitions a Code node owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DefinitionKind {
    Function,
    Class,
}

impl DefinitionKind {
    pub fn node_label(&self) -> NodeLabel {
        match self {
            DefinitionKind::Function => NodeLabel::Function,
            DefinitionKind::Class => NodeLabel::Class,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip() {
        for label in NodeLabel::ALL {
            assert_eq!(NodeLabel::parse(label.as_str()), Some(label));
        }
        for edge in EdgeType::ALL {
            assert_eq!(EdgeType::parse(edge.as_str()), Some(edge));
        }
        assert_eq!(NodeLabel::parse("File"), None);
    }

    #[test]
    fn test_defines_is_both_owned_edge_and_owned_node_edge_for_code() {
        assert!(FileLabel::Code.owned_edges().contains(&EdgeType::Defines));
        assert!(FileLabel::Code.owned_node_edges().contains(&EdgeType::Defines));
        assert!(!FileLabel::Note.owned_edges().contains(&EdgeType::HasTask));
    }
}

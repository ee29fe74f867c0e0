//! Declarative grammar trees loaded from JSON descriptors.
//!
//! One descriptor per statement action describes the valid token
//! sequences as a tree of keyword / value / date-time nodes. Trees are
//! loaded once at startup, stored in an index-addressed arena with
//! parent back-links, and shared read-only by every document.

use serde::Deserialize;

use crate::keywords::match_keyword;

/// Index of a node inside its tree's arena.
pub type NodeId = usize;

/// Role of a grammar node, resolved from the descriptor's optional
/// fields once at load time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// One or more synonym keyphrases, each independently matchable.
    Keyword { synonyms: Vec<String> },
    /// A user-supplied value of bounded length. `special_list` values
    /// are parenthesized comma lists; `long_form` values may span
    /// comma/quote-joined tokens.
    Value {
        max_len: usize,
        special_list: bool,
        long_form: bool,
    },
    /// A fixed `DDMMMYY HH:MM` date-time, spanning two tokens.
    DateTime,
    /// The end-of-statement operator.
    EndOfStatement,
}

impl NodeKind {
    pub fn is_keyword(&self) -> bool {
        matches!(self, NodeKind::Keyword { .. })
    }
}

/// One node of a loaded grammar tree.
#[derive(Debug, Clone)]
pub struct GrammarNode {
    pub kind: NodeKind,
    /// At least one required child must follow the parent.
    pub required: bool,
    /// This node heads a FROM clause; matched children feed the
    /// FROM memo.
    pub is_from: bool,
    /// This node heads a TO clause.
    pub is_to: bool,
    /// Ancestor climbing during backtracking stops here.
    pub no_backtrack: bool,
    /// Derived: true when any child is required.
    pub require_next: bool,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

impl GrammarNode {
    /// First synonym of a keyword node, used for display and the
    /// formatting rules.
    pub fn first_synonym(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Keyword { synonyms } => synonyms.first().map(String::as_str),
            _ => None,
        }
    }

    /// Weight of this node when counting an ancestor's keyword-bearing
    /// children: synonym lists count double, making the branch point
    /// worth revisiting on its own.
    fn keyword_weight(&self) -> usize {
        match &self.kind {
            NodeKind::Keyword { synonyms } => {
                if synonyms.len() > 1 {
                    2
                } else {
                    1
                }
            }
            _ => 0,
        }
    }
}

/// An immutable-after-load grammar tree for one statement action.
#[derive(Debug, Clone)]
pub struct GrammarTree {
    nodes: Vec<GrammarNode>,
}

impl GrammarTree {
    pub const ROOT: NodeId = 0;

    pub fn node(&self, id: NodeId) -> &GrammarNode {
        &self.nodes[id]
    }

    pub fn root(&self) -> &GrammarNode {
        &self.nodes[Self::ROOT]
    }

    /// Number of keyword-bearing children of `id`, with synonym lists
    /// counted double.
    pub fn keyword_child_weight(&self, id: NodeId) -> usize {
        self.node(id)
            .children
            .iter()
            .map(|&c| self.node(c).keyword_weight())
            .sum()
    }

    /// True when `value` matches one of the root keyword's synonyms.
    pub fn root_matches(&self, value: &str) -> bool {
        match &self.root().kind {
            NodeKind::Keyword { synonyms } => {
                synonyms.iter().any(|s| match_keyword(value, s))
            }
            _ => false,
        }
    }
}

/// Errors raised while loading grammar descriptors. Any of these is
/// fatal at startup: no document can be validated without the trees.
#[derive(Debug, thiserror::Error)]
pub enum GrammarError {
    #[error("grammar descriptor for {action} is not valid JSON: {source}")]
    Parse {
        action: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("grammar descriptor for {action} is missing its root keyword")]
    MissingRoot { action: String },
}

/// Raw descriptor shape, one JSON object per node. Optional fields are
/// resolved into a [`NodeKind`] at load time.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct NodeDescriptor {
    keyword: Option<String>,
    #[serde(rename = "maxLen")]
    max_len: Option<u32>,
    #[serde(default)]
    required: bool,
    #[serde(rename = "isFROM", default)]
    is_from: bool,
    #[serde(rename = "isTO", default)]
    is_to: bool,
    #[serde(rename = "specialValue", default)]
    special_value: bool,
    #[serde(rename = "dateTimeValue", default)]
    date_time_value: bool,
    #[serde(default)]
    nogoback: bool,
    #[serde(default)]
    next: Vec<NodeDescriptor>,
}

impl NodeDescriptor {
    fn resolve_kind(&self) -> NodeKind {
        if let Some(keyword) = &self.keyword {
            let synonyms = keyword.split(", ").map(str::to_string).collect();
            return NodeKind::Keyword { synonyms };
        }
        if let Some(max_len) = self.max_len {
            let max_len = max_len as usize;
            return NodeKind::Value {
                max_len,
                special_list: self.special_value,
                long_form: !self.special_value && max_len >= 255,
            };
        }
        if self.date_time_value {
            return NodeKind::DateTime;
        }
        NodeKind::EndOfStatement
    }
}

fn build_tree(action: &str, json: &str) -> Result<GrammarTree, GrammarError> {
    let root: NodeDescriptor = serde_json::from_str(json).map_err(|source| GrammarError::Parse {
        action: action.to_string(),
        source,
    })?;
    if root.keyword.is_none() {
        return Err(GrammarError::MissingRoot {
            action: action.to_string(),
        });
    }

    let mut nodes = Vec::new();
    insert_node(&mut nodes, &root, None);
    for id in 0..nodes.len() {
        let require_next = nodes[id]
            .children
            .iter()
            .any(|&c| nodes[c].required);
        nodes[id].require_next = require_next;
    }
    Ok(GrammarTree { nodes })
}

fn insert_node(
    nodes: &mut Vec<GrammarNode>,
    desc: &NodeDescriptor,
    parent: Option<NodeId>,
) -> NodeId {
    let id = nodes.len();
    nodes.push(GrammarNode {
        kind: desc.resolve_kind(),
        required: desc.required,
        is_from: desc.is_from,
        is_to: desc.is_to,
        no_backtrack: desc.nogoback,
        require_next: false,
        parent,
        children: Vec::new(),
    });
    for child in &desc.next {
        let child_id = insert_node(nodes, child, Some(id));
        nodes[id].children.push(child_id);
    }
    id
}

/// Built-in descriptors in dispatch order: a statement's leading token
/// is matched against each root in turn and the first match wins.
const BUILTIN_GRAMMARS: &[(&str, &str)] = &[
    ("ADD", include_str!("../grammars/add.json")),
    ("GENERATE", include_str!("../grammars/generate.json")),
    ("DEFINE", include_str!("../grammars/define_package.json")),
    ("SET", include_str!("../grammars/set.json")),
    ("APPROVE", include_str!("../grammars/approve.json")),
    ("BACKIN", include_str!("../grammars/backin.json")),
    ("BACKOUT", include_str!("../grammars/backout.json")),
    ("CAST", include_str!("../grammars/cast.json")),
    ("COMMIT", include_str!("../grammars/commit.json")),
    ("DENY", include_str!("../grammars/deny.json")),
    ("EXECUTE", include_str!("../grammars/execute.json")),
    ("RESET", include_str!("../grammars/reset.json")),
    ("DELETE", include_str!("../grammars/delete.json")),
    ("LIST", include_str!("../grammars/list.json")),
    ("UPDATE", include_str!("../grammars/update.json")),
    ("MOVE", include_str!("../grammars/move.json")),
    ("RETRIEVE", include_str!("../grammars/retrieve.json")),
    ("SIGNIN", include_str!("../grammars/signin.json")),
    ("TRANSFER", include_str!("../grammars/transfer.json")),
];

/// The full set of loaded grammar trees, shared by all documents.
pub struct Grammars {
    trees: Vec<GrammarTree>,
}

impl Grammars {
    /// Load every built-in descriptor. Fails fast on the first broken
    /// descriptor; callers should abort startup on error.
    pub fn load() -> Result<Self, GrammarError> {
        let mut trees = Vec::with_capacity(BUILTIN_GRAMMARS.len());
        for (action, json) in BUILTIN_GRAMMARS {
            trees.push(build_tree(action, json)?);
        }
        Ok(Grammars { trees })
    }

    /// Find the tree whose root keyword matches a statement's leading
    /// token, in registration order.
    pub fn dispatch(&self, first_token: &str) -> Option<&GrammarTree> {
        self.trees.iter().find(|t| t.root_matches(first_token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_builtin_descriptors_load() {
        let grammars = Grammars::load().expect("built-in grammars load");
        assert_eq!(grammars.trees.len(), BUILTIN_GRAMMARS.len());
    }

    #[test]
    fn parent_links_are_wired() {
        let grammars = Grammars::load().expect("load");
        for tree in &grammars.trees {
            assert!(tree.root().parent.is_none());
            for (id, node) in tree.nodes.iter().enumerate() {
                for &child in &node.children {
                    assert_eq!(tree.node(child).parent, Some(id));
                }
            }
        }
    }

    #[test]
    fn dispatch_honors_abbreviations_and_order() {
        let grammars = Grammars::load().expect("load");
        assert!(grammars.dispatch("SET").is_some());
        assert!(grammars.dispatch("set").is_some());
        assert!(grammars.dispatch("GEN").is_some());
        assert!(grammars.dispatch("TRA").is_some());
        assert!(grammars.dispatch("NOPE").is_none());
        // DEFine wins over DELete for "DEF", and both resolve.
        let def = grammars.dispatch("DEF").expect("DEF dispatches");
        assert_eq!(def.root().first_synonym(), Some("DEFine"));
        let del = grammars.dispatch("DELETE").expect("DELETE dispatches");
        assert_eq!(del.root().first_synonym(), Some("DELete"));
    }

    #[test]
    fn missing_root_keyword_is_fatal() {
        let err = build_tree("BROKEN", r#"{ "maxLen": 8 }"#).unwrap_err();
        assert!(matches!(err, GrammarError::MissingRoot { .. }));
    }

    #[test]
    fn malformed_json_is_fatal() {
        let err = build_tree("BROKEN", "{ not json").unwrap_err();
        assert!(matches!(err, GrammarError::Parse { .. }));
    }

    #[test]
    fn long_form_is_derived_from_length() {
        let tree = build_tree(
            "T",
            r#"{ "keyword": "T", "next": [ { "maxLen": 255 }, { "maxLen": 8 },
                 { "maxLen": 255, "specialValue": true } ] }"#,
        )
        .expect("tree");
        let kinds: Vec<_> = tree.root().children.iter().map(|&c| tree.node(c).kind.clone()).collect();
        assert_eq!(
            kinds[0],
            NodeKind::Value { max_len: 255, special_list: false, long_form: true }
        );
        assert_eq!(
            kinds[1],
            NodeKind::Value { max_len: 8, special_list: false, long_form: false }
        );
        assert_eq!(
            kinds[2],
            NodeKind::Value { max_len: 255, special_list: true, long_form: false }
        );
    }

    #[test]
    fn require_next_is_derived_from_children() {
        let tree = build_tree(
            "T",
            r#"{ "keyword": "T", "next": [ { "keyword": "A", "required": true,
                 "next": [ { "keyword": "B" } ] } ] }"#,
        )
        .expect("tree");
        assert!(tree.root().require_next);
        let a = tree.root().children[0];
        assert!(!tree.node(a).require_next);
    }
}

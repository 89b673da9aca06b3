//! Line-oriented document tree for work unit markdown.
//!
//! Every line of a document is classified into a [`Node`]: a heading, a
//! `- **Field**: value` line, a subtask line, a blank line or free text.
//! Each node keeps the exact text it was parsed from. Rendering emits that
//! text for untouched nodes, so edits never disturb unrelated lines; nodes
//! that are edited are re-rendered in canonical form.
//!
//! Subtask lines come in two notations:
//!
//! ```text
//!   - [✓] Cache reads - [US-1](stories.md#us-1)
//!   - Cache reads - Implements [US-1](stories.md#us-1)
//! ```
//!
//! The verb notation may also be split over two lines, a bare caption
//! bullet followed by the verb line. Both notations parse to the same
//! [`SubtaskLine`]; rendering always uses the bracket notation.

use regex::Regex;
use std::sync::OnceLock;

use super::state::SubtaskState;

// ============================================================================
// Line Patterns
// ============================================================================

fn heading_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(#{1,6})\s+(.*?)\s*$").expect("valid heading regex"))
}

fn field_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(\s*)-\s*\*\*([^*]+)\*\*:[ \t]*(.*?)\s*$").expect("valid field regex")
    })
}

fn bracket_subtask_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(\s*)-\s*\[([ xX✓~])\]\s*(.*?)\s*$").expect("valid bracket regex")
    })
}

fn verb_subtask_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(\s*)-\s+(.*?)(?:\s+-\s+|\s+)(Will implement|Implementing|Implements)\s+(.*?)\s*$")
            .expect("valid verb regex")
    })
}

fn verb_continuation_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*(?:-\s*)?(Will implement|Implementing|Implements)\s+(.*?)\s*$")
            .expect("valid continuation regex")
    })
}

fn bullet_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\s*)-\s+(.*?)\s*$").expect("valid bullet regex"))
}

fn leading_verb_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?:Will implement|Implementing|Implements)\s+").expect("valid verb prefix")
    })
}

// ============================================================================
// Nodes
// ============================================================================

/// Which notation a subtask line was written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notation {
    /// `- [✓] Caption - reference`
    Bracket,
    /// `- Caption - Implements reference`
    Verb,
}

/// A parsed subtask line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtaskLine {
    /// Leading whitespace before the bullet.
    pub indent: String,
    pub state: SubtaskState,
    /// Caption, the identity key of the subtask within its task.
    pub caption: String,
    /// Reference link text, kept verbatim. Empty when absent.
    pub reference: String,
    /// Notation the line was read from.
    pub notation: Notation,
}

impl SubtaskLine {
    /// Canonical rendering in bracket notation.
    #[must_use]
    pub fn render(&self) -> String {
        let mut line = format!("{}- {} {}", self.indent, self.state.marker(), self.caption);
        if !self.reference.is_empty() {
            line.push_str(" - ");
            line.push_str(&self.reference);
        }
        line
    }
}

/// Classification of a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// `## Title`
    Heading { level: usize, text: String },
    /// `- **Name**: value`
    Field {
        indent: String,
        name: String,
        value: String,
    },
    /// A subtask in either notation
    Subtask(SubtaskLine),
    /// Empty or whitespace-only line
    Blank,
    /// Anything else
    Text,
}

/// One logical line of a document (two physical lines for a split verb
/// subtask).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    raw: String,
    kind: NodeKind,
}

impl Node {
    /// Create a heading node.
    #[must_use]
    pub fn heading(level: usize, text: impl Into<String>) -> Self {
        Self::from_kind(NodeKind::Heading {
            level,
            text: text.into(),
        })
    }

    /// Create a field node.
    #[must_use]
    pub fn field(indent: impl Into<String>, name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::from_kind(NodeKind::Field {
            indent: indent.into(),
            name: name.into(),
            value: value.into(),
        })
    }

    /// Create a blank node.
    #[must_use]
    pub fn blank() -> Self {
        Self::from_kind(NodeKind::Blank)
    }

    /// Create a free text node. The text is classified like any parsed line.
    #[must_use]
    pub fn text(line: impl Into<String>) -> Self {
        classify(line.into())
    }

    fn from_kind(kind: NodeKind) -> Self {
        let raw = render_kind(&kind);
        Self { raw, kind }
    }

    /// Exact text of the node.
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    #[must_use]
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    /// Heading level and text, if this is a heading.
    #[must_use]
    pub fn as_heading(&self) -> Option<(usize, &str)> {
        match &self.kind {
            NodeKind::Heading { level, text } => Some((*level, text.as_str())),
            _ => None,
        }
    }

    /// Field name and value, if this is a field.
    #[must_use]
    pub fn as_field(&self) -> Option<(&str, &str)> {
        match &self.kind {
            NodeKind::Field { name, value, .. } => Some((name.as_str(), value.as_str())),
            _ => None,
        }
    }

    /// Indentation of a field or subtask node.
    #[must_use]
    pub fn indent(&self) -> &str {
        match &self.kind {
            NodeKind::Field { indent, .. } => indent,
            NodeKind::Subtask(line) => &line.indent,
            _ => "",
        }
    }

    #[must_use]
    pub fn as_subtask(&self) -> Option<&SubtaskLine> {
        match &self.kind {
            NodeKind::Subtask(line) => Some(line),
            _ => None,
        }
    }

    /// Check whether this is a field with the given name (case-insensitive).
    #[must_use]
    pub fn is_field(&self, wanted: &str) -> bool {
        self.as_field()
            .is_some_and(|(name, _)| name.trim().eq_ignore_ascii_case(wanted))
    }

    /// Replace the value of a field node. Returns false for other kinds.
    pub fn set_field_value(&mut self, new_value: impl Into<String>) -> bool {
        let NodeKind::Field { value, .. } = &mut self.kind else {
            return false;
        };
        let new_value = new_value.into();
        if *value == new_value {
            return true;
        }
        *value = new_value;
        self.raw = render_kind(&self.kind);
        true
    }

    /// Replace the state of a subtask node, switching it to bracket
    /// notation. Caption and reference are untouched.
    pub fn set_subtask_state(&mut self, state: SubtaskState) -> bool {
        let NodeKind::Subtask(line) = &mut self.kind else {
            return false;
        };
        if line.state == state && line.notation == Notation::Bracket {
            return true;
        }
        line.state = state;
        line.notation = Notation::Bracket;
        self.raw = render_kind(&self.kind);
        true
    }
}

fn render_kind(kind: &NodeKind) -> String {
    match kind {
        NodeKind::Heading { level, text } => format!("{} {}", "#".repeat(*level), text),
        NodeKind::Field {
            indent,
            name,
            value,
        } => {
            if value.is_empty() {
                format!("{}- **{}**:", indent, name)
            } else {
                format!("{}- **{}**: {}", indent, name, value)
            }
        }
        NodeKind::Subtask(line) => line.render(),
        NodeKind::Blank => String::new(),
        NodeKind::Text => String::new(),
    }
}

// ============================================================================
// Classification
// ============================================================================

fn strip_verb(reference: &str) -> String {
    leading_verb_re().replace(reference, "").into_owned()
}

fn split_caption_reference(rest: &str) -> (String, String) {
    // Reference is the text after the last " - " that starts a link or a
    // verb phrase; anything else belongs to the caption.
    if let Some(pos) = rest.rfind(" - ") {
        let candidate = rest[pos + 3..].trim();
        if candidate.starts_with('[') || leading_verb_re().is_match(candidate) {
            return (rest[..pos].trim().to_string(), strip_verb(candidate));
        }
    }
    (rest.trim().to_string(), String::new())
}

fn classify(raw: String) -> Node {
    let kind = classify_line(&raw);
    Node { raw, kind }
}

fn classify_line(line: &str) -> NodeKind {
    if line.trim().is_empty() {
        return NodeKind::Blank;
    }

    if let Some(caps) = heading_re().captures(line) {
        return NodeKind::Heading {
            level: caps[1].len(),
            text: caps[2].to_string(),
        };
    }

    if let Some(caps) = field_re().captures(line) {
        return NodeKind::Field {
            indent: caps[1].to_string(),
            name: caps[2].trim().to_string(),
            value: caps[3].to_string(),
        };
    }

    if let Some(caps) = bracket_subtask_re().captures(line) {
        let state = caps[2]
            .chars()
            .next()
            .and_then(SubtaskState::from_marker_char)
            .unwrap_or_default();
        let (caption, reference) = split_caption_reference(&caps[3]);
        return NodeKind::Subtask(SubtaskLine {
            indent: caps[1].to_string(),
            state,
            caption,
            reference,
            notation: Notation::Bracket,
        });
    }

    if let Some(caps) = verb_subtask_re().captures(line) {
        let caption = caps[2].trim();
        let state = SubtaskState::from_verb(&caps[3]);
        if let (Some(state), false) = (state, caption.is_empty()) {
            return NodeKind::Subtask(SubtaskLine {
                indent: caps[1].to_string(),
                state,
                caption: caption.to_string(),
                reference: caps[4].to_string(),
                notation: Notation::Verb,
            });
        }
    }

    NodeKind::Text
}

/// Merge a bare caption bullet with a following verb line.
fn merge_continuation(previous: &Node, line: &str) -> Option<Node> {
    if previous.kind != NodeKind::Text {
        return None;
    }
    let bullet = bullet_re().captures(&previous.raw)?;
    let verb = verb_continuation_re().captures(line)?;
    let state = SubtaskState::from_verb(&verb[1])?;

    let caption = bullet[2].trim().to_string();
    if caption.is_empty() {
        return None;
    }

    Some(Node {
        raw: format!("{}\n{}", previous.raw, line),
        kind: NodeKind::Subtask(SubtaskLine {
            indent: bullet[1].to_string(),
            state,
            caption,
            reference: verb[2].to_string(),
            notation: Notation::Verb,
        }),
    })
}

// ============================================================================
// Document
// ============================================================================

/// A structural edit applied by [`Document::apply_edits`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Edit {
    /// Set the value of the field node at the index.
    SetField { index: usize, value: String },
    /// Set the state of the subtask node at the index.
    SetSubtask { index: usize, state: SubtaskState },
    /// Insert a node after the index.
    InsertAfter { index: usize, node: Node },
}

impl Edit {
    fn index(&self) -> usize {
        match self {
            Edit::SetField { index, .. }
            | Edit::SetSubtask { index, .. }
            | Edit::InsertAfter { index, .. } => *index,
        }
    }
}

/// A parsed markdown document.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Document {
    nodes: Vec<Node>,
    trailing_newline: bool,
}

impl Document {
    /// Parse text into nodes. Parsing never fails; unrecognized lines become
    /// [`NodeKind::Text`].
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let trailing_newline = text.ends_with('\n');
        let body = text.strip_suffix('\n').unwrap_or(text);

        let mut nodes: Vec<Node> = Vec::new();
        if !text.is_empty() {
            for line in body.split('\n') {
                if let Some(merged) = nodes.last().and_then(|prev| merge_continuation(prev, line)) {
                    if let Some(last) = nodes.last_mut() {
                        *last = merged;
                    }
                    continue;
                }
                nodes.push(classify(line.to_string()));
            }
        }

        Self {
            nodes,
            trailing_newline,
        }
    }

    /// Render back to text. Untouched nodes reproduce their input exactly.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = self
            .nodes
            .iter()
            .map(Node::raw)
            .collect::<Vec<_>>()
            .join("\n");
        if self.trailing_newline {
            out.push('\n');
        }
        out
    }

    #[must_use]
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    #[must_use]
    pub fn node(&self, index: usize) -> Option<&Node> {
        self.nodes.get(index)
    }

    /// Append a node at the end of the document.
    pub fn push(&mut self, node: Node) {
        self.nodes.push(node);
    }

    /// Insert a node at a position.
    pub fn insert(&mut self, index: usize, node: Node) {
        let index = index.min(self.nodes.len());
        self.nodes.insert(index, node);
    }

    /// Find the first heading matching a level and text (case-insensitive).
    #[must_use]
    pub fn find_heading(&self, level: usize, text: &str) -> Option<usize> {
        self.nodes.iter().position(|node| {
            node.as_heading()
                .is_some_and(|(l, t)| l == level && t.trim().eq_ignore_ascii_case(text))
        })
    }

    /// End (exclusive) of the section opened by the heading at `start`: the
    /// next heading of the same or a higher level, or the end of the document.
    #[must_use]
    pub fn section_end(&self, start: usize) -> usize {
        let level = match self.nodes.get(start).and_then(Node::as_heading) {
            Some((level, _)) => level,
            None => return self.nodes.len(),
        };
        self.nodes
            .iter()
            .enumerate()
            .skip(start + 1)
            .find(|(_, node)| node.as_heading().is_some_and(|(l, _)| l <= level))
            .map(|(i, _)| i)
            .unwrap_or(self.nodes.len())
    }

    /// Apply edits computed against the current node indices.
    ///
    /// Edits are applied from the highest index down so earlier indices stay
    /// valid. Several insertions after the same index keep their given order.
    ///
    /// Returns false (and leaves the document untouched) if any edit points
    /// at a missing node or a node of the wrong kind.
    pub fn apply_edits(&mut self, edits: Vec<Edit>) -> bool {
        let valid = edits.iter().all(|edit| match edit {
            Edit::SetField { index, .. } => {
                self.nodes.get(*index).is_some_and(|n| n.as_field().is_some())
            }
            Edit::SetSubtask { index, .. } => {
                self.nodes.get(*index).is_some_and(|n| n.as_subtask().is_some())
            }
            Edit::InsertAfter { index, .. } => *index < self.nodes.len(),
        });
        if !valid {
            return false;
        }

        let mut ordered: Vec<(usize, Edit)> = edits.into_iter().enumerate().collect();
        // Highest index first; for the same index apply later edits first so
        // successive insertions end up in their original order.
        ordered.sort_by(|(ia, a), (ib, b)| b.index().cmp(&a.index()).then(ib.cmp(ia)));

        for (_, edit) in ordered {
            match edit {
                Edit::SetField { index, value } => {
                    self.nodes[index].set_field_value(value);
                }
                Edit::SetSubtask { index, state } => {
                    self.nodes[index].set_subtask_state(state);
                }
                Edit::InsertAfter { index, node } => {
                    self.nodes.insert(index + 1, node);
                }
            }
        }
        true
    }
}

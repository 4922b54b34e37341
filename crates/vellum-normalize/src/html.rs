//! tree-sitter walk producing canonical structure and text forms

use crate::text::{collapse, decode_entities_in, decode_entity, TextCollector};
use tree_sitter::{Node, Parser};

/// Elements that only affect presentation and never count as a change
pub const PRESENTATION_ELEMENTS: &[&str] = &["style", "meta", "link", "base", "noscript"];

/// Attributes that only affect presentation
pub const PRESENTATION_ATTRIBUTES: &[&str] = &["style"];

const TEXT_MARKER: &str = "#text";

/// Canonical forms extracted from one document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalForm {
    /// Pre-order structure tokens (`<tag attr="v">`, `#text`, `</tag>`)
    pub structure: Vec<String>,
    /// Visible text, whitespace-collapsed
    pub text: String,
}

/// Parse `source` and canonicalize it
///
/// Returns `None` only if the grammar cannot be loaded or the parser gives up;
/// syntax errors still yield a (partial) tree and a canonical form.
pub fn canonicalize(source: &str) -> Option<CanonicalForm> {
    let mut parser = Parser::new();
    if let Err(e) = parser.set_language(&tree_sitter_html::LANGUAGE.into()) {
        tracing::warn!(error = %e, "html grammar unavailable");
        return None;
    }
    let tree = parser.parse(source, None)?;
    let mut walker = Walker {
        source: source.as_bytes(),
        structure: Vec::new(),
        text: TextCollector::new(),
    };
    walker.walk(tree.root_node());
    Some(CanonicalForm {
        structure: walker.structure,
        text: walker.text.finish(),
    })
}

/// Tag-stripping fallback used when no tree is available
pub fn canonicalize_lossy(source: &str) -> CanonicalForm {
    let mut text = TextCollector::new();
    let mut in_tag = false;
    let mut run = String::new();
    for ch in source.chars() {
        match (ch, in_tag) {
            ('<', false) => {
                text.push(&run);
                run.clear();
                text.boundary();
                in_tag = true;
            }
            ('>', true) => in_tag = false,
            (_, false) => run.push(ch),
            _ => {}
        }
    }
    text.push(&run);
    CanonicalForm {
        structure: vec!["#unparsed".to_string()],
        text: text.finish(),
    }
}

enum Visit<'t> {
    Enter(Node<'t>),
    Exit(String),
}

struct Walker<'s> {
    source: &'s [u8],
    structure: Vec<String>,
    text: TextCollector,
}

impl<'s> Walker<'s> {
    fn node_text(&self, node: Node<'_>) -> &'s str {
        node.utf8_text(self.source).unwrap_or("")
    }

    // Iterative so that deeply nested documents cannot exhaust the stack.
    fn walk(&mut self, root: Node<'_>) {
        let mut stack = vec![Visit::Enter(root)];
        while let Some(visit) = stack.pop() {
            match visit {
                Visit::Exit(tag) => {
                    self.structure.push(format!("</{tag}>"));
                    self.text.boundary();
                }
                Visit::Enter(node) => match node.kind() {
                    "comment" | "doctype" => {}
                    "text" => {
                        let decoded = decode_entities_in(self.node_text(node));
                        self.push_text(&decoded);
                    }
                    "entity" => {
                        let decoded = decode_entity(self.node_text(node));
                        self.push_text(&decoded);
                    }
                    "element" | "script_element" | "style_element" => {
                        self.enter_element(node, &mut stack);
                    }
                    // Tag nodes are consumed by their element; a stray one
                    // (unbalanced markup) carries no content.
                    "start_tag" | "end_tag" | "self_closing_tag" | "erroneous_end_tag"
                    | "raw_text" => {}
                    _ => push_children(node, &mut stack),
                },
            }
        }
    }

    fn enter_element<'t>(&mut self, node: Node<'t>, stack: &mut Vec<Visit<'t>>) {
        let mut cursor = node.walk();
        let children: Vec<Node<'t>> = node.named_children(&mut cursor).collect();
        let Some(tag_node) = children
            .iter()
            .find(|c| matches!(c.kind(), "start_tag" | "self_closing_tag"))
        else {
            // Malformed element without an opening tag: keep its content.
            push_children(node, stack);
            return;
        };

        let tag = self.tag_name(*tag_node);
        if PRESENTATION_ELEMENTS.contains(&tag.as_str()) {
            return;
        }

        let mut open = format!("<{tag}");
        for (name, value) in self.attributes(*tag_node) {
            open.push(' ');
            open.push_str(&name);
            if let Some(value) = value {
                open.push_str("=\"");
                open.push_str(&value);
                open.push('"');
            }
        }
        open.push('>');
        self.structure.push(open);
        self.text.boundary();

        stack.push(Visit::Exit(tag));
        // Script bodies are not visible text.
        if node.kind() == "script_element" {
            return;
        }
        for child in children.into_iter().rev() {
            stack.push(Visit::Enter(child));
        }
    }

    fn tag_name(&self, tag_node: Node<'_>) -> String {
        let mut cursor = tag_node.walk();
        let name = tag_node
            .named_children(&mut cursor)
            .find(|c| c.kind() == "tag_name")
            .map_or("", |n| self.node_text(n));
        name.to_ascii_lowercase()
    }

    fn attributes(&self, tag_node: Node<'_>) -> Vec<(String, Option<String>)> {
        let mut cursor = tag_node.walk();
        let mut attrs: Vec<(String, Option<String>)> = tag_node
            .named_children(&mut cursor)
            .filter(|c| c.kind() == "attribute")
            .filter_map(|attr| {
                let mut inner = attr.walk();
                let mut name = None;
                let mut value = None;
                for part in attr.named_children(&mut inner) {
                    match part.kind() {
                        "attribute_name" => {
                            name = Some(self.node_text(part).to_ascii_lowercase());
                        }
                        "attribute_value" => value = Some(collapse(self.node_text(part))),
                        "quoted_attribute_value" => {
                            let raw = self.node_text(part);
                            let unquoted = raw
                                .strip_prefix(['"', '\''])
                                .and_then(|r| r.strip_suffix(['"', '\'']))
                                .unwrap_or(raw);
                            value = Some(collapse(unquoted));
                        }
                        _ => {}
                    }
                }
                let name = name?;
                if PRESENTATION_ATTRIBUTES.contains(&name.as_str()) {
                    return None;
                }
                Some((name, value))
            })
            .collect();
        attrs.sort();
        attrs.dedup_by(|a, b| a.0 == b.0);
        attrs
    }

    fn push_text(&mut self, run: &str) {
        if run.trim().is_empty() {
            self.text.boundary();
            return;
        }
        if self.structure.last().map(String::as_str) != Some(TEXT_MARKER) {
            self.structure.push(TEXT_MARKER.to_string());
        }
        self.text.push(run);
    }
}

fn push_children<'t>(node: Node<'t>, stack: &mut Vec<Visit<'t>>) {
    let mut cursor = node.walk();
    let children: Vec<Node<'t>> = node.named_children(&mut cursor).collect();
    for child in children.into_iter().rev() {
        stack.push(Visit::Enter(child));
    }
}

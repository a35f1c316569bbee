//! XML canonicalization (C14N 1.0 and exclusive C14N) over roxmltree nodes.
//!
//! Only what XML-DSig over trusted lists needs: element subtrees or the whole
//! document, with one subtree optionally cut out (the enveloped signature).

use roxmltree::{Node, NodeId, NodeType};
use std::collections::{BTreeMap, BTreeSet};

const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";

/// Namespace of the exclusive C14N `InclusiveNamespaces` parameter element.
pub const EXC_C14N_NS: &str = "http://www.w3.org/2001/10/xml-exc-c14n#";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum C14nMode {
    Inclusive,
    InclusiveWithComments,
    Exclusive,
    ExclusiveWithComments,
}

impl C14nMode {
    /// Maps a `CanonicalizationMethod` / `Transform` algorithm URI.
    ///
    /// C14N 1.1 is accepted as inclusive 1.0; the two differ only in xml:*
    /// attribute inheritance, which trusted lists do not rely on.
    pub fn from_algorithm(uri: &str) -> Option<Self> {
        match uri {
            "http://www.w3.org/TR/2001/REC-xml-c14n-20010315"
            | "http://www.w3.org/2006/12/xml-c14n11" => Some(C14nMode::Inclusive),
            "http://www.w3.org/TR/2001/REC-xml-c14n-20010315#WithComments"
            | "http://www.w3.org/2006/12/xml-c14n11#WithComments" => {
                Some(C14nMode::InclusiveWithComments)
            }
            "http://www.w3.org/2001/10/xml-exc-c14n#" => Some(C14nMode::Exclusive),
            "http://www.w3.org/2001/10/xml-exc-c14n#WithComments" => {
                Some(C14nMode::ExclusiveWithComments)
            }
            _ => None,
        }
    }

    pub fn is_exclusive(self) -> bool {
        matches!(self, C14nMode::Exclusive | C14nMode::ExclusiveWithComments)
    }

    pub fn with_comments(self) -> bool {
        matches!(
            self,
            C14nMode::InclusiveWithComments | C14nMode::ExclusiveWithComments
        )
    }
}

/// Document-order walk event: a node is opened before and closed after its children.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Edge<'a, 'input: 'a> {
    Open(Node<'a, 'input>),
    Close(Node<'a, 'input>),
}

/// Iterator behind [`traverse`]; the stack holds each node with whether it is open.
pub(crate) struct Traverse<'a, 'input: 'a> {
    stack: Vec<(Node<'a, 'input>, bool)>,
}

impl<'a, 'input: 'a> Iterator for Traverse<'a, 'input> {
    type Item = Edge<'a, 'input>;

    fn next(&mut self) -> Option<Self::Item> {
        let (node, opened) = self.stack.pop()?;
        if opened {
            return Some(Edge::Close(node));
        }
        self.stack.push((node, true));
        self.stack
            .extend(node.children().rev().map(|child| (child, false)));
        Some(Edge::Open(node))
    }
}

/// Walks `node` and its descendants, emitting open and close edges.
pub(crate) fn traverse<'a, 'input: 'a>(node: Node<'a, 'input>) -> Traverse<'a, 'input> {
    Traverse {
        stack: vec![(node, false)],
    }
}

/// Prefix (`""` for the default namespace) to URI, as rendered so far.
type NsScope = BTreeMap<String, String>;

/// Canonical form of `node` (an element or the document root), skipping the
/// subtree rooted at `excluded`.
pub fn canonicalize(node: Node<'_, '_>, mode: C14nMode, excluded: Option<NodeId>) -> String {
    canonicalize_with(node, mode, excluded, &BTreeSet::new())
}

/// Like [`canonicalize`], with the exclusive-mode `InclusiveNamespaces`
/// prefix list: listed prefixes (`""` for `#default`) are rendered the
/// inclusive way. Ignored in inclusive modes.
pub fn canonicalize_with(
    node: Node<'_, '_>,
    mode: C14nMode,
    excluded: Option<NodeId>,
    inclusive_prefixes: &BTreeSet<String>,
) -> String {
    let mut out = String::new();
    let mut scopes: Vec<NsScope> = vec![NsScope::new()];
    let mut skipping: Option<NodeId> = None;
    let mut past_document_element = false;

    for edge in traverse(node) {
        match edge {
            Edge::Open(n) => {
                if skipping.is_some() {
                    continue;
                }
                if Some(n.id()) == excluded {
                    skipping = Some(n.id());
                    continue;
                }
                match n.node_type() {
                    NodeType::Root => {}
                    NodeType::Element => {
                        let inherited = scopes.last().cloned().unwrap_or_default();
                        let scope = open_element(&mut out, n, mode, inclusive_prefixes, inherited);
                        scopes.push(scope);
                    }
                    NodeType::Text => {
                        if let Some(text) = n.text() {
                            escape_text(&mut out, text);
                        }
                    }
                    NodeType::Comment => {
                        if mode.with_comments() {
                            let rendered = format!("<!--{}-->", n.text().unwrap_or_default());
                            push_child(&mut out, n, &rendered, past_document_element);
                        }
                    }
                    NodeType::PI => {
                        if let Some(pi) = n.pi() {
                            let rendered = match pi.value {
                                Some(value) => format!("<?{} {}?>", pi.target, value),
                                None => format!("<?{}?>", pi.target),
                            };
                            push_child(&mut out, n, &rendered, past_document_element);
                        }
                    }
                }
            }
            Edge::Close(n) => {
                if let Some(id) = skipping {
                    if id == n.id() {
                        skipping = None;
                    }
                    continue;
                }
                if n.is_element() {
                    scopes.pop();
                    out.push_str("</");
                    out.push_str(&qualified_name(n));
                    out.push('>');
                    if n.parent().map_or(false, |p| p.is_root()) {
                        past_document_element = true;
                    }
                }
            }
        }
    }
    out
}

/// Comments and PIs outside the document element are separated by a newline.
fn push_child(out: &mut String, node: Node<'_, '_>, rendered: &str, past_document_element: bool) {
    let top_level = node.parent().map_or(false, |p| p.is_root());
    if top_level && past_document_element {
        out.push('\n');
    }
    out.push_str(rendered);
    if top_level && !past_document_element {
        out.push('\n');
    }
}

fn open_element(
    out: &mut String,
    node: Node<'_, '_>,
    mode: C14nMode,
    inclusive_prefixes: &BTreeSet<String>,
    inherited: NsScope,
) -> NsScope {
    let mut scope = inherited;
    let candidates = if mode.is_exclusive() {
        let mut used = utilized_namespaces(node);
        if !inclusive_prefixes.is_empty() {
            for (prefix, uri) in in_scope_namespaces(node) {
                if inclusive_prefixes.contains(&prefix) {
                    used.entry(prefix).or_insert(uri);
                }
            }
        }
        used
    } else {
        in_scope_namespaces(node)
    };

    out.push('<');
    out.push_str(&qualified_name(node));

    for (prefix, uri) in candidates {
        let needed = match scope.get(&prefix) {
            Some(rendered) => *rendered != uri,
            None => !(prefix.is_empty() && uri.is_empty()),
        };
        if !needed {
            continue;
        }
        if prefix.is_empty() {
            out.push_str(" xmlns=\"");
        } else {
            out.push_str(" xmlns:");
            out.push_str(&prefix);
            out.push_str("=\"");
        }
        escape_attribute(out, &uri);
        out.push('"');
        scope.insert(prefix, uri);
    }

    // (namespace URI, local name) is the sort key; no-namespace attributes first.
    let mut attributes: Vec<(String, String, String, String)> = node
        .attributes()
        .map(|attr| {
            let qname = match attr.namespace() {
                Some(XML_NS) => format!("xml:{}", attr.name()),
                Some(_) => match attribute_prefix(node, &attr) {
                    Some(prefix) => format!("{}:{}", prefix, attr.name()),
                    None => attr.name().to_string(),
                },
                None => attr.name().to_string(),
            };
            (
                attr.namespace().unwrap_or("").to_string(),
                attr.name().to_string(),
                qname,
                attr.value().to_string(),
            )
        })
        .collect();
    attributes.sort_by(|a, b| (&a.0, &a.1).cmp(&(&b.0, &b.1)));

    for (_, _, qname, value) in attributes {
        out.push(' ');
        out.push_str(&qname);
        out.push_str("=\"");
        escape_attribute(out, &value);
        out.push('"');
    }
    out.push('>');
    scope
}

/// Every namespace in scope on the element, plus the (possibly empty) default.
fn in_scope_namespaces(node: Node<'_, '_>) -> NsScope {
    let prefixes: BTreeSet<Option<&str>> = node
        .namespaces()
        .map(|ns| ns.name())
        .filter(|name| *name != Some("xml"))
        .collect();

    let mut scope = NsScope::new();
    for prefix in prefixes {
        if let Some(uri) = node.lookup_namespace_uri(prefix) {
            scope.insert(prefix.unwrap_or("").to_string(), uri.to_string());
        }
    }
    scope.entry(String::new()).or_default();
    scope
}

/// Namespaces visibly utilized by the element name and its attributes.
fn utilized_namespaces(node: Node<'_, '_>) -> NsScope {
    let mut used = NsScope::new();
    let (prefix, uri) = element_binding(node);
    used.insert(prefix, uri);

    for attr in node.attributes() {
        if let Some(uri) = attr.namespace() {
            if uri == XML_NS {
                continue;
            }
            if let Some(prefix) = attribute_prefix(node, &attr) {
                used.insert(prefix, uri.to_string());
            }
        }
    }
    used
}

/// Prefix and URI of the element's own name.
fn element_binding(node: Node<'_, '_>) -> (String, String) {
    match node.tag_name().namespace() {
        Some(uri) => (
            element_prefix(node).unwrap_or_default().to_string(),
            uri.to_string(),
        ),
        None => (String::new(), String::new()),
    }
}

/// The prefix written in the element's start tag. Several prefixes may be
/// bound to one URI, so the URI alone does not determine it.
fn element_prefix<'a, 'input: 'a>(node: Node<'a, 'input>) -> Option<&'input str> {
    let text = node.document().input_text();
    let tag = text.get(node.range().start..)?.strip_prefix('<')?;
    let end = tag.find(|c: char| c.is_whitespace() || c == '/' || c == '>')?;
    prefix_of(&tag[..end])
}

/// The prefix written on a namespaced attribute; the default namespace never
/// applies to attributes.
fn attribute_prefix(node: Node<'_, '_>, attr: &roxmltree::Attribute<'_, '_>) -> Option<String> {
    let qname = node.document().input_text().get(attr.range_qname())?;
    prefix_of(qname).map(str::to_string)
}

fn prefix_of(qname: &str) -> Option<&str> {
    qname.split_once(':').map(|(prefix, _)| prefix)
}

/// Whitespace-separated prefixes; `#default` names the default namespace.
pub fn parse_prefix_list(list: &str) -> BTreeSet<String> {
    list.split_whitespace()
        .map(|prefix| match prefix {
            "#default" => String::new(),
            other => other.to_string(),
        })
        .collect()
}

fn qualified_name(node: Node<'_, '_>) -> String {
    let (prefix, _) = element_binding(node);
    if prefix.is_empty() {
        node.tag_name().name().to_string()
    } else {
        format!("{}:{}", prefix, node.tag_name().name())
    }
}

fn escape_text(out: &mut String, text: &str) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\r' => out.push_str("&#xD;"),
            _ => out.push(c),
        }
    }
}

fn escape_attribute(out: &mut String, value: &str) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '"' => out.push_str("&quot;"),
            '\t' => out.push_str("&#x9;"),
            '\n' => out.push_str("&#xA;"),
            '\r' => out.push_str("&#xD;"),
            _ => out.push(c),
        }
    }
}

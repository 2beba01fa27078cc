//! Parsed markdown documents: front matter, heading tree, and anchor index.
//!
//! A [`Document`] is built once from raw bytes and never mutated. Front
//! matter is split off before parsing so heading offsets are relative to
//! the body that is actually rendered.

use std::collections::{BTreeMap, HashMap, HashSet};

use log::warn;
use tree_sitter::{Language, Node, Parser, Tree};

use crate::error::Error;
use crate::types::ResolvedLocation;

/// Key/value metadata from a leading YAML block.
pub type FrontMatter = BTreeMap<String, serde_yaml::Value>;

/// Where an anchor points within a document body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnchorTarget {
    /// Byte offset of the heading in the body.
    pub byte: usize,
    /// Zero-based line of the heading in the body. Used as the scroll position.
    pub line: usize,
}

/// A heading and the headings nested beneath it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadingNode {
    /// Unique slug within the document.
    pub anchor_id: String,
    /// Sub-headings, in document order.
    pub children: Vec<HeadingNode>,
    /// Heading depth, 1 through 6.
    pub level: u8,
    /// Plain heading text.
    pub text: String,
}

/// A fetched and parsed markdown document.
#[derive(Debug)]
pub struct Document {
    /// Anchor id to heading position.
    anchors: HashMap<String, AnchorTarget>,
    /// Markdown with front matter removed.
    body: String,
    /// Parsed leading YAML block.
    front_matter: Option<FrontMatter>,
    /// Where the bytes came from.
    location: ResolvedLocation,
    /// Bytes exactly as fetched.
    raw_content: Vec<u8>,
    /// Top-level headings.
    toc: Vec<HeadingNode>,
}

impl Document {
    /// Parse raw bytes fetched from `location`.
    ///
    /// Bytes are decoded as UTF-8, replacing invalid sequences.
    ///
    /// # Errors
    ///
    /// Returns `Error::ParseFailed` if the markdown grammar cannot be loaded.
    pub fn build(location: ResolvedLocation, raw: &[u8]) -> Result<Self, Error> {
        let decoded = String::from_utf8_lossy(raw);
        let text = decoded.strip_prefix('\u{feff}').unwrap_or(decoded.as_ref());
        let (front_matter, body) = split_front_matter(text, &location);

        let tree = parse_markdown(&body, &location)?;
        let mut headings = Vec::new();
        collect_headings(tree.root_node(), &body, &mut headings);

        let mut inline = parser_for(&tree_sitter_md::INLINE_LANGUAGE.into(), &location)?;
        for heading in &mut headings {
            heading.text = plain_text(&mut inline, &heading.text);
        }
        let (toc, anchors) = index_headings(headings);

        return Ok(Self {
            anchors,
            body,
            front_matter,
            location,
            raw_content: raw.to_vec(),
            toc,
        });
    }

    /// Anchor lookup by exact id.
    pub fn anchor(&self, id: &str) -> Option<AnchorTarget> {
        return self.anchors.get(id).copied();
    }

    /// Anchor lookup that also accepts heading text or differently-cased ids.
    pub fn find_anchor(&self, reference: &str) -> Option<AnchorTarget> {
        return self.anchor(reference).or_else(|| return self.anchor(&slugify(reference)));
    }

    /// Number of anchors in the document.
    pub fn anchor_count(&self) -> usize {
        return self.anchors.len();
    }

    /// Markdown with any front matter removed.
    pub fn body(&self) -> &str {
        return &self.body;
    }

    /// Parsed front matter. `None` when absent or not valid YAML.
    pub const fn front_matter(&self) -> Option<&FrontMatter> {
        return self.front_matter.as_ref();
    }

    /// Where this document was fetched from.
    pub const fn location(&self) -> &ResolvedLocation {
        return &self.location;
    }

    /// The exact bytes that were fetched.
    pub fn raw_content(&self) -> &[u8] {
        return &self.raw_content;
    }

    /// Top-level headings with their nested children.
    pub fn toc(&self) -> &[HeadingNode] {
        return &self.toc;
    }

    /// A display title: front-matter `title`, else the first heading, else the file name.
    pub fn title(&self) -> String {
        if let Some(title) = self
            .front_matter
            .as_ref()
            .and_then(|fm| return fm.get("title"))
            .and_then(serde_yaml::Value::as_str)
        {
            return title.to_string();
        }
        if let Some(first) = self.toc.first() {
            return first.text.clone();
        }
        return self.location.file_name();
    }
}

// ── Front matter ────────────────────────────────────────────────────

/// Front-matter scanner state.
#[derive(Clone, Copy)]
enum FrontMatterScan {
    /// Looking at the first line.
    Opening,
    /// Inside the YAML block, starting at this byte.
    Block(usize),
}

/// Split a leading `---` delimited block from the body.
///
/// The block must open on the very first line and be closed by another
/// `---` line; an unterminated block is treated as ordinary content.
fn split_front_matter(text: &str, location: &ResolvedLocation) -> (Option<FrontMatter>, String) {
    let mut state = FrontMatterScan::Opening;
    let mut offset = 0usize;

    for line in text.split_inclusive('\n') {
        let next = offset.saturating_add(line.len());
        let is_fence = line.trim_end() == "---";
        match state {
            FrontMatterScan::Opening => {
                if !is_fence {
                    return (None, text.to_string());
                }
                state = FrontMatterScan::Block(next);
            },
            FrontMatterScan::Block(start) => {
                if is_fence {
                    let yaml = text.get(start..offset).unwrap_or_default();
                    let body = text.get(next..).unwrap_or_default();
                    return (parse_front_matter(yaml, location), body.to_string());
                }
            },
        }
        offset = next;
    }

    return (None, text.to_string());
}

/// Parse a YAML block. Malformed YAML is logged and dropped.
fn parse_front_matter(yaml: &str, location: &ResolvedLocation) -> Option<FrontMatter> {
    if yaml.trim().is_empty() {
        return Some(FrontMatter::new());
    }
    return match serde_yaml::from_str::<FrontMatter>(yaml) {
        Ok(map) => Some(map),
        Err(e) => {
            warn!("ignoring malformed front matter in {location}: {e}");
            None
        },
    };
}

// ── Headings ────────────────────────────────────────────────────────

/// Inline nodes whose text never shows: markers, link targets, raw HTML.
const HIDDEN_INLINE: &[&str] = &[
    "code_span_delimiter",
    "emphasis_delimiter",
    "html_tag",
    "link_destination",
    "link_label",
    "link_title",
];

/// Inline nodes whose brackets and punctuation are syntax, not text.
const LINK_INLINE: &[&str] = &[
    "collapsed_reference_link",
    "full_reference_link",
    "image",
    "inline_link",
    "shortcut_link",
];

/// A heading as found in the syntax tree, before slugging.
struct RawHeading {
    /// Byte offset in the body.
    byte: usize,
    /// Depth, 1 through 6.
    level: u8,
    /// Zero-based line in the body.
    line: usize,
    /// Cleaned heading text.
    text: String,
}

/// A parser for `language`.
///
/// # Errors
///
/// Returns `Error::ParseFailed` if the language cannot be set.
fn parser_for(language: &Language, location: &ResolvedLocation) -> Result<Parser, Error> {
    let mut parser = Parser::new();
    parser
        .set_language(language)
        .map_err(|e| {
            return Error::ParseFailed {
                location: location.clone(),
                reason: e.to_string(),
            };
        })?;
    return Ok(parser);
}

/// Parse markdown into a tree-sitter block tree.
///
/// # Errors
///
/// Returns `Error::ParseFailed` if the language cannot be set or parsing fails.
fn parse_markdown(source: &str, location: &ResolvedLocation) -> Result<Tree, Error> {
    let mut parser = parser_for(&tree_sitter_md::LANGUAGE.into(), location)?;

    return parser.parse(source, None).ok_or_else(|| {
        return Error::ParseFailed {
            location: location.clone(),
            reason: "tree-sitter returned None".to_string(),
        };
    });
}

/// Walk the tree in document order, collecting ATX and setext headings.
fn collect_headings(node: Node<'_>, source: &str, out: &mut Vec<RawHeading>) {
    if let Some(heading) = heading_from_node(node, source) {
        out.push(heading);
        return;
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_headings(child, source, out);
    }
}

/// Convert an `atx_heading` or `setext_heading` node. `None` for anything else.
fn heading_from_node(node: Node<'_>, source: &str) -> Option<RawHeading> {
    let content_kind = match node.kind() {
        "atx_heading" => "inline",
        "setext_heading" => "paragraph",
        _ => return None,
    };
    let level = heading_level(node)?;

    let mut cursor = node.walk();
    let content = node
        .children(&mut cursor)
        .find(|c| return c.kind() == content_kind || c.kind() == "heading_content")
        .and_then(|c| return c.utf8_text(source.as_bytes()).ok());
    let raw = match content {
        Some(text) => text,
        // Empty ATX headings have no inline child.
        None if content_kind == "inline" => "",
        None => node.utf8_text(source.as_bytes()).ok()?.lines().next().unwrap_or_default(),
    };

    return Some(RawHeading {
        byte: node.start_byte(),
        level,
        line: node.start_position().row,
        text: clean_heading_text(raw),
    });
}

/// Level from the ATX marker or setext underline child.
fn heading_level(node: Node<'_>) -> Option<u8> {
    let mut cursor = node.walk();
    return node.children(&mut cursor).find_map(|c| {
        return match c.kind() {
            "atx_h1_marker" | "setext_h1_underline" => Some(1),
            "atx_h2_marker" | "setext_h2_underline" => Some(2),
            "atx_h3_marker" => Some(3),
            "atx_h4_marker" => Some(4),
            "atx_h5_marker" => Some(5),
            "atx_h6_marker" => Some(6),
            _ => None,
        };
    });
}

/// Collapse a heading's source text to a single plain line, dropping any
/// closing `#` sequence.
fn clean_heading_text(raw: &str) -> String {
    let joined = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    let without_closing = joined.trim_end_matches('#');
    if without_closing.is_empty() || without_closing.ends_with(' ') {
        return without_closing.trim_end().to_string();
    }
    return joined;
}

/// Reduce inline markdown to the text a reader sees: link text without its
/// destination, code without backticks, emphasis without markers.
fn plain_text(parser: &mut Parser, inline: &str) -> String {
    let Some(tree) = parser.parse(inline, None) else {
        return inline.to_string();
    };
    let mut out = String::with_capacity(inline.len());
    render_inline(tree.root_node(), inline, &mut out);
    return out.split_whitespace().collect::<Vec<_>>().join(" ");
}

/// Append the visible text of an inline node.
fn render_inline(node: Node<'_>, source: &str, out: &mut String) {
    let text = node.utf8_text(source.as_bytes()).unwrap_or_default();
    match node.kind() {
        "backslash_escape" => {
            out.push_str(text.strip_prefix('\\').unwrap_or(text));
            return;
        },
        "email_autolink" | "uri_autolink" => {
            out.push_str(text.trim_start_matches('<').trim_end_matches('>'));
            return;
        },
        kind if LINK_INLINE.contains(&kind) => {
            let mut cursor = node.walk();
            for child in node.named_children(&mut cursor) {
                if !HIDDEN_INLINE.contains(&child.kind()) {
                    render_inline(child, source, out);
                }
            }
            return;
        },
        _ => {},
    }
    if node.child_count() == 0 {
        out.push_str(text);
        return;
    }

    // Plain text has no node of its own; it is the gap between children.
    let mut pos = node.start_byte();
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        out.push_str(source.get(pos..child.start_byte()).unwrap_or_default());
        if !HIDDEN_INLINE.contains(&child.kind()) {
            render_inline(child, source, out);
        }
        pos = child.end_byte();
    }
    out.push_str(source.get(pos..node.end_byte()).unwrap_or_default());
}

/// Convert heading text to a URL-compatible slug.
/// Lowercase, spaces/non-alphanumeric to hyphens, collapse runs, trim edges.
pub fn slugify(text: &str) -> String {
    let lowered = text.to_lowercase();
    let mut result = String::with_capacity(lowered.len());
    let mut prev_hyphen = true; // Start true to trim leading hyphens.

    for c in lowered.chars() {
        if c.is_alphanumeric() {
            result.push(c);
            prev_hyphen = false;
            continue;
        }
        if prev_hyphen {
            continue;
        }
        result.push('-');
        prev_hyphen = true;
    }

    if result.ends_with('-') {
        result.pop();
    }
    return result;
}

/// Hands out unique anchor ids. Repeats get `-2`, `-3`, ... in order.
#[derive(Default)]
struct SlugRegistry {
    /// Next numeric suffix to try per base slug.
    next_suffix: HashMap<String, u32>,
    /// Every id handed out so far.
    taken: HashSet<String>,
}

impl SlugRegistry {
    /// Reserve a unique id for heading text.
    fn claim(&mut self, text: &str) -> String {
        let mut base = slugify(text);
        if base.is_empty() {
            base = "section".to_string();
        }
        if self.taken.insert(base.clone()) {
            return base;
        }
        let mut n = self.next_suffix.get(&base).copied().unwrap_or(2);
        loop {
            let candidate = format!("{base}-{n}");
            n = n.saturating_add(1);
            if self.taken.insert(candidate.clone()) {
                self.next_suffix.insert(base, n);
                return candidate;
            }
        }
    }
}

/// Nests headings by level using an open-ancestor stack.
#[derive(Default)]
struct TocBuilder {
    /// Headings whose children may still arrive, outermost first.
    open: Vec<HeadingNode>,
    /// Finished top-level headings.
    roots: Vec<HeadingNode>,
}

impl TocBuilder {
    /// Add the next heading in document order.
    fn push(&mut self, node: HeadingNode) {
        while self.open.last().is_some_and(|top| return top.level >= node.level) {
            self.close_top();
        }
        self.open.push(node);
    }

    /// Attach the innermost open heading to its parent.
    fn close_top(&mut self) {
        let Some(done) = self.open.pop() else {
            return;
        };
        match self.open.last_mut() {
            Some(parent) => parent.children.push(done),
            None => self.roots.push(done),
        }
    }

    /// Close everything still open and return the roots.
    fn finish(mut self) -> Vec<HeadingNode> {
        while !self.open.is_empty() {
            self.close_top();
        }
        return self.roots;
    }
}

/// Assign anchor ids and nest headings into a tree.
fn index_headings(headings: Vec<RawHeading>) -> (Vec<HeadingNode>, HashMap<String, AnchorTarget>) {
    let mut slugs = SlugRegistry::default();
    let mut toc = TocBuilder::default();
    let mut anchors = HashMap::new();

    for heading in headings {
        let anchor_id = slugs.claim(&heading.text);
        anchors.insert(
            anchor_id.clone(),
            AnchorTarget {
                byte: heading.byte,
                line: heading.line,
            },
        );
        toc.push(HeadingNode {
            anchor_id,
            children: Vec::new(),
            level: heading.level,
            text: heading.text,
        });
    }

    return (toc.finish(), anchors);
}

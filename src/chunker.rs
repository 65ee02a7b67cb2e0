use std::sync::LazyLock;

use scraper::{ElementRef, Html, Node, Selector};

static SCRIPT: LazyLock<Selector> = LazyLock::new(|| Selector::parse("script").unwrap());
static BODY: LazyLock<Selector> = LazyLock::new(|| Selector::parse("body").unwrap());

/// Approximate size budget per chunk, in whitespace-delimited units.
pub const DEFAULT_UNIT_LIMIT: usize = 1000;

/// A run of consecutive `<body>` children sized for one generator request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub index: usize,
    /// Newline-joined outer HTML of the children.
    pub body: String,
    pub units: usize,
    pub elements: usize,
    /// A single child larger than the limit, emitted alone.
    pub oversized: bool,
}

impl Chunk {
    /// Minimal standalone document around the chunk body.
    pub fn to_document(&self) -> String {
        format!("<html><head></head><body>{}</body></html>", self.body)
    }
}

pub fn count_units(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Split `html` into wrapped documents of at most `unit_limit` units each.
pub fn chunk(html: &str, unit_limit: usize) -> Vec<String> {
    chunk_document(html, unit_limit)
        .iter()
        .map(Chunk::to_document)
        .collect()
}

/// Group `<body>` children into chunks without ever splitting a child.
pub fn chunk_document(html: &str, unit_limit: usize) -> Vec<Chunk> {
    let mut document = Html::parse_document(html);
    strip_scripts(&mut document);

    let mut chunks = Vec::new();
    let mut pending = Pending::default();

    for piece in body_children(&document) {
        let units = count_units(&piece);

        if units > unit_limit {
            pending.flush_into(&mut chunks);
            let index = chunks.len();
            chunks.push(Chunk {
                index,
                body: piece,
                units,
                elements: 1,
                oversized: true,
            });
        } else if pending.units + units <= unit_limit {
            pending.push(piece, units);
        } else {
            pending.flush_into(&mut chunks);
            pending.push(piece, units);
        }
    }
    pending.flush_into(&mut chunks);

    chunks
}

#[derive(Default)]
struct Pending {
    parts: Vec<String>,
    units: usize,
}

impl Pending {
    fn push(&mut self, piece: String, units: usize) {
        self.parts.push(piece);
        self.units += units;
    }

    fn flush_into(&mut self, chunks: &mut Vec<Chunk>) {
        if self.parts.is_empty() {
            return;
        }
        let parts = std::mem::take(&mut self.parts);
        chunks.push(Chunk {
            index: chunks.len(),
            body: parts.join("\n"),
            units: std::mem::take(&mut self.units),
            elements: parts.len(),
            oversized: false,
        });
    }
}

fn strip_scripts(document: &mut Html) {
    let ids: Vec<_> = document.select(&SCRIPT).map(|el| el.id()).collect();
    for id in ids {
        if let Some(mut node) = document.tree.get_mut(id) {
            node.detach();
        }
    }
}

/// Serialized direct children of `<body>`, trimmed, blanks skipped.
fn body_children(document: &Html) -> Vec<String> {
    let Some(body) = document.select(&BODY).next() else {
        return Vec::new();
    };

    body.children()
        .filter_map(|child| match child.value() {
            Node::Element(_) => ElementRef::wrap(child).map(|el| el.html()),
            Node::Text(text) => {
                let text: &str = text;
                Some(text.to_string())
            }
            Node::Comment(comment) => {
                let comment: &str = comment;
                Some(format!("<!--{comment}-->"))
            }
            _ => None,
        })
        .map(|piece| piece.trim().to_string())
        .filter(|piece| !piece.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document() {
        assert!(chunk_document("", 10).is_empty());
        assert!(chunk_document("<html><body>   </body></html>", 10).is_empty());
    }

    #[test]
    fn groups_until_limit() {
        let html = "<html><body><p>one two three</p><p>four five</p><p>six</p></body></html>";
        let chunks = chunk_document(html, 5);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].body, "<p>one two three</p>\n<p>four five</p>");
        assert_eq!(chunks[0].units, 5);
        assert_eq!(chunks[0].elements, 2);
        assert_eq!(chunks[1].body, "<p>six</p>");
        assert!(chunks.iter().all(|c| !c.oversized));
    }

    #[test]
    fn oversized_child_is_emitted_alone() {
        let html = "<body><p>x</p><div>a b c d e f</div><p>y</p></body>";
        let chunks = chunk_document(html, 3);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].body, "<p>x</p>");
        assert_eq!(chunks[1].body, "<div>a b c d e f</div>");
        assert!(chunks[1].oversized);
        assert_eq!(chunks[1].units, 6);
        assert_eq!(chunks[2].body, "<p>y</p>");
        let indexes: Vec<_> = chunks.iter().map(|c| c.index).collect();
        assert_eq!(indexes, [0, 1, 2]);
    }

    #[test]
    fn single_oversized_child() {
        let words = vec!["word"; 50].join(" ");
        let html = format!("<html><body><section>{words}</section></body></html>");
        let chunks = chunk_document(&html, 10);
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].oversized);
        assert_eq!(chunks[0].body, format!("<section>{words}</section>"));
    }

    #[test]
    fn scripts_are_removed() {
        let html = "<body><script>var a = 1;</script><div><script>track()</script><span>hi</span></div></body>";
        let chunks = chunk_document(html, 100);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].body, "<div><span>hi</span></div>");
    }

    #[test]
    fn text_and_comments_are_kept() {
        let html = "<body>loose text<!-- note --><b>bold</b></body>";
        let chunks = chunk_document(html, 100);
        assert_eq!(chunks[0].body, "loose text\n<!-- note -->\n<b>bold</b>");
    }

    #[test]
    fn wrapped_documents() {
        let docs = chunk("<body><p>a</p></body>", 10);
        assert_eq!(docs, ["<html><head></head><body><p>a</p></body></html>"]);
    }

    #[test]
    fn zero_limit_isolates_every_child() {
        let chunks = chunk_document("<body><p>a</p><p>b</p></body>", 0);
        assert_eq!(chunks.len(), 2);
        assert!(chunks.iter().all(|c| c.oversized && c.elements == 1));
    }

    #[test]
    fn login_fixture() {
        let html = std::fs::read_to_string("tests/fixtures/login.html").unwrap();
        let markers = ["class=\"top\"", "id=\"login-form\"", "class=\"hint\"", "<footer>"];

        for limit in [1, 10, 25, 40, 1000] {
            let chunks = chunk_document(&html, limit);
            for c in &chunks {
                assert!(!c.body.contains("<script"), "script leaked at limit {limit}");
                assert!(c.oversized || c.units <= limit);
                assert_eq!(c.units, count_units(&c.body));
            }
            assert_eq!(chunks.iter().map(|c| c.elements).sum::<usize>(), 4);
            for marker in markers {
                let hits = chunks.iter().filter(|c| c.body.contains(marker)).count();
                assert_eq!(hits, 1, "{marker} at limit {limit}");
            }
        }

        assert_eq!(chunk_document(&html, 1000).len(), 1);
        assert_eq!(chunk_document(&html, 1).len(), 4);
    }
}

//! # Content normalizer
//!
//! Resolves a persisted document body into the block list the editor renders.
//! A body is either a JSON array of blocks (everything written today) or legacy
//! markup from older notes. [`normalize`] is the only reader of that ambiguity
//! and [`serialize`] the only writer; the writer always emits blocks.
//!
//! Normalization never fails. Malformed markup degrades to whatever text can
//! be pulled out of it, and an empty result becomes a single empty paragraph,
//! so every document resolves to at least one block.
//!
//! ## Markup mapping
//!
//! Only the top level of the markup tree is mapped; inline formatting and
//! nesting are lost.
//!
//! | Element | Block |
//! |---------|-------|
//! | `h1`–`h3` | heading of that level |
//! | `p` | paragraph |
//! | `blockquote` | quote |
//! | `li` | list item |
//! | `ul` / `ol` | one list item per `li` child (ordered for `ol`) |
//! | `pre` | code block |
//! | `img[src]` | image |
//! | `table` | table of cell texts |
//! | anything else, root-level text | paragraph with the flattened text |

use scraper::node::Node;
use scraper::{ElementRef, Html};
use serde_json::Value;

use crate::blocks::Block;

/// How a raw body is encoded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BodyFormat {
    Empty,
    Blocks,
    Markup,
}

/// Classify a raw body without converting it.
pub fn detect_format(raw: Option<&str>) -> BodyFormat {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => BodyFormat::Empty,
        Some(s) => match serde_json::from_str::<Value>(s) {
            Ok(Value::Array(items)) if items.is_empty() => BodyFormat::Empty,
            Ok(Value::Array(_)) => BodyFormat::Blocks,
            _ => BodyFormat::Markup,
        },
    }
}

/// Resolve a raw body into a non-empty block list.
pub fn normalize(raw: Option<&str>) -> Vec<Block> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return vec![Block::empty()];
    };

    let blocks = match parse_block_list(raw) {
        Some(blocks) => blocks,
        None => parse_markup(raw),
    };

    if blocks.is_empty() {
        vec![Block::empty()]
    } else {
        blocks
    }
}

/// Serialize blocks into the persisted body format.
pub fn serialize(blocks: &[Block]) -> Result<String, serde_json::Error> {
    serde_json::to_string(blocks)
}

fn parse_block_list(raw: &str) -> Option<Vec<Block>> {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Array(items)) => Some(items.into_iter().map(Block::from_value).collect()),
        _ => None,
    }
}

fn parse_markup(raw: &str) -> Vec<Block> {
    let fragment = Html::parse_fragment(raw);
    let mut blocks = Vec::new();

    for child in fragment.root_element().children() {
        match child.value() {
            Node::Text(text) => push_text(&mut blocks, text.trim(), |t| Block::paragraph(t)),
            Node::Element(_) => {
                if let Some(element) = ElementRef::wrap(child) {
                    push_element(&mut blocks, element);
                }
            }
            _ => {}
        }
    }

    blocks
}

fn push_element(blocks: &mut Vec<Block>, element: ElementRef<'_>) {
    let text = flattened_text(element);
    match element.value().name() {
        "h1" => push_text(blocks, &text, |t| Block::heading(1, t)),
        "h2" => push_text(blocks, &text, |t| Block::heading(2, t)),
        "h3" => push_text(blocks, &text, |t| Block::heading(3, t)),
        "p" => push_text(blocks, &text, |t| Block::paragraph(t)),
        "blockquote" => push_text(blocks, &text, |t| Block::quote(t)),
        "li" => push_text(blocks, &text, |t| Block::list_item(t, false)),
        name @ ("ul" | "ol") => push_list(blocks, element, name == "ol"),
        "pre" => {
            let code = element.text().collect::<String>();
            let code = code.trim_end_matches('\n');
            if !code.trim().is_empty() {
                blocks.push(Block::code(code, code_language(element)));
            }
        }
        "img" => {
            if let Some(src) = element.value().attr("src").filter(|s| !s.is_empty()) {
                let alt = element.value().attr("alt").unwrap_or_default();
                blocks.push(Block::image(src, alt));
            }
        }
        "table" => {
            let rows = table_rows(element);
            if rows.iter().flatten().any(|cell| !cell.is_empty()) {
                blocks.push(Block::table(rows));
            }
        }
        "script" | "style" | "template" => {}
        _ => push_text(blocks, &text, |t| Block::paragraph(t)),
    }
}

fn push_list(blocks: &mut Vec<Block>, list: ElementRef<'_>, ordered: bool) {
    for child in list.children() {
        match child.value() {
            Node::Text(text) => push_text(blocks, text.trim(), |t| Block::paragraph(t)),
            Node::Element(el) if el.name() == "li" => {
                if let Some(item) = ElementRef::wrap(child) {
                    push_text(blocks, &flattened_text(item), |t| Block::list_item(t, ordered));
                }
            }
            Node::Element(_) => {
                if let Some(other) = ElementRef::wrap(child) {
                    push_element(blocks, other);
                }
            }
            _ => {}
        }
    }
}

fn push_text(blocks: &mut Vec<Block>, text: &str, make: impl FnOnce(&str) -> Block) {
    if !text.is_empty() {
        blocks.push(make(text));
    }
}

fn flattened_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// `<pre><code class="language-rust">` → `Some("rust")`
fn code_language(pre: ElementRef<'_>) -> Option<String> {
    pre.children()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "code")
        .and_then(|code| {
            code.value()
                .classes()
                .find_map(|class| class.strip_prefix("language-"))
                .map(str::to_string)
        })
}

fn table_rows(table: ElementRef<'_>) -> Vec<Vec<String>> {
    table
        .descendants()
        .filter_map(ElementRef::wrap)
        .filter(|el| el.value().name() == "tr")
        .map(|row| {
            row.children()
                .filter_map(ElementRef::wrap)
                .filter(|cell| matches!(cell.value().name(), "td" | "th"))
                .map(flattened_text)
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_input_yields_one_empty_paragraph() {
        assert_eq!(normalize(None), vec![Block::empty()]);
        assert_eq!(normalize(Some("")), vec![Block::empty()]);
        assert_eq!(normalize(Some("   \n ")), vec![Block::empty()]);
        assert_eq!(normalize(Some("[]")), vec![Block::empty()]);
        assert_eq!(normalize(Some("<p>   </p><div></div>")), vec![Block::empty()]);
    }

    #[test]
    fn test_heading_mapping() {
        let blocks = normalize(Some("<h2>Title</h2>"));
        assert_eq!(blocks, vec![Block::heading(2, "Title")]);
        assert_eq!(
            serde_json::to_value(&blocks).unwrap(),
            json!([{"type": "heading", "props": {"level": 2}, "content": "Title"}])
        );
    }

    #[test]
    fn test_unknown_tag_degrades_to_paragraph() {
        assert_eq!(
            normalize(Some("<marquee>hi</marquee>")),
            vec![Block::paragraph("hi")]
        );
        // Only h1-h3 are headings
        assert_eq!(
            normalize(Some("<h4>small</h4>")),
            vec![Block::paragraph("small")]
        );
    }

    #[test]
    fn test_block_list_is_returned_unchanged() {
        let raw = json!([
            {"type": "heading", "props": {"level": 1}, "content": "Plan"},
            {"type": "paragraph", "props": {"textAlignment": "center"}, "content": "centered"},
            {"type": "listItem", "props": {"ordered": true}, "content": "first"},
            {"type": "table", "content": {"rows": [["a", "b"]]}}
        ])
        .to_string();

        let parsed: Vec<Block> = serde_json::from_str(&raw).unwrap();
        assert_eq!(normalize(Some(&raw)), parsed);
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let inputs = [
            "",
            "plain words",
            "<h1>A</h1><p>b <b>bold</b></p><ul><li>x</li><li>y</li></ul>",
            "<blockquote>q</blockquote><pre><code class=\"language-rust\">fn main() {}\n</code></pre>",
            "<img src=\"data:image/png;base64,AA==\" alt=\"dot\"><table><tr><th>k</th><td>v</td></tr></table>",
            r#"[{"type":"quote","content":"kept"},{"type":"mystery","content":"lost type"}]"#,
            "<p>unclosed <i>markup",
        ];
        for raw in inputs {
            let once = normalize(Some(raw));
            let reserialized = serialize(&once).unwrap();
            let twice = normalize(Some(&reserialized));
            assert_eq!(once, twice, "drift for input {raw:?}");
            assert_eq!(normalize(Some(&serialize(&twice).unwrap())), twice);
        }
    }

    #[test]
    fn test_markup_mapping() {
        let blocks = normalize(Some(
            "intro<h1>One</h1><h3>Three</h3><blockquote>said</blockquote>\
             <ol><li>first</li><li>second</li></ol><li>loose</li><div>box <span>text</span></div>",
        ));
        assert_eq!(
            blocks,
            vec![
                Block::paragraph("intro"),
                Block::heading(1, "One"),
                Block::heading(3, "Three"),
                Block::quote("said"),
                Block::list_item("first", true),
                Block::list_item("second", true),
                Block::list_item("loose", false),
                Block::paragraph("box text"),
            ]
        );
    }

    #[test]
    fn test_rich_elements() {
        let blocks = normalize(Some(
            "<pre><code class=\"language-rust\">let x = 1;\n</code></pre>\
             <img src=\"a.png\" alt=\"cat\"><img src=\"\">\
             <table><thead><tr><th>h</th></tr></thead><tbody><tr><td>v</td></tr></tbody></table>\
             <script>alert(1)</script>",
        ));
        assert_eq!(
            blocks,
            vec![
                Block::code("let x = 1;", Some("rust".to_string())),
                Block::image("a.png", "cat"),
                Block::table(vec![vec!["h".to_string()], vec!["v".to_string()]]),
            ]
        );
    }

    #[test]
    fn test_malformed_markup_degrades() {
        assert_eq!(
            normalize(Some("<p>unclosed <b>bold")),
            vec![Block::paragraph("unclosed bold")]
        );
        assert_eq!(normalize(Some("<<<>>>")).len(), 1);
    }

    #[test]
    fn test_non_array_json_is_markup() {
        assert_eq!(normalize(Some("42")), vec![Block::paragraph("42")]);
        assert_eq!(detect_format(Some("42")), BodyFormat::Markup);
    }

    #[test]
    fn test_detect_format() {
        assert_eq!(detect_format(None), BodyFormat::Empty);
        assert_eq!(detect_format(Some("[]")), BodyFormat::Empty);
        assert_eq!(
            detect_format(Some(r#"[{"type":"paragraph","content":"x"}]"#)),
            BodyFormat::Blocks
        );
        assert_eq!(detect_format(Some("<p>x</p>")), BodyFormat::Markup);
    }
}

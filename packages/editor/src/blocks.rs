//! # Block model
//!
//! A document body is an ordered list of [`Block`]s. The set of block types is
//! closed: every block the editor understands is a variant here, and anything
//! else degrades to a [`Block::Paragraph`] carrying its text.
//!
//! ## JSON shape
//!
//! Blocks serialise with a `type` tag, optional `props`, and `content`:
//!
//! ```json
//! {"type": "heading", "props": {"level": 2}, "content": "Title"}
//! ```
//!
//! Text `content` is accepted either as a plain string or as an array of inline
//! runs (`[{"type": "text", "text": "Ti"}, {"type": "text", "text": "tle"}]`),
//! which is flattened to a string on read. Inline formatting is not kept.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    #[default]
    Left,
    Center,
    Right,
    Justify,
}

impl Alignment {
    fn is_default(&self) -> bool {
        *self == Alignment::Left
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextProps {
    #[serde(default, skip_serializing_if = "Alignment::is_default")]
    pub text_alignment: Alignment,
}

impl TextProps {
    fn is_default(&self) -> bool {
        *self == TextProps::default()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeadingProps {
    pub level: u8,
    #[serde(default, skip_serializing_if = "Alignment::is_default")]
    pub text_alignment: Alignment,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ListProps {
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub ordered: bool,
}

impl ListProps {
    fn is_default(&self) -> bool {
        !self.ordered
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CodeProps {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl CodeProps {
    fn is_default(&self) -> bool {
        self.language.is_none()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImageProps {
    pub url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub caption: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TableContent {
    pub rows: Vec<Vec<String>>,
}

/// A typed content node.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Block {
    Paragraph {
        #[serde(default, skip_serializing_if = "TextProps::is_default")]
        props: TextProps,
        #[serde(default, deserialize_with = "inline_text")]
        content: String,
    },
    Heading {
        props: HeadingProps,
        #[serde(default, deserialize_with = "inline_text")]
        content: String,
    },
    Quote {
        #[serde(default, deserialize_with = "inline_text")]
        content: String,
    },
    ListItem {
        #[serde(default, skip_serializing_if = "ListProps::is_default")]
        props: ListProps,
        #[serde(default, deserialize_with = "inline_text")]
        content: String,
    },
    CodeBlock {
        #[serde(default, skip_serializing_if = "CodeProps::is_default")]
        props: CodeProps,
        #[serde(default, deserialize_with = "inline_text")]
        content: String,
    },
    Image {
        props: ImageProps,
    },
    Table {
        content: TableContent,
    },
}

impl Block {
    /// The block every empty document resolves to.
    pub fn empty() -> Self {
        Self::paragraph("")
    }

    pub fn paragraph(text: impl Into<String>) -> Self {
        Block::Paragraph {
            props: TextProps::default(),
            content: text.into(),
        }
    }

    /// A heading; `level` is clamped to 1..=6.
    pub fn heading(level: u8, text: impl Into<String>) -> Self {
        Block::Heading {
            props: HeadingProps {
                level: level.clamp(1, 6),
                text_alignment: Alignment::Left,
            },
            content: text.into(),
        }
    }

    pub fn quote(text: impl Into<String>) -> Self {
        Block::Quote {
            content: text.into(),
        }
    }

    pub fn list_item(text: impl Into<String>, ordered: bool) -> Self {
        Block::ListItem {
            props: ListProps { ordered },
            content: text.into(),
        }
    }

    pub fn code(text: impl Into<String>, language: Option<String>) -> Self {
        Block::CodeBlock {
            props: CodeProps { language },
            content: text.into(),
        }
    }

    pub fn image(url: impl Into<String>, caption: impl Into<String>) -> Self {
        Block::Image {
            props: ImageProps {
                url: url.into(),
                caption: caption.into(),
            },
        }
    }

    pub fn table(rows: Vec<Vec<String>>) -> Self {
        Block::Table {
            content: TableContent { rows },
        }
    }

    /// Decode one block from JSON, degrading anything unrecognised to a paragraph.
    pub fn from_value(value: Value) -> Self {
        match serde_json::from_value::<Block>(value.clone()) {
            Ok(block) => block,
            Err(e) => {
                tracing::debug!(error = %e, "degrading unrecognised block to paragraph");
                let text = match &value {
                    Value::Object(map) => map.get("content").map(flatten_text).unwrap_or_default(),
                    other => flatten_text(other),
                };
                Block::paragraph(text)
            }
        }
    }

    /// The serialized `type` tag.
    pub fn type_name(&self) -> &'static str {
        match self {
            Block::Paragraph { .. } => "paragraph",
            Block::Heading { .. } => "heading",
            Block::Quote { .. } => "quote",
            Block::ListItem { .. } => "listItem",
            Block::CodeBlock { .. } => "codeBlock",
            Block::Image { .. } => "image",
            Block::Table { .. } => "table",
        }
    }

    /// Plain text of the block, as used for selection text and search.
    pub fn text(&self) -> String {
        match self {
            Block::Paragraph { content, .. }
            | Block::Heading { content, .. }
            | Block::Quote { content }
            | Block::ListItem { content, .. }
            | Block::CodeBlock { content, .. } => content.clone(),
            Block::Image { props } => props.caption.clone(),
            Block::Table { content } => content
                .rows
                .iter()
                .map(|row| row.join("\t"))
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Block::Image { props } => props.url.is_empty(),
            Block::Table { content } => content.rows.iter().flatten().all(|c| c.is_empty()),
            _ => self.text().is_empty(),
        }
    }
}

fn inline_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(flatten_text(&value))
}

/// Flatten a string or a tree of inline runs into plain text.
fn flatten_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(flatten_text).collect(),
        Value::Object(map) => map
            .get("text")
            .or_else(|| map.get("content"))
            .map(flatten_text)
            .unwrap_or_default(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_heading_json_shape() {
        let block = Block::heading(2, "Title");
        assert_eq!(
            serde_json::to_value(&block).unwrap(),
            json!({"type": "heading", "props": {"level": 2}, "content": "Title"})
        );
    }

    #[test]
    fn test_paragraph_omits_default_props() {
        assert_eq!(
            serde_json::to_value(Block::empty()).unwrap(),
            json!({"type": "paragraph", "content": ""})
        );
    }

    #[test]
    fn test_inline_runs_are_flattened() {
        let block: Block = serde_json::from_value(json!({
            "type": "paragraph",
            "content": [
                {"type": "text", "text": "Hello, ", "styles": {}},
                {"type": "text", "text": "world", "styles": {"bold": true}}
            ]
        }))
        .unwrap();
        assert_eq!(block, Block::paragraph("Hello, world"));
    }

    #[test]
    fn test_unknown_type_degrades() {
        let block = Block::from_value(json!({"type": "checkListItem", "content": "buy milk"}));
        assert_eq!(block, Block::paragraph("buy milk"));

        let block = Block::from_value(json!("loose text"));
        assert_eq!(block, Block::paragraph("loose text"));
    }

    #[test]
    fn test_known_types_decode() {
        let block = Block::from_value(json!({"type": "listItem", "props": {"ordered": true}, "content": "one"}));
        assert_eq!(block, Block::list_item("one", true));

        let block = Block::from_value(json!({"type": "image", "props": {"url": "data:image/png;base64,AA=="}}));
        assert_eq!(block, Block::image("data:image/png;base64,AA==", ""));
    }

    #[test]
    fn test_text_and_emptiness() {
        let table = Block::table(vec![
            vec!["a".into(), "b".into()],
            vec!["c".into(), "d".into()],
        ]);
        assert_eq!(table.text(), "a\tb\nc\td");
        assert!(!table.is_empty());
        assert!(Block::empty().is_empty());
        assert!(!Block::image("x.png", "").is_empty());
        assert_eq!(Block::heading(9, "h"), Block::heading(6, "h"));
    }
}

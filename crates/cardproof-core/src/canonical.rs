//! Content canonicalization.
//!
//! Converts resource content into a stable byte sequence before hashing, so
//! cosmetic differences do not change the digest. The mode is declared in the
//! proof's `resource.canonicalization` field:
//!
//! - `cc-bytes`: identity transform
//! - `cc-html-1`: DOM-level normalization (comments stripped, whitespace
//!   collapsed, volatile attributes removed, attributes sorted)
//! - `cc-pdf-1`, `cc-md-1`: reserved, always `NotImplemented`
//!
//! **CRITICAL**: `cc-html-1` output is part of every HTML proof's digest.
//! Changing the normalization rules breaks existing proofs.

use bytes::Bytes;
use html5ever::serialize::{serialize, SerializeOpts};
use html5ever::tendril::{StrTendril, TendrilSink};
use html5ever::{parse_document, ParseOpts};
use markup5ever_rcdom::{Handle, NodeData, RcDom, SerializableHandle};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CanonError;

/// A canonicalization mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CanonMode {
    /// Raw bytes, unchanged.
    #[serde(rename = "cc-bytes")]
    Bytes,
    /// HTML normalized at the DOM level.
    #[serde(rename = "cc-html-1")]
    HtmlV1,
    /// Reserved for PDF.
    #[serde(rename = "cc-pdf-1")]
    PdfV1,
    /// Reserved for Markdown.
    #[serde(rename = "cc-md-1")]
    MarkdownV1,
}

impl CanonMode {
    /// The wire name of this mode.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bytes => "cc-bytes",
            Self::HtmlV1 => "cc-html-1",
            Self::PdfV1 => "cc-pdf-1",
            Self::MarkdownV1 => "cc-md-1",
        }
    }

    /// Whether this mode only accepts text content.
    pub fn requires_text(self) -> bool {
        matches!(self, Self::HtmlV1 | Self::MarkdownV1)
    }
}

impl fmt::Display for CanonMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CanonMode {
    type Err = CanonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cc-bytes" => Ok(Self::Bytes),
            "cc-html-1" => Ok(Self::HtmlV1),
            "cc-pdf-1" => Ok(Self::PdfV1),
            "cc-md-1" => Ok(Self::MarkdownV1),
            other => Err(CanonError::UnsupportedMode(other.to_string())),
        }
    }
}

/// Resource content handed to the canonicalizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content {
    /// Textual content (HTML, Markdown, plain text).
    Text(String),
    /// Opaque bytes.
    Binary(Bytes),
}

impl Content {
    /// The raw bytes of this content, text encoded as UTF-8.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Text(s) => s.as_bytes(),
            Self::Binary(b) => b,
        }
    }
}

impl From<String> for Content {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<&str> for Content {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<Bytes> for Content {
    fn from(b: Bytes) -> Self {
        Self::Binary(b)
    }
}

impl From<Vec<u8>> for Content {
    fn from(b: Vec<u8>) -> Self {
        Self::Binary(Bytes::from(b))
    }
}

impl From<&[u8]> for Content {
    fn from(b: &[u8]) -> Self {
        Self::Binary(Bytes::copy_from_slice(b))
    }
}

/// Which attributes `cc-html-1` treats as volatile and strips.
///
/// Names are compared case-insensitively. The default set covers CSP nonces,
/// subresource integrity hashes and Next.js build markers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HtmlPolicy {
    /// Attribute names removed outright.
    pub strip_exact: Vec<String>,
    /// Attribute name prefixes removed.
    pub strip_prefixes: Vec<String>,
}

impl Default for HtmlPolicy {
    fn default() -> Self {
        Self {
            strip_exact: vec!["nonce".into(), "integrity".into()],
            strip_prefixes: vec!["data-n-".into(), "data-nextjs".into()],
        }
    }
}

impl HtmlPolicy {
    fn is_volatile(&self, name: &str) -> bool {
        let name = name.to_ascii_lowercase();
        self.strip_exact.iter().any(|n| n.eq_ignore_ascii_case(&name))
            || self
                .strip_prefixes
                .iter()
                .any(|p| name.starts_with(&p.to_ascii_lowercase()))
    }
}

/// Canonicalize content with the default HTML policy.
pub fn canonicalize(content: &Content, mode: CanonMode) -> Result<Vec<u8>, CanonError> {
    canonicalize_with(content, mode, &HtmlPolicy::default())
}

/// Canonicalize content with an explicit HTML policy.
pub fn canonicalize_with(
    content: &Content,
    mode: CanonMode,
    policy: &HtmlPolicy,
) -> Result<Vec<u8>, CanonError> {
    match mode {
        CanonMode::Bytes => Ok(content.as_bytes().to_vec()),
        CanonMode::HtmlV1 => match content {
            Content::Text(html) => canonicalize_html(html, policy).map(String::into_bytes),
            Content::Binary(_) => Err(CanonError::TypeMismatch(mode)),
        },
        CanonMode::PdfV1 | CanonMode::MarkdownV1 => Err(CanonError::NotImplemented(mode)),
    }
}

/// Canonicalize an HTML document under `cc-html-1`.
pub fn canonicalize_html(html: &str, policy: &HtmlPolicy) -> Result<String, CanonError> {
    let dom = parse_document(RcDom::default(), ParseOpts::default()).one(html);

    normalize_children(&dom.document, policy);

    let document: SerializableHandle = dom.document.clone().into();
    let mut out = Vec::new();
    serialize(&mut out, &document, SerializeOpts::default())
        .map_err(|e| CanonError::Html(e.to_string()))?;

    String::from_utf8(out).map_err(|e| CanonError::Html(e.to_string()))
}

/// Normalize a node's children in place, dropping comments and empty text.
fn normalize_children(node: &Handle, policy: &HtmlPolicy) {
    let children: Vec<Handle> = node.children.borrow().clone();
    let mut kept = Vec::with_capacity(children.len());

    for child in children {
        match &child.data {
            NodeData::Comment { .. } => continue,
            NodeData::Text { contents } => {
                let collapsed = collapse_whitespace(&contents.borrow());
                if collapsed.is_empty() {
                    continue;
                }
                *contents.borrow_mut() = StrTendril::from(collapsed);
            }
            NodeData::Element {
                attrs,
                template_contents,
                ..
            } => {
                let mut attrs = attrs.borrow_mut();
                attrs.retain(|a| !policy.is_volatile(&a.name.local));
                attrs.sort_by(|a, b| a.name.local.as_bytes().cmp(b.name.local.as_bytes()));
                drop(attrs);

                if let Some(contents) = template_contents.borrow().as_ref() {
                    normalize_children(contents, policy);
                }
                normalize_children(&child, policy);
            }
            _ => {}
        }
        kept.push(child);
    }

    *node.children.borrow_mut() = kept;
}

/// Collapse every whitespace run to one space and trim both ends.
fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn html(s: &str) -> String {
        canonicalize_html(s, &HtmlPolicy::default()).unwrap()
    }

    #[test]
    fn test_bytes_mode_is_identity() {
        let out = canonicalize(&Content::from("hello world"), CanonMode::Bytes).unwrap();
        assert_eq!(out, b"hello world");

        let bin = Content::from(vec![0u8, 159, 146, 150]);
        assert_eq!(canonicalize(&bin, CanonMode::Bytes).unwrap(), vec![0u8, 159, 146, 150]);
    }

    #[test]
    fn test_mode_wire_names() {
        for mode in [
            CanonMode::Bytes,
            CanonMode::HtmlV1,
            CanonMode::PdfV1,
            CanonMode::MarkdownV1,
        ] {
            assert_eq!(mode.as_str().parse::<CanonMode>().unwrap(), mode);
            let json = serde_json::to_string(&mode).unwrap();
            assert_eq!(json, format!("\"{}\"", mode.as_str()));
        }
    }

    #[test]
    fn test_unknown_mode_rejected() {
        assert_eq!(
            "cc-docx-1".parse::<CanonMode>(),
            Err(CanonError::UnsupportedMode("cc-docx-1".into()))
        );
    }

    #[test]
    fn test_reserved_modes_not_implemented() {
        let content = Content::from("# title");
        assert_eq!(
            canonicalize(&content, CanonMode::PdfV1),
            Err(CanonError::NotImplemented(CanonMode::PdfV1))
        );
        assert_eq!(
            canonicalize(&content, CanonMode::MarkdownV1),
            Err(CanonError::NotImplemented(CanonMode::MarkdownV1))
        );
    }

    #[test]
    fn test_html_requires_text() {
        let bin = Content::from(b"<p>hi</p>".as_slice());
        assert_eq!(
            canonicalize(&bin, CanonMode::HtmlV1),
            Err(CanonError::TypeMismatch(CanonMode::HtmlV1))
        );
    }

    #[test]
    fn test_html_strips_comments() {
        let out = html("<p>a<!-- build 42 -->b</p>");
        assert!(!out.contains("build 42"));
        assert!(!out.contains("<!--"));
    }

    #[test]
    fn test_html_collapses_whitespace() {
        let out = html("<p>  hello \n\t  world  </p>");
        assert!(out.contains("<p>hello world</p>"), "got {}", out);
    }

    #[test]
    fn test_html_drops_whitespace_only_text() {
        let a = html("<div>\n  <span>x</span>\n</div>");
        let b = html("<div><span>x</span></div>");
        assert_eq!(a, b);
    }

    #[test]
    fn test_html_attribute_order_irrelevant() {
        let a = html(r#"<a href="/x" id="l" class="c">t</a>"#);
        let b = html(r#"<a class="c" id="l" href="/x">t</a>"#);
        assert_eq!(a, b);
        assert!(a.contains(r#"<a class="c" href="/x" id="l">"#), "got {}", a);
    }

    #[test]
    fn test_html_strips_volatile_attributes() {
        let out = html(
            r#"<script nonce="abc" integrity="sha384-x" data-nextjs-router="1" src="/a.js"></script>
               <div data-n-head="ssr" data-keep="y">z</div>"#,
        );
        assert!(!out.contains("nonce"));
        assert!(!out.contains("integrity"));
        assert!(!out.contains("data-nextjs-router"));
        assert!(!out.contains("data-n-head"));
        assert!(out.contains(r#"data-keep="y""#));
        assert!(out.contains(r#"src="/a.js""#));
    }

    #[test]
    fn test_html_custom_policy() {
        let policy = HtmlPolicy {
            strip_exact: vec!["nonce".into()],
            strip_prefixes: vec!["data-v-".into()],
        };
        let out = canonicalize_html(
            r#"<p data-v-1234="" integrity="keep">x</p>"#,
            &policy,
        )
        .unwrap();
        assert!(!out.contains("data-v-1234"));
        assert!(out.contains("integrity"));
    }

    #[test]
    fn test_html_deterministic() {
        let doc = "<!DOCTYPE html><html><head><title> T </title></head><body><p b='2' a='1'>x</p></body></html>";
        assert_eq!(html(doc), html(doc));
    }

    #[test]
    fn test_html_distinct_content_distinct_output() {
        assert_ne!(html("<p>one</p>"), html("<p>two</p>"));
    }
}

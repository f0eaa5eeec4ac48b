//! Embedding and discovery helpers.
//!
//! A resource points at its proof through an HTTP `Link` header or a
//! `<link rel="cardproof">` element; SVG files may carry the proof inline in
//! their `<metadata>`. These helpers produce and read those markers. They do
//! no network I/O.

use html5ever::tendril::TendrilSink;
use html5ever::{local_name, parse_document, ParseOpts};
use markup5ever_rcdom::{Handle, NodeData, RcDom};

/// Link relation naming a resource's proof.
pub const PROOF_REL: &str = "cardproof";

/// Namespace of the SVG proof metadata elements.
pub const SVG_PROOF_NS: &str = "https://chatcard.cloud/ns";

/// `<link>` (and optional digest `<meta>`) tags for an HTML `<head>`.
pub fn embed_html(proof_url: &str, digest: Option<&str>) -> String {
    let mut tag = format!(
        r#"<link rel="{}" href="{}">"#,
        PROOF_REL,
        escape_html(proof_url)
    );
    if let Some(digest) = digest {
        tag.push_str(&format!(
            "\n<meta name=\"card:digest\" content=\"{}\">",
            escape_html(digest)
        ));
    }
    tag
}

/// Insert a proof `<metadata>` block before the closing `</svg>`, or append it
/// when there is none.
pub fn embed_svg(svg: &str, proof_url: &str, owner: &str, digest: &str, signature: &str) -> String {
    let metadata = format!(
        "\n  <metadata>\n    <cc:proof xmlns:cc=\"{}\">\n      <cc:proofUri>{}</cc:proofUri>\n      <cc:ownerDid>{}</cc:ownerDid>\n      <cc:digest>{}</cc:digest>\n      <cc:signature>{}</cc:signature>\n    </cc:proof>\n  </metadata>",
        SVG_PROOF_NS,
        escape_xml(proof_url),
        escape_xml(owner),
        escape_xml(digest),
        escape_xml(signature),
    );

    match svg.find("</svg>") {
        Some(at) => format!("{}{}\n{}", &svg[..at], metadata, &svg[at..]),
        None => format!("{}{}", svg, metadata),
    }
}

/// The target of the first `rel=cardproof` entry in a `Link` header value.
pub fn proof_url_from_link_header(header: &str) -> Option<String> {
    header.split(',').find_map(|link| {
        let mut parts = link.split(';');
        let target = parts.next()?.trim();
        let target = target.strip_prefix('<')?.strip_suffix('>')?;

        let is_proof = parts.any(|param| {
            let Some((name, value)) = param.split_once('=') else {
                return false;
            };
            name.trim().eq_ignore_ascii_case("rel")
                && value
                    .trim()
                    .trim_matches(|c| c == '"' || c == '\'')
                    .split_ascii_whitespace()
                    .any(|rel| rel.eq_ignore_ascii_case(PROOF_REL))
        });
        is_proof.then(|| target.to_string())
    })
}

/// The `href` of the first `<link rel="cardproof">` element in a document.
pub fn proof_url_from_html(html: &str) -> Option<String> {
    let dom = parse_document(RcDom::default(), ParseOpts::default()).one(html);
    find_proof_link(&dom.document)
}

fn find_proof_link(node: &Handle) -> Option<String> {
    if let NodeData::Element { name, attrs, .. } = &node.data {
        if name.local == local_name!("link") {
            let attrs = attrs.borrow();
            let attr = |wanted| {
                attrs
                    .iter()
                    .find(|a| a.name.local == wanted)
                    .map(|a| a.value.to_string())
            };
            let is_proof = attr(local_name!("rel")).is_some_and(|rel| {
                rel.split_ascii_whitespace()
                    .any(|r| r.eq_ignore_ascii_case(PROOF_REL))
            });
            if is_proof {
                if let Some(href) = attr(local_name!("href")) {
                    return Some(href);
                }
            }
        }
    }

    node.children.borrow().iter().find_map(find_proof_link)
}

fn escape_html(s: &str) -> String {
    escape(s, "&#39;")
}

fn escape_xml(s: &str) -> String {
    escape(s, "&apos;")
}

fn escape(s: &str, apostrophe: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str(apostrophe),
            c => out.push(c),
        }
    }
    out
}

//! Proptest generators for property-based testing.

use chrono::{DateTime, Utc};
use proptest::prelude::*;

use cardproof_core::{Authorship, CanonMode, Keypair, ProofBuilder, SignedProof, Visibility};

/// Generate a random keypair.
pub fn keypair() -> impl Strategy<Value = Keypair> {
    any::<[u8; 32]>().prop_map(|seed| Keypair::from_seed(&seed))
}

/// Generate an identity string.
pub fn did() -> impl Strategy<Value = String> {
    "did:cc:[a-z][a-z0-9]{0,15}".prop_map(String::from)
}

pub fn authorship() -> impl Strategy<Value = Authorship> {
    prop_oneof![
        Just(Authorship::Mine),
        Just(Authorship::Collab),
        Just(Authorship::Remix),
        Just(Authorship::Inspired),
    ]
}

pub fn visibility() -> impl Strategy<Value = Visibility> {
    prop_oneof![
        Just(Visibility::Public),
        Just(Visibility::Unlisted),
        Just(Visibility::Private),
    ]
}

/// Generate a signing time between 1970 and 2100, in whole milliseconds.
pub fn signed_at_millis() -> impl Strategy<Value = i64> {
    0i64..=4_102_444_800_000i64
}

/// Generate content bytes of specified max length.
pub fn content(max_len: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..=max_len)
}

/// One element of a generated HTML body.
#[derive(Debug, Clone)]
struct Element {
    tag: &'static str,
    attrs: Vec<(&'static str, String)>,
    words: Vec<String>,
}

fn element() -> impl Strategy<Value = Element> {
    (
        prop::sample::select(vec!["p", "div", "span", "section", "em"]),
        prop::sample::subsequence(vec!["alt", "class", "href", "id", "lang", "title"], 0..=4),
        prop::collection::vec("[a-z0-9]{0,6}", 4),
        prop::collection::vec("[a-z]{1,8}", 1..=4),
    )
        .prop_map(|(tag, names, values, words)| Element {
            tag,
            attrs: names.into_iter().zip(values).collect(),
            words,
        })
}

/// Two renderings of the same HTML document.
///
/// The second reverses every element's attributes, pads text with extra
/// whitespace and adds a comment plus volatile `nonce` and `integrity`
/// attributes. Both must canonicalize identically under `cc-html-1`.
pub fn equivalent_html() -> impl Strategy<Value = (String, String)> {
    prop::collection::vec(element(), 1..=6).prop_map(|elements| {
        let mut tidy = String::from("<!doctype html><html><head><title>t</title></head><body>");
        let mut messy = String::from("<!doctype html>\n<html>\n <head>\n  <title> t </title>\n </head>\n <body>\n");

        for (i, el) in elements.iter().enumerate() {
            let attrs = |reversed: bool| {
                let mut attrs: Vec<String> = el
                    .attrs
                    .iter()
                    .map(|(name, value)| format!("{}=\"{}\"", name, value))
                    .collect();
                if reversed {
                    attrs.reverse();
                }
                attrs
            };

            tidy.push_str(&format!("<{}", el.tag));
            for attr in attrs(false) {
                tidy.push(' ');
                tidy.push_str(&attr);
            }
            tidy.push_str(&format!(">{}</{}>", el.words.join(" "), el.tag));

            messy.push_str(&format!("  <!-- element {} -->\n  <{} nonce=\"n{}\"", i, el.tag, i));
            for attr in attrs(true) {
                messy.push_str("   ");
                messy.push_str(&attr);
            }
            messy.push_str(&format!(
                " integrity=\"sha384-{}\">\n\t {} \n  </{}>\n",
                i,
                el.words.join(" \n  "),
                el.tag
            ));
        }

        tidy.push_str("</body></html>");
        messy.push_str(" </body>\n</html>\n");
        (tidy, messy)
    })
}

/// Parameters for signing a proof.
#[derive(Debug, Clone)]
pub struct ProofParams {
    pub keypair: Keypair,
    pub owner: String,
    pub url: String,
    pub content: Vec<u8>,
    pub authorship: Authorship,
    pub visibility: Visibility,
    pub license: Option<String>,
    pub signed_at_millis: i64,
}

impl Arbitrary for ProofParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (
            any::<[u8; 32]>(), // seed
            did(),
            "https://[a-z]{1,10}\\.test/[a-z0-9/]{0,20}",
            content(512),
            authorship(),
            visibility(),
            proptest::option::of("CC-BY(-SA)?-4\\.0"),
            signed_at_millis(),
        )
            .prop_map(
                |(seed, owner, url, content, authorship, visibility, license, signed_at_millis)| {
                    ProofParams {
                        keypair: Keypair::from_seed(&seed),
                        owner,
                        url,
                        content,
                        authorship,
                        visibility,
                        license,
                        signed_at_millis,
                    }
                },
            )
            .boxed()
    }
}

/// Sign a `cc-bytes` proof from parameters.
pub fn proof_from_params(params: &ProofParams) -> SignedProof {
    let signed_at =
        DateTime::<Utc>::from_timestamp_millis(params.signed_at_millis).expect("generated time in range");

    let mut builder = ProofBuilder::new(
        params.url.as_str(),
        params.content.clone(),
        "application/octet-stream",
        CanonMode::Bytes,
        params.owner.as_str(),
    )
    .authorship(params.authorship)
    .visibility(params.visibility)
    .signed_at(signed_at);

    if let Some(license) = &params.license {
        builder = builder.license(license.as_str());
    }

    builder.sign(&params.keypair).expect("bytes mode never fails")
}

#[cfg(test)]
mod tests {
    use super::*;
    use cardproof_core::{canonicalize, Content};

    proptest! {
        #[test]
        fn test_proof_id_deterministic(params: ProofParams) {
            let p1 = proof_from_params(&params);
            let p2 = proof_from_params(&params);

            prop_assert_eq!(p1.id, p2.id);
            prop_assert_eq!(p1.document, p2.document);
        }

        #[test]
        fn test_html_renderings_differ_in_source(pair in equivalent_html()) {
            let (tidy, messy) = pair;
            prop_assert_ne!(&tidy, &messy);
            prop_assert!(canonicalize(&Content::from(tidy), CanonMode::HtmlV1).is_ok());
        }
    }
}

//! Property tests over signing, verification and canonicalization.

use proptest::prelude::*;

use cardproof_core::encoding::{from_base64, to_base64};
use cardproof_core::{
    canonicalize, verify_proof, Anchor, CanonMode, Content, Tier, VerifyFailure,
};
use cardproof_testkit::generators::{content, equivalent_html, proof_from_params, ProofParams};

proptest! {
    #[test]
    fn canonical_html_ignores_attribute_order_and_whitespace(pair in equivalent_html()) {
        let (tidy, messy) = pair;
        let a = canonicalize(&Content::from(tidy), CanonMode::HtmlV1).unwrap();
        let b = canonicalize(&Content::from(messy), CanonMode::HtmlV1).unwrap();
        prop_assert_eq!(String::from_utf8(a).unwrap(), String::from_utf8(b).unwrap());
    }

    #[test]
    fn canonicalization_is_deterministic(bytes in content(256), pair in equivalent_html()) {
        let binary = Content::from(bytes);
        prop_assert_eq!(
            canonicalize(&binary, CanonMode::Bytes).unwrap(),
            canonicalize(&binary, CanonMode::Bytes).unwrap()
        );

        let html = Content::from(pair.1);
        prop_assert_eq!(
            canonicalize(&html, CanonMode::HtmlV1).unwrap(),
            canonicalize(&html, CanonMode::HtmlV1).unwrap()
        );
    }

    #[test]
    fn signed_proofs_verify(params: ProofParams) {
        let proof = proof_from_params(&params);
        let report = verify_proof(&proof.document, &Content::from(params.content.clone()));

        prop_assert!(report.valid);
        prop_assert_eq!(report.tier, Tier::L2);
        prop_assert_eq!(report.owner.as_deref(), Some(params.owner.as_str()));
        prop_assert_eq!(report.authorship, Some(params.authorship));
    }

    #[test]
    fn flipped_content_byte_is_hash_mismatch(params: ProofParams, index in any::<prop::sample::Index>()) {
        prop_assume!(!params.content.is_empty());
        let proof = proof_from_params(&params);

        let mut tampered = params.content.clone();
        let i = index.index(tampered.len());
        tampered[i] ^= 0x01;

        let report = verify_proof(&proof.document, &Content::from(tampered));
        prop_assert!(!report.valid);
        prop_assert_eq!(report.tier, Tier::L1);
        prop_assert_eq!(report.error, Some(VerifyFailure::HashMismatch));
        prop_assert!(report.owner.is_none());
    }

    #[test]
    fn flipped_signature_byte_is_bad_signature(params: ProofParams, index in any::<prop::sample::Index>()) {
        let mut proof = proof_from_params(&params);

        let mut sig = from_base64(&proof.document.signature.signature).unwrap();
        let i = index.index(sig.len());
        sig[i] ^= 0x80;
        proof.document.signature.signature = to_base64(&sig);

        let report = verify_proof(&proof.document, &Content::from(params.content.clone()));
        prop_assert!(!report.valid);
        prop_assert_eq!(report.tier, Tier::L1);
        prop_assert_eq!(report.error, Some(VerifyFailure::BadSignature));
    }

    #[test]
    fn signing_time_changes_identifier(params: ProofParams, delta in 1i64..=86_400_000i64) {
        let mut later = params.clone();
        later.signed_at_millis = params.signed_at_millis.saturating_add(delta).min(4_102_444_800_000);
        prop_assume!(later.signed_at_millis != params.signed_at_millis);

        prop_assert_ne!(proof_from_params(&params).id, proof_from_params(&later).id);
    }

    #[test]
    fn anchors_raise_tier_only_with_valid_signature(params: ProofParams) {
        let mut proof = proof_from_params(&params);
        let original_id = proof.id;
        proof.document.anchors.push(Anchor {
            chain: Some("none".into()),
            ..Default::default()
        });

        let content = Content::from(params.content.clone());
        let report = verify_proof(&proof.document, &content);
        prop_assert_eq!(report.tier, Tier::L3);
        prop_assert_eq!(proof.document.content_id().unwrap(), original_id);

        proof.document.claim.owner.push('x');
        let report = verify_proof(&proof.document, &content);
        prop_assert_eq!(report.tier, Tier::L1);
        prop_assert_eq!(report.error, Some(VerifyFailure::BadSignature));
    }
}

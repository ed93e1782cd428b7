#![no_main]

//! Fuzz target for device-trust classification
//!
//! Checks the decision table invariants on arbitrary fingerprints: a
//! submission enrolls only when no anchor exists, and is present only for a
//! biometric submission from the anchored device.
//!
//! Run with: cargo +nightly fuzz run fuzz_trust_decision

use libfuzzer_sys::fuzz_target;
use rollcall_core::{trust, AuthMethod, Verdict};

fuzz_target!(|data: &[u8]| {
    let Some((&flags, rest)) = data.split_first() else {
        return;
    };
    let text = String::from_utf8_lossy(rest);
    let text: &str = &text;
    let (enrolled, asserted) = text.split_once('|').unwrap_or((text, text));

    let anchor = (flags & 1 == 1).then_some(enrolled);
    let method = if flags & 2 == 2 {
        AuthMethod::Fallback
    } else {
        AuthMethod::Biometric
    };

    let decision = trust::decide(anchor, asserted, method);
    let has_anchor = anchor.is_some_and(|a| !a.is_empty());

    assert_eq!(decision.enroll, !has_anchor);
    if decision.verdict == Verdict::Present {
        assert_eq!(method, AuthMethod::Biometric);
        assert!(!has_anchor || anchor == Some(asserted));
    }
});

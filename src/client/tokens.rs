//! Byte-pair token counting for pre-flight cost estimates.
//!
//! Uses the cl100k_base vocabulary, the same scheme the target model
//! families bill against, so estimated prompt-token counts line up with
//! provider-reported usage.

use std::sync::OnceLock;
use tiktoken_rs::{cl100k_base, CoreBPE};

fn encoder() -> &'static CoreBPE {
    static ENCODER: OnceLock<CoreBPE> = OnceLock::new();
    // The vocabulary is compiled into the binary; loading it cannot fail.
    ENCODER.get_or_init(|| cl100k_base().expect("bundled cl100k_base vocabulary"))
}

/// Number of cl100k_base tokens in `text`.
pub fn count_tokens(text: &str) -> usize {
    encoder().encode_with_special_tokens(text).len()
}

/// Round a currency amount up to the nearest cent.
///
/// Estimates must never under-promise cost to the operator, so the
/// rounding is a ceiling, not nearest.
pub fn ceil_to_cent(amount: f64) -> f64 {
    (amount * 100.0).ceil() / 100.0
}

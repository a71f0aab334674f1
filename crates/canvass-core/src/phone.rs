// SPDX-FileCopyrightText: 2026 Canvass Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Phone number canonicalization.
//!
//! Every component that touches a phone number goes through [`normalize`]
//! first, so the same external party always maps to the same conversation
//! regardless of how the number was typed.

/// Normalize any textual phone input to a canonical E.164-like form.
///
/// Rules:
/// - All non-digit characters are stripped.
/// - A 10-digit number is assumed to be NANP and prefixed with `+1`.
/// - An 11-digit number starting with `1` gets a `+` prefix.
/// - Anything else keeps its digits with a `+` prefix.
///
/// `"(555) 010-0100"`, `"15550100100"`, and `"+15550100100"` all produce
/// `"+15550100100"`.
pub fn normalize(raw: &str) -> String {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    match digits.len() {
        10 => format!("+1{digits}"),
        11 if digits.starts_with('1') => format!("+{digits}"),
        _ => format!("+{digits}"),
    }
}

/// True when the input has at least one digit to dial.
///
/// [`normalize`] maps digit-free input to the degenerate `"+"`, which must
/// never key a conversation or reach a provider.
pub fn is_dialable(raw: &str) -> bool {
    raw.chars().any(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formatted_bare_and_e164_inputs_converge() {
        let canonical = normalize("+15550100100");
        assert_eq!(normalize("(555) 010-0100"), canonical);
        assert_eq!(normalize("15550100100"), canonical);
        assert_eq!(normalize("555-010-0100"), canonical);
        assert_eq!(normalize("555.010.0100"), canonical);
        assert_eq!(canonical, "+15550100100");
    }

    #[test]
    fn non_nanp_numbers_keep_their_digits() {
        assert_eq!(normalize("+442079460958"), "+442079460958");
        assert_eq!(normalize("44 20 7946 0958"), "+442079460958");
    }

    #[test]
    fn idempotent_on_canonical_input() {
        let once = normalize("(555) 010-0100");
        assert_eq!(normalize(&once), once);
    }

    #[test]
    fn digit_free_input_is_not_dialable() {
        assert!(!is_dialable(""));
        assert!(!is_dialable("   "));
        assert!(!is_dialable("+-()"));
        assert!(is_dialable("(555) 010-0100"));
    }
}

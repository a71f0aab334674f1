// SPDX-FileCopyrightText: 2026 Canvass Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sentinel classification of completion-model output.
//!
//! The model is instructed to embed fixed literal strings in its output as
//! out-of-band control signals. Model text is low-trust input, so the checks
//! live here as one pure function with an explicit precedence order instead
//! of being scattered through the executor.

/// Sentinel that ceases responding for this turn. No message is sent.
pub const STOP_SENTINEL: &str = "STOP_SCENARIO";

/// Sentinels that hand the conversation off to a person.
pub const NEED_HUMAN_SENTINELS: [&str; 2] = ["NEED_HUMAN", "HUMAN_NEEDED"];

/// What the executor should do with a model response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseAction {
    /// Cease responding. No outbound message for this turn.
    Stop,
    /// Hand off to a human: label the conversation, latch manual override,
    /// send the fixed transitional message.
    NeedHuman,
    /// Plain reply: send the full text to the customer.
    Reply(String),
}

/// Classify a raw model response.
///
/// Sentinels are matched as case-sensitive substrings, checked in priority
/// order: stop first, then hand-off, otherwise the whole text is the reply.
pub fn classify_response(text: &str) -> ResponseAction {
    if text.contains(STOP_SENTINEL) {
        return ResponseAction::Stop;
    }
    if NEED_HUMAN_SENTINELS.iter().any(|s| text.contains(s)) {
        return ResponseAction::NeedHuman;
    }
    ResponseAction::Reply(text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_sentinel_anywhere_in_text_stops() {
        assert_eq!(classify_response("STOP_SCENARIO"), ResponseAction::Stop);
        assert_eq!(
            classify_response("Thanks for letting me know. STOP_SCENARIO"),
            ResponseAction::Stop
        );
    }

    #[test]
    fn stop_takes_priority_over_need_human() {
        assert_eq!(
            classify_response("STOP_SCENARIO NEED_HUMAN"),
            ResponseAction::Stop
        );
    }

    #[test]
    fn both_hand_off_spellings_are_recognized() {
        assert_eq!(classify_response("NEED_HUMAN"), ResponseAction::NeedHuman);
        assert_eq!(
            classify_response("I think HUMAN_NEEDED here"),
            ResponseAction::NeedHuman
        );
    }

    #[test]
    fn sentinels_are_case_sensitive() {
        assert_eq!(
            classify_response("stop_scenario"),
            ResponseAction::Reply("stop_scenario".to_string())
        );
    }

    #[test]
    fn plain_text_is_the_reply_verbatim() {
        let text = "Hi! Are you still interested in a quote?";
        assert_eq!(
            classify_response(text),
            ResponseAction::Reply(text.to_string())
        );
    }
}

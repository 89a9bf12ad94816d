//! Keyword intent inference
//!
//! Deliberately simple: the AI service owns the conversation, this only
//! labels turns for reporting and golden-frame comparison, so it has to be
//! deterministic and dependency-free.

const BOOKING_KEYWORDS: &[&str] = &[
    "appointment",
    "book",
    "schedule",
    "reschedule",
    "reservation",
];

const MESSAGE_KEYWORDS: &[&str] = &["message", "call me back", "leave a note"];

/// Infer a coarse intent label from a caller utterance.
pub fn infer_intent(text: &str) -> Option<&'static str> {
    let lower = text.to_lowercase();
    if BOOKING_KEYWORDS.iter().any(|k| lower.contains(k)) {
        return Some("booking");
    }
    if MESSAGE_KEYWORDS.iter().any(|k| lower.contains(k)) {
        return Some("message");
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_booking_keywords() {
        assert_eq!(infer_intent("I want to BOOK a slot"), Some("booking"));
        assert_eq!(infer_intent("can we reschedule?"), Some("booking"));
    }

    #[test]
    fn test_message_keywords() {
        assert_eq!(infer_intent("please leave a note for Dr. Lee"), Some("message"));
    }

    #[test]
    fn test_no_intent() {
        assert_eq!(infer_intent("where are you located?"), None);
    }
}

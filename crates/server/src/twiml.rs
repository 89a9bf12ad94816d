//! TwiML generation
//!
//! The carrier aborts call setup on a malformed or missing response, so
//! everything here is infallible: plain string assembly with XML escaping,
//! and a canned emergency document for when nothing else can be built.

/// Returned when the entry handler itself fails. Must always be valid.
pub const EMERGENCY_TWIML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Response>
    <Say voice="alice">Thank you for calling. We are experiencing technical difficulties. Please try again in a moment.</Say>
    <Hangup/>
</Response>"#;

/// Escape text for use inside an XML element or attribute.
fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

/// `<Connect><Stream>` directive with per-call parameters the stream
/// handler reads back from the carrier's start event.
pub fn connect_stream(url: &str, parameters: &[(&str, &str)]) -> String {
    let mut params = String::new();
    for (name, value) in parameters {
        params.push_str(&format!(
            "\n            <Parameter name=\"{}\" value=\"{}\"/>",
            escape(name),
            escape(value)
        ));
    }
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<Response>\n    <Connect>\n        <Stream url=\"{}\">{}\n        </Stream>\n    </Connect>\n</Response>",
        escape(url),
        params
    )
}

/// Speak a message and hang up, used for denied calls.
pub fn say_and_hangup(message: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<Response>\n    <Say voice=\"alice\">{}</Say>\n    <Hangup/>\n</Response>",
        escape(message)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_stream_contains_url_and_parameters() {
        let twiml = connect_stream(
            "wss://calls.example.com/twilio/stream",
            &[("call_sid", "CA1"), ("from_number", "+15550001111")],
        );
        assert!(twiml.contains("<Connect>"));
        assert!(twiml.contains("url=\"wss://calls.example.com/twilio/stream\""));
        assert!(twiml.contains("<Parameter name=\"call_sid\" value=\"CA1\"/>"));
        assert!(twiml.contains("<Parameter name=\"from_number\" value=\"+15550001111\"/>"));
    }

    #[test]
    fn test_say_and_hangup_escapes_message() {
        let twiml = say_and_hangup("We're closed <today>");
        assert!(twiml.contains("We&apos;re closed &lt;today&gt;"));
        assert!(twiml.contains("<Hangup/>"));
    }

    #[test]
    fn test_emergency_twiml_is_wellformed() {
        assert!(EMERGENCY_TWIML.starts_with("<?xml"));
        assert!(EMERGENCY_TWIML.contains("<Hangup/>"));
    }
}

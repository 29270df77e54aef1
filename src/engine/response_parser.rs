use serde_json::Value;

use crate::engine::error::EngineError;

/// Outcome of cleaning a raw generator reply. The generator is
/// non-deterministic: sometimes it returns the JSON we asked for, sometimes
/// fenced JSON, sometimes prose. Prose is not an error: callers that wanted
/// free text use it as-is, callers that wanted structure report a missing
/// field.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedReply {
    Json(Value),
    Text(String),
}

impl ParsedReply {
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            ParsedReply::Json(v) => Some(v),
            ParsedReply::Text(_) => None,
        }
    }
}

/// Clean and decode one generator reply.
///
/// Empty input is the only hard failure. Everything else resolves to either
/// `Json` or `Text`; this boundary never throws on malformed structure.
/// If the payload turns out to be a chat-completions envelope
/// (`choices[0].message.content`), the inner string is unwrapped and cleaned
/// once more; exactly one level, never recursively.
pub fn parse_reply(raw: &str) -> Result<ParsedReply, EngineError> {
    if raw.trim().is_empty() {
        return Err(EngineError::Parse("generator returned an empty reply".into()));
    }

    Ok(match clean_and_decode(raw) {
        ParsedReply::Json(value) => match envelope_content(&value) {
            Some(inner) => clean_and_decode(inner),
            None => ParsedReply::Json(value),
        },
        text => text,
    })
}

fn clean_and_decode(raw: &str) -> ParsedReply {
    let cleaned = strip_fences(raw);
    match serde_json::from_str::<Value>(cleaned) {
        Ok(value) => ParsedReply::Json(value),
        Err(_) => ParsedReply::Text(cleaned.to_string()),
    }
}

/// Remove one leading and one trailing markdown fence marker, anchored at
/// the ends of the text. Language tags ("```json") are accepted; fences in
/// the middle of the text are left alone.
pub fn strip_fences(raw: &str) -> &str {
    let mut text = raw.trim();

    if let Some(rest) = text.strip_prefix("```") {
        // Drop an optional language tag up to the first newline.
        match rest.split_once('\n') {
            Some((_tag, body)) => text = body,
            None => text = rest,
        }
    }

    if let Some(rest) = text.trim_end().strip_suffix("```") {
        text = rest;
    }

    text.trim()
}

/// `choices[0].message.content` when present and a string. Some gateways
/// hand the whole completion envelope back instead of the message body.
fn envelope_content(value: &Value) -> Option<&str> {
    value
        .get("choices")?
        .get(0)?
        .get("message")?
        .get("content")?
        .as_str()
}

/// Case-insensitive field lookup on a JSON object. The generator is not
/// reliable about key casing, so every required-field probe goes through
/// here instead of reshaping whole objects at runtime.
pub fn get_ci<'v>(value: &'v Value, key: &str) -> Option<&'v Value> {
    let map = value.as_object()?;
    if let Some(v) = map.get(key) {
        return Some(v);
    }
    map.iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(key))
        .map(|(_, v)| v)
}

/// Required string field, case-insensitive, must be non-empty.
pub fn require_str(value: &Value, key: &str) -> Result<String, EngineError> {
    get_ci(value, key)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| EngineError::MissingField(key.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_input_is_a_parse_failure() {
        assert!(matches!(parse_reply(""), Err(EngineError::Parse(_))));
        assert!(matches!(parse_reply("  \n "), Err(EngineError::Parse(_))));
    }

    #[test]
    fn bare_json_decodes() {
        let reply = parse_reply(r#"{"reply": "hello"}"#).unwrap();
        assert_eq!(reply, ParsedReply::Json(json!({"reply": "hello"})));
    }

    #[test]
    fn fenced_json_round_trips() {
        let payload = json!({"title": "Standoff", "goal_threshold": 100});
        let fenced = format!("```json\n{payload}\n```");
        assert_eq!(parse_reply(&fenced).unwrap(), ParsedReply::Json(payload));
    }

    #[test]
    fn bare_fence_without_language_tag() {
        let fenced = "```\n{\"a\": 1}\n```";
        assert_eq!(
            parse_reply(fenced).unwrap(),
            ParsedReply::Json(json!({"a": 1}))
        );
    }

    #[test]
    fn cleaning_is_idempotent_on_fence_free_text() {
        let text = "The counterpart shrugs and waits.";
        assert_eq!(strip_fences(text), text);
        assert_eq!(
            parse_reply(text).unwrap(),
            parse_reply(strip_fences(text)).unwrap()
        );
    }

    #[test]
    fn prose_falls_through_as_text() {
        let reply = parse_reply("I cannot produce JSON right now.").unwrap();
        assert_eq!(
            reply,
            ParsedReply::Text("I cannot produce JSON right now.".into())
        );
    }

    #[test]
    fn semantically_empty_json_is_accepted() {
        assert_eq!(parse_reply("{}").unwrap(), ParsedReply::Json(json!({})));
    }

    #[test]
    fn envelope_is_unwrapped_exactly_one_level() {
        let inner = json!({"reply": "fine"});
        let envelope = json!({
            "choices": [{"message": {"content": format!("```json\n{inner}\n```")}}]
        });
        assert_eq!(
            parse_reply(&envelope.to_string()).unwrap(),
            ParsedReply::Json(inner)
        );

        // An envelope inside an envelope stays an envelope: one unwrap only.
        let nested = json!({
            "choices": [{"message": {"content":
                json!({"choices": [{"message": {"content": "deep"}}]}).to_string()
            }}]
        });
        let result = parse_reply(&nested.to_string()).unwrap();
        let Some(value) = result.as_json() else {
            panic!("inner envelope should decode as JSON");
        };
        assert!(value.get("choices").is_some());
    }

    #[test]
    fn mid_text_fences_are_left_alone() {
        let text = "Use ```json blocks``` when you reply.";
        assert_eq!(
            parse_reply(text).unwrap(),
            ParsedReply::Text(text.to_string())
        );
    }

    #[test]
    fn case_insensitive_lookup() {
        let v = json!({"Reply": "sure", "Goal_Threshold": 10});
        assert_eq!(get_ci(&v, "reply").unwrap(), &json!("sure"));
        assert_eq!(get_ci(&v, "goal_threshold").unwrap(), &json!(10));
        assert!(get_ci(&v, "missing").is_none());

        assert_eq!(require_str(&v, "reply").unwrap(), "sure");
        assert!(matches!(
            require_str(&v, "next_question"),
            Err(EngineError::MissingField(_))
        ));
    }
}

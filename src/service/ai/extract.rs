use serde_json::{Map, Value};

/// Finds the first balanced `{...}` in model output that parses as a JSON object.
/// Braces inside string literals are ignored; prose and markdown fences around
/// the object are skipped.
pub fn extract_json_object(text: &str) -> Option<Map<String, Value>> {
    let bytes = text.as_bytes();
    let mut start = 0;
    while let Some(offset) = text[start..].find('{') {
        let open = start + offset;
        if let Some(close) = matching_brace(bytes, open) {
            if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(&text[open..=close]) {
                return Some(map);
            }
        }
        start = open + 1;
    }
    None
}

fn matching_brace(bytes: &[u8], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, &b) in bytes.iter().enumerate().skip(open) {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_object() {
        let map = extract_json_object(r#"{"a": 1}"#).unwrap();
        assert_eq!(map["a"], 1);
    }

    #[test]
    fn test_fenced_with_prose() {
        let text = "Sure! Here is the analysis:\n```json\n{\"roast\": \"nice {hat}\", \"score\": {\"x\": 2}}\n```\nEnjoy.";
        let map = extract_json_object(text).unwrap();
        assert_eq!(map["roast"], "nice {hat}");
        assert_eq!(map["score"]["x"], 2);
    }

    #[test]
    fn test_escaped_quotes_in_strings() {
        let text = r#"{"toast": "she said \"}\" loudly", "n": 3}"#;
        assert_eq!(extract_json_object(text).unwrap()["n"], 3);
    }

    #[test]
    fn test_skips_unparseable_candidate() {
        let text = "{not json} then {\"ok\": true}";
        assert_eq!(extract_json_object(text).unwrap()["ok"], true);
    }

    #[test]
    fn test_nothing_found() {
        assert!(extract_json_object("no braces here").is_none());
        assert!(extract_json_object("{\"unterminated\": 1").is_none());
    }
}

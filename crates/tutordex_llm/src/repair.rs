//! Response parsing: code-fence stripping, strict JSON parse, then a
//! best-effort repair pass on failure.

use serde_json::Value;

/// Strip a surrounding ```json ... ``` or ``` ... ``` fence, if present.
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(stripped) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let stripped = stripped.strip_prefix("json").unwrap_or(stripped);
    let stripped = stripped.trim_start_matches('\n');
    stripped.strip_suffix("```").unwrap_or(stripped).trim()
}

/// Parse `text` as JSON, first verbatim, then after a repair pass that
/// balances braces/brackets and trims trailing commas. Returns `None` if
/// both attempts fail.
pub fn parse_with_repair(text: &str) -> Option<Value> {
    let candidate = strip_code_fence(text);
    if let Ok(value) = serde_json::from_str(candidate) {
        return Some(value);
    }
    let repaired = repair_json(candidate);
    serde_json::from_str(&repaired).ok()
}

fn repair_json(input: &str) -> String {
    let trimmed = trim_trailing_commas(input);
    balance_brackets(&trimmed)
}

fn trim_trailing_commas(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    while let Some(c) = chars.next() {
        if c == ',' {
            let mut lookahead = chars.clone();
            let mut only_whitespace = true;
            let mut closer_follows = false;
            while let Some(&next) = lookahead.peek() {
                if next.is_whitespace() {
                    lookahead.next();
                    continue;
                }
                closer_follows = next == '}' || next == ']';
                only_whitespace = false;
                break;
            }
            if !only_whitespace && closer_follows {
                continue;
            }
        }
        out.push(c);
    }
    out
}

fn balance_brackets(input: &str) -> String {
    let mut stack = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for c in input.chars() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => stack.push('}'),
            '[' => stack.push(']'),
            '}' | ']' => {
                stack.pop();
            }
            _ => {}
        }
    }

    let mut out = input.to_string();
    while let Some(closer) = stack.pop() {
        out.push(closer);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_json_fenced_response() {
        let text = "```json\n{\"a\": 1}\n```";
        assert_eq!(strip_code_fence(text), "{\"a\": 1}");
    }

    #[test]
    fn parses_valid_json_directly() {
        let value = parse_with_repair(r#"{"a": 1}"#).unwrap();
        assert_eq!(value["a"], 1);
    }

    #[test]
    fn repairs_truncated_object_by_closing_braces() {
        let value = parse_with_repair(r#"{"a": 1, "b": {"c": 2"#).unwrap();
        assert_eq!(value["b"]["c"], 2);
    }

    #[test]
    fn repairs_trailing_comma_before_closing_bracket() {
        let value = parse_with_repair(r#"{"a": [1, 2, 3,]}"#).unwrap();
        assert_eq!(value["a"][2], 3);
    }

    #[test]
    fn unrecoverable_garbage_returns_none() {
        assert!(parse_with_repair("not json at all").is_none());
    }
}

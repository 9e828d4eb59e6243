//! Locate and parse a JSON object embedded in free-form model output.
//!
//! Models wrap their JSON in prose or markdown fences. The scanner walks the
//! text looking for a balanced `{ ... }` span, tracking string literals and
//! escapes so braces inside strings do not disturb the depth count. The first
//! balanced span that parses as a JSON object wins.
//!
//! Each candidate `{` rescans the rest of the text, so at most
//! [`MAX_CANDIDATES`] starts are tried before giving up as malformed.

use serde_json::Value;

/// Outcome of [`extract_json_object`]. Callers must handle every branch.
#[derive(Debug, Clone, PartialEq)]
pub enum JsonExtraction {
    /// A balanced span parsed as a JSON object.
    Found(Value),
    /// The text contains no `{`.
    NotFound,
    /// Braces were found but no balanced span parsed; carries the last error.
    Malformed(String),
}

impl JsonExtraction {
    pub fn into_value(self) -> Option<Value> {
        match self {
            JsonExtraction::Found(v) => Some(v),
            _ => None,
        }
    }
}

/// Upper bound on `{` positions tried by [`extract_json_object`].
pub const MAX_CANDIDATES: usize = 64;

pub fn extract_json_object(text: &str) -> JsonExtraction {
    let mut last_error: Option<String> = None;
    let mut search_from = 0;
    let mut tried = 0;

    while let Some(offset) = text[search_from..].find('{') {
        if tried == MAX_CANDIDATES {
            return JsonExtraction::Malformed(format!(
                "no JSON object within the first {} brace positions",
                MAX_CANDIDATES
            ));
        }
        tried += 1;
        let start = search_from + offset;
        match balanced_span_end(&text[start..]) {
            Some(len) => {
                let candidate = &text[start..start + len];
                match serde_json::from_str::<Value>(candidate) {
                    Ok(v) if v.is_object() => return JsonExtraction::Found(v),
                    Ok(_) => last_error = Some("embedded JSON is not an object".to_string()),
                    Err(e) => last_error = Some(e.to_string()),
                }
            }
            None => {
                last_error.get_or_insert_with(|| "unbalanced braces in response".to_string());
            }
        }
        search_from = start + 1;
    }

    match last_error {
        Some(e) => JsonExtraction::Malformed(e),
        None => JsonExtraction::NotFound,
    }
}

/// Byte length of the balanced object starting at `s[0] == '{'`.
fn balanced_span_end(s: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in s.char_indices() {
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
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }
    None
}

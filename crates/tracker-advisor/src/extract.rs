/// Find the first balanced object-like substring in free-form model
/// output. String-literal and escape aware, so braces inside quoted
/// values don't unbalance the scan.
pub fn first_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Extract and decode the first balanced object. None when no balanced
/// substring exists or it is not valid JSON.
pub fn parse_first_object(text: &str) -> Option<serde_json::Value> {
    let candidate = first_json_object(text)?;
    serde_json::from_str(candidate).ok()
}

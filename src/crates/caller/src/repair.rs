//! Best-effort repair of model-written JSON.
//!
//! Fixes the defects models commonly produce in action payloads: text around
//! the object, missing commas between members on separate lines, trailing
//! commas, and truncated strings or brackets. Output is not guaranteed to be
//! valid; the executor reports what still fails to decode.

/// Repair `input`. Valid JSON is returned unchanged apart from surrounding
/// whitespace, backticks and commas.
pub fn repair_json(input: &str) -> String {
    let trimmed = input.trim_matches(|c: char| c.is_whitespace() || c == '`' || c == ',');
    if serde_json::from_str::<serde_json::Value>(trimmed).is_ok() {
        return trimmed.to_string();
    }

    let sliced = match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if start < end => &trimmed[start..=end],
        (Some(start), _) => &trimmed[start..],
        _ => trimmed,
    };

    let with_commas = insert_missing_commas(sliced);
    balance(&with_commas)
}

/// Add a comma where a line ends a value and the next member starts on the
/// following line.
fn insert_missing_commas(text: &str) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let mut out = String::with_capacity(text.len() + 8);

    for (i, line) in lines.iter().enumerate() {
        out.push_str(line);
        let next = lines[i + 1..].iter().map(|l| l.trim_start()).find(|l| !l.is_empty());
        if let Some(next) = next {
            if next.starts_with('"') && ends_value(line.trim_end()) {
                out.push(',');
            }
        }
        if i + 1 < lines.len() {
            out.push('\n');
        }
    }
    out
}

fn ends_value(line: &str) -> bool {
    if line.ends_with(',') || line.ends_with('{') || line.ends_with('[') || line.ends_with(':') {
        return false;
    }
    line.ends_with('"')
        || line.ends_with('}')
        || line.ends_with(']')
        || line.ends_with("true")
        || line.ends_with("false")
        || line.ends_with("null")
        || line.chars().last().is_some_and(|c| c.is_ascii_digit())
}

/// Close an unterminated string and any open brackets, dropping commas
/// that directly precede a closer. String contents are copied verbatim.
fn balance(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 4);
    let mut stack = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for c in text.chars() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            out.push(c);
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => stack.push('}'),
            '[' => stack.push(']'),
            '}' | ']' => {
                drop_trailing_comma(&mut out);
                if stack.last() == Some(&c) {
                    stack.pop();
                }
            }
            _ => {}
        }
        out.push(c);
    }

    if in_string {
        out.push('"');
    }
    if stack.is_empty() {
        return out;
    }

    let content_end = out.trim_end_matches(|c: char| c.is_whitespace() || c == ',').len();
    out.truncate(content_end);
    if out.ends_with(':') {
        out.push_str(" null");
    }
    while let Some(close) = stack.pop() {
        out.push(close);
    }
    out
}

/// Remove a comma that ends `out`, keeping any whitespace after it.
fn drop_trailing_comma(out: &mut String) {
    let content_end = out.trim_end().len();
    if out[..content_end].ends_with(',') {
        let whitespace = out[content_end..].to_string();
        out.truncate(content_end - 1);
        out.push_str(&whitespace);
    }
}

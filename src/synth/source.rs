//! Sanitizing completion text and reassembling it into a full definition.

/// Strips a surrounding markdown code fence and the body's common indentation.
///
/// A leading fence may carry a language tag (```` ```python ````). Text with no
/// fences passes through apart from trimming.
pub fn strip_code_fence(text: &str) -> String {
    // Leading whitespace of the first body line is indentation, keep it for dedent.
    let mut body = text.trim_end();

    if let Some(rest) = body.trim_start().strip_prefix("```") {
        let tag_len = rest
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '+'))
            .unwrap_or(rest.len());
        body = rest[tag_len..].trim_start_matches([' ', '\t', '\r']);
        body = body.strip_prefix('\n').unwrap_or(body);
    }
    if let Some(rest) = body.strip_suffix("```") {
        body = rest.trim_end_matches([' ', '\t', '\r']);
        body = body.strip_suffix('\n').unwrap_or(body);
    }

    let dedented = dedent(skip_blank_lines(body));
    dedented.trim().to_string()
}

/// Drops whole blank lines before the first line with content.
fn skip_blank_lines(text: &str) -> &str {
    let mut rest = text;
    while let Some((line, tail)) = rest.split_once('\n') {
        if !line.trim().is_empty() {
            break;
        }
        rest = tail;
    }
    rest
}

/// Removes the leading whitespace shared by every non-blank line.
pub fn dedent(text: &str) -> String {
    let margin = text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.len() - line.trim_start().len())
        .min()
        .unwrap_or(0);
    text.lines()
        .map(|line| {
            if line.trim().is_empty() {
                ""
            } else {
                line.get(margin..).unwrap_or(line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Builds `def name(sig):`, the docstring line and the body indented four spaces.
pub fn reassemble(name: &str, signature: &str, doc: Option<&str>, body: &str) -> String {
    let mut source = format!("def {name}{signature}:\n");
    if let Some(doc) = doc.filter(|doc| !doc.is_empty()) {
        source.push_str(&format!("    \"\"\"{}\"\"\"\n", escape_doc(doc)));
    }
    for line in body.split('\n') {
        if line.trim().is_empty() {
            source.push('\n');
        } else {
            source.push_str("    ");
            source.push_str(line.trim_end_matches('\r'));
            source.push('\n');
        }
    }
    source
}

fn escape_doc(doc: &str) -> String {
    doc.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fenced_and_unfenced_bodies_sanitize_identically() {
        let plain = "return a + b";
        assert_eq!(strip_code_fence(plain), plain);
        assert_eq!(strip_code_fence("```python\nreturn a + b\n```"), plain);
        assert_eq!(strip_code_fence("```\nreturn a + b\n```\n"), plain);
        assert_eq!(strip_code_fence("  ```py\n    return a + b\n```  "), plain);
    }

    #[test]
    fn indented_bodies_are_dedented() {
        let text = "    total = 0\n    for x in xs:\n        total += x\n\n    return total";
        assert_eq!(
            strip_code_fence(text),
            "total = 0\nfor x in xs:\n    total += x\n\nreturn total"
        );
    }

    #[test]
    fn leading_blank_lines_do_not_hide_the_margin() {
        let text = "\n\n    total = 0\n    return total\n";
        assert_eq!(strip_code_fence(text), "total = 0\nreturn total");
        let fenced = "```python\n    if x:\n        return 1\n    return 2\n```";
        assert_eq!(strip_code_fence(fenced), "if x:\n    return 1\nreturn 2");
    }

    #[test]
    fn reassembly_indents_and_keeps_blank_lines() {
        let source = reassemble(
            "add",
            "(a: int, b: int) -> int",
            Some("Add \"two\"\nnumbers."),
            "c = a + b\n\nreturn c",
        );
        assert_eq!(
            source,
            "def add(a: int, b: int) -> int:\n    \"\"\"Add \\\"two\\\"\\nnumbers.\"\"\"\n    c = a + b\n\n    return c\n"
        );
    }
}

const RESERVED: &[char] = &[
    '+', '-', '=', '>', '<', '!', '(', ')', '{', '}', '[', ']', '^', '"', '~', '*', '?', ':',
    '\\', '/',
];

/// Escapes reserved characters so free text can be embedded in a
/// query-string search. `&` and `|` are only escaped when doubled.
pub fn escape_query_string(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(current) = chars.next() {
        let needs_escape = if RESERVED.contains(&current) {
            true
        } else if current == '&' || current == '|' {
            chars.peek() == Some(&current)
        } else {
            false
        };

        if needs_escape {
            escaped.push('\\');
        }
        escaped.push(current);
    }

    escaped
}

//! Fixed-length names for clips, controllers and hierarchy nodes.

/// Storage bound for names, including a terminator slot kept for C-style
/// fixed buffers. Stored names hold at most `NAME_LEN_MAX - 1` bytes.
pub const NAME_LEN_MAX: usize = 32;

/// Truncate `name` to the name bound on a char boundary, falling back to
/// `default` when it is empty.
pub(crate) fn bounded_name(name: &str, default: &str) -> String {
    let source = if name.is_empty() { default } else { name };
    let limit = NAME_LEN_MAX - 1;
    if source.len() <= limit {
        return source.to_string();
    }
    let mut end = limit;
    while !source.is_char_boundary(end) {
        end -= 1;
    }
    source[..end].to_string()
}

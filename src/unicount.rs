/// Everything in this crate is addressed in characters (unicode scalar values), but rust strings
/// are addressed in bytes. These are the little helpers to go back and forth.
///
/// str_indices does the heavy lifting. It's the same code ropey and jumprope use internally.

pub fn chars_to_bytes(s: &str, char_pos: usize) -> usize {
    str_indices::chars::to_byte_idx(s, char_pos)
}

pub fn bytes_to_chars(s: &str, byte_pos: usize) -> usize {
    str_indices::chars::from_byte_idx(s, byte_pos)
}

pub fn count_chars(s: &str) -> usize {
    str_indices::chars::count(s)
}

pub fn split_at_char(s: &str, char_pos: usize) -> (&str, &str) {
    s.split_at(chars_to_bytes(s, char_pos))
}

/// Slice a string by character offsets. Offsets past the end are clamped, the same way JS
/// `String.slice` behaves.
pub fn slice_chars(s: &str, start: usize, end: usize) -> &str {
    let start_byte = chars_to_bytes(s, start);
    let end_byte = chars_to_bytes(s, end.max(start));
    &s[start_byte..end_byte]
}

/// Everything from char offset `start` onwards.
pub fn slice_from(s: &str, start: usize) -> &str {
    &s[chars_to_bytes(s, start)..]
}

/// The first `len` chars.
pub fn slice_to(s: &str, len: usize) -> &str {
    &s[..chars_to_bytes(s, len)]
}

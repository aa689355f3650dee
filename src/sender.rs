/// Pull the bare address out of a `From` header.
///
/// `Jane Doe <jane@example.com>` yields `jane@example.com`. A header without an
/// angle-bracketed part is returned unchanged, so bare addresses pass through and
/// malformed headers fall back to the raw text.
pub fn extract_address(from_header: &str) -> String {
    for (open, _) in from_header.match_indices('<') {
        let after = &from_header[open + 1..];
        let mut chars = after.char_indices();
        // at least one character between the brackets
        match chars.next() {
            None | Some((_, '\n')) => continue,
            Some(_) => {}
        }
        for (idx, c) in chars {
            match c {
                '\n' => break,
                '>' => return after[..idx].to_string(),
                _ => {}
            }
        }
    }
    from_header.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name_and_address() {
        assert_eq!(extract_address("Jane <a@x.com>"), "a@x.com");
        assert_eq!(extract_address("\"Doe, Jane\" <jane@example.com>"), "jane@example.com");
    }

    #[test]
    fn test_bare_address_unchanged() {
        assert_eq!(extract_address("b@x.com"), "b@x.com");
        assert_eq!(extract_address(""), "");
    }

    #[test]
    fn test_malformed_falls_back_to_raw() {
        assert_eq!(extract_address("Jane <a@x.com"), "Jane <a@x.com");
        assert_eq!(extract_address("Jane <>"), "Jane <>");
    }

    #[test]
    fn test_first_bracketed_part_wins() {
        assert_eq!(extract_address("Jane <a@x.com>, Bob <b@x.com>"), "a@x.com");
    }
}

use std::borrow::Cow;
use std::str;

use nom::{self, IResult, Needed};


/// Reads a fixed-width, NUL-padded name.  Everything from the first NUL onwards is ignored, which
/// matters for lumps whose padding was never zeroed.
///
/// Any other byte is kept.  Names are almost always plain ASCII, and borrowed as-is; anything that
/// isn't valid UTF-8 is read as Latin-1 instead.
pub fn fixed_length_ascii(input: &[u8], len: usize) -> IResult<&[u8], Cow<str>> {
    if input.len() < len {
        return Err(nom::Err::Incomplete(Needed::Size(len)));
    }

    let field = &input[..len];
    let end = field.iter().position(|&b| b == 0).unwrap_or(len);
    let name = match str::from_utf8(&field[..end]) {
        Ok(name) => Cow::Borrowed(name),
        Err(_) => Cow::Owned(field[..end].iter().map(|&b| b as char).collect()),
    };
    Ok((&input[len..], name))
}


#[cfg(test)]
mod tests {
    use nom;

    use super::fixed_length_ascii;

    #[test]
    fn stops_at_first_nul() {
        let (rest, name) = fixed_length_ascii(b"STEP1\0\xff\xffTAIL", 8).unwrap();
        assert_eq!(name, "STEP1");
        assert_eq!(rest, b"TAIL");
    }

    #[test]
    fn full_width_name_has_no_terminator() {
        let (rest, name) = fixed_length_ascii(b"SKY1AAAA", 8).unwrap();
        assert_eq!(name, "SKY1AAAA");
        assert!(rest.is_empty());
    }

    #[test]
    fn high_bytes_are_kept_as_latin1() {
        let (rest, name) = fixed_length_ascii(b"W\xe9LL\0\0\0\0", 8).unwrap();
        assert_eq!(name, "W\u{e9}LL");
        assert!(rest.is_empty());
        let (_, name) = fixed_length_ascii(b"\x01\x7fAB\0\0\0\0", 8).unwrap();
        assert_eq!(name, "\u{1}\u{7f}AB");
    }

    #[test]
    fn short_input_is_incomplete() {
        match fixed_length_ascii(b"SKY", 8) {
            Err(nom::Err::Incomplete(_)) => {}
            other => panic!("expected Incomplete, got {:?}", other),
        }
    }
}

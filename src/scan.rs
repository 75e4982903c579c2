//! Byte scanning primitives.
//!
//! Line-terminator search dominates parse time on real traffic, so
//! [`find_cr`] goes one word at a time with the SWAR zero-byte trick
//! before falling back to a scalar tail.

/// Pointer size.
const BLOCK: usize = size_of::<usize>();
/// Block of most significant bit.
const MSB: usize = usize::from_ne_bytes([0b1000_0000; BLOCK]);
/// Block of least significant bit.
const LSB: usize = usize::from_ne_bytes([0b0000_0001; BLOCK]);
/// Block of "\r".
const CR: usize = usize::from_ne_bytes([b'\r'; BLOCK]);

/// Returns the position of the first `\r` in `haystack`.
pub(crate) fn find_cr(haystack: &[u8]) -> Option<usize> {
    let mut rest = haystack;

    while let Some((chunk, tail)) = rest.split_first_chunk::<BLOCK>() {
        let block = usize::from_ne_bytes(*chunk) ^ CR;
        if block.wrapping_sub(LSB) & !block & MSB != 0 {
            break;
        }
        rest = tail;
    }

    let scanned = haystack.len() - rest.len();
    rest.iter().position(|&b| b == b'\r').map(|nth| scanned + nth)
}

/// Field-name byte class: `-`, `0`-`9`, `A`-`Z`, `a`-`z`.
///
/// Non-short-circuiting range tests; adversarial input should not steer
/// the branch predictor.
pub(crate) fn is_field_name_byte(b: u8) -> bool {
    (b == b'-')
        | ((b > b'/') & (b < b':'))
        | ((b > b'@') & (b < b'['))
        | ((b > b'`') & (b < b'{'))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_find_cr() {
        assert_eq!(find_cr(b""), None);
        assert_eq!(find_cr(b"no terminator here"), None);
        assert_eq!(find_cr(b"\r"), Some(0));
        assert_eq!(find_cr(b"abc\rdef"), Some(3));
        assert_eq!(find_cr(b"abc\r\ndef\r\n"), Some(3));

        // match past the first word
        let long = b"a long header value without any terminator until\rhere";
        assert_eq!(find_cr(long), long.iter().position(|&b| b == b'\r'));
        assert_eq!(find_cr(long), Some(48));

        // match in the scalar tail
        let mut buf = vec![b'x'; BLOCK * 2 + 3];
        buf.push(b'\r');
        assert_eq!(find_cr(&buf), Some(BLOCK * 2 + 3));

        // every offset within one block
        for nth in 0..BLOCK {
            let mut buf = vec![b'x'; BLOCK];
            buf[nth] = b'\r';
            assert_eq!(find_cr(&buf), Some(nth));
        }
    }

    #[test]
    fn test_is_field_name_byte() {
        for b in 0..=u8::MAX {
            let expected = b == b'-' || b.is_ascii_alphanumeric();
            assert_eq!(is_field_name_byte(b), expected, "byte {b:#04x}");
        }
    }
}

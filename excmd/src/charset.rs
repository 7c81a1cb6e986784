//
// Copyright (c) 2024 Jeff Garzik
//
// This file is part of the posixutils-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//

//! Byte-level scanning helpers shared by the command parser, the
//! address resolver and the `:set` language.

pub fn is_white(b: u8) -> bool {
    b == b' ' || b == b'\t'
}

/// Offset of the first non-blank byte at or after `i`.
pub fn skipwhite_at(s: &str, mut i: usize) -> usize {
    let b = s.as_bytes();
    while i < b.len() && is_white(b[i]) {
        i += 1;
    }
    i
}

pub fn skipwhite(s: &str) -> &str {
    &s[skipwhite_at(s, 0)..]
}

pub fn skipdigits_at(s: &str, mut i: usize) -> usize {
    let b = s.as_bytes();
    while i < b.len() && b[i].is_ascii_digit() {
        i += 1;
    }
    i
}

/// Offset of the first blank at or after `i`, honoring backslash escapes.
pub fn skiptowhite_esc(s: &str, mut i: usize) -> usize {
    let b = s.as_bytes();
    while i < b.len() && !is_white(b[i]) {
        if b[i] == b'\\' && i + 1 < b.len() {
            i += 1;
        }
        i += 1;
    }
    i.min(b.len())
}

/// Parse a run of decimal digits starting at `i`. Returns the value and
/// the end offset, or `None` on overflow.
pub fn getdigits(s: &str, i: usize) -> Option<(i64, usize)> {
    let end = skipdigits_at(s, i);
    if end == i {
        return None;
    }
    s[i..end].parse::<i64>().ok().map(|n| (n, end))
}

/// Word characters for `<cword>` and `\<`/`\>`: the default 'iskeyword'.
pub fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || (c as u32) >= 0xc0
}

/// Characters valid in a file name for `<cfile>`: the default 'isfname'.
pub fn is_fname_char(c: char) -> bool {
    c.is_alphanumeric() || "/.-_+,#$%~=".contains(c) || (c as u32) >= 0xc0
}

/// Whether `b` terminates an Ex command: end of text, a bar, a comment or
/// a newline.
pub fn ends_excmd(b: Option<u8>) -> bool {
    matches!(b, None | Some(b'|') | Some(b'"') | Some(b'\n'))
}

/// Numeric prefixes accepted by [`str2nr`].
#[derive(Debug, Clone, Copy)]
pub struct NumBases {
    pub hex: bool,
    pub oct: bool,
    pub bin: bool,
}

impl NumBases {
    pub const ALL: NumBases = NumBases {
        hex: true,
        oct: true,
        bin: true,
    };
    pub const DEC: NumBases = NumBases {
        hex: false,
        oct: false,
        bin: false,
    };
}

/// Parse an optionally signed number with `0x`, `0b`, `0o` and leading-zero
/// octal forms. Returns the value and the number of bytes consumed.
pub fn str2nr(s: &str, bases: NumBases) -> Option<(i64, usize)> {
    let b = s.as_bytes();
    let mut i = 0;
    let neg = b.first() == Some(&b'-');
    if neg {
        i += 1;
    }
    if i >= b.len() || !b[i].is_ascii_digit() {
        return None;
    }

    let mut radix = 10;
    let mut start = i;
    if b[i] == b'0' && i + 1 < b.len() {
        let pre = b[i + 1];
        let next_ok = |f: fn(&u8) -> bool| b.get(i + 2).map(f).unwrap_or(false);
        if bases.hex && (pre == b'x' || pre == b'X') && next_ok(u8::is_ascii_hexdigit) {
            radix = 16;
            start = i + 2;
        } else if bases.bin && (pre == b'b' || pre == b'B') && next_ok(|c| *c == b'0' || *c == b'1')
        {
            radix = 2;
            start = i + 2;
        } else if bases.oct && (pre == b'o' || pre == b'O') && next_ok(|c| (b'0'..=b'7').contains(c))
        {
            radix = 8;
            start = i + 2;
        } else if bases.oct && pre.is_ascii_digit() {
            // "0123" is octal only when every digit is an octal digit
            let run = skipdigits_at(s, i);
            if b[i..run].iter().all(|c| (b'0'..=b'7').contains(c)) {
                radix = 8;
                start = i + 1;
            }
        }
    }

    let mut end = start;
    while end < b.len() && (b[end] as char).is_digit(radix) {
        end += 1;
    }
    let digits = &s[start..end];
    let n = i64::from_str_radix(digits, radix).unwrap_or(i64::MAX);
    Some((if neg { n.saturating_neg() } else { n }, end))
}

/// Render `s` with non-printable bytes shown the way messages show them.
pub fn transstr(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\u{a0}' => out.push_str("<a0>"),
            c if (c as u32) < 0x20 => {
                out.push('^');
                out.push(((c as u8) + b'@') as char);
            }
            '\u{7f}' => out.push_str("^?"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod test {
    use super::*;
    use test_log::test;

    #[test]
    fn number_prefixes() {
        assert_eq!(str2nr("0x1F", NumBases::ALL), Some((31, 4)));
        assert_eq!(str2nr("017", NumBases::ALL), Some((15, 3)));
        assert_eq!(str2nr("019", NumBases::ALL), Some((19, 3)));
        assert_eq!(str2nr("0b101z", NumBases::ALL), Some((5, 5)));
        assert_eq!(str2nr("-42 rest", NumBases::DEC), Some((-42, 3)));
        assert_eq!(str2nr("x", NumBases::ALL), None);
    }

    #[test]
    fn escaped_white_is_not_a_separator() {
        let s = r"a\ b c";
        assert_eq!(skiptowhite_esc(s, 0), 4);
        assert_eq!(skipwhite_at(s, 4), 5);
    }

    #[test]
    fn digits_overflow() {
        assert_eq!(getdigits("12x", 0), Some((12, 2)));
        assert_eq!(getdigits("99999999999999999999", 0), None);
    }

    #[test]
    fn nbsp_rendering() {
        assert_eq!(transstr("a\u{a0}b"), "a<a0>b");
        assert_eq!(transstr("\x01"), "^A");
    }
}

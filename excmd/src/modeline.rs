//
// Copyright (c) 2024 Jeff Garzik
//
// This file is part of the posixutils-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//

//! Modelines: option settings found in the first and last lines of a
//! file, in one of two forms:
//!
//! ```text
//! [text]{white}{vi:|vim:|ex:}[white]{options}
//! [text]{white}{vi:|vim:|ex:}[white]se[t] {options}:[text]
//! ```

use crate::line_source::SourceKind;
use crate::options::set::do_set;
use crate::options::{Opt, OptLevel};
use crate::state::{EditorState, SourceFrame};

/// Version compared against `vim{N}:` and friends.
const VIM_VERSION: u32 = 901;

/// Find the start of a modeline marker in `line`. Returns the offset just
/// past its colon.
fn find_marker(line: &str) -> Option<usize> {
    let b = line.as_bytes();
    let mut i = 0;
    while i < b.len() {
        let at_start = i == 0;
        let after_white = i > 0 && matches!(b[i - 1], b' ' | b'\t');
        let rest = &line[i..];
        if (at_start || after_white) && (rest.starts_with("vi:") || rest.starts_with("vim")) {
            if let Some(end) = vim_marker_end(rest) {
                return Some(i + end);
            }
        }
        if after_white && rest.starts_with("ex:") {
            return Some(i + 3);
        }
        i += 1;
    }
    None
}

/// `vi:`, `vim:`, `Vim:`, `vimN:`, `vim<N:`, `vim=N:` or `vim>N:`. Returns
/// the length through the colon when the marker applies to this version.
fn vim_marker_end(s: &str) -> Option<usize> {
    if s.starts_with("vi:") {
        return Some(3);
    }
    let rest = s.strip_prefix("vim").or_else(|| s.strip_prefix("Vim"))?;
    if rest.starts_with(':') {
        return Some(4);
    }
    let (op, digits_at) = match rest.as_bytes().first() {
        Some(b'<') => ('<', 1),
        Some(b'=') => ('=', 1),
        Some(b'>') => ('>', 1),
        _ => ('>', 0),
    };
    let digits = rest[digits_at..].bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 || rest.as_bytes().get(digits_at + digits) != Some(&b':') {
        return None;
    }
    let n: u32 = rest[digits_at..digits_at + digits].parse().ok()?;
    let applies = match (op, digits_at) {
        ('<', _) => VIM_VERSION < n,
        ('=', _) => VIM_VERSION == n,
        ('>', 1) => VIM_VERSION > n,
        _ => VIM_VERSION >= n,
    };
    applies.then_some(3 + digits_at + digits + 1)
}

/// The `:set` arguments of the modeline text after the marker.
fn modeline_args(text: &str) -> String {
    let text = text.trim_start();
    let set_form = ["set ", "se ", "set\t", "se\t"]
        .iter()
        .find_map(|p| text.strip_prefix(p));
    let mut out = String::new();
    let mut chars = text.chars().peekable();
    if let Some(body) = set_form {
        // ends at the first unescaped colon
        chars = body.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '\\' if chars.peek() == Some(&':') => {
                    out.push(':');
                    chars.next();
                }
                ':' => break,
                c => out.push(c),
            }
        }
        return out;
    }
    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.peek() == Some(&':') => {
                out.push_str("\\:");
                chars.next();
            }
            ':' => out.push(' '),
            c => out.push(c),
        }
    }
    out
}

/// Apply one modeline, if `line` has one.
pub fn chkmodeline(st: &mut EditorState, line: &str, lnum: i64) -> bool {
    let Some(start) = find_marker(line) else {
        return false;
    };
    let args = modeline_args(&line[start..]);
    if args.trim().is_empty() {
        return false;
    }
    log::debug!("modeline in line {lnum}: {args}");

    st.sourcing.push(SourceFrame {
        kind: SourceKind::Other,
        name: "modelines".to_string(),
        lnum,
        sid: st.current_sid(),
        level: st.ex_nesting_level,
        finished: false,
    });
    st.secure += 1;
    if let Err(err) = do_set(st, &args, OptLevel::Local, true) {
        st.emsg(&err.message());
    }
    st.secure -= 1;
    st.sourcing.pop();
    true
}

/// Look for modelines in the first and last 'modelines' lines of the
/// current buffer.
pub fn do_modelines(st: &mut EditorState) {
    if !st.p_flag(Opt::Modeline) {
        return;
    }
    let n = st.p_num(Opt::Modelines);
    if n <= 0 {
        return;
    }
    let count = st.line_count();
    let mut lnums: Vec<i64> = (1..=count.min(n)).collect();
    let tail_start = (count - n + 1).max(n + 1);
    lnums.extend(tail_start..=count);
    for lnum in lnums {
        let line = st.curbuf().get(lnum).to_string();
        chkmodeline(st, &line, lnum);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::host::MemHost;
    use test_log::test;

    fn state() -> (EditorState, MemHost) {
        let host = MemHost::new();
        (EditorState::new(Box::new(host.clone()), false), host)
    }

    #[test]
    fn markers() {
        assert_eq!(find_marker("vim: ts=4"), Some(4));
        assert_eq!(find_marker("# vi: ts=4"), Some(5));
        assert_eq!(find_marker("# ex: ts=4"), Some(5));
        assert_eq!(find_marker("ex: ts=4"), None);
        assert_eq!(find_marker("xvim: ts=4"), None);
        assert!(find_marker("/* vim600: ts=4 */").is_some());
        assert!(find_marker("/* vim<600: ts=4 */").is_none());
    }

    #[test]
    fn argument_forms() {
        assert_eq!(modeline_args(" ts=4:sw=4"), "ts=4 sw=4");
        assert_eq!(modeline_args(" set ts=4 sw=4: */"), "ts=4 sw=4");
        assert_eq!(modeline_args(" se fdm=a\\:b: */"), "fdm=a:b");
    }

    #[test]
    fn buffer_modelines_set_local_options() {
        let (mut st, _) = state();
        st.curbuf_mut()
            .load_text("first\n# vim: set tabstop=3 :\nmiddle\n/* vi:set sw=2: */\n");
        do_modelines(&mut st);
        assert_eq!(st.p_num(Opt::Tabstop), 3);
        assert_eq!(st.p_num(Opt::Shiftwidth), 2);
        assert_eq!(st.secure, 0);
    }

    #[test]
    fn secure_options_are_refused() {
        let (mut st, host) = state();
        st.curbuf_mut().load_text("# vim: set shell=/bin/evil :\n");
        do_modelines(&mut st);
        assert!(host.errors().iter().any(|e| e.contains("E520")), "{:?}", host.errors());
        assert_ne!(st.p_str(Opt::Shell), "/bin/evil");
    }

    #[test]
    fn disabled_by_option() {
        let (mut st, _) = state();
        st.curbuf_mut().load_text("# vim: set tabstop=3 :\n");
        crate::runner::do_cmdline_cmd(&mut st, "setlocal nomodeline").unwrap();
        do_modelines(&mut st);
        assert_eq!(st.p_num(Opt::Tabstop), 8);
    }
}

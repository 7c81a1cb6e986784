//
// Copyright (c) 2024 Jeff Garzik
//
// This file is part of the posixutils-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//

//! Vim patterns on top of the `regex` crate, the last search and
//! substitute patterns, and line searches used by addresses.

use regex::{Captures, Regex, RegexBuilder};

use crate::error::{e, invalid, runtime, Error, Result};
use crate::options::Opt;
use crate::state::EditorState;

/// Which remembered pattern an empty pattern stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatKind {
    Search,
    Subst,
    /// Whichever was used last.
    LastUsed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dir {
    Forward,
    Backward,
}

#[derive(Debug, Default)]
pub struct SearchState {
    pub last_search: Option<String>,
    pub last_subst: Option<String>,
    /// The search pattern was used after the substitute pattern.
    last_was_search: bool,
    pub last_dir_backward: bool,
    /// Replacement string of the last `:s`, used for `~`.
    pub last_replacement: Option<String>,
    /// Submatches of the match being replaced, for `submatch()`.
    pub submatches: Vec<String>,
    /// Flags of the last `:s`, reused by `:&&`.
    pub last_sub_flags: String,
    /// Substitutions and changed lines counted for the report.
    pub sub_nsubs: i64,
    pub sub_nlines: i64,
}

impl SearchState {
    pub fn pattern(&self, kind: PatKind) -> Option<&str> {
        let kind = match kind {
            PatKind::LastUsed if self.last_was_search => PatKind::Search,
            PatKind::LastUsed => PatKind::Subst,
            k => k,
        };
        match kind {
            PatKind::Search => self.last_search.as_deref(),
            _ => self.last_subst.as_deref().or(self.last_search.as_deref()),
        }
    }
}

/// Length of the pattern in `s` up to the unescaped `delim`, skipping
/// over `[]` collections. Returns `s.len()` when there is no delimiter.
pub fn skip_regexp(s: &str, delim: char) -> usize {
    let mut chars = s.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if c == delim {
            return i;
        }
        match c {
            '[' => {
                if let Some(end) = skip_anyof(&s[i + 1..]) {
                    // resume after the closing bracket
                    let stop = i + 1 + end;
                    while chars.peek().is_some_and(|&(j, _)| j <= stop) {
                        chars.next();
                    }
                }
            }
            '\\' => {
                chars.next();
            }
            _ => {}
        }
    }
    s.len()
}

/// Offset of the `]` closing a collection whose body starts `s`.
fn skip_anyof(s: &str) -> Option<usize> {
    let bytes = s.as_bytes();
    let mut i = 0;
    if bytes.first() == Some(&b'^') {
        i += 1;
    }
    if bytes.get(i) == Some(&b']') || bytes.get(i) == Some(&b'-') {
        i += 1;
    }
    while i < bytes.len() {
        match bytes[i] {
            b']' => return Some(i),
            b'[' if bytes.get(i + 1) == Some(&b':') => {
                let close = s[i + 2..].find(":]")?;
                i += close + 4;
                continue;
            }
            b'\\' => i += 2,
            _ => i += 1,
        }
    }
    None
}

/// Character class for a backslash letter like `\s` or `\d`.
fn class_escape(c: char) -> Option<&'static str> {
    Some(match c {
        's' => "[ \\t]",
        'S' => "[^ \\t]",
        'd' => "[0-9]",
        'D' => "[^0-9]",
        'w' => "[0-9A-Za-z_]",
        'W' => "[^0-9A-Za-z_]",
        'a' => "[A-Za-z]",
        'A' => "[^A-Za-z]",
        'l' => "[a-z]",
        'L' => "[^a-z]",
        'u' => "[A-Z]",
        'U' => "[^A-Z]",
        'x' => "[0-9A-Fa-f]",
        'X' => "[^0-9A-Fa-f]",
        'o' => "[0-7]",
        'O' => "[^0-7]",
        'h' => "[A-Za-z_]",
        'H' => "[^A-Za-z_]",
        'k' | 'i' | 'f' | 'p' => "[^ \\t]",
        _ => return None,
    })
}

#[derive(Clone, Copy, PartialEq)]
enum Magic {
    VeryNo,
    No,
    Yes,
    Very,
}

/// Translate a Vim pattern into `regex` syntax and compile it. `magic`
/// is the 'magic' option; `ic` is 'ignorecase', overridden by `\c` and
/// `\C` in the pattern.
pub fn vim_regex(pat: &str, magic: bool, ic: bool) -> Result<Regex> {
    let mut out = String::with_capacity(pat.len() + 8);
    let mut mode = if magic { Magic::Yes } else { Magic::No };
    let mut ic = ic;
    let chars: Vec<char> = pat.chars().collect();
    let mut i = 0;
    let mut at_start = true;

    while i < chars.len() {
        let c = chars[i];
        let was_start = at_start;
        at_start = false;

        if c == '\\' {
            let Some(&n) = chars.get(i + 1) else {
                return Err(invalid(format!("{}: {}", e::INVPAT, pat)));
            };
            i += 2;
            match n {
                'v' => mode = Magic::Very,
                'm' => mode = Magic::Yes,
                'M' => mode = Magic::No,
                'V' => mode = Magic::VeryNo,
                'c' => ic = true,
                'C' => ic = false,
                'n' => out.push_str("\\n"),
                't' => out.push_str("\\t"),
                'e' => out.push_str("\\x1b"),
                'r' => out.push_str("\\r"),
                '<' | '>' if mode != Magic::Very => out.push_str("\\b"),
                '(' if mode != Magic::Very => {
                    out.push('(');
                    at_start = true;
                }
                ')' if mode != Magic::Very => out.push(')'),
                '|' if mode != Magic::Very => {
                    out.push('|');
                    at_start = true;
                }
                '%' if chars.get(i) == Some(&'(') => {
                    out.push_str("(?:");
                    i += 1;
                    at_start = true;
                }
                '+' | '=' | '?' if mode != Magic::Very => {
                    out.push(if n == '+' { '+' } else { '?' })
                }
                '{' if mode != Magic::Very => i = brace(&chars, i, &mut out)?,
                '.' | '*' | '[' | '~' if matches!(mode, Magic::No | Magic::VeryNo) => {
                    if n == '[' {
                        i = collection(&chars, i, &mut out)?;
                    } else if n == '~' {
                        out.push('~');
                    } else {
                        out.push(n);
                    }
                }
                'z' => {
                    return Err(invalid(format!("{}: \\z", e::INVPAT)));
                }
                '1'..='9' => return Err(invalid(format!("{}: \\{n}", e::INVPAT))),
                _ => {
                    if let Some(class) = class_escape(n) {
                        out.push_str(class);
                    } else {
                        out.push_str(&regex::escape(&n.to_string()));
                    }
                }
            }
            continue;
        }

        i += 1;
        match (c, mode) {
            ('^', _) if was_start => out.push('^'),
            ('$', _) if ends_branch(&chars, i, mode) => out.push('$'),
            ('.', Magic::Yes | Magic::Very) => out.push('.'),
            ('*', Magic::Yes | Magic::Very) => out.push('*'),
            ('[', Magic::Yes | Magic::Very) => i = collection(&chars, i, &mut out)?,
            ('(', Magic::Very) => {
                out.push('(');
                at_start = true;
            }
            (')', Magic::Very) => out.push(')'),
            ('|', Magic::Very) => {
                out.push('|');
                at_start = true;
            }
            ('+' | '?' | '=', Magic::Very) => out.push(if c == '+' { '+' } else { '?' }),
            ('{', Magic::Very) => i = brace(&chars, i, &mut out)?,
            ('<' | '>', Magic::Very) => out.push_str("\\b"),
            _ => out.push_str(&regex::escape(&c.to_string())),
        }
    }

    log::trace!("pattern {pat:?} as {out:?}");
    let re = RegexBuilder::new(&out).case_insensitive(ic).build()?;
    Ok(re)
}

/// `^` and `$` are only anchors where a branch starts or ends.
fn ends_branch(chars: &[char], j: usize, mode: Magic) -> bool {
    j >= chars.len()
        || (chars[j] == '\\' && matches!(chars.get(j + 1), Some('|') | Some(')') | Some('n')))
        || (mode == Magic::Very && matches!(chars[j], '|' | ')'))
}

/// `\{n,m}` and friends; `i` is just past the brace.
fn brace(chars: &[char], mut i: usize, out: &mut String) -> Result<usize> {
    let lazy = chars.get(i) == Some(&'-');
    if lazy {
        i += 1;
    }
    let mut body = String::new();
    while i < chars.len() && chars[i] != '}' {
        if chars[i] == '\\' {
            i += 1;
            continue;
        }
        body.push(chars[i]);
        i += 1;
    }
    if i >= chars.len() {
        return Err(invalid("E554: Syntax error in \\{...}"));
    }
    i += 1;
    let (min, max) = match body.split_once(',') {
        Some((a, b)) => (a.trim().to_string(), b.trim().to_string()),
        None if body.is_empty() => (String::new(), String::new()),
        None => (body.clone(), body.clone()),
    };
    if body.is_empty() || (min.is_empty() && max.is_empty()) {
        out.push('*');
    } else {
        let min = if min.is_empty() { "0".to_string() } else { min };
        out.push_str(&format!("{{{min},{max}}}"));
    }
    if lazy {
        out.push('?');
    }
    Ok(i)
}

/// Copy a `[...]` collection; `i` is just past the `[`. An unterminated
/// bracket is a literal.
fn collection(chars: &[char], i: usize, out: &mut String) -> Result<usize> {
    let rest: String = chars[i..].iter().collect();
    let Some(end) = skip_anyof(&rest) else {
        out.push_str("\\[");
        return Ok(i);
    };
    let body: Vec<char> = rest[..end].chars().collect();
    out.push('[');
    let mut j = 0;
    if body.first() == Some(&'^') {
        out.push('^');
        j = 1;
    }
    while j < body.len() {
        let c = body[j];
        match c {
            '\\' if j + 1 < body.len() => {
                let n = body[j + 1];
                j += 2;
                match n {
                    'n' => out.push_str("\\n"),
                    't' => out.push_str("\\t"),
                    'e' => out.push_str("\\x1b"),
                    'r' => out.push_str("\\r"),
                    _ => out.push_str(&regex::escape(&n.to_string())),
                }
                continue;
            }
            '[' if body.get(j + 1) == Some(&':') => {
                let tail: String = body[j..].iter().collect();
                if let Some(close) = tail.find(":]") {
                    out.push_str(&tail[..close + 2]);
                    j += tail[..close + 2].chars().count();
                    continue;
                }
                out.push_str("\\[");
            }
            '[' | '&' | '~' | ']' => {
                out.push('\\');
                out.push(c);
            }
            '-' if j == 0 || j + 1 == body.len() => out.push_str("\\-"),
            _ => out.push(c),
        }
        j += 1;
    }
    out.push(']');
    Ok(i + rest[..end].chars().count() + 1)
}

/// Expand a `:s` replacement for one match. `&` and `\0` are the whole
/// match, `\1`..`\9` the groups; `\u`, `\l`, `\U`, `\L`, `\e`, `\E`
/// change case. A `\r` or carriage return splits the line, returned as
/// `'\r'` in the result.
pub fn expand_replacement(sub: &str, caps: &Captures, magic: bool) -> String {
    #[derive(Clone, Copy, PartialEq)]
    enum Case {
        None,
        Upper,
        Lower,
    }
    let mut out = String::new();
    let mut one = Case::None;
    let mut all = Case::None;

    let push = |out: &mut String, s: &str, one: &mut Case, all: Case| {
        for ch in s.chars() {
            let ch = match (*one, all) {
                (Case::Upper, _) => {
                    *one = Case::None;
                    ch.to_uppercase().next().unwrap_or(ch)
                }
                (Case::Lower, _) => {
                    *one = Case::None;
                    ch.to_lowercase().next().unwrap_or(ch)
                }
                (_, Case::Upper) => ch.to_uppercase().next().unwrap_or(ch),
                (_, Case::Lower) => ch.to_lowercase().next().unwrap_or(ch),
                _ => ch,
            };
            out.push(ch);
        }
    };

    let mut chars = sub.chars();
    while let Some(c) = chars.next() {
        match c {
            '&' if magic => {
                let m = caps.get(0).map(|m| m.as_str()).unwrap_or("");
                push(&mut out, m, &mut one, all);
            }
            '\r' => out.push('\r'),
            '\\' => match chars.next() {
                Some(d @ '0'..='9') => {
                    let idx = d as usize - '0' as usize;
                    let m = caps.get(idx).map(|m| m.as_str()).unwrap_or("");
                    push(&mut out, m, &mut one, all);
                }
                Some('&') if !magic => {
                    let m = caps.get(0).map(|m| m.as_str()).unwrap_or("");
                    push(&mut out, m, &mut one, all);
                }
                Some('u') => one = Case::Upper,
                Some('l') => one = Case::Lower,
                Some('U') => all = Case::Upper,
                Some('L') => all = Case::Lower,
                Some('e') | Some('E') => {
                    one = Case::None;
                    all = Case::None;
                }
                Some('r') => out.push('\r'),
                Some('n') => out.push('\0'),
                Some('t') => out.push('\t'),
                Some(other) => push(&mut out, &other.to_string(), &mut one, all),
                None => out.push('\\'),
            },
            other => push(&mut out, &other.to_string(), &mut one, all),
        }
    }
    out
}

/// Replace `~` in a replacement with the previous replacement string.
/// `\~` stays a literal tilde.
pub fn regtilde(sub: &str, previous: Option<&str>, magic: bool) -> String {
    let mut out = String::new();
    let mut chars = sub.chars();
    while let Some(c) = chars.next() {
        match c {
            '~' if magic => out.push_str(previous.unwrap_or("")),
            '\\' => match chars.next() {
                Some('~') if magic => out.push_str("\\~"),
                Some('~') => out.push_str(previous.unwrap_or("")),
                Some(n) => {
                    out.push('\\');
                    out.push(n);
                }
                None => out.push('\\'),
            },
            other => out.push(other),
        }
    }
    out
}

impl EditorState {
    /// Compile `pat` with the 'magic', 'ignorecase' and 'smartcase'
    /// options. An empty pattern is the remembered one of `kind`.
    pub fn search_regex(&self, pat: &str, kind: PatKind) -> Result<(Regex, String)> {
        let pat = if pat.is_empty() {
            match self.search.pattern(kind) {
                Some(p) => p.to_string(),
                None => return Err(runtime(e::NOPREVRE)),
            }
        } else {
            pat.to_string()
        };
        let mut ic = self.p_flag(Opt::Ignorecase);
        if ic && self.p_flag(Opt::Smartcase) && pat.chars().any(|c| c.is_uppercase()) {
            ic = false;
        }
        let re = vim_regex(&pat, self.p_flag(Opt::Magic), ic).map_err(|err| match err {
            Error::Validation(m) if m == e::INVPAT => runtime(format!("{}: {}", e::INVPAT, pat)),
            other => other,
        })?;
        Ok((re, pat))
    }

    /// Remember `pat` as the last search or substitute pattern, unless
    /// `:keeppatterns` is in effect.
    pub fn save_pattern(&mut self, pat: &str, kind: PatKind) {
        if self
            .cmdmod
            .flags
            .contains(crate::modifiers::CmdModFlags::KEEPPATTERNS)
        {
            return;
        }
        match kind {
            PatKind::Subst => {
                self.search.last_subst = Some(pat.to_string());
                self.search.last_was_search = false;
            }
            _ => {
                self.search.last_search = Some(pat.to_string());
                self.search.last_was_search = true;
                self.regs.last_search = Some(pat.to_string());
            }
        }
    }

    /// Find the next line after (or before) `from` in the current buffer
    /// that matches `pat`, wrapping around with 'wrapscan'.
    pub fn search_line(&mut self, pat: &str, kind: PatKind, dir: Dir, from: i64) -> Result<i64> {
        let (re, used) = self.search_regex(pat, kind)?;
        if !pat.is_empty() {
            self.save_pattern(&used, PatKind::Search);
        }
        self.search.last_dir_backward = dir == Dir::Backward;

        let count = self.line_count();
        let wrap = self.p_flag(Opt::Wrapscan);
        let from = from.clamp(0, count);
        let order: Vec<i64> = match dir {
            Dir::Forward => ((from + 1)..=count)
                .chain(if wrap { 1..=from.min(count) } else { 1..=0 })
                .collect(),
            Dir::Backward => (1..from)
                .rev()
                .chain(if wrap { (from.max(1)..=count).rev().collect::<Vec<_>>() } else { Vec::new() })
                .collect(),
        };
        for lnum in order {
            if self.exc.got_int {
                return Err(Error::Interrupt);
            }
            if re.is_match(&self.curbuf().get(lnum)) {
                return Ok(lnum);
            }
        }
        if !wrap {
            let which = if dir == Dir::Forward {
                e::SEARCH_BOTTOM
            } else {
                e::SEARCH_TOP
            };
            return Err(runtime(format!("{which}: {used}")));
        }
        Err(runtime(format!("{}: {}", e::PATNOTF, used)))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::host::MemHost;
    use test_log::test;

    fn re(p: &str) -> Regex {
        vim_regex(p, true, false).unwrap()
    }

    #[test]
    fn magic_translation() {
        assert!(re("a\\(b\\|c\\)d").is_match("acd"));
        assert!(re("(x)").is_match("(x)"));
        assert!(re("a\\+").is_match("aaa"));
        assert!(re("a+").is_match("a+"));
        assert!(re("\\<foo\\>").is_match("a foo b"));
        assert!(!re("\\<foo\\>").is_match("afoob"));
        assert!(re("^\\s*\\d\\{2,}$").is_match("  42"));
        assert!(re("x^y").is_match("x^y"));
        assert!(re("a$b").is_match("a$b"));
        assert!(re("[[:digit:]]x").is_match("3x"));
    }

    #[test]
    fn magic_modes_and_case() {
        assert!(re("\\v(a|b)+").is_match("abab"));
        assert!(re("\\Va.b").is_match("a.b"));
        assert!(!re("\\Va.b").is_match("axb"));
        assert!(re("\\cFOO").is_match("foo"));
        assert!(!vim_regex("\\CFoo", true, true).unwrap().is_match("foo"));
        assert!(vim_regex("a.c", false, false).unwrap().is_match("a.c"));
        assert!(!vim_regex("a.c", false, false).unwrap().is_match("abc"));
    }

    #[test]
    fn lazy_braces() {
        let r = re("a\\{-1,}");
        assert_eq!(r.find("aaa").unwrap().as_str(), "a");
    }

    #[test]
    fn skipping_patterns() {
        assert_eq!(skip_regexp("foo/d", '/'), 3);
        assert_eq!(skip_regexp("a\\/b/x", '/'), 4);
        assert_eq!(skip_regexp("[/]x/", '/'), 4);
        assert_eq!(skip_regexp("abc", '/'), 3);
    }

    #[test]
    fn replacements() {
        let r = re("\\(\\w\\+\\) \\(\\w\\+\\)");
        let caps = r.captures("hello world").unwrap();
        assert_eq!(expand_replacement("\\2 \\1", &caps, true), "world hello");
        assert_eq!(expand_replacement("\\u&", &caps, true), "Hello world");
        assert_eq!(expand_replacement("\\U\\1\\e!", &caps, true), "HELLO!");
        assert_eq!(expand_replacement("a\\rb", &caps, true), "a\rb");
        assert_eq!(regtilde("x~y", Some("Q"), true), "xQy");
        assert_eq!(regtilde("x\\~y", Some("Q"), true), "x\\~y");
    }

    #[test]
    fn line_search_wraps() {
        let mut st = EditorState::new(Box::new(MemHost::new()), false);
        st.curbuf_mut().load_text("a\nfoo\nb\nfoo\nc");
        assert_eq!(st.search_line("foo", PatKind::Search, Dir::Forward, 2).unwrap(), 4);
        assert_eq!(st.search_line("foo", PatKind::Search, Dir::Forward, 4).unwrap(), 2);
        assert_eq!(st.search_line("", PatKind::Search, Dir::Backward, 4).unwrap(), 2);
        assert!(st.search_line("zzz", PatKind::Search, Dir::Forward, 1).is_err());
        // a failed search still becomes the last pattern
        assert_eq!(st.search.last_search.as_deref(), Some("zzz"));
    }
}

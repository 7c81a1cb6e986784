//
// Copyright (c) 2024 Jeff Garzik
//
// This file is part of the posixutils-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//

//! File name macros (`%`, `#`, `<sfile>` and friends) and the `:p`, `:h`,
//! `:t`, `:r`, `:e`, `:s` modifiers applied to them.

use std::path::Path;

use crate::charset::{is_fname_char, is_word_char};
use crate::cmds::CmdFlags;
use crate::docmd::ExArgs;
use crate::error::{runtime, Result};
use crate::line_source::SourceKind;
use crate::search::{expand_replacement, vim_regex};
use crate::state::EditorState;

fn home_dir() -> Option<String> {
    std::env::var("HOME").ok().filter(|h| !h.is_empty())
}

fn current_dir() -> String {
    std::env::current_dir()
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn full_path(name: &str) -> String {
    let mut full = if let Some(rest) = name.strip_prefix("~/") {
        match home_dir() {
            Some(home) => format!("{home}/{rest}"),
            None => name.to_string(),
        }
    } else if name.starts_with('/') {
        name.to_string()
    } else {
        let cwd = current_dir();
        if name.is_empty() || name == "." {
            cwd
        } else {
            format!("{}/{}", cwd.trim_end_matches('/'), name.trim_start_matches("./"))
        }
    };
    if Path::new(&full).is_dir() && !full.ends_with('/') {
        full.push('/');
    }
    full
}

/// Byte offset of the tail of `name`: after the last slash.
fn tail_start(name: &str) -> usize {
    name.rfind('/').map_or(0, |i| i + 1)
}

/// Parse `?pat?sub?` after `:s` or `:gs`, returning the parts and the
/// length used.
fn parse_subst(s: &str) -> Option<(String, String, usize)> {
    let delim = s.chars().next()?;
    let rest = &s[delim.len_utf8()..];
    let end_pat = rest.find(delim)?;
    let after = &rest[end_pat + delim.len_utf8()..];
    let end_sub = after.find(delim)?;
    let used = delim.len_utf8() * 3 + end_pat + end_sub;
    Some((rest[..end_pat].to_string(), after[..end_sub].to_string(), used))
}

/// Apply the modifiers at the start of `mods` to `name`. Returns the new
/// name and the length of `mods` consumed. Modifiers are applied in a
/// fixed order; one out of order ends the list.
pub fn modify_fname(mods: &str, name: &str) -> Result<(String, usize)> {
    let mut name = name.to_string();
    let mut i = 0;
    let at = |i: usize, m: &str| mods[i..].starts_with(m);

    // :p :~ :.
    loop {
        if at(i, ":p") {
            name = full_path(&name);
            i += 2;
        } else if at(i, ":8") {
            i += 2;
        } else if at(i, ":~") {
            if let Some(home) = home_dir() {
                let full = full_path(&name);
                if let Some(rest) = full.strip_prefix(&home) {
                    if rest.is_empty() || rest.starts_with('/') {
                        name = format!("~{rest}");
                    }
                }
            }
            i += 2;
        } else if at(i, ":.") && !at(i, ":..") {
            let full = full_path(&name);
            let cwd = current_dir();
            if let Some(rest) = full.strip_prefix(&cwd) {
                let rest = rest.trim_start_matches('/');
                name = if rest.is_empty() { ".".to_string() } else { rest.to_string() };
            }
            i += 2;
        } else {
            break;
        }
    }

    // :h
    while at(i, ":h") {
        let trimmed = if name.len() > 1 { name.trim_end_matches('/') } else { name.as_str() };
        let t = tail_start(trimmed);
        name = if t == 0 {
            if name.starts_with('~') || name.starts_with('/') {
                name.clone()
            } else {
                ".".to_string()
            }
        } else if t == 1 {
            "/".to_string()
        } else {
            trimmed[..t - 1].to_string()
        };
        i += 2;
    }

    // :t
    if at(i, ":t") {
        name = name[tail_start(&name)..].to_string();
        i += 2;
    }

    // :r and :e
    let mut roots = 0;
    let mut exts = 0;
    while at(i, ":r") || at(i, ":e") {
        if at(i, ":r") {
            roots += 1;
        } else {
            exts += 1;
        }
        i += 2;
    }
    if roots > 0 || exts > 0 {
        let t = tail_start(&name);
        let tail = name[t..].to_string();
        // dots that start an extension; a leading dot does not
        let dots: Vec<usize> = tail
            .char_indices()
            .filter(|&(j, c)| c == '.' && j > 0)
            .map(|(j, _)| j)
            .collect();
        if exts > 0 {
            let idx = dots.len().saturating_sub(exts + roots);
            name = match dots.get(idx) {
                Some(&d) if dots.len() > roots => {
                    let end = if roots > 0 { dots[dots.len() - roots] } else { tail.len() };
                    tail[d + 1..end].to_string()
                }
                _ => String::new(),
            };
        } else {
            let keep = dots.len().saturating_sub(roots);
            let end = dots.get(keep).copied().unwrap_or(tail.len());
            name = format!("{}{}", &name[..t], &tail[..end]);
        }
    }

    // :s?pat?sub? and :gs?pat?sub?
    loop {
        let global = at(i, ":gs");
        if !global && !at(i, ":s") {
            break;
        }
        let start = i + if global { 3 } else { 2 };
        let Some((pat, sub, used)) = parse_subst(&mods[start..]) else {
            break;
        };
        let re = vim_regex(&pat, true, false)?;
        let replace = |caps: &regex::Captures| expand_replacement(&sub, caps, true);
        name = if global {
            re.replace_all(&name, replace).into_owned()
        } else {
            re.replace(&name, replace).into_owned()
        };
        i = start + used;
    }

    // :S
    if at(i, ":S") {
        name = format!("'{}'", name.replace('\'', "'\\''"));
        i += 2;
    }
    Ok((name, i))
}

/// The chain of scripts and functions with their line numbers, as used
/// for `<stack>`.
fn stack_text(st: &EditorState) -> String {
    st.sourcing
        .iter()
        .map(|f| match f.kind {
            SourceKind::Function => format!("function {}[{}]", f.name, f.lnum),
            SourceKind::Script => format!("script {}[{}]", f.name, f.lnum),
            _ => format!("{}[{}]", f.name, f.lnum),
        })
        .collect::<Vec<_>>()
        .join("..")
}

fn script_frame(st: &EditorState) -> Option<&crate::state::SourceFrame> {
    st.sourcing.iter().rev().find(|f| f.kind == SourceKind::Script)
}

/// Text under the cursor matching `keep`.
fn text_under_cursor(st: &EditorState, keep: impl Fn(char) -> bool) -> Option<String> {
    let pos = st.cursor();
    let line = st.curbuf().get(pos.lnum);
    let col = pos.col.min(line.len());
    let start = line[..col]
        .char_indices()
        .rev()
        .take_while(|&(_, c)| keep(c))
        .last()
        .map_or(col, |(j, _)| j);
    // skip to the first match at or after the cursor
    let from = if line[start..].starts_with(|c: char| keep(c)) {
        start
    } else {
        start + line[start..].find(|c: char| keep(c))?
    };
    let end = line[from..]
        .find(|c: char| !keep(c))
        .map_or(line.len(), |j| from + j);
    (end > from).then(|| line[from..end].to_string())
}

fn buffer_name(st: &EditorState, fnum: usize) -> Option<String> {
    st.bufs.get(fnum).and_then(|b| b.name.clone())
}

/// Expand one file name macro at the start of `src`. Returns the text
/// and the length consumed, or `None` when `src` does not start with one.
pub fn eval_vars(st: &EditorState, src: &str) -> Result<Option<(String, usize)>> {
    let b = src.as_bytes();
    let (mut text, mut len, is_name) = match b.first() {
        Some(b'%') => {
            let name = st.curbuf().name.clone().unwrap_or_default();
            (name, 1, true)
        }
        Some(b'#') => {
            if b.get(1) == Some(&b'#') {
                (st.layout.args.join(" "), 2, false)
            } else {
                let digits = b[1..].iter().take_while(|c| c.is_ascii_digit()).count();
                let fnum = if digits > 0 {
                    src[1..1 + digits].parse::<usize>().ok()
                } else {
                    st.curwin().alt
                };
                let name = match fnum {
                    Some(n) => buffer_name(st, n),
                    None => None,
                };
                match name {
                    Some(name) => (name, 1 + digits, true),
                    None if digits == 0 => {
                        return Err(runtime("E194: No alternate file name to substitute for '#'"))
                    }
                    None => (String::new(), 1 + digits, true),
                }
            }
        }
        Some(b'<') => {
            let Some(close) = src.find('>') else {
                return Ok(None);
            };
            let word = &src[1..close];
            let len = close + 1;
            let text = match word {
                "cword" => text_under_cursor(st, is_word_char)
                    .ok_or_else(|| runtime("E348: No string under cursor"))?,
                "cWORD" => text_under_cursor(st, |c| !c.is_whitespace())
                    .ok_or_else(|| runtime("E348: No string under cursor"))?,
                "cfile" => text_under_cursor(st, is_fname_char)
                    .ok_or_else(|| runtime("E446: No file name under cursor"))?,
                "cexpr" => text_under_cursor(st, |c| is_word_char(c) || c == '.' || c == ':')
                    .ok_or_else(|| runtime("E348: No string under cursor"))?,
                "afile" => st.autocmds.afile.clone().ok_or_else(|| {
                    runtime("E495: No autocommand file name to substitute for \"<afile>\"")
                })?,
                "abuf" => st
                    .autocmds
                    .abuf
                    .map(|n| n.to_string())
                    .ok_or_else(|| runtime("E496: No autocommand buffer number to substitute for \"<abuf>\""))?,
                "amatch" => st.autocmds.amatch.clone().ok_or_else(|| {
                    runtime("E497: No autocommand match name to substitute for \"<amatch>\"")
                })?,
                "sfile" => {
                    let s = st.estack_sfile();
                    if s.is_empty() {
                        return Err(runtime("E498: No :source file name to substitute for \"<sfile>\""));
                    }
                    s
                }
                "script" => script_frame(st)
                    .map(|f| f.name.clone())
                    .ok_or_else(|| runtime("E1274: No script file name to substitute for \"<script>\""))?,
                "stack" => {
                    let s = stack_text(st);
                    if s.is_empty() {
                        return Err(runtime("E489: No call stack to substitute for \"<stack>\""));
                    }
                    s
                }
                "slnum" => {
                    let lnum = st.sourcing_lnum();
                    if lnum == 0 {
                        return Err(runtime("E842: No line number to use for \"<slnum>\""));
                    }
                    lnum.to_string()
                }
                "sflnum" => match script_frame(st) {
                    Some(f) if f.lnum > 0 => f.lnum.to_string(),
                    _ => return Err(runtime("E961: No line number to use for \"<sflnum>\"")),
                },
                "client" => return Ok(None),
                _ => return Ok(None),
            };
            let is_name = !matches!(word, "abuf" | "slnum" | "sflnum" | "stack");
            (text, len, is_name)
        }
        _ => return Ok(None),
    };

    if is_name {
        let (modified, used) = modify_fname(&src[len..], &text)?;
        if used > 0 {
            text = modified;
            len += used;
        } else if text.is_empty() && matches!(b.first(), Some(b'%') | Some(b'#')) {
            return Err(runtime(
                "E499: Empty file name for '%' or '#', only works with \":p:h\"",
            ));
        }
    }
    Ok(Some((text, len)))
}

/// `expand()`: a macro with modifiers, or `~` and environment variables.
pub fn expand_special(st: &EditorState, s: &str) -> Result<String> {
    match eval_vars(st, s)? {
        Some((mut text, used)) => {
            text.push_str(&s[used..]);
            Ok(text)
        }
        None => Ok(crate::options::set::expand_env(s, false)),
    }
}

/// Characters escaped with a backslash when an expanded name is put in an
/// argument that holds several names.
const ESCAPE_CHARS: &str = " \t%#|\"";

/// Expand `%`, `#` and `<...>` in the argument of a command that takes
/// file names. A backslash before a macro keeps it literal.
pub fn expand_filename(st: &mut EditorState, ea: &mut ExArgs) -> Result<()> {
    let arg = ea.arg_str().to_string();
    let nospc = ea.argt.contains(CmdFlags::NOSPC);
    let mut out = String::with_capacity(arg.len());
    let mut i = 0;
    let mut changed = false;
    while i < arg.len() {
        let rest = &arg[i..];
        let c = rest.chars().next().unwrap_or_default();
        if c == '\\' {
            let next = rest[1..].chars().next();
            match next {
                Some(n @ ('%' | '#' | '<')) => {
                    out.push(n);
                    i += 1 + n.len_utf8();
                    changed = true;
                    continue;
                }
                Some(n) => {
                    out.push('\\');
                    out.push(n);
                    i += 1 + n.len_utf8();
                    continue;
                }
                None => {
                    out.push('\\');
                    i += 1;
                    continue;
                }
            }
        }
        // `:!` keeps a `!` for the previous command; that is done by the
        // command itself
        if matches!(c, '%' | '#' | '<') {
            if let Some((mut text, used)) = eval_vars(st, rest)? {
                // a name under the cursor that is not a file goes through
                // 'includeexpr'
                if rest.starts_with("<cfile>") && !st.host.file_exists(&text) {
                    text = st.eval_includeexpr(&text)?;
                }
                if nospc {
                    out.push_str(&text);
                } else {
                    for ch in text.chars() {
                        if ESCAPE_CHARS.contains(ch) {
                            out.push('\\');
                        }
                        out.push(ch);
                    }
                }
                i += used;
                changed = true;
                continue;
            }
        }
        out.push(c);
        i += c.len_utf8();
    }

    if nospc && (out.starts_with('~') || out.contains('$')) {
        let expanded = crate::options::set::expand_env(&out, false);
        if expanded != out {
            out = expanded;
            changed = true;
        }
    }
    if changed {
        log::trace!("expanded file argument {arg:?} to {out:?}");
        ea.set_arg(&out);
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::host::MemHost;
    use test_log::test;

    fn state_with_name(name: &str) -> EditorState {
        let mut st = EditorState::new(Box::new(MemHost::new()), false);
        st.curbuf_mut().name = Some(name.to_string());
        st
    }

    #[test]
    fn head_tail_root_ext() {
        let m = |mods: &str| modify_fname(mods, "dir/sub/file.tar.gz").unwrap().0;
        assert_eq!(m(":h"), "dir/sub");
        assert_eq!(m(":h:h"), "dir");
        assert_eq!(m(":t"), "file.tar.gz");
        assert_eq!(m(":r"), "dir/sub/file.tar");
        assert_eq!(m(":r:r"), "dir/sub/file");
        assert_eq!(m(":e"), "gz");
        assert_eq!(m(":e:e"), "tar.gz");
        assert_eq!(m(":t:r"), "file.tar");
        assert_eq!(modify_fname(":h", "file").unwrap().0, ".");
        assert_eq!(modify_fname(":e", ".vimrc").unwrap().0, "");
    }

    #[test]
    fn consumed_length() {
        assert_eq!(modify_fname(":r rest", "a.c").unwrap(), ("a".into(), 2));
        // out of order: :t after :r is not a modifier
        assert_eq!(modify_fname(":r:t", "x/a.c").unwrap(), ("x/a".into(), 2));
        assert_eq!(modify_fname("", "a.c").unwrap(), ("a.c".into(), 0));
    }

    #[test]
    fn substitute_modifier() {
        let (out, used) = modify_fname(":s?a?b?", "a.a").unwrap();
        assert_eq!((out.as_str(), used), ("b.a", 7));
        let (out, _) = modify_fname(":gs/a/b/", "a.a").unwrap();
        assert_eq!(out, "b.b");
        let (out, _) = modify_fname(":S", "it's").unwrap();
        assert_eq!(out, "'it'\\''s'");
    }

    #[test]
    fn macros() {
        let st = state_with_name("src/main.rs");
        assert_eq!(expand_special(&st, "%").unwrap(), "src/main.rs");
        assert_eq!(expand_special(&st, "%:t:r").unwrap(), "main");
        assert_eq!(expand_special(&st, "plain").unwrap(), "plain");
        assert!(expand_special(&st, "#").is_err());
        assert!(expand_special(&st, "<sfile>").is_err());
    }

    #[test]
    fn empty_name_needs_modifier() {
        let st = EditorState::new(Box::new(MemHost::new()), false);
        let err = expand_special(&st, "%").unwrap_err();
        assert!(err.message().starts_with("E499"));
    }

    #[test]
    fn cword() {
        let mut st = state_with_name("x");
        st.curbuf_mut().load_text("foo bar_baz qux\n");
        st.curwin_mut().cursor.col = 6;
        assert_eq!(expand_special(&st, "<cword>").unwrap(), "bar_baz");
    }

    #[test]
    fn cfile_goes_through_includeexpr() {
        let mut st = state_with_name("x");
        st.curbuf_mut().load_text("see foo now\n");
        st.curwin_mut().cursor.col = 5;
        crate::runner::do_cmdline_cmd(&mut st, "set includeexpr=v:fname..'.h'").unwrap();
        let mut ea = ExArgs::new("e <cfile>");
        ea.arg = 2;
        ea.argt = CmdFlags::FILE1;
        expand_filename(&mut st, &mut ea).unwrap();
        assert_eq!(ea.arg_str(), "foo.h");
    }

    #[test]
    fn filename_argument() {
        let mut st = state_with_name("my file.txt");
        let mut ea = ExArgs::new("w %.bak");
        ea.arg = 2;
        ea.argt = CmdFlags::FILE1;
        expand_filename(&mut st, &mut ea).unwrap();
        assert_eq!(ea.arg_str(), "my file.txt.bak");

        let mut ea = ExArgs::new("args % \\%");
        ea.arg = 5;
        ea.argt = CmdFlags::FILES;
        expand_filename(&mut st, &mut ea).unwrap();
        assert_eq!(ea.arg_str(), "my\\ file.txt %");
    }
}

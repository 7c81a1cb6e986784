//
// Copyright (c) 2024 Jeff Garzik
//
// This file is part of the posixutils-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//

//! Command modifiers such as `:silent`, `:verbose` and `:filter`.
//!
//! Parsing only records what was given. [`EditorState::apply_cmdmod`]
//! changes the editor state and remembers what it replaced;
//! [`EditorState::undo_cmdmod`] puts it back when the command is done.

use bitflags::bitflags;
use regex::Regex;

use crate::address::{get_address, skip_range, AddrType};
use crate::charset::{ends_excmd, is_white, skipwhite_at};
use crate::error::{e, invalid, Result};
use crate::options::{Opt, OptVal};
use crate::state::EditorState;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct CmdModFlags: u32 {
        const BROWSE = 1 << 0;
        const CONFIRM = 1 << 1;
        const HIDE = 1 << 2;
        const KEEPMARKS = 1 << 3;
        const KEEPALT = 1 << 4;
        const KEEPJUMPS = 1 << 5;
        const KEEPPATTERNS = 1 << 6;
        const LOCKMARKS = 1 << 7;
        const NOSWAPFILE = 1 << 8;
        const NOAUTOCMD = 1 << 9;
        const SANDBOX = 1 << 10;
        const SILENT = 1 << 11;
        const ERRSILENT = 1 << 12;
        const UNSILENT = 1 << 13;
        const LEGACY = 1 << 14;
        const VIM9CMD = 1 << 15;
    }
}

bitflags! {
    /// Where a new window goes.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct SplitFlags: u8 {
        const ABOVE = 1 << 0;
        const BELOW = 1 << 1;
        const BOT = 1 << 2;
        const TOP = 1 << 3;
        const VERT = 1 << 4;
        const HOR = 1 << 5;
    }
}

/// `:filter[!] /pat/`: lines of listings must (not) match.
#[derive(Debug, Clone)]
pub struct CmdFilter {
    pub regex: Regex,
    pub negated: bool,
}

#[derive(Debug, Default)]
pub struct CmdMod {
    pub flags: CmdModFlags,
    pub split: SplitFlags,
    /// Tab page for a new window plus one, zero when not given.
    pub tab: i64,
    /// Verbose level plus one, zero when not given.
    pub verbose: i64,
    pub filter: Option<CmdFilter>,

    verbose_save: Option<i64>,
    save_msg_silent: Option<i32>,
    did_esilent: i32,
    save_ei: Option<String>,
    did_sandbox: bool,
}

impl CmdMod {
    /// Anything was given. `ignore_silent` leaves out the silent family.
    pub fn has_any(&self, ignore_silent: bool) -> bool {
        let mut flags = self.flags;
        if ignore_silent {
            flags -= CmdModFlags::SILENT | CmdModFlags::ERRSILENT | CmdModFlags::UNSILENT;
        }
        !flags.is_empty()
            || !self.split.is_empty()
            || self.verbose > 0
            || self.tab != 0
            || self.filter.is_some()
    }

    /// Give back the `emsg_silent` increments of `:silent!`, so that they
    /// only apply to `:try` itself.
    pub fn take_esilent(&mut self) -> i32 {
        std::mem::take(&mut self.did_esilent)
    }

    /// The modifiers as `<mods>` shows them.
    pub fn describe(&self) -> String {
        let mut out = Vec::new();
        let f = self.flags;
        for (flag, name) in [
            (CmdModFlags::BROWSE, "browse"),
            (CmdModFlags::CONFIRM, "confirm"),
            (CmdModFlags::HIDE, "hide"),
            (CmdModFlags::KEEPALT, "keepalt"),
            (CmdModFlags::KEEPJUMPS, "keepjumps"),
            (CmdModFlags::KEEPMARKS, "keepmarks"),
            (CmdModFlags::KEEPPATTERNS, "keeppatterns"),
            (CmdModFlags::LOCKMARKS, "lockmarks"),
            (CmdModFlags::NOSWAPFILE, "noswapfile"),
            (CmdModFlags::NOAUTOCMD, "noautocmd"),
            (CmdModFlags::SANDBOX, "sandbox"),
            (CmdModFlags::UNSILENT, "unsilent"),
        ] {
            if f.contains(flag) {
                out.push(name.to_string());
            }
        }
        if f.contains(CmdModFlags::SILENT) {
            out.push(if f.contains(CmdModFlags::ERRSILENT) {
                "silent!".to_string()
            } else {
                "silent".to_string()
            });
        }
        for (flag, name) in [
            (SplitFlags::ABOVE, "aboveleft"),
            (SplitFlags::BELOW, "belowright"),
            (SplitFlags::BOT, "botright"),
            (SplitFlags::TOP, "topleft"),
            (SplitFlags::VERT, "vertical"),
            (SplitFlags::HOR, "horizontal"),
        ] {
            if self.split.contains(flag) {
                out.push(name.to_string());
            }
        }
        if self.tab > 0 {
            out.push(format!("{}tab", self.tab - 1));
        }
        if self.verbose > 0 {
            out.push(format!("{}verbose", self.verbose - 1));
        }
        out.join(" ")
    }
}

/// What is left of a line after its modifiers.
#[derive(Debug, PartialEq)]
pub enum ModParse {
    /// The command to execute, with a Visual range put back in front.
    Command(String),
    /// A comment or an empty line. Holds the text after a newline in a
    /// comment, if any.
    Nothing(Option<String>),
}

/// Modifier names and the length of their shortest abbreviation; the
/// flag tells whether a count may precede it.
const CMDMODS: &[(&str, usize, bool)] = &[
    ("aboveleft", 3, false),
    ("belowright", 3, false),
    ("botright", 2, false),
    ("browse", 3, false),
    ("confirm", 4, false),
    ("filter", 4, false),
    ("hide", 3, false),
    ("horizontal", 3, false),
    ("keepalt", 5, false),
    ("keepjumps", 5, false),
    ("keepmarks", 3, false),
    ("keeppatterns", 5, false),
    ("leftabove", 5, false),
    ("legacy", 3, false),
    ("lockmarks", 3, false),
    ("noautocmd", 3, false),
    ("noswapfile", 3, false),
    ("rightbelow", 6, false),
    ("sandbox", 3, false),
    ("silent", 3, false),
    ("tab", 3, true),
    ("topleft", 2, false),
    ("unsilent", 3, false),
    ("verbose", 4, true),
    ("vertical", 4, false),
    ("vim9cmd", 4, false),
];

/// Length of the modifier at the start of `cmd`, including a count,
/// or zero when there is none.
pub fn modifier_len(cmd: &str) -> usize {
    let bytes = cmd.as_bytes();
    let mut p = 0;
    if bytes.first().is_some_and(u8::is_ascii_digit) {
        p = crate::charset::skipdigits_at(cmd, 1);
        p = skipwhite_at(cmd, p);
    }
    let word = &bytes[p..];
    for &(name, minlen, has_count) in CMDMODS {
        let j = word
            .iter()
            .zip(name.as_bytes())
            .take_while(|(a, b)| a == b)
            .count();
        let next_alpha = word.get(j).is_some_and(u8::is_ascii_alphabetic);
        if !next_alpha && j >= minlen && (p == 0 || has_count) {
            return j + p;
        }
    }
    0
}

/// Match `name` (at least `len` chars) at `at`. Returns the position of
/// the argument after it, with white space skipped.
fn checkforcmd(s: &str, at: usize, name: &str, len: usize) -> Option<usize> {
    let bytes = &s.as_bytes()[at..];
    let i = bytes
        .iter()
        .zip(name.as_bytes())
        .take_while(|(a, b)| a == b)
        .count();
    let next = bytes.get(i).copied();
    let word_goes_on = next.is_some_and(|c| c.is_ascii_alphabetic() || c == b'_');
    // "silent(" and "filter." are function calls and members
    if i >= len && !word_goes_on && next != Some(b'(') && next != Some(b'.') {
        Some(skipwhite_at(s, at + i))
    } else {
        None
    }
}

/// Split a `:filter` pattern: `/pat/` with any delimiter, or a word
/// ending at white space. Returns the pattern and where the command
/// starts.
fn skip_filter_pat(s: &str, at: usize) -> Option<(String, usize)> {
    let c = s[at..].chars().next()?;
    if c.is_alphanumeric() || c == '_' {
        let end = crate::charset::skiptowhite_esc(s, at);
        return Some((s[at..end].to_string(), skipwhite_at(s, end)));
    }
    let body = at + c.len_utf8();
    let len = crate::search::skip_regexp(&s[body..], c);
    let end = body + len;
    if !s[end..].starts_with(c) {
        return None;
    }
    Some((s[body..end].to_string(), skipwhite_at(s, end + c.len_utf8())))
}

impl EditorState {
    /// Parse and skip the modifiers of `line` into `cmod`. With
    /// `skip_only` nothing in the editor changes and patterns are not
    /// compiled.
    pub fn parse_command_modifiers(
        &mut self,
        line: &str,
        cmod: &mut CmdMod,
        skip_only: bool,
    ) -> Result<ModParse> {
        *cmod = CmdMod {
            flags: self.sticky_cmdmod,
            ..Default::default()
        };

        let mut cmd = 0;
        let mut visual_at = None;
        if line.starts_with("'<,'>") {
            // so that ":'<,'>silent cmd" works like ":silent '<,'>cmd"
            cmd = 5;
            visual_at = Some(cmd);
        }

        loop {
            while let Some(b' ' | b'\t' | b':') = line.as_bytes().get(cmd) {
                cmd += 1;
            }
            let rest = &line[cmd..];
            if rest.starts_with('"') {
                // a comment ends at a newline
                let next = rest.find('\n').map(|i| rest[i + 1..].to_string());
                return Ok(ModParse::Nothing(next));
            }
            if rest.is_empty() {
                return Ok(ModParse::Nothing(None));
            }

            let p = skip_range(line, cmd, true, self.cpo_has('*'));
            let Some(&first) = line.as_bytes().get(p) else {
                break;
            };

            let matched = match first {
                b'a' => checkforcmd(line, cmd, "aboveleft", 3).map(|n| {
                    cmod.split |= SplitFlags::ABOVE;
                    n
                }),
                b'b' => {
                    if let Some(n) = checkforcmd(line, cmd, "belowright", 3) {
                        cmod.split |= SplitFlags::BELOW;
                        Some(n)
                    } else if let Some(n) = checkforcmd(line, cmd, "browse", 3) {
                        cmod.flags |= CmdModFlags::BROWSE;
                        Some(n)
                    } else {
                        checkforcmd(line, cmd, "botright", 2).map(|n| {
                            cmod.split |= SplitFlags::BOT;
                            n
                        })
                    }
                }
                b'c' => checkforcmd(line, cmd, "confirm", 4).map(|n| {
                    cmod.flags |= CmdModFlags::CONFIRM;
                    n
                }),
                b'k' => [
                    ("keepmarks", 3, CmdModFlags::KEEPMARKS),
                    ("keepalt", 5, CmdModFlags::KEEPALT),
                    ("keeppatterns", 5, CmdModFlags::KEEPPATTERNS),
                    ("keepjumps", 5, CmdModFlags::KEEPJUMPS),
                ]
                .into_iter()
                .find_map(|(name, len, flag)| {
                    checkforcmd(line, cmd, name, len).map(|n| {
                        cmod.flags |= flag;
                        n
                    })
                }),
                b'f' => self.parse_filter(line, p, cmod, skip_only)?,
                b'h' => {
                    if let Some(n) = checkforcmd(line, cmd, "horizontal", 3) {
                        cmod.split |= SplitFlags::HOR;
                        Some(n)
                    } else {
                        // ":hide" and ":hide | cmd" are commands
                        match checkforcmd(line, p, "hide", 3) {
                            Some(n)
                                if p == cmd
                                    && n < line.len()
                                    && !ends_excmd(line.as_bytes().get(n).copied()) =>
                            {
                                cmod.flags |= CmdModFlags::HIDE;
                                Some(n)
                            }
                            _ => None,
                        }
                    }
                }
                b'l' => {
                    if let Some(n) = checkforcmd(line, cmd, "lockmarks", 3) {
                        cmod.flags |= CmdModFlags::LOCKMARKS;
                        Some(n)
                    } else if let Some(n) = checkforcmd(line, cmd, "legacy", 3) {
                        if ends_excmd(line.as_bytes().get(n).copied()) {
                            return Err(invalid("E1234: legacy must be followed by a command"));
                        }
                        cmod.flags |= CmdModFlags::LEGACY;
                        Some(n)
                    } else {
                        checkforcmd(line, cmd, "leftabove", 5).map(|n| {
                            cmod.split |= SplitFlags::ABOVE;
                            n
                        })
                    }
                }
                b'n' => {
                    if let Some(n) = checkforcmd(line, cmd, "noautocmd", 3) {
                        cmod.flags |= CmdModFlags::NOAUTOCMD;
                        Some(n)
                    } else {
                        checkforcmd(line, cmd, "noswapfile", 3).map(|n| {
                            cmod.flags |= CmdModFlags::NOSWAPFILE;
                            n
                        })
                    }
                }
                b'r' => checkforcmd(line, cmd, "rightbelow", 6).map(|n| {
                    cmod.split |= SplitFlags::BELOW;
                    n
                }),
                b's' => {
                    if let Some(n) = checkforcmd(line, cmd, "sandbox", 3) {
                        cmod.flags |= CmdModFlags::SANDBOX;
                        Some(n)
                    } else if let Some(n) = checkforcmd(line, cmd, "silent", 3) {
                        cmod.flags |= CmdModFlags::SILENT;
                        // ":silent!", but not "silent !cmd"
                        let bang = line.as_bytes().get(n) == Some(&b'!')
                            && !line.as_bytes().get(n - 1).copied().is_some_and(is_white);
                        if bang {
                            cmod.flags |= CmdModFlags::ERRSILENT;
                            Some(skipwhite_at(line, n + 1))
                        } else {
                            Some(n)
                        }
                    } else {
                        None
                    }
                }
                b't' => {
                    if let Some(n) = checkforcmd(line, p, "tab", 3) {
                        if !skip_only {
                            let mut at = cmd;
                            let tabnr =
                                get_address(self, line, &mut at, AddrType::Tabs, false, skip_only, 1)?;
                            cmod.tab = match tabnr {
                                None => self.layout.tab_nr() as i64 + 1,
                                Some(nr) if nr < 0 || nr > self.layout.tab_count() as i64 => {
                                    return Err(invalid(e::INVRANGE));
                                }
                                Some(nr) => nr + 1,
                            };
                        }
                        Some(n)
                    } else {
                        checkforcmd(line, cmd, "topleft", 2).map(|n| {
                            cmod.split |= SplitFlags::TOP;
                            n
                        })
                    }
                }
                b'u' => checkforcmd(line, cmd, "unsilent", 3).map(|n| {
                    cmod.flags |= CmdModFlags::UNSILENT;
                    n
                }),
                b'v' => {
                    if let Some(n) = checkforcmd(line, cmd, "vertical", 4) {
                        cmod.split |= SplitFlags::VERT;
                        Some(n)
                    } else if let Some(n) = checkforcmd(line, cmd, "vim9cmd", 4) {
                        if ends_excmd(line.as_bytes().get(n).copied()) {
                            return Err(invalid("E1164: vim9cmd must be followed by a command"));
                        }
                        cmod.flags |= CmdModFlags::VIM9CMD;
                        Some(n)
                    } else if let Some(n) = checkforcmd(line, p, "verbose", 4) {
                        // zero means not given, one is verbose level 0
                        cmod.verbose = match crate::charset::getdigits(line, cmd) {
                            Some((v, _)) => v + 1,
                            None => 2,
                        };
                        Some(n)
                    } else {
                        None
                    }
                }
                _ => None,
            };

            match matched {
                Some(next) => cmd = next,
                None => break,
            }
        }

        let text = match visual_at {
            Some(start) if cmd > start => format!("'<,'>{}", &line[cmd..]),
            Some(_) => line.to_string(),
            None => line[cmd..].to_string(),
        };
        log::trace!("modifiers {:?} before {text:?}", cmod.flags);
        Ok(ModParse::Command(text))
    }

    fn parse_filter(
        &mut self,
        line: &str,
        p: usize,
        cmod: &mut CmdMod,
        skip_only: bool,
    ) -> Result<Option<usize>> {
        let Some(mut at) = checkforcmd(line, p, "filter", 4) else {
            return Ok(None);
        };
        if ends_excmd(line.as_bytes().get(at).copied()) {
            return Ok(None);
        }
        let mut negated = false;
        if line.as_bytes().get(at) == Some(&b'!') {
            negated = true;
            at = skipwhite_at(line, at + 1);
            if ends_excmd(line.as_bytes().get(at).copied()) {
                return Ok(None);
            }
        }
        let Some((pat, next)) = skip_filter_pat(line, at) else {
            return Ok(None);
        };
        if next >= line.len() {
            return Ok(None);
        }
        if !skip_only {
            let ic = self.p_flag(Opt::Ignorecase);
            match crate::search::vim_regex(&pat, true, ic) {
                Ok(regex) => cmod.filter = Some(CmdFilter { regex, negated }),
                Err(_) => return Ok(None),
            }
        }
        Ok(Some(next))
    }

    /// Make the modifiers take effect, remembering what they replace.
    pub fn apply_cmdmod(&mut self, cmod: &mut CmdMod) {
        if cmod.flags.contains(CmdModFlags::SANDBOX) && !cmod.did_sandbox {
            self.sandbox += 1;
            cmod.did_sandbox = true;
        }
        if cmod.verbose > 0 {
            if cmod.verbose_save.is_none() {
                cmod.verbose_save = Some(self.p_num(Opt::Verbose));
            }
            self.options
                .set_global(Opt::Verbose, OptVal::Num(cmod.verbose - 1));
        }

        let silence = CmdModFlags::SILENT | CmdModFlags::UNSILENT;
        if cmod.flags.intersects(silence) && cmod.save_msg_silent.is_none() {
            cmod.save_msg_silent = Some(self.msg_silent);
        }
        if cmod.flags.contains(CmdModFlags::SILENT) {
            self.msg_silent += 1;
        }
        if cmod.flags.contains(CmdModFlags::UNSILENT) {
            self.msg_silent = 0;
        }
        if cmod.flags.contains(CmdModFlags::ERRSILENT) {
            self.emsg_silent += 1;
            cmod.did_esilent += 1;
        }

        if cmod.flags.contains(CmdModFlags::NOAUTOCMD) && cmod.save_ei.is_none() {
            cmod.save_ei = Some(self.p_str(Opt::Eventignore));
            self.options
                .set_global(Opt::Eventignore, OptVal::Str("all".to_string()));
        }
        log::trace!(
            "apply modifiers: msg_silent={} emsg_silent={}",
            self.msg_silent,
            self.emsg_silent
        );
    }

    /// Undo [`EditorState::apply_cmdmod`].
    pub fn undo_cmdmod(&mut self, cmod: &mut CmdMod) {
        if let Some(level) = cmod.verbose_save.take() {
            self.options.set_global(Opt::Verbose, OptVal::Num(level));
        }
        if cmod.did_sandbox {
            self.sandbox -= 1;
            cmod.did_sandbox = false;
        }
        if let Some(ei) = cmod.save_ei.take() {
            self.options.set_global(Opt::Eventignore, OptVal::Str(ei));
        }
        cmod.filter = None;

        if let Some(saved) = cmod.save_msg_silent.take() {
            // an error may have enabled messages already
            if !self.exc.did_emsg || self.msg_silent > saved {
                self.msg_silent = saved;
            }
            self.emsg_silent = (self.emsg_silent - cmod.did_esilent).max(0);
            cmod.did_esilent = 0;
        }
        log::trace!(
            "undo modifiers: msg_silent={} emsg_silent={}",
            self.msg_silent,
            self.emsg_silent
        );
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::host::MemHost;
    use test_log::test;

    fn state() -> EditorState {
        EditorState::new(Box::new(MemHost::new()), false)
    }

    fn parse(st: &mut EditorState, line: &str) -> (CmdMod, ModParse) {
        let mut cmod = CmdMod::default();
        let rest = st.parse_command_modifiers(line, &mut cmod, false).unwrap();
        (cmod, rest)
    }

    #[test]
    fn lengths() {
        assert_eq!(modifier_len("sil! echo"), 3);
        assert_eq!(modifier_len("silent echo"), 6);
        assert_eq!(modifier_len("3verbose set"), 8);
        assert_eq!(modifier_len("3silent x"), 0);
        assert_eq!(modifier_len("si x"), 0);
        assert_eq!(modifier_len("echo"), 0);
    }

    #[test]
    fn silent_bang() {
        let mut st = state();
        let (cmod, rest) = parse(&mut st, "  :  silent! echo 1");
        assert!(cmod.flags.contains(CmdModFlags::SILENT | CmdModFlags::ERRSILENT));
        assert_eq!(rest, ModParse::Command("echo 1".into()));

        let (cmod, rest) = parse(&mut st, "silent !ls");
        assert!(!cmod.flags.contains(CmdModFlags::ERRSILENT));
        assert_eq!(rest, ModParse::Command("!ls".into()));
    }

    #[test]
    fn comments_and_empty_lines() {
        let mut st = state();
        assert_eq!(parse(&mut st, "  \" note").1, ModParse::Nothing(None));
        assert_eq!(
            parse(&mut st, "\" note\necho 1").1,
            ModParse::Nothing(Some("echo 1".into()))
        );
        assert_eq!(parse(&mut st, " : ").1, ModParse::Nothing(None));
    }

    #[test]
    fn counts_and_splits() {
        let mut st = state();
        let (cmod, rest) = parse(&mut st, "2verbose topleft vert split");
        assert_eq!(cmod.verbose, 3);
        assert!(cmod.split.contains(SplitFlags::TOP | SplitFlags::VERT));
        assert_eq!(rest, ModParse::Command("split".into()));
        let (cmod, _) = parse(&mut st, "verbose set");
        assert_eq!(cmod.verbose, 2);
        let (cmod, _) = parse(&mut st, "tab split");
        assert_eq!(cmod.tab, 2);
    }

    #[test]
    fn hide_is_a_command_alone() {
        let mut st = state();
        let (cmod, rest) = parse(&mut st, "hide");
        assert!(cmod.flags.is_empty());
        assert_eq!(rest, ModParse::Command("hide".into()));
        let (cmod, _) = parse(&mut st, "hide edit x");
        assert!(cmod.flags.contains(CmdModFlags::HIDE));
    }

    #[test]
    fn visual_range_moves_after_modifiers() {
        let mut st = state();
        let (cmod, rest) = parse(&mut st, "'<,'>silent d");
        assert!(cmod.flags.contains(CmdModFlags::SILENT));
        assert_eq!(rest, ModParse::Command("'<,'>d".into()));
        let (_, rest) = parse(&mut st, "'<,'>d");
        assert_eq!(rest, ModParse::Command("'<,'>d".into()));
    }

    #[test]
    fn filter_pattern() {
        let mut st = state();
        let (cmod, rest) = parse(&mut st, "filter! /foo/ ls");
        let f = cmod.filter.unwrap();
        assert!(f.negated);
        assert!(f.regex.is_match("a foo b"));
        assert_eq!(rest, ModParse::Command("ls".into()));
        let (cmod, _) = parse(&mut st, "filter bar set");
        assert!(cmod.filter.unwrap().regex.is_match("bar"));
        // no command after the pattern
        let (cmod, rest) = parse(&mut st, "filter /x/");
        assert!(cmod.filter.is_none());
        assert_eq!(rest, ModParse::Command("filter /x/".into()));
    }

    #[test]
    fn apply_and_undo_restore() {
        let mut st = state();
        let (mut cmod, _) = parse(&mut st, "silent! sandbox noautocmd 2verbose echo");
        st.apply_cmdmod(&mut cmod);
        assert_eq!((st.msg_silent, st.emsg_silent, st.sandbox), (1, 1, 1));
        assert_eq!(st.p_num(Opt::Verbose), 2);
        assert_eq!(st.p_str(Opt::Eventignore), "all");
        st.undo_cmdmod(&mut cmod);
        assert_eq!((st.msg_silent, st.emsg_silent, st.sandbox), (0, 0, 0));
        assert_eq!(st.p_num(Opt::Verbose), 0);
        assert_eq!(st.p_str(Opt::Eventignore), "");
    }

    #[test]
    fn describe_mods() {
        let mut st = state();
        let (cmod, _) = parse(&mut st, "silent! vertical split");
        assert_eq!(cmod.describe(), "silent! vertical");
        assert!(cmod.has_any(false));
        assert!(cmod.has_any(true));
    }
}

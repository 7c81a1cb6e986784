//
// Copyright (c) 2024 Jeff Garzik
//
// This file is part of the posixutils-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//

//! Execution of one `|`-separated Ex command.
//!
//! [`do_one_cmd`] walks a command line through modifiers, range, name,
//! argument checks and finally the handler. Errors are reported at the
//! end, where an error may turn into an exception.

use bitflags::bitflags;

use crate::address::{self, AddrType};
use crate::charset::{is_white, skipdigits_at, skipwhite_at, skiptowhite_esc};
use crate::cmds::{find_command, Cmd, CmdFlags};
use crate::cond::{CondFlags, CondStack};
use crate::error::{e, invalid, Error, Result};
use crate::except::ThrowValue;
use crate::line_source::{LineSource, SourceKind};
use crate::modifiers::{CmdMod, CmdModFlags, ModParse};
use crate::options::Opt;
use crate::registers::valid_yank_reg;
use crate::runner::RunFlags;
use crate::state::EditorState;
use crate::usercmd::UcmdLookup;

const CTRL_V: u8 = 0x16;

bitflags! {
    /// Print flags after a command: `l`, `#` and `p`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ExFlags: u8 {
        const LIST = 0x01;
        const NR = 0x02;
        const PRINT = 0x04;
    }
}

/// `++bad=` argument of a file command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BadChar {
    Keep,
    Drop,
    Replace(u8),
}

/// Arguments of the command being executed.
///
/// `cmdline` is owned and may be rewritten by file name expansion;
/// `pos` and `arg` are byte offsets into it.
#[derive(Debug, Default)]
pub struct ExArgs {
    pub cmdline: String,
    /// Scan position while parsing the range and the name.
    pub pos: usize,
    /// Start of the argument.
    pub arg: usize,
    /// Text of the next command after a `|` or newline.
    pub nextcmd: Option<String>,
    pub cmd: Cmd,
    /// Index into the user command table for `Cmd::User`.
    pub user_idx: Option<usize>,
    pub argt: CmdFlags,
    pub addr_type: AddrType,
    pub line1: i64,
    pub line2: i64,
    pub addr_count: i32,
    pub forceit: bool,
    pub skip: bool,
    pub regname: Option<char>,
    /// Number of `>` or `<` for the shift commands.
    pub amount: i64,
    pub flags: ExFlags,
    /// `:w >>`
    pub append: bool,
    /// `:w !cmd` or `:r !cmd`
    pub usefilter: bool,
    pub read_edit: bool,
    pub mkdir_p: bool,
    pub force_bin: Option<bool>,
    pub force_ff: Option<String>,
    pub force_enc: Option<String>,
    pub bad_char: Option<BadChar>,
    /// `+cmd` argument of an edit command.
    pub do_ecmd_cmd: Option<String>,
    pub do_ecmd_lnum: i64,
    /// Error a handler reports without failing, shown at the end.
    pub errmsg: Option<String>,
}

impl ExArgs {
    pub fn new(line: &str) -> ExArgs {
        ExArgs {
            cmdline: line.to_string(),
            ..Default::default()
        }
    }

    pub fn arg_str(&self) -> &str {
        &self.cmdline[self.arg.min(self.cmdline.len())..]
    }

    /// Replace the argument text.
    pub fn set_arg(&mut self, text: &str) {
        self.cmdline.truncate(self.arg);
        self.cmdline.push_str(text);
    }

    /// Move the start of the argument `n` bytes forward and skip blanks.
    pub fn advance_arg(&mut self, n: usize) {
        self.arg = skipwhite_at(&self.cmdline, (self.arg + n).min(self.cmdline.len()));
    }

    fn byte_at_arg(&self) -> Option<u8> {
        self.cmdline.as_bytes().get(self.arg).copied()
    }

    fn truncate_at(&mut self, at: usize) {
        self.cmdline.truncate(at);
    }
}

/// State shared with a handler beyond its arguments: the conditional
/// stack of the runner and the source of further lines, used by
/// `:append` and `:function` to read their body.
pub struct CmdCtx<'a> {
    pub cstack: &'a mut CondStack,
    pub source: &'a mut dyn LineSource,
}

/// The command after a `|` or newline that starts `p`, if any.
pub fn check_nextcmd(p: &str) -> Option<String> {
    let s = p.trim_start_matches([' ', '\t']);
    match s.as_bytes().first() {
        Some(b'|') | Some(b'\n') => Some(s[1..].to_string()),
        _ => None,
    }
}

/// Skip over a file command argument up to a blank. With `rembs` the
/// escaping backslashes are dropped. Returns the end in the new text.
fn skip_cmd_arg(text: &mut String, start: usize, rembs: bool) -> usize {
    let mut p = start;
    while let Some(&c) = text.as_bytes().get(p) {
        if is_white(c) {
            break;
        }
        if c == b'\\' && p + 1 < text.len() {
            if rembs {
                text.remove(p);
            } else {
                p += 1;
            }
        }
        p += char_len(text, p);
    }
    p.min(text.len())
}

fn char_len(s: &str, at: usize) -> usize {
    s[at..].chars().next().map_or(1, char::len_utf8)
}

/// Find a `|` or comment in the argument and cut the command there.
pub fn separate_nextcmd(st: &EditorState, ea: &mut ExArgs, keep_backslash: bool) {
    let cpo_bar = st.cpo_has('b');
    let mut p = ea.arg;
    while p < ea.cmdline.len() {
        let b = ea.cmdline.as_bytes();
        let c = b[p];
        if c == CTRL_V {
            if ea.argt.intersects(CmdFlags::CTRLV | CmdFlags::XFILE) && !keep_backslash {
                p += 1;
            } else {
                ea.cmdline.remove(p);
            }
            if p >= ea.cmdline.len() {
                break;
            }
        } else if c == b'`' && b.get(p + 1) == Some(&b'=') && ea.argt.contains(CmdFlags::XFILE) {
            // skip over `=expr`
            match ea.cmdline[p + 2..].find('`') {
                Some(end) => p += end + 2,
                None => break,
            }
        } else if (c == b'"' && !ea.argt.contains(CmdFlags::NOTRLCOM)) || c == b'|' || c == b'\n' {
            let escaped = p > ea.arg && b[p - 1] == b'\\';
            if (!cpo_bar || !ea.argt.contains(CmdFlags::CTRLV)) && escaped {
                if !keep_backslash {
                    ea.cmdline.remove(p - 1);
                    p -= 1;
                }
            } else {
                ea.nextcmd = check_nextcmd(&ea.cmdline[p..]);
                ea.truncate_at(p);
                break;
            }
        }
        p += char_len(&ea.cmdline, p);
    }

    if !ea.argt.contains(CmdFlags::NOTRLCOM) {
        del_trailing_spaces(&mut ea.cmdline, ea.arg);
    }
}

/// Drop trailing blanks of `s[from..]`, keeping an escaped one.
fn del_trailing_spaces(s: &mut String, from: usize) {
    while s.len() > from {
        let b = s.as_bytes();
        let n = b.len();
        if !is_white(b[n - 1]) {
            break;
        }
        if n >= 2 && (b[n - 2] == b'\\' || b[n - 2] == CTRL_V) && (n < 3 || b[n - 3] != b'\\') {
            break;
        }
        s.pop();
    }
}

/// Parse one `++opt=val` argument.
pub fn getargopt(ea: &mut ExArgs) -> Result<()> {
    let bad = || invalid(e::INVARG);
    let start = ea.arg + 2;
    let rest = ea.cmdline[start..].to_string();

    for (prefix, val) in [("nobin", false), ("bin", true)] {
        if let Some(tail) = rest.strip_prefix(prefix) {
            // "bin", "bina", ... "binary"
            let word_len = tail.bytes().take_while(u8::is_ascii_alphabetic).count();
            if !"ary".starts_with(&tail[..word_len]) {
                return Err(bad());
            }
            ea.force_bin = Some(val);
            ea.advance_arg(2 + prefix.len() + word_len);
            return Ok(());
        }
    }
    if rest.starts_with("edit") {
        ea.read_edit = true;
        ea.advance_arg(2 + 4);
        return Ok(());
    }
    if rest.starts_with('p') && !rest.starts_with("pa") {
        ea.mkdir_p = true;
        ea.advance_arg(2 + 1);
        return Ok(());
    }

    #[derive(PartialEq)]
    enum Which {
        Ff,
        Enc,
        Bad,
    }
    let (which, name_len) = if rest.starts_with("fileformat") {
        (Which::Ff, 10)
    } else if rest.starts_with("ff") {
        (Which::Ff, 2)
    } else if rest.starts_with("encoding") {
        (Which::Enc, 8)
    } else if rest.starts_with("enc") {
        (Which::Enc, 3)
    } else if rest.starts_with("bad") {
        (Which::Bad, 3)
    } else {
        return Err(bad());
    };
    if rest.as_bytes().get(name_len) != Some(&b'=') {
        return Err(bad());
    }

    let vstart = start + name_len + 1;
    let vend = skip_cmd_arg(&mut ea.cmdline, vstart, false);
    let value = ea.cmdline[vstart..vend].to_string();
    ea.arg = skipwhite_at(&ea.cmdline, vend);

    match which {
        Which::Ff => {
            if !matches!(value.as_str(), "unix" | "dos" | "mac") {
                return Err(bad());
            }
            ea.force_ff = Some(value);
        }
        Which::Enc => ea.force_enc = Some(value.to_ascii_lowercase()),
        Which::Bad => {
            ea.bad_char = Some(if value.eq_ignore_ascii_case("keep") {
                BadChar::Keep
            } else if value.eq_ignore_ascii_case("drop") {
                BadChar::Drop
            } else if value.len() == 1 {
                BadChar::Replace(value.as_bytes()[0])
            } else {
                return Err(bad());
            });
        }
    }
    Ok(())
}

/// Take a `+cmd` argument. A lone `+` means `$`.
pub fn getargcmd(ea: &mut ExArgs) -> Option<String> {
    if ea.byte_at_arg() != Some(b'+') {
        return None;
    }
    let start = ea.arg + 1;
    let command = match ea.cmdline.as_bytes().get(start) {
        None | Some(b' ') | Some(b'\t') => {
            ea.arg = skipwhite_at(&ea.cmdline, start);
            return Some("$".to_string());
        }
        Some(_) => {
            let end = skip_cmd_arg(&mut ea.cmdline, start, true);
            let command = ea.cmdline[start..end].to_string();
            ea.arg = skipwhite_at(&ea.cmdline, end);
            command
        }
    };
    Some(command)
}

/// Collect the `l`, `p` and `#` flags at the argument.
pub fn get_flags(ea: &mut ExArgs) {
    loop {
        let flag = match ea.byte_at_arg() {
            Some(b'l') => ExFlags::LIST,
            Some(b'p') => ExFlags::PRINT,
            Some(b'#') => ExFlags::NR,
            _ => break,
        };
        ea.flags |= flag;
        ea.advance_arg(1);
    }
}

/// Append `: cmd` to an error message, showing a no-break space so it
/// can be told apart from a normal one.
pub fn append_command(msg: &str, cmd: &str) -> String {
    let mut out = String::with_capacity(msg.len() + cmd.len() + 2);
    out.push_str(msg);
    out.push_str(": ");
    for c in cmd.chars() {
        if c == '\u{a0}' {
            out.push_str("<a0>");
        } else {
            out.push(c);
        }
    }
    out
}

/// Name of a user command at `at`: letters and digits.
fn user_cmd_name(line: &str, at: usize) -> &str {
    let b = line.as_bytes();
    let mut p = at;
    while b.get(p).is_some_and(u8::is_ascii_alphanumeric) {
        p += 1;
    }
    &line[at..p]
}

/// Look up the command at `ea.pos`. Sets the command, its flags and
/// address type; returns the end of the name.
fn find_ex_command(st: &EditorState, ea: &mut ExArgs) -> Result<usize> {
    let vim9 = st.cmdmod.flags.contains(CmdModFlags::VIM9CMD);
    let (cmd, end, flag) = find_command(&ea.cmdline, ea.pos, vim9);
    ea.cmd = cmd;
    ea.user_idx = None;
    match flag {
        Some('l') => ea.flags |= ExFlags::LIST,
        Some('p') => ea.flags |= ExFlags::PRINT,
        _ => {}
    }
    if let Some(info) = cmd.info() {
        ea.argt = info.argt;
        ea.addr_type = info.addr_type;
        if cmd == Cmd::Wincmd {
            ea.addr_type = wincmd_addr_type(&ea.cmdline[end..]);
        }
        return Ok(end);
    }

    let name = user_cmd_name(&ea.cmdline, ea.pos);
    if name.as_bytes().first().is_some_and(u8::is_ascii_uppercase) {
        match st.user_cmds.find(name, st.curbuf_fnum()) {
            UcmdLookup::Found(idx) => {
                let uc = &st.user_cmds.cmds[idx];
                ea.cmd = Cmd::User;
                ea.user_idx = Some(idx);
                ea.argt = uc.argt;
                ea.addr_type = uc.addr_type;
            }
            UcmdLookup::Ambiguous => return Err(invalid(e::AMBIGUOUS)),
            UcmdLookup::NotFound => {}
        }
    }
    Ok(ea.pos + name.len())
}

/// `:wincmd` counts windows or tab pages depending on its argument.
fn wincmd_addr_type(arg: &str) -> AddrType {
    match arg.trim_start().bytes().next() {
        Some(b'S' | b's' | b'v' | b'n' | b'N' | b'o' | b'q' | b'c' | b'w' | b'W' | b'p'
        | b't' | b'b' | b'x') => AddrType::Windows,
        Some(b'g' | b'T') => AddrType::Tabs,
        _ => AddrType::Other,
    }
}

/// Execute one command of a line and return the text after its `|`.
///
/// Errors are reported here: an error message may get the command
/// appended, and may be converted to an exception when inside `:try`.
pub fn do_one_cmd(
    st: &mut EditorState,
    cmdline: String,
    flags: RunFlags,
    ctx: &mut CmdCtx,
) -> Option<String> {
    st.ex_nesting_level += 1;
    let sourcing = ctx.source.kind() != SourceKind::Interactive;
    let saved_cmdmod = Box::new(std::mem::take(&mut st.cmdmod));
    let mut ea = Box::new(ExArgs::new(&cmdline));

    let result = if cmdline.starts_with("#!") {
        Ok(())
    } else {
        parse_and_execute(st, &mut ea, flags, sourcing, ctx)
    };

    // doend
    if st.curwin().cursor.lnum == 0 {
        st.set_cursor_line(1);
    }
    if let Err(err) = result {
        report_error(st, &cmdline, err, flags, ctx);
    }
    if let Some(msg) = ea.errmsg.take() {
        if !st.exc.did_emsg {
            st.emsg(&msg);
        }
    }

    let cmdname = ea.cmd.is_builtin().then(|| ea.cmd.name());
    st.do_errthrow(Some(&mut *ctx.cstack), cmdname);

    let mut cmod = std::mem::replace(&mut st.cmdmod, *saved_cmdmod);
    st.undo_cmdmod(&mut cmod);

    st.ex_nesting_level -= 1;
    ea.nextcmd.filter(|s| !s.is_empty())
}

/// Route an error out of the parse or the handler to where it belongs.
fn report_error(st: &mut EditorState, cmdline: &str, err: Error, flags: RunFlags, ctx: &mut CmdCtx) {
    match err {
        Error::UserThrow(value) => {
            if st.throw_exception(ThrowValue::User(value), None) {
                st.do_throw(ctx.cstack);
            }
        }
        Error::Interrupt => st.exc.got_int = true,
        Error::Exit(code) => {
            log::debug!("exit requested with code {code}");
            st.exiting = Some(code);
        }
        Error::Aborted => {}
        Error::Fatal(msg) => {
            st.iemsg(&msg);
            st.exc.force_abort = true;
        }
        Error::Parse(msg) | Error::Validation(msg) => {
            if msg.is_empty() || st.exc.did_emsg {
                return;
            }
            if flags.contains(RunFlags::VERBOSE) {
                st.emsg(&append_command(&msg, cmdline));
            } else {
                st.emsg(&msg);
            }
        }
        other => {
            st.emsg(&other.message());
        }
    }
}

fn parse_and_execute(
    st: &mut EditorState,
    ea: &mut ExArgs,
    flags: RunFlags,
    sourcing: bool,
    ctx: &mut CmdCtx,
) -> Result<()> {
    // 1. and 2. comments, blanks, colons and modifiers
    let mut cmod = Box::<CmdMod>::default();
    let text = match st.parse_command_modifiers(&ea.cmdline.clone(), &mut cmod, false)? {
        ModParse::Command(text) => text,
        ModParse::Nothing(next) => {
            ea.nextcmd = next;
            st.cmdmod = *cmod;
            return Ok(());
        }
    };
    st.apply_cmdmod(&mut cmod);
    let silence = CmdModFlags::SILENT | CmdModFlags::ERRSILENT | CmdModFlags::UNSILENT;
    if cmod.flags.intersects(silence) {
        // ":silent! cmd | cmd" silences both
        st.sticky_cmdmod = cmod.flags & silence;
    }
    st.cmdmod = *cmod;
    let after_modifier = text.clone();
    ea.cmdline = text;

    ea.skip = st.exc.did_emsg
        || st.exc.got_int
        || st.exc.did_throw
        || ctx
            .cstack
            .top_opt()
            .is_some_and(|f| !f.flags.contains(CondFlags::ACTIVE));

    // stop at a breakpoint, or when single-stepping
    crate::debug::dbg_check_breakpoint(st, ea);
    if !ea.skip && st.exc.got_int {
        ea.skip = true;
        st.do_intthrow(ctx.cstack);
    }

    // 3. find the command to know what kind of range it takes
    let cpo_star = st.cpo_has('*');
    ea.pos = address::skip_range(&ea.cmdline, 0, true, cpo_star);
    ea.pos = skipwhite_at(&ea.cmdline, ea.pos);
    let saved = ea.pos;
    let _ = find_ex_command(st, ea);
    ea.pos = 0;

    // 4. parse the range
    address::parse_cmd_range(st, ea, false)?;
    if ea.pos != saved {
        log::trace!("range ended at {} instead of {}", ea.pos, saved);
    }

    // 5. the command name
    while let Some(b' ' | b'\t' | b':') = ea.cmdline.as_bytes().get(ea.pos) {
        ea.pos += 1;
    }
    let rest = &ea.cmdline[ea.pos..];
    if rest.is_empty() || rest.starts_with('"') {
        if ea.skip {
            return Ok(());
        }
        return ex_range_without_command(st, ea, false);
    }
    if let Some(next) = check_nextcmd(rest) {
        ea.nextcmd = Some(next);
        if ea.skip {
            return Ok(());
        }
        return ex_range_without_command(st, ea, true);
    }

    let mut p = find_ex_command(st, ea)?;

    if ea.cmd == Cmd::None && !ea.skip && !st.cmd_undefined_busy {
        let name = user_cmd_name(&ea.cmdline, ea.pos).to_string();
        if name.as_bytes().first().is_some_and(u8::is_ascii_uppercase)
            && st.autocmds.has_event(crate::autocmd::Event::CmdUndefined)
        {
            st.cmd_undefined_busy = true;
            let did = crate::autocmd::apply_autocmds(
                st,
                crate::autocmd::Event::CmdUndefined,
                &name,
                None,
            );
            st.cmd_undefined_busy = false;
            if did && !st.aborting() {
                p = find_ex_command(st, ea)?;
            }
        }
    }

    if ea.cmd == Cmd::None {
        if ea.skip {
            return Ok(());
        }
        st.exc.did_emsg_syntax = true;
        let err = if flags.contains(RunFlags::VERBOSE) {
            e::NOTEDITORCMD.to_string()
        } else {
            append_command(e::NOTEDITORCMD, &after_modifier)
        };
        return Err(Error::Parse(err));
    }

    // forced commands
    let b = ea.cmdline.as_bytes();
    if b.get(p) == Some(&b'!') && ea.cmd != Cmd::Substitute {
        p += 1;
        ea.forceit = true;
    }

    // 6. check the range and the bang, parse the arguments
    if !ea.skip {
        if st.sandbox != 0 && !ea.argt.contains(CmdFlags::SBOXOK) {
            return Err(invalid(e::SANDBOX));
        }
        if st.secure != 0 && ea.argt.contains(CmdFlags::RESTRICT) {
            return Err(invalid(e::NOT_ALLOWED_HERE));
        }
        if !st.p_flag(Opt::Modifiable) && ea.argt.contains(CmdFlags::MODIFY) {
            return Err(invalid(e::MODIFIABLE));
        }
        if !ea.argt.contains(CmdFlags::RANGE) && ea.addr_count > 0 {
            return Err(invalid(e::NORANGE));
        }
    }
    if !ea.argt.contains(CmdFlags::BANG) && ea.forceit {
        return Err(invalid(e::NOBANG));
    }

    if !ea.skip && ea.argt.contains(CmdFlags::RANGE) {
        if st.global_busy == 0 && ea.line1 > ea.line2 {
            if st.msg_silent == 0 {
                if sourcing {
                    return Err(invalid(e::BACKWARDS));
                }
                if !st.host.ask_yesno("Backwards range given, OK to swap") {
                    return Ok(());
                }
            }
            std::mem::swap(&mut ea.line1, &mut ea.line2);
        }
        if let Some(msg) = address::invalid_range(st, ea) {
            return Err(invalid(msg));
        }
    }
    if ea.addr_type == AddrType::Other && ea.addr_count == 0 {
        // default is 1, not the cursor
        ea.line2 = 1;
    }
    address::correct_range(ea);

    ea.arg = if ea.cmd == Cmd::Bang {
        p
    } else {
        skipwhite_at(&ea.cmdline, p)
    };

    if ea.argt.contains(CmdFlags::ARGOPT) {
        while ea.arg_str().starts_with("++") {
            getargopt(ea)?;
        }
    }

    if matches!(ea.cmd, Cmd::Write | Cmd::Update) {
        if ea.byte_at_arg() == Some(b'>') {
            if ea.cmdline.as_bytes().get(ea.arg + 1) != Some(&b'>') {
                return Err(invalid(e::USE_W));
            }
            ea.advance_arg(2);
            ea.append = true;
        } else if ea.byte_at_arg() == Some(b'!') && ea.cmd == Cmd::Write {
            ea.arg += 1;
            ea.usefilter = true;
        }
    }

    if ea.cmd == Cmd::Read {
        if ea.forceit {
            ea.usefilter = true;
            ea.forceit = false;
        } else if ea.byte_at_arg() == Some(b'!') {
            ea.arg += 1;
            ea.usefilter = true;
        }
    }

    if matches!(ea.cmd, Cmd::Lshift | Cmd::Rshift) {
        let c = ea.cmdline.as_bytes()[ea.pos];
        ea.amount = 1;
        while ea.byte_at_arg() == Some(c) {
            ea.arg += 1;
            ea.amount += 1;
        }
        ea.advance_arg(0);
    }

    if ea.argt.contains(CmdFlags::CMDARG) && !ea.usefilter {
        ea.do_ecmd_cmd = getargcmd(ea);
    }

    if ea.argt.contains(CmdFlags::TRLBAR) && !ea.usefilter {
        separate_nextcmd(st, ea, false);
    } else if matches!(ea.cmd, Cmd::Bang | Cmd::Global | Cmd::Vglobal) || ea.usefilter {
        // a newline ends a shell command; a backslash before it is dropped
        let mut i = ea.arg;
        while i < ea.cmdline.len() {
            let b = ea.cmdline.as_bytes();
            if b[i] == b'\\' && b.get(i + 1) == Some(&b'\n') {
                ea.cmdline.remove(i);
            } else if b[i] == b'\n' && !ea.argt.contains(CmdFlags::EXPR_ARG) {
                ea.nextcmd = Some(ea.cmdline[i + 1..].to_string());
                ea.truncate_at(i);
                break;
            }
            i += 1;
        }
    }

    if ea.argt.contains(CmdFlags::DFLALL) && ea.addr_count == 0 {
        address::address_default_all(st, ea)?;
    }

    // a register name; not a digit when a count is allowed (:put)
    if ea.argt.contains(CmdFlags::REGSTR) {
        if let Some(c) = ea.arg_str().chars().next() {
            let user = ea.cmd == Cmd::User;
            let count_digit = ea.argt.contains(CmdFlags::COUNT) && c.is_ascii_digit();
            if !(user && c == '=') && !count_digit && valid_yank_reg(c, ea.cmd != Cmd::Put && !user) {
                ea.regname = Some(c);
                ea.arg += c.len_utf8();
                if c == '=' && ea.byte_at_arg().is_some() {
                    // the rest of the line is an expression
                    if !ea.skip {
                        let expr = ea.arg_str().to_string();
                        crate::eval::set_expr_line(st, &expr);
                        st.exc.did_emsg = false;
                    }
                    ea.arg = ea.cmdline.len();
                }
                ea.advance_arg(0);
            }
        }
    }

    // a count; "123foo" is a buffer name for a command taking one
    if ea.argt.contains(CmdFlags::COUNT) && ea.byte_at_arg().is_some_and(|c| c.is_ascii_digit()) {
        let end = skipdigits_at(&ea.cmdline, ea.arg);
        let bufname_ok = !ea.argt.contains(CmdFlags::BUFNAME)
            || ea.cmdline.as_bytes().get(end).map_or(true, |&c| is_white(c));
        if bufname_ok {
            let n: i64 = ea.cmdline[ea.arg..end].parse().unwrap_or(i64::MAX);
            ea.arg = skipwhite_at(&ea.cmdline, end);
            if n <= 0 && !ea.argt.contains(CmdFlags::ZEROR) {
                return Err(invalid(e::POSCOUNT));
            }
            if ea.addr_type != AddrType::Lines {
                ea.line2 = n;
                if ea.addr_count == 0 {
                    ea.addr_count = 1;
                }
            } else {
                ea.line1 = ea.line2;
                if ea.line2 >= i64::MAX - (n - 1) {
                    return Err(invalid("E1510: Value too large"));
                }
                ea.line2 += n - 1;
                ea.addr_count += 1;
                // no error for a count past the end
                ea.line2 = ea.line2.min(st.line_count());
            }
        }
    }

    if ea.argt.contains(CmdFlags::FLAGS) {
        get_flags(ea);
    }
    if !ea.argt.contains(CmdFlags::EXTRA) {
        match ea.byte_at_arg() {
            None | Some(b'"') => {}
            Some(b'|') if ea.argt.contains(CmdFlags::TRLBAR) => {}
            Some(_) => {
                return Err(invalid(format!("{}: {}", e::TRAILING, ea.arg_str())));
            }
        }
    }
    if ea.argt.contains(CmdFlags::NEEDARG) && ea.byte_at_arg().is_none() {
        return Err(invalid(e::ARGREQ));
    }

    // commands tracking the nesting run even when skipped
    if ea.skip && !ea.cmd.runs_when_skipped() {
        return Ok(());
    }

    // 7. execute
    if ea.argt.contains(CmdFlags::XFILE) {
        crate::filename::expand_filename(st, ea)?;
    }

    if ea.argt.contains(CmdFlags::BUFNAME)
        && ea.byte_at_arg().is_some()
        && ea.addr_count == 0
        && ea.cmd != Cmd::User
    {
        let end = if matches!(ea.cmd, Cmd::Bdelete | Cmd::Bwipeout) {
            skiptowhite_esc(&ea.cmdline, ea.arg)
        } else {
            ea.cmdline.trim_end_matches([' ', '\t']).len().max(ea.arg)
        };
        let pat = ea.cmdline[ea.arg..end].to_string();
        let unlisted = ea.argt.contains(CmdFlags::BUFUNL);
        ea.line2 = crate::ex::window::buflist_findpat(st, &pat, unlisted)? as i64;
        ea.addr_count = 1;
        ea.arg = skipwhite_at(&ea.cmdline, end);
    }

    if ea.cmd == Cmd::Try {
        // ":silent! try" only keeps errors quiet for the :try itself
        let n = st.cmdmod.take_esilent();
        if n > 0 {
            st.emsg_silent = (st.emsg_silent - n).max(0);
        }
    }

    log::trace!("execute {:?} {}-{} {:?}", ea.cmd, ea.line1, ea.line2, ea.arg_str());
    let result = if ea.cmd == Cmd::User {
        crate::usercmd::do_ucmd(st, ea, ctx)
    } else {
        match ea.cmd.info() {
            Some(info) => (info.func)(st, ea, ctx),
            None => Err(Error::Fatal(format!("no handler for {:?}", ea.cmd))),
        }
    };

    // a nested runner left an exception, a :return or a :finish for the
    // conditionals of this one
    if st.exc.need_rethrow {
        st.do_throw(ctx.cstack);
    } else if st.check_cstack {
        if ctx.source.finished(st) {
            crate::ex::source::do_finish(st, ctx, true);
        } else if ctx.source.kind() == SourceKind::Function
            && crate::userfunc::current_func_returned(st)
        {
            crate::userfunc::do_return(st, ctx, true, false, None);
        }
    }
    st.exc.need_rethrow = false;
    st.check_cstack = false;

    result
}

/// `:3` goes to line 3; `:3|` and `:|` print the line.
fn ex_range_without_command(st: &mut EditorState, ea: &mut ExArgs, bar: bool) -> Result<()> {
    if bar {
        ea.cmd = Cmd::Print;
        ea.argt = CmdFlags::RANGE | CmdFlags::COUNT | CmdFlags::TRLBAR;
        if let Some(msg) = address::invalid_range(st, ea) {
            return Err(invalid(msg));
        }
        address::correct_range(ea);
        ea.arg = ea.cmdline.len();
        return crate::ex::edit::print_lines(st, ea);
    }
    if ea.addr_count != 0 {
        if ea.line2 > st.line_count() {
            // with '-' in 'cpoptions' a line past the end is an error
            ea.line2 = if st.cpo_has('-') { -1 } else { st.line_count() };
        }
        if ea.line2 < 0 {
            return Err(invalid(e::INVRANGE));
        }
        st.cursor_to_line_start(ea.line2.max(1));
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use test_log::test;

    #[test]
    fn nextcmd() {
        assert_eq!(check_nextcmd("  | echo"), Some(" echo".to_string()));
        assert_eq!(check_nextcmd("\nlet x"), Some("let x".to_string()));
        assert_eq!(check_nextcmd(" x | y"), None);
    }

    #[test]
    fn append_command_marks_nbsp() {
        assert_eq!(append_command("E492: Not an editor command", "foo"),
            "E492: Not an editor command: foo");
        assert_eq!(append_command("E1", "a\u{a0}b"), "E1: a<a0>b");
    }

    #[test]
    fn trailing_spaces() {
        let mut s = "edit foo  ".to_string();
        del_trailing_spaces(&mut s, 5);
        assert_eq!(s, "edit foo");
        let mut s = "edit foo\\ ".to_string();
        del_trailing_spaces(&mut s, 5);
        assert_eq!(s, "edit foo\\ ");
    }

    #[test]
    fn argopt() {
        let mut ea = ExArgs::new("++ff=dos ++enc=UTF-8 ++bad=keep ++bin file");
        while ea.arg_str().starts_with("++") {
            getargopt(&mut ea).unwrap();
        }
        assert_eq!(ea.force_ff.as_deref(), Some("dos"));
        assert_eq!(ea.force_enc.as_deref(), Some("utf-8"));
        assert_eq!(ea.bad_char, Some(BadChar::Keep));
        assert_eq!(ea.force_bin, Some(true));
        assert_eq!(ea.arg_str(), "file");

        let mut ea = ExArgs::new("++ff=amiga x");
        assert!(getargopt(&mut ea).is_err());
        let mut ea = ExArgs::new("++binx x");
        assert!(getargopt(&mut ea).is_err());
    }

    #[test]
    fn argcmd() {
        let mut ea = ExArgs::new("+/foo\\ bar file");
        assert_eq!(getargcmd(&mut ea).as_deref(), Some("/foo bar"));
        assert_eq!(ea.arg_str(), "file");

        let mut ea = ExArgs::new("+ file");
        assert_eq!(getargcmd(&mut ea).as_deref(), Some("$"));
        assert_eq!(ea.arg_str(), "file");

        let mut ea = ExArgs::new("file");
        assert_eq!(getargcmd(&mut ea), None);
    }

    #[test]
    fn flags() {
        let mut ea = ExArgs::new("l # p x");
        get_flags(&mut ea);
        assert_eq!(ea.flags, ExFlags::LIST | ExFlags::NR | ExFlags::PRINT);
        assert_eq!(ea.arg_str(), "x");
    }
}

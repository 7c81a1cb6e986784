//
// Copyright (c) 2024 Jeff Garzik
//
// This file is part of the posixutils-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//

//! User defined commands: `:command`, `:delcommand`, `:comclear` and the
//! expansion of `<args>` and friends when one is executed.

use crate::address::AddrType;
use crate::cmds::CmdFlags;
use crate::docmd::{CmdCtx, ExArgs};
use crate::error::{e, invalid, runtime, Result};
use crate::runner::{do_cmdline, RunFlags};
use crate::state::EditorState;

/// Values accepted by `-complete=`.
const COMPLETIONS: &[&str] = &[
    "arglist", "augroup", "buffer", "color", "command", "compiler", "dir", "environment",
    "event", "expression", "file", "file_in_path", "filetype", "function", "help",
    "highlight", "history", "keymap", "locale", "mapping", "menu", "messages", "option",
    "packadd", "runtime", "scriptnames", "shellcmd", "sign", "syntax", "tag",
    "tag_listfiles", "user", "var",
];

#[derive(Debug, Clone)]
pub struct UserCmd {
    pub name: String,
    pub rep: String,
    pub argt: CmdFlags,
    pub addr_type: AddrType,
    /// `-nargs` as given: one of `0 1 * ? +`.
    pub nargs: char,
    /// Default of `-range=N` or `-count=N`, -1 when none.
    pub def: i64,
    pub complete: Option<String>,
    /// Buffer of a `-buffer` command.
    pub buffer: Option<usize>,
    pub sid: usize,
}

pub enum UcmdLookup {
    Found(usize),
    Ambiguous,
    NotFound,
}

#[derive(Debug, Default)]
pub struct UserCmds {
    /// Sorted by name; a buffer-local command sorts before a global one of
    /// the same name.
    pub cmds: Vec<UserCmd>,
}

impl UserCmds {
    fn visible(uc: &UserCmd, buf: usize) -> bool {
        uc.buffer.map_or(true, |b| b == buf)
    }

    /// Find a command by its full name or an unambiguous prefix. A
    /// buffer-local command wins over a global one.
    pub fn find(&self, name: &str, buf: usize) -> UcmdLookup {
        if name.is_empty() {
            return UcmdLookup::NotFound;
        }
        let visible = || {
            self.cmds
                .iter()
                .enumerate()
                .filter(|(_, uc)| Self::visible(uc, buf))
        };
        if let Some((i, _)) = visible().find(|(_, uc)| uc.name == name) {
            return UcmdLookup::Found(i);
        }
        let mut found: Option<(usize, &str)> = None;
        for (i, uc) in visible().filter(|(_, uc)| uc.name.starts_with(name)) {
            match found {
                Some((_, prev)) if prev != uc.name => return UcmdLookup::Ambiguous,
                Some(_) => {}
                None => found = Some((i, uc.name.as_str())),
            }
        }
        match found {
            Some((i, _)) => UcmdLookup::Found(i),
            None => UcmdLookup::NotFound,
        }
    }

    fn position(&self, name: &str, buffer: Option<usize>) -> Option<usize> {
        self.cmds
            .iter()
            .position(|uc| uc.name == name && uc.buffer == buffer)
    }

    fn add(&mut self, uc: UserCmd) {
        let at = self
            .cmds
            .iter()
            .position(|c| (c.name.as_str(), c.buffer.is_none()) > (uc.name.as_str(), uc.buffer.is_none()))
            .unwrap_or(self.cmds.len());
        self.cmds.insert(at, uc);
    }

    /// Drop the buffer-local commands of a wiped buffer.
    pub fn drop_buffer(&mut self, buf: usize) {
        self.cmds.retain(|uc| uc.buffer != Some(buf));
    }
}

/// Attributes collected from the `-xxx` arguments.
struct Attrs {
    argt: CmdFlags,
    nargs: char,
    def: i64,
    complete: Option<String>,
    addr_type: Option<AddrType>,
    buffer: bool,
    keepscript: bool,
}

fn attr_error(msg: &str, attr: &str) -> crate::error::Error {
    invalid(format!("{msg}: {attr}"))
}

fn parse_attr(attr: &str, a: &mut Attrs) -> Result<()> {
    let (key, val) = match attr.split_once('=') {
        Some((k, v)) => (k, Some(v)),
        None => (attr, None),
    };
    let key = key.to_ascii_lowercase();
    match (key.as_str(), val) {
        ("bang", None) => a.argt |= CmdFlags::BANG,
        ("buffer", None) => a.buffer = true,
        ("register", None) => a.argt |= CmdFlags::REGSTR,
        ("bar", None) => a.argt |= CmdFlags::TRLBAR,
        ("keepscript", None) => a.keepscript = true,
        ("nargs", Some(v)) => {
            a.nargs = match v {
                "0" => '0',
                "1" => {
                    a.argt |= CmdFlags::EXTRA | CmdFlags::NOSPC | CmdFlags::NEEDARG;
                    '1'
                }
                "*" => {
                    a.argt |= CmdFlags::EXTRA;
                    '*'
                }
                "?" => {
                    a.argt |= CmdFlags::EXTRA | CmdFlags::NOSPC;
                    '?'
                }
                "+" => {
                    a.argt |= CmdFlags::EXTRA | CmdFlags::NEEDARG;
                    '+'
                }
                _ => return Err(invalid(e::INVALID_NARGS)),
            }
        }
        ("range", v) => {
            a.argt |= CmdFlags::RANGE;
            match v {
                Some("%") => a.argt |= CmdFlags::DFLALL,
                Some(n) => {
                    if a.def >= 0 {
                        return Err(invalid("E177: Count cannot be specified twice"));
                    }
                    a.def = n
                        .parse()
                        .map_err(|_| attr_error("E178: Invalid default value for count", n))?;
                    a.argt |= CmdFlags::ZEROR;
                }
                None => {}
            }
            a.addr_type.get_or_insert(AddrType::Lines);
        }
        ("count", v) => {
            a.argt |= CmdFlags::COUNT | CmdFlags::ZEROR | CmdFlags::RANGE;
            a.addr_type.get_or_insert(AddrType::Other);
            if let Some(n) = v {
                if a.def >= 0 {
                    return Err(invalid("E177: Count cannot be specified twice"));
                }
                a.def = n
                    .parse()
                    .map_err(|_| attr_error("E178: Invalid default value for count", n))?;
            }
            a.def = a.def.max(0);
        }
        ("complete", Some(v)) => {
            let kind = v.split(',').next().unwrap_or(v);
            let ok = COMPLETIONS.contains(&kind)
                || (matches!(kind, "custom" | "customlist") && v.contains(','));
            if !ok {
                return Err(attr_error("E180: Invalid complete value", v));
            }
            a.complete = Some(v.to_string());
        }
        ("complete", None) => return Err(invalid("E179: Argument required for -complete")),
        ("addr", Some(v)) => {
            let t = AddrType::from_name(v)
                .ok_or_else(|| attr_error(e::INVALID_ADDR_TYPE, v))?;
            a.addr_type = Some(t);
            if t != AddrType::Lines {
                a.argt |= CmdFlags::ZEROR;
            }
        }
        ("addr", None) => return Err(invalid("E179: Argument required for -addr")),
        _ => return Err(attr_error(e::INVALID_ATTR, attr)),
    }
    Ok(())
}

fn list_commands(st: &mut EditorState, prefix: &str) {
    let buf = st.curbuf_fnum();
    let rows: Vec<String> = st
        .user_cmds
        .cmds
        .iter()
        .filter(|uc| UserCmds::visible(uc, buf) && uc.name.starts_with(prefix))
        .map(|uc| {
            let mut flags = String::new();
            flags.push(if uc.argt.contains(CmdFlags::BANG) { '!' } else { ' ' });
            flags.push(if uc.argt.contains(CmdFlags::REGSTR) { '"' } else { ' ' });
            flags.push(if uc.buffer.is_some() { 'b' } else { ' ' });
            flags.push(if uc.argt.contains(CmdFlags::TRLBAR) { '|' } else { ' ' });
            let range = if uc.argt.contains(CmdFlags::COUNT) {
                format!("{}c", uc.def.max(0))
            } else if uc.argt.contains(CmdFlags::DFLALL) {
                "%".to_string()
            } else if uc.def >= 0 {
                uc.def.to_string()
            } else if uc.argt.contains(CmdFlags::RANGE) {
                ".".to_string()
            } else {
                String::new()
            };
            let addr = if uc.argt.intersects(CmdFlags::RANGE | CmdFlags::COUNT)
                && uc.addr_type != AddrType::Lines
            {
                uc.addr_type.name()
            } else {
                ""
            };
            format!(
                "{flags}{:<17} {:<4} {:<7} {:<11} {}",
                uc.name,
                uc.nargs,
                format!("{range}{addr}"),
                uc.complete.as_deref().unwrap_or(""),
                uc.rep
            )
        })
        .collect();
    if rows.is_empty() {
        st.msg("No user-defined commands found");
        return;
    }
    st.msg("    Name              Args Address Complete    Definition");
    for row in rows {
        st.msg_list_line(row.trim_end());
    }
}

/// `:command[!] [-attr]... Name replacement`
pub fn ex_command(st: &mut EditorState, ea: &mut ExArgs, _ctx: &mut CmdCtx) -> Result<()> {
    let text = ea.arg_str().to_string();
    let mut attrs = Attrs {
        argt: CmdFlags::empty(),
        nargs: '0',
        def: -1,
        complete: None,
        addr_type: None,
        buffer: false,
        keepscript: false,
    };

    let mut rest = text.as_str();
    while let Some(attr) = rest.strip_prefix('-') {
        let end = attr.find([' ', '\t']).unwrap_or(attr.len());
        parse_attr(&attr[..end], &mut attrs)?;
        rest = attr[end..].trim_start();
    }

    let name_end = rest
        .find(|c: char| !c.is_ascii_alphanumeric())
        .unwrap_or(rest.len());
    let name = &rest[..name_end];
    let rep = rest[name_end..].trim_start();

    if name.is_empty() && rest.is_empty() {
        if !ea.skip {
            list_commands(st, "");
        }
        return Ok(());
    }
    if name.is_empty() || (!rest[name_end..].is_empty() && !rest[name_end..].starts_with([' ', '\t'])) {
        return Err(invalid(format!("E182: Invalid command name: {rest}")));
    }
    if rep.is_empty() {
        if !ea.skip {
            list_commands(st, name);
        }
        return Ok(());
    }
    if !name.starts_with(|c: char| c.is_ascii_uppercase()) {
        return Err(invalid(e::CMD_UPPERCASE));
    }
    if matches!(name, "X" | "Next") {
        return Err(invalid("E841: Reserved name, cannot be used for user defined command"));
    }
    if attrs.def >= 0 && !attrs.argt.intersects(CmdFlags::RANGE | CmdFlags::COUNT) {
        return Err(invalid(e::INVALID_ATTR));
    }
    if ea.skip {
        return Ok(());
    }

    let buffer = attrs.buffer.then(|| st.curbuf_fnum());
    if let Some(i) = st.user_cmds.position(name, buffer) {
        if !ea.forceit {
            return Err(runtime(format!("{}: {name}", e::CMD_EXISTS)));
        }
        st.user_cmds.cmds.remove(i);
    }
    let sid = if attrs.keepscript { 0 } else { st.current_sid() };
    log::debug!("define user command {name}: {rep}");
    st.user_cmds.add(UserCmd {
        name: name.to_string(),
        rep: rep.to_string(),
        argt: attrs.argt,
        addr_type: attrs.addr_type.unwrap_or(AddrType::Lines),
        nargs: attrs.nargs,
        def: attrs.def,
        complete: attrs.complete,
        buffer,
        sid,
    });
    Ok(())
}

/// `:delcommand [-buffer] Name`
pub fn ex_delcommand(st: &mut EditorState, ea: &mut ExArgs, _ctx: &mut CmdCtx) -> Result<()> {
    let mut arg = ea.arg_str().trim().to_string();
    let mut buffer = None;
    if let Some(rest) = arg.strip_prefix("-buffer") {
        buffer = Some(st.curbuf_fnum());
        arg = rest.trim_start().to_string();
    }
    match st.user_cmds.position(&arg, buffer) {
        Some(i) => {
            st.user_cmds.cmds.remove(i);
            Ok(())
        }
        None if buffer.is_none() && st.user_cmds.position(&arg, Some(st.curbuf_fnum())).is_some() => {
            Err(runtime(format!("E1237: No such user-defined command in current buffer: {arg}")))
        }
        None => Err(runtime(format!("{}: {arg}", e::NO_SUCH_CMD))),
    }
}

/// `:comclear`: all global and buffer-local user commands.
pub fn ex_comclear(st: &mut EditorState, _ea: &mut ExArgs, _ctx: &mut CmdCtx) -> Result<()> {
    st.user_cmds.cmds.clear();
    Ok(())
}

/// Quote a string for `<q-args>`.
fn quote_arg(arg: &str) -> String {
    let mut out = String::with_capacity(arg.len() + 2);
    out.push('"');
    for c in arg.chars() {
        if c == '\\' || c == '"' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

/// Split for `<f-args>`: at blanks, with `\ ` a blank inside an argument
/// and `\\` a backslash. Each argument becomes a quoted string.
fn split_args(arg: &str) -> String {
    let mut args: Vec<String> = Vec::new();
    let mut cur = String::new();
    let mut chars = arg.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' if matches!(chars.peek(), Some(' ') | Some('\t') | Some('\\')) => {
                let next = chars.next().unwrap_or('\\');
                if next == '\\' {
                    cur.push_str("\\\\");
                } else {
                    cur.push(next);
                }
            }
            '\\' => cur.push_str("\\\\"),
            '"' => cur.push_str("\\\""),
            ' ' | '\t' => {
                if !cur.is_empty() {
                    args.push(std::mem::take(&mut cur));
                }
            }
            c => cur.push(c),
        }
    }
    if !cur.is_empty() {
        args.push(cur);
    }
    args.iter()
        .map(|a| format!("\"{a}\""))
        .collect::<Vec<_>>()
        .join(",")
}

/// Expansion of one `<code>`, `None` when it is not one.
fn expand_code(st: &EditorState, ea: &ExArgs, uc: &UserCmd, code: &str) -> Option<String> {
    let lower = code.to_ascii_lowercase();
    let (quote, key) = if let Some(k) = lower.strip_prefix("q-") {
        (1, k.to_string())
    } else if let Some(k) = lower.strip_prefix("f-") {
        (2, k.to_string())
    } else {
        (0, lower.clone())
    };
    let arg = ea.arg_str();
    Some(match (quote, key.as_str()) {
        (_, "args") => {
            if arg.is_empty() {
                return Some(if quote == 1 { "''".to_string() } else { String::new() });
            }
            let quote = if quote == 2 && uc.argt.contains(CmdFlags::NOSPC) { 1 } else { quote };
            match quote {
                0 => arg.to_string(),
                1 => quote_arg(arg),
                _ => split_args(arg),
            }
        }
        (0, "bang") => if ea.forceit { "!" } else { "" }.to_string(),
        (0, "line1") => ea.line1.to_string(),
        (0, "line2") => ea.line2.to_string(),
        (0, "range") => ea.addr_count.to_string(),
        (0, "count") => ea.line2.to_string(),
        (0, "lt") => "<".to_string(),
        (q, "reg" | "register") => {
            let r = ea.regname.map(String::from).unwrap_or_default();
            if q == 1 {
                format!("'{r}'")
            } else {
                r
            }
        }
        (q, "mods") => {
            let m = st.cmdmod.describe();
            if q == 1 {
                format!("'{m}'")
            } else {
                m
            }
        }
        _ => return None,
    })
}

/// The replacement text with every `<code>` expanded.
fn expand_replacement(st: &EditorState, ea: &ExArgs, uc: &UserCmd) -> String {
    let rep = uc.rep.as_str();
    let mut out = String::with_capacity(rep.len());
    let mut i = 0;
    while i < rep.len() {
        let rest = &rep[i..];
        if rest.starts_with('<') {
            if let Some(close) = rest.find('>') {
                if let Some(text) = expand_code(st, ea, uc, &rest[1..close]) {
                    out.push_str(&text);
                    i += close + 1;
                    continue;
                }
            }
        }
        let c = rest.chars().next().unwrap_or_default();
        out.push(c);
        i += c.len_utf8().max(1);
    }
    out
}

/// Execute the user command of `ea`.
pub fn do_ucmd(st: &mut EditorState, ea: &mut ExArgs, ctx: &mut CmdCtx) -> Result<()> {
    let Some(uc) = ea.user_idx.and_then(|i| st.user_cmds.cmds.get(i)).cloned() else {
        return Err(invalid(e::NOTEDITORCMD));
    };
    if ea.addr_count == 0 && uc.def >= 0 {
        ea.line2 = uc.def;
    }
    let cmd = expand_replacement(st, ea, &uc);
    log::debug!("user command {} -> {cmd}", uc.name);

    // commands defined in a script run in its context
    let pushed = uc.sid != 0 && uc.sid != st.current_sid();
    if pushed {
        st.sourcing.push(crate::state::SourceFrame {
            kind: crate::line_source::SourceKind::Other,
            name: st.scripts.get(uc.sid).cloned().unwrap_or_default(),
            lnum: 0,
            sid: uc.sid,
            level: st.ex_nesting_level,
            finished: false,
        });
    }
    let result = do_cmdline(
        st,
        Some(&cmd),
        &mut *ctx.source,
        RunFlags::VERBOSE | RunFlags::NOWAIT | RunFlags::KEEPLINE,
    );
    if pushed {
        st.sourcing.pop();
    }
    result
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::runner::do_cmdline_cmd;
    use crate::host::MemHost;
    use test_log::test;

    fn state() -> (EditorState, MemHost) {
        let host = MemHost::new();
        (EditorState::new(Box::new(host.clone()), false), host)
    }

    #[test]
    fn args_are_substituted() {
        let (mut st, host) = state();
        do_cmdline_cmd(&mut st, "command -nargs=* Say echo <q-args> [<f-args>]").unwrap();
        do_cmdline_cmd(&mut st, "Say a b").unwrap();
        assert_eq!(host.output(), vec!["a b ['a', 'b']"]);
    }

    #[test]
    fn prefix_lookup() {
        let (mut st, _) = state();
        do_cmdline_cmd(&mut st, "command Hello echo 1").unwrap();
        do_cmdline_cmd(&mut st, "command Help echo 2").unwrap();
        let buf = st.curbuf_fnum();
        assert!(matches!(st.user_cmds.find("Hello", buf), UcmdLookup::Found(_)));
        assert!(matches!(st.user_cmds.find("Hel", buf), UcmdLookup::Ambiguous));
        assert!(matches!(st.user_cmds.find("Hell", buf), UcmdLookup::Found(_)));
        assert!(matches!(st.user_cmds.find("Nope", buf), UcmdLookup::NotFound));
    }

    #[test]
    fn redefine_needs_bang() {
        let (mut st, host) = state();
        do_cmdline_cmd(&mut st, "command Hi echo 1").unwrap();
        do_cmdline_cmd(&mut st, "command Hi echo 2").unwrap();
        do_cmdline_cmd(&mut st, "command! Hi echo 3").unwrap();
        do_cmdline_cmd(&mut st, "Hi").unwrap();
        assert_eq!(host.errors(), vec!["E174: Command already exists: add ! to replace it: Hi"]);
        assert_eq!(host.output(), vec!["3"]);
    }

    #[test]
    fn range_and_bang() {
        let (mut st, host) = state();
        st.curbuf_mut().load_text("a\nb\nc\n");
        do_cmdline_cmd(&mut st, "command -range -bang Show echo <line1> <line2> '<bang>'").unwrap();
        do_cmdline_cmd(&mut st, "2,3Show!").unwrap();
        do_cmdline_cmd(&mut st, "command -count=5 Cnt echo <count>").unwrap();
        do_cmdline_cmd(&mut st, "Cnt").unwrap();
        assert_eq!(host.output(), vec!["2 3 !", "5"]);
    }

    #[test]
    fn nargs_is_checked() {
        let (mut st, host) = state();
        do_cmdline_cmd(&mut st, "command -nargs=0 None echo 1").unwrap();
        do_cmdline_cmd(&mut st, "None x").unwrap();
        do_cmdline_cmd(&mut st, "command -nargs=1 One echo <q-args>").unwrap();
        do_cmdline_cmd(&mut st, "One").unwrap();
        do_cmdline_cmd(&mut st, "One x y").unwrap();
        assert_eq!(host.errors(), vec!["E488: Trailing characters: x: None x", "E471: Argument required: One"]);
        assert_eq!(host.output(), vec!["x y"]);
    }

    #[test]
    fn bad_attributes() {
        let (mut st, host) = state();
        do_cmdline_cmd(&mut st, "command -nargs=2 X echo").unwrap();
        do_cmdline_cmd(&mut st, "command -foo X echo").unwrap();
        do_cmdline_cmd(&mut st, "command lower echo").unwrap();
        let errs = host.errors();
        assert!(errs[0].starts_with("E176"));
        assert!(errs[1].starts_with("E181: Invalid attribute: foo"));
        assert!(errs[2].starts_with("E183"));
    }

    #[test]
    fn delete_and_clear() {
        let (mut st, host) = state();
        do_cmdline_cmd(&mut st, "command A echo 1").unwrap();
        do_cmdline_cmd(&mut st, "command B echo 2").unwrap();
        do_cmdline_cmd(&mut st, "delcommand A").unwrap();
        do_cmdline_cmd(&mut st, "delcommand A").unwrap();
        assert_eq!(host.errors(), vec!["E184: No such user-defined command: A"]);
        do_cmdline_cmd(&mut st, "comclear").unwrap();
        assert!(st.user_cmds.cmds.is_empty());
    }

    #[test]
    fn f_args_escapes() {
        assert_eq!(split_args(r#"a\ b "c" d\\"#), r#""a b","\"c\"","d\\""#);
        assert_eq!(quote_arg(r#"x"y\"#), r#""x\"y\\""#);
    }
}

//
// Copyright (c) 2024 Jeff Garzik
//
// This file is part of the posixutils-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//

//! Autocommands: commands run when an event happens, selected by a file
//! name or other pattern.

use std::fmt;

use regex::Regex;

use crate::docmd::{CmdCtx, ExArgs};
use crate::error::{invalid, runtime, Result};
use crate::line_source::{SourceKind, StrSource};
use crate::options::Opt;
use crate::runner::{do_cmdline, RunFlags};
use crate::state::{EditorState, SourceFrame};

/// Autocommands triggering autocommands stop at this depth.
const MAX_NESTING: i32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Event {
    BufEnter,
    BufLeave,
    BufNewFile,
    BufRead,
    BufWritePost,
    BufWritePre,
    CmdUndefined,
    FileType,
    OptionSet,
    SourcePost,
    SourcePre,
    User,
    VimEnter,
}

const EVENTS: &[(&str, Event)] = &[
    ("BufEnter", Event::BufEnter),
    ("BufLeave", Event::BufLeave),
    ("BufNewFile", Event::BufNewFile),
    ("BufRead", Event::BufRead),
    ("BufReadPost", Event::BufRead),
    ("BufWrite", Event::BufWritePre),
    ("BufWritePost", Event::BufWritePost),
    ("BufWritePre", Event::BufWritePre),
    ("CmdUndefined", Event::CmdUndefined),
    ("FileType", Event::FileType),
    ("OptionSet", Event::OptionSet),
    ("SourcePost", Event::SourcePost),
    ("SourcePre", Event::SourcePre),
    ("User", Event::User),
    ("VimEnter", Event::VimEnter),
];

impl Event {
    /// Event names are matched ignoring case.
    pub fn from_name(name: &str) -> Option<Event> {
        EVENTS
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|&(_, ev)| ev)
    }

    pub fn name(self) -> &'static str {
        EVENTS
            .iter()
            .find(|&&(_, ev)| ev == self)
            .map(|&(n, _)| n)
            .unwrap_or("")
    }

    fn all() -> impl Iterator<Item = Event> {
        let mut events: Vec<Event> = EVENTS.iter().map(|&(_, ev)| ev).collect();
        events.sort();
        events.dedup();
        events.into_iter()
    }

    /// Events matched against a name instead of a file name.
    fn matches_name(self) -> bool {
        matches!(
            self,
            Event::CmdUndefined | Event::FileType | Event::OptionSet | Event::User
        )
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone)]
pub struct AutoCmd {
    pub event: Event,
    pub group: Option<String>,
    pub pattern: String,
    regex: Regex,
    pub cmd: String,
    pub once: bool,
    pub nested: bool,
    pub sid: usize,
    /// Bumped on every change so deleted commands are not run.
    id: u64,
}

#[derive(Debug, Default)]
pub struct Autocmds {
    cmds: Vec<AutoCmd>,
    groups: Vec<String>,
    /// Group set with `:augroup`, `None` for the default group.
    cur_group: Option<String>,
    next_id: u64,
    /// Depth of executing autocommands.
    nesting: i32,
    /// The running autocommand allows nested events.
    nested_ok: bool,
    /// Values for `<afile>`, `<amatch>` and `<abuf>`.
    pub afile: Option<String>,
    pub amatch: Option<String>,
    pub abuf: Option<usize>,
}

impl Autocmds {
    pub fn has_event(&self, event: Event) -> bool {
        self.cmds.iter().any(|ac| ac.event == event)
    }

    pub fn busy(&self) -> bool {
        self.nesting > 0
    }

    fn group_exists(&self, name: &str) -> bool {
        self.groups.iter().any(|g| g == name)
    }
}

/// Translate a file pattern to a regex: `*` any text, `?` one character,
/// `{a,b}` alternatives, `\x` a literal x.
pub(crate) fn pattern_to_regex(pat: &str) -> Result<Regex> {
    let mut re = String::from("^");
    let mut depth = 0;
    let mut chars = pat.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' => re.push_str(".*"),
            '?' => re.push('.'),
            '{' => {
                depth += 1;
                re.push_str("(?:");
            }
            '}' if depth > 0 => {
                depth -= 1;
                re.push(')');
            }
            ',' if depth > 0 => re.push('|'),
            '[' => {
                re.push('[');
                for c in chars.by_ref() {
                    if c == ']' {
                        break;
                    }
                    if c == '\\' || c == '[' {
                        re.push('\\');
                    }
                    re.push(c);
                }
                re.push(']');
            }
            '\\' => {
                if let Some(next) = chars.next() {
                    re.push_str(&regex::escape(&next.to_string()));
                }
            }
            c => re.push_str(&regex::escape(&c.to_string())),
        }
    }
    re.push('$');
    Regex::new(&re).map_err(|_| invalid(format!("E1234: Invalid pattern: {pat}")))
}

fn pattern_matches(ac: &AutoCmd, name: &str) -> bool {
    if ac.event.matches_name() || ac.pattern.contains('/') {
        return ac.regex.is_match(name);
    }
    // a pattern without a slash matches the tail of a path
    let tail = name.rsplit('/').next().unwrap_or(name);
    ac.regex.is_match(name) || ac.regex.is_match(tail)
}

fn event_ignored(st: &EditorState, event: Event) -> bool {
    st.p_str(Opt::Eventignore)
        .split(',')
        .any(|item| item.eq_ignore_ascii_case("all") || Event::from_name(item) == Some(event))
}

/// Run the autocommands of `event` matching `name`. Returns `true` when
/// at least one was executed.
pub fn apply_autocmds(st: &mut EditorState, event: Event, name: &str, buf: Option<usize>) -> bool {
    apply_autocmds_group(st, event, name, buf, None)
}

fn apply_autocmds_group(
    st: &mut EditorState,
    event: Event,
    name: &str,
    buf: Option<usize>,
    group: Option<&str>,
) -> bool {
    if event_ignored(st, event) {
        return false;
    }
    if st.autocmds.nesting > 0 && !st.autocmds.nested_ok {
        return false;
    }
    if st.autocmds.nesting >= MAX_NESTING {
        st.emsg("E218: Autocommand nesting too deep");
        return false;
    }

    let todo: Vec<AutoCmd> = st
        .autocmds
        .cmds
        .iter()
        .filter(|ac| ac.event == event)
        .filter(|ac| group.map_or(true, |g| ac.group.as_deref() == Some(g)))
        .filter(|ac| pattern_matches(ac, name))
        .cloned()
        .collect();
    if todo.is_empty() {
        return false;
    }
    log::debug!("{event} autocommands for {name:?}: {}", todo.len());

    let abuf = buf.unwrap_or(st.curbuf_fnum());
    let saved = (
        st.autocmds.afile.replace(name.to_string()),
        st.autocmds.amatch.replace(name.to_string()),
        st.autocmds.abuf.replace(abuf),
        st.autocmds.nested_ok,
    );
    st.autocmds.nesting += 1;

    let mut did = false;
    for ac in todo {
        // an earlier command may have deleted this one
        if !st.autocmds.cmds.iter().any(|c| c.id == ac.id) {
            continue;
        }
        if ac.once {
            st.autocmds.cmds.retain(|c| c.id != ac.id);
        }
        st.autocmds.nested_ok = ac.nested;
        st.sourcing.push(SourceFrame {
            kind: SourceKind::Other,
            name: format!("{event} Autocommands for \"{}\"", ac.pattern),
            lnum: 0,
            sid: ac.sid,
            level: st.ex_nesting_level,
            finished: false,
        });
        let mut source = StrSource::default();
        if let Err(err) = do_cmdline(st, Some(&ac.cmd), &mut source, RunFlags::VERBOSE | RunFlags::NOWAIT) {
            st.emsg(&err.message());
        }
        st.sourcing.pop();
        did = true;
        if st.exc.force_abort || st.exiting.is_some() {
            break;
        }
    }

    st.autocmds.nesting -= 1;
    st.autocmds.afile = saved.0;
    st.autocmds.amatch = saved.1;
    st.autocmds.abuf = saved.2;
    st.autocmds.nested_ok = saved.3;
    did
}

/// Split `[group] event[,event] rest` into its parts. A leading word that
/// names a group is taken as one.
fn parse_group_events<'a>(st: &EditorState, arg: &'a str) -> Result<(Option<String>, Vec<Event>, &'a str)> {
    let mut arg = arg.trim_start();
    let mut group = None;
    let first_end = arg.find([' ', '\t', '|']).unwrap_or(arg.len());
    let first = &arg[..first_end];
    if !first.is_empty() && st.autocmds.group_exists(first) && Event::from_name(first.split(',').next().unwrap_or("")).is_none() {
        group = Some(first.to_string());
        arg = arg[first_end..].trim_start();
    }

    let end = arg.find([' ', '\t', '|']).unwrap_or(arg.len());
    let names = &arg[..end];
    let mut events = Vec::new();
    if names == "*" {
        events.extend(Event::all());
    } else if !names.is_empty() {
        for name in names.split(',') {
            let ev = Event::from_name(name)
                .ok_or_else(|| runtime(format!("E216: No such event: {name}")))?;
            events.push(ev);
        }
    }
    Ok((group, events, arg[end..].trim_start()))
}

fn list_autocmds(st: &mut EditorState, group: Option<&str>, events: &[Event], pattern: Option<&str>) {
    let rows: Vec<(Option<String>, Event, String, String)> = st
        .autocmds
        .cmds
        .iter()
        .filter(|ac| group.map_or(true, |g| ac.group.as_deref() == Some(g)))
        .filter(|ac| events.is_empty() || events.contains(&ac.event))
        .filter(|ac| pattern.map_or(true, |p| ac.pattern == p))
        .map(|ac| (ac.group.clone(), ac.event, ac.pattern.clone(), ac.cmd.clone()))
        .collect();
    st.msg("--- Autocommands ---");
    let mut last: Option<(Option<String>, Event)> = None;
    let mut last_pat = String::new();
    for (group, event, pat, cmd) in rows {
        if last.as_ref() != Some(&(group.clone(), event)) {
            match &group {
                Some(g) => st.msg_list_line(&format!("{g}  {event}")),
                None => st.msg_list_line(event.name()),
            }
            last = Some((group, event));
            last_pat.clear();
        }
        if pat != last_pat {
            st.msg_list_line(&format!("    {pat}"));
            last_pat = pat;
        }
        st.msg_list_line(&format!("              {cmd}"));
    }
}

/// `:autocmd[!] [group] [event] [pat] [++once] [++nested] [cmd]`
pub fn ex_autocmd(st: &mut EditorState, ea: &mut ExArgs, _ctx: &mut CmdCtx) -> Result<()> {
    if ea.skip {
        return Ok(());
    }
    let text = ea.arg_str().to_string();
    let (group, events, rest) = parse_group_events(st, &text)?;
    let group = group.or_else(|| st.autocmds.cur_group.clone());

    let pat_end = rest.find([' ', '\t']).unwrap_or(rest.len());
    let patterns = &rest[..pat_end];
    let mut cmd = rest[pat_end..].trim_start();
    let mut once = false;
    let mut nested = false;
    loop {
        if let Some(r) = cmd.strip_prefix("++once") {
            once = true;
            cmd = r.trim_start();
        } else if let Some(r) = cmd.strip_prefix("++nested") {
            nested = true;
            cmd = r.trim_start();
        } else if let Some(r) = cmd.strip_prefix("nested ") {
            nested = true;
            cmd = r.trim_start();
        } else {
            break;
        }
    }

    if !ea.forceit && cmd.is_empty() {
        let pat = (!patterns.is_empty()).then_some(patterns);
        list_autocmds(st, group.as_deref(), &events, pat);
        return Ok(());
    }

    let events: Vec<Event> = if events.is_empty() { Event::all().collect() } else { events };
    let patterns: Vec<&str> = if patterns.is_empty() {
        Vec::new()
    } else {
        patterns.split(',').collect()
    };

    if ea.forceit {
        st.autocmds.cmds.retain(|ac| {
            ac.group != group
                || !events.contains(&ac.event)
                || (!patterns.is_empty() && !patterns.contains(&ac.pattern.as_str()))
        });
    }
    if cmd.is_empty() {
        return Ok(());
    }

    let sid = st.current_sid();
    for event in &events {
        for pat in &patterns {
            let regex = pattern_to_regex(pat)?;
            st.autocmds.next_id += 1;
            let id = st.autocmds.next_id;
            log::debug!("autocmd {event} {pat}: {cmd}");
            st.autocmds.cmds.push(AutoCmd {
                event: *event,
                group: group.clone(),
                pattern: pat.to_string(),
                regex,
                cmd: cmd.to_string(),
                once,
                nested,
                sid,
                id,
            });
        }
    }
    Ok(())
}

/// `:augroup name`, `:augroup END`, `:augroup! name`
pub fn ex_augroup(st: &mut EditorState, ea: &mut ExArgs, _ctx: &mut CmdCtx) -> Result<()> {
    let name = ea.arg_str().trim().to_string();
    if ea.forceit {
        if name.is_empty() {
            return Err(invalid(crate::error::e::ARGREQ));
        }
        if st.autocmds.cur_group.as_deref() == Some(name.as_str()) {
            return Err(runtime("E936: Cannot delete the current group"));
        }
        if !st.autocmds.group_exists(&name) {
            return Err(runtime(format!("E367: No such group: \"{name}\"")));
        }
        st.autocmds.groups.retain(|g| *g != name);
        st.autocmds.cmds.retain(|ac| ac.group.as_deref() != Some(name.as_str()));
        return Ok(());
    }
    if name.is_empty() {
        let groups = st.autocmds.groups.join("  ");
        st.msg(&groups);
        return Ok(());
    }
    if name.eq_ignore_ascii_case("end") {
        st.autocmds.cur_group = None;
        return Ok(());
    }
    if !st.autocmds.group_exists(&name) {
        st.autocmds.groups.push(name.clone());
    }
    st.autocmds.cur_group = Some(name);
    Ok(())
}

/// `:doautocmd [<nomodeline>] [group] event [fname]`
pub fn ex_doautocmd(st: &mut EditorState, ea: &mut ExArgs, _ctx: &mut CmdCtx) -> Result<()> {
    let mut text = ea.arg_str().trim_start();
    if let Some(r) = text.strip_prefix("<nomodeline>") {
        text = r.trim_start();
    }
    let text = text.to_string();
    let (group, events, fname) = parse_group_events(st, &text)?;
    if events.is_empty() {
        return Err(invalid(crate::error::e::ARGREQ));
    }
    let name = if fname.is_empty() {
        st.curbuf().name.clone().unwrap_or_default()
    } else {
        fname.to_string()
    };
    let buf = st.curbuf_fnum();
    let mut did = false;
    for event in events {
        did |= apply_autocmds_group(st, event, &name, Some(buf), group.as_deref());
    }
    if !did {
        st.msg("No matching autocommands");
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::host::MemHost;
    use crate::runner::do_cmdline_cmd;
    use test_log::test;

    fn state() -> (EditorState, MemHost) {
        let host = MemHost::new();
        (EditorState::new(Box::new(host.clone()), false), host)
    }

    #[test]
    fn patterns() {
        assert!(pattern_to_regex("*.py").unwrap().is_match("foo.py"));
        assert!(!pattern_to_regex("*.py").unwrap().is_match("foo.pyc"));
        assert!(pattern_to_regex("*.{c,h}").unwrap().is_match("x.h"));
        assert!(pattern_to_regex("python").unwrap().is_match("python"));
        assert!(pattern_to_regex("a?c").unwrap().is_match("abc"));
    }

    #[test]
    fn filetype_event_runs_matching_commands() {
        let (mut st, host) = state();
        do_cmdline_cmd(&mut st, "autocmd FileType python echo 'py'").unwrap();
        do_cmdline_cmd(&mut st, "autocmd FileType c echo 'c'").unwrap();
        assert!(apply_autocmds(&mut st, Event::FileType, "python", None));
        assert!(!apply_autocmds(&mut st, Event::FileType, "rust", None));
        assert_eq!(host.output(), vec!["py"]);
    }

    #[test]
    fn eventignore_blocks() {
        let (mut st, host) = state();
        do_cmdline_cmd(&mut st, "autocmd User Foo echo 'x'").unwrap();
        do_cmdline_cmd(&mut st, "set eventignore=User").unwrap();
        do_cmdline_cmd(&mut st, "doautocmd User Foo").unwrap();
        do_cmdline_cmd(&mut st, "set eventignore=").unwrap();
        do_cmdline_cmd(&mut st, "doautocmd User Foo").unwrap();
        assert_eq!(host.output(), vec!["No matching autocommands", "x"]);
    }

    #[test]
    fn once_and_removal() {
        let (mut st, host) = state();
        do_cmdline_cmd(&mut st, "autocmd User A ++once echo 'once'").unwrap();
        do_cmdline_cmd(&mut st, "autocmd User B echo 'b'").unwrap();
        apply_autocmds(&mut st, Event::User, "A", None);
        apply_autocmds(&mut st, Event::User, "A", None);
        do_cmdline_cmd(&mut st, "autocmd! User B").unwrap();
        apply_autocmds(&mut st, Event::User, "B", None);
        assert_eq!(host.output(), vec!["once"]);
        assert!(!st.autocmds.has_event(Event::User));
    }

    #[test]
    fn groups() {
        let (mut st, host) = state();
        do_cmdline_cmd(&mut st, "augroup mine").unwrap();
        do_cmdline_cmd(&mut st, "autocmd User X echo 'grouped'").unwrap();
        do_cmdline_cmd(&mut st, "augroup END").unwrap();
        do_cmdline_cmd(&mut st, "autocmd User X echo 'plain'").unwrap();
        do_cmdline_cmd(&mut st, "augroup! mine").unwrap();
        apply_autocmds(&mut st, Event::User, "X", None);
        assert_eq!(host.output(), vec!["plain"]);
    }

    #[test]
    fn nesting_needs_flag() {
        let (mut st, host) = state();
        do_cmdline_cmd(&mut st, "autocmd User Outer doautocmd User Inner").unwrap();
        do_cmdline_cmd(&mut st, "autocmd User Inner echo 'inner'").unwrap();
        apply_autocmds(&mut st, Event::User, "Outer", None);
        assert_eq!(host.output(), vec!["No matching autocommands"]);
        do_cmdline_cmd(&mut st, "autocmd! User Outer").unwrap();
        do_cmdline_cmd(&mut st, "autocmd User Outer ++nested doautocmd User Inner").unwrap();
        apply_autocmds(&mut st, Event::User, "Outer", None);
        assert!(host.output().contains(&"inner".to_string()));
    }

    #[test]
    fn unknown_event() {
        let (mut st, host) = state();
        do_cmdline_cmd(&mut st, "autocmd Bogus * echo 1").unwrap();
        assert_eq!(host.errors(), vec!["E216: No such event: Bogus"]);
    }
}

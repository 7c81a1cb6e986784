//
// Copyright (c) 2024 Jeff Garzik
//
// This file is part of the posixutils-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//

//! `:source`, `:finish` and `:scriptnames`.

use crate::autocmd::{apply_autocmds, Event};
use crate::cond::{CondFlags, Pending};
use crate::docmd::{CmdCtx, ExArgs};
use crate::error::{e, invalid, runtime, Result};
use crate::except::report_make_pending;
use crate::line_source::{ScriptSource, SourceKind};
use crate::runner::{do_cmdline, RunFlags};
use crate::state::{EditorState, SourceFrame};

/// Script id of `name`, registering it on first use.
pub fn script_id(st: &mut EditorState, name: &str) -> usize {
    match st.scripts.iter().skip(1).position(|s| s == name) {
        Some(idx) => idx + 1,
        None => {
            st.scripts.push(name.to_string());
            st.scripts.len() - 1
        }
    }
}

/// Execute the lines of `text` as the script `name`.
pub fn source_text(st: &mut EditorState, name: &str, text: &str) -> Result<()> {
    apply_autocmds(st, Event::SourcePre, name, None);
    let sid = script_id(st, name);
    st.verbose_msg(2, &format!("sourcing \"{name}\""));
    log::debug!("sourcing {name} as script {sid}");

    st.sourcing.push(SourceFrame {
        kind: SourceKind::Script,
        name: name.to_string(),
        lnum: 0,
        sid,
        level: st.ex_nesting_level,
        finished: false,
    });
    // a script sourced from a function does not see its local variables
    let saved_calls = std::mem::take(&mut st.fcalls);

    let mut source = ScriptSource::new(text, !st.cpo_has('C'));
    let result = do_cmdline(
        st,
        None,
        &mut source,
        RunFlags::VERBOSE | RunFlags::NOWAIT | RunFlags::REPEAT,
    );

    st.fcalls = saved_calls;
    st.sourcing.pop();
    st.verbose_msg(2, &format!("finished sourcing {name}"));
    if let Some(caller) = st.sourcing.last().map(|f| f.name.clone()) {
        st.verbose_msg(2, &format!("continuing in {caller}"));
    }
    apply_autocmds(st, Event::SourcePost, name, None);
    result
}

/// Read and execute the file `fname`.
pub fn do_source(st: &mut EditorState, fname: &str) -> Result<()> {
    let text = match st.host.read_file(fname) {
        Ok(text) => text,
        Err(err) => {
            log::debug!("cannot source {fname}: {err}");
            return Err(runtime(format!("{} {fname}", e::NOTREAD)));
        }
    };
    source_text(st, fname, &text)
}

/// `:source {file}`; without a file the current buffer is executed.
pub fn ex_source(st: &mut EditorState, ea: &mut ExArgs, _ctx: &mut CmdCtx) -> Result<()> {
    let fname = ea.arg_str().to_string();
    if !fname.is_empty() {
        return do_source(st, &fname);
    }
    let fnum = st.curbuf_fnum();
    let text = st.curbuf().text();
    source_text(st, &format!(":source buffer={fnum}"), &text)
}

/// Finish the script being sourced, or make the finish pending until
/// the `:finally` of an active `:try` has run. With `reanimate` a finish
/// that was already done is made pending again.
pub fn do_finish(st: &mut EditorState, ctx: &mut CmdCtx, reanimate: bool) {
    fn frame(st: &mut EditorState) -> Option<&mut SourceFrame> {
        st.sourcing
            .last_mut()
            .filter(|f| f.kind == SourceKind::Script)
    }

    if reanimate {
        if let Some(f) = frame(st) {
            f.finished = false;
        }
    }
    match st.cleanup_conditionals(ctx.cstack, CondFlags::empty(), true) {
        Some(idx) => {
            ctx.cstack.frames[idx].pending = Pending::FINISH;
            report_make_pending(st, Pending::FINISH);
        }
        None => {
            if let Some(f) = frame(st) {
                f.finished = true;
            }
        }
    }
}

pub fn ex_finish(st: &mut EditorState, _ea: &mut ExArgs, ctx: &mut CmdCtx) -> Result<()> {
    if ctx.source.kind() != SourceKind::Script {
        return Err(runtime(e::FINISH_OUTSIDE));
    }
    do_finish(st, ctx, false);
    Ok(())
}

/// `:scriptnames` lists the sourced scripts; `:scriptnames N` edits
/// script N.
pub fn ex_scriptnames(st: &mut EditorState, ea: &mut ExArgs, _ctx: &mut CmdCtx) -> Result<()> {
    if ea.addr_count > 0 || !ea.arg_str().is_empty() {
        let nr = if ea.arg_str().is_empty() {
            ea.line2
        } else {
            ea.arg_str().trim().parse::<i64>().map_err(|_| invalid(e::INVARG))?
        };
        let name = usize::try_from(nr)
            .ok()
            .filter(|&n| n >= 1)
            .and_then(|n| st.scripts.get(n).cloned())
            .ok_or_else(|| invalid(e::INVARG))?;
        return crate::ex::files::do_ecmd(st, Some(&name), ea.forceit, None);
    }
    let names: Vec<(usize, String)> = st.scripts.iter().cloned().enumerate().skip(1).collect();
    for (sid, name) in names {
        st.msg_list_line(&format!("{sid:3}: {name}"));
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::eval::Value;
    use crate::host::MemHost;
    use crate::runner::do_cmdline_cmd;
    use test_log::test;

    fn state(host: &MemHost) -> EditorState {
        EditorState::new(Box::new(host.clone()), false)
    }

    #[test]
    fn continuation_lines_and_script_variables() {
        let host = MemHost::new().with_file(
            "a.vim",
            "let s:x = [\n  \\ 1,\n  \\ 2]\nlet g:total = s:x[0] + s:x[1]\n",
        );
        let mut st = state(&host);
        do_cmdline_cmd(&mut st, "source a.vim").unwrap();
        assert_eq!(st.get_var("g:total"), Some(Value::Number(3)));
        assert!(st.sourcing.is_empty());
        assert_eq!(st.scripts, vec!["".to_string(), "a.vim".to_string()]);
    }

    #[test]
    fn finish_stops_the_script() {
        let host = MemHost::new().with_file("f.vim", "let g:a = 1\nfinish\nlet g:a = 2\n");
        let mut st = state(&host);
        do_cmdline_cmd(&mut st, "source f.vim").unwrap();
        assert_eq!(st.get_var("g:a"), Some(Value::Number(1)));
        assert!(host.errors().is_empty(), "{:?}", host.errors());
    }

    #[test]
    fn finish_waits_for_finally() {
        let host = MemHost::new().with_file(
            "t.vim",
            "try\n  finish\nfinally\n  let g:fin = 1\nendtry\nlet g:after = 1\n",
        );
        let mut st = state(&host);
        do_cmdline_cmd(&mut st, "source t.vim").unwrap();
        assert_eq!(st.get_var("g:fin"), Some(Value::Number(1)));
        assert_eq!(st.get_var("g:after"), None);
    }

    #[test]
    fn finish_outside_a_script() {
        let host = MemHost::new();
        let mut st = state(&host);
        do_cmdline_cmd(&mut st, "finish").unwrap();
        assert_eq!(host.errors(), vec![e::FINISH_OUTSIDE]);
    }

    #[test]
    fn missing_file() {
        let host = MemHost::new();
        let mut st = state(&host);
        do_cmdline_cmd(&mut st, "source nosuch.vim").unwrap();
        assert_eq!(host.errors(), vec!["E484: Can't open file nosuch.vim"]);
    }

    #[test]
    fn same_file_keeps_its_id() {
        let host = MemHost::new()
            .with_file("a.vim", "let s:n = 1\n")
            .with_file("b.vim", "\" nothing\n");
        let mut st = state(&host);
        do_cmdline_cmd(&mut st, "source a.vim | source b.vim | source a.vim").unwrap();
        assert_eq!(script_id(&mut st, "a.vim"), 1);
        assert_eq!(script_id(&mut st, "b.vim"), 2);
        do_cmdline_cmd(&mut st, "scriptnames").unwrap();
        assert_eq!(host.output(), vec!["  1: a.vim", "  2: b.vim"]);
    }

    #[test]
    fn sourcing_the_buffer() {
        let host = MemHost::new();
        let mut st = state(&host);
        st.curbuf_mut().load_text("let g:from_buf = 7\n");
        do_cmdline_cmd(&mut st, "source").unwrap();
        assert_eq!(st.get_var("g:from_buf"), Some(Value::Number(7)));
    }

    #[test]
    fn source_autocommands() {
        let host = MemHost::new().with_file("s.vim", "let g:body = 1\n");
        let mut st = state(&host);
        do_cmdline_cmd(&mut st, "autocmd SourcePre *.vim let g:pre = 1").unwrap();
        do_cmdline_cmd(&mut st, "autocmd SourcePost *.vim let g:post = g:body").unwrap();
        do_cmdline_cmd(&mut st, "source s.vim").unwrap();
        assert_eq!(st.get_var("g:pre"), Some(Value::Number(1)));
        assert_eq!(st.get_var("g:post"), Some(Value::Number(1)));
    }
}

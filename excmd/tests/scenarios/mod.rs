//
// Copyright (c) 2024 Jeff Garzik
//
// This file is part of the posixutils-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//

use excmd::eval::Value;
use excmd::host::MemHost;
use excmd::options::Opt;
use excmd::line_source::StrSource;
use excmd::runner::{do_cmdline, do_cmdline_cmd, RunFlags};
use excmd::state::EditorState;

fn editor() -> (EditorState, MemHost) {
    let host = MemHost::new();
    (EditorState::new(Box::new(host.clone()), false), host)
}

fn run(st: &mut EditorState, cmd: &str) {
    do_cmdline_cmd(st, cmd).unwrap();
}

fn run_lines(st: &mut EditorState, text: &str) {
    let mut source = StrSource::new(text);
    do_cmdline(st, None, &mut source, RunFlags::VERBOSE | RunFlags::REPEAT).unwrap();
}

#[test]
fn silent_bang_covers_the_whole_line() {
    let (mut st, host) = editor();
    run(&mut st, "  :  silent! echo 1 | echo 2");
    assert!(host.output().is_empty(), "{:?}", host.output());
    assert!(host.errors().is_empty());
    assert_eq!(st.msg_silent, 0);
    assert_eq!(st.emsg_silent, 0);

    run(&mut st, "echo 3");
    assert_eq!(host.output(), vec!["3"]);
}

#[test]
fn global_delete() {
    let (mut st, host) = editor();
    st.curbuf_mut().load_text("a\nfoo\nb\nfoo\nc\n");
    run(&mut st, "1,$g/foo/d");
    assert_eq!(st.curbuf().text(), "a\nb\nc\n");
    assert_eq!(st.line_count(), 3);
    assert!(host.errors().is_empty());
}

#[test]
fn try_catch_on_one_line() {
    let (mut st, host) = editor();
    let before = st.exc.trylevel;
    run(
        &mut st,
        "try | throw \"x\" | catch /x/ | let g:caught=1 | endtry",
    );
    assert_eq!(st.get_var("g:caught"), Some(Value::Number(1)));
    assert_eq!(st.exc.trylevel, before);
    assert!(host.errors().is_empty(), "{:?}", host.errors());
}

#[test]
fn uncaught_exception_is_reported() {
    let (mut st, host) = editor();
    run(&mut st, "try | throw 'oops' | catch /other/ | endtry");
    assert_eq!(host.errors(), vec!["E605: Exception not caught: oops"]);
    assert_eq!(st.exc.trylevel, 0);
}

#[test]
fn for_loop_on_one_line() {
    let (mut st, _host) = editor();
    run(&mut st, "let s:n = 0");
    run(&mut st, "for i in [1,2,3] | let s:n = s:n + i | endfor");
    assert_eq!(st.get_var("s:n"), Some(Value::Number(6)));
    assert_eq!(st.get_var("g:i"), Some(Value::Number(3)));
}

#[test]
fn backspace_number_becomes_names() {
    let (mut st, host) = editor();
    run(&mut st, "set backspace=1");
    assert_eq!(st.p_str(Opt::Backspace), "indent,eol");
    run(&mut st, "echo &backspace");
    assert_eq!(host.output(), vec!["indent,eol"]);
}

#[test]
fn escaped_blank_and_filetype_event() {
    let (mut st, _host) = editor();
    run(&mut st, "let g:fired = 0");
    run(
        &mut st,
        "autocmd FileType * let g:fired += 1 | let g:ft = &filetype",
    );
    run(&mut st, "set filetype=python\\ 2");
    assert_eq!(st.p_str(Opt::Filetype), "python 2");
    assert_eq!(st.get_var("g:fired"), Some(Value::Number(1)));
    assert_eq!(st.get_var("g:ft"), Some(Value::str("python 2")));
}

#[test]
fn function_user_command_and_substitute() {
    let (mut st, _host) = editor();
    st.curbuf_mut().load_text("one\ntwo\nthree\n");
    run_lines(
        &mut st,
        "function! Up(lnum) abort\n  call setline(a:lnum, toupper(getline(a:lnum)))\nendfunction",
    );
    run(&mut st, "command! -range=% Upper for l in range(<line1>, <line2>) | call Up(l) | endfor");
    run(&mut st, "2,3Upper");
    assert_eq!(st.curbuf().text(), "one\nTWO\nTHREE\n");
    run(&mut st, "%s/[A-Z]\\+/&!/");
    assert_eq!(st.curbuf().text(), "one\nTWO!\nTHREE!\n");
}

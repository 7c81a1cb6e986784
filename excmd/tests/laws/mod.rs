//
// Copyright (c) 2024 Jeff Garzik
//
// This file is part of the posixutils-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//

use excmd::cmds::{CmdFlags, CMDS};
use excmd::docmd::{separate_nextcmd, ExArgs};
use excmd::eval::Value;
use excmd::host::MemHost;
use excmd::line_source::StrSource;
use excmd::modifiers::modifier_len;
use excmd::options::set::set_option_value;
use excmd::options::{Opt, OptLevel, OptVal};
use excmd::runner::{do_cmdline, do_cmdline_cmd, RunFlags};
use excmd::state::EditorState;
use proptest::prelude::*;
use proptest::test_runner::{TestCaseError, TestRunner};

fn editor_with(host: &MemHost) -> EditorState {
    EditorState::new(Box::new(host.clone()), false)
}

fn editor() -> (EditorState, MemHost) {
    let host = MemHost::new().with_file("six.txt", "a\nb\nc\nd\ne\nf\n");
    let mut st = editor_with(&host);
    do_cmdline_cmd(&mut st, "edit six.txt").unwrap();
    (st, host)
}

fn run_lines(st: &mut EditorState, text: &str) {
    let mut source = StrSource::new(text);
    do_cmdline(st, None, &mut source, RunFlags::VERBOSE | RunFlags::REPEAT).unwrap();
}

/// Error numbers among the messages, leaving out the "Error detected"
/// and "line N:" context lines.
fn error_codes(host: &MemHost) -> Vec<String> {
    host.errors()
        .iter()
        .filter(|m| m.starts_with('E') && m.as_bytes().get(1).is_some_and(u8::is_ascii_digit))
        .map(|m| m.split(':').next().unwrap_or_default().to_string())
        .collect()
}

fn global(st: &EditorState, opt: Opt) -> OptVal {
    st.options.get(opt, OptLevel::Both, st.opt_ctx())
}

fn address() -> impl Strategy<Value = String> {
    prop_oneof![
        (0..9u32).prop_map(|n| n.to_string()),
        Just(".".to_string()),
        Just("$".to_string()),
        (0..4u32).prop_map(|n| format!(".+{n}")),
        (0..4u32).prop_map(|n| format!(".-{n}")),
        (0..4u32).prop_map(|n| format!("$-{n}")),
        Just("%".to_string()),
    ]
}

fn range() -> impl Strategy<Value = String> {
    prop_oneof![
        address(),
        (address(), prop_oneof![Just(','), Just(';')], address())
            .prop_map(|(a, sep, b)| format!("{a}{sep}{b}")),
    ]
}

fn get_test_runner(cases: u32) -> TestRunner {
    TestRunner::new(proptest::test_runner::Config {
        cases,
        failure_persistence: None,

        ..proptest::test_runner::Config::default()
    })
}

fn check_range(cursor: u32, range: &str) -> Result<(), TestCaseError> {
    let (mut st, host) = editor();
    do_cmdline_cmd(&mut st, "command! -range R let g:l1 = <line1> | let g:l2 = <line2>").unwrap();
    do_cmdline_cmd(&mut st, &cursor.to_string()).unwrap();
    let errors = host.errors().len();

    do_cmdline_cmd(&mut st, &format!("{range}R")).unwrap();
    match (st.get_var("g:l1"), st.get_var("g:l2")) {
        (Some(Value::Number(l1)), Some(Value::Number(l2))) => {
            prop_assert!(l1 <= l2, "{range}: {l1} > {l2}");
            prop_assert!(l2 <= 6);
        }
        (None, None) => prop_assert!(host.errors().len() > errors, "{range} did nothing"),
        other => prop_assert!(false, "{range}: {other:?}"),
    }
    Ok(())
}

#[test]
fn range_is_ordered_or_rejected() {
    get_test_runner(128)
        .run(&(1..7u32, range()), |(cursor, range)| check_range(cursor, &range))
        .unwrap();
}

fn check_modifiers(mods: &[&str], cmd: &str) -> Result<(), TestCaseError> {
    let (mut st, _host) = editor();
    let line = format!("{} {cmd}", mods.join(" "));
    let _ = do_cmdline_cmd(&mut st, &line);
    prop_assert_eq!(st.msg_silent, 0, "{}", line);
    prop_assert_eq!(st.emsg_silent, 0, "{}", line);
    prop_assert_eq!(st.sandbox, 0, "{}", line);
    prop_assert_eq!(st.p_num(Opt::Verbose), 0, "{}", line);
    Ok(())
}

#[test]
fn modifiers_are_undone() {
    let mods = proptest::collection::vec(
        prop_oneof![
            Just("silent"),
            Just("silent!"),
            Just("sandbox"),
            Just("unsilent"),
            Just("verbose"),
            Just("3verbose"),
            Just("keepjumps"),
            Just("noautocmd"),
        ],
        1..5,
    );
    let cmd = prop_oneof![
        Just("echo 1"),
        Just("nosuchcmd"),
        Just("echo 1 | nosuchcmd"),
        Just("execute 'silent! nosuchcmd'"),
        Just("execute 'sandbox echo 2'"),
        Just("throw 'oops'"),
    ];
    get_test_runner(128)
        .run(&(mods, cmd), |(mods, cmd)| check_modifiers(&mods, cmd))
        .unwrap();
}

const BLOCKS: [(&str, &str, &str); 3] = [
    ("if 1", "endif", "E171"),
    ("while 0", "endwhile", "E170"),
    ("try", "endtry", "E600"),
];

fn check_missing_end(kinds: &[usize], closed: usize) -> Result<(), TestCaseError> {
    let closed = closed.min(kinds.len());
    let mut script: Vec<&str> = kinds.iter().map(|&k| BLOCKS[k].0).collect();
    script.extend(kinds.iter().rev().take(closed).map(|&k| BLOCKS[k].1));
    let script = script.join("\n") + "\n";

    let host = MemHost::new().with_file("blocks.vim", &script);
    let mut st = editor_with(&host);
    do_cmdline_cmd(&mut st, "source blocks.vim").unwrap();

    let codes = error_codes(&host);
    if closed == kinds.len() {
        prop_assert!(codes.is_empty(), "{script}: {codes:?}");
    } else {
        let open = kinds[kinds.len() - closed - 1];
        prop_assert_eq!(codes, vec![BLOCKS[open].2.to_string()], "{}", script);
    }
    Ok(())
}

#[test]
fn missing_end_reported_once() {
    get_test_runner(128)
        .run(
            &(proptest::collection::vec(0..3usize, 1..6), 0..6usize),
            |(kinds, closed)| check_missing_end(&kinds, closed),
        )
        .unwrap();
}

fn all_values(st: &EditorState) -> Vec<OptVal> {
    Opt::all().iter().map(|&o| global(st, o)).collect()
}

fn check_set_read_value(opt: Opt, level: OptLevel) -> Result<(), TestCaseError> {
    let (mut st, _host) = editor();
    let before = all_values(&st);
    let value = st.options.get(opt, level, st.opt_ctx());
    set_option_value(&mut st, opt, value, level, false).unwrap();
    prop_assert_eq!(before, all_values(&st), "{:?}", opt);
    Ok(())
}

#[test]
fn setting_read_value_is_identity() {
    let opt = prop_oneof![
        Just(Opt::Tabstop),
        Just(Opt::Shiftwidth),
        Just(Opt::Report),
        Just(Opt::Textwidth),
        Just(Opt::Undolevels),
        Just(Opt::Ignorecase),
        Just(Opt::Wrapscan),
        Just(Opt::Autoindent),
        Just(Opt::Shortmess),
        Just(Opt::Whichwrap),
        Just(Opt::Backupskip),
        Just(Opt::Cpoptions),
    ];
    let level = prop_oneof![Just(OptLevel::Both), Just(OptLevel::Global)];
    get_test_runner(64)
        .run(&(opt, level), |(opt, level)| check_set_read_value(opt, level))
        .unwrap();
}

const FUNCS: &str = "function! Down(n)
if a:n > 0
return Down(a:n - 1)
endif
return 0
endfunction
function! Fail() abort
call Down(1)
throw 'failed'
endfunction";

fn check_call_depth(cmds: &[&str]) -> Result<(), TestCaseError> {
    let (mut st, _host) = editor();
    run_lines(&mut st, FUNCS);
    let depth = st.call_depth;
    for cmd in cmds {
        let _ = do_cmdline_cmd(&mut st, cmd);
        prop_assert_eq!(st.call_depth, depth, "{}", cmd);
    }
    Ok(())
}

#[test]
fn call_depth_is_restored() {
    let cmds = proptest::collection::vec(
        prop_oneof![
            Just("call Down(3)"),
            Just("echo Down(2) + Down(1)"),
            Just("call Fail()"),
            Just("try | call Fail() | catch | endtry"),
            Just("execute 'call Down(2)'"),
            Just("call Missing()"),
            Just("silent! call Fail()"),
        ],
        1..4,
    );
    get_test_runner(64)
        .run(&cmds, |cmds| check_call_depth(&cmds))
        .unwrap();
}

fn check_query_then_assign(opt: &str, value: &str) -> Result<(), TestCaseError> {
    let (mut st, host) = editor();
    do_cmdline_cmd(&mut st, &format!("set {opt}={value}")).unwrap();
    let before = all_values(&st);

    do_cmdline_cmd(&mut st, &format!("set {opt}?")).unwrap();
    let shown = host.output().last().cloned().unwrap_or_default();
    let shown = shown.trim_start();
    let (name, shown_value) = shown.split_once('=').unwrap_or((shown, ""));
    prop_assert_eq!(name, opt);
    do_cmdline_cmd(&mut st, &format!("set {name}={shown_value}")).unwrap();

    prop_assert_eq!(before, all_values(&st));
    prop_assert!(host.errors().is_empty(), "{:?}", host.errors());
    Ok(())
}

#[test]
fn set_query_then_assign_is_noop() {
    let pair = prop_oneof![
        (Just("tabstop"), (1..20u32).prop_map(|n| n.to_string())),
        (Just("report"), (0..20u32).prop_map(|n| n.to_string())),
        (Just("textwidth"), (0..100u32).prop_map(|n| n.to_string())),
        (Just("shortmess"), "[filnxtToOsAIcqF]{0,6}".prop_map(|s| s)),
        (
            Just("whichwrap"),
            prop_oneof![Just(""), Just("b,s"), Just("b"), Just("<,>")].prop_map(str::to_string)
        ),
        (Just("backupskip"), "[a-z]{1,5}(,[a-z]{1,5}){0,2}".prop_map(|s| s)),
    ];
    get_test_runner(128)
        .run(&pair, |(opt, value)| check_query_then_assign(opt, &value))
        .unwrap();
}

fn check_add_remove(opt: Opt, prior: &[String], item: &str) -> Result<(), TestCaseError> {
    let (mut st, host) = editor();
    let name = opt.spec().name;
    do_cmdline_cmd(&mut st, &format!("set {name}={}", prior.join(","))).unwrap();
    let before = global(&st, opt);

    do_cmdline_cmd(&mut st, &format!("set {name}+={item}")).unwrap();
    prop_assert!(global(&st, opt).as_str().split(',').any(|i| i == item));
    do_cmdline_cmd(&mut st, &format!("set {name}-={item}")).unwrap();
    prop_assert_eq!(global(&st, opt), before);
    prop_assert!(host.errors().is_empty(), "{:?}", host.errors());
    Ok(())
}

#[test]
fn comma_list_add_then_remove() {
    get_test_runner(128)
        .run(
            &(
                prop_oneof![Just(Opt::Backupskip), Just(Opt::Directory)],
                proptest::collection::btree_set("[a-m]{1,4}", 0..4),
                "[n-z]{1,4}",
            ),
            |(opt, prior, item)| {
                let prior: Vec<String> = prior.into_iter().collect();
                check_add_remove(opt, &prior, &item)
            },
        )
        .unwrap();
}

fn check_bool_invert(name: &str, start: bool) -> Result<(), TestCaseError> {
    let (mut st, _host) = editor();
    let opt = st.options.find(name).unwrap();
    let set = |st: &mut EditorState, arg: String| do_cmdline_cmd(st, &format!("set {arg}")).unwrap();
    let initial = if start {
        name.to_string()
    } else {
        format!("no{name}")
    };

    set(&mut st, initial.clone());
    set(&mut st, format!("no{name}"));
    set(&mut st, format!("inv{name}"));
    prop_assert_eq!(global(&st, opt), OptVal::Bool(true));

    set(&mut st, initial);
    set(&mut st, format!("inv{name}"));
    prop_assert_eq!(global(&st, opt), OptVal::Bool(!start));
    set(&mut st, format!("{name}!"));
    prop_assert_eq!(global(&st, opt), OptVal::Bool(start));
    Ok(())
}

#[test]
fn bool_invert() {
    let name = prop_oneof![
        Just("ignorecase"),
        Just("wrapscan"),
        Just("autoindent"),
        Just("number"),
        Just("list"),
    ];
    get_test_runner(64)
        .run(&(name, proptest::bool::ANY), |(name, start)| {
            check_bool_invert(name, start)
        })
        .unwrap();
}

fn check_comment_stripping(line: &str) -> Result<(), TestCaseError> {
    let (st, _host) = editor();
    let strip = |text: &str| {
        let mut ea = ExArgs::new(text);
        ea.argt = CmdFlags::TRLBAR;
        separate_nextcmd(&st, &mut ea, false);
        ea.cmdline
    };
    let once = strip(line);
    prop_assert_eq!(strip(&once), once.clone());
    prop_assert!(!once.contains('|'));
    Ok(())
}

#[test]
fn comment_stripping_is_idempotent() {
    get_test_runner(256)
        .run(&"[a-z \"|\t']{0,24}", |line| check_comment_stripping(&line))
        .unwrap();
}

#[test]
fn ranges_rejected_where_not_allowed() {
    let mut checked = 0;
    for info in CMDS {
        let first = info.name.as_bytes().first().copied().unwrap_or_default();
        if info.argt.contains(CmdFlags::RANGE)
            || !first.is_ascii_lowercase()
            || modifier_len(info.name) > 0
        {
            continue;
        }
        let (mut st, host) = editor();
        let _ = do_cmdline_cmd(&mut st, &format!("1{}", info.name));
        let first_error = host.errors().first().cloned().unwrap_or_default();
        assert!(
            first_error.starts_with("E481: No range allowed"),
            "1{}: {:?}",
            info.name,
            host.errors()
        );
        checked += 1;
    }
    assert!(checked > 20);
}

#[test]
fn invert_twice_restores_each_bool() {
    let (mut st, _host) = editor();
    for &opt in Opt::all() {
        let spec = opt.spec();
        if !matches!(global(&st, opt), OptVal::Bool(_)) || spec.name == "compatible" {
            continue;
        }
        let before = global(&st, opt);
        let name = spec.name;
        if do_cmdline_cmd(&mut st, &format!("set inv{name} | set inv{name}")).is_err() {
            continue;
        }
        assert_eq!(global(&st, opt), before, "{name}");
    }
}

//
// Copyright (c) 2024 Jeff Garzik
//
// This file is part of the posixutils-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//

use crate::common::{run_test, run_test_in_dir, run_test_with_env, TestPlan};
use excmd::options::defs::CPO_ALL;

#[test]
fn test_commands_from_args() {
    run_test(TestPlan::new(&["-c", "echo 'hi'", "-c", "echo 1 + 2", "-c", "quit"], "").out("hi\n3\n"));
}

#[test]
fn test_commands_from_stdin() {
    run_test(
        TestPlan::new(&[], "let x = [1, 2, 3]\necho len(x)\nif x[0]\necho 'yes'\nendif\n")
            .out("3\nyes\n"),
    );
}

#[test]
fn test_error_exit_code() {
    run_test(
        TestPlan::new(&[], "foo\necho 'after'\n")
            .out("after\n")
            .err("E492: Not an editor command: foo\n")
            .code(1),
    );
}

#[test]
fn test_cquit() {
    run_test(TestPlan::new(&["-c", "cquit 5"], "echo 'unseen'\n").code(5));
    run_test(TestPlan::new(&[], "cquit\n").code(1));
}

#[test]
fn test_edit_and_write() {
    let dir = run_test_in_dir(
        TestPlan::new(&["-s", "in.txt"], "s/l/L/g\nw\nq\n").out("\"in.txt\" 1L, 6B written\n"),
        &[("in.txt", "hello\n")],
    );
    let text = std::fs::read_to_string(dir.join("in.txt")).unwrap();
    assert_eq!(text, "heLLo\n");
}

#[test]
fn test_quit_with_changes() {
    run_test_in_dir(
        TestPlan::new(&["-s", "in.txt"], "d\nq\nq!\n")
            .err("E37: No write since last change (add ! to override)\n")
            .code(1),
        &[("in.txt", "a\nb\n")],
    );
}

#[test]
fn test_init_script_and_source() {
    run_test_in_dir(
        TestPlan::new(
            &["-u", "init.vim", "-S", "s.vim", "-c", "echo g:x"],
            "echo 'stdin'\n",
        )
        .out("42\nsourced\n"),
        &[
            ("init.vim", "let g:x = 42\n"),
            ("s.vim", "echo 'sourced'\nqall!\n"),
        ],
    );
}

#[test]
fn test_posix_environment() {
    run_test_with_env(
        TestPlan::new(&[], "set cpo? shm?\n").out(&format!("  cpoptions={CPO_ALL}\n  shortmess=AS\n")),
        &[("VIM_POSIX", "1")],
    );
    run_test(TestPlan::new(&["--posix"], "set shm?\n").out("  shortmess=AS\n"));
}

#[test]
fn test_shell_from_environment() {
    run_test_with_env(
        TestPlan::new(&[], "set shell?\n").out("  shell=/bin/sh\n"),
        &[("SHELL", "/bin/sh")],
    );
}

#[test]
fn test_read_command_output() {
    run_test(TestPlan::new(&["-s"], "r !echo hi\n%p\nq!\n").out("hi\n"));
}

#[test]
fn test_global_print() {
    run_test_in_dir(
        TestPlan::new(&["-s", "f.txt"], "g/o/p\nv/o/d\n%p\nq!\n").out("foo\nbo\nfoo\nbo\n"),
        &[("f.txt", "foo\nbar\nbo\n")],
    );
}

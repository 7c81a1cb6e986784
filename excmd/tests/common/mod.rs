//
// Copyright (c) 2024 Jeff Garzik
//
// This file is part of the posixutils-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//

use std::io::Write;
use std::process::{Command, Output, Stdio};

pub struct TestPlan {
    pub args: Vec<String>,
    pub stdin_data: String,
    pub expected_out: String,
    pub expected_err: String,
    pub expected_exit_code: i32,
}

impl TestPlan {
    pub fn new(args: &[&str], stdin_data: &str) -> TestPlan {
        TestPlan {
            args: args.iter().map(|s| s.to_string()).collect(),
            stdin_data: stdin_data.to_string(),
            expected_out: String::new(),
            expected_err: String::new(),
            expected_exit_code: 0,
        }
    }

    pub fn out(mut self, text: &str) -> TestPlan {
        self.expected_out = text.to_string();
        self
    }

    pub fn err(mut self, text: &str) -> TestPlan {
        self.expected_err = text.to_string();
        self
    }

    pub fn code(mut self, code: i32) -> TestPlan {
        self.expected_exit_code = code;
        self
    }
}

/// Run the binary in `dir` with the given environment on top of a
/// cleared one.
pub fn run_test_base(
    args: &[String],
    stdin_data: &[u8],
    dir: Option<&std::path::Path>,
    env_vars: &[(&str, &str)],
) -> Output {
    let mut command = Command::new(env!("CARGO_BIN_EXE_excmd"));
    command
        .args(args)
        .env_remove("EXINIT")
        .env_remove("VIM_POSIX")
        .env_remove("RUST_LOG")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if let Some(dir) = dir {
        command.current_dir(dir);
    }
    for (key, value) in env_vars {
        command.env(key, value);
    }

    let mut child = command.spawn().expect("failed to spawn excmd");
    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(stdin_data)
            .expect("failed to write to stdin");
    }
    child.wait_with_output().expect("failed to wait for excmd")
}

pub fn check_output(plan: &TestPlan, output: &Output) {
    let stdout = String::from_utf8_lossy(&output.stdout);
    similar_asserts::assert_eq!(stdout, plan.expected_out);

    let stderr = String::from_utf8_lossy(&output.stderr);
    similar_asserts::assert_eq!(stderr, plan.expected_err);

    assert_eq!(output.status.code(), Some(plan.expected_exit_code));
}

pub fn run_test(plan: TestPlan) {
    let output = run_test_base(&plan.args, plan.stdin_data.as_bytes(), None, &[]);
    check_output(&plan, &output);
}

pub fn run_test_with_env(plan: TestPlan, env_vars: &[(&str, &str)]) {
    let output = run_test_base(&plan.args, plan.stdin_data.as_bytes(), None, env_vars);
    check_output(&plan, &output);
}

/// Run in a fresh temporary directory holding `files`; returns the
/// directory so the test can look at what was written.
pub fn run_test_in_dir(plan: TestPlan, files: &[(&str, &str)]) -> std::path::PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "excmd-test-{}-{}",
        std::process::id(),
        DIR_SEQ.fetch_add(1, std::sync::atomic::Ordering::SeqCst)
    ));
    std::fs::create_dir_all(&dir).expect("failed to create test directory");
    for (name, text) in files {
        std::fs::write(dir.join(name), text).expect("failed to write test file");
    }
    let output = run_test_base(&plan.args, plan.stdin_data.as_bytes(), Some(&dir), &[]);
    check_output(&plan, &output);
    dir
}

static DIR_SEQ: std::sync::atomic::AtomicUsize = std::sync::atomic::AtomicUsize::new(0);

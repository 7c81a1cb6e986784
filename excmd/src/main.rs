//
// Copyright (c) 2024 Jeff Garzik
//
// This file is part of the posixutils-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//

use clap::Parser;
use excmd::error::GetExitCode;

fn main() {
    env_logger::init();
    let args = excmd::Args::parse();

    let result = excmd::run(args);
    let code = match result {
        Ok(code) => code,
        Err(ref err) => {
            eprintln!("excmd: {err}");
            result.get_exit_code()
        }
    };
    std::process::exit(code);
}

//
// Copyright (c) 2024 Jeff Garzik
//
// This file is part of the posixutils-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//

//! Handlers of the built-in commands that are not part of the
//! control-flow machinery: text editing, files, windows, expressions
//! and scripts.

pub mod edit;
pub mod eval_cmds;
pub mod files;
pub mod source;
pub mod window;

// Copyright (c) The gallio-junit Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use clap::Parser;
use color_eyre::Result;
use gallio_junit_cli::{GallioJunitApp, GallioJunitExitCode};

fn main() -> Result<()> {
    color_eyre::install()?;
    let _ = enable_ansi_support::enable_ansi_support();

    let opts = GallioJunitApp::parse();
    let output = opts.init_output();

    match opts.exec(&mut std::io::stdout().lock()) {
        Ok(()) => std::process::exit(GallioJunitExitCode::OK),
        Err(error) => {
            error.display_to_stderr(&output.stderr_styles());
            std::process::exit(error.process_exit_code())
        }
    }
}

// Copyright (c) The prism Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

mod dispatch;
mod discover;

use clap::Parser;
use color_eyre::Result;
use dispatch::PrismApp;

fn main() -> Result<()> {
    color_eyre::install()?;
    let _ = enable_ansi_support::enable_ansi_support();

    let app = PrismApp::parse();
    match app.exec() {
        Ok(code) => std::process::exit(code),
        Err(error) => Err(error),
    }
}

//! scoreplay - plays a demo song through a SoundFont in the terminal
//!
//! Run with: cargo run -- [bank.sf2]
//! Without a bank, a small synthesized one is used.

mod app;
mod demo;
mod ui;

use app::App;

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    env_logger::init();

    let soundfont = std::env::args().nth(1).map(Into::into);
    App::new(demo::song()?, soundfont).run()
}

//! Manual test harness: spawns a shell in a PTY, feeds its output through
//! the terminal core, and dumps the projected grid to stdout on exit or
//! on a fixed tick. Not a full terminal UI — that lives outside this
//! crate's scope.

use std::time::Duration;

use clap::Parser;
use texelterm::pty::PortablePty;
use texelterm::{Controller, RuntimeConfig};

#[derive(Parser, Debug)]
#[command(name = "texelterm-demo", about = "Drive a shell through texelterm and print its screen")]
struct Args {
    /// Shell to spawn.
    #[arg(long, default_value = "/bin/sh")]
    shell: String,

    /// Columns.
    #[arg(long, default_value_t = 80)]
    cols: u16,

    /// Rows.
    #[arg(long, default_value_t = 24)]
    rows: u16,

    /// How long to run before dumping the screen and exiting.
    #[arg(long, default_value_t = 2)]
    seconds: u64,

    /// Persist scrollback to disk under the default history directory.
    #[arg(long)]
    persist_history: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    texelterm::logging::init();
    let args = Args::parse();
    let mut config = RuntimeConfig::default();
    if args.persist_history {
        config.persist_dir = RuntimeConfig::default_persist_dir();
    }

    let command = portable_pty::CommandBuilder::new(&args.shell);
    let pty = PortablePty::spawn(command, args.cols, args.rows)?;
    let mut reader = pty.take_reader()?;

    let ctrl = Controller::with_config(args.cols, args.rows, pty, &config);
    let ctrl_for_reader = std::sync::Arc::new(ctrl);
    let ctrl_reader = ctrl_for_reader.clone();

    let reader_task = tokio::task::spawn_blocking(move || {
        let mut buf = [0u8; 4096];
        loop {
            match std::io::Read::read(&mut reader, &mut buf) {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    let chunk = buf[..n].to_vec();
                    let ctrl = ctrl_reader.clone();
                    tokio::runtime::Handle::current().block_on(async {
                        let _ = ctrl.feed(&chunk).await;
                    });
                }
            }
        }
    });

    tokio::time::sleep(Duration::from_secs(args.seconds)).await;

    for r in 0..args.rows {
        let row = ctrl_for_reader.row(r).await;
        let text: String = row.cells.iter().map(|c| c.contents()).collect();
        println!("{text}");
    }

    drop(reader_task);
    Ok(())
}

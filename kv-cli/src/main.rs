mod config;
mod session;
mod trace;

use std::env;
use std::io::{stdin, IsTerminal};
use std::panic;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use kv::Store;
use log::info;

use config::ConfigLoad;
use session::Session;

#[derive(Debug, Parser, PartialEq)]
#[command(version, author, about, disable_help_flag = true)]
pub struct Args {
    #[clap(long, help = "Print help information")]
    help: bool,

    #[clap(short, long, help = "debug mode")]
    debug: bool,

    /// Configuration file path.
    #[clap(short = 'c', long = "config", help = "Configuration file path")]
    config: Option<String>,

    /// Path to the durability log.
    #[clap(long, help = "Path to the durability log file")]
    db: Option<String>,

    #[clap(short = 'l', long, default_value = "info")]
    log_level: String,

    #[clap(short = 'n', long, help = "Force non-interactive mode", default_value = "false")]
    non_interactive: bool,

    #[clap(long, require_equals = true, help = "Single query to execute, then exit")]
    query: Option<String>,
}

fn main() -> Result<()> {
    setup_panic_hooks();

    eprintln!();
    eprintln!("██  ██  █        █");
    eprintln!("██ ██   ██      ██");
    eprintln!("███      ██    ██");
    eprintln!("██ ██     ██  ██");
    eprintln!("██  ██     ████  KV Storage CLI");
    eprintln!();

    let mut cmd = <Args as clap::CommandFactory>::command();
    let args = Args::parse();
    if args.help {
        cmd.print_help()?;
        return Ok(());
    }
    if args.debug {
        println!("{args:?}");
    }

    let log_dir = format!("{}/.kvcli", env::var("HOME").unwrap_or_else(|_| ".".to_string()));
    let _guards = trace::init_logging(&log_dir, &args.log_level)?;
    info!("kvcli start args: {:?}", &args);

    let mut cfg = match args.config.as_deref().map(ConfigLoad::from_path) {
        Some(Ok(cfg)) => cfg,
        Some(Err(err)) => {
            eprintln!("warning: could not load config, using defaults: {err}");
            ConfigLoad::default()
        }
        None => ConfigLoad::default(),
    };
    if let Some(db) = args.db {
        cfg.db = db;
    }
    if args.debug {
        println!("{cfg:?}");
        eprintln!();
    }
    info!("kvcli start config: {:?}", &cfg);

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        eprintln!("received Ctrl+C!");
        r.store(false, Ordering::SeqCst);
    })
    .expect("Error setting Ctrl-C handler");

    let store = Store::open(&cfg.db)?;
    let is_repl = stdin().is_terminal() && !args.non_interactive && args.query.is_none();
    let mut session = Session::new(store, &cfg, running);

    info!("kvcli starting, prepare running with is_repl[{}]", is_repl);

    if is_repl {
        session.handle_repl()?;
        return Ok(());
    }

    match args.query {
        None => session.handle_reader(stdin().lock())?,
        Some(query) => session.handle_reader(std::io::Cursor::new(query))?,
    }

    Ok(())
}

fn setup_panic_hooks() {
    let meta = human_panic::Metadata {
        version: env!("CARGO_PKG_VERSION").into(),
        name: env!("CARGO_PKG_NAME").into(),
        authors: env!("CARGO_PKG_AUTHORS").replace(':', ", ").into(),
        homepage: env!("CARGO_PKG_HOMEPAGE").into(),
    };

    let default_hook = panic::take_hook();

    if env::var("RUST_BACKTRACE").is_err() {
        panic::set_hook(Box::new(move |info: &panic::PanicInfo| {
            default_hook(info);

            let file_path = human_panic::handle_dump(&meta, info);
            human_panic::print_msg(file_path, &meta)
                .expect("human-panic: printing error message to console failed");
        }));
    }
}

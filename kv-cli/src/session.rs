use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use kv::{Outcome, Store};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use crate::config::ConfigLoad;

const DEFAULT_PROMPT: &str = "kvcli";

pub struct Session {
    store: Store,
    prompt: String,
    show_stats: bool,
    running: Arc<AtomicBool>,
}

impl Session {
    pub fn new(store: Store, settings: &ConfigLoad, running: Arc<AtomicBool>) -> Self {
        Self {
            store,
            prompt: settings.prompt.clone().unwrap_or_else(|| DEFAULT_PROMPT.to_string()),
            show_stats: settings.show_stats.unwrap_or(false),
            running,
        }
    }

    pub fn handle_repl(&mut self) -> Result<()> {
        println!("Welcome to kvcli.");
        println!();

        let mut rl = DefaultEditor::new()?;
        let history = history_path();
        let _ = rl.load_history(&history);

        loop {
            match rl.readline(&format!("{} > ", self.prompt.trim_end())) {
                Ok(line) => {
                    let _ = rl.add_history_entry(line.as_str());
                    if self.run_line(&line) {
                        break;
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    println!("^C");
                    continue;
                }
                Err(ReadlineError::Eof) => break,
                Err(err) => {
                    eprintln!("error: {err}");
                    break;
                }
            }
        }

        let _ = rl.save_history(&history);
        println!("Bye~");
        Ok(())
    }

    pub fn handle_reader<R: BufRead>(&mut self, r: R) -> Result<()> {
        for line in r.lines() {
            if !self.running.load(Ordering::SeqCst) {
                break;
            }
            let line = line?;
            if self.run_line(&line) {
                break;
            }
        }

        if self.show_stats {
            let status = self.store.status();
            eprintln!("keys={} size={}", status.keys, status.size);
        }

        Ok(())
    }

    /// Runs one line, printing its reply. Returns `true` if the session should end.
    fn run_line(&mut self, line: &str) -> bool {
        let line = line.trim();
        if line.is_empty() {
            return false;
        }
        let tokens: Vec<&str> = line.split_whitespace().collect();
        match self.store.dispatch(&tokens) {
            Outcome::Exit => true,
            Outcome::Reply(lines) => {
                for reply in lines {
                    println!("{reply}");
                }
                false
            }
        }
    }
}

fn history_path() -> String {
    format!("{}/.kvcli_history", std::env::var("HOME").unwrap_or_else(|_| ".".to_string()))
}

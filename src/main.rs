//! sclink - send SuperCollider code to a running sclang.
//!
//! # Usage
//!
//! ```bash
//! sclink eval live.scd --line 12 --column 5
//! sclink eval-file --watch live.scd
//! sclink boot
//! sclink lsp --launch
//! ```

use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use sclink::config::{
    ConfigFlags, clear_config_flags, global_config_path, load_config_flags, local_override_path,
    save_config_flags,
};
use sclink::document::{Document, Position, Range, TextSource};
use sclink::eval::EvalTarget;
use sclink::flash;
use sclink::help;
use sclink::lsp;
use sclink::session::{Connect, Session};
use sclink::watcher::{SAVE_DEBOUNCE, SourceWatcher};

/// Send SuperCollider code from any editor to a running sclang
#[derive(Parser, Debug)]
#[command(name = "sclink", version, about, long_about = None)]
struct Cli {
    /// Path to the sclang executable
    #[arg(long, value_name = "PATH", global = true)]
    sclang_path: Option<PathBuf>,

    /// Host sclang listens on for OSC (also used for the language server)
    #[arg(long, value_name = "HOST", global = true)]
    osc_host: Option<String>,

    /// sclang's OSC port
    #[arg(long, value_name = "PORT", global = true, allow_negative_numbers = true)]
    osc_port: Option<i64>,

    /// Language server TCP port
    #[arg(long, value_name = "PORT", global = true, allow_negative_numbers = true)]
    lsp_port: Option<i64>,

    /// Never connect to the language server
    #[arg(long, global = true)]
    no_language_server: bool,

    /// Do not echo evaluated code or print status
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

/// 1-based cursor location.
#[derive(Args, Debug, Clone, Copy)]
struct CursorArgs {
    /// Cursor line (1-based)
    #[arg(long, default_value_t = 1)]
    line: usize,

    /// Cursor column in characters (1-based)
    #[arg(long, default_value_t = 1)]
    column: usize,
}

impl CursorArgs {
    const fn position(self) -> Position {
        Position::new(self.line.saturating_sub(1), self.column.saturating_sub(1))
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Evaluate the selection, the enclosing block, or the cursor's line
    Eval {
        /// Source file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        #[command(flatten)]
        cursor: CursorArgs,

        /// End of a selection starting at the cursor, as LINE:COLUMN
        #[arg(long, value_name = "LINE:COLUMN", value_parser = parse_line_column)]
        to: Option<Position>,
    },

    /// Evaluate a whole file
    EvalFile {
        /// Source file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Evaluate again every time the file is saved
        #[arg(short, long)]
        watch: bool,
    },

    /// Boot the default server
    Boot,

    /// Quit the default server
    Quit,

    /// Free every node on the default server
    Stop,

    /// Find help for the class under the cursor or a named class
    Help {
        /// Source file to take the symbol from
        #[arg(value_name = "FILE", required_unless_present = "symbol")]
        file: Option<PathBuf>,

        #[command(flatten)]
        cursor: CursorArgs,

        /// Class name to look up instead of reading a file
        #[arg(long, conflicts_with = "file")]
        symbol: Option<String>,

        /// Open the help with the system handler
        #[arg(long)]
        open: bool,
    },

    /// Print the block that would be evaluated at the cursor
    Locate {
        /// Source file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        #[command(flatten)]
        cursor: CursorArgs,

        /// Print JSON instead of the code
        #[arg(long)]
        json: bool,
    },

    /// Bridge stdio to the language server
    Lsp {
        /// Launch sclang with the language server if it is not reachable
        #[arg(long)]
        launch: bool,
    },

    /// Show the connection indicator
    Status,

    /// Manage saved defaults
    Config {
        /// Save the global flags given on this command line as defaults
        #[arg(long)]
        save: bool,

        /// Remove saved defaults
        #[arg(long)]
        clear: bool,

        /// Print the effective configuration
        #[arg(long)]
        show: bool,
    },
}

fn parse_line_column(s: &str) -> Result<Position, String> {
    let (line, column) = s
        .split_once(':')
        .ok_or_else(|| format!("expected LINE:COLUMN, got {s:?}"))?;
    let line: usize = line.trim().parse().map_err(|_| format!("bad line {line:?}"))?;
    let column: usize = column
        .trim()
        .parse()
        .map_err(|_| format!("bad column {column:?}"))?;
    Ok(Position::new(line.saturating_sub(1), column.saturating_sub(1)))
}

impl Cli {
    fn flags(&self) -> ConfigFlags {
        ConfigFlags {
            sclang_path: self.sclang_path.clone(),
            osc_host: self.osc_host.clone(),
            osc_port: self.osc_port,
            lsp_port: self.lsp_port,
            no_language_server: self.no_language_server,
            quiet: self.quiet,
        }
    }
}

fn open_document(path: &Path) -> Result<Document> {
    Document::open(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn echo_target(quiet: bool, target: &EvalTarget) {
    if quiet || !io::stderr().is_terminal() {
        return;
    }
    if let Err(err) = flash::echo(&mut io::stderr().lock(), target) {
        tracing::debug!(%err, "could not echo evaluated code");
    }
}

fn report(quiet: bool, message: impl AsRef<str>) {
    if !quiet {
        eprintln!("{}", message.as_ref());
    }
}

fn run_command(session: &mut Session, command: Command, quiet: bool) -> Result<()> {
    match command {
        Command::Eval { file, cursor, to } => {
            let doc = open_document(&file)?;
            let start = cursor.position();
            let selection = to.map_or_else(|| Range::cursor(start), |end| Range::new(start, end));
            match session.eval_selection(&doc, selection)? {
                Some(target) => echo_target(quiet, &target),
                None => report(quiet, "Nothing to evaluate"),
            }
        }
        Command::EvalFile { file, watch } => {
            eval_file(session, &file, quiet)?;
            if watch {
                watch_file(session, &file, quiet)?;
            }
        }
        Command::Boot => {
            session.boot_server()?;
            report(quiet, "Booting SuperCollider server...");
        }
        Command::Quit => {
            // Each invocation has its own socket; open it before quitting.
            session.connect()?;
            session.quit_server()?;
            report(quiet, "Quitting SuperCollider server...");
        }
        Command::Stop => session.stop_sound()?,
        Command::Help {
            file,
            cursor,
            symbol,
            open,
        } => {
            let target = match (symbol, file) {
                (Some(symbol), _) => session.help_for_symbol(&symbol),
                (None, Some(file)) => session.open_help(&open_document(&file)?, cursor.position())?,
                (None, None) => anyhow::bail!("either FILE or --symbol is required"),
            };
            println!("{target}");
            if open {
                help::open_external(&target).context("Failed to open help")?;
            }
        }
        Command::Locate { file, cursor, json } => {
            let doc = open_document(&file)?;
            let block = doc.enclosing_block(cursor.position());
            print_block(&doc, block, json)?;
        }
        Command::Lsp { launch } => {
            let Some(stream) = session.start_language_server(launch)? else {
                report(quiet, "Language Server disabled in configuration");
                return Ok(());
            };
            report(quiet, session.status().to_string());
            let result = lsp::run(stream, io::stdin(), &mut io::stdout().lock());
            session.language_server_stopped();
            result.context("Language server bridge failed")?;
        }
        Command::Status => {
            match session.connect()? {
                Connect::Connected => report(quiet, "Connected to sclang via OSC"),
                Connect::AlreadyConnected => report(quiet, "Already connected to sclang"),
            }
            println!("{}", session.status());
        }
        Command::Config { .. } => {}
    }
    Ok(())
}

fn print_block(doc: &Document, block: Option<Range>, json: bool) -> Result<()> {
    if json {
        let value = block.map_or(serde_json::Value::Null, |range| {
            serde_json::json!({
                "start": { "line": range.start.line + 1, "column": range.start.column + 1 },
                "end": { "line": range.end.line + 1, "column": range.end.column + 1 },
                "code": doc.slice(range),
            })
        });
        println!("{}", serde_json::to_string(&value)?);
        return Ok(());
    }
    match block {
        Some(range) => println!("{}", doc.slice(range)),
        None => anyhow::bail!("No enclosing block at the cursor"),
    }
    Ok(())
}

fn eval_file(session: &mut Session, file: &Path, quiet: bool) -> Result<()> {
    let doc = open_document(file)?;
    match session.eval_file(&doc)? {
        Some(target) => {
            report(quiet, format!("Evaluating {}...", file.display()));
            echo_target(quiet, &target);
        }
        None => report(quiet, "Nothing to evaluate"),
    }
    Ok(())
}

fn watch_file(session: &mut Session, file: &Path, quiet: bool) -> Result<()> {
    let mut watcher = SourceWatcher::new(file, SAVE_DEBOUNCE)
        .with_context(|| format!("Failed to watch {}", file.display()))?;
    report(quiet, format!("Watching {} (Ctrl-C to stop)", watcher.file().display()));
    loop {
        if watcher.poll_saved() {
            if let Err(err) = eval_file(session, file, quiet) {
                eprintln!("[warn] {err:#}");
            }
        }
        thread::sleep(Duration::from_millis(100));
    }
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let cli = Cli::parse();
    let global_path = global_config_path();
    let local_path = local_override_path();
    let cli_flags = cli.flags();

    if let Command::Config { save, clear, show } = &cli.command {
        if *clear {
            clear_config_flags(&global_path)?;
            eprintln!("Cleared {}", global_path.display());
        }
        if *save {
            save_config_flags(&global_path, &cli_flags)?;
            eprintln!("Saved defaults to {}", global_path.display());
        }
        if *show || !(*save || *clear) {
            let file_flags = load_config_flags(&global_path)?.union(&load_config_flags(&local_path)?);
            println!("{}", file_flags.union(&cli_flags).resolve());
        }
        return Ok(());
    }

    let global_flags = load_config_flags(&global_path)?;
    let local_flags = load_config_flags(&local_path)?;
    let effective = global_flags.union(&local_flags).union(&cli_flags).resolve();
    let quiet = effective.quiet;

    let mut session = Session::new(effective)?;
    let result = run_command(&mut session, cli.command, quiet);
    if let Err(err) = session.shutdown() {
        tracing::warn!(%err, "shutdown failed");
    }
    result
}

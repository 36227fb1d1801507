//! KotoTerm - line-oriented front-end
//!
//! Reads lines from stdin, translates them and runs them in a shell session.
//! Lines starting with `:` are front-end commands.

use std::env;
use std::io::Write;
use std::path::PathBuf;
use std::process;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, error, info, warn};

use kototerm::bus::{BusEvent, CoreService, OutputKind, Request, Response};
use kototerm::config::settings::SettingsUpdate;
use kototerm::error::Result;
use kototerm::pty::EventSubscription;
use kototerm::session::AiTool;
use kototerm::translate::CommandCategory;

/// Command line options
#[derive(Debug, Default)]
struct AppArgs {
    /// Configuration file path
    config_path: Option<PathBuf>,
    /// Enable debug logging
    debug: bool,
}

impl AppArgs {
    fn parse() -> Result<Self> {
        let args: Vec<String> = env::args().collect();
        let mut app_args = AppArgs::default();

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--config" | "-c" => {
                    if i + 1 < args.len() {
                        app_args.config_path = Some(PathBuf::from(&args[i + 1]));
                        i += 1;
                    } else {
                        return Err("Missing config file path".into());
                    }
                }
                "--debug" | "-d" => {
                    app_args.debug = true;
                }
                "--help" | "-h" => {
                    print_help();
                    process::exit(0);
                }
                "--version" | "-V" => {
                    println!("{} v{}", kototerm::NAME, kototerm::VERSION);
                    process::exit(0);
                }
                arg if arg.starts_with('-') => {
                    return Err(format!("Unknown option: {}", arg).into());
                }
                other => {
                    warn!("Ignoring positional argument: {}", other);
                }
            }
            i += 1;
        }

        Ok(app_args)
    }
}

fn print_help() {
    println!("KotoTerm - natural-language command front-end");
    println!();
    println!("USAGE:");
    println!("    kototerm [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("    -c, --config <PATH>    Path to configuration file");
    println!("    -d, --debug            Enable debug logging");
    println!("    -h, --help             Print this help message");
    println!("    -V, --version          Print version information");
    println!();
    print_commands();
    println!();
    println!("CONFIGURATION:");
    println!("    1. Path specified with --config");
    println!("    2. ./kototerm.toml");
    println!("    3. $XDG_CONFIG_HOME/kototerm/config.toml (or config.json)");
    println!("    4. Built-in defaults");
    println!();
    println!("ENVIRONMENT:");
    println!("    KOTOTERM_DEBUG    Enable debug logging (1 or true)");
    println!("    RUST_LOG          Logging filter (error, warn, info, debug, trace)");
}

fn print_commands() {
    println!("COMMANDS:");
    println!("    <text>                     Translate and run in the shell");
    println!("    :claude|:codex|:gemini <prompt>");
    println!("                               Start an AI tool with a prompt");
    println!("    :stop <tool>               Stop an AI tool");
    println!("    :preview <text>            Show the translation only");
    println!("    :aliases                   List aliases by category");
    println!("    :alias <phrase> <command>  Add or override an alias");
    println!("    :unalias <phrase>          Remove a user alias");
    println!("    :history [query]           Show recent or matching history");
    println!("    :history on|off            Turn history recording on or off");
    println!("    :clear                     Reset the terminal log");
    println!("    :quit                      Stop all sessions and exit");
}

fn init_logging(debug: bool) {
    let env_debug = env::var("KOTOTERM_DEBUG")
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);
    let log_level = if debug || env_debug { "debug" } else { "info" };

    let env_filter = env::var("RUST_LOG").unwrap_or_else(|_| log_level.to_string());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(env_filter))
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = AppArgs::parse().unwrap_or_else(|e| {
        eprintln!("Failed to parse arguments: {}", e);
        print_help();
        process::exit(1);
    });

    init_logging(args.debug);
    info!("Starting {} v{}", kototerm::NAME, kototerm::VERSION);

    let config = kototerm::init(args.config_path.as_deref())?;
    let core = CoreService::new(config)?;
    let printer = tokio::spawn(print_events(core.subscribe()));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim_end();
        if line.trim().is_empty() {
            continue;
        }
        match run_line(&core, line).await {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => error!("{}", e),
        }
    }

    core.shutdown().await;
    printer.abort();
    info!("{} shutdown complete", kototerm::NAME);
    Ok(())
}

/// Handle one input line; `Ok(false)` means quit
async fn run_line(core: &CoreService, line: &str) -> Result<bool> {
    let Some(rest) = line.strip_prefix(':') else {
        let preview = core.preview(line);
        if !preview.is_passthrough() {
            println!("→ {}", preview.command);
        }
        core.run_input(line).await?;
        return Ok(true);
    };

    let (command, argument) = match rest.split_once(char::is_whitespace) {
        Some((command, argument)) => (command, argument.trim()),
        None => (rest, ""),
    };
    debug!(command, argument, "Front-end command");

    match command {
        "quit" | "q" => return Ok(false),
        "help" => print_commands(),
        "claude" | "codex" | "gemini" => {
            let tool: AiTool = command.parse()?;
            core.handle(Request::AiExecute {
                prompt: argument.to_string(),
                tool,
            })
            .await?;
        }
        "stop" => {
            let tool: AiTool = argument.parse()?;
            core.handle(Request::AiStop { tool }).await?;
        }
        "preview" => {
            let preview = core.preview(argument);
            println!("{} → {}", preview.original, preview.command);
            for alias in &preview.aliases_used {
                println!("    {} = {}", alias.key, alias.value);
            }
        }
        "aliases" => core.with_engine(|engine| {
            for category in CommandCategory::all() {
                println!("[{}]", category);
                for entry in engine.aliases().by_category(category) {
                    println!("    {:<16} {:<28} {}", entry.phrase, entry.command, entry.description);
                }
            }
        }),
        "alias" => match argument.split_once(char::is_whitespace) {
            Some((phrase, value)) => {
                core.handle(Request::SettingsSetAlias {
                    key: phrase.to_string(),
                    value: value.trim().to_string(),
                })
                .await?;
            }
            None => eprintln!("usage: :alias <phrase> <command>"),
        },
        "unalias" => {
            core.handle(Request::SettingsDeleteAlias {
                key: argument.to_string(),
            })
            .await?;
        }
        "history" if argument == "on" || argument == "off" => {
            core.handle(Request::SettingsSet {
                settings: SettingsUpdate::history_enabled(argument == "on"),
            })
            .await?;
        }
        "history" => {
            let query = (!argument.is_empty()).then(|| argument.to_string());
            if let Response::History(entries) = core
                .handle(Request::HistoryGet {
                    limit: Some(20),
                    query,
                })
                .await?
            {
                for entry in entries.iter().rev() {
                    let record = &entry.record;
                    let shown = record.converted.as_deref().unwrap_or(&record.input);
                    println!(
                        "{}  {:<24} {}",
                        entry.timestamp.format("%H:%M:%S"),
                        record.input,
                        shown
                    );
                }
            }
        }
        "clear" => {
            core.handle(Request::TerminalClear).await?;
        }
        other => eprintln!("Unknown command ':{}', try :help", other),
    }

    Ok(true)
}

async fn print_events(mut events: EventSubscription<BusEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            BusEvent::AiOutput {
                data,
                kind: OutputKind::Error,
            } => eprintln!("{}", data),
            BusEvent::TerminalOutput { data, .. } | BusEvent::AiOutput { data, .. } => {
                let mut stdout = std::io::stdout().lock();
                if stdout.write_all(data.as_bytes()).and_then(|_| stdout.flush()).is_err() {
                    break;
                }
            }
            BusEvent::AiStarted { tool } => println!("[{} started]", tool),
            BusEvent::AiFinished { tool, exit_code } => match exit_code {
                Some(code) => println!("[{} finished: {}]", tool, code),
                None => println!("[{} finished]", tool),
            },
            BusEvent::HistoryToggled { enabled } => {
                println!("[history {}]", if enabled { "on" } else { "off" })
            }
            BusEvent::SettingsChanged(_) => debug!("Settings changed"),
        }
    }
}

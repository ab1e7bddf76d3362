mod commands;
mod connection;
mod format;
mod repl;

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use cinder_protocol::Frame;
use colored::Colorize;

use crate::connection::{Connection, ConnectionError};
use crate::format::format_response;

/// Command-line client for cinder.
///
/// With a subcommand, runs it and exits; without one, starts the
/// interactive prompt.
#[derive(Debug, Parser)]
#[command(name = "cinder-cli", version, about)]
struct Args {
    /// Server host.
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Server port.
    #[arg(long, default_value_t = 6379)]
    port: u16,

    /// Password for AUTH.
    #[arg(long)]
    password: Option<String>,

    /// Log verbosity for the client itself.
    #[arg(long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Cmd>,
}

#[derive(Debug, Subcommand)]
enum Cmd {
    /// Store a string value.
    Set { key: String, value: String },
    /// Fetch a string value.
    Get { key: String },
    /// Delete one or more keys.
    Del {
        #[arg(required = true)]
        keys: Vec<String>,
    },
    /// List keys matching a glob pattern.
    Keys { pattern: String },
    /// Print server statistics.
    Info,
    /// Stream every command the server executes.
    Monitor,
    /// Clear the current database.
    Flushdb,
    /// Count keys in the current database.
    Dbsize,
    /// Liveness check.
    Ping,
    /// Print the server clock.
    Time,
    /// Inspect the slow command log.
    Slowlog {
        #[arg(default_value = "GET")]
        sub: String,
        count: Option<usize>,
    },
    /// Read a configuration value.
    Config { parameter: String },
}

impl Cmd {
    fn tokens(&self) -> Vec<String> {
        match self {
            Cmd::Set { key, value } => vec!["SET".into(), key.clone(), value.clone()],
            Cmd::Get { key } => vec!["GET".into(), key.clone()],
            Cmd::Del { keys } => {
                let mut tokens = vec!["DEL".to_string()];
                tokens.extend(keys.iter().cloned());
                tokens
            }
            Cmd::Keys { pattern } => vec!["KEYS".into(), pattern.clone()],
            Cmd::Info => vec!["INFO".into()],
            Cmd::Monitor => vec!["MONITOR".into()],
            Cmd::Flushdb => vec!["FLUSHDB".into()],
            Cmd::Dbsize => vec!["DBSIZE".into()],
            Cmd::Ping => vec!["PING".into()],
            Cmd::Time => vec!["TIME".into()],
            Cmd::Slowlog { sub, count } => {
                let mut tokens = vec!["SLOWLOG".to_string(), sub.clone()];
                if let Some(count) = count {
                    tokens.push(count.to_string());
                }
                tokens
            }
            Cmd::Config { parameter } => {
                vec!["CONFIG".into(), "GET".into(), parameter.clone()]
            }
        }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_new(&args.log_level)
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    match args.command {
        None => {
            let code = repl::run_repl(&args.host, args.port, args.password.as_deref());
            ExitCode::from(code as u8)
        }
        Some(ref cmd) => match run_one_shot(&args, cmd) {
            Ok(code) => code,
            Err(e) => {
                eprintln!("{}", format!("error: {e}").red());
                ExitCode::FAILURE
            }
        },
    }
}

fn run_one_shot(args: &Args, cmd: &Cmd) -> Result<ExitCode, ConnectionError> {
    let rt = tokio::runtime::Runtime::new().map_err(ConnectionError::Io)?;
    rt.block_on(async {
        let mut conn = Connection::connect(&args.host, args.port).await?;
        if let Some(pw) = &args.password {
            conn.authenticate(pw).await?;
        }

        if matches!(cmd, Cmd::Monitor) {
            let reply = conn.send_command(&cmd.tokens()).await?;
            println!("{}", format_response(&reply));
            monitor_stream(&mut conn).await?;
            return Ok(ExitCode::SUCCESS);
        }

        let reply = conn.send_command(&cmd.tokens()).await?;
        println!("{}", format_response(&reply));
        Ok(if matches!(reply, Frame::Error(_)) {
            ExitCode::FAILURE
        } else {
            ExitCode::SUCCESS
        })
    })
}

/// Prints monitor feed lines until the server closes the connection.
pub(crate) async fn monitor_stream(conn: &mut Connection) -> Result<(), ConnectionError> {
    loop {
        let frame = conn.read_reply().await?;
        println!("{}", format_response(&frame));
    }
}

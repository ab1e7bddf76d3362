//! Interactive REPL.
//!
//! Uses rustyline for line editing and history. Lines are tokenized
//! (with double-quote support) and sent as raw command arrays, with no
//! client-side validation, the server decides what's valid.

use std::io::Write;

use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tokio::runtime::Runtime;

use crate::commands::COMMANDS;
use crate::connection::{Connection, ConnectionError};
use crate::format::format_response;
use crate::monitor_stream;

/// Runs the interactive loop. Blocks the calling thread; a dedicated
/// runtime drives the connection because rustyline needs the main
/// thread for terminal I/O.
pub fn run_repl(host: &str, port: u16, password: Option<&str>) -> i32 {
    let rt = match Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("{}", format!("failed to create runtime: {e}").red());
            return 1;
        }
    };

    let mut conn = match rt.block_on(connect(host, port, password)) {
        Ok(conn) => conn,
        Err(e) => {
            eprintln!("{}", format!("could not connect to {host}:{port}: {e}").red());
            return 1;
        }
    };

    let mut rl = match DefaultEditor::new() {
        Ok(editor) => editor,
        Err(e) => {
            eprintln!("{}", format!("failed to create editor: {e}").red());
            return 1;
        }
    };

    let prompt = format!("{host}:{port}> ");

    loop {
        match rl.readline(&prompt) {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(trimmed);

                // local commands never reach the server
                let first = trimmed.split_whitespace().next().unwrap_or("");
                match first.to_lowercase().as_str() {
                    "quit" | "exit" => return 0,
                    "clear" => {
                        print!("\x1B[2J\x1B[1;1H");
                        let _ = std::io::stdout().flush();
                        continue;
                    }
                    "help" => {
                        print_help();
                        continue;
                    }
                    _ => {}
                }

                let tokens = match tokenize(trimmed) {
                    Ok(tokens) => tokens,
                    Err(e) => {
                        eprintln!("{}", format!("parse error: {e}").red());
                        continue;
                    }
                };
                if tokens.is_empty() {
                    continue;
                }

                if tokens[0].eq_ignore_ascii_case("MONITOR") {
                    // ack first, then stream until the server closes
                    // or Ctrl-C kills the process
                    match rt.block_on(conn.send_command(&tokens)) {
                        Ok(frame) => {
                            println!("{}", format_response(&frame));
                            if let Err(e) = rt.block_on(monitor_stream(&mut conn)) {
                                eprintln!("{}", format!("monitor ended: {e}").red());
                            }
                        }
                        Err(e) => eprintln!("{}", format!("error: {e}").red()),
                    }
                    continue;
                }

                match rt.block_on(conn.send_command(&tokens)) {
                    Ok(frame) => println!("{}", format_response(&frame)),
                    Err(ConnectionError::Disconnected) => {
                        eprintln!("{}", "server disconnected, reconnecting...".yellow());
                        match rt.block_on(connect(host, port, password)) {
                            Ok(new_conn) => {
                                conn = new_conn;
                                eprintln!("{}", "reconnected".green());
                            }
                            Err(e) => {
                                eprintln!("{}", format!("reconnection failed: {e}").red());
                                return 1;
                            }
                        }
                    }
                    Err(e) => eprintln!("{}", format!("error: {e}").red()),
                }
            }
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => return 0,
            Err(e) => {
                eprintln!("{}", format!("readline error: {e}").red());
                return 1;
            }
        }
    }
}

async fn connect(
    host: &str,
    port: u16,
    password: Option<&str>,
) -> Result<Connection, ConnectionError> {
    let mut conn = Connection::connect(host, port).await?;
    if let Some(pw) = password {
        conn.authenticate(pw).await?;
    }
    Ok(conn)
}

fn print_help() {
    for (group, entries) in COMMANDS {
        println!("{}", group.bold());
        for help in *entries {
            println!("  {:<14} {:<40} {}", help.name, help.args, help.summary);
        }
        println!();
    }
    println!("local: help, clear, quit");
}

/// Splits a line into tokens, honouring double quotes.
pub fn tokenize(line: &str) -> Result<Vec<String>, String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' => {
                if in_quotes {
                    tokens.push(std::mem::take(&mut current));
                    in_quotes = false;
                } else {
                    in_quotes = true;
                }
            }
            '\\' if in_quotes => match chars.next() {
                Some('n') => current.push('\n'),
                Some('t') => current.push('\t'),
                Some(other) => current.push(other),
                None => return Err("trailing backslash".into()),
            },
            c if c.is_whitespace() && !in_quotes => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }

    if in_quotes {
        return Err("unbalanced quotes".into());
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    Ok(tokens)
}

//! `strata chat`: single-message or interactive sessions.

use std::future::Future;
use std::io::Write;
use std::path::PathBuf;

use strata_agent::{Reply, Session, TurnOutcome};
use strata_core::{OutputStream, RawAction};
use strata_tools::ProcessRegistry;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::info;

use super::{CliResult, build_session, load_config, print_results, spawn_printer};

pub struct ChatOptions {
    pub workspace: Option<PathBuf>,
    pub message: Option<String>,
    pub persona: Option<String>,
    pub auto_apply: bool,
    pub max_turns: u32,
}

pub async fn run(opts: ChatOptions) -> CliResult {
    let config = load_config()?;
    let output = OutputStream::default();
    let _printer = spawn_printer(&output);
    let mut session = build_session(&config, opts.workspace.clone(), output, opts.persona.clone())?;
    let registry = session.executor().registry().clone();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    match opts.message.as_deref() {
        Some(message) => {
            let turn = session.run_turn(message, opts.auto_apply);
            let outcome = relay_input_while(turn, &mut lines, &registry).await??;
            render(&outcome);
            if opts.auto_apply {
                auto_continue(&mut session, &outcome, opts.max_turns, &mut lines).await?;
            }
        }
        None => interactive(&mut session, &opts, &mut lines).await?,
    }
    Ok(())
}

/// Drive `turn` to completion while relaying typed lines to the running
/// process. `/kill` stops every process; any other line (an `/input `
/// prefix is optional) is written to its stdin.
pub async fn relay_input_while<T, R>(
    turn: impl Future<Output = T>,
    lines: &mut Lines<R>,
    registry: &ProcessRegistry,
) -> std::io::Result<T>
where
    R: AsyncBufRead + Unpin,
{
    tokio::pin!(turn);
    let mut stdin_open = true;
    loop {
        tokio::select! {
            biased;
            out = &mut turn => return Ok(out),
            line = lines.next_line(), if stdin_open => match line? {
                Some(line) => relay_line(&line, registry),
                None => stdin_open = false,
            },
        }
    }
}

fn relay_line(line: &str, registry: &ProcessRegistry) {
    match line.trim() {
        "/kill" => {
            let killed = registry.kill_all();
            println!("  Killed {killed} process(es).");
        }
        other => {
            let text = other.strip_prefix("/input").map_or(line, str::trim_start);
            if !registry.forward_input(format!("{text}\n")) {
                println!("  No running process to send input to; the turn is still in progress.");
            }
        }
    }
}

/// Keep asking the model to continue while each turn still applies actions.
async fn auto_continue(
    session: &mut Session,
    first: &TurnOutcome,
    max_turns: u32,
    lines: &mut Lines<BufReader<Stdin>>,
) -> CliResult {
    let registry = session.executor().registry().clone();
    let mut applied = !first.results.is_empty();
    let mut turns = 1;
    while applied && turns < max_turns {
        info!(turn = turns + 1, max_turns, "Auto-continuing");
        let outcome = relay_input_while(session.continue_task(true), lines, &registry).await??;
        render(&outcome);
        applied = !outcome.results.is_empty();
        turns += 1;
    }
    Ok(())
}

fn render(outcome: &TurnOutcome) {
    render_reply(&outcome.reply);
    print_results(&outcome.results);
}

fn render_reply(reply: &Reply) {
    println!();
    for line in reply.display_text.lines() {
        println!("  Strata > {line}");
    }
    print_results(&reply.blocked);
    if !reply.actions.is_empty() {
        println!("  Proposed actions:");
        for (i, action) in reply.actions.iter().enumerate() {
            println!("    {}. {}", i + 1, action.describe());
        }
    }
    println!();
}

const HELP: &str = "\
  /apply            run the proposed actions
  /continue         ask the agent to keep going
  /persona <key>    switch persona (`none` to clear)
  /clear            rebuild the workspace snapshot on the next turn
  /kill             stop background processes
  /input <text>     send a line to the running process
  exit              quit
  While a turn is running, typed lines go to the running command's stdin.";

async fn interactive(
    session: &mut Session,
    opts: &ChatOptions,
    lines: &mut Lines<BufReader<Stdin>>,
) -> CliResult {
    let registry = session.executor().registry().clone();
    println!();
    println!("  Strata — interactive mode");
    if let Some(ws) = session.executor().workspace() {
        println!("  Workspace: {}", ws.display());
    }
    if let Some(persona) = session.persona() {
        println!("  Persona:   {} ({})", persona.display_name, persona.role);
    }
    println!("  Type /help for commands, 'exit' to quit.");
    println!();

    let mut pending: Vec<RawAction> = Vec::new();

    loop {
        print!("  You > ");
        std::io::stdout().flush()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        let (command, arg) = line.split_once(' ').unwrap_or((line, ""));

        let turn = match command {
            "" => continue,
            "exit" | "quit" => break,
            "/help" => {
                println!("{HELP}");
                continue;
            }
            "/apply" => {
                if pending.is_empty() {
                    println!("  Nothing to apply.");
                } else {
                    let actions = std::mem::take(&mut pending);
                    let results = relay_input_while(session.apply(&actions), lines, &registry).await?;
                    print_results(&results);
                }
                continue;
            }
            "/persona" => {
                let key = arg.trim();
                session.set_persona((!key.is_empty() && key != "none").then(|| key.to_string()));
                match session.persona() {
                    Some(p) => println!("  Persona: {} ({})", p.display_name, p.role),
                    None => println!("  No persona; tools unrestricted."),
                }
                continue;
            }
            "/clear" => {
                session.clear_context_cache();
                println!("  Workspace context cache cleared.");
                continue;
            }
            "/kill" => {
                let killed = session.executor().registry().kill_all();
                println!("  Killed {killed} process(es).");
                continue;
            }
            "/input" => {
                if !session.forward_input(&format!("{arg}\n")) {
                    println!("  No running process.");
                }
                continue;
            }
            "/continue" => {
                relay_input_while(session.continue_task(opts.auto_apply), lines, &registry).await?
            }
            _ => relay_input_while(session.run_turn(line, opts.auto_apply), lines, &registry).await?,
        };

        match turn {
            Ok(outcome) => {
                render(&outcome);
                pending = if opts.auto_apply {
                    Vec::new()
                } else {
                    outcome.reply.actions
                };
                if !pending.is_empty() {
                    println!("  Type /apply to run them.");
                }
            }
            Err(e) => eprintln!("  [Error] {e}"),
        }
    }

    println!("\n  Goodbye!\n");
    Ok(())
}

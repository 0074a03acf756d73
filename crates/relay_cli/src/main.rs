use std::{path::PathBuf, process::ExitCode};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use codex_runner::RunRequest;
use relay_cli::{
    config::{RelayConfig, DEFAULT_CONFIG_FILE},
    logging::{effective_level, init_logging},
    relay::relay_run,
    replay::{replay_file, ReplayFormat},
    transport::ConsoleTransport,
};
use relay_events::{
    codex_adapter::{codex_engine, extract_resume_token, format_resume_line},
    ResumeToken,
};
use tokio::io::AsyncReadExt;
use tracing::{info, Level};

#[derive(Debug, Parser)]
#[command(name = "codex-relay")]
#[command(about = "Relay live Codex run status as an editable progress message")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[clap(long, global = true, default_value_t = Level::INFO)]
    level: Level,

    /// Shorthand for `--level debug`.
    #[clap(long, global = true)]
    debug: bool,

    /// Append (redacted) log output to this file as well as stderr.
    #[clap(long, global = true)]
    log_file: Option<PathBuf>,

    #[clap(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run `codex exec --json` and relay its progress to stdout.
    Run {
        /// Session to continue: a bare token or a `codex resume <token>` line.
        #[clap(long)]
        resume: Option<String>,

        /// Prompt words; `-` or nothing reads the prompt from stdin.
        prompt: Vec<String>,
    },

    /// Render a recorded `codex exec --json` stream.
    Replay {
        path: PathBuf,

        /// Print normalized events as JSON lines instead of rendered text.
        #[clap(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    init_logging(effective_level(cli.level, cli.debug), cli.log_file.as_deref())?;

    let config = RelayConfig::load(&cli.config)?;

    match cli.command {
        Command::Run { resume, prompt } => run(&config, resume.as_deref(), prompt).await,
        Command::Replay { path, json } => {
            let format = if json {
                ReplayFormat::Json
            } else {
                ReplayFormat::Rendered
            };
            let mut stdout = std::io::stdout().lock();
            let summary = replay_file(&path, &config.render, format, &mut stdout)?;
            info!(skipped = summary.skipped_lines, "replay finished");
            Ok(exit_code(summary.completed.is_some_and(|done| done.ok)))
        }
    }
}

async fn run(config: &RelayConfig, resume: Option<&str>, prompt: Vec<String>) -> Result<ExitCode> {
    let prompt = read_prompt(prompt).await?;
    if prompt.trim().is_empty() {
        bail!("prompt is empty");
    }

    let mut request = RunRequest::new(prompt);
    if let Some(token) = resume.and_then(parse_resume) {
        request = request.resume(token);
    }

    let runner = config.runner_builder().build();
    let run = runner.run(request).await?;

    let mut transport = ConsoleTransport::stdout();
    let done = relay_run(run.events, &mut transport, &config.render).await?;
    let summary = run.completion.await?;
    info!(
        ok = done.ok,
        timed_out = summary.timed_out,
        skipped = summary.skipped_lines,
        "run finished"
    );

    if let Some(token) = &done.resume {
        println!("{}", format_resume_line(token));
    }
    Ok(exit_code(done.ok))
}

async fn read_prompt(words: Vec<String>) -> Result<String> {
    if !words.is_empty() && words != ["-"] {
        return Ok(words.join(" "));
    }
    let mut prompt = String::new();
    tokio::io::stdin()
        .read_to_string(&mut prompt)
        .await
        .context("failed to read prompt from stdin")?;
    Ok(prompt)
}

fn parse_resume(value: &str) -> Option<ResumeToken> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    Some(extract_resume_token(value).unwrap_or_else(|| ResumeToken::new(codex_engine(), value)))
}

fn exit_code(ok: bool) -> ExitCode {
    if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

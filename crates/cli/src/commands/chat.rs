//! `cbtsim chat` — Interactive terminal session.

use cbtsim_core::session::TurnRequest;
use cbtsim_gateway::{GENERIC_APOLOGY, build_services};
use cbtsim_session::TurnError;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::error;

use super::{load_config, require_api_key};

/// What a line of input asks for.
#[derive(Debug, PartialEq, Eq)]
pub enum Input<'a> {
    Quit,
    NewSession,
    EndSession,
    Message(&'a str),
    Empty,
}

pub fn parse_input(line: &str) -> Input<'_> {
    match line.trim() {
        "" => Input::Empty,
        "exit" | "quit" | "/exit" | "/quit" => Input::Quit,
        "/new" => Input::NewSession,
        "/end" => Input::EndSession,
        text => Input::Message(text),
    }
}

fn new_session_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// What the person at the terminal sees when a turn fails.
fn failure_notice(err: &TurnError) -> String {
    match err {
        TurnError::Session(e) => format!("[Session] {e}\n  Type /new to begin another session."),
        TurnError::Pipeline(e) => {
            error!(stage = %e.stage(), error = %e, "Turn failed");
            GENERIC_APOLOGY.to_string()
        }
    }
}

fn prompt() -> std::io::Result<()> {
    print!("  You > ");
    std::io::stdout().flush()
}

pub async fn run(session: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    require_api_key(&config)?;

    let services = build_services(&config)?;
    let controller = services.controller;
    let mut session_id = session.unwrap_or_else(new_session_id);

    println!();
    println!("  ╔══════════════════════════════════════════════╗");
    println!("  ║          cbtsim — CBT Session Simulator        ║");
    println!("  ╚══════════════════════════════════════════════╝");
    println!();
    println!("  Provider:   {}", services.provider_name);
    println!("  Model:      {}", config.default_model);
    println!("  Retrieval:  {}", services.retrieval_backend);
    println!("  Session:    {session_id}");
    println!();
    println!("  Type your message and press Enter.");
    println!("  /new starts a fresh session, /end closes this one, 'exit' quits.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    prompt()?;

    while let Some(line) = lines.next_line().await? {
        let request = match parse_input(&line) {
            Input::Quit => break,
            Input::Empty => {
                prompt()?;
                continue;
            }
            Input::NewSession => {
                session_id = new_session_id();
                println!("\n  Started new session {session_id}\n");
                prompt()?;
                continue;
            }
            Input::EndSession => TurnRequest::new(&session_id, "").ending(),
            Input::Message(text) => TurnRequest::new(&session_id, text),
        };

        eprint!("  ...");
        let result = controller.process_turn(request).await;
        eprint!("\r     \r");

        match result {
            Ok(turn) => {
                println!();
                for line in turn.response.lines() {
                    println!("  Therapist > {line}");
                }
                println!();
                if turn.is_session_ended {
                    println!("  Session ended. Type /new to begin another, or 'exit' to quit.\n");
                }
            }
            Err(e) => eprintln!("  {}\n", failure_notice(&e)),
        }

        prompt()?;
    }

    println!();
    println!("  Goodbye! 👋");
    println!();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cbtsim_agent::{PipelineError, PipelineStage};
    use cbtsim_core::error::{ProviderError, SessionError};

    #[test]
    fn input_commands() {
        assert_eq!(parse_input("exit"), Input::Quit);
        assert_eq!(parse_input("  /new "), Input::NewSession);
        assert_eq!(parse_input("/end"), Input::EndSession);
        assert_eq!(parse_input("   "), Input::Empty);
        assert_eq!(parse_input(" I feel stuck "), Input::Message("I feel stuck"));
    }

    #[test]
    fn pipeline_failure_shows_only_the_apology() {
        let err = TurnError::Pipeline(PipelineError::Generation {
            stage: PipelineStage::Assessment,
            source: ProviderError::ApiError {
                status_code: 502,
                message: "upstream exploded".into(),
            },
        });
        let notice = failure_notice(&err);
        assert_eq!(notice, GENERIC_APOLOGY);
        assert!(!notice.contains("502"));
        assert!(!notice.contains("assessment"));
    }

    #[test]
    fn ended_session_points_to_new() {
        let err = TurnError::Session(SessionError::Ended { session_id: "s1".into() });
        assert!(failure_notice(&err).contains("/new"));
    }
}

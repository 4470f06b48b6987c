//! Interactive prompt over the analysis engine.

use std::io::Write as _;

use flowlens_agent::{AnalysisEngine, StreamingEmitter, TurnEvent};
use flowlens_common::{AgentError, ThreadId};
use tokio::io::{AsyncBufReadExt, BufReader};

const HELP: &str = "commands:\n  /schema  show the dataset schema\n  /clear   start a fresh conversation\n  /quit    exit";

/// Answer a single question and exit.
pub async fn one_shot(
    engine: &AnalysisEngine,
    question: &str,
    stream: bool,
) -> Result<(), AgentError> {
    let outcome = ask(engine, None, question, stream).await?;
    if !stream {
        println!("{}", outcome.response);
    }
    eprintln!("[{:.1}s]", outcome.time_seconds);
    Ok(())
}

/// Read-eval loop until /quit or EOF.
pub async fn run(engine: &AnalysisEngine, stream: bool) -> Result<(), AgentError> {
    let schema = engine.schema()?;
    println!(
        "flowlens ready: {} rows x {} columns. Ask a question, or /help.",
        schema.row_count, schema.column_count
    );

    let mut thread: Option<ThreadId> = None;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("you> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match line {
            "/quit" | "/exit" => break,
            "/help" => println!("{HELP}"),
            "/schema" => println!("{}", engine.schema()?.summary),
            "/clear" => {
                if let Some(id) = thread.take() {
                    thread = Some(engine.clear(&id));
                    println!("conversation cleared");
                } else {
                    println!("nothing to clear");
                }
            }
            question => match ask(engine, thread.clone(), question, stream).await {
                Ok(outcome) => {
                    if !stream {
                        println!("{}", outcome.response);
                    }
                    eprintln!("[{:.1}s]", outcome.time_seconds);
                    thread = Some(outcome.thread_id);
                }
                // A failed turn keeps the conversation usable.
                Err(err) => eprintln!("error: {err}"),
            },
        }
    }

    Ok(())
}

async fn ask(
    engine: &AnalysisEngine,
    thread: Option<ThreadId>,
    question: &str,
    stream: bool,
) -> Result<flowlens_agent::ChatOutcome, AgentError> {
    if !stream {
        return engine.chat(thread, question).await;
    }

    let (emitter, mut rx) = StreamingEmitter::channel();
    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match event {
                TurnEvent::ToolStart { name } => eprintln!("  [{name} ...]"),
                TurnEvent::ToolResult {
                    name,
                    ok,
                    elapsed_ms,
                    ..
                } => {
                    let status = if ok { "done" } else { "failed" };
                    eprintln!("  [{name} {status} in {elapsed_ms}ms]");
                }
                TurnEvent::AnswerChunk { text } => {
                    print!("{text}");
                    let _ = std::io::stdout().flush();
                }
                // Chunks already rendered the text.
                TurnEvent::FinalAnswer { .. } => {}
                TurnEvent::Done => println!(),
            }
        }
    });

    let outcome = engine.chat_streaming(thread, question, &emitter).await;
    drop(emitter);
    let _ = printer.await;
    outcome
}

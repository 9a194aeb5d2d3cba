//! Interactive question loop.

use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::service::QueryService;

/// Prompt shown before each question.
pub const PROMPT: &str = "Question: ";

/// Returns true if `line` ends the session.
fn is_exit(line: &str) -> bool {
    matches!(line.to_lowercase().as_str(), "exit" | "quit")
}

/// Reads questions from `input` and writes answers to `output` until
/// `exit`, `quit` or end of input. Blank lines are skipped.
pub async fn run<R, W>(service: &Arc<QueryService>, input: R, mut output: W) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();

    loop {
        output.write_all(PROMPT.as_bytes()).await?;
        output.flush().await?;

        let Some(line) = lines.next_line().await? else {
            output.write_all(b"\n").await?;
            break;
        };

        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if is_exit(question) {
            debug!("Session ended by user");
            break;
        }

        let answer = Arc::clone(service).answer_isolated(question).await;
        output.write_all(answer.as_bytes()).await?;
        output.write_all(b"\n\n").await?;
    }

    output.flush().await
}

/// Runs the loop over the process's stdin and stdout.
pub async fn run_stdio(service: &Arc<QueryService>) -> std::io::Result<()> {
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    run(service, stdin, tokio::io::stdout()).await
}

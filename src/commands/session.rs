use log::{debug, warn};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{FeedbackError, Result};
use crate::handlers::{handle_request, Request};
use crate::tasks::writer::LedgerHandle;
use crate::voting::ReportEngine;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionLine {
    Request(Request),
    Quit,
    Empty,
}

// Grammar: `vote <category>`, `report [month]`, `quit` / `exit`
pub fn parse_line(line: &str) -> std::result::Result<SessionLine, String> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(SessionLine::Empty);
    };

    match verb.to_lowercase().as_str() {
        "vote" => match words.next() {
            Some(category) => Ok(SessionLine::Request(Request::Cast {
                category: category.to_string(),
            })),
            None => Err("usage: vote <Insatisfeito|Neutro|Satisfeito>".to_string()),
        },
        "report" => {
            let month = match words.next() {
                Some(raw) => raw
                    .parse::<u32>()
                    .map_err(|_| format!("month must be a number 0-12, got {:?}", raw))?,
                None => 0,
            };
            Ok(SessionLine::Request(Request::Report { month }))
        }
        "quit" | "exit" => Ok(SessionLine::Quit),
        other => Err(format!("unknown command {:?} (try vote, report or quit)", other)),
    }
}

/// Serves one interactive session: each input line is one request. Errors
/// are written back and the session carries on.
pub async fn run_session<R, W>(
    ledger: Option<&LedgerHandle>,
    reports: &ReportEngine,
    input: R,
    mut output: W,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();

    while let Some(line) = lines.next_line().await? {
        let request = match parse_line(&line) {
            Ok(SessionLine::Request(request)) => request,
            Ok(SessionLine::Empty) => continue,
            Ok(SessionLine::Quit) => break,
            Err(usage) => {
                output.write_all(format!("{}\n", usage).as_bytes()).await?;
                continue;
            }
        };

        let reply = match handle_request(ledger, reports, request).await {
            Ok(response) => response.message(),
            // The writer is gone, nothing else will succeed
            Err(FeedbackError::WriterClosed) => return Err(FeedbackError::WriterClosed),
            Err(e) => {
                warn!("Request failed: {}", e);
                format!("Error: {}", e)
            }
        };
        output.write_all(reply.as_bytes()).await?;
        if !reply.ends_with('\n') {
            output.write_all(b"\n").await?;
        }
        output.flush().await?;
    }

    debug!("Session ended");
    Ok(())
}

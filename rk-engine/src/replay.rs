//! Newline-delimited JSON replay driver
//!
//! Feeds engine commands from a reader, one JSON object per line, and writes
//! every engine event plus each command's result back as JSON lines. Used by
//! the `rolekeeper` binary to exercise the engine against a store snapshot.
//!
//! ```text
//! {"cmd": "toggle", "subject": 100, "tag": 31, "add": true}
//! {"cmd": "wait", "ms": 6000}
//! {"cmd": "sweep"}
//! ```

use crate::activity::InactivityReport;
use crate::engine::{Engine, SweepReport};
use crate::rank::RankEntry;
use crate::session::CommitOutcome;
use chrono::{DateTime, Utc};
use rk_common::events::EngineEvent;
use rk_common::{SubjectId, TagId};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::{debug, warn};

/// One input line
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum ReplayCommand {
    Toggle {
        subject: SubjectId,
        tag: TagId,
        add: bool,
    },
    Reconcile {
        subject: SubjectId,
    },
    Activity {
        subject: SubjectId,
        #[serde(default)]
        at: Option<DateTime<Utc>>,
    },
    Sweep,
    Inactivity {
        #[serde(default)]
        at: Option<DateTime<Utc>>,
    },
    Leaderboard,
    Depart {
        subject: SubjectId,
    },
    Wait {
        ms: u64,
    },
}

/// One output line that is not an engine event
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ReplayResult {
    ReconcileResult { subject: SubjectId, outcome: String },
    SweepResult(SweepReport),
    InactivityResult(InactivityReport),
    Leaderboard { entries: Vec<RankEntry> },
    CommandError { line: usize, message: String },
}

fn describe(outcome: &CommitOutcome) -> String {
    match outcome {
        CommitOutcome::SubjectMissing => "subject_missing".to_string(),
        CommitOutcome::Unchanged => "unchanged".to_string(),
        CommitOutcome::Written(_) => "written".to_string(),
    }
}

/// Replay every command in `input`, writing results and events to `out`
///
/// Open toggle bursts are allowed to flush before returning.
pub async fn run<R, W>(engine: &Engine, input: R, out: &mut W) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut events = engine.events().subscribe();
    let mut lines = input.lines();
    let mut line_no = 0;

    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let command: ReplayCommand = match serde_json::from_str(line) {
            Ok(command) => command,
            Err(e) => {
                warn!(line = line_no, "Unparsable command: {}", e);
                emit(
                    out,
                    &ReplayResult::CommandError {
                        line: line_no,
                        message: e.to_string(),
                    },
                )?;
                continue;
            }
        };
        debug!(line = line_no, ?command, "Replaying");

        match execute(engine, command).await {
            Ok(Some(result)) => {
                drain(&mut events, out)?;
                emit(out, &result)?;
            }
            Ok(None) => drain(&mut events, out)?,
            Err(e) => {
                drain(&mut events, out)?;
                emit(
                    out,
                    &ReplayResult::CommandError {
                        line: line_no,
                        message: e.to_string(),
                    },
                )?;
            }
        }
    }

    // Let open bursts run their course
    let window = engine.coalescer().window();
    while engine.coalescer().pending_bursts().await > 0 {
        tokio::time::sleep(window).await;
    }
    tokio::time::sleep(Duration::from_millis(10)).await;
    drain(&mut events, out)?;
    Ok(())
}

async fn execute(engine: &Engine, command: ReplayCommand) -> crate::Result<Option<ReplayResult>> {
    let result = match command {
        ReplayCommand::Toggle { subject, tag, add } => {
            engine.toggle(subject, tag, add).await?;
            None
        }
        ReplayCommand::Reconcile { subject } => {
            let outcome = engine.reconcile(subject).await?;
            Some(ReplayResult::ReconcileResult {
                subject,
                outcome: describe(&outcome),
            })
        }
        ReplayCommand::Activity { subject, at } => {
            engine.record_activity(subject, at).await;
            None
        }
        ReplayCommand::Sweep => Some(ReplayResult::SweepResult(engine.reconcile_all().await?)),
        ReplayCommand::Inactivity { at } => {
            let at = at.unwrap_or_else(rk_common::time::now);
            Some(ReplayResult::InactivityResult(engine.sweep_inactivity_at(at).await?))
        }
        ReplayCommand::Leaderboard => Some(ReplayResult::Leaderboard {
            entries: engine.leaderboard().await?,
        }),
        ReplayCommand::Depart { subject } => {
            engine.subject_departed(subject).await;
            None
        }
        ReplayCommand::Wait { ms } => {
            tokio::time::sleep(Duration::from_millis(ms)).await;
            None
        }
    };
    Ok(result)
}

fn emit<W: Write, T: Serialize>(out: &mut W, value: &T) -> anyhow::Result<()> {
    serde_json::to_writer(&mut *out, value)?;
    out.write_all(b"\n")?;
    Ok(())
}

fn drain<W: Write>(events: &mut broadcast::Receiver<EngineEvent>, out: &mut W) -> anyhow::Result<()> {
    loop {
        match events.try_recv() {
            Ok(event) => emit(out, &event)?,
            Err(TryRecvError::Lagged(skipped)) => {
                warn!(skipped, "Replay output fell behind; events dropped");
            }
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return Ok(()),
        }
    }
}

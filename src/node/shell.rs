//! Interactive voter prompt on stdin/stdout.

use crate::ledger::Block;
use crate::network::BlockMessage;
use crate::utils::metrics::METRICS;
use crate::utils::{BallotError, Result};
use crate::voting::Voter;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use std::io::Write;
use std::str::FromStr;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

pub const PROMPT: &str = "(voter) ";

const HELP: &str = "\
vote <candidate>  request countersignatures for a vote (candidate 0..=31)
ballot            publish the ballot once every voter has countersigned
count             tally every valid ballot on the chain
print             print the chain
stats             print counters
stop              deregister and exit
help              this text";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellCommand {
    Vote(u32),
    Ballot,
    Count,
    Print,
    Stats,
    Stop,
    Help,
}

impl FromStr for ShellCommand {
    type Err = BallotError;

    fn from_str(line: &str) -> Result<Self> {
        let mut words = line.split_whitespace();
        let cmd = words.next().unwrap_or("");
        let arg = words.next();
        if words.next().is_some() {
            return Err(BallotError::ProtocolError(format!("too many arguments: {}", line.trim())));
        }
        let no_arg = |c: ShellCommand| match arg {
            None => Ok(c),
            Some(a) => Err(BallotError::ProtocolError(format!("{} takes no argument, got {:?}", cmd, a))),
        };
        match cmd {
            "vote" => {
                let arg = arg.ok_or_else(|| BallotError::ProtocolError("usage: vote <candidate>".into()))?;
                let choice = arg
                    .parse::<u32>()
                    .map_err(|_| BallotError::ProtocolError(format!("not a candidate id: {:?}", arg)))?;
                Ok(ShellCommand::Vote(choice))
            }
            "ballot" => no_arg(ShellCommand::Ballot),
            "count" => no_arg(ShellCommand::Count),
            "print" => no_arg(ShellCommand::Print),
            "stats" => no_arg(ShellCommand::Stats),
            "stop" | "exit" => no_arg(ShellCommand::Stop),
            "help" | "?" => no_arg(ShellCommand::Help),
            other => Err(BallotError::ProtocolError(format!("unknown command {:?}; try help", other))),
        }
    }
}

/// Every block as its pretty wire map followed by its base64 digest.
pub fn render_chain(blocks: &[Block]) -> Result<String> {
    let mut out = String::new();
    for block in blocks {
        out.push_str(&BlockMessage::from_block(block).to_json_pretty()?);
        out.push_str("\ndigest: ");
        out.push_str(&STANDARD.encode(block.digest()));
        out.push_str("\n\n");
    }
    Ok(out)
}

/// Read commands until `stop` or end of input.
pub async fn run_shell(voter: Arc<Voter>) -> anyhow::Result<()> {
    println!("Voter {} ready. Type help to list commands.", voter.id());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("{}", PROMPT);
        std::io::stdout().flush()?;

        let line = match lines.next_line().await? {
            Some(l) => l,
            None => {
                debug!("stdin closed");
                return Ok(());
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        let cmd = match line.parse::<ShellCommand>() {
            Ok(c) => c,
            Err(e) => {
                println!("{}", e);
                continue;
            }
        };

        match cmd {
            ShellCommand::Vote(choice) => {
                // the round may wait forever on a silent peer; keep the prompt usable
                let voter = voter.clone();
                tokio::spawn(async move {
                    match voter.vote(choice).await {
                        Ok(()) => println!("\nall countersignatures collected; ballot can be cast"),
                        Err(e) => println!("\nvote failed: {}", e),
                    }
                });
            }
            ShellCommand::Ballot => match voter.cast_ballot() {
                Ok(()) => println!("ballot cast"),
                Err(e) => println!("{}", e),
            },
            ShellCommand::Count => match voter.count() {
                Ok(tally) => print!("{}", tally),
                Err(e) => println!("{}", e),
            },
            ShellCommand::Print => match render_chain(&voter.chain_snapshot()) {
                Ok(text) => print!("{}", text),
                Err(e) => println!("{}", e),
            },
            ShellCommand::Stats => print!("{}", METRICS.snapshot()),
            ShellCommand::Help => println!("{}", HELP),
            ShellCommand::Stop => return Ok(()),
        }
    }
}

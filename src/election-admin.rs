//! Administrative tool for operating an election directly against its database.
//! Every command goes through the same engine as the HTTP API, so the same
//! rules and atomicity guarantees apply.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use mongodb::Client;

use election_engine::{
    config::database_name,
    engine::{ElectionEngine, Review, TurnoutPolicy},
    error::Error,
    model::mongodb::Id,
    store::MongoStore,
};

const PROGRAM_NAME: &str = "election-admin";

const ABOUT_TEXT: &str = "Administer a running election.

EXIT CODES:
     0: Command succeeded.
     1: The election refused the command.
     2: Could not reach the database.";

const DB_URI: &str = "DB_URI";
const TURNOUT_POLICY: &str = "TURNOUT_POLICY";
const START: &str = "START";
const END: &str = "END";
const CANDIDATE: &str = "CANDIDATE";
const DECISION: &str = "DECISION";
const YES: &str = "YES";

/// Construct the CLI configuration.
fn cli() -> Command {
    // Make the build dirty when the toml changes.
    include_str!("../Cargo.toml");

    clap::command!(PROGRAM_NAME)
        .about(ABOUT_TEXT)
        .subcommand_required(true)
        .arg(
            Arg::new(DB_URI)
                .long("db-uri")
                .env("ELECTION_DB_URI")
                .help("MongoDB connection string")
                .action(ArgAction::Set)
                .required(true)
                .global(true),
        )
        .arg(
            Arg::new(TURNOUT_POLICY)
                .long("turnout-policy")
                .help("Whether full turnout closes voting")
                .value_parser(["display_only", "closes_voting"])
                .default_value("display_only")
                .global(true),
        )
        .subcommand(Command::new("status").about("Show the window, turnout and whether voting is open"))
        .subcommand(
            Command::new("set-window")
                .about("Replace the election window")
                .arg(
                    Arg::new(START)
                        .help("Start time, RFC 3339")
                        .value_parser(value_parser!(DateTime<Utc>))
                        .required(true),
                )
                .arg(
                    Arg::new(END)
                        .help("End time, RFC 3339")
                        .value_parser(value_parser!(DateTime<Utc>))
                        .required(true),
                ),
        )
        .subcommand(
            Command::new("review")
                .about("Approve, reject or reopen a candidacy")
                .arg(Arg::new(CANDIDATE).help("Candidate ID (hex)").required(true))
                .arg(
                    Arg::new(DECISION)
                        .value_parser(["approve", "reject", "reopen"])
                        .required(true),
                ),
        )
        .subcommand(
            Command::new("reset")
                .about("Zero every tally and clear every voter's ballot")
                .arg(
                    Arg::new(YES)
                        .long("yes")
                        .help("Confirm the reset")
                        .action(ArgAction::SetTrue),
                ),
        )
}

/// A parsed command, ready to run against an engine.
#[derive(Debug, PartialEq, Eq)]
enum Action {
    Status,
    SetWindow {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    Review {
        candidate: Id,
        decision: Review,
    },
    Reset,
}

/// Errors that this program may produce.
#[derive(Debug)]
enum CliError {
    /// Bad arguments, described by the inner message.
    Usage(String),
    /// The engine refused or failed the command.
    Engine(Error),
}

impl From<Error> for CliError {
    fn from(err: Error) -> Self {
        Self::Engine(err)
    }
}

fn policy(args: &ArgMatches) -> TurnoutPolicy {
    match args.get_one::<String>(TURNOUT_POLICY).map(String::as_str) {
        Some("closes_voting") => TurnoutPolicy::ClosesVoting,
        _ => TurnoutPolicy::DisplayOnly,
    }
}

fn action(args: &ArgMatches) -> Result<Action, CliError> {
    match args.subcommand() {
        Some(("status", _)) => Ok(Action::Status),
        Some(("set-window", sub)) => Ok(Action::SetWindow {
            // Valid as both are required.
            start: *sub.get_one(START).unwrap(),
            end: *sub.get_one(END).unwrap(),
        }),
        Some(("review", sub)) => {
            let raw = sub.get_one::<String>(CANDIDATE).unwrap();
            let candidate = raw
                .parse()
                .map_err(|_| CliError::Usage(format!("Malformed candidate ID: {raw}")))?;
            let decision = match sub.get_one::<String>(DECISION).map(String::as_str) {
                Some("approve") => Review::Approve,
                Some("reject") => Review::Reject,
                _ => Review::Reopen,
            };
            Ok(Action::Review {
                candidate,
                decision,
            })
        }
        Some(("reset", sub)) => {
            if sub.get_flag(YES) {
                Ok(Action::Reset)
            } else {
                Err(CliError::Usage(
                    "Refusing to reset without --yes".to_string(),
                ))
            }
        }
        _ => Err(CliError::Usage("Unknown command".to_string())),
    }
}

/// Run one action, returning the text to print.
async fn execute(engine: &ElectionEngine, action: Action) -> Result<String, CliError> {
    Ok(match action {
        Action::Status => {
            let status = engine.window().status(Utc::now()).await?;
            let window = status.window.map_or_else(
                || "not set".to_string(),
                |w| format!("{} to {}", w.start_time, w.end_time),
            );
            format!(
                "Window: {window}\nOpen: {}\nTurnout: {}/{}{}",
                status.open,
                status.turnout.voted,
                status.turnout.total,
                if status.complete { " (complete)" } else { "" }
            )
        }
        Action::SetWindow { start, end } => {
            let window = engine.window().set_window(start, end).await?;
            format!("Window set: {} to {}", window.start_time, window.end_time)
        }
        Action::Review {
            candidate,
            decision,
        } => {
            let candidate = engine
                .lifecycle()
                .review(candidate, decision, Utc::now())
                .await?;
            format!("Candidate {} is now {}", candidate.id, candidate.status)
        }
        Action::Reset => {
            let summary = engine.reset_coordinator().reset().await?;
            format!(
                "Reset {} candidates and {} voters",
                summary.candidates_reset, summary.voters_reset
            )
        }
    })
}

async fn connect(uri: &str, policy: TurnoutPolicy) -> Result<ElectionEngine, Error> {
    let client = Client::with_uri_str(uri).await?;
    let db = client.database(&database_name());
    let store = MongoStore::open(client, &db).await?;
    Ok(ElectionEngine::new(Arc::new(store), policy))
}

fn run(args: &ArgMatches) -> u8 {
    let action = match action(args) {
        Ok(action) => action,
        Err(CliError::Usage(msg)) => {
            eprintln!("{msg}");
            return 1;
        }
        Err(CliError::Engine(err)) => {
            eprintln!("{}: {err}", err.kind());
            return 1;
        }
    };
    let runtime = match rocket::tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("Failed to start runtime: {err}");
            return 2;
        }
    };
    // Valid as the argument is required.
    let uri = args.get_one::<String>(DB_URI).unwrap();
    runtime.block_on(async {
        let engine = match connect(uri, policy(args)).await {
            Ok(engine) => engine,
            Err(err) => {
                eprintln!("Could not reach the database: {err}");
                return 2;
            }
        };
        match execute(&engine, action).await {
            Ok(output) => {
                println!("{output}");
                0
            }
            Err(CliError::Usage(msg)) => {
                eprintln!("{msg}");
                1
            }
            Err(CliError::Engine(err)) => {
                eprintln!("{}: {err}", err.kind());
                if err.is_retryable() {
                    2
                } else {
                    1
                }
            }
        }
    })
}

fn main() {
    let args = cli().get_matches();
    let exit_code = run(&args);
    std::process::exit(exit_code.into())
}

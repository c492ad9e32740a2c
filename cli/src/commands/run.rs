use agentverse_chain::RunId;
use agentverse_sync::{PollOutcome, RunSession};
use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;

use crate::config::Config;
use crate::utils::{self, display, Synchronizer};

#[derive(Subcommand)]
pub enum RunCommands {
    /// Start an agent run and follow the conversation until it finishes
    Chat {
        /// Query sent to the agent
        query: String,

        /// Upper bound on agent iterations
        #[arg(short, long)]
        max_iterations: Option<u8>,

        /// Account to send from
        #[arg(short, long)]
        account: Option<String>,
    },

    /// Follow an existing run from the beginning of its history
    Attach {
        run_id: u64,
    },

    /// Print the conversation of a run once
    History {
        run_id: u64,
    },

    /// Show on-chain run state
    Status {
        run_id: u64,
    },

    /// Add a message to a run that is still in progress
    FollowUp {
        run_id: u64,

        /// Message content
        message: String,

        /// Account to send from
        #[arg(short, long)]
        account: Option<String>,

        /// Keep following the run after sending
        #[arg(short, long)]
        follow: bool,
    },
}

pub async fn execute(cmd: RunCommands, config: &Config) -> Result<()> {
    let sync = utils::synchronizer(config)?;

    match cmd {
        RunCommands::Chat {
            query,
            max_iterations,
            account,
        } => {
            let signer = utils::signer(config, account)?;
            let max_iterations = max_iterations.unwrap_or(config.max_iterations);

            println!("{}", "Starting agent run...".cyan());
            let mut session = sync
                .start_run(&signer, &query, max_iterations)
                .await
                .context("Failed to start agent run")?;
            println!(
                "{}",
                format!("✓ Run {} created", session.run_id()).green()
            );

            follow(&sync, &mut session).await?;
        }
        RunCommands::Attach { run_id } => {
            let mut session = RunSession::new(RunId(run_id));
            follow(&sync, &mut session).await?;
        }
        RunCommands::History { run_id } => {
            let mut session = RunSession::new(RunId(run_id));
            sync.sync_once(&mut session)
                .await
                .with_context(|| format!("Failed to read history of run {}", run_id))?;
            display::print_messages(session.messages());
            display::print_session_summary(&session);
        }
        RunCommands::Status { run_id } => {
            let info = sync
                .run_info(RunId(run_id))
                .await
                .with_context(|| format!("Failed to read run {}", run_id))?;
            display::print_run_info(&run_id.to_string(), &info);
        }
        RunCommands::FollowUp {
            run_id,
            message,
            account,
            follow: keep_following,
        } => {
            let signer = utils::signer(config, account)?;
            let mut session = RunSession::new(RunId(run_id));

            let receipt = sync
                .send_follow_up(&signer, &mut session, &message)
                .await
                .context("Failed to send follow-up")?;
            println!("{}", "✓ Follow-up sent".green());
            println!("Transaction: {}", receipt.transaction_hash.cyan());

            if keep_following {
                follow(&sync, &mut session).await?;
            }
        }
    }

    Ok(())
}

async fn follow(sync: &Synchronizer, session: &mut RunSession) -> Result<()> {
    let cancel = utils::ctrl_c_token();
    println!("{}", "Waiting for agent responses (Ctrl-C to stop)...".dimmed());

    let outcome = sync
        .poll_with(session, &cancel, display::print_messages)
        .await
        .with_context(|| format!("Polling run {} failed", session.run_id()))?;

    match outcome {
        PollOutcome::Finished => println!("{}", "✓ Run finished".green().bold()),
        PollOutcome::Cancelled => println!("{}", "Stopped following run".yellow()),
    }
    display::print_session_summary(session);
    Ok(())
}

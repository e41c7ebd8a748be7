//! CLI command implementations.

use crate::config::CliConfig;
use crate::ledger::{init_keystore, open_ledger};
use crate::output::*;
use cipher_grant_governance::{
    Decision, GrantLifecycle, Proposal, ProposalDraft, ProposalFilter, ProposalId,
    ProposalStatus, ResearchCategory, Tier, VoteChoice,
};
use cipher_grant_types::{Address, Amount};
use clap::{Parser, Subcommand};
use colored::Colorize;
use dialoguer::Password;
use std::path::PathBuf;

/// Main CLI.
#[derive(Parser)]
#[command(name = "cipher-grant")]
#[command(about = "Cipher Grant - confidential research funding DAO")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Config file (defaults to ~/.cipher-grant/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Data directory holding the ledger
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Log filter, e.g. `info` or `cipher_grant_governance=debug`
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Keystore password (prompted when absent)
    #[arg(long, global = true, env = "CIPHER_GRANT_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Apply command-line overrides on top of the loaded config.
    pub fn apply_overrides(&self, config: &mut CliConfig) {
        if let Some(dir) = &self.data_dir {
            config.storage.data_dir = dir.clone();
        }
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
        if self.json_logs {
            config.logging.json = true;
        }
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the sealing keystore and a config file
    Init,

    /// Join the DAO, or upgrade to a higher tier
    Join {
        /// Member address (0x...)
        address: Address,
        /// researcher, scholar or patron
        tier: Tier,
    },

    /// Submit a research proposal with a sealed budget
    Submit {
        /// Submitting address, recipient of disbursements
        #[arg(long)]
        proposer: Address,
        #[arg(long)]
        title: String,
        #[arg(long)]
        researcher: String,
        #[arg(long)]
        description: String,
        /// biotechnology, quantum, environmental, ai-ml, physics or chemistry
        #[arg(long)]
        category: ResearchCategory,
        /// Budget in ETH, up to 18 decimal places
        #[arg(long)]
        budget: Amount,
        /// Duration in months
        #[arg(long, allow_negative_numbers = true)]
        duration: i64,
    },

    /// Vote on a pending proposal
    Vote {
        id: ProposalId,
        voter: Address,
        /// approve or reject
        choice: VoteChoice,
        #[arg(long, default_value = "")]
        comment: String,
    },

    /// Decide a proposal
    Finalize {
        id: ProposalId,
        /// Required participation share (defaults to config)
        #[arg(long)]
        quorum: Option<f64>,
        /// Required approval share (defaults to config)
        #[arg(long)]
        threshold: Option<f64>,
    },

    /// Reveal the budget of a finalized proposal
    Reveal { id: ProposalId },

    /// Show the live tally
    Tally { id: ProposalId },

    /// Show one proposal
    Show { id: ProposalId },

    /// List proposals
    List {
        #[arg(long)]
        status: Option<ProposalStatus>,
        #[arg(long)]
        category: Option<ResearchCategory>,
        /// Text to look for in title, researcher or description
        #[arg(long)]
        search: Option<String>,
    },

    /// Voting history of an address
    History { address: Address },

    /// Deposit into the treasury
    Deposit {
        from: Address,
        /// Amount in ETH
        amount: Amount,
    },

    /// Disburse part of a funded proposal's budget
    Fund {
        id: ProposalId,
        /// Amount in ETH
        amount: Amount,
    },

    /// List members
    Members,

    /// Show treasury balance and recent movements
    Treasury {
        #[arg(long, default_value = "10")]
        recent: usize,
    },
}

/// Resolved configuration and credentials for one invocation.
pub struct Context {
    pub config: CliConfig,
    pub config_path: Option<PathBuf>,
    password: Option<String>,
}

impl Context {
    pub fn new(config: CliConfig, config_path: Option<PathBuf>, password: Option<String>) -> Self {
        Self {
            config,
            config_path,
            password,
        }
    }

    fn password(&self, confirm: bool) -> anyhow::Result<String> {
        if let Some(password) = &self.password {
            return Ok(password.clone());
        }
        let mut prompt = Password::new();
        prompt = prompt.with_prompt("Keystore password");
        if confirm {
            prompt = prompt.with_confirmation("Confirm password", "Passwords do not match");
        }
        Ok(prompt.interact()?)
    }

    fn ledger(&self) -> anyhow::Result<GrantLifecycle> {
        open_ledger(&self.config, &self.password(false)?)
    }
}

/// Execute a command.
pub fn execute(cmd: Commands, ctx: &Context) -> anyhow::Result<()> {
    tracing::debug!(?cmd, "Executing command");

    match cmd {
        Commands::Init => execute_init(ctx),
        Commands::Join { address, tier } => {
            let ledger = ctx.ledger()?;
            let member = ledger.join_dao(address, tier)?;
            print_success(&format!(
                "{} is a {} member with voting weight {}",
                member.address,
                member.tier,
                member.voting_weight()
            ));
            print_info(&format!("Treasury balance: {}", format_eth(ledger.treasury_balance())));
            Ok(())
        }
        Commands::Submit {
            proposer,
            title,
            researcher,
            description,
            category,
            budget,
            duration,
        } => {
            let ledger = ctx.ledger()?;
            let draft = ProposalDraft {
                title,
                researcher,
                description,
                category,
                budget,
                duration_months: duration,
            };
            let id = ledger.submit_proposal(proposer, draft)?;
            let proposal = ledger.proposal(id)?;
            print_success(&format!("Submitted proposal #{}", id));
            print_info(&format!(
                "Budget sealed as {}; it stays hidden until the proposal is finalized",
                proposal.budget.fingerprint()
            ));
            Ok(())
        }
        Commands::Vote {
            id,
            voter,
            choice,
            comment,
        } => {
            let ledger = ctx.ledger()?;
            let vote = ledger.cast_vote(id, voter, choice, &comment)?;
            print_success(&format!(
                "Recorded {} on proposal #{} with weight {}",
                vote.choice, id, vote.weight
            ));
            Ok(())
        }
        Commands::Finalize {
            id,
            quorum,
            threshold,
        } => {
            let ledger = ctx.ledger()?;
            let quorum = quorum.unwrap_or(ctx.config.governance.default_quorum);
            let threshold = threshold.unwrap_or(ctx.config.governance.default_approval_threshold);

            let result = ledger.finalize(id, quorum, threshold)?;
            print_tally(id, &result.tally);
            println!();
            match (result.decision, result.authorization) {
                (Decision::Undecided, _) | (_, None) => {
                    print_warning(&format!(
                        "Quorum of {} not reached; proposal #{} stays open",
                        format_percent(quorum),
                        id
                    ));
                }
                (decision, Some(authorization)) => {
                    let budget = ledger.reveal_budget(id, &authorization)?;
                    print_success(&format!("Proposal #{} {}", id, decision));
                    print_info(&format!("Revealed budget: {}", format_eth(budget)));
                }
            }
            Ok(())
        }
        Commands::Reveal { id } => {
            let ledger = ctx.ledger()?;
            let authorization = ledger.reveal_authorization(id)?;
            let budget = ledger.reveal_budget(id, &authorization)?;
            println!("{}", format_eth(budget).bright_green());
            Ok(())
        }
        Commands::Tally { id } => {
            let ledger = ctx.ledger()?;
            print_tally(id, &ledger.get_tally(id)?);
            Ok(())
        }
        Commands::Show { id } => {
            let ledger = ctx.ledger()?;
            let proposal = ledger.proposal(id)?;
            let tally = match proposal.final_tally {
                Some(tally) => tally,
                None => ledger.get_tally(id)?,
            };
            let revealed = revealed_budget(&ledger, &proposal)?;
            print_proposal_detail(&proposal, &tally, revealed);
            Ok(())
        }
        Commands::List {
            status,
            category,
            search,
        } => {
            let ledger = ctx.ledger()?;
            let filter = ProposalFilter {
                status,
                category,
                search: search.filter(|s| !s.trim().is_empty()),
            };

            let mut rows = Vec::new();
            for proposal in ledger.proposals(&filter) {
                let tally = ledger.get_tally(proposal.id)?;
                let revealed = revealed_budget(&ledger, &proposal)?;
                rows.push((proposal, tally, revealed));
            }

            if rows.is_empty() {
                print_info("No proposals match");
            } else {
                print_proposal_table(&rows);
            }
            print_status_counts(&ledger.status_counts());
            Ok(())
        }
        Commands::History { address } => {
            let ledger = ctx.ledger()?;
            let history = ledger.voting_history(&address);
            if history.is_empty() {
                print_info(&format!("{} has not voted yet", address));
            } else {
                print_history_table(&history);
            }
            Ok(())
        }
        Commands::Deposit { from, amount } => {
            let ledger = ctx.ledger()?;
            let balance = ledger.deposit(from, amount)?;
            print_success(&format!("Deposited {}", format_eth(amount)));
            print_info(&format!("Treasury balance: {}", format_eth(balance)));
            Ok(())
        }
        Commands::Fund { id, amount } => {
            let ledger = ctx.ledger()?;
            let paid = ledger.fund(id, amount)?;
            print_success(&format!(
                "Disbursed {} to {} for proposal #{}",
                format_eth(paid.amount),
                paid.recipient,
                id
            ));
            print_info(&format!(
                "Remaining budget {}, treasury balance {}",
                format_eth(paid.remaining_budget),
                format_eth(paid.treasury_balance)
            ));
            Ok(())
        }
        Commands::Members => {
            let ledger = ctx.ledger()?;
            let members = ledger.members();
            if members.is_empty() {
                print_info("No members yet");
                return Ok(());
            }
            print_member_table(&members);
            let membership = ledger.membership();
            println!(
                "{} members · total voting weight {}",
                members.len(),
                membership.total_weight()
            );
            for tier in Tier::ALL {
                println!("  {:<10} {}", tier.as_str(), membership.count_by_tier(tier));
            }
            Ok(())
        }
        Commands::Treasury { recent } => {
            let ledger = ctx.ledger()?;
            print_treasury(&ledger.treasury(), recent);
            Ok(())
        }
    }
}

fn execute_init(ctx: &Context) -> anyhow::Result<()> {
    let config_path = match &ctx.config_path {
        Some(path) => path.clone(),
        None => CliConfig::config_path()?,
    };
    if !config_path.exists() {
        ctx.config.save(&config_path)?;
        print_info(&format!("Wrote config to {}", config_path.display()));
    }

    let key_id = init_keystore(&ctx.config, &ctx.password(true)?)?;
    print_success(&format!(
        "Sealing key {} stored at {}",
        key_id.short(),
        ctx.config.storage.keystore_path().display()
    ));
    print_info(&format!(
        "Ledger will be kept in {}",
        ctx.config.storage.ledger_path().display()
    ));
    Ok(())
}

/// Reveal the budget of a finalized proposal; pending budgets stay sealed.
fn revealed_budget(ledger: &GrantLifecycle, proposal: &Proposal) -> anyhow::Result<Option<Amount>> {
    if !proposal.status.is_terminal() {
        return Ok(None);
    }
    let authorization = ledger.reveal_authorization(proposal.id)?;
    Ok(Some(ledger.reveal_budget(proposal.id, &authorization)?))
}

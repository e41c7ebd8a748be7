//! Output formatting utilities.
//!
//! Pretty printing for CLI commands.

use cipher_grant_governance::{
    Member, Proposal, ProposalStatus, StatusCounts, Treasury, VoteTally, VotingRecord,
};
use cipher_grant_types::{Amount, Timestamp};
use colored::{ColoredString, Colorize};
use tabled::settings::Style;
use tabled::{Table, Tabled};

/// Format an amount as ETH.
pub fn format_eth(amount: Amount) -> String {
    format!("{} ETH", amount)
}

/// Format a ratio as a percentage.
pub fn format_percent(ratio: f64) -> String {
    format!("{:.1}%", ratio * 100.0)
}

/// Shorten text to `max` characters.
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let kept: String = text.chars().take(max.saturating_sub(1)).collect();
    format!("{}…", kept)
}

/// Format a timestamp as UTC date and time.
pub fn format_time(at: Timestamp) -> String {
    i64::try_from(at.as_millis())
        .ok()
        .and_then(chrono::DateTime::<chrono::Utc>::from_timestamp_millis)
        .map(|dt| dt.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|| at.to_string())
}

pub fn status_label(status: ProposalStatus) -> ColoredString {
    match status {
        ProposalStatus::Pending => "pending".yellow(),
        ProposalStatus::Funded => "funded".green(),
        ProposalStatus::Rejected => "rejected".red(),
    }
}

/// Print success message.
pub fn print_success(msg: &str) {
    println!("{}", format!("✓ {}", msg).green());
}

/// Print error message.
pub fn print_error(msg: &str) {
    eprintln!("{}", format!("✗ {}", msg).red());
}

/// Print warning message.
pub fn print_warning(msg: &str) {
    println!("{}", format!("⚠ {}", msg).yellow());
}

/// Print info message.
pub fn print_info(msg: &str) {
    println!("{}", format!("ℹ {}", msg).blue());
}

/// Budget column: the amount once revealed, otherwise the sealed fingerprint.
pub fn budget_cell(proposal: &Proposal, revealed: Option<Amount>) -> String {
    match revealed {
        Some(amount) => format_eth(amount),
        None => format!("sealed {}", proposal.budget.fingerprint()),
    }
}

/// Print the proposal list.
pub fn print_proposal_table(proposals: &[(Proposal, VoteTally, Option<Amount>)]) {
    #[derive(Tabled)]
    struct ProposalRow {
        #[tabled(rename = "ID")]
        id: u64,
        #[tabled(rename = "Title")]
        title: String,
        #[tabled(rename = "Category")]
        category: String,
        #[tabled(rename = "Budget")]
        budget: String,
        #[tabled(rename = "For / Against")]
        votes: String,
        #[tabled(rename = "Status")]
        status: String,
    }

    let rows: Vec<ProposalRow> = proposals
        .iter()
        .map(|(proposal, tally, revealed)| ProposalRow {
            id: proposal.id,
            title: truncate(&proposal.title, 40),
            category: proposal.category.display_name().to_string(),
            budget: budget_cell(proposal, *revealed),
            votes: format!("{} / {}", tally.approve_weight, tally.reject_weight),
            status: status_label(proposal.status).to_string(),
        })
        .collect();

    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{}", table);
}

pub fn print_status_counts(counts: &StatusCounts) {
    println!(
        "{} total · {} pending · {} funded · {} rejected",
        counts.total().to_string().bold(),
        counts.pending.to_string().yellow(),
        counts.funded.to_string().green(),
        counts.rejected.to_string().red()
    );
}

/// Print one proposal in full.
pub fn print_proposal_detail(proposal: &Proposal, tally: &VoteTally, revealed: Option<Amount>) {
    println!("{}", format!("Proposal #{}", proposal.id).bold());
    println!("{}", "=".repeat(50));
    println!("Title:       {}", proposal.title.bright_cyan());
    println!("Researcher:  {}", proposal.researcher);
    println!("Category:    {}", proposal.category.display_name());
    println!("Duration:    {} months", proposal.duration_months);
    println!("Proposer:    {}", proposal.proposer);
    println!("Budget:      {}", budget_cell(proposal, revealed));
    if proposal.status == ProposalStatus::Funded {
        println!("Disbursed:   {}", format_eth(proposal.disbursed));
    }
    println!("Status:      {}", status_label(proposal.status));
    println!();
    println!("{}", proposal.description);
    println!();
    print_tally(proposal.id, tally);
}

/// Print tally summary.
pub fn print_tally(id: u64, tally: &VoteTally) {
    println!("{}", format!("Tally for proposal #{}", id).bold());
    println!("Approve:        {}", tally.approve_weight.to_string().green());
    println!("Reject:         {}", tally.reject_weight.to_string().red());
    println!("Voters:         {}", tally.participant_count);
    println!(
        "Participation:  {} of {} eligible weight",
        format_percent(tally.participation()),
        tally.total_eligible_weight
    );
    match tally.approval_ratio() {
        Some(ratio) => println!("Approval:       {}", format_percent(ratio)),
        None => println!("Approval:       {}", "no votes".dimmed()),
    }
}

/// Print member table.
pub fn print_member_table(members: &[Member]) {
    #[derive(Tabled)]
    struct MemberRow {
        #[tabled(rename = "Address")]
        address: String,
        #[tabled(rename = "Tier")]
        tier: String,
        #[tabled(rename = "Weight")]
        weight: u64,
        #[tabled(rename = "Joined")]
        joined: String,
    }

    let rows: Vec<MemberRow> = members
        .iter()
        .map(|m| MemberRow {
            address: m.address.to_string(),
            tier: m.tier.to_string(),
            weight: m.voting_weight(),
            joined: format_time(m.joined_at),
        })
        .collect();

    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{}", table);
}

/// Print a member's voting history.
pub fn print_history_table(records: &[VotingRecord]) {
    #[derive(Tabled)]
    struct HistoryRow {
        #[tabled(rename = "Proposal")]
        proposal: u64,
        #[tabled(rename = "Title")]
        title: String,
        #[tabled(rename = "Vote")]
        choice: String,
        #[tabled(rename = "Weight")]
        weight: u64,
        #[tabled(rename = "Status")]
        status: String,
    }

    let rows: Vec<HistoryRow> = records
        .iter()
        .map(|r| HistoryRow {
            proposal: r.proposal_id,
            title: truncate(&r.title, 40),
            choice: r.choice.to_string(),
            weight: r.weight,
            status: status_label(r.status).to_string(),
        })
        .collect();

    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{}", table);
}

/// Print treasury balance and recent movements.
pub fn print_treasury(treasury: &Treasury, recent: usize) {
    println!("{}", "Treasury".bold());
    println!("{}", "=".repeat(50));
    println!("Balance:     {}", format_eth(treasury.balance).bright_green());
    println!("Received:    {}", format_eth(treasury.total_received));
    println!("Disbursed:   {}", format_eth(treasury.total_disbursed));

    if treasury.transactions.is_empty() {
        return;
    }

    #[derive(Tabled)]
    struct TxRow {
        #[tabled(rename = "Kind")]
        kind: String,
        #[tabled(rename = "Amount")]
        amount: String,
        #[tabled(rename = "Counterparty")]
        counterparty: String,
        #[tabled(rename = "Proposal")]
        proposal: String,
    }

    let rows: Vec<TxRow> = treasury
        .transactions
        .iter()
        .rev()
        .take(recent)
        .map(|tx| TxRow {
            kind: format!("{:?}", tx.tx_type),
            amount: format_eth(tx.amount),
            counterparty: tx.counterparty.short(),
            proposal: tx.proposal_id.map(|id| id.to_string()).unwrap_or_default(),
        })
        .collect();

    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!();
    println!("{}", table);
}

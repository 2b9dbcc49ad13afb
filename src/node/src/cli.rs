//! Command-line surface of the `poamflow` binary

use chrono::{DateTime, NaiveDate, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use poamflow_authz::Role;
use poamflow_workflow::{ApprovalAction, ExceptionType, RiskLevel};
use std::path::PathBuf;

/// POA&M approval workflow CLI
#[derive(Debug, Parser)]
#[command(name = "poamflow")]
#[command(about = "Multi-level DoD approval workflow for POA&M records")]
#[command(version)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, env = "POAMFLOW_CONFIG")]
    pub config: Option<PathBuf>,

    /// JSON records file used by the memory backend
    #[arg(short, long, default_value = "poam-records.json", env = "POAMFLOW_RECORDS")]
    pub records: PathBuf,

    /// Tenant to operate on
    #[arg(short, long, default_value = "default", env = "POAMFLOW_TENANT")]
    pub tenant: String,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Identity of the caller, as the identity layer would supply it
#[derive(Debug, Clone, Args)]
pub struct ActorArgs {
    /// Acting user id
    #[arg(long, env = "POAMFLOW_ACTOR")]
    pub actor: String,

    /// Acting user's role (e.g. ISSO, isse, ao)
    #[arg(long, env = "POAMFLOW_ROLE")]
    pub role: Role,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the approval hierarchy
    Hierarchy,

    /// Print a role's definition and permission table
    Permissions {
        #[arg(long)]
        role: Role,
    },

    /// Create a Draft record
    Create {
        #[command(flatten)]
        actor: ActorArgs,

        #[arg(long)]
        title: String,

        #[arg(long, value_enum)]
        risk: RiskArg,

        #[arg(long, default_value = "")]
        description: String,

        #[arg(long)]
        system: Option<String>,

        /// Control acronym, e.g. AC-2
        #[arg(long)]
        control: Option<String>,

        /// Scheduled completion date (YYYY-MM-DD or RFC 3339)
        #[arg(long, value_parser = parse_date)]
        due: Option<DateTime<Utc>>,
    },

    /// Submit a Draft for review
    Submit {
        id: String,

        #[command(flatten)]
        actor: ActorArgs,

        #[arg(long)]
        comments: Option<String>,
    },

    /// Submit a Draft as an exception request
    RequestException {
        id: String,

        #[command(flatten)]
        actor: ActorArgs,

        #[arg(long, value_enum)]
        exception_type: ExceptionTypeArg,

        #[arg(long)]
        justification: String,

        #[arg(long)]
        risk_acceptance: String,

        /// Compensating control, may be repeated
        #[arg(long = "compensating-control")]
        compensating_controls: Vec<String>,
    },

    /// Take a reviewer action on a record under review
    Act {
        id: String,

        #[command(flatten)]
        actor: ActorArgs,

        #[arg(long, value_enum)]
        action: ActionArg,

        /// Target user for `delegate`
        #[arg(long)]
        delegate_to: Option<String>,

        #[arg(long)]
        comments: Option<String>,
    },

    /// Withdraw a record (creator only)
    Withdraw {
        id: String,

        #[command(flatten)]
        actor: ActorArgs,

        #[arg(long)]
        comments: Option<String>,
    },

    /// Send a reworked record back to ISSE review
    Resubmit {
        id: String,

        #[command(flatten)]
        actor: ActorArgs,

        #[arg(long)]
        comments: Option<String>,
    },

    /// Show a record's workflow status and progress
    Status { id: String },

    /// Show the full record
    Show { id: String },

    /// List records waiting on a role's tier
    Pending {
        #[arg(long)]
        role: Role,
    },

    /// Aggregate statistics for the tenant
    Stats,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RiskArg {
    VeryLow,
    Low,
    Moderate,
    High,
    VeryHigh,
}

impl From<RiskArg> for RiskLevel {
    fn from(arg: RiskArg) -> Self {
        match arg {
            RiskArg::VeryLow => RiskLevel::VeryLow,
            RiskArg::Low => RiskLevel::Low,
            RiskArg::Moderate => RiskLevel::Moderate,
            RiskArg::High => RiskLevel::High,
            RiskArg::VeryHigh => RiskLevel::VeryHigh,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExceptionTypeArg {
    RiskAcceptance,
    FalsePositive,
    OperationalRequirement,
    TechnicalLimitation,
}

impl From<ExceptionTypeArg> for ExceptionType {
    fn from(arg: ExceptionTypeArg) -> Self {
        match arg {
            ExceptionTypeArg::RiskAcceptance => ExceptionType::RiskAcceptance,
            ExceptionTypeArg::FalsePositive => ExceptionType::FalsePositive,
            ExceptionTypeArg::OperationalRequirement => ExceptionType::OperationalRequirement,
            ExceptionTypeArg::TechnicalLimitation => ExceptionType::TechnicalLimitation,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ActionArg {
    Approve,
    Reject,
    RequestModification,
    Escalate,
    Delegate,
}

impl ActionArg {
    /// Combine with the `--delegate-to` value; a delegation without one
    /// becomes an empty target, which the engine refuses
    pub fn into_action(self, delegate_to: Option<String>) -> ApprovalAction {
        match self {
            ActionArg::Approve => ApprovalAction::Approve,
            ActionArg::Reject => ApprovalAction::Reject,
            ActionArg::RequestModification => ApprovalAction::RequestModification,
            ActionArg::Escalate => ApprovalAction::Escalate,
            ActionArg::Delegate => ApprovalAction::delegate(delegate_to.unwrap_or_default()),
        }
    }
}

fn parse_date(value: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return date
            .and_hms_opt(0, 0, 0)
            .map(|dt| dt.and_utc())
            .ok_or_else(|| format!("invalid date '{}'", value));
    }

    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| format!("invalid date '{}': {}", value, e))
}

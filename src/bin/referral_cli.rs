use clap::{Parser, Subcommand};
use log::{debug, error, info};
use referral_intake::crm;
use referral_intake::logging::{LogConfig, LoggingSystem};
use referral_intake::utils::ValidationUtils;
use referral_intake::{load_intake_config, Referral, ReferralResult, ReferralService, ReferralStore};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to the intake configuration file
    #[arg(short, long)]
    config: Option<String>,

    /// TOML logging configuration, replacing the `logging` section
    #[arg(long)]
    log_config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a stored referral as JSON
    Show {
        /// Referral number, e.g. REF-202501-0042
        #[arg(required = true)]
        referral_number: String,
    },
    /// List stored referrals
    List {
        /// Only referrals not yet linked to a CRM case
        #[arg(long)]
        unlinked: bool,
    },
    /// Authenticate against the CRM and report which strategy succeeded
    CheckCrm,
    /// Create the CRM case for a referral whose intake could not reach the CRM
    LinkCase {
        #[arg(required = true)]
        referral_number: String,
    },
}

/// Operator CLI for the referral intake service.
///
/// * `show <REFERRAL>` - print the local record
/// * `list [--unlinked]` - list local records
/// * `check-crm` - obtain a CRM session through the configured strategies
/// * `link-case <REFERRAL>` - create a missing CRM case
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = load_intake_config(cli.config.as_deref())?;
    let log_config = match &cli.log_config {
        Some(path) => LogConfig::from_file(path)?,
        None => config.logging.clone(),
    };
    LoggingSystem::init_with_config(log_config).await?;
    if let Some(active) = LoggingSystem::get_config().await {
        debug!("Log filters: {}", active.filter_directives());
    }
    info!("Using storage at {}", config.storage_path.display());

    match cli.command {
        Commands::Show { referral_number } => {
            let store = ReferralStore::open(&config.storage_path)?;
            let referral = lookup_referral(&store, &referral_number)?;
            println!("{}", serde_json::to_string_pretty(&referral)?);
        }
        Commands::List { unlinked } => {
            let store = ReferralStore::open(&config.storage_path)?;
            let referrals = store.list()?;
            for referral in referrals
                .iter()
                .filter(|r| !unlinked || !r.is_linked())
            {
                println!(
                    "{}  {:<16}  {:<7}  {}  {}",
                    referral.referral_number,
                    referral.status.as_str(),
                    referral.consent_method.as_str(),
                    referral.created_at.format("%Y-%m-%d %H:%M"),
                    referral
                        .external_record_id
                        .as_deref()
                        .unwrap_or("(no CRM case)")
                );
            }
            info!("{} referral(s)", referrals.len());
        }
        Commands::CheckCrm => {
            let client = crm::connect(&config.crm)?;
            let sessions = client.sessions();
            let strategies = sessions.strategy_names();
            if strategies.is_empty() {
                error!("No CRM credential strategy is configured");
            } else {
                info!("Trying strategies in order: {}", strategies.join(", "));
            }
            match sessions.obtain().await {
                Ok(session) => {
                    println!(
                        "CRM session obtained via {} against {} (token fingerprint {}, refreshable: {})",
                        session.strategy(),
                        session.instance_url(),
                        session.fingerprint(),
                        session.is_refreshable()
                    );
                }
                Err(e) => {
                    error!("CRM authentication failed: {}", e);
                    return Err(e.into());
                }
            }
        }
        Commands::LinkCase { referral_number } => {
            let service = ReferralService::from_config(&config)?;
            let outcome = service.link_missing_case(&referral_number).await?;
            if outcome.created {
                println!(
                    "Created CRM case {} for {}",
                    outcome.external_record_id, referral_number
                );
            } else {
                println!(
                    "{} is already linked to CRM case {}",
                    referral_number, outcome.external_record_id
                );
            }
        }
    }

    Ok(())
}

fn lookup_referral(store: &ReferralStore, referral_number: &str) -> ReferralResult<Referral> {
    ValidationUtils::require_valid_referral_number(referral_number)?;
    Ok(store.get_by_referral_number(referral_number)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use referral_intake::ReferralError;

    fn temp_store() -> ReferralStore {
        let db = sled::Config::new().temporary(true).open().unwrap();
        ReferralStore::new(db).unwrap()
    }

    #[test]
    fn test_lookup_rejects_malformed_number() {
        let store = temp_store();
        assert!(matches!(
            lookup_referral(&store, "REF-2025-42"),
            Err(ReferralError::Validation(_))
        ));
    }

    #[test]
    fn test_lookup_unknown_number() {
        let store = temp_store();
        assert!(matches!(
            lookup_referral(&store, "REF-202501-0042"),
            Err(ReferralError::NotFound(_))
        ));
    }
}

//! CLI command implementations

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context as _, Result};
use clap::{Parser, Subcommand, ValueEnum};
use mivida_core::{
    totp::{format_code, time_remaining_at},
    AccountDraft, AccountUpdate, DecoyBehavior, FloatingWindowDelay, PERIOD_SECS,
};
use mivida_vault::{
    AccountCode, AuthState, BackgroundTasks, FileStore, Store, Vault, VaultOptions, VaultStatus,
};
use tracing::info;
use url::Url;

use crate::config::CliConfig;

/// Environment variable holding the PIN when `--pin` is not given
pub const PIN_ENV: &str = "MIVIDA_PIN";

/// Mivida - PIN-protected TOTP authenticator
#[derive(Parser)]
#[command(name = "mivida")]
#[command(about = "PIN-protected TOTP authenticator")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Credential store file (overrides the config file)
    #[arg(long, global = true)]
    pub store: Option<PathBuf>,

    /// Vault PIN (falls back to $MIVIDA_PIN)
    #[arg(long, global = true)]
    pub pin: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show lock state and security settings
    Status {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Configure the first PIN
    SetupPin {
        /// New PIN (4-6 digits)
        #[arg(long)]
        new_pin: String,

        /// New PIN again
        #[arg(long)]
        confirm: String,
    },

    /// Replace the PIN (current PIN from --pin)
    ChangePin {
        #[arg(long)]
        new_pin: String,

        #[arg(long)]
        confirm: String,
    },

    /// Remove the PIN and keep every account
    RemovePin,

    /// Remove the PIN without knowing it, erasing every account
    ForgetPin {
        /// Confirm that every account will be erased
        #[arg(long)]
        yes: bool,
    },

    /// Lock the vault
    Lock,

    /// Add an account
    Add {
        /// Display name
        name: String,

        /// Base32 secret
        secret: String,

        /// Site domain used for page matching
        #[arg(short, long)]
        domain: Option<String>,

        /// URL fragment used for page matching
        #[arg(short, long)]
        url: Option<String>,

        #[arg(long)]
        description: Option<String>,

        /// Code window delay: disabled, always or minutes
        #[arg(long)]
        delay: Option<FloatingWindowDelay>,
    },

    /// Edit an account
    Edit {
        /// Account id
        id: String,

        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        secret: Option<String>,

        /// New domain (empty clears it)
        #[arg(long)]
        domain: Option<String>,

        /// New URL fragment (empty clears it)
        #[arg(long)]
        url: Option<String>,

        #[arg(long)]
        description: Option<String>,

        #[arg(long)]
        delay: Option<FloatingWindowDelay>,
    },

    /// List accounts
    List {
        /// Print as JSON (sealed secrets stay sealed)
        #[arg(long)]
        json: bool,
    },

    /// Delete an account
    Delete {
        /// Account id
        id: String,
    },

    /// Show the current code of every account
    Codes,

    /// Show the codes offered on a page
    Match {
        /// Page URL
        url: String,

        /// Page domain (derived from the URL when omitted)
        #[arg(short, long)]
        domain: Option<String>,
    },

    /// Record that an account's code was copied
    Copied {
        /// Account id
        id: String,
    },

    /// Failed-attempt policy settings
    #[command(subcommand)]
    Policy(PolicyCommands),

    /// Set the auto-lock timeout in seconds (0 disables it)
    AutoLock { seconds: u64 },

    /// Export every account with plaintext secrets
    Export {
        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Replace every account with a backup
    Import {
        /// Backup file
        path: PathBuf,
    },

    /// Print codes at every window until the vault locks or Ctrl-C
    Watch,
}

#[derive(Subcommand)]
pub enum PolicyCommands {
    /// Erase everything after too many failed attempts
    Reset {
        state: Toggle,

        /// Failed attempts allowed
        #[arg(long)]
        max: Option<u32>,
    },

    /// Replace accounts with decoys after too many failed attempts
    Decoy {
        state: Toggle,

        #[arg(long)]
        max: Option<u32>,
    },

    /// What the vault shows once decoys are activated
    Behavior { behavior: BehaviorArg },

    /// Failed attempts allowed before the active policy fires
    MaxAttempts { count: u32 },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum Toggle {
    On,
    Off,
}

impl Toggle {
    fn enabled(self) -> bool {
        matches!(self, Toggle::On)
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum BehaviorArg {
    /// Stay locked with decoys behind the lock screen
    Locked,
    /// Unlock straight into the decoys
    Unlocked,
}

impl From<BehaviorArg> for DecoyBehavior {
    fn from(arg: BehaviorArg) -> Self {
        match arg {
            BehaviorArg::Locked => DecoyBehavior::Locked,
            BehaviorArg::Unlocked => DecoyBehavior::Unlocked,
        }
    }
}

struct Context {
    vault: Arc<Vault>,
    pin: Option<String>,
    group_codes: bool,
}

impl Context {
    fn pin(&self) -> Result<&str> {
        match self.pin.as_deref() {
            Some(pin) => Ok(pin),
            None => bail!("A PIN is required; pass --pin or set {}", PIN_ENV),
        }
    }

    /// Make account operations possible in this process
    ///
    /// Sealed secrets need the PIN entered here; an unlock adopted from
    /// another process is used as is when no PIN is given.
    async fn unlock(&self) -> Result<()> {
        let state = self.vault.state().await?;
        if state == AuthState::NoPinConfigured || self.vault.holds_key().await {
            return Ok(());
        }

        let Some(pin) = self.pin.as_deref() else {
            if state == AuthState::Unlocked {
                return Ok(());
            }
            bail!("Vault is locked; pass --pin or set {}", PIN_ENV);
        };

        if self.vault.verify_pin(pin).await? {
            return Ok(());
        }
        let status = self.vault.status().await?;
        if status.state == AuthState::Unlocked && status.decoy_mode_activated {
            return Ok(());
        }
        match status.attempts_remaining {
            Some(left) if status.state == AuthState::Locked => {
                bail!("Incorrect PIN ({} attempts left)", left)
            }
            _ => bail!("Incorrect PIN"),
        }
    }

    fn print_codes(&self, codes: &[AccountCode]) {
        if codes.is_empty() {
            println!("No accounts");
            return;
        }
        for entry in codes {
            let code = match &entry.code {
                Ok(code) if self.group_codes => format_code(code),
                Ok(code) => code.clone(),
                Err(e) => format!("({})", e),
            };
            println!(
                "{:<24} {:>8}  {}",
                entry.name,
                code,
                entry.domain.as_deref().unwrap_or("")
            );
        }
    }
}

/// Run the CLI
pub async fn run(cli: Cli, config: CliConfig) -> Result<()> {
    let store_path = cli.store.unwrap_or(config.store_path);
    let store: Arc<dyn Store> = Arc::new(FileStore::new(&store_path));
    let vault = Vault::open(store, VaultOptions::default())
        .await
        .with_context(|| format!("Failed to open store {}", store_path.display()))?;

    let ctx = Context {
        vault: Arc::new(vault),
        pin: cli.pin.or_else(|| std::env::var(PIN_ENV).ok()),
        group_codes: config.group_codes,
    };

    match cli.command {
        Commands::Status { json } => {
            let status = ctx.vault.status().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                print_status(&status);
            }
        }

        Commands::SetupPin { new_pin, confirm } => {
            ctx.vault.setup_pin(&new_pin, &confirm).await?;
            println!("PIN configured, vault unlocked");
        }

        Commands::ChangePin { new_pin, confirm } => {
            ctx.vault.change_pin(ctx.pin()?, &new_pin, &confirm).await?;
            println!("PIN changed");
        }

        Commands::RemovePin => {
            ctx.unlock().await?;
            ctx.vault.remove_pin().await?;
            println!("PIN removed; accounts are no longer protected");
        }

        Commands::ForgetPin { yes } => {
            if !yes {
                bail!("This erases every account; rerun with --yes to continue");
            }
            ctx.vault.forget_pin().await?;
            println!("PIN removed and all accounts erased");
        }

        Commands::Lock => {
            ctx.vault.lock().await?;
            println!("Vault locked");
        }

        Commands::Add {
            name,
            secret,
            domain,
            url,
            description,
            delay,
        } => {
            ctx.unlock().await?;
            let mut draft = AccountDraft::new(name, secret);
            draft.domain = domain;
            draft.url = url;
            draft.description = description;
            if let Some(delay) = delay {
                draft = draft.with_delay(delay);
            }
            let account = ctx.vault.add_account(draft).await?;
            println!("Added {} ({})", account.name, account.id);
        }

        Commands::Edit {
            id,
            name,
            secret,
            domain,
            url,
            description,
            delay,
        } => {
            let update = AccountUpdate {
                name,
                secret,
                domain: domain.map(Some),
                url: url.map(Some),
                description: description.map(Some),
                floating_window_delay: delay,
            };
            if update.is_empty() {
                bail!("Nothing to change");
            }
            ctx.unlock().await?;
            let account = ctx.vault.update_account(&id, update).await?;
            println!("Updated {} ({})", account.name, account.id);
        }

        Commands::List { json } => {
            ctx.unlock().await?;
            let accounts = ctx.vault.list_accounts().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&accounts)?);
            } else if accounts.is_empty() {
                println!("No accounts");
            } else {
                for account in &accounts {
                    println!(
                        "{}  {:<24} {:<24} {}",
                        account.id,
                        account.name,
                        account.domain.as_deref().unwrap_or("-"),
                        account.floating_window_delay
                    );
                }
            }
        }

        Commands::Delete { id } => {
            ctx.unlock().await?;
            ctx.vault.delete_account(&id).await?;
            println!("Deleted {}", id);
        }

        Commands::Codes => {
            ctx.unlock().await?;
            let codes = ctx.vault.codes().await?;
            ctx.print_codes(&codes);
            println!(
                "\nRefreshes in {}s",
                time_remaining_at(ctx.vault.clock().now_secs())
            );
        }

        Commands::Match { url, domain } => {
            ctx.unlock().await?;
            let domain = domain.unwrap_or_else(|| host_of(&url));
            let codes = ctx.vault.matching_codes(&url, &domain).await?;
            ctx.print_codes(&codes);
        }

        Commands::Copied { id } => {
            ctx.unlock().await?;
            ctx.vault.record_copy(&id).await?;
        }

        Commands::Policy(cmd) => {
            ctx.unlock().await?;
            handle_policy_command(&ctx.vault, cmd).await?;
        }

        Commands::AutoLock { seconds } => {
            ctx.unlock().await?;
            ctx.vault.set_auto_lock_time(seconds).await?;
            if seconds == 0 {
                println!("Auto-lock disabled");
            } else {
                println!("Auto-lock after {}s", seconds);
            }
        }

        Commands::Export { output } => {
            let json = ctx.vault.export_backup(ctx.pin.as_deref()).await?;
            match output {
                Some(path) => {
                    std::fs::write(&path, json)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    eprintln!("Backup written to {} (secrets are in plaintext)", path.display());
                }
                None => println!("{}", json),
            }
        }

        Commands::Import { path } => {
            let json = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            ctx.unlock().await?;
            let count = ctx.vault.import_backup(&json).await?;
            println!("Imported {} accounts", count);
        }

        Commands::Watch => {
            ctx.unlock().await?;
            watch(&ctx).await?;
        }
    }

    Ok(())
}

async fn handle_policy_command(vault: &Vault, cmd: PolicyCommands) -> Result<()> {
    match cmd {
        PolicyCommands::Reset { state, max } => {
            vault.set_reset_on_failed_attempts(state.enabled(), max).await?;
        }
        PolicyCommands::Decoy { state, max } => {
            vault.set_decoy_mode(state.enabled(), max).await?;
        }
        PolicyCommands::Behavior { behavior } => {
            vault.set_decoy_behavior(behavior.into()).await?;
        }
        PolicyCommands::MaxAttempts { count } => {
            vault.set_max_failed_attempts(count).await?;
        }
    }
    print_status(&vault.status().await?);
    Ok(())
}

async fn watch(ctx: &Context) -> Result<()> {
    let tasks = BackgroundTasks::spawn(ctx.vault.clone());
    let mut codes = tasks.codes();
    let mut last_window = None;

    loop {
        tokio::select! {
            changed = codes.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = codes.borrow_and_update().clone();
                if snapshot.locked {
                    println!("Vault locked");
                    break;
                }
                let window = snapshot.generated_at_secs / PERIOD_SECS;
                if last_window != Some(window) {
                    last_window = Some(window);
                    ctx.print_codes(&snapshot.codes);
                    println!("-- refreshes in {}s\n", snapshot.seconds_remaining);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        }
    }

    tasks.shutdown();
    Ok(())
}

fn print_status(status: &VaultStatus) {
    let state = match status.state {
        AuthState::NoPinConfigured => "no PIN configured",
        AuthState::Locked => "locked",
        AuthState::Unlocked if status.session_has_key => "unlocked",
        AuthState::Unlocked => "unlocked (enter the PIN to view sealed codes)",
    };
    println!("Vault: {}", state);
    if !status.state.allows_access() || status.failed_attempts > 0 {
        println!(
            "  Failed attempts: {}/{}",
            status.failed_attempts, status.max_failed_attempts
        );
    }

    let policy = if status.decoy_mode_enabled {
        format!("decoy accounts ({:?})", status.decoy_behavior).to_lowercase()
    } else if status.reset_on_failed_attempts {
        "erase everything".to_string()
    } else {
        "none".to_string()
    };
    println!("  On too many failed attempts: {}", policy);
    if let Some(left) = status.attempts_remaining {
        println!("  Attempts left: {}", left);
    }

    if status.auto_lock_time == 0 {
        println!("  Auto-lock: off");
    } else {
        println!("  Auto-lock: {}s", status.auto_lock_time);
    }
}

/// Host part of a page URL, lowercased
fn host_of(url: &str) -> String {
    let lowered = url.to_ascii_lowercase();
    let with_scheme = if lowered.starts_with("http://") || lowered.starts_with("https://") {
        url.to_string()
    } else {
        format!("https://{}", url)
    };
    Url::parse(&with_scheme)
        .ok()
        .and_then(|parsed| parsed.host_str().map(str::to_ascii_lowercase))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_of() {
        assert_eq!(host_of("https://Login.Example.com/path?q=1"), "login.example.com");
        assert_eq!(host_of("http://user@example.com:8080/"), "example.com");
        assert_eq!(host_of("example.com/login"), "example.com");
        assert_eq!(host_of(""), "");
        assert_eq!(host_of("http://[::1]:8080/"), "[::1]");
        assert_eq!(host_of("example.com:8443"), "example.com");
    }

    #[test]
    fn test_cli_parses_subcommands() {
        let cli = Cli::try_parse_from([
            "mivida", "add", "GitHub", "JBSWY3DPEHPK3PXP", "--domain", "github.com", "--delay", "5",
        ])
        .unwrap();
        match cli.command {
            Commands::Add { name, delay, domain, .. } => {
                assert_eq!(name, "GitHub");
                assert_eq!(domain.as_deref(), Some("github.com"));
                assert_eq!(delay, Some(FloatingWindowDelay::Minutes(5)));
            }
            _ => panic!("expected add"),
        }

        let cli = Cli::try_parse_from(["mivida", "policy", "decoy", "on", "--max", "3", "--pin", "1234"])
            .unwrap();
        assert_eq!(cli.pin.as_deref(), Some("1234"));
        assert!(matches!(
            cli.command,
            Commands::Policy(PolicyCommands::Decoy { state: Toggle::On, max: Some(3) })
        ));
    }

    #[test]
    fn test_cli_rejects_bad_delay() {
        assert!(Cli::try_parse_from(["mivida", "add", "A", "JBSWY3DP", "--delay", "soon"]).is_err());
    }
}

use anyhow::{Context, Result, bail};
use clap::{ArgAction, Parser, Subcommand};
use clap_verbosity_flag::{InfoLevel, Verbosity};
use std::fs::{self, OpenOptions};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use uotp_lib::constants::DEFAULT_ENDPOINT;
use uotp_lib::{AccountRecord, CancellationToken, Session, TcpTransport, TransportConfig};

const DEFAULT_CONF: &str = "~/.config/uotp/config.json";

/// Software OTP token for the U-OTP service.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None, disable_help_subcommand = true)]
struct Cli {
    /// Issue a new account, replacing the stored one.
    #[arg(long)]
    issue: bool,
    /// Never prompt.
    #[arg(long)]
    force: bool,
    /// Path to the account file.
    #[arg(long, env = "UOTP_CONF", default_value = DEFAULT_CONF)]
    conf: String,
    /// Synchronize time with the server before generating tokens.
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    autosync: bool,
    /// Server address as host:port.
    #[arg(long, default_value = DEFAULT_ENDPOINT)]
    endpoint: String,
    /// Connect and I/O timeout in seconds.
    #[arg(long, default_value_t = 10)]
    timeout: u64,
    #[command(flatten)]
    verbose: Verbosity<InfoLevel>,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum Command {
    /// Print the current token (default).
    Token,
    /// Print a page of usage history.
    History {
        #[arg(short, long, default_value_t = 1)]
        page: u16,
    },
    /// Reset the server-side error counter.
    Reset,
    /// Print the server help messages.
    Help,
    /// Print account information.
    Info,
}

fn setup_logging(verbosity: &Verbosity<InfoLevel>) {
    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stderr)
        .with_target(false)
        .without_time();

    let filter = EnvFilter::builder()
        .with_default_directive(verbosity.tracing_level_filter().into())
        .from_env_lossy();

    tracing_subscriber::registry().with(filter).with(console_layer).init();
}

/// Expand a leading `~` to the home directory.
fn solve_path(path: &str) -> Result<PathBuf> {
    let rest = match path {
        "~" => "",
        _ => match path.strip_prefix("~/") {
            Some(rest) => rest,
            None => return Ok(PathBuf::from(path)),
        },
    };
    let home = std::env::var_os("HOME").context("HOME is not set, cannot expand ~")?;
    Ok(Path::new(&home).join(rest))
}

fn confirm(force: bool, question: &str) -> Result<()> {
    if force {
        return Ok(());
    }

    print!("{question} Y/N ");
    io::stdout().flush()?;

    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    if !answer.trim_start().starts_with(['Y', 'y']) {
        bail!("Aborted");
    }
    Ok(())
}

fn load(path: &Path) -> Result<AccountRecord> {
    let text = fs::read_to_string(path).with_context(|| format!("Failed to read account file {path:?}"))?;
    serde_json::from_str(&text).with_context(|| format!("Failed to parse account file {path:?}"))
}

fn save(path: &Path, record: &AccountRecord) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).with_context(|| format!("Failed to create {dir:?}"))?;
    }

    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options
        .open(path)
        .with_context(|| format!("Failed to open account file {path:?}"))?;
    serde_json::to_writer_pretty(&mut file, record)?;
    writeln!(file)?;
    debug!("Saved account to {:?}", path);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(&cli.verbose);

    let timeout = Duration::from_secs(cli.timeout);
    let transport = TcpTransport::new(TransportConfig {
        endpoint: cli.endpoint.clone(),
        connect_timeout: timeout,
        io_timeout: timeout,
    });

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, cancelling");
            interrupt.cancel();
        }
    });

    let command = cli.command.unwrap_or(Command::Token);

    if let Command::Help = command {
        let session = Session::new(transport);
        for message in session.help(&cancel).await.context("Failed to fetch help")? {
            println!("{message}");
        }
        return Ok(());
    }

    let conf = solve_path(&cli.conf)?;
    let exists = conf.exists();

    let mut session = if cli.issue || !exists {
        if exists {
            confirm(cli.force, "Account already exists. Do you want to replace it?")?;
        } else {
            confirm(cli.force, "Account does not exist. Do you want to issue one now?")?;
        }

        let mut session = Session::new(transport);
        if cli.autosync {
            session.sync_time(&cancel).await.context("Failed to synchronize time")?;
        }
        session.issue(&cancel).await.context("Failed to issue account")?;
        save(&conf, &session.record())?;

        println!("A new account has been issued.");
        println!("Keep the account file safe, a lost account cannot be recovered.");
        println!();
        session
    } else {
        let record = load(&conf)?;
        Session::from_record(transport, &record).with_context(|| format!("Invalid account in {conf:?}"))?
    };

    println!("Serial Number: {}", session.serial_number());

    if cli.autosync {
        session.sync_time(&cancel).await.context("Failed to synchronize time")?;
        save(&conf, &session.record())?;
    }

    match command {
        Command::Token => {
            println!("OTP Token: {}", session.generate_token()?);
        }
        Command::History { page } => {
            let history = session.history(page, &cancel).await.context("Failed to fetch history")?;
            println!(
                "Period: {} ~ {} (page {}/{})",
                history.period_start, history.period_end, history.page_current, history.page_total
            );
            for entry in &history.entries {
                println!("{}  {}  {}", entry.at, entry.kind, entry.name);
            }
        }
        Command::Reset => {
            session.reset_error_count(&cancel).await.context("Failed to reset error count")?;
            println!("Error count has been reset.");
        }
        Command::Info => {
            let information = session.information(&cancel).await.context("Failed to fetch information")?;
            println!("OID: {}", information.oid);
            println!("Seed: {}", information.seed_label);
            println!("Partner: {}", information.partner);
        }
        Command::Help => {}
    }

    Ok(())
}

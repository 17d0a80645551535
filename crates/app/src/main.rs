use std::fmt;

use api::{AppConfig, AppState};
use services::{AppServices, Clock};
use storage::Storage;
use storage::seed::seed_demo;
use tracing_subscriber::EnvFilter;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidPort { raw: String },
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidPort { raw } => write!(f, "invalid --port value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  pingtopass serve [--db <sqlite_url>] [--port <port>]");
    eprintln!("  pingtopass seed  [--db <sqlite_url>]");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --db   $TURSO_DATABASE_URL or sqlite://pingtopass.sqlite3");
    eprintln!("  --port $PORT or 3000");
    eprintln!();
    eprintln!("Environment (a .env file is read when present):");
    eprintln!("  ENVIRONMENT, LOG_LEVEL, RUST_LOG, JWT_SECRET, TURSO_AUTH_TOKEN,");
    eprintln!("  GOOGLE_CLIENT_ID, GOOGLE_CLIENT_SECRET, STRIPE_SECRET_KEY,");
    eprintln!("  OPENROUTER_API_KEY, OPENROUTER_BASE_URL, OPENROUTER_MODEL");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Serve,
    Seed,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "serve" => Some(Self::Serve),
            "seed" => Some(Self::Seed),
            _ => None,
        }
    }
}

/// Flags that override values read from the environment.
#[derive(Debug, Default)]
struct Overrides {
    db_url: Option<String>,
    port: Option<u16>,
}

impl Overrides {
    fn parse(
        cmd: Command,
        args: &mut impl Iterator<Item = String>,
    ) -> Result<Self, ArgsError> {
        let mut overrides = Self::default();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    overrides.db_url = Some(value);
                }
                "--port" if cmd == Command::Serve => {
                    let value = require_value(args, "--port")?;
                    let port = value
                        .parse::<u16>()
                        .map_err(|_| ArgsError::InvalidPort { raw: value.clone() })?;
                    overrides.port = Some(port);
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(overrides)
    }

    fn apply(self, config: &mut AppConfig) {
        if let Some(db_url) = self.db_url {
            config.database_url = db_url;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        config.database_url = normalize_sqlite_url(&config.database_url);
    }
}

fn normalize_sqlite_url(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed == "sqlite::memory:"
        || trimmed.starts_with("sqlite:file:")
        || trimmed.starts_with("sqlite:///")
    {
        return trimmed.to_string();
    }

    let path_str = trimmed
        .strip_prefix("sqlite://")
        .or_else(|| trimmed.strip_prefix("sqlite:"))
        .unwrap_or(trimmed);
    let path = std::path::Path::new(path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" || db_url.contains("mode=memory") {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }

    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = &config.log_level;
        format!("app={level},api={level},services={level},storage={level},sqlx=warn,tower_http=info")
            .into()
    });

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if config.is_production() {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv: Vec<String> = std::env::args().skip(1).collect();

    // Default behavior: serve when no subcommand is provided.
    let cmd = match argv.first().map(String::as_str) {
        None => Command::Serve,
        Some("--help" | "-h") => {
            print_usage();
            return Ok(());
        }
        Some(first) if first.starts_with("--") => Command::Serve,
        Some(first) => Command::from_arg(first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "unknown subcommand")
        })?,
    };

    if !argv.is_empty() && !argv[0].starts_with("--") {
        argv.remove(0);
    }

    let mut iter = argv.into_iter();
    let overrides = Overrides::parse(cmd, &mut iter).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    dotenv::dotenv().ok();
    let mut config = AppConfig::from_env().map_err(|e| {
        eprintln!("configuration error: {e}");
        e
    })?;
    overrides.apply(&mut config);
    init_tracing(&config);

    tracing::info!(
        environment = %config.environment,
        log_level = %config.log_level,
        database_url = %config.database_url,
        remote_auth_token = config.database_auth_token.is_some(),
        ai_enabled = config.openrouter_api_key.is_some(),
        sign_in = config.login_policy().as_str(),
        "pingtopass starting"
    );

    prepare_sqlite_file(&config.database_url)?;
    let storage = Storage::sqlite(&config.database_url).await?;

    match cmd {
        Command::Serve => {
            let services = AppServices::new(
                &storage,
                Clock::default_clock(),
                config.service_settings(),
            );
            let state = AppState::new(services, config);
            api::serve(state).await?;
            Ok(())
        }
        Command::Seed => {
            let report = seed_demo(&storage).await?;
            println!(
                "seeded {} exams, {} objectives, {} questions",
                report.exams, report.objectives, report.questions
            );
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}

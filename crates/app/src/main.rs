use std::fmt;
use std::path::PathBuf;

use services::{AppServices, Clock};
use studify_core::model::TemplateId;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt as log_fmt};

mod render;
mod take;

const DEFAULT_DB_URL: &str = "sqlite://studify.sqlite3";
const DEFAULT_LIST_LIMIT: u32 = 20;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    MissingFlag { command: &'static str, flag: &'static str },
    UnknownArg(String),
    InvalidTemplateId { raw: String },
    InvalidLimit { raw: String },
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingFlag { command, flag } => write!(f, "{command} requires {flag}"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidTemplateId { raw } => {
                write!(f, "invalid --template-id value: {raw}")
            }
            ArgsError::InvalidLimit { raw } => write!(f, "invalid --limit value: {raw}"),
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
    eprintln!("  app import    --file <template.json> [--db <sqlite_url>]");
    eprintln!("  app templates [--limit <n>] [--db <sqlite_url>]");
    eprintln!("  app take      --template-id <id> [--db <sqlite_url>]");
    eprintln!("  app results   --template-id <id> [--limit <n>] [--json] [--db <sqlite_url>]");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --db {DEFAULT_DB_URL}");
    eprintln!("  --limit {DEFAULT_LIST_LIMIT}");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  STUDIFY_DB_URL, RUST_LOG");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Import,
    Templates,
    Take,
    Results,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "import" => Some(Self::Import),
            "templates" => Some(Self::Templates),
            "take" => Some(Self::Take),
            "results" => Some(Self::Results),
            _ => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Import => "import",
            Self::Templates => "templates",
            Self::Take => "take",
            Self::Results => "results",
        }
    }
}

struct Args {
    db_url: String,
    file: Option<PathBuf>,
    template_id: Option<TemplateId>,
    limit: u32,
    json: bool,
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut db_url = std::env::var("STUDIFY_DB_URL")
            .ok()
            .map_or_else(|| DEFAULT_DB_URL.into(), normalize_sqlite_url);
        let mut file = None;
        let mut template_id = None;
        let mut limit = DEFAULT_LIST_LIMIT;
        let mut json = false;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--file" => {
                    file = Some(PathBuf::from(require_value(args, "--file")?));
                }
                "--template-id" => {
                    let value = require_value(args, "--template-id")?;
                    let parsed = value
                        .parse::<TemplateId>()
                        .map_err(|_| ArgsError::InvalidTemplateId { raw: value.clone() })?;
                    template_id = Some(parsed);
                }
                "--limit" => {
                    let value = require_value(args, "--limit")?;
                    limit = value
                        .parse()
                        .map_err(|_| ArgsError::InvalidLimit { raw: value.clone() })?;
                }
                "--json" => json = true,
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            db_url,
            file,
            template_id,
            limit,
            json,
        })
    }

    fn require_template_id(&self, command: Command) -> Result<TemplateId, ArgsError> {
        self.template_id.ok_or(ArgsError::MissingFlag {
            command: command.name(),
            flag: "--template-id",
        })
    }

    fn require_file(&self, command: Command) -> Result<PathBuf, ArgsError> {
        self.file.clone().ok_or(ArgsError::MissingFlag {
            command: command.name(),
            flag: "--file",
        })
    }
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
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

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(log_fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv = std::env::args().skip(1);

    let cmd = match argv.next() {
        None => {
            print_usage();
            return Ok(());
        }
        Some(first) if first == "--help" || first == "-h" => {
            print_usage();
            return Ok(());
        }
        Some(first) => Command::from_arg(&first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "unknown subcommand")
        })?,
    };

    let parsed = Args::parse(&mut argv).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    // Open + migrate SQLite at startup. Keep this in the binary glue so core/services stay pure.
    prepare_sqlite_file(&parsed.db_url)?;
    let app = AppServices::new_sqlite(&parsed.db_url, Clock::default_clock()).await?;
    info!(db_url = %parsed.db_url, command = cmd.name(), "storage ready");

    match cmd {
        Command::Import => {
            let path = parsed.require_file(cmd)?;
            let document = tokio::fs::read_to_string(&path).await?;
            let template = app.templates().import_json(&document).await?;
            println!(
                "Imported template {} \"{}\" with {} questions.",
                template.id(),
                template.title(),
                template.question_count()
            );
        }
        Command::Templates => {
            let items = app.templates().list(parsed.limit).await?;
            render::print_templates(&items);
        }
        Command::Take => {
            let template_id = parsed.require_template_id(cmd)?;
            take::run_exam(&app, template_id).await?;
        }
        Command::Results => {
            let template_id = parsed.require_template_id(cmd)?;
            let items = app.results().list_recent(template_id, parsed.limit).await?;
            if parsed.json {
                println!("{}", serde_json::to_string_pretty(&items)?);
            } else {
                render::print_results(template_id, &items);
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    init_tracing();
    if let Err(err) = run().await {
        // At this layer (binary glue), printing once is fine.
        eprintln!("{err}");
        std::process::exit(2);
    }
}

use clap::{Parser, Subcommand};

use redcache::{MissingKeyPolicy, ScanOptions, StoreConfig, StoreHandle};

#[derive(Parser)]
#[command(name = "redcache")]
#[command(about = "Inspect a Redis-compatible store through the redcache facade")]
struct Args {
    /// Store address (host:port)
    #[arg(short, long, env = "REDCACHE_ADDR", default_value = "127.0.0.1:6379")]
    addr: String,

    /// Password for AUTH
    #[arg(long, env = "REDCACHE_PASSWORD")]
    password: Option<String>,

    /// Username for AUTH (ACL users)
    #[arg(long, env = "REDCACHE_USERNAME")]
    username: Option<String>,

    /// Logical database index
    #[arg(long, env = "REDCACHE_DB", default_value = "0")]
    db: i64,

    /// Keys requested per SCAN call
    #[arg(long, default_value = "10")]
    page_size: usize,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check that the store answers
    Ping,
    /// Print the string value of a key
    Get { key: String },
    /// Print the remaining time to live of a key in milliseconds
    Ttl { key: String },
    /// List keys matching a glob pattern (walks SCAN)
    Keys { pattern: String },
    /// Print `suffix<TAB>value` for every key starting with a prefix
    DumpPrefix {
        prefix: String,
        /// Skip keys deleted mid-scan instead of failing
        #[arg(long)]
        skip_missing: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    let mut config = StoreConfig::new(&args.addr)
        .db(args.db)
        .scan(ScanOptions::new().page_size(args.page_size));
    config.password = args.password;
    config.username = args.username;

    let db = StoreHandle::open(config).await?;
    tracing::debug!("Connected to {} (db {})", args.addr, args.db);

    match args.command {
        Command::Ping => println!("PONG"),
        Command::Get { key } => match db.get_string(&key).await? {
            Some(value) => println!("{}", value),
            None => anyhow::bail!("key not found: {}", key),
        },
        Command::Ttl { key } => println!("{}", db.pttl(&key).await?),
        Command::Keys { pattern } => {
            let mut keys = db.scan_keys(&pattern).await?;
            keys.sort();
            keys.dedup();
            for key in keys {
                println!("{}", key);
            }
        }
        Command::DumpPrefix { prefix, skip_missing } => {
            let mut options = db.scan_options().clone();
            if skip_missing {
                options.on_missing = MissingKeyPolicy::Skip;
            }
            let values = db.list_all_values_with_prefix_with(&prefix, options).await?;
            let mut entries: Vec<_> = values.into_iter().collect();
            entries.sort();
            for (suffix, value) in entries {
                println!("{}\t{}", suffix, value);
            }
        }
    }

    Ok(())
}

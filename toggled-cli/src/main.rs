mod server;

use std::process;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use toggled_lib::{FlagError, FlagInput, FlagService, DEFAULT_ENVIRONMENT, DEFAULT_ROLLOUT};
use tracing_subscriber::EnvFilter;

use server::config::{StorageBackend, ToggledConfig};
use server::store::SledStore;

#[derive(Parser, Debug)]
#[command(name = "toggled")]
#[command(version)]
#[command(about = "Feature flag store with percentage rollouts", long_about = None)]
struct Args {
    /// Emit logs as JSON lines
    #[arg(long = "log-json", global = true)]
    log_json: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server
    Serve {
        /// Port to listen on
        #[arg(short = 'p', long = "port")]
        port: Option<u16>,

        /// Address to bind
        #[arg(long = "hostname")]
        hostname: Option<String>,

        /// Path to config file
        #[arg(short = 'c', long = "config", default_value = "toggled.toml")]
        config: String,

        /// Storage backend (sled or memory)
        #[arg(long = "storage")]
        storage: Option<StorageBackend>,

        /// Directory for the sled database
        #[arg(short = 'd', long = "data-dir")]
        data_dir: Option<String>,
    },
    /// Create or update a flag in a local data directory
    Set {
        /// Flag name
        name: String,

        /// Store the flag as disabled
        #[arg(long = "disabled")]
        disabled: bool,

        /// Rollout percentage (0-100)
        #[arg(short = 'r', long = "rollout", default_value_t = DEFAULT_ROLLOUT, allow_negative_numbers = true)]
        rollout: i64,

        /// Environment the flag belongs to
        #[arg(short = 'e', long = "env", default_value = DEFAULT_ENVIRONMENT)]
        env: String,

        #[arg(short = 'd', long = "data-dir", default_value = "./data")]
        data_dir: String,
    },
    /// Evaluate a flag from a local data directory
    Get {
        /// Flag name
        name: String,

        /// Environment to evaluate in
        #[arg(short = 'e', long = "env", default_value = DEFAULT_ENVIRONMENT)]
        env: String,

        #[arg(short = 'd', long = "data-dir", default_value = "./data")]
        data_dir: String,
    },
    /// List flags stored in a local data directory
    List {
        #[arg(short = 'd', long = "data-dir", default_value = "./data")]
        data_dir: String,
    },
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("toggled=info,toggled_cli=info,toggled_lib=info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn open_local(data_dir: &str) -> FlagService {
    match SledStore::open(data_dir) {
        Ok(store) => FlagService::new(Arc::new(store)),
        Err(e) => {
            eprintln!("{}", e);
            process::exit(1);
        }
    }
}

fn exit_with(e: FlagError) -> ! {
    eprintln!("{}", e);
    let code = match e {
        FlagError::Validation { .. } => 2,
        FlagError::NotFound { .. } => 3,
        FlagError::Storage(_) => 1,
    };
    process::exit(code);
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{}", s),
        Err(e) => {
            eprintln!("failed to render output: {}", e);
            process::exit(1);
        }
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_tracing(args.log_json);

    match args.cmd {
        Command::Serve {
            port,
            hostname,
            config,
            storage,
            data_dir,
        } => {
            // CLI args override env vars, which override the config file
            let mut cfg = ToggledConfig::load(&config);
            cfg.apply_env_overrides();
            if let Some(port) = port {
                cfg.server.port = port;
            }
            if let Some(hostname) = hostname {
                cfg.server.hostname = hostname;
            }
            if let Some(storage) = storage {
                cfg.server.storage = storage;
            }
            if let Some(data_dir) = data_dir {
                cfg.server.data_dir = data_dir;
            }
            server::run_serve(cfg).await
        }
        Command::Set {
            name,
            disabled,
            rollout,
            env,
            data_dir,
        } => {
            let service = open_local(&data_dir);
            let input = FlagInput::new(name, !disabled)
                .rollout(rollout)
                .environment(env);
            match service.create_or_update_flag(input).await {
                Ok(record) => print_json(&record),
                Err(e) => exit_with(e),
            }
        }
        Command::Get {
            name,
            env,
            data_dir,
        } => {
            let service = open_local(&data_dir);
            match service.get_flag(&name, Some(&env)).await {
                Ok(decision) => print_json(&decision),
                Err(e) => exit_with(e),
            }
        }
        Command::List { data_dir } => {
            let service = open_local(&data_dir);
            match service.list_flags().await {
                Ok(records) => print_json(&records),
                Err(e) => exit_with(e),
            }
        }
    }
}

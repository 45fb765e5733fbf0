//! modelstash CLI - cache model artifacts into an S3-compatible store.
//!
//! Connection settings come from flags or the environment (`S3_BUCKET`,
//! `S3_ENDPOINT`, `S3_ACCESS_KEY_ID`, `S3_SECRET_ACCESS_KEY`, ...).
//! Every command prints a one-line outcome and exits 0 on success, 1 on
//! missing configuration or operation failure.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `cache` | Ensure a model is cached in the object store |
//! | `load`  | Materialize a model locally and print its path |
//! | `list`  | List cached models on one tier |
//! | `evict` | Remove a model from the local and/or remote tier |

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{ArgAction, Args, Parser, Subcommand};
use colored::Colorize;
use modelstash_core::{
    CacheConfig, DirCopyFetcher, ListSource, LogObserver, ModelCache, ModelFetcher, NoFetcher,
};

/// modelstash - two-tier cache for model artifacts
#[derive(Parser)]
#[command(name = "modelstash", about = "Cache model artifacts locally and in an S3-compatible object store", version)]
struct Cli {
    #[command(flatten)]
    store: StoreArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct StoreArgs {
    /// Object store bucket
    #[arg(long, global = true, env = "S3_BUCKET")]
    bucket: Option<String>,

    /// Object store endpoint URL
    #[arg(long, global = true, env = "S3_ENDPOINT")]
    endpoint: Option<String>,

    /// Access key id
    #[arg(long, global = true, env = "S3_ACCESS_KEY_ID", hide_env_values = true)]
    access_key_id: Option<String>,

    /// Secret access key
    #[arg(long, global = true, env = "S3_SECRET_ACCESS_KEY", hide_env_values = true)]
    secret_access_key: Option<String>,

    /// Region name
    #[arg(long, global = true, env = "S3_REGION", default_value = "us-east-1")]
    region: String,

    /// Remote key prefix
    #[arg(long, global = true, env = "S3_PREFIX", default_value = "models/")]
    prefix: String,

    /// Local cache directory
    #[arg(long, global = true, env = "MODEL_CACHE_DIR")]
    cache_dir: Option<PathBuf>,

    /// Store models as one object per file instead of a single archive
    #[arg(long, global = true, env = "S3_STORE_AS_DIRECTORY")]
    store_as_directory: bool,

    /// Verify TLS certificates (pass `false` for self-signed endpoints)
    #[arg(
        long,
        global = true,
        env = "S3_VERIFY_SSL",
        default_value_t = true,
        action = ArgAction::Set
    )]
    verify_ssl: bool,

    /// Custom root CA bundle for the endpoint connection
    #[arg(long, global = true, env = "S3_ROOT_CA_PATH")]
    root_ca_path: Option<PathBuf>,

    /// Snapshot tree used to fetch models that are not yet cached
    #[arg(long, global = true, env = "MODEL_SOURCE_DIR")]
    source_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Ensure a model is cached in the object store
    Cache {
        /// Model identifier, e.g. `huggingface/bert-base-uncased`
        model_id: String,
        /// Re-upload even if the remote representation already exists
        #[arg(long)]
        force: bool,
    },
    /// Materialize a model locally and print its path
    Load {
        /// Model identifier
        model_id: String,
    },
    /// List cached models
    List {
        /// Tier to inspect: `local` or `remote`
        #[arg(long, default_value = "local")]
        source: String,
        /// Print the identifiers as a JSON array
        #[arg(long)]
        json: bool,
    },
    /// Evict a model from the local and/or remote tier
    Evict {
        /// Model identifier
        model_id: String,
        /// Remove the local entry (the default when no tier is selected)
        #[arg(long)]
        local: bool,
        /// Remove the remote representation
        #[arg(long)]
        remote: bool,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{} {err:#}", "error:".red().bold());
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let cache = build_cache(&cli.store)?;

    match cli.command {
        Commands::Cache { model_id, force } => {
            cache.ensure_cached(&model_id, force)?;
            println!(
                "{} model {model_id} cached to object store",
                "ok:".green().bold()
            );
        }
        Commands::Load { model_id } => {
            let path = cache.materialize(&model_id)?;
            println!("{}", path.display());
        }
        Commands::List { source, json } => {
            let source: ListSource = source.parse()?;
            let models = cache.enumerate(source)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&models)?);
            } else {
                for model_id in models {
                    println!("{model_id}");
                }
            }
        }
        Commands::Evict {
            model_id,
            local,
            remote,
        } => {
            // no tier selected means local, matching the library default
            let (local, remote) = if !local && !remote {
                (true, false)
            } else {
                (local, remote)
            };
            if cache.evict(&model_id, local, remote)? {
                println!("{} evicted {model_id}", "ok:".green().bold());
            } else {
                println!("nothing to evict for {model_id}");
            }
        }
    }
    Ok(())
}

fn build_cache(args: &StoreArgs) -> anyhow::Result<ModelCache> {
    let bucket = args.bucket.clone().context("S3_BUCKET is not set")?;
    let endpoint = args.endpoint.clone().context("S3_ENDPOINT is not set")?;
    let access_key_id = args
        .access_key_id
        .clone()
        .context("S3_ACCESS_KEY_ID is not set")?;
    let secret_access_key = args
        .secret_access_key
        .clone()
        .context("S3_SECRET_ACCESS_KEY is not set")?;

    let mut config = CacheConfig::new(bucket, endpoint, access_key_id, secret_access_key)
        .with_region(args.region.clone())
        .with_prefix(args.prefix.clone())
        .with_store_as_archive(!args.store_as_directory)
        .with_verify_tls(args.verify_ssl);
    if let Some(cache_dir) = &args.cache_dir {
        config = config.with_cache_root(cache_dir);
    }
    if let Some(ca_bundle) = &args.root_ca_path {
        config = config.with_ca_bundle(ca_bundle);
    }

    let fetcher: Box<dyn ModelFetcher> = match &args.source_dir {
        Some(source_dir) => Box::new(DirCopyFetcher::new(source_dir)),
        None => Box::new(NoFetcher),
    };

    let cache = ModelCache::connect(config, fetcher)?.with_observer(LogObserver);
    Ok(cache)
}

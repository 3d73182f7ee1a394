use clap::{Parser, Subcommand, ValueEnum};
use stashdb::schema::parse_schema;
use stashdb::validation::validate_document;
use stashdb::{
    Connector, FileStorage, ListParams, LocalConnector, MergeStrategy, RemoteConnector,
    Response, SeedDescriptor, StashConfig,
};
use std::path::PathBuf;
use std::process;

/// StashDB CLI: read and write a file-backed StashDB blob from the command line
#[derive(Parser)]
#[command(name = "stashdb", version, about)]
struct Cli {
    /// Blob file; its directory holds the data and its stem is the storage key
    /// (env: STASHDB_DATA_FILE, default: ./stashdb.json)
    #[arg(long)]
    data_file: Option<PathBuf>,

    /// Connector config file (env: STASHDB_CONFIG)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Schema file whose collection defaults are applied
    #[arg(long)]
    schema: Option<PathBuf>,

    /// Send CRUD commands to the config's remote backend instead of the file
    #[arg(long)]
    remote: bool,

    /// Output format
    #[arg(long, default_value = "yaml")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    Yaml,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Read an endpoint path (e.g. todos/1 or todos?done=true)
    Get {
        path: String,
    },

    /// List a collection page by page
    List {
        /// Collection path (e.g. todos or todos/1/comments)
        path: String,
        #[arg(long)]
        page: Option<usize>,
        #[arg(long)]
        limit: Option<usize>,
        /// Exact-match filters (e.g. --filter done=true)
        #[arg(long = "filter", value_parser = parse_key_value)]
        filters: Vec<(String, String)>,
    },

    /// Create a document
    Create {
        path: String,
        /// Field values (e.g. --field text="Buy milk")
        #[arg(long = "field", value_parser = parse_key_value)]
        fields: Vec<(String, String)>,
        /// Whole payload as a JSON object
        #[arg(long)]
        json: Option<String>,
    },

    /// Replace a document
    Update {
        path: String,
        #[arg(long = "field", value_parser = parse_key_value)]
        fields: Vec<(String, String)>,
        #[arg(long)]
        json: Option<String>,
    },

    /// Merge fields into a document
    Patch {
        path: String,
        #[arg(long = "field", value_parser = parse_key_value)]
        fields: Vec<(String, String)>,
        #[arg(long)]
        json: Option<String>,
    },

    /// Delete a document
    Delete {
        path: String,
    },

    /// Merge a seed file (YAML or JSON) into the stored data
    Seed {
        file: PathBuf,
        /// Override the file's merge strategy
        #[arg(long)]
        strategy: Option<Strategy>,
    },

    /// Check stored documents against the registered schemas
    Validate,

    /// Show storage location, collections and settings
    Status,

    /// Dump the stored data, or one collection of it
    Export {
        collection: Option<String>,
    },

    /// Remove all stored data
    Clear,
}

#[derive(Clone, ValueEnum)]
enum Strategy {
    Replace,
    Append,
    Merge,
}

impl From<Strategy> for MergeStrategy {
    fn from(s: Strategy) -> Self {
        match s {
            Strategy::Replace => MergeStrategy::Replace,
            Strategy::Append => MergeStrategy::Append,
            Strategy::Merge => MergeStrategy::Merge,
        }
    }
}

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let pos = s
        .find('=')
        .ok_or_else(|| format!("Invalid key=value pair: no '=' found in '{s}'"))?;
    Ok((s[..pos].to_string(), s[pos + 1..].to_string()))
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    env_logger::init();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("ERROR:{e}");
            process::exit(1);
        }
    }
}

/// Storage directory and key for the blob file.
fn storage_location(cli: &Cli) -> CliResult<(PathBuf, String)> {
    let data_file = cli
        .data_file
        .clone()
        .or_else(|| std::env::var_os("STASHDB_DATA_FILE").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("stashdb.json"));

    let key = data_file
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| format!("Invalid data file '{}'", data_file.display()))?
        .to_string();
    let dir = match data_file.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    Ok((dir, key))
}

fn load_config(cli: &Cli) -> CliResult<StashConfig> {
    let path = cli
        .config
        .clone()
        .or_else(|| std::env::var_os("STASHDB_CONFIG").map(PathBuf::from));

    let mut config = match path {
        Some(path) => {
            log::debug!("Loading config from {}", path.display());
            StashConfig::load(&path)?
        }
        None => StashConfig::default(),
    };

    if let Some(schema_path) = &cli.schema {
        let definition = parse_schema(schema_path)?;
        config.schemas.extend(definition.collections);
    }
    Ok(config)
}

fn open_local(cli: &Cli, config: &StashConfig) -> CliResult<LocalConnector<FileStorage>> {
    let (dir, key) = storage_location(cli)?;
    let mut config = config.clone();
    config.storage_key = key;
    Ok(LocalConnector::from_config(FileStorage::open(dir)?, &config)?)
}

async fn run(cli: Cli) -> CliResult<i32> {
    let config = load_config(&cli)?;

    if cli.remote {
        let connector = RemoteConnector::from_config(&config)?;
        return run_crud(&cli, &connector).await;
    }

    let local = open_local(&cli, &config)?;

    match &cli.command {
        Command::Seed { file, strategy } => {
            let mut seed = SeedDescriptor::load(file)?;
            if let Some(strategy) = strategy {
                seed.behavior.merge_strategy = strategy.clone().into();
            }
            let (dir, key) = storage_location(&cli)?;
            let mut seeded_config = config.clone();
            seeded_config.storage_key = key;
            seeded_config.seed = Some(seed);
            let seeded = LocalConnector::from_config(FileStorage::open(dir)?, &seeded_config)?;
            print_output(&collection_counts(&seeded)?, &cli.format)?;
        }

        Command::Validate => {
            let blob = local.snapshot()?;
            let mut summary = serde_json::Map::new();
            let mut failed = false;

            for (collection, schema) in local.schemas().iter() {
                let docs = blob.get(collection).map(Vec::as_slice).unwrap_or_default();
                let mut issues = Vec::new();
                for doc in docs {
                    let result = validate_document(schema, doc);
                    if result.is_ok() && !result.has_warnings() {
                        continue;
                    }
                    failed |= !result.is_ok();
                    issues.push(serde_json::json!({
                        "id": doc.get("id").cloned().unwrap_or_default(),
                        "errors": result.errors,
                        "warnings": result.warnings,
                    }));
                }
                summary.insert(
                    collection.clone(),
                    serde_json::json!({ "documents": docs.len(), "issues": issues }),
                );
            }

            print_output(&serde_json::Value::Object(summary), &cli.format)?;
            return Ok(if failed { 1 } else { 0 });
        }

        Command::Status => {
            let (dir, key) = storage_location(&cli)?;
            let mut schemas: Vec<&String> = local.schemas().iter().map(|(name, _)| name).collect();
            schemas.sort();
            print_output(
                &serde_json::json!({
                    "data_dir": dir.display().to_string(),
                    "storage_key": key,
                    "collections": collection_counts(&local)?,
                    "schemas": schemas,
                    "id_strategy": config.id_strategy,
                    "faults": config.faults,
                    "remote": config.remote.as_ref().map(|r| r.base_url.clone()),
                }),
                &cli.format,
            )?;
        }

        Command::Export { collection } => {
            let mut blob = local.snapshot()?;
            let value = match collection {
                Some(name) => serde_json::to_value(blob.remove(name).unwrap_or_default())?,
                None => serde_json::to_value(blob)?,
            };
            print_output(&value, &cli.format)?;
        }

        Command::Clear => {
            local.clear()?;
            print_output(&serde_json::json!({ "ok": true }), &cli.format)?;
        }

        _ => return run_crud(&cli, &local).await,
    }

    Ok(0)
}

async fn run_crud(cli: &Cli, connector: &dyn Connector) -> CliResult<i32> {
    let response = match &cli.command {
        Command::Get { path } => {
            let (path, params) = ListParams::from_endpoint(path);
            connector.get(path, &params).await
        }

        Command::List {
            path,
            page,
            limit,
            filters,
        } => {
            let mut params = ListParams {
                page: *page,
                limit: *limit,
                ..Default::default()
            };
            for (key, value) in filters {
                params = params.filter(key, parse_field(value));
            }
            connector.get(path, &params).await
        }

        Command::Create { path, fields, json } => {
            connector.create(path, payload(fields, json.as_deref())?).await
        }
        Command::Update { path, fields, json } => {
            connector.update(path, payload(fields, json.as_deref())?).await
        }
        Command::Patch { path, fields, json } => {
            connector.patch(path, payload(fields, json.as_deref())?).await
        }
        Command::Delete { path } => connector.delete(path).await,

        _ => return Err("This command only works against local storage".into()),
    };

    report(response, &cli.format)
}

/// Print a successful envelope to stdout, or the failure to stderr.
fn report(response: Response<serde_json::Value>, format: &OutputFormat) -> CliResult<i32> {
    match &response {
        Response::Success { .. } => {
            print_output(&serde_json::to_value(&response)?, format)?;
            Ok(0)
        }
        Response::Failure { message, code } => {
            eprintln!("ERROR:{code}: {message}");
            Ok(1)
        }
    }
}

fn collection_counts(local: &LocalConnector<FileStorage>) -> CliResult<serde_json::Value> {
    let counts: serde_json::Map<String, serde_json::Value> = local
        .snapshot()?
        .into_iter()
        .map(|(name, docs)| (name, docs.len().into()))
        .collect();
    Ok(serde_json::Value::Object(counts))
}

fn print_output(value: &serde_json::Value, format: &OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(value)?),
    }
    Ok(())
}

fn parse_field(raw: &str) -> serde_json::Value {
    // Numbers, booleans, arrays and objects come through typed
    serde_json::from_str(raw).unwrap_or_else(|_| serde_json::Value::String(raw.to_string()))
}

fn payload(fields: &[(String, String)], json: Option<&str>) -> CliResult<serde_json::Value> {
    let mut map = match json {
        Some(raw) => match serde_json::from_str(raw)? {
            serde_json::Value::Object(map) => map,
            _ => return Err("--json must be a JSON object".into()),
        },
        None => serde_json::Map::new(),
    };
    for (key, value) in fields {
        map.insert(key.clone(), parse_field(value));
    }
    Ok(serde_json::Value::Object(map))
}

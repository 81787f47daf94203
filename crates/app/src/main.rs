use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use es_query_core::{
    escape_query_string, BulkIndexer, BulkOptions, ClientConfig, DocumentRef, HttpTransport,
    IndexAction, QueryExecutor, QueryOptions,
};
use futures::TryStreamExt;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "es-query", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// JSON client configuration; flags below override its values
    #[arg(long, env = "ES_CONFIG")]
    config: Option<PathBuf>,

    /// Search engine host
    #[arg(long, env = "ES_HOST")]
    host: Option<String>,

    /// Search engine port (443 selects https)
    #[arg(long, env = "ES_PORT")]
    port: Option<u16>,

    /// Index to search and write to
    #[arg(long, env = "ES_INDEX")]
    index: Option<String>,

    /// Document type used when an action does not name one
    #[arg(long, env = "ES_DOC_TYPE")]
    doc_type: Option<String>,

    /// Default page size
    #[arg(long, env = "ES_PER_PAGE")]
    per_page: Option<u32>,

    /// Largest page size a request may ask for
    #[arg(long, env = "ES_PER_PAGE_MAX")]
    per_page_max: Option<u32>,

    /// Log queries slower than this many seconds
    #[arg(long, env = "ES_SLOW_QUERY_SECONDS")]
    slow_query_seconds: Option<f64>,

    /// Scroll context lifetime
    #[arg(long, env = "ES_SCROLL_TTL")]
    scroll_ttl: Option<String>,

    /// Minimum result count before a scroll is used
    #[arg(long, env = "ES_SCROLL_TRIGGER")]
    scroll_trigger: Option<u64>,

    /// Request timeout in seconds
    #[arg(long, env = "ES_TIMEOUT_SECONDS")]
    timeout_seconds: Option<u64>,

    /// Attempts per write before giving up
    #[arg(long, env = "ES_RETRY_ATTEMPTS")]
    retry_attempts: Option<u32>,

    /// Seconds between attempts
    #[arg(long, env = "ES_RETRY_DELAY_SECONDS")]
    retry_delay_seconds: Option<f64>,
}

#[derive(Subcommand)]
enum Command {
    /// Run one search and print the normalized response.
    Search {
        /// Query body as JSON, or @path to read it from a file.
        #[arg(long, default_value = "{}")]
        body: String,
        #[arg(long, default_value = "_search")]
        path: String,
        #[arg(long)]
        page: Option<u32>,
        #[arg(long)]
        per_page: Option<u32>,
        /// Start a scroll (large result sets only).
        #[arg(long, default_value_t = false)]
        scroll: bool,
        /// Continue a scroll with the cursor from a previous response.
        #[arg(long)]
        cursor: Option<String>,
    },
    /// Print the number of documents matching a query clause.
    Count {
        #[arg(long, default_value = r#"{"match_all": {}}"#)]
        query: String,
    },
    /// Stream every matching document as NDJSON.
    Dump {
        #[arg(long, default_value = r#"{"match_all": {}}"#)]
        query: String,
        #[arg(long)]
        per_page: Option<u32>,
    },
    /// Bulk-index an NDJSON file of {"id", "index"?, "doc_type"?, "body"} lines.
    Index {
        #[arg(long)]
        file: String,
        /// Documents per batch; defaults to the configured bulk_batch_size.
        #[arg(long, env = "ES_BULK_BATCH_SIZE")]
        batch_size: Option<usize>,
        /// Keep going after a batch fails, even when the configuration is strict.
        #[arg(long, default_value_t = false)]
        lenient: bool,
    },
    /// Delete a single document.
    Delete {
        #[arg(long)]
        id: String,
    },
    /// Escape free text for a query-string query.
    Escape { text: String },
}

impl Cli {
    async fn client_config(&self) -> anyhow::Result<ClientConfig> {
        let base = match &self.config {
            Some(path) => {
                let raw = tokio::fs::read_to_string(path)
                    .await
                    .with_context(|| format!("reading {}", path.display()))?;
                ClientConfig::from_json_str(&raw)?
            }
            None => ClientConfig::default(),
        };

        let config = self.apply_overrides(base);
        config.validate()?;
        Ok(config)
    }

    fn apply_overrides(&self, mut config: ClientConfig) -> ClientConfig {
        if let Some(host) = &self.host {
            config.host = host.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if self.index.is_some() {
            config.index = self.index.clone();
        }
        if self.doc_type.is_some() {
            config.doc_type = self.doc_type.clone();
        }
        if let Some(per_page) = self.per_page {
            config.per_page = per_page;
        }
        if let Some(per_page_max) = self.per_page_max {
            config.per_page_max = per_page_max;
        }
        if self.slow_query_seconds.is_some() {
            config.slow_query_threshold_seconds = self.slow_query_seconds;
        }
        if let Some(scroll_ttl) = &self.scroll_ttl {
            config.scroll_ttl = scroll_ttl.clone();
        }
        if let Some(scroll_trigger) = self.scroll_trigger {
            config.scroll_trigger = scroll_trigger;
        }
        if let Some(timeout_seconds) = self.timeout_seconds {
            config.timeout_seconds = timeout_seconds;
        }
        if let Some(max_attempts) = self.retry_attempts {
            config.retry.max_attempts = max_attempts;
        }
        if let Some(delay_seconds) = self.retry_delay_seconds {
            config.retry.delay_seconds = delay_seconds;
        }
        config
    }
}

/// Command-line bulk flags layered over the configured defaults.
fn bulk_options(defaults: BulkOptions, batch_size: Option<usize>, lenient: bool) -> BulkOptions {
    BulkOptions {
        batch_size: batch_size.unwrap_or(defaults.batch_size),
        strict: defaults.strict && !lenient,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = cli.client_config().await?;

    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        base_url = %config.base_url(),
        "es-query boot"
    );

    let transport = HttpTransport::from_config(&config)?;

    match cli.command {
        Command::Search {
            body,
            path,
            page,
            per_page,
            scroll,
            cursor,
        } => {
            let executor = QueryExecutor::new(transport, config)?;
            let body = read_json_argument(&body).await?;
            let options = QueryOptions {
                path,
                page,
                per_page,
                scroll: scroll || cursor.is_some(),
                scroll_id: cursor,
                ..QueryOptions::default()
            };

            let response = executor.query(body, options).await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
            if !response.ok {
                anyhow::bail!("search failed");
            }
        }
        Command::Count { query } => {
            let executor = QueryExecutor::new(transport, config)?;
            let clause = read_json_argument(&query).await?;
            println!("{}", executor.query_count(clause).await?);
        }
        Command::Dump { query, per_page } => {
            let executor = QueryExecutor::new(transport, config)?;
            let clause = read_json_argument(&query).await?;

            let documents = executor.query_all(clause, per_page);
            futures::pin_mut!(documents);
            let mut emitted = 0u64;
            while let Some(document) = documents.try_next().await? {
                println!("{}", serde_json::to_string(&document)?);
                emitted += 1;
            }
            info!(documents = emitted, "dump finished");
        }
        Command::Index {
            file,
            batch_size,
            lenient,
        } => {
            let actions = load_actions(Path::new(&file), &config).await?;
            let indexer = BulkIndexer::new(transport, config)?;
            let options = bulk_options(indexer.default_options(), batch_size, lenient);
            info!(
                file = %file,
                documents = actions.len(),
                batch_size = options.batch_size,
                strict = options.strict,
                "indexing documents"
            );

            let result = indexer.index_many(actions, options).await?;

            for failure in &result.failed_batches {
                warn!(batch = failure.batch, documents = failure.documents, error = %failure.error, "batch failed");
            }
            println!("{}", serde_json::to_string_pretty(&result)?);
            if !result.ok {
                anyhow::bail!("bulk indexing stopped at a failed batch");
            }
        }
        Command::Delete { id } => {
            let reference = DocumentRef {
                id,
                index: config.index.clone().unwrap_or_default(),
                doc_type: config.doc_type.clone().unwrap_or_default(),
            };
            let indexer = BulkIndexer::new(transport, config)?;
            if !indexer.delete_one(&reference).await? {
                anyhow::bail!("delete of {} failed", reference.id);
            }
            println!("deleted {}", reference.id);
        }
        Command::Escape { text } => {
            println!("{}", escape_query_string(&text));
        }
    }

    Ok(())
}

/// Inline JSON, or `@path` for a file holding it.
async fn read_json_argument(raw: &str) -> anyhow::Result<Value> {
    let text = match raw.strip_prefix('@') {
        Some(path) => tokio::fs::read_to_string(path).await?,
        None => raw.to_string(),
    };
    Ok(serde_json::from_str(&text)?)
}

async fn load_actions(path: &Path, config: &ClientConfig) -> anyhow::Result<Vec<IndexAction>> {
    let contents = tokio::fs::read_to_string(path).await?;
    parse_actions(&contents, config)
}

/// One action per line; `index` and `doc_type` fall back to the configured
/// ones.
fn parse_actions(contents: &str, config: &ClientConfig) -> anyhow::Result<Vec<IndexAction>> {
    let mut actions = Vec::new();

    for (number, line) in contents.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let mut value: Value = serde_json::from_str(line)
            .map_err(|error| anyhow::anyhow!("line {}: {error}", number + 1))?;

        if let Some(fields) = value.as_object_mut() {
            if !fields.contains_key("index") {
                if let Some(index) = &config.index {
                    fields.insert("index".to_string(), Value::from(index.as_str()));
                }
            }
            if !fields.contains_key("doc_type") {
                if let Some(doc_type) = &config.doc_type {
                    fields.insert("doc_type".to_string(), Value::from(doc_type.as_str()));
                }
            }
        }

        let action: IndexAction = serde_json::from_value(value)
            .map_err(|error| anyhow::anyhow!("line {}: {error}", number + 1))?;
        actions.push(action);
    }

    Ok(actions)
}

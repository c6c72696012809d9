//! `catalogctl`: a thin HTTP client for `catalog-server` — ingest documents,
//! browse and query products, get recommendations, compare models, ask
//! natural-language questions and resolve pending spec conflicts from the
//! command line.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use reqwest::multipart;
use serde_json::Value;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "catalogctl", about = "Command-line client for the cold-storage product catalog service")]
struct Cli {
    /// Base URL of the catalog-server instance.
    #[arg(long, env = "CATALOG_SERVER_URL", default_value = "http://localhost:8080")]
    server: String,

    /// Bearer API key; falls back to CATALOG_API_KEY.
    #[arg(long, env = "CATALOG_API_KEY")]
    api_key: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Check service health.
    Health,
    /// Upload one or more documents for ingestion.
    Ingest { files: Vec<PathBuf> },
    /// Poll an ingestion job's status.
    Job { job_id: String },
    /// List/filter products.
    Products {
        #[arg(long)]
        brand: Option<String>,
        #[arg(long)]
        family: Option<String>,
        #[arg(long)]
        q: Option<String>,
    },
    /// Fetch one product by model number.
    Product { model_number: String },
    /// Find equivalents of a product by id.
    Equivalents { product_id: String },
    /// Get ranked recommendations for a use case.
    Recommend {
        use_case: String,
        #[arg(long)]
        capacity_min: Option<f64>,
        #[arg(long)]
        capacity_max: Option<f64>,
        #[arg(long)]
        brand: Option<String>,
    },
    /// Compare two or more models side by side.
    Compare { model_numbers: Vec<String> },
    /// Ask a natural-language question grounded in ingested documents.
    Ask { query: String },
    /// List pending spec conflicts.
    Conflicts {
        #[arg(long)]
        product_id: Option<String>,
    },
    /// Resolve a pending spec conflict.
    ResolveConflict {
        conflict_id: String,
        /// One of: keep_existing, accept_new, manual_override, dismissed.
        resolution: String,
        /// Raw JSON matching a SpecValue, e.g. '{"type":"text","0":"R290"}'. Required for manual_override.
        #[arg(long)]
        override_value: Option<String>,
    },
}

fn client(api_key: &Option<String>) -> reqwest::Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder();
    if let Some(key) = api_key {
        let mut headers = reqwest::header::HeaderMap::new();
        let mut value = reqwest::header::HeaderValue::from_str(&format!("Bearer {key}")).expect("valid api key header");
        value.set_sensitive(true);
        headers.insert(reqwest::header::AUTHORIZATION, value);
        builder = builder.default_headers(headers);
    }
    builder.build()
}

fn print_json(value: &Value) {
    println!("{}", serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string()));
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let client = client(&cli.api_key).expect("build http client");

    if let Err(e) = run(&client, &cli.server, cli.command).await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run(client: &reqwest::Client, server: &str, command: Command) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Command::Health => {
            let body: Value = client.get(format!("{server}/health")).send().await?.json().await?;
            print_json(&body);
        }
        Command::Ingest { files } => {
            let mut form = multipart::Form::new();
            for path in files {
                let bytes = tokio::fs::read(&path).await?;
                let filename = path.file_name().and_then(|f| f.to_str()).unwrap_or("document").to_string();
                let mime = guess_mime(&path);
                let part = multipart::Part::bytes(bytes).file_name(filename).mime_str(mime)?;
                form = form.part("file", part);
            }
            let body: Value = client.post(format!("{server}/ingest")).multipart(form).send().await?.json().await?;
            print_json(&body);
        }
        Command::Job { job_id } => {
            let body: Value = client.get(format!("{server}/jobs/{job_id}")).send().await?.json().await?;
            print_json(&body);
        }
        Command::Products { brand, family, q } => {
            let mut request = client.get(format!("{server}/products"));
            let mut query = Vec::new();
            if let Some(brand) = &brand {
                query.push(("brand", brand.clone()));
            }
            if let Some(family) = &family {
                query.push(("family", family.clone()));
            }
            if let Some(q) = &q {
                query.push(("q", q.clone()));
            }
            request = request.query(&query);
            let body: Value = request.send().await?.json().await?;
            print_json(&body);
        }
        Command::Product { model_number } => {
            let body: Value = client.get(format!("{server}/products/by-model/{model_number}")).send().await?.json().await?;
            print_json(&body);
        }
        Command::Equivalents { product_id } => {
            let body: Value = client.get(format!("{server}/products/{product_id}/equivalents")).send().await?.json().await?;
            print_json(&body);
        }
        Command::Recommend { use_case, capacity_min, capacity_max, brand } => {
            let payload = serde_json::json!({
                "use_case": use_case,
                "capacity_min": capacity_min,
                "capacity_max": capacity_max,
                "brand": brand,
            });
            let body: Value = client.post(format!("{server}/recommend")).json(&payload).send().await?.json().await?;
            print_json(&body);
        }
        Command::Compare { model_numbers } => {
            let payload = serde_json::json!({ "model_numbers": model_numbers });
            let body: Value = client.post(format!("{server}/compare")).json(&payload).send().await?.json().await?;
            print_json(&body);
        }
        Command::Ask { query } => {
            let payload = serde_json::json!({ "query": query });
            let body: Value = client.post(format!("{server}/ask")).json(&payload).send().await?.json().await?;
            print_json(&body);
        }
        Command::Conflicts { product_id } => {
            let mut request = client.get(format!("{server}/conflicts"));
            if let Some(product_id) = product_id {
                request = request.query(&[("product_id", product_id)]);
            }
            let body: Value = request.send().await?.json().await?;
            print_json(&body);
        }
        Command::ResolveConflict { conflict_id, resolution, override_value } => {
            let override_value = match override_value {
                Some(raw) => Some(serde_json::from_str::<Value>(&raw)?),
                None => None,
            };
            let payload = serde_json::json!({ "resolution": resolution, "override_value": override_value });
            let body: Value = client.post(format!("{server}/conflicts/{conflict_id}/resolve")).json(&payload).send().await?.json().await?;
            print_json(&body);
        }
    }
    Ok(())
}

fn guess_mime(path: &std::path::Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()).unwrap_or("").to_lowercase().as_str() {
        "pdf" => "application/pdf",
        "md" => "text/markdown",
        _ => "text/plain",
    }
}

use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Method;
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "railswitch-cli")]
#[command(about = "Operator CLI for the railswitch admin API", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8081")]
    url: String,

    #[arg(short, long, env = "RAILSWITCH_ADMIN_KEY", default_value = "CHANGE_ME_IN_PRODUCTION")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Engine status
    Status,
    /// Health record of every provider
    Providers,
    /// Providers grouped as healthy, degraded, unhealthy
    Summary,
    /// Probe one provider now
    Check { provider: String },
    /// Force a provider's circuit closed
    Reset { provider: String },
    /// List routing strategies
    Strategies,
    /// Install or replace the strategy for a currency
    SetStrategy {
        currency: String,
        #[arg(long)]
        primary: String,
        #[arg(long)]
        backup: String,
        #[arg(long, default_value_t = 0.8)]
        preference: f64,
    },
    /// Remove the strategy for a currency
    RemoveStrategy { currency: String },
    /// Preview the routing decision for a request
    Route {
        currency: String,
        #[arg(long, default_value_t = 0)]
        amount: u64,
        #[arg(long, default_value = "payment")]
        operation: String,
    },
    /// Start (or restart) background probing
    StartMonitoring {
        #[arg(long, default_value_t = 30_000)]
        interval_ms: u64,
    },
    /// Stop background probing
    StopMonitoring,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
    );

    let (method, path, body) = match cli.command {
        Commands::Status => (Method::GET, "/admin/status".to_string(), None),
        Commands::Providers => (Method::GET, "/admin/providers".to_string(), None),
        Commands::Summary => (Method::GET, "/admin/providers/summary".to_string(), None),
        Commands::Check { provider } => (Method::POST, format!("/admin/providers/{}/check", provider), None),
        Commands::Reset { provider } => (Method::POST, format!("/admin/providers/{}/reset", provider), None),
        Commands::Strategies => (Method::GET, "/admin/routing".to_string(), None),
        Commands::SetStrategy {
            currency,
            primary,
            backup,
            preference,
        } => (
            Method::PUT,
            format!("/admin/routing/{}", currency),
            Some(json!({
                "primary": primary,
                "backup": backup,
                "preference_score": preference,
            })),
        ),
        Commands::RemoveStrategy { currency } => (Method::DELETE, format!("/admin/routing/{}", currency), None),
        Commands::Route {
            currency,
            amount,
            operation,
        } => (
            Method::GET,
            format!("/admin/route?currency={}&amount={}&operation={}", currency, amount, operation),
            None,
        ),
        Commands::StartMonitoring { interval_ms } => (
            Method::POST,
            "/admin/monitoring/start".to_string(),
            Some(json!({ "interval_ms": interval_ms })),
        ),
        Commands::StopMonitoring => (Method::POST, "/admin/monitoring/stop".to_string(), None),
    };

    let mut request = client
        .request(method, format!("{}{}", cli.url.trim_end_matches('/'), path))
        .headers(headers);
    if let Some(body) = body {
        request = request.json(&body);
    }
    print_response(request.send().await?).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let text = res.text().await?;
    if text.is_empty() {
        println!("{}", status);
        return Ok(());
    }
    let json: Value = serde_json::from_str(&text)?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}

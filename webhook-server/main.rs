use clap::Parser;
use routeros_edns_webhook::client::Client;
use routeros_edns_webhook::connection::ConnectionConfig;
use routeros_edns_webhook::endpoint::DomainFilter;
use routeros_edns_webhook::provider::Provider;
use routeros_edns_webhook::webhook;
use std::sync::Arc;

/// Runs the external-dns webhook HTTP server against a configured RouterOS
/// device.
#[derive(Parser, Debug)]
#[clap(name = "webhook-server")]
struct Opt {
    /// RouterOS device hostname or address.
    #[clap(long, env = "ROUTEROS_HOST")]
    routeros_host: String,

    /// RouterOS API username.
    #[clap(long, env = "ROUTEROS_USERNAME")]
    routeros_username: String,

    /// RouterOS API password.
    #[clap(long, env = "ROUTEROS_PASSWORD")]
    routeros_password: String,

    /// Comma-separated list of domains to include.
    #[clap(long, env = "EXTERNAL_DNS_DOMAIN_FILTER", use_value_delimiter = true)]
    external_dns_domain_filter: Option<Vec<String>>,

    /// Comma-separated list of domains to exclude.
    #[clap(long, env = "EXTERNAL_DNS_EXCLUDE_DOMAINS", use_value_delimiter = true)]
    external_dns_exclude_domains: Option<Vec<String>>,

    /// Regex of domains to include.
    #[clap(long, env = "EXTERNAL_DNS_REGEX_DOMAIN_FILTER")]
    external_dns_regex_domain_filter: Option<String>,

    /// Regex of domains to exclude.
    #[clap(long, env = "EXTERNAL_DNS_REGEX_DOMAIN_EXCLUSION")]
    external_dns_regex_domain_exclusion: Option<String>,

    /// Log level passed through to env_logger (e.g. "info", "debug").
    #[clap(long, env = "EXTERNAL_DNS_LOG_LEVEL", default_value = "info")]
    external_dns_log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let opt = Opt::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&opt.external_dns_log_level)).init();

    let config = ConnectionConfig::new(opt.routeros_host, opt.routeros_username, opt.routeros_password);
    let client = Client::new(config);

    let domain_filter = DomainFilter {
        include: opt.external_dns_domain_filter,
        exclude: opt.external_dns_exclude_domains,
        regex_include: opt.external_dns_regex_domain_filter,
        regex_exclude: opt.external_dns_regex_domain_exclusion,
    };
    let provider = Arc::new(Provider::new(client, domain_filter));

    let addr = "0.0.0.0:8888".parse()?;
    log::info!("listening on {}", addr);

    axum::Server::bind(&addr)
        .serve(webhook::router(provider).into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::warn!("failed to install ctrl-c handler: {}", e);
    }
}

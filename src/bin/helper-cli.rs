use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::process::ExitCode;

use clap::Parser;

use meek_http_helper::client::HelperClient;
use meek_http_helper::protocol::WireRequest;
use meek_http_helper::proxy::ProxySpec;

#[derive(Parser)]
#[command(name = "helper-cli")]
#[command(about = "Send a single request through a running meek-http-helper", long_about = None)]
struct Cli {
    /// Address printed by the helper on its listen line.
    #[arg(long)]
    helper: SocketAddr,

    /// Target URL (https only).
    #[arg(long)]
    url: String,

    /// Host header to send instead of the URL's host.
    #[arg(long)]
    host: Option<String>,

    /// Extra header as NAME:VALUE; may be repeated.
    #[arg(long = "header", value_parser = parse_header)]
    headers: Vec<(String, String)>,

    /// Upstream proxy, e.g. socks5://127.0.0.1:9050.
    #[arg(long)]
    proxy: Option<String>,

    /// Request body.
    #[arg(long)]
    data: Option<String>,
}

fn parse_header(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw.split_once(':').ok_or_else(|| format!("expected NAME:VALUE, got {raw:?}"))?;
    Ok((name.trim().to_string(), value.trim().to_string()))
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let proxy = match cli.proxy.as_deref().map(ProxySpec::from_proxy_url).transpose() {
        Ok(proxy) => proxy,
        Err(e) => {
            eprintln!("Error: bad --proxy: {e}");
            return ExitCode::FAILURE;
        }
    };

    let mut header: BTreeMap<String, String> = cli.headers.into_iter().collect();
    if let Some(host) = cli.host {
        header.insert("Host".to_string(), host);
    }

    let request = WireRequest {
        method: Some("POST".to_string()),
        url: Some(cli.url),
        header: (!header.is_empty()).then_some(header),
        body: cli.data.map(String::into_bytes),
        proxy,
    };

    match HelperClient::new(cli.helper).round_trip(&request).await {
        Ok(response) => {
            println!("Status: {}", response.status);
            println!("{}", String::from_utf8_lossy(&response.body));
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

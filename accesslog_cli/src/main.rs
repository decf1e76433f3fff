use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

use axum::extract::Path;
use axum::routing::get;
use axum::Router;
use clap::Parser;

use accesslog_axum::{AccessLog, LogSink};

const VERSION: &str = env!("CARGO_PKG_VERSION");
const DEFAULT_PORT: u16 = 8080;

#[derive(Parser, Debug)]
#[clap(name = "accesslog", version)]
struct Cli {
    /// Port to listen on, defaults to 8080
    #[clap(short, long)]
    port: Option<u16>,

    /// Route access-log lines through the `log` facade instead of stdout
    #[clap(long)]
    use_log: bool,
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    env_logger::init();

    log::info!("accesslog demo v{}", VERSION);

    let args = Cli::parse();

    let mut access_log = AccessLog::new();
    if args.use_log {
        access_log.sink = std::sync::Arc::new(LogSink);
    }

    let app = access_log.wrap(Router::new().route("/hello/:name", get(hello)));

    let port = args.port.unwrap_or(DEFAULT_PORT);
    let address = SocketAddrV4::new(Ipv4Addr::new(127, 0, 0, 1), port);

    let listener = tokio::net::TcpListener::bind(address).await?;
    log::info!("listening on {}", listener.local_addr()?);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

async fn hello(Path(name): Path<String>) -> String {
    format!("Hello {}!", name)
}

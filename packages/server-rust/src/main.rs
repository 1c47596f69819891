//! `greeter` binary: serves the greeting command over one transport until
//! input ends or a termination signal arrives.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use greeter_core::CommandKind;
use greeter_server::config::{DEFAULT_PORT, DEFAULT_SOCKET_PATH};
use greeter_server::lifecycle::shutdown_signal;
use greeter_server::transport::{HttpTransport, LinePipe, OneShot, RpcTransport};
use greeter_server::{
    HttpConfig, LifecycleError, NetworkFamily, RpcConfig, Supervisor, SupervisorConfig, Transport,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "greeter=info,greeter_server=info,greeter_core=info,tower_http=info";

#[derive(Debug, Parser)]
#[command(name = "greeter", version, about = "Serve a greeting command over a pipe, HTTP or gRPC")]
struct Cli {
    /// Upper bound on graceful shutdown, in milliseconds.
    #[arg(long, global = true, env = "GREETER_DRAIN_TIMEOUT_MS", default_value_t = 1000)]
    drain_timeout_ms: u64,

    /// Command answering every request.
    #[arg(long, global = true, env = "GREETER_COMMAND", default_value_t = CommandKind::Hello)]
    command: CommandKind,

    /// Log output format (logs always go to stderr).
    #[arg(long, global = true, env = "GREETER_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    mode: Mode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Subcommand)]
enum Mode {
    /// Answer each line of stdin with one line on stdout.
    Pipe,
    /// Answer the given arguments once and exit.
    Once {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Serve HTTP; the `params` query value is the argument.
    Http {
        #[arg(long, env = "GREETER_HOST", default_value = "0.0.0.0")]
        host: String,
        #[arg(long, env = "GREETER_PORT", default_value_t = DEFAULT_PORT)]
        port: u16,
        /// Per-request deadline in milliseconds.
        #[arg(long, default_value_t = 30_000)]
        request_timeout_ms: u64,
    },
    /// Serve the `greeter.v1.Command` gRPC service.
    Rpc {
        #[arg(long, default_value_t = NetworkFamily::Tcp)]
        network: NetworkFamily,
        #[arg(long, env = "GREETER_HOST", default_value = "0.0.0.0")]
        host: String,
        #[arg(long, env = "GREETER_PORT", default_value_t = DEFAULT_PORT)]
        port: u16,
        /// Socket path when `--network unix`.
        #[arg(long, default_value = DEFAULT_SOCKET_PATH)]
        socket_path: PathBuf,
    },
}

fn init_tracing(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

async fn supervise<T: Transport>(transport: T, config: SupervisorConfig) -> anyhow::Result<()> {
    let outcome = Supervisor::new(transport, config)
        .run(shutdown_signal())
        .await?;
    info!(?outcome, "greeter stopped");
    Ok(())
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = SupervisorConfig {
        drain_timeout: Duration::from_millis(cli.drain_timeout_ms),
    };
    let command = cli.command.build();
    info!(command = %cli.command, "greeter starting");

    match cli.mode {
        Mode::Pipe => supervise(LinePipe::stdio(command), config).await,
        Mode::Once { args } => supervise(OneShot::stdout(command, args), config).await,
        Mode::Http {
            host,
            port,
            request_timeout_ms,
        } => {
            let http = HttpConfig {
                host,
                port,
                request_timeout: Duration::from_millis(request_timeout_ms),
            };
            supervise(HttpTransport::new(http, command), config).await
        }
        Mode::Rpc {
            network,
            host,
            port,
            socket_path,
        } => {
            let rpc = RpcConfig {
                network,
                host,
                port,
                socket_path,
            };
            supervise(RpcTransport::new(rpc, command), config).await
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    let code = match run(cli).await {
        Ok(()) => 0,
        Err(err) => {
            // Lifecycle failures are logged by the supervisor where they occur.
            if err.downcast_ref::<LifecycleError>().is_none() {
                error!("{err:#}");
            }
            1
        }
    };

    // Exit explicitly: a pending stdin read holds a blocking thread that would
    // otherwise keep the runtime from shutting down.
    std::process::exit(code);
}

use std::env;
use std::process::exit;
use std::sync::Arc;

use args::{ArgumentsRequest, StartupArguments};
use tokio::net::TcpListener;

mod args;
mod handlers;
mod registry;
mod server;
mod tls;

fn main() {
    let arguments = match args::parse_arguments(env::args()) {
        Err(err) => {
            eprintln!("{err}\n\nType 'tunnel-server --help' for a help menu");
            exit(1);
        }
        Ok(arguments) => arguments,
    };

    let startup_args = match arguments {
        ArgumentsRequest::Version => {
            println!("{}", args::get_version_string());
            return;
        }
        ArgumentsRequest::Help => {
            println!("{}", args::get_help_string());
            return;
        }
        ArgumentsRequest::Run(startup_args) => startup_args,
    };

    let level = if startup_args.verbose { log::LevelFilter::Debug } else { log::LevelFilter::Info };
    if let Err(error) = simple_logger::init_with_level(level.to_level().unwrap_or(log::Level::Info)) {
        eprintln!("Failed to initialize logger: {error}");
    }

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(error) => {
            eprintln!("Failed to start Tokio runtime: {error}");
            exit(1);
        }
    };

    if let Err(error) = runtime.block_on(async_main(startup_args)) {
        log::error!("Server finished with error: {error}");
        exit(1);
    }
}

async fn async_main(startup_args: StartupArguments) -> std::io::Result<()> {
    let cert_and_key = startup_args
        .tls_material
        .as_ref()
        .map(|material| (material.cert_path.as_path(), material.key_path.as_path()));

    if cert_and_key.is_none() {
        log::info!("No --cert/--key given, generating a self-signed certificate for localhost");
    }

    let acceptor = tls::build_acceptor(cert_and_key)?;

    let tcp_listener = TcpListener::bind(("0.0.0.0", startup_args.port)).await?;
    log::info!("Listening on {}", tcp_listener.local_addr()?);

    let registry = Arc::new(registry::Registry::new());
    server::run(tcp_listener, acceptor, registry).await;

    Ok(())
}

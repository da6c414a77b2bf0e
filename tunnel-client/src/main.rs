use std::env;
use std::process::exit;

use args::{ArgumentsRequest, StartupArguments};
use tokio::net::TcpListener;

mod args;
mod http;
mod listener;
mod session;

fn main() {
    let arguments = match args::parse_arguments(env::args()) {
        Err(err) => {
            eprintln!("{err}\n\nType 'tunnel-client --help' for a help menu");
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
        log::error!("Client finished with error: {error}");
        exit(1);
    }
}

async fn async_main(startup_args: StartupArguments) -> std::io::Result<()> {
    let bind_address = ("0.0.0.0", startup_args.local_port);
    let tcp_listener = TcpListener::bind(bind_address).await?;
    log::info!("Listening on {}", tcp_listener.local_addr()?);

    let http = http::build_client().map_err(|error| std::io::Error::new(std::io::ErrorKind::Other, error.to_string()))?;

    listener::run(tcp_listener, http, startup_args.server_url, startup_args.destination).await;

    Ok(())
}

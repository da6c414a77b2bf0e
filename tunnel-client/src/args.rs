use std::fmt;

/// Gets a small string with this program's name and version.
pub fn get_version_string() -> String {
    format!(
        concat!(env!("CARGO_PKG_NAME"), " ", env!("CARGO_PKG_VERSION"), " ({} {})"),
        std::env::consts::OS,
        std::env::consts::ARCH
    )
}

/// Gets a string with this program's help documentation.
pub fn get_help_string() -> &'static str {
    "usage: tunnel-client [-v] [-h] [-V] <local-port> <server-url> <destination>\n\n\
     <local-port>   decimal port (0-65535) to listen on locally\n\
     <server-url>   absolute https URL of the tunnel server, no trailing slash\n\
     <destination>  host:port to reach through the tunnel\n\n\
     -v, --verbose  enable debug logging\n\
     -h, --help     print this help menu\n\
     -V, --version  print the version"
}

/// The result of parsing the program's arguments.
#[derive(Debug, PartialEq)]
pub enum ArgumentsRequest {
    Help,
    Version,
    Run(StartupArguments),
}

/// Fully parsed and validated startup configuration.
#[derive(Debug, PartialEq)]
pub struct StartupArguments {
    pub verbose: bool,
    pub local_port: u16,
    pub server_url: String,
    pub destination: String,
}

#[derive(Debug, PartialEq, Eq)]
pub enum ArgumentsError {
    UnknownArgument(String),
    InvalidPort(String),
    InvalidServerUrl(String),
    InvalidDestination(String),
    MissingLocalPort,
    MissingServerUrl,
    MissingDestination,
    TooManyArguments(String),
}

impl fmt::Display for ArgumentsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownArgument(arg) => write!(f, "Unknown argument: {arg}"),
            Self::InvalidPort(arg) => write!(f, "Invalid local port, expected a number 0-65535: {arg}"),
            Self::InvalidServerUrl(arg) => {
                write!(f, "Invalid server URL, expected an absolute https URL with no trailing slash: {arg}")
            }
            Self::InvalidDestination(arg) => write!(f, "Invalid destination, expected host:port: {arg}"),
            Self::MissingLocalPort => write!(f, "You must specify the local port to listen on"),
            Self::MissingServerUrl => write!(f, "You must specify the tunnel server's URL"),
            Self::MissingDestination => write!(f, "You must specify the destination host:port"),
            Self::TooManyArguments(arg) => write!(f, "Unexpected extra argument: {arg}"),
        }
    }
}

fn validate_server_url(url: &str) -> Result<(), ArgumentsError> {
    if !url.starts_with("https://") || url.ends_with('/') {
        return Err(ArgumentsError::InvalidServerUrl(url.to_string()));
    }

    Ok(())
}

fn validate_destination(destination: &str) -> Result<(), ArgumentsError> {
    // We don't resolve here (resolution happens server-side), just rule out
    // strings that are clearly missing the ":port" part.
    match destination.rsplit_once(':') {
        Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => Ok(()),
        _ => Err(ArgumentsError::InvalidDestination(destination.to_string())),
    }
}

/// Parses the program's command-line arguments.
pub fn parse_arguments<T>(mut args: T) -> Result<ArgumentsRequest, ArgumentsError>
where
    T: Iterator<Item = String>,
{
    let mut verbose = false;
    let mut positionals = Vec::with_capacity(3);

    // Ignore the first argument, as it's by convention the name of the program.
    args.next();

    for arg in args {
        if arg.is_empty() {
            continue;
        } else if arg.eq("-h") || arg.eq_ignore_ascii_case("--help") {
            return Ok(ArgumentsRequest::Help);
        } else if arg.eq("-V") || arg.eq_ignore_ascii_case("--version") {
            return Ok(ArgumentsRequest::Version);
        } else if arg.eq("-v") || arg.eq_ignore_ascii_case("--verbose") {
            verbose = true;
        } else if arg.starts_with('-') {
            return Err(ArgumentsError::UnknownArgument(arg));
        } else {
            positionals.push(arg);
        }
    }

    if positionals.len() > 3 {
        return Err(ArgumentsError::TooManyArguments(positionals[3].clone()));
    }

    let mut positionals = positionals.into_iter();
    let local_port_arg = positionals.next().ok_or(ArgumentsError::MissingLocalPort)?;
    let local_port = local_port_arg
        .parse::<u16>()
        .map_err(|_| ArgumentsError::InvalidPort(local_port_arg.clone()))?;

    let server_url = positionals.next().ok_or(ArgumentsError::MissingServerUrl)?;
    validate_server_url(&server_url)?;

    let destination = positionals.next().ok_or(ArgumentsError::MissingDestination)?;
    validate_destination(&destination)?;

    Ok(ArgumentsRequest::Run(StartupArguments {
        verbose,
        local_port,
        server_url,
        destination,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(v: &[&str]) -> impl Iterator<Item = String> {
        std::iter::once("tunnel-client".to_string()).chain(v.iter().map(|s| s.to_string()))
    }

    #[test]
    fn parses_valid_arguments() {
        let result = parse_arguments(args(&["8080", "https://example.com:9000", "localhost:22"])).unwrap();
        assert_eq!(
            result,
            ArgumentsRequest::Run(StartupArguments {
                verbose: false,
                local_port: 8080,
                server_url: "https://example.com:9000".to_string(),
                destination: "localhost:22".to_string(),
            })
        );
    }

    #[test]
    fn accepts_verbose_flag_anywhere() {
        let result = parse_arguments(args(&["-v", "8080", "https://example.com", "localhost:22"])).unwrap();
        match result {
            ArgumentsRequest::Run(args) => assert!(args.verbose),
            _ => panic!("expected Run"),
        }
    }

    #[test]
    fn rejects_trailing_slash_url() {
        let err = parse_arguments(args(&["8080", "https://example.com/", "localhost:22"])).unwrap_err();
        assert_eq!(err, ArgumentsError::InvalidServerUrl("https://example.com/".to_string()));
    }

    #[test]
    fn rejects_non_https_url() {
        let err = parse_arguments(args(&["8080", "http://example.com", "localhost:22"])).unwrap_err();
        assert_eq!(err, ArgumentsError::InvalidServerUrl("http://example.com".to_string()));
    }

    #[test]
    fn rejects_destination_without_port() {
        let err = parse_arguments(args(&["8080", "https://example.com", "localhost"])).unwrap_err();
        assert_eq!(err, ArgumentsError::InvalidDestination("localhost".to_string()));
    }

    #[test]
    fn help_and_version_short_circuit() {
        assert_eq!(parse_arguments(args(&["-h"])).unwrap(), ArgumentsRequest::Help);
        assert_eq!(parse_arguments(args(&["--version"])).unwrap(), ArgumentsRequest::Version);
    }

    #[test]
    fn reports_missing_arguments() {
        assert_eq!(parse_arguments(args(&[])).unwrap_err(), ArgumentsError::MissingLocalPort);
        assert_eq!(parse_arguments(args(&["8080"])).unwrap_err(), ArgumentsError::MissingServerUrl);
        assert_eq!(
            parse_arguments(args(&["8080", "https://example.com"])).unwrap_err(),
            ArgumentsError::MissingDestination
        );
    }
}

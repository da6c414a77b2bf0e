use std::fmt;
use std::path::PathBuf;

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
    "usage: tunnel-server [-v] [-h] [-V] [--cert <path> --key <path>] <port>\n\n\
     <port>               decimal port (0-65535) to listen on\n\n\
     --cert <path>        PEM certificate chain to serve (requires --key)\n\
     --key <path>         PEM private key matching --cert (requires --cert)\n\
     without --cert/--key a self-signed certificate is generated at startup\n\n\
     -v, --verbose        enable debug logging\n\
     -h, --help           print this help menu\n\
     -V, --version        print the version"
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
    pub port: u16,
    pub tls_material: Option<TlsMaterial>,
}

/// Operator-supplied TLS certificate and key paths. `None` in
/// `StartupArguments::tls_material` means "generate a self-signed one".
#[derive(Debug, PartialEq)]
pub struct TlsMaterial {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

#[derive(Debug, PartialEq, Eq)]
pub enum ArgumentsError {
    UnknownArgument(String),
    InvalidPort(String),
    MissingPort,
    MissingCertValue,
    MissingKeyValue,
    CertWithoutKey,
    KeyWithoutCert,
    TooManyArguments(String),
}

impl fmt::Display for ArgumentsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownArgument(arg) => write!(f, "Unknown argument: {arg}"),
            Self::InvalidPort(arg) => write!(f, "Invalid port, expected a number 0-65535: {arg}"),
            Self::MissingPort => write!(f, "You must specify the port to listen on"),
            Self::MissingCertValue => write!(f, "--cert requires a path argument"),
            Self::MissingKeyValue => write!(f, "--key requires a path argument"),
            Self::CertWithoutKey => write!(f, "--cert was given without --key"),
            Self::KeyWithoutCert => write!(f, "--key was given without --cert"),
            Self::TooManyArguments(arg) => write!(f, "Unexpected extra argument: {arg}"),
        }
    }
}

/// Parses the program's command-line arguments.
pub fn parse_arguments<T>(mut args: T) -> Result<ArgumentsRequest, ArgumentsError>
where
    T: Iterator<Item = String>,
{
    let mut verbose = false;
    let mut cert_path = None;
    let mut key_path = None;
    let mut positionals = Vec::with_capacity(1);

    // Ignore the first argument, as it's by convention the name of the program.
    args.next();

    while let Some(arg) = args.next() {
        if arg.is_empty() {
            continue;
        } else if arg.eq("-h") || arg.eq_ignore_ascii_case("--help") {
            return Ok(ArgumentsRequest::Help);
        } else if arg.eq("-V") || arg.eq_ignore_ascii_case("--version") {
            return Ok(ArgumentsRequest::Version);
        } else if arg.eq("-v") || arg.eq_ignore_ascii_case("--verbose") {
            verbose = true;
        } else if arg.eq("--cert") {
            cert_path = Some(args.next().ok_or(ArgumentsError::MissingCertValue)?);
        } else if arg.eq("--key") {
            key_path = Some(args.next().ok_or(ArgumentsError::MissingKeyValue)?);
        } else if arg.starts_with('-') {
            return Err(ArgumentsError::UnknownArgument(arg));
        } else {
            positionals.push(arg);
        }
    }

    if positionals.len() > 1 {
        return Err(ArgumentsError::TooManyArguments(positionals[1].clone()));
    }

    let tls_material = match (cert_path, key_path) {
        (Some(cert_path), Some(key_path)) => Some(TlsMaterial {
            cert_path: PathBuf::from(cert_path),
            key_path: PathBuf::from(key_path),
        }),
        (Some(_), None) => return Err(ArgumentsError::CertWithoutKey),
        (None, Some(_)) => return Err(ArgumentsError::KeyWithoutCert),
        (None, None) => None,
    };

    let port_arg = positionals.into_iter().next().ok_or(ArgumentsError::MissingPort)?;
    let port = port_arg.parse::<u16>().map_err(|_| ArgumentsError::InvalidPort(port_arg.clone()))?;

    Ok(ArgumentsRequest::Run(StartupArguments { verbose, port, tls_material }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(v: &[&str]) -> impl Iterator<Item = String> {
        std::iter::once("tunnel-server".to_string()).chain(v.iter().map(|s| s.to_string()))
    }

    #[test]
    fn parses_self_signed_mode() {
        let result = parse_arguments(args(&["8443"])).unwrap();
        assert_eq!(
            result,
            ArgumentsRequest::Run(StartupArguments {
                verbose: false,
                port: 8443,
                tls_material: None,
            })
        );
    }

    #[test]
    fn parses_supplied_tls_mode() {
        let result = parse_arguments(args(&["--cert", "c.pem", "--key", "k.pem", "8443"])).unwrap();
        match result {
            ArgumentsRequest::Run(args) => {
                assert_eq!(args.port, 8443);
                assert_eq!(
                    args.tls_material,
                    Some(TlsMaterial {
                        cert_path: PathBuf::from("c.pem"),
                        key_path: PathBuf::from("k.pem"),
                    })
                );
            }
            _ => panic!("expected Run"),
        }
    }

    #[test]
    fn rejects_cert_without_key() {
        let err = parse_arguments(args(&["--cert", "c.pem", "8443"])).unwrap_err();
        assert_eq!(err, ArgumentsError::CertWithoutKey);
    }

    #[test]
    fn rejects_key_without_cert() {
        let err = parse_arguments(args(&["--key", "k.pem", "8443"])).unwrap_err();
        assert_eq!(err, ArgumentsError::KeyWithoutCert);
    }

    #[test]
    fn rejects_missing_port() {
        assert_eq!(parse_arguments(args(&[])).unwrap_err(), ArgumentsError::MissingPort);
    }

    #[test]
    fn rejects_bad_port() {
        let err = parse_arguments(args(&["notaport"])).unwrap_err();
        assert_eq!(err, ArgumentsError::InvalidPort("notaport".to_string()));
    }

    #[test]
    fn help_and_version_short_circuit() {
        assert_eq!(parse_arguments(args(&["-h"])).unwrap(), ArgumentsRequest::Help);
        assert_eq!(parse_arguments(args(&["--version"])).unwrap(), ArgumentsRequest::Version);
    }
}

//! # Sealwire CLI Entry Point
//!
//! Command-line interface for the sealwire secure TCP transport. Provides
//! an encrypted echo server and a one-shot encrypted send command, both
//! driven by a JSON configuration file.
//!
//! ## Usage
//!
//! ```bash
//! # Start an encrypted echo server
//! sealwire serve -c config.json -s echo
//!
//! # Send one message and print the response
//! sealwire send -c config.json -s echo -m "Hello, Server!"
//! ```
//!
//! ## Configuration File
//!
//! The file maps `domain -> service -> version` to a settings document:
//!
//! ```json
//! {
//!   "network": {
//!     "echo": {
//!       "1.0": {
//!         "settings": {
//!           "role": "server",
//!           "host": "127.0.0.1",
//!           "port": 5000,
//!           "crypto": {"type": "xor", "params": {"byte": 42}}
//!         }
//!       }
//!     }
//!   }
//! }
//! ```
//!
//! Server and client sides of the same service typically live in separate
//! files, differing only in `role` (and possibly `host`).

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use argh::FromArgs;

use sealwire_common::cipher::Cipher;
use sealwire_common::config::{self, MemoryConfigSource};
use sealwire_common::transport::{Endpoint, SecureChannel};

/// Main CLI structure parsed from command-line arguments.
#[derive(FromArgs)]
/// Sealwire - encrypted length-prefixed messaging over TCP
struct Cli {
    #[argh(subcommand)]
    command: Commands,
}

/// Available CLI subcommands.
///
/// - **Serve**: run an encrypted echo server
/// - **Send**: send one encrypted message and print the decrypted response
#[derive(FromArgs)]
#[argh(subcommand)]
enum Commands {
    Serve(ServeArgs),
    Send(SendArgs),
}

/// Arguments for running the encrypted echo server.
///
/// The server binds the address configured for the service, admits peers
/// subject to the configured rate limits, and echoes every decrypted
/// message back to its sender. Each admitted connection is served on its
/// own thread.
#[derive(FromArgs)]
#[argh(subcommand, name = "serve")]
/// run an encrypted echo server
struct ServeArgs {
    /// path to the JSON configuration file
    #[argh(option, short = 'c')]
    config: String,

    /// service name to look up in the configuration
    #[argh(option, short = 's')]
    service: String,

    /// service version to look up in the configuration
    ///
    /// Defaults to "1.0".
    #[argh(option, short = 'v', default = "\"1.0\".into()")]
    version: String,
}

/// Arguments for sending a single encrypted message.
///
/// Connects to the address configured for the service, sends the message
/// through the configured cipher, and prints the decrypted response to
/// stdout. An empty line means the server closed without responding
/// (typically a rejected message).
#[derive(FromArgs)]
#[argh(subcommand, name = "send")]
/// send one encrypted message and print the response
struct SendArgs {
    /// path to the JSON configuration file
    #[argh(option, short = 'c')]
    config: String,

    /// service name to look up in the configuration
    #[argh(option, short = 's')]
    service: String,

    /// service version to look up in the configuration
    ///
    /// Defaults to "1.0".
    #[argh(option, short = 'v', default = "\"1.0\".into()")]
    version: String,

    /// message to send
    #[argh(option, short = 'm')]
    message: String,
}

/// Loads a configuration file into an in-memory configuration source.
///
/// The file is a nested JSON object keyed by domain, service, and version;
/// each leaf is stored as the raw settings document for that triple.
fn load_config_file(path: &str) -> Result<MemoryConfigSource> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read configuration file {}: {}", path, e))?;

    let parsed: HashMap<String, HashMap<String, HashMap<String, serde_json::Value>>> =
        serde_json::from_str(&raw)
            .map_err(|e| anyhow::anyhow!("invalid configuration file {}: {}", path, e))?;

    let mut source = MemoryConfigSource::new();
    for (domain, services) in parsed {
        for (service, versions) in services {
            for (version, document) in versions {
                source.insert(&domain, &service, &version, serde_json::to_string(&document)?);
            }
        }
    }

    Ok(source)
}

/// Builds the endpoint and channel for a configured service.
fn setup(source: &MemoryConfigSource, service: &str, version: &str) -> Result<(Endpoint, SecureChannel)> {
    let endpoint = Endpoint::from_source(source, service, version)?;
    let cipher = Cipher::from_config(&config::load_cipher_config(source, service, version)?)?;
    let channel = SecureChannel::new(cipher, endpoint.guard());
    Ok((endpoint, channel))
}

fn main() -> Result<()> {
    let cli: Cli = argh::from_env();

    // Initialize tracing only for serve; send keeps stdout clean for
    // scripting (the response is the only output).
    if matches!(cli.command, Commands::Serve(_)) {
        let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .init();
    }

    match cli.command {
        Commands::Serve(args) => run_serve(args),
        Commands::Send(args) => run_send(args),
    }
}

/// Executes the `serve` subcommand: accept admissible peers forever,
/// echoing each one on its own thread.
fn run_serve(args: ServeArgs) -> Result<()> {
    let source = load_config_file(&args.config)?;
    let (endpoint, channel) = setup(&source, &args.service, &args.version)?;
    let channel = Arc::new(channel);

    tracing::info!(service = %args.service, version = %args.version, "starting echo server");
    let listener = endpoint.bind()?;

    loop {
        let stream = endpoint.accept_from(&listener)?;
        let channel = Arc::clone(&channel);
        std::thread::spawn(move || {
            if let Err(e) = channel.serve(stream) {
                tracing::error!(error = %e, "connection ended with error");
            }
        });
    }
}

/// Executes the `send` subcommand.
///
/// # Errors
///
/// Returns an error if the configuration cannot be loaded, the connection
/// fails, or the response cannot be decrypted.
fn run_send(args: SendArgs) -> Result<()> {
    let source = load_config_file(&args.config)?;
    let (endpoint, channel) = setup(&source, &args.service, &args.version)?;

    let mut stream = endpoint.connect()?;
    let response = channel.send_and_receive(&mut stream, args.message.as_bytes())?;

    println!("{}", String::from_utf8_lossy(&response));
    Ok(())
}

/// CLI argument parsing tests.
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_serve() {
        let args: Cli =
            Cli::from_args(&["sealwire"], &["serve", "-c", "config.json", "-s", "echo"]).unwrap();
        match args.command {
            Commands::Serve(ServeArgs { config, service, version }) => {
                assert_eq!(config, "config.json");
                assert_eq!(service, "echo");
                assert_eq!(version, "1.0"); // default
            }
            _ => panic!("Expected Serve command"),
        }
    }

    #[test]
    fn test_cli_parse_serve_with_version() {
        let args: Cli = Cli::from_args(
            &["sealwire"],
            &["serve", "-c", "config.json", "-s", "echo", "-v", "2.1"],
        )
        .unwrap();
        match args.command {
            Commands::Serve(ServeArgs { version, .. }) => {
                assert_eq!(version, "2.1");
            }
            _ => panic!("Expected Serve command"),
        }
    }

    #[test]
    fn test_cli_parse_send() {
        let args: Cli = Cli::from_args(
            &["sealwire"],
            &["send", "-c", "config.json", "-s", "echo", "-m", "Hello, Server!"],
        )
        .unwrap();
        match args.command {
            Commands::Send(SendArgs { config, service, version, message }) => {
                assert_eq!(config, "config.json");
                assert_eq!(service, "echo");
                assert_eq!(version, "1.0"); // default
                assert_eq!(message, "Hello, Server!");
            }
            _ => panic!("Expected Send command"),
        }
    }

    #[test]
    fn test_cli_parse_send_requires_message() {
        let result = Cli::from_args(&["sealwire"], &["send", "-c", "config.json", "-s", "echo"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_file_round_trip() {
        let dir = std::env::temp_dir().join("sealwire-cli-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.json");
        std::fs::write(
            &path,
            r#"{"network": {"echo": {"1.0": {"settings": {
                "role": "client", "host": "127.0.0.1", "port": 5000,
                "crypto": {"type": "xor", "params": {"byte": 42}}
            }}}}}"#,
        )
        .unwrap();

        let source = load_config_file(path.to_str().unwrap()).unwrap();
        let endpoint = config::load_endpoint_config(&source, "echo", "1.0").unwrap();
        assert_eq!(endpoint.host, "127.0.0.1");
        assert_eq!(endpoint.port, 5000);

        let cipher = config::load_cipher_config(&source, "echo", "1.0").unwrap();
        assert_eq!(cipher.kind, "xor");
    }

    #[test]
    fn test_load_config_file_missing() {
        assert!(load_config_file("/nonexistent/config.json").is_err());
    }
}

use std::{
    error::Error as _,
    io::{self, Write},
    process,
    time::Duration,
};

use reqwest::StatusCode;
use soapcall::{CallResult, Client, Params};
use structopt::StructOpt;
use thiserror::Error;
use tracing::debug;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Error)]
enum Error {
    #[error(transparent)]
    SoapError(#[from] soapcall::Error),

    #[error("Unable to build HTTP client")]
    HttpClientError(#[from] reqwest::Error),

    #[error("Unable to write output")]
    IoError(#[from] io::Error),

    #[error("Server answered {0}")]
    StatusError(StatusCode),
}

#[derive(StructOpt)]
#[structopt(about = "Calls SOAP operations described by a WSDL document")]
struct Args {
    /// Log requests and responses. RUST_LOG takes precedence.
    #[structopt(short, long)]
    verbose: bool,

    #[structopt(subcommand)]
    command: Command,
}

#[derive(StructOpt)]
struct Source {
    /// Call the address declared in the WSDL instead of moving it onto the
    /// host the WSDL was fetched from
    #[structopt(short = "d", long)]
    definition_url: bool,

    /// WSDL URL or file path
    wsdl: String,
}

#[derive(StructOpt)]
enum Command {
    /// Call an operation and print the response
    Call {
        #[structopt(flatten)]
        source: Source,

        /// Request timeout in seconds
        #[structopt(short, long, default_value = "30")]
        timeout: u64,

        /// Print only the content of soap:Body
        #[structopt(short, long)]
        payload: bool,

        /// SOAP header parameter as name=value
        #[structopt(long = "header", number_of_values = 1, parse(try_from_str = parse_param))]
        headers: Vec<(String, String)>,

        operation: String,

        /// Operation parameters as name=value
        #[structopt(parse(try_from_str = parse_param))]
        params: Vec<(String, String)>,
    },

    /// List the operations a WSDL declares
    Operations {
        /// WSDL URL or file path
        wsdl: String,
    },

    /// Print the URL calls would be sent to
    Endpoint {
        #[structopt(flatten)]
        source: Source,
    },
}

fn parse_param(arg: &str) -> Result<(String, String), String> {
    match arg.split_once('=') {
        Some((name, value)) if !name.is_empty() => Ok((name.to_owned(), value.to_owned())),
        _ => Err(format!("expected name=value, got {:?}", arg)),
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "soapcall=debug,warn" } else { "warn" };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with(fmt::layer().with_writer(io::stderr))
        .init();
}

fn print_result(result: &CallResult, payload: bool) -> Result<(), Error> {
    let mut stdout = io::stdout().lock();

    if payload {
        writeln!(stdout, "{}", result.payload()?)?;
    } else {
        stdout.write_all(result.body())?;
        writeln!(stdout)?;
    }

    Ok(())
}

fn run(args: Args) -> Result<(), Error> {
    match args.command {
        Command::Call {
            source,
            timeout,
            payload,
            headers,
            operation,
            params,
        } => {
            let transport = reqwest::blocking::Client::builder()
                .timeout(Duration::from_secs(timeout))
                .build()?;

            let client = Client::with_transport(source.wsdl, transport)
                .with_use_definition_url(source.definition_url)
                .with_header_params(headers);

            let result = client.call(&operation, params.into_iter().collect::<Params>())?;
            debug!(status = %result.status(), "call finished");

            if result.status().is_success() {
                return print_result(&result, payload);
            }

            match result.fault() {
                Ok(Some(fault)) => eprintln!("{}: {}", fault.code, fault.string),
                _ => print_result(&result, false)?,
            }

            Err(Error::StatusError(result.status()))
        }

        Command::Operations { wsdl } => {
            let client = Client::new(wsdl);
            let mut stdout = io::stdout().lock();

            for operation in client.definition()?.operations() {
                match operation.documentation {
                    Some(documentation) => {
                        writeln!(stdout, "{}\t{}", operation.name, documentation.trim())?
                    }
                    None => writeln!(stdout, "{}", operation.name)?,
                }
            }

            Ok(())
        }

        Command::Endpoint { source } => {
            let client =
                Client::new(source.wsdl).with_use_definition_url(source.definition_url);
            writeln!(io::stdout().lock(), "{}", client.endpoint()?)?;
            Ok(())
        }
    }
}

#[paw::main]
fn main(args: Args) {
    init_logging(args.verbose);

    if let Err(error) = run(args) {
        eprintln!("error: {}", error);

        let mut source = error.source();
        while let Some(cause) = source {
            eprintln!("  caused by: {}", cause);
            source = cause.source();
        }

        process::exit(1);
    }
}

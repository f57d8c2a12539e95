//! prime-pi CLI: count the primes below x.
//!
//! Usage:
//!   prime-pi <x> [options]
//!
//! Options:
//!   --method=<name>   auto | legendre | meissel | lehmer | deleglise-rivat
//!                     (default: auto)
//!   --threads=<N>     Worker threads (default: all cores)
//!   --json            Emit a JSON report instead of plain text
//!
//! x accepts underscores and powers of ten ("1e15").

use std::time::Instant;

use serde::Serialize;

use prime_pi::MAX_X_128;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Method {
    Auto,
    Legendre,
    Meissel,
    Lehmer,
    DelegliseRivat,
}

impl Method {
    fn name(self) -> &'static str {
        match self {
            Method::Auto | Method::DelegliseRivat => "deleglise-rivat",
            Method::Legendre => "legendre",
            Method::Meissel => "meissel",
            Method::Lehmer => "lehmer",
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("cannot parse '{0}' as a number")]
    InvalidNumber(String),
    #[error("x = {0} exceeds the supported range (max {MAX_X_128})")]
    OutOfRange(i128),
    #[error("unknown method '{0}'")]
    UnknownMethod(String),
    #[error("method '{0}' only supports x < 2^63; use deleglise-rivat")]
    MethodTooNarrow(&'static str),
    #[error("missing argument: x")]
    MissingX,
}

struct CliConfig {
    x: i128,
    method: Method,
    threads: usize,
    json: bool,
}

/// Result record for --json, mirroring the plain text output.
#[derive(Serialize)]
struct Report {
    x: String,
    pi: String,
    method: &'static str,
    threads: usize,
    seconds: f64,
}

fn parse_x(s: &str) -> Result<i128, CliError> {
    let cleaned = s.replace('_', "");
    if let Some((mantissa, exponent)) = cleaned.split_once(['e', 'E']) {
        let m: i128 = mantissa
            .parse()
            .map_err(|_| CliError::InvalidNumber(s.to_string()))?;
        let e: u32 = exponent
            .parse()
            .map_err(|_| CliError::InvalidNumber(s.to_string()))?;
        return 10i128
            .checked_pow(e)
            .and_then(|p| m.checked_mul(p))
            .ok_or(CliError::OutOfRange(i128::MAX));
    }
    cleaned
        .parse()
        .map_err(|_| CliError::InvalidNumber(s.to_string()))
}

fn parse_args() -> Result<CliConfig, CliError> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    let mut x = None;
    let mut method = Method::Auto;
    let mut threads = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    let mut json = false;

    for arg in &args {
        if let Some(name) = arg.strip_prefix("--method=") {
            method = match name {
                "auto" => Method::Auto,
                "legendre" => Method::Legendre,
                "meissel" => Method::Meissel,
                "lehmer" => Method::Lehmer,
                "deleglise-rivat" | "dr" => Method::DelegliseRivat,
                other => return Err(CliError::UnknownMethod(other.to_string())),
            };
        } else if let Some(n) = arg.strip_prefix("--threads=") {
            threads = n
                .parse()
                .map_err(|_| CliError::InvalidNumber(n.to_string()))?;
            threads = threads.max(1);
        } else if arg == "--json" {
            json = true;
        } else if !arg.starts_with("--") {
            x = Some(parse_x(arg)?);
        }
    }

    let x = x.ok_or(CliError::MissingX)?;
    if !(0..=MAX_X_128).contains(&x) {
        return Err(CliError::OutOfRange(x));
    }

    Ok(CliConfig {
        x,
        method,
        threads,
        json,
    })
}

fn run(config: &CliConfig) -> Result<i128, CliError> {
    let narrow = i64::try_from(config.x).ok();
    match (config.method, narrow) {
        (Method::Auto | Method::DelegliseRivat, Some(x)) => {
            Ok(prime_pi::pi_deleglise_rivat(x, config.threads) as i128)
        }
        (Method::Auto | Method::DelegliseRivat, None) => {
            Ok(prime_pi::pi_deleglise_rivat_128(config.x, config.threads))
        }
        (Method::Legendre, Some(x)) => Ok(prime_pi::pi_legendre(x, config.threads) as i128),
        (Method::Meissel, Some(x)) => Ok(prime_pi::pi_meissel(x, config.threads) as i128),
        (Method::Lehmer, Some(x)) => Ok(prime_pi::pi_lehmer(x, config.threads) as i128),
        (method, None) => Err(CliError::MethodTooNarrow(method.name())),
    }
}

fn main() {
    env_logger::init();

    let config = match parse_args() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!();
            eprintln!("Usage: prime-pi <x> [--method=<name>] [--threads=<N>] [--json]");
            std::process::exit(1);
        }
    };

    let clock = Instant::now();
    let result = match run(&config) {
        Ok(result) => result,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };
    let seconds = clock.elapsed().as_secs_f64();

    if config.json {
        let report = Report {
            x: config.x.to_string(),
            pi: result.to_string(),
            method: config.method.name(),
            threads: config.threads,
            seconds,
        };
        println!("{}", serde_json::to_string_pretty(&report).unwrap());
    } else {
        println!("pi({}) = {}", config.x, result);
        println!("method: {}, threads: {}, {:.3}s", config.method.name(), config.threads, seconds);
    }
}

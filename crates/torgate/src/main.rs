//! A little bridge that lets plain HTTP clients reach the web over Tor.
//!
//! Torgate listens on a local port and treats whatever connects as an
//! HTTP proxy client: it reads a request, finds the Host header, opens
//! a SOCKS5 tunnel to that host through a local Tor daemon, and then
//! relays bytes both ways.  Point a browser's HTTP proxy setting at it
//! and the browser's cleartext traffic rides Tor.

#![warn(missing_docs)]

mod cmdline;
mod err;
mod exit;
mod hexdump;
mod http;
mod proxy;
mod socks;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use argh::FromArgs;
use serde::Deserialize;
use tracing::{info, warn};
use tracing_subscriber::filter::LevelFilter;

use cmdline::CmdLine;

#[derive(FromArgs, Debug, Clone)]
/// Listen for plain HTTP connections and relay them, as an HTTP proxy,
/// through a local Tor daemon's SOCKS port.
struct Args {
    /// override the default location(s) for the configuration file
    #[argh(option, short = 'f')]
    rc: Vec<String>,
    /// override a configuration option (uses toml syntax)
    #[argh(option, short = 'c')]
    cfg: Vec<String>,
    /// address to listen on for incoming HTTP connections
    #[argh(option, short = 'H')]
    host: Option<String>,
    /// port to listen on for incoming HTTP connections
    #[argh(option, short = 'P')]
    port: Option<u16>,
    /// address of the Tor daemon's SOCKS port
    #[argh(option)]
    tor_host: Option<String>,
    /// port of the Tor daemon's SOCKS port
    #[argh(option)]
    tor_port: Option<u16>,
    /// take the listen address and port from the http_proxy
    /// environment variable
    #[argh(switch, short = 'e')]
    env: bool,
    /// log every byte that passes through, as hex dumps
    #[argh(switch, short = 'v')]
    verbose: bool,
}

impl Args {
    /// Apply the value flags on top of a loaded configuration.
    fn apply_overrides(&self, config: &mut TorgateConfig) {
        if let Some(h) = &self.host {
            config.listen_host = h.clone();
        }
        if let Some(p) = self.port {
            config.listen_port = p;
        }
        if let Some(h) = &self.tor_host {
            config.tor_host = h.clone();
        }
        if let Some(p) = self.tor_port {
            config.tor_port = p;
        }
        if self.verbose {
            config.trace = true;
        }
    }
}

/// Default options to use for our configuration.
const TORGATE_DEFAULTS: &str = include_str!("./torgate_defaults.toml");

/// Structure to hold our configuration options, whether from a
/// configuration file or the command line.
#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct TorgateConfig {
    /// Address to listen on for incoming HTTP connections.
    listen_host: String,
    /// Port to listen on for incoming HTTP connections.
    listen_port: u16,
    /// Address of the Tor daemon's SOCKS port.
    tor_host: String,
    /// Port of the Tor daemon's SOCKS port.
    tor_port: u16,
    /// Whether to log traffic as hex dumps, at trace level.
    trace: bool,
    /// Optional deadline for any single read or write, in seconds.
    io_timeout: Option<u64>,
}

impl TorgateConfig {
    /// Return the host to listen on.
    fn listen_host(&self) -> &str {
        &self.listen_host
    }

    /// Return the port to listen on.
    fn listen_port(&self) -> u16 {
        self.listen_port
    }

    /// Return the listen address in `host:port` form, for log lines.
    fn listen_addr(&self) -> String {
        format!("{}:{}", self.listen_host, self.listen_port)
    }

    /// Return the host where the Tor daemon's SOCKS port lives.
    fn tor_host(&self) -> &str {
        &self.tor_host
    }

    /// Return the port of the Tor daemon's SOCKS port.
    fn tor_port(&self) -> u16 {
        self.tor_port
    }

    /// Return the per-operation I/O deadline, if one is set.
    fn io_timeout(&self) -> Option<Duration> {
        self.io_timeout.map(Duration::from_secs)
    }

    /// Replace the listen address with whatever the `http_proxy`
    /// environment variable says.
    fn apply_http_proxy_env(&mut self) -> Result<()> {
        let value = std::env::var("http_proxy").context("http_proxy is not set")?;
        let (host, port) = parse_proxy_url(&value)
            .with_context(|| format!("Can't use http_proxy value {:?}", value))?;
        self.listen_host = host;
        self.listen_port = port;
        Ok(())
    }
}

/// Parse an `http://host:port` proxy URL into its host and port.
fn parse_proxy_url(s: &str) -> Result<(String, u16)> {
    let rest = s
        .strip_prefix("http://")
        .ok_or_else(|| anyhow!("Proxy URL should start with http://"))?;
    let rest = rest.trim_end_matches('/');
    let (host, port) = rest
        .rsplit_once(':')
        .ok_or_else(|| anyhow!("Proxy URL has no port"))?;
    if host.is_empty() {
        return Err(anyhow!("Proxy URL has no host"));
    }
    let port = port
        .parse()
        .map_err(|_| anyhow!("Proxy URL has an unparseable port"))?;
    Ok((host.to_string(), port))
}

/// Load the configuration, starting from the defaults and applying the
/// file and command-line overrides from `args`.
fn load_config(args: &Args) -> Result<TorgateConfig> {
    let mut cfg = config::Config::new();
    cfg.merge(config::File::from_str(
        TORGATE_DEFAULTS,
        config::FileFormat::Toml,
    ))?;
    for fname in &args.rc {
        cfg.merge(config::File::with_name(fname))?;
    }
    let mut cmdline = CmdLine::new();
    for line in &args.cfg {
        cmdline.push_toml_line(line.clone());
    }
    cfg.merge(cmdline)?;

    let mut config: TorgateConfig = cfg.try_into()?;
    args.apply_overrides(&mut config);
    Ok(config)
}

/// Record our process id in `torgate.pid`, for the convenience of
/// scripts that want to signal us.
fn save_pid() {
    let pid = std::process::id().to_string();
    if let Err(e) = std::fs::write("torgate.pid", pid) {
        warn!("Couldn't write torgate.pid: {}", e);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Args = argh::from_env();

    let mut config = load_config(&args)?;
    if args.env {
        config.apply_http_proxy_env()?;
    }

    let filt = if config.trace {
        LevelFilter::TRACE
    } else {
        LevelFilter::DEBUG
    };
    tracing_subscriber::fmt()
        .with_max_level(filt)
        .with_writer(std::io::stderr)
        .init();

    save_pid();
    info!("torgate engaged.");

    let config = Arc::new(config);
    tokio::select! {
        res = proxy::run_proxy(config) => res,
        res = exit::wait_for_ctrl_c() => {
            res?;
            info!("Interrupted: shutting down.");
            Ok(())
        }
    }
}

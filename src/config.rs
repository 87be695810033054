use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::env;
use std::path::PathBuf;

use crate::constants::{
    self,
    rpc::{AUX_DATA_METHOD, ERA_POINTS_METHOD},
};
use crate::events::EventFilter;
use crate::leader::LeaderParams;
use crate::session::SessionConfig;

/// Which head stream to follow
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HeadMode {
    Best,
    Finalized,
}

impl HeadMode {
    /// Subscribe and unsubscribe method names for this stream
    pub fn methods(self) -> (&'static str, &'static str) {
        match self {
            HeadMode::Best => ("chain_subscribeNewHeads", "chain_unsubscribeNewHeads"),
            HeadMode::Finalized => (
                "chain_subscribeFinalizedHeads",
                "chain_unsubscribeFinalizedHeads",
            ),
        }
    }
}

impl std::str::FromStr for HeadMode {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "best" | "new" => Ok(HeadMode::Best),
            "finalized" | "finalised" => Ok(HeadMode::Finalized),
            _ => Err(anyhow!("Invalid head mode '{s}'. Valid options: best, finalized")),
        }
    }
}

impl std::fmt::Display for HeadMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HeadMode::Best => write!(f, "best"),
            HeadMode::Finalized => write!(f, "finalized"),
        }
    }
}

/// headwatch - live chain head viewer
///
/// Follows a node's head stream, attributes each block to its slot leader and
/// shows recent headers and events.
/// Configuration priority: CLI args > Environment variables > Defaults
#[derive(Parser, Debug)]
#[command(name = "headwatch")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Live chain head viewer", long_about = None)]
pub struct CliArgs {
    /// Node WebSocket JSON-RPC endpoint (header subscription)
    #[arg(long, env = "NODE_WS_URL")]
    pub node_ws_url: Option<String>,

    /// Node HTTP JSON-RPC endpoint (runtime calls, header lookups)
    #[arg(long, env = "NODE_RPC_URL")]
    pub node_rpc_url: Option<String>,

    /// Event relay WebSocket URL; events are disabled when unset
    #[arg(long, env = "EVENTS_WS_URL")]
    pub events_ws_url: Option<String>,

    /// Head stream: best or finalized
    #[arg(long, env = "HEAD_MODE", value_parser = clap::value_parser!(HeadMode))]
    pub head_mode: Option<HeadMode>,

    /// Runtime API method returning (authorities, session_length)
    #[arg(long, env = "AUX_DATA_METHOD")]
    pub aux_data_method: Option<String>,

    /// Runtime API method returning the current era's points per authority
    #[arg(long, env = "ERA_POINTS_METHOD")]
    pub era_points_method: Option<String>,

    /// Don't track era points
    #[arg(long, env = "NO_ERA_POINTS")]
    pub no_era_points: bool,

    /// Divisor applied to the raw slot before rotation (1-65536)
    #[arg(long, env = "SLOT_STEP")]
    pub slot_step: Option<u64>,

    /// Override the runtime-reported session length (1-1000000)
    #[arg(long, env = "SESSION_LENGTH")]
    pub session_length: Option<u64>,

    /// Read a slot from unknown consensus engines' pre-runtime payloads
    #[arg(long, env = "SLOT_FALLBACK")]
    pub slot_fallback: bool,

    /// Refetch the authority set when the rotation index changes
    #[arg(long, env = "REFRESH_ON_SESSION_BOUNDARY")]
    pub refresh_on_session_boundary: Option<bool>,

    /// Number of recent headers to keep (1-10000)
    #[arg(long, env = "KEEP_HEADERS")]
    pub keep_headers: Option<usize>,

    /// Number of aggregated events to keep (1-10000)
    #[arg(long, env = "KEEP_EVENTS")]
    pub keep_events: Option<usize>,

    /// RPC request timeout in milliseconds (1000-60000)
    #[arg(long, env = "RPC_TIMEOUT_MS")]
    pub rpc_timeout_ms: Option<u64>,

    /// Target UI rendering FPS (1-120)
    #[arg(long, env = "RENDER_FPS")]
    pub render_fps: Option<u32>,

    /// TOML file with event exclusion rules (replaces the built-in list)
    #[arg(long, env = "EVENT_FILTER")]
    pub event_filter: Option<PathBuf>,

    /// Write logs to this file (the TUI otherwise disables logging)
    #[arg(long, env = "LOG_FILE")]
    pub log_file: Option<PathBuf>,

    /// Log updates to stderr instead of drawing the terminal UI
    #[arg(long, env = "HEADLESS")]
    pub headless: bool,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub node_ws_url: String,
    pub node_rpc_url: String,
    pub events_ws_url: Option<String>,
    pub head_mode: HeadMode,
    pub aux_data_method: String,
    pub era_points_method: String,
    pub track_era_points: bool,
    pub slot_step: u64,
    pub session_length: Option<u64>,
    pub slot_fallback: bool,
    pub refresh_on_session_boundary: bool,
    pub keep_headers: usize,
    pub keep_events: usize,
    pub rpc_timeout_ms: u64,
    pub render_fps: u32,
    pub event_filter: Option<PathBuf>,
    pub log_file: Option<PathBuf>,
    pub headless: bool,
}

/// Validate that a value is within a given range (inclusive)
fn validate_in_range<T>(val: T, min: T, max: T, name: &str) -> Result<T>
where
    T: PartialOrd + std::fmt::Display + Copy,
{
    if val < min || val > max {
        Err(anyhow!("{name} must be in range [{min}, {max}], got {val}"))
    } else {
        Ok(val)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|s| s.parse().ok())
}

/// Load configuration from CLI args and environment variables
/// Priority: CLI args > Environment variables > Defaults
pub fn load() -> Result<Config> {
    from_args(CliArgs::parse())
}

pub fn from_args(args: CliArgs) -> Result<Config> {
    let node_ws_url = args
        .node_ws_url
        .or_else(|| env::var("NODE_WS_URL").ok())
        .unwrap_or_else(|| "ws://127.0.0.1:9944".to_string());
    validate_url(&node_ws_url, "NODE_WS_URL")?;

    let node_rpc_url = args
        .node_rpc_url
        .or_else(|| env::var("NODE_RPC_URL").ok())
        .unwrap_or_else(|| "http://127.0.0.1:9944".to_string());
    validate_url(&node_rpc_url, "NODE_RPC_URL")?;

    let events_ws_url = args
        .events_ws_url
        .or_else(|| env::var("EVENTS_WS_URL").ok())
        .filter(|s| !s.is_empty());
    if let Some(ref url) = events_ws_url {
        validate_url(url, "EVENTS_WS_URL")?;
    }

    let head_mode = args
        .head_mode
        .or_else(|| env_parse("HEAD_MODE"))
        .unwrap_or(HeadMode::Best);

    let aux_data_method = args
        .aux_data_method
        .or_else(|| env::var("AUX_DATA_METHOD").ok())
        .unwrap_or_else(|| AUX_DATA_METHOD.to_string());
    if aux_data_method.is_empty() {
        return Err(anyhow!("AUX_DATA_METHOD cannot be empty"));
    }

    let era_points_method = args
        .era_points_method
        .or_else(|| env::var("ERA_POINTS_METHOD").ok())
        .unwrap_or_else(|| ERA_POINTS_METHOD.to_string());
    let track_era_points = !args.no_era_points && !era_points_method.is_empty();

    let slot_step = args.slot_step.or_else(|| env_parse("SLOT_STEP")).unwrap_or(1);
    let slot_step = validate_in_range(slot_step, 1, 65536, "SLOT_STEP")?;

    let session_length = args
        .session_length
        .or_else(|| env_parse("SESSION_LENGTH"))
        .map(|n| validate_in_range(n, 1, 1_000_000, "SESSION_LENGTH"))
        .transpose()?;

    let refresh_on_session_boundary = args
        .refresh_on_session_boundary
        .or_else(|| {
            env::var("REFRESH_ON_SESSION_BOUNDARY")
                .ok()
                .map(|s| s.to_lowercase() == "true")
        })
        .unwrap_or(true);

    let keep_headers = args
        .keep_headers
        .or_else(|| env_parse("KEEP_HEADERS"))
        .unwrap_or(constants::MAX_HEADERS);
    let keep_headers = validate_in_range(keep_headers, 1, 10000, "KEEP_HEADERS")?;

    let keep_events = args
        .keep_events
        .or_else(|| env_parse("KEEP_EVENTS"))
        .unwrap_or(constants::MAX_EVENTS);
    let keep_events = validate_in_range(keep_events, 1, 10000, "KEEP_EVENTS")?;

    let rpc_timeout_ms = args
        .rpc_timeout_ms
        .or_else(|| env_parse("RPC_TIMEOUT_MS"))
        .unwrap_or(8000);
    let rpc_timeout_ms = validate_in_range(rpc_timeout_ms, 1000, 60000, "RPC_TIMEOUT_MS")?;

    let render_fps = args.render_fps.or_else(|| env_parse("RENDER_FPS")).unwrap_or(20);
    let render_fps = validate_in_range(render_fps, 1, 120, "RENDER_FPS")?;

    Ok(Config {
        node_ws_url,
        node_rpc_url,
        events_ws_url,
        head_mode,
        aux_data_method,
        era_points_method,
        track_era_points,
        slot_step,
        session_length,
        slot_fallback: args.slot_fallback,
        refresh_on_session_boundary,
        keep_headers,
        keep_events,
        rpc_timeout_ms,
        render_fps,
        event_filter: args.event_filter.or_else(|| env::var("EVENT_FILTER").ok().map(PathBuf::from)),
        log_file: args.log_file.or_else(|| env::var("LOG_FILE").ok().map(PathBuf::from)),
        headless: args.headless,
    })
}

/// Validate URL format (basic check)
fn validate_url(url: &str, name: &str) -> Result<()> {
    if url.is_empty() {
        return Err(anyhow!("{name} cannot be empty"));
    }

    // Basic scheme validation
    if url.starts_with("ws://")
        || url.starts_with("wss://")
        || url.starts_with("http://")
        || url.starts_with("https://")
    {
        Ok(())
    } else {
        Err(anyhow!(
            "{name} must start with ws://, wss://, http://, or https://"
        ))
    }
}

impl Config {
    /// Session settings, loading the event filter file if one is configured
    pub fn session_config(&self) -> Result<SessionConfig> {
        let event_filter = match &self.event_filter {
            Some(path) => EventFilter::from_toml_file(path)
                .with_context(|| format!("loading EVENT_FILTER {}", path.display()))?,
            None => EventFilter::default(),
        };
        Ok(SessionConfig {
            keep_headers: self.keep_headers,
            keep_events: self.keep_events,
            leader: LeaderParams {
                slot_step: self.slot_step,
                session_length_override: self.session_length,
            },
            refresh_on_session_boundary: self.refresh_on_session_boundary,
            slot_fallback: self.slot_fallback,
            track_era_points: self.track_era_points,
            event_filter,
        })
    }

    pub fn print_summary(&self) {
        eprintln!("headwatch configuration:");
        eprintln!("  Node WS: {} ({} heads)", self.node_ws_url, self.head_mode);
        eprintln!("  Node RPC: {}", self.node_rpc_url);
        match &self.events_ws_url {
            Some(url) => eprintln!("  Event relay: {url}"),
            None => eprintln!("  Event relay: disabled"),
        }
        eprintln!("  Aux data method: {}", self.aux_data_method);
        if self.track_era_points {
            eprintln!("  Era points method: {}", self.era_points_method);
        } else {
            eprintln!("  Era points: disabled");
        }
        eprintln!("  Slot step: {}", self.slot_step);
        if let Some(n) = self.session_length {
            eprintln!("  Session length: {n} (override)");
        }
        eprintln!("  Keep: {} headers, {} events", self.keep_headers, self.keep_events);
        eprintln!("  RPC Timeout: {}ms", self.rpc_timeout_ms);
        if !self.headless {
            eprintln!("  Render FPS: {}", self.render_fps);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Config> {
        let mut argv = vec!["headwatch"];
        argv.extend_from_slice(args);
        from_args(CliArgs::try_parse_from(argv)?)
    }

    #[test]
    fn cli_values_are_used() {
        let cfg = parse(&[
            "--node-ws-url",
            "wss://node.example:443",
            "--head-mode",
            "finalized",
            "--slot-step",
            "256",
            "--session-length",
            "10",
            "--keep-headers",
            "20",
        ])
        .unwrap();
        assert_eq!(cfg.node_ws_url, "wss://node.example:443");
        assert_eq!(cfg.head_mode, HeadMode::Finalized);
        assert_eq!(cfg.slot_step, 256);
        assert_eq!(cfg.session_length, Some(10));
        assert_eq!(cfg.keep_headers, 20);

        assert!(cfg.track_era_points);
        let session = cfg.session_config().unwrap();
        assert_eq!(session.leader.slot_step, 256);
        assert_eq!(session.leader.session_length_override, Some(10));
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let err = parse(&["--slot-step", "0"]).unwrap_err();
        assert!(err.to_string().contains("SLOT_STEP"));
        assert!(parse(&["--keep-events", "0"]).is_err());
        assert!(parse(&["--node-rpc-url", "ftp://x"]).is_err());
    }

    #[test]
    fn era_points_can_be_switched_off() {
        let cfg = parse(&["--no-era-points"]).unwrap();
        assert!(!cfg.track_era_points);
        assert!(!cfg.session_config().unwrap().track_era_points);
        assert!(!parse(&["--era-points-method", ""]).unwrap().track_era_points);
    }

    #[test]
    fn head_mode_parsing() {
        assert_eq!("Best".parse::<HeadMode>().unwrap(), HeadMode::Best);
        assert_eq!("finalised".parse::<HeadMode>().unwrap(), HeadMode::Finalized);
        assert!("latest".parse::<HeadMode>().is_err());
        assert_eq!(HeadMode::Finalized.methods().1, "chain_unsubscribeFinalizedHeads");
    }
}

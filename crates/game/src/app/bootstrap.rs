use clap::Parser;
use ebb_engine::{LoopConfig, World, WorldError};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use super::content::{self, DEFAULT_ZONE};

const MAP_ENV_VAR: &str = "EBB_MAP";

/// Tile-grid adventure with scripted zones.
#[derive(Parser, Debug)]
#[command(name = "ebb", version)]
pub(crate) struct Args {
    /// Zone to start in
    #[arg(long, env = MAP_ENV_VAR, default_value = DEFAULT_ZONE)]
    map: String,

    /// Run this many ticks without a window, then print the world state as JSON
    #[arg(long, value_name = "TICKS")]
    headless: Option<u64>,

    /// Print the known zone identifiers and exit
    #[arg(long)]
    list_maps: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RunMode {
    Windowed,
    Headless { ticks: u64 },
    ListMaps,
}

pub(crate) struct AppWiring {
    pub(crate) config: LoopConfig,
    pub(crate) world: World,
    pub(crate) mode: RunMode,
}

pub(crate) fn build_app() -> Result<AppWiring, WorldError> {
    init_tracing();
    let args = Args::parse();
    info!("=== ebb startup ===");
    wire(args)
}

fn wire(args: Args) -> Result<AppWiring, WorldError> {
    let mode = match (args.list_maps, args.headless) {
        (true, _) => RunMode::ListMaps,
        (false, Some(ticks)) => RunMode::Headless { ticks },
        (false, None) => RunMode::Windowed,
    };
    let mut world = World::new(content::catalog()?);
    if mode != RunMode::ListMaps {
        let zone = starting_zone(&world, &args.map);
        world.boot(zone)?;
    }
    Ok(AppWiring {
        config: LoopConfig::default(),
        world,
        mode,
    })
}

/// An unknown `--map` falls back to the default zone instead of failing.
fn starting_zone<'a>(world: &World, requested: &'a str) -> &'a str {
    if world.catalog().contains(requested) {
        requested
    } else {
        warn!(map = requested, fallback = DEFAULT_ZONE, "unknown_map_using_default");
        DEFAULT_ZONE
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::content::POOL;

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["ebb"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).expect("arguments parse")
    }

    #[test]
    fn defaults_to_windowed_start() {
        let args = args(&[]);
        assert_eq!(args.map, DEFAULT_ZONE);
        assert_eq!(args.headless, None);
        assert!(!args.list_maps);
    }

    #[test]
    fn headless_flag_selects_headless_mode() {
        let wiring = wire(args(&["--headless", "5", "--map", POOL])).expect("wiring");
        assert_eq!(wiring.mode, RunMode::Headless { ticks: 5 });
        assert_eq!(wiring.world.current_zone(), Some(POOL));
    }

    #[test]
    fn unknown_map_falls_back_to_default() {
        let wiring = wire(args(&["--map", "north woods", "--headless", "1"])).expect("wiring");
        assert_eq!(wiring.world.current_zone(), Some(DEFAULT_ZONE));
    }

    #[test]
    fn listing_maps_does_not_boot_a_zone() {
        let wiring = wire(args(&["--list-maps"])).expect("wiring");
        assert_eq!(wiring.mode, RunMode::ListMaps);
        assert_eq!(wiring.world.current_zone(), None);
    }
}

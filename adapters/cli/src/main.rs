#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that plays the geocache game against a save file.

mod persistence;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use geocache_core::{Cell, Command, Direction, Event, GeoPoint, Token};
use geocache_world::{self as world, query, snapshot, World};
use tracing_subscriber::EnvFilter;

/// Location-based token collecting on a seeded grid of caches.
#[derive(Debug, Parser)]
#[command(name = "geocache", version)]
struct Cli {
    /// TOML file overriding the default world configuration.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// JSON save file holding the world store, holdings and player position.
    #[arg(long, global = true, default_value = "geocache-save.json")]
    save: PathBuf,
    #[command(subcommand)]
    action: Action,
}

#[derive(Debug, Subcommand)]
enum Action {
    /// Show the player position, holdings and nearby caches.
    Status,
    /// Move the player to an absolute location.
    Move {
        /// Latitude of the destination.
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        /// Longitude of the destination.
        #[arg(long, allow_hyphen_values = true)]
        lng: f64,
    },
    /// Move the player one tile.
    Step {
        /// Direction of travel.
        #[arg(value_enum)]
        heading: Heading,
    },
    /// Take a token from a nearby cache.
    Collect {
        /// Cache cell as `row,col`.
        #[arg(long, allow_hyphen_values = true)]
        cell: Cell,
        /// Token identity as `row,col#serial`; defaults to the newest token.
        #[arg(long, allow_hyphen_values = true)]
        token: Option<Token>,
    },
    /// Leave a held token in a nearby cache.
    Deposit {
        /// Cache cell as `row,col`.
        #[arg(long, allow_hyphen_values = true)]
        cell: Cell,
        /// Token identity as `row,col#serial`; defaults to the last collected token.
        #[arg(long, allow_hyphen_values = true)]
        token: Option<Token>,
    },
    /// Describe any cell, visible or not.
    Inspect {
        /// Cell as `row,col`.
        #[arg(long, allow_hyphen_values = true)]
        cell: Cell,
    },
    /// Print the full save state as JSON.
    Export,
    /// Discard the save file and start over at the configured origin.
    Reset,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Heading {
    North,
    East,
    South,
    West,
}

impl From<Heading> for Direction {
    fn from(heading: Heading) -> Self {
        match heading {
            Heading::North => Direction::North,
            Heading::East => Direction::East,
            Heading::South => Direction::South,
            Heading::West => Direction::West,
        }
    }
}

/// Entry point for the geocache command-line interface.
fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = persistence::load_config(cli.config.as_deref())?;

    if let Action::Reset = cli.action {
        persistence::discard_save(&cli.save)?;
    }
    let mut world = persistence::load_world(&cli.save, config)?;

    // Reveal the neighborhood around the stored position before acting on it.
    let mut events = Vec::new();
    let here = query::player(&world);
    world::apply(&mut world, Command::MovePlayer { to: here }, &mut events);
    events.clear();

    match cli.action {
        Action::Status | Action::Reset => print_status(&world),
        Action::Move { lat, lng } => world::apply(
            &mut world,
            Command::MovePlayer {
                to: GeoPoint::new(lat, lng),
            },
            &mut events,
        ),
        Action::Step { heading } => world::apply(
            &mut world,
            Command::StepPlayer {
                direction: heading.into(),
            },
            &mut events,
        ),
        Action::Collect { cell, token } => world::apply(
            &mut world,
            Command::CollectToken { cell, token },
            &mut events,
        ),
        Action::Deposit { cell, token } => world::apply(
            &mut world,
            Command::DepositToken { cell, token },
            &mut events,
        ),
        Action::Inspect { cell } => print_cell(&world, cell),
        Action::Export => println!("{}", persistence::encode_save(world.export())?),
    }

    for event in &events {
        println!("{}", describe(event));
    }
    persistence::save_world(&cli.save, &world)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

fn print_status(world: &World) {
    let player = query::player(world);
    println!("Player at {:.6}, {:.6}", player.lat(), player.lng());
    let holdings = query::holdings(world);
    if holdings.is_empty() {
        println!("Holding no tokens.");
    } else {
        let listed: Vec<String> = holdings.iter().map(Token::to_string).collect();
        println!("Holding {} token(s): {}", holdings.len(), listed.join(" "));
    }
    let mut any = false;
    for cache in query::visible_caches(world) {
        any = true;
        println!("Cache at {}: {} token(s)", cache.cell(), cache.len());
    }
    if !any {
        println!("No caches nearby.");
    }
}

fn print_cell(world: &World, cell: Cell) {
    let bounds = query::bounds_of(world, cell);
    let south_west = bounds.south_west();
    let north_east = bounds.north_east();
    println!(
        "Cell {cell} spans {:.6},{:.6} to {:.6},{:.6}",
        south_west.lat(),
        south_west.lng(),
        north_east.lat(),
        north_east.lng()
    );
    if !query::generator(world).exists_at(cell) {
        println!("No cache exists here.");
        return;
    }
    let tokens = match query::cache(world, cell) {
        Some(cache) => cache.tokens().to_vec(),
        None => match query::store(world).snapshot(cell).map(snapshot::decode) {
            Some(Ok(decoded)) => decoded.tokens,
            Some(Err(error)) => {
                println!("Stored snapshot is unreadable: {error}");
                return;
            }
            None => {
                let fresh = query::generator(world).token_count_for(cell);
                println!("Unvisited cache, would start with {fresh} token(s).");
                return;
            }
        },
    };
    let listed: Vec<String> = tokens.iter().map(Token::to_string).collect();
    println!("Cache holds {} token(s): {}", tokens.len(), listed.join(" "));
}

fn describe(event: &Event) -> String {
    match event {
        Event::PlayerMoved { to, .. } => format!("Moved to {:.6}, {:.6}", to.lat(), to.lng()),
        Event::CacheRevealed { cell, tokens } => {
            format!("Cache at {cell} came into view with {tokens} token(s)")
        }
        Event::CacheHidden { cell } => format!("Cache at {cell} left view"),
        Event::SnapshotDiscarded { cell, reason } => {
            format!("Cache at {cell} was unreadable and regenerated: {reason}")
        }
        Event::TokenCollected { cell, token } => format!("Collected {token} from {cell}"),
        Event::TokenDeposited { cell, token } => format!("Deposited {token} at {cell}"),
        Event::TransferRejected { cell, reason } => format!("Nothing moved at {cell}: {reason}"),
    }
}

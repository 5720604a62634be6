pub mod config;
pub mod entities;
pub mod net;
pub mod telemetry;
pub mod world;

pub use config::{ConfigError, ProtocolConfig};
pub use net::error::DecodeError;
pub use net::events::{CreatureField, GameEvent, Thing, WorldSink};
pub use net::game::ProtocolGame;
pub use net::packet::PacketReader;
pub use world::item_types::ItemTypeIndex;
pub use world::map::MapMirror;

pub fn run(args: &[String]) -> Result<(), String> {
    let config = config::AppConfig::from_args(args)?;
    telemetry::logging::init(&telemetry::logging::LogConfig {
        level: config.log_level.clone(),
    })?;

    let protocol = match config.protocol_config.as_deref() {
        Some(path) => ProtocolConfig::load(path).map_err(|err| err.to_string())?,
        None => ProtocolConfig::default(),
    };
    let item_types = match config.item_catalog.as_deref() {
        Some(path) => {
            let index = ItemTypeIndex::load(path).map_err(|err| err.to_string())?;
            tracing::info!(count = index.len(), "item catalog loaded");
            Some(index)
        }
        None => None,
    };
    let messages = net::capture::load(&config.capture)?;
    tracing::info!(
        messages = messages.len(),
        protocol = protocol.protocol_version,
        "replaying capture"
    );

    let mut game = ProtocolGame::new(protocol, item_types);
    let mut mirror = MapMirror::new();
    let mut aborted = 0usize;
    let mut deferred = 0usize;
    for (index, message) in messages.iter().enumerate() {
        if let Err(err) = game.parse_message(message, &mut mirror) {
            aborted += 1;
            tracing::debug!(index, error = %err, "message aborted");
        }
        deferred += game.run_deferred(&mut mirror);
    }

    println!("otwire: capture replay");
    println!("- capture: {}", config.capture.display());
    println!(
        "- messages: total={}, decoded={}, aborted={}",
        messages.len(),
        messages.len() - aborted,
        aborted
    );
    match mirror.center() {
        Some(center) => println!("- window center: {}", center),
        None => println!("- window center: none"),
    }
    println!(
        "- map: tiles={}, things={}, creatures={}",
        mirror.tile_count(),
        mirror.thing_count(),
        mirror.creature_count()
    );
    println!("- protocol version: {}", game.config().protocol_version);
    match game.creatures().local_player() {
        Some(local) => {
            let local = local.borrow();
            println!("- local player: {} ({})", local.name, local.id.0);
        }
        None => println!("- local player: none"),
    }
    println!("- known creatures: {}", game.creatures().len());
    println!(
        "- creature updates: {}, game events: {}, deferred tasks run: {}",
        mirror.updates.len(),
        mirror.events.len(),
        deferred
    );
    for (opcode, err) in &mirror.aborts {
        eprintln!("otwire: opcode {:#04x} aborted: {}", opcode, err);
    }
    Ok(())
}

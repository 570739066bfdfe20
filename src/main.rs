//! Cardroom
//!
//! Runs auto-playing rooms. `demo` keeps host and peers in one process over
//! the in-memory relay; `host` and `join` put each seat in its own process
//! over TCP.
//!
//! ```text
//! cardroom [demo]
//! cardroom host <addr> <username>
//! cardroom join <addr> <username>
//! ```

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use cardroom::{
    network::{
        host::EMPTY_PILE_STATUS, memory::MemoryRelay, session::RoomPhase, tcp::TcpHostTransport,
        tcp::TcpPeerTransport, transport::Transport,
    },
    HostDispatcher, PeerDispatcher, RoomSettings, VERSION,
};

/// Seed used by the demo when `CARDROOM_SEED` is unset.
const DEMO_SEED: u64 = 12345;

/// Turns each seat plays before the host closes the room.
const ROUNDS: usize = 5;

/// Scheduler period for the TCP modes.
const TICK: Duration = Duration::from_millis(50);

/// Demo step limit, so a stuck room cannot spin forever.
const MAX_DEMO_STEPS: usize = 10_000;

const DEMO_PEERS: [&str; 9] = [
    "alice", "bob", "carol", "dave", "erin", "frank", "grace", "heidi", "ivan",
];

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");

    info!("Cardroom v{}", VERSION);

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        None | Some("demo") => run_demo(),
        Some("host") => {
            let (addr, name) = endpoint(&args)?;
            run_tcp_host(addr, name).await
        }
        Some("join") => {
            let (addr, name) = endpoint(&args)?;
            run_tcp_peer(addr, name).await
        }
        Some(other) => bail!("unknown mode '{}' (expected demo, host or join)", other),
    }
}

fn endpoint(args: &[String]) -> Result<(SocketAddr, &str)> {
    let (Some(addr), Some(name)) = (args.get(1), args.get(2)) else {
        bail!("usage: cardroom {} <addr> <username>", args[0]);
    };
    let addr: SocketAddr = addr
        .parse()
        .with_context(|| format!("invalid address '{}'", addr))?;
    Ok((addr, name))
}

// =============================================================================
// AUTO-PLAY
// =============================================================================

/// Play the host's turn: draw, discard the first card, pass.
///
/// Returns whether a turn was played.
fn play_host_turn<T: Transport>(host: &mut HostDispatcher<T>) -> Result<bool> {
    if !host.is_my_turn() {
        return Ok(false);
    }
    match host.draw() {
        Ok(card) => {
            info!("host drew {}", card);
            if let Some(card) = host.hand().and_then(|hand| hand.first()) {
                host.discard(card)?;
            }
        }
        Err(e) => warn!("host could not draw: {}", e),
    }
    host.end_turn()?;
    Ok(true)
}

/// Advance a peer's turn by one step. Drawing waits on the host's reply, so
/// a full turn spans several ticks.
///
/// Returns whether the turn was passed.
fn play_peer_step<T: Transport>(peer: &mut PeerDispatcher<T>) -> Result<bool> {
    let view = peer.view();
    if !view.is_turn() || view.draw_pending() {
        return Ok(false);
    }
    let flags = view.turn_flags();
    if !flags.drew && view.status() != EMPTY_PILE_STATUS {
        peer.request_draw()?;
        return Ok(false);
    }
    if flags.drew && !flags.discarded {
        if let Some(card) = view.hand().first() {
            peer.discard(card)?;
        }
    }
    peer.end_turn()?;
    Ok(true)
}

// =============================================================================
// DEMO
// =============================================================================

fn run_demo() -> Result<()> {
    info!("=== Starting Demo Room ===");

    let mut settings = RoomSettings::from_env()?;
    settings.seed.get_or_insert(DEMO_SEED);

    let relay = MemoryRelay::new();
    let (code, transport) = relay.allocate(settings.max_connections())?;
    info!("Join code: {}", code);

    let mut host = HostDispatcher::open(transport, settings.clone(), "host", &code)?;
    let mut peers = Vec::new();
    for name in DEMO_PEERS.iter().take(settings.max_connections()) {
        peers.push(PeerDispatcher::connect(relay.join(&code)?, name)?);
    }

    let seats = peers.len() + 1;
    let mut steps = 0;
    while host.room().turns().count() < seats {
        step(&mut host, &mut peers);
        steps += 1;
        if steps > MAX_DEMO_STEPS {
            bail!("players never finished joining");
        }
    }
    info!("{} players seated in '{}'", seats, host.room().room_name());

    host.start_game()?;
    let mut turns_played = 0;
    while turns_played < ROUNDS * seats {
        step(&mut host, &mut peers);
        if play_host_turn(&mut host)? {
            turns_played += 1;
        }
        for peer in &mut peers {
            if play_peer_step(peer)? {
                turns_played += 1;
            }
        }
        steps += 1;
        if steps > MAX_DEMO_STEPS {
            bail!("room stalled after {} turns", turns_played);
        }
    }
    step(&mut host, &mut peers);

    info!("=== Room Results ===");
    for peer in &peers {
        let view = peer.view();
        info!(
            "{} (seat {:?}) holds {} cards",
            view.username(),
            view.client_id(),
            view.hand().len()
        );
    }
    let room = host.room();
    info!(
        "Draw pile {} / discards {} / in play {} of {}",
        room.deck().len(),
        room.deck().discard_pile().len(),
        room.cards_in_play(),
        room.deck().total()
    );
    if room.cards_in_play() != room.deck().total() {
        bail!("card conservation broken");
    }
    info!("CARDS CONSERVED");

    host.shutdown();
    step(&mut host, &mut peers);
    for peer in &peers {
        info!("{} saw exit {:?}", peer.view().username(), peer.view().exit());
    }
    Ok(())
}

fn step<H: Transport, P: Transport>(host: &mut HostDispatcher<H>, peers: &mut [PeerDispatcher<P>]) {
    host.tick();
    for peer in peers.iter_mut() {
        peer.tick();
    }
}

// =============================================================================
// TCP
// =============================================================================

async fn run_tcp_host(addr: SocketAddr, name: &str) -> Result<()> {
    let settings = RoomSettings::from_env()?;
    let seats = settings.max_players;
    let mut host = HostDispatcher::open(TcpHostTransport::new(addr), settings, name, &addr.to_string())?;
    info!("Waiting for {} players on {}", seats, addr);

    let mut ticker = tokio::time::interval(TICK);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    let mut own_turns = 0;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                host.tick();
                if !host.is_open() {
                    info!("Room ended");
                    break;
                }
                let phase = host.room().phase();
                match phase {
                    RoomPhase::Lobby if host.room().turns().count() == seats => host.start_game()?,
                    RoomPhase::Playing if play_host_turn(&mut host)? => {
                        own_turns += 1;
                        if own_turns >= ROUNDS {
                            host.shutdown();
                            break;
                        }
                    }
                    _ => {}
                }
            }
            _ = &mut shutdown => {
                info!("Shutting down");
                host.shutdown();
                break;
            }
        }
    }
    Ok(())
}

async fn run_tcp_peer(addr: SocketAddr, name: &str) -> Result<()> {
    let mut peer = PeerDispatcher::connect(TcpPeerTransport::new(addr), name)?;

    let mut ticker = tokio::time::interval(TICK);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                peer.tick();
                if let Some(reason) = peer.view().exit() {
                    info!("Room closed: {:?}", reason);
                    break;
                }
                if !peer.is_connected() {
                    info!("Disconnected");
                    break;
                }
                play_peer_step(&mut peer)?;
            }
            _ = &mut shutdown => {
                peer.leave();
                break;
            }
        }
    }
    Ok(())
}

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use emoji_party::{
    config::{GameConfig, PeerConfig},
    link,
    session::{Session, SessionConfig, SessionEvent, SessionHandle, StatusLevel},
    transport::TcpTransport,
    types::GameState,
};

const HELP: &str = "\
Commands:
  /start          start the game (host)
  /emojis         show the emoji palette
  /emoji <e>...   add emojis to your clue (describer)
  /clear          clear your clue
  /clue           submit your clue (describer)
  /again          play again after the game ends (host)
  /state          show scores and round
  /quit           leave
Anything else is sent as a guess.";

#[tokio::main]
async fn main() {
    // Load .env file if present (before any env var reads)
    if let Err(e) = dotenvy::dotenv() {
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "emoji_party=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let game = GameConfig::from_env();
    let peer = PeerConfig::from_env();

    // A join link (or a bare host address) joins; nothing starts a new session
    let room = std::env::args().nth(1).map(|arg| {
        link::room_from_link(&arg).unwrap_or_else(|| arg.trim().to_string())
    });

    let (transport, transport_events) = match TcpTransport::open(peer.bind).await {
        Ok(opened) => opened,
        Err(e) => {
            tracing::error!("Failed to open transport on {}: {}", peer.bind, e);
            std::process::exit(1);
        }
    };

    tracing::info!("Starting Emoji Party as {}", peer.player_name);
    let palette = game.emoji_palette.join(" ");
    let (handle, mut events) = Session::start(
        transport,
        transport_events,
        SessionConfig {
            player_name: peer.player_name,
            room,
            base_url: peer.base_url,
            game,
        },
    );

    println!("{}", HELP);

    let local_id = handle.local_id().clone();
    let printer = tokio::spawn(async move {
        let mut announced = None;
        while let Some(event) = events.recv().await {
            if let SessionEvent::StateChanged(state) = &event {
                // Announce each round (or redraw) once
                let round = (state.current_round, state.describer_id.clone());
                if state.round_in_progress && announced.as_ref() != Some(&round) {
                    print_round(state, &local_id);
                    announced = Some(round);
                }
                continue;
            }
            print_event(&event);
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "/quit" {
            break;
        }
        if let Err(e) = run_command(&handle, line, &palette).await {
            println!("! {}", e);
        }
    }

    handle.shutdown();
    printer.abort();
}

async fn run_command(
    handle: &SessionHandle,
    line: &str,
    palette: &str,
) -> Result<(), emoji_party::error::SessionError> {
    let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
    match command {
        "/start" => handle.start_game().await,
        "/emojis" => {
            println!("{}", palette);
            Ok(())
        }
        "/emoji" => {
            for emoji in rest.split_whitespace() {
                handle.add_emoji(emoji).await?;
            }
            Ok(())
        }
        "/clear" => handle.clear_clue().await,
        "/clue" => handle.submit_clue().await,
        "/again" => handle.play_again().await,
        "/state" => {
            print_scores(&handle.state().await?);
            Ok(())
        }
        "/help" => {
            println!("{}", HELP);
            Ok(())
        }
        _ if command.starts_with('/') => {
            println!("Unknown command {}, try /help", command);
            Ok(())
        }
        _ => handle.guess(line).await,
    }
}

fn print_event(event: &SessionEvent) {
    match event {
        SessionEvent::Status { level, text } => match level {
            StatusLevel::Error => println!("[status] error: {}", text),
            _ => println!("[status] {}", text),
        },
        SessionEvent::System(text) => println!("* {}", text),
        SessionEvent::Chat(chat) => {
            let mark = if chat.is_correct { " ✓" } else { "" };
            println!("{}: {}{}", chat.player_name, chat.message, mark);
        }
        SessionEvent::ClueSubmitted { clue } => println!("Clue: {}", clue),
        SessionEvent::StateChanged(_) => {}
        SessionEvent::RoundEnded { winner, phrase } => {
            println!("{} guessed it! The answer was: {}", winner, phrase)
        }
        SessionEvent::GameOver { standings } => {
            println!("Game over! Final scores:");
            for (rank, player) in standings.iter().enumerate() {
                println!("  {}. {} - {} pts", rank + 1, player.name, player.score);
            }
        }
        SessionEvent::PromotedToHost => println!("You are now the host"),
    }
}

fn print_round(state: &GameState, local_id: &str) {
    if state.is_describer(local_id) {
        println!(
            "Round {}/{}: you are describing \"{}\" - use /emoji and /clue",
            state.current_round, state.max_rounds, state.current_phrase
        );
    } else {
        let describer = state.describer().map(|p| p.name.as_str()).unwrap_or("?");
        println!(
            "Round {}/{}: {} is describing, type your guesses",
            state.current_round, state.max_rounds, describer
        );
    }
}

fn print_scores(state: &GameState) {
    println!(
        "Round {}/{} ({:?})",
        state.current_round,
        state.max_rounds,
        state.phase()
    );
    for player in &state.players {
        let host = if player.is_host { " (host)" } else { "" };
        println!("  {}{} - {} pts", player.name, host, player.score);
    }
}

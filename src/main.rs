use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stadtlandfluss::api::{self, AppState};
use stadtlandfluss::auth::{AdminConfig, UserRegistry};
use stadtlandfluss::dictionary::InMemoryDictionary;
use stadtlandfluss::game::GameService;
use stadtlandfluss::leaderboard::InMemoryLeaderboard;
use stadtlandfluss::limit::{spawn_cleanup_task, RateLimiter};
use stadtlandfluss::store::InMemoryRoundStore;
use stadtlandfluss::types::GameConfig;

/// Seed used when no TERMS_FILE is configured, enough to play a quick game.
const DEFAULT_TERMS: &[(&str, &[&str])] = &[
    (
        "Stadt",
        &[
            "Berlin", "Hamburg", "München", "Köln", "Frankfurt", "Stuttgart", "Dresden",
            "Leipzig", "Nürnberg", "Aachen", "Bonn", "Essen", "Wien", "Zürich", "Paris",
            "London", "Rom", "Madrid", "Oslo", "Tokio",
        ],
    ),
    (
        "Land",
        &[
            "Deutschland", "Österreich", "Schweiz", "Frankreich", "Italien", "Spanien",
            "Belgien", "Niederlande", "Polen", "Dänemark", "Norwegen", "Schweden",
            "Finnland", "Portugal", "Griechenland", "Ungarn", "Kanada", "Japan",
            "Australien", "Brasilien",
        ],
    ),
    (
        "Fluss",
        &[
            "Rhein", "Elbe", "Donau", "Main", "Mosel", "Weser", "Oder", "Neckar", "Isar",
            "Spree", "Themse", "Seine", "Wolga", "Nil", "Amazonas", "Mississippi",
            "Jangtse", "Ganges", "Po", "Loire",
        ],
    ),
    (
        "Tier",
        &[
            "Hund", "Katze", "Elefant", "Giraffe", "Löwe", "Tiger", "Bär", "Wolf",
            "Fuchs", "Igel", "Adler", "Falke", "Delfin", "Wal", "Pinguin", "Zebra",
            "Nashorn", "Krokodil", "Schlange", "Maus",
        ],
    ),
];

async fn build_dictionary() -> InMemoryDictionary {
    let dictionary = InMemoryDictionary::new();

    if let Ok(path) = std::env::var("TERMS_FILE") {
        match tokio::fs::read_to_string(&path).await {
            Ok(json) => match dictionary.seed_from_json(&json).await {
                Ok(count) => {
                    tracing::info!(path, count, "Seeded term dictionary from file");
                    return dictionary;
                }
                Err(e) => {
                    tracing::error!(path, "Failed to parse TERMS_FILE: {}", e);
                }
            },
            Err(e) => {
                tracing::error!(path, "Failed to read TERMS_FILE: {}", e);
            }
        }
    }

    for (category, terms) in DEFAULT_TERMS {
        let cat = dictionary.add_category(category).await;
        for term in *terms {
            dictionary.add_term(&cat.id, term).await;
        }
    }
    tracing::info!("Seeded built-in default term dictionary");
    dictionary
}

#[tokio::main]
async fn main() {
    // Load .env file if present (before any env var reads)
    if let Err(e) = dotenvy::dotenv() {
        // Not an error if .env doesn't exist, only log if it's a different issue
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stadtlandfluss=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Stadt-Land-Fluss server...");

    let config = GameConfig::from_env();
    tracing::info!(?config, "Game config loaded");

    let admin_config = Arc::new(AdminConfig::from_env());
    let rate_limiter = Arc::new(RateLimiter::from_env());
    spawn_cleanup_task(rate_limiter.clone());

    let dictionary = Arc::new(build_dictionary().await);
    let game = GameService::new(
        Arc::new(InMemoryRoundStore::new()),
        dictionary,
        Arc::new(InMemoryLeaderboard::new()),
        config,
    );

    let state = Arc::new(AppState {
        game,
        users: UserRegistry::new(),
    });

    let app = api::build_router(state, admin_config, rate_limiter);

    let port = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(8080);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}

use std::{net::SocketAddr, sync::Arc};

use mongodb::Client;
use tracing::Level;

use pricewatch::{
    config,
    render::Localizer,
    routes,
    services::{
        alert_cycle::{spawn_alert_cycle, AlertCycleCoordinator, CycleContext, CyclePolicies},
        alert_store::MongoAlertStore,
        coingecko::CoinGeckoClient,
        notifier::TelegramSink,
    },
    AppState,
};

#[tokio::main]
async fn main() {
    let settings = config::load();

    let level = settings.log_level.parse::<Level>().unwrap_or(Level::INFO);
    tracing_subscriber::fmt().with_max_level(level).init();

    // Mongo connection
    let client = Client::with_uri_str(&settings.mongodb_uri)
        .await
        .expect("Failed to connect to MongoDB");
    let store = Arc::new(MongoAlertStore::new(client.database(&settings.mongodb_db)));
    if let Err(e) = store.ensure_indexes().await {
        tracing::warn!("could not create alert indexes: {}", e);
    }

    let prices = CoinGeckoClient::from_settings(&settings).expect("CoinGecko client");
    if let Err(e) = prices.ping().await {
        tracing::warn!("CoinGecko is not reachable yet: {}", e);
    }

    let sink = TelegramSink::from_settings(&settings).expect("Telegram sink");
    if settings.telegram_bot_token.trim().is_empty() {
        tracing::warn!("TELEGRAM_BOT_TOKEN is not set; notifications will fail");
    }

    let localizer = Localizer::new(&settings.default_language).expect("message templates");
    let (events_tx, _events_rx) = tokio::sync::broadcast::channel::<String>(16);

    let ctx = CycleContext {
        source: Arc::new(prices),
        store: store.clone(),
        sink: Arc::new(sink),
        localizer,
        events_tx: events_tx.clone(),
    };
    let coordinator = Arc::new(AlertCycleCoordinator::new(
        ctx,
        CyclePolicies::from_settings(&settings),
    ));

    tracing::info!(
        "checking alerts against {} prices every {:?}",
        settings.quote_currency,
        settings.alert_check_interval
    );
    spawn_alert_cycle(coordinator.clone(), settings.alert_check_interval);

    let state = AppState {
        settings: settings.clone(),
        store,
        coordinator,
        events_tx,
    };

    let app = routes::app(state);

    let addr = SocketAddr::from((
        settings
            .host
            .parse::<std::net::IpAddr>()
            .expect("HOST must be an IP address"),
        settings.port,
    ));
    tracing::info!("listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}

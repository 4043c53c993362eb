use std::sync::Arc;

use auth::TokenIssuer;
use identity_service::config::Config;
use identity_service::domain::identity::service::IdentityService;
use identity_service::identity::ports::IdentityServicePort;
use identity_service::inbound::http::router::create_router;
use identity_service::outbound::repositories::PostgresIdentityRepository;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "identity_service=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        service = "identity-service",
        version = env!("CARGO_PKG_VERSION"),
        "Service starting"
    );

    let config = Config::load()?;

    tracing::info!(
        http_port = config.server.http_port,
        "Configuration loaded"
    );

    let pg_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database.url)
        .await?;
    tracing::info!(
        max_connections = 5,
        database = "postgresql",
        "Database connection pool created"
    );

    sqlx::migrate!("./migrations").run(&pg_pool).await?;
    tracing::info!(database = "postgresql", "Database migrations completed");

    // The signing secret is loaded once here and read-only from now on
    let token_issuer = Arc::new(TokenIssuer::new(config.jwt.secret.as_bytes()));
    let identity_repository = Arc::new(PostgresIdentityRepository::new(pg_pool));

    let identity_service: Arc<dyn IdentityServicePort> = Arc::new(IdentityService::new(
        identity_repository,
        Arc::clone(&token_issuer),
    ));

    let http_address = format!("0.0.0.0:{}", config.server.http_port);
    let http_listener = tokio::net::TcpListener::bind(&http_address).await?;
    tracing::info!(
        address = %http_address,
        port = config.server.http_port,
        protocol = "http",
        "Http server listening"
    );

    let http_application = create_router(identity_service, token_issuer);
    axum::serve(http_listener, http_application).await?;

    Ok(())
}

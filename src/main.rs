use axum::{http::Method, Extension};
use campus_club_hub::{auth::Keys, connect_to_db, email::Mailer};
use envconfig::Envconfig;
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Envconfig)]
struct Config {
    #[envconfig(from = "DATABASE_URL")]
    pub db_url: String,
    #[envconfig(from = "PORT", default = "8080")]
    pub port: u16,
    #[envconfig(from = "JWT_SECRET")]
    pub jwt_secret: String,
    #[envconfig(from = "TOKEN_TTL_HOURS", default = "24")]
    pub token_ttl_hours: u64,
    #[envconfig(from = "SMTP_RELAY", default = "smtp.gmail.com")]
    pub smtp_relay: String,
    #[envconfig(from = "SMTP_USERNAME")]
    pub smtp_username: Option<String>,
    #[envconfig(from = "SMTP_PASSWORD")]
    pub smtp_password: Option<String>,
    #[envconfig(from = "FRONTEND_HOST", default = "http://localhost:5173")]
    pub frontend_host: String,
}

impl Config {
    async fn mailer(&self) -> anyhow::Result<Option<Arc<Mailer>>> {
        let (Some(username), Some(password)) = (&self.smtp_username, &self.smtp_password) else {
            warn!("SMTP_USERNAME/SMTP_PASSWORD not set, password reset emails are disabled");
            return Ok(None);
        };

        let mailer = Mailer::new(
            &self.smtp_relay,
            username.clone(),
            password.clone(),
            self.frontend_host.clone(),
        )?;
        if let Err(e) = mailer.sanity_check().await {
            warn!(error = %e, "email sanity check failed. forgot password will not work");
        }
        Ok(Some(Arc::new(mailer)))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::init_from_env()?;
    let keys = Keys::from_base64_secret(
        &config.jwt_secret,
        Duration::from_secs(config.token_ttl_hours * 60 * 60),
    )
    .map_err(|e| anyhow::anyhow!("JWT_SECRET is not valid base64: {e}"))?;
    let mailer = config.mailer().await?;

    let pool = connect_to_db(&config.db_url)?;
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any)
        .allow_origin(Any);
    let app = campus_club_hub::app()
        .layer(Extension(pool))
        .layer(Extension(Arc::new(keys)))
        .layer(Extension(mailer))
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!(%addr, "listening");
    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await?;

    Ok(())
}

use anyhow::{Context, Result};
use bestsellers::{
    api::{self, AppState},
    config::Config,
    store::RecordStore,
};

#[tokio::main]
async fn main() -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json")) {
        builder.json().init();
    } else {
        builder.init();
    }

    let config = Config::from_env()?;
    let store = RecordStore::new(config.data_path(), config.merge_policy());

    let listener = tokio::net::TcpListener::bind(config.bind_addr())
        .await
        .with_context(|| format!("binding {}", config.bind_addr()))?;
    api::serve(listener, AppState::new(store)).await?;
    Ok(())
}

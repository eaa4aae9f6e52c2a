/// YAMO - Purrfect Finances server
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use yamo::{config::ServerConfig, context::AppContext, server, YamoResult};

#[tokio::main]
async fn main() -> YamoResult<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "yamo=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    print_banner();

    let config = ServerConfig::from_env()?;
    let ctx = AppContext::new(config).await?;

    server::serve(ctx).await?;

    Ok(())
}

fn print_banner() {
    println!(
        r#"
  __  _____   __  _______
  \ \/ / _ | /  |/  / __ \
   \  / __ |/ /|_/ / /_/ /
   /_/_/ |_/_/  /_/\____/

        Purrfect Finances v{}
        "#,
        env!("CARGO_PKG_VERSION")
    );
}

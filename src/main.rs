use accounts::{app, state::AppState, telemetry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    telemetry::init();

    let state = AppState::init().await?;
    let addr = state.config.bind_addr;
    app::serve(app::build_app(state), addr).await
}

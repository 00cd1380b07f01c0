#[tokio::main]
async fn main() -> zoombot::error::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("zoombot=info"))
        .init();
    log::info!("Starting zoombot webhook relay");

    match zoombot::run().await {
        Ok(()) => {
            log::info!("Server shut down successfully");
            Ok(())
        }
        Err(e) => {
            log::error!("Server encountered an error: {e}");
            Err(e)
        }
    }
}

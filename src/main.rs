//! # env-inject controller
//!
//! Binary entry point. See the library crate for the reconciliation logic.

use env_inject_controller::runtime::{initialize, run_watch_loop};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let init = initialize().await?;
    run_watch_loop(init.client, init.reconciler, init.server_state).await
}

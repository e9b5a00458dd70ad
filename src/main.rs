#[tokio::main]
async fn main() -> anyhow::Result<()> {
    ballotchain::node::run_cli().await
}

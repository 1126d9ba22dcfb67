#[tokio::main]
async fn main() -> anyhow::Result<()> {
    voldeck::run().await
}

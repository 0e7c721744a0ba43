#[tokio::main]
async fn main() -> anyhow::Result<()> {
    gportal_proxy_lib::run().await
}

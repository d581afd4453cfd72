use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    recall_cli::main_entry().await
}

use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    imgfind_cli::main_entry().await
}

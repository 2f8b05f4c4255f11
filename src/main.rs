#[tokio::main]
async fn main() {
    if let Err(e) = gitops_explorer::run().await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

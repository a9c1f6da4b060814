#[tokio::main]
async fn main() {
    if let Err(e) = seeshot_lib::run().await {
        eprintln!("seeshot: {e}");
        std::process::exit(1);
    }
}

use sales_intel_api::run;

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("sales-intel: {err}");
        std::process::exit(1);
    }
}

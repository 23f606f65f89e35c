//! wtrack binary entry point.

use worktrack::ui::output;

#[tokio::main]
async fn main() {
    if let Err(err) = worktrack::cli::run().await {
        output::error(format!("{:#}", err));
        std::process::exit(1);
    }
}

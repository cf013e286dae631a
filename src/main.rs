use condo_meter::app;
use condo_meter::config::{Config, init_logging};
use std::env;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    // An address on the command line wins over CONDO_BIND_ADDR
    let args: Vec<String> = env::args().collect();
    let mut config = Config::from_env();
    if args.len() >= 2 {
        config.bind_addr = args[1].clone();
    }

    println!("Starting dashboard server on {}", config.bind_addr);
    app::run(config).await
}

use anyhow::{Error, Result};
use push_dispatch::{
    config::Config, models::message::NotificationRequest, utils::init_tracing,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Error> {
    init_tracing();

    let config = Config::load()?;
    let mut dispatcher = config.build_dispatcher()?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut line_number = 0usize;
    while let Some(line) = lines.next_line().await? {
        line_number += 1;
        if line.trim().is_empty() {
            continue;
        }

        let request = match serde_json::from_str::<NotificationRequest>(&line) {
            Ok(request) => request,
            Err(e) => {
                warn!(line = line_number, error = %e, "Skipping malformed notification request");
                continue;
            }
        };

        if let Err(e) = dispatcher.enqueue(request.into()) {
            warn!(line = line_number, error = %e, "Skipping unroutable notification");
        }
    }

    info!(pending = dispatcher.pending(), "Input consumed, flushing");
    let result = dispatcher.flush().await;

    println!("{}", serde_json::to_string_pretty(&result)?);

    Ok(())
}

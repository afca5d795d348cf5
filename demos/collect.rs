//! Collection demo
//!
//! This example demonstrates the core functionality of listing-collector:
//! - Loading the API credential from the environment
//! - Creating a controller for the reference HTTP source
//! - Subscribing to events
//! - Running one collection with Ctrl+C handling
//! - Exporting the listings to CSV
//!
//! ```text
//! YELP_API_KEY=... cargo run --example collect -- "Coffee" "Toronto, ON"
//! ```

use listing_collector::config::CollectionConfig;
use listing_collector::export::default_export_filename;
use listing_collector::{CollectionController, Config, Event, Query, run_with_shutdown};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "listing_collector=info".into()),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let category = args.next().unwrap_or_else(|| "Restaurants".to_string());
    let location = args.next().unwrap_or_else(|| "Toronto, ON".to_string());

    let config = Config {
        collection: CollectionConfig {
            request_delay_secs: 2.0,
            page_limit: 5,
        },
        ..Default::default()
    };

    // Fails fast if YELP_API_KEY is not set
    let controller = CollectionController::from_env(config)?;

    let mut events = controller.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                Event::PageFetched {
                    page, collected, ..
                } => {
                    println!("page {} done, {collected} listings so far", page + 1);
                }
                Event::Retrying {
                    page,
                    attempt,
                    delay_ms,
                    ..
                } => {
                    println!("page {} retry #{attempt} in {delay_ms} ms", page + 1);
                }
                Event::Failed { error } => eprintln!("collection failed: {error}"),
                Event::Completed { collected, pages } => {
                    println!("finished: {collected} listings from {pages} pages");
                }
                _ => {}
            }
        }
    });

    controller.start(Query::new(category, location))?;
    let state = run_with_shutdown(&controller).await;

    let snapshot = controller.snapshot();
    println!("{state}: {}", snapshot.status_message);
    if snapshot.collected_count > 0 {
        let filename = default_export_filename(chrono::Local::now().date_naive());
        std::fs::write(&filename, controller.export_csv()?)?;
        controller.log(format!("Data exported to {filename}"));
        println!("wrote {} listings to {filename}", snapshot.collected_count);
    }

    Ok(())
}

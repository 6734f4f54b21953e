use crate::services::{CacheStore, RefreshScheduler};
use crate::sources::registry;
use crate::utils::build_http_client;

pub async fn run() {
    let http = match build_http_client() {
        Ok(client) => client,
        Err(e) => {
            eprintln!("❌ {}", e);
            std::process::exit(1);
        }
    };

    let store = CacheStore::from_env(&http);
    let cache_enabled = store.is_enabled();
    let scheduler = RefreshScheduler::new(store, registry(&http));

    println!("⛽ Running refresh pipeline...");
    let snapshot = scheduler.force_refresh().await;

    for source in &snapshot.sources {
        if source.ok {
            println!(
                "   ✅ {:<12} {} cities{}",
                source.brand,
                source.city_count.unwrap_or(0),
                if source.low_coverage { " (low coverage)" } else { "" }
            );
        } else {
            println!(
                "   ❌ {:<12} {}",
                source.brand,
                source.error.as_deref().unwrap_or("unknown error")
            );
        }
    }

    println!(
        "📊 {} cities averaged, lastUpdate {}",
        snapshot.averages.len(),
        snapshot.last_update.to_rfc3339()
    );
    if !cache_enabled {
        println!("⚠️  KV cache disabled; result was not persisted");
    }
}

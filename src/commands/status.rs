use crate::constants::{CACHE_KEY, STALE_THRESHOLD_HOURS};
use crate::services::{classify, CacheStore, Freshness};
use crate::utils::build_http_client;
use chrono::Utc;

pub async fn run() {
    let http = match build_http_client() {
        Ok(client) => client,
        Err(e) => {
            eprintln!("❌ {}", e);
            std::process::exit(1);
        }
    };

    let store = CacheStore::from_env(&http);
    if !store.is_enabled() {
        println!("⚠️  KV cache not configured (KV_REST_API_URL / KV_REST_API_TOKEN)");
        return;
    }

    match store.get_snapshot(CACHE_KEY).await {
        Some(snapshot) => {
            let now = Utc::now();
            let age_hours =
                now.signed_duration_since(snapshot.last_update).num_minutes() as f64 / 60.0;
            let state = classify(Some(snapshot.last_update), now, STALE_THRESHOLD_HOURS);

            println!(
                "📦 Snapshot from {} ({:.1}h old, {})",
                snapshot.last_update.to_rfc3339(),
                age_hours,
                match state {
                    Freshness::Fresh => "fresh",
                    Freshness::Stale => "stale",
                    Freshness::Missing => "missing",
                }
            );
            println!(
                "   {} brands, {} cities averaged",
                snapshot.prices.len(),
                snapshot.averages.len()
            );
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
            if let Some(note) = &snapshot.note {
                println!("   📝 {}", note);
            }
        }
        None => {
            println!("ℹ️  No cached snapshot under '{}'", CACHE_KEY);
        }
    }
}

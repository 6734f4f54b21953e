use crate::server;
use crate::services::{CacheStore, RefreshScheduler};
use crate::sources::registry;
use crate::utils::build_http_client;
use crate::worker;

pub async fn run(port: u16) {
    println!("🚀 Starting akaryakit server on port {}", port);

    // subscriber first, so worker startup logs are not dropped
    server::init_tracing();

    let http = match build_http_client() {
        Ok(client) => client,
        Err(e) => {
            eprintln!("❌ {}", e);
            std::process::exit(1);
        }
    };

    let store = CacheStore::from_env(&http);
    if store.is_enabled() {
        println!("🗄️  KV cache configured");
    } else {
        println!("⚠️  KV cache disabled (credentials missing); every read recomputes");
    }

    let adapters = registry(&http);
    println!("⛽ {} price sources registered", adapters.len());

    let scheduler = RefreshScheduler::new(store, adapters);

    // Background cache warmer; read-triggered revalidation still applies
    let worker_scheduler = scheduler.clone();
    tokio::spawn(async move {
        worker::run_refresh_worker(worker_scheduler).await;
    });

    if let Err(e) = server::serve(scheduler, port).await {
        eprintln!("❌ Server error: {}", e);
        std::process::exit(1);
    }
}

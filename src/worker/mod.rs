mod refresh_worker;

pub use refresh_worker::run_refresh_worker;

//! Cache and refresh policy constants
//!
//! The whole aggregation result lives under a single KV key and is
//! refreshed as a unit; these constants define that key and the
//! staleness policy around it.

/// KV key holding the latest aggregated snapshot
pub const CACHE_KEY: &str = "fuel:prices";

/// Maximum snapshot age before a read triggers a background refresh
pub const STALE_THRESHOLD_HOURS: i64 = 12;

/// Hard ceiling on a single adapter invocation, including all of its
/// per-city requests. A slower adapter is recorded as timed out; the
/// other adapters are unaffected.
pub const ADAPTER_TIMEOUT_SECS: u64 = 45;

/// Per-request timeout on the shared HTTP client
pub const HTTP_TIMEOUT_SECS: u64 = 20;

/// Request budget for adapters that walk one page per city
pub const CITY_REQUESTS_PER_MINUTE: u32 = 120;

/// A successful source reporting fewer than this share of its expected
/// cities is flagged low-coverage in its `SourceResult` (still merged)
pub const LOW_COVERAGE_RATIO: f64 = 0.5;

/// `Cache-Control` advertised to intermediary caches, matching the
/// internal staleness contract
pub const CACHE_CONTROL_VALUE: &str = "s-maxage=3600, stale-while-revalidate";

pub const USER_AGENT: &str = "Mozilla/5.0 (compatible; akaryakit/0.3)";

/// Background worker re-check interval
pub const WORKER_INTERVAL_SECS: u64 = 1800; // 30 minutes

/// The 81 Turkish provinces, pre-normalized. Adapters that fetch one
/// page per city iterate this list; it is also the expected city-domain
/// size for coverage checks.
pub const PROVINCES: &[&str] = &[
    "ADANA", "ADIYAMAN", "AFYONKARAHISAR", "AGRI", "AMASYA", "ANKARA",
    "ANTALYA", "ARTVIN", "AYDIN", "BALIKESIR", "BILECIK", "BINGOL", "BITLIS",
    "BOLU", "BURDUR", "BURSA", "CANAKKALE", "CANKIRI", "CORUM", "DENIZLI",
    "DIYARBAKIR", "EDIRNE", "ELAZIG", "ERZINCAN", "ERZURUM", "ESKISEHIR",
    "GAZIANTEP", "GIRESUN", "GUMUSHANE", "HAKKARI", "HATAY", "ISPARTA",
    "MERSIN", "ISTANBUL", "IZMIR", "KARS", "KASTAMONU", "KAYSERI",
    "KIRKLARELI", "KIRSEHIR", "KOCAELI", "KONYA", "KUTAHYA", "MALATYA",
    "MANISA", "KAHRAMANMARAS", "MARDIN", "MUGLA", "MUS", "NEVSEHIR", "NIGDE",
    "ORDU", "RIZE", "SAKARYA", "SAMSUN", "SIIRT", "SINOP", "SIVAS",
    "TEKIRDAG", "TOKAT", "TRABZON", "TUNCELI", "SANLIURFA", "USAK", "VAN",
    "YOZGAT", "ZONGULDAK", "AKSARAY", "BAYBURT", "KARAMAN", "KIRIKKALE",
    "BATMAN", "SIRNAK", "BARTIN", "ARDAHAN", "IGDIR", "YALOVA", "KARABUK",
    "KILIS", "OSMANIYE", "DUZCE",
];

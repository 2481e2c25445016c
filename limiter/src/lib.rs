use middleware::global::Throttle;
use store::postgres::PgQuotaStore;

pub mod gate;
pub mod rollover;
pub mod store;

pub mod middleware {
    pub mod global;
}

/// The gate as wired into the HTTP server.
pub type PgGate = gate::Gate<PgQuotaStore>;

pub fn global_middleware(permits_per_second: u32) -> Throttle {
    Throttle::per_second(permits_per_second)
}

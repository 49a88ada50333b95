//! Shared building blocks for the key store workspace: logging setup,
//! Prometheus metrics, action receipts and problem-details payloads.

pub mod types;
pub mod utils;
pub mod metrics;
pub mod receipt;
pub mod problem;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_type_ok() {
        let h = types::Health { status: "ok" };
        assert_eq!(h.status, "ok");
    }
}

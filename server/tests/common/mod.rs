//! Shared helpers for integration tests

use ::agora_server::config::SyncSettings;
use ::agora_server::identity::Identity;
use ::agora_server::test_utils::Harness;
use ::std::sync::Arc;

pub fn create_test_harness(report_threshold: u32) -> Harness {
    Harness::with_settings(SyncSettings {
        hide_on_report: true,
        report_threshold,
        ..Default::default()
    })
}

pub fn create_test_state(harness: &Harness) -> Arc<::agora_server::State> {
    Arc::new(::agora_server::State {
        service: harness.service(),
        pool: None,
        search: None,
    })
}

pub fn bearer(harness: &Harness, identity: &Identity) -> String {
    format!("Bearer {}", harness.token(identity))
}

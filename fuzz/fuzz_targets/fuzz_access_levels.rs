//! Fuzz target for permission and access-level parsing in rule settings.

#![no_main]

use enforcer_client::Permission;
use enforcer_core::RuleConfig;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(value) = std::str::from_utf8(data) else {
        return;
    };

    if let Ok(permission) = value.parse::<Permission>() {
        assert_eq!(Permission::from_rank(permission.rank()).ok(), Some(permission));
    }

    let config = RuleConfig::new("protected_branch")
        .with("push_access_level", value)
        .with("merge_access_level", value);
    if let Ok(settings) = config.access_levels() {
        assert!(settings.len() % 2 == 0);
    }
});

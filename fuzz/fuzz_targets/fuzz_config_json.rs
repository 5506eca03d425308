#![no_main]

use graft_config::{ConfigLoader, EnvConfig, GraftConfig, validate_config};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(config) = sonic_rs::from_slice::<GraftConfig>(data) else {
        return;
    };
    let loader = ConfigLoader::with_env("/fuzz", EnvConfig::default());
    let mut resolved = graft_config::ResolvedConfig::for_project("/fuzz");
    loader.apply_config(&mut resolved, &config);
    let _ = validate_config(&resolved).into_result();
});

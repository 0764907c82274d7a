#![no_main]

use grid_odata::{GridODataConfig, GridRequest, QueryBuilder, RequestNormalizer};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Limit input size to avoid OOM on pathological inputs
    if data.len() > 4096 {
        return;
    }
    let Ok(params) = serde_json::from_slice::<serde_json::Value>(data) else {
        return;
    };
    // Errors are expected; panics are not
    let config = GridODataConfig::default();
    if let Ok(request) = GridRequest::from_value(&params)
        && let Ok(descriptor) = RequestNormalizer::new(&config).normalize(&request)
    {
        let _ = QueryBuilder::new(config).to_query(&descriptor);
    }
});

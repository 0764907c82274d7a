#![no_main]

use grid_odata::{
    AggregationKind, GridODataConfig, GroupSpec, PivotSpec, QueryDescriptor, RawResultSet,
    ResultReshaper, ValueColumn,
};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() > 4096 {
        return;
    }
    let Ok(response) = serde_json::from_slice::<serde_json::Value>(data) else {
        return;
    };
    let config = GridODataConfig::default();
    let Ok(raw) = RawResultSet::from_response(response, &config) else {
        return;
    };

    let values = vec![
        ValueColumn::new("amount", AggregationKind::Sum),
        ValueColumn::new("amount", AggregationKind::Avg).with_alias("avg_amount"),
    ];
    let reshaper = ResultReshaper::new(&config);

    // Exercise every reshape path over the same records
    let grouped = QueryDescriptor::new()
        .with_group(GroupSpec::new(["country", "city"]))
        .with_values(values.clone());
    let pivoted = QueryDescriptor::new()
        .with_group(GroupSpec::new(["country"]))
        .with_pivot(PivotSpec {
            pivot_mode: true,
            columns: vec!["year".to_owned()],
            values,
        });
    for descriptor in [QueryDescriptor::new(), grouped, pivoted] {
        let out = reshaper.reshape(raw.clone(), &descriptor);
        let _ = out.records(&config.group_count_field_name);
    }
});

//! Provider facade scenarios with closure transports and hook recording.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use grid_odata::{ColumnDef, GridRequest, GridRow, QueryDescriptor};
use grid_odata_sdk::{GridODataProvider, ProviderError, TransportError};
use serde_json::{Value, json};

fn canned(
    response: Value,
) -> impl Fn(String) -> std::future::Ready<Result<Value, TransportError>> + Send + Sync {
    move |_query: String| std::future::ready(Ok(response.clone()))
}

#[tokio::test]
async fn end_to_end_flat_request() {
    let seen_queries = Arc::new(Mutex::new(Vec::<String>::new()));
    let recorder = seen_queries.clone();
    let provider = GridODataProvider::builder(move |query: String| {
        recorder.lock().unwrap().push(query);
        async move {
            Ok::<_, TransportError>(json!([{ "amount": 150 }, { "amount": 120 }, { "amount": 110 }]))
        }
    })
    .with_config(grid_odata::GridODataConfig::default().with_request_count(false))
    .build();

    let loaded = provider
        .get_rows_json(&json!({
            "startRow": 0,
            "endRow": 2,
            "sortModel": [{ "colId": "amount", "sort": "desc" }],
            "filterModel": { "amount": { "filterType": "number", "type": "greaterThan", "filter": 100 } }
        }))
        .await
        .unwrap();

    assert_eq!(
        *seen_queries.lock().unwrap(),
        vec!["?$filter=amount gt 100&$orderby=amount desc&$skip=0&$top=2".to_owned()]
    );
    assert_eq!(loaded.total_count, 3);
    assert_eq!(loaded.rows.len(), 3);
}

#[tokio::test]
async fn transport_failure_is_forwarded_to_set_error() {
    let errors = Arc::new(Mutex::new(Vec::<(String, bool)>::new()));
    let sink = errors.clone();
    let provider = GridODataProvider::builder(|_query: String| async {
        Err::<Value, TransportError>("backend unavailable".into())
    })
    .with_set_error(Arc::new(move |err: &ProviderError, req: &GridRequest| {
        sink.lock()
            .unwrap()
            .push((err.to_string(), matches!(req, GridRequest::Infinite(_))));
    }))
    .build();

    let err = provider
        .get_rows_json(&json!({ "startRow": 0, "endRow": 10 }))
        .await
        .unwrap_err();

    let ProviderError::Transport(source) = &err else {
        panic!("expected transport error, got {err:?}");
    };
    assert_eq!(source.to_string(), "backend unavailable");
    assert_eq!(
        *errors.lock().unwrap(),
        vec![("transport failed: backend unavailable".to_owned(), true)]
    );
}

#[tokio::test]
async fn before_request_runs_once_and_after_load_data_sees_rows() {
    let before_calls = Arc::new(AtomicUsize::new(0));
    let before_counter = before_calls.clone();
    let loads = Arc::new(Mutex::new(Vec::<(usize, u64, Vec<String>)>::new()));
    let load_sink = loads.clone();

    let provider = GridODataProvider::builder(canned(json!({
        "@odata.count": 40,
        "value": [{ "id": 1, "name": "a" }]
    })))
    .with_before_request(Arc::new(move |d: &mut QueryDescriptor, _req: &GridRequest| {
        before_counter.fetch_add(1, Ordering::SeqCst);
        d.extend.select = vec!["id".to_owned(), "name".to_owned()];
    }))
    .with_after_load_data(Arc::new(
        move |d: &QueryDescriptor, rows: &[GridRow], total: u64| {
            load_sink
                .lock()
                .unwrap()
                .push((rows.len(), total, d.extend.select.clone()));
        },
    ))
    .build();

    let loaded = provider
        .get_rows_json(&json!({ "startRow": 0, "endRow": 1 }))
        .await
        .unwrap();

    assert_eq!(loaded.query, "?$skip=0&$top=1&$count=true&$select=id,name");
    assert_eq!(before_calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        *loads.lock().unwrap(),
        vec![(1, 40, vec!["id".to_owned(), "name".to_owned()])]
    );
}

#[tokio::test]
async fn pivot_columns_pass_through_secondary_columns_hook() {
    let provider = GridODataProvider::builder(canned(json!([
        { "country": "France", "year": 2020, "amount": 3, "childCount": 1 },
        { "country": "France", "year": 2021, "amount": 4, "childCount": 1 }
    ])))
    .with_before_set_secondary_columns(Arc::new(|columns: &mut Vec<ColumnDef>| {
        grid_odata::columns::for_each_leaf_mut(columns, |leaf| {
            leaf.header_name = format!("Total {}", leaf.pivot_keys.join("/"));
        });
    }))
    .build();

    let loaded = provider
        .get_rows_json(&json!({
            "request": {
                "pivotMode": true,
                "rowGroupCols": [{ "id": "country" }],
                "pivotCols": [{ "id": "year" }],
                "valueCols": [{ "id": "amount", "aggFunc": "sum" }]
            }
        }))
        .await
        .unwrap();

    let columns = loaded.secondary_columns.clone().unwrap();
    let headers: Vec<&str> = grid_odata::columns::leaves(&columns)
        .iter()
        .map(|l| l.header_name.as_str())
        .collect();
    assert_eq!(headers, vec!["Total 2020", "Total 2021"]);
    assert_eq!(
        loaded.records("childCount"),
        vec![json!({ "country": "France", "childCount": 2, "2020_amount": 3, "2021_amount": 4 })]
    );
}

#[tokio::test]
async fn canceled_request_discards_result_and_skips_hooks() {
    let hook_calls = Arc::new(AtomicUsize::new(0));
    let after = hook_calls.clone();
    let on_error = hook_calls.clone();
    let transport_calls = Arc::new(AtomicUsize::new(0));
    let transport_counter = transport_calls.clone();

    let provider = GridODataProvider::builder(move |_query: String| {
        transport_counter.fetch_add(1, Ordering::SeqCst);
        async { Ok::<_, TransportError>(json!([{ "id": 1 }])) }
    })
    .with_after_load_data(Arc::new(move |_: &QueryDescriptor, _: &[GridRow], _: u64| {
        after.fetch_add(1, Ordering::SeqCst);
    }))
    .with_set_error(Arc::new(move |_: &ProviderError, _: &GridRequest| {
        on_error.fetch_add(1, Ordering::SeqCst);
    }))
    .build();

    let request = GridRequest::from_value(&json!({ "startRow": 0 })).unwrap();
    let (handle, rows) = provider.get_rows_cancelable(request);
    handle.cancel();
    let err = rows.await.unwrap_err();

    assert!(err.is_canceled());
    assert_eq!(transport_calls.load(Ordering::SeqCst), 1);
    assert_eq!(hook_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn uncanceled_handle_resolves_normally() {
    let provider = GridODataProvider::builder(canned(json!([{ "id": 1 }]))).build();
    let request = GridRequest::from_value(&json!({ "startRow": 0 })).unwrap();
    let (_handle, rows) = provider.get_rows_cancelable(request);
    assert_eq!(rows.await.unwrap().rows.len(), 1);
}

//! Lenient decisions are observable as `warn` events.

use std::sync::{Arc, Mutex};

use grid_odata::{
    FilterDescriptor, FilterKind, FilterPredicate, GridODataConfig, GroupSpec, OperatorKind,
    QueryBuilder, QueryDescriptor, QueryExtend, SortDir, SortKey,
};
use serde_json::json;
use tracing_subscriber::layer::SubscriberExt;

#[derive(Clone, Default)]
struct WarningCapture {
    warnings: Arc<Mutex<Vec<(String, String)>>>,
}

impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for WarningCapture {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: tracing_subscriber::layer::Context<'_, S>) {
        if *event.metadata().level() == tracing::Level::WARN {
            let mut visitor = MessageVisitor(String::new());
            event.record(&mut visitor);
            self.warnings
                .lock()
                .unwrap()
                .push((event.metadata().target().to_owned(), visitor.0));
        }
    }
}

struct MessageVisitor(String);

impl tracing::field::Visit for MessageVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.0 = format!("{value:?}");
        }
    }
}

fn capture_warnings(f: impl FnOnce()) -> Vec<(String, String)> {
    let capture = WarningCapture::default();
    let warnings = capture.warnings.clone();
    let subscriber = tracing_subscriber::registry().with(capture);
    tracing::subscriber::with_default(subscriber, f);
    warnings.lock().unwrap().clone()
}

#[test]
fn unparseable_date_is_reported_and_still_queried() {
    let descriptor = QueryDescriptor::new().with_filter(FilterDescriptor::new(
        "created",
        FilterKind::Date,
        FilterPredicate::condition(OperatorKind::Equals, vec![json!("not-a-date")]),
    ));
    let mut query = String::new();
    let warnings = capture_warnings(|| {
        query = QueryBuilder::new(GridODataConfig::default())
            .to_query(&descriptor)
            .unwrap();
    });

    assert_eq!(query, "?$filter=date(created) eq 'not-a-date'");
    assert!(
        warnings
            .iter()
            .any(|(target, msg)| target == "grid_odata::literal" && msg.contains("date operand")),
        "expected a date fallback warning, got: {warnings:?}"
    );
}

#[test]
fn dropped_sort_key_and_structural_param_are_reported() {
    let descriptor = QueryDescriptor::new()
        .with_group(GroupSpec::new(["country"]))
        .with_sort(SortKey::new("name", SortDir::Asc))
        .with_extend(QueryExtend {
            params: vec![("$orderby".to_owned(), "id".to_owned())],
            ..QueryExtend::default()
        });
    let mut query = String::new();
    let warnings = capture_warnings(|| {
        query = QueryBuilder::new(GridODataConfig::default())
            .to_query(&descriptor)
            .unwrap();
    });

    assert!(!query.contains("name"), "{query}");
    assert!(!query.contains("$orderby=id"), "{query}");
    let builder_warnings = warnings
        .iter()
        .filter(|(target, _)| target == "grid_odata::builder")
        .count();
    assert_eq!(builder_warnings, 2, "{warnings:?}");
}

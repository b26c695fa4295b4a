//! Benchmarks for sanitizing, normalizing and assembling queries.
//!
//! Run with: cargo bench -p doc-query

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use doc_query::{
    Actor, AllowAll, DatabaseQuery, EntitySchema, Error, ExecutionContext, FieldDef, FieldType,
    FilterInput, MariaDb, Postgres, QueryOptions, RecordStore, RolePermissions, Sqlite, StoreError,
    Value, normalize, sanitize,
};
use serde_json::json;
use std::hint::black_box;

/// Schemas only; statements are built, never executed.
struct Schemas;

impl RecordStore for Schemas {
    fn execute_parametrized(&self, _: &str, _: &[Value]) -> Result<Vec<Vec<Value>>, StoreError> {
        Ok(Vec::new())
    }

    fn get_schema(&self, entity: &str) -> Result<EntitySchema, Error> {
        Ok(match entity {
            "DocField" => EntitySchema::new(entity)
                .child()
                .field(FieldDef::new("fieldname", FieldType::Data))
                .field(FieldDef::new("fieldtype", FieldType::Select)),
            _ => EntitySchema::new(entity)
                .field(FieldDef::new("subject", FieldType::Data))
                .field(FieldDef::new("starts_on", FieldType::Datetime))
                .field(FieldDef::new("event_type", FieldType::Select))
                .field(FieldDef::new("duration", FieldType::Int)),
        })
    }
}

// =============================================================================
// Sanitizer Benchmarks
// =============================================================================

fn bench_sanitize(c: &mut Criterion) {
    let mut group = c.benchmark_group("sanitize");

    let fields = [
        ("column", "subject"),
        ("qualified", "`tabEvent`.`subject`"),
        ("call", "datediff(modified, creation) as date_diff"),
        ("injection", "issingle, IF(issingle=1, (select name from tabUser), count(name))"),
    ];

    for (name, field) in fields {
        group.bench_with_input(BenchmarkId::new("field", name), field, |b, s| {
            b.iter(|| sanitize(&[black_box(s)]))
        });
    }

    group.finish();
}

// =============================================================================
// Normalizer Benchmarks
// =============================================================================

fn bench_normalize(c: &mut Criterion) {
    let mut group = c.benchmark_group("normalize");
    let options = QueryOptions::default();

    let shapes = [
        ("mapping", FilterInput::from(json!({"subject": "Standup", "duration": [">", 30]}))),
        (
            "tuples",
            FilterInput::from(json!([
                ["subject", "like", "%standup%"],
                ["Event", "event_type", "in", "Public,Private"]
            ])),
        ),
        (
            "json_text",
            FilterInput::from(r#"{"starts_on": ["between", ["2016-07-06", "2016-07-07"]]}"#),
        ),
    ];

    for (name, input) in &shapes {
        group.bench_with_input(BenchmarkId::new("shape", name), input, |b, input| {
            b.iter(|| normalize("Event", black_box(input), &FilterInput::None, &options))
        });
    }

    group.finish();
}

// =============================================================================
// Assembly Benchmarks
// =============================================================================

fn event_query<D: doc_query::Dialect>(dialect: D) -> DatabaseQuery<D> {
    DatabaseQuery::new(dialect, "Event")
        .fields(["subject", "count(name) as total"])
        .filters(json!({
            "starts_on": ["between", ["2016-07-06", "2016-07-07"]],
            "event_type": ["not in", ["Private", "Cancelled"]]
        }))
        .or_filters(json!([["subject", "like", "%standup%"], ["duration", ">", 30]]))
        .group_by("subject")
        .order_by("subject asc")
}

fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("build");
    let ctx = ExecutionContext::new(&Schemas, &AllowAll, Actor::new("Administrator"));

    group.bench_function("minimal", |b| {
        let query = DatabaseQuery::new(Sqlite, "Event");
        b.iter(|| black_box(&query).build(&ctx))
    });

    group.bench_function("postgres_full", |b| {
        let query = event_query(Postgres);
        b.iter(|| black_box(&query).build(&ctx))
    });

    group.bench_function("sqlite_full", |b| {
        let query = event_query(Sqlite);
        b.iter(|| black_box(&query).build(&ctx))
    });

    group.bench_function("mariadb_child_join", |b| {
        let query = DatabaseQuery::new(MariaDb, "DocType")
            .fields(["name", "DocField.fieldname"])
            .filters(json!([["DocField", "fieldtype", "=", "Table"]]));
        b.iter(|| black_box(&query).build(&ctx))
    });

    group.finish();
}

fn bench_build_with_roles(c: &mut Criterion) {
    let mut group = c.benchmark_group("build_with_roles");
    let permissions = RolePermissions::from_toml_str(
        r#"
        [[rule]]
        role = "Desk User"
        entity = "Event"
        read = true
        if_owner = true

        [[restriction]]
        user = "test1@example.com"
        entity = "Event"
        field = "event_type"
        values = ["Public", "Private"]
        "#,
    )
    .expect("valid role rules");
    let actor = Actor::new("test1@example.com").with_roles(["Desk User"]);
    let ctx = ExecutionContext::new(&Schemas, &permissions, actor);

    group.bench_function("owner_and_restriction", |b| {
        let query = event_query(Postgres);
        b.iter(|| black_box(&query).build(&ctx))
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_sanitize,
    bench_normalize,
    bench_build,
    bench_build_with_roles,
);

criterion_main!(benches);

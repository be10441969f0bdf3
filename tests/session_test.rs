use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use dispatch_sync::batch::{DispatchTarget, SkipReason};
use dispatch_sync::guard::{DuplicateGuard, GuardError};
use dispatch_sync::ingest::{ExtractedFields, IngestionSource, MemoryIngestion};
use dispatch_sync::ledger::{Ledger, LedgerPatch, MemoryLedger};
use dispatch_sync::lifecycle::{DispatchClient, SessionConfig};
use dispatch_sync::model::{NewOrder, OrderRecord, OrderState, ProgressUpdate, RecordId};
use dispatch_sync::report::ReportReader;
use dispatch_sync::view::{Row, ViewClient, ViewKind};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn new_order(invoice_number: u64) -> NewOrder {
    NewOrder {
        invoice_number,
        client: format!("Cliente {invoice_number}"),
        address: "Av 68 # 22-10".to_string(),
        phone: "3001234567".to_string(),
        items: 3,
        value: 45_000,
        biller: "ana".to_string(),
        payment_method: "Credito".to_string(),
        notes: String::new(),
    }
}

fn record(invoice_number: u64, state: OrderState) -> OrderRecord {
    let created_at = Utc.with_ymd_and_hms(2024, 6, 3, 8, 0, 0).unwrap()
        + ChronoDuration::seconds(invoice_number as i64);
    let mut record = OrderRecord::invoiced(new_order(invoice_number), created_at);
    record.state = state;
    record
}

fn invoice_fields(invoice_number: u64) -> ExtractedFields {
    [
        ("invoice_number", invoice_number.to_string()),
        ("client", "Drogueria Alfa".to_string()),
        ("address", "Cl 45 # 13-20".to_string()),
        ("items", "2.00".to_string()),
        ("value", "$10,000.00".to_string()),
        ("biller", "ana".to_string()),
        ("payment_method", "Contado".to_string()),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}

async fn seed(ledger: &MemoryLedger, id: &str, record: &OrderRecord) -> RecordId {
    let id = RecordId::from(id);
    ledger.put(&id, record.to_value().unwrap()).await.unwrap();
    id
}

async fn connected(user: &str, ledger: &MemoryLedger) -> DispatchClient {
    let mut client = DispatchClient::new(SessionConfig::new(user)).unwrap();
    client.connect(Arc::new(ledger.clone()), None).await.unwrap();
    client
}

/// Polls `view` until `check` holds, for up to a second.
async fn wait_for_rows(
    client: &DispatchClient,
    view: ViewKind,
    check: impl Fn(&[Row]) -> bool,
) -> Vec<Row> {
    let mut rows = Vec::new();
    for _ in 0..100 {
        rows = client.rows(view).await.unwrap();
        if check(&rows) {
            return rows;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("{view} rows never settled: {} rows", rows.len());
}

fn ids(rows: &[Row]) -> Vec<RecordId> {
    let mut ids: Vec<RecordId> = rows.iter().map(|row| row.id.clone()).collect();
    ids.sort();
    ids
}

#[tokio::test]
async fn test_duplicate_invoice_inserted_once() {
    let ledger = MemoryLedger::spawn(32);
    let guard = DuplicateGuard::new(Arc::new(ledger.clone()));

    let inserted = guard.try_insert(new_order(1001)).await.unwrap();
    assert_eq!(inserted.record.state, OrderState::Invoiced);

    match guard.try_insert(new_order(1001)).await {
        Err(GuardError::DuplicateInvoice { invoice_number, existing }) => {
            assert_eq!(invoice_number, 1001);
            assert_eq!(existing, inserted.id);
        }
        other => panic!("expected a duplicate, got {other:?}"),
    }

    let reader = ReportReader::new(Arc::new(ledger));
    let found = reader.find_by_invoice(1001).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].0, inserted.id);
}

#[tokio::test]
async fn test_deleted_invoice_can_be_reissued() {
    let ledger = MemoryLedger::spawn(32);
    seed(&ledger, "old", &record(2002, OrderState::Deleted)).await;
    let guard = DuplicateGuard::new(Arc::new(ledger.clone()));

    guard.try_insert(new_order(2002)).await.unwrap();

    let found = ReportReader::new(Arc::new(ledger))
        .find_by_invoice(2002)
        .await
        .unwrap();
    assert_eq!(found.len(), 2);
}

#[tokio::test]
async fn test_dispatch_skips_deleted_record() {
    let ledger = MemoryLedger::spawn(32);
    let mut packed = record(1, OrderState::Packed);
    packed.courier = "pedro".to_string();
    let x = seed(&ledger, "x", &packed).await;
    let y = seed(&ledger, "y", &record(2, OrderState::Deleted)).await;
    let client = connected("despacho", &ledger).await;

    let outcome = client
        .dispatch(&[
            DispatchTarget::new(x.clone(), "Norte"),
            DispatchTarget::new(y.clone(), "Norte"),
        ])
        .await
        .unwrap();

    assert_eq!(outcome.applied, vec![x.clone()]);
    assert_eq!(outcome.skipped.len(), 1);
    assert_eq!(outcome.skipped[0].id, y);
    assert!(matches!(outcome.skipped[0].reason, SkipReason::Rejected(_)));

    let x_doc = ledger.read_child(&x).await.unwrap().unwrap();
    assert_eq!(x_doc["state"], json!(2));
    assert_eq!(x_doc["zone"], json!("Norte"));
    let y_doc = ledger.read_child(&y).await.unwrap().unwrap();
    assert_eq!(y_doc["state"], json!(-1));
    assert_eq!(y_doc["zone"], json!(""));

    wait_for_rows(&client, ViewKind::PackedPending, |rows| rows.is_empty()).await;
    client.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_dispatch_honors_configured_zones() {
    let ledger = MemoryLedger::spawn(32);
    let mut packed = record(3, OrderState::Packed);
    packed.courier = "pedro".to_string();
    let x = seed(&ledger, "x", &packed).await;
    let mut client = DispatchClient::new(SessionConfig::new("despacho").with_zones(["Centro"])).unwrap();
    client.connect(Arc::new(ledger.clone()), None).await.unwrap();

    let outcome = client.dispatch(&[DispatchTarget::new(x.clone(), "Norte")]).await.unwrap();
    assert!(outcome.applied.is_empty());
    assert_eq!(outcome.skipped[0].reason, SkipReason::UnknownZone("Norte".to_string()));
    assert_eq!(ledger.read_child(&x).await.unwrap().unwrap()["state"], json!(1));

    let outcome = client.dispatch(&[DispatchTarget::new(x.clone(), "Centro")]).await.unwrap();
    assert_eq!(outcome.applied, vec![x.clone()]);
    assert_eq!(ledger.read_child(&x).await.unwrap().unwrap()["zone"], json!("Centro"));
    client.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_pending_marked_in_place_then_removed_on_delete() {
    let ledger = MemoryLedger::spawn(32);
    let z = seed(&ledger, "z", &record(7, OrderState::Packed)).await;
    let client = connected("bodega", &ledger).await;
    wait_for_rows(&client, ViewKind::PackedPending, |rows| rows.len() == 1).await;

    let mut patch = LedgerPatch::new();
    patch.set(&z, "state", OrderState::Pending.code());
    ledger.patch_multiple(patch).await.unwrap();

    let rows = wait_for_rows(&client, ViewKind::PackedPending, |rows| {
        rows.len() == 1 && rows[0].is_pending()
    })
    .await;
    assert_eq!(rows[0].id, z);

    let mut patch = LedgerPatch::new();
    patch.set(&z, "state", OrderState::Deleted.code());
    ledger.patch_multiple(patch).await.unwrap();

    wait_for_rows(&client, ViewKind::PackedPending, |rows| rows.is_empty()).await;
    client.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_snapshot_fills_both_tables() {
    let ledger = MemoryLedger::spawn(128);
    for n in 0..30 {
        seed(&ledger, &format!("inv-{n:02}"), &record(100 + n, OrderState::Invoiced)).await;
    }
    for n in 0..20 {
        seed(&ledger, &format!("pak-{n:02}"), &record(200 + n, OrderState::Packed)).await;
    }
    seed(&ledger, "gone", &record(300, OrderState::Dispatched)).await;

    let client = connected("bodega", &ledger).await;

    let invoiced = wait_for_rows(&client, ViewKind::Invoiced, |rows| rows.len() == 30).await;
    let packed = wait_for_rows(&client, ViewKind::PackedPending, |rows| rows.len() == 20).await;
    assert!(invoiced.iter().all(|row| row.record.state == OrderState::Invoiced));
    assert!(packed.iter().all(|row| row.record.state == OrderState::Packed));

    client.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_changes_reach_every_client() {
    let ledger = MemoryLedger::spawn(64);
    let a = seed(&ledger, "a", &record(11, OrderState::Invoiced)).await;
    let b = seed(&ledger, "b", &record(12, OrderState::Invoiced)).await;
    let packing = connected("empaque", &ledger).await;
    let desk = connected("despacho", &ledger).await;
    wait_for_rows(&desk, ViewKind::Invoiced, |rows| rows.len() == 2).await;

    let progress = ProgressUpdate::default()
        .with_packer("luis")
        .with_packages(1, 2, 0);
    packing.pack(&a, &progress).await.unwrap();

    for client in [&packing, &desk] {
        let rows = wait_for_rows(client, ViewKind::PackedPending, |rows| rows.len() == 1).await;
        assert_eq!(rows[0].id, a);
        assert_eq!(rows[0].record.packer, "luis");
        assert_eq!(rows[0].record.bags, 2);
        let invoiced = wait_for_rows(client, ViewKind::Invoiced, |rows| rows.len() == 1).await;
        assert_eq!(ids(&invoiced), vec![b.clone()]);
    }

    packing.shutdown().await.unwrap();
    desk.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_refresh_replaces_table_contents() {
    let ledger = MemoryLedger::spawn(64);
    let client = connected("caja", &ledger).await;
    wait_for_rows(&client, ViewKind::Invoiced, |rows| rows.is_empty()).await;

    // Invoice pushes are not routed to the invoiced table; only a refresh shows them.
    let id = ledger.insert(record(501, OrderState::Invoiced)).await.unwrap();
    assert_eq!(client.refresh_invoiced().await.unwrap(), 1);

    let rows = client.rows(ViewKind::Invoiced).await.unwrap();
    assert_eq!(ids(&rows), vec![id]);
    client.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_rows_frozen_after_disconnect() {
    let ledger = MemoryLedger::spawn(64);
    let p = seed(&ledger, "p", &record(21, OrderState::Packed)).await;
    let mut client = connected("bodega", &ledger).await;
    wait_for_rows(&client, ViewKind::PackedPending, |rows| rows.len() == 1).await;

    client.disconnect().await.unwrap();

    seed(&ledger, "q", &record(22, OrderState::Packed)).await;
    let mut patch = LedgerPatch::new();
    patch.set(&p, "state", OrderState::Dispatched.code());
    ledger.patch_multiple(patch).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let rows = client.rows(ViewKind::PackedPending).await.unwrap();
    assert_eq!(ids(&rows), vec![p]);

    client.connect(Arc::new(ledger.clone()), None).await.unwrap();
    let rows = wait_for_rows(&client, ViewKind::PackedPending, |rows| {
        rows.len() == 1 && rows[0].id.as_str() == "q"
    })
    .await;
    assert_eq!(rows[0].record.invoice_number, 22);
    client.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_closed_generation_commands_discarded() {
    let (views, consumer) = ViewClient::spawn(16);
    let generation = views.next_generation();
    views.open(generation).await.unwrap();
    let late = views.handle(generation);
    views.close(generation).await.unwrap();

    late.insert(
        ViewKind::PackedPending,
        RecordId::from("late"),
        record(31, OrderState::Packed),
    )
    .await
    .unwrap();

    let next = views.next_generation();
    views.open(next).await.unwrap();
    views
        .handle(next)
        .insert(
            ViewKind::PackedPending,
            RecordId::from("fresh"),
            record(32, OrderState::Packed),
        )
        .await
        .unwrap();

    let rows = views.rows(ViewKind::PackedPending).await.unwrap();
    assert_eq!(ids(&rows), vec![RecordId::from("fresh")]);

    drop(late);
    drop(views);
    consumer.await.unwrap();
}

#[tokio::test]
async fn test_ingestion_consumes_valid_documents_once() {
    let ledger = MemoryLedger::spawn(64);
    let source = Arc::new(MemoryIngestion::new());
    source.add("a.pdf", invoice_fields(1001));
    source.add("b.pdf", invoice_fields(1001));
    source.add("c.pdf", invoice_fields(1002));
    let mut broken = invoice_fields(1003);
    broken.insert("value".to_string(), "abc".to_string());
    source.add("d.pdf", broken);

    let config = SessionConfig::new("caja")
        .with_ingest(true)
        .with_poll_interval(Duration::from_millis(20));
    let mut client = DispatchClient::new(config).unwrap();
    let ingestion: Arc<dyn IngestionSource> = source.clone();
    client
        .connect(Arc::new(ledger.clone()), Some(ingestion))
        .await
        .unwrap();

    let rows = wait_for_rows(&client, ViewKind::Invoiced, |rows| rows.len() == 2).await;
    let mut numbers: Vec<u64> = rows.iter().map(|row| row.record.invoice_number).collect();
    numbers.sort();
    assert_eq!(numbers, vec![1001, 1002]);

    let invalid_only = vec!["d.pdf".to_string()];
    for _ in 0..100 {
        if source.remaining() == invalid_only {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(source.remaining(), invalid_only);

    let reader = client.reports().unwrap();
    assert_eq!(reader.find_by_invoice(1001).await.unwrap().len(), 1);
    assert!(reader.find_by_invoice(1003).await.unwrap().is_empty());

    client.shutdown().await.unwrap();
}

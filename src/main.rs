//! Demo run: a billing desk and a dispatch desk sharing one in-process ledger.
//!
//! 1. The billing desk ingests three invoices (one of them twice).
//! 2. The dispatch desk packs two orders and marks one pending.
//! 3. The pending order is released and both are dispatched.
//! 4. Both clients disconnect.

use dispatch_sync::batch::DispatchTarget;
use dispatch_sync::ingest::{ExtractedFields, IngestionSource, MemoryIngestion};
use dispatch_sync::ledger::{Ledger, MemoryLedger};
use dispatch_sync::lifecycle::{setup_tracing, DispatchClient, SessionConfig, SessionError};
use dispatch_sync::model::{OrderState, ProgressUpdate};
use dispatch_sync::view::ViewKind;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, Instrument};

fn invoice(number: &str, client: &str, value: &str) -> ExtractedFields {
    [
        ("invoice_number", number),
        ("client", client),
        ("address", "Cra 15 # 80-20"),
        ("phone", "6015550000"),
        ("items", "4.00"),
        ("value", value),
        ("biller", "ana"),
        ("payment_method", "Contado"),
    ]
    .iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

async fn log_tables(name: &str, client: &DispatchClient) -> Result<(), SessionError> {
    for view in [ViewKind::Invoiced, ViewKind::PackedPending] {
        let rows = client.rows(view).await?;
        let pending = rows.iter().filter(|row| row.is_pending()).count();
        info!(client = name, %view, rows = rows.len(), pending, "Table");
    }
    Ok(())
}

/// Polls until `view` holds `expected` rows, giving up after a second.
async fn settle(client: &DispatchClient, view: ViewKind, expected: usize) -> Result<(), SessionError> {
    for _ in 0..50 {
        if client.rows(view).await?.len() == expected {
            return Ok(());
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), SessionError> {
    setup_tracing();
    info!("Starting dispatch demo");

    let ledger: Arc<dyn Ledger> = Arc::new(MemoryLedger::spawn(64));
    let source = Arc::new(MemoryIngestion::new());
    source.add("rem-1001.pdf", invoice("1001", "Drogueria Alfa", "$120,500.00"));
    source.add("rem-1002.pdf", invoice("1002", "Ferreteria Sur", "$89,000.00"));
    source.add("rem-1002-copy.pdf", invoice("1002", "Ferreteria Sur", "$89,000.00"));
    source.add("rem-1003.pdf", invoice("1003", "Papeleria Sol", "$15,750.00"));

    let billing_config = SessionConfig::new("billing")
        .with_ingest(true)
        .with_poll_interval(Duration::from_millis(100));
    let mut billing = DispatchClient::new(billing_config)?;
    let mut desk = DispatchClient::new(SessionConfig::new("dispatch"))?;

    let ingestion: Arc<dyn IngestionSource> = source.clone();
    billing.connect(ledger.clone(), Some(ingestion)).await?;
    desk.connect(ledger.clone(), None).await?;

    settle(&billing, ViewKind::Invoiced, 3).await?;
    info!(remaining = source.remaining().len(), "Ingestion done");

    // The dispatch desk only sees new invoices after a refresh.
    desk.refresh_invoiced().await?;
    let invoiced = desk.rows(ViewKind::Invoiced).await?;

    let Some(first) = invoiced.first().map(|row| row.id.clone()) else {
        info!("Nothing invoiced, skipping packing round");
        billing.shutdown().await?;
        desk.shutdown().await?;
        return Ok(());
    };

    async {
        for row in invoiced.iter().take(2) {
            let progress = ProgressUpdate::default()
                .with_packer("luis")
                .with_courier("pedro")
                .with_packages(2, 1, 0);
            desk.pack(&row.id, &progress).await?;
        }
        settle(&desk, ViewKind::PackedPending, 2).await?;

        desk.mark_pending(&[first.clone()]).await?;
        tokio::time::sleep(Duration::from_millis(50)).await;
        log_tables("dispatch", &desk).await?;

        desk.release(&[first]).await?;
        let targets: Vec<DispatchTarget> = invoiced
            .iter()
            .take(2)
            .map(|row| DispatchTarget::new(row.id.clone(), "Norte"))
            .collect();
        let outcome = desk.dispatch(&targets).await?;
        info!(applied = outcome.applied.len(), skipped = outcome.skipped.len(), "Dispatch round");
        Ok::<_, SessionError>(())
    }
    .instrument(tracing::info_span!("packing"))
    .await?;

    settle(&desk, ViewKind::PackedPending, 0).await?;
    log_tables("billing", &billing).await?;
    log_tables("dispatch", &desk).await?;

    let dispatched = desk
        .reports()?
        .read_by_states(&[OrderState::Dispatched])
        .await?;
    info!(dispatched = dispatched.len(), "Report ready");

    billing.shutdown().await?;
    desk.shutdown().await?;

    info!("Demo completed");
    Ok(())
}

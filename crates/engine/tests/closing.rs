use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use sea_orm::{Database, DatabaseConnection};

use engine::{
    ClosingStatus, Engine, EngineError, EntryType, MoneyCents, PostEntryCmd, StartClosingCmd,
};
use migration::MigratorTrait;

const FY: &str = "2024-25";

async fn engine_with_db() -> (Engine, DatabaseConnection) {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let engine = Engine::builder()
        .database(db.clone())
        .build()
        .await
        .unwrap();
    (engine, db)
}

fn cents(value: &str) -> MoneyCents {
    value.parse().unwrap()
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

async fn post(
    engine: &Engine,
    scope: &str,
    entry_type: EntryType,
    amount: &str,
    pnr: Option<&str>,
) {
    let mut cmd = PostEntryCmd::new(scope, FY, entry_type, cents(amount), "REF", "alice");
    if let Some(pnr) = pnr {
        cmd = cmd.pnr_id(pnr);
    }
    engine.post_entry(cmd).await.unwrap();
}

/// Book: C1 owes 600, C2 holds a 250 advance, C3 settled to zero.
async fn seed_book(engine: &Engine) {
    post(engine, "C1", EntryType::Debit, "1000.00", Some("PNR1")).await;
    post(engine, "C1", EntryType::Credit, "400.00", Some("PNR2")).await;
    post(engine, "C2", EntryType::Credit, "250.00", Some("PNR3")).await;
    post(engine, "C3", EntryType::Debit, "120.00", Some("PNR4")).await;
    post(engine, "C3", EntryType::Credit, "120.00", Some("PNR4")).await;
}

#[tokio::test]
async fn start_closing_aggregates_the_book_into_a_draft() {
    let (engine, _db) = engine_with_db().await;
    seed_book(&engine).await;

    let snapshot = engine
        .start_closing(StartClosingCmd::new(FY, today(), "alice").remarks("year end"))
        .await
        .unwrap();

    assert_eq!(snapshot.status, ClosingStatus::Draft);
    assert_eq!(snapshot.total_pending_receivables, cents("600.00"));
    assert_eq!(snapshot.total_advance_balance, cents("250.00"));
    assert_eq!(snapshot.total_customers_with_outstanding, 2);
    // PNR4 belongs to the settled scope and is not pending.
    assert_eq!(snapshot.total_pending_items, 3);
    assert!(snapshot.finalized_at.is_none());
    assert!(snapshot.carried_forward_at.is_none());
}

#[tokio::test]
async fn closing_date_cuts_off_later_postings() {
    let (engine, _db) = engine_with_db().await;
    seed_book(&engine).await;

    let last_year = today() - chrono::Days::new(365);
    let snapshot = engine
        .start_closing(StartClosingCmd::new(FY, last_year, "alice"))
        .await
        .unwrap();

    // Everything in the book postdates the cutoff.
    assert_eq!(snapshot.total_pending_receivables, MoneyCents::ZERO);
    assert_eq!(snapshot.total_advance_balance, MoneyCents::ZERO);
    assert_eq!(snapshot.total_customers_with_outstanding, 0);
    assert_eq!(snapshot.total_pending_items, 0);
}

#[tokio::test]
async fn one_closing_per_financial_year() {
    let (engine, _db) = engine_with_db().await;
    seed_book(&engine).await;

    engine
        .start_closing(StartClosingCmd::new(FY, today(), "alice"))
        .await
        .unwrap();
    let err = engine
        .start_closing(StartClosingCmd::new(FY, today(), "alice"))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::State(_)));
}

#[tokio::test]
async fn finalize_only_from_draft() {
    let (engine, _db) = engine_with_db().await;
    seed_book(&engine).await;

    engine
        .start_closing(StartClosingCmd::new(FY, today(), "alice"))
        .await
        .unwrap();

    let finalized = engine.finalize(FY).await.unwrap();
    assert_eq!(finalized.status, ClosingStatus::Finalized);
    assert!(finalized.finalized_at.is_some());
    // The aggregates are frozen as computed at start.
    assert_eq!(finalized.total_pending_receivables, cents("600.00"));

    let err = engine.finalize(FY).await.unwrap_err();
    assert!(matches!(err, EngineError::State(_)));
}

#[tokio::test]
async fn carry_forward_seeds_next_year_openings() {
    let (engine, _db) = engine_with_db().await;
    seed_book(&engine).await;

    engine
        .start_closing(StartClosingCmd::new(FY, today(), "alice"))
        .await
        .unwrap();
    engine.finalize(FY).await.unwrap();
    let carried = engine.carry_forward(FY, "alice").await.unwrap();
    assert_eq!(carried.status, ClosingStatus::CarryForwarded);
    assert!(carried.carried_forward_at.is_some());

    // Receivable rolls forward as a debit opening at zero.
    let c1 = engine.entries_for_scope("C1", "2025-26").await.unwrap();
    assert_eq!(c1.len(), 1);
    assert_eq!(c1[0].entry_type, EntryType::Debit);
    assert_eq!(c1[0].entry_ref, "CF-2024-25");
    assert_eq!(c1[0].opening_balance, MoneyCents::ZERO);
    assert_eq!(c1[0].closing_balance, cents("600.00"));

    // Advance rolls forward as a credit.
    let c2 = engine.entries_for_scope("C2", "2025-26").await.unwrap();
    assert_eq!(c2[0].entry_type, EntryType::Credit);
    assert_eq!(c2[0].closing_balance, cents("-250.00"));

    // Settled scopes get nothing.
    assert!(engine
        .entries_for_scope("C3", "2025-26")
        .await
        .unwrap()
        .is_empty());

    // The closed year's streams are untouched.
    assert_eq!(
        engine.scope_balance("C1", FY).await.unwrap(),
        cents("600.00")
    );
}

#[tokio::test]
async fn carry_forward_needs_finalized_and_runs_once() {
    let (engine, _db) = engine_with_db().await;
    seed_book(&engine).await;

    let err = engine.carry_forward(FY, "alice").await.unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));

    engine
        .start_closing(StartClosingCmd::new(FY, today(), "alice"))
        .await
        .unwrap();
    let err = engine.carry_forward(FY, "alice").await.unwrap_err();
    assert!(matches!(err, EngineError::State(_)));

    engine.finalize(FY).await.unwrap();
    engine.carry_forward(FY, "alice").await.unwrap();

    // A second run would double the openings; it must fail instead.
    let err = engine.carry_forward(FY, "alice").await.unwrap_err();
    assert!(matches!(err, EngineError::State(_)));
    let c1 = engine.entries_for_scope("C1", "2025-26").await.unwrap();
    assert_eq!(c1.len(), 1);
}

#[tokio::test]
async fn carry_forward_rejects_a_ledger_that_moved_behind_the_snapshot() {
    let (engine, _db) = engine_with_db().await;
    post(&engine, "C1", EntryType::Debit, "600.00", Some("PNR1")).await;

    let snapshot = engine
        .start_closing(StartClosingCmd::new(FY, today(), "alice"))
        .await
        .unwrap();
    assert_eq!(snapshot.total_pending_receivables, cents("600.00"));

    // Dated within the cutoff, but invisible to the frozen aggregates.
    post(&engine, "C1", EntryType::Debit, "100.00", None).await;

    engine.finalize(FY).await.unwrap();
    let err = engine.carry_forward(FY, "alice").await.unwrap_err();
    assert!(matches!(err, EngineError::State(_)));

    // Nothing was seeded into the next year.
    assert!(engine
        .entries_for_scope("C1", "2025-26")
        .await
        .unwrap()
        .is_empty());
    // The frozen snapshot is untouched.
    let snapshot = engine.snapshot(FY).await.unwrap();
    assert_eq!(snapshot.status, ClosingStatus::Finalized);
    assert_eq!(snapshot.total_pending_receivables, cents("600.00"));
}

#[tokio::test]
async fn aggregation_reads_a_consistent_cut_under_concurrent_postings() {
    let (engine, _db) = engine_with_db().await;
    post(&engine, "C1", EntryType::Debit, "10.00", None).await;
    let engine = Arc::new(engine);

    let mut posters = Vec::new();
    for _ in 0..5 {
        let engine = Arc::clone(&engine);
        posters.push(tokio::spawn(async move {
            engine
                .post_entry(PostEntryCmd::new(
                    "C1",
                    FY,
                    EntryType::Debit,
                    cents("10.00"),
                    "REF",
                    "alice",
                ))
                .await
        }));
    }
    let closer = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move {
            engine
                .start_closing(StartClosingCmd::new(FY, today(), "alice"))
                .await
        })
    };

    for poster in posters {
        // A posting may lose against the closing gate, but only with a
        // retryable conflict, never a torn write.
        match poster.await.unwrap() {
            Ok(_) => {}
            Err(err) => assert!(err.is_retryable()),
        }
    }
    closer.await.unwrap().unwrap();

    // Whatever instant the aggregation ran at, it saw a whole number of
    // committed postings, never half of one.
    let snapshot = engine.snapshot(FY).await.unwrap();
    let receivables = snapshot.total_pending_receivables.cents();
    assert_eq!(receivables % 1000, 0);
    assert!((1000..=6000).contains(&receivables));
}

#[tokio::test]
async fn full_year_cycle_from_posting_to_carry_forward() {
    let (engine, _db) = engine_with_db().await;

    post(&engine, "ACC-1", EntryType::Debit, "1000.00", Some("PNR1")).await;
    post(&engine, "ACC-1", EntryType::Credit, "400.00", None).await;
    engine
        .create_contra(engine::CreateContraCmd::new(
            "ACC-1",
            "ACC-2",
            FY,
            today(),
            cents("250.00"),
            "transfer",
            "alice",
        ))
        .await
        .unwrap();

    assert_eq!(
        engine.scope_balance("ACC-1", FY).await.unwrap(),
        cents("350.00")
    );
    assert_eq!(
        engine.scope_balance("ACC-2", FY).await.unwrap(),
        cents("250.00")
    );

    engine
        .start_closing(StartClosingCmd::new(FY, today(), "alice"))
        .await
        .unwrap();
    engine.finalize(FY).await.unwrap();
    engine.carry_forward(FY, "alice").await.unwrap();

    let acc1 = engine.entries_for_scope("ACC-1", "2025-26").await.unwrap();
    assert_eq!(acc1.len(), 1);
    assert_eq!(acc1[0].opening_balance, MoneyCents::ZERO);
    assert_eq!(acc1[0].closing_balance, cents("350.00"));

    let acc2 = engine.entries_for_scope("ACC-2", "2025-26").await.unwrap();
    assert_eq!(acc2[0].closing_balance, cents("250.00"));
}

#[tokio::test]
async fn snapshots_are_kept_for_audit() {
    let (engine, _db) = engine_with_db().await;
    seed_book(&engine).await;

    let err = engine.snapshot(FY).await.unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));

    engine
        .start_closing(StartClosingCmd::new(FY, today(), "alice"))
        .await
        .unwrap();

    let err = engine.delete_snapshot(FY).unwrap_err();
    assert!(matches!(err, EngineError::Integrity(_)));

    let snapshots = engine.list_snapshots().await.unwrap();
    assert_eq!(snapshots.len(), 1);
    assert_eq!(snapshots[0].financial_year, FY);
}

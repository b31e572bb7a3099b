use std::sync::Arc;

use sea_orm::{Database, DatabaseConnection};

use engine::{Engine, EngineError, EntryType, MoneyCents, PostEntryCmd};
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

#[tokio::test]
async fn first_entry_opens_at_zero() {
    let (engine, _db) = engine_with_db().await;

    let entry = engine
        .post_entry(PostEntryCmd::new(
            "CUST-001",
            FY,
            EntryType::Debit,
            cents("1000.00"),
            "INV-1",
            "alice",
        ))
        .await
        .unwrap();

    assert_eq!(entry.opening_balance, MoneyCents::ZERO);
    assert_eq!(entry.closing_balance, cents("1000.00"));
    assert_eq!(entry.amount, MoneyCents::new(100_000));
}

#[tokio::test]
async fn debit_then_credit_chains_balances() {
    let (engine, _db) = engine_with_db().await;

    engine
        .post_entry(PostEntryCmd::new(
            "CUST-001",
            FY,
            EntryType::Debit,
            cents("1000.00"),
            "INV-1",
            "alice",
        ))
        .await
        .unwrap();
    let payment = engine
        .post_entry(
            PostEntryCmd::new(
                "CUST-001",
                FY,
                EntryType::Credit,
                cents("400.00"),
                "PAY-1",
                "alice",
            )
            .payment_id("PAY-1")
            .remarks("part payment"),
        )
        .await
        .unwrap();

    assert_eq!(payment.opening_balance, cents("1000.00"));
    assert_eq!(payment.closing_balance, cents("600.00"));

    let balance = engine.scope_balance("CUST-001", FY).await.unwrap();
    assert_eq!(balance, cents("600.00"));
}

#[tokio::test]
async fn balance_can_go_negative_as_advance() {
    let (engine, _db) = engine_with_db().await;

    let advance = engine
        .post_entry(PostEntryCmd::new(
            "CUST-002",
            FY,
            EntryType::Credit,
            cents("250.00"),
            "PAY-9",
            "alice",
        ))
        .await
        .unwrap();

    assert_eq!(advance.closing_balance, cents("-250.00"));
    assert!(advance.closing_balance.is_negative());
}

#[tokio::test]
async fn rejects_invalid_commands() {
    let (engine, _db) = engine_with_db().await;

    let err = engine
        .post_entry(PostEntryCmd::new(
            "CUST-001",
            FY,
            EntryType::Debit,
            MoneyCents::ZERO,
            "INV-1",
            "alice",
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));

    let err = engine
        .post_entry(PostEntryCmd::new(
            "   ",
            FY,
            EntryType::Debit,
            cents("10.00"),
            "INV-1",
            "alice",
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));

    let err = engine
        .post_entry(PostEntryCmd::new(
            "CUST-001",
            "2024/25",
            EntryType::Debit,
            cents("10.00"),
            "INV-1",
            "alice",
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));
}

#[tokio::test]
async fn streams_are_isolated_per_scope_and_year() {
    let (engine, _db) = engine_with_db().await;

    engine
        .post_entry(PostEntryCmd::new(
            "CUST-001",
            "2024-25",
            EntryType::Debit,
            cents("100.00"),
            "INV-1",
            "alice",
        ))
        .await
        .unwrap();
    engine
        .post_entry(PostEntryCmd::new(
            "CUST-001",
            "2025-26",
            EntryType::Debit,
            cents("40.00"),
            "INV-2",
            "alice",
        ))
        .await
        .unwrap();
    engine
        .post_entry(PostEntryCmd::new(
            "CUST-002",
            "2024-25",
            EntryType::Debit,
            cents("7.50"),
            "INV-3",
            "alice",
        ))
        .await
        .unwrap();

    assert_eq!(
        engine.scope_balance("CUST-001", "2024-25").await.unwrap(),
        cents("100.00")
    );
    assert_eq!(
        engine.scope_balance("CUST-001", "2025-26").await.unwrap(),
        cents("40.00")
    );
    assert_eq!(
        engine.scope_balance("CUST-002", "2024-25").await.unwrap(),
        cents("7.50")
    );
    // The next-year entry opened at zero, not at last year's closing.
    let next_year = engine
        .entries_for_scope("CUST-001", "2025-26")
        .await
        .unwrap();
    assert_eq!(next_year[0].opening_balance, MoneyCents::ZERO);
}

#[tokio::test]
async fn delete_is_always_refused() {
    let (engine, _db) = engine_with_db().await;

    let entry = engine
        .post_entry(PostEntryCmd::new(
            "CUST-001",
            FY,
            EntryType::Debit,
            cents("10.00"),
            "INV-1",
            "alice",
        ))
        .await
        .unwrap();

    let err = engine.delete_entry(entry.id).unwrap_err();
    assert!(matches!(err, EngineError::Integrity(_)));

    // The row is still there.
    let reread = engine.ledger_entry(entry.id).await.unwrap();
    assert_eq!(reread, entry);
}

#[tokio::test]
async fn concurrent_postings_keep_the_chain_intact() {
    let (engine, _db) = engine_with_db().await;
    let engine = Arc::new(engine);

    let mut handles = Vec::new();
    for i in 0..10u32 {
        let engine = Arc::clone(&engine);
        handles.push(tokio::spawn(async move {
            engine
                .post_entry(PostEntryCmd::new(
                    "CUST-001",
                    FY,
                    EntryType::Debit,
                    MoneyCents::new(1_000),
                    format!("INV-{i}"),
                    "alice",
                ))
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let entries = engine.entries_for_scope("CUST-001", FY).await.unwrap();
    assert_eq!(entries.len(), 10);
    let mut previous = MoneyCents::ZERO;
    for entry in &entries {
        assert_eq!(entry.opening_balance, previous);
        previous = entry.closing_balance;
    }
    assert_eq!(previous, MoneyCents::new(10_000));
}

#[tokio::test]
async fn entry_serializes_with_coded_type_and_minor_units() {
    let (engine, _db) = engine_with_db().await;

    let entry = engine
        .post_entry(
            PostEntryCmd::new(
                "CUST-001",
                FY,
                EntryType::Debit,
                cents("1000.00"),
                "INV-1",
                "alice",
            )
            .pnr_id("PNR123"),
        )
        .await
        .unwrap();

    let json = serde_json::to_value(&entry).unwrap();
    assert_eq!(json["entry_type"], "DEBIT");
    assert_eq!(json["amount"], 100_000);
    assert_eq!(json["closing_balance"], 100_000);
    assert_eq!(json["pnr_id"], "PNR123");
}

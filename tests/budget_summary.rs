#![allow(clippy::unwrap_used, clippy::expect_used)]

mod util;

use rust_decimal::Decimal;

use daybook_lib::model::{BudgetCategory, Classification, Expense};
use daybook_lib::store::StoreHandle;
use daybook_lib::time::MonthKey;
use daybook_lib::Orchestrator;

use util::date;

fn month(key: &str) -> MonthKey {
    key.parse().unwrap()
}

#[tokio::test]
async fn spending_is_measured_against_category_limits() {
    let orchestrator = Orchestrator::builder(StoreHandle::in_memory()).start();
    let groceries = BudgetCategory::new("Groceries", Decimal::from(300), Classification::Needs);
    let fun = BudgetCategory::new("Fun", Decimal::from(200), Classification::Wants);
    orchestrator.add(groceries.clone()).await.unwrap();
    orchestrator.add(fun.clone()).await.unwrap();

    for expense in [
        Expense::new("Market", Decimal::from(100), groceries.clone(), date(2024, 3, 2)),
        Expense::new("Cinema", Decimal::from(50), fun.clone(), date(2024, 3, 20)),
        Expense::new("Bakery", Decimal::from(40), groceries.clone(), date(2024, 4, 1)),
    ] {
        orchestrator.add(expense).await.unwrap();
    }

    let march = orchestrator.month_summary(month("2024-03")).await.unwrap();
    assert_eq!(march.total_budget, Decimal::from(500));
    assert_eq!(march.total_spent, Decimal::from(150));
    assert_eq!(march.remaining, Decimal::from(350));
    assert_eq!(march.spent_percentage, Decimal::from(30));
    assert_eq!(march.by_category[&groceries.id], Decimal::from(100));
    assert_eq!(march.by_category[&fun.id], Decimal::from(50));
    assert_eq!(
        march.by_classification[&Classification::Wants],
        Decimal::from(50)
    );

    let april = orchestrator.month_summary(month("2024-04")).await.unwrap();
    assert_eq!(april.total_spent, Decimal::from(40));
}

#[tokio::test]
async fn expenses_keep_the_category_snapshot_they_were_saved_with() {
    let orchestrator = Orchestrator::builder(StoreHandle::in_memory()).start();
    let transport = BudgetCategory::new("Transport", Decimal::from(120), Classification::Needs);
    orchestrator.add(transport.clone()).await.unwrap();
    let ticket = Expense::new("Train", Decimal::from(30), transport.clone(), date(2024, 5, 5));
    orchestrator.add(ticket.clone()).await.unwrap();

    let mut renamed = transport.clone();
    renamed.name = "Travel".into();
    renamed.classification = Classification::Wants;
    assert!(orchestrator.update(renamed).await.unwrap());

    let stored = orchestrator.get::<Expense>(ticket.id).await.unwrap().unwrap();
    assert_eq!(stored.category.name, "Transport");

    let may = orchestrator.month_summary(month("2024-05")).await.unwrap();
    assert_eq!(
        may.by_classification.get(&Classification::Needs),
        Some(&Decimal::from(30))
    );
    assert!(!may.by_classification.contains_key(&Classification::Wants));
}

#[tokio::test]
async fn over_budget_month_goes_negative() {
    let orchestrator = Orchestrator::builder(StoreHandle::in_memory()).start();
    let dining = BudgetCategory::new("Dining", Decimal::from(80), Classification::Wants);
    orchestrator.add(dining.clone()).await.unwrap();
    orchestrator
        .add(Expense::new(
            "Birthday dinner",
            Decimal::new(10050, 2),
            dining,
            date(2024, 8, 9),
        ))
        .await
        .unwrap();

    let august = orchestrator.month_summary(month("2024-08")).await.unwrap();
    assert_eq!(august.remaining, Decimal::new(-2050, 2));
    assert!(august.spent_percentage > Decimal::ONE_HUNDRED);
}

#[tokio::test]
async fn month_without_budget_reports_zero_percent() {
    let orchestrator = Orchestrator::builder(StoreHandle::in_memory()).start();
    let misc = BudgetCategory::new("Misc", Decimal::ZERO, Classification::Wants);
    orchestrator
        .add(Expense::new("Stamp", Decimal::from(2), misc, date(2024, 8, 1)))
        .await
        .unwrap();

    let august = orchestrator.month_summary(month("2024-08")).await.unwrap();
    assert_eq!(august.total_budget, Decimal::ZERO);
    assert_eq!(august.total_spent, Decimal::from(2));
    assert_eq!(august.spent_percentage, Decimal::ZERO);
}

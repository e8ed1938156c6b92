//! Save a small table to disk and load it back using the core API.

use chrono::NaiveDate;
use columnar_table_core::store::TableStore;
use columnar_table_core::table::{Column, ColumnData, Table};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let days: Vec<NaiveDate> = (1..=4)
        .map(|d| NaiveDate::from_ymd_opt(2026, 8, d).expect("valid date"))
        .collect();

    let table = Table::with_columns(
        "Daily Prices",
        vec![
            Column::new("day", ColumnData::Date(days)),
            Column::new(
                "close",
                ColumnData::Float64(vec![101.5, 99.25, 103.0, 102.75]),
            ),
            Column::new(
                "venue",
                ColumnData::ShortText(
                    ["NYSE", "NYSE", "NASDAQ", "NYSE"]
                        .into_iter()
                        .map(String::from)
                        .collect(),
                ),
            ),
            Column::new(
                "halted",
                ColumnData::Boolean(vec![Some(false), Some(false), None, Some(false)]),
            ),
        ],
    )?;

    let store = TableStore::new();
    let path = store.save("demo-tables", &table)?;
    println!("saved to {}", path.display());

    let restored = store.load(&path)?;
    assert_eq!(restored, table);
    println!(
        "loaded '{}' back: {} columns, {} rows",
        restored.name(),
        restored.column_count(),
        restored.row_count()
    );

    Ok(())
}

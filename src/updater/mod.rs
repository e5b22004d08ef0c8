//! Decides whether a workbook's price history is stale and appends the next
//! dated row when it is.
//!
//! A workbook carries two sheets:
//! - `Products`: a header row, then one product per row with the name in
//!   column A and the lookup code in column B.
//! - `Prices`: a header row, then one row per update with the date in column
//!   A, one average price per product from column B onwards, and the currency
//!   rate in a fixed column.
//!
//! Rows are only ever appended, never rewritten.

pub mod column;
pub mod date;

use anyhow::{Context, Result, anyhow};
use chrono::NaiveDateTime;
use tracing::{debug, warn};
use umya_spreadsheet::{Spreadsheet, Worksheet};

use crate::core::{CurrencyRateProvider, PriceProvider, Product};
use date::{from_excel_serial, hours_between, parse_text_date, to_excel_serial};

pub const PRODUCTS_SHEET: &str = "Products";
pub const PRICES_SHEET: &str = "Prices";
pub const DATE_FORMAT_CODE: &str = "dd/mm/yyyy";

const FIRST_DATA_ROW: u32 = 2;
const DATE_COLUMN: u32 = 1;
const NAME_COLUMN: u32 = 1;
const CODE_COLUMN: u32 = 2;
const FIRST_PRICE_COLUMN: u32 = 2;

#[derive(Debug, Clone)]
pub struct UpdateContext {
    pub now: NaiveDateTime,
    pub interval_hours: u32,
    /// 1-based index of the column receiving the currency rate
    pub usd_column: u32,
    pub currency: String,
    pub base_currency: String,
}

/// Where the next row goes and whether it is due.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Staleness {
    pub insertion_row: u32,
    pub last_update: Option<NaiveDateTime>,
    pub hours_since: Option<i64>,
    pub stale: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowUpdate {
    pub staleness: Staleness,
    pub rows_updated: u32,
}

fn sheet<'a>(book: &'a Spreadsheet, name: &str) -> Result<&'a Worksheet> {
    book.get_sheet_by_name(name)
        .ok_or_else(|| anyhow!("Workbook has no '{name}' sheet"))
}

fn cell_text(sheet: &Worksheet, column: u32, row: u32) -> String {
    sheet
        .get_cell((column, row))
        .map(|cell| cell.get_value().trim().to_string())
        .unwrap_or_default()
}

// A cell holding only spaces still counts as a written row.
fn is_blank(sheet: &Worksheet, column: u32, row: u32) -> bool {
    sheet
        .get_cell((column, row))
        .is_none_or(|cell| cell.get_value().is_empty())
}

/// Reads the product list in sheet order. Rows without a code are skipped; a
/// repeated code keeps its first position and takes the later name.
pub fn read_products(book: &Spreadsheet) -> Result<Vec<Product>> {
    let sheet = sheet(book, PRODUCTS_SHEET)?;
    let mut products: Vec<Product> = Vec::new();

    for row in FIRST_DATA_ROW..=sheet.get_highest_row() {
        let code = cell_text(sheet, CODE_COLUMN, row);
        if code.is_empty() {
            continue;
        }
        let name = cell_text(sheet, NAME_COLUMN, row);

        match products.iter_mut().find(|p| p.code == code) {
            Some(existing) => existing.name = name,
            None => products.push(Product::new(name, code)),
        }
    }

    debug!(count = products.len(), "Read products");
    Ok(products)
}

fn read_date(sheet: &Worksheet, row: u32) -> Option<NaiveDateTime> {
    let cell = sheet.get_cell((DATE_COLUMN, row))?;
    let parsed = cell
        .get_value_number()
        .and_then(from_excel_serial)
        .or_else(|| parse_text_date(&cell.get_value()));

    if parsed.is_none() {
        warn!(
            row,
            value = %cell.get_value(),
            "Unreadable date in {PRICES_SHEET} sheet, treating it as stale"
        );
    }
    parsed
}

/// Finds the first empty row of the `Prices` date column and checks the row
/// above it against `now`.
pub fn inspect_prices(
    book: &Spreadsheet,
    now: NaiveDateTime,
    interval_hours: u32,
) -> Result<Staleness> {
    let sheet = sheet(book, PRICES_SHEET)?;

    let mut insertion_row = FIRST_DATA_ROW;
    while !is_blank(sheet, DATE_COLUMN, insertion_row) {
        insertion_row += 1;
    }

    let last_update = if insertion_row > FIRST_DATA_ROW {
        read_date(sheet, insertion_row - 1)
    } else {
        None
    };
    let hours_since = last_update.map(|last| hours_between(last, now));
    let stale = hours_since.is_none_or(|hours| hours >= i64::from(interval_hours));

    if let (Some(last), Some(hours)) = (last_update, hours_since) {
        debug!(
            "lastupd: {} delta: {}H [{}]",
            last.format("%d.%m.%Y %H:%M"),
            hours,
            if stale { "+" } else { "-" }
        );
    }

    Ok(Staleness {
        insertion_row,
        last_update,
        hours_since,
        stale,
    })
}

/// Writes the date, per-product prices and the currency rate into `row`.
pub fn write_row(
    book: &mut Spreadsheet,
    row: u32,
    now: NaiveDateTime,
    products: &[Product],
    usd_column: u32,
    rate: f64,
) -> Result<()> {
    let sheet = book
        .get_sheet_by_name_mut(PRICES_SHEET)
        .ok_or_else(|| anyhow!("Workbook has no '{PRICES_SHEET}' sheet"))?;

    sheet
        .get_cell_mut((DATE_COLUMN, row))
        .set_value_number(to_excel_serial(now))
        .get_style_mut()
        .get_number_format_mut()
        .set_format_code(DATE_FORMAT_CODE);

    for (column, product) in (FIRST_PRICE_COLUMN..).zip(products) {
        if column == usd_column {
            warn!(
                column,
                product = %product.code,
                "Product column overlaps the currency column"
            );
        }
        sheet
            .get_cell_mut((column, row))
            .set_value_number(product.price_avg);
        debug!(".. {:<25} {:.2}", product.name, product.price_avg);
    }

    sheet.get_cell_mut((usd_column, row)).set_value_number(rate);
    debug!(".. USD$ {:.2} {} {}", rate, usd_column, row);

    Ok(())
}

/// Fills in `price_avg` for each product, one lookup at a time.
pub async fn price_products(products: &mut [Product], provider: &dyn PriceProvider) -> Result<()> {
    for product in products.iter_mut() {
        let price = provider.fetch_price(&product.code).await.with_context(|| {
            format!(
                "Failed to fetch price for product '{}' ({})",
                product.name, product.code
            )
        })?;
        product.price_avg = price.price_avg;
        debug!(
            code = %product.code,
            listed_as = ?price.name,
            min = ?price.price_min,
            max = ?price.price_max,
            "Average price {:.2}",
            price.price_avg
        );
    }
    Ok(())
}

/// Runs the whole check-and-append procedure on one workbook.
///
/// Prices and the currency rate are only looked up when a row is due. On
/// error the workbook is left untouched.
pub async fn update_book(
    book: &mut Spreadsheet,
    ctx: &UpdateContext,
    prices: &dyn PriceProvider,
    rates: &dyn CurrencyRateProvider,
) -> Result<RowUpdate> {
    let mut products = read_products(book)?;
    let staleness = inspect_prices(book, ctx.now, ctx.interval_hours)?;

    if !staleness.stale {
        return Ok(RowUpdate {
            staleness,
            rows_updated: 0,
        });
    }

    price_products(&mut products, prices).await?;
    let rate = rates
        .get_rate(&ctx.currency, &ctx.base_currency)
        .await
        .with_context(|| {
            format!(
                "Failed to fetch {}/{} rate",
                ctx.currency, ctx.base_currency
            )
        })?;

    write_row(
        book,
        staleness.insertion_row,
        ctx.now,
        &products,
        ctx.usd_column,
        rate,
    )?;

    Ok(RowUpdate {
        staleness,
        rows_updated: 1,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::PriceResult;
    use async_trait::async_trait;
    use chrono::{Duration, NaiveDate};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedPrices {
        prices: HashMap<String, f64>,
        calls: AtomicUsize,
    }

    impl FixedPrices {
        fn new(prices: &[(&str, f64)]) -> Self {
            FixedPrices {
                prices: prices.iter().map(|(c, p)| (c.to_string(), *p)).collect(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl PriceProvider for FixedPrices {
        async fn fetch_price(&self, code: &str) -> Result<PriceResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.prices
                .get(code)
                .map(|price| PriceResult {
                    price_avg: *price,
                    price_min: None,
                    price_max: None,
                    name: None,
                })
                .ok_or_else(|| anyhow!("Unknown product code: {code}"))
        }
    }

    struct FixedRate {
        rate: f64,
        calls: AtomicUsize,
    }

    impl FixedRate {
        fn new(rate: f64) -> Self {
            FixedRate {
                rate,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl CurrencyRateProvider for FixedRate {
        async fn get_rate(&self, from: &str, to: &str) -> Result<f64> {
            assert_eq!(from, "USD");
            assert_eq!(to, "RUB");
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.rate)
        }
    }

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 15)
            .unwrap()
            .and_hms_opt(18, 0, 0)
            .unwrap()
    }

    fn context(interval_hours: u32) -> UpdateContext {
        UpdateContext {
            now: now(),
            interval_hours,
            usd_column: 13,
            currency: "USD".to_string(),
            base_currency: "RUB".to_string(),
        }
    }

    fn book_with(products: &[(&str, &str)], dates: &[NaiveDateTime]) -> Spreadsheet {
        let mut book = umya_spreadsheet::new_file();
        {
            let sheet = book.get_sheet_mut(&0).unwrap();
            sheet.set_name(PRODUCTS_SHEET);
            sheet.get_cell_mut("A1").set_value("Name");
            sheet.get_cell_mut("B1").set_value("Code");
            for (row, (name, code)) in (2u32..).zip(products) {
                sheet.get_cell_mut((1, row)).set_value(*name);
                sheet.get_cell_mut((2, row)).set_value(*code);
            }
        }

        let prices = book.new_sheet(PRICES_SHEET).unwrap();
        prices.get_cell_mut("A1").set_value("Date");
        for (row, date) in (2u32..).zip(dates) {
            prices
                .get_cell_mut((1, row))
                .set_value_number(to_excel_serial(*date));
        }
        book
    }

    fn number_at(book: &Spreadsheet, column: u32, row: u32) -> Option<f64> {
        book.get_sheet_by_name(PRICES_SHEET)
            .unwrap()
            .get_cell((column, row))
            .and_then(|cell| cell.get_value_number())
    }

    #[test]
    fn test_read_products_keeps_sheet_order() {
        let book = book_with(
            &[
                ("Kettle", "1001"),
                ("No code", ""),
                ("Toaster", "1002"),
                ("Kettle v2", "1001"),
                ("Mixer", " 1003 "),
            ],
            &[],
        );

        let products = read_products(&book).unwrap();
        let codes: Vec<_> = products.iter().map(|p| p.code.as_str()).collect();
        assert_eq!(codes, vec!["1001", "1002", "1003"]);
        assert_eq!(products[0].name, "Kettle v2");
        assert!(products.iter().all(|p| p.price_avg == 0.0));
    }

    #[test]
    fn test_inspect_empty_prices_is_stale() {
        let book = book_with(&[("Kettle", "1001")], &[]);
        let staleness = inspect_prices(&book, now(), 6).unwrap();
        assert_eq!(staleness.insertion_row, 2);
        assert!(staleness.last_update.is_none());
        assert!(staleness.hours_since.is_none());
        assert!(staleness.stale);
    }

    #[test]
    fn test_inspect_recent_row_is_fresh() {
        let dates = [now() - Duration::days(1), now() - Duration::minutes(330)];
        let book = book_with(&[("Kettle", "1001")], &dates);

        let staleness = inspect_prices(&book, now(), 6).unwrap();
        assert_eq!(staleness.insertion_row, 4);
        assert_eq!(staleness.hours_since, Some(5));
        assert!(!staleness.stale);
    }

    #[test]
    fn test_inspect_row_at_interval_is_stale() {
        let book = book_with(&[("Kettle", "1001")], &[now() - Duration::hours(6)]);
        let staleness = inspect_prices(&book, now(), 6).unwrap();
        assert_eq!(staleness.hours_since, Some(6));
        assert!(staleness.stale);
    }

    #[test]
    fn test_inspect_text_date() {
        let mut book = book_with(&[("Kettle", "1001")], &[]);
        book.get_sheet_by_name_mut(PRICES_SHEET)
            .unwrap()
            .get_cell_mut("A2")
            .set_value("15.03.2024 16:00");

        let staleness = inspect_prices(&book, now(), 6).unwrap();
        assert_eq!(staleness.insertion_row, 3);
        assert_eq!(staleness.hours_since, Some(2));
        assert!(!staleness.stale);
    }

    #[test]
    fn test_inspect_whitespace_date_cell_is_occupied() {
        let mut book = book_with(&[("Kettle", "1001")], &[now() - Duration::hours(1)]);
        book.get_sheet_by_name_mut(PRICES_SHEET)
            .unwrap()
            .get_cell_mut("A3")
            .set_value(" ");

        let staleness = inspect_prices(&book, now(), 6).unwrap();
        assert_eq!(staleness.insertion_row, 4);
        assert!(staleness.last_update.is_none());
        assert!(staleness.stale);
    }

    #[test]
    fn test_inspect_future_date_is_fresh() {
        let book = book_with(&[("Kettle", "1001")], &[now() + Duration::minutes(30)]);

        let staleness = inspect_prices(&book, now(), 6).unwrap();
        assert_eq!(staleness.hours_since, Some(-1));
        assert!(!staleness.stale);

        let staleness = inspect_prices(&book, now(), 0).unwrap();
        assert!(!staleness.stale);
    }

    #[test]
    fn test_inspect_utc_serial_row() {
        // Rows carry UTC wall-clock serials; a row written three hours
        // earlier on the same clock is not due yet.
        let written = now() - Duration::hours(3);
        let book = book_with(&[("Kettle", "1001")], &[written]);

        let staleness = inspect_prices(&book, now(), 6).unwrap();
        assert_eq!(staleness.last_update, Some(written));
        assert_eq!(staleness.hours_since, Some(3));
        assert!(!staleness.stale);
    }

    #[test]
    fn test_inspect_garbage_date_is_stale() {
        let mut book = book_with(&[("Kettle", "1001")], &[]);
        book.get_sheet_by_name_mut(PRICES_SHEET)
            .unwrap()
            .get_cell_mut("A2")
            .set_value("sometime");

        let staleness = inspect_prices(&book, now(), 6).unwrap();
        assert_eq!(staleness.insertion_row, 3);
        assert!(staleness.last_update.is_none());
        assert!(staleness.stale);
    }

    #[test]
    fn test_missing_sheets_are_errors() {
        let book = umya_spreadsheet::new_file();
        let err = read_products(&book).unwrap_err();
        assert_eq!(err.to_string(), "Workbook has no 'Products' sheet");
        let err = inspect_prices(&book, now(), 6).unwrap_err();
        assert_eq!(err.to_string(), "Workbook has no 'Prices' sheet");
    }

    #[tokio::test]
    async fn test_fresh_book_is_left_alone() {
        let mut book = book_with(&[("Kettle", "1001")], &[now() - Duration::hours(2)]);
        let prices = FixedPrices::new(&[("1001", 10.0)]);
        let rates = FixedRate::new(90.0);

        let update = update_book(&mut book, &context(6), &prices, &rates)
            .await
            .unwrap();

        assert_eq!(update.rows_updated, 0);
        assert_eq!(prices.calls.load(Ordering::SeqCst), 0);
        assert_eq!(rates.calls.load(Ordering::SeqCst), 0);
        assert!(number_at(&book, 1, 3).is_none());
    }

    #[tokio::test]
    async fn test_stale_book_gets_one_row() {
        let mut book = book_with(
            &[("Kettle", "1001"), ("Toaster", "1002"), ("Mixer", "1003")],
            &[now() - Duration::days(2), now() - Duration::hours(7)],
        );
        let prices = FixedPrices::new(&[("1001", 10.5), ("1002", 20.25), ("1003", 30.0)]);
        let rates = FixedRate::new(91.75);

        let update = update_book(&mut book, &context(6), &prices, &rates)
            .await
            .unwrap();

        assert_eq!(update.rows_updated, 1);
        assert_eq!(update.staleness.insertion_row, 4);
        assert_eq!(update.staleness.hours_since, Some(7));
        assert_eq!(number_at(&book, 1, 4), Some(to_excel_serial(now())));
        assert_eq!(number_at(&book, 2, 4), Some(10.5));
        assert_eq!(number_at(&book, 3, 4), Some(20.25));
        assert_eq!(number_at(&book, 4, 4), Some(30.0));
        assert_eq!(number_at(&book, 13, 4), Some(91.75));
        assert!(number_at(&book, 1, 5).is_none());

        let format = book
            .get_sheet_by_name(PRICES_SHEET)
            .unwrap()
            .get_cell((1, 4))
            .unwrap()
            .get_style()
            .get_number_format()
            .map(|nf| nf.get_format_code().to_string());
        assert_eq!(format.as_deref(), Some(DATE_FORMAT_CODE));
    }

    #[tokio::test]
    async fn test_empty_history_starts_at_row_two() {
        let mut book = book_with(&[("Kettle", "1001")], &[]);
        let prices = FixedPrices::new(&[("1001", 5.0)]);
        let rates = FixedRate::new(88.0);

        let update = update_book(&mut book, &context(6), &prices, &rates)
            .await
            .unwrap();

        assert_eq!(update.rows_updated, 1);
        assert_eq!(number_at(&book, 2, 2), Some(5.0));
        assert_eq!(number_at(&book, 13, 2), Some(88.0));
    }

    #[tokio::test]
    async fn test_zero_interval_always_updates() {
        let mut book = book_with(&[("Kettle", "1001")], &[now()]);
        let prices = FixedPrices::new(&[("1001", 5.0)]);
        let rates = FixedRate::new(88.0);

        let update = update_book(&mut book, &context(0), &prices, &rates)
            .await
            .unwrap();

        assert_eq!(update.rows_updated, 1);
        assert_eq!(update.staleness.insertion_row, 3);
    }

    #[tokio::test]
    async fn test_price_failure_leaves_book_untouched() {
        let mut book = book_with(
            &[("Kettle", "1001"), ("Unknown", "9999")],
            &[now() - Duration::days(1)],
        );
        let prices = FixedPrices::new(&[("1001", 5.0)]);
        let rates = FixedRate::new(88.0);

        let err = update_book(&mut book, &context(6), &prices, &rates)
            .await
            .unwrap_err();

        assert!(err.to_string().contains("'Unknown' (9999)"));
        assert_eq!(rates.calls.load(Ordering::SeqCst), 0);
        assert!(number_at(&book, 1, 3).is_none());
        assert!(number_at(&book, 2, 3).is_none());
    }
}

//! # Report Math
//!
//! Report windows, trend computation and the payload types produced by the
//! reporting engine in `comptoir-db`.
//!
//! ## Windows
//! ```text
//!              previous window                 current window
//!   ├──────────────────────────────┼──────────────────────────────┤
//!   start − (end − start)        start                        end (now)
//!
//!   previous: [start − Δ, start)    current: [start, end]    UTC
//! ```
//! A period window starts at the aligned boundary (midnight, Monday, first
//! of the month, first of January) and ends at the time the report is built.
//! The comparison window always has the same length and ends where the
//! current one starts. The current window includes its end instant, so a
//! sale rung up at the moment the report is built is counted; the
//! comparison window excludes its end so no sale is counted twice.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::money::{round_half_up, Money};
use crate::types::{PaymentMethod, TaxRate};

// =============================================================================
// Period & Window
// =============================================================================

/// Named reporting period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum Period {
    #[default]
    Day,
    Week,
    Month,
    Year,
}

impl Period {
    /// Parses a period keyword. Unknown keywords fall back to [`Period::Day`].
    ///
    /// ```rust
    /// use comptoir_core::report::Period;
    ///
    /// assert_eq!(Period::parse_or_default("month"), Period::Month);
    /// assert_eq!(Period::parse_or_default("semaine"), Period::Week);
    /// assert_eq!(Period::parse_or_default("fortnight"), Period::Day);
    /// ```
    pub fn parse_or_default(keyword: &str) -> Self {
        match keyword.trim().to_lowercase().as_str() {
            "week" | "semaine" => Period::Week,
            "month" | "mois" => Period::Month,
            "year" | "annee" | "année" => Period::Year,
            _ => Period::Day,
        }
    }

    /// Aligned start of the period containing `now`.
    pub fn start_of(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let today = now.date_naive();
        let first = match self {
            Period::Day => today,
            Period::Week => {
                today - Duration::days(i64::from(today.weekday().num_days_from_monday()))
            }
            Period::Month => today.with_day(1).unwrap_or(today),
            Period::Year => today.with_ordinal(1).unwrap_or(today),
        };
        first.and_time(NaiveTime::MIN).and_utc()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Period::Day => "day",
            Period::Week => "week",
            Period::Month => "month",
            Period::Year => "year",
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A time window in UTC: `[start, end]` or, with `end_inclusive` unset,
/// `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ReportWindow {
    #[ts(as = "String")]
    pub start: DateTime<Utc>,
    #[ts(as = "String")]
    pub end: DateTime<Utc>,
    pub end_inclusive: bool,
}

impl ReportWindow {
    /// Builds a closed window `[start, end]`, swapping bounds given in
    /// reverse order.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        let (start, end) = if end < start { (end, start) } else { (start, end) };
        ReportWindow {
            start,
            end,
            end_inclusive: true,
        }
    }

    /// Builds a half-open window `[start, end)`.
    pub fn half_open(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        ReportWindow {
            end_inclusive: false,
            ..ReportWindow::new(start, end)
        }
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// The half-open window of equal length that ends where this one starts.
    pub fn previous(&self) -> ReportWindow {
        ReportWindow::half_open(self.start - self.duration(), self.start)
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && (instant < self.end || (self.end_inclusive && instant == self.end))
    }
}

/// What the caller asked to report on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReportRange {
    Period { period: Period },
    Custom {
        #[ts(as = "String")]
        start: DateTime<Utc>,
        #[ts(as = "String")]
        end: DateTime<Utc>,
    },
}

impl ReportRange {
    /// Range for a period keyword, falling back to the day.
    pub fn from_keyword(keyword: &str) -> Self {
        ReportRange::Period {
            period: Period::parse_or_default(keyword),
        }
    }

    /// Resolves the current window as of `now`.
    pub fn window(&self, now: DateTime<Utc>) -> ReportWindow {
        match self {
            ReportRange::Period { period } => ReportWindow::new(period.start_of(now), now),
            ReportRange::Custom { start, end } => ReportWindow::new(*start, *end),
        }
    }

    pub fn label(&self) -> String {
        match self {
            ReportRange::Period { period } => period.to_string(),
            ReportRange::Custom { .. } => "custom".to_string(),
        }
    }
}

impl Default for ReportRange {
    fn default() -> Self {
        ReportRange::Period {
            period: Period::Day,
        }
    }
}

// =============================================================================
// Trend
// =============================================================================

/// Change of a metric against the comparison window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Trend {
    /// Percentage change, rounded half up to one decimal.
    Change {
        #[ts(as = "String")]
        percent: Decimal,
    },
    /// The previous value is zero, so no percentage exists.
    NotApplicable,
}

impl Trend {
    /// Computes `(current − previous) / previous × 100`.
    ///
    /// ```rust
    /// use comptoir_core::report::Trend;
    /// use rust_decimal::Decimal;
    ///
    /// let t = Trend::between(Decimal::from(250), Decimal::from(200));
    /// assert_eq!(t, Trend::Change { percent: Decimal::from(25) });
    /// assert_eq!(Trend::between(Decimal::from(5), Decimal::ZERO), Trend::NotApplicable);
    /// ```
    pub fn between(current: Decimal, previous: Decimal) -> Trend {
        if previous.is_zero() {
            return Trend::NotApplicable;
        }
        (current - previous)
            .checked_mul(Decimal::ONE_HUNDRED)
            .and_then(|scaled| scaled.checked_div(previous))
            .map(|ratio| Trend::Change {
                percent: round_half_up(ratio, 1),
            })
            .unwrap_or(Trend::NotApplicable)
    }

    pub fn of_money(current: Money, previous: Money) -> Trend {
        Trend::between(current.to_decimal(), previous.to_decimal())
    }

    pub fn of_count(current: i64, previous: i64) -> Trend {
        Trend::between(Decimal::from(current), Decimal::from(previous))
    }

    /// True for a strictly positive change.
    pub fn is_up(&self) -> bool {
        matches!(self, Trend::Change { percent } if percent.is_sign_positive() && !percent.is_zero())
    }
}

// =============================================================================
// Payload
// =============================================================================

/// Headline figures over one window, paid invoices only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SalesSummary {
    pub transactions: i64,
    pub units_sold: i64,
    pub revenue_excl: Money,
    pub revenue_incl: Money,
    pub tax_collected: Money,
    /// Revenue incl. tax per transaction; zero without transactions.
    pub average_basket: Money,
}

impl SalesSummary {
    pub fn from_totals(transactions: i64, units_sold: i64, revenue_excl: Money, revenue_incl: Money) -> Self {
        SalesSummary {
            transactions,
            units_sold,
            revenue_excl,
            revenue_incl,
            tax_collected: revenue_incl - revenue_excl,
            average_basket: revenue_incl.average_over(transactions),
        }
    }
}

/// Trends of the headline figures against the comparison window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SalesTrends {
    pub revenue: Trend,
    pub transactions: Trend,
    pub average_basket: Trend,
    pub units_sold: Trend,
}

impl SalesTrends {
    pub fn between(current: &SalesSummary, previous: &SalesSummary) -> Self {
        SalesTrends {
            revenue: Trend::of_money(current.revenue_incl, previous.revenue_incl),
            transactions: Trend::of_count(current.transactions, previous.transactions),
            average_basket: Trend::of_money(current.average_basket, previous.average_basket),
            units_sold: Trend::of_count(current.units_sold, previous.units_sold),
        }
    }
}

/// Revenue and tax collected at one sale-time tax rate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TaxBucket {
    pub rate: TaxRate,
    /// Rate as a percentage with one decimal (`5.5`), for labels.
    #[ts(as = "String")]
    pub rate_percent: Decimal,
    pub revenue_excl: Money,
    pub revenue_incl: Money,
    /// `revenue_incl − revenue_excl`.
    pub tax: Money,
}

impl TaxBucket {
    pub fn new(rate: TaxRate, revenue_excl: Money, revenue_incl: Money) -> Self {
        TaxBucket {
            rate,
            rate_percent: round_half_up(rate.percentage(), 1),
            revenue_excl,
            revenue_incl,
            tax: revenue_incl - revenue_excl,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PaymentBucket {
    pub method: PaymentMethod,
    pub transactions: i64,
    pub revenue_incl: Money,
}

/// Revenue of one calendar day (UTC) with at least one paid invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DailyBucket {
    #[ts(as = "String")]
    pub day: NaiveDate,
    pub transactions: i64,
    pub revenue_incl: Money,
}

/// Label used for articles without a category.
pub const UNCATEGORIZED: &str = "Other";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CategoryBucket {
    pub category: String,
    pub units_sold: i64,
    pub revenue_incl: Money,
}

/// One recently sold invoice line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RecentSale {
    pub invoice_id: i64,
    pub invoice_number: String,
    #[ts(as = "String")]
    pub sold_at: DateTime<Utc>,
    pub article_name: String,
    pub quantity: i64,
    pub line_total: Money,
}

/// Current stock position over active articles. Not windowed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct InventorySnapshot {
    pub active_articles: i64,
    /// Σ price_incl × stock.
    pub stock_value: Money,
    pub out_of_stock: i64,
    /// `0 < stock <= minimum`.
    pub low_stock: i64,
    pub normal_stock: i64,
    /// A few out-of-stock article names, by name.
    pub out_of_stock_names: Vec<String>,
}

/// Everything one report request returns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ReportPayload {
    /// `day`, `week`, `month`, `year` or `custom`.
    pub range: String,
    pub window: ReportWindow,
    pub previous_window: ReportWindow,
    pub summary: SalesSummary,
    pub previous_summary: SalesSummary,
    pub trends: SalesTrends,
    pub tax_breakdown: Vec<TaxBucket>,
    pub payment_breakdown: Vec<PaymentBucket>,
    pub daily: Vec<DailyBucket>,
    pub categories: Vec<CategoryBucket>,
    pub recent_sales: Vec<RecentSale>,
    pub inventory: InventorySnapshot,
    #[ts(as = "String")]
    pub generated_at: DateTime<Utc>,
}

// =============================================================================
// Unit Tests
// =============================================================================

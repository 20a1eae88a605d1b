use chrono::Datelike;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::domain::bookings::{Booking, BookingStatus, PaymentStatus};

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MonthlyEarnings {
    pub year: i32,
    pub month: u32,
    pub total_earnings: Decimal,
    pub booking_count: u32,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EarningsReport {
    pub owner_id: Uuid,
    pub months: Vec<MonthlyEarnings>,
    pub total_earnings: Decimal,
}

/// Roll completed and paid bookings up by the month they ended in.
///
/// Months come out oldest first; months without earnings are omitted.
pub fn monthly_earnings<'a, I>(bookings: I) -> Vec<MonthlyEarnings>
where
    I: IntoIterator<Item = &'a Booking>,
{
    let mut groups: BTreeMap<(i32, u32), (Decimal, u32)> = BTreeMap::new();

    for booking in bookings {
        if booking.status != BookingStatus::Completed
            || booking.payment_status != PaymentStatus::Completed
        {
            continue;
        }
        let key = (booking.end_date.year(), booking.end_date.month());
        let entry = groups.entry(key).or_insert((Decimal::ZERO, 0));
        entry.0 += booking.total_price;
        entry.1 += 1;
    }

    groups
        .into_iter()
        .map(|((year, month), (total_earnings, booking_count))| MonthlyEarnings {
            year,
            month,
            total_earnings,
            booking_count,
        })
        .collect()
}

impl EarningsReport {
    pub fn new(owner_id: Uuid, months: Vec<MonthlyEarnings>) -> Self {
        let total_earnings = months.iter().map(|m| m.total_earnings).sum();
        Self {
            owner_id,
            months,
            total_earnings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::tools::Tool;
    use chrono::{NaiveDate, Utc};

    fn paid(tool: &Tool, end: NaiveDate, price: i64) -> Booking {
        let mut b = Booking::new_pending(
            tool,
            Uuid::new_v4(),
            end,
            end,
            Decimal::from(price),
            Utc::now(),
        );
        b.status = BookingStatus::Completed;
        b.payment_status = PaymentStatus::Completed;
        b
    }

    #[test]
    fn test_groups_by_end_month_ascending() {
        let tool = Tool::new(Uuid::new_v4(), "Saw", Decimal::from(10));
        let d = |m, day| NaiveDate::from_ymd_opt(2024, m, day).unwrap();

        let mut unpaid = paid(&tool, d(3, 20), 99);
        unpaid.payment_status = PaymentStatus::Pending;

        let bookings = vec![
            paid(&tool, d(3, 10), 40),
            paid(&tool, d(2, 15), 30),
            unpaid,
            paid(&tool, d(3, 25), 20),
        ];

        let months = monthly_earnings(&bookings);
        assert_eq!(months.len(), 2);
        assert_eq!((months[0].year, months[0].month), (2024, 2));
        assert_eq!(months[0].total_earnings, Decimal::from(30));
        assert_eq!(months[0].booking_count, 1);
        assert_eq!((months[1].year, months[1].month), (2024, 3));
        assert_eq!(months[1].total_earnings, Decimal::from(60));
        assert_eq!(months[1].booking_count, 2);

        let report = EarningsReport::new(tool.owner_id, months);
        assert_eq!(report.total_earnings, Decimal::from(90));
    }
}

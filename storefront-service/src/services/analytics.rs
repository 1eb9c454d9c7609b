//! Admin dashboard figures, computed from the order book in memory.

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;

use crate::models::{Order, PaymentStatus};
use crate::services::pricing::round2;

pub const PLACEHOLDER_PRODUCT_IMAGE: &str =
    "https://images.unsplash.com/photo-1578749556920-d1d3abd0846a?w=100";

const TOP_PRODUCTS: usize = 5;
const RECENT_ORDERS: usize = 5;

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_revenue: Decimal,
    pub revenue_change: f64,
    pub active_orders: u64,
    pub new_customers: u64,
    pub avg_order_value: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DaySales {
    pub name: String,
    pub sales: Decimal,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TopProduct {
    pub name: String,
    pub sales: String,
    pub price: String,
    pub img: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RecentOrder {
    pub id: String,
    pub customer: String,
    pub date: String,
    pub status: String,
    pub amount: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub stats: DashboardStats,
    pub weekly_data: Vec<DaySales>,
    pub top_products: Vec<TopProduct>,
    pub recent_orders: Vec<RecentOrder>,
}

fn created(order: &Order) -> DateTime<Utc> {
    order.created_at.to_chrono()
}

fn is_paid(order: &Order) -> bool {
    order.payment_status == PaymentStatus::Paid
}

fn month_start(year: i32, month: u32) -> DateTime<Utc> {
    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Start of the current and previous calendar month, UTC.
pub fn month_bounds(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let this_month = month_start(now.year(), now.month());
    let last_month = if now.month() == 1 {
        month_start(now.year() - 1, 12)
    } else {
        month_start(now.year(), now.month() - 1)
    };
    (this_month, last_month)
}

/// Month-over-month revenue change in percent, one decimal. A month with
/// no revenue counts as 1 so the ratio stays finite.
pub fn revenue_change(this_month: Decimal, last_month: Decimal) -> f64 {
    let base = if last_month.is_zero() {
        Decimal::ONE
    } else {
        last_month
    };
    let change = (this_month - base) / base * Decimal::ONE_HUNDRED;
    change.round_dp(1).to_f64().unwrap_or(0.0)
}

fn weekly_sales(orders: &[Order], now: DateTime<Utc>) -> Vec<DaySales> {
    (0..7)
        .rev()
        .map(|days_ago| {
            let day = (now - Duration::days(days_ago)).date_naive();
            let sales = orders
                .iter()
                .filter(|o| is_paid(o) && created(o).date_naive() == day)
                .map(|o| o.total)
                .sum();
            DaySales {
                name: day.format("%a").to_string(),
                sales,
            }
        })
        .collect()
}

fn top_products(orders: &[Order]) -> Vec<TopProduct> {
    struct Tally {
        name: String,
        image: String,
        units: u64,
        revenue: Decimal,
        first_seen: usize,
    }

    let mut tallies: HashMap<String, Tally> = HashMap::new();
    let mut seen = 0usize;
    for item in orders.iter().filter(|o| is_paid(o)).flat_map(|o| &o.items) {
        let tally = tallies.entry(item.product.to_hex()).or_insert_with(|| {
            seen += 1;
            Tally {
                name: item.name.clone(),
                image: item.image.clone(),
                units: 0,
                revenue: Decimal::ZERO,
                first_seen: seen,
            }
        });
        tally.units += u64::from(item.quantity);
        tally.revenue += item.price * Decimal::from(item.quantity);
    }

    let mut ranked: Vec<Tally> = tallies.into_values().collect();
    ranked.sort_by(|a, b| b.revenue.cmp(&a.revenue).then(a.first_seen.cmp(&b.first_seen)));
    ranked
        .into_iter()
        .take(TOP_PRODUCTS)
        .map(|t| TopProduct {
            name: if t.name.is_empty() {
                "Unknown Product".to_string()
            } else {
                t.name
            },
            sales: format!("{} sales", t.units),
            price: format!("${:.2}", t.revenue),
            img: if t.image.is_empty() {
                PLACEHOLDER_PRODUCT_IMAGE.to_string()
            } else {
                t.image
            },
        })
        .collect()
}

fn recent_orders(orders: &[Order]) -> Vec<RecentOrder> {
    let mut newest: Vec<&Order> = orders.iter().collect();
    newest.sort_by_key(|o| std::cmp::Reverse(o.created_at));
    newest
        .into_iter()
        .take(RECENT_ORDERS)
        .map(|o| {
            let first = if o.shipping_address.first_name.is_empty() {
                "Guest"
            } else {
                o.shipping_address.first_name.as_str()
            };
            RecentOrder {
                id: o.order_number.clone(),
                customer: format!("{} {}", first, o.shipping_address.last_name)
                    .trim()
                    .to_string(),
                date: created(o).format("%b %-d, %Y").to_string(),
                status: o.status.label(),
                amount: format!("${:.2}", o.total),
            }
        })
        .collect()
}

/// Build the dashboard from every order plus the number of shoppers who
/// signed up this month.
pub fn dashboard(orders: &[Order], new_customers: u64, now: DateTime<Utc>) -> Dashboard {
    let (this_month, last_month) = month_bounds(now);

    let paid: Vec<&Order> = orders.iter().filter(|o| is_paid(o)).collect();
    let total_revenue: Decimal = paid.iter().map(|o| o.total).sum();
    let avg_order_value = if paid.is_empty() {
        Decimal::ZERO
    } else {
        total_revenue / Decimal::from(paid.len())
    };

    let this_month_total: Decimal = orders
        .iter()
        .filter(|o| created(o) >= this_month)
        .map(|o| o.total)
        .sum();
    let last_month_total: Decimal = orders
        .iter()
        .filter(|o| created(o) >= last_month && created(o) < this_month)
        .map(|o| o.total)
        .sum();

    Dashboard {
        stats: DashboardStats {
            total_revenue,
            revenue_change: revenue_change(this_month_total, last_month_total),
            active_orders: orders.iter().filter(|o| o.status.is_active()).count() as u64,
            new_customers,
            avg_order_value: format!("{:.2}", round2(avg_order_value)),
        },
        weekly_data: weekly_sales(orders, now),
        top_products: top_products(orders),
        recent_orders: recent_orders(orders),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{OrderItem, OrderStatus, ShippingAddress};
    use crate::services::pricing::OrderQuote;
    use mongodb::bson::oid::ObjectId;

    fn order_at(at: DateTime<Utc>, total: i64, paid: bool, status: OrderStatus) -> Order {
        let quote = OrderQuote {
            subtotal: Decimal::from(total),
            discount: Decimal::ZERO,
            tax: Decimal::ZERO,
            shipping: Decimal::ZERO,
            gift_wrap_fee: Decimal::ZERO,
            total: Decimal::from(total),
        };
        let address = ShippingAddress {
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            ..ShippingAddress::default()
        };
        let mut order = Order::new(Vec::new(), &quote, address);
        let stamp = mongodb::bson::DateTime::from_chrono(at);
        order.created_at = stamp;
        order.updated_at = stamp;
        order.status = status;
        if paid {
            order.payment_status = PaymentStatus::Paid;
        }
        order
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn revenue_change_treats_empty_month_as_one() {
        assert_eq!(revenue_change(Decimal::from(150), Decimal::from(100)), 50.0);
        assert_eq!(revenue_change(Decimal::from(2), Decimal::ZERO), 100.0);
        assert_eq!(revenue_change(Decimal::ZERO, Decimal::from(3)), -100.0);
    }

    #[test]
    fn month_bounds_wrap_january() {
        let jan = Utc.with_ymd_and_hms(2024, 1, 10, 0, 0, 0).unwrap();
        let (this, last) = month_bounds(jan);
        assert_eq!(this, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(last, Utc.with_ymd_and_hms(2023, 12, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn stats_from_orders() {
        let orders = vec![
            order_at(now() - Duration::days(1), 100, true, OrderStatus::Confirmed),
            order_at(now() - Duration::days(2), 50, true, OrderStatus::Delivered),
            order_at(now() - Duration::days(3), 30, false, OrderStatus::Pending),
            order_at(
                Utc.with_ymd_and_hms(2024, 2, 10, 0, 0, 0).unwrap(),
                90,
                true,
                OrderStatus::Cancelled,
            ),
        ];

        let dashboard = dashboard(&orders, 4, now());
        assert_eq!(dashboard.stats.total_revenue, Decimal::from(240));
        assert_eq!(dashboard.stats.avg_order_value, "80.00");
        assert_eq!(dashboard.stats.active_orders, 2);
        assert_eq!(dashboard.stats.new_customers, 4);
        // this month 180 vs last month 90
        assert_eq!(dashboard.stats.revenue_change, 100.0);

        assert_eq!(dashboard.weekly_data.len(), 7);
        assert_eq!(dashboard.weekly_data[6].name, "Fri");
        assert_eq!(dashboard.weekly_data[5].sales, Decimal::from(100));
        assert_eq!(dashboard.weekly_data[2].sales, Decimal::ZERO);

        assert_eq!(dashboard.recent_orders.len(), 4);
        assert_eq!(dashboard.recent_orders[0].customer, "Ada Lovelace");
        assert_eq!(dashboard.recent_orders[0].date, "Mar 14, 2024");
        assert_eq!(dashboard.recent_orders[0].status, "Confirmed");
        assert_eq!(dashboard.recent_orders[0].amount, "$100.00");
    }

    #[test]
    fn top_products_rank_paid_revenue() {
        let honey = ObjectId::new();
        let coffee = ObjectId::new();
        let mut first = order_at(now(), 0, true, OrderStatus::Confirmed);
        first.items = vec![
            OrderItem::new(honey, "Honey".into(), String::new(), Decimal::from(10), 2, None),
            OrderItem::new(coffee, "Coffee".into(), "c.jpg".into(), Decimal::from(18), 3, None),
        ];
        let mut unpaid = order_at(now(), 0, false, OrderStatus::Pending);
        unpaid.items = vec![OrderItem::new(
            honey,
            "Honey".into(),
            String::new(),
            Decimal::from(10),
            100,
            None,
        )];
        unpaid.shipping_address = ShippingAddress::default();

        let top = top_products(&[first, unpaid]);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].name, "Coffee");
        assert_eq!(top[0].sales, "3 sales");
        assert_eq!(top[0].price, "$54.00");
        assert_eq!(top[1].img, PLACEHOLDER_PRODUCT_IMAGE);
    }
}

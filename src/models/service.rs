/// One billable line on an invoice.
#[derive(sqlx::FromRow, Debug, Clone, PartialEq)]
pub struct Service {
    pub id: i32,
    pub invoice_id: i32,
    pub position: i32,
    pub description: String,
    pub price: f64,
}

impl Service {
    pub fn new(description: impl Into<String>, price: f64) -> Self {
        Self {
            id: 0,
            invoice_id: 0,
            position: 0,
            description: description.into(),
            price: round_money(price),
        }
    }
}

pub fn round_money(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Invoice totals are always derived from the line items, never stored independently.
pub fn services_total(services: &[Service]) -> f64 {
    round_money(services.iter().map(|s| s.price).sum())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_is_rounded_to_pennies() {
        let services = vec![
            Service::new("Hosting", 10.10),
            Service::new("Support", 20.20),
            Service::new("Domain", 0.005),
        ];
        assert_eq!(services_total(&services), 30.31);
    }

    #[test]
    fn empty_invoice_totals_zero() {
        assert_eq!(services_total(&[]), 0.0);
    }
}

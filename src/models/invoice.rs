use chrono::{DateTime, NaiveDate, Utc};

use super::{Frequency, ModelError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InvoiceType {
    #[default]
    OneTime,
    Monthly,
    Annual,
}

impl InvoiceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceType::OneTime => "one_time",
            InvoiceType::Monthly => "monthly",
            InvoiceType::Annual => "annual",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            InvoiceType::OneTime => "One-time",
            InvoiceType::Monthly => "Monthly",
            InvoiceType::Annual => "Annual",
        }
    }

    /// The cadence an invoice of this type regenerates at, if any.
    pub fn recurrence(&self) -> Option<Frequency> {
        match self {
            InvoiceType::OneTime => None,
            InvoiceType::Monthly => Some(Frequency::Monthly),
            InvoiceType::Annual => Some(Frequency::Annual),
        }
    }

    pub fn next(&self) -> Self {
        match self {
            InvoiceType::OneTime => InvoiceType::Monthly,
            InvoiceType::Monthly => InvoiceType::Annual,
            InvoiceType::Annual => InvoiceType::OneTime,
        }
    }
}

impl std::str::FromStr for InvoiceType {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "one_time" | "one-time" | "onetime" => Ok(InvoiceType::OneTime),
            "monthly" => Ok(InvoiceType::Monthly),
            "annual" | "yearly" => Ok(InvoiceType::Annual),
            other => Err(ModelError::UnknownInvoiceType(other.to_string())),
        }
    }
}

impl TryFrom<String> for InvoiceType {
    type Error = ModelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Bank details printed on an invoice. Copied onto each invoice at creation so
/// later config changes never rewrite historical documents.
#[derive(sqlx::FromRow, Debug, Clone, PartialEq, Default)]
pub struct BankDetails {
    pub account_name: String,
    pub sort_code: String,
    pub account_number: String,
    pub iban: Option<String>,
    pub logo_path: Option<String>,
}

#[derive(sqlx::FromRow, Debug, Clone, PartialEq)]
pub struct Invoice {
    pub id: i32,
    pub client_id: i32,
    #[sqlx(try_from = "String")]
    pub invoice_type: InvoiceType,
    pub invoice_date: NaiveDate,
    pub due_date: NaiveDate,
    pub total: f64,
    #[sqlx(flatten)]
    pub bank: BankDetails,
    pub notes: Option<String>,
    pub sent: bool,
    pub paid: bool,
    pub pdf_path: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Invoice {
    pub fn number(&self) -> String {
        format!("INV-{}-{:06}", self.invoice_date.format("%Y%m%d"), self.id)
    }

    pub fn status_label(&self) -> &'static str {
        match (self.sent, self.paid) {
            (_, true) => "Paid",
            (true, false) => "Sent",
            (false, false) => "Draft",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invoice(id: i32, date: NaiveDate) -> Invoice {
        Invoice {
            id,
            client_id: 1,
            invoice_type: InvoiceType::OneTime,
            invoice_date: date,
            due_date: date,
            total: 0.0,
            bank: BankDetails::default(),
            notes: None,
            sent: false,
            paid: false,
            pdf_path: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn number_combines_issue_date_and_id() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 9).unwrap();
        assert_eq!(invoice(42, date).number(), "INV-20260309-000042");
    }

    #[test]
    fn only_periodic_types_recur() {
        assert_eq!(InvoiceType::OneTime.recurrence(), None);
        assert_eq!(InvoiceType::Monthly.recurrence(), Some(Frequency::Monthly));
        assert_eq!(InvoiceType::Annual.recurrence(), Some(Frequency::Annual));
    }

    #[test]
    fn type_accepts_form_spellings() {
        assert_eq!("ONE_TIME".parse::<InvoiceType>(), Ok(InvoiceType::OneTime));
        assert_eq!("Monthly".parse::<InvoiceType>(), Ok(InvoiceType::Monthly));
        assert!("weekly".parse::<InvoiceType>().is_err());
    }

    #[test]
    fn paid_wins_over_sent() {
        let date = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        let mut inv = invoice(1, date);
        assert_eq!(inv.status_label(), "Draft");
        inv.sent = true;
        assert_eq!(inv.status_label(), "Sent");
        inv.paid = true;
        assert_eq!(inv.status_label(), "Paid");
    }
}

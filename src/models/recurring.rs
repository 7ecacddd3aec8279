use chrono::{DateTime, Duration, Utc};

use super::ModelError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frequency {
    Monthly,
    Annual,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Monthly => "monthly",
            Frequency::Annual => "annual",
        }
    }

    /// Fixed offset between runs. Calendar months are not used.
    pub fn offset(&self) -> Duration {
        match self {
            Frequency::Monthly => Duration::days(30),
            Frequency::Annual => Duration::days(365),
        }
    }

    pub fn next_run_after(&self, run_at: DateTime<Utc>) -> DateTime<Utc> {
        run_at + self.offset()
    }

    /// First run for a schedule starting at `issued_at`. A schedule that has
    /// already produced an invoice never runs again within one period of it.
    pub fn first_run(&self, issued_at: DateTime<Utc>, last_run: Option<DateTime<Utc>>) -> DateTime<Utc> {
        let from_issue = self.next_run_after(issued_at);
        match last_run {
            Some(last) => from_issue.max(self.next_run_after(last)),
            None => from_issue,
        }
    }
}

impl std::str::FromStr for Frequency {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "monthly" => Ok(Frequency::Monthly),
            "annual" | "yearly" => Ok(Frequency::Annual),
            other => Err(ModelError::UnknownFrequency(other.to_string())),
        }
    }
}

impl TryFrom<String> for Frequency {
    type Error = ModelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Marks an invoice as the template for periodic regeneration.
#[derive(sqlx::FromRow, Debug, Clone, PartialEq)]
pub struct RecurringInvoice {
    pub id: i32,
    pub invoice_id: i32,
    #[sqlx(try_from = "String")]
    pub frequency: Frequency,
    pub next_run: DateTime<Utc>,
    pub last_run: Option<DateTime<Utc>>,
    /// Paused schedules keep `last_run` so resuming cannot double bill.
    pub active: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn offsets_are_fixed_day_counts() {
        let start = Utc.with_ymd_and_hms(2026, 1, 31, 9, 0, 0).unwrap();
        assert_eq!(
            Frequency::Monthly.next_run_after(start),
            Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
        );
        assert_eq!(
            Frequency::Annual.next_run_after(start),
            Utc.with_ymd_and_hms(2027, 1, 31, 9, 0, 0).unwrap()
        );
    }

    #[test]
    fn first_run_never_lands_within_a_period_of_the_last_run() {
        let issued = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();
        assert_eq!(
            Frequency::Annual.first_run(issued, None),
            Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap()
        );

        let last = Utc.with_ymd_and_hms(2026, 5, 10, 9, 0, 0).unwrap();
        let next = Frequency::Annual.first_run(issued, Some(last));
        assert_eq!(next, Utc.with_ymd_and_hms(2027, 5, 10, 9, 0, 0).unwrap());

        let early = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(Frequency::Monthly.first_run(issued, Some(early)), Frequency::Monthly.next_run_after(issued));
    }
}

use chrono::{DateTime, Duration, Utc};

use super::ModelError;

#[derive(sqlx::FromRow, Debug, Clone, PartialEq)]
pub struct Message {
    pub id: i32,
    pub client_id: Option<i32>,
    pub sender: String,
    pub recipient: String,
    pub subject: String,
    pub content: String,
    pub sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepeatInterval {
    Daily,
    Weekly,
    Monthly,
}

impl RepeatInterval {
    pub const ALL: [RepeatInterval; 3] = [
        RepeatInterval::Daily,
        RepeatInterval::Weekly,
        RepeatInterval::Monthly,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RepeatInterval::Daily => "daily",
            RepeatInterval::Weekly => "weekly",
            RepeatInterval::Monthly => "monthly",
        }
    }

    pub fn period(&self) -> Duration {
        match self {
            RepeatInterval::Daily => Duration::days(1),
            RepeatInterval::Weekly => Duration::days(7),
            RepeatInterval::Monthly => Duration::days(30),
        }
    }

    /// A message is due once its interval has elapsed since the last send.
    /// The daily job runs at a fixed time, so an hour of slack keeps a daily
    /// rule from skipping a day when the previous send finished a little late.
    pub fn is_due(&self, last_sent: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        match last_sent {
            None => true,
            Some(sent) => sent + self.period() - Duration::hours(1) <= now,
        }
    }
}

impl std::str::FromStr for RepeatInterval {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "daily" => Ok(RepeatInterval::Daily),
            "weekly" => Ok(RepeatInterval::Weekly),
            "monthly" => Ok(RepeatInterval::Monthly),
            other => Err(ModelError::UnknownRepeatInterval(other.to_string())),
        }
    }
}

impl TryFrom<String> for RepeatInterval {
    type Error = ModelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(sqlx::FromRow, Debug, Clone, PartialEq)]
pub struct RepeatRule {
    pub id: i32,
    pub message_id: i32,
    #[sqlx(rename = "repeat_interval", try_from = "String")]
    pub interval: RepeatInterval,
}

/// A repeat rule joined with the message it resends.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledMessage {
    pub rule: RepeatRule,
    pub message: Message,
}

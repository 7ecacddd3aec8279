use chrono::{DateTime, NaiveDate, Utc};

use super::ModelError;

/// Where a client sits in the sales lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClientStatus {
    Potential,
    #[default]
    Negotiating,
    Active,
    Paid,
    Inactive,
}

impl ClientStatus {
    pub const ALL: [ClientStatus; 5] = [
        ClientStatus::Potential,
        ClientStatus::Negotiating,
        ClientStatus::Active,
        ClientStatus::Paid,
        ClientStatus::Inactive,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ClientStatus::Potential => "potential",
            ClientStatus::Negotiating => "negotiating",
            ClientStatus::Active => "active",
            ClientStatus::Paid => "paid",
            ClientStatus::Inactive => "inactive",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ClientStatus::Potential => "Potential",
            ClientStatus::Negotiating => "Negotiating",
            ClientStatus::Active => "Active",
            ClientStatus::Paid => "Paid",
            ClientStatus::Inactive => "Inactive",
        }
    }

    /// Cycle to the next status, wrapping around.
    pub fn next(&self) -> Self {
        let idx = Self::ALL.iter().position(|s| s == self).unwrap_or(0);
        Self::ALL[(idx + 1) % Self::ALL.len()]
    }
}

impl std::str::FromStr for ClientStatus {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "potential" => Ok(ClientStatus::Potential),
            "negotiating" => Ok(ClientStatus::Negotiating),
            "active" => Ok(ClientStatus::Active),
            "paid" => Ok(ClientStatus::Paid),
            "inactive" => Ok(ClientStatus::Inactive),
            other => Err(ModelError::UnknownClientStatus(other.to_string())),
        }
    }
}

impl TryFrom<String> for ClientStatus {
    type Error = ModelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientType {
    Individual,
    Company,
}

impl ClientType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClientType::Individual => "individual",
            ClientType::Company => "company",
        }
    }
}

impl std::str::FromStr for ClientType {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "individual" => Ok(ClientType::Individual),
            "company" => Ok(ClientType::Company),
            other => Err(ModelError::UnknownClientType(other.to_string())),
        }
    }
}

#[derive(sqlx::FromRow, Debug, Clone, PartialEq)]
pub struct Client {
    pub id: i32,
    pub name: String,
    pub surname: String,
    pub phone: String,
    pub email: String,
    pub address: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub place_of_birth: Option<String>,
    pub sex: Option<String>,
    pub client_type: Option<String>,
    #[sqlx(try_from = "String")]
    pub status: ClientStatus,
    pub tasks: Vec<String>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Client {
    /// Blank client used by the creation wizard; id 0 means "not yet stored".
    pub fn blank() -> Self {
        Self {
            id: 0,
            name: String::new(),
            surname: String::new(),
            phone: String::new(),
            email: String::new(),
            address: None,
            date_of_birth: None,
            place_of_birth: None,
            sex: None,
            client_type: None,
            status: ClientStatus::default(),
            tasks: Vec::new(),
            description: None,
            created_at: Utc::now(),
        }
    }

    pub fn full_name(&self) -> String {
        if self.surname.is_empty() {
            self.name.clone()
        } else {
            format!("{} {}", self.name, self.surname)
        }
    }

    /// Split a comma separated task line into trimmed, non-empty entries.
    pub fn parse_tasks(line: &str) -> Vec<String> {
        line.split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn tasks_line(&self) -> String {
        self.tasks.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_parses_case_insensitively() {
        assert_eq!("Negotiating".parse::<ClientStatus>(), Ok(ClientStatus::Negotiating));
        assert_eq!(" PAID ".parse::<ClientStatus>(), Ok(ClientStatus::Paid));
        assert!(matches!(
            "lost".parse::<ClientStatus>(),
            Err(ModelError::UnknownClientStatus(s)) if s == "lost"
        ));
    }

    #[test]
    fn status_cycles_through_every_value() {
        let mut status = ClientStatus::Potential;
        for _ in 0..ClientStatus::ALL.len() {
            status = status.next();
        }
        assert_eq!(status, ClientStatus::Potential);
        assert_eq!(ClientStatus::Inactive.next(), ClientStatus::Potential);
    }

    #[test]
    fn tasks_are_split_and_trimmed() {
        let tasks = Client::parse_tasks(" Consult, Design ,, Build ");
        assert_eq!(tasks, vec!["Consult", "Design", "Build"]);
        assert!(Client::parse_tasks("  ").is_empty());
    }

    #[test]
    fn full_name_skips_missing_surname() {
        let mut client = Client::blank();
        client.name = "Ada".into();
        assert_eq!(client.full_name(), "Ada");
        client.surname = "Lovelace".into();
        assert_eq!(client.full_name(), "Ada Lovelace");
    }
}

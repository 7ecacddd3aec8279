use anyhow::{Context, Result};
use dotenvy::dotenv;
use serde::Deserialize;

use crate::models::BankDetails;

/// Configuration for the application
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Database connection URL
    pub database_url: String,

    #[serde(default)]
    pub smtp_host: Option<String>,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    #[serde(default)]
    pub smtp_username: Option<String>,
    #[serde(default)]
    pub smtp_password: Option<String>,
    #[serde(default)]
    pub from_email: Option<String>,
    #[serde(default)]
    pub from_name: Option<String>,

    #[serde(default)]
    pub company_name: String,
    #[serde(default)]
    pub company_email: String,
    #[serde(default)]
    pub company_site: String,
    #[serde(default)]
    pub company_phone: String,

    #[serde(default)]
    pub account_name: String,
    #[serde(default)]
    pub sort_code: String,
    #[serde(default)]
    pub account_number: String,
    #[serde(default)]
    pub iban: Option<String>,
    #[serde(default)]
    pub logo_path: Option<String>,

    #[serde(default = "default_pdf_output_dir")]
    pub pdf_output_dir: String,
    #[serde(default = "default_currency_symbol")]
    pub currency_symbol: String,
    #[serde(default = "default_payment_terms_days")]
    pub payment_terms_days: i64,

    /// Operators allowed into the admin console
    #[serde(default)]
    pub admin_emails: Vec<String>,

    #[serde(default = "default_recurring_cron")]
    pub recurring_cron: String,
    #[serde(default = "default_marketing_cron")]
    pub marketing_cron: String,

    #[serde(default = "default_log_file")]
    pub log_file: String,
}

fn default_smtp_port() -> u16 {
    587
}

fn default_pdf_output_dir() -> String {
    "invoices".to_string()
}

fn default_currency_symbol() -> String {
    "£".to_string()
}

fn default_payment_terms_days() -> i64 {
    14
}

fn default_recurring_cron() -> String {
    "0 */15 * * * *".to_string()
}

fn default_marketing_cron() -> String {
    "0 0 9 * * *".to_string()
}

fn default_log_file() -> String {
    "backoffice.log".to_string()
}

/// SMTP settings, present only when the host and credentials are all set.
#[derive(Debug, Clone, PartialEq)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from_email: String,
    pub from_name: Option<String>,
}

/// Company identity printed on invoices and substituted into marketing copy.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CompanyProfile {
    pub name: String,
    pub email: String,
    pub site: String,
    pub phone: String,
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Variables in a `.env` file are loaded first; real environment
    /// variables take precedence.
    pub fn load() -> Result<Self> {
        dotenv().ok();

        let config = envy::from_env::<Config>().context("failed to read configuration from environment")?;

        Ok(config)
    }

    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    pub fn smtp(&self) -> Option<SmtpSettings> {
        let host = self.smtp_host.clone().filter(|h| !h.is_empty())?;
        let username = self.smtp_username.clone()?;
        let password = self.smtp_password.clone()?;
        let from_email = self.from_email.clone().unwrap_or_else(|| username.clone());

        Some(SmtpSettings {
            host,
            port: self.smtp_port,
            username,
            password,
            from_email,
            from_name: self.from_name.clone().or_else(|| {
                Some(self.company_name.clone()).filter(|n| !n.is_empty())
            }),
        })
    }

    /// Sender address recorded on marketing messages.
    pub fn sender_address(&self) -> String {
        self.from_email
            .clone()
            .or_else(|| self.smtp_username.clone())
            .unwrap_or_else(|| self.company_email.clone())
    }

    pub fn company(&self) -> CompanyProfile {
        CompanyProfile {
            name: self.company_name.clone(),
            email: self.company_email.clone(),
            site: self.company_site.clone(),
            phone: self.company_phone.clone(),
        }
    }

    pub fn bank_details(&self) -> BankDetails {
        BankDetails {
            account_name: self.account_name.clone(),
            sort_code: self.sort_code.clone(),
            account_number: self.account_number.clone(),
            iban: self.iban.clone().filter(|s| !s.is_empty()),
            logo_path: self.logo_path.clone().filter(|s| !s.is_empty()),
        }
    }
}

/// Initialize environment variables and load configuration
pub fn init() -> Result<Config> {
    Config::load()
}

#[cfg(test)]
pub(crate) fn test_config() -> Config {
    envy::from_iter::<_, Config>(vec![
        ("DATABASE_URL".to_string(), "postgres://localhost/test".to_string()),
        ("COMPANY_NAME".to_string(), "Acme Studio".to_string()),
        ("COMPANY_EMAIL".to_string(), "hello@acme.test".to_string()),
        ("ACCOUNT_NAME".to_string(), "Acme Studio Ltd".to_string()),
        ("SORT_CODE".to_string(), "12-34-56".to_string()),
        ("ACCOUNT_NUMBER".to_string(), "12345678".to_string()),
        ("ADMIN_EMAILS".to_string(), "owner@acme.test,Ops@Acme.test".to_string()),
    ])
    .expect("test config")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_unset() {
        let config = test_config();
        assert_eq!(config.smtp_port, 587);
        assert_eq!(config.payment_terms_days, 14);
        assert_eq!(config.currency_symbol, "£");
        assert_eq!(config.recurring_cron, "0 */15 * * * *");
        assert_eq!(config.marketing_cron, "0 0 9 * * *");
        assert_eq!(config.admin_emails.len(), 2);
    }

    #[test]
    fn smtp_requires_host_and_credentials() {
        let mut config = test_config();
        assert!(config.smtp().is_none());

        config.smtp_host = Some("smtp.acme.test".into());
        config.smtp_username = Some("mailer@acme.test".into());
        assert!(config.smtp().is_none());

        config.smtp_password = Some("secret".into());
        let smtp = config.smtp().unwrap();
        assert_eq!(smtp.from_email, "mailer@acme.test");
        assert_eq!(smtp.from_name.as_deref(), Some("Acme Studio"));
    }

    #[test]
    fn bank_details_drop_blank_optionals() {
        let mut config = test_config();
        config.iban = Some(String::new());
        let bank = config.bank_details();
        assert_eq!(bank.sort_code, "12-34-56");
        assert_eq!(bank.iban, None);
    }
}

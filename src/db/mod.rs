use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use crate::config::Config;
use crate::models::{
    Client, Frequency, Invoice, Message, RecurringInvoice, RepeatInterval, RepeatRule,
    ScheduledMessage, Service, services_total,
};

#[cfg(test)]
pub mod memory;

/// Persistence operations used by the console, the invoicing flows and the
/// background jobs.
#[async_trait]
pub trait Store: Send + Sync {
    // Client operations
    async fn list_clients(&self) -> Result<Vec<Client>>;
    async fn get_client(&self, id: i32) -> Result<Client>;
    async fn create_client(&self, client: &Client) -> Result<i32>;
    async fn update_client(&self, client: &Client) -> Result<()>;
    /// Removes the client with its invoices, line items and recurrence rows.
    async fn delete_client(&self, id: i32) -> Result<()>;

    // Invoice operations
    async fn list_invoices(&self, client_id: Option<i32>) -> Result<Vec<Invoice>>;
    async fn get_invoice(&self, id: i32) -> Result<Invoice>;
    async fn get_services(&self, invoice_id: i32) -> Result<Vec<Service>>;
    /// Inserts (id 0) or updates the invoice and replaces its line items.
    /// The stored total is recomputed from `services`.
    async fn save_invoice_with_services(&self, invoice: &Invoice, services: &[Service]) -> Result<i32>;
    async fn delete_invoice(&self, id: i32) -> Result<()>;
    async fn mark_invoice_sent(&self, id: i32, pdf_path: &str) -> Result<()>;
    async fn set_invoice_paid(&self, id: i32, paid: bool) -> Result<()>;

    // Recurrence operations
    /// Creates or reactivates the schedule. `last_run` is left untouched.
    async fn upsert_recurrence(&self, invoice_id: i32, frequency: Frequency, next_run: DateTime<Utc>) -> Result<i32>;
    async fn get_recurrence(&self, invoice_id: i32) -> Result<Option<RecurringInvoice>>;
    /// Active schedules only.
    async fn list_recurrences(&self) -> Result<Vec<RecurringInvoice>>;
    /// Stops the schedule but keeps the row, so `last_run` survives a resume.
    async fn pause_recurrence(&self, invoice_id: i32) -> Result<()>;
    async fn due_recurrences(&self, now: DateTime<Utc>) -> Result<Vec<RecurringInvoice>>;
    /// Stores `invoice` with `services` as a new invoice and moves the
    /// template's schedule to `next_run`, atomically.
    async fn clone_recurring_invoice(
        &self,
        recurring: &RecurringInvoice,
        invoice: &Invoice,
        services: &[Service],
        run_at: DateTime<Utc>,
        next_run: DateTime<Utc>,
    ) -> Result<i32>;

    // Marketing operations
    async fn create_message(&self, message: &Message) -> Result<i32>;
    async fn create_repeat_rule(&self, message_id: i32, interval: RepeatInterval) -> Result<i32>;
    async fn list_scheduled_messages(&self) -> Result<Vec<ScheduledMessage>>;
    async fn delete_repeat_rule(&self, id: i32) -> Result<()>;
    async fn stamp_message_sent(&self, message_id: i32, sent_at: DateTime<Utc>) -> Result<()>;

    async fn get_invoice_with_services(&self, id: i32) -> Result<(Invoice, Vec<Service>)> {
        let invoice = self.get_invoice(id).await?;
        let services = self.get_services(id).await?;
        Ok((invoice, services))
    }
}

const INVOICE_COLUMNS: &str = r#"
    id, client_id, invoice_type, invoice_date, due_date, total,
    account_name, sort_code, account_number, iban, logo_path,
    notes, sent, paid, pdf_path, created_at
"#;

const CLIENT_COLUMNS: &str = r#"
    id, name, surname, phone, email, address, date_of_birth, place_of_birth,
    sex, client_type, status, tasks, description, created_at
"#;

const RECURRENCE_COLUMNS: &str = "id, invoice_id, frequency, next_run, last_run, active";

#[derive(sqlx::FromRow)]
struct ScheduledMessageRow {
    rule_id: i32,
    #[sqlx(try_from = "String")]
    repeat_interval: RepeatInterval,
    #[sqlx(flatten)]
    message: Message,
}

/// Database connection pool
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new Database instance with a connection pool
    pub async fn new(config: &Config) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(config.database_url())
            .await
            .context("failed to connect to database")?;

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool
    pub fn get_pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(self.get_pool())
            .await
            .context("failed to apply migrations")?;
        Ok(())
    }

    async fn insert_services(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        invoice_id: i32,
        services: &[Service],
    ) -> Result<()> {
        for (position, service) in services.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO services (invoice_id, position, description, price)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(invoice_id)
            .bind(position as i32)
            .bind(&service.description)
            .bind(service.price)
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }

    async fn insert_invoice(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        invoice: &Invoice,
        total: f64,
    ) -> Result<i32> {
        let id = sqlx::query_scalar::<_, i32>(
            r#"
            INSERT INTO invoices (
                client_id, invoice_type, invoice_date, due_date, total,
                account_name, sort_code, account_number, iban, logo_path,
                notes, sent, paid, pdf_path
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING id
            "#,
        )
        .bind(invoice.client_id)
        .bind(invoice.invoice_type.as_str())
        .bind(invoice.invoice_date)
        .bind(invoice.due_date)
        .bind(total)
        .bind(&invoice.bank.account_name)
        .bind(&invoice.bank.sort_code)
        .bind(&invoice.bank.account_number)
        .bind(&invoice.bank.iban)
        .bind(&invoice.bank.logo_path)
        .bind(&invoice.notes)
        .bind(invoice.sent)
        .bind(invoice.paid)
        .bind(&invoice.pdf_path)
        .fetch_one(&mut **tx)
        .await?;

        Ok(id)
    }
}

#[async_trait]
impl Store for Database {
    async fn list_clients(&self) -> Result<Vec<Client>> {
        let clients = sqlx::query_as::<_, Client>(&format!(
            "SELECT {CLIENT_COLUMNS} FROM clients ORDER BY created_at DESC"
        ))
        .fetch_all(self.get_pool())
        .await?;

        Ok(clients)
    }

    async fn get_client(&self, id: i32) -> Result<Client> {
        let client = sqlx::query_as::<_, Client>(&format!(
            "SELECT {CLIENT_COLUMNS} FROM clients WHERE id = $1"
        ))
        .bind(id)
        .fetch_one(self.get_pool())
        .await
        .with_context(|| format!("client {id} not found"))?;

        Ok(client)
    }

    async fn create_client(&self, client: &Client) -> Result<i32> {
        let id = sqlx::query_scalar::<_, i32>(
            r#"
            INSERT INTO clients (
                name, surname, phone, email, address, date_of_birth, place_of_birth,
                sex, client_type, status, tasks, description
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING id
            "#,
        )
        .bind(&client.name)
        .bind(&client.surname)
        .bind(&client.phone)
        .bind(&client.email)
        .bind(&client.address)
        .bind(client.date_of_birth)
        .bind(&client.place_of_birth)
        .bind(&client.sex)
        .bind(&client.client_type)
        .bind(client.status.as_str())
        .bind(&client.tasks)
        .bind(&client.description)
        .fetch_one(self.get_pool())
        .await?;

        Ok(id)
    }

    async fn update_client(&self, client: &Client) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE clients
            SET name = $1, surname = $2, phone = $3, email = $4, address = $5,
                date_of_birth = $6, place_of_birth = $7, sex = $8, client_type = $9,
                status = $10, tasks = $11, description = $12
            WHERE id = $13
            "#,
        )
        .bind(&client.name)
        .bind(&client.surname)
        .bind(&client.phone)
        .bind(&client.email)
        .bind(&client.address)
        .bind(client.date_of_birth)
        .bind(&client.place_of_birth)
        .bind(&client.sex)
        .bind(&client.client_type)
        .bind(client.status.as_str())
        .bind(&client.tasks)
        .bind(&client.description)
        .bind(client.id)
        .execute(self.get_pool())
        .await?;

        if result.rows_affected() == 0 {
            bail!("client {} not found", client.id);
        }

        Ok(())
    }

    async fn delete_client(&self, id: i32) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "DELETE FROM recurring_invoices WHERE invoice_id IN (SELECT id FROM invoices WHERE client_id = $1)",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM services WHERE invoice_id IN (SELECT id FROM invoices WHERE client_id = $1)")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM invoices WHERE client_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("UPDATE messages SET client_id = NULL WHERE client_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM clients WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(())
    }

    async fn list_invoices(&self, client_id: Option<i32>) -> Result<Vec<Invoice>> {
        let invoices = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            SELECT {INVOICE_COLUMNS}
            FROM invoices
            WHERE $1::int IS NULL OR client_id = $1
            ORDER BY invoice_date DESC, id DESC
            "#
        ))
        .bind(client_id)
        .fetch_all(self.get_pool())
        .await?;

        Ok(invoices)
    }

    async fn get_invoice(&self, id: i32) -> Result<Invoice> {
        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            "SELECT {INVOICE_COLUMNS} FROM invoices WHERE id = $1"
        ))
        .bind(id)
        .fetch_one(self.get_pool())
        .await
        .with_context(|| format!("invoice {id} not found"))?;

        Ok(invoice)
    }

    async fn get_services(&self, invoice_id: i32) -> Result<Vec<Service>> {
        let services = sqlx::query_as::<_, Service>(
            r#"
            SELECT id, invoice_id, position, description, price
            FROM services
            WHERE invoice_id = $1
            ORDER BY position ASC, id ASC
            "#,
        )
        .bind(invoice_id)
        .fetch_all(self.get_pool())
        .await?;

        Ok(services)
    }

    async fn save_invoice_with_services(&self, invoice: &Invoice, services: &[Service]) -> Result<i32> {
        let total = services_total(services);
        let mut tx = self.pool.begin().await?;

        let invoice_id = if invoice.id == 0 {
            Self::insert_invoice(&mut tx, invoice, total).await?
        } else {
            sqlx::query(
                r#"
                UPDATE invoices
                SET client_id = $1, invoice_type = $2, invoice_date = $3, due_date = $4,
                    total = $5, notes = $6
                WHERE id = $7
                "#,
            )
            .bind(invoice.client_id)
            .bind(invoice.invoice_type.as_str())
            .bind(invoice.invoice_date)
            .bind(invoice.due_date)
            .bind(total)
            .bind(&invoice.notes)
            .bind(invoice.id)
            .execute(&mut *tx)
            .await?;

            sqlx::query("DELETE FROM services WHERE invoice_id = $1")
                .bind(invoice.id)
                .execute(&mut *tx)
                .await?;

            invoice.id
        };

        Self::insert_services(&mut tx, invoice_id, services).await?;

        tx.commit().await?;

        Ok(invoice_id)
    }

    async fn delete_invoice(&self, id: i32) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM recurring_invoices WHERE invoice_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM services WHERE invoice_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM invoices WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(())
    }

    async fn mark_invoice_sent(&self, id: i32, pdf_path: &str) -> Result<()> {
        let result = sqlx::query("UPDATE invoices SET sent = TRUE, pdf_path = $1 WHERE id = $2")
            .bind(pdf_path)
            .bind(id)
            .execute(self.get_pool())
            .await?;

        if result.rows_affected() == 0 {
            bail!("invoice {id} not found");
        }

        Ok(())
    }

    async fn set_invoice_paid(&self, id: i32, paid: bool) -> Result<()> {
        let result = sqlx::query("UPDATE invoices SET paid = $1 WHERE id = $2")
            .bind(paid)
            .bind(id)
            .execute(self.get_pool())
            .await?;

        if result.rows_affected() == 0 {
            bail!("invoice {id} not found");
        }

        Ok(())
    }

    async fn upsert_recurrence(&self, invoice_id: i32, frequency: Frequency, next_run: DateTime<Utc>) -> Result<i32> {
        let id = sqlx::query_scalar::<_, i32>(
            r#"
            INSERT INTO recurring_invoices (invoice_id, frequency, next_run)
            VALUES ($1, $2, $3)
            ON CONFLICT (invoice_id)
            DO UPDATE SET frequency = EXCLUDED.frequency, next_run = EXCLUDED.next_run, active = TRUE
            RETURNING id
            "#,
        )
        .bind(invoice_id)
        .bind(frequency.as_str())
        .bind(next_run)
        .fetch_one(self.get_pool())
        .await?;

        Ok(id)
    }

    async fn get_recurrence(&self, invoice_id: i32) -> Result<Option<RecurringInvoice>> {
        let recurring = sqlx::query_as::<_, RecurringInvoice>(&format!(
            "SELECT {RECURRENCE_COLUMNS} FROM recurring_invoices WHERE invoice_id = $1"
        ))
        .bind(invoice_id)
        .fetch_optional(self.get_pool())
        .await?;

        Ok(recurring)
    }

    async fn list_recurrences(&self) -> Result<Vec<RecurringInvoice>> {
        let recurring = sqlx::query_as::<_, RecurringInvoice>(&format!(
            "SELECT {RECURRENCE_COLUMNS} FROM recurring_invoices WHERE active ORDER BY next_run ASC"
        ))
        .fetch_all(self.get_pool())
        .await?;

        Ok(recurring)
    }

    async fn pause_recurrence(&self, invoice_id: i32) -> Result<()> {
        sqlx::query("UPDATE recurring_invoices SET active = FALSE WHERE invoice_id = $1")
            .bind(invoice_id)
            .execute(self.get_pool())
            .await?;

        Ok(())
    }

    async fn due_recurrences(&self, now: DateTime<Utc>) -> Result<Vec<RecurringInvoice>> {
        let due = sqlx::query_as::<_, RecurringInvoice>(&format!(
            r#"
            SELECT {RECURRENCE_COLUMNS}
            FROM recurring_invoices
            WHERE active AND next_run <= $1
            ORDER BY next_run ASC
            "#
        ))
        .bind(now)
        .fetch_all(self.get_pool())
        .await?;

        Ok(due)
    }

    async fn clone_recurring_invoice(
        &self,
        recurring: &RecurringInvoice,
        invoice: &Invoice,
        services: &[Service],
        run_at: DateTime<Utc>,
        next_run: DateTime<Utc>,
    ) -> Result<i32> {
        let mut tx = self.pool.begin().await?;

        let invoice_id = Self::insert_invoice(&mut tx, invoice, services_total(services)).await?;
        Self::insert_services(&mut tx, invoice_id, services).await?;

        sqlx::query("UPDATE recurring_invoices SET next_run = $1, last_run = $2 WHERE id = $3")
            .bind(next_run)
            .bind(run_at)
            .bind(recurring.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(invoice_id)
    }

    async fn create_message(&self, message: &Message) -> Result<i32> {
        let id = sqlx::query_scalar::<_, i32>(
            r#"
            INSERT INTO messages (client_id, sender, recipient, subject, content, sent_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(message.client_id)
        .bind(&message.sender)
        .bind(&message.recipient)
        .bind(&message.subject)
        .bind(&message.content)
        .bind(message.sent_at)
        .fetch_one(self.get_pool())
        .await?;

        Ok(id)
    }

    async fn create_repeat_rule(&self, message_id: i32, interval: RepeatInterval) -> Result<i32> {
        let id = sqlx::query_scalar::<_, i32>(
            "INSERT INTO repeat_rules (message_id, repeat_interval) VALUES ($1, $2) RETURNING id",
        )
        .bind(message_id)
        .bind(interval.as_str())
        .fetch_one(self.get_pool())
        .await?;

        Ok(id)
    }

    async fn list_scheduled_messages(&self) -> Result<Vec<ScheduledMessage>> {
        let rows = sqlx::query_as::<_, ScheduledMessageRow>(
            r#"
            SELECT r.id AS rule_id, r.repeat_interval,
                   m.id, m.client_id, m.sender, m.recipient, m.subject, m.content,
                   m.sent_at, m.created_at
            FROM repeat_rules r
            JOIN messages m ON m.id = r.message_id
            ORDER BY r.id ASC
            "#,
        )
        .fetch_all(self.get_pool())
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| ScheduledMessage {
                rule: RepeatRule {
                    id: row.rule_id,
                    message_id: row.message.id,
                    interval: row.repeat_interval,
                },
                message: row.message,
            })
            .collect())
    }

    async fn delete_repeat_rule(&self, id: i32) -> Result<()> {
        sqlx::query("DELETE FROM repeat_rules WHERE id = $1")
            .bind(id)
            .execute(self.get_pool())
            .await?;

        Ok(())
    }

    async fn stamp_message_sent(&self, message_id: i32, sent_at: DateTime<Utc>) -> Result<()> {
        let result = sqlx::query("UPDATE messages SET sent_at = $1 WHERE id = $2")
            .bind(sent_at)
            .bind(message_id)
            .execute(self.get_pool())
            .await?;

        if result.rows_affected() == 0 {
            bail!("message {message_id} not found");
        }

        Ok(())
    }
}

/// Initialize the database connection pool
pub async fn init(config: &Config) -> Result<Database> {
    let db = Database::new(config).await?;
    tracing::info!("database connection established");
    Ok(db)
}

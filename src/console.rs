use std::io;

use anyhow::{Result, bail};
use chrono::Utc;
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{self, EnterAlternateScreen, LeaveAlternateScreen},
};
use tracing::{error, info};
use tui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};

use crate::auth::{AdminAllowlist, Operator};
use crate::config::Config;
use crate::db::Store;
use crate::invoicing::{draft_invoice, mark_paid, save_invoice};
use crate::jobs::JobContext;
use crate::marketing::send_marketing;
use crate::ui::{
    client_wizard::{handle_input as handle_client_wizard_input, render_client_wizard, ClientWizardAction, ClientWizardState},
    clients::{handle_input as handle_clients_input, render_clients, ClientAction, ClientsState},
    email_wizard::{handle_input as handle_email_wizard_input, render_email_wizard, EmailWizardAction, EmailWizardState},
    invoice_wizard::{handle_input as handle_invoice_wizard_input, render_invoice_wizard, InvoiceWizardAction, InvoiceWizardState},
    invoices::{handle_input as handle_invoices_input, render_invoices, InvoiceAction, InvoicesState},
    login::{handle_input as handle_login_input, render_login, LoginAction, LoginState},
    marketing_wizard::{handle_input as handle_marketing_input, render_marketing_wizard, MarketingWizardAction, MarketingWizardState},
    repeat_rules::{handle_input as handle_repeat_rules_input, render_repeat_rules, RepeatRulesAction, RepeatRulesState},
};

// Represents the current screen in the app
enum AppScreen {
    Login,
    Clients,
    ClientWizard,
    Invoices(i32),       // Contains client_id
    InvoiceWizard(i32),  // Contains client_id
    SendInvoice(i32),    // Contains client_id
    MarketingWizard,
    RepeatRules,
}

// Main application state
struct AppState {
    config: Config,
    ctx: JobContext,
    allowlist: AdminAllowlist,
    operator: Option<Operator>,
    screen: AppScreen,
    login_state: LoginState,
    clients_state: Option<ClientsState>,
    client_wizard_state: Option<ClientWizardState>,
    invoices_state: Option<InvoicesState>,
    invoice_wizard_state: Option<InvoiceWizardState>,
    email_wizard_state: Option<EmailWizardState>,
    marketing_wizard_state: Option<MarketingWizardState>,
    repeat_rules_state: Option<RepeatRulesState>,
}

impl AppState {
    fn new(config: Config, ctx: JobContext) -> Self {
        Self {
            allowlist: AdminAllowlist::new(&config.admin_emails),
            login_state: LoginState::new(ctx.company.name.clone()),
            config,
            ctx,
            operator: None,
            screen: AppScreen::Login,
            clients_state: None,
            client_wizard_state: None,
            invoices_state: None,
            invoice_wizard_state: None,
            email_wizard_state: None,
            marketing_wizard_state: None,
            repeat_rules_state: None,
        }
    }

    fn store(&self) -> &dyn Store {
        self.ctx.store.as_ref()
    }
}

/// Run the interactive admin console until the operator quits.
pub async fn run(config: Config, ctx: JobContext) -> Result<()> {
    let mut app_state = AppState::new(config, ctx);
    if app_state.allowlist.is_empty() {
        bail!("ADMIN_EMAILS is empty, nobody can log in to the console");
    }

    // Setup terminal
    terminal::enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_app(&mut terminal, &mut app_state).await;

    // Restore terminal
    terminal::disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(err) = &result {
        error!(error = %err, "console exited with an error");
    }
    result
}

async fn run_app<B: Backend>(terminal: &mut Terminal<B>, app_state: &mut AppState) -> Result<()> {
    loop {
        terminal.draw(|f| match app_state.screen {
            AppScreen::Login => render_login(f, &mut app_state.login_state),
            AppScreen::Clients => {
                if let Some(state) = &mut app_state.clients_state {
                    render_clients(f, state);
                }
            }
            AppScreen::ClientWizard => {
                if let Some(state) = &mut app_state.client_wizard_state {
                    render_client_wizard(f, state);
                }
            }
            AppScreen::Invoices(_) => {
                if let Some(state) = &mut app_state.invoices_state {
                    render_invoices(f, state);
                }
            }
            AppScreen::InvoiceWizard(_) => {
                if let Some(state) = &mut app_state.invoice_wizard_state {
                    render_invoice_wizard(f, state);
                }
            }
            AppScreen::SendInvoice(_) => {
                if let Some(state) = &mut app_state.email_wizard_state {
                    render_email_wizard(f, state);
                }
            }
            AppScreen::MarketingWizard => {
                if let Some(state) = &mut app_state.marketing_wizard_state {
                    render_marketing_wizard(f, state);
                }
            }
            AppScreen::RepeatRules => {
                if let Some(state) = &mut app_state.repeat_rules_state {
                    render_repeat_rules(f, state);
                }
            }
        })?;

        let should_quit = match app_state.screen {
            AppScreen::Login => handle_login_screen(app_state).await?,
            AppScreen::Clients => handle_clients_screen(app_state).await?,
            AppScreen::ClientWizard => handle_client_wizard_screen(app_state).await?,
            AppScreen::Invoices(client_id) => handle_invoices_screen(app_state, client_id).await?,
            AppScreen::InvoiceWizard(client_id) => handle_invoice_wizard_screen(app_state, client_id).await?,
            AppScreen::SendInvoice(client_id) => handle_send_invoice_screen(app_state, client_id).await?,
            AppScreen::MarketingWizard => handle_marketing_screen(app_state).await?,
            AppScreen::RepeatRules => handle_repeat_rules_screen(app_state).await?,
        };

        if should_quit {
            break;
        }
    }

    Ok(())
}

async fn load_clients_screen(app_state: &mut AppState, select: Option<i32>) -> Result<&mut ClientsState> {
    let clients = app_state.store().list_clients().await?;
    let operator = app_state
        .operator
        .as_ref()
        .map(|o| o.email.clone())
        .unwrap_or_default();

    let mut state = ClientsState::new(operator, clients);
    if let Some(id) = select {
        state.select_client(id);
    }
    app_state.screen = AppScreen::Clients;
    Ok(app_state.clients_state.insert(state))
}

async fn load_invoices_screen(
    app_state: &mut AppState,
    client_id: i32,
    select: Option<i32>,
) -> Result<&mut InvoicesState> {
    let store = app_state.store();
    let client = store.get_client(client_id).await?;
    let invoices = store.list_invoices(Some(client_id)).await?;
    let schedules = store
        .list_recurrences()
        .await?
        .into_iter()
        .filter(|r| invoices.iter().any(|i| i.id == r.invoice_id))
        .collect();

    let mut state = InvoicesState::new(client, invoices, schedules, app_state.ctx.currency.clone());
    if let Some(id) = select {
        state.select_invoice(id);
    }
    app_state.screen = AppScreen::Invoices(client_id);
    Ok(app_state.invoices_state.insert(state))
}

async fn handle_login_screen(app_state: &mut AppState) -> Result<bool> {
    match handle_login_input(&mut app_state.login_state)? {
        Some(LoginAction::Quit) => return Ok(true),
        Some(LoginAction::Submit(email)) => match app_state.allowlist.require_admin(&email) {
            Ok(operator) => {
                info!(operator = %operator.email, "operator signed in");
                app_state.operator = Some(operator);
                load_clients_screen(app_state, None).await?;
            }
            Err(e) => app_state.login_state.reject(e.to_string()),
        },
        None => {}
    }

    Ok(false)
}

async fn handle_clients_screen(app_state: &mut AppState) -> Result<bool> {
    let Some(state) = &mut app_state.clients_state else {
        return Ok(false);
    };

    match handle_clients_input(state)? {
        Some(ClientAction::Quit) => return Ok(true),
        Some(ClientAction::NewClient) => {
            app_state.client_wizard_state = Some(ClientWizardState::new());
            app_state.screen = AppScreen::ClientWizard;
        }
        Some(ClientAction::EditClient(client_id)) => {
            let client = app_state.store().get_client(client_id).await?;
            app_state.client_wizard_state = Some(ClientWizardState::from_existing(client));
            app_state.screen = AppScreen::ClientWizard;
        }
        Some(ClientAction::DeleteClient(client_id)) => {
            let deleted = app_state.store().delete_client(client_id).await;
            let state = load_clients_screen(app_state, None).await?;
            match deleted {
                Ok(()) => state.show_success = Some("Client deleted".into()),
                Err(e) => state.show_error = Some(format!("Could not delete client: {e:#}")),
            }
        }
        Some(ClientAction::ViewInvoices(client_id)) => {
            load_invoices_screen(app_state, client_id, None).await?;
        }
        Some(ClientAction::Marketing(client_id)) => {
            let client = app_state.store().get_client(client_id).await?;
            app_state.marketing_wizard_state =
                Some(MarketingWizardState::new(client, app_state.ctx.company.name.clone()));
            app_state.screen = AppScreen::MarketingWizard;
        }
        Some(ClientAction::RepeatRules) => {
            let rules = app_state.store().list_scheduled_messages().await?;
            app_state.repeat_rules_state = Some(RepeatRulesState::new(rules));
            app_state.screen = AppScreen::RepeatRules;
        }
        None => {}
    }

    Ok(false)
}

async fn handle_client_wizard_screen(app_state: &mut AppState) -> Result<bool> {
    let Some(state) = &mut app_state.client_wizard_state else {
        return Ok(false);
    };

    match handle_client_wizard_input(state)? {
        Some(ClientWizardAction::Cancel) => {
            load_clients_screen(app_state, None).await?;
        }
        Some(ClientWizardAction::Save(client)) => {
            let saved = if client.id == 0 {
                app_state.store().create_client(&client).await
            } else {
                app_state.store().update_client(&client).await.map(|()| client.id)
            };

            match saved {
                Ok(id) => {
                    info!(client_id = id, "client saved");
                    load_clients_screen(app_state, Some(id)).await?;
                }
                Err(e) => {
                    if let Some(state) = &mut app_state.client_wizard_state {
                        state.show_error = Some(format!("Could not save client: {e:#}"));
                    }
                }
            }
        }
        None => {}
    }

    Ok(false)
}

async fn handle_invoices_screen(app_state: &mut AppState, client_id: i32) -> Result<bool> {
    let Some(state) = &mut app_state.invoices_state else {
        return Ok(false);
    };

    match handle_invoices_input(state)? {
        Some(InvoiceAction::Back) => {
            load_clients_screen(app_state, Some(client_id)).await?;
        }
        Some(InvoiceAction::NewInvoice(client_id)) => {
            app_state.invoice_wizard_state = Some(InvoiceWizardState::new(
                client_id,
                app_state.ctx.payment_terms_days,
                app_state.ctx.currency.clone(),
            ));
            app_state.screen = AppScreen::InvoiceWizard(client_id);
        }
        Some(InvoiceAction::EditInvoice(invoice_id)) => {
            let store = app_state.store();
            let (invoice, services) = store.get_invoice_with_services(invoice_id).await?;
            let recurring = store.get_recurrence(invoice_id).await?.is_some_and(|r| r.active);
            app_state.invoice_wizard_state = Some(InvoiceWizardState::from_existing(
                &invoice,
                &services,
                recurring,
                app_state.ctx.currency.clone(),
            ));
            app_state.screen = AppScreen::InvoiceWizard(client_id);
        }
        Some(InvoiceAction::DeleteInvoice(invoice_id)) => {
            let deleted = app_state.store().delete_invoice(invoice_id).await;
            let state = load_invoices_screen(app_state, client_id, None).await?;
            if let Err(e) = deleted {
                state.show_error = Some(format!("Could not delete invoice: {e:#}"));
            }
        }
        Some(InvoiceAction::SendInvoice(invoice_id)) => {
            let store = app_state.store();
            let (invoice, services) = store.get_invoice_with_services(invoice_id).await?;
            let client = store.get_client(invoice.client_id).await?;
            app_state.email_wizard_state = Some(EmailWizardState::new(
                invoice,
                &services,
                &client,
                &app_state.ctx.company,
                &app_state.ctx.currency,
            ));
            app_state.screen = AppScreen::SendInvoice(client_id);
        }
        Some(InvoiceAction::SetPaid(invoice_id, paid)) => {
            let updated = mark_paid(app_state.store(), invoice_id, paid).await;
            let state = load_invoices_screen(app_state, client_id, Some(invoice_id)).await?;
            if let Err(e) = updated {
                state.show_error = Some(format!("Could not update invoice: {e:#}"));
            }
        }
        None => {}
    }

    Ok(false)
}

async fn handle_invoice_wizard_screen(app_state: &mut AppState, client_id: i32) -> Result<bool> {
    let Some(state) = &mut app_state.invoice_wizard_state else {
        return Ok(false);
    };

    match handle_invoice_wizard_input(state)? {
        Some(InvoiceWizardAction::Cancel) => {
            load_invoices_screen(app_state, client_id, None).await?;
        }
        Some(InvoiceWizardAction::Save(invoice_id, form)) => {
            let (mut invoice, services) = draft_invoice(&form, app_state.config.bank_details());
            if let Some(id) = invoice_id {
                invoice.id = id;
            }

            match save_invoice(app_state.store(), &invoice, &services, form.recurring).await {
                Ok(id) => {
                    let state = load_invoices_screen(app_state, client_id, Some(id)).await?;
                    state.show_success = Some("Invoice saved".into());
                }
                Err(e) => {
                    if let Some(state) = &mut app_state.invoice_wizard_state {
                        state.show_error = Some(format!("{e:#}"));
                    }
                }
            }
        }
        None => {}
    }

    Ok(false)
}

async fn handle_send_invoice_screen(app_state: &mut AppState, client_id: i32) -> Result<bool> {
    let Some(state) = &mut app_state.email_wizard_state else {
        return Ok(false);
    };

    match handle_email_wizard_input(state)? {
        Some(EmailWizardAction::Cancel) => {
            load_invoices_screen(app_state, client_id, None).await?;
        }
        Some(EmailWizardAction::Send(invoice_id)) => {
            let recipient = state.recipient().to_string();
            let sent = app_state
                .ctx
                .dispatcher()
                .send_invoice(app_state.store(), invoice_id)
                .await;

            match sent {
                Ok(()) => {
                    let state = load_invoices_screen(app_state, client_id, Some(invoice_id)).await?;
                    state.show_success = Some(format!("Invoice sent to {recipient}"));
                }
                Err(e) => {
                    error!(invoice_id, error = %e, "manual invoice send failed");
                    if let Some(state) = &mut app_state.email_wizard_state {
                        state.show_error = Some(format!("{e:#}"));
                    }
                }
            }
        }
        None => {}
    }

    Ok(false)
}

async fn handle_marketing_screen(app_state: &mut AppState) -> Result<bool> {
    let Some(state) = &mut app_state.marketing_wizard_state else {
        return Ok(false);
    };

    match handle_marketing_input(state)? {
        Some(MarketingWizardAction::Cancel) => {
            let client_id = state.client().id;
            load_clients_screen(app_state, Some(client_id)).await?;
        }
        Some(MarketingWizardAction::Send(campaign)) => {
            let client = state.client().clone();
            let outcome = send_marketing(
                app_state.store(),
                app_state.ctx.mailer.as_ref(),
                &client,
                &campaign,
                &app_state.config.sender_address(),
                &app_state.ctx.company.name,
                Utc::now(),
            )
            .await;

            match outcome {
                Ok(outcome) => {
                    let state = load_clients_screen(app_state, Some(client.id)).await?;
                    if outcome.delivered() {
                        let mut message = format!("Message sent to {}", client.email);
                        if let Some(repeat) = campaign.repeat {
                            message.push_str(&format!(", repeating {}", repeat.as_str()));
                        }
                        state.show_success = Some(message);
                    } else {
                        let error = outcome.error.unwrap_or_default();
                        state.show_error = Some(format!("Message saved but not delivered: {error}"));
                    }
                }
                Err(e) => {
                    if let Some(state) = &mut app_state.marketing_wizard_state {
                        state.show_error = Some(format!("{e:#}"));
                    }
                }
            }
        }
        None => {}
    }

    Ok(false)
}

async fn handle_repeat_rules_screen(app_state: &mut AppState) -> Result<bool> {
    let Some(state) = &mut app_state.repeat_rules_state else {
        return Ok(false);
    };

    match handle_repeat_rules_input(state)? {
        Some(RepeatRulesAction::Back) => {
            load_clients_screen(app_state, None).await?;
        }
        Some(RepeatRulesAction::DeleteRule(rule_id)) => {
            let deleted = app_state.store().delete_repeat_rule(rule_id).await;
            let rules = app_state.store().list_scheduled_messages().await?;
            let state = app_state.repeat_rules_state.insert(RepeatRulesState::new(rules));
            match deleted {
                Ok(()) => info!(rule_id, "repeat rule removed"),
                Err(e) => state.show_error = Some(format!("Could not delete rule: {e:#}")),
            }
        }
        None => {}
    }

    Ok(false)
}

//! CLI Commands Module
//!
//! Command-line entry points. Each protected command passes the route guard
//! before it touches the backend.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context};
use clap::{Parser, Subcommand};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};

use crate::api::ApiError;
use crate::auth::{LoginOutcome, Session};
use crate::diagnostics;
use crate::guard::{self, GuardDecision, NavItem, Route};
use crate::models::{
    AppointmentCreate, AppointmentStatus, Customer, CustomerCreate, DashboardStats, Job,
    JobCreate, ReminderCreate, ReminderStatus, Role, TuneRevision, UserCreate, Vehicle,
    VehicleCreate,
};
use crate::resources::{job_views, search_target, JobFilter, SearchTarget};
use crate::AppState;

/// IgnitionLab Dynamics workshop client
#[derive(Debug, Parser)]
#[command(name = "ignitionlab", version, about)]
pub struct Cli {
    /// Backend base URL (overrides IGNITIONLAB_API_URL)
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Log in and remember the token
    Login {
        #[arg(short, long)]
        username: String,
        #[arg(short, long, env = "IGNITIONLAB_PASSWORD", hide_env_values = true)]
        password: String,
        /// Ask the backend for a long-lived token
        #[arg(long)]
        remember_me: bool,
    },
    /// Forget the stored session
    Logout,
    /// Show the current session and visible pages
    Whoami,
    /// Create a technician account
    Register {
        #[arg(short, long)]
        username: String,
        #[arg(short, long, env = "IGNITIONLAB_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Rename the logged-in account
    UpdateUsername {
        #[arg(long)]
        new_username: String,
        #[arg(short, long, env = "IGNITIONLAB_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Change the logged-in account's password
    UpdatePassword {
        #[arg(long)]
        current: String,
        #[arg(long)]
        new: String,
    },
    /// Report on token storage and session state
    Diagnostics {
        /// Also write the report as JSON to this file
        #[arg(long)]
        export: Option<PathBuf>,
    },
    /// Workshop statistics
    Dashboard,
    #[command(subcommand)]
    Customers(CustomerCommand),
    #[command(subcommand)]
    Vehicles(VehicleCommand),
    #[command(subcommand)]
    Jobs(JobCommand),
    #[command(subcommand)]
    Reminders(ReminderCommand),
    #[command(subcommand)]
    Appointments(AppointmentCommand),
    #[command(subcommand)]
    Users(UserCommand),
    /// Search customers and vehicles
    Search { query: String },
}

/// Customer records
#[derive(Debug, Subcommand)]
pub enum CustomerCommand {
    List,
    /// A customer with their vehicles
    Show { id: String },
    /// Create from a JSON file
    Create { from: PathBuf },
    Delete { id: String },
}

/// Vehicle records
#[derive(Debug, Subcommand)]
pub enum VehicleCommand {
    List {
        #[arg(long)]
        customer: Option<String>,
    },
    /// A vehicle with owner, jobs and tune revisions
    Show { id: String },
    /// Create from a JSON file
    Create { from: PathBuf },
    Delete { id: String },
}

/// Job logs
#[derive(Debug, Subcommand)]
pub enum JobCommand {
    List {
        #[arg(long)]
        vehicle: Option<String>,
        #[arg(long)]
        customer: Option<String>,
    },
    /// Create from a JSON file
    Create { from: PathBuf },
    Delete { id: String },
}

/// Follow-up reminders
#[derive(Debug, Subcommand)]
pub enum ReminderCommand {
    List {
        #[arg(long, value_parser = parse_variant::<ReminderStatus>)]
        status: Option<ReminderStatus>,
    },
    /// Create from a JSON file
    Create { from: PathBuf },
    SetStatus {
        id: String,
        #[arg(value_parser = parse_variant::<ReminderStatus>)]
        status: ReminderStatus,
    },
}

/// Appointments
#[derive(Debug, Subcommand)]
pub enum AppointmentCommand {
    List,
    /// Create from a JSON file
    Create { from: PathBuf },
    SetStatus {
        id: String,
        #[arg(value_parser = parse_variant::<AppointmentStatus>)]
        status: AppointmentStatus,
    },
    Delete { id: String },
}

/// User accounts (admin only)
#[derive(Debug, Subcommand)]
pub enum UserCommand {
    List,
    Create {
        #[arg(short, long)]
        username: String,
        #[arg(short, long)]
        password: String,
        #[arg(long, default_value = "technician")]
        role: Role,
    },
    SetRole { id: String, role: Role },
    Delete { id: String },
}

// Response types

#[derive(Debug, Serialize)]
struct WhoamiResponse {
    #[serde(flatten)]
    session: Session,
    navigation: Vec<NavItem>,
}

#[derive(Debug, Serialize)]
struct CustomerDetail {
    customer: Customer,
    vehicles: Vec<Vehicle>,
}

#[derive(Debug, Serialize)]
struct VehicleDetail {
    vehicle: Vehicle,
    customer: Option<Customer>,
    jobs: Vec<Job>,
    tune_revisions: Vec<TuneRevision>,
}

#[derive(Debug, Serialize)]
struct SearchResponse {
    #[serde(flatten)]
    results: crate::models::SearchResults,
    open: Option<String>,
}

/// Run one command against an initialized session.
pub async fn execute(command: Command, state: &AppState) -> anyhow::Result<()> {
    debug!("Executing {:?}", command_name(&command));

    match command {
        Command::Login {
            username,
            password,
            remember_me,
        } => match state.session.login(&username, &password, remember_me).await {
            LoginOutcome::Success => {
                print_json(&state.session.snapshot())?;
                Ok(())
            }
            LoginOutcome::Failure { error } => bail!(error),
        },
        Command::Logout => {
            state.session.logout();
            println!("Logged out successfully");
            Ok(())
        }
        Command::Whoami => {
            require(state, Route::Profile)?;
            let session = state.session.snapshot();
            let navigation = session
                .user
                .as_ref()
                .map(|u| guard::navigation(u.role))
                .unwrap_or_default();
            print_json(&WhoamiResponse {
                session,
                navigation,
            })
        }
        Command::Register { username, password } => {
            let created = state
                .session
                .register(&username, &password)
                .await
                .map_err(|e| failure(e, "Registration failed"))?;
            println!("Registration successful for {}. Please login.", created);
            Ok(())
        }
        Command::UpdateUsername {
            new_username,
            password,
        } => {
            require(state, Route::Profile)?;
            state
                .session
                .update_username(&new_username, &password)
                .await
                .map_err(|e| failure(e, "Failed to update username"))?;
            println!("Username updated successfully");
            Ok(())
        }
        Command::UpdatePassword { current, new } => {
            require(state, Route::Profile)?;
            state
                .session
                .update_password(&current, &new)
                .await
                .map_err(|e| failure(e, "Failed to update password"))?;
            println!("Password updated successfully");
            Ok(())
        }
        Command::Diagnostics { export } => {
            let report = diagnostics::run(state.session.store(), &state.session.snapshot());
            print_json(&report)?;
            if let Some(path) = export {
                let json = serde_json::to_string_pretty(&report)?;
                std::fs::write(&path, json)
                    .with_context(|| format!("writing {}", path.display()))?;
                info!("Diagnostics exported to {}", path.display());
            }
            Ok(())
        }
        Command::Dashboard => {
            require(state, Route::Dashboard)?;
            let stats: DashboardStats = state
                .workshop
                .dashboard_stats()
                .await
                .map_err(|e| load_failure(e, "Failed to load dashboard"))?;
            print_json(&stats)
        }
        Command::Customers(command) => customers(command, state).await,
        Command::Vehicles(command) => vehicles(command, state).await,
        Command::Jobs(command) => jobs(command, state).await,
        Command::Reminders(command) => reminders(command, state).await,
        Command::Appointments(command) => appointments(command, state).await,
        Command::Users(command) => users(command, state).await,
        Command::Search { query } => {
            require(state, Route::Search(query.clone()))?;
            let results = state
                .workshop
                .search(&query)
                .await
                .map_err(|e| load_failure(e, "Search failed"))?;
            let open = match search_target(&results) {
                SearchTarget::Vehicle(id) => Some(Route::VehicleDetail(id).path()),
                SearchTarget::Customer(id) => Some(Route::CustomerDetail(id).path()),
                SearchTarget::NoResults => None,
            };
            print_json(&SearchResponse { results, open })
        }
    }
}

async fn customers(command: CustomerCommand, state: &AppState) -> anyhow::Result<()> {
    let workshop = &state.workshop;
    match command {
        CustomerCommand::List => {
            require(state, Route::Customers)?;
            let customers = workshop
                .customers()
                .await
                .map_err(|e| load_failure(e, "Failed to load customers"))?;
            print_json(&customers)
        }
        CustomerCommand::Show { id } => {
            require(state, Route::CustomerDetail(id.clone()))?;
            let (customer, vehicles) =
                tokio::try_join!(workshop.customer(&id), workshop.vehicles(Some(id.as_str())))
                    .map_err(|e| load_failure(e, "Failed to load customer details"))?;
            print_json(&CustomerDetail { customer, vehicles })
        }
        CustomerCommand::Create { from } => {
            require(state, Route::Customers)?;
            let body: CustomerCreate = read_body(&from)?;
            let created = workshop
                .create_customer(&body)
                .await
                .map_err(|e| failure(e, "Failed to create customer"))?;
            print_json(&created)
        }
        CustomerCommand::Delete { id } => {
            require(state, Route::Customers)?;
            workshop
                .delete_customer(&id)
                .await
                .map_err(|e| failure(e, "Failed to delete customer"))?;
            println!("Customer deleted successfully");
            Ok(())
        }
    }
}

async fn vehicles(command: VehicleCommand, state: &AppState) -> anyhow::Result<()> {
    let workshop = &state.workshop;
    match command {
        VehicleCommand::List { customer } => {
            require(state, Route::Vehicles)?;
            let vehicles = workshop
                .vehicles(customer.as_deref())
                .await
                .map_err(|e| load_failure(e, "Failed to load vehicles"))?;
            print_json(&vehicles)
        }
        VehicleCommand::Show { id } => {
            require(state, Route::VehicleDetail(id.clone()))?;
            let vehicle = workshop
                .vehicle(&id)
                .await
                .map_err(|e| load_failure(e, "Failed to load vehicle details"))?;
            let filter = JobFilter {
                vehicle_id: Some(id.as_str()),
                customer_id: None,
            };
            let (customer, jobs, tune_revisions) = tokio::join!(
                workshop.customer(&vehicle.customer_id),
                workshop.jobs(&filter),
                workshop.tune_revisions(Some(id.as_str()), None),
            );
            print_json(&VehicleDetail {
                customer: customer.ok(),
                jobs: jobs.map_err(|e| load_failure(e, "Failed to load vehicle details"))?,
                tune_revisions: tune_revisions.unwrap_or_default(),
                vehicle,
            })
        }
        VehicleCommand::Create { from } => {
            require(state, Route::Vehicles)?;
            let body: VehicleCreate = read_body(&from)?;
            let created = workshop
                .create_vehicle(&body)
                .await
                .map_err(|e| failure(e, "Failed to create vehicle"))?;
            print_json(&created)
        }
        VehicleCommand::Delete { id } => {
            require(state, Route::Vehicles)?;
            workshop
                .delete_vehicle(&id)
                .await
                .map_err(|e| failure(e, "Failed to delete vehicle"))?;
            println!("Vehicle deleted successfully");
            Ok(())
        }
    }
}

async fn jobs(command: JobCommand, state: &AppState) -> anyhow::Result<()> {
    let workshop = &state.workshop;
    match command {
        JobCommand::List { vehicle, customer } => {
            require(state, Route::Jobs)?;
            let filter = JobFilter {
                vehicle_id: vehicle.as_deref(),
                customer_id: customer.as_deref(),
            };
            let (jobs, vehicles, customers, billing) = tokio::try_join!(
                workshop.jobs(&filter),
                workshop.vehicles(None),
                workshop.customers(),
                workshop.billing(None),
            )
            .map_err(|e| load_failure(e, "Failed to load jobs"))?;
            print_json(&job_views(&jobs, &vehicles, &customers, &billing))
        }
        JobCommand::Create { from } => {
            require(state, Route::CreateJob)?;
            let body: JobCreate = read_body(&from)?;
            let created = workshop
                .create_job(&body)
                .await
                .map_err(|e| failure(e, "Failed to create job"))?;
            print_json(&created)
        }
        JobCommand::Delete { id } => {
            require(state, Route::Jobs)?;
            workshop
                .delete_job(&id)
                .await
                .map_err(|e| failure(e, "Failed to delete job"))?;
            println!("Job deleted successfully");
            Ok(())
        }
    }
}

async fn reminders(command: ReminderCommand, state: &AppState) -> anyhow::Result<()> {
    require(state, Route::Reminders)?;
    let workshop = &state.workshop;
    match command {
        ReminderCommand::List { status } => {
            let reminders = workshop
                .reminders(status)
                .await
                .map_err(|e| load_failure(e, "Failed to load reminders"))?;
            print_json(&reminders)
        }
        ReminderCommand::Create { from } => {
            let body: ReminderCreate = read_body(&from)?;
            let created = workshop
                .create_reminder(&body)
                .await
                .map_err(|e| failure(e, "Failed to create reminder"))?;
            print_json(&created)
        }
        ReminderCommand::SetStatus { id, status } => {
            let updated = workshop
                .set_reminder_status(&id, status)
                .await
                .map_err(|e| failure(e, "Failed to update reminder"))?;
            print_json(&updated)
        }
    }
}

async fn appointments(command: AppointmentCommand, state: &AppState) -> anyhow::Result<()> {
    require(state, Route::Appointments)?;
    let workshop = &state.workshop;
    match command {
        AppointmentCommand::List => {
            let appointments = workshop
                .appointments()
                .await
                .map_err(|e| load_failure(e, "Failed to load appointments"))?;
            print_json(&appointments)
        }
        AppointmentCommand::Create { from } => {
            let body: AppointmentCreate = read_body(&from)?;
            let created = workshop
                .create_appointment(&body)
                .await
                .map_err(|e| failure(e, "Failed to create appointment"))?;
            print_json(&created)
        }
        AppointmentCommand::SetStatus { id, status } => {
            workshop
                .set_appointment_status(&id, status)
                .await
                .map_err(|e| failure(e, "Failed to update appointment"))?;
            println!("Appointment status updated successfully");
            Ok(())
        }
        AppointmentCommand::Delete { id } => {
            workshop
                .delete_appointment(&id)
                .await
                .map_err(|e| failure(e, "Failed to delete appointment"))?;
            println!("Appointment deleted successfully");
            Ok(())
        }
    }
}

async fn users(command: UserCommand, state: &AppState) -> anyhow::Result<()> {
    require(state, Route::Users)?;
    let workshop = &state.workshop;
    match command {
        UserCommand::List => {
            let users = workshop
                .users()
                .await
                .map_err(|e| load_failure(e, "Failed to load users"))?;
            print_json(&users)
        }
        UserCommand::Create {
            username,
            password,
            role,
        } => {
            let created = workshop
                .create_user(&UserCreate {
                    username,
                    password,
                    role,
                })
                .await
                .map_err(|e| failure(e, "Failed to create user"))?;
            print_json(&created)
        }
        UserCommand::SetRole { id, role } => {
            workshop
                .set_user_role(&id, role)
                .await
                .map_err(|e| failure(e, "Failed to update user role"))?;
            println!("User role updated successfully");
            Ok(())
        }
        UserCommand::Delete { id } => {
            workshop
                .delete_user(&id)
                .await
                .map_err(|e| failure(e, "Failed to delete user"))?;
            println!("User deleted successfully");
            Ok(())
        }
    }
}

/// Pass the route guard or explain why not.
pub fn require(state: &AppState, route: Route) -> anyhow::Result<()> {
    match guard::guard(&state.session.snapshot(), route) {
        GuardDecision::Render(_) => Ok(()),
        GuardDecision::Wait => bail!("Session is still being verified"),
        GuardDecision::RedirectToLogin => bail!("Not logged in. Run `ignitionlab login` first."),
        GuardDecision::Forbidden => bail!("Access denied. Admin only."),
    }
}

/// Mutation failures show the backend's message when there is one.
fn failure(e: ApiError, fallback: &str) -> anyhow::Error {
    if e.is_unauthorized() {
        return anyhow!("Session expired. Please log in again.");
    }
    anyhow!(e.user_message(fallback))
}

/// Load failures show a generic notice.
fn load_failure(e: ApiError, notice: &str) -> anyhow::Error {
    debug!("{}: {}", notice, e);
    if e.is_unauthorized() {
        return anyhow!("Session expired. Please log in again.");
    }
    anyhow!(notice.to_string())
}

fn read_body<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Parse a lowercase wire value into one of the status enums.
fn parse_variant<T: DeserializeOwned>(value: &str) -> Result<T, String> {
    serde_json::from_value(serde_json::Value::String(value.to_ascii_lowercase()))
        .map_err(|_| format!("invalid value: {value}"))
}

fn command_name(command: &Command) -> &'static str {
    match command {
        Command::Login { .. } => "login",
        Command::Logout => "logout",
        Command::Whoami => "whoami",
        Command::Register { .. } => "register",
        Command::UpdateUsername { .. } => "update-username",
        Command::UpdatePassword { .. } => "update-password",
        Command::Diagnostics { .. } => "diagnostics",
        Command::Dashboard => "dashboard",
        Command::Customers(_) => "customers",
        Command::Vehicles(_) => "vehicles",
        Command::Jobs(_) => "jobs",
        Command::Reminders(_) => "reminders",
        Command::Appointments(_) => "appointments",
        Command::Users(_) => "users",
        Command::Search { .. } => "search",
    }
}

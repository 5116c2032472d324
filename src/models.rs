//! Wire types for the workshop backend.
//!
//! Field sets follow the backend's JSON. Unknown fields are ignored on the
//! way in; optional fields are omitted on the way out.

use serde::{Deserialize, Serialize};

/// Account role as reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Technician,
    Viewer,
}

impl Role {
    pub fn is_admin(self) -> bool {
        matches!(self, Role::Admin)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Admin => write!(f, "admin"),
            Role::Technician => write!(f, "technician"),
            Role::Viewer => write!(f, "viewer"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "technician" => Ok(Role::Technician),
            "viewer" => Ok(Role::Viewer),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// The logged-in identity, as returned by login or `/api/auth/me`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub username: String,
    pub role: Role,
}

// Auth

#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
    pub remember_me: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    pub username: String,
    pub role: Role,
}

impl TokenResponse {
    pub fn user(&self) -> User {
        User {
            username: self.username.clone(),
            role: self.role,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RegisterRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterResponse {
    #[serde(default)]
    pub message: Option<String>,
    pub username: String,
}

#[derive(Debug, Serialize)]
pub struct UpdateUsernameRequest<'a> {
    pub new_username: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Serialize)]
pub struct UpdatePasswordRequest<'a> {
    pub current_password: &'a str,
    pub new_password: &'a str,
}

// User management

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserAccount {
    pub id: String,
    pub username: String,
    pub role: Role,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserCreate {
    pub username: String,
    pub password: String,
    pub role: Role,
}

#[derive(Debug, Serialize)]
pub struct RoleUpdate {
    pub role: Role,
}

// Customers

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub id: String,
    pub full_name: String,
    pub phone_number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub whatsapp_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instagram_handle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gst_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CustomerCreate {
    pub full_name: String,
    pub phone_number: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub whatsapp_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instagram_handle: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gst_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

// Vehicles

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: String,
    pub customer_id: String,
    pub make: String,
    pub model: String,
    pub variant: String,
    pub engine_code: String,
    pub ecu_type: String,
    pub vin: String,
    pub registration_number: String,
    pub year: i32,
    pub fuel_type: String,
    pub gearbox: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub odometer_at_last_visit: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qr_code: Option<String>,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

impl Vehicle {
    /// "Make Model (REG)" as shown in listings.
    pub fn label(&self) -> String {
        format!("{} {} ({})", self.make, self.model, self.registration_number)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VehicleCreate {
    pub customer_id: String,
    pub make: String,
    pub model: String,
    pub variant: String,
    pub engine_code: String,
    pub ecu_type: String,
    pub vin: String,
    pub registration_number: String,
    pub year: i32,
    pub fuel_type: String,
    pub gearbox: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub odometer_at_last_visit: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

// Jobs

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub vehicle_id: String,
    pub customer_id: String,
    pub date: String,
    pub technician_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub work_performed: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tune_stage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mods_installed: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dyno_results: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before_ecu_map_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after_ecu_map_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files_uploaded: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub afr_graph_screenshots: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calibration_notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub road_test_notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_recommendations: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warranty_or_retune_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub odometer_at_visit: Option<i64>,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobCreate {
    pub vehicle_id: String,
    pub customer_id: String,
    pub date: String,
    pub technician_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub work_performed: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tune_stage: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mods_installed: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dyno_results: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub before_ecu_map_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after_ecu_map_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calibration_notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub road_test_notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_recommendations: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warranty_or_retune_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub odometer_at_visit: Option<i64>,
}

// Billing

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Billing {
    pub id: String,
    pub job_id: String,
    pub quoted_amount: f64,
    pub final_billed_amount: f64,
    pub payment_method: String,
    pub payment_status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gst_invoice_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discounts: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refunds: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BillingCreate {
    pub job_id: String,
    pub quoted_amount: f64,
    pub final_billed_amount: f64,
    pub payment_method: String,
    pub payment_status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gst_invoice_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discounts: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refunds: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

// Tune revisions

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TuneRevision {
    pub id: String,
    pub job_id: String,
    pub vehicle_id: String,
    pub revision_label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_file_reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff_notes: Option<String>,
    #[serde(default)]
    pub created_at: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TuneRevisionCreate {
    pub job_id: String,
    pub vehicle_id: String,
    pub revision_label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff_notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TuneRevisionUpdate {
    pub revision_label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff_notes: Option<String>,
}

// Reminders

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderStatus {
    Pending,
    Completed,
    Cancelled,
}

impl ReminderStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ReminderStatus::Pending => "pending",
            ReminderStatus::Completed => "completed",
            ReminderStatus::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reminder {
    pub id: String,
    pub vehicle_id: String,
    pub customer_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    /// follow_up, service or retune
    pub reminder_type: String,
    pub reminder_date: String,
    pub message: String,
    pub status: ReminderStatus,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReminderCreate {
    pub vehicle_id: String,
    pub customer_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    pub reminder_type: String,
    pub reminder_date: String,
    pub message: String,
}

// Appointments

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Scheduled,
    Confirmed,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: String,
    pub customer_id: String,
    pub vehicle_id: String,
    pub appointment_date: String,
    pub appointment_time: String,
    pub service_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub status: AppointmentStatus,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentCreate {
    pub customer_id: String,
    pub vehicle_id: String,
    pub appointment_date: String,
    pub appointment_time: String,
    pub service_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub status: AppointmentStatus,
}

#[derive(Debug, Serialize)]
pub struct StatusUpdate<S> {
    pub status: S,
}

// Dashboard and search

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardStats {
    pub jobs_this_week: u64,
    pub pending_payments: u64,
    pub upcoming_reminders: u64,
    pub total_customers: u64,
    pub total_vehicles: u64,
    #[serde(default)]
    pub recent_jobs: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResults {
    #[serde(default)]
    pub customers: Vec<Customer>,
    #[serde(default)]
    pub vehicles: Vec<Vehicle>,
}

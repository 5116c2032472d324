//! Typed access to the workshop collections.
//!
//! Every call goes through the session's [`ApiClient`] and reports its
//! outcome back to the [`SessionController`], so a rejected token ends the
//! session wherever it is noticed.

use std::collections::HashMap;
use std::sync::Arc;

use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::api::{ApiClient, ApiError};
use crate::auth::SessionController;
use crate::models::{
    Appointment, AppointmentCreate, AppointmentStatus, Billing, BillingCreate, Customer,
    CustomerCreate, DashboardStats, Job, JobCreate, Reminder, ReminderCreate, ReminderStatus,
    Role, RoleUpdate, SearchResults, StatusUpdate, TuneRevision, TuneRevisionCreate,
    TuneRevisionUpdate, UserAccount, UserCreate, Vehicle, VehicleCreate,
};

type Ack = serde_json::Value;

/// Page-level access to the backend on behalf of the current session.
#[derive(Clone)]
pub struct Workshop {
    session: Arc<SessionController>,
}

impl Workshop {
    pub fn new(session: Arc<SessionController>) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &Arc<SessionController> {
        &self.session
    }

    fn api(&self) -> &ApiClient {
        self.session.api()
    }

    fn observed<T>(&self, result: Result<T, ApiError>) -> Result<T, ApiError> {
        self.session.observe(&result);
        result
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.observed(self.api().get(path).await)
    }

    async fn get_query<T, Q>(&self, path: &str, query: &Q) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        self.observed(self.api().get_query(path, query).await)
    }

    async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.observed(self.api().post(path, body).await)
    }

    async fn put<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.observed(self.api().put(path, body).await)
    }

    async fn delete(&self, path: &str) -> Result<(), ApiError> {
        self.observed(self.api().delete::<Option<Ack>>(path).await)
            .map(|_| ())
    }

    fn require_admin(&self) -> Result<(), ApiError> {
        if self.session.is_admin() {
            Ok(())
        } else {
            Err(ApiError::Forbidden("Access denied. Admin only.".into()))
        }
    }

    // Dashboard

    pub async fn dashboard_stats(&self) -> Result<DashboardStats, ApiError> {
        self.get("/api/dashboard/stats").await
    }

    // Customers

    pub async fn customers(&self) -> Result<Vec<Customer>, ApiError> {
        self.get("/api/customers").await
    }

    pub async fn customer(&self, id: &str) -> Result<Customer, ApiError> {
        self.get(&format!("/api/customers/{id}")).await
    }

    pub async fn create_customer(&self, customer: &CustomerCreate) -> Result<Customer, ApiError> {
        self.post("/api/customers", customer).await
    }

    pub async fn update_customer(
        &self,
        id: &str,
        customer: &CustomerCreate,
    ) -> Result<Customer, ApiError> {
        self.put(&format!("/api/customers/{id}"), customer).await
    }

    /// Refused by the backend while the customer still owns vehicles.
    pub async fn delete_customer(&self, id: &str) -> Result<(), ApiError> {
        self.delete(&format!("/api/customers/{id}")).await
    }

    // Vehicles

    pub async fn vehicles(&self, customer_id: Option<&str>) -> Result<Vec<Vehicle>, ApiError> {
        match customer_id {
            Some(customer_id) => {
                self.get_query("/api/vehicles", &[("customer_id", customer_id)])
                    .await
            }
            None => self.get("/api/vehicles").await,
        }
    }

    pub async fn vehicle(&self, id: &str) -> Result<Vehicle, ApiError> {
        self.get(&format!("/api/vehicles/{id}")).await
    }

    pub async fn create_vehicle(&self, vehicle: &VehicleCreate) -> Result<Vehicle, ApiError> {
        self.post("/api/vehicles", vehicle).await
    }

    pub async fn update_vehicle(
        &self,
        id: &str,
        vehicle: &VehicleCreate,
    ) -> Result<Vehicle, ApiError> {
        self.put(&format!("/api/vehicles/{id}"), vehicle).await
    }

    /// Refused by the backend while the vehicle still has jobs.
    pub async fn delete_vehicle(&self, id: &str) -> Result<(), ApiError> {
        self.delete(&format!("/api/vehicles/{id}")).await
    }

    // Jobs

    pub async fn jobs(&self, filter: &JobFilter<'_>) -> Result<Vec<Job>, ApiError> {
        let mut query = Vec::new();
        if let Some(vehicle_id) = filter.vehicle_id {
            query.push(("vehicle_id", vehicle_id));
        }
        if let Some(customer_id) = filter.customer_id {
            query.push(("customer_id", customer_id));
        }
        self.get_query("/api/jobs", &query).await
    }

    pub async fn job(&self, id: &str) -> Result<Job, ApiError> {
        self.get(&format!("/api/jobs/{id}")).await
    }

    pub async fn create_job(&self, job: &JobCreate) -> Result<Job, ApiError> {
        self.post("/api/jobs", job).await
    }

    pub async fn update_job(&self, id: &str, job: &JobCreate) -> Result<Job, ApiError> {
        self.put(&format!("/api/jobs/{id}"), job).await
    }

    pub async fn delete_job(&self, id: &str) -> Result<(), ApiError> {
        self.delete(&format!("/api/jobs/{id}")).await
    }

    // Billing

    pub async fn billing(&self, job_id: Option<&str>) -> Result<Vec<Billing>, ApiError> {
        match job_id {
            Some(job_id) => self.get_query("/api/billing", &[("job_id", job_id)]).await,
            None => self.get("/api/billing").await,
        }
    }

    pub async fn create_billing(&self, billing: &BillingCreate) -> Result<Billing, ApiError> {
        self.post("/api/billing", billing).await
    }

    pub async fn update_billing(
        &self,
        id: &str,
        billing: &BillingCreate,
    ) -> Result<Billing, ApiError> {
        self.put(&format!("/api/billing/{id}"), billing).await
    }

    // Tune revisions

    pub async fn tune_revisions(
        &self,
        vehicle_id: Option<&str>,
        job_id: Option<&str>,
    ) -> Result<Vec<TuneRevision>, ApiError> {
        let mut query = Vec::new();
        if let Some(vehicle_id) = vehicle_id {
            query.push(("vehicle_id", vehicle_id));
        }
        if let Some(job_id) = job_id {
            query.push(("job_id", job_id));
        }
        self.get_query("/api/tune-revisions", &query).await
    }

    pub async fn create_tune_revision(
        &self,
        revision: &TuneRevisionCreate,
    ) -> Result<TuneRevision, ApiError> {
        self.post("/api/tune-revisions", revision).await
    }

    pub async fn update_tune_revision(
        &self,
        id: &str,
        revision: &TuneRevisionUpdate,
    ) -> Result<TuneRevision, ApiError> {
        self.put(&format!("/api/tune-revisions/{id}"), revision).await
    }

    // Reminders

    pub async fn reminders(
        &self,
        status: Option<ReminderStatus>,
    ) -> Result<Vec<Reminder>, ApiError> {
        match status {
            Some(status) => {
                self.get_query("/api/reminders", &[("status", status.as_str())])
                    .await
            }
            None => self.get("/api/reminders").await,
        }
    }

    pub async fn create_reminder(&self, reminder: &ReminderCreate) -> Result<Reminder, ApiError> {
        self.post("/api/reminders", reminder).await
    }

    pub async fn set_reminder_status(
        &self,
        id: &str,
        status: ReminderStatus,
    ) -> Result<Reminder, ApiError> {
        let path = format!("/api/reminders/{id}");
        self.observed(
            self.api()
                .put_query(&path, &[("status", status.as_str())])
                .await,
        )
    }

    // Appointments

    pub async fn appointments(&self) -> Result<Vec<Appointment>, ApiError> {
        self.get("/api/appointments").await
    }

    pub async fn create_appointment(
        &self,
        appointment: &AppointmentCreate,
    ) -> Result<Appointment, ApiError> {
        self.post("/api/appointments", appointment).await
    }

    pub async fn set_appointment_status(
        &self,
        id: &str,
        status: AppointmentStatus,
    ) -> Result<(), ApiError> {
        self.put::<_, Option<Ack>>(
            &format!("/api/appointments/{id}/status"),
            &StatusUpdate { status },
        )
        .await
        .map(|_| ())
    }

    pub async fn delete_appointment(&self, id: &str) -> Result<(), ApiError> {
        self.delete(&format!("/api/appointments/{id}")).await
    }

    // Users (admin)

    pub async fn users(&self) -> Result<Vec<UserAccount>, ApiError> {
        self.require_admin()?;
        self.get("/api/users").await
    }

    pub async fn create_user(&self, user: &UserCreate) -> Result<UserAccount, ApiError> {
        self.require_admin()?;
        self.post("/api/users", user).await
    }

    pub async fn set_user_role(&self, id: &str, role: Role) -> Result<(), ApiError> {
        self.require_admin()?;
        self.put::<_, Option<Ack>>(&format!("/api/users/{id}/role"), &RoleUpdate { role })
            .await
            .map(|_| ())
    }

    pub async fn delete_user(&self, id: &str) -> Result<(), ApiError> {
        self.require_admin()?;
        self.delete(&format!("/api/users/{id}")).await
    }

    // Search

    pub async fn search(&self, query: &str) -> Result<SearchResults, ApiError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(SearchResults::default());
        }
        let encoded = utf8_percent_encode(query, NON_ALPHANUMERIC);
        debug!("Searching for {:?}", query);
        self.get(&format!("/api/search/{encoded}")).await
    }
}

/// Optional filters for the job list.
#[derive(Debug, Clone, Copy, Default)]
pub struct JobFilter<'a> {
    pub vehicle_id: Option<&'a str>,
    pub customer_id: Option<&'a str>,
}

/// Where a quick search lands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchTarget {
    Vehicle(String),
    Customer(String),
    NoResults,
}

/// Vehicles win over customers; first hit only.
pub fn search_target(results: &SearchResults) -> SearchTarget {
    if let Some(vehicle) = results.vehicles.first() {
        SearchTarget::Vehicle(vehicle.id.clone())
    } else if let Some(customer) = results.customers.first() {
        SearchTarget::Customer(customer.id.clone())
    } else {
        SearchTarget::NoResults
    }
}

/// A job with the records it refers to, resolved from already-fetched
/// collections.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobView<'a> {
    pub job: &'a Job,
    pub vehicle: Option<&'a Vehicle>,
    pub customer: Option<&'a Customer>,
    pub billing: Option<&'a Billing>,
}

pub fn index_by_id<T, F>(items: &[T], id: F) -> HashMap<&str, &T>
where
    F: Fn(&T) -> &str,
{
    items.iter().map(|item| (id(item), item)).collect()
}

/// Join jobs with their vehicle, customer and billing record.
pub fn job_views<'a>(
    jobs: &'a [Job],
    vehicles: &'a [Vehicle],
    customers: &'a [Customer],
    billing: &'a [Billing],
) -> Vec<JobView<'a>> {
    let vehicles = index_by_id(vehicles, |v| v.id.as_str());
    let customers = index_by_id(customers, |c| c.id.as_str());
    let billing = index_by_id(billing, |b| b.job_id.as_str());

    jobs.iter()
        .map(|job| JobView {
            job,
            vehicle: vehicles.get(job.vehicle_id.as_str()).copied(),
            customer: customers.get(job.customer_id.as_str()).copied(),
            billing: billing.get(job.id.as_str()).copied(),
        })
        .collect()
}

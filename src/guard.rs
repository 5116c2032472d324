//! Route guard.
//!
//! Decides what a session may see. Nothing protected is rendered until the
//! session has finished loading.

use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use serde::Serialize;

use crate::auth::Session;
use crate::models::Role;

/// Views of the workshop application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "route", content = "param", rename_all = "snake_case")]
pub enum Route {
    Login,
    Register,
    Dashboard,
    Customers,
    CustomerDetail(String),
    Vehicles,
    VehicleDetail(String),
    Jobs,
    CreateJob,
    Appointments,
    Reminders,
    Users,
    Profile,
    Search(String),
    AuthDiagnostics,
}

impl Route {
    /// Reachable without a session.
    pub fn is_public(&self) -> bool {
        matches!(self, Route::Login | Route::Register)
    }

    pub fn requires_admin(&self) -> bool {
        matches!(self, Route::Users)
    }

    pub fn path(&self) -> String {
        match self {
            Route::Login => "/login".into(),
            Route::Register => "/register".into(),
            Route::Dashboard => "/".into(),
            Route::Customers => "/customers".into(),
            Route::CustomerDetail(id) => format!("/customers/{id}"),
            Route::Vehicles => "/vehicles".into(),
            Route::VehicleDetail(id) => format!("/vehicles/{id}"),
            Route::Jobs => "/jobs".into(),
            Route::CreateJob => "/jobs/create".into(),
            Route::Appointments => "/appointments".into(),
            Route::Reminders => "/reminders".into(),
            Route::Users => "/users".into(),
            Route::Profile => "/profile".into(),
            Route::Search(query) => {
                format!("/search?q={}", utf8_percent_encode(query, NON_ALPHANUMERIC))
            }
            Route::AuthDiagnostics => "/auth-diagnostics".into(),
        }
    }
}

/// What to show for a requested route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", content = "route", rename_all = "snake_case")]
pub enum GuardDecision {
    /// Session still loading; show a neutral waiting state.
    Wait,
    RedirectToLogin,
    /// Signed in, but the role may not see this route.
    Forbidden,
    Render(Route),
}

pub fn guard(session: &Session, route: Route) -> GuardDecision {
    if route.is_public() {
        return GuardDecision::Render(route);
    }
    if session.loading {
        return GuardDecision::Wait;
    }
    let Some(user) = &session.user else {
        return GuardDecision::RedirectToLogin;
    };
    if route.requires_admin() && !user.role.is_admin() {
        return GuardDecision::Forbidden;
    }
    GuardDecision::Render(route)
}

/// A sidebar entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NavItem {
    pub name: &'static str,
    pub route: Route,
}

/// Sidebar entries visible to `role`.
pub fn navigation(role: Role) -> Vec<NavItem> {
    let mut items = vec![
        NavItem { name: "Dashboard", route: Route::Dashboard },
        NavItem { name: "Customers", route: Route::Customers },
        NavItem { name: "Vehicles", route: Route::Vehicles },
        NavItem { name: "Jobs", route: Route::Jobs },
        NavItem { name: "Appointments", route: Route::Appointments },
        NavItem { name: "Reminders", route: Route::Reminders },
    ];
    if role.is_admin() {
        items.push(NavItem { name: "Users", route: Route::Users });
    }
    items.push(NavItem { name: "Profile", route: Route::Profile });
    items
}

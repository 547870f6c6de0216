//! OpenAPI documentation configuration.
//!
//! Served as Swagger UI at `/swagger-ui`.

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::api::handlers::{
    auth_handler, company_handler, dashboard_handler, expense_handler, rule_handler, user_handler,
};
use crate::domain::{
    ApprovalCondition, ApprovalRule, ApprovalStepResponse, Company, DashboardSummary, Decision,
    ExpenseResponse, ExpenseScope, ExpenseStatus, RuleApprover, StatusTotal, StatusTotals,
    StepStatus, UserResponse, UserRole,
};
use crate::services::{SignupResponse, TokenResponse};
use crate::types::{MessageResponse, PaginatedExpenses, PaginatedUsers, PaginationMeta};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Expense Manager API",
        version = "0.1.0",
        description = "Multi-tenant expense reporting with configurable approval workflows",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "http://localhost:3000", description = "Local development server")
    ),
    paths(
        auth_handler::signup,
        auth_handler::login,
        auth_handler::forgot_password,
        auth_handler::reset_password,
        user_handler::get_current_user,
        user_handler::change_password,
        user_handler::list_users,
        user_handler::create_user,
        user_handler::get_user,
        user_handler::update_user,
        user_handler::delete_user,
        user_handler::restore_user,
        company_handler::get_company,
        company_handler::update_company,
        expense_handler::list_expenses,
        expense_handler::create_expense,
        expense_handler::get_expense,
        expense_handler::update_expense,
        expense_handler::delete_expense,
        expense_handler::submit_expense,
        expense_handler::approve_expense,
        expense_handler::reject_expense,
        expense_handler::override_expense,
        expense_handler::pending_approvals,
        rule_handler::list_rules,
        rule_handler::create_rule,
        rule_handler::get_rule,
        rule_handler::update_rule,
        rule_handler::delete_rule,
        dashboard_handler::summary,
    ),
    components(
        schemas(
            // Domain types
            UserRole,
            UserResponse,
            Company,
            ExpenseStatus,
            ExpenseScope,
            ExpenseResponse,
            ApprovalStepResponse,
            StepStatus,
            Decision,
            ApprovalCondition,
            RuleApprover,
            ApprovalRule,
            DashboardSummary,
            StatusTotals,
            StatusTotal,
            // Responses
            TokenResponse,
            SignupResponse,
            MessageResponse,
            PaginatedUsers,
            PaginatedExpenses,
            PaginationMeta,
            // Requests
            auth_handler::SignupRequest,
            auth_handler::LoginRequest,
            auth_handler::ForgotPasswordRequest,
            auth_handler::ResetPasswordRequest,
            user_handler::CreateUserRequest,
            user_handler::UpdateUserRequest,
            user_handler::ChangePasswordRequest,
            company_handler::UpdateCompanyRequest,
            expense_handler::CreateExpenseRequest,
            expense_handler::UpdateExpenseRequest,
            expense_handler::ApproveRequest,
            expense_handler::RejectRequest,
            expense_handler::OverrideRequest,
            rule_handler::RuleRequest,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Authentication", description = "Company signup, login and password resets"),
        (name = "Users", description = "People in the company and their reporting lines"),
        (name = "Company", description = "Company settings"),
        (name = "Expenses", description = "Expense claims"),
        (name = "Approvals", description = "Approval decisions"),
        (name = "Rules", description = "Approval rule administration"),
        (name = "Dashboard", description = "Expense totals")
    )
)]
pub struct ApiDoc;

/// Security scheme modifier for JWT Bearer authentication
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some("JWT token obtained from /auth/login or /auth/signup"))
                        .build(),
                ),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_lists_every_resource() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&String> = doc.paths.paths.keys().collect();

        for expected in [
            "/auth/signup",
            "/users/{id}",
            "/company",
            "/expenses/{id}/approve",
            "/approvals/pending",
            "/rules/{id}",
            "/dashboard",
        ] {
            assert!(
                paths.iter().any(|p| p.as_str() == expected),
                "missing path {expected}"
            );
        }
    }

    #[test]
    fn test_openapi_has_bearer_scheme() {
        let doc = ApiDoc::openapi();
        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer_auth"));
    }
}

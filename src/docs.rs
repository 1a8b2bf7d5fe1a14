use crate::api::admin::ProfileUpdateResponse;
use crate::api::alert::{AlertListResponse, AlertQuery, CreateAlert};
use crate::api::analytics::{AnalyticsExport, AnalyticsQuery, AnalyticsSummary, TopService};
use crate::api::customer::{CreateCustomer, CustomerListResponse, CustomerQuery};
use crate::api::expense::{CreateExpense, ExpenseListResponse, ExpenseQuery};
use crate::api::inventory::{
    CreateCategory, CreateItem, CreateProduct, ItemListResponse, ItemQuery, StockAdjustment,
};
use crate::api::notification::NotificationList;
use crate::api::service::{
    AddServiceItem, AvailabilityResponse, CreateService, ServiceListResponse, ServiceQuery,
    StatusUpdate,
};
use crate::api::worker::{
    CreateWorker, PaymentUpdate, WorkerEarningsResponse, WorkerListResponse, WorkerQuery,
};
use crate::auth::handlers::LoginResponse;
use crate::auth::session::{SessionSnapshot, SessionState};
use crate::completion::{
    AvailabilityLine, AvailabilityReport, CompletionCheck, CompletionOutcome, EarningsOutcome,
    Shortage,
};
use crate::model::alert::{Alert, AlertSeverity};
use crate::model::customer::Customer;
use crate::model::expense::Expense;
use crate::model::inventory::{
    InventoryCategory, InventoryItem, InventoryTransaction, Product, TransactionKind,
};
use crate::model::profile::{Profile, ProfilePatch};
use crate::model::role::{AccessLevel, Role};
use crate::model::service::{Service, ServiceItem, ServiceStatus};
use crate::model::user::SessionUser;
use crate::model::worker::{PaymentStatus, Worker, WorkerEarning};
use crate::models::{LoginReqDto, RegisterReqDto};
use crate::permissions::PermissionSnapshot;
use crate::utils::notification_store::Notification;
use utoipa::Modify;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Salon Management API",
        version = "1.0.0",
        description = r#"
## Salon Management System

Back office for a hair salon: customers, staff, appointments, stock and money.

### Key Features
- **Sessions**: profile provisioned on first login, live permissions
- **Customers** and **Services** with inventory line items
- **Completion** gated on stock, with worker commission
- **Inventory**: items, categories, stock movements, low-stock alerts
- **Workers**, **Expenses**, **Analytics** (admin)
- **Realtime**: server-sent events for permission, session and stock changes

### Security
Endpoints under `/api` need a **JWT Bearer** access token. Banned or
deactivated accounts are rejected on the next request and signed out.

### Response Format
- JSON bodies, paginated list endpoints
- Errors carry `error`, `message` and a user-facing `hint`
"#,
    ),
    paths(
        crate::auth::handlers::register,
        crate::auth::handlers::login,
        crate::auth::handlers::refresh_token,
        crate::auth::handlers::logout,
        crate::auth::handlers::session,

        crate::api::events::stream_events,

        crate::api::notification::list_notifications,
        crate::api::notification::mark_notification_read,
        crate::api::notification::clear_notifications,

        crate::api::customer::create_customer,
        crate::api::customer::list_customers,
        crate::api::customer::get_customer,
        crate::api::customer::update_customer,
        crate::api::customer::delete_customer,

        crate::api::worker::create_worker,
        crate::api::worker::list_workers,
        crate::api::worker::get_worker,
        crate::api::worker::update_worker,
        crate::api::worker::set_payment_status,
        crate::api::worker::list_earnings,
        crate::api::worker::delete_worker,

        crate::api::service::create_service,
        crate::api::service::list_services,
        crate::api::service::get_service,
        crate::api::service::update_service,
        crate::api::service::update_status,
        crate::api::service::delete_service,
        crate::api::service::list_items,
        crate::api::service::add_item,
        crate::api::service::remove_item,
        crate::api::service::availability,
        crate::api::service::complete_service,

        crate::api::inventory::create_item,
        crate::api::inventory::list_items,
        crate::api::inventory::get_item,
        crate::api::inventory::update_item,
        crate::api::inventory::delete_item,
        crate::api::inventory::adjust_stock,
        crate::api::inventory::list_transactions,
        crate::api::inventory::list_categories,
        crate::api::inventory::create_category,
        crate::api::inventory::delete_category,
        crate::api::inventory::list_products,
        crate::api::inventory::create_product,
        crate::api::inventory::delete_product,

        crate::api::alert::list_alerts,
        crate::api::alert::create_alert,
        crate::api::alert::mark_alert_read,
        crate::api::alert::delete_alert,

        crate::api::expense::create_expense,
        crate::api::expense::list_expenses,
        crate::api::expense::get_expense,
        crate::api::expense::update_expense,
        crate::api::expense::delete_expense,

        crate::api::admin::list_profiles,
        crate::api::admin::update_profile,

        crate::api::analytics::summary,
        crate::api::analytics::export
    ),
    components(
        schemas(
            RegisterReqDto,
            LoginReqDto,
            LoginResponse,
            SessionSnapshot,
            SessionState,
            SessionUser,
            Profile,
            ProfilePatch,
            ProfileUpdateResponse,
            Role,
            AccessLevel,
            PermissionSnapshot,
            Notification,
            NotificationList,
            Customer,
            CreateCustomer,
            CustomerQuery,
            CustomerListResponse,
            Worker,
            WorkerEarning,
            PaymentStatus,
            CreateWorker,
            PaymentUpdate,
            WorkerQuery,
            WorkerListResponse,
            WorkerEarningsResponse,
            Service,
            ServiceItem,
            ServiceStatus,
            CreateService,
            StatusUpdate,
            AddServiceItem,
            ServiceQuery,
            ServiceListResponse,
            AvailabilityResponse,
            AvailabilityLine,
            AvailabilityReport,
            CompletionCheck,
            CompletionOutcome,
            EarningsOutcome,
            Shortage,
            InventoryItem,
            InventoryCategory,
            InventoryTransaction,
            TransactionKind,
            Product,
            CreateItem,
            StockAdjustment,
            CreateCategory,
            CreateProduct,
            ItemQuery,
            ItemListResponse,
            Alert,
            AlertSeverity,
            CreateAlert,
            AlertQuery,
            AlertListResponse,
            Expense,
            CreateExpense,
            ExpenseQuery,
            ExpenseListResponse,
            AnalyticsQuery,
            AnalyticsSummary,
            AnalyticsExport,
            TopService
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Registration, sign-in and session bootstrap"),
        (name = "Realtime", description = "Server-sent events"),
        (name = "Notification", description = "Per-user notifications"),
        (name = "Customer", description = "Customer management APIs"),
        (name = "Worker", description = "Staff and payroll APIs (admin)"),
        (name = "Service", description = "Appointments, line items and completion"),
        (name = "Inventory", description = "Stock, categories and retail products"),
        (name = "Alert", description = "Operational alerts"),
        (name = "Expense", description = "Expense tracking (admin)"),
        (name = "Admin", description = "User profile administration"),
        (name = "Analytics", description = "Business summary and export (admin)"),
    )
)]
pub struct ApiDoc;

pub struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

pub mod audit_logs;
pub mod auth;
pub mod budgets;
pub mod buses;
pub mod expenses;
pub mod invoices;
pub mod profit_sharing;
pub mod routes;
pub mod users;

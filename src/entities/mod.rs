pub mod audit_log;
pub mod budget;
pub mod budget_item;
pub mod bus;
pub mod expense;
pub mod expense_category;
pub mod invoice;
pub mod profit_sharing_group;
pub mod profit_sharing_member;
pub mod route;
pub mod route_expense;
pub mod user;

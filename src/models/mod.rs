pub mod bill;
pub mod enums;

pub use bill::{BillRecord, LineItem};
pub use enums::{Actor, AuditAction, Category, Currency, PaymentStatus};

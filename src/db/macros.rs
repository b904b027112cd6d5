//! Adapter dispatch macro.
//!
//! Expands one expression into a match arm per dialect, so the enum that the
//! factory returns can forward every call without dynamic dispatch.

/// Forward an expression to whichever adapter the enum holds.
///
/// # Example
///
/// ```ignore
/// impl_adapter_dispatch!(self, a => a.list_tables().await)
/// ```
#[macro_export]
macro_rules! impl_adapter_dispatch {
    ($adapter:expr, $a:ident => $body:expr) => {
        match $adapter {
            $crate::db::factory::Adapter::MySql($a) => $body,
            $crate::db::factory::Adapter::Postgres($a) => $body,
            $crate::db::factory::Adapter::SQLite($a) => $body,
            $crate::db::factory::Adapter::SqlServer($a) => $body,
            $crate::db::factory::Adapter::Oracle($a) => $body,
        }
    };
}

pub use impl_adapter_dispatch;

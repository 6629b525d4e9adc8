pub mod analyze;
pub mod import_dynamic;
pub mod import_stable;
pub mod list;
pub mod wipe;

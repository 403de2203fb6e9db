pub mod change_set;
pub mod identity;
pub mod models;
pub mod temporal;

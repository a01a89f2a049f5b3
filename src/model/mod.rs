pub mod activity;
pub mod division;
pub mod employee;
pub mod role;
pub mod section;
pub mod sub_section;
pub mod transfer;

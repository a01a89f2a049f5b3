pub mod cache;
pub mod dashboard;
pub mod division;
pub mod employee;
pub mod report;
pub mod section;
pub mod sub_section;
pub mod sync;
pub mod transfer;

pub mod audit;
pub mod sync;

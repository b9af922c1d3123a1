pub mod admission;
pub mod naming;
pub mod quota;
pub mod retrieval;
pub mod scan_gate;
pub mod scanner;
pub mod staging;

pub mod agent;
pub mod contract;
pub mod kb;
pub mod run;

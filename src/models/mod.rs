pub mod area;
pub mod branch;
pub mod order;
pub mod restaurant;

pub mod lifecycle;
pub mod proximity;
pub mod routing;

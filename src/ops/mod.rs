pub mod fill;
pub mod scripting;
pub mod shapes;

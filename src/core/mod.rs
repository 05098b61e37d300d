pub mod dispatch;
pub mod persona;
pub mod ports;
pub mod prompt;

pub mod console;
pub mod status;

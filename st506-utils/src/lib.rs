pub mod hexdump;
pub mod rate;

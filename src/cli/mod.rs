pub mod describe;
pub mod simulate;

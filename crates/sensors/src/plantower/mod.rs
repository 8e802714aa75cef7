pub mod frame;
pub mod pmsa003i;

pub use pmsa003i::Pmsa003i;

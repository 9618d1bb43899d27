pub mod dispatch;
pub mod status;

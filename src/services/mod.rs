pub mod dispatch;
pub mod reconciler;
pub mod scheduler;
pub mod transport;
pub mod whatsapp;

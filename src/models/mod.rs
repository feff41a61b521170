pub mod delivery_record;
pub mod message;
pub mod subscriber;

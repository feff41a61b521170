pub mod message_dto;
pub mod webhook_dto;

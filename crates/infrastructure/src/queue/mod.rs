pub mod memory;
pub mod rabbitmq;

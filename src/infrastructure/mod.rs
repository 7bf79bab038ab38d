pub mod gateway;
pub mod okx_client;

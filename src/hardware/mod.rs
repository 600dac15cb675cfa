pub mod command_channel;
pub mod connector;

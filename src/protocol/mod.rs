pub mod codec;
pub mod ids;
pub mod lookup;
pub mod packets;
pub mod settings;

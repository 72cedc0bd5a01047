//! MaxDB order interface protocol: RTE packets, request and reply segments,
//! login and statement bookkeeping.

pub mod auth;
pub mod buffer;
pub mod connect;
pub mod constants;
pub mod crypto;
pub mod number;
pub mod packet;
pub mod parse_info;
pub mod part;
pub mod reply;
pub mod request;
pub mod types;

pub use buffer::ByteBuffer;
pub use packet::{Packet, PacketStream, RteHeader};
pub use parse_info::{CacheStats, ParseInfo, ParseInfoCache};
pub use reply::ReplyPacket;
pub use request::RequestPacket;
pub use types::{DataType, FieldInfo, LongValue, MaxDbValue, Row};

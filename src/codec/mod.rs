mod framed;
mod socket;

pub use framed::{Drain, DrainEnd, FrameDecoder, write_frame};
pub use socket::WsSocket;

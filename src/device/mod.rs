mod manager;
pub mod protocol;
mod transport;

pub use manager::{Deck, KeyCallback};
pub use protocol::Brightness;
pub use transport::{DeckInfo, Transport};

pub(crate) use transport::TransportFactory;

pub mod compare;
pub mod market;
pub mod premium;
pub mod server;

pub use server::KoreanCryptoServer;

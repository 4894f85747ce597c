pub mod arp;
pub mod channel;
pub mod interface;
